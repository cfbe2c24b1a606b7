pub mod fitted;
