//! Time-interval keyed stores of wind and plume-height facts.
//!
//! Stores never drop competing entries; a lookup returns the entry with the
//! smallest error among those valid at the requested time.

pub mod plume_height;
pub mod source;
pub mod store;
pub mod wind;

pub use plume_height::{PlumeHeight, PlumeHeightDataBase};
pub use source::MeteorologySource;
pub use store::{IntervalStore, StoreEntry};
pub use wind::{WindComponent, WindDataBase, WindField};
