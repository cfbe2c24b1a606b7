pub mod mode;
pub mod plume;
pub mod result;
pub mod spectrum;

pub use mode::MeasurementMode;
pub use plume::PlumeInScanProperty;
pub use result::ScanResult;
pub use spectrum::{Molecule, ReferenceFit, SkySpectrum, SpectrumFit, SpectrumInfo};
