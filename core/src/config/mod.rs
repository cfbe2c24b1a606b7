pub mod settings;
pub mod setup;

pub use settings::{
    DualBeamSettings, FitQualitySettings, FluxSettings, GeometrySettings, ProcessingSettings,
    SkyQualitySettings,
};
pub use setup::{
    FitWindow, InstrumentLocation, InstrumentSetup, InstrumentType, NetworkSetup, ScannerGeometry,
    VolcanoSource,
};
