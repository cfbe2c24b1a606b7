use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a wind or plume-height value came from, in increasing order of trust.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MeteorologySource {
    None,
    Default,
    User,
    EcmwfForecast,
    EcmwfAnalysis,
    ModelWrf,
    NoaaGdas,
    NoaaFnl,
    DualBeamMeasurement,
    GeometryCalculationSingleInstrument,
    GeometryCalculation,
}

impl MeteorologySource {
    pub fn rank(self) -> u8 {
        self as u8
    }

    pub fn is_user_supplied(self) -> bool {
        matches!(self, MeteorologySource::Default | MeteorologySource::User)
    }

    pub fn is_model(self) -> bool {
        matches!(
            self,
            MeteorologySource::EcmwfForecast
                | MeteorologySource::EcmwfAnalysis
                | MeteorologySource::ModelWrf
                | MeteorologySource::NoaaGdas
                | MeteorologySource::NoaaFnl
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            MeteorologySource::None => "none",
            MeteorologySource::Default => "default",
            MeteorologySource::User => "user",
            MeteorologySource::EcmwfForecast => "ecmwf_forecast",
            MeteorologySource::EcmwfAnalysis => "ecmwf_analysis",
            MeteorologySource::ModelWrf => "wrf",
            MeteorologySource::NoaaGdas => "noaa_gdas",
            MeteorologySource::NoaaFnl => "noaa_fnl",
            MeteorologySource::DualBeamMeasurement => "dual_beam_measurement",
            MeteorologySource::GeometryCalculationSingleInstrument => {
                "geometry_calculation_single_instrument"
            }
            MeteorologySource::GeometryCalculation => "geometry_calculation",
        }
    }
}

impl fmt::Display for MeteorologySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measurements_outrank_models_which_outrank_defaults() {
        assert!(MeteorologySource::DualBeamMeasurement.rank() > MeteorologySource::EcmwfAnalysis.rank());
        assert!(MeteorologySource::GeometryCalculation.rank() > MeteorologySource::NoaaFnl.rank());
        assert!(MeteorologySource::EcmwfForecast.rank() > MeteorologySource::User.rank());
        assert!(MeteorologySource::User.rank() > MeteorologySource::Default.rank());
    }
}
