//! Tab-separated text records of the pipeline outputs.
//!
//! Each log starts with a `#`-prefixed header naming its columns.

use crate::dual_beam::WindSpeedResult;
use crate::flux::FluxResult;
use crate::geometry::{GeometryCalculationKind, GeometryResult};
use crate::telemetry::metrics::ProcessingStatistics;
use chrono::{DateTime, Utc};
use std::fmt::Write;

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

fn stamp(time: DateTime<Utc>) -> String {
    time.format(TIME_FORMAT).to_string()
}

pub const FLUX_LOG_HEADER: &str = "#serial\tstart\tstop\tflux_kg_s\tquality\tflux_error_wind\t\
flux_error_plume_height\twind_speed\twind_speed_error\twind_speed_source\twind_direction\t\
wind_direction_error\twind_direction_source\tplume_altitude\tplume_altitude_error\t\
plume_altitude_source\tcompass\tcone_angle\ttilt\tplume_centre\tplume_completeness\toffset\tgood_points";

pub fn flux_log_line(flux: &FluxResult) -> String {
    format!(
        "{}\t{}\t{}\t{:.3}\t{}\t{:.3}\t{:.3}\t{:.2}\t{:.2}\t{}\t{:.1}\t{:.1}\t{}\t{:.0}\t{:.0}\t{}\t{:.1}\t{:.1}\t{:.1}\t{:.2}\t{:.2}\t{:.4e}\t{}",
        flux.serial,
        stamp(flux.start_time),
        stamp(flux.stop_time),
        flux.flux,
        flux.quality,
        flux.flux_error_wind,
        flux.flux_error_plume_height,
        flux.wind.speed,
        flux.wind.speed_error,
        flux.wind.speed_source,
        flux.wind.direction,
        flux.wind.direction_error,
        flux.wind.direction_source,
        flux.plume_height.altitude,
        flux.plume_height.altitude_error,
        flux.plume_height.source,
        flux.compass,
        flux.cone_angle,
        flux.tilt,
        flux.plume_centre,
        flux.completeness,
        flux.offset,
        flux.good_points,
    )
}

pub const GEOMETRY_LOG_HEADER: &str = "#time\tkind\tinstruments\ttime_difference_s\t\
plume_altitude\tplume_altitude_error\twind_direction\twind_direction_error\tlatitude\tlongitude";

pub fn geometry_log_line(result: &GeometryResult) -> String {
    let kind = match result.kind {
        GeometryCalculationKind::TwoInstrumentTriangulation => "pair",
        GeometryCalculationKind::SingleInstrumentWindDirectionOnly => "single",
    };
    let serials: Vec<&str> = result.observations.iter().map(|o| o.serial.as_str()).collect();
    let (altitude, altitude_error) = match result.plume_altitude {
        Some(estimate) => (format!("{:.0}", estimate.value), format!("{:.0}", estimate.error)),
        None => ("-".to_string(), "-".to_string()),
    };
    format!(
        "{}\t{}\t{}\t{:.0}\t{}\t{}\t{:.1}\t{:.1}\t{:.5}\t{:.5}",
        stamp(result.average_start_time),
        kind,
        serials.join(","),
        result.start_time_difference_s,
        altitude,
        altitude_error,
        result.wind_direction.value,
        result.wind_direction.error,
        result.location.latitude,
        result.location.longitude,
    )
}

pub const WIND_SPEED_LOG_HEADER: &str = "#serial\tstart\tstop\twind_speed\twind_speed_error\t\
lag_s\tlag_std_s\tcorrelation\tgood_points\tbeam_distance\tplume_altitude\tplume_altitude_error";

pub fn wind_speed_log_line(result: &WindSpeedResult) -> String {
    format!(
        "{}\t{}\t{}\t{:.2}\t{:.2}\t{:.2}\t{:.2}\t{:.3}\t{}\t{:.1}\t{:.0}\t{:.0}",
        result.serial,
        stamp(result.start_time),
        stamp(result.stop_time),
        result.speed.value,
        result.speed.error,
        result.lag.mean_lag,
        result.lag.lag_std,
        result.lag.mean_correlation,
        result.lag.good_points,
        result.beam_distance,
        result.plume_altitude.value,
        result.plume_altitude.error,
    )
}

/// One block per instrument: accepted count, then one indented line per rejection reason.
pub fn statistics_report(statistics: &ProcessingStatistics) -> String {
    let mut out = String::new();
    for (serial, counts) in statistics.iter() {
        let _ = writeln!(
            out,
            "{}: accepted {}, rejected {}",
            serial,
            counts.accepted,
            counts.rejected_total()
        );
        for (reason, count) in &counts.rejected {
            let _ = writeln!(out, "\t{}: {}", reason, count);
        }
    }
    let (accepted, rejected) = statistics.snapshot();
    let _ = writeln!(out, "total: accepted {}, rejected {}", accepted, rejected);
    out
}
