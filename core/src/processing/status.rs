use crate::processing::rejection::{Rejection, RejectionReason};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;

/// Phrase marking plume-less scans in the status log; continued runs skip them.
pub const NO_PLUME_MARKER: &str = "does not see the plume";

/// `<file> <serial>: <reason>[ (<detail>)]`
pub fn status_line(rejection: &Rejection) -> String {
    let serial = rejection.serial.as_deref().unwrap_or("unknown");
    if rejection.detail.is_empty() {
        format!("{} {}: {}", rejection.file_name(), serial, rejection.reason)
    } else {
        format!(
            "{} {}: {} ({})",
            rejection.file_name(),
            serial,
            rejection.reason,
            rejection.detail
        )
    }
}

/// File names a previous run reported as not seeing the plume, or itself ignored.
///
/// The name is everything before the serial that precedes the reason, so
/// names containing spaces survive.
pub fn parse_ignore_list(contents: &str) -> HashSet<String> {
    let reasons = [
        format!(": {}", NO_PLUME_MARKER),
        format!(": {}", RejectionReason::IgnoredByPreviousRun.describe()),
    ];
    contents
        .lines()
        .filter_map(|line| {
            let end = reasons.iter().find_map(|reason| line.find(reason.as_str()))?;
            let (file, _serial) = line[..end].rsplit_once(' ')?;
            (!file.is_empty()).then(|| file.to_string())
        })
        .collect()
}

/// Reads the ignore list from a status log; a missing log is an empty list.
pub fn read_ignore_list(path: &Path) -> io::Result<HashSet<String>> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(parse_ignore_list(&contents)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(HashSet::new()),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plume_less_and_previously_ignored_scans_carry_over() {
        let lines = [
            Rejection::new(
                Path::new("/in/a.pak"),
                Some("D2J2124"),
                RejectionReason::NoPlume,
                "",
            ),
            Rejection::new(
                Path::new("/in/b.pak"),
                Some("D2J2124"),
                RejectionReason::SkySpectrumDark,
                "",
            ),
            Rejection::new(Path::new("/in/c.pak"), None, RejectionReason::IgnoredByPreviousRun, ""),
        ]
        .iter()
        .map(status_line)
        .collect::<Vec<_>>()
        .join("\n");
        let ignored = parse_ignore_list(&lines);
        assert_eq!(ignored.len(), 2);
        assert!(ignored.contains("a.pak"));
        assert!(ignored.contains("c.pak"));
    }

    #[test]
    fn file_names_with_spaces_carry_over_whole() {
        let lines = [
            Rejection::new(
                Path::new("/in/morning scan 1.pak"),
                Some("D2J2124"),
                RejectionReason::NoPlume,
                "",
            ),
            Rejection::new(
                Path::new("/in/late run.pak"),
                None,
                RejectionReason::IgnoredByPreviousRun,
                "",
            ),
        ]
        .iter()
        .map(status_line)
        .collect::<Vec<_>>()
        .join("\n");
        let ignored = parse_ignore_list(&lines);
        assert_eq!(ignored.len(), 2);
        assert!(ignored.contains("morning scan 1.pak"));
        assert!(ignored.contains("late run.pak"));
    }

    #[test]
    fn missing_status_log_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ignored = read_ignore_list(&dir.path().join("StatusLog.txt")).unwrap();
        assert!(ignored.is_empty());
    }
}
