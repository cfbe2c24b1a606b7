use log::{info, warn};
use std::path::Path;

/// Prefixes log lines with the scan they concern, so every rejection can be traced.
#[derive(Debug, Clone)]
pub struct LogManager {
    context: String,
}

impl LogManager {
    pub fn for_scan(path: &Path, serial: Option<&str>) -> Self {
        let file = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let context = match serial {
            Some(serial) => format!("[{} {}] ", file, serial),
            None => format!("[{}] ", file),
        };
        Self { context }
    }

    pub fn context(&self) -> &str {
        self.context.trim_end()
    }

    pub fn record(&self, message: &str) {
        info!("{}{}", self.context, message);
    }

    pub fn warn(&self, message: &str) {
        warn!("{}{}", self.context, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_context_names_file_and_serial() {
        let path = Path::new("/data/D2J2124_240301_1000_0.pak");
        assert_eq!(
            LogManager::for_scan(path, None).context(),
            "[D2J2124_240301_1000_0.pak]"
        );
        assert_eq!(
            LogManager::for_scan(path, Some("D2J2124")).context(),
            "[D2J2124_240301_1000_0.pak D2J2124]"
        );
    }
}
