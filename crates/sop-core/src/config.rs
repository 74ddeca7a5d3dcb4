use crate::baseline::RestPolicy;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Panel configuration, read from a TOML file. Every field has a default so
/// an absent file (the common case on lab machines) yields a working config.
#[derive(Debug, Clone, Deserialize)]
pub struct PanelConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_s")]
    pub request_timeout_s: u64,
    /// Initial countdown duration for the timed tests, in seconds.
    #[serde(default = "default_countdown_s")]
    pub countdown_s: u32,
    #[serde(default)]
    pub rest: RestPolicy,
}

fn default_base_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_timeout_s() -> u64 {
    10
}

fn default_countdown_s() -> u32 {
    300
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_s: default_timeout_s(),
            countdown_s: default_countdown_s(),
            rest: RestPolicy::default(),
        }
    }
}

impl PanelConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn missing_file_yields_defaults() {
        let config = PanelConfig::load(Path::new("/nonexistent/sop.toml")).unwrap();
        assert_eq!(config.base_url, "http://127.0.0.1:5000");
        assert_eq!(config.request_timeout_s, 10);
        assert_eq!(config.countdown_s, 300);
        assert_eq!(config.rest.tie_min, 5);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "base_url = \"http://10.0.0.7:5000\"").unwrap();
        writeln!(file, "[rest]").unwrap();
        writeln!(file, "live_dominant_min = 10").unwrap();
        let config = PanelConfig::load(file.path()).unwrap();
        assert_eq!(config.base_url, "http://10.0.0.7:5000");
        assert_eq!(config.rest.live_dominant_min, 10);
        assert_eq!(config.rest.baseline_dominant_min, 3);
        assert_eq!(config.request_timeout_s, 10);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "base_url = [not toml").unwrap();
        assert!(PanelConfig::load(file.path()).is_err());
    }
}
