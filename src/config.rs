use anyhow::Result;
use regex::Regex;
use serde::Deserialize;
use std::path::PathBuf;

use crate::history::DEFAULT_CAPACITY;

pub const DEFAULT_KEY: &str = "histnav";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub capacity: usize,
    pub storage_dir: Option<PathBuf>,
    pub key: String,
    /// Locations matching any of these are never recorded.
    pub drop_patterns: Vec<String>,
    pub keys: KeyConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            storage_dir: None,
            key: DEFAULT_KEY.to_string(),
            drop_patterns: Vec::new(),
            keys: KeyConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct KeyConfig {
    pub quit: Vec<String>,
    pub select_up: Vec<String>,
    pub select_down: Vec<String>,
    pub open_selected: Vec<String>,
    pub back: Vec<String>,
    pub forward: Vec<String>,
    pub first: Vec<String>,
    pub last: Vec<String>,
    pub open_location: Vec<String>,
    pub find: Vec<String>,
    pub save: Vec<String>,
    pub restore: Vec<String>,
    pub remove: Vec<String>,
    pub help: Vec<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_toml_str(&content)
        } else {
            Ok(Self::default_config())
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content)?;
        config.apply_defaults();
        Ok(config)
    }

    fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("histnav")
            .join("config.toml")
    }

    fn default_config() -> Self {
        let mut config = Config::default();
        config.apply_defaults();
        config
    }

    fn apply_defaults(&mut self) {
        if self.key.trim().is_empty() {
            self.key = DEFAULT_KEY.to_string();
        }

        self.keys.apply_defaults();
    }

    pub fn storage_dir(&self) -> PathBuf {
        self.storage_dir
            .clone()
            .unwrap_or_else(|| Self::data_dir().join("storage"))
    }

    pub fn data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("histnav")
    }

    pub fn drop_filter(&self) -> DropFilter {
        DropFilter::new(&self.drop_patterns)
    }
}

/// Compiled `drop_patterns`.
#[derive(Debug, Clone, Default)]
pub struct DropFilter {
    patterns: Vec<Regex>,
}

impl DropFilter {
    pub fn new(patterns: &[String]) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|p| match Regex::new(p) {
                Ok(re) => Some(re),
                Err(e) => {
                    log::warn!("Skipping invalid drop pattern '{}': {}", p, e);
                    None
                }
            })
            .collect();
        Self { patterns }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn matches(&self, location: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(location))
    }
}

impl KeyConfig {
    fn apply_defaults(&mut self) {
        if self.quit.is_empty() {
            self.quit = vec!["q".to_string(), "Escape".to_string()];
        }
        if self.select_up.is_empty() {
            self.select_up = vec!["k".to_string(), "Up".to_string()];
        }
        if self.select_down.is_empty() {
            self.select_down = vec!["j".to_string(), "Down".to_string()];
        }
        if self.open_selected.is_empty() {
            self.open_selected = vec!["Enter".to_string()];
        }
        if self.back.is_empty() {
            self.back = vec!["h".to_string(), "Left".to_string(), "Backspace".to_string()];
        }
        if self.forward.is_empty() {
            self.forward = vec!["l".to_string(), "Right".to_string()];
        }
        if self.first.is_empty() {
            self.first = vec!["gg".to_string(), "Home".to_string()];
        }
        if self.last.is_empty() {
            self.last = vec!["G".to_string(), "End".to_string()];
        }
        if self.open_location.is_empty() {
            self.open_location = vec!["o".to_string()];
        }
        if self.find.is_empty() {
            self.find = vec!["f".to_string(), "/".to_string()];
        }
        if self.save.is_empty() {
            self.save = vec!["s".to_string()];
        }
        if self.restore.is_empty() {
            self.restore = vec!["r".to_string()];
        }
        if self.remove.is_empty() {
            self.remove = vec!["x".to_string()];
        }
        if self.help.is_empty() {
            self.help = vec!["?".to_string()];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gets_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.capacity, DEFAULT_CAPACITY);
        assert_eq!(config.key, DEFAULT_KEY);
        assert!(config.storage_dir.is_none());
        assert_eq!(config.keys.quit, vec!["q", "Escape"]);
        assert_eq!(config.keys.first, vec!["gg", "Home"]);
        assert!(config.drop_filter().is_empty());
    }

    #[test]
    fn file_values_override_defaults() {
        let config = Config::from_toml_str(
            r#"
capacity = 25
key = "preview"
storage_dir = "/tmp/histnav-test"
drop_patterns = ["^https?://(www\\.)?elsewhere\\.test"]

[keys]
back = ["b"]
"#,
        )
        .unwrap();
        assert_eq!(config.capacity, 25);
        assert_eq!(config.key, "preview");
        assert_eq!(config.storage_dir(), PathBuf::from("/tmp/histnav-test"));
        assert_eq!(config.keys.back, vec!["b"]);
        // Unset bindings still get defaults
        assert_eq!(config.keys.forward, vec!["l", "Right"]);
    }

    #[test]
    fn blank_key_falls_back_to_default() {
        let config = Config::from_toml_str("key = \"  \"").unwrap();
        assert_eq!(config.key, DEFAULT_KEY);
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(Config::from_toml_str("capacity = \"ten\"").is_err());
    }

    #[test]
    fn drop_filter_matches_patterns() {
        let filter = DropFilter::new(&[
            r"^https?://elsewhere\.test".to_string(),
            r"\.pdf$".to_string(),
        ]);
        assert!(filter.matches("https://elsewhere.test/page"));
        assert!(filter.matches("/files/report.pdf"));
        assert!(!filter.matches("/blog/hello-world"));
    }

    #[test]
    fn drop_filter_skips_invalid_patterns() {
        let filter = DropFilter::new(&["(unclosed".to_string(), "^/admin".to_string()]);
        assert!(!filter.is_empty());
        assert!(filter.matches("/admin/settings"));
        assert!(!filter.matches("(unclosed"));
    }
}
