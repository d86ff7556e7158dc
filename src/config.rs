//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$EMLNORM_CONFIG` (environment variable)
//! 2. `~/.config/emlnorm/config.toml` (Linux/macOS)
//!    `%APPDATA%\emlnorm\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::parser::normalize::DEFAULT_MAX_DEPTH;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Normalization settings.
    pub parse: ParseConfig,
    /// JSON output settings.
    pub output: OutputConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override the directory the log file is written to.
    pub cache_dir: Option<PathBuf>,
}

/// Normalization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseConfig {
    /// How many levels of attached messages are normalized.
    pub max_depth: usize,
    /// Account id used when none is given on the command line.
    pub default_account: String,
    /// Fill the flattened attachment lists before output.
    pub flatten: bool,
}

/// JSON output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Drop `null` and `""` values from the output.
    pub prune_empty: bool,
    /// Indent JSON documents.
    pub pretty: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            cache_dir: None,
        }
    }
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            default_account: String::new(),
            flatten: true,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            prune_empty: true,
            pretty: true,
        }
    }
}

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    match config_file_path() {
        Some(path) if path.exists() => load_config_from(&path),
        _ => Config::default(),
    }
}

/// Load configuration from a specific file, falling back to defaults.
pub fn load_config_from(path: &Path) -> Config {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to read config file, using defaults"
            );
            return Config::default();
        }
    };

    match toml::from_str::<Config>(&contents) {
        Ok(cfg) => {
            tracing::info!(path = %path.display(), "Loaded config");
            cfg
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to parse config, using defaults"
            );
            Config::default()
        }
    }
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("EMLNORM_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("emlnorm").join("config.toml"))
}

/// Return the cache directory (log file location).
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("emlnorm")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("emlnorm.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.general.log_level, "warn");
        assert_eq!(cfg.parse.max_depth, 16);
        assert_eq!(cfg.parse.default_account, "");
        assert!(cfg.parse.flatten);
        assert!(cfg.output.prune_empty);
        assert!(cfg.output.pretty);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[parse]
max_depth = 3

[output]
pretty = false
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert_eq!(cfg.parse.max_depth, 3);
        assert!(!cfg.output.pretty);
        assert!(cfg.parse.flatten);
        assert!(cfg.output.prune_empty);
        assert_eq!(cfg.general.log_level, "warn");
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[parse]\ndefault_account = \"inbox\"\n").unwrap();
        let cfg = load_config_from(&path);
        assert_eq!(cfg.parse.default_account, "inbox");
    }

    #[test]
    fn test_invalid_config_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[parse\nmax_depth = ").unwrap();
        let cfg = load_config_from(&path);
        assert_eq!(cfg.parse.max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn test_cache_dir_override() {
        let mut cfg = Config::default();
        cfg.general.cache_dir = Some(PathBuf::from("/tmp/emlnorm-test"));
        assert_eq!(
            log_file_path(&cfg),
            PathBuf::from("/tmp/emlnorm-test/emlnorm.log")
        );
    }
}
