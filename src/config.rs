//! Configuration management for repoguide
//!
//! Settings are loaded from environment variables with defaults.
//!
//! # Environment Variables
//!
//! - `REPOGUIDE_LOG_LEVEL`: Logging level - default: "info"
//! - `REPOGUIDE_READ_TIMEOUT`: Per-manifest read timeout in seconds - default: "10"
//! - `REPOGUIDE_LIST_TIMEOUT`: Repository listing timeout in seconds - default: "30"
//! - `REPOGUIDE_MAX_MANIFEST_SIZE`: Largest manifest read, in bytes - default: "524288"
//! - `REPOGUIDE_MAX_CONCURRENT_READS`: Concurrent manifest reads - default: "8"
//! - `REPOGUIDE_MIN_ENV_CONFIDENCE`: Confidence needed for an environment setup step - default: "50"
//! - `REPOGUIDE_CACHE_ENABLED`: Enable the guide cache (true|false) - default: "true"
//! - `REPOGUIDE_CACHE_DIR`: Cache directory - default: user cache dir + "repoguide"
//! - `REPOGUIDE_GITHUB_API_URL`: GitHub REST endpoint - default: "https://api.github.com"
//!
//! # Example
//!
//! ```no_run
//! use repoguide::GuideConfig;
//!
//! let config = GuideConfig::from_env().expect("invalid environment");
//! config.validate().expect("invalid configuration");
//! println!("{}", config);
//! ```

use crate::commands::SynthesizerConfig;
use crate::signals::ExtractorConfig;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_READ_TIMEOUT_SECS: u64 = 10;
const DEFAULT_LIST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_MANIFEST_BYTES: u64 = 512 * 1024;
const DEFAULT_MAX_CONCURRENT_READS: usize = 8;
const DEFAULT_MIN_ENV_CONFIDENCE: u32 = 50;
const DEFAULT_CACHE_ENABLED: bool = true;
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("Failed to parse {field}: {error}")]
    ParseError { field: String, error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuideConfig {
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    pub read_timeout_secs: u64,
    pub list_timeout_secs: u64,
    pub max_manifest_bytes: u64,
    pub max_concurrent_reads: usize,
    pub min_env_confidence: u32,
    pub cache_enabled: bool,
    pub cache_dir: PathBuf,
    pub github_api_url: String,
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(env::temp_dir)
        .join("repoguide")
}

/// Reads and parses a variable; unset or empty is `Ok(None)`.
fn env_parse<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::ParseError {
                field: key.to_string(),
                error: format!("'{}': {}", raw, e),
            }),
        _ => Ok(None),
    }
}

impl GuideConfig {
    /// Loads from `REPOGUIDE_*` variables. Unparsable values are errors.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            log_level: env_parse::<String>("REPOGUIDE_LOG_LEVEL")?
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
                .to_lowercase(),
            read_timeout_secs: env_parse("REPOGUIDE_READ_TIMEOUT")?
                .unwrap_or(DEFAULT_READ_TIMEOUT_SECS),
            list_timeout_secs: env_parse("REPOGUIDE_LIST_TIMEOUT")?
                .unwrap_or(DEFAULT_LIST_TIMEOUT_SECS),
            max_manifest_bytes: env_parse("REPOGUIDE_MAX_MANIFEST_SIZE")?
                .unwrap_or(DEFAULT_MAX_MANIFEST_BYTES),
            max_concurrent_reads: env_parse("REPOGUIDE_MAX_CONCURRENT_READS")?
                .unwrap_or(DEFAULT_MAX_CONCURRENT_READS),
            min_env_confidence: env_parse("REPOGUIDE_MIN_ENV_CONFIDENCE")?
                .unwrap_or(DEFAULT_MIN_ENV_CONFIDENCE),
            cache_enabled: env_parse("REPOGUIDE_CACHE_ENABLED")?.unwrap_or(DEFAULT_CACHE_ENABLED),
            cache_dir: env_parse::<PathBuf>("REPOGUIDE_CACHE_DIR")?
                .unwrap_or_else(default_cache_dir),
            github_api_url: env_parse::<String>("REPOGUIDE_GITHUB_API_URL")?
                .unwrap_or_else(|| DEFAULT_GITHUB_API_URL.to_string()),
        })
    }

    /// Built-in defaults, ignoring the environment.
    pub fn builtin() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            read_timeout_secs: DEFAULT_READ_TIMEOUT_SECS,
            list_timeout_secs: DEFAULT_LIST_TIMEOUT_SECS,
            max_manifest_bytes: DEFAULT_MAX_MANIFEST_BYTES,
            max_concurrent_reads: DEFAULT_MAX_CONCURRENT_READS,
            min_env_confidence: DEFAULT_MIN_ENV_CONFIDENCE,
            cache_enabled: DEFAULT_CACHE_ENABLED,
            cache_dir: default_cache_dir(),
            github_api_url: DEFAULT_GITHUB_API_URL.to_string(),
        }
    }

    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` naming the first value out of range
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn check<T: PartialOrd + fmt::Display>(
            name: &str,
            value: T,
            min: T,
            max: T,
        ) -> Result<(), ConfigError> {
            if value < min || value > max {
                return Err(ConfigError::ValidationFailed(format!(
                    "{} must be between {} and {}, got {}",
                    name, min, max, value
                )));
            }
            Ok(())
        }

        check("Read timeout (seconds)", self.read_timeout_secs, 1, 300)?;
        check("List timeout (seconds)", self.list_timeout_secs, 1, 600)?;
        check("Max manifest size (bytes)", self.max_manifest_bytes, 1024, 10_485_760)?;
        check("Max concurrent reads", self.max_concurrent_reads, 1, 64)?;
        check("Min env confidence", self.min_env_confidence, 0, 200)?;

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        if !(self.github_api_url.starts_with("http://") || self.github_api_url.starts_with("https://")) {
            return Err(ConfigError::ValidationFailed(format!(
                "GitHub API URL must be http(s): {}",
                self.github_api_url
            )));
        }

        Ok(())
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn list_timeout(&self) -> Duration {
        Duration::from_secs(self.list_timeout_secs)
    }

    pub fn extractor_config(&self) -> ExtractorConfig {
        ExtractorConfig {
            read_timeout: self.read_timeout(),
            max_manifest_bytes: self.max_manifest_bytes,
            max_concurrent_reads: self.max_concurrent_reads,
        }
    }

    pub fn synthesizer_config(&self) -> SynthesizerConfig {
        SynthesizerConfig {
            min_env_confidence: self.min_env_confidence,
        }
    }

    /// Converts configuration to a display map for output formatting
    pub fn to_display_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();

        map.insert("log_level".to_string(), self.log_level.clone());
        map.insert(
            "read_timeout_secs".to_string(),
            self.read_timeout_secs.to_string(),
        );
        map.insert(
            "list_timeout_secs".to_string(),
            self.list_timeout_secs.to_string(),
        );
        map.insert(
            "max_manifest_bytes".to_string(),
            self.max_manifest_bytes.to_string(),
        );
        map.insert(
            "max_concurrent_reads".to_string(),
            self.max_concurrent_reads.to_string(),
        );
        map.insert(
            "min_env_confidence".to_string(),
            self.min_env_confidence.to_string(),
        );
        map.insert("cache_enabled".to_string(), self.cache_enabled.to_string());
        map.insert("cache_dir".to_string(), self.cache_dir.display().to_string());
        map.insert("github_api_url".to_string(), self.github_api_url.clone());

        map
    }
}

impl Default for GuideConfig {
    /// Loads from the environment, falling back to built-in defaults when a variable
    /// does not parse.
    fn default() -> Self {
        Self::from_env().unwrap_or_else(|_| Self::builtin())
    }
}

impl fmt::Display for GuideConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Repoguide Configuration:")?;
        writeln!(f, "  Log Level: {}", self.log_level)?;
        writeln!(f, "  Read Timeout: {}s", self.read_timeout_secs)?;
        writeln!(f, "  List Timeout: {}s", self.list_timeout_secs)?;
        writeln!(f, "  Max Manifest Size: {} bytes", self.max_manifest_bytes)?;
        writeln!(f, "  Max Concurrent Reads: {}", self.max_concurrent_reads)?;
        writeln!(f, "  Min Env Confidence: {}", self.min_env_confidence)?;
        writeln!(f, "  Cache Enabled: {}", self.cache_enabled)?;
        writeln!(f, "  Cache Dir: {}", self.cache_dir.display())?;
        writeln!(f, "  GitHub API URL: {}", self.github_api_url)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    /// Helper to temporarily set environment variables for testing
    struct EnvGuard {
        key: String,
        old_value: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &str, value: &str) -> Self {
            let old_value = env::var(key).ok();
            env::set_var(key, value);
            Self {
                key: key.to_string(),
                old_value,
            }
        }

        fn unset(key: &str) -> Self {
            let old_value = env::var(key).ok();
            env::remove_var(key);
            Self {
                key: key.to_string(),
                old_value,
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.old_value {
                Some(v) => env::set_var(&self.key, v),
                None => env::remove_var(&self.key),
            }
        }
    }

    const ALL_VARS: [&str; 9] = [
        "REPOGUIDE_LOG_LEVEL",
        "REPOGUIDE_READ_TIMEOUT",
        "REPOGUIDE_LIST_TIMEOUT",
        "REPOGUIDE_MAX_MANIFEST_SIZE",
        "REPOGUIDE_MAX_CONCURRENT_READS",
        "REPOGUIDE_MIN_ENV_CONFIDENCE",
        "REPOGUIDE_CACHE_ENABLED",
        "REPOGUIDE_CACHE_DIR",
        "REPOGUIDE_GITHUB_API_URL",
    ];

    fn clear_all() -> Vec<EnvGuard> {
        ALL_VARS.iter().map(|k| EnvGuard::unset(k)).collect()
    }

    #[test]
    #[serial]
    fn test_default_configuration() {
        let _guards = clear_all();

        let config = GuideConfig::from_env().unwrap();

        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.read_timeout_secs, DEFAULT_READ_TIMEOUT_SECS);
        assert_eq!(config.list_timeout_secs, DEFAULT_LIST_TIMEOUT_SECS);
        assert_eq!(config.max_manifest_bytes, DEFAULT_MAX_MANIFEST_BYTES);
        assert_eq!(config.max_concurrent_reads, DEFAULT_MAX_CONCURRENT_READS);
        assert_eq!(config.min_env_confidence, DEFAULT_MIN_ENV_CONFIDENCE);
        assert!(config.cache_enabled);
        assert!(config.cache_dir.ends_with("repoguide"));
        assert_eq!(config.github_api_url, DEFAULT_GITHUB_API_URL);
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_environment_variable_parsing() {
        let _clear = clear_all();
        let _guards = vec![
            EnvGuard::set("REPOGUIDE_LOG_LEVEL", "DEBUG"),
            EnvGuard::set("REPOGUIDE_READ_TIMEOUT", "3"),
            EnvGuard::set("REPOGUIDE_LIST_TIMEOUT", "90"),
            EnvGuard::set("REPOGUIDE_MAX_MANIFEST_SIZE", "2048"),
            EnvGuard::set("REPOGUIDE_MAX_CONCURRENT_READS", "2"),
            EnvGuard::set("REPOGUIDE_MIN_ENV_CONFIDENCE", "65"),
            EnvGuard::set("REPOGUIDE_CACHE_ENABLED", "false"),
            EnvGuard::set("REPOGUIDE_CACHE_DIR", "/tmp/repoguide-test"),
            EnvGuard::set("REPOGUIDE_GITHUB_API_URL", "http://localhost:9999"),
        ];

        let config = GuideConfig::from_env().unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.read_timeout(), Duration::from_secs(3));
        assert_eq!(config.list_timeout(), Duration::from_secs(90));
        assert_eq!(config.max_manifest_bytes, 2048);
        assert_eq!(config.max_concurrent_reads, 2);
        assert_eq!(config.min_env_confidence, 65);
        assert!(!config.cache_enabled);
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/repoguide-test"));
        assert_eq!(config.github_api_url, "http://localhost:9999");

        let extractor = config.extractor_config();
        assert_eq!(extractor.max_concurrent_reads, 2);
        assert_eq!(config.synthesizer_config().min_env_confidence, 65);
    }

    #[test]
    #[serial]
    fn test_unparsable_value_is_parse_error() {
        let _clear = clear_all();
        let _guard = EnvGuard::set("REPOGUIDE_READ_TIMEOUT", "soon");

        let err = GuideConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { ref field, .. } if field == "REPOGUIDE_READ_TIMEOUT"));

        let lenient = GuideConfig::default();
        assert_eq!(lenient.read_timeout_secs, DEFAULT_READ_TIMEOUT_SECS);
    }

    #[test]
    fn test_validation_ranges() {
        let mut config = GuideConfig::builtin();
        config.read_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = GuideConfig::builtin();
        config.max_concurrent_reads = 65;
        assert!(config.validate().is_err());

        let mut config = GuideConfig::builtin();
        config.max_manifest_bytes = 512;
        assert!(config.validate().is_err());

        let mut config = GuideConfig::builtin();
        config.min_env_confidence = 201;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_invalid_log_level() {
        let mut config = GuideConfig::builtin();
        config.log_level = "loud".to_string();

        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::ValidationFailed(_))));
    }

    #[test]
    fn test_validation_invalid_api_url() {
        let mut config = GuideConfig::builtin();
        config.github_api_url = "api.github.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_display_map() {
        let map = GuideConfig::builtin().to_display_map();
        assert_eq!(map.len(), 9);
        assert_eq!(map.get("read_timeout_secs").map(String::as_str), Some("10"));
    }

    #[test]
    fn test_config_display() {
        let display = format!("{}", GuideConfig::builtin());
        assert!(display.contains("Repoguide Configuration:"));
        assert!(display.contains("Max Concurrent Reads: 8"));
    }
}
