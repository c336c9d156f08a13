//! Engine configuration
//!
//! Every section has working defaults so an empty (or absent) TOML file is a
//! valid configuration. CLI flags are layered on top by the binary.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming the config file path
pub const CONFIG_PATH_ENV: &str = "DOOMTAX_CONFIG";

/// Default config file name, resolved against the working directory
pub const DEFAULT_CONFIG_FILE: &str = "doomtax.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub classifier: ClassifierConfig,
    pub heuristics: HeuristicsConfig,
    pub session: SessionConfig,
    pub server: ServerConfig,
    pub transport: TransportConfig,
}

/// Sliding-window hysteresis settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Trailing window length in seconds
    pub window_seconds: f64,
    /// Positive fraction at or above which the state turns on
    pub enter_fraction: f64,
    /// Positive fraction at or below which the state turns off
    pub exit_fraction: f64,
    /// Floor for the fraction denominator (expected samples per full window)
    pub min_samples: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            window_seconds: 3.0,
            enter_fraction: 0.60,
            exit_fraction: 0.30,
            min_samples: 1,
        }
    }
}

impl ClassifierConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.window_seconds.is_finite() && self.window_seconds > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "classifier.window_seconds must be positive, got {}",
                self.window_seconds
            )));
        }
        if !(0.0..=1.0).contains(&self.exit_fraction)
            || !(0.0..=1.0).contains(&self.enter_fraction)
            || self.exit_fraction >= self.enter_fraction
        {
            return Err(EngineError::InvalidConfig(format!(
                "classifier thresholds must satisfy 0 <= exit < enter <= 1, got exit={} enter={}",
                self.exit_fraction, self.enter_fraction
            )));
        }
        Ok(())
    }
}

/// Geometric heuristic thresholds (normalized frame units)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicsConfig {
    /// Maximum shoulder-to-hip vertical gap that still counts as reclining
    pub reclined_threshold: f64,
    /// Maximum wrist-to-phone distance that counts as holding it
    pub holding_phone_threshold: f64,
    /// Detections below this confidence are not considered phones
    pub phone_min_confidence: f64,
}

impl Default for HeuristicsConfig {
    fn default() -> Self {
        Self {
            reclined_threshold: 0.2,
            holding_phone_threshold: 0.2,
            phone_min_confidence: 0.1,
        }
    }
}

impl HeuristicsConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        for (name, value) in [
            ("heuristics.reclined_threshold", self.reclined_threshold),
            ("heuristics.holding_phone_threshold", self.holding_phone_threshold),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(EngineError::InvalidConfig(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.phone_min_confidence) {
            return Err(EngineError::InvalidConfig(format!(
                "heuristics.phone_min_confidence must be within 0-1, got {}",
                self.phone_min_confidence
            )));
        }
        Ok(())
    }
}

/// Accounting and liveness settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Penalty charged per second of doomscrolling (USD)
    pub penalty_rate_per_second: f64,
    /// Gaps between active reports longer than this are not billed
    pub max_accrual_gap_seconds: f64,
    /// Detector is considered offline after this long without a report
    pub heartbeat_timeout_seconds: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            penalty_rate_per_second: 0.005,
            max_accrual_gap_seconds: 5.0,
            heartbeat_timeout_seconds: 10.0,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.penalty_rate_per_second.is_finite() && self.penalty_rate_per_second > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "session.penalty_rate_per_second must be positive, got {}",
                self.penalty_rate_per_second
            )));
        }
        if !(self.max_accrual_gap_seconds.is_finite() && self.max_accrual_gap_seconds > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "session.max_accrual_gap_seconds must be positive, got {}",
                self.max_accrual_gap_seconds
            )));
        }
        if !(self.heartbeat_timeout_seconds.is_finite() && self.heartbeat_timeout_seconds > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "session.heartbeat_timeout_seconds must be positive, got {}",
                self.heartbeat_timeout_seconds
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// How long browsers may cache CORS preflight responses
    pub cors_max_age_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_max_age_secs: 600,
        }
    }
}

/// Detector-side report delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Base URL of the accounting server
    pub server_url: String,
    /// Minimum spacing between reports of an unchanged state
    pub report_interval_seconds: f64,
    /// Per-request timeout; slow sends are dropped
    pub request_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8000".to_string(),
            report_interval_seconds: 1.0,
            request_timeout_ms: 500,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, EngineError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), EngineError> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Load from an explicit path, `$DOOMTAX_CONFIG`, or `./doomtax.toml`.
    ///
    /// Only an explicitly requested file has to exist; otherwise a missing file
    /// falls back to defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, EngineError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let path = std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        self.classifier.validate()?;
        self.heuristics.validate()?;
        self.session.validate()?;
        if !(self.transport.report_interval_seconds.is_finite()
            && self.transport.report_interval_seconds >= 0.0)
        {
            return Err(EngineError::InvalidConfig(format!(
                "transport.report_interval_seconds must be non-negative, got {}",
                self.transport.report_interval_seconds
            )));
        }
        // Active reports spaced wider than the gap would never be billed
        if self.transport.report_interval_seconds > self.session.max_accrual_gap_seconds {
            return Err(EngineError::InvalidConfig(format!(
                "transport.report_interval_seconds ({}) must not exceed session.max_accrual_gap_seconds ({})",
                self.transport.report_interval_seconds, self.session.max_accrual_gap_seconds
            )));
        }
        if self.transport.request_timeout_ms == 0 {
            return Err(EngineError::InvalidConfig(
                "transport.request_timeout_ms must be positive".to_string(),
            ));
        }
        if self.server.host.trim().is_empty() {
            return Err(EngineError::InvalidConfig(
                "server.host must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_file_yields_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = Config::from_toml(
            r#"
            [classifier]
            window_seconds = 1.0

            [session]
            penalty_rate_per_second = 0.25
            "#,
        )
        .unwrap();

        assert_eq!(config.classifier.window_seconds, 1.0);
        assert_eq!(config.classifier.enter_fraction, 0.60);
        assert_eq!(config.session.penalty_rate_per_second, 0.25);
        assert_eq!(config.session.heartbeat_timeout_seconds, 10.0);
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let result = Config::from_toml(
            r#"
            [classifier]
            enter_fraction = 0.3
            exit_fraction = 0.6
            "#,
        );
        assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn test_equal_thresholds_rejected() {
        let classifier = ClassifierConfig {
            enter_fraction: 0.5,
            exit_fraction: 0.5,
            ..ClassifierConfig::default()
        };
        assert!(classifier.validate().is_err());
    }

    #[test]
    fn test_non_positive_rate_rejected() {
        let session = SessionConfig {
            penalty_rate_per_second: 0.0,
            ..SessionConfig::default()
        };
        assert!(session.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doomtax.toml");

        let mut config = Config::default();
        config.server.port = 9100;
        config.heuristics.reclined_threshold = 0.15;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_resolve_explicit_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            Config::resolve(Some(&missing)),
            Err(EngineError::Io(_))
        ));
    }

    #[test]
    fn test_report_interval_beyond_accrual_gap_rejected() {
        let result = Config::from_toml(
            r#"
            [session]
            max_accrual_gap_seconds = 5.0

            [transport]
            report_interval_seconds = 6.0
            "#,
        );
        assert!(matches!(result, Err(EngineError::InvalidConfig(_))));

        let mut config = Config::default();
        config.transport.report_interval_seconds = config.session.max_accrual_gap_seconds;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_request_timeout_rejected() {
        let mut config = Config::default();
        config.transport.request_timeout_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_blank_host_rejected() {
        let mut config = Config::default();
        config.server.host = "  ".to_string();
        assert!(config.validate().is_err());
    }
}
