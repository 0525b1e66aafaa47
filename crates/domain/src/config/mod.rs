mod gateway;
mod observability;
mod reconnect;
mod voice;

pub use gateway::*;
pub use observability::*;
pub use reconnect::*;
pub use voice::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Parse a config from TOML text.  Missing sections take their defaults.
    pub fn from_toml_str(raw: &str) -> crate::Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Read `path` if it exists, otherwise return the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.gateway.shard_count == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "gateway.shard_count".into(),
                message: "shard_count must be greater than 0".into(),
            });
        }

        if self.voice.join_timeout_secs == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "voice.join_timeout_secs".into(),
                message: "join timeout must be greater than 0".into(),
            });
        }

        if self.reconnect.max_attempts == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "reconnect.max_attempts".into(),
                message: "shards are abandoned after the first failed reconnect".into(),
            });
        }

        if self.reconnect.backoff_factor < 1.0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "reconnect.backoff_factor".into(),
                message: "a factor below 1.0 shrinks the delay between attempts".into(),
            });
        }

        if self.reconnect.max_delay_ms < self.reconnect.initial_delay_ms {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "reconnect.max_delay_ms".into(),
                message: "max_delay_ms is lower than initial_delay_ms".into(),
            });
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_empty());
    }

    #[test]
    fn zero_shards_is_an_error() {
        let mut cfg = Config::default();
        cfg.gateway.shard_count = 0;
        let issues = cfg.validate();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, ConfigSeverity::Error);
        assert_eq!(issues[0].field, "gateway.shard_count");
    }

    #[test]
    fn inverted_delays_warn() {
        let mut cfg = Config::default();
        cfg.reconnect.initial_delay_ms = 10_000;
        cfg.reconnect.max_delay_ms = 1_000;
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|i| i.field == "reconnect.max_delay_ms" && i.severity == ConfigSeverity::Warning));
    }

    #[test]
    fn display_includes_severity_tag() {
        let err = ConfigError {
            severity: ConfigSeverity::Warning,
            field: "a.b".into(),
            message: "careful".into(),
        };
        assert_eq!(err.to_string(), "[WARN] a.b: careful");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = Config::load_or_default("/nonexistent/voxlink.toml").unwrap();
        assert_eq!(cfg.gateway.shard_count, 1);
    }
}
