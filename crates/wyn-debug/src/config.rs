//! Aggregated configuration for the diagnostics stack.
//!
//! Every section has a `Default` impl and deserialises with
//! `#[serde(default)]`, so a JSON document only needs the keys it changes:
//!
//! ```
//! use wyn_debug::config::DebugConfig;
//!
//! let config = DebugConfig::from_json_str(r#"{ "logger": { "capacity": 500 } }"#).unwrap();
//! assert_eq!(config.logger.capacity, 500);
//! assert_eq!(config.crash.recent_log_count, 50);
//! ```

use serde::{Deserialize, Serialize};
use wyn_insight::analyzer::AnalyzerConfig;
use wyn_insight::patterns::PatternConfig;
use wyn_log::logger::LoggerConfig;
use wyn_log::LogError;

use crate::DebugError;

/// Crash dump tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrashDumpConfig {
    /// Most recent entries copied into each dump.
    pub recent_log_count: usize,
    /// Errors listed in the text summary.
    pub summary_error_count: usize,
}

impl Default for CrashDumpConfig {
    /// 50 recent entries, 5 errors in the summary.
    fn default() -> Self {
        Self {
            recent_log_count: 50,
            summary_error_count: 5,
        }
    }
}

/// Debug context tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Frames between periodic snapshots; 0 disables them.
    pub snapshot_interval_frames: u64,
    /// Periodic snapshots retained.
    pub snapshot_history: usize,
    /// Register the built-in player, physics and input providers.
    pub register_builtin_providers: bool,
}

impl Default for ContextConfig {
    /// Snapshot every 60 frames, keep 10, built-in providers on.
    fn default() -> Self {
        Self {
            snapshot_interval_frames: 60,
            snapshot_history: 10,
            register_builtin_providers: true,
        }
    }
}

/// Configuration for [`Diagnostics`](crate::Diagnostics).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Ingestion.
    pub logger: LoggerConfig,
    /// Pattern detection.
    pub patterns: PatternConfig,
    /// Statistics and health.
    pub analyzer: AnalyzerConfig,
    /// Crash dumps.
    pub crash: CrashDumpConfig,
    /// Frame driver and periodic snapshots.
    pub context: ContextConfig,
}

impl DebugConfig {
    /// Parse and validate a JSON document.
    ///
    /// # Errors
    ///
    /// [`DebugError::ConfigParse`] for malformed JSON and
    /// [`DebugError::Log`] for out-of-range values.
    pub fn from_json_str(json: &str) -> Result<Self, DebugError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges across all sections.
    ///
    /// # Errors
    ///
    /// [`DebugError::Log`] wrapping [`LogError::InvalidConfig`].
    pub fn validate(&self) -> Result<(), DebugError> {
        self.logger.validate()?;
        if self.patterns.repeat_threshold == 0 {
            return Err(invalid("patterns.repeat_threshold must be at least 1"));
        }
        if self.patterns.cascade_min_entries == 0 {
            return Err(invalid("patterns.cascade_min_entries must be at least 1"));
        }
        if self.analyzer.trend_bucket_ms == 0 {
            return Err(invalid("analyzer.trend_bucket_ms must be positive"));
        }
        if !(self.analyzer.trend_ratio.is_finite() && self.analyzer.trend_ratio >= 1.0) {
            return Err(invalid("analyzer.trend_ratio must be a finite value >= 1"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> DebugError {
    DebugError::Log(LogError::InvalidConfig(msg.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(DebugConfig::default().validate().is_ok());
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(DebugConfig::from_json_str("{}").unwrap(), DebugConfig::default());
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            DebugConfig::from_json_str("{ nope"),
            Err(DebugError::ConfigParse(_))
        ));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = DebugConfig::from_json_str(r#"{ "logger": { "capacity": 0 } }"#).unwrap_err();
        assert!(matches!(err, DebugError::Log(LogError::InvalidConfig(_))));
    }

    #[test]
    fn zero_threshold_is_rejected() {
        let mut config = DebugConfig::default();
        config.patterns.repeat_threshold = 0;
        assert!(config.validate().is_err());
    }
}
