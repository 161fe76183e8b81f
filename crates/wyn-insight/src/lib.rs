//! Wyn Insight -- Analysis, querying and export over ingested log entries.
//!
//! Everything in this crate is a derivation over a slice of
//! [`SharedEntry`](wyn_log::entry::SharedEntry) values taken from a
//! [`Logger`](wyn_log::logger::Logger). Nothing here mutates the buffer or
//! caches results between calls, apart from the pattern detector's verdict
//! history.
//!
//! - [`patterns`]: repeating errors, cascades and a severity verdict
//! - [`analyzer`]: statistics, causal candidates, subsystem health, trends
//!   and recommendations
//! - [`query`]: fluent filter/sort/limit
//! - [`export`]: JSON, markdown, CSV, compact, summary and console output
//! - [`suggestions`]: curated remediation hints keyed by event code
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use wyn_insight::prelude::*;
//! use wyn_log::prelude::*;
//!
//! let logger = Logger::new(LoggerConfig::default(), Arc::new(ManualClock::new(0)));
//! for _ in 0..3 {
//!     logger.error("ASSET_LOAD_FAILED", Payload::new().subsystem("asset"));
//! }
//! let entries = logger.entries();
//!
//! let analysis = PatternDetector::default().analyze(&entries);
//! assert_eq!(analysis.repeating_errors[0].code, "ASSET_LOAD_FAILED");
//!
//! let health = LogAnalyzer::default().subsystem_health(&entries, "asset", 0, 60_000);
//! assert_eq!(health.status, HealthStatus::Critical);
//!
//! let hint = SuggestionBook::new().get("ASSET_LOAD_FAILED");
//! assert_eq!(hint.confidence, Confidence::High);
//! ```

#![deny(unsafe_code)]

pub mod analyzer;
pub mod export;
pub mod patterns;
pub mod query;
pub mod suggestions;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced while rendering analysis output.
#[derive(Debug, thiserror::Error)]
pub enum InsightError {
    /// JSON serialisation failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An export format name could not be parsed.
    #[error("unknown export format '{0}' (expected json, markdown, csv, compact, summary or console)")]
    UnknownFormat(String),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::analyzer::{
        AnalysisReport, AnalyzerConfig, CausalLink, HealthStatus, LogAnalyzer, Priority,
        Recommendation, Statistics, SubsystemHealth, Trend, TrendReport,
    };
    pub use crate::export::{export, ExportFormat, ExportOptions};
    pub use crate::patterns::{
        Cascade, EntrySample, PatternAnalysis, PatternConfig, PatternDetector, PatternKind,
        RepeatingError, SeverityLevel,
    };
    pub use crate::query::{LogQuery, QueryFilters, SortField, SortOrder, TimeRange};
    pub use crate::suggestions::{Confidence, SuggestionBook, SuggestionEntry, SuggestionResult};
    pub use crate::InsightError;
}
