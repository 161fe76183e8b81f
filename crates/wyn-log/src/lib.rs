//! Wyn Log -- Bounded structured log ingestion with context enrichment.
//!
//! This crate is the foundation of the Wyn diagnostics stack. It provides the
//! ingestion side of the pipeline: ordered severity levels, typed payloads,
//! a fixed-capacity ring buffer with oldest-first eviction, per-level
//! sampling, and a registry of context providers whose state is attached to
//! every entry at ingestion time.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use wyn_log::prelude::*;
//!
//! let registry = Arc::new(ContextRegistry::new());
//! let clock = Arc::new(ManualClock::new(0));
//! let logger = Logger::with_registry(LoggerConfig::default(), clock, registry.clone());
//!
//! registry.set_frame(1, 16.6);
//! logger.warn(
//!     "INPUT_GAMEPAD_DISCONNECTED",
//!     Payload::new().subsystem("input").hint("reconnect the controller"),
//! );
//!
//! let entry = &logger.entries()[0];
//! assert_eq!(entry.level, LogLevel::Warn);
//! assert_eq!(entry.frame(), Some(1));
//! ```

#![deny(unsafe_code)]

pub mod buffer;
pub mod clock;
pub mod context;
pub mod entry;
pub mod level;
pub mod logger;
pub mod sampling;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced while configuring the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// A level name could not be parsed.
    #[error("unknown log level '{0}' (expected one of DEV, INFO, WARN, ERROR, FATAL)")]
    UnknownLevel(String),

    /// A configuration value is out of range.
    #[error("invalid logger configuration: {0}")]
    InvalidConfig(String),
}

/// Failure to capture one section of diagnostic state.
///
/// Captures are best-effort: a `CaptureError` marks one provider or one
/// crash-dump section as unavailable and never aborts the surrounding
/// operation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CaptureError {
    /// The state source does not exist right now (e.g. no player spawned).
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// The host does not expose this information.
    #[error("unsupported on this host: {0}")]
    Unsupported(String),

    /// Reading the state failed.
    #[error("capture of '{section}' failed: {details}")]
    Failed {
        section: String,
        details: String,
    },

    /// Reading the state panicked.
    #[error("capture of '{section}' panicked: {message}")]
    Panicked {
        section: String,
        message: String,
    },
}

impl CaptureError {
    /// Short machine-readable kind (`"unavailable"`, `"panicked"`, ...).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "unavailable",
            Self::Unsupported(_) => "unsupported",
            Self::Failed { .. } => "failed",
            Self::Panicked { .. } => "panicked",
        }
    }
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::buffer::{PushReceipt, RingBuffer};
    pub use crate::clock::{Clock, ManualClock, MonotonicClock};
    pub use crate::context::{
        ContextProvider, ContextRegistry, ContextSnapshot, FrameInfo, ProviderSnapshot,
    };
    pub use crate::entry::{ErrorDetail, LogEntry, Payload, SharedEntry};
    pub use crate::level::LogLevel;
    pub use crate::logger::{LogFilter, LogOutcome, LogStats, Logger, LoggerConfig};
    pub use crate::sampling::{Sampler, SamplingPolicy};
    pub use crate::{CaptureError, LogError};
}
