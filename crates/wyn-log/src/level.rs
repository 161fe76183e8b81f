//! Ordered severity levels.
//!
//! Levels are totally ordered `Dev < Info < Warn < Error < Fatal`, which lets
//! filters and the sampling policy express thresholds with plain comparisons.
//! On the wire they are rendered in upper case (`"DEV"`, `"INFO"`, ...).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::LogError;

// ---------------------------------------------------------------------------
// LogLevel
// ---------------------------------------------------------------------------

/// Severity of a log entry.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    /// Developer chatter, usually sampled.
    #[default]
    Dev,
    /// Normal operational events.
    Info,
    /// Something unexpected that the game recovered from.
    Warn,
    /// A failure in one subsystem.
    Error,
    /// A failure the game cannot continue from.
    Fatal,
}

impl LogLevel {
    /// All levels in ascending severity.
    pub const ALL: [LogLevel; 5] = [
        LogLevel::Dev,
        LogLevel::Info,
        LogLevel::Warn,
        LogLevel::Error,
        LogLevel::Fatal,
    ];

    /// Upper-case name used in exports (`"ERROR"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dev => "DEV",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
        }
    }

    /// Returns `true` for `Error` and `Fatal`.
    pub fn is_error(self) -> bool {
        self >= Self::Error
    }

    /// Returns `true` for `Warn`, `Error` and `Fatal`.
    pub fn is_problem(self) -> bool {
        self >= Self::Warn
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = LogError;

    /// Case-insensitive. Accepts `debug` for `Dev` and `warning` for `Warn`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dev" | "debug" => Ok(Self::Dev),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            "fatal" => Ok(Self::Fatal),
            _ => Err(LogError::UnknownLevel(s.to_owned())),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
