//! Fluent log queries.
//!
//! A [`LogQuery`] accumulates filters and is executed against a slice of
//! entries: filter, then sort, then limit. Results are owned copies; unless
//! [`LogQuery::include_context`] is set, each copy's context is reduced to
//! its frame metadata to keep result sets small.
//!
//! ```
//! use std::sync::Arc;
//! use wyn_insight::query::LogQuery;
//! use wyn_log::prelude::*;
//!
//! let entries: Vec<SharedEntry> = vec![
//!     Arc::new(LogEntry::new(0, 10, LogLevel::Info, "SCENE_LOADED", Payload::new().subsystem("scene"), None)),
//!     Arc::new(LogEntry::new(1, 20, LogLevel::Error, "PHYSICS_UPDATE_ERROR", Payload::new().subsystem("physics"), None)),
//! ];
//!
//! let errors = LogQuery::new().errors().subsystem("physics").execute(&entries, 100);
//! assert_eq!(errors.len(), 1);
//! assert_eq!(errors[0].code, "PHYSICS_UPDATE_ERROR");
//! ```

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use wyn_log::entry::{LogEntry, SharedEntry};
use wyn_log::level::LogLevel;

/// Default maximum number of results.
pub const DEFAULT_LIMIT: usize = 100;

/// Field used to order results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    /// Ingestion timestamp, ties broken by sequence.
    #[default]
    Timestamp,
    /// Severity.
    Level,
    /// Subsystem name.
    Subsystem,
    /// Event code.
    Code,
}

/// Direction of the sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Smallest first.
    Asc,
    /// Largest first.
    #[default]
    Desc,
}

/// Time restriction of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeRange {
    /// Entries with `now - last <= timestamp <= now`.
    Last {
        /// Window length in milliseconds.
        last: u64,
    },
    /// Entries with `start <= timestamp <= end`.
    Between {
        /// Inclusive start.
        start: u64,
        /// Inclusive end.
        end: u64,
    },
}

// ---------------------------------------------------------------------------
// LogQuery
// ---------------------------------------------------------------------------

/// Fluent filter/sort/limit over log entries.
#[derive(Debug, Clone)]
pub struct LogQuery {
    levels: Option<BTreeSet<LogLevel>>,
    min_level: Option<LogLevel>,
    subsystems: Option<BTreeSet<String>>,
    codes: Option<BTreeSet<String>>,
    code_prefix: Option<String>,
    time_range: Option<TimeRange>,
    limit: usize,
    include_context: bool,
    sort_field: SortField,
    sort_order: SortOrder,
}

impl Default for LogQuery {
    fn default() -> Self {
        Self {
            levels: None,
            min_level: None,
            subsystems: None,
            codes: None,
            code_prefix: None,
            time_range: None,
            limit: DEFAULT_LIMIT,
            include_context: false,
            sort_field: SortField::Timestamp,
            sort_order: SortOrder::Desc,
        }
    }
}

impl LogQuery {
    /// Query matching everything, newest first, at most 100 results.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a query from the serde-facing filter form.
    ///
    /// Unparsable levels are ignored rather than rejected.
    pub fn from_filters(filters: &QueryFilters) -> Self {
        let mut query = Self::new();
        if let Some(level) = filters.level.as_deref().and_then(|l| l.parse::<LogLevel>().ok()) {
            query = query.level(level);
        }
        if let Some(level) = filters.min_level.as_deref().and_then(|l| l.parse::<LogLevel>().ok()) {
            query = query.min_level(level);
        }
        if let Some(subsystem) = &filters.subsystem {
            query = query.subsystem(subsystem.clone());
        }
        if let Some(code) = &filters.code {
            query = query.code(code.clone());
        }
        query.time_range = filters.time_range;
        if let Some(limit) = filters.limit {
            query = query.limit(limit);
        }
        query.include_context(filters.include_context)
    }

    /// Add one accepted level.
    pub fn level(mut self, level: LogLevel) -> Self {
        self.levels.get_or_insert_with(BTreeSet::new).insert(level);
        self
    }

    /// Add several accepted levels.
    pub fn levels<I: IntoIterator<Item = LogLevel>>(mut self, levels: I) -> Self {
        self.levels.get_or_insert_with(BTreeSet::new).extend(levels);
        self
    }

    /// Only entries at or above `level`.
    pub fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = Some(level);
        self
    }

    /// `DEV` entries.
    pub fn dev(self) -> Self {
        self.level(LogLevel::Dev)
    }

    /// `INFO` entries.
    pub fn info(self) -> Self {
        self.level(LogLevel::Info)
    }

    /// `WARN` entries.
    pub fn warnings(self) -> Self {
        self.level(LogLevel::Warn)
    }

    /// `ERROR` and `FATAL` entries.
    pub fn errors(self) -> Self {
        self.levels([LogLevel::Error, LogLevel::Fatal])
    }

    /// `FATAL` entries.
    pub fn fatal(self) -> Self {
        self.level(LogLevel::Fatal)
    }

    /// Add one accepted subsystem.
    pub fn subsystem(mut self, subsystem: impl Into<String>) -> Self {
        self.subsystems
            .get_or_insert_with(BTreeSet::new)
            .insert(subsystem.into());
        self
    }

    /// Add one accepted code.
    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.codes.get_or_insert_with(BTreeSet::new).insert(code.into());
        self
    }

    /// Only codes starting with `prefix`.
    pub fn code_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.code_prefix = Some(prefix.into());
        self
    }

    /// Only entries from the last `ms` milliseconds before `now`.
    pub fn last(mut self, ms: u64) -> Self {
        self.time_range = Some(TimeRange::Last { last: ms });
        self
    }

    /// Only entries with `start <= timestamp <= end`.
    pub fn between(mut self, start: u64, end: u64) -> Self {
        self.time_range = Some(TimeRange::Between { start, end });
        self
    }

    /// Maximum number of results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Keep full context snapshots on the results.
    pub fn include_context(mut self, include: bool) -> Self {
        self.include_context = include;
        self
    }

    /// Result ordering.
    pub fn sort_by(mut self, field: SortField, order: SortOrder) -> Self {
        self.sort_field = field;
        self.sort_order = order;
        self
    }

    /// Whether `entry` passes every filter, evaluated at `now`.
    pub fn matches(&self, entry: &LogEntry, now: u64) -> bool {
        if let Some(levels) = &self.levels {
            if !levels.contains(&entry.level) {
                return false;
            }
        }
        if let Some(min) = self.min_level {
            if entry.level < min {
                return false;
            }
        }
        if let Some(subsystems) = &self.subsystems {
            if !subsystems.contains(&entry.subsystem) {
                return false;
            }
        }
        if let Some(codes) = &self.codes {
            if !codes.contains(&entry.code) {
                return false;
            }
        }
        if let Some(prefix) = &self.code_prefix {
            if !entry.code.starts_with(prefix.as_str()) {
                return false;
            }
        }
        match self.time_range {
            Some(TimeRange::Last { last }) => {
                let start = now.saturating_sub(last);
                entry.timestamp >= start && entry.timestamp <= now
            }
            Some(TimeRange::Between { start, end }) => {
                entry.timestamp >= start && entry.timestamp <= end
            }
            None => true,
        }
    }

    /// Filter, sort and limit.
    pub fn execute(&self, entries: &[SharedEntry], now: u64) -> Vec<LogEntry> {
        let mut matched = self.filtered(entries, now);
        sort_entries(&mut matched, self.sort_field, self.sort_order);
        matched.truncate(self.limit);
        matched.into_iter().map(|e| self.project(e)).collect()
    }

    /// Number of matching entries, ignoring the limit.
    pub fn count(&self, entries: &[SharedEntry], now: u64) -> usize {
        entries.iter().filter(|e| self.matches(e, now)).count()
    }

    /// Oldest matching entry.
    pub fn first(&self, entries: &[SharedEntry], now: u64) -> Option<LogEntry> {
        let mut matched = self.filtered(entries, now);
        sort_entries(&mut matched, SortField::Timestamp, SortOrder::Asc);
        matched.first().map(|e| self.project(e))
    }

    /// Newest matching entry.
    pub fn last_entry(&self, entries: &[SharedEntry], now: u64) -> Option<LogEntry> {
        let mut matched = self.filtered(entries, now);
        sort_entries(&mut matched, SortField::Timestamp, SortOrder::Asc);
        matched.last().map(|e| self.project(e))
    }

    fn filtered<'a>(&self, entries: &'a [SharedEntry], now: u64) -> Vec<&'a LogEntry> {
        entries
            .iter()
            .map(|e| &**e)
            .filter(|e| self.matches(e, now))
            .collect()
    }

    fn project(&self, entry: &LogEntry) -> LogEntry {
        if self.include_context {
            entry.clone()
        } else {
            entry.with_frame_only_context()
        }
    }
}

fn sort_entries(entries: &mut [&LogEntry], field: SortField, order: SortOrder) {
    entries.sort_by(|a, b| {
        let ordering = match field {
            SortField::Timestamp => a.timestamp.cmp(&b.timestamp),
            SortField::Level => a.level.cmp(&b.level),
            SortField::Subsystem => a.subsystem.cmp(&b.subsystem),
            SortField::Code => a.code.cmp(&b.code),
        }
        .then_with(|| a.sequence.cmp(&b.sequence));
        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}

// ---------------------------------------------------------------------------
// QueryFilters
// ---------------------------------------------------------------------------

/// Serde-facing query description.
///
/// Deserialisation is permissive field by field: unknown keys are ignored
/// and a value of the wrong shape for any field is dropped, leaving that
/// filter off while the rest of the request still applies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryFilters {
    /// Exact level name, case-insensitive.
    #[serde(deserialize_with = "lenient")]
    pub level: Option<String>,
    /// Minimum level name, case-insensitive.
    #[serde(deserialize_with = "lenient")]
    pub min_level: Option<String>,
    /// Exact subsystem.
    #[serde(deserialize_with = "lenient")]
    pub subsystem: Option<String>,
    /// Exact code.
    #[serde(deserialize_with = "lenient")]
    pub code: Option<String>,
    /// `{ "last": ms }` or `{ "start": ms, "end": ms }`.
    #[serde(deserialize_with = "lenient")]
    pub time_range: Option<TimeRange>,
    /// Keep full context snapshots. Anything but a JSON boolean reads as
    /// `false`.
    #[serde(deserialize_with = "lenient_flag")]
    pub include_context: bool,
    /// Maximum number of results.
    #[serde(deserialize_with = "lenient")]
    pub limit: Option<usize>,
}

impl QueryFilters {
    /// Parse filters from an arbitrary JSON value; anything that is not an
    /// object yields empty filters.
    pub fn from_value(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

fn lenient_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let flag: Option<bool> = lenient(deserializer)?;
    Ok(flag.unwrap_or(false))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
