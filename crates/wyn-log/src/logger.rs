//! Log ingestion core.
//!
//! The [`Logger`] accepts structured entries and drives each through a fixed
//! pipeline:
//!
//! 1. **Filter** -- drop silently if the active [`LogFilter`] rejects the
//!    level or subsystem.
//! 2. **Sample** -- drop (but count) low-severity entries according to the
//!    [`SamplingPolicy`]. Errors and fatals are never sampled out.
//! 3. **Enrich** -- capture a [`ContextSnapshot`] from the attached
//!    [`ContextRegistry`]. A capture failure degrades the entry, it never
//!    drops it.
//! 4. **Append** -- stamp sequence and timestamp under the buffer lock and
//!    push into the [`RingBuffer`], evicting the oldest entry at capacity.
//! 5. **Count** -- update the aggregate [`LogStats`].
//!
//! Every method takes `&self`, so one logger can be shared between the host
//! loop and inspection callers behind an [`Arc`]. Nothing in the pipeline
//! panics or returns an error.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use wyn_log::prelude::*;
//!
//! let clock = Arc::new(ManualClock::new(0));
//! let logger = Logger::new(LoggerConfig::default(), clock.clone());
//!
//! logger.error("PHYSICS_UPDATE_ERROR", Payload::new().subsystem("physics"));
//! clock.advance(16);
//! logger.info("LEVEL_LOADED", Payload::new().subsystem("scene"));
//!
//! let entries = logger.entries();
//! assert_eq!(entries.len(), 2);
//! assert_eq!(entries[0].code, "PHYSICS_UPDATE_ERROR");
//! assert_eq!(entries[1].timestamp, 16);
//! assert_eq!(logger.stats().total_logged, 2);
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::buffer::{RingBuffer, DEFAULT_CAPACITY};
use crate::clock::Clock;
use crate::context::{ContextRegistry, ContextSnapshot};
use crate::entry::{ErrorDetail, LogEntry, Payload, SharedEntry, DEFAULT_SUBSYSTEM};
use crate::level::LogLevel;
use crate::sampling::{Sampler, SamplingPolicy};
use crate::LogError;

// ---------------------------------------------------------------------------
// LoggerConfig
// ---------------------------------------------------------------------------

/// Configuration for a [`Logger`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Ring buffer capacity. Must be at least 1.
    pub capacity: usize,
    /// Entries below this level are filtered out.
    pub min_level: LogLevel,
    /// Per-level keep probabilities.
    pub sampling: SamplingPolicy,
    /// Fixed seed for the sampling stream; `None` seeds from entropy.
    pub sampling_seed: Option<u64>,
    /// Re-emit recorded entries as `tracing` events.
    pub console_mirror: bool,
    /// Attach a context snapshot to each entry when a registry is present.
    pub capture_context: bool,
}

impl Default for LoggerConfig {
    /// 2000 entries, everything from `Dev` up, default sampling, console
    /// mirror off, context capture on.
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            min_level: LogLevel::Dev,
            sampling: SamplingPolicy::default(),
            sampling_seed: None,
            console_mirror: false,
            capture_context: true,
        }
    }
}

impl LoggerConfig {
    /// Check capacity and sampling rates.
    pub fn validate(&self) -> Result<(), LogError> {
        if self.capacity == 0 {
            return Err(LogError::InvalidConfig(
                "logger capacity must be at least 1".to_owned(),
            ));
        }
        self.sampling.validate()
    }
}

// ---------------------------------------------------------------------------
// LogFilter
// ---------------------------------------------------------------------------

/// Pre-sampling admission filter.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogFilter {
    /// Minimum admitted level.
    pub min_level: LogLevel,
    /// If set, only these subsystems are admitted.
    pub only_subsystems: Option<BTreeSet<String>>,
    /// Subsystems that are never admitted.
    pub muted_subsystems: BTreeSet<String>,
}

impl LogFilter {
    /// Filter admitting everything at or above `min_level`.
    pub fn at_least(min_level: LogLevel) -> Self {
        Self {
            min_level,
            ..Default::default()
        }
    }

    /// Restrict admission to the given subsystems.
    pub fn only<I, S>(mut self, subsystems: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only_subsystems = Some(subsystems.into_iter().map(Into::into).collect());
        self
    }

    /// Never admit `subsystem`.
    pub fn mute(mut self, subsystem: impl Into<String>) -> Self {
        self.muted_subsystems.insert(subsystem.into());
        self
    }

    /// Returns `true` if an entry with this level and subsystem is admitted.
    pub fn admits(&self, level: LogLevel, subsystem: &str) -> bool {
        if level < self.min_level {
            return false;
        }
        if self.muted_subsystems.contains(subsystem) {
            return false;
        }
        match &self.only_subsystems {
            Some(only) => only.contains(subsystem),
            None => true,
        }
    }
}

// ---------------------------------------------------------------------------
// LogStats / LogOutcome
// ---------------------------------------------------------------------------

/// Aggregate ingestion counters.
///
/// `sampled_out`, `filtered` and `evicted` are independent: an entry is
/// counted in at most one of the first two, and only appended entries can
/// later be evicted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LogStats {
    /// Entries appended to the buffer.
    pub total_logged: u64,
    /// Entries dropped by the sampling policy.
    pub sampled_out: u64,
    /// Entries rejected by the filter.
    pub filtered: u64,
    /// Entries evicted from the buffer at capacity.
    pub evicted: u64,
    /// Entries appended with at least one capture note.
    pub degraded_captures: u64,
    /// Appended entries per level.
    pub by_level: BTreeMap<LogLevel, u64>,
    /// Entries currently held.
    pub buffered: usize,
    /// Buffer capacity.
    pub capacity: usize,
}

/// What happened to one `log` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutcome {
    /// The entry was appended.
    Recorded {
        /// Insertion sequence of the new entry.
        sequence: u64,
        /// Whether the append evicted the oldest entry.
        evicted: bool,
    },
    /// Rejected by the active filter.
    Filtered,
    /// Dropped by the sampling policy.
    SampledOut,
}

impl LogOutcome {
    /// Returns `true` if the entry reached the buffer.
    pub fn is_recorded(&self) -> bool {
        matches!(self, Self::Recorded { .. })
    }
}

#[derive(Debug, Default)]
struct Counters {
    total_logged: u64,
    sampled_out: u64,
    filtered: u64,
    degraded_captures: u64,
    by_level: BTreeMap<LogLevel, u64>,
}

// ---------------------------------------------------------------------------
// Logger
// ---------------------------------------------------------------------------

/// Bounded, sampled, context-enriched log store. See the [module docs](self).
pub struct Logger {
    buffer: RingBuffer<SharedEntry>,
    sampler: Sampler,
    filter: RwLock<LogFilter>,
    registry: Option<Arc<ContextRegistry>>,
    clock: Arc<dyn Clock>,
    counters: Mutex<Counters>,
    console_mirror: AtomicBool,
    capture_context: bool,
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("capacity", &self.buffer.capacity())
            .field("buffered", &self.buffer.len())
            .field("filter", &*self.filter.read())
            .field("has_registry", &self.registry.is_some())
            .finish()
    }
}

impl Logger {
    /// Logger without context enrichment.
    pub fn new(config: LoggerConfig, clock: Arc<dyn Clock>) -> Self {
        Self::build(config, clock, None)
    }

    /// Logger that attaches a snapshot of `registry` to every entry.
    pub fn with_registry(
        config: LoggerConfig,
        clock: Arc<dyn Clock>,
        registry: Arc<ContextRegistry>,
    ) -> Self {
        Self::build(config, clock, Some(registry))
    }

    fn build(
        config: LoggerConfig,
        clock: Arc<dyn Clock>,
        registry: Option<Arc<ContextRegistry>>,
    ) -> Self {
        Self {
            buffer: RingBuffer::new(config.capacity),
            sampler: Sampler::new(config.sampling, config.sampling_seed),
            filter: RwLock::new(LogFilter::at_least(config.min_level)),
            registry,
            clock,
            counters: Mutex::new(Counters::default()),
            console_mirror: AtomicBool::new(config.console_mirror),
            capture_context: config.capture_context,
        }
    }

    // -- ingestion ----------------------------------------------------------

    /// Ingest one entry. See the [module docs](self) for the pipeline.
    pub fn log(&self, level: LogLevel, code: impl Into<String>, payload: Payload) -> LogOutcome {
        let code = code.into();
        let subsystem = payload.subsystem.as_deref().unwrap_or(DEFAULT_SUBSYSTEM);

        if !self.filter.read().admits(level, subsystem) {
            self.counters.lock().filtered += 1;
            return LogOutcome::Filtered;
        }

        if !self.sampler.should_keep(level) {
            self.counters.lock().sampled_out += 1;
            return LogOutcome::SampledOut;
        }

        let (context, context_note) = self.capture_context();

        let clock = &self.clock;
        let mut built: Option<SharedEntry> = None;
        let receipt = self.buffer.push_with(|sequence| {
            let mut entry = LogEntry::new(sequence, clock.now_ms(), level, code, payload, context);
            if let Some(note) = context_note {
                entry.capture_notes.push(note);
            }
            let entry = Arc::new(entry);
            built = Some(Arc::clone(&entry));
            entry
        });

        {
            let mut counters = self.counters.lock();
            counters.total_logged += 1;
            *counters.by_level.entry(level).or_insert(0) += 1;
            if built.as_ref().is_some_and(|e| e.is_degraded()) {
                counters.degraded_captures += 1;
            }
        }

        if self.console_mirror.load(Ordering::Relaxed) {
            if let Some(entry) = &built {
                mirror_to_console(entry);
            }
        }

        LogOutcome::Recorded {
            sequence: receipt.sequence,
            evicted: receipt.evicted,
        }
    }

    /// Ingest at [`LogLevel::Dev`].
    pub fn dev(&self, code: impl Into<String>, payload: Payload) -> LogOutcome {
        self.log(LogLevel::Dev, code, payload)
    }

    /// Ingest at [`LogLevel::Info`].
    pub fn info(&self, code: impl Into<String>, payload: Payload) -> LogOutcome {
        self.log(LogLevel::Info, code, payload)
    }

    /// Ingest at [`LogLevel::Warn`].
    pub fn warn(&self, code: impl Into<String>, payload: Payload) -> LogOutcome {
        self.log(LogLevel::Warn, code, payload)
    }

    /// Ingest at [`LogLevel::Error`].
    pub fn error(&self, code: impl Into<String>, payload: Payload) -> LogOutcome {
        self.log(LogLevel::Error, code, payload)
    }

    /// Ingest at [`LogLevel::Fatal`].
    pub fn fatal(&self, code: impl Into<String>, payload: Payload) -> LogOutcome {
        self.log(LogLevel::Fatal, code, payload)
    }

    /// Capture context, converting a panic anywhere in the registry into a
    /// capture note.
    fn capture_context(&self) -> (Option<ContextSnapshot>, Option<String>) {
        let registry = match (&self.registry, self.capture_context) {
            (Some(registry), true) => registry,
            _ => return (None, None),
        };
        let now = self.clock.now_ms();
        match catch_unwind(AssertUnwindSafe(|| registry.capture_snapshot(now))) {
            Ok(snapshot) => (Some(snapshot), None),
            Err(panic) => {
                let detail = ErrorDetail::from_panic(&*panic);
                tracing::warn!(error = %detail.message, "context capture failed during ingestion");
                (None, Some(format!("context capture failed: {}", detail.message)))
            }
        }
    }

    // -- reads --------------------------------------------------------------

    /// All buffered entries, oldest first.
    pub fn entries(&self) -> Vec<SharedEntry> {
        self.buffer.snapshot()
    }

    /// The last `n` buffered entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<SharedEntry> {
        self.buffer.recent(n)
    }

    /// Buffered entries no older than `window_ms` before now.
    pub fn entries_since(&self, window_ms: u64) -> Vec<SharedEntry> {
        let cutoff = self.now_ms().saturating_sub(window_ms);
        self.buffer
            .snapshot()
            .into_iter()
            .filter(|e| e.timestamp >= cutoff)
            .collect()
    }

    /// Snapshot of the ingestion counters.
    pub fn stats(&self) -> LogStats {
        let counters = self.counters.lock();
        LogStats {
            total_logged: counters.total_logged,
            sampled_out: counters.sampled_out,
            filtered: counters.filtered,
            evicted: self.buffer.drop_count(),
            degraded_captures: counters.degraded_captures,
            by_level: counters.by_level.clone(),
            buffered: self.buffer.len(),
            capacity: self.buffer.capacity(),
        }
    }

    /// Current time on the logger's clock.
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Buffer capacity.
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// The registry used for enrichment, if any.
    pub fn registry(&self) -> Option<&Arc<ContextRegistry>> {
        self.registry.as_ref()
    }

    // -- runtime controls ---------------------------------------------------

    /// Replace the admission filter.
    pub fn set_filter(&self, filter: LogFilter) {
        *self.filter.write() = filter;
    }

    /// Change only the minimum admitted level.
    pub fn set_min_level(&self, level: LogLevel) {
        self.filter.write().min_level = level;
    }

    /// Copy of the active filter.
    pub fn filter(&self) -> LogFilter {
        self.filter.read().clone()
    }

    /// Replace the sampling policy.
    pub fn set_sampling_policy(&self, policy: SamplingPolicy) {
        self.sampler.set_policy(policy);
    }

    /// Turn the `tracing` console mirror on or off.
    pub fn set_console_mirror(&self, enabled: bool) {
        self.console_mirror.store(enabled, Ordering::Relaxed);
    }
}

/// Re-emit a recorded entry as a `tracing` event.
fn mirror_to_console(entry: &LogEntry) {
    let LogEntry {
        code,
        subsystem,
        message,
        ..
    } = entry;
    match entry.level {
        LogLevel::Dev => tracing::debug!(%code, %subsystem, "{message}"),
        LogLevel::Info => tracing::info!(%code, %subsystem, "{message}"),
        LogLevel::Warn => tracing::warn!(%code, %subsystem, "{message}"),
        LogLevel::Error => tracing::error!(%code, %subsystem, "{message}"),
        LogLevel::Fatal => tracing::error!(%code, %subsystem, fatal = true, "{message}"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
