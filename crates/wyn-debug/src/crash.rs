//! Crash dumps: a point-in-time record of everything we know about a failure.
//!
//! [`CrashDumpGenerator::generate`] never fails. Each section (recent logs,
//! context, performance, environment, statistics) is captured independently
//! as a [`CaptureSection`]; a section that errors or panics becomes a
//! `{error, message}` marker while the rest of the dump is still filled in.
//! If assembly itself panics, the result is [`CrashDump::minimal`] carrying
//! the error and a meta-failure note.
//!
//! Dumps carry two BLAKE3 digests: `fingerprint` covers only the error
//! (message, kind, stack, causes) so identical failures group together, and
//! `id` additionally covers the timestamp so each dump is distinct.
//!
//! To record panics, hosts can catch them with [`std::panic::catch_unwind`]
//! and pass the payload to [`CrashDumpGenerator::generate_from_panic`].

use std::any::Any;
use std::fmt::Write as _;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, warn};
use wyn_log::context::ContextSnapshot;
use wyn_log::entry::{ErrorDetail, LogEntry};
use wyn_log::level::LogLevel;
use wyn_log::logger::{LogStats, Logger};
use wyn_log::CaptureError;

use crate::config::CrashDumpConfig;
use crate::context::DebugContext;
use crate::environment::{Dimensions, HostEnvironment, MemoryInfo};

// ---------------------------------------------------------------------------
// CaptureSection
// ---------------------------------------------------------------------------

/// A section that was either captured or replaced by a failure marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CaptureSection<T> {
    /// Failure marker.
    Failed {
        /// Failure kind (`"unavailable"`, `"panicked"`, ...).
        error: String,
        /// Human-readable description.
        message: String,
    },
    /// The captured value.
    Captured(T),
}

impl<T> CaptureSection<T> {
    /// Marker for a failed capture.
    pub fn failed(err: &CaptureError) -> Self {
        Self::Failed {
            error: err.kind().to_owned(),
            message: err.to_string(),
        }
    }

    /// Captured value or marker.
    pub fn from_result(result: Result<T, CaptureError>) -> Self {
        match result {
            Ok(value) => Self::Captured(value),
            Err(e) => Self::failed(&e),
        }
    }

    /// The value, if captured.
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Captured(value) => Some(value),
            Self::Failed { .. } => None,
        }
    }

    /// Returns `true` if the section holds a value.
    pub fn is_captured(&self) -> bool {
        matches!(self, Self::Captured(_))
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Recent entries split by severity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecentLogs {
    /// `ERROR` and `FATAL` entries.
    pub errors: Vec<LogEntry>,
    /// `WARN` entries.
    pub warnings: Vec<LogEntry>,
    /// Everything else.
    pub other: Vec<LogEntry>,
}

impl RecentLogs {
    /// Total entries across all groups.
    pub fn total(&self) -> usize {
        self.errors.len() + self.warnings.len() + self.other.len()
    }
}

/// Frame timing at dump time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceInfo {
    /// Current frame number.
    pub frame: u64,
    /// Duration of the last frame.
    pub frame_duration_ms: f64,
    /// Recent frames per second.
    pub fps: f64,
    /// Milliseconds since the debug context started.
    pub uptime_ms: u64,
    /// Periodic snapshots taken so far.
    pub periodic_snapshots: u64,
}

/// Host facts, each captured separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    /// Operating system.
    pub os: CaptureSection<String>,
    /// CPU architecture.
    pub arch: CaptureSection<String>,
    /// Logical CPU count.
    pub hardware_concurrency: CaptureSection<usize>,
    /// Window size.
    pub window: CaptureSection<Dimensions>,
    /// Screen size.
    pub screen: CaptureSection<Dimensions>,
    /// Device pixel ratio.
    pub device_pixel_ratio: CaptureSection<f64>,
    /// Process memory.
    pub memory: CaptureSection<MemoryInfo>,
}

// ---------------------------------------------------------------------------
// CrashDump
// ---------------------------------------------------------------------------

/// Inert, serialisable crash record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrashDump {
    /// BLAKE3 digest of the error and timestamp (hex, 16 chars).
    pub id: String,
    /// BLAKE3 digest of the error alone (hex).
    pub fingerprint: String,
    /// When the dump was generated.
    pub timestamp: u64,
    /// The failure.
    pub error: ErrorDetail,
    /// Caller-supplied extra context.
    pub additional_context: Option<Value>,
    /// Recent entries.
    pub recent_logs: CaptureSection<RecentLogs>,
    /// Provider state at dump time.
    pub context: CaptureSection<ContextSnapshot>,
    /// Frame timing.
    pub performance: CaptureSection<PerformanceInfo>,
    /// Host facts.
    pub environment: CaptureSection<EnvironmentInfo>,
    /// Ingestion counters.
    pub statistics: CaptureSection<LogStats>,
    /// `true` when assembly failed and only the error was kept.
    pub minimal: bool,
    /// Why assembly failed.
    pub meta_failure: Option<String>,
}

impl CrashDump {
    /// Dump holding only the error, for when assembly itself failed.
    pub fn minimal(
        error: ErrorDetail,
        additional_context: Option<Value>,
        timestamp: u64,
        meta_failure: impl Into<String>,
    ) -> Self {
        let skipped = CaptureError::Unavailable("crash dump assembly failed".to_owned());
        Self {
            id: dump_id(&error, timestamp),
            fingerprint: fingerprint(&error),
            timestamp,
            error,
            additional_context,
            recent_logs: CaptureSection::failed(&skipped),
            context: CaptureSection::failed(&skipped),
            performance: CaptureSection::failed(&skipped),
            environment: CaptureSection::failed(&skipped),
            statistics: CaptureSection::failed(&skipped),
            minimal: true,
            meta_failure: Some(meta_failure.into()),
        }
    }

    /// Sections that failed, by name.
    pub fn failed_sections(&self) -> Vec<&'static str> {
        let mut failed = Vec::new();
        if !self.recent_logs.is_captured() {
            failed.push("recent_logs");
        }
        if !self.context.is_captured() {
            failed.push("context");
        }
        if !self.performance.is_captured() {
            failed.push("performance");
        }
        if !self.environment.is_captured() {
            failed.push("environment");
        }
        if !self.statistics.is_captured() {
            failed.push("statistics");
        }
        failed
    }
}

fn hash_error(hasher: &mut blake3::Hasher, error: &ErrorDetail) {
    hasher.update(error.message.as_bytes());
    hasher.update(&[0]);
    hasher.update(error.kind.as_deref().unwrap_or_default().as_bytes());
    hasher.update(&[0]);
    hasher.update(error.stack.as_deref().unwrap_or_default().as_bytes());
    for cause in &error.causes {
        hasher.update(&[0]);
        hasher.update(cause.as_bytes());
    }
}

/// BLAKE3 hex digest of an error's identity.
pub fn fingerprint(error: &ErrorDetail) -> String {
    let mut hasher = blake3::Hasher::new();
    hash_error(&mut hasher, error);
    hasher.finalize().to_hex().to_string()
}

fn dump_id(error: &ErrorDetail, timestamp: u64) -> String {
    let mut hasher = blake3::Hasher::new();
    hash_error(&mut hasher, error);
    hasher.update(&timestamp.to_le_bytes());
    hasher.finalize().to_hex().as_str()[..16].to_owned()
}

// ---------------------------------------------------------------------------
// CrashDumpGenerator
// ---------------------------------------------------------------------------

/// Assembles [`CrashDump`]s from the logger, debug context and host probe.
pub struct CrashDumpGenerator {
    config: CrashDumpConfig,
    logger: Arc<Logger>,
    context: Arc<DebugContext>,
    environment: Arc<dyn HostEnvironment>,
}

impl std::fmt::Debug for CrashDumpGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrashDumpGenerator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CrashDumpGenerator {
    /// Generator over the given sources.
    pub fn new(
        config: CrashDumpConfig,
        logger: Arc<Logger>,
        context: Arc<DebugContext>,
        environment: Arc<dyn HostEnvironment>,
    ) -> Self {
        Self {
            config,
            logger,
            context,
            environment,
        }
    }

    /// Build a dump for `error`. Never panics and never fails.
    pub fn generate(&self, error: ErrorDetail, additional_context: Option<Value>) -> CrashDump {
        let assembled = catch_unwind(AssertUnwindSafe(|| {
            self.assemble(&error, additional_context.as_ref())
        }));
        match assembled {
            Ok(dump) => dump,
            Err(payload) => {
                let cause = ErrorDetail::from_panic(&*payload);
                error!(error = %cause.message, "crash dump assembly panicked");
                let timestamp = catch_unwind(AssertUnwindSafe(|| self.logger.now_ms())).unwrap_or(0);
                CrashDump::minimal(
                    error,
                    additional_context,
                    timestamp,
                    format!("crash dump assembly panicked: {}", cause.message),
                )
            }
        }
    }

    /// Build a dump for a caught panic payload.
    pub fn generate_from_panic(
        &self,
        payload: &(dyn Any + Send),
        additional_context: Option<Value>,
    ) -> CrashDump {
        self.generate(ErrorDetail::from_panic(payload), additional_context)
    }

    fn assemble(&self, error: &ErrorDetail, additional_context: Option<&Value>) -> CrashDump {
        let timestamp = self.logger.now_ms();

        let recent_logs = section("recent_logs", || {
            let mut logs = RecentLogs::default();
            for entry in self.logger.recent(self.config.recent_log_count) {
                let entry = LogEntry::clone(&entry);
                match entry.level {
                    LogLevel::Error | LogLevel::Fatal => logs.errors.push(entry),
                    LogLevel::Warn => logs.warnings.push(entry),
                    _ => logs.other.push(entry),
                }
            }
            Ok(logs)
        });

        let context = section("context", || Ok(self.context.capture_now()));

        let performance = section("performance", || {
            Ok(PerformanceInfo {
                frame: self.context.frame(),
                frame_duration_ms: self.context.frame_duration_ms(),
                fps: self.context.fps(),
                uptime_ms: self.context.uptime_ms(),
                periodic_snapshots: self.context.snapshot_count(),
            })
        });

        let environment = section("environment", || {
            let env = &self.environment;
            Ok(EnvironmentInfo {
                os: section("environment.os", || env.os()),
                arch: section("environment.arch", || env.arch()),
                hardware_concurrency: section("environment.hardware_concurrency", || {
                    env.hardware_concurrency()
                }),
                window: section("environment.window", || env.window()),
                screen: section("environment.screen", || env.screen()),
                device_pixel_ratio: section("environment.device_pixel_ratio", || {
                    env.device_pixel_ratio()
                }),
                memory: section("environment.memory", || env.memory()),
            })
        });

        let statistics = section("statistics", || Ok(self.logger.stats()));

        CrashDump {
            id: dump_id(error, timestamp),
            fingerprint: fingerprint(error),
            timestamp,
            error: error.clone(),
            additional_context: additional_context.cloned(),
            recent_logs,
            context,
            performance,
            environment,
            statistics,
            minimal: false,
            meta_failure: None,
        }
    }

    /// Plain-text report of a dump.
    pub fn generate_summary(&self, dump: &CrashDump) -> String {
        generate_summary(dump, self.config.summary_error_count)
    }
}

/// Run one section capture, isolating errors and panics.
fn section<T>(name: &str, capture: impl FnOnce() -> Result<T, CaptureError>) -> CaptureSection<T> {
    let result = match catch_unwind(AssertUnwindSafe(capture)) {
        Ok(result) => result,
        Err(payload) => Err(CaptureError::Panicked {
            section: name.to_owned(),
            message: ErrorDetail::from_panic(&*payload).message,
        }),
    };
    if let Err(e) = &result {
        // Missing host features are expected, not worth a warning.
        if !matches!(e, CaptureError::Unsupported(_)) {
            warn!(section = name, error = %e, "crash dump section not captured");
        }
    }
    CaptureSection::from_result(result)
}

// ---------------------------------------------------------------------------
// Text summary
// ---------------------------------------------------------------------------

/// Provider fields shown per provider in the game-state section.
const HIGHLIGHT_FIELDS: usize = 6;

/// Render `dump` as a fixed-section text report listing at most
/// `error_count` recent errors.
pub fn generate_summary(dump: &CrashDump, error_count: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "==================== CRASH REPORT ====================");
    let _ = writeln!(out, "Dump:        {}", dump.id);
    let _ = writeln!(out, "Fingerprint: {}", &dump.fingerprint[..16.min(dump.fingerprint.len())]);
    let _ = writeln!(out, "Time:        {} ms", dump.timestamp);
    if let Some(meta) = &dump.meta_failure {
        let _ = writeln!(out, "NOTE: minimal dump ({meta})");
    }

    let _ = writeln!(out, "\n--- Error ---");
    match &dump.error.kind {
        Some(kind) => {
            let _ = writeln!(out, "{kind}: {}", dump.error.message);
        }
        None => {
            let _ = writeln!(out, "{}", dump.error.message);
        }
    }
    for cause in &dump.error.causes {
        let _ = writeln!(out, "  caused by: {cause}");
    }
    if let Some(stack) = &dump.error.stack {
        for line in stack.lines().take(10) {
            let _ = writeln!(out, "  {line}");
        }
    }

    let _ = writeln!(out, "\n--- Performance ---");
    match &dump.performance {
        CaptureSection::Captured(p) => {
            let _ = writeln!(out, "Frame:    {} ({:.1} ms)", p.frame, p.frame_duration_ms);
            let _ = writeln!(out, "FPS:      {:.1}", p.fps);
            let _ = writeln!(out, "Uptime:   {} ms", p.uptime_ms);
            let _ = writeln!(out, "Snapshots: {}", p.periodic_snapshots);
        }
        CaptureSection::Failed { message, .. } => {
            let _ = writeln!(out, "(unavailable: {message})");
        }
    }

    let _ = writeln!(out, "\n--- Game State ---");
    match &dump.context {
        CaptureSection::Captured(snapshot) if snapshot.providers.is_empty() => {
            let _ = writeln!(out, "(no providers registered)");
        }
        CaptureSection::Captured(snapshot) => {
            for (name, provider) in &snapshot.providers {
                if provider.available {
                    let fields: Vec<String> = provider
                        .state
                        .iter()
                        .take(HIGHLIGHT_FIELDS)
                        .map(|(k, v)| format!("{k}={v}"))
                        .collect();
                    let _ = writeln!(out, "{name}: {}", fields.join(", "));
                } else {
                    let reason = provider.error.as_deref().unwrap_or("unknown");
                    let _ = writeln!(out, "{name}: unavailable ({reason})");
                }
            }
        }
        CaptureSection::Failed { message, .. } => {
            let _ = writeln!(out, "(unavailable: {message})");
        }
    }

    let _ = writeln!(out, "\n--- Recent Errors ---");
    match &dump.recent_logs {
        CaptureSection::Captured(logs) if logs.errors.is_empty() => {
            let _ = writeln!(out, "(none)");
        }
        CaptureSection::Captured(logs) => {
            for e in logs.errors.iter().rev().take(error_count) {
                let _ = writeln!(
                    out,
                    "[{}] {} {} ({}): {}",
                    e.timestamp, e.level, e.code, e.subsystem, e.message
                );
            }
        }
        CaptureSection::Failed { message, .. } => {
            let _ = writeln!(out, "(unavailable: {message})");
        }
    }

    let _ = writeln!(out, "\n--- Statistics ---");
    match &dump.statistics {
        CaptureSection::Captured(s) => {
            let _ = writeln!(out, "Logged:      {}", s.total_logged);
            let _ = writeln!(out, "Buffered:    {}/{}", s.buffered, s.capacity);
            let _ = writeln!(out, "Evicted:     {}", s.evicted);
            let _ = writeln!(out, "Sampled out: {}", s.sampled_out);
            let _ = writeln!(out, "Filtered:    {}", s.filtered);
            let _ = writeln!(out, "Degraded:    {}", s.degraded_captures);
        }
        CaptureSection::Failed { message, .. } => {
            let _ = writeln!(out, "(unavailable: {message})");
        }
    }
    let _ = writeln!(out, "======================================================");
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
