//! Facade over the logger, analysis, export and suggestions.
//!
//! [`DebugApi`] is what tools and overlays talk to. It only reads the
//! logger's buffer; the one piece of state it keeps is the pattern
//! detector's verdict history and the custom suggestion table.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;
use wyn_insight::analyzer::{
    health_score, AnalysisReport, AnalyzerConfig, HealthStatus, LogAnalyzer, Ranked,
    SubsystemHealth,
};
use wyn_insight::export::{export, ExportFormat, ExportOptions};
use wyn_insight::patterns::{PatternAnalysis, PatternConfig, PatternDetector, PatternKind, SeverityVerdict};
use wyn_insight::query::{LogQuery, QueryFilters};
use wyn_insight::suggestions::{SearchHit, SuggestionBook, SuggestionEntry, SuggestionResult};
use wyn_log::entry::{LogEntry, SharedEntry};
use wyn_log::level::LogLevel;
use wyn_log::logger::{LogStats, Logger};

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// What counts as related in [`DebugApi::related_logs`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelatedOptions {
    /// Include entries from the same frame.
    pub same_frame: bool,
    /// Include entries from the same subsystem within `window_ms`.
    pub same_subsystem: bool,
    /// Half-width of the subsystem window around the entry.
    pub window_ms: u64,
    /// Maximum results.
    pub limit: usize,
}

impl Default for RelatedOptions {
    /// Same frame or same subsystem within 1 s, at most 50 results.
    fn default() -> Self {
        Self {
            same_frame: true,
            same_subsystem: true,
            window_ms: 1_000,
            limit: 50,
        }
    }
}

/// Parameters for [`DebugApi::export_for_analysis`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportRequest {
    /// Format name, case-insensitive.
    pub format: String,
    /// Restrict to the last `window_ms` milliseconds.
    pub window_ms: Option<u64>,
    /// Further restrict with a query.
    pub filters: Option<QueryFilters>,
    /// Keep full context snapshots.
    pub include_context: bool,
    /// Run pattern detection and embed the result.
    pub include_patterns: bool,
    /// Extra context attached to JSON output.
    pub context: Option<Value>,
}

impl Default for ExportRequest {
    fn default() -> Self {
        Self {
            format: ExportFormat::Json.as_str().to_owned(),
            window_ms: None,
            filters: None,
            include_context: false,
            include_patterns: true,
            context: None,
        }
    }
}

/// Overall state at a glance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugSummary {
    /// Window the summary covers.
    pub window_ms: u64,
    /// Health over all entries in the window.
    pub overall_health: u8,
    /// Band of `overall_health`.
    pub status: HealthStatus,
    /// Entries in the window.
    pub total_entries: usize,
    /// `ERROR` plus `FATAL` entries in the window.
    pub error_count: usize,
    /// `WARN` entries in the window.
    pub warn_count: usize,
    /// Most frequent error codes in the window.
    pub top_error_codes: Vec<Ranked>,
    /// Pattern severity verdict for the window.
    pub severity: SeverityVerdict,
    /// Per-subsystem health, worst first.
    pub subsystems: Vec<SubsystemHealth>,
    /// Lifetime ingestion counters.
    pub stats: LogStats,
}

// ---------------------------------------------------------------------------
// DebugApi
// ---------------------------------------------------------------------------

/// Read-side facade. See the [module docs](self).
pub struct DebugApi {
    logger: Arc<Logger>,
    analyzer: LogAnalyzer,
    detector: Mutex<PatternDetector>,
    suggestions: RwLock<SuggestionBook>,
}

impl std::fmt::Debug for DebugApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugApi")
            .field("logger", &self.logger)
            .field("analyzer", &self.analyzer)
            .finish_non_exhaustive()
    }
}

impl DebugApi {
    /// Facade over `logger`.
    pub fn new(logger: Arc<Logger>, patterns: PatternConfig, analyzer: AnalyzerConfig) -> Self {
        Self {
            logger,
            analyzer: LogAnalyzer::new(analyzer),
            detector: Mutex::new(PatternDetector::new(patterns)),
            suggestions: RwLock::new(SuggestionBook::new()),
        }
    }

    fn now(&self) -> u64 {
        self.logger.now_ms()
    }

    // -- queries ------------------------------------------------------------

    /// Run a serde-facing query.
    pub fn query(&self, filters: &QueryFilters) -> Vec<LogEntry> {
        self.run(&LogQuery::from_filters(filters))
    }

    /// Run a fluent query.
    pub fn run(&self, query: &LogQuery) -> Vec<LogEntry> {
        query.execute(&self.logger.entries(), self.now())
    }

    /// Entries from the last `window_ms` milliseconds, oldest first.
    pub fn recent_logs(&self, window_ms: u64) -> Vec<SharedEntry> {
        self.logger.entries_since(window_ms)
    }

    /// Entries from the same frame, or from the same subsystem within
    /// `window_ms` of `entry`, excluding `entry` itself. Oldest first.
    pub fn related_logs(&self, entry: &LogEntry, options: &RelatedOptions) -> Vec<SharedEntry> {
        let frame = entry.frame();
        let lo = entry.timestamp.saturating_sub(options.window_ms);
        let hi = entry.timestamp.saturating_add(options.window_ms);
        self.logger
            .entries()
            .into_iter()
            .filter(|e| e.sequence != entry.sequence)
            .filter(|e| {
                let same_frame = options.same_frame && frame.is_some() && e.frame() == frame;
                let near = options.same_subsystem
                    && e.subsystem == entry.subsystem
                    && e.timestamp >= lo
                    && e.timestamp <= hi;
                same_frame || near
            })
            .take(options.limit)
            .collect()
    }

    // -- analysis -----------------------------------------------------------

    /// Health of one subsystem over the last `window_ms`.
    pub fn analyze_subsystem(&self, subsystem: &str, window_ms: u64) -> SubsystemHealth {
        self.analyzer
            .subsystem_health(&self.logger.entries(), subsystem, self.now(), window_ms)
    }

    /// Full analysis report over the last `window_ms`, with patterns.
    pub fn analyze_time_window(&self, window_ms: u64) -> AnalysisReport {
        let entries = self.logger.entries_since(window_ms);
        let now = self.now();
        let patterns = self.detector.lock().analyze_recent(&entries, now, window_ms);
        self.analyzer.analyze(&entries, now, Some(&patterns))
    }

    /// Pattern analysis over the last `window_ms`.
    pub fn analyze_recent(&self, window_ms: u64) -> PatternAnalysis {
        let entries = self.logger.entries();
        self.detector.lock().analyze_recent(&entries, self.now(), window_ms)
    }

    /// Past pattern verdicts, oldest first.
    pub fn pattern_history(&self) -> Vec<wyn_insight::patterns::VerdictRecord> {
        self.detector.lock().history().iter().cloned().collect()
    }

    /// Health and top error codes over the configured health window.
    pub fn summary(&self) -> DebugSummary {
        let window_ms = self.analyzer.config().health_window_ms;
        let now = self.now();
        let entries = self.logger.entries_since(window_ms);

        let stats = self.analyzer.statistics(&entries);
        let error_count = stats.error_count();
        let warn_count = stats.count(LogLevel::Warn);
        let overall_health = health_score(error_count, warn_count, stats.total);

        let errors: Vec<SharedEntry> = entries.iter().filter(|e| e.level.is_error()).cloned().collect();
        let top_error_codes = self.analyzer.statistics(&errors).top_codes;

        DebugSummary {
            window_ms,
            overall_health,
            status: HealthStatus::from_score(overall_health),
            total_entries: stats.total,
            error_count,
            warn_count,
            top_error_codes,
            severity: wyn_insight::patterns::assess_severity(&entries),
            subsystems: self.analyzer.all_subsystem_health(&entries, now, window_ms),
            stats: self.logger.stats(),
        }
    }

    // -- export -------------------------------------------------------------

    /// Render entries for an external tool. Never fails: problems are
    /// reported as a JSON `{"error": ...}` document.
    pub fn export_for_analysis(&self, request: &ExportRequest) -> String {
        let format = match request.format.parse::<ExportFormat>() {
            Ok(format) => format,
            Err(e) => return error_document(&e.to_string()),
        };

        let now = self.now();
        let mut entries = match request.window_ms {
            Some(window_ms) => self.logger.entries_since(window_ms),
            None => self.logger.entries(),
        };
        if let Some(filters) = &request.filters {
            // Filters select; only an explicit limit caps, keeping the newest.
            let query = LogQuery::from_filters(filters);
            entries.retain(|e| query.matches(e, now));
            if let Some(limit) = filters.limit {
                let skip = entries.len().saturating_sub(limit);
                entries.drain(..skip);
            }
        }

        let patterns = request.include_patterns.then(|| {
            let window = request.window_ms.unwrap_or(u64::MAX);
            self.detector.lock().analyze_recent(&entries, now, window)
        });
        let options = ExportOptions {
            now: Some(now),
            analyzer: self.analyzer.config().clone(),
            include_context: request.include_context,
            context: request.context.clone(),
            patterns,
        };

        match export(&entries, format, &options) {
            Ok(out) => out,
            Err(e) => {
                warn!(error = %e, format = format.as_str(), "export failed");
                error_document(&e.to_string())
            }
        }
    }

    // -- suggestions --------------------------------------------------------

    /// Guidance for one code.
    pub fn suggestions(&self, code: &str) -> SuggestionResult {
        self.suggestions.read().get(code)
    }

    /// Guidance for a detected pattern.
    pub fn suggestions_for_pattern(&self, kind: PatternKind) -> SuggestionEntry {
        self.suggestions.read().for_pattern(kind)
    }

    /// Search the knowledge base.
    pub fn search_suggestions(&self, query: &str) -> Vec<SearchHit> {
        self.suggestions.read().search(query)
    }

    /// Add or replace a custom suggestion.
    pub fn add_suggestion(&self, code: impl Into<String>, entry: SuggestionEntry) -> Option<SuggestionEntry> {
        self.suggestions.write().add_suggestion(code, entry)
    }

    /// Remove a custom suggestion.
    pub fn remove_suggestion(&self, code: &str) -> Option<SuggestionEntry> {
        self.suggestions.write().remove_suggestion(code)
    }
}

fn error_document(message: &str) -> String {
    json!({ "error": message }).to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
