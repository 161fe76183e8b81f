//! Repeating-error and cascade detection over a window of entries.
//!
//! Detection is purely derivational: every call takes a slice of entries
//! (already restricted to a time window by the caller) and returns a fresh
//! [`PatternAnalysis`]. Only `WARN`, `ERROR` and `FATAL` entries participate.
//!
//! - **Repeating errors** group entries by code and report codes seen at least
//!   [`PatternConfig::repeat_threshold`] times.
//! - **Cascades** slide a window of [`PatternConfig::cascade_window_ms`] over
//!   the time-sorted entries and report bursts of at least
//!   [`PatternConfig::cascade_min_entries`]. Windows overlapping an
//!   already-reported cascade are merged into it.
//! - **Severity** is a coarse verdict from fatal/error/warn counts.
//!
//! The thresholds are tunable policy constants, not exact science.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use wyn_insight::patterns::{PatternDetector, SeverityLevel};
//! use wyn_log::prelude::*;
//!
//! let entries: Vec<SharedEntry> = (0..4)
//!     .map(|i| Arc::new(LogEntry::new(
//!         i, i * 10, LogLevel::Error, "AUDIO_DECODE_ERROR",
//!         Payload::new().subsystem("audio"), None,
//!     )))
//!     .collect();
//!
//! let mut detector = PatternDetector::default();
//! let analysis = detector.analyze(&entries);
//! assert_eq!(analysis.repeating_errors[0].count, 4);
//! assert_eq!(analysis.severity.level, SeverityLevel::Low);
//! ```

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::debug;
use wyn_log::entry::{LogEntry, SharedEntry};
use wyn_log::level::LogLevel;

// ---------------------------------------------------------------------------
// PatternConfig
// ---------------------------------------------------------------------------

/// Tunables for pattern detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Minimum occurrences of one code to count as repeating.
    pub repeat_threshold: usize,
    /// Width of the cascade window in milliseconds (inclusive).
    pub cascade_window_ms: u64,
    /// Minimum entries inside one window to count as a cascade.
    pub cascade_min_entries: usize,
    /// Sample entries kept per repeating code.
    pub max_samples: usize,
    /// Past verdicts retained for trend display.
    pub history_limit: usize,
}

impl Default for PatternConfig {
    /// Threshold 3, 1000 ms window, 5 entries per cascade, 5 samples, 20
    /// verdicts of history.
    fn default() -> Self {
        Self {
            repeat_threshold: 3,
            cascade_window_ms: 1000,
            cascade_min_entries: 5,
            max_samples: 5,
            history_limit: 20,
        }
    }
}

// ---------------------------------------------------------------------------
// Pattern records
// ---------------------------------------------------------------------------

/// Kind of detected pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    /// One code recurring within the window.
    Repeating,
    /// A burst of entries within a short span.
    Cascade,
}

/// Compact reference to an entry inside a derived record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntrySample {
    /// Insertion sequence of the entry.
    pub sequence: u64,
    /// Timestamp of the entry.
    pub timestamp: u64,
    /// Level of the entry.
    pub level: LogLevel,
    /// Subsystem of the entry.
    pub subsystem: String,
    /// Code of the entry.
    pub code: String,
    /// Message of the entry.
    pub message: String,
}

impl From<&LogEntry> for EntrySample {
    fn from(entry: &LogEntry) -> Self {
        Self {
            sequence: entry.sequence,
            timestamp: entry.timestamp,
            level: entry.level,
            subsystem: entry.subsystem.clone(),
            code: entry.code.clone(),
            message: entry.message.clone(),
        }
    }
}

/// A code seen at least `repeat_threshold` times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepeatingError {
    /// The repeating code.
    pub code: String,
    /// Occurrences within the window.
    pub count: usize,
    /// Timestamp of the first occurrence.
    pub first_seen: u64,
    /// Timestamp of the last occurrence.
    pub last_seen: u64,
    /// Distinct subsystems that emitted the code.
    pub subsystems: Vec<String>,
    /// Up to `max_samples` occurrences, oldest first.
    pub samples: Vec<EntrySample>,
}

impl RepeatingError {
    /// Milliseconds between first and last occurrence.
    pub fn span_ms(&self) -> u64 {
        self.last_seen.saturating_sub(self.first_seen)
    }
}

/// A burst of entries inside one cascade window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cascade {
    /// Timestamp of the first entry in the burst.
    pub start: u64,
    /// Timestamp of the last entry in the burst.
    pub end: u64,
    /// Number of entries in the burst.
    pub entry_count: usize,
    /// Number of distinct codes in the burst.
    pub distinct_codes: usize,
    /// The distinct codes, sorted.
    pub codes: Vec<String>,
    /// The distinct subsystems, sorted.
    pub subsystems: Vec<String>,
    /// Code of the first entry, the likely trigger.
    pub trigger_code: String,
}

impl Cascade {
    /// Milliseconds covered by the burst.
    pub fn duration_ms(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }
}

/// Coarse severity of a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityLevel {
    /// Nothing alarming.
    Low,
    /// Elevated error or warning volume.
    Medium,
    /// Many errors.
    High,
    /// At least one fatal.
    Critical,
}

impl SeverityLevel {
    /// Lower-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// Severity verdict with the counts it was derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeverityVerdict {
    /// The verdict.
    pub level: SeverityLevel,
    /// Why this verdict was reached.
    pub reason: String,
    /// Fatal entries considered.
    pub fatal_count: usize,
    /// Error entries considered.
    pub error_count: usize,
    /// Warning entries considered.
    pub warn_count: usize,
}

/// Result of one detection pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternAnalysis {
    /// Problem entries (warn and above) considered.
    pub analyzed: usize,
    /// Window start, when the analysis was window-bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_start: Option<u64>,
    /// Window end, when the analysis was window-bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_end: Option<u64>,
    /// Repeating codes, most frequent first.
    pub repeating_errors: Vec<RepeatingError>,
    /// Cascades in chronological order.
    pub cascades: Vec<Cascade>,
    /// Overall verdict.
    pub severity: SeverityVerdict,
}

impl PatternAnalysis {
    /// Returns `true` if any repeating error or cascade was found.
    pub fn has_patterns(&self) -> bool {
        !self.repeating_errors.is_empty() || !self.cascades.is_empty()
    }

    /// The repeating record for `code`, if any.
    pub fn repeating(&self, code: &str) -> Option<&RepeatingError> {
        self.repeating_errors.iter().find(|r| r.code == code)
    }
}

/// One entry in the detector's verdict history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerdictRecord {
    /// End of the analyzed window (or last entry timestamp).
    pub at: u64,
    /// Verdict reached.
    pub level: SeverityLevel,
    /// Problem entries considered.
    pub analyzed: usize,
}

// ---------------------------------------------------------------------------
// Detection functions
// ---------------------------------------------------------------------------

/// Problem entries (warn and above), sorted by timestamp then sequence.
fn problem_entries(entries: &[SharedEntry]) -> Vec<&LogEntry> {
    let mut problems: Vec<&LogEntry> = entries
        .iter()
        .map(|e| &**e)
        .filter(|e| e.level.is_problem())
        .collect();
    problems.sort_by_key(|e| (e.timestamp, e.sequence));
    problems
}

/// Codes occurring at least `threshold` times, most frequent first.
pub fn detect_repeating(
    entries: &[SharedEntry],
    threshold: usize,
    max_samples: usize,
) -> Vec<RepeatingError> {
    let mut groups: BTreeMap<&str, Vec<&LogEntry>> = BTreeMap::new();
    for entry in problem_entries(entries) {
        groups.entry(entry.code.as_str()).or_default().push(entry);
    }

    let mut repeating: Vec<RepeatingError> = groups
        .into_iter()
        .filter(|(_, group)| group.len() >= threshold.max(1))
        .map(|(code, group)| {
            let subsystems: BTreeSet<&str> = group.iter().map(|e| e.subsystem.as_str()).collect();
            RepeatingError {
                code: code.to_owned(),
                count: group.len(),
                first_seen: group.first().map_or(0, |e| e.timestamp),
                last_seen: group.last().map_or(0, |e| e.timestamp),
                subsystems: subsystems.into_iter().map(str::to_owned).collect(),
                samples: group
                    .iter()
                    .take(max_samples)
                    .map(|e| EntrySample::from(*e))
                    .collect(),
            }
        })
        .collect();

    // Stable sort keeps the code order from the BTreeMap for equal counts.
    repeating.sort_by(|a, b| b.count.cmp(&a.count));
    repeating
}

/// Bursts of at least `min_entries` within `window_ms`.
///
/// A window starts at each entry and extends `window_ms` (inclusive). When a
/// qualifying window overlaps the cascade reported just before it, the two
/// are merged, so each burst is reported once.
pub fn detect_cascades(entries: &[SharedEntry], window_ms: u64, min_entries: usize) -> Vec<Cascade> {
    let sorted = problem_entries(entries);
    let min_entries = min_entries.max(1);
    // Inclusive index ranges into `sorted`.
    let mut ranges: Vec<(usize, usize)> = Vec::new();

    let mut end = 0;
    for start in 0..sorted.len() {
        let window_end = sorted[start].timestamp.saturating_add(window_ms);
        if end < start {
            end = start;
        }
        while end + 1 < sorted.len() && sorted[end + 1].timestamp <= window_end {
            end += 1;
        }
        if end + 1 - start < min_entries {
            continue;
        }
        match ranges.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => ranges.push((start, end)),
        }
    }

    ranges
        .into_iter()
        .map(|(first, last)| {
            let burst = &sorted[first..=last];
            let codes: BTreeSet<&str> = burst.iter().map(|e| e.code.as_str()).collect();
            let subsystems: BTreeSet<&str> = burst.iter().map(|e| e.subsystem.as_str()).collect();
            Cascade {
                start: burst[0].timestamp,
                end: burst[burst.len() - 1].timestamp,
                entry_count: burst.len(),
                distinct_codes: codes.len(),
                codes: codes.into_iter().map(str::to_owned).collect(),
                subsystems: subsystems.into_iter().map(str::to_owned).collect(),
                trigger_code: burst[0].code.clone(),
            }
        })
        .collect()
}

/// Severity verdict from fatal/error/warn counts.
///
/// `critical` with any fatal; `high` with more than 10 errors; `medium` with
/// more than 5 errors or more than 20 warnings; `low` otherwise.
pub fn assess_severity(entries: &[SharedEntry]) -> SeverityVerdict {
    let mut fatal_count = 0;
    let mut error_count = 0;
    let mut warn_count = 0;
    for entry in entries {
        match entry.level {
            LogLevel::Fatal => fatal_count += 1,
            LogLevel::Error => error_count += 1,
            LogLevel::Warn => warn_count += 1,
            _ => {}
        }
    }

    let (level, reason) = if fatal_count > 0 {
        (SeverityLevel::Critical, format!("{fatal_count} fatal entries"))
    } else if error_count > 10 {
        (SeverityLevel::High, format!("{error_count} errors (> 10)"))
    } else if error_count > 5 {
        (SeverityLevel::Medium, format!("{error_count} errors (> 5)"))
    } else if warn_count > 20 {
        (SeverityLevel::Medium, format!("{warn_count} warnings (> 20)"))
    } else {
        (SeverityLevel::Low, "error and warning volume within normal range".to_owned())
    };

    SeverityVerdict {
        level,
        reason,
        fatal_count,
        error_count,
        warn_count,
    }
}

// ---------------------------------------------------------------------------
// PatternDetector
// ---------------------------------------------------------------------------

/// Runs the detection functions with a fixed config and keeps a short verdict
/// history. The history is a display cache; detection never reads it.
#[derive(Debug, Clone, Default)]
pub struct PatternDetector {
    config: PatternConfig,
    history: VecDeque<VerdictRecord>,
}

impl PatternDetector {
    /// Detector with the given tunables.
    pub fn new(config: PatternConfig) -> Self {
        Self {
            config,
            history: VecDeque::new(),
        }
    }

    /// Active tunables.
    pub fn config(&self) -> &PatternConfig {
        &self.config
    }

    /// Analyze entries already restricted to a window by the caller.
    pub fn analyze(&mut self, entries: &[SharedEntry]) -> PatternAnalysis {
        let analysis = self.detect(entries, None);
        self.remember(&analysis, entries.iter().map(|e| e.timestamp).max().unwrap_or(0));
        analysis
    }

    /// Analyze entries with `now - window_ms <= timestamp <= now`.
    pub fn analyze_recent(&mut self, entries: &[SharedEntry], now: u64, window_ms: u64) -> PatternAnalysis {
        let start = now.saturating_sub(window_ms);
        let windowed: Vec<SharedEntry> = entries
            .iter()
            .filter(|e| e.timestamp >= start && e.timestamp <= now)
            .cloned()
            .collect();
        let analysis = self.detect(&windowed, Some((start, now)));
        self.remember(&analysis, now);
        analysis
    }

    /// Past verdicts, oldest first.
    pub fn history(&self) -> &VecDeque<VerdictRecord> {
        &self.history
    }

    /// Drop the verdict history.
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    fn detect(&self, entries: &[SharedEntry], window: Option<(u64, u64)>) -> PatternAnalysis {
        let cfg = &self.config;
        PatternAnalysis {
            analyzed: entries.iter().filter(|e| e.level.is_problem()).count(),
            window_start: window.map(|w| w.0),
            window_end: window.map(|w| w.1),
            repeating_errors: detect_repeating(entries, cfg.repeat_threshold, cfg.max_samples),
            cascades: detect_cascades(entries, cfg.cascade_window_ms, cfg.cascade_min_entries),
            severity: assess_severity(entries),
        }
    }

    fn remember(&mut self, analysis: &PatternAnalysis, at: u64) {
        if analysis.severity.level >= SeverityLevel::High {
            debug!(
                severity = analysis.severity.level.as_str(),
                repeating = analysis.repeating_errors.len(),
                cascades = analysis.cascades.len(),
                "elevated error severity"
            );
        }
        if self.config.history_limit == 0 {
            return;
        }
        self.history.push_back(VerdictRecord {
            at,
            level: analysis.severity.level,
            analyzed: analysis.analyzed,
        });
        while self.history.len() > self.config.history_limit {
            self.history.pop_front();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use wyn_log::entry::Payload;

    fn entry(seq: u64, ts: u64, level: LogLevel, code: &str, subsystem: &str) -> SharedEntry {
        Arc::new(LogEntry::new(
            seq,
            ts,
            level,
            code,
            Payload::new().subsystem(subsystem),
            None,
        ))
    }

    fn errors_at(timestamps: &[u64]) -> Vec<SharedEntry> {
        timestamps
            .iter()
            .enumerate()
            .map(|(i, ts)| entry(i as u64, *ts, LogLevel::Error, &format!("E{i}"), "core"))
            .collect()
    }

    #[test]
    fn repeating_threshold_and_ordering() {
        let mut entries = Vec::new();
        let mut seq = 0;
        for (code, n) in [("A", 3), ("B", 7), ("C", 2)] {
            for _ in 0..n {
                entries.push(entry(seq, seq * 10, LogLevel::Error, code, "core"));
                seq += 1;
            }
        }
        let found = detect_repeating(&entries, 3, 5);
        let codes: Vec<&str> = found.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, vec!["B", "A"]);
        assert_eq!(found[0].count, 7);
        assert_eq!(found[0].samples.len(), 5);
    }

    #[test]
    fn repeating_records_span_and_subsystems() {
        let entries = vec![
            entry(0, 100, LogLevel::Warn, "NET_TIMEOUT", "net"),
            entry(1, 150, LogLevel::Error, "NET_TIMEOUT", "lobby"),
            entry(2, 400, LogLevel::Error, "NET_TIMEOUT", "net"),
        ];
        let found = detect_repeating(&entries, 3, 5);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].first_seen, 100);
        assert_eq!(found[0].last_seen, 400);
        assert_eq!(found[0].span_ms(), 300);
        assert_eq!(found[0].subsystems, vec!["lobby", "net"]);
    }

    #[test]
    fn info_entries_are_ignored() {
        let entries: Vec<SharedEntry> = (0..10)
            .map(|i| entry(i, i, LogLevel::Info, "TICK", "core"))
            .collect();
        assert!(detect_repeating(&entries, 3, 5).is_empty());
        assert!(detect_cascades(&entries, 1000, 5).is_empty());
    }

    #[test]
    fn cascade_boundary_at_min_entries() {
        let five = errors_at(&[0, 200, 400, 600, 900]);
        let cascades = detect_cascades(&five, 1000, 5);
        assert_eq!(cascades.len(), 1);
        assert_eq!(cascades[0].entry_count, 5);
        assert_eq!(cascades[0].start, 0);
        assert_eq!(cascades[0].end, 900);
        assert_eq!(cascades[0].distinct_codes, 5);

        let four = errors_at(&[0, 200, 400, 900]);
        assert!(detect_cascades(&four, 1000, 5).is_empty());
    }

    #[test]
    fn overlapping_windows_merge_into_one_cascade() {
        let burst = errors_at(&[0, 100, 200, 300, 400, 500, 600, 700]);
        let cascades = detect_cascades(&burst, 1000, 5);
        assert_eq!(cascades.len(), 1);
        assert_eq!(cascades[0].entry_count, 8);
    }

    #[test]
    fn separated_bursts_are_reported_separately() {
        let bursts = errors_at(&[0, 10, 20, 30, 40, 5000, 5010, 5020, 5030, 5040]);
        let cascades = detect_cascades(&bursts, 1000, 5);
        assert_eq!(cascades.len(), 2);
        assert_eq!(cascades[1].start, 5000);
        assert_eq!(cascades[1].trigger_code, "E5");
    }

    #[test]
    fn unsorted_input_is_handled() {
        let entries = errors_at(&[900, 0, 600, 200, 400]);
        assert_eq!(detect_cascades(&entries, 1000, 5).len(), 1);
    }

    #[test]
    fn severity_rules() {
        assert_eq!(assess_severity(&[]).level, SeverityLevel::Low);
        assert_eq!(assess_severity(&errors_at(&[0; 6])).level, SeverityLevel::Medium);
        assert_eq!(assess_severity(&errors_at(&[0; 11])).level, SeverityLevel::High);
        assert_eq!(assess_severity(&errors_at(&[0; 5])).level, SeverityLevel::Low);

        let warns: Vec<SharedEntry> = (0..21)
            .map(|i| entry(i, i, LogLevel::Warn, "W", "core"))
            .collect();
        assert_eq!(assess_severity(&warns).level, SeverityLevel::Medium);

        let fatal = vec![entry(0, 0, LogLevel::Fatal, "F", "core")];
        assert_eq!(assess_severity(&fatal).level, SeverityLevel::Critical);
    }

    #[test]
    fn analyze_recent_applies_window_and_keeps_bounded_history() {
        let mut detector = PatternDetector::new(PatternConfig {
            history_limit: 2,
            ..Default::default()
        });
        let entries = vec![
            entry(0, 0, LogLevel::Fatal, "OLD_FATAL", "core"),
            entry(1, 5000, LogLevel::Error, "NEW", "core"),
        ];
        let analysis = detector.analyze_recent(&entries, 5000, 1000);
        assert_eq!(analysis.analyzed, 1);
        assert_eq!(analysis.severity.level, SeverityLevel::Low);
        assert_eq!(analysis.window_start, Some(4000));

        detector.analyze(&entries);
        detector.analyze(&entries);
        assert_eq!(detector.history().len(), 2);
        assert_eq!(detector.history()[1].level, SeverityLevel::Critical);
    }
}
