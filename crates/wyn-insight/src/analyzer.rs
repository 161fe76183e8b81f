//! Statistics, health scoring, trends and recommendations.
//!
//! All functions here are pure: they take a slice of entries plus explicit
//! parameters (window, bucket size, "now") and return a fresh result. Calling
//! them twice with the same input returns the same output.
//!
//! # Health score
//!
//! For a subsystem's entries inside the window:
//!
//! ```text
//! health = clamp(100 - 100 * error_rate - 30 * warn_rate, 0, 100)
//! ```
//!
//! where `error_rate` counts both `ERROR` and `FATAL` entries. Status bands:
//! `healthy >= 80`, `degraded >= 60`, `unhealthy >= 40`, else `critical`.
//!
//! # Causal candidates
//!
//! [`LogAnalyzer::causal_links`] pairs consecutive error-level entries from the
//! same subsystem that occur within [`AnalyzerConfig::causal_window_ms`]
//! (100 ms by default). Temporal adjacency is a heuristic for "A probably
//! triggered B", nothing stronger.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use wyn_log::entry::{LogEntry, SharedEntry};
use wyn_log::level::LogLevel;

use crate::patterns::{EntrySample, PatternAnalysis};

// ---------------------------------------------------------------------------
// AnalyzerConfig
// ---------------------------------------------------------------------------

/// Tunables for the analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Maximum gap between a cause and its effect.
    pub causal_window_ms: u64,
    /// Window used for health scoring.
    pub health_window_ms: u64,
    /// Width of one trend bucket.
    pub trend_bucket_ms: u64,
    /// Ratio between first and last bucket errors that flips the trend.
    pub trend_ratio: f64,
    /// Number of entries in top-N rankings.
    pub top_n: usize,
    /// Error count above which a high-priority recommendation is raised.
    pub error_alert_threshold: usize,
}

impl Default for AnalyzerConfig {
    /// 100 ms causality, 60 s health window and buckets, 1.5x trend ratio,
    /// top 10, alert above 10 errors.
    fn default() -> Self {
        Self {
            causal_window_ms: 100,
            health_window_ms: 60_000,
            trend_bucket_ms: 60_000,
            trend_ratio: 1.5,
            top_n: 10,
            error_alert_threshold: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Time covered by a set of entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSpan {
    /// Earliest timestamp.
    pub start: u64,
    /// Latest timestamp.
    pub end: u64,
    /// `end - start`.
    pub duration_ms: u64,
}

/// A name and how often it occurred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ranked {
    /// Subsystem or code.
    pub name: String,
    /// Occurrences.
    pub count: usize,
}

/// Frequency breakdown of a set of entries.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Statistics {
    /// Number of entries.
    pub total: usize,
    /// Count per level.
    pub by_level: BTreeMap<LogLevel, usize>,
    /// Count per subsystem.
    pub by_subsystem: BTreeMap<String, usize>,
    /// Count per code.
    pub by_code: BTreeMap<String, usize>,
    /// Most frequent subsystems.
    pub top_subsystems: Vec<Ranked>,
    /// Most frequent codes.
    pub top_codes: Vec<Ranked>,
    /// Time covered; `None` for an empty set.
    pub time_span: Option<TimeSpan>,
}

impl Statistics {
    /// Entries at `level`.
    pub fn count(&self, level: LogLevel) -> usize {
        self.by_level.get(&level).copied().unwrap_or(0)
    }

    /// `ERROR` plus `FATAL` entries.
    pub fn error_count(&self) -> usize {
        self.count(LogLevel::Error) + self.count(LogLevel::Fatal)
    }
}

/// Candidate cause/effect pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CausalLink {
    /// Earlier entry.
    pub cause: EntrySample,
    /// Later entry.
    pub effect: EntrySample,
    /// Milliseconds between the two.
    pub time_diff_ms: u64,
}

/// Health band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Score 80 and above.
    Healthy,
    /// Score 60 to 79.
    Degraded,
    /// Score 40 to 59.
    Unhealthy,
    /// Score below 40.
    Critical,
}

impl HealthStatus {
    /// Band for a 0-100 score.
    pub fn from_score(score: u8) -> Self {
        match score {
            80.. => Self::Healthy,
            60..=79 => Self::Degraded,
            40..=59 => Self::Unhealthy,
            _ => Self::Critical,
        }
    }

    /// Lower-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
            Self::Critical => "critical",
        }
    }
}

/// Direction of error volume over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    /// Fewer errors later.
    Improving,
    /// No significant change.
    Stable,
    /// More errors later.
    Degrading,
}

impl Trend {
    /// Lower-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Improving => "improving",
            Self::Stable => "stable",
            Self::Degrading => "degrading",
        }
    }
}

/// Health of one subsystem over a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubsystemHealth {
    /// Subsystem name.
    pub subsystem: String,
    /// Score from 0 (broken) to 100 (clean).
    pub health: u8,
    /// Band of the score.
    pub status: HealthStatus,
    /// `ERROR` plus `FATAL` entries.
    pub error_count: usize,
    /// `WARN` entries.
    pub warn_count: usize,
    /// All entries from the subsystem in the window.
    pub total_logs: usize,
    /// `error_count / total_logs`, 0 when empty.
    pub error_rate: f64,
    /// First-half vs. second-half error comparison.
    pub trend: Trend,
}

/// One fixed-width slice of time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendBucket {
    /// Inclusive start.
    pub start: u64,
    /// Exclusive end.
    pub end: u64,
    /// Entries in the bucket.
    pub total: usize,
    /// `ERROR` plus `FATAL` entries.
    pub errors: usize,
    /// `WARN` entries.
    pub warns: usize,
    /// `errors / total`, 0 when empty.
    pub error_rate: f64,
}

/// Bucketed error volume and its overall direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendReport {
    /// Bucket width.
    pub bucket_ms: u64,
    /// Buckets in chronological order.
    pub buckets: Vec<TrendBucket>,
    /// Overall direction.
    pub trend: Trend,
}

/// Priority of a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Worth a look.
    Low,
    /// Should be addressed.
    Medium,
    /// Address first.
    High,
}

/// One actionable recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// How urgent it is.
    pub priority: Priority,
    /// Area it concerns (`"errors"`, `"health"`, `"trend"`, `"patterns"`).
    pub category: String,
    /// What was observed.
    pub message: String,
    /// What to do about it.
    pub action: String,
}

/// Everything the analyzer derives from one set of entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Frequency breakdown.
    pub statistics: Statistics,
    /// Causal candidates.
    pub causal_links: Vec<CausalLink>,
    /// Health per subsystem, worst first.
    pub subsystem_health: Vec<SubsystemHealth>,
    /// Bucketed error volume.
    pub trends: TrendReport,
    /// Recommendations, highest priority first.
    pub recommendations: Vec<Recommendation>,
}

// ---------------------------------------------------------------------------
// LogAnalyzer
// ---------------------------------------------------------------------------

/// Stateless analyzer parameterised by [`AnalyzerConfig`].
#[derive(Debug, Clone, Default)]
pub struct LogAnalyzer {
    config: AnalyzerConfig,
}

impl LogAnalyzer {
    /// Analyzer with the given tunables.
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    /// Active tunables.
    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Counts by level, subsystem and code, top-N rankings and time span.
    pub fn statistics(&self, entries: &[SharedEntry]) -> Statistics {
        let mut stats = Statistics {
            total: entries.len(),
            ..Default::default()
        };
        for entry in entries {
            *stats.by_level.entry(entry.level).or_insert(0) += 1;
            *stats.by_subsystem.entry(entry.subsystem.clone()).or_insert(0) += 1;
            *stats.by_code.entry(entry.code.clone()).or_insert(0) += 1;
        }
        stats.top_subsystems = top_n(&stats.by_subsystem, self.config.top_n);
        stats.top_codes = top_n(&stats.by_code, self.config.top_n);

        let start = entries.iter().map(|e| e.timestamp).min();
        let end = entries.iter().map(|e| e.timestamp).max();
        stats.time_span = start.zip(end).map(|(start, end)| TimeSpan {
            start,
            end,
            duration_ms: end - start,
        });
        stats
    }

    /// Consecutive error-level entries in one subsystem within the causal
    /// window. See the [module docs](self).
    pub fn causal_links(&self, entries: &[SharedEntry]) -> Vec<CausalLink> {
        let errors = sorted_by_time(entries.iter().map(|e| &**e).filter(|e| e.level.is_error()));

        let mut links = Vec::new();
        for pair in errors.windows(2) {
            let (cause, effect) = (pair[0], pair[1]);
            if cause.subsystem != effect.subsystem {
                continue;
            }
            let diff = effect.timestamp - cause.timestamp;
            if diff <= self.config.causal_window_ms {
                links.push(CausalLink {
                    cause: EntrySample::from(cause),
                    effect: EntrySample::from(effect),
                    time_diff_ms: diff,
                });
            }
        }
        links
    }

    /// Health of `subsystem` over entries in `[now - window_ms, now]`.
    pub fn subsystem_health(
        &self,
        entries: &[SharedEntry],
        subsystem: &str,
        now: u64,
        window_ms: u64,
    ) -> SubsystemHealth {
        let start = now.saturating_sub(window_ms);
        let scoped = sorted_by_time(
            entries
                .iter()
                .map(|e| &**e)
                .filter(|e| e.subsystem == subsystem && e.timestamp >= start && e.timestamp <= now),
        );
        health_of(subsystem, &scoped)
    }

    /// Health of every subsystem present in the window, worst first.
    pub fn all_subsystem_health(
        &self,
        entries: &[SharedEntry],
        now: u64,
        window_ms: u64,
    ) -> Vec<SubsystemHealth> {
        let start = now.saturating_sub(window_ms);
        let mut by_subsystem: BTreeMap<&str, Vec<&LogEntry>> = BTreeMap::new();
        for entry in entries
            .iter()
            .map(|e| &**e)
            .filter(|e| e.timestamp >= start && e.timestamp <= now)
        {
            by_subsystem.entry(entry.subsystem.as_str()).or_default().push(entry);
        }

        let mut health: Vec<SubsystemHealth> = by_subsystem
            .into_iter()
            .map(|(name, group)| health_of(name, &sorted_by_time(group.into_iter())))
            .collect();
        health.sort_by(|a, b| a.health.cmp(&b.health).then_with(|| a.subsystem.cmp(&b.subsystem)));
        health
    }

    /// Fixed-width buckets from the first timestamp and the overall trend.
    ///
    /// Only non-empty buckets are reported, so the cost follows the number
    /// of entries rather than the time span they cover.
    pub fn trends(&self, entries: &[SharedEntry], bucket_ms: u64) -> TrendReport {
        let bucket_ms = bucket_ms.max(1);
        let Some(first) = entries.iter().map(|e| e.timestamp).min() else {
            return TrendReport {
                bucket_ms,
                buckets: Vec::new(),
                trend: Trend::Stable,
            };
        };

        let mut by_index: BTreeMap<u64, TrendBucket> = BTreeMap::new();
        for entry in entries {
            let index = (entry.timestamp - first) / bucket_ms;
            let bucket = by_index.entry(index).or_insert_with(|| {
                let start = first + index * bucket_ms;
                TrendBucket {
                    start,
                    end: start.saturating_add(bucket_ms),
                    total: 0,
                    errors: 0,
                    warns: 0,
                    error_rate: 0.0,
                }
            });
            bucket.total += 1;
            if entry.level.is_error() {
                bucket.errors += 1;
            } else if entry.level == LogLevel::Warn {
                bucket.warns += 1;
            }
        }
        let mut buckets: Vec<TrendBucket> = by_index.into_values().collect();
        for bucket in &mut buckets {
            bucket.error_rate = rate(bucket.errors, bucket.total);
        }

        let trend = if buckets.len() < 2 {
            Trend::Stable
        } else {
            compare_errors(
                buckets[0].errors,
                buckets[buckets.len() - 1].errors,
                self.config.trend_ratio,
            )
        };

        TrendReport {
            bucket_ms,
            buckets,
            trend,
        }
    }

    /// Rule-ordered recommendations, highest priority first.
    ///
    /// Rules, in order: error volume above the alert threshold; each
    /// critical/unhealthy subsystem (high) and degraded subsystem (medium);
    /// degrading trend; repeating errors; cascades.
    pub fn recommendations(
        &self,
        stats: &Statistics,
        health: &[SubsystemHealth],
        trends: &TrendReport,
        patterns: Option<&PatternAnalysis>,
    ) -> Vec<Recommendation> {
        let mut recs = Vec::new();

        let errors = stats.error_count();
        if errors > self.config.error_alert_threshold {
            recs.push(Recommendation {
                priority: Priority::High,
                category: "errors".to_owned(),
                message: format!("{errors} errors in the analyzed set"),
                action: "Inspect the top error codes and fix the most frequent first".to_owned(),
            });
        }

        for h in health {
            let priority = match h.status {
                HealthStatus::Critical | HealthStatus::Unhealthy => Priority::High,
                HealthStatus::Degraded => Priority::Medium,
                HealthStatus::Healthy => continue,
            };
            recs.push(Recommendation {
                priority,
                category: "health".to_owned(),
                message: format!(
                    "Subsystem '{}' is {} (health {}, {} errors / {} logs)",
                    h.subsystem,
                    h.status.as_str(),
                    h.health,
                    h.error_count,
                    h.total_logs
                ),
                action: format!("Review recent errors from '{}'", h.subsystem),
            });
        }

        if trends.trend == Trend::Degrading {
            recs.push(Recommendation {
                priority: Priority::Medium,
                category: "trend".to_owned(),
                message: "Error volume is increasing over time".to_owned(),
                action: "Correlate the increase with recent gameplay or asset changes".to_owned(),
            });
        }

        if let Some(patterns) = patterns {
            if let Some(top) = patterns.repeating_errors.first() {
                recs.push(Recommendation {
                    priority: if top.count >= 10 { Priority::High } else { Priority::Medium },
                    category: "patterns".to_owned(),
                    message: format!(
                        "{} repeating error code(s); '{}' occurred {} times",
                        patterns.repeating_errors.len(),
                        top.code,
                        top.count
                    ),
                    action: format!("Look up suggestions for '{}' and fix the root cause", top.code),
                });
            }
            if !patterns.cascades.is_empty() {
                recs.push(Recommendation {
                    priority: Priority::High,
                    category: "patterns".to_owned(),
                    message: format!("{} error cascade(s) detected", patterns.cascades.len()),
                    action: "Find the first error in each cascade; later errors are likely symptoms"
                        .to_owned(),
                });
            }
        }

        // Stable: rule order is preserved within one priority.
        recs.sort_by(|a, b| b.priority.cmp(&a.priority));
        recs
    }

    /// Statistics, causal links, health, trends and recommendations in one
    /// report. Health uses the configured window ending at `now`.
    pub fn analyze(
        &self,
        entries: &[SharedEntry],
        now: u64,
        patterns: Option<&PatternAnalysis>,
    ) -> AnalysisReport {
        let statistics = self.statistics(entries);
        let causal_links = self.causal_links(entries);
        let subsystem_health = self.all_subsystem_health(entries, now, self.config.health_window_ms);
        let trends = self.trends(entries, self.config.trend_bucket_ms);
        let recommendations = self.recommendations(&statistics, &subsystem_health, &trends, patterns);
        AnalysisReport {
            statistics,
            causal_links,
            subsystem_health,
            trends,
            recommendations,
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn sorted_by_time<'a>(entries: impl Iterator<Item = &'a LogEntry>) -> Vec<&'a LogEntry> {
    let mut sorted: Vec<&LogEntry> = entries.collect();
    sorted.sort_by_key(|e| (e.timestamp, e.sequence));
    sorted
}

fn rate(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

fn top_n(counts: &BTreeMap<String, usize>, n: usize) -> Vec<Ranked> {
    let mut ranked: Vec<Ranked> = counts
        .iter()
        .map(|(name, count)| Ranked {
            name: name.clone(),
            count: *count,
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    ranked.truncate(n);
    ranked
}

/// Compare an earlier and a later error count with a ratio threshold.
fn compare_errors(earlier: usize, later: usize, ratio: f64) -> Trend {
    let (earlier, later) = (earlier as f64, later as f64);
    if later > earlier * ratio {
        Trend::Degrading
    } else if earlier > later * ratio {
        Trend::Improving
    } else {
        Trend::Stable
    }
}

/// `100 - 100 * error_rate - 30 * warn_rate`, clamped to `0..=100` and
/// rounded. An empty set scores 100.
pub fn health_score(errors: usize, warns: usize, total: usize) -> u8 {
    let (error_rate, warn_rate) = (rate(errors, total), rate(warns, total));
    (100.0 - 100.0 * error_rate - 30.0 * warn_rate)
        .clamp(0.0, 100.0)
        .round() as u8
}

/// Score one subsystem's time-sorted entries.
fn health_of(subsystem: &str, entries: &[&LogEntry]) -> SubsystemHealth {
    let total_logs = entries.len();
    let error_count = entries.iter().filter(|e| e.level.is_error()).count();
    let warn_count = entries.iter().filter(|e| e.level == LogLevel::Warn).count();
    let error_rate = rate(error_count, total_logs);

    let score = health_score(error_count, warn_count, total_logs);

    let half = total_logs / 2;
    let first_errors = entries[..half].iter().filter(|e| e.level.is_error()).count();
    let second_errors = entries[half..].iter().filter(|e| e.level.is_error()).count();
    let trend = match second_errors.cmp(&first_errors) {
        std::cmp::Ordering::Greater => Trend::Degrading,
        std::cmp::Ordering::Less => Trend::Improving,
        std::cmp::Ordering::Equal => Trend::Stable,
    };

    SubsystemHealth {
        subsystem: subsystem.to_owned(),
        health: score,
        status: HealthStatus::from_score(score),
        error_count,
        warn_count,
        total_logs,
        error_rate,
        trend,
    }
}

/// Distinct subsystems in a set of entries, sorted.
pub fn subsystems(entries: &[SharedEntry]) -> Vec<String> {
    let set: BTreeSet<&str> = entries.iter().map(|e| e.subsystem.as_str()).collect();
    set.into_iter().map(str::to_owned).collect()
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

    fn analyzer() -> LogAnalyzer {
        LogAnalyzer::default()
    }

    #[test]
    fn statistics_counts_and_ranks() {
        let entries = vec![
            entry(0, 10, LogLevel::Info, "A", "scene"),
            entry(1, 20, LogLevel::Error, "B", "physics"),
            entry(2, 30, LogLevel::Error, "B", "physics"),
            entry(3, 70, LogLevel::Warn, "C", "audio"),
        ];
        let stats = analyzer().statistics(&entries);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.count(LogLevel::Error), 2);
        assert_eq!(stats.top_subsystems[0], Ranked { name: "physics".into(), count: 2 });
        assert_eq!(stats.top_codes[0].name, "B");
        assert_eq!(stats.time_span.unwrap().duration_ms, 60);
    }

    #[test]
    fn empty_input_yields_empty_results() {
        let a = analyzer();
        let stats = a.statistics(&[]);
        assert_eq!(stats.total, 0);
        assert!(stats.time_span.is_none());
        assert!(a.causal_links(&[]).is_empty());
        assert!(a.trends(&[], 1000).buckets.is_empty());
        let health = a.subsystem_health(&[], "physics", 1000, 1000);
        assert_eq!(health.health, 100);
        assert_eq!(health.status, HealthStatus::Healthy);
        assert_eq!(health.trend, Trend::Stable);
    }

    #[test]
    fn causal_links_need_same_subsystem_and_short_gap() {
        let entries = vec![
            entry(0, 0, LogLevel::Error, "BODY_MISSING", "physics"),
            entry(1, 50, LogLevel::Error, "STEP_FAILED", "physics"),
            entry(2, 60, LogLevel::Error, "SOUND_FAILED", "audio"),
            entry(3, 400, LogLevel::Error, "STEP_FAILED", "physics"),
            entry(4, 420, LogLevel::Warn, "SLOW", "physics"),
        ];
        let links = analyzer().causal_links(&entries);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].cause.code, "BODY_MISSING");
        assert_eq!(links[0].effect.code, "STEP_FAILED");
        assert_eq!(links[0].time_diff_ms, 50);
    }

    #[test]
    fn health_score_and_bands() {
        // 2 errors, 1 warn, 1 info: 100 - 50 - 7.5 = 42.5 -> 43 (round half away).
        let entries = vec![
            entry(0, 0, LogLevel::Info, "OK", "physics"),
            entry(1, 10, LogLevel::Warn, "SLOW", "physics"),
            entry(2, 20, LogLevel::Error, "FAIL", "physics"),
            entry(3, 30, LogLevel::Error, "FAIL", "physics"),
            entry(4, 40, LogLevel::Error, "OTHER", "audio"),
        ];
        let health = analyzer().subsystem_health(&entries, "physics", 100, 60_000);
        assert_eq!(health.total_logs, 4);
        assert_eq!(health.error_count, 2);
        assert_eq!(health.warn_count, 1);
        assert_eq!(health.health, 43);
        assert_eq!(health.status, HealthStatus::Unhealthy);
        assert_eq!(health.trend, Trend::Degrading);
        assert_eq!(health.error_rate, 0.5);
    }

    #[test]
    fn health_is_deterministic() {
        let entries: Vec<SharedEntry> = (0..50)
            .map(|i| {
                let level = if i % 3 == 0 { LogLevel::Error } else { LogLevel::Info };
                entry(i, i * 7, level, "X", "scene")
            })
            .collect();
        let a = analyzer();
        let first = a.subsystem_health(&entries, "scene", 1000, 60_000);
        for _ in 0..5 {
            assert_eq!(a.subsystem_health(&entries, "scene", 1000, 60_000), first);
        }
    }

    #[test]
    fn status_bands() {
        assert_eq!(HealthStatus::from_score(100), HealthStatus::Healthy);
        assert_eq!(HealthStatus::from_score(80), HealthStatus::Healthy);
        assert_eq!(HealthStatus::from_score(79), HealthStatus::Degraded);
        assert_eq!(HealthStatus::from_score(40), HealthStatus::Unhealthy);
        assert_eq!(HealthStatus::from_score(39), HealthStatus::Critical);
    }

    #[test]
    fn trend_buckets_compare_first_and_last() {
        let mut entries = vec![entry(0, 0, LogLevel::Error, "E", "core")];
        for i in 0..4 {
            entries.push(entry(1 + i, 2500 + i, LogLevel::Error, "E", "core"));
        }
        let report = analyzer().trends(&entries, 1000);
        // The empty 1000..2000 bucket is skipped.
        assert_eq!(report.buckets.len(), 2);
        assert_eq!(report.buckets[0].errors, 1);
        assert_eq!(report.buckets[1].start, 2000);
        assert_eq!(report.buckets[1].errors, 4);
        assert_eq!(report.trend, Trend::Degrading);

        let flat = vec![
            entry(0, 0, LogLevel::Error, "E", "core"),
            entry(1, 1500, LogLevel::Error, "E", "core"),
        ];
        assert_eq!(analyzer().trends(&flat, 1000).trend, Trend::Stable);
    }

    #[test]
    fn trend_buckets_over_far_apart_timestamps() {
        let entries = vec![
            entry(0, 0, LogLevel::Error, "E", "core"),
            entry(1, u64::MAX, LogLevel::Error, "E", "core"),
        ];
        let report = analyzer().trends(&entries, 1);
        assert_eq!(report.buckets.len(), 2);
        assert_eq!(report.buckets[1].start, u64::MAX);
        assert_eq!(report.buckets[1].end, u64::MAX);

        let entries = vec![
            entry(0, 0, LogLevel::Warn, "W", "core"),
            entry(1, 6_000_000_000, LogLevel::Error, "E", "core"),
        ];
        let report = analyzer().trends(&entries, 60_000);
        assert_eq!(report.buckets.len(), 2);
        assert_eq!(report.buckets[1].start, 6_000_000_000);
        assert_eq!(report.buckets.iter().map(|b| b.total).sum::<usize>(), 2);
    }

    #[test]
    fn recommendations_sorted_by_priority() {
        let a = analyzer();
        let mut entries = Vec::new();
        for i in 0..12 {
            entries.push(entry(i, i * 10, LogLevel::Error, "PHYSICS_UPDATE_ERROR", "physics"));
        }
        entries.push(entry(12, 500, LogLevel::Info, "OK", "scene"));
        let report = a.analyze(&entries, 1000, None);
        assert!(!report.recommendations.is_empty());
        assert_eq!(report.recommendations[0].priority, Priority::High);
        assert!(report
            .recommendations
            .windows(2)
            .all(|w| w[0].priority >= w[1].priority));
        assert_eq!(report.subsystem_health[0].subsystem, "physics");
    }
}
