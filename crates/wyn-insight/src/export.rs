//! Rendering entries and analysis for humans and tools.
//!
//! Every function is a pure transform from entries (plus options) to a
//! `String`. JSON-producing functions return [`InsightError`] on
//! serialisation failure; the text formats cannot fail.

use std::fmt::Write as _;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use wyn_log::entry::{LogEntry, SharedEntry};

use crate::analyzer::{AnalyzerConfig, LogAnalyzer};
use crate::patterns::PatternAnalysis;
use crate::InsightError;

/// Errors shown in detail in the markdown report.
const MARKDOWN_ERROR_DETAIL: usize = 10;

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Full JSON document with analysis.
    #[default]
    Json,
    /// Markdown report.
    Markdown,
    /// One CSV row per entry.
    Csv,
    /// JSON array with single-letter keys.
    Compact,
    /// Aggregated metrics only, as JSON.
    Summary,
    /// Fixed-width terminal lines.
    Console,
}

impl ExportFormat {
    /// All formats.
    pub const ALL: [ExportFormat; 6] = [
        Self::Json,
        Self::Markdown,
        Self::Csv,
        Self::Compact,
        Self::Summary,
        Self::Console,
    ];

    /// Lower-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Markdown => "markdown",
            Self::Csv => "csv",
            Self::Compact => "compact",
            Self::Summary => "summary",
            Self::Console => "console",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = InsightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "markdown" | "md" => Ok(Self::Markdown),
            "csv" => Ok(Self::Csv),
            "compact" => Ok(Self::Compact),
            "summary" => Ok(Self::Summary),
            "console" | "text" => Ok(Self::Console),
            _ => Err(InsightError::UnknownFormat(s.to_owned())),
        }
    }
}

/// Extra inputs for the rich formats.
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// "Now" for window-based health scoring; defaults to the newest entry.
    pub now: Option<u64>,
    /// Analyzer tunables.
    pub analyzer: AnalyzerConfig,
    /// Keep full context snapshots on exported entries.
    pub include_context: bool,
    /// Caller-supplied context attached to the JSON document.
    pub context: Option<Value>,
    /// Pattern analysis to embed.
    pub patterns: Option<PatternAnalysis>,
}

impl ExportOptions {
    fn now_for(&self, entries: &[SharedEntry]) -> u64 {
        self.now
            .unwrap_or_else(|| entries.iter().map(|e| e.timestamp).max().unwrap_or(0))
    }
}

/// Render `entries` in `format`.
pub fn export(
    entries: &[SharedEntry],
    format: ExportFormat,
    options: &ExportOptions,
) -> Result<String, InsightError> {
    match format {
        ExportFormat::Json => to_json(entries, options),
        ExportFormat::Markdown => Ok(to_markdown(entries, options)),
        ExportFormat::Csv => Ok(to_csv(entries)),
        ExportFormat::Compact => to_compact(entries),
        ExportFormat::Summary => to_summary(entries, options),
        ExportFormat::Console => Ok(to_console(entries)),
    }
}

// ---------------------------------------------------------------------------
// JSON formats
// ---------------------------------------------------------------------------

/// Pretty JSON: entries, statistics, causal links, subsystem health,
/// trends, recommendations, and optional context and patterns.
pub fn to_json(entries: &[SharedEntry], options: &ExportOptions) -> Result<String, InsightError> {
    let analyzer = LogAnalyzer::new(options.analyzer.clone());
    let report = analyzer.analyze(entries, options.now_for(entries), options.patterns.as_ref());

    let exported: Vec<LogEntry> = entries
        .iter()
        .map(|e| {
            if options.include_context {
                LogEntry::clone(e)
            } else {
                e.with_frame_only_context()
            }
        })
        .collect();

    let mut doc = json!({
        "entry_count": entries.len(),
        "entries": exported,
        "statistics": report.statistics,
        "causal_analysis": report.causal_links,
        "subsystem_health": report.subsystem_health,
        "trends": report.trends,
        "recommendations": report.recommendations,
    });
    if let Some(context) = &options.context {
        doc["context"] = context.clone();
    }
    if let Some(patterns) = &options.patterns {
        doc["patterns"] = serde_json::to_value(patterns)?;
    }
    Ok(serde_json::to_string_pretty(&doc)?)
}

#[derive(Serialize)]
struct CompactEntry<'a> {
    t: u64,
    l: &'a str,
    s: &'a str,
    c: &'a str,
    m: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    f: Option<u64>,
}

/// JSON array with keys `t` (timestamp), `l` (level), `s` (subsystem),
/// `c` (code), `m` (message) and `f` (frame, when known).
pub fn to_compact(entries: &[SharedEntry]) -> Result<String, InsightError> {
    let compact: Vec<CompactEntry<'_>> = entries
        .iter()
        .map(|e| CompactEntry {
            t: e.timestamp,
            l: e.level.as_str(),
            s: &e.subsystem,
            c: &e.code,
            m: &e.message,
            f: e.frame(),
        })
        .collect();
    Ok(serde_json::to_string(&compact)?)
}

/// Aggregated metrics without any entries.
pub fn to_summary(entries: &[SharedEntry], options: &ExportOptions) -> Result<String, InsightError> {
    let analyzer = LogAnalyzer::new(options.analyzer.clone());
    let now = options.now_for(entries);
    let stats = analyzer.statistics(entries);
    let health = analyzer.all_subsystem_health(entries, now, options.analyzer.health_window_ms);
    let trends = analyzer.trends(entries, options.analyzer.trend_bucket_ms);
    let recommendations = analyzer.recommendations(&stats, &health, &trends, options.patterns.as_ref());

    let doc = json!({
        "total": stats.total,
        "errors": stats.error_count(),
        "by_level": stats.by_level,
        "top_subsystems": stats.top_subsystems,
        "top_codes": stats.top_codes,
        "time_span": stats.time_span,
        "subsystem_health": health
            .iter()
            .map(|h| json!({ "subsystem": h.subsystem, "health": h.health, "status": h.status }))
            .collect::<Vec<_>>(),
        "trend": trends.trend,
        "recommendation_count": recommendations.len(),
    });
    Ok(serde_json::to_string_pretty(&doc)?)
}

// ---------------------------------------------------------------------------
// Text formats
// ---------------------------------------------------------------------------

/// Markdown report.
pub fn to_markdown(entries: &[SharedEntry], options: &ExportOptions) -> String {
    let analyzer = LogAnalyzer::new(options.analyzer.clone());
    let report = analyzer.analyze(entries, options.now_for(entries), options.patterns.as_ref());
    let stats = &report.statistics;

    // Writing into a String cannot fail.
    let mut out = String::new();
    let _ = writeln!(out, "# Log Analysis Report\n");
    let _ = writeln!(out, "## Statistics\n");
    let _ = writeln!(out, "- Total entries: {}", stats.total);
    if let Some(span) = stats.time_span {
        let _ = writeln!(out, "- Time span: {} ms ({} to {})", span.duration_ms, span.start, span.end);
    }
    let _ = writeln!(out, "\n| Level | Count |\n|-------|-------|");
    for (level, count) in &stats.by_level {
        let _ = writeln!(out, "| {level} | {count} |");
    }

    if !stats.top_subsystems.is_empty() {
        let _ = writeln!(out, "\n| Subsystem | Count |\n|-----------|-------|");
        for ranked in &stats.top_subsystems {
            let _ = writeln!(out, "| {} | {} |", md_cell(&ranked.name), ranked.count);
        }
    }
    if !stats.top_codes.is_empty() {
        let _ = writeln!(out, "\n| Code | Count |\n|------|-------|");
        for ranked in &stats.top_codes {
            let _ = writeln!(out, "| {} | {} |", md_cell(&ranked.name), ranked.count);
        }
    }

    if !report.subsystem_health.is_empty() {
        let _ = writeln!(out, "\n## Subsystem Health\n");
        let _ = writeln!(out, "| Subsystem | Health | Status | Errors | Warnings | Trend |");
        let _ = writeln!(out, "|-----------|--------|--------|--------|----------|-------|");
        for h in &report.subsystem_health {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} | {} | {} |",
                md_cell(&h.subsystem),
                h.health,
                h.status.as_str(),
                h.error_count,
                h.warn_count,
                h.trend.as_str()
            );
        }
    }

    if !report.recommendations.is_empty() {
        let _ = writeln!(out, "\n## Recommendations\n");
        for (i, rec) in report.recommendations.iter().enumerate() {
            let _ = writeln!(
                out,
                "{}. **[{:?}]** {}: {}\n   - Action: {}",
                i + 1,
                rec.priority,
                rec.category,
                rec.message,
                rec.action
            );
        }
    }

    let errors: Vec<&SharedEntry> = entries.iter().filter(|e| e.level.is_error()).collect();
    if !errors.is_empty() {
        let _ = writeln!(out, "\n## Recent Errors\n");
        for e in errors.iter().rev().take(MARKDOWN_ERROR_DETAIL) {
            let _ = writeln!(out, "### {} `{}` ({})\n", e.level, e.code, e.subsystem);
            let _ = writeln!(out, "- Timestamp: {}", e.timestamp);
            if let Some(frame) = e.frame() {
                let _ = writeln!(out, "- Frame: {frame}");
            }
            let _ = writeln!(out, "- Message: {}", e.message);
            if let Some(hint) = e.hint() {
                let _ = writeln!(out, "- Hint: {hint}");
            }
            if let Some(stack) = e.payload.error.as_ref().and_then(|err| err.stack.as_deref()) {
                let _ = writeln!(out, "\n```\n{stack}\n```");
            }
            let _ = writeln!(out);
        }
    }
    out
}

/// CSV with header `timestamp,level,subsystem,code,message,frame`.
///
/// Text fields are always quoted; embedded quotes are doubled and line
/// breaks are folded to spaces so every entry is exactly one line.
pub fn to_csv(entries: &[SharedEntry]) -> String {
    let mut out = String::from("timestamp,level,subsystem,code,message,frame\n");
    for e in entries {
        let frame = e.frame().map(|f| f.to_string()).unwrap_or_default();
        let _ = writeln!(
            out,
            "{},{},{},{},{},{}",
            e.timestamp,
            e.level,
            csv_field(&e.subsystem),
            csv_field(&e.code),
            csv_field(&e.message),
            frame
        );
    }
    out
}

/// Fixed-width lines; error entries with a hint get an indented `hint:`
/// line.
pub fn to_console(entries: &[SharedEntry]) -> String {
    let mut out = String::new();
    for e in entries {
        let frame = e.frame().map(|f| format!("#{f}")).unwrap_or_else(|| "-".to_owned());
        let _ = writeln!(
            out,
            "{:>10} {:<5} {:>8} [{:<10}] {}: {}",
            e.timestamp,
            e.level,
            frame,
            truncate(&e.subsystem, 10),
            e.code,
            single_line(&e.message)
        );
        if e.level.is_error() {
            if let Some(hint) = e.hint() {
                let _ = writeln!(out, "{:>27}hint: {}", "", single_line(hint));
            }
        }
    }
    out
}

fn single_line(s: &str) -> String {
    s.replace("\r\n", " ").replace(['\n', '\r'], " ")
}

fn csv_field(s: &str) -> String {
    format!("\"{}\"", single_line(s).replace('"', "\"\""))
}

fn md_cell(s: &str) -> String {
    single_line(s).replace('|', "\\|")
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
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
    use wyn_log::level::LogLevel;

    fn entry(seq: u64, ts: u64, level: LogLevel, code: &str, payload: Payload) -> SharedEntry {
        Arc::new(LogEntry::new(seq, ts, level, code, payload, None))
    }

    #[test]
    fn format_parsing() {
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!("Markdown".parse::<ExportFormat>().unwrap(), ExportFormat::Markdown);
        assert_eq!(" csv ".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert!(matches!(
            "yaml".parse::<ExportFormat>(),
            Err(InsightError::UnknownFormat(_))
        ));
        for format in ExportFormat::ALL {
            assert_eq!(format.as_str().parse::<ExportFormat>().unwrap(), format);
        }
    }

    #[test]
    fn csv_escapes_quotes_and_newlines() {
        let entries = vec![entry(
            0,
            5,
            LogLevel::Error,
            "SAVE_FAILED",
            Payload::new().subsystem("save").message("bad \"slot\"\nretrying"),
        )];
        let csv = to_csv(&entries);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "5,ERROR,\"save\",\"SAVE_FAILED\",\"bad \"\"slot\"\" retrying\",");
    }

    #[test]
    fn compact_uses_short_keys() {
        let entries = vec![entry(0, 7, LogLevel::Warn, "W", Payload::new().subsystem("audio"))];
        let value: Value = serde_json::from_str(&to_compact(&entries).unwrap()).unwrap();
        assert_eq!(value[0]["t"], 7);
        assert_eq!(value[0]["l"], "WARN");
        assert_eq!(value[0]["s"], "audio");
        assert_eq!(value[0]["c"], "W");
        assert!(value[0].get("f").is_none());
    }

    #[test]
    fn console_prints_hints_for_errors_only() {
        let entries = vec![
            entry(0, 1, LogLevel::Warn, "A", Payload::new().hint("ignored")),
            entry(1, 2, LogLevel::Error, "B", Payload::new().hint("check the asset path")),
        ];
        let text = to_console(&entries);
        assert_eq!(text.lines().count(), 3);
        assert!(text.contains("hint: check the asset path"));
        assert!(!text.contains("ignored"));
    }

    #[test]
    fn markdown_has_sections() {
        let entries = vec![
            entry(0, 1, LogLevel::Info, "OK", Payload::new().subsystem("scene")),
            entry(1, 2, LogLevel::Error, "FAIL", Payload::new().subsystem("physics")),
        ];
        let md = to_markdown(&entries, &ExportOptions::default());
        assert!(md.starts_with("# Log Analysis Report"));
        assert!(md.contains("## Subsystem Health"));
        assert!(md.contains("## Recent Errors"));
        assert!(md.contains("`FAIL`"));
    }

    #[test]
    fn json_embeds_context_and_patterns() {
        let entries = vec![entry(0, 1, LogLevel::Error, "FAIL", Payload::new())];
        let options = ExportOptions {
            context: Some(serde_json::json!({ "build": "dev" })),
            ..Default::default()
        };
        let value: Value = serde_json::from_str(&to_json(&entries, &options).unwrap()).unwrap();
        assert_eq!(value["entry_count"], 1);
        assert_eq!(value["context"]["build"], "dev");
        assert!(value.get("patterns").is_none());
        assert_eq!(value["entries"][0]["level"], "ERROR");
    }

    #[test]
    fn empty_input_renders_everywhere() {
        for format in ExportFormat::ALL {
            assert!(export(&[], format, &ExportOptions::default()).is_ok());
        }
        assert_eq!(to_csv(&[]), "timestamp,level,subsystem,code,message,frame\n");
    }
}
