//! Integration tests for the diagnostics facade.

use std::sync::Arc;

use serde_json::Value;
use wyn_debug::prelude::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn diagnostics() -> (Diagnostics, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(10_000));
    let mut config = DebugConfig::default();
    config.logger.sampling = SamplingPolicy::keep_all();
    config.logger.sampling_seed = Some(7);
    let diagnostics = Diagnostics::with_clock(config, clock.clone()).unwrap();
    (diagnostics, clock)
}

fn physics_error(diagnostics: &Diagnostics) {
    diagnostics.logger().error(
        "PHYSICS_UPDATE_ERROR",
        Payload::new()
            .subsystem("physics")
            .message("body velocity is NaN"),
    );
}

// ---------------------------------------------------------------------------
// Pattern analysis
// ---------------------------------------------------------------------------

#[test]
fn burst_of_physics_errors_is_detected() {
    let (diagnostics, clock) = diagnostics();
    for _ in 0..6 {
        physics_error(&diagnostics);
        clock.advance(40);
    }

    let analysis = diagnostics.api().analyze_recent(1_000);
    assert_eq!(analysis.repeating_errors.len(), 1);
    let repeating = &analysis.repeating_errors[0];
    assert_eq!(repeating.code, "PHYSICS_UPDATE_ERROR");
    assert_eq!(repeating.count, 6);
    assert!(analysis.severity.level >= SeverityLevel::Medium);
    assert_eq!(analysis.cascades.len(), 1);
    assert_eq!(diagnostics.api().pattern_history().len(), 1);
}

#[test]
fn old_errors_fall_out_of_recent_window() {
    let (diagnostics, clock) = diagnostics();
    for _ in 0..6 {
        physics_error(&diagnostics);
    }
    clock.advance(5_000);
    diagnostics.logger().info("LEVEL_LOADED", Payload::new().subsystem("scene"));

    let analysis = diagnostics.api().analyze_recent(1_000);
    assert!(analysis.repeating_errors.is_empty());
    assert_eq!(analysis.severity.level, SeverityLevel::Low);
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[test]
fn query_by_subsystem_and_level() {
    let (diagnostics, clock) = diagnostics();
    physics_error(&diagnostics);
    clock.advance(10);
    diagnostics.logger().warn("PHYSICS_SLOW_STEP", Payload::new().subsystem("physics"));
    clock.advance(10);
    diagnostics.logger().error("AUDIO_DECODE_ERROR", Payload::new().subsystem("audio"));

    let physics_errors = diagnostics
        .api()
        .run(&LogQuery::new().subsystem("physics").errors());
    assert_eq!(physics_errors.len(), 1);
    assert_eq!(physics_errors[0].code, "PHYSICS_UPDATE_ERROR");

    let filters = QueryFilters {
        min_level: Some("warn".into()),
        ..Default::default()
    };
    let problems = diagnostics.api().query(&filters);
    assert_eq!(problems.len(), 3);
    // Newest first by default.
    assert_eq!(problems[0].code, "AUDIO_DECODE_ERROR");
}

#[test]
fn related_logs_share_frame_or_subsystem() {
    let (diagnostics, clock) = diagnostics();
    diagnostics.tick(16.0);
    physics_error(&diagnostics);
    diagnostics.logger().warn("INPUT_BINDING_FAILED", Payload::new().subsystem("input"));
    diagnostics.tick(16.0);
    clock.advance(300);
    diagnostics.logger().warn("PHYSICS_SLOW_STEP", Payload::new().subsystem("physics"));
    clock.advance(5_000);
    diagnostics.logger().warn("PHYSICS_SLOW_STEP", Payload::new().subsystem("physics"));

    let anchor = diagnostics.logger().entries()[0].clone();
    let related = diagnostics
        .api()
        .related_logs(&anchor, &RelatedOptions::default());
    let codes: Vec<&str> = related.iter().map(|e| e.code.as_str()).collect();
    assert_eq!(codes.len(), 2);
    assert!(codes.contains(&"INPUT_BINDING_FAILED"));
    assert!(codes.contains(&"PHYSICS_SLOW_STEP"));
    assert!(related.iter().all(|e| e.sequence != anchor.sequence));
}

// ---------------------------------------------------------------------------
// Health and summary
// ---------------------------------------------------------------------------

#[test]
fn subsystem_health_reflects_errors() {
    let (diagnostics, clock) = diagnostics();
    for _ in 0..10 {
        physics_error(&diagnostics);
        clock.advance(100);
    }
    diagnostics.logger().info("FRAME_OK", Payload::new().subsystem("render"));

    let physics = diagnostics.api().analyze_subsystem("physics", 60_000);
    assert_eq!(physics.error_count, 10);
    assert_eq!(physics.status, HealthStatus::Critical);

    let render = diagnostics.api().analyze_subsystem("render", 60_000);
    assert_eq!(render.health, 100);

    let summary = diagnostics.api().summary();
    assert_eq!(summary.total_entries, 11);
    assert_eq!(summary.error_count, 10);
    assert_eq!(summary.top_error_codes[0].name, "PHYSICS_UPDATE_ERROR");
    assert_eq!(summary.subsystems[0].subsystem, "physics");
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

#[test]
fn export_for_analysis_json_and_unknown_format() {
    let (diagnostics, clock) = diagnostics();
    for _ in 0..4 {
        physics_error(&diagnostics);
        clock.advance(50);
    }

    let json = diagnostics.api().export_for_analysis(&ExportRequest::default());
    let doc: Value = serde_json::from_str(&json).unwrap();
    assert_eq!(doc["entry_count"], 4);
    assert!(doc.get("patterns").is_some());

    let bad = ExportRequest {
        format: "yaml".to_owned(),
        ..Default::default()
    };
    let doc: Value = serde_json::from_str(&diagnostics.api().export_for_analysis(&bad)).unwrap();
    assert!(doc["error"].as_str().unwrap().contains("yaml"));
}

#[test]
fn export_filters_keep_newest_within_limit() {
    let (diagnostics, clock) = diagnostics();
    for i in 0..5 {
        diagnostics
            .logger()
            .warn(format!("CODE_{i}"), Payload::new().subsystem("core"));
        clock.advance(10);
    }

    let request = ExportRequest {
        format: "csv".to_owned(),
        filters: Some(QueryFilters {
            limit: Some(2),
            ..Default::default()
        }),
        ..Default::default()
    };
    let csv = diagnostics.api().export_for_analysis(&request);
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[1].contains("CODE_3"));
    assert!(lines[2].contains("CODE_4"));
}

// ---------------------------------------------------------------------------
// Suggestions
// ---------------------------------------------------------------------------

#[test]
fn suggestions_builtin_and_custom() {
    let (diagnostics, _) = diagnostics();
    let builtin = diagnostics.api().suggestions("PHYSICS_UPDATE_ERROR");
    assert_eq!(builtin.confidence, Confidence::High);

    diagnostics.api().add_suggestion(
        "SHOP_PURCHASE_FAILED",
        SuggestionEntry::new("economy", SeverityLevel::Medium, ["Check the wallet balance"]),
    );
    let custom = diagnostics.api().suggestions("SHOP_PURCHASE_FAILED");
    assert_eq!(custom.confidence, Confidence::High);
    assert_eq!(custom.entry.category, "economy");

    assert!(diagnostics.api().remove_suggestion("SHOP_PURCHASE_FAILED").is_some());
    assert!(diagnostics.api().remove_suggestion("PHYSICS_UPDATE_ERROR").is_none());
}
