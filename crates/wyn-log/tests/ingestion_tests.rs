//! Integration tests for the ingestion pipeline.
//!
//! These tests exercise the logger end-to-end: eviction at capacity, the
//! high-severity sampling guarantee, and context provider isolation.

use std::sync::Arc;

use serde_json::{json, Map, Value};
use wyn_log::prelude::*;

// ---------------------------------------------------------------------------
// Test providers
// ---------------------------------------------------------------------------

struct Player;

impl ContextProvider for Player {
    fn name(&self) -> &str {
        "player"
    }

    fn state(&self) -> Result<Map<String, Value>, CaptureError> {
        let mut state = Map::new();
        state.insert("x".to_owned(), json!(12.5));
        state.insert("grounded".to_owned(), json!(true));
        Ok(state)
    }
}

struct BrokenPhysics;

impl ContextProvider for BrokenPhysics {
    fn name(&self) -> &str {
        "physics"
    }

    fn state(&self) -> Result<Map<String, Value>, CaptureError> {
        Err(CaptureError::Failed {
            section: "physics".to_owned(),
            details: "world lock poisoned".to_owned(),
        })
    }
}

struct PanickingInput;

impl ContextProvider for PanickingInput {
    fn name(&self) -> &str {
        "input"
    }

    fn state(&self) -> Result<Map<String, Value>, CaptureError> {
        panic!("input device table corrupted");
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn keep_all(capacity: usize) -> LoggerConfig {
    LoggerConfig {
        capacity,
        sampling: SamplingPolicy::keep_all(),
        sampling_seed: Some(3),
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn overflow_by_one_evicts_the_oldest_entry() {
    let logger = Logger::new(keep_all(2000), Arc::new(ManualClock::new(0)));

    for i in 0..=2000 {
        logger.info(format!("E{i}"), Payload::new());
    }

    let entries = logger.entries();
    let stats = logger.stats();
    assert_eq!(entries.len(), 2000);
    assert_eq!(stats.buffered, 2000);
    assert_eq!(stats.evicted, 1);
    assert_eq!(entries[0].code, "E1");
    assert_eq!(entries[1999].code, "E2000");
}

#[test]
fn high_severity_is_never_sampled_out() {
    let policy = SamplingPolicy {
        rates: LogLevel::ALL.iter().map(|l| (*l, 0.0)).collect(),
        always_keep_from: LogLevel::Error,
    };
    let config = LoggerConfig {
        capacity: 20_000,
        sampling: policy,
        sampling_seed: Some(11),
        ..Default::default()
    };
    let logger = Logger::new(config, Arc::new(ManualClock::new(0)));

    for i in 0..10_000 {
        let level = if i % 2 == 0 {
            LogLevel::Error
        } else {
            LogLevel::Fatal
        };
        assert!(logger.log(level, "CORE_FAILURE", Payload::new()).is_recorded());
    }

    let stats = logger.stats();
    assert_eq!(stats.sampled_out, 0);
    assert_eq!(stats.total_logged, 10_000);
    assert_eq!(logger.entries().len(), 10_000);
}

#[test]
fn configured_error_rate_is_ignored() {
    let policy = SamplingPolicy::keep_all()
        .with_rate(LogLevel::Dev, 0.5)
        .with_rate(LogLevel::Error, 0.5)
        .with_rate(LogLevel::Fatal, 0.5);
    let logger = Logger::new(
        LoggerConfig {
            capacity: 10_000,
            sampling: policy,
            sampling_seed: Some(5),
            ..Default::default()
        },
        Arc::new(ManualClock::new(0)),
    );

    for _ in 0..5_000 {
        logger.dev("NOISE", Payload::new());
        logger.error("SIGNAL", Payload::new());
    }

    let stats = logger.stats();
    assert_eq!(stats.by_level[&LogLevel::Error], 5_000);
    assert!(stats.sampled_out > 0);
    assert_eq!(
        stats.sampled_out + stats.by_level[&LogLevel::Dev],
        5_000,
        "every dev entry is either kept or sampled out"
    );
}

#[test]
fn one_failing_provider_does_not_hide_the_others() {
    let registry = Arc::new(ContextRegistry::new());
    registry.register(Arc::new(Player));
    registry.register(Arc::new(BrokenPhysics));
    registry.register(Arc::new(PanickingInput));

    let snapshot = registry.capture_snapshot(0);
    let player = snapshot.provider("player").unwrap();
    assert!(player.available);
    assert_eq!(player.state["x"], 12.5);
    assert!(!snapshot.provider("physics").unwrap().available);
    assert!(!snapshot.provider("input").unwrap().available);

    // The logger still records entries with the partial context.
    let logger = Logger::with_registry(keep_all(10), Arc::new(ManualClock::new(0)), registry);
    assert!(logger
        .error("PHYSICS_UPDATE_ERROR", Payload::new().subsystem("physics"))
        .is_recorded());
    let entry = &logger.entries()[0];
    let context = entry.context.as_ref().unwrap();
    assert!(context.providers["player"].available);
    assert!(!context.providers["physics"].available);
}

#[test]
fn context_is_attached_once_and_not_updated_later() {
    let registry = Arc::new(ContextRegistry::new());
    let logger = Logger::with_registry(keep_all(10), Arc::new(ManualClock::new(0)), registry.clone());

    registry.set_frame(10, 16.0);
    logger.info("FIRST", Payload::new());
    registry.set_frame(11, 17.0);
    logger.info("SECOND", Payload::new());

    let entries = logger.entries();
    assert_eq!(entries[0].frame(), Some(10));
    assert_eq!(entries[1].frame(), Some(11));
}

#[test]
fn unserializable_payload_still_records() {
    struct Refuses;
    impl serde::Serialize for Refuses {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("cyclic"))
        }
    }

    let logger = Logger::new(keep_all(10), Arc::new(ManualClock::new(0)));
    let outcome = logger.error("SAVE_STATE_ERROR", Payload::new().state_of(&Refuses));
    assert!(outcome.is_recorded());

    let entry = &logger.entries()[0];
    assert!(entry.is_degraded());
    assert_eq!(logger.stats().degraded_captures, 1);
}
