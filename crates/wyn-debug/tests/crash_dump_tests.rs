//! Crash dump generation under hostile conditions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::{json, Map, Value};
use wyn_debug::environment::{Dimensions, MemoryInfo};
use wyn_debug::prelude::*;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Provider that always panics.
struct Exploding;

impl ContextProvider for Exploding {
    fn name(&self) -> &str {
        "exploding"
    }

    fn state(&self) -> Result<Map<String, Value>, CaptureError> {
        panic!("provider blew up");
    }
}

/// Host probe whose window query panics.
struct BrokenWindow;

impl HostEnvironment for BrokenWindow {
    fn os(&self) -> Result<String, CaptureError> {
        Ok("testos".to_owned())
    }

    fn window(&self) -> Result<Dimensions, CaptureError> {
        panic!("window handle gone");
    }

    fn memory(&self) -> Result<MemoryInfo, CaptureError> {
        Err(CaptureError::Failed {
            section: "memory".to_owned(),
            details: "permission denied".to_owned(),
        })
    }
}

/// Clock that panics once `broken` is set.
#[derive(Default)]
struct FlakyClock {
    broken: AtomicBool,
}

impl Clock for FlakyClock {
    fn now_ms(&self) -> u64 {
        if self.broken.load(Ordering::SeqCst) {
            panic!("clock failure");
        }
        5_000
    }
}

fn config() -> DebugConfig {
    let mut config = DebugConfig::default();
    config.logger.sampling = SamplingPolicy::keep_all();
    config
}

fn diagnostics_with(env: Arc<dyn HostEnvironment>) -> Diagnostics {
    Diagnostics::with_environment(config(), Arc::new(ManualClock::new(1_000)), env).unwrap()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn dump_is_produced_for_any_additional_context() {
    let diagnostics = diagnostics_with(Arc::new(StaticEnvironment::default()));
    diagnostics.logger().error("SAVE_STATE_ERROR", Payload::new().subsystem("save"));

    for extra in [None, Some(Value::Null), Some(json!([1, 2, 3])), Some(json!("odd"))] {
        let dump = diagnostics.crash_dump(ErrorDetail::new("boom"), extra.clone());
        assert!(!dump.minimal);
        assert_eq!(dump.additional_context, extra);
        assert_eq!(dump.recent_logs.value().unwrap().errors.len(), 1);
        serde_json::to_string(&dump).unwrap();
    }
}

#[test]
fn panicking_provider_is_marked_unavailable() {
    let diagnostics = diagnostics_with(Arc::new(StaticEnvironment::default()));
    diagnostics.context().register_provider(Arc::new(Exploding));
    diagnostics.game_state().player.set(PlayerState::default());

    let dump = diagnostics.crash_dump(ErrorDetail::new("boom"), None);
    let context = dump.context.value().unwrap();
    let exploding = context.provider("exploding").unwrap();
    assert!(!exploding.available);
    assert!(exploding.error.as_deref().unwrap().contains("provider blew up"));
    assert!(context.provider("player").unwrap().available);
}

#[test]
fn panicking_environment_field_becomes_marker() {
    let diagnostics = diagnostics_with(Arc::new(BrokenWindow));
    let dump = diagnostics.crash_dump(ErrorDetail::new("boom"), None);

    let env = dump.environment.value().unwrap();
    assert_eq!(env.os.value().map(String::as_str), Some("testos"));
    match &env.window {
        CaptureSection::Failed { error, message } => {
            assert_eq!(error, "panicked");
            assert!(message.contains("window handle gone"));
        }
        CaptureSection::Captured(_) => panic!("window should not be captured"),
    }
    assert!(matches!(&env.memory, CaptureSection::Failed { error, .. } if error == "failed"));
    assert!(matches!(&env.screen, CaptureSection::Failed { error, .. } if error == "unsupported"));

    let doc = serde_json::to_value(&dump).unwrap();
    assert_eq!(doc["environment"]["window"]["error"], "panicked");
    assert_eq!(doc["environment"]["os"], "testos");
}

#[test]
fn assembly_failure_yields_minimal_dump() {
    let clock = Arc::new(FlakyClock::default());
    let diagnostics = Diagnostics::with_environment(
        config(),
        clock.clone(),
        Arc::new(StaticEnvironment::default()),
    )
    .unwrap();
    diagnostics.logger().error("RENDER_DEVICE_LOST", Payload::new().subsystem("render"));
    clock.broken.store(true, Ordering::SeqCst);

    let error = ErrorDetail::new("device lost").with_kind("RenderError");
    let dump = diagnostics.crash_dump(error.clone(), Some(json!({"scene": "level_3"})));
    assert!(dump.minimal);
    assert_eq!(dump.error, error);
    assert_eq!(dump.timestamp, 0);
    assert!(dump.meta_failure.as_deref().unwrap().contains("clock failure"));
    assert_eq!(dump.additional_context.as_ref().unwrap()["scene"], "level_3");
    assert_eq!(dump.failed_sections().len(), 5);
}

#[test]
fn fingerprint_groups_identical_errors() {
    let clock = Arc::new(ManualClock::new(0));
    let diagnostics = Diagnostics::with_environment(
        config(),
        clock.clone(),
        Arc::new(StaticEnvironment::default()),
    )
    .unwrap();

    let first = diagnostics.crash_dump(ErrorDetail::new("same"), None);
    clock.advance(1_000);
    let second = diagnostics.crash_dump(ErrorDetail::new("same"), None);
    let other = diagnostics.crash_dump(ErrorDetail::new("different"), None);

    assert_eq!(first.fingerprint, second.fingerprint);
    assert_ne!(first.id, second.id);
    assert_ne!(first.fingerprint, other.fingerprint);
    assert_eq!(first.id.len(), 16);
}

#[test]
fn dump_from_caught_panic_and_summary() {
    let diagnostics = diagnostics_with(Arc::new(StaticEnvironment::default()));
    diagnostics.tick(16.0);
    diagnostics
        .logger()
        .error("PHYSICS_UPDATE_ERROR", Payload::new().subsystem("physics"));

    let payload = std::panic::catch_unwind(|| -> u32 { panic!("index out of bounds") }).unwrap_err();
    let dump = diagnostics
        .crash_generator()
        .generate_from_panic(&*payload, None);
    assert_eq!(dump.error.message, "index out of bounds");
    assert_eq!(dump.performance.value().unwrap().frame, 1);

    let summary = diagnostics.crash_generator().generate_summary(&dump);
    assert!(summary.contains("CRASH REPORT"));
    assert!(summary.contains("index out of bounds"));
    assert!(summary.contains("PHYSICS_UPDATE_ERROR"));
}
