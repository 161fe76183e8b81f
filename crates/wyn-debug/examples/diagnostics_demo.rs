//! Headless diagnostics demo -- runs a short simulated game loop, injects a
//! physics fault, then prints what the diagnostics engine made of it.
//!
//! Run with:
//!   cargo run --example diagnostics_demo -p wyn-debug
//!   cargo run --example diagnostics_demo -p wyn-debug -- config.json
//!
//! Set `RUST_LOG=wyn_debug=debug` for the engine's own tracing output.

use std::sync::Arc;

use anyhow::Context as _;
use wyn_debug::prelude::*;

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

const FRAMES: u64 = 240;
const FRAME_MS: u64 = 16;
const FAULT_FRAME: u64 = 180;

fn simulate(diagnostics: &Diagnostics, clock: &ManualClock) {
    let game = diagnostics.game_state();
    game.player.set(PlayerState {
        x: 0.0,
        y: 0.0,
        vx: 2.5,
        vy: 0.0,
        grounded: true,
        health: 3,
        state: "running".to_owned(),
    });
    game.physics.set(PhysicsState {
        body_count: 42,
        active_bodies: 12,
        collider_count: 40,
        gravity: [0.0, -9.81],
        last_step_ms: 1.2,
    });

    let logger = diagnostics.logger();
    logger.info("SCENE_LOADED", Payload::new().subsystem("scene").message("level_1"));

    for frame in 1..=FRAMES {
        clock.advance(FRAME_MS);
        diagnostics.tick(FRAME_MS as f64);

        game.player.update(|p| {
            p.x += p.vx;
        });

        if frame % 30 == 0 {
            logger.dev("PLAYER_CHECKPOINT", Payload::new().subsystem("player").with("frame", frame));
        }
        if frame >= FAULT_FRAME && frame % 4 == 0 {
            game.player.update(|p| {
                p.vy = f64::NAN;
                p.grounded = false;
            });
            logger.error(
                "PHYSICS_UPDATE_ERROR",
                Payload::new()
                    .subsystem("physics")
                    .message("non-finite velocity on player body")
                    .hint("clamp impulses before integrating"),
            );
        }
        if frame == FAULT_FRAME + 20 {
            logger.warn(
                "PLAYER_FALL_OUT_OF_BOUNDS",
                Payload::new().subsystem("player").message("player y below kill plane"),
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    init_tracing("warn");

    let config = match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config {path}"))?;
            DebugConfig::from_json_str(&text).context("parsing diagnostics config")?
        }
        None => DebugConfig::default(),
    };

    let clock = Arc::new(ManualClock::new(0));
    let diagnostics = Diagnostics::with_clock(config, clock.clone())?;
    simulate(&diagnostics, &clock);

    let api = diagnostics.api();
    let summary = api.summary();
    println!(
        "overall health {} ({}), {} entries, {} errors, severity {:?}",
        summary.overall_health,
        summary.status.as_str(),
        summary.total_entries,
        summary.error_count,
        summary.severity.level,
    );

    let patterns = api.analyze_recent(2_000);
    for repeating in &patterns.repeating_errors {
        println!("repeating: {} x{}", repeating.code, repeating.count);
        let advice = api.suggestions(&repeating.code);
        for line in &advice.entry.suggestions {
            println!("  - {line}");
        }
    }

    let request = ExportRequest {
        format: "markdown".to_owned(),
        window_ms: Some(5_000),
        ..Default::default()
    };
    println!("\n{}", api.export_for_analysis(&request));

    let dump = diagnostics.crash_dump(
        ErrorDetail::new("simulated crash after physics fault").with_kind("DemoCrash"),
        Some(serde_json::json!({ "level": "level_1" })),
    );
    println!("{}", diagnostics.crash_generator().generate_summary(&dump));

    diagnostics.shutdown();
    Ok(())
}
