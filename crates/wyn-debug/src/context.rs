//! Frame driver and periodic context snapshots.
//!
//! [`DebugContext`] owns the [`ContextRegistry`] shared with the logger. The
//! host calls [`tick`](DebugContext::tick) once per frame; the context
//! advances the frame counter the registry stamps on every capture, keeps a
//! rolling frame-time window for FPS, and every
//! [`snapshot_interval_frames`](ContextConfig::snapshot_interval_frames)
//! frames stores a full snapshot in a bounded history.
//!
//! ```
//! use std::sync::Arc;
//! use wyn_debug::config::ContextConfig;
//! use wyn_debug::context::DebugContext;
//! use wyn_log::prelude::*;
//!
//! let config = ContextConfig { snapshot_interval_frames: 2, ..Default::default() };
//! let context = DebugContext::new(config, Arc::new(ManualClock::new(0)));
//! context.initialize();
//!
//! for _ in 0..4 {
//!     context.tick(16.0);
//! }
//! assert_eq!(context.frame(), 4);
//! assert_eq!(context.snapshots().len(), 2);
//! assert_eq!(context.latest_snapshot().unwrap().frame, 4);
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;
use wyn_log::clock::Clock;
use wyn_log::context::{ContextProvider, ContextRegistry, ContextSnapshot};

use crate::config::ContextConfig;
use crate::providers::GameState;

/// Frame durations averaged for [`DebugContext::fps`].
const FPS_WINDOW: usize = 60;

#[derive(Debug, Default)]
struct FrameState {
    initialized: bool,
    started_at: Option<u64>,
    frame_times: VecDeque<f64>,
    snapshots: VecDeque<ContextSnapshot>,
    periodic_captured: u64,
}

/// Owner of the provider registry and the frame clock.
pub struct DebugContext {
    config: ContextConfig,
    registry: Arc<ContextRegistry>,
    clock: Arc<dyn Clock>,
    game: GameState,
    state: Mutex<FrameState>,
}

impl std::fmt::Debug for DebugContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugContext")
            .field("config", &self.config)
            .field("providers", &self.registry.provider_names())
            .field("frame", &self.registry.frame().frame)
            .finish()
    }
}

impl DebugContext {
    /// Context with a fresh registry. Providers are registered by
    /// [`initialize`](Self::initialize).
    pub fn new(config: ContextConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            registry: Arc::new(ContextRegistry::new()),
            clock,
            game: GameState::new(),
            state: Mutex::new(FrameState::default()),
        }
    }

    /// Register the built-in providers (when configured) and start the
    /// uptime clock. Calling it again is a no-op.
    pub fn initialize(&self) {
        let mut state = self.state.lock();
        if state.initialized {
            return;
        }
        if self.config.register_builtin_providers {
            for provider in self.game.providers() {
                self.registry.register(provider);
            }
        }
        state.initialized = true;
        state.started_at = Some(self.clock.now_ms());
        debug!(providers = ?self.registry.provider_names(), "debug context initialised");
    }

    /// Unregister every provider and stop periodic capture.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        self.registry.clear();
        state.initialized = false;
        debug!("debug context shut down");
    }

    /// Returns `true` between [`initialize`](Self::initialize) and
    /// [`shutdown`](Self::shutdown).
    pub fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    /// Add a host-specific provider, replacing one with the same name.
    pub fn register_provider(&self, provider: Arc<dyn ContextProvider>) {
        self.registry.register(provider);
    }

    /// Advance one frame that took `delta_ms`.
    ///
    /// Returns the periodic snapshot if this frame captured one.
    pub fn tick(&self, delta_ms: f64) -> Option<ContextSnapshot> {
        let frame = self.registry.advance_frame(delta_ms);

        let mut state = self.state.lock();
        if state.frame_times.len() == FPS_WINDOW {
            state.frame_times.pop_front();
        }
        state.frame_times.push_back(delta_ms);

        let interval = self.config.snapshot_interval_frames;
        if !state.initialized || interval == 0 || frame % interval != 0 {
            return None;
        }
        // Providers run outside our lock.
        drop(state);
        let snapshot = self.registry.capture_snapshot(self.clock.now_ms());

        let mut state = self.state.lock();
        state.periodic_captured += 1;
        if self.config.snapshot_history > 0 {
            if state.snapshots.len() == self.config.snapshot_history {
                state.snapshots.pop_front();
            }
            state.snapshots.push_back(snapshot.clone());
        }
        debug!(frame, unavailable = ?snapshot.unavailable_providers(), "periodic snapshot");
        Some(snapshot)
    }

    /// Capture a snapshot now without storing it.
    pub fn capture_now(&self) -> ContextSnapshot {
        self.registry.capture_snapshot(self.clock.now_ms())
    }

    /// Most recent periodic snapshot.
    pub fn latest_snapshot(&self) -> Option<ContextSnapshot> {
        self.state.lock().snapshots.back().cloned()
    }

    /// Retained periodic snapshots, oldest first.
    pub fn snapshots(&self) -> Vec<ContextSnapshot> {
        self.state.lock().snapshots.iter().cloned().collect()
    }

    /// Periodic snapshots taken since creation, including evicted ones.
    pub fn snapshot_count(&self) -> u64 {
        self.state.lock().periodic_captured
    }

    /// Current frame number.
    pub fn frame(&self) -> u64 {
        self.registry.frame().frame
    }

    /// Duration of the last frame.
    pub fn frame_duration_ms(&self) -> f64 {
        self.registry.frame().frame_duration_ms
    }

    /// Milliseconds since [`initialize`](Self::initialize); 0 before.
    pub fn uptime_ms(&self) -> u64 {
        self.state
            .lock()
            .started_at
            .map_or(0, |start| self.clock.now_ms().saturating_sub(start))
    }

    /// Frames per second over the recent frame-time window; 0 with no
    /// frames or zero-length frames.
    pub fn fps(&self) -> f64 {
        let state = self.state.lock();
        let total: f64 = state.frame_times.iter().sum();
        if state.frame_times.is_empty() || total <= 0.0 || !total.is_finite() {
            return 0.0;
        }
        1000.0 * state.frame_times.len() as f64 / total
    }

    /// Shared registry, for wiring a logger.
    pub fn registry(&self) -> &Arc<ContextRegistry> {
        &self.registry
    }

    /// Slots the game publishes its state into.
    pub fn game_state(&self) -> &GameState {
        &self.game
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
