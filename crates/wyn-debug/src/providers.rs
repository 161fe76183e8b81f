//! Built-in context providers for player, physics and input state.
//!
//! The game owns the authoritative state; each frame it publishes a copy
//! through a [`StateHandle`]. Providers only read the last published value,
//! so capturing context never touches live game objects. An empty slot (no
//! player spawned yet, physics not started) reports the provider as
//! unavailable.
//!
//! ```
//! use wyn_debug::providers::{PlayerProvider, PlayerState, StateHandle};
//! use wyn_log::prelude::*;
//!
//! let handle = StateHandle::new();
//! let provider = PlayerProvider::new(handle.clone());
//! assert!(provider.state().is_err());
//!
//! handle.set(PlayerState { vx: 3.0, vy: 4.0, ..Default::default() });
//! let state = provider.state().unwrap();
//! assert_eq!(state["speed"], 5.0);
//! ```

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use wyn_log::context::ContextProvider;
use wyn_log::CaptureError;

/// Speeds below this are treated as standing still.
const MOVING_EPSILON: f64 = 0.01;

// ---------------------------------------------------------------------------
// StateHandle
// ---------------------------------------------------------------------------

/// Shared slot the game writes and a provider reads.
#[derive(Debug)]
pub struct StateHandle<T> {
    slot: Arc<RwLock<Option<T>>>,
}

impl<T> Clone for StateHandle<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> Default for StateHandle<T> {
    fn default() -> Self {
        Self {
            slot: Arc::new(RwLock::new(None)),
        }
    }
}

impl<T: Clone> StateHandle<T> {
    /// Empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a new value.
    pub fn set(&self, value: T) {
        *self.slot.write() = Some(value);
    }

    /// Mutate the published value in place. No-op when empty.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        if let Some(value) = self.slot.write().as_mut() {
            f(value);
        }
    }

    /// Empty the slot.
    pub fn clear(&self) {
        *self.slot.write() = None;
    }

    /// Copy of the published value.
    pub fn get(&self) -> Option<T> {
        self.slot.read().clone()
    }

    /// Returns `true` if a value is published.
    pub fn is_set(&self) -> bool {
        self.slot.read().is_some()
    }
}

fn to_map<T: Serialize>(section: &str, value: &T) -> Result<Map<String, Value>, CaptureError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(CaptureError::Failed {
            section: section.to_owned(),
            details: format!("expected an object, got {other}"),
        }),
        Err(e) => Err(CaptureError::Failed {
            section: section.to_owned(),
            details: e.to_string(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// Published player state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    /// World position.
    pub x: f64,
    /// World position.
    pub y: f64,
    /// Velocity.
    pub vx: f64,
    /// Velocity.
    pub vy: f64,
    /// Touching the ground.
    pub grounded: bool,
    /// Remaining health.
    pub health: i32,
    /// Animation or state-machine state.
    pub state: String,
}

/// Provider `"player"`: position, velocity, health, plus `speed`, `moving`
/// and `airborne`.
#[derive(Debug, Clone)]
pub struct PlayerProvider {
    handle: StateHandle<PlayerState>,
}

impl PlayerProvider {
    /// Provider reading `handle`.
    pub fn new(handle: StateHandle<PlayerState>) -> Self {
        Self { handle }
    }
}

impl ContextProvider for PlayerProvider {
    fn name(&self) -> &str {
        "player"
    }

    fn state(&self) -> Result<Map<String, Value>, CaptureError> {
        let player = self
            .handle
            .get()
            .ok_or_else(|| CaptureError::Unavailable("no player spawned".to_owned()))?;
        let mut map = to_map("player", &player)?;
        let speed = player.vx.hypot(player.vy);
        map.insert("speed".to_owned(), json!(speed));
        map.insert("moving".to_owned(), json!(speed > MOVING_EPSILON));
        map.insert("airborne".to_owned(), json!(!player.grounded));
        Ok(map)
    }
}

// ---------------------------------------------------------------------------
// Physics
// ---------------------------------------------------------------------------

/// Published physics world summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhysicsState {
    /// Bodies in the world.
    pub body_count: usize,
    /// Bodies that are awake.
    pub active_bodies: usize,
    /// Colliders in the world.
    pub collider_count: usize,
    /// Gravity vector.
    pub gravity: [f64; 2],
    /// Duration of the last step in milliseconds.
    pub last_step_ms: f64,
}

/// Provider `"physics"`: world counts plus `active_ratio`.
#[derive(Debug, Clone)]
pub struct PhysicsProvider {
    handle: StateHandle<PhysicsState>,
}

impl PhysicsProvider {
    /// Provider reading `handle`.
    pub fn new(handle: StateHandle<PhysicsState>) -> Self {
        Self { handle }
    }
}

impl ContextProvider for PhysicsProvider {
    fn name(&self) -> &str {
        "physics"
    }

    fn state(&self) -> Result<Map<String, Value>, CaptureError> {
        let physics = self
            .handle
            .get()
            .ok_or_else(|| CaptureError::Unavailable("physics world not running".to_owned()))?;
        let mut map = to_map("physics", &physics)?;
        let ratio = if physics.body_count == 0 {
            0.0
        } else {
            physics.active_bodies as f64 / physics.body_count as f64
        };
        map.insert("active_ratio".to_owned(), json!(ratio));
        Ok(map)
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Published input device state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputState {
    /// Keys held this frame.
    pub pressed_keys: Vec<String>,
    /// A gamepad is connected.
    pub gamepad_connected: bool,
    /// Pointer position, if any.
    pub pointer: Option<[f64; 2]>,
}

/// Provider `"input"`: device state plus `active_key_count`.
#[derive(Debug, Clone)]
pub struct InputProvider {
    handle: StateHandle<InputState>,
}

impl InputProvider {
    /// Provider reading `handle`.
    pub fn new(handle: StateHandle<InputState>) -> Self {
        Self { handle }
    }
}

impl ContextProvider for InputProvider {
    fn name(&self) -> &str {
        "input"
    }

    fn state(&self) -> Result<Map<String, Value>, CaptureError> {
        let input = self
            .handle
            .get()
            .ok_or_else(|| CaptureError::Unavailable("input system not initialised".to_owned()))?;
        let mut map = to_map("input", &input)?;
        map.insert("active_key_count".to_owned(), json!(input.pressed_keys.len()));
        Ok(map)
    }
}

// ---------------------------------------------------------------------------
// GameState
// ---------------------------------------------------------------------------

/// The three built-in state slots, for the game to publish into.
#[derive(Debug, Clone, Default)]
pub struct GameState {
    /// Player slot.
    pub player: StateHandle<PlayerState>,
    /// Physics slot.
    pub physics: StateHandle<PhysicsState>,
    /// Input slot.
    pub input: StateHandle<InputState>,
}

impl GameState {
    /// Empty slots.
    pub fn new() -> Self {
        Self::default()
    }

    /// One provider per slot.
    pub fn providers(&self) -> Vec<Arc<dyn ContextProvider>> {
        vec![
            Arc::new(PlayerProvider::new(self.player.clone())),
            Arc::new(PhysicsProvider::new(self.physics.clone())),
            Arc::new(InputProvider::new(self.input.clone())),
        ]
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
