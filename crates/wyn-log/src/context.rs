//! Context provider registry and immutable context snapshots.
//!
//! Subsystems expose their live state through [`ContextProvider`]. The
//! [`ContextRegistry`] holds providers by name and aggregates their state on
//! demand into a [`ContextSnapshot`], together with frame metadata supplied by
//! the host loop.
//!
//! Providers are isolated from each other: a provider returning an error or
//! panicking is recorded as `available: false` and the remaining providers
//! still report.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use serde_json::{json, Map, Value};
//! use wyn_log::context::{ContextProvider, ContextRegistry};
//! use wyn_log::CaptureError;
//!
//! struct Score;
//! impl ContextProvider for Score {
//!     fn name(&self) -> &str { "score" }
//!     fn state(&self) -> Result<Map<String, Value>, CaptureError> {
//!         let mut map = Map::new();
//!         map.insert("points".into(), json!(1200));
//!         Ok(map)
//!     }
//! }
//!
//! let registry = ContextRegistry::new();
//! registry.register(Arc::new(Score));
//! registry.set_frame(42, 16.7);
//!
//! let snapshot = registry.capture_snapshot(0);
//! assert_eq!(snapshot.frame, 42);
//! assert_eq!(snapshot.providers["score"].state["points"], 1200);
//! ```

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::entry::ErrorDetail;
use crate::CaptureError;

// ---------------------------------------------------------------------------
// ContextProvider
// ---------------------------------------------------------------------------

/// A read-only view of one subsystem's live state.
///
/// Implementations should report failures through `Err` rather than panic;
/// the registry tolerates both.
pub trait ContextProvider: Send + Sync {
    /// Name under which the provider reports (`"player"`, `"physics"`, ...).
    fn name(&self) -> &str;

    /// Current state as a JSON object.
    fn state(&self) -> Result<Map<String, Value>, CaptureError>;
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// One provider's contribution to a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSnapshot {
    /// `false` when the provider failed.
    pub available: bool,
    /// Failure description when unavailable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Reported state; empty when unavailable.
    #[serde(default)]
    pub state: Map<String, Value>,
}

impl ProviderSnapshot {
    /// Successful capture.
    pub fn available(state: Map<String, Value>) -> Self {
        Self {
            available: true,
            error: None,
            state,
        }
    }

    /// Failed capture.
    pub fn unavailable(error: impl Into<String>) -> Self {
        Self {
            available: false,
            error: Some(error.into()),
            state: Map::new(),
        }
    }
}

/// Frame metadata supplied by the host loop.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FrameInfo {
    /// Frames elapsed since the debug context started.
    pub frame: u64,
    /// Duration of the last frame in milliseconds.
    pub frame_duration_ms: f64,
}

/// Aggregated provider state at one instant. Immutable once captured.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContextSnapshot {
    /// Frame counter at capture time.
    pub frame: u64,
    /// Duration of the last frame in milliseconds.
    pub frame_duration_ms: f64,
    /// Timestamp of the capture.
    pub captured_at: u64,
    /// State per provider name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub providers: BTreeMap<String, ProviderSnapshot>,
}

impl ContextSnapshot {
    /// Copy holding only frame metadata.
    pub fn frame_only(&self) -> Self {
        Self {
            frame: self.frame,
            frame_duration_ms: self.frame_duration_ms,
            captured_at: self.captured_at,
            providers: BTreeMap::new(),
        }
    }

    /// State of one provider, if it reported.
    pub fn provider(&self, name: &str) -> Option<&ProviderSnapshot> {
        self.providers.get(name)
    }

    /// Names of providers that failed.
    pub fn unavailable_providers(&self) -> Vec<&str> {
        self.providers
            .iter()
            .filter(|(_, p)| !p.available)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// ContextRegistry
// ---------------------------------------------------------------------------

/// Named set of providers plus the current frame metadata.
#[derive(Default)]
pub struct ContextRegistry {
    providers: RwLock<BTreeMap<String, Arc<dyn ContextProvider>>>,
    frame: RwLock<FrameInfo>,
}

impl std::fmt::Debug for ContextRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextRegistry")
            .field("providers", &self.provider_names())
            .field("frame", &*self.frame.read())
            .finish()
    }
}

impl ContextRegistry {
    /// Empty registry at frame zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider under its own name. Returns the provider it
    /// replaced, if any.
    pub fn register(&self, provider: Arc<dyn ContextProvider>) -> Option<Arc<dyn ContextProvider>> {
        let name = provider.name().to_owned();
        self.register_provider(name, provider)
    }

    /// Register a provider under an explicit name, replacing any existing
    /// provider with that name.
    pub fn register_provider(
        &self,
        name: impl Into<String>,
        provider: Arc<dyn ContextProvider>,
    ) -> Option<Arc<dyn ContextProvider>> {
        let name = name.into();
        debug!(provider = %name, "registering context provider");
        self.providers.write().insert(name, provider)
    }

    /// Remove a provider. Returns `true` if one was registered.
    pub fn unregister(&self, name: &str) -> bool {
        self.providers.write().remove(name).is_some()
    }

    /// Remove every provider.
    pub fn clear(&self) {
        self.providers.write().clear();
    }

    /// Registered provider names in sorted order.
    pub fn provider_names(&self) -> Vec<String> {
        self.providers.read().keys().cloned().collect()
    }

    /// Number of registered providers.
    pub fn len(&self) -> usize {
        self.providers.read().len()
    }

    /// Returns `true` if no provider is registered.
    pub fn is_empty(&self) -> bool {
        self.providers.read().is_empty()
    }

    /// Record the host loop's frame counter and last frame duration.
    pub fn set_frame(&self, frame: u64, frame_duration_ms: f64) {
        *self.frame.write() = FrameInfo {
            frame,
            frame_duration_ms,
        };
    }

    /// Advance the frame counter by one and record the frame's duration.
    /// Returns the new frame number.
    pub fn advance_frame(&self, frame_duration_ms: f64) -> u64 {
        let mut info = self.frame.write();
        info.frame += 1;
        info.frame_duration_ms = frame_duration_ms;
        info.frame
    }

    /// Current frame metadata.
    pub fn frame(&self) -> FrameInfo {
        *self.frame.read()
    }

    /// Capture one provider, or `None` if no provider has that name.
    pub fn capture_provider(&self, name: &str) -> Option<ProviderSnapshot> {
        let provider = self.providers.read().get(name).cloned()?;
        Some(capture_isolated(name, provider.as_ref()))
    }

    /// Capture every provider into one snapshot stamped `captured_at`.
    ///
    /// Providers are called outside the registry lock so a provider that
    /// inspects the registry cannot deadlock it.
    pub fn capture_snapshot(&self, captured_at: u64) -> ContextSnapshot {
        let providers: Vec<(String, Arc<dyn ContextProvider>)> = self
            .providers
            .read()
            .iter()
            .map(|(name, p)| (name.clone(), Arc::clone(p)))
            .collect();
        let frame = self.frame();

        let providers = providers
            .into_iter()
            .map(|(name, provider)| {
                let snapshot = capture_isolated(&name, provider.as_ref());
                (name, snapshot)
            })
            .collect();

        ContextSnapshot {
            frame: frame.frame,
            frame_duration_ms: frame.frame_duration_ms,
            captured_at,
            providers,
        }
    }
}

/// Call one provider, converting errors and panics into an unavailable
/// snapshot.
fn capture_isolated(name: &str, provider: &dyn ContextProvider) -> ProviderSnapshot {
    match catch_unwind(AssertUnwindSafe(|| provider.state())) {
        Ok(Ok(state)) => ProviderSnapshot::available(state),
        Ok(Err(e)) => {
            warn!(provider = %name, error = %e, "context provider unavailable");
            ProviderSnapshot::unavailable(e.to_string())
        }
        Err(panic) => {
            let detail = ErrorDetail::from_panic(&*panic);
            let err = CaptureError::Panicked {
                section: name.to_owned(),
                message: detail.message,
            };
            warn!(provider = %name, error = %err, "context provider panicked");
            ProviderSnapshot::unavailable(err.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Fixed(&'static str, Value);
    impl ContextProvider for Fixed {
        fn name(&self) -> &str {
            self.0
        }
        fn state(&self) -> Result<Map<String, Value>, CaptureError> {
            Ok(self.1.as_object().cloned().unwrap_or_default())
        }
    }

    struct Failing;
    impl ContextProvider for Failing {
        fn name(&self) -> &str {
            "physics"
        }
        fn state(&self) -> Result<Map<String, Value>, CaptureError> {
            Err(CaptureError::Unavailable("world not created".to_owned()))
        }
    }

    struct Panicking;
    impl ContextProvider for Panicking {
        fn name(&self) -> &str {
            "input"
        }
        fn state(&self) -> Result<Map<String, Value>, CaptureError> {
            panic!("gamepad driver exploded")
        }
    }

    #[test]
    fn register_replaces_by_name() {
        let registry = ContextRegistry::new();
        assert!(registry
            .register(Arc::new(Fixed("player", json!({"x": 1}))))
            .is_none());
        assert!(registry
            .register(Arc::new(Fixed("player", json!({"x": 2}))))
            .is_some());
        assert_eq!(registry.len(), 1);
        let snap = registry.capture_snapshot(5);
        assert_eq!(snap.providers["player"].state["x"], 2);
        assert_eq!(snap.captured_at, 5);
    }

    #[test]
    fn failing_and_panicking_providers_are_isolated() {
        let registry = ContextRegistry::new();
        registry.register(Arc::new(Fixed("player", json!({"health": 3}))));
        registry.register(Arc::new(Failing));
        registry.register(Arc::new(Panicking));

        let snap = registry.capture_snapshot(0);
        assert!(snap.providers["player"].available);
        assert_eq!(snap.providers["player"].state["health"], 3);
        assert!(!snap.providers["physics"].available);
        assert!(snap.providers["physics"]
            .error
            .as_deref()
            .unwrap()
            .contains("world not created"));
        assert!(!snap.providers["input"].available);
        assert_eq!(snap.unavailable_providers(), vec!["input", "physics"]);
    }

    #[test]
    fn unregister_and_clear() {
        let registry = ContextRegistry::new();
        registry.register(Arc::new(Fixed("a", json!({}))));
        registry.register(Arc::new(Fixed("b", json!({}))));
        assert!(registry.unregister("a"));
        assert!(!registry.unregister("a"));
        assert_eq!(registry.provider_names(), vec!["b".to_owned()]);
        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.capture_provider("b").is_none());
    }

    #[test]
    fn frame_metadata_is_stamped() {
        let registry = ContextRegistry::new();
        registry.set_frame(120, 16.5);
        let snap = registry.capture_snapshot(2000);
        assert_eq!(snap.frame, 120);
        assert_eq!(snap.frame_duration_ms, 16.5);
        let reduced = snap.frame_only();
        assert_eq!(reduced.frame, 120);
        assert!(reduced.providers.is_empty());
    }

    #[test]
    fn concurrent_frame_advances_are_not_lost() {
        let registry = ContextRegistry::new();
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..250 {
                        registry.advance_frame(16.0);
                    }
                });
            }
        });
        let info = registry.frame();
        assert_eq!(info.frame, 1000);
        assert_eq!(info.frame_duration_ms, 16.0);
        assert_eq!(registry.advance_frame(8.0), 1001);
    }

    #[test]
    fn unavailable_provider_serializes_marker() {
        let json = serde_json::to_value(ProviderSnapshot::unavailable("gone")).unwrap();
        assert_eq!(json, json!({"available": false, "error": "gone", "state": {}}));
    }
}
