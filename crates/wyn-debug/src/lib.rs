//! Wyn Debug -- In-game diagnostics: frame context, crash dumps and a query facade.
//!
//! This crate wires [`wyn_log`] and [`wyn_insight`] into something a game host
//! embeds. [`Diagnostics`] is the composition root: it builds one
//! [`DebugContext`](context::DebugContext) (provider registry plus frame
//! driver), one [`Logger`] sharing that registry, the
//! [`DebugApi`](api::DebugApi) facade and a
//! [`CrashDumpGenerator`](crash::CrashDumpGenerator). There is no global
//! state; hosts pass the `Diagnostics` (or its `Arc`ed parts) to whoever
//! needs them.
//!
//! # Quick Start
//!
//! ```
//! use wyn_debug::prelude::*;
//!
//! let diagnostics = Diagnostics::new(DebugConfig::default()).unwrap();
//! diagnostics.game_state().player.set(PlayerState { health: 3, ..Default::default() });
//!
//! diagnostics.tick(16.6);
//! diagnostics.logger().error(
//!     "PHYSICS_UPDATE_ERROR",
//!     Payload::new().subsystem("physics").hint("check for NaN velocities"),
//! );
//!
//! let health = diagnostics.api().analyze_subsystem("physics", 60_000);
//! assert_eq!(health.error_count, 1);
//!
//! let dump = diagnostics.crash_dump(ErrorDetail::new("renderer lost"), None);
//! assert!(!dump.minimal);
//! ```

#![deny(unsafe_code)]

pub mod api;
pub mod config;
pub mod context;
pub mod crash;
pub mod environment;
pub mod providers;
pub mod telemetry;

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;
use wyn_log::clock::{Clock, MonotonicClock};
use wyn_log::entry::ErrorDetail;
use wyn_log::logger::Logger;

use crate::api::DebugApi;
use crate::config::DebugConfig;
use crate::context::DebugContext;
use crate::crash::{CrashDump, CrashDumpGenerator};
use crate::environment::{HostEnvironment, SystemEnvironment};
use crate::providers::GameState;

/// Re-export the ingestion crate for convenience.
pub use wyn_log;

/// Re-export the analysis crate for convenience.
pub use wyn_insight;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced while setting up diagnostics.
#[derive(Debug, thiserror::Error)]
pub enum DebugError {
    /// The configuration document is not valid JSON for [`DebugConfig`].
    #[error("configuration parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// A configuration value is out of range.
    #[error(transparent)]
    Log(#[from] wyn_log::LogError),

    /// Rendering analysis output failed.
    #[error(transparent)]
    Insight(#[from] wyn_insight::InsightError),
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// Composition root. See the [crate docs](crate).
pub struct Diagnostics {
    config: DebugConfig,
    context: Arc<DebugContext>,
    logger: Arc<Logger>,
    api: DebugApi,
    crash: CrashDumpGenerator,
}

impl std::fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Diagnostics")
            .field("context", &self.context)
            .field("logger", &self.logger)
            .finish_non_exhaustive()
    }
}

impl Diagnostics {
    /// Diagnostics on the monotonic clock and the standard-library host
    /// probe.
    ///
    /// # Errors
    ///
    /// Returns [`DebugError::Log`] if `config` fails validation.
    pub fn new(config: DebugConfig) -> Result<Self, DebugError> {
        Self::with_clock(config, Arc::new(MonotonicClock::new()))
    }

    /// Diagnostics on a caller-supplied clock.
    ///
    /// # Errors
    ///
    /// Returns [`DebugError::Log`] if `config` fails validation.
    pub fn with_clock(config: DebugConfig, clock: Arc<dyn Clock>) -> Result<Self, DebugError> {
        Self::with_environment(config, clock, Arc::new(SystemEnvironment))
    }

    /// Diagnostics on a caller-supplied clock and host probe.
    ///
    /// # Errors
    ///
    /// Returns [`DebugError::Log`] if `config` fails validation.
    pub fn with_environment(
        config: DebugConfig,
        clock: Arc<dyn Clock>,
        environment: Arc<dyn HostEnvironment>,
    ) -> Result<Self, DebugError> {
        config.validate()?;

        let context = Arc::new(DebugContext::new(config.context.clone(), Arc::clone(&clock)));
        context.initialize();

        let logger = Arc::new(Logger::with_registry(
            config.logger.clone(),
            clock,
            Arc::clone(context.registry()),
        ));
        let api = DebugApi::new(
            Arc::clone(&logger),
            config.patterns.clone(),
            config.analyzer.clone(),
        );
        let crash = CrashDumpGenerator::new(
            config.crash.clone(),
            Arc::clone(&logger),
            Arc::clone(&context),
            environment,
        );

        debug!(capacity = config.logger.capacity, "diagnostics ready");
        Ok(Self {
            config,
            context,
            logger,
            api,
            crash,
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &DebugConfig {
        &self.config
    }

    /// The ingestion logger.
    pub fn logger(&self) -> &Arc<Logger> {
        &self.logger
    }

    /// The frame driver and provider registry.
    pub fn context(&self) -> &Arc<DebugContext> {
        &self.context
    }

    /// Slots the game publishes player, physics and input state into.
    pub fn game_state(&self) -> &GameState {
        self.context.game_state()
    }

    /// The query and analysis facade.
    pub fn api(&self) -> &DebugApi {
        &self.api
    }

    /// The crash dump generator.
    pub fn crash_generator(&self) -> &CrashDumpGenerator {
        &self.crash
    }

    /// Advance one frame. Shorthand for [`DebugContext::tick`](context::DebugContext::tick).
    pub fn tick(&self, delta_ms: f64) {
        self.context.tick(delta_ms);
    }

    /// Build a crash dump for `error`. Never fails.
    pub fn crash_dump(&self, error: ErrorDetail, additional_context: Option<Value>) -> CrashDump {
        self.crash.generate(error, additional_context)
    }

    /// Unregister providers. Entries already logged keep their context.
    pub fn shutdown(&self) {
        self.context.shutdown();
    }
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use wyn_insight::prelude::*;
    pub use wyn_log::prelude::*;

    pub use crate::api::{DebugApi, DebugSummary, ExportRequest, RelatedOptions};
    pub use crate::config::{ContextConfig, CrashDumpConfig, DebugConfig};
    pub use crate::context::DebugContext;
    pub use crate::crash::{CaptureSection, CrashDump, CrashDumpGenerator};
    pub use crate::environment::{HostEnvironment, StaticEnvironment, SystemEnvironment};
    pub use crate::providers::{
        GameState, InputState, PhysicsState, PlayerState, StateHandle,
    };
    pub use crate::telemetry::init_tracing;
    pub use crate::{DebugError, Diagnostics};
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
