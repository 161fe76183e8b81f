//! Log entries and their typed payloads.
//!
//! A [`LogEntry`] is the atomic unit of the pipeline. Callers describe an event
//! with a [`Payload`]: a handful of well-known optional fields (`subsystem`,
//! `message`, `error`, `hint`, `state`) plus an open `extra` map for anything
//! else. The logger turns the payload into an entry, attaches a context
//! snapshot once, and stores it behind an [`Arc`] so it is never mutated
//! afterwards.
//!
//! # Example
//!
//! ```
//! use wyn_log::entry::Payload;
//!
//! let payload = Payload::new()
//!     .subsystem("physics")
//!     .message("body missing from world")
//!     .hint("check that the body was registered before the first step")
//!     .with("body_id", 17);
//!
//! assert_eq!(payload.subsystem.as_deref(), Some("physics"));
//! assert_eq!(payload.extra["body_id"], 17);
//! ```

use std::any::Any;
use std::error::Error as StdError;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::ContextSnapshot;
use crate::level::LogLevel;

/// Subsystem recorded when the payload does not name one.
pub const DEFAULT_SUBSYSTEM: &str = "general";

/// Entries are shared, never copied, once they enter the buffer.
pub type SharedEntry = Arc<LogEntry>;

// ---------------------------------------------------------------------------
// ErrorDetail
// ---------------------------------------------------------------------------

/// Description of a native error attached to an entry or a crash dump.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Top-level error message.
    pub message: String,
    /// Type name of the error, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Backtrace or stack text, when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    /// Messages of the `source()` chain, outermost first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<String>,
}

impl ErrorDetail {
    /// Error detail carrying only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    /// Capture a typed error with its type name and `source()` chain.
    pub fn from_error<E: StdError>(err: &E) -> Self {
        let mut detail = Self::from_dyn_error(err);
        detail.kind = Some(std::any::type_name::<E>().to_owned());
        detail
    }

    /// Capture a type-erased error and its `source()` chain.
    pub fn from_dyn_error(err: &dyn StdError) -> Self {
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }
        Self {
            message: err.to_string(),
            kind: None,
            stack: None,
            causes,
        }
    }

    /// Capture the payload of a caught panic.
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "panic with non-string payload".to_owned()
        };
        Self {
            message,
            kind: Some("panic".to_owned()),
            stack: None,
            causes: Vec::new(),
        }
    }

    /// Attach stack text.
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Attach a type name.
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// Caller-supplied data for one log call.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Payload {
    /// Originating component. Defaults to [`DEFAULT_SUBSYSTEM`] on ingestion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subsystem: Option<String>,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Native error that triggered the entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
    /// Remediation hint shown next to errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Arbitrary diagnostic snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Value>,
    /// Any other fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    /// Problems hit while building the payload (unserializable state, ...).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capture_errors: Vec<String>,
}

impl Payload {
    /// Empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the subsystem.
    pub fn subsystem(mut self, subsystem: impl Into<String>) -> Self {
        self.subsystem = Some(subsystem.into());
        self
    }

    /// Set the message.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attach an error detail.
    pub fn error(mut self, error: ErrorDetail) -> Self {
        self.error = Some(error);
        self
    }

    /// Attach a typed error.
    pub fn error_from<E: StdError>(self, err: &E) -> Self {
        self.error(ErrorDetail::from_error(err))
    }

    /// Set the remediation hint.
    pub fn hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Attach a JSON state snapshot.
    pub fn state(mut self, state: Value) -> Self {
        self.state = Some(state);
        self
    }

    /// Serialize `state` into the payload.
    ///
    /// Serialization failures do not fail the call: the state is replaced by
    /// a marker and a capture error is recorded.
    pub fn state_of<T: Serialize + ?Sized>(mut self, state: &T) -> Self {
        match serde_json::to_value(state) {
            Ok(value) => self.state = Some(value),
            Err(e) => {
                self.state = Some(Value::String("<unserializable state>".to_owned()));
                self.capture_errors.push(format!("state serialization failed: {e}"));
            }
        }
        self
    }

    /// Add an extra field. Values that fail to serialize are recorded as a
    /// capture error and skipped.
    pub fn with<T: Serialize>(mut self, key: impl Into<String>, value: T) -> Self {
        let key = key.into();
        match serde_json::to_value(value) {
            Ok(value) => {
                self.extra.insert(key, value);
            }
            Err(e) => self
                .capture_errors
                .push(format!("field '{key}' serialization failed: {e}")),
        }
        self
    }
}

// ---------------------------------------------------------------------------
// LogEntry
// ---------------------------------------------------------------------------

/// One structured diagnostic record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Insertion sequence, unique per logger.
    pub sequence: u64,
    /// Milliseconds since the logger's clock origin.
    pub timestamp: u64,
    /// Severity.
    pub level: LogLevel,
    /// Originating component.
    pub subsystem: String,
    /// Stable identifier, `SUBSYSTEM_DESCRIPTION` by convention.
    pub code: String,
    /// Human-readable text.
    pub message: String,
    /// Caller-supplied data.
    pub payload: Payload,
    /// Context captured at ingestion; `None` when no registry is attached.
    pub context: Option<ContextSnapshot>,
    /// Notes about enrichment that failed during ingestion.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capture_notes: Vec<String>,
}

impl LogEntry {
    /// Build an entry from a payload, resolving subsystem and message.
    ///
    /// The message falls back to the error message, then to the code.
    pub fn new(
        sequence: u64,
        timestamp: u64,
        level: LogLevel,
        code: impl Into<String>,
        payload: Payload,
        context: Option<ContextSnapshot>,
    ) -> Self {
        let code = code.into();
        let subsystem = payload
            .subsystem
            .clone()
            .unwrap_or_else(|| DEFAULT_SUBSYSTEM.to_owned());
        let message = payload
            .message
            .clone()
            .or_else(|| payload.error.as_ref().map(|e| e.message.clone()))
            .unwrap_or_else(|| code.clone());
        let capture_notes = payload.capture_errors.clone();
        Self {
            sequence,
            timestamp,
            level,
            subsystem,
            code,
            message,
            payload,
            context,
            capture_notes,
        }
    }

    /// Frame number from the attached context, if any.
    pub fn frame(&self) -> Option<u64> {
        self.context.as_ref().map(|c| c.frame)
    }

    /// Remediation hint from the payload.
    pub fn hint(&self) -> Option<&str> {
        self.payload.hint.as_deref()
    }

    /// Returns `true` if any enrichment step failed for this entry.
    pub fn is_degraded(&self) -> bool {
        !self.capture_notes.is_empty()
    }

    /// Copy of this entry whose context is reduced to frame metadata.
    pub fn with_frame_only_context(&self) -> Self {
        let mut entry = self.clone();
        entry.context = entry.context.as_ref().map(ContextSnapshot::frame_only);
        entry
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Inner;
    impl std::fmt::Display for Inner {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "socket closed")
        }
    }
    impl StdError for Inner {}

    #[derive(Debug)]
    struct Outer(Inner);
    impl std::fmt::Display for Outer {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "asset fetch failed")
        }
    }
    impl StdError for Outer {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }

    struct NotSerializable;
    impl Serialize for NotSerializable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("refusing"))
        }
    }

    #[test]
    fn error_detail_walks_source_chain() {
        let detail = ErrorDetail::from_error(&Outer(Inner));
        assert_eq!(detail.message, "asset fetch failed");
        assert_eq!(detail.causes, vec!["socket closed".to_owned()]);
        assert!(detail.kind.unwrap().ends_with("Outer"));
    }

    #[test]
    fn panic_payloads_are_readable() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(ErrorDetail::from_panic(&*boxed).message, "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(ErrorDetail::from_panic(&*boxed).message, "bang");
        let boxed: Box<dyn Any + Send> = Box::new(5_u8);
        assert!(ErrorDetail::from_panic(&*boxed).message.contains("non-string"));
    }

    #[test]
    fn entry_resolves_defaults() {
        let entry = LogEntry::new(0, 10, LogLevel::Info, "GAME_START", Payload::new(), None);
        assert_eq!(entry.subsystem, DEFAULT_SUBSYSTEM);
        assert_eq!(entry.message, "GAME_START");

        let entry = LogEntry::new(
            1,
            11,
            LogLevel::Error,
            "ASSET_LOAD_ERROR",
            Payload::new().subsystem("assets").error(ErrorDetail::new("404")),
            None,
        );
        assert_eq!(entry.subsystem, "assets");
        assert_eq!(entry.message, "404");
    }

    #[test]
    fn unserializable_state_degrades_instead_of_failing() {
        let payload = Payload::new().state_of(&NotSerializable).with("bad", NotSerializable);
        assert_eq!(payload.capture_errors.len(), 2);
        assert!(!payload.extra.contains_key("bad"));
        let entry = LogEntry::new(0, 0, LogLevel::Warn, "X", payload, None);
        assert!(entry.is_degraded());
    }

    #[test]
    fn payload_extra_fields_flatten() {
        let payload = Payload::new().subsystem("input").with("key", "Space");
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["subsystem"], "input");
        assert_eq!(json["key"], "Space");
        assert!(json.get("capture_errors").is_none());
    }
}
