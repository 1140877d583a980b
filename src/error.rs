//! Canonical error type for the dispatch pipeline.
//!
//! Every failure raised during resolution, hooks, or invocation is normalized
//! into a [`RemoteError`] and translated exactly once into the JSON envelope
//! `{ "error": { ... } }`. Callers may attach arbitrary extra fields; they are
//! copied onto the envelope verbatim, so the error is an open map with a few
//! well-known members rather than a closed structure.

use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// Failure taxonomy. Drives the default HTTP status when the error carries no
/// explicit `status` of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    /// A required argument was not supplied (400).
    Validation,
    /// An argument was supplied but could not be coerced to its declared type (500).
    Coercion,
    /// No matching route, class, or method (404).
    NotFound,
    /// A before/after hook signaled failure (status from error, else 500).
    Hook,
    /// The target method failed, synchronously or via its completion handle (500).
    Method,
}

impl ErrorKind {
    fn default_status(self) -> u16 {
        match self {
            ErrorKind::Validation => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Coercion | ErrorKind::Hook | ErrorKind::Method => 500,
        }
    }

    fn default_name(self) -> &'static str {
        match self {
            ErrorKind::Validation => "ValidationError",
            ErrorKind::Coercion => "CoercionError",
            ErrorKind::NotFound => "NotFoundError",
            ErrorKind::Hook => "HookError",
            ErrorKind::Method => "Error",
        }
    }
}

/// Error surfaced from any phase of a dispatch.
///
/// `extra` holds own-enumerable properties attached by the originating caller;
/// they survive serialization unchanged.
#[derive(Debug, Clone)]
pub struct RemoteError {
    pub kind: ErrorKind,
    pub name: String,
    pub message: String,
    pub status: Option<u16>,
    pub stack: Option<String>,
    pub extra: Map<String, Value>,
}

impl RemoteError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            name: kind.default_name().to_string(),
            message: message.into(),
            status: None,
            stack: None,
            extra: Map::new(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn coercion(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Coercion, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn hook(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Hook, message)
    }

    pub fn method(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Method, message)
    }

    /// Override the error name carried on the envelope.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Pin an explicit HTTP status; takes precedence over the kind default.
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Attach an arbitrary extra field, copied verbatim onto the envelope.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// The HTTP status this error maps to.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.status.unwrap_or_else(|| self.kind.default_status())
    }

    /// The envelope fields: well-known members first, extras copied on top.
    #[must_use]
    pub fn envelope(&self) -> Value {
        let mut fields = Map::new();
        fields.insert("name".to_string(), Value::String(self.name.clone()));
        fields.insert("message".to_string(), Value::String(self.message.clone()));
        fields.insert("status".to_string(), Value::from(self.status_code()));
        if let Some(stack) = &self.stack {
            fields.insert("stack".to_string(), Value::String(stack.clone()));
        }
        for (key, value) in &self.extra {
            fields.insert(key.clone(), value.clone());
        }
        Value::Object(fields)
    }

    /// The full response body, `{ "error": <envelope> }`.
    #[must_use]
    pub fn body(&self) -> Value {
        serde_json::json!({ "error": self.envelope() })
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

impl std::error::Error for RemoteError {}

/// A string-valued throw normalizes to a message-only method error.
impl From<String> for RemoteError {
    fn from(message: String) -> Self {
        RemoteError::method(message)
    }
}

impl From<&str> for RemoteError {
    fn from(message: &str) -> Self {
        RemoteError::method(message)
    }
}
