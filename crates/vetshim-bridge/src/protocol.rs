//! Fault-report wire protocol
//!
//! Messages posted by the in-sandbox reporter:
//!
//! ```json
//! { "type": "runtime_error", "data": { "message": "x is not defined", "line": 3 }, "appId": "app-1" }
//! ```
//!
//! `error_reporter_ready` carries no meaningful data. Every other kind must
//! carry `data.message` as a string or the message is discarded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use vetshim_types::AppId;

/// Message type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Uncaught exception
    RuntimeError,
    /// Rejected promise nobody handled
    UnhandledRejection,
    /// `console.error` call
    ConsoleError,
    /// Reporter finished installing
    ErrorReporterReady,
}

impl MessageKind {
    /// Fault kind carried by this message, if any
    #[must_use]
    pub fn fault_kind(self) -> Option<FaultKind> {
        match self {
            MessageKind::RuntimeError => Some(FaultKind::RuntimeError),
            MessageKind::UnhandledRejection => Some(FaultKind::UnhandledRejection),
            MessageKind::ConsoleError => Some(FaultKind::ConsoleError),
            MessageKind::ErrorReporterReady => None,
        }
    }
}

/// Kind of a buffered fault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// Uncaught exception
    RuntimeError,
    /// Rejected promise nobody handled
    UnhandledRejection,
    /// `console.error` call
    ConsoleError,
}

impl FaultKind {
    /// Wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FaultKind::RuntimeError => "runtime_error",
            FaultKind::UnhandledRejection => "unhandled_rejection",
            FaultKind::ConsoleError => "console_error",
        }
    }
}

/// Fault details posted by the reporter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultPayload {
    /// Error message
    pub message: String,
    /// Script URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// 1-based line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// 1-based column
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    /// Stack trace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl FaultPayload {
    /// Payload with only a message
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
            line: None,
            column: None,
            stack: None,
        }
    }
}

/// Message from the sandbox to the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxMessage {
    /// Type tag
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Fault details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<FaultPayload>,
    /// Reporting application
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<AppId>,
}

impl SandboxMessage {
    /// Fault message
    #[must_use]
    pub fn fault(kind: FaultKind, payload: FaultPayload, app_id: Option<AppId>) -> Self {
        let kind = match kind {
            FaultKind::RuntimeError => MessageKind::RuntimeError,
            FaultKind::UnhandledRejection => MessageKind::UnhandledRejection,
            FaultKind::ConsoleError => MessageKind::ConsoleError,
        };
        Self {
            kind,
            data: Some(payload),
            app_id,
        }
    }

    /// Reporter-ready message
    #[must_use]
    pub fn ready(app_id: impl Into<AppId>) -> Self {
        Self {
            kind: MessageKind::ErrorReporterReady,
            data: None,
            app_id: Some(app_id.into()),
        }
    }

    /// Validate a raw message
    ///
    /// Returns `None` for anything that is not a well-formed protocol
    /// message, including fault kinds without a string `data.message`.
    #[must_use]
    pub fn parse(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        let kind: MessageKind = serde_json::from_value(value.get("type")?.clone()).ok()?;
        let app_id = match value.get("appId") {
            None | Some(Value::Null) => None,
            Some(Value::String(id)) => Some(AppId::new(id.as_str())),
            Some(_) => return None,
        };

        let data = match value.get("data") {
            None | Some(Value::Null) => None,
            Some(data) => parse_payload(data),
        };
        if kind.fault_kind().is_some() && data.is_none() {
            return None;
        }

        Some(Self { kind, data, app_id })
    }

    /// Encode for the wire
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Lenient payload parse: `message` must be a string, the optional fields
/// are kept only when they have the expected type.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn parse_payload(data: &Value) -> Option<FaultPayload> {
    let message = data.get("message")?.as_str()?.to_string();
    let text = |key: &str| data.get(key).and_then(Value::as_str).map(str::to_string);
    let number = |key: &str| {
        data.get(key)
            .and_then(Value::as_f64)
            .filter(|n| n.is_finite() && *n >= 0.0)
            .map(|n| n as u32)
    };
    Some(FaultPayload {
        message,
        source: text("source"),
        line: number("line"),
        column: number("column"),
        stack: text("stack"),
    })
}

/// Buffered fault
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaultEvent {
    /// Fault kind
    pub kind: FaultKind,
    /// Error message
    pub message: String,
    /// Script URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// 1-based line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// 1-based column
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    /// Stack trace
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    /// Reporting application
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_id: Option<AppId>,
    /// Receipt time
    pub timestamp: DateTime<Utc>,
    /// Classifier category
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl FaultEvent {
    /// Event from a payload, stamped at `timestamp`
    #[must_use]
    pub fn from_payload(
        kind: FaultKind,
        payload: FaultPayload,
        app_id: Option<AppId>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            message: payload.message,
            source: payload.source,
            line: payload.line,
            column: payload.column,
            stack: payload.stack,
            app_id,
            timestamp,
            category: None,
        }
    }

    /// Check if event belongs to app (`None` matches every event)
    #[inline]
    #[must_use]
    pub fn belongs_to(&self, app_id: Option<&str>) -> bool {
        match app_id {
            None => true,
            Some(id) => self.app_id.as_ref().is_some_and(|a| a.as_str() == id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_fault_message() {
        let msg = SandboxMessage::parse(&json!({
            "type": "runtime_error",
            "data": { "message": "x is not defined", "line": 3, "column": 7.0, "stack": 12 },
            "appId": "app-1"
        }))
        .unwrap();

        assert_eq!(msg.kind, MessageKind::RuntimeError);
        assert_eq!(msg.app_id, Some(AppId::new("app-1")));
        let data = msg.data.unwrap();
        assert_eq!(data.message, "x is not defined");
        assert_eq!(data.line, Some(3));
        assert_eq!(data.column, Some(7));
        assert_eq!(data.stack, None);
    }

    #[test]
    fn ready_needs_no_data() {
        let msg = SandboxMessage::parse(&json!({ "type": "error_reporter_ready", "appId": "a" }));
        assert_eq!(msg, Some(SandboxMessage::ready("a")));
    }

    #[test]
    fn malformed_messages_are_rejected() {
        for value in [
            json!("runtime_error"),
            json!({}),
            json!({ "type": "something_else", "data": { "message": "x" } }),
            json!({ "type": "runtime_error" }),
            json!({ "type": "runtime_error", "data": { "message": 42 } }),
            json!({ "type": "console_error", "data": "oops" }),
            json!({ "type": "console_error", "data": { "message": "x" }, "appId": 7 }),
        ] {
            assert!(SandboxMessage::parse(&value).is_none(), "{value}");
        }
    }

    #[test]
    fn wire_round_trip() {
        let msg = SandboxMessage::fault(
            FaultKind::UnhandledRejection,
            FaultPayload::new("boom"),
            Some(AppId::new("a")),
        );
        let value = msg.to_value();
        assert_eq!(value["type"], "unhandled_rejection");
        assert_eq!(value["appId"], "a");
        assert_eq!(SandboxMessage::parse(&value), Some(msg));
    }

    #[test]
    fn belongs_to_filter() {
        let event = FaultEvent::from_payload(
            FaultKind::ConsoleError,
            FaultPayload::new("x"),
            Some(AppId::new("a")),
            Utc::now(),
        );
        assert!(event.belongs_to(None));
        assert!(event.belongs_to(Some("a")));
        assert!(!event.belongs_to(Some("b")));
    }
}
