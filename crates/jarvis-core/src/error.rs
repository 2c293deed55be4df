use std::fmt;

use serde::{Deserialize, Serialize};

use crate::category::Category;

pub const E_ALREADY_IN_FLIGHT: &str = "E_ALREADY_IN_FLIGHT";
pub const E_UNKNOWN_COMMAND: &str = "E_UNKNOWN_COMMAND";
pub const E_EMPTY_TRANSCRIPT: &str = "E_EMPTY_TRANSCRIPT";
pub const E_NOT_IN_FLIGHT: &str = "E_NOT_IN_FLIGHT";
pub const E_ABORTED: &str = "E_ABORTED";
pub const E_HTTP_SEND: &str = "E_HTTP_SEND";
pub const E_HTTP_PARSE: &str = "E_HTTP_PARSE";

/// Transport failure, non-2xx status or malformed body, normalized so callers
/// have a single failure branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkError {
    pub code: String,
    pub message: String,
}

impl NetworkError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::new(format!("E_HTTP_STATUS_{status}"), message)
    }
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for NetworkError {}

/// Where an error is reported: a category, or the control-action channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorContext {
    Category(Category),
    ControlAction,
}

impl ErrorContext {
    pub fn for_category(category: Category) -> Self {
        match category {
            Category::ControlActions => ErrorContext::ControlAction,
            other => ErrorContext::Category(other),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorContext::Category(c) => c.as_str(),
            ErrorContext::ControlAction => "ControlAction",
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorContext {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ErrorContext {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s == "ControlAction" {
            return Ok(ErrorContext::ControlAction);
        }
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .map(ErrorContext::Category)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown error context: {s}")))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error("[{}] a request for {} is already in flight", E_ALREADY_IN_FLIGHT, .0)]
    AlreadyInFlight(ErrorContext),

    #[error("[{}] unknown control command: {:?}", E_UNKNOWN_COMMAND, .0)]
    UnknownCommand(String),

    #[error("[{}] no speech detected", E_EMPTY_TRANSCRIPT)]
    EmptyTranscript,

    #[error("[{}] no request for {} is in flight", E_NOT_IN_FLIGHT, .0)]
    NotInFlight(Category),
}

impl DashboardError {
    pub fn code(&self) -> &str {
        match self {
            DashboardError::Network(e) => &e.code,
            DashboardError::AlreadyInFlight(_) => E_ALREADY_IN_FLIGHT,
            DashboardError::UnknownCommand(_) => E_UNKNOWN_COMMAND,
            DashboardError::EmptyTranscript => E_EMPTY_TRANSCRIPT,
            DashboardError::NotInFlight(_) => E_NOT_IN_FLIGHT,
        }
    }

    /// Message without the code prefix; network errors carry the backend text as-is.
    pub fn message(&self) -> String {
        match self {
            DashboardError::Network(e) => e.message.clone(),
            DashboardError::AlreadyInFlight(ctx) => {
                format!("a request for {ctx} is already in flight")
            }
            DashboardError::UnknownCommand(raw) => format!("unknown control command: {raw:?}"),
            DashboardError::EmptyTranscript => "no speech detected".to_string(),
            DashboardError::NotInFlight(c) => format!("no request for {c} is in flight"),
        }
    }
}

/// A failure as shown next to its category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub message: String,
    pub context: ErrorContext,
    pub code: String,
    pub at_ms: i64,
}

impl ErrorRecord {
    pub fn new(context: ErrorContext, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context,
            code: code.into(),
            at_ms: crate::now_ms(),
        }
    }

    pub fn from_error(context: ErrorContext, err: &DashboardError) -> Self {
        Self::new(context, err.code(), err.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_actions_category_reports_as_control_action() {
        let ctx = ErrorContext::for_category(Category::ControlActions);
        assert_eq!(ctx, ErrorContext::ControlAction);
        assert_eq!(serde_json::to_string(&ctx).unwrap(), "\"ControlAction\"");
        let ctx = ErrorContext::for_category(Category::NetworkInfo);
        assert_eq!(serde_json::to_string(&ctx).unwrap(), "\"networkInfo\"");
    }

    #[test]
    fn network_error_keeps_backend_message_verbatim() {
        let e = DashboardError::from(NetworkError::status(400, "Command not recognized"));
        assert_eq!(e.code(), "E_HTTP_STATUS_400");
        assert_eq!(e.message(), "Command not recognized");
        let rec = ErrorRecord::from_error(ErrorContext::ControlAction, &e);
        assert_eq!(rec.message, "Command not recognized");
        assert_eq!(rec.context, ErrorContext::ControlAction);
    }

    #[test]
    fn display_carries_stable_code() {
        let e = DashboardError::AlreadyInFlight(ErrorContext::ControlAction);
        assert!(e.to_string().starts_with("[E_ALREADY_IN_FLIGHT]"));
        assert_eq!(DashboardError::EmptyTranscript.code(), E_EMPTY_TRANSCRIPT);
    }

    #[test]
    fn error_context_roundtrips_through_json() {
        let rec = ErrorRecord::new(ErrorContext::Category(Category::Voice), "E_X", "boom");
        let s = serde_json::to_string(&rec).unwrap();
        let back: ErrorRecord = serde_json::from_str(&s).unwrap();
        assert_eq!(back, rec);
    }
}
