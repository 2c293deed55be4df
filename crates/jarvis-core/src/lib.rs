//! Shared vocabulary of the jarvis dashboard: categories, the control-command
//! set, remote payloads, request state and the error taxonomy.

use std::time::{SystemTime, UNIX_EPOCH};

pub mod category;
pub mod command;
pub mod error;
pub mod payload;
pub mod state;

pub use category::{Category, CategoryEndpoint};
pub use command::ControlCommand;
pub use error::{DashboardError, ErrorContext, ErrorRecord, NetworkError};
pub use payload::{
    ChatExchange, ControlReceipt, MemoryTotal, NetworkInfo, Payload, ProcessEntry, SystemInfo,
    Transcript,
};
pub use state::RequestState;

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";
pub const DEFAULT_VOICE_TYPE: &str = "default";

pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
