use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{category::Category, command::ControlCommand};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub processor: String,
    pub memory_total: MemoryTotal,
    pub cpu_cores: u32,
}

/// The backend reports total memory either as a byte count or preformatted text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MemoryTotal {
    Bytes(u64),
    Text(String),
}

impl fmt::Display for MemoryTotal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryTotal::Bytes(b) => write!(f, "{b}"),
            MemoryTotal::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessEntry {
    pub name: String,
    pub pid: u32,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInfo {
    pub ip: String,
    pub interfaces: Vec<String>,
    pub internet_connectivity: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatExchange {
    pub prompt: String,
    pub response: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlReceipt {
    pub command: ControlCommand,
    pub message: String,
}

/// Last successful value of a category; one variant per category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Payload {
    SystemInfo(SystemInfo),
    ProcessList(Vec<ProcessEntry>),
    NetworkInfo(NetworkInfo),
    Chat(ChatExchange),
    Voice(Transcript),
    ControlActions(ControlReceipt),
}

impl Payload {
    pub fn category(&self) -> Category {
        match self {
            Payload::SystemInfo(_) => Category::SystemInfo,
            Payload::ProcessList(_) => Category::ProcessList,
            Payload::NetworkInfo(_) => Category::NetworkInfo,
            Payload::Chat(_) => Category::Chat,
            Payload::Voice(_) => Category::Voice,
            Payload::ControlActions(_) => Category::ControlActions,
        }
    }
}
