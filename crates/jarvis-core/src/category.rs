use std::fmt;

use serde::{Deserialize, Serialize};

/// A class of remote data or action whose request state is tracked on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    SystemInfo,
    ProcessList,
    NetworkInfo,
    Chat,
    Voice,
    ControlActions,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::SystemInfo,
        Category::ProcessList,
        Category::NetworkInfo,
        Category::Chat,
        Category::Voice,
        Category::ControlActions,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::SystemInfo => "systemInfo",
            Category::ProcessList => "processList",
            Category::NetworkInfo => "networkInfo",
            Category::Chat => "chat",
            Category::Voice => "voice",
            Category::ControlActions => "controlActions",
        }
    }

    /// The fetch endpoint backing this category, if it is fetched at all.
    pub fn endpoint(self) -> Option<CategoryEndpoint> {
        match self {
            Category::SystemInfo => Some(CategoryEndpoint::Info),
            Category::ProcessList => Some(CategoryEndpoint::Processes),
            Category::NetworkInfo => Some(CategoryEndpoint::Network),
            Category::Chat | Category::Voice | Category::ControlActions => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The read-only dashboard endpoints under `/api/system-control/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryEndpoint {
    Info,
    Processes,
    Network,
}

impl CategoryEndpoint {
    pub const ALL: [CategoryEndpoint; 3] = [
        CategoryEndpoint::Info,
        CategoryEndpoint::Processes,
        CategoryEndpoint::Network,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CategoryEndpoint::Info => "info",
            CategoryEndpoint::Processes => "processes",
            CategoryEndpoint::Network => "network",
        }
    }

    pub fn category(self) -> Category {
        match self {
            CategoryEndpoint::Info => Category::SystemInfo,
            CategoryEndpoint::Processes => Category::ProcessList,
            CategoryEndpoint::Network => Category::NetworkInfo,
        }
    }

    pub fn path(self) -> String {
        format!("/api/system-control/{}", self.as_str())
    }

    pub fn parse(s: &str) -> Option<Self> {
        let t = s.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|e| e.as_str() == t)
    }
}

impl fmt::Display for CategoryEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
