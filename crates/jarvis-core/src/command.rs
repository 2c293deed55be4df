use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::DashboardError;

/// The closed set of OS actions the backend accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlCommand {
    OpenBrowser,
    CloseBrowser,
    OpenEdge,
    OpenFirefox,
    OpenNotepad,
    OpenTerminal,
    OpenVscode,
    SystemInfo,
    GetProcesses,
    NetworkStatus,
    RestartComputer,
    Shutdown,
    Sleep,
    ClearMemoryCache,
    EndHighCpuProcess,
    TakeScreenshot,
    ShowDesktop,
    LockComputer,
}

impl ControlCommand {
    pub const ALL: [ControlCommand; 18] = [
        ControlCommand::OpenBrowser,
        ControlCommand::CloseBrowser,
        ControlCommand::OpenEdge,
        ControlCommand::OpenFirefox,
        ControlCommand::OpenNotepad,
        ControlCommand::OpenTerminal,
        ControlCommand::OpenVscode,
        ControlCommand::SystemInfo,
        ControlCommand::GetProcesses,
        ControlCommand::NetworkStatus,
        ControlCommand::RestartComputer,
        ControlCommand::Shutdown,
        ControlCommand::Sleep,
        ControlCommand::ClearMemoryCache,
        ControlCommand::EndHighCpuProcess,
        ControlCommand::TakeScreenshot,
        ControlCommand::ShowDesktop,
        ControlCommand::LockComputer,
    ];

    /// Wire phrase sent as `{"command": ...}`.
    pub fn as_str(self) -> &'static str {
        match self {
            ControlCommand::OpenBrowser => "open browser",
            ControlCommand::CloseBrowser => "close browser",
            ControlCommand::OpenEdge => "open edge",
            ControlCommand::OpenFirefox => "open firefox",
            ControlCommand::OpenNotepad => "open notepad",
            ControlCommand::OpenTerminal => "open terminal",
            ControlCommand::OpenVscode => "open vscode",
            ControlCommand::SystemInfo => "system info",
            ControlCommand::GetProcesses => "get processes",
            ControlCommand::NetworkStatus => "network status",
            ControlCommand::RestartComputer => "restart computer",
            ControlCommand::Shutdown => "shutdown",
            ControlCommand::Sleep => "sleep",
            ControlCommand::ClearMemoryCache => "clear memory cache",
            ControlCommand::EndHighCpuProcess => "end high cpu process",
            ControlCommand::TakeScreenshot => "take screenshot",
            ControlCommand::ShowDesktop => "show desktop",
            ControlCommand::LockComputer => "lock computer",
        }
    }

    /// Trims and lowercases before matching; the backend compares lowercased text.
    pub fn parse(raw: &str) -> Result<Self, DashboardError> {
        let t = raw.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == t)
            .ok_or_else(|| DashboardError::UnknownCommand(raw.to_string()))
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControlCommand {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ControlCommand {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ControlCommand {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vocabulary_has_eighteen_distinct_phrases() {
        let mut phrases: Vec<&str> = ControlCommand::ALL.iter().map(|c| c.as_str()).collect();
        phrases.sort_unstable();
        phrases.dedup();
        assert_eq!(phrases.len(), 18);
    }

    #[test]
    fn parse_normalizes_case_and_whitespace() {
        assert_eq!(
            ControlCommand::parse("  Lock Computer ").unwrap(),
            ControlCommand::LockComputer
        );
        assert_eq!(
            "shutdown".parse::<ControlCommand>().unwrap(),
            ControlCommand::Shutdown
        );
    }

    #[test]
    fn parse_rejects_phrases_outside_vocabulary() {
        match ControlCommand::parse("make coffee") {
            Err(DashboardError::UnknownCommand(s)) => assert_eq!(s, "make coffee"),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(ControlCommand::parse("shutdown now").is_err());
        assert!(ControlCommand::parse("").is_err());
    }

    #[test]
    fn serde_uses_wire_phrase() {
        let s = serde_json::to_string(&ControlCommand::EndHighCpuProcess).unwrap();
        assert_eq!(s, "\"end high cpu process\"");
        let c: ControlCommand = serde_json::from_str("\"take screenshot\"").unwrap();
        assert_eq!(c, ControlCommand::TakeScreenshot);
        assert!(serde_json::from_str::<ControlCommand>("\"fly\"").is_err());
    }
}
