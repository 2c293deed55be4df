use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use jarvis_core::{DEFAULT_BASE_URL, DEFAULT_VOICE_TYPE};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONTROL_PATH: &str = "/system-control";

/// Endpoint suffixes people paste along with the host; stripped from base URLs.
const KNOWN_ENDPOINT_SUFFIXES: [&str; 8] = [
    "/api/system-control/info",
    "/api/system-control/processes",
    "/api/system-control/network",
    "/api/system-control",
    "/system-control",
    "/ai-chat",
    "/listen",
    "/speak",
];

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Settings {
    pub base_url: Option<String>,
    pub control_path: Option<String>, // "/system-control" or "/api/system-control"
    pub voice_type: Option<String>,
}

pub fn settings_path(data_dir: &Path) -> PathBuf {
    data_dir.join("settings.json")
}

pub fn load_settings(data_dir: &Path) -> Result<Settings> {
    let p = settings_path(data_dir);
    if !p.exists() {
        return Ok(Settings::default());
    }
    let s = fs::read_to_string(&p).context("read settings.json failed")?;
    let v: Settings = serde_json::from_str(&s).context("parse settings.json failed")?;
    Ok(v)
}

pub fn save_settings(data_dir: &Path, settings: &Settings) -> Result<()> {
    fs::create_dir_all(data_dir).context("create data dir failed")?;
    let p = settings_path(data_dir);
    let s = serde_json::to_string_pretty(settings).context("serialize settings failed")?;
    fs::write(&p, s).context("write settings.json failed")?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: String, // e.g. http://localhost:5000
    pub control_path: String,
    pub voice_type: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            control_path: DEFAULT_CONTROL_PATH.to_string(),
            voice_type: DEFAULT_VOICE_TYPE.to_string(),
        }
    }
}

impl ApiConfig {
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = normalize_base_url(base_url);
        self
    }
}

pub fn normalize_base_url(s: &str) -> String {
    let mut t = s.trim().trim_end_matches('/').to_string();
    if t.is_empty() {
        return DEFAULT_BASE_URL.to_string();
    }
    for suffix in KNOWN_ENDPOINT_SUFFIXES {
        if let Some(stripped) = t.strip_suffix(suffix) {
            t = stripped.to_string();
            break;
        }
    }
    t.trim_end_matches('/').to_string()
}

pub fn normalize_control_path(s: &str) -> String {
    let t = s.trim().trim_matches('/');
    if t.is_empty() {
        return DEFAULT_CONTROL_PATH.to_string();
    }
    format!("/{t}")
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// settings.json first, then `JARVIS_*` env vars, then built-in defaults.
pub fn load_config(data_dir: &Path) -> ApiConfig {
    let s = load_settings(data_dir).unwrap_or_default();

    let base_url = s
        .base_url
        .filter(|v| !v.trim().is_empty())
        .or_else(|| non_empty_env("JARVIS_BASE_URL"))
        .unwrap_or_default();

    let control_path = s
        .control_path
        .filter(|v| !v.trim().is_empty())
        .or_else(|| non_empty_env("JARVIS_CONTROL_PATH"))
        .unwrap_or_default();

    let voice_type = s
        .voice_type
        .filter(|v| !v.trim().is_empty())
        .or_else(|| non_empty_env("JARVIS_VOICE_TYPE"))
        .unwrap_or_else(|| DEFAULT_VOICE_TYPE.to_string());

    ApiConfig {
        base_url: normalize_base_url(&base_url),
        control_path: normalize_control_path(&control_path),
        voice_type,
    }
}
