//! Typed client for the assistant backend's HTTP contract.

pub mod client;
pub mod config;

pub use client::{AssistantApi, ChatReply, ControlReply, HttpAssistantApi, ListenReply};
pub use config::{load_config, load_settings, save_settings, ApiConfig, Settings};
