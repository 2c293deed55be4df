//! JSONL trace spans, metrics lines and data-dir resolution shared by every
//! jarvis crate.

use serde_json::{json, Value};
use sha2::{Digest, Sha256};

pub mod data_dir;
pub mod metrics;
mod safe_print;
pub mod trace;

pub use trace::Span;

pub fn sha256_hex(b: &[u8]) -> String {
    hex::encode(Sha256::digest(b))
}

/// Trace-safe stand-in for user text: its length and digest, never the text.
pub fn text_fingerprint(s: &str) -> Value {
    json!({
        "chars": s.chars().count(),
        "sha256": sha256_hex(s.as_bytes()),
    })
}
