use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
    sync::{Mutex, OnceLock},
    time::Instant,
};

use serde::Serialize;
use serde_json::{json, Value};

use jarvis_core::now_ms;

const BACKTRACE_MAX_CHARS: usize = 12_000;

/// Trace knobs from `JARVIS_TRACE_*`, read on every write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceSettings {
    pub enabled: bool,    // JARVIS_TRACE_ENABLED, default on
    pub backtrace: bool,  // JARVIS_TRACE_BACKTRACE, default on
    pub max_bytes: u64,   // JARVIS_TRACE_MAX_BYTES, default 10MB
    pub max_files: usize, // JARVIS_TRACE_MAX_FILES, default 5
}

impl Default for TraceSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            backtrace: true,
            max_bytes: 10_000_000,
            max_files: 5,
        }
    }
}

impl TraceSettings {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            enabled: env_flag("JARVIS_TRACE_ENABLED").unwrap_or(d.enabled),
            backtrace: env_flag("JARVIS_TRACE_BACKTRACE").unwrap_or(d.backtrace),
            max_bytes: env_parse("JARVIS_TRACE_MAX_BYTES").unwrap_or(d.max_bytes),
            max_files: env_parse("JARVIS_TRACE_MAX_FILES").unwrap_or(d.max_files),
        }
    }
}

fn env_flag(key: &str) -> Option<bool> {
    let v = std::env::var(key).ok()?;
    let off = matches!(
        v.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    );
    Some(!off)
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.trim().parse().ok()
}

pub fn trace_path(data_dir: &Path) -> PathBuf {
    data_dir.join("trace.jsonl")
}

fn rotated_path(data_dir: &Path, n: usize) -> PathBuf {
    data_dir.join(format!("trace.jsonl.{n}"))
}

/// trace.jsonl → .1 → .2 … once the live file exceeds `max_bytes`; the
/// oldest generation beyond `max_files` is deleted.
fn rotate(data_dir: &Path, settings: &TraceSettings) {
    if settings.max_files == 0 {
        return;
    }
    let live = trace_path(data_dir);
    match std::fs::metadata(&live) {
        Ok(m) if m.len() > settings.max_bytes => {}
        _ => return,
    }
    let _ = std::fs::remove_file(rotated_path(data_dir, settings.max_files));
    for n in (1..settings.max_files).rev() {
        let from = rotated_path(data_dir, n);
        if from.exists() {
            let _ = std::fs::rename(&from, rotated_path(data_dir, n + 1));
        }
    }
    let _ = std::fs::rename(&live, rotated_path(data_dir, 1));
}

fn write_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

/// Appends one event. Never fails the caller; problems go to stderr.
pub fn emit_best_effort(data_dir: &Path, ev: &TraceEvent) {
    let settings = TraceSettings::from_env();
    if !settings.enabled {
        return;
    }
    let line = match serde_json::to_string(ev) {
        Ok(s) => s + "\n",
        Err(e) => {
            crate::safe_eprintln!("trace: serialize failed: {e}");
            return;
        }
    };

    let _g = write_lock().lock().unwrap_or_else(|p| p.into_inner());
    let _ = std::fs::create_dir_all(data_dir);
    rotate(data_dir, &settings);
    let p = trace_path(data_dir);
    let res = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&p)
        .and_then(|mut f| f.write_all(line.as_bytes()));
    if let Err(e) = res {
        crate::safe_eprintln!("trace: append failed: {}: {e}", p.display());
    }
}

/// Replaces the account name in home-directory paths with `<redacted>`.
fn redact_user_paths(s: &str) -> String {
    const HOMES: [(&str, char); 3] = [("\\Users\\", '\\'), ("/Users/", '/'), ("/home/", '/')];
    let mut out = s.to_string();
    for (marker, sep) in HOMES {
        let mut acc = String::with_capacity(out.len());
        let mut parts = out.split(marker);
        if let Some(first) = parts.next() {
            acc.push_str(first);
        }
        for part in parts {
            acc.push_str(marker);
            acc.push_str("<redacted>");
            if let Some(i) = part.find(sep) {
                acc.push_str(&part[i..]);
            }
        }
        out = acc;
    }
    out
}

fn backtrace_ctx(settings: &TraceSettings) -> Option<Value> {
    if !settings.backtrace {
        return None;
    }
    let bt = format!("{:?}", std::backtrace::Backtrace::force_capture());
    let bt: String = redact_user_paths(&bt)
        .chars()
        .filter(|c| *c != '\0')
        .take(BACKTRACE_MAX_CHARS)
        .collect();
    Some(json!({ "backtrace": bt }))
}

#[derive(Debug, Clone, Serialize)]
pub struct TraceError {
    pub kind: String, // http|pipeline|logic
    pub code: String, // E_* or SKIPPED/ABORTED
    pub message: String,
}

impl TraceError {
    fn new(kind: &str, code: &str, message: &str) -> Self {
        Self {
            kind: kind.to_string(),
            code: code.to_string(),
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TraceEvent {
    pub ts_ms: i64,
    pub run_id: Option<String>,
    pub stage: String,
    pub step_id: String,
    pub op: String,     // start|end|event
    pub status: String, // ok|err|skipped|aborted
    pub duration_ms: Option<u128>,
    pub error: Option<TraceError>,
    pub ctx: Option<Value>,
}

/// Identity shared by every line a step writes.
#[derive(Debug, Clone)]
struct StepKey {
    run_id: Option<String>,
    stage: String,
    step_id: String,
}

impl StepKey {
    fn new(run_id: Option<&str>, stage: &str, step_id: &str) -> Self {
        Self {
            run_id: run_id.map(str::to_string),
            stage: stage.to_string(),
            step_id: step_id.to_string(),
        }
    }

    fn line(&self, op: &str, status: &str) -> TraceEvent {
        TraceEvent {
            ts_ms: now_ms(),
            run_id: self.run_id.clone(),
            stage: self.stage.clone(),
            step_id: self.step_id.clone(),
            op: op.to_string(),
            status: status.to_string(),
            duration_ms: None,
            error: None,
            ctx: None,
        }
    }
}

/// A point-in-time event with no duration.
pub fn event(
    data_dir: &Path,
    run_id: Option<&str>,
    stage: &str,
    step_id: &str,
    status: &str,
    ctx: Option<Value>,
) {
    let mut ev = StepKey::new(run_id, stage, step_id).line("event", status);
    ev.ctx = ctx;
    emit_best_effort(data_dir, &ev);
}

/// A timed step. Ends with `ok`, `skipped` or `err`; dropping it unfinished
/// records `aborted` with a backtrace.
pub struct Span {
    data_dir: PathBuf,
    key: StepKey,
    t0: Instant,
    finished: bool,
}

impl Span {
    pub fn start(
        data_dir: &Path,
        run_id: Option<&str>,
        stage: &str,
        step_id: &str,
        ctx: Option<Value>,
    ) -> Self {
        let key = StepKey::new(run_id, stage, step_id);
        let mut ev = key.line("start", "ok");
        ev.ctx = ctx;
        emit_best_effort(data_dir, &ev);
        Self {
            data_dir: data_dir.to_path_buf(),
            key,
            t0: Instant::now(),
            finished: false,
        }
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.t0.elapsed().as_millis()
    }

    fn finish(&mut self, status: &str, error: Option<TraceError>, ctx: Option<Value>) {
        self.finished = true;
        let mut ev = self.key.line("end", status);
        ev.duration_ms = Some(self.elapsed_ms());
        ev.error = error;
        ev.ctx = ctx;
        emit_best_effort(&self.data_dir, &ev);
    }

    pub fn ok(mut self, ctx: Option<Value>) {
        self.finish("ok", None, ctx);
    }

    pub fn skipped(mut self, reason: &str, ctx: Option<Value>) {
        self.finish("skipped", Some(TraceError::new("logic", "SKIPPED", reason)), ctx);
    }

    pub fn err(mut self, kind: &str, code: &str, message: &str, ctx: Option<Value>) {
        self.finish("err", Some(TraceError::new(kind, code, message)), ctx);
    }
}

impl Drop for Span {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let ctx = backtrace_ctx(&TraceSettings::from_env());
        let error = TraceError::new("logic", "ABORTED", "span dropped before it finished");
        self.finish("aborted", Some(error), ctx);
    }
}
