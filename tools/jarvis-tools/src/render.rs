use chrono::{DateTime, Local, Utc};
use jarvis_core::{Category, Payload, RequestState};
use jarvis_engine::{ControlOutcome, FetchReport, PipelineRun, StoreSnapshot};

const MAX_PROCESS_ROWS: usize = 15;

pub fn clock(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|t| t.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub fn snapshot(snap: &StoreSnapshot) -> String {
    let mut out = String::new();
    for c in Category::ALL {
        out.push_str(&category(c, snap.get(c)));
    }
    out
}

fn category(c: Category, st: &RequestState) -> String {
    let mut head = format!("[{c}]");
    if st.loading {
        head.push_str(" loading");
    }
    if let Some(ms) = st.updated_at_ms {
        head.push_str(&format!(" (updated {})", clock(ms)));
    }
    let mut out = format!("{head}\n");
    if let Some(e) = &st.error {
        out.push_str(&format!("  error {}: {}\n", e.code, e.message));
    }
    match &st.data {
        Some(p) => out.push_str(&payload(p)),
        None if st.error.is_none() => out.push_str("  (no data)\n"),
        None => {}
    }
    out
}

pub fn payload(p: &Payload) -> String {
    match p {
        Payload::SystemInfo(s) => format!(
            "  os: {}\n  processor: {}\n  memory: {}\n  cores: {}\n",
            s.os, s.processor, s.memory_total, s.cpu_cores
        ),
        Payload::ProcessList(list) => {
            let mut out = format!("  {} processes\n", list.len());
            for p in list.iter().take(MAX_PROCESS_ROWS) {
                let user = p.username.as_deref().unwrap_or("-");
                out.push_str(&format!(
                    "  {:>7}  {:<10} {:<12} {}\n",
                    p.pid, p.status, user, p.name
                ));
            }
            if list.len() > MAX_PROCESS_ROWS {
                out.push_str(&format!("  ... {} more\n", list.len() - MAX_PROCESS_ROWS));
            }
            out
        }
        Payload::NetworkInfo(n) => format!(
            "  ip: {}\n  interfaces: {}\n  internet: {}\n",
            n.ip,
            n.interfaces.join(", "),
            if n.internet_connectivity { "connected" } else { "offline" }
        ),
        Payload::Chat(x) => format!("  you: {}\n  jarvis: {}\n", x.prompt, x.response),
        Payload::Voice(t) => format!("  heard: {}\n", t.text),
        Payload::ControlActions(r) => format!("  {}: {}\n", r.command, r.message),
    }
}

pub fn report(r: &FetchReport) -> String {
    r.outcomes
        .iter()
        .map(|(c, o)| format!("{c}: {}", o.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn run(r: &PipelineRun) -> String {
    let mut out = String::new();
    if let Some(t) = &r.transcript {
        out.push_str(&format!("heard: {t}\n"));
    }
    if let Some(a) = &r.ai_response {
        out.push_str(&format!("jarvis: {a}\n"));
    }
    match &r.control_outcome {
        Some(ControlOutcome::Dispatched { command, message }) => {
            out.push_str(&format!("action {command}: {message}\n"))
        }
        Some(ControlOutcome::Failed { command, error }) => out.push_str(&format!(
            "action {command} failed: {} ({})\n",
            error.message, error.code
        )),
        None => {}
    }
    if let (Some(stage), Some(e)) = (r.stage_failed, &r.error) {
        out.push_str(&format!(
            "{} failed: {} ({})\n",
            stage.as_str(),
            e.message,
            e.code
        ));
    }
    out
}
