//! `jarvis`: drive the assistant dashboard from a terminal.

mod render;

use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use jarvis_core::{CategoryEndpoint, ControlCommand};
use jarvis_engine::{
    CommandClassifier, Dashboard, FetchOutcome, NoCommandClassifier, PhraseClassifier,
    SpeakOutcome,
};
use jarvis_providers::load_config;

#[derive(Parser)]
#[command(name = "jarvis", version, about = "Assistant dashboard client")]
struct Cli {
    /// Backend base URL; overrides settings.json and JARVIS_BASE_URL.
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Where settings.json, trace.jsonl and metrics.jsonl live.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load every dashboard category and print it.
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Re-fetch one category.
    Refresh {
        #[arg(value_parser = parse_endpoint)]
        category: CategoryEndpoint,
    },
    /// Send a control command, e.g. `jarvis control take screenshot`.
    Control {
        #[arg(required = true, num_args = 1..)]
        command: Vec<String>,
    },
    /// List the accepted control commands.
    Commands,
    /// Listen once, ask the assistant, optionally act on the request.
    Listen {
        /// Read the reply aloud.
        #[arg(long)]
        speak: bool,
        /// Dispatch a control command named in the utterance.
        #[arg(long)]
        act: bool,
    },
    /// Send a typed prompt to the assistant.
    Ask {
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,
        #[arg(long)]
        speak: bool,
    },
    /// Speak text through the backend voice.
    Speak {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
        #[arg(long)]
        voice: Option<String>,
    },
}

fn parse_endpoint(s: &str) -> Result<CategoryEndpoint, String> {
    CategoryEndpoint::parse(s).ok_or_else(|| {
        let names: Vec<_> = CategoryEndpoint::ALL.iter().map(|e| e.as_str()).collect();
        format!("expected one of: {}", names.join(", "))
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Command::Commands = cli.command {
        for c in ControlCommand::ALL {
            println!("{c}");
        }
        return Ok(());
    }

    let data_dir = match cli.data_dir {
        Some(p) => p,
        None => jarvis_observability::data_dir::data_dir().context("resolve data dir failed")?,
    };
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("create data dir failed: {}", data_dir.display()))?;

    let mut cfg = load_config(&data_dir);
    if let Some(url) = cli.base_url.as_deref() {
        cfg = cfg.with_base_url(url);
    }

    let classifier: Arc<dyn CommandClassifier> = match &cli.command {
        Command::Listen { act: true, .. } => Arc::new(PhraseClassifier),
        _ => Arc::new(NoCommandClassifier),
    };
    let dash = Dashboard::from_config_with(cfg, &data_dir, classifier);

    match cli.command {
        Command::Status { json } => status(&dash, json).await,
        Command::Refresh { category } => refresh(&dash, category).await,
        Command::Control { command } => control(&dash, &command.join(" ")).await,
        Command::Listen { speak, .. } => listen(&dash, speak).await,
        Command::Ask { prompt, speak } => ask(&dash, &prompt.join(" "), speak).await,
        Command::Speak { text, voice } => say(&dash, &text.join(" "), voice.as_deref()).await,
        Command::Commands => Ok(()),
    }
}

async fn status(dash: &Dashboard, json: bool) -> Result<()> {
    let report = dash.activate().await;
    let snap = dash.snapshot();
    if json {
        let s = serde_json::to_string_pretty(&snap).context("serialize snapshot failed")?;
        println!("{s}");
    } else {
        print!("{}", render::snapshot(&snap));
    }
    if !report.all_updated() {
        eprintln!("fetch: {}", render::report(&report));
    }
    Ok(())
}

async fn refresh(dash: &Dashboard, endpoint: CategoryEndpoint) -> Result<()> {
    let category = endpoint.category();
    let outcome = dash.refresh(endpoint).await;
    let st = dash.store().get(category);
    if let Some(data) = &st.data {
        print!("{}", render::payload(data));
    }
    match (outcome, st.error) {
        (FetchOutcome::Failed, Some(e)) => Err(anyhow!("{}: {}", e.code, e.message)),
        _ => Ok(()),
    }
}

async fn control(dash: &Dashboard, raw: &str) -> Result<()> {
    let receipt = dash.dispatch_control(raw).await?;
    println!("{}", receipt.message);
    Ok(())
}

async fn listen(dash: &Dashboard, speak: bool) -> Result<()> {
    println!("listening...");
    let run = dash
        .listen()
        .await
        .ok_or_else(|| anyhow!("a voice run is already active"))?;
    print!("{}", render::run(&run));
    if speak {
        if let Some(reply) = &run.ai_response {
            report_speak(dash.speak(reply, None).await);
        }
    }
    match (run.stage_failed, run.error) {
        (Some(stage), Some(e)) => Err(anyhow!("{} failed: {}", stage.as_str(), e.code)),
        _ => Ok(()),
    }
}

async fn ask(dash: &Dashboard, prompt: &str, speak: bool) -> Result<()> {
    let reply = dash.ask(prompt).await?;
    println!("{reply}");
    if speak {
        report_speak(dash.speak(&reply, None).await);
    }
    Ok(())
}

async fn say(dash: &Dashboard, text: &str, voice: Option<&str>) -> Result<()> {
    report_speak(dash.speak(text, voice).await);
    Ok(())
}

fn report_speak(outcome: SpeakOutcome) {
    match outcome {
        SpeakOutcome::Spoken => {}
        SpeakOutcome::Skipped => eprintln!("speak: nothing to say"),
        SpeakOutcome::Busy => eprintln!("speak: already speaking"),
        SpeakOutcome::Failed { code, message } => eprintln!("speak failed: {code}: {message}"),
    }
}
