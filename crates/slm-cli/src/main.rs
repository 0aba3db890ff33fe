//! # slm
//!
//! Social Listening LM terminal chat. Wires settings, the Gemini provider,
//! and a [`Session`] together and runs an interactive loop.

#![deny(unsafe_code)]

mod commands;
mod persist;
mod render;
mod repl;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use slm_llm::google::{GoogleConfig, GoogleProvider};
use slm_runtime::Session;
use slm_runtime::ingest::ingest_paths;
use slm_settings::SlmSettings;
use tracing::info;

use crate::persist::{SESSION_FILE, load_snapshot};
use crate::repl::{Repl, report_ingest};

/// Social Listening LM.
#[derive(Parser, Debug)]
#[command(name = "slm", about = "Chat with your documents", version)]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Start an interactive chat.
    Chat(ChatArgs),
}

#[derive(Args, Debug)]
struct ChatArgs {
    /// Document to ground answers in (repeatable).
    #[arg(long = "doc")]
    docs: Vec<PathBuf>,

    /// Logic file whose rules replace the saved ones.
    #[arg(long)]
    logic: Option<PathBuf>,

    /// Ignore the saved session.
    #[arg(long)]
    fresh: bool,
}

fn google_config(settings: &SlmSettings) -> GoogleConfig {
    let google = &settings.api.google;
    GoogleConfig {
        api_key: google.api_key.clone(),
        base_url: google.base_url.clone(),
        chat_model: google.chat_model.clone(),
        distill_model: google.distill_model.clone(),
        max_output_tokens: google.max_output_tokens,
        temperature: google.temperature,
    }
}

async fn chat(args: ChatArgs, settings: &SlmSettings) -> Result<()> {
    let provider = Arc::new(GoogleProvider::new(google_config(settings)));
    let session_path = settings.session.resolved_data_dir().join(SESSION_FILE);

    let snapshot = if args.fresh {
        None
    } else {
        load_snapshot(&session_path)?
    };
    let session = Arc::new(match snapshot {
        Some(snapshot) => {
            info!(
                path = %session_path.display(),
                messages = snapshot.messages.len(),
                "restored session"
            );
            Session::restore(snapshot, provider.clone(), provider)
        }
        None => Session::new(provider.clone(), provider),
    });

    if !args.docs.is_empty() {
        report_ingest(&session, ingest_paths(&args.docs).await);
    }
    if let Some(path) = args.logic {
        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let count = session
            .upload_logic(&json)
            .with_context(|| format!("Failed to load logic from {}", path.display()))?;
        println!("Loaded {count} rule(s) from {}.", path.display());
    }

    let autosave = settings.session.autosave.then_some(session_path);
    Repl::new(session, autosave).run().await
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = slm_settings::get_settings();
    slm_core::logging::init_subscriber(&settings.logging.level);

    match cli.command {
        CliCommand::Chat(args) => chat(args, &settings).await,
    }
}
