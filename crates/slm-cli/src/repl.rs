//! Interactive chat loop.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use slm_core::events::SessionEvent;
use slm_core::ids::MessageId;
use slm_core::messages::{Part, Role};
use slm_runtime::ingest::{IngestReport, ingest_paths};
use slm_runtime::{RuntimeError, Session};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::commands::{self, Command, HELP};
use crate::persist::{read_attachment, save_snapshot};
use crate::render::{self, StreamPrinter};

/// Whether the loop should keep going after a command.
enum Flow {
    Continue,
    Quit,
}

/// REPL state around one session.
pub struct Repl {
    session: Arc<Session>,
    pending: Vec<Part>,
    autosave: Option<PathBuf>,
}

impl Repl {
    /// Wrap a session. `autosave` is the snapshot path written after every
    /// change, if enabled.
    pub fn new(session: Arc<Session>, autosave: Option<PathBuf>) -> Self {
        Self {
            session,
            pending: Vec::new(),
            autosave,
        }
    }

    /// Read lines from stdin until `/quit`, end of input, or Ctrl-C at the
    /// prompt.
    pub async fn run(mut self) -> Result<()> {
        println!("Social Listening LM. Type /help for commands.");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            prompt(self.pending.len());
            let line = tokio::select! {
                line = lines.next_line() => line.context("Failed to read stdin")?,
                _ = tokio::signal::ctrl_c() => None,
            };
            let Some(line) = line else {
                println!();
                break;
            };
            let command = match commands::parse(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(usage) => {
                    println!("{usage}");
                    continue;
                }
            };
            match self.dispatch(command).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Quit) => break,
                Err(e) => println!("error: {e:#}"),
            }
        }
        self.autosave();
        Ok(())
    }

    async fn dispatch(&mut self, command: Command) -> Result<Flow> {
        match command {
            Command::Say(text) => self.send(text).await?,
            Command::Attach(path) => {
                self.pending.push(read_attachment(&path)?);
                println!("Attached {} (sent with your next message).", path.display());
            }
            Command::Save => self.save_logic().await,
            Command::Rules => print_rules(&self.session.rules()),
            Command::RuleAdd(text) => {
                self.session.add_rule(&text)?;
                println!("Rule {} added.", self.session.rules().len());
            }
            Command::RuleEdit(index, text) => {
                let _ = self.session.replace_rule(index, &text)?;
                println!("Rule {} updated.", index + 1);
            }
            Command::RuleRemove(index) => {
                let removed = self.session.remove_rule(index)?;
                println!("Removed: {removed}");
            }
            Command::LogicExport(path) => self.export_logic(&path)?,
            Command::LogicImport(path) => {
                let json = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let count = self.session.upload_logic(&json)?;
                println!("Loaded {count} rule(s).");
            }
            Command::LogicClear => {
                self.session.clear_rules();
                println!("Logic cleared.");
            }
            Command::Docs => print_documents(&self.session),
            Command::DocAdd(path) => {
                let report = ingest_paths(&[path]).await;
                report_ingest(&self.session, report);
            }
            Command::DocRemove(name) => {
                if self.session.remove_document(&name) {
                    println!("Removed {name}.");
                } else {
                    println!("No document named {name}.");
                }
            }
            Command::Delete(id) => {
                let id = resolve_message_id(&self.session, &id)?;
                let _ = self.session.delete_message(&id)?;
                println!("Deleted {id}.");
            }
            Command::History => {
                for message in self.session.messages() {
                    println!("{}", render::history_entry(&message));
                }
            }
            Command::Clear => {
                self.session.clear_chat();
                println!("Chat cleared.");
            }
            Command::Help => println!("{HELP}"),
            Command::Quit => return Ok(Flow::Quit),
        }
        self.autosave();
        Ok(Flow::Continue)
    }

    /// Send one message, printing the answer as it streams. Ctrl-C stops it.
    async fn send(&mut self, text: String) -> Result<()> {
        let mut parts = vec![Part::text(text)];
        parts.append(&mut self.pending);

        let session = Arc::clone(&self.session);
        let mut events = session.subscribe();
        let send = session.send_message(parts);
        tokio::pin!(send);
        let mut printer = StreamPrinter::new();

        let settled = loop {
            tokio::select! {
                biased;
                result = &mut send => break result?,
                _ = tokio::signal::ctrl_c() => {
                    if session.stop_generation() {
                        info!("generation stopped from terminal");
                    }
                }
                event = events.recv() => {
                    let Ok(SessionEvent::MessageUpdated { message }) = event else {
                        continue;
                    };
                    if message.role != Role::Model {
                        continue;
                    }
                    if let Some(delta) = printer.delta(message.first_text()) {
                        print!("{delta}");
                        let _ = std::io::stdout().flush();
                    }
                }
            }
        };

        println!("{}", printer.finish(settled.first_text()));
        if let Some(sources) = render::citations(&settled) {
            println!("\n{sources}");
        }
        Ok(())
    }

    async fn save_logic(&self) {
        match self.session.save_logic().await {
            Ok(rule) => println!("Saved rule {}: {rule}", self.session.rules().len()),
            Err(RuntimeError::Distillation(e)) => println!("{e}"),
            Err(e) => println!("error: {e}"),
        }
    }

    fn export_logic(&self, path: &Path) -> Result<()> {
        if self.session.rules().is_empty() {
            println!("No logic to export.");
            return Ok(());
        }
        let target = if path.is_dir() {
            path.join(Session::logic_file_name(
                chrono::Local::now().date_naive(),
            ))
        } else {
            path.to_path_buf()
        };
        std::fs::write(&target, self.session.download_logic()?)
            .with_context(|| format!("Failed to write {}", target.display()))?;
        println!("Wrote {}.", target.display());
        Ok(())
    }

    fn autosave(&self) {
        let Some(path) = &self.autosave else {
            return;
        };
        if let Err(e) = save_snapshot(path, &self.session.snapshot()) {
            warn!(error = %e, path = %path.display(), "autosave failed");
        }
    }
}

fn prompt(pending: usize) {
    if pending > 0 {
        print!("[{pending} attached] > ");
    } else {
        print!("> ");
    }
    let _ = std::io::stdout().flush();
}

fn print_rules(rules: &[String]) {
    if rules.is_empty() {
        println!("No rules yet. Use /save or /rule add.");
    }
    for (i, rule) in rules.iter().enumerate() {
        println!("{:>3}. {rule}", i + 1);
    }
}

fn print_documents(session: &Session) {
    let documents = session.documents();
    if documents.is_empty() {
        println!("No documents. Use /doc add <path>.");
    }
    for doc in documents {
        println!("  {} ({} chars)", doc.file_name, doc.content.chars().count());
    }
}

/// Add ingested documents to the session and print what happened.
pub fn report_ingest(session: &Session, report: IngestReport) {
    for failure in &report.failures {
        println!("Skipped {}: {}", failure.file_name, failure.error);
    }
    let offered = report.documents.len();
    let added = session.add_documents(report.documents);
    if added > 0 {
        println!("Added {added} document(s).");
    }
    if added < offered {
        println!("{} document(s) already present.", offered - added);
    }
}

/// Find the message whose id equals or uniquely starts with `needle`.
fn resolve_message_id(session: &Session, needle: &str) -> Result<MessageId> {
    let matches: Vec<MessageId> = session
        .messages()
        .into_iter()
        .map(|m| m.id)
        .filter(|id| id.as_str().starts_with(needle))
        .collect();
    if let Some(exact) = matches.iter().find(|id| id.as_str() == needle) {
        return Ok(exact.clone());
    }
    match matches.as_slice() {
        [only] => Ok(only.clone()),
        [] => anyhow::bail!("no message with id {needle}"),
        _ => anyhow::bail!("id prefix {needle} matches {} messages", matches.len()),
    }
}
