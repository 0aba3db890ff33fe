//! REPL line parsing.

use std::path::PathBuf;

/// One parsed REPL input line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Plain text sent as a user message.
    Say(String),
    /// Queue an image for the next message.
    Attach(PathBuf),
    /// Distill a rule from the conversation.
    Save,
    /// List rules.
    Rules,
    /// Append a rule.
    RuleAdd(String),
    /// Replace rule `n` (1-based).
    RuleEdit(usize, String),
    /// Remove rule `n` (1-based).
    RuleRemove(usize),
    /// Write the logic file to a path (a directory gets the dated file name).
    LogicExport(PathBuf),
    /// Replace rules from a logic file.
    LogicImport(PathBuf),
    /// Drop all rules.
    LogicClear,
    /// List documents.
    Docs,
    /// Ingest a document.
    DocAdd(PathBuf),
    /// Remove a document by file name.
    DocRemove(String),
    /// Delete a message by id or unique id prefix.
    Delete(String),
    /// Print the conversation.
    History,
    /// Clear the conversation.
    Clear,
    /// Print the command list.
    Help,
    /// Exit.
    Quit,
}

/// Usage text for `/help`.
pub const HELP: &str = "\
Commands:
  /attach <image>          attach an image to the next message
  /save                    distill a rule from this conversation
  /rules                   list rules
  /rule add <text>         add a rule
  /rule edit <n> <text>    replace rule n
  /rule rm <n>             remove rule n
  /logic export <path>     write rules to a logic file
  /logic import <path>     load rules from a logic file
  /logic clear             remove all rules
  /docs                    list documents
  /doc add <path>          add a .txt or .md document
  /doc rm <name>           remove a document
  /delete <id>             delete a message
  /history                 show the conversation
  /clear                   clear the conversation
  /quit                    exit
Anything else is sent as a message. Ctrl-C stops a running answer.";

/// Parse one input line. Returns `Ok(None)` for a blank line and
/// `Err(usage)` for a malformed command.
pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Some(Command::Say(line.to_owned())));
    };

    let (head, args) = split_word(rest);
    let command = match head {
        "attach" => Command::Attach(required(args, "/attach <image>")?.into()),
        "save" => Command::Save,
        "rules" => Command::Rules,
        "rule" => parse_rule(args)?,
        "logic" => parse_logic(args)?,
        "docs" => Command::Docs,
        "doc" => parse_doc(args)?,
        "delete" => Command::Delete(required(args, "/delete <id>")?.to_owned()),
        "history" => Command::History,
        "clear" => Command::Clear,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(format!("unknown command /{other} (try /help)")),
    };
    Ok(Some(command))
}

fn parse_rule(args: &str) -> Result<Command, String> {
    let (sub, rest) = split_word(args);
    match sub {
        "add" => Ok(Command::RuleAdd(required(rest, "/rule add <text>")?.to_owned())),
        "edit" => {
            let usage = "/rule edit <n> <text>";
            let (n, text) = split_word(rest);
            Ok(Command::RuleEdit(index(n, usage)?, required(text, usage)?.to_owned()))
        }
        "rm" => Ok(Command::RuleRemove(index(rest, "/rule rm <n>")?)),
        _ => Err("usage: /rule add|edit|rm ...".into()),
    }
}

fn parse_logic(args: &str) -> Result<Command, String> {
    let (sub, rest) = split_word(args);
    match sub {
        "export" => Ok(Command::LogicExport(
            required(rest, "/logic export <path>")?.into(),
        )),
        "import" => Ok(Command::LogicImport(
            required(rest, "/logic import <path>")?.into(),
        )),
        "clear" => Ok(Command::LogicClear),
        _ => Err("usage: /logic export|import|clear ...".into()),
    }
}

fn parse_doc(args: &str) -> Result<Command, String> {
    let (sub, rest) = split_word(args);
    match sub {
        "add" => Ok(Command::DocAdd(required(rest, "/doc add <path>")?.into())),
        "rm" => Ok(Command::DocRemove(required(rest, "/doc rm <name>")?.to_owned())),
        _ => Err("usage: /doc add|rm ...".into()),
    }
}

fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim();
    s.split_once(char::is_whitespace)
        .map_or((s, ""), |(head, rest)| (head, rest.trim()))
}

fn required<'a>(arg: &'a str, usage: &str) -> Result<&'a str, String> {
    if arg.is_empty() {
        Err(format!("usage: {usage}"))
    } else {
        Ok(arg)
    }
}

/// Parse a 1-based position into a 0-based index.
fn index(arg: &str, usage: &str) -> Result<usize, String> {
    match arg.trim().parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n - 1),
        _ => Err(format!("usage: {usage} (n starts at 1)")),
    }
}
