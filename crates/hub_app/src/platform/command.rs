//! Line-oriented console commands.

use chrono::{DateTime, Utc};
use hub_core::{FieldPath, FieldValue, FileRef, HubError, JobKind, Msg, StepIndex};
use thiserror::Error;

pub const HELP: &str = "\
commands:
  set <step>.<field> <text>     edit a text field
  attach <step>.<field> <file>  reference an uploaded file (repeatable)
  next | back                   move through the wizard
  run [step]                    start the AI job of a step (default: current)
  cancel|retry|discard <kind>   manage the analysis or generation job
  wait                          pause until saves and jobs settle
  flush                         save now
  dismiss <id>                  hide a notice
  delete                        discard the draft everywhere
  reload                        mount the draft again after a failed load
  logout | quit | show | help";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Set { path: FieldPath, text: String },
    Attach { path: FieldPath, files: Vec<String> },
    Next,
    Back,
    Run(Option<StepIndex>),
    Cancel(JobKind),
    Retry(JobKind),
    Discard(JobKind),
    Wait,
    Flush,
    Dismiss(u64),
    Delete,
    Reload,
    Logout,
    Show,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error(transparent)]
    Invalid(#[from] HubError),
}

/// Parses one input line. Blank lines and `#` comments yield `None`.
pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "set" => {
            let (path, text) = rest
                .split_once(char::is_whitespace)
                .ok_or(CommandError::Usage("set <step>.<field> <text>"))?;
            Command::Set {
                path: path.parse()?,
                text: text.trim().to_string(),
            }
        }
        "attach" => {
            let mut parts = rest.split_whitespace();
            let path = parts
                .next()
                .ok_or(CommandError::Usage("attach <step>.<field> <file>..."))?;
            let files: Vec<String> = parts.map(str::to_string).collect();
            if files.is_empty() {
                return Err(CommandError::Usage("attach <step>.<field> <file>..."));
            }
            Command::Attach {
                path: path.parse()?,
                files,
            }
        }
        "next" => Command::Next,
        "back" => Command::Back,
        "run" if rest.is_empty() => Command::Run(None),
        "run" => Command::Run(Some(
            rest.parse()
                .map_err(|_| CommandError::Usage("run [step]"))?,
        )),
        "cancel" => Command::Cancel(job_kind(rest)?),
        "retry" => Command::Retry(job_kind(rest)?),
        "discard" => Command::Discard(job_kind(rest)?),
        "wait" => Command::Wait,
        "flush" | "save" => Command::Flush,
        "dismiss" => Command::Dismiss(
            rest.parse()
                .map_err(|_| CommandError::Usage("dismiss <notice id>"))?,
        ),
        "delete" => Command::Delete,
        "reload" => Command::Reload,
        "logout" => Command::Logout,
        "show" => Command::Show,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

fn job_kind(rest: &str) -> Result<JobKind, CommandError> {
    if rest.is_empty() {
        return Err(CommandError::Usage("<command> analysis|generation"));
    }
    Ok(rest.parse()?)
}

impl Command {
    /// Message for the core, if the command is one. `current_step` resolves
    /// a bare `run`.
    pub fn to_msg(&self, current_step: Option<StepIndex>, now: DateTime<Utc>) -> Option<Msg> {
        let msg = match self {
            Command::Set { path, text } => Msg::FieldEdited {
                path: path.clone(),
                value: FieldValue::text(text.clone()),
                at: now,
            },
            Command::Attach { path, files } => Msg::FieldEdited {
                path: path.clone(),
                value: FieldValue::Files {
                    files: files
                        .iter()
                        .map(|name| FileRef {
                            key: format!("uploads/{name}"),
                            name: name.clone(),
                        })
                        .collect(),
                },
                at: now,
            },
            Command::Next => Msg::NextClicked { at: now },
            Command::Back => Msg::BackClicked { at: now },
            Command::Run(step) => Msg::RunStepJob {
                step: step.or(current_step)?,
            },
            Command::Cancel(kind) => Msg::CancelJob { kind: *kind },
            Command::Retry(kind) => Msg::RetryJob { kind: *kind },
            Command::Discard(kind) => Msg::DiscardJob { kind: *kind },
            Command::Flush => Msg::FlushRequested,
            Command::Dismiss(id) => Msg::NoticeDismissed { id: *id },
            Command::Delete => Msg::DiscardDraft,
            Command::Logout => Msg::LoggedOut,
            Command::Reload
            | Command::Wait
            | Command::Show
            | Command::Help
            | Command::Quit => return None,
        };
        Some(msg)
    }
}
