// src/provider/command.rs

use std::process::Stdio;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use super::base::{interrupted, CacheRoot};
use super::CleanMode;
use crate::cache::EvictionResult;
use crate::error::{EngineError, Failed, Outcome};

/// Cleans by running the tool's own cleanup command.
#[derive(Debug, Clone)]
pub struct CommandProvider {
    root: CacheRoot,
    clean_cmd: String,
    smart_cmd: Option<String>,
}

impl CommandProvider {
    pub fn new(root: CacheRoot, clean_cmd: impl Into<String>, smart_cmd: Option<String>) -> Self {
        CommandProvider {
            root,
            clean_cmd: clean_cmd.into(),
            smart_cmd,
        }
    }

    pub fn root(&self) -> &CacheRoot {
        &self.root
    }

    pub fn clean_cmd(&self) -> &str {
        &self.clean_cmd
    }

    /// The size-capped command line, with `{max_bytes}` filled in.
    pub fn smart_cmd(&self) -> Option<String> {
        self.smart_cmd
            .as_ref()
            .map(|template| template.replace("{max_bytes}", &self.root.size_limit().to_string()))
    }

    pub async fn clean(
        &self,
        mode: CleanMode,
        dry_run: bool,
        cancel: &CancellationToken,
    ) -> Outcome<EvictionResult> {
        match mode {
            CleanMode::Full => run_measured(&self.root, &self.clean_cmd, dry_run, cancel).await,
            CleanMode::Smart => match self.smart_cmd() {
                Some(line) => run_measured(&self.root, &line, dry_run, cancel).await,
                // Tool has no keep-size switch; evict its files directly
                None => self.root.trim(dry_run, cancel).await,
            },
        }
    }
}

/// Runs `line` and reports the size drop across `root` as freed bytes. The
/// tool's individual deletions are not observable, so `deleted_count`
/// stays zero.
pub(crate) async fn run_measured(
    root: &CacheRoot,
    line: &str,
    dry_run: bool,
    cancel: &CancellationToken,
) -> Outcome<EvictionResult> {
    if dry_run {
        return Ok(EvictionResult::with_summary(format!("would run: {}", line), true));
    }
    if cancel.is_cancelled() {
        return Err(interrupted(false));
    }

    let before = root.measure(cancel).await;
    match run_command(line, cancel).await {
        Ok(output) => {
            let after = root.measure(cancel).await;
            log::info!(
                "{}: `{}` freed {} bytes",
                root.name(),
                line,
                before.saturating_sub(after)
            );
            Ok(EvictionResult {
                freed_bytes: before.saturating_sub(after),
                summary: output,
                ..Default::default()
            })
        }
        Err(failed) => {
            let (output, error) = failed.into_parts();
            log::warn!("{}: `{}` failed: {}", root.name(), line, error);
            Err(Failed::new(
                EvictionResult {
                    interrupted: error.is_cancelled(),
                    summary: output,
                    ..Default::default()
                },
                error,
            ))
        }
    }
}

/// Splits `line` into argv, and runs it until exit or cancellation. The
/// value (partial or not) is stdout followed by stderr, trimmed.
pub async fn run_command(line: &str, cancel: &CancellationToken) -> Outcome<String> {
    let argv = split_command(line).map_err(|err| Failed::new(String::new(), err))?;
    let Some((program, args)) = argv.split_first() else {
        return Ok(String::new());
    };

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = command.spawn().map_err(|source| {
        Failed::new(
            String::new(),
            EngineError::Spawn {
                program: program.clone(),
                source,
            },
        )
    })?;

    // Dropping the wait future drops the child, which kills it.
    let output = tokio::select! {
        output = child.wait_with_output() => output.map_err(|source| {
            Failed::new(
                String::new(),
                EngineError::Spawn {
                    program: program.clone(),
                    source,
                },
            )
        })?,
        _ = cancel.cancelled() => {
            log::warn!("cancelled; killing {}", program);
            return Err(Failed::new(String::new(), EngineError::Cancelled));
        }
    };

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    let text = text.trim().to_string();

    if output.status.success() {
        Ok(text)
    } else {
        Err(Failed::new(
            text,
            EngineError::CommandFailed {
                program: program.clone(),
                status: output.status.to_string(),
            },
        ))
    }
}

/// POSIX-shell-style word splitting without expansion: whitespace separates
/// words, single quotes are literal, double quotes allow `\"`, `\\`, `\$`
/// and `` \` `` escapes, and a bare backslash escapes the next character.
pub fn split_command(line: &str) -> Result<Vec<String>, EngineError> {
    let invalid = |reason: &str| EngineError::InvalidCommand {
        command: line.to_string(),
        reason: reason.to_string(),
    };

    let mut words = Vec::new();
    let mut word = String::new();
    let mut in_word = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut word));
                    in_word = false;
                }
            }
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => word.push(c),
                        None => return Err(invalid("unterminated single quote")),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(c @ ('"' | '\\' | '$' | '`')) => word.push(c),
                            Some('\n') => {}
                            Some(c) => {
                                word.push('\\');
                                word.push(c);
                            }
                            None => return Err(invalid("unterminated double quote")),
                        },
                        Some(c) => word.push(c),
                        None => return Err(invalid("unterminated double quote")),
                    }
                }
            }
            '\\' => match chars.next() {
                Some('\n') => {}
                Some(c) => {
                    in_word = true;
                    word.push(c);
                }
                None => return Err(invalid("unterminated escape")),
            },
            c => {
                in_word = true;
                word.push(c);
            }
        }
    }
    if in_word {
        words.push(word);
    }
    Ok(words)
}
