//! Speech collaborators backed by external programs.
//!
//! Recognition runs a user-supplied transcription command (for example a
//! whisper.cpp wrapper that records one utterance) and takes its stdout as
//! the result. Synthesis writes the reply to the stdin of `say -f -` on
//! macOS or `espeak --stdin` elsewhere, so text starting with `-` is never
//! read as an option. Child processes are killed when a session is stopped.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::{RecognitionListener, RecognitionSource, SpeechListener, SpeechSink};
use crate::config::Config;
use crate::error::{Result, TaskTalkError};

#[cfg(target_os = "macos")]
const DEFAULT_SPEECH_COMMAND: (&str, &[&str]) = ("say", &["-f", "-"]);
#[cfg(not(target_os = "macos"))]
const DEFAULT_SPEECH_COMMAND: (&str, &[&str]) = ("espeak", &["--stdin"]);

#[derive(Debug, Clone, PartialEq, Eq)]
struct CommandLine {
    program: String,
    args: Vec<String>,
}

impl CommandLine {
    fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace().map(str::to_string);
        let program = words.next()?;
        Some(Self {
            program,
            args: words.collect(),
        })
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).kill_on_drop(true).stdin(Stdio::null());
        cmd
    }
}

/// Replace the running session, aborting the old one.
fn replace_session(slot: &Mutex<Option<JoinHandle<()>>>, next: Option<JoinHandle<()>>) {
    if let Ok(mut current) = slot.lock() {
        if let Some(previous) = std::mem::replace(&mut *current, next) {
            previous.abort();
        }
    }
}

pub struct CommandRecognizer {
    command: Option<CommandLine>,
    session: Mutex<Option<JoinHandle<()>>>,
}

impl CommandRecognizer {
    pub fn new(command_line: Option<&str>) -> Self {
        Self {
            command: command_line.and_then(CommandLine::parse),
            session: Mutex::new(None),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.recognizer_command.as_deref())
    }
}

#[async_trait]
impl RecognitionSource for CommandRecognizer {
    fn is_available(&self) -> bool {
        self.command
            .as_ref()
            .is_some_and(|c| which::which(&c.program).is_ok())
    }

    async fn start_listening(&self, listener: Arc<dyn RecognitionListener>) -> Result<()> {
        let command = self
            .command
            .as_ref()
            .ok_or_else(|| TaskTalkError::Speech("no recognizer command configured".to_string()))?;

        let mut cmd = command.command();
        cmd.stdout(Stdio::piped()).stderr(Stdio::null());
        let child = cmd.spawn()?;
        info!(program = %command.program, "listening");

        let handle = tokio::spawn(async move {
            match child.wait_with_output().await {
                Ok(output) if output.status.success() => {
                    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if text.is_empty() {
                        listener.on_error("no speech recognized".to_string());
                    } else {
                        listener.on_result(text);
                    }
                }
                Ok(output) => listener.on_error(format!("recognizer exited with {}", output.status)),
                Err(e) => listener.on_error(e.to_string()),
            }
        });
        replace_session(&self.session, Some(handle));
        Ok(())
    }

    async fn stop_listening(&self) {
        debug!("stop listening");
        replace_session(&self.session, None);
    }
}

pub struct CommandSpeechSink {
    command: CommandLine,
    session: Mutex<Option<JoinHandle<()>>>,
    shut_down: AtomicBool,
}

impl CommandSpeechSink {
    /// `command_line` must read the text to speak from stdin.
    pub fn new(command_line: Option<&str>) -> Self {
        let command = command_line.and_then(CommandLine::parse).unwrap_or_else(|| {
            let (program, args) = DEFAULT_SPEECH_COMMAND;
            CommandLine {
                program: program.to_string(),
                args: args.iter().map(|a| a.to_string()).collect(),
            }
        });
        Self {
            command,
            session: Mutex::new(None),
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.speech_command.as_deref())
    }
}

#[async_trait]
impl SpeechSink for CommandSpeechSink {
    async fn speak(&self, text: &str, listener: Arc<dyn SpeechListener>) -> Result<()> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(TaskTalkError::Speech("speech engine has been shut down".to_string()));
        }

        let mut cmd = self.command.command();
        cmd.stdin(Stdio::piped()).stdout(Stdio::null()).stderr(Stdio::null());
        let mut child = cmd.spawn()?;
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| TaskTalkError::Speech("speech command has no stdin".to_string()))?;
        let text = text.to_string();
        listener.on_start();

        let handle = tokio::spawn(async move {
            // Dropping stdin closes it so the command sees end of input.
            let fed = stdin.write_all(text.as_bytes()).await;
            drop(stdin);
            if let Err(e) = fed {
                listener.on_error(format!("could not send text to speech command: {e}"));
                return;
            }
            match child.wait().await {
                Ok(status) if status.success() => listener.on_done(),
                Ok(status) => listener.on_error(format!("speech command exited with {status}")),
                Err(e) => listener.on_error(e.to_string()),
            }
        });
        replace_session(&self.session, Some(handle));
        Ok(())
    }

    async fn stop(&self) {
        replace_session(&self.session, None);
    }

    async fn shutdown(&self) {
        if !self.shut_down.swap(true, Ordering::SeqCst) {
            info!("speech engine shut down");
        }
        replace_session(&self.session, None);
    }
}
