//! Line-oriented terminal front end.
//!
//! Each line typed on stdin is one trigger.  Known commands are dispatched to
//! the [`Orchestrator`]; any other non-empty line is spoken as typed text.
//!
//! | Input | Action |
//! |-------|--------|
//! | `listen` / `stop` / `toggle` | continuous listening |
//! | `upload <file>` | recognize a `.wav` / `.mp3` file |
//! | `say <text>` or plain text | speak typed text |
//! | `noise <dir>` / `noise off` | choose or clear the noise folder |
//! | `status`, `help`, `quit` | |

use std::path::PathBuf;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::pipeline::{Observer, Orchestrator, PipelineRunState};

pub const HELP: &str = "\
commands:
  listen | stop | toggle     continuous listening
  upload <file.wav|mp3>      speak the recognized contents of a file
  say <text>                 speak text (any other line works too)
  noise <dir> | noise off    background noise folder
  status                     show listening state and noise folder
  quit                       exit";

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Listen,
    Stop,
    Toggle,
    Upload(PathBuf),
    Say(String),
    Noise(Option<PathBuf>),
    Status,
    Help,
    Quit,
}

/// Parse one input line.  `None` for a blank line.
pub fn parse_command(line: &str) -> Option<ConsoleCommand> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };

    let cmd = match (head.to_ascii_lowercase().as_str(), rest) {
        ("listen" | "start", "") => ConsoleCommand::Listen,
        ("stop", "") => ConsoleCommand::Stop,
        ("toggle", "") => ConsoleCommand::Toggle,
        ("status", "") => ConsoleCommand::Status,
        ("help" | "?", "") => ConsoleCommand::Help,
        ("quit" | "exit", "") => ConsoleCommand::Quit,
        ("upload", path) if !path.is_empty() => ConsoleCommand::Upload(PathBuf::from(path)),
        ("say", text) => ConsoleCommand::Say(text.to_string()),
        ("noise", "off" | "none") => ConsoleCommand::Noise(None),
        ("noise", dir) if !dir.is_empty() => ConsoleCommand::Noise(Some(PathBuf::from(dir))),
        _ => ConsoleCommand::Say(line.to_string()),
    };
    Some(cmd)
}

// ---------------------------------------------------------------------------
// ConsoleObserver
// ---------------------------------------------------------------------------

/// Prints pipeline updates to the terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleObserver;

impl Observer for ConsoleObserver {
    fn on_text_update(&self, display: &str) {
        println!("\n{display}");
    }

    fn on_run_state_change(&self, state: PipelineRunState) {
        let note = match state {
            PipelineRunState::Idle => "idle",
            PipelineRunState::Listening => "listening…",
            PipelineRunState::Stopping => "stopping after the current utterance",
        };
        println!("[{note}]  (next: {})", state.label());
    }

    fn on_error(&self, message: &str) {
        eprintln!("! {message}");
    }
}

// ---------------------------------------------------------------------------
// Loop
// ---------------------------------------------------------------------------

/// Apply one command.  Returns `false` when the console should exit.
pub fn dispatch(orchestrator: &Orchestrator, cmd: ConsoleCommand) -> bool {
    match cmd {
        ConsoleCommand::Listen => {
            if orchestrator.start_listening().is_none() && orchestrator.is_running() {
                println!("already listening");
            }
        }
        ConsoleCommand::Stop => {
            orchestrator.stop();
        }
        ConsoleCommand::Toggle => {
            let _ = orchestrator.toggle_listening();
        }
        ConsoleCommand::Upload(path) => {
            let _ = orchestrator.upload_file(path);
        }
        ConsoleCommand::Say(text) => {
            let _ = orchestrator.submit_text(&text);
        }
        ConsoleCommand::Noise(dir) => orchestrator.select_noise_folder(dir),
        ConsoleCommand::Status => {
            let noise = orchestrator
                .noise_folder()
                .map(|d| d.display().to_string())
                .unwrap_or_else(|| "off".to_string());
            println!("state: {:?}, noise: {noise}", orchestrator.run_state());
        }
        ConsoleCommand::Help => println!("{HELP}"),
        ConsoleCommand::Quit => return false,
    }
    true
}

/// Read commands from stdin until `quit`, end of input or Ctrl-C, then shut
/// the orchestrator down.
pub async fn run_console(orchestrator: Orchestrator) -> anyhow::Result<()> {
    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };
        if let Some(cmd) = parse_command(&line) {
            if !dispatch(&orchestrator, cmd) {
                break;
            }
        }
    }

    println!("shutting down…");
    orchestrator.shutdown().await;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
