//! Console front end.
//!
//! Prints the title and every device change, and turns stdin lines into
//! dispatcher messages.

use crate::app::{AppMessage, DispatcherHandle};
use crate::audio::DeviceInfo;
use crate::view::{ViewChange, ViewState};
use std::io::{self, BufRead};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

pub const REFRESH_PROMPT: &str = "Press Enter to refresh; to stop, type S or Q and press Enter";
pub const STOP_PROMPT: &str = "To stop, type S or Q and press Enter";

/// Actions the user can request from the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputCommand {
    Refresh,
    Quit,
}

impl From<InputCommand> for AppMessage {
    fn from(command: InputCommand) -> Self {
        match command {
            InputCommand::Refresh => AppMessage::Refresh,
            InputCommand::Quit => AppMessage::Quit,
        }
    }
}

/// Interpret one input line. `None` for anything unrecognized.
pub fn parse_command(line: &str) -> Option<InputCommand> {
    match line.trim() {
        "" => Some(InputCommand::Refresh),
        s if s.eq_ignore_ascii_case("q") || s.eq_ignore_ascii_case("s") => {
            Some(InputCommand::Quit)
        }
        _ => None,
    }
}

pub fn render_device(device: Option<&DeviceInfo>) -> String {
    match device {
        Some(device) => format!("Device: {device}"),
        None => "No device attached".to_string(),
    }
}

pub fn prompt(refresh_enabled: bool) -> &'static str {
    if refresh_enabled {
        REFRESH_PROMPT
    } else {
        STOP_PROMPT
    }
}

fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S%.3f").to_string()
}

/// Print the title and the current device, then follow the view's changes.
pub fn attach(view: &mut ViewState) {
    println!("{}", view.title());
    println!("[{}] {}", timestamp(), render_device(view.device()));

    let mut shown_enabled = view.can_refresh();
    println!("{}", prompt(shown_enabled));

    view.subscribe(move |change| match change {
        ViewChange::Device(device) => {
            println!("[{}] {}", timestamp(), render_device(device.as_ref()));
        }
        ViewChange::RefreshEnabled(enabled) => {
            if *enabled != shown_enabled {
                shown_enabled = *enabled;
                println!("{}", prompt(shown_enabled));
            }
        }
    });
}

/// Post the command for each line of `input`, and `Quit` at end of input.
pub fn forward_commands(input: impl BufRead, handle: &DispatcherHandle) {
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Console input failed: {e}");
                break;
            }
        };

        let Some(command) = parse_command(&line) else {
            println!("Unrecognized input {:?}. {}", line.trim(), REFRESH_PROMPT);
            continue;
        };
        debug!(?command, "Console command");
        if !handle.post(command.into()) || command == InputCommand::Quit {
            return;
        }
    }
    handle.post(AppMessage::Quit);
}

/// Read stdin on a background thread.
pub fn spawn_input_reader(handle: DispatcherHandle) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("console-input".to_string())
        .spawn(move || forward_commands(io::stdin().lock(), &handle))
}
