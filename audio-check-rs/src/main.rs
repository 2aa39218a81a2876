use anyhow::{Context, Result};
use audio_check_rs::audio::{self, AudioError};
use audio_check_rs::config::{self, Cli};
use audio_check_rs::{app, logging, service, title, ui};
use audio_check_rs::{DeviceService, Dispatcher, ViewState};
use clap::Parser;
use tracing::{error, info};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = logging::init(logging::DEFAULT_LEVEL);
    let settings = config::load_settings().context("Failed to load settings")?;
    if let Some(level) = &level {
        level.set_level(&settings.log_level);
    }
    info!(backend = ?settings.backend, "Settings loaded");

    let filter = title::detect_filter(cli.filter.as_deref());
    let window_title = title::derive_title(Some(&filter));

    let collaborator = match audio::open_collaborator(&settings) {
        Ok(collaborator) => collaborator,
        Err(e @ AudioError::CollaboratorUnavailable(_)) => {
            error!("Audio collaborator unavailable: {e}");
            return Err(e).context("Cannot show audio devices without a collaborator");
        }
        Err(e) => return Err(e).context("Failed to open audio collaborator"),
    };

    let dispatcher = Dispatcher::new();
    let service = DeviceService::initialize(
        collaborator,
        &filter,
        app::event_sink(dispatcher.handle()),
        service::log_sink(),
    )
    .context("Failed to open audio collaborator session")?;

    let mut view = ViewState::new(service, window_title);
    ui::attach(&mut view);
    // Not joined: the reader stays blocked on stdin until the process exits
    ui::spawn_input_reader(dispatcher.handle()).context("Failed to start console input")?;

    dispatcher.run(&mut view);
    Ok(())
}
