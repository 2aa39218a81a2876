//! Tracing subscriber setup.

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

/// Level to use before the settings are read.
pub const DEFAULT_LEVEL: &str = "info";

/// Adjusts the level of the installed subscriber.
pub struct LevelHandle {
    handle: reload::Handle<EnvFilter, Registry>,
    from_env: bool,
}

impl LevelHandle {
    /// Switch to `level`. Ignored when `RUST_LOG` chose the filter.
    pub fn set_level(&self, level: &str) -> bool {
        if self.from_env {
            return false;
        }
        self.handle.reload(EnvFilter::new(level)).is_ok()
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `default_level`. Returns `None` when a subscriber
/// was already installed, which leaves the existing one in place.
pub fn init(default_level: &str) -> Option<LevelHandle> {
    let (filter, from_env) = match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, true),
        Err(_) => (EnvFilter::new(default_level), false),
    };
    let (filter, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .ok()?;
    Some(LevelHandle { handle, from_env })
}
