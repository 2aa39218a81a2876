//! Audio Check - Library
//!
//! Shows the audio device currently attached to the system, optionally
//! restricted by a substring filter, and follows attach, detach and volume
//! changes reported by an audio collaborator.
//!
//! ## Features
//!
//! - Collaborator boundary matching the `Ac*` C contract
//! - Built-in Core Audio collaborator on Windows
//! - Binding to native collaborator libraries
//! - Owner-thread dispatcher for collaborator notifications
//! - Console front end with manual refresh

pub mod app;
pub mod audio;
pub mod config;
pub mod logging;
pub mod service;
pub mod title;
pub mod ui;
pub mod view;

pub use app::{AppMessage, Dispatcher, DispatcherHandle};
pub use audio::{AudioError, Collaborator, DeviceHint, DeviceInfo};
pub use config::{Cli, Settings, SettingsStore};
pub use service::DeviceService;
pub use view::{DeviceState, ViewChange, ViewState};
