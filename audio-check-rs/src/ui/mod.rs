//! User interface.
//!
//! The console front end renders view changes and feeds user input to the
//! dispatcher.

pub mod console;

pub use console::{attach, parse_command, spawn_input_reader, InputCommand};
