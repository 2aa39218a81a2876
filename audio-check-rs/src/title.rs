//! Window title and startup filter.

use tracing::info;

pub const TITLE_PREFIX: &str = "Audio Control";

/// Title shown for a session started with `filter`.
pub fn derive_title(filter: Option<&str>) -> String {
    match filter {
        Some(f) if !f.is_empty() => format!("{TITLE_PREFIX}, filter substring: \"{f}\""),
        _ => format!("{TITLE_PREFIX}, no filter. You can set filter via command line"),
    }
}

/// Resolve the session filter from the first command-line argument.
///
/// Absent means no filtering and yields the empty string.
pub fn detect_filter(arg: Option<&str>) -> String {
    match arg {
        None => {
            info!("No command line parameters detected");
            String::new()
        }
        Some("") => {
            info!("Filter detected: empty string");
            String::new()
        }
        Some(f) => {
            info!("Filter detected: {f}");
            f.to_string()
        }
    }
}
