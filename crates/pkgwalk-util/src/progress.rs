use std::io::Write;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

/// Colour of the label in a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    /// An action was performed (bold green).
    Action,
    /// Informational, nothing changed (bold cyan).
    Info,
}

impl StatusKind {
    fn style(self) -> Style {
        match self {
            StatusKind::Action => Style::new().green().bold(),
            StatusKind::Info => Style::new().cyan().bold(),
        }
    }
}

/// Format a Cargo-style status line without colours: `   Installed CoreLib V1.0.0`.
pub fn format_status(label: &str, message: &str) -> String {
    format!("{label:>12} {message}")
}

/// Print a Cargo-style status line to stderr with the label right-aligned
/// to 12 columns and coloured according to `kind`.
pub fn status_line(kind: StatusKind, label: &str, message: &str) {
    let styled = kind.style().apply_to(label);
    let _ = writeln!(std::io::stderr(), "{styled:>12} {message}");
}

/// Shorthand for [`status_line`] with [`StatusKind::Action`].
pub fn status(label: &str, message: &str) {
    status_line(StatusKind::Action, label, message);
}

/// Create an animated spinner for indeterminate progress (resolution, downloads).
///
/// Finish it with [`ProgressBar::finish_and_clear`].
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_label_is_right_aligned() {
        assert_eq!(
            format_status("Installed", "CoreLib V1.0.0"),
            "   Installed CoreLib V1.0.0"
        );
    }

    #[test]
    fn long_labels_are_not_truncated() {
        assert_eq!(format_status("Downloading-all", "x"), "Downloading-all x");
    }
}
