//! Terminal output formatting utilities.

use std::sync::atomic::{AtomicBool, Ordering};

use colored::Colorize;

static QUIET_MODE: AtomicBool = AtomicBool::new(false);

/// Set quiet mode globally. Call once at startup.
pub fn set_quiet(quiet: bool) {
    QUIET_MODE.store(quiet, Ordering::Relaxed);
}

pub fn is_quiet() -> bool {
    QUIET_MODE.load(Ordering::Relaxed)
}

/// Print a success message (suppressed in quiet mode).
pub fn success(msg: &str) {
    if !is_quiet() {
        println!("{} {}", "✓".green(), msg);
    }
}

/// Print an error message (always prints to stderr).
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a warning message (always prints to stderr).
pub fn warn(msg: &str) {
    eprintln!("{} {}", "!".yellow(), msg);
}

/// Print an info message (suppressed in quiet mode).
pub fn info(msg: &str) {
    if !is_quiet() {
        println!("{} {}", "→".blue(), msg);
    }
}

/// Print a detail line without prefix (suppressed in quiet mode).
///
/// Use for indented detail lines that accompany info or warn messages.
pub fn detail(msg: &str) {
    if !is_quiet() {
        println!("{msg}");
    }
}

/// Print essential machine-readable output (always prints).
pub fn essential(msg: &str) {
    println!("{msg}");
}

/// Format a conflicted file for display.
#[must_use]
pub fn conflict_line(path: &str, kind: &str, markers: Option<usize>) -> String {
    let markers = match markers {
        Some(0) => "no markers left".green().to_string(),
        Some(1) => "1 conflict".red().to_string(),
        Some(n) => format!("{n} conflicts").red().to_string(),
        None => "missing".dimmed().to_string(),
    };
    format!("  {} {} ({}, {})", "●".red(), path, kind, markers)
}

/// Print a horizontal line (suppressed in quiet mode).
pub fn hr() {
    if !is_quiet() {
        println!("{}", "─".repeat(50).dimmed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_line_marker_counts() {
        colored::control::set_override(false);

        assert_eq!(
            conflict_line("src/lib.rs", "both modified", Some(2)),
            "  ● src/lib.rs (both modified, 2 conflicts)"
        );
        assert_eq!(
            conflict_line("a.txt", "both added", Some(1)),
            "  ● a.txt (both added, 1 conflict)"
        );
        assert!(conflict_line("a.txt", "both added", Some(0)).contains("no markers left"));
        assert!(conflict_line("gone.txt", "deleted by us", None).contains("missing"));

        colored::control::unset_override();
    }

    #[test]
    fn test_quiet_mode_enabled() {
        set_quiet(true);
        assert!(is_quiet());
        // Reset
        set_quiet(false);
    }
}
