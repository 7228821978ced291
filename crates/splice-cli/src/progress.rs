//! Progress bar for rewrites.

use indicatif::{ProgressBar, ProgressStyle};
use splice_core::{OperationResult, Progress, ProgressSink};

use crate::output;

/// Draws step progress on stderr. Hidden in quiet mode or when stderr isn't
/// a terminal.
pub struct BarSink {
    bar: ProgressBar,
}

impl BarSink {
    pub fn new() -> Self {
        let bar = if output::is_quiet() {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(0)
        };
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{prefix:.cyan} [{bar:30.green}] {pos}/{len} {wide_msg}")
        {
            bar.set_style(style.progress_chars("=> "));
        }
        Self { bar }
    }
}

impl ProgressSink for BarSink {
    fn on_progress(&mut self, progress: &Progress) {
        self.bar.set_prefix(progress.kind.to_string());
        self.bar.set_length(progress.total as u64);
        self.bar.set_position(progress.position as u64);
        if let Some(summary) = &progress.summary {
            self.bar.set_message(summary.clone());
        }
    }

    fn on_result(&mut self, _result: &OperationResult) {
        self.bar.finish_and_clear();
    }
}

impl Drop for BarSink {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}
