//! Progress and result reporting.

use tracing::trace;

use crate::outcome::OperationResult;
use crate::plan::OperationKind;

/// Snapshot of how far an operation has got.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub kind: OperationKind,
    /// 1-based index of the step being applied.
    pub position: usize,
    pub total: usize,
    /// Summary of the commit at `position`, when known.
    pub summary: Option<String>,
    /// Fraction complete, in `0.0..=1.0`.
    pub value: f64,
}

/// Receiver of progress updates and final results.
pub trait ProgressSink {
    fn on_progress(&mut self, progress: &Progress);

    fn on_result(&mut self, _result: &OperationResult) {}
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&mut self, _progress: &Progress) {}
}

/// Wraps a sink so that, within one operation, the reported fraction never
/// goes backwards and exactly one terminal result is emitted.
pub struct ProgressReporter {
    sink: Box<dyn ProgressSink>,
    kind: Option<OperationKind>,
    last_value: Option<f64>,
    finished: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(Box::new(NoProgress))
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("kind", &self.kind)
            .field("last_value", &self.last_value)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl ProgressReporter {
    #[must_use]
    pub fn new(sink: Box<dyn ProgressSink>) -> Self {
        Self {
            sink,
            kind: None,
            last_value: None,
            finished: false,
        }
    }

    /// Start reporting a new operation.
    pub fn reset(&mut self, kind: OperationKind) {
        self.kind = Some(kind);
        self.last_value = None;
        self.finished = false;
    }

    /// Resume reporting an operation already underway, without emitting.
    pub fn resume(&mut self, kind: OperationKind) {
        if self.kind != Some(kind) {
            self.reset(kind);
        }
        self.finished = false;
    }

    /// Report reaching `position` of `total`. Updates that would move the
    /// fraction backwards, or repeat it, are dropped.
    pub fn report(&mut self, position: usize, total: usize, summary: Option<&str>) {
        let Some(kind) = self.kind else {
            return;
        };
        if self.finished {
            return;
        }

        let position = position.min(total);
        #[allow(clippy::cast_precision_loss)]
        let value = if total == 0 {
            1.0
        } else {
            position as f64 / total as f64
        };

        if self.last_value.is_some_and(|last| value <= last) {
            trace!(position, total, "dropping non-increasing progress");
            return;
        }
        self.last_value = Some(value);

        self.sink.on_progress(&Progress {
            kind,
            position,
            total,
            summary: summary.map(String::from),
            value,
        });
    }

    /// Emit the terminal result. Later calls for the same operation are ignored.
    pub fn finish(&mut self, result: &OperationResult) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.sink.on_result(result);
    }
}
