//! Advisory row progress.
//!
//! Workers push [`ProgressEvent`]s into an unbounded channel; sending never
//! blocks and a dropped receiver is ignored, so progress can never stall or
//! reorder the computation.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::info;

/// Percent step between two events.
pub const PROGRESS_STEP: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Which task reported, e.g. `"sequential"` or a kernel name.
    pub task: &'static str,
    pub percent: u8,
}

pub fn channel() -> (UnboundedSender<ProgressEvent>, UnboundedReceiver<ProgressEvent>) {
    mpsc::unbounded_channel()
}

/// Turns row counts into events at every [`PROGRESS_STEP`] percent.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    task: &'static str,
    total_rows: u32,
    next_percent: u8,
    sink: Option<UnboundedSender<ProgressEvent>>,
}

impl ProgressTracker {
    pub fn new(task: &'static str, total_rows: u32, sink: Option<UnboundedSender<ProgressEvent>>) -> Self {
        Self {
            task,
            total_rows,
            next_percent: PROGRESS_STEP,
            sink,
        }
    }

    pub fn disabled(task: &'static str) -> Self {
        Self::new(task, 0, None)
    }

    pub fn rows_done(&mut self, done: u32) {
        let Some(sink) = &self.sink else {
            return;
        };
        if self.total_rows == 0 {
            return;
        }
        let percent = (u64::from(done.min(self.total_rows)) * 100 / u64::from(self.total_rows)) as u8;
        while self.next_percent <= 100 && percent >= self.next_percent {
            let _ = sink.send(ProgressEvent {
                task: self.task,
                percent: self.next_percent,
            });
            self.next_percent += PROGRESS_STEP;
        }
    }
}

/// Log every event until all senders are dropped. Returns the event count.
pub async fn log_progress(mut events: UnboundedReceiver<ProgressEvent>) -> usize {
    let mut count = 0;
    while let Some(event) = events.recv().await {
        info!(task = event.task, percent = event.percent, "Progress");
        count += 1;
    }
    count
}
