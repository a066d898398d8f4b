//! # Fan-Out
//!
//! Applies all three built-in kernels to one shared, read-only input at the
//! same time. Each task owns its output grid outright, so the only
//! synchronization is the final join; nothing is returned unless all three
//! tasks succeed.
//!
//! Tasks run on tokio's blocking pool. Progress events are optional and go
//! through an unbounded channel, so a slow or missing listener cannot hold a
//! task back.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use conv_kernel::{KernelName, PixelGrid};
use futures_util::future::join_all;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinError;
use tracing::{debug, info};

use crate::core::performance_analysis::{FanOutReport, TaskStats};
use crate::core::progress::{ProgressEvent, ProgressTracker};
use crate::error::{FilterError, FilterResult};

use super::FilterStrategy;
use super::sequential;

/// The three filtered grids plus task timings.
#[derive(Debug, Clone)]
pub struct FanOutOutput {
    pub blur: PixelGrid,
    pub edge: PixelGrid,
    pub sharpen: PixelGrid,
    pub report: FanOutReport,
}

impl FanOutOutput {
    pub fn get(&self, kernel: KernelName) -> &PixelGrid {
        match kernel {
            KernelName::Blur => &self.blur,
            KernelName::Laplace => &self.edge,
            KernelName::Sharpen => &self.sharpen,
        }
    }

    /// Outputs in registry order.
    pub fn outputs(&self) -> [(KernelName, &PixelGrid); 3] {
        [
            (KernelName::Blur, &self.blur),
            (KernelName::Laplace, &self.edge),
            (KernelName::Sharpen, &self.sharpen),
        ]
    }

    pub fn into_grid(self, kernel: KernelName) -> PixelGrid {
        match kernel {
            KernelName::Blur => self.blur,
            KernelName::Laplace => self.edge,
            KernelName::Sharpen => self.sharpen,
        }
    }
}

/// Run blur, laplace and sharpen concurrently over `input`.
pub async fn apply_fan_out(
    input: Arc<PixelGrid>,
    progress: Option<UnboundedSender<ProgressEvent>>,
) -> FilterResult<FanOutOutput> {
    let started = Instant::now();

    let tasks = KernelName::ALL.map(|kernel| {
        let input = Arc::clone(&input);
        let sink = progress.clone();
        tokio::task::spawn_blocking(move || {
            debug!(kernel = %kernel, "Fan-out task started");
            let t = Instant::now();
            let mut tracker = ProgressTracker::new(kernel.suffix(), input.height(), sink);
            let grid = sequential::apply_with_progress(&input, kernel, &mut tracker)?;
            let stats = TaskStats {
                kernel,
                elapsed: t.elapsed(),
                pixels: input.pixel_count(),
            };
            debug!(kernel = %kernel, elapsed_ms = stats.elapsed.as_secs_f64() * 1000.0, "Fan-out task finished");
            Ok::<_, FilterError>((grid, stats))
        })
    });
    drop(progress);

    let joined = join_all(tasks).await;
    let total = started.elapsed();

    let mut results = Vec::with_capacity(joined.len());
    for (kernel, outcome) in KernelName::ALL.into_iter().zip(joined) {
        let (grid, stats) = outcome.map_err(|e| join_error(kernel, e))??;
        results.push((grid, stats));
    }

    let mut results = results.into_iter();
    let (Some((blur, blur_stats)), Some((edge, edge_stats)), Some((sharpen, sharpen_stats))) =
        (results.next(), results.next(), results.next())
    else {
        return Err(FilterError::worker_join("fan-out", "fewer than three tasks completed"));
    };

    let report = FanOutReport {
        tasks: [blur_stats, edge_stats, sharpen_stats],
        total,
    };
    info!(
        wall_ms = total.as_secs_f64() * 1000.0,
        concurrency = report.concurrency(),
        "Fan-out tasks joined"
    );
    Ok(FanOutOutput {
        blur,
        edge,
        sharpen,
        report,
    })
}

fn join_error(kernel: KernelName, error: JoinError) -> FilterError {
    let reason = if error.is_panic() {
        super::quadrant::panic_message(&*error.into_panic())
    } else {
        "task cancelled".to_string()
    };
    FilterError::worker_join(format!("fan-out {}", kernel), reason)
}

/// Fan-out through the single-kernel seam: runs all three kernels and keeps
/// the requested one.
#[derive(Debug, Clone, Copy, Default)]
pub struct FanOutStrategy;

#[async_trait]
impl FilterStrategy for FanOutStrategy {
    fn name(&self) -> &'static str {
        "fan-out"
    }

    async fn apply(&self, input: Arc<PixelGrid>, kernel: KernelName) -> FilterResult<PixelGrid> {
        Ok(apply_fan_out(input, None).await?.into_grid(kernel))
    }
}
