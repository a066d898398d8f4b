//! # Quadrant Threads
//!
//! Splits the output at `(width / 2, height / 2)` into four fixed regions and
//! runs one scoped OS thread per region. Each thread writes only through its
//! own [`RegionMut`](conv_kernel::RegionMut), so the output needs no locking,
//! and the coordinator joins all four before the grid is handed back.
//!
//! ## Phases
//!
//! ```text
//! Idle → RegionsComputed → WorkersRunning → Joined → StatisticsReported
//! ```
//!
//! A spawn failure aborts the run with `ThreadCreation` after the workers that
//! did start have been joined; a panicking worker surfaces as `WorkerJoin`.
//! Either way no output grid is returned.

use std::any::Any;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use async_trait::async_trait;
use conv_kernel::{ConvolutionOp, KernelName, PixelGrid, Quadrant, quadrants};
use tracing::{debug, info};

use crate::core::performance_analysis::{QuadrantReport, RegionStats};
use crate::error::{FilterError, FilterResult};
use crate::io::clone_grid;

use super::FilterStrategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuadrantPhase {
    Idle,
    RegionsComputed,
    WorkersRunning,
    Joined,
    StatisticsReported,
}

impl QuadrantPhase {
    pub fn next(self) -> Option<Self> {
        match self {
            QuadrantPhase::Idle => Some(QuadrantPhase::RegionsComputed),
            QuadrantPhase::RegionsComputed => Some(QuadrantPhase::WorkersRunning),
            QuadrantPhase::WorkersRunning => Some(QuadrantPhase::Joined),
            QuadrantPhase::Joined => Some(QuadrantPhase::StatisticsReported),
            QuadrantPhase::StatisticsReported => None,
        }
    }
}

fn advance(phase: &mut QuadrantPhase) {
    if let Some(next) = phase.next() {
        debug!(from = ?phase, to = ?next, "Quadrant phase");
        *phase = next;
    }
}

/// Filter `input` with four quadrant threads into a fresh output grid.
pub fn apply_quadrant_threaded(
    input: &PixelGrid,
    kernel: KernelName,
) -> FilterResult<(PixelGrid, QuadrantReport)> {
    let mut output = clone_grid(input);
    let report = apply_into(input, kernel, &mut output)?;
    Ok((output, report))
}

/// Filter into an existing buffer. On error the buffer contents are unspecified.
pub fn apply_into(
    input: &PixelGrid,
    kernel: KernelName,
    output: &mut PixelGrid,
) -> FilterResult<QuadrantReport> {
    input
        .ensure_same_shape(output)
        .map_err(|e| FilterError::from(e).with_operation("quadrant apply_into"))?;

    let mut phase = QuadrantPhase::Idle;
    let regions = quadrants(input.width(), input.height());
    advance(&mut phase);

    let views = output.split_regions_mut(&regions)?;
    let op = ConvolutionOp::new(input, kernel.kernel());
    let started = Instant::now();
    advance(&mut phase);

    let (spawn_error, joined) = thread::scope(|scope| {
        let mut handles = Vec::with_capacity(regions.len());
        let mut spawn_error = None;

        for (worker_id, mut view) in views.into_iter().enumerate() {
            let quadrant = Quadrant::ALL[worker_id];
            let spawned = thread::Builder::new()
                .name(format!("quadrant-{}", worker_id))
                .spawn_scoped(scope, move || {
                    let region = view.region();
                    debug!(worker_id, quadrant = quadrant.label(), %region, "Worker started");
                    let t = Instant::now();
                    op.fill_region(&mut view, |_| {});
                    let elapsed = t.elapsed();
                    debug!(worker_id, elapsed_ms = elapsed.as_secs_f64() * 1000.0, "Worker finished");
                    RegionStats {
                        worker_id,
                        quadrant,
                        region,
                        elapsed,
                    }
                });
            match spawned {
                Ok(handle) => handles.push((worker_id, handle)),
                Err(source) => {
                    spawn_error = Some(FilterError::thread_creation(
                        format!("quadrant-{}", worker_id),
                        source,
                    ));
                    break;
                }
            }
        }

        let joined: Vec<FilterResult<RegionStats>> = handles
            .into_iter()
            .map(|(worker_id, handle)| {
                handle.join().map_err(|payload| {
                    FilterError::worker_join(format!("quadrant-{}", worker_id), panic_message(&*payload))
                })
            })
            .collect();
        (spawn_error, joined)
    });

    if let Some(error) = spawn_error {
        return Err(error);
    }
    advance(&mut phase);
    let total = started.elapsed();

    let mut stats = Vec::with_capacity(joined.len());
    for result in joined {
        stats.push(result?);
    }
    let stats: [RegionStats; 4] = stats.try_into().map_err(|stats: Vec<RegionStats>| {
        FilterError::worker_join("quadrant", format!("expected 4 workers, joined {}", stats.len()))
    })?;

    let report = QuadrantReport::new(stats, total);
    advance(&mut phase);
    info!(
        kernel = %kernel,
        bottleneck_ms = report.bottleneck().as_secs_f64() * 1000.0,
        balance_efficiency = report.balance_efficiency(),
        "Quadrant threads joined"
    );
    debug_assert_eq!(phase, QuadrantPhase::StatisticsReported);
    Ok(report)
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}

/// Four-quadrant strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuadrantThreadStrategy;

#[async_trait]
impl FilterStrategy for QuadrantThreadStrategy {
    fn name(&self) -> &'static str {
        "quadrant"
    }

    async fn apply(&self, input: Arc<PixelGrid>, kernel: KernelName) -> FilterResult<PixelGrid> {
        let (output, _) = apply_quadrant_threaded(&input, kernel)?;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::sequential::apply_sequential;
    use conv_kernel::GridKind;

    fn gradient(kind: GridKind, width: u32, height: u32) -> PixelGrid {
        let len = (width * height) as usize * kind.channels();
        let samples = (0..len).map(|i| ((i * 37) % 256) as u16).collect();
        PixelGrid::from_samples(kind, width, height, 255, samples).unwrap()
    }

    #[test]
    fn test_phases_advance_in_order() {
        let mut phase = QuadrantPhase::Idle;
        let mut seen = vec![phase];
        while phase.next().is_some() {
            advance(&mut phase);
            seen.push(phase);
        }
        assert_eq!(seen.len(), 5);
        assert_eq!(seen.last(), Some(&QuadrantPhase::StatisticsReported));
    }

    #[test]
    fn test_matches_sequential() {
        for kernel in KernelName::ALL {
            let grid = gradient(GridKind::Triple, 9, 7);
            let (out, report) = apply_quadrant_threaded(&grid, kernel).unwrap();
            assert_eq!(out, apply_sequential(&grid, kernel).unwrap(), "{kernel}");
            assert_eq!(report.total_pixels(), 63);
        }
    }

    #[test]
    fn test_single_pixel_grid() {
        let grid = gradient(GridKind::Scalar, 1, 1);
        let (out, report) = apply_quadrant_threaded(&grid, KernelName::Sharpen).unwrap();
        assert_eq!(out, apply_sequential(&grid, KernelName::Sharpen).unwrap());
        assert_eq!(report.regions[3].pixel_count(), 1);
        assert_eq!(report.regions[0].pixel_count(), 0);
    }

    #[test]
    fn test_report_lists_workers_in_quadrant_order() {
        let grid = gradient(GridKind::Scalar, 8, 8);
        let (_, report) = apply_quadrant_threaded(&grid, KernelName::Blur).unwrap();
        let ids: Vec<usize> = report.regions.iter().map(|r| r.worker_id).collect();
        assert_eq!(ids, [0, 1, 2, 3]);
        assert_eq!(report.regions[1].quadrant, Quadrant::TopRight);
        assert!(report.balance_efficiency() > 0.0);
    }

    #[test]
    fn test_rejects_mismatched_output() {
        let grid = gradient(GridKind::Scalar, 4, 4);
        let mut output = gradient(GridKind::Scalar, 5, 4);
        let err = apply_into(&grid, KernelName::Blur, &mut output).unwrap_err();
        assert_eq!(err.category(), "type_mismatch");
    }

    #[test]
    fn test_panic_message_extracts_text() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*payload), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(&*payload), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(&*payload), "worker panicked");
    }
}
