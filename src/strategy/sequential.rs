//! Single-threaded raster-order application, the reference every other
//! strategy is checked against.

use std::sync::Arc;

use async_trait::async_trait;
use conv_kernel::{ConvolutionOp, KernelName, PixelGrid};
use tracing::debug;

use crate::core::progress::ProgressTracker;
use crate::error::FilterResult;
use crate::io::clone_grid;

use super::FilterStrategy;

/// Apply `kernel` to every pixel of `input`, row by row.
pub fn apply_sequential(input: &PixelGrid, kernel: KernelName) -> FilterResult<PixelGrid> {
    apply_with_progress(input, kernel, &mut ProgressTracker::disabled("sequential"))
}

/// Same as [`apply_sequential`], reporting each completed row to `tracker`.
pub fn apply_with_progress(
    input: &PixelGrid,
    kernel: KernelName,
    tracker: &mut ProgressTracker,
) -> FilterResult<PixelGrid> {
    let mut output = clone_grid(input);
    apply_into(input, kernel, &mut output, tracker)?;
    Ok(output)
}

/// Write the filtered image into an existing buffer of the same kind and size.
pub fn apply_into(
    input: &PixelGrid,
    kernel: KernelName,
    output: &mut PixelGrid,
    tracker: &mut ProgressTracker,
) -> FilterResult<()> {
    input.ensure_same_shape(output)?;
    debug!(kernel = %kernel, width = input.width(), height = input.height(), "Sequential pass");

    let op = ConvolutionOp::new(input, kernel.kernel());
    for y in 0..input.height() {
        for x in 0..input.width() {
            output.set(x, y, op.at(x, y))?;
        }
        tracker.rows_done(y + 1);
    }
    Ok(())
}

/// Baseline strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialStrategy;

#[async_trait]
impl FilterStrategy for SequentialStrategy {
    fn name(&self) -> &'static str {
        "sequential"
    }

    async fn apply(&self, input: Arc<PixelGrid>, kernel: KernelName) -> FilterResult<PixelGrid> {
        apply_sequential(&input, kernel)
    }
}
