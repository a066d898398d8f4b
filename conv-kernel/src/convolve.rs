// SPDX-License-Identifier: MIT
//! # Convolution
//!
//! Point evaluation of a 3x3 kernel with clamp-to-edge borders, and the region
//! loop shared by every execution strategy.
//!
//! For each channel the weighted sum is accumulated in `i64`, divided by the
//! kernel divisor when it is non-zero (truncating toward zero), passed through
//! the kernel's result transform and finally clamped to `[0, max_value]`.

use crate::grid::{GridKind, PixelGrid, PixelValue, Sample};
use crate::kernel::{Kernel, ResultTransform};
use crate::partition::RegionMut;

/// Convolved value of `grid` at `(x, y)`.
#[inline]
pub fn convolve(grid: &PixelGrid, x: u32, y: u32, kernel: &Kernel) -> PixelValue {
    match grid.kind() {
        GridKind::Scalar => PixelValue::Scalar(convolve_channel(grid, x, y, 0, kernel)),
        GridKind::Triple => PixelValue::Triple([
            convolve_channel(grid, x, y, 0, kernel),
            convolve_channel(grid, x, y, 1, kernel),
            convolve_channel(grid, x, y, 2, kernel),
        ]),
    }
}

/// Convolved value of one channel at `(x, y)`.
#[inline]
pub fn convolve_channel(grid: &PixelGrid, x: u32, y: u32, channel: usize, kernel: &Kernel) -> Sample {
    let (x, y) = (i64::from(x), i64::from(y));
    let mut sum: i64 = 0;
    for dy in -1..=1 {
        for dx in -1..=1 {
            let sample = grid.get_clamped(x + dx, y + dy)[channel];
            sum += i64::from(sample) * i64::from(kernel.weight(dx as i32, dy as i32));
        }
    }
    finish(sum, kernel, grid.max_value())
}

/// Normalize, transform and clamp a raw weighted sum.
#[inline]
pub fn finish(sum: i64, kernel: &Kernel, max_value: Sample) -> Sample {
    let mut value = sum;
    if kernel.divisor() != 0 {
        value /= i64::from(kernel.divisor());
    }
    if kernel.transform() == ResultTransform::Absolute {
        value = value.abs();
    }
    value.clamp(0, i64::from(max_value)) as Sample
}

/// A kernel bound to a read-only input grid.
///
/// Cheap to copy; every worker holds its own and they all share the input.
#[derive(Clone, Copy, Debug)]
pub struct ConvolutionOp<'a> {
    input: &'a PixelGrid,
    kernel: &'a Kernel,
}

impl<'a> ConvolutionOp<'a> {
    pub fn new(input: &'a PixelGrid, kernel: &'a Kernel) -> Self {
        Self { input, kernel }
    }

    pub fn input(&self) -> &'a PixelGrid {
        self.input
    }

    pub fn kernel(&self) -> &'a Kernel {
        self.kernel
    }

    #[inline]
    pub fn at(&self, x: u32, y: u32) -> PixelValue {
        convolve(self.input, x, y, self.kernel)
    }

    /// Fill `view` in raster order. `on_row` is called after each row with the
    /// number of rows completed so far.
    ///
    /// The view must come from a grid with the input's dimensions.
    pub fn fill_region(&self, view: &mut RegionMut<'_>, mut on_row: impl FnMut(u32)) {
        let region = view.region();
        if region.is_empty() {
            return;
        }
        for (done, y) in (region.start_y..region.end_y).enumerate() {
            for x in region.start_x..region.end_x {
                view.write(x, y, self.at(x, y).as_slice());
            }
            on_row(done as u32 + 1);
        }
    }

    /// Convolve one full-width row, replacing the contents of `out`.
    pub fn fill_row(&self, y: u32, out: &mut Vec<Sample>) {
        out.clear();
        for x in 0..self.input.width() {
            out.extend_from_slice(self.at(x, y).as_slice());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{EDGE_DETECTION, SHARPENING, SMOOTHING};

    fn scalar(width: u32, height: u32, samples: Vec<Sample>) -> PixelGrid {
        PixelGrid::from_samples(GridKind::Scalar, width, height, 255, samples).unwrap()
    }

    fn apply_all(grid: &PixelGrid, kernel: &Kernel) -> PixelGrid {
        let mut out = grid.clone();
        let op = ConvolutionOp::new(grid, kernel);
        let bounds = [grid.bounds()];
        let mut views = out.split_regions_mut(&bounds).unwrap();
        op.fill_region(&mut views[0], |_| {});
        drop(views);
        out
    }

    #[test]
    fn test_smoothing_constant_grid_is_unchanged() {
        let grid = PixelGrid::filled(GridKind::Scalar, 4, 4, 255, 100).unwrap();
        let out = apply_all(&grid, &SMOOTHING);
        assert!(out.samples().iter().all(|&v| v == 100));
    }

    #[test]
    fn test_smoothing_constant_color_grid_is_unchanged() {
        let grid = PixelGrid::filled(GridKind::Triple, 5, 3, 1000, 777).unwrap();
        let out = apply_all(&grid, &SMOOTHING);
        assert_eq!(out, grid);
    }

    #[test]
    fn test_edge_detection_single_bright_pixel() {
        let mut samples = vec![0; 16];
        samples[5] = 255; // (1, 1)
        let grid = scalar(4, 4, samples);
        let out = apply_all(&grid, &EDGE_DETECTION);

        let expected: [Sample; 16] = [
            0, 255, 0, 0, //
            255, 255, 255, 0, //
            0, 255, 0, 0, //
            0, 0, 0, 0,
        ];
        assert_eq!(out.samples(), &expected);
    }

    #[test]
    fn test_border_reads_clamp_to_edge() {
        // Rows above and below clamp to row 0, the left column clamps to column 0.
        let grid = scalar(3, 1, vec![0, 160, 0]);
        let value = convolve(&grid, 0, 0, &SMOOTHING);
        // (0*4 + 0*8 + 160*4) / 16
        assert_eq!(value, PixelValue::Scalar(40));
    }

    #[test]
    fn test_sharpen_clamps_to_range() {
        let grid = scalar(3, 3, vec![0, 0, 0, 0, 200, 0, 0, 0, 0]);
        assert_eq!(convolve(&grid, 1, 1, &SHARPENING), PixelValue::Scalar(255));
        assert_eq!(convolve(&grid, 1, 0, &SHARPENING), PixelValue::Scalar(0));
    }

    #[test]
    fn test_finish_truncates_toward_zero() {
        let negative_smoothing = Kernel::new("t", [0; 9], 16, ResultTransform::Absolute);
        // -17 / 16 = -1 (toward zero), abs = 1
        assert_eq!(finish(-17, &negative_smoothing, 255), 1);
        assert_eq!(finish(31, &SMOOTHING, 255), 1);
    }

    #[test]
    fn test_zero_divisor_skips_normalization() {
        let raw = Kernel::new("raw", [0, 0, 0, 0, 2, 0, 0, 0, 0], 0, ResultTransform::Identity);
        let grid = scalar(1, 1, vec![50]);
        assert_eq!(convolve(&grid, 0, 0, &raw), PixelValue::Scalar(100));
    }

    #[test]
    fn test_fill_row_matches_point_evaluation() {
        let grid = scalar(4, 2, vec![10, 20, 30, 40, 50, 60, 70, 80]);
        let op = ConvolutionOp::new(&grid, &SHARPENING);
        let mut row = Vec::new();
        op.fill_row(1, &mut row);
        let expected: Vec<Sample> = (0..4)
            .map(|x| match op.at(x, 1) {
                PixelValue::Scalar(v) => v,
                PixelValue::Triple(_) => unreachable!(),
            })
            .collect();
        assert_eq!(row, expected);
    }

    #[test]
    fn test_fill_region_reports_rows() {
        let grid = scalar(2, 3, vec![1; 6]);
        let mut out = grid.clone();
        let bounds = [grid.bounds()];
        let mut views = out.split_regions_mut(&bounds).unwrap();
        let mut seen = Vec::new();
        ConvolutionOp::new(&grid, &SMOOTHING).fill_region(&mut views[0], |done| seen.push(done));
        assert_eq!(seen, vec![1, 2, 3]);
    }
}
