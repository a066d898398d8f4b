//! Every strategy must produce the sequential result, sample for sample.

mod common;

use std::sync::Arc;

use common::{SHAPES, pattern_grid, spot_grid};
use parallel_convolve::strategy::all_strategies;
use parallel_convolve::{
    FilterStrategy, GridKind, KernelName, PixelValue, apply_distributed, apply_fan_out,
    apply_quadrant_threaded, apply_sequential,
};

#[tokio::test]
async fn test_all_strategies_match_sequential() {
    for kind in [GridKind::Scalar, GridKind::Triple] {
        for (width, height) in SHAPES {
            let grid = Arc::new(pattern_grid(kind, width, height, 255));
            for kernel in KernelName::ALL {
                let expected = apply_sequential(&grid, kernel).unwrap();
                for strategy in all_strategies(3) {
                    let actual = strategy.apply(Arc::clone(&grid), kernel).await.unwrap();
                    assert_eq!(
                        actual,
                        expected,
                        "{} / {} / {}x{} {}",
                        strategy.name(),
                        kernel,
                        width,
                        height,
                        kind
                    );
                }
            }
        }
    }
}

#[tokio::test]
async fn test_fan_out_outputs_match_single_kernel_runs() {
    let grid = Arc::new(pattern_grid(GridKind::Triple, 11, 6, 1000));
    let out = apply_fan_out(Arc::clone(&grid)).await.unwrap();
    for kernel in KernelName::ALL {
        assert_eq!(out.get(kernel), &apply_sequential(&grid, kernel).unwrap());
    }
    assert_eq!(out.report.tasks.len(), 3);
}

#[tokio::test]
async fn test_distributed_worker_counts() {
    let grid = Arc::new(pattern_grid(GridKind::Scalar, 6, 10, 255));
    let expected = apply_sequential(&grid, KernelName::Sharpen).unwrap();
    // 1: coordinator alone, 3: uneven remainder, 16: more workers than rows.
    for workers in [1, 2, 3, 10, 16] {
        let actual = apply_distributed(Arc::clone(&grid), KernelName::Sharpen, workers)
            .await
            .unwrap();
        assert_eq!(actual, expected, "{workers} workers");
    }
}

#[test]
fn test_quadrant_regions_cover_grid_once() {
    for (width, height) in SHAPES {
        let grid = pattern_grid(GridKind::Scalar, width, height, 255);
        let (_, report) = apply_quadrant_threaded(&grid, KernelName::Blur).unwrap();
        assert_eq!(report.total_pixels(), u64::from(width * height));
        for (i, a) in report.regions.iter().enumerate() {
            for b in &report.regions[i + 1..] {
                assert!(!a.region.overlaps(&b.region), "{} vs {}", a.region, b.region);
            }
        }
    }
}

#[test]
fn test_smoothing_constant_grid_is_unchanged() {
    let grid = parallel_convolve::PixelGrid::filled(GridKind::Scalar, 4, 4, 255, 100).unwrap();
    let out = apply_sequential(&grid, KernelName::Blur).unwrap();
    assert!(out.samples().iter().all(|&v| v == 100));
}

#[tokio::test]
async fn test_edge_detection_bright_spot_on_every_strategy() {
    let grid = Arc::new(spot_grid(4, 4, 1, 1));
    let bright = [(1, 1), (0, 1), (2, 1), (1, 0), (1, 2)];

    for strategy in all_strategies(2) {
        let out = strategy
            .apply(Arc::clone(&grid), KernelName::Laplace)
            .await
            .unwrap();
        for y in 0..4 {
            for x in 0..4 {
                let expected = if bright.contains(&(x, y)) { 255 } else { 0 };
                assert_eq!(
                    out.get(x, y),
                    Some(PixelValue::Scalar(expected)),
                    "{} at ({x}, {y})",
                    strategy.name()
                );
            }
        }
    }
}

#[test]
fn test_input_grid_is_not_modified() {
    let grid = pattern_grid(GridKind::Triple, 9, 5, 255);
    let before = grid.clone();
    let _ = apply_quadrant_threaded(&grid, KernelName::Laplace).unwrap();
    let _ = apply_sequential(&grid, KernelName::Sharpen).unwrap();
    assert_eq!(grid, before);
}
