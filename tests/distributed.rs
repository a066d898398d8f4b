//! Distributed row-band runs through files, metrics reports and failures.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{SAMPLE_PGM, pattern_grid, write_file};
use parallel_convolve::core::performance_analysis::DistributedMetrics;
use parallel_convolve::io::{clone_grid, load_grid, save_grid};
use parallel_convolve::strategy::distributed::{
    DistributedOptions, DistributedRowStrategy, FileSource, GridSource, InMemorySource,
};
use parallel_convolve::{FilterError, FilterResult, GridKind, KernelName, PixelGrid, apply_sequential};

/// Serves a grid to every rank except `failing`, which gets a load error.
struct FailingRank {
    grid: Arc<PixelGrid>,
    failing: usize,
}

#[async_trait]
impl GridSource for FailingRank {
    async fn load(&self, rank: usize) -> FilterResult<PixelGrid> {
        if rank == self.failing {
            return Err(FilterError::load(format!("rank{}.pgm", rank), "unreadable"));
        }
        Ok(clone_grid(&self.grid))
    }

    fn describe(&self) -> String {
        "<failing>".to_string()
    }
}

/// Serves a grid after a fixed delay.
struct SlowSource {
    grid: Arc<PixelGrid>,
    delay: Duration,
}

#[async_trait]
impl GridSource for SlowSource {
    async fn load(&self, _rank: usize) -> FilterResult<PixelGrid> {
        tokio::time::sleep(self.delay).await;
        Ok(clone_grid(&self.grid))
    }

    fn describe(&self) -> String {
        "<slow>".to_string()
    }
}

#[tokio::test]
async fn test_file_source_run_saves_and_reports() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(dir.path(), "tiny.pgm", SAMPLE_PGM);
    let output = dir.path().join("tiny_out.pgm");
    let metrics_path = dir.path().join("metrics.txt");

    let strategy = DistributedRowStrategy::new(DistributedOptions {
        workers: 3,
        output: Some(output.clone()),
        metrics_path: Some(metrics_path.clone()),
        ..DistributedOptions::default()
    });
    let outcome = strategy
        .run(Arc::new(FileSource::new(&input)), KernelName::Laplace)
        .await
        .unwrap();

    let expected = apply_sequential(&load_grid(&input).unwrap(), KernelName::Laplace).unwrap();
    assert_eq!(outcome.grid, expected);
    assert_eq!(load_grid(&output).unwrap(), expected);

    let report = std::fs::read_to_string(&metrics_path).unwrap();
    assert!(report.contains("Filter: laplace"));
    assert!(report.contains("Workers: 3"));
    assert!(report.contains("Image size: 4x3"));
    assert!(report.contains("Total pixels: 12"));
    assert_eq!(outcome.metrics.workers, 3);
    assert_eq!(outcome.metrics.pixels_per_worker(), 4);
}

#[tokio::test]
async fn test_missing_input_fails_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("never.pgm");
    let strategy = DistributedRowStrategy::new(DistributedOptions {
        workers: 4,
        sync_timeout: Duration::from_millis(200),
        output: Some(output.clone()),
        ..DistributedOptions::default()
    });

    let err = strategy
        .run(
            Arc::new(FileSource::new(dir.path().join("missing.pgm"))),
            KernelName::Blur,
        )
        .await
        .unwrap_err();

    assert_eq!(err.category(), "load");
    assert!(!output.exists());
}

#[tokio::test]
async fn test_zero_workers_is_rejected() {
    let grid = Arc::new(pattern_grid(GridKind::Scalar, 3, 3, 255));
    let strategy = DistributedRowStrategy::new(DistributedOptions {
        workers: 0,
        ..DistributedOptions::default()
    });
    let err = strategy
        .run(Arc::new(InMemorySource::new(grid)), KernelName::Blur)
        .await
        .unwrap_err();
    assert_eq!(err.category(), "validation");
}

#[tokio::test]
async fn test_tiny_channel_capacity_still_gathers_everything() {
    let grid = Arc::new(pattern_grid(GridKind::Triple, 5, 40, 255));
    let strategy = DistributedRowStrategy::new(DistributedOptions {
        workers: 4,
        channel_capacity: 1,
        ..DistributedOptions::default()
    });
    let outcome = strategy
        .run(Arc::new(InMemorySource::new(Arc::clone(&grid))), KernelName::Blur)
        .await
        .unwrap();
    assert_eq!(outcome.grid, apply_sequential(&grid, KernelName::Blur).unwrap());
    assert_eq!(outcome.metrics.total_pixels(), 200);
}

#[test]
fn test_default_metrics_path_sits_next_to_output() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.pgm");
    let path = DistributedMetrics::default_report_path(
        KernelName::Sharpen,
        std::path::Path::new("images/lena.pgm"),
        &output,
    );
    assert_eq!(path, dir.path().join("distributed_sharpen_metrics_lena.txt"));
}

#[tokio::test]
async fn test_colour_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("colour.ppm");
    save_grid(&pattern_grid(GridKind::Triple, 7, 5, 255), &input).unwrap();

    let strategy = DistributedRowStrategy::new(DistributedOptions {
        workers: 2,
        ..DistributedOptions::default()
    });
    let outcome = strategy
        .run(Arc::new(FileSource::new(&input)), KernelName::Sharpen)
        .await
        .unwrap();
    assert_eq!(outcome.grid.kind(), GridKind::Triple);
    assert_eq!(
        outcome.grid,
        apply_sequential(&load_grid(&input).unwrap(), KernelName::Sharpen).unwrap()
    );
}

#[tokio::test]
async fn test_one_rank_load_failure_fails_run_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("never.pgm");
    let source = FailingRank {
        grid: Arc::new(pattern_grid(GridKind::Scalar, 6, 8, 255)),
        failing: 2,
    };
    let strategy = DistributedRowStrategy::new(DistributedOptions {
        workers: 4,
        sync_timeout: Duration::from_millis(200),
        output: Some(output.clone()),
        ..DistributedOptions::default()
    });

    let err = strategy
        .run(Arc::new(source), KernelName::Sharpen)
        .await
        .unwrap_err();

    assert_eq!(err.category(), "load");
    assert!(err.to_string().contains("rank2.pgm"));
    assert!(!output.exists());
}

#[tokio::test]
async fn test_total_time_covers_load_and_save() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("slow_out.pgm");
    let delay = Duration::from_millis(30);
    let source = SlowSource {
        grid: Arc::new(pattern_grid(GridKind::Scalar, 9, 6, 255)),
        delay,
    };
    let strategy = DistributedRowStrategy::new(DistributedOptions {
        workers: 2,
        output: Some(output.clone()),
        ..DistributedOptions::default()
    });

    let outcome = strategy
        .run(Arc::new(source), KernelName::Blur)
        .await
        .unwrap();

    assert!(output.exists());
    assert!(outcome.metrics.total >= outcome.metrics.computation + delay);
}

#[tokio::test]
async fn test_unwritable_metrics_report_removes_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(dir.path(), "tiny.pgm", SAMPLE_PGM);
    let output = dir.path().join("tiny_out.pgm");
    let metrics_path = dir.path().join("no_such_dir").join("metrics.txt");

    let strategy = DistributedRowStrategy::new(DistributedOptions {
        workers: 2,
        output: Some(output.clone()),
        metrics_path: Some(metrics_path.clone()),
        ..DistributedOptions::default()
    });
    let err = strategy
        .run(Arc::new(FileSource::new(&input)), KernelName::Blur)
        .await
        .unwrap_err();

    assert_eq!(err.category(), "save");
    assert!(!output.exists());
    assert!(!metrics_path.exists());
}
