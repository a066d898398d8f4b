//! # Parallel Convolution Library
//!
//! Applies fixed 3x3 kernels (blur, laplace, sharpen) to plain-text PGM/PPM
//! rasters using one of four execution strategies that all produce the same
//! result.
//!
//! ## Architecture
//!
//! - `conv_kernel` (member crate): pixel grids, kernels, clamp-to-edge
//!   convolution and region partitioning
//! - `strategy`: sequential, quadrant threads, fan-out and distributed row bands
//! - `io`: raster loading, saving and inspection
//! - `core`: timing statistics, reports and progress events
//! - `config`: run configuration, validation and environment overrides
//! - `error`: the `FilterError` taxonomy
//!
//! ## Example
//!
//! ```rust,no_run
//! use parallel_convolve::{FilterOptions, KernelName, StrategyMode, run};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let options = FilterOptions {
//!     mode: StrategyMode::Quadrant,
//!     kernel: Some(KernelName::Sharpen),
//!     ..FilterOptions::new("photo.ppm", "photo_sharp.ppm")
//! };
//!
//! let report = run(options).await?;
//! println!("{}", report.render());
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Value, json};
use tracing::{info, warn};

pub mod config;
pub mod core;
pub mod error;
pub mod io;
pub mod strategy;

pub use conv_kernel::{
    GridKind, Kernel, KernelName, PixelGrid, PixelValue, Quadrant, Region, ResultTransform, Sample,
};
pub use error::{ErrorSeverity, FilterError, FilterResult, HasRecoverySuggestion, HasSeverity};
pub use strategy::{FilterStrategy, StrategyMode};

use crate::core::performance_analysis::{DistributedMetrics, FanOutReport, QuadrantReport};
use crate::core::progress::{self, ProgressTracker};
use crate::strategy::distributed::{DistributedOptions, DistributedRowStrategy, FileSource, InMemorySource};
use crate::strategy::fan_out::FanOutOutput;

/// Everything needed for one end-to-end run: load, filter, save.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOptions {
    pub input: PathBuf,
    /// Output path. Fan-out derives `_blur`, `_laplace` and `_sharpen`
    /// siblings from it.
    pub output: PathBuf,
    pub mode: StrategyMode,
    /// Required for every mode except fan-out.
    pub kernel: Option<KernelName>,
    /// Distributed rank count.
    pub workers: usize,
    /// Write the distributed metrics report.
    pub metrics: bool,
    /// Metrics report path; defaults next to the output.
    pub metrics_path: Option<PathBuf>,
    pub comm_timeout: Duration,
    pub sync_timeout: Duration,
    /// Log row progress for sequential and fan-out runs.
    pub progress: bool,
}

impl FilterOptions {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        let defaults = DistributedOptions::default();
        Self {
            input: input.into(),
            output: output.into(),
            mode: StrategyMode::Sequential,
            kernel: Some(KernelName::Blur),
            workers: defaults.workers,
            metrics: false,
            metrics_path: None,
            comm_timeout: defaults.comm_timeout,
            sync_timeout: defaults.sync_timeout,
            progress: false,
        }
    }

    fn require_kernel(&self) -> FilterResult<KernelName> {
        self.kernel.ok_or_else(|| {
            FilterError::config("kernel", "<none>", format!("required for {} mode", self.mode))
        })
    }
}

/// Filter `grid` in raster order on the calling thread.
pub fn apply_sequential(grid: &PixelGrid, kernel: KernelName) -> FilterResult<PixelGrid> {
    strategy::sequential::apply_sequential(grid, kernel)
}

/// Filter `grid` with four quadrant threads.
pub fn apply_quadrant_threaded(
    grid: &PixelGrid,
    kernel: KernelName,
) -> FilterResult<(PixelGrid, QuadrantReport)> {
    strategy::quadrant::apply_quadrant_threaded(grid, kernel)
}

/// Apply blur, laplace and sharpen to `grid` concurrently.
pub async fn apply_fan_out(grid: Arc<PixelGrid>) -> FilterResult<FanOutOutput> {
    strategy::fan_out::apply_fan_out(grid, None).await
}

/// Filter `grid` with `workers` row-band ranks and return the coordinator's
/// assembled grid.
pub async fn apply_distributed(
    grid: Arc<PixelGrid>,
    kernel: KernelName,
    workers: usize,
) -> FilterResult<PixelGrid> {
    let strategy = DistributedRowStrategy::new(DistributedOptions {
        workers,
        ..DistributedOptions::default()
    });
    let outcome = strategy
        .run(Arc::new(InMemorySource::new(grid)), kernel)
        .await?;
    Ok(outcome.grid)
}

/// Strategy-specific part of a [`RunReport`].
#[derive(Debug, Clone, PartialEq)]
pub enum RunDetails {
    Sequential,
    Quadrant(QuadrantReport),
    FanOut(FanOutReport),
    Distributed(DistributedMetrics),
}

/// Summary of one [`run`].
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub mode: StrategyMode,
    pub kernel: Option<KernelName>,
    pub input: PathBuf,
    pub outputs: Vec<PathBuf>,
    pub width: u32,
    pub height: u32,
    pub elapsed: Duration,
    pub metrics_path: Option<PathBuf>,
    pub details: RunDetails,
}

impl RunReport {
    pub fn render(&self) -> String {
        let mut out = format!(
            "Mode: {}\nInput: {} ({}x{})\n",
            self.mode,
            self.input.display(),
            self.width,
            self.height
        );
        if let Some(kernel) = self.kernel {
            out.push_str(&format!("Kernel: {}\n", kernel));
        }
        for output in &self.outputs {
            out.push_str(&format!("Output: {}\n", output.display()));
        }
        out.push_str(&format!(
            "Elapsed: {:.3} ms\n",
            self.elapsed.as_secs_f64() * 1000.0
        ));
        let details = match &self.details {
            RunDetails::Sequential => None,
            RunDetails::Quadrant(report) => Some(report.generate_report()),
            RunDetails::FanOut(report) => Some(report.generate_report()),
            RunDetails::Distributed(metrics) => Some(metrics.generate_report()),
        };
        if let Some(details) = details {
            out.push('\n');
            out.push_str(details.trim_end());
            out.push('\n');
        }
        if let Some(path) = &self.metrics_path {
            out.push_str(&format!("Metrics report: {}\n", path.display()));
        }
        out
    }

    pub fn to_json(&self) -> Value {
        let details = match &self.details {
            RunDetails::Sequential => Value::Null,
            RunDetails::Quadrant(report) => report.to_json(),
            RunDetails::FanOut(report) => report.to_json(),
            RunDetails::Distributed(metrics) => metrics.to_json(),
        };
        json!({
            "mode": self.mode.to_string(),
            "kernel": self.kernel.map(|k| k.suffix()),
            "input": self.input.display().to_string(),
            "outputs": self.outputs.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
            "width": self.width,
            "height": self.height,
            "elapsed_ms": self.elapsed.as_secs_f64() * 1000.0,
            "metrics_path": self.metrics_path.as_ref().map(|p| p.display().to_string()),
            "details": details,
        })
    }
}

async fn blocking<T, F>(label: &str, job: F) -> FilterResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> FilterResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| FilterError::worker_join(label, e.to_string()))?
}

async fn load(path: &Path) -> FilterResult<PixelGrid> {
    let path = path.to_path_buf();
    blocking("loader", move || io::load_grid(path)).await
}

/// Load, filter and save according to `options`.
///
/// Nothing is written unless the strategy produced every output it owes.
pub async fn run(options: FilterOptions) -> FilterResult<RunReport> {
    let started = Instant::now();
    let (progress_tx, progress_task) = if options.progress {
        let (tx, rx) = progress::channel();
        (Some(tx), Some(tokio::spawn(progress::log_progress(rx))))
    } else {
        (None, None)
    };

    let result = run_mode(&options, progress_tx).await;
    if let Some(task) = progress_task {
        if let Err(error) = task.await {
            warn!(error = %error, "Progress logger did not finish");
        }
    }
    let (width, height, outputs, metrics_path, details) = result?;

    let report = RunReport {
        mode: options.mode,
        kernel: if options.mode == StrategyMode::FanOut {
            None
        } else {
            options.kernel
        },
        input: options.input.clone(),
        outputs,
        width,
        height,
        elapsed: started.elapsed(),
        metrics_path,
        details,
    };
    info!(mode = %report.mode, elapsed_ms = report.elapsed.as_secs_f64() * 1000.0, "Run complete");
    Ok(report)
}

type ModeResult = (u32, u32, Vec<PathBuf>, Option<PathBuf>, RunDetails);

async fn run_mode(
    options: &FilterOptions,
    progress_tx: Option<tokio::sync::mpsc::UnboundedSender<progress::ProgressEvent>>,
) -> FilterResult<ModeResult> {
    match options.mode {
        StrategyMode::Sequential => {
            let kernel = options.require_kernel()?;
            let grid = load(&options.input).await?;
            let (width, height) = grid.dimensions();
            let output = options.output.clone();
            blocking("sequential", move || {
                let mut tracker = ProgressTracker::new("sequential", grid.height(), progress_tx);
                let result = strategy::sequential::apply_with_progress(&grid, kernel, &mut tracker)?;
                io::save_grid(&result, &output)
            })
            .await?;
            Ok((width, height, vec![options.output.clone()], None, RunDetails::Sequential))
        }
        StrategyMode::Quadrant => {
            let kernel = options.require_kernel()?;
            let grid = load(&options.input).await?;
            let (width, height) = grid.dimensions();
            let output = options.output.clone();
            let report = blocking("quadrant", move || {
                let (result, report) = apply_quadrant_threaded(&grid, kernel)?;
                io::save_grid(&result, &output)?;
                Ok(report)
            })
            .await?;
            Ok((
                width,
                height,
                vec![options.output.clone()],
                None,
                RunDetails::Quadrant(report),
            ))
        }
        StrategyMode::FanOut => {
            let grid = Arc::new(load(&options.input).await?);
            let (width, height) = grid.dimensions();
            let out = strategy::fan_out::apply_fan_out(grid, progress_tx).await?;
            let paths: Vec<PathBuf> = KernelName::ALL
                .iter()
                .map(|k| io::suffixed_path(&options.output, k.suffix()))
                .collect();
            let report = out.report.clone();
            let targets = paths.clone();
            blocking("fan-out save", move || {
                for ((_, grid), path) in out.outputs().into_iter().zip(&targets) {
                    io::save_grid(grid, path)?;
                }
                Ok(())
            })
            .await?;
            Ok((width, height, paths, None, RunDetails::FanOut(report)))
        }
        StrategyMode::Distributed => {
            let kernel = options.require_kernel()?;
            let metrics_path = if options.metrics {
                Some(options.metrics_path.clone().unwrap_or_else(|| {
                    DistributedMetrics::default_report_path(kernel, &options.input, &options.output)
                }))
            } else {
                None
            };
            let strategy = DistributedRowStrategy::new(DistributedOptions {
                workers: options.workers,
                comm_timeout: options.comm_timeout,
                sync_timeout: options.sync_timeout,
                output: Some(options.output.clone()),
                metrics_path: metrics_path.clone(),
                ..DistributedOptions::default()
            });
            let outcome = strategy
                .run(Arc::new(FileSource::new(&options.input)), kernel)
                .await?;
            let (width, height) = outcome.grid.dimensions();
            Ok((
                width,
                height,
                vec![options.output.clone()],
                metrics_path,
                RunDetails::Distributed(outcome.metrics),
            ))
        }
    }
}
