//! # Performance Analysis
//!
//! Timing statistics collected by the parallel strategies and the text/JSON
//! reports rendered from them.
//!
//! - [`QuadrantReport`]: per-worker region timings, bottleneck and balance
//!   efficiency for the four-quadrant strategy
//! - [`FanOutReport`]: per-kernel task timings for the fan-out strategy
//! - [`DistributedMetrics`]: coordinator-side wall, computation and
//!   communication times for the row-band strategy, persisted as a
//!   line-oriented `key: value` report

use std::path::{Path, PathBuf};
use std::time::Duration;

use conv_kernel::{KernelName, Quadrant, Region};
use serde_json::{Value, json};

use crate::error::{FilterError, FilterResult};

fn ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// Timing for one quadrant worker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionStats {
    pub worker_id: usize,
    pub quadrant: Quadrant,
    pub region: Region,
    pub elapsed: Duration,
}

impl RegionStats {
    pub fn pixel_count(&self) -> u64 {
        self.region.pixel_count()
    }
}

/// Statistics for one quadrant-threaded run.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadrantReport {
    pub regions: [RegionStats; 4],
    /// Wall time from spawning the first worker to joining the last.
    pub total: Duration,
}

impl QuadrantReport {
    pub fn new(regions: [RegionStats; 4], total: Duration) -> Self {
        Self { regions, total }
    }

    /// Slowest worker; the strategy cannot finish before it does.
    pub fn bottleneck(&self) -> Duration {
        self.regions
            .iter()
            .map(|r| r.elapsed)
            .max()
            .unwrap_or_default()
    }

    pub fn fastest(&self) -> Duration {
        self.regions
            .iter()
            .map(|r| r.elapsed)
            .min()
            .unwrap_or_default()
    }

    pub fn mean(&self) -> Duration {
        let sum: Duration = self.regions.iter().map(|r| r.elapsed).sum();
        sum / self.regions.len() as u32
    }

    /// `mean / bottleneck * 100`. A zero bottleneck counts as perfectly balanced.
    pub fn balance_efficiency(&self) -> f64 {
        let bottleneck = self.bottleneck();
        if bottleneck.is_zero() {
            return 100.0;
        }
        self.mean().as_secs_f64() / bottleneck.as_secs_f64() * 100.0
    }

    pub fn total_pixels(&self) -> u64 {
        self.regions.iter().map(RegionStats::pixel_count).sum()
    }

    pub fn generate_report(&self) -> String {
        let mut rows = String::new();
        for stats in &self.regions {
            rows.push_str(&format!(
                "  Worker {} ({:<12}) {:<22} {:>10} px  {:>10.3} ms\n",
                stats.worker_id,
                stats.quadrant.label(),
                stats.region.to_string(),
                stats.pixel_count(),
                ms(stats.elapsed)
            ));
        }

        format!(
            r#"Quadrant Thread Statistics
══════════════════════════════════════════

{}
Summary:
──────────────────
  Bottleneck (max):   {:.3} ms
  Fastest (min):      {:.3} ms
  Average:            {:.3} ms
  Balance efficiency: {:.1}%
  Total pixels:       {}
  Wall time:          {:.3} ms"#,
            rows.trim_end(),
            ms(self.bottleneck()),
            ms(self.fastest()),
            ms(self.mean()),
            self.balance_efficiency(),
            self.total_pixels(),
            ms(self.total)
        )
    }

    pub fn to_json(&self) -> Value {
        let regions: Vec<Value> = self
            .regions
            .iter()
            .map(|r| {
                json!({
                    "worker_id": r.worker_id,
                    "quadrant": r.quadrant.label(),
                    "start_x": r.region.start_x,
                    "end_x": r.region.end_x,
                    "start_y": r.region.start_y,
                    "end_y": r.region.end_y,
                    "pixels": r.pixel_count(),
                    "elapsed_ms": ms(r.elapsed),
                })
            })
            .collect();
        json!({
            "regions": regions,
            "bottleneck_ms": ms(self.bottleneck()),
            "fastest_ms": ms(self.fastest()),
            "mean_ms": ms(self.mean()),
            "balance_efficiency": self.balance_efficiency(),
            "total_pixels": self.total_pixels(),
            "wall_ms": ms(self.total),
        })
    }
}

/// Timing for one fan-out task.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaskStats {
    pub kernel: KernelName,
    pub elapsed: Duration,
    pub pixels: u64,
}

/// Statistics for one fan-out run.
#[derive(Debug, Clone, PartialEq)]
pub struct FanOutReport {
    pub tasks: [TaskStats; 3],
    pub total: Duration,
}

impl FanOutReport {
    /// Sum of task times over wall time; above 1.0 means the tasks overlapped.
    pub fn concurrency(&self) -> f64 {
        if self.total.is_zero() {
            return 0.0;
        }
        let busy: Duration = self.tasks.iter().map(|t| t.elapsed).sum();
        busy.as_secs_f64() / self.total.as_secs_f64()
    }

    pub fn generate_report(&self) -> String {
        let mut out = String::from("Fan-Out Task Statistics\n══════════════════════════════════════════\n\n");
        for task in &self.tasks {
            out.push_str(&format!(
                "  {:<8} {:>10} px  {:>10.3} ms\n",
                task.kernel.suffix(),
                task.pixels,
                ms(task.elapsed)
            ));
        }
        out.push_str(&format!(
            "\n  Wall time:   {:.3} ms\n  Concurrency: {:.2}x",
            ms(self.total),
            self.concurrency()
        ));
        out
    }

    pub fn to_json(&self) -> Value {
        let tasks: Vec<Value> = self
            .tasks
            .iter()
            .map(|t| {
                json!({
                    "kernel": t.kernel.suffix(),
                    "pixels": t.pixels,
                    "elapsed_ms": ms(t.elapsed),
                })
            })
            .collect();
        json!({
            "tasks": tasks,
            "wall_ms": ms(self.total),
            "concurrency": self.concurrency(),
        })
    }
}

/// Coordinator-side metrics for one distributed run.
#[derive(Debug, Clone, PartialEq)]
pub struct DistributedMetrics {
    pub filter: KernelName,
    pub input: String,
    pub output: String,
    pub workers: usize,
    pub width: u32,
    pub height: u32,
    /// Coordinator wall time, from loading the input to saving the result.
    pub total: Duration,
    /// Coordinator band-local computation time.
    pub computation: Duration,
}

impl DistributedMetrics {
    pub fn total_pixels(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    pub fn pixels_per_worker(&self) -> u64 {
        self.total_pixels() / self.workers.max(1) as u64
    }

    /// `total - computation`, never negative.
    pub fn communication(&self) -> Duration {
        self.total.saturating_sub(self.computation)
    }

    /// `computation / total * 100`, or 0 when nothing was timed.
    pub fn efficiency(&self) -> f64 {
        if self.total.is_zero() {
            return 0.0;
        }
        self.computation.as_secs_f64() / self.total.as_secs_f64() * 100.0
    }

    /// `distributed_<filter>_metrics_<input stem>.txt`, next to `output`.
    pub fn default_report_path(filter: KernelName, input: &Path, output: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input".to_string());
        let name = format!("distributed_{}_metrics_{}.txt", filter.suffix(), stem);
        match output.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.join(name),
            _ => PathBuf::from(name),
        }
    }

    pub fn generate_report(&self) -> String {
        format!(
            "Filter: {}\n\
             Input: {}\n\
             Output: {}\n\
             Workers: {}\n\
             Image size: {}x{}\n\
             Total pixels: {}\n\
             Pixels per worker: {}\n\
             Total time: {:.3} ms\n\
             Computation time: {:.3} ms\n\
             Communication overhead: {:.3} ms\n\
             Efficiency: {:.2}%\n",
            self.filter,
            self.input,
            self.output,
            self.workers,
            self.width,
            self.height,
            self.total_pixels(),
            self.pixels_per_worker(),
            ms(self.total),
            ms(self.computation),
            ms(self.communication()),
            self.efficiency()
        )
    }

    pub fn write_report(&self, path: &Path) -> FilterResult<()> {
        std::fs::write(path, self.generate_report()).map_err(|e| {
            FilterError::save_with_source(path.display().to_string(), e)
                .with_operation("write_metrics_report")
        })
    }

    pub fn to_json(&self) -> Value {
        json!({
            "filter": self.filter.suffix(),
            "input": self.input,
            "output": self.output,
            "workers": self.workers,
            "width": self.width,
            "height": self.height,
            "total_pixels": self.total_pixels(),
            "pixels_per_worker": self.pixels_per_worker(),
            "total_ms": ms(self.total),
            "computation_ms": ms(self.computation),
            "communication_ms": ms(self.communication()),
            "efficiency": self.efficiency(),
        })
    }
}
