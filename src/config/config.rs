//! # Run Configuration
//!
//! `FilterConfig` is the common interface between the CLI and the library:
//! it collects what to filter, how, and with which knobs, validates it, and
//! converts into the library's [`FilterOptions`](crate::FilterOptions).
//!
//! ## Parameters
//!
//! | Parameter | Type | Range | Description |
//! |-----------|------|-------|-------------|
//! | `input` | `String` | non-empty path | Raster to filter |
//! | `output` | `String` | non-empty path | Result path (fan-out: base for suffixed outputs) |
//! | `mode` | `StrategyMode` | see enum | Execution strategy |
//! | `kernel` | `Option<KernelName>` | required unless fan-out | Kernel to apply |
//! | `workers` | `usize` | 1-256 | Distributed worker count |
//! | `comm_timeout_ms` | `u64` | > 0 | Per-receive timeout on the coordinator |
//! | `sync_timeout_ms` | `u64` | > 0 | Barrier wait timeout |
//!
//! ## Environment Overrides
//!
//! Applied by [`FilterConfig::apply_env_overrides`], before validation:
//! `PCONV_WORKERS`, `PCONV_COMM_TIMEOUT_MS` and `PCONV_PROGRESS`.
//!
//! ## Examples
//!
//! ```rust
//! use parallel_convolve::config::config::FilterConfig;
//! use parallel_convolve::{KernelName, StrategyMode};
//!
//! let config = FilterConfig::new(
//!     "lena.pgm".to_string(),
//!     "lena_blur.pgm".to_string(),
//!     StrategyMode::Quadrant,
//!     Some(KernelName::Blur),
//! );
//! assert!(config.validate().is_ok());
//!
//! let options = config.to_filter_options();
//! assert_eq!(options.kernel, Some(KernelName::Blur));
//! ```

use std::path::PathBuf;
use std::time::Duration;

use conv_kernel::KernelName;

use super::env;
use crate::FilterOptions;
use crate::strategy::StrategyMode;

/// Upper bound on distributed workers.
pub const MAX_WORKERS: usize = 256;

/// Configuration for a single filter run.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterConfig {
    /// Input raster path.
    pub input: String,

    /// Output raster path.
    ///
    /// For fan-out this is the base name: `photo.pgm` yields `photo_blur.pgm`,
    /// `photo_laplace.pgm` and `photo_sharpen.pgm`.
    pub output: String,

    pub mode: StrategyMode,

    /// Kernel to apply. Ignored by fan-out, which always runs all three.
    pub kernel: Option<KernelName>,

    /// Number of distributed workers (ranks), coordinator included.
    pub workers: usize,

    /// Whether the distributed coordinator writes a metrics report.
    pub metrics: bool,

    /// Explicit metrics report path. When unset, the report lands next to the
    /// output as `distributed_<filter>_metrics_<input stem>.txt`.
    pub metrics_path: Option<String>,

    pub comm_timeout_ms: u64,

    pub sync_timeout_ms: u64,

    /// Emit row progress events for sequential and fan-out runs.
    pub progress: bool,

    /// Print the run report as JSON instead of text.
    pub json: bool,
}

impl Default for FilterConfig {
    /// Defaults:
    /// - `input` / `output`: `input.pgm` / `output.pgm`
    /// - `mode`: sequential, `kernel`: blur
    /// - `workers`: 4
    /// - `comm_timeout_ms`: 5000, `sync_timeout_ms`: 60000
    fn default() -> Self {
        Self {
            input: "input.pgm".to_string(),
            output: "output.pgm".to_string(),
            mode: StrategyMode::Sequential,
            kernel: Some(KernelName::Blur),
            workers: 4,
            metrics: false,
            metrics_path: None,
            comm_timeout_ms: 5_000,
            sync_timeout_ms: 60_000,
            progress: false,
            json: false,
        }
    }
}

impl FilterConfig {
    pub fn new(
        input: String,
        output: String,
        mode: StrategyMode,
        kernel: Option<KernelName>,
    ) -> Self {
        Self {
            input,
            output,
            mode,
            kernel,
            ..Self::default()
        }
    }

    /// Apply `PCONV_*` environment overrides. Unset or malformed variables
    /// leave the current value untouched.
    pub fn apply_env_overrides(&mut self) {
        if let Some(workers) = env::env_var_positive_u64(env::WORKERS_VAR) {
            self.workers = usize::try_from(workers).unwrap_or(usize::MAX);
        }
        if let Some(timeout) = env::env_var_positive_u64(env::COMM_TIMEOUT_VAR) {
            self.comm_timeout_ms = timeout;
        }
        if env::env_var_truthy(env::PROGRESS_VAR) {
            self.progress = true;
        }
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), String> {
        if self.input.trim().is_empty() {
            return Err("Input path must not be empty".to_string());
        }
        if self.output.trim().is_empty() {
            return Err("Output path must not be empty".to_string());
        }
        if self.mode != StrategyMode::FanOut && self.kernel.is_none() {
            return Err(format!("A kernel is required for {} mode", self.mode));
        }
        if !(1..=MAX_WORKERS).contains(&self.workers) {
            return Err(format!("Workers must be between 1 and {}", MAX_WORKERS));
        }
        if self.comm_timeout_ms == 0 {
            return Err("Communication timeout must be greater than 0".to_string());
        }
        if self.sync_timeout_ms == 0 {
            return Err("Synchronization timeout must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Convert to FilterOptions for use with the library
    pub fn to_filter_options(&self) -> FilterOptions {
        FilterOptions {
            input: PathBuf::from(&self.input),
            output: PathBuf::from(&self.output),
            mode: self.mode,
            kernel: self.kernel,
            workers: self.workers,
            metrics: self.metrics || self.metrics_path.is_some(),
            metrics_path: self.metrics_path.as_ref().map(PathBuf::from),
            comm_timeout: Duration::from_millis(self.comm_timeout_ms),
            sync_timeout: Duration::from_millis(self.sync_timeout_ms),
            progress: self.progress,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FilterConfig::default();
        assert_eq!(config.output, "output.pgm");
        assert_eq!(config.mode, StrategyMode::Sequential);
        assert_eq!(config.kernel, Some(KernelName::Blur));
        assert_eq!(config.workers, 4);
        assert!(!config.progress);
    }

    #[test]
    fn test_config_validation() {
        let mut config = FilterConfig::default();
        assert!(config.validate().is_ok());

        config.input = "  ".to_string();
        assert!(config.validate().is_err());
        config.input = "in.pgm".to_string();

        config.workers = 0;
        assert!(config.validate().is_err());
        config.workers = MAX_WORKERS + 1;
        assert!(config.validate().is_err());
        config.workers = MAX_WORKERS;
        assert!(config.validate().is_ok());

        config.comm_timeout_ms = 0;
        assert!(config.validate().is_err());
        config.comm_timeout_ms = 100;

        config.sync_timeout_ms = 0;
        assert!(config.validate().is_err());
        config.sync_timeout_ms = 100;

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_kernel_required_except_fan_out() {
        let mut config = FilterConfig::new(
            "in.ppm".to_string(),
            "out.ppm".to_string(),
            StrategyMode::Distributed,
            None,
        );
        assert!(config.validate().is_err());

        config.mode = StrategyMode::FanOut;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_to_filter_options() {
        let mut config = FilterConfig::default();
        config.metrics_path = Some("run.txt".to_string());
        config.comm_timeout_ms = 250;

        let options = config.to_filter_options();
        assert_eq!(options.input, PathBuf::from("input.pgm"));
        assert!(options.metrics);
        assert_eq!(options.metrics_path, Some(PathBuf::from("run.txt")));
        assert_eq!(options.comm_timeout, Duration::from_millis(250));
    }
}
