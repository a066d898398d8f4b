//! # Error Handling
//!
//! One error type for every filter operation, carrying structured context
//! about where and why it happened.
//!
//! ## Architecture
//!
//! - **`FilterError`**: one variant per failure family (raster I/O, kind or
//!   shape mismatch, worker lifecycle, distributed communication, config)
//! - **`ErrorContext`**: operation, recovery suggestion and severity
//! - **Classification**: `HasSeverity`, `HasRecoverySuggestion` and the
//!   `classify` helpers
//!
//! ## Propagation
//!
//! Nothing here is retried. Every variant is fatal to the operation that
//! raised it and there is no partial-success mode: a strategy either returns
//! a complete output grid or an error.
//!
//! ## Usage
//!
//! ```rust
//! use parallel_convolve::error::{FilterError, HasRecoverySuggestion};
//!
//! let error = FilterError::load("input.pgm", "unexpected end of pixel data")
//!     .with_operation("load_grid")
//!     .with_recovery_suggestion("Check that the file holds width*height samples");
//!
//! assert_eq!(error.category(), "load");
//! assert!(error.recovery_suggestion().is_some());
//! ```

use std::{error::Error as StdError, fmt};

use conv_kernel::GridError;

/// Severity levels for errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum ErrorSeverity {
    /// The operation failed because of its input or environment
    #[default]
    Error,
    /// A worker thread, task or rank was lost
    Critical,
}

/// Where an error occurred and what to do about it
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The operation being performed when the error occurred
    pub operation: Option<String>,
    pub recovery_suggestion: Option<String>,
    pub severity: ErrorSeverity,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn critical() -> Self {
        Self {
            severity: ErrorSeverity::Critical,
            ..Self::default()
        }
    }
}

/// Base error type for filter operations
#[derive(Debug)]
pub enum FilterError {
    /// Raster could not be read or parsed
    Load {
        path: String,
        reason: String,
        source: Option<Box<dyn StdError + Send + Sync>>,
        context: ErrorContext,
    },
    /// Raster could not be written
    Save {
        path: String,
        reason: String,
        source: Option<Box<dyn StdError + Send + Sync>>,
        context: ErrorContext,
    },
    /// Scalar vs triple grids, or grids of different dimensions
    TypeMismatch {
        operation: String,
        expected: String,
        found: String,
        context: ErrorContext,
    },
    /// A worker thread could not be spawned
    ThreadCreation {
        worker: String,
        source: std::io::Error,
        context: ErrorContext,
    },
    /// A worker panicked or its task was cancelled
    WorkerJoin {
        worker: String,
        reason: String,
        context: ErrorContext,
    },
    /// A distributed send, receive or barrier failed
    Communication {
        rank: Option<usize>,
        reason: String,
        context: ErrorContext,
    },
    /// Configuration rejected before any work started
    Config {
        field: String,
        value: String,
        reason: String,
        context: ErrorContext,
    },
    Validation {
        field: String,
        constraint: String,
        value: String,
        context: ErrorContext,
    },
}

impl FilterError {
    pub fn load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Load {
            path: path.into(),
            reason: reason.into(),
            source: None,
            context: ErrorContext::new(),
        }
    }

    /// Load error wrapping an underlying I/O or decoder error
    pub fn load_with_source(
        path: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Load {
            path: path.into(),
            reason: source.to_string(),
            source: Some(Box::new(source)),
            context: ErrorContext::new(),
        }
    }

    pub fn save(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Save {
            path: path.into(),
            reason: reason.into(),
            source: None,
            context: ErrorContext::new(),
        }
    }

    pub fn save_with_source(
        path: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Save {
            path: path.into(),
            reason: source.to_string(),
            source: Some(Box::new(source)),
            context: ErrorContext::new(),
        }
    }

    pub fn type_mismatch(
        operation: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            operation: operation.into(),
            expected: expected.into(),
            found: found.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn thread_creation(worker: impl Into<String>, source: std::io::Error) -> Self {
        Self::ThreadCreation {
            worker: worker.into(),
            source,
            context: ErrorContext::critical(),
        }
    }

    pub fn worker_join(worker: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::WorkerJoin {
            worker: worker.into(),
            reason: reason.into(),
            context: ErrorContext::critical(),
        }
    }

    pub fn communication(rank: Option<usize>, reason: impl Into<String>) -> Self {
        Self::Communication {
            rank,
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn config(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Config {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn validation(
        field: impl Into<String>,
        constraint: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::Validation {
            field: field.into(),
            constraint: constraint.into(),
            value: value.into(),
            context: ErrorContext::new(),
        }
    }

    /// Add operation context
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.context_mut().operation = Some(operation.into());
        self
    }

    pub fn with_recovery_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context_mut().recovery_suggestion = Some(suggestion.into());
        self
    }

    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::Load { context, .. } => context,
            Self::Save { context, .. } => context,
            Self::TypeMismatch { context, .. } => context,
            Self::ThreadCreation { context, .. } => context,
            Self::WorkerJoin { context, .. } => context,
            Self::Communication { context, .. } => context,
            Self::Config { context, .. } => context,
            Self::Validation { context, .. } => context,
        }
    }

    fn context_mut(&mut self) -> &mut ErrorContext {
        match self {
            Self::Load { context, .. } => context,
            Self::Save { context, .. } => context,
            Self::TypeMismatch { context, .. } => context,
            Self::ThreadCreation { context, .. } => context,
            Self::WorkerJoin { context, .. } => context,
            Self::Communication { context, .. } => context,
            Self::Config { context, .. } => context,
            Self::Validation { context, .. } => context,
        }
    }

    /// Get the error category as a string
    pub fn category(&self) -> &'static str {
        match self {
            Self::Load { .. } => "load",
            Self::Save { .. } => "save",
            Self::TypeMismatch { .. } => "type_mismatch",
            Self::ThreadCreation { .. } => "thread_creation",
            Self::WorkerJoin { .. } => "worker_join",
            Self::Communication { .. } => "communication",
            Self::Config { .. } => "config",
            Self::Validation { .. } => "validation",
        }
    }
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterError::Load { path, reason, .. } => {
                write!(f, "Failed to load '{}': {}", path, reason)
            }
            FilterError::Save { path, reason, .. } => {
                write!(f, "Failed to save '{}': {}", path, reason)
            }
            FilterError::TypeMismatch {
                operation,
                expected,
                found,
                ..
            } => {
                write!(
                    f,
                    "Type mismatch in {}: expected {}, found {}",
                    operation, expected, found
                )
            }
            FilterError::ThreadCreation { worker, source, .. } => {
                write!(f, "Failed to spawn worker {}: {}", worker, source)
            }
            FilterError::WorkerJoin { worker, reason, .. } => {
                write!(f, "Worker {} did not complete: {}", worker, reason)
            }
            FilterError::Communication { rank, reason, .. } => {
                if let Some(rank) = rank {
                    write!(f, "Communication error with rank {}: {}", rank, reason)
                } else {
                    write!(f, "Communication error: {}", reason)
                }
            }
            FilterError::Config {
                field,
                value,
                reason,
                ..
            } => {
                write!(
                    f,
                    "Configuration error in '{}': {} (value: {})",
                    field, reason, value
                )
            }
            FilterError::Validation {
                field,
                constraint,
                value,
                ..
            } => {
                write!(
                    f,
                    "Validation failed for '{}': {} (value: {})",
                    field, constraint, value
                )
            }
        }
    }
}

impl StdError for FilterError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Load {
                source: Some(source),
                ..
            }
            | Self::Save {
                source: Some(source),
                ..
            } => Some(source.as_ref()),
            Self::ThreadCreation { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type for filter operations
pub type FilterResult<T> = Result<T, FilterError>;

/// Trait for errors with severity levels
pub trait HasSeverity {
    fn severity(&self) -> ErrorSeverity;
}

impl HasSeverity for FilterError {
    fn severity(&self) -> ErrorSeverity {
        self.context().severity
    }
}

/// Trait for errors that provide recovery suggestions
pub trait HasRecoverySuggestion {
    fn recovery_suggestion(&self) -> Option<&str>;
}

impl HasRecoverySuggestion for FilterError {
    fn recovery_suggestion(&self) -> Option<&str> {
        self.context().recovery_suggestion.as_deref()
    }
}

/// Error classification utilities
pub mod classify {
    use super::*;

    /// Errors from worker threads, tasks or ranks
    pub fn is_worker_failure(error: &FilterError) -> bool {
        matches!(
            error,
            FilterError::ThreadCreation { .. }
                | FilterError::WorkerJoin { .. }
                | FilterError::Communication { .. }
        )
    }

    /// Process exit code for the CLI
    pub fn exit_code(error: &FilterError) -> i32 {
        match error {
            FilterError::Config { .. } | FilterError::Validation { .. } => 2,
            FilterError::Load { .. } | FilterError::Save { .. } => 3,
            FilterError::TypeMismatch { .. } => 4,
            _ => 1,
        }
    }
}

impl From<GridError> for FilterError {
    fn from(error: GridError) -> Self {
        match error {
            GridError::KindMismatch { expected, found } => {
                Self::type_mismatch("grid access", expected.to_string(), found.to_string())
            }
            GridError::ShapeMismatch { expected, found } => Self::type_mismatch(
                "grid access",
                format!("{}x{}", expected.0, expected.1),
                format!("{}x{}", found.0, found.1),
            ),
            GridError::SampleCount { expected, found } => Self::type_mismatch(
                "grid access",
                format!("{} samples", expected),
                format!("{} samples", found),
            ),
            GridError::InvalidWorkerCount { workers, .. } => {
                Self::validation("workers", "must be at least 1", workers.to_string())
            }
            GridError::UnknownKernel(name) => {
                Self::validation("kernel", "one of blur, laplace, sharpen", name)
            }
            other => Self::validation("grid", other.to_string(), ""),
        }
    }
}
