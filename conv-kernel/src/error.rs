// SPDX-License-Identifier: MIT
//! Errors raised by grid construction, pixel access and partitioning.

use std::fmt;

use crate::grid::{GridKind, Sample};
use crate::partition::Region;

/// Failure modes of the compute core. Callers attach operation context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    /// Width or height of zero.
    EmptyDimensions { width: u32, height: u32 },
    /// `width * height * channels` does not fit in memory addressing.
    TooLarge { width: u32, height: u32 },
    /// A max value of zero cannot hold any pixel data.
    InvalidMaxValue(Sample),
    /// Sample buffer length does not match `width * height * channels`.
    SampleCount { expected: usize, found: usize },
    /// A sample exceeds the grid's max value.
    SampleOutOfRange {
        index: usize,
        value: Sample,
        max_value: Sample,
    },
    /// Coordinate outside `[0, width) x [0, height)`.
    OutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
    /// Scalar data handed to a triple grid or vice versa.
    KindMismatch { expected: GridKind, found: GridKind },
    /// Two grids that must share dimensions do not.
    ShapeMismatch {
        expected: (u32, u32),
        found: (u32, u32),
    },
    /// A region extends past the grid edge.
    RegionOutOfBounds {
        region: Region,
        width: u32,
        height: u32,
    },
    /// Two regions of one partition share at least one pixel.
    OverlappingRegions { first: Region, second: Region },
    /// Row-band partitioning needs at least one worker, and `rank < workers`.
    InvalidWorkerCount { workers: usize, rank: usize },
    /// A kernel name that is not in the registry.
    UnknownKernel(String),
}

impl GridError {
    /// True when the error describes mismatched grid kinds or dimensions.
    pub fn is_mismatch(&self) -> bool {
        matches!(
            self,
            Self::KindMismatch { .. } | Self::ShapeMismatch { .. } | Self::SampleCount { .. }
        )
    }
}

impl fmt::Display for GridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyDimensions { width, height } => {
                write!(f, "grid dimensions must be positive (got {}x{})", width, height)
            }
            Self::TooLarge { width, height } => {
                write!(f, "grid dimensions {}x{} are too large", width, height)
            }
            Self::InvalidMaxValue(max) => write!(f, "max value must be positive (got {})", max),
            Self::SampleCount { expected, found } => {
                write!(f, "expected {} samples, found {}", expected, found)
            }
            Self::SampleOutOfRange {
                index,
                value,
                max_value,
            } => write!(
                f,
                "sample {} has value {} outside [0, {}]",
                index, value, max_value
            ),
            Self::OutOfBounds {
                x,
                y,
                width,
                height,
            } => write!(
                f,
                "coordinate ({}, {}) outside {}x{} grid",
                x, y, width, height
            ),
            Self::KindMismatch { expected, found } => {
                write!(f, "expected {} grid, found {}", expected, found)
            }
            Self::ShapeMismatch { expected, found } => write!(
                f,
                "expected {}x{} grid, found {}x{}",
                expected.0, expected.1, found.0, found.1
            ),
            Self::RegionOutOfBounds {
                region,
                width,
                height,
            } => write!(f, "region {} exceeds {}x{} grid", region, width, height),
            Self::OverlappingRegions { first, second } => {
                write!(f, "regions {} and {} overlap", first, second)
            }
            Self::InvalidWorkerCount { workers, rank } => {
                write!(f, "invalid worker layout: rank {} of {} workers", rank, workers)
            }
            Self::UnknownKernel(name) => write!(
                f,
                "unknown kernel '{}' (expected blur, laplace or sharpen)",
                name
            ),
        }
    }
}

impl std::error::Error for GridError {}
