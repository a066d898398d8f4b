// SPDX-License-Identifier: MIT
//! Fixed 3x3 convolution kernels and the name registry used by the CLI.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;

use crate::error::GridError;

/// Post-processing applied to the weighted sum after division, before clamping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResultTransform {
    Identity,
    /// Edge detectors report response magnitude.
    Absolute,
}

/// A 3x3 integer kernel.
///
/// Weights are row-major, top row first, so `weights[4]` is the center tap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Kernel {
    name: &'static str,
    weights: [i32; 9],
    divisor: i32,
    transform: ResultTransform,
}

impl Kernel {
    pub const fn new(
        name: &'static str,
        weights: [i32; 9],
        divisor: i32,
        transform: ResultTransform,
    ) -> Self {
        Self {
            name,
            weights,
            divisor,
            transform,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub const fn weights(&self) -> &[i32; 9] {
        &self.weights
    }

    pub const fn divisor(&self) -> i32 {
        self.divisor
    }

    pub const fn transform(&self) -> ResultTransform {
        self.transform
    }

    /// Weight at offset `(dx, dy)`, each in `-1..=1`.
    #[inline]
    pub const fn weight(&self, dx: i32, dy: i32) -> i32 {
        self.weights[((dy + 1) * 3 + (dx + 1)) as usize]
    }

    pub fn weight_sum(&self) -> i32 {
        self.weights.iter().sum()
    }
}

/// Gaussian-like smoothing, weights sum to the divisor.
pub const SMOOTHING: Kernel = Kernel::new(
    "blur",
    [1, 2, 1, 2, 4, 2, 1, 2, 1],
    16,
    ResultTransform::Identity,
);

/// 4-neighbour Laplacian, absolute response.
pub const EDGE_DETECTION: Kernel = Kernel::new(
    "laplace",
    [0, -1, 0, -1, 4, -1, 0, -1, 0],
    1,
    ResultTransform::Absolute,
);

pub const SHARPENING: Kernel = Kernel::new(
    "sharpen",
    [0, -1, 0, -1, 5, -1, 0, -1, 0],
    1,
    ResultTransform::Identity,
);

/// Selectable kernel names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ValueEnum)]
pub enum KernelName {
    #[value(alias = "smoothing")]
    Blur,
    #[value(alias = "laplacian", alias = "edge")]
    Laplace,
    Sharpen,
}

impl KernelName {
    /// Registry order; fan-out runs kernels in this order.
    pub const ALL: [KernelName; 3] = [KernelName::Blur, KernelName::Laplace, KernelName::Sharpen];

    pub fn kernel(self) -> &'static Kernel {
        match self {
            KernelName::Blur => &SMOOTHING,
            KernelName::Laplace => &EDGE_DETECTION,
            KernelName::Sharpen => &SHARPENING,
        }
    }

    /// Output file-name suffix, e.g. `photo_blur.pgm`.
    pub fn suffix(self) -> &'static str {
        self.kernel().name()
    }
}

impl fmt::Display for KernelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

impl FromStr for KernelName {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "blur" | "smoothing" => Ok(KernelName::Blur),
            "laplace" | "laplacian" | "edge" => Ok(KernelName::Laplace),
            "sharpen" => Ok(KernelName::Sharpen),
            _ => Err(GridError::UnknownKernel(s.to_string())),
        }
    }
}
