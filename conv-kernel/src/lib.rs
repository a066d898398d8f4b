// SPDX-License-Identifier: MIT
//! # conv-kernel
//!
//! Compute core for 3x3 convolution over plain-text rasters.
//!
//! ## Architecture
//!
//! ```text
//! PixelGrid ── get_clamped ──► convolve(grid, x, y, &Kernel) ──► PixelValue
//!     │                               ▲
//!     └── split_regions_mut(&[Region]) ──► RegionMut ◄── ConvolutionOp::fill_region
//! ```
//!
//! - [`grid`]: owned row-major raster, scalar or triple samples.
//! - [`kernel`]: the three built-in kernels, defined once.
//! - [`convolve`]: clamp-to-edge point evaluation and region filling.
//! - [`partition`]: quadrants, row bands and exclusive region views.
//!
//! Everything here is synchronous and allocation-light. Threading lives in the
//! caller; the only guarantee this crate gives is that the input can be shared
//! by reference while each worker writes through its own [`RegionMut`].

pub mod convolve;
pub mod error;
pub mod grid;
pub mod kernel;
pub mod partition;

pub use convolve::{ConvolutionOp, convolve};
pub use error::GridError;
pub use grid::{GridKind, PixelGrid, PixelValue, Sample};
pub use kernel::{EDGE_DETECTION, Kernel, KernelName, ResultTransform, SHARPENING, SMOOTHING};
pub use partition::{Quadrant, Region, RegionMut, quadrants, row_band, row_bands, rows_per_worker};
