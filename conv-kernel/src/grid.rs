// SPDX-License-Identifier: MIT
//! # Pixel Grids
//!
//! A `PixelGrid` owns a `width x height` raster of either scalar (grayscale)
//! or triple (color) samples in one contiguous, row-major buffer. Triples are
//! stored interleaved, so pixel `(x, y)` starts at `(y * width + x) * channels`.
//!
//! ## Invariants
//!
//! - `width` and `height` are positive and never change after allocation.
//! - Every stored sample lies in `[0, max_value]`. `set` clamps rather than
//!   rejecting values, matching how the raster writers have always behaved.
//! - The grid kind is an explicit tag; all per-kind dispatch matches on it.
//!
//! ## Concurrency
//!
//! The grid itself has no interior mutability. Many readers may share an
//! `&PixelGrid` across threads; writers get exclusive access to disjoint
//! regions through [`PixelGrid::split_regions_mut`].

use std::fmt;

use crate::error::GridError;
use crate::partition::{Region, RegionMut};

/// Storage type for a single channel sample. Plain-text rasters allow a max
/// value of up to 65535.
pub type Sample = u16;

/// Which pixel layout a grid carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GridKind {
    /// One sample per pixel (grayscale, `P2`).
    Scalar,
    /// Three samples per pixel (color, `P3`).
    Triple,
}

impl GridKind {
    /// Samples per pixel.
    pub const fn channels(self) -> usize {
        match self {
            GridKind::Scalar => 1,
            GridKind::Triple => 3,
        }
    }

    /// `width * height * channels`, or `None` if it overflows `usize`.
    pub fn sample_count(self, width: u32, height: u32) -> Option<usize> {
        (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(self.channels())
    }

    /// Plain-text magic number for this kind.
    pub const fn magic(self) -> &'static str {
        match self {
            GridKind::Scalar => "P2",
            GridKind::Triple => "P3",
        }
    }

    pub fn from_magic(magic: &str) -> Option<Self> {
        match magic {
            "P2" => Some(GridKind::Scalar),
            "P3" => Some(GridKind::Triple),
            _ => None,
        }
    }
}

impl fmt::Display for GridKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridKind::Scalar => f.write_str("scalar"),
            GridKind::Triple => f.write_str("triple"),
        }
    }
}

/// A single pixel value, tagged with its kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelValue {
    Scalar(Sample),
    Triple([Sample; 3]),
}

impl PixelValue {
    pub fn kind(&self) -> GridKind {
        match self {
            PixelValue::Scalar(_) => GridKind::Scalar,
            PixelValue::Triple(_) => GridKind::Triple,
        }
    }

    pub fn as_slice(&self) -> &[Sample] {
        match self {
            PixelValue::Scalar(v) => std::slice::from_ref(v),
            PixelValue::Triple(rgb) => rgb,
        }
    }

    /// Build a value from a pixel's samples; `None` for lengths other than 1 or 3.
    pub fn from_slice(samples: &[Sample]) -> Option<Self> {
        match *samples {
            [v] => Some(PixelValue::Scalar(v)),
            [r, g, b] => Some(PixelValue::Triple([r, g, b])),
            _ => None,
        }
    }
}

/// Owned raster of scalar or triple samples.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelGrid {
    width: u32,
    height: u32,
    max_value: Sample,
    kind: GridKind,
    samples: Vec<Sample>,
    /// Header comments carried from the source file, without the leading `#`.
    comments: Vec<String>,
}

impl PixelGrid {
    /// Allocate a zero-filled grid.
    pub fn new(kind: GridKind, width: u32, height: u32, max_value: Sample) -> Result<Self, GridError> {
        Self::filled(kind, width, height, max_value, 0)
    }

    /// Allocate a grid with every sample set to `value` (clamped to `max_value`).
    pub fn filled(
        kind: GridKind,
        width: u32,
        height: u32,
        max_value: Sample,
        value: Sample,
    ) -> Result<Self, GridError> {
        validate_header(width, height, max_value)?;
        let len = sample_len(kind, width, height)?;
        Ok(Self {
            width,
            height,
            max_value,
            kind,
            samples: vec![value.min(max_value); len],
            comments: Vec::new(),
        })
    }

    /// Wrap an existing row-major sample buffer, validating its length and range.
    pub fn from_samples(
        kind: GridKind,
        width: u32,
        height: u32,
        max_value: Sample,
        samples: Vec<Sample>,
    ) -> Result<Self, GridError> {
        validate_header(width, height, max_value)?;
        let expected = sample_len(kind, width, height)?;
        if samples.len() != expected {
            return Err(GridError::SampleCount {
                expected,
                found: samples.len(),
            });
        }
        if let Some((index, &value)) = samples.iter().enumerate().find(|(_, v)| **v > max_value) {
            return Err(GridError::SampleOutOfRange {
                index,
                value,
                max_value,
            });
        }
        Ok(Self {
            width,
            height,
            max_value,
            kind,
            samples,
            comments: Vec::new(),
        })
    }

    pub fn with_comments(mut self, comments: Vec<String>) -> Self {
        self.comments = comments;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn max_value(&self) -> Sample {
        self.max_value
    }

    pub fn kind(&self) -> GridKind {
        self.kind
    }

    pub fn channels(&self) -> usize {
        self.kind.channels()
    }

    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Raw row-major samples.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    /// Full-grid region, `[0, width) x [0, height)`.
    pub fn bounds(&self) -> Region {
        Region::full(self.width, self.height)
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * self.channels()
    }

    /// Samples of one pixel, or `None` outside the grid.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[Sample]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let start = self.offset(x, y);
        Some(&self.samples[start..start + self.channels()])
    }

    /// Bounds-checked read.
    pub fn get(&self, x: u32, y: u32) -> Option<PixelValue> {
        self.pixel(x, y).and_then(PixelValue::from_slice)
    }

    /// Bounds-checked write. The value must match the grid kind; samples above
    /// `max_value` are clamped.
    pub fn set(&mut self, x: u32, y: u32, value: PixelValue) -> Result<(), GridError> {
        if value.kind() != self.kind {
            return Err(GridError::KindMismatch {
                expected: self.kind,
                found: value.kind(),
            });
        }
        if x >= self.width || y >= self.height {
            return Err(GridError::OutOfBounds {
                x,
                y,
                width: self.width,
                height: self.height,
            });
        }
        let max = self.max_value;
        let start = self.offset(x, y);
        for (dst, src) in self.samples[start..].iter_mut().zip(value.as_slice()) {
            *dst = (*src).min(max);
        }
        Ok(())
    }

    /// Read with clamp-to-edge coordinates: each axis is clamped independently
    /// into the grid, so out-of-range positions see the nearest edge pixel.
    #[inline]
    pub fn get_clamped(&self, x: i64, y: i64) -> &[Sample] {
        let cx = x.clamp(0, i64::from(self.width) - 1) as u32;
        let cy = y.clamp(0, i64::from(self.height) - 1) as u32;
        let start = self.offset(cx, cy);
        &self.samples[start..start + self.channels()]
    }

    /// One complete row of samples.
    pub fn row(&self, y: u32) -> Option<&[Sample]> {
        if y >= self.height {
            return None;
        }
        let len = self.row_len();
        let start = y as usize * len;
        Some(&self.samples[start..start + len])
    }

    /// Overwrite one complete row. Samples above `max_value` are clamped.
    pub fn set_row(&mut self, y: u32, samples: &[Sample]) -> Result<(), GridError> {
        if y >= self.height {
            return Err(GridError::OutOfBounds {
                x: 0,
                y,
                width: self.width,
                height: self.height,
            });
        }
        let len = self.row_len();
        if samples.len() != len {
            return Err(GridError::SampleCount {
                expected: len,
                found: samples.len(),
            });
        }
        let max = self.max_value;
        let start = y as usize * len;
        for (dst, src) in self.samples[start..start + len].iter_mut().zip(samples) {
            *dst = (*src).min(max);
        }
        Ok(())
    }

    /// Samples per row (`width * channels`).
    pub fn row_len(&self) -> usize {
        self.width as usize * self.channels()
    }

    /// Check that `other` has the same kind and dimensions as `self`.
    pub fn ensure_same_shape(&self, other: &PixelGrid) -> Result<(), GridError> {
        if self.kind != other.kind {
            return Err(GridError::KindMismatch {
                expected: self.kind,
                found: other.kind,
            });
        }
        if self.dimensions() != other.dimensions() {
            return Err(GridError::ShapeMismatch {
                expected: self.dimensions(),
                found: other.dimensions(),
            });
        }
        Ok(())
    }

    /// Split the grid into exclusive mutable views, one per region.
    ///
    /// Regions must lie within the grid and must not overlap; empty regions are
    /// allowed and yield a view with no rows. Each view holds one slice per row
    /// it covers, so writers never alias and no locking is needed.
    pub fn split_regions_mut(&mut self, regions: &[Region]) -> Result<Vec<RegionMut<'_>>, GridError> {
        for (i, region) in regions.iter().enumerate() {
            if !region.fits_within(self.width, self.height) {
                return Err(GridError::RegionOutOfBounds {
                    region: *region,
                    width: self.width,
                    height: self.height,
                });
            }
            if let Some(other) = regions[i + 1..].iter().find(|other| region.overlaps(other)) {
                return Err(GridError::OverlappingRegions {
                    first: *region,
                    second: *other,
                });
            }
        }

        let channels = self.channels();
        let row_len = self.row_len();
        let mut views: Vec<RegionMut<'_>> = regions
            .iter()
            .map(|region| RegionMut::new(*region, channels))
            .collect();

        // Left-to-right order lets each row be carved with successive split_at_mut calls.
        let mut order: Vec<usize> = (0..regions.len()).collect();
        order.sort_by_key(|&i| regions[i].start_x);

        for (y, row) in self.samples.chunks_exact_mut(row_len).enumerate() {
            let y = y as u32;
            let mut rest: &mut [Sample] = row;
            let mut cursor = 0u32;
            for &i in &order {
                let region = regions[i];
                if region.is_empty() || !region.covers_row(y) {
                    continue;
                }
                let skip = (region.start_x - cursor) as usize * channels;
                let take = region.width() as usize * channels;
                let (_, tail) = std::mem::take(&mut rest).split_at_mut(skip);
                let (mine, tail) = tail.split_at_mut(take);
                views[i].push_row(mine);
                rest = tail;
                cursor = region.end_x;
            }
        }

        Ok(views)
    }
}

fn validate_header(width: u32, height: u32, max_value: Sample) -> Result<(), GridError> {
    if width == 0 || height == 0 {
        return Err(GridError::EmptyDimensions { width, height });
    }
    if max_value == 0 {
        return Err(GridError::InvalidMaxValue(max_value));
    }
    Ok(())
}

fn sample_len(kind: GridKind, width: u32, height: u32) -> Result<usize, GridError> {
    kind.sample_count(width, height)
        .ok_or(GridError::TooLarge { width, height })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_empty_dimensions() {
        assert!(matches!(
            PixelGrid::new(GridKind::Scalar, 0, 4, 255),
            Err(GridError::EmptyDimensions { .. })
        ));
        assert!(PixelGrid::new(GridKind::Scalar, 4, 4, 0).is_err());
    }

    #[test]
    fn test_sample_count_overflow_is_rejected() {
        assert_eq!(GridKind::Triple.sample_count(4, 3), Some(36));
        assert_eq!(GridKind::Triple.sample_count(u32::MAX, u32::MAX), None);
        assert!(matches!(
            PixelGrid::from_samples(GridKind::Triple, u32::MAX, u32::MAX, 255, Vec::new()),
            Err(GridError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_from_samples_validates_length_and_range() {
        let err = PixelGrid::from_samples(GridKind::Triple, 2, 1, 255, vec![0; 5]).unwrap_err();
        assert_eq!(err, GridError::SampleCount { expected: 6, found: 5 });

        let err = PixelGrid::from_samples(GridKind::Scalar, 2, 1, 10, vec![3, 11]).unwrap_err();
        assert!(matches!(err, GridError::SampleOutOfRange { index: 1, value: 11, .. }));
    }

    #[test]
    fn test_get_and_set_are_bounds_checked() {
        let mut grid = PixelGrid::new(GridKind::Scalar, 3, 2, 100).unwrap();
        grid.set(2, 1, PixelValue::Scalar(42)).unwrap();
        assert_eq!(grid.get(2, 1), Some(PixelValue::Scalar(42)));
        assert_eq!(grid.get(3, 1), None);
        assert!(matches!(
            grid.set(0, 2, PixelValue::Scalar(1)),
            Err(GridError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_set_clamps_to_max_value() {
        let mut grid = PixelGrid::new(GridKind::Triple, 1, 1, 15).unwrap();
        grid.set(0, 0, PixelValue::Triple([3, 20, 15])).unwrap();
        assert_eq!(grid.get(0, 0), Some(PixelValue::Triple([3, 15, 15])));
    }

    #[test]
    fn test_set_rejects_wrong_kind() {
        let mut grid = PixelGrid::new(GridKind::Triple, 1, 1, 255).unwrap();
        assert!(matches!(
            grid.set(0, 0, PixelValue::Scalar(1)),
            Err(GridError::KindMismatch { .. })
        ));
    }

    #[test]
    fn test_get_clamped_uses_nearest_edge_per_axis() {
        let samples = (0..12).collect::<Vec<Sample>>();
        let grid = PixelGrid::from_samples(GridKind::Scalar, 4, 3, 255, samples).unwrap();
        assert_eq!(grid.get_clamped(-1, -1), &[0]);
        assert_eq!(grid.get_clamped(4, 0), &[3]);
        assert_eq!(grid.get_clamped(-5, 2), &[8]);
        assert_eq!(grid.get_clamped(9, 9), &[11]);
        assert_eq!(grid.get_clamped(1, 7), &[9]);
    }

    #[test]
    fn test_clone_is_deep() {
        let original = PixelGrid::filled(GridKind::Scalar, 2, 2, 255, 7)
            .unwrap()
            .with_comments(vec!["made by hand".to_string()]);
        let mut copy = original.clone();
        assert_eq!(copy, original);

        copy.set(0, 0, PixelValue::Scalar(1)).unwrap();
        assert_eq!(original.get(0, 0), Some(PixelValue::Scalar(7)));
        assert_eq!(copy.comments(), original.comments());
    }

    #[test]
    fn test_set_row_checks_length() {
        let mut grid = PixelGrid::new(GridKind::Triple, 2, 2, 255).unwrap();
        grid.set_row(1, &[1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(grid.row(1), Some(&[1, 2, 3, 4, 5, 6][..]));
        assert!(grid.set_row(0, &[1, 2, 3]).is_err());
        assert!(grid.set_row(2, &[0; 6]).is_err());
    }

    #[test]
    fn test_ensure_same_shape() {
        let a = PixelGrid::new(GridKind::Scalar, 2, 2, 255).unwrap();
        let b = PixelGrid::new(GridKind::Triple, 2, 2, 255).unwrap();
        let c = PixelGrid::new(GridKind::Scalar, 3, 2, 255).unwrap();
        assert!(a.ensure_same_shape(&a.clone()).is_ok());
        assert!(matches!(a.ensure_same_shape(&b), Err(GridError::KindMismatch { .. })));
        assert!(matches!(a.ensure_same_shape(&c), Err(GridError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_split_regions_mut_writes_disjoint_views() {
        let mut grid = PixelGrid::new(GridKind::Scalar, 4, 4, 255).unwrap();
        let regions = crate::partition::quadrants(4, 4);
        {
            let mut views = grid.split_regions_mut(&regions).unwrap();
            for (id, view) in views.iter_mut().enumerate() {
                let region = view.region();
                for y in region.start_y..region.end_y {
                    for x in region.start_x..region.end_x {
                        view.write(x, y, &[id as Sample + 1]);
                    }
                }
            }
        }
        assert_eq!(
            grid.samples(),
            &[1, 1, 2, 2, 1, 1, 2, 2, 3, 3, 4, 4, 3, 3, 4, 4]
        );
    }

    #[test]
    fn test_split_regions_mut_rejects_overlap_and_out_of_bounds() {
        let mut grid = PixelGrid::new(GridKind::Scalar, 4, 4, 255).unwrap();
        let overlapping = [Region::new(0, 3, 0, 2), Region::new(2, 4, 1, 4)];
        assert!(matches!(
            grid.split_regions_mut(&overlapping),
            Err(GridError::OverlappingRegions { .. })
        ));
        let outside = [Region::new(0, 5, 0, 1)];
        assert!(matches!(
            grid.split_regions_mut(&outside),
            Err(GridError::RegionOutOfBounds { .. })
        ));
    }
}
