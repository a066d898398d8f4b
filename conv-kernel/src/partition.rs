// SPDX-License-Identifier: MIT
//! Rectangular regions and the two partitioning schemes used by the parallel
//! strategies: fixed quadrants and horizontal row bands.

use std::fmt;

use crate::error::GridError;
use crate::grid::Sample;

/// Half-open rectangle `[start_x, end_x) x [start_y, end_y)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Region {
    pub start_x: u32,
    pub end_x: u32,
    pub start_y: u32,
    pub end_y: u32,
}

impl Region {
    pub const fn new(start_x: u32, end_x: u32, start_y: u32, end_y: u32) -> Self {
        Self {
            start_x,
            end_x,
            start_y,
            end_y,
        }
    }

    pub const fn full(width: u32, height: u32) -> Self {
        Self::new(0, width, 0, height)
    }

    pub fn width(&self) -> u32 {
        self.end_x.saturating_sub(self.start_x)
    }

    pub fn height(&self) -> u32 {
        self.end_y.saturating_sub(self.start_y)
    }

    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width()) * u64::from(self.height())
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.start_x && x < self.end_x && y >= self.start_y && y < self.end_y
    }

    pub fn covers_row(&self, y: u32) -> bool {
        y >= self.start_y && y < self.end_y
    }

    /// True when both regions share at least one pixel. Empty regions overlap nothing.
    pub fn overlaps(&self, other: &Region) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.start_x < other.end_x
            && other.start_x < self.end_x
            && self.start_y < other.end_y
            && other.start_y < self.end_y
    }

    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.start_x <= self.end_x
            && self.start_y <= self.end_y
            && self.end_x <= width
            && self.end_y <= height
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "X[{}-{}) Y[{}-{})",
            self.start_x, self.end_x, self.start_y, self.end_y
        )
    }
}

/// The four fixed quadrants, in worker-id order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Quadrant {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [
        Quadrant::TopLeft,
        Quadrant::TopRight,
        Quadrant::BottomLeft,
        Quadrant::BottomRight,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Quadrant::TopLeft => "Top-Left",
            Quadrant::TopRight => "Top-Right",
            Quadrant::BottomLeft => "Bottom-Left",
            Quadrant::BottomRight => "Bottom-Right",
        }
    }
}

impl fmt::Display for Quadrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Split a `width x height` grid at `(width / 2, height / 2)`.
///
/// Returned in [`Quadrant::ALL`] order. Odd dimensions put the extra column
/// and row in the right and bottom quadrants; a 1-pixel dimension leaves the
/// left or top quadrants empty.
pub fn quadrants(width: u32, height: u32) -> [Region; 4] {
    let mid_x = width / 2;
    let mid_y = height / 2;
    [
        Region::new(0, mid_x, 0, mid_y),
        Region::new(mid_x, width, 0, mid_y),
        Region::new(0, mid_x, mid_y, height),
        Region::new(mid_x, width, mid_y, height),
    ]
}

/// Rows given to every worker except the last.
pub fn rows_per_worker(height: u32, workers: usize) -> u32 {
    if workers == 0 {
        return 0;
    }
    height / u32::try_from(workers).unwrap_or(u32::MAX)
}

/// Full-width row band for `rank` out of `workers`.
///
/// Every worker gets `height / workers` rows; the last worker also takes the
/// remainder. With more workers than rows, the leading bands are empty and
/// the last worker processes the whole grid.
pub fn row_band(width: u32, height: u32, workers: usize, rank: usize) -> Result<Region, GridError> {
    if workers == 0 || rank >= workers {
        return Err(GridError::InvalidWorkerCount { workers, rank });
    }
    let per = rows_per_worker(height, workers);
    // rank < workers, and per * workers <= height, so this fits in u32.
    let start_y = per * rank as u32;
    let end_y = if rank + 1 == workers {
        height
    } else {
        start_y + per
    };
    Ok(Region::new(0, width, start_y, end_y))
}

/// All row bands for `workers`, in rank order.
pub fn row_bands(width: u32, height: u32, workers: usize) -> Result<Vec<Region>, GridError> {
    (0..workers.max(1))
        .map(|rank| row_band(width, height, workers, rank))
        .collect()
}

/// Exclusive mutable view over one region of a grid.
///
/// Produced by [`crate::PixelGrid::split_regions_mut`]. Coordinates passed to
/// [`RegionMut::write`] are absolute grid coordinates.
#[derive(Debug)]
pub struct RegionMut<'a> {
    region: Region,
    channels: usize,
    rows: Vec<&'a mut [Sample]>,
}

impl<'a> RegionMut<'a> {
    pub(crate) fn new(region: Region, channels: usize) -> Self {
        Self {
            region,
            channels,
            rows: Vec::with_capacity(region.height() as usize),
        }
    }

    pub(crate) fn push_row(&mut self, row: &'a mut [Sample]) {
        self.rows.push(row);
    }

    pub fn region(&self) -> Region {
        self.region
    }

    /// Write one pixel. Panics if `(x, y)` is outside the region.
    #[inline]
    pub fn write(&mut self, x: u32, y: u32, value: &[Sample]) {
        debug_assert!(self.region.contains(x, y));
        debug_assert_eq!(value.len(), self.channels);
        let row = &mut self.rows[(y - self.region.start_y) as usize];
        let start = (x - self.region.start_x) as usize * self.channels;
        row[start..start + self.channels].copy_from_slice(value);
    }

    /// Samples of one region row, `None` outside the region.
    pub fn row(&self, y: u32) -> Option<&[Sample]> {
        if !self.region.covers_row(y) {
            return None;
        }
        self.rows
            .get((y - self.region.start_y) as usize)
            .map(|row| &**row)
    }
}
