//! Shared fixtures for the parallel-convolve integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use parallel_convolve::{GridKind, PixelGrid};

/// Deterministic, non-constant grid so every kernel produces distinct output.
pub fn pattern_grid(kind: GridKind, width: u32, height: u32, max_value: u16) -> PixelGrid {
    let len = width as usize * height as usize * kind.channels();
    let samples = (0..len)
        .map(|i| ((i * 73 + i / 7 * 19) % (max_value as usize + 1)) as u16)
        .collect();
    PixelGrid::from_samples(kind, width, height, max_value, samples)
        .expect("pattern grid should be valid")
}

/// Single bright pixel on a black background.
pub fn spot_grid(width: u32, height: u32, x: u32, y: u32) -> PixelGrid {
    let mut samples = vec![0u16; (width * height) as usize];
    samples[(y * width + x) as usize] = 255;
    PixelGrid::from_samples(GridKind::Scalar, width, height, 255, samples)
        .expect("spot grid should be valid")
}

/// Grid sizes that exercise odd splits, single rows and single columns.
pub const SHAPES: [(u32, u32); 6] = [(1, 1), (1, 7), (7, 1), (4, 4), (5, 3), (13, 9)];

/// Small 4x3 plain-text PGM with a comment line.
pub const SAMPLE_PGM: &str = "P2\n# tiny test image\n4 3\n255\n\
0 50 100 150\n\
200 250 30 60\n\
90 120 180 210\n";

/// 2x2 plain-text PPM.
pub const SAMPLE_PPM: &str = "P3\n2 2\n255\n\
255 0 0  0 255 0\n\
0 0 255  255 255 255\n";

pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("fixture should be writable");
    path
}
