//! Conversion between `PixelGrid` and the `image` crate, for rasters that are
//! not plain-text netpbm.

use std::path::Path;

use conv_kernel::{GridKind, PixelGrid, Sample};
use image::{ColorType, DynamicImage};

use crate::error::{FilterError, FilterResult};

/// Decode any format the `image` crate understands. Color images become
/// triple grids, everything else scalar, both with `max_value = 255`.
pub fn load(path: &Path) -> FilterResult<PixelGrid> {
    let origin = path.display().to_string();
    let decoded = image::open(path).map_err(|e| FilterError::load_with_source(&origin, e))?;
    from_dynamic(&decoded).map_err(|e| FilterError::load(origin, e.to_string()))
}

pub fn from_dynamic(image: &DynamicImage) -> FilterResult<PixelGrid> {
    let (kind, samples): (GridKind, Vec<Sample>) = if image.color().has_color() {
        let rgb = image.to_rgb8();
        (GridKind::Triple, rgb.into_raw().into_iter().map(Sample::from).collect())
    } else {
        let luma = image.to_luma8();
        (GridKind::Scalar, luma.into_raw().into_iter().map(Sample::from).collect())
    };
    Ok(PixelGrid::from_samples(
        kind,
        image.width(),
        image.height(),
        255,
        samples,
    )?)
}

/// Encode with the format implied by the extension. Grids with a max value
/// other than 255 are rescaled to 8 bits on the way out.
pub fn save(grid: &PixelGrid, path: &Path) -> FilterResult<()> {
    let origin = path.display().to_string();
    let color = match grid.kind() {
        GridKind::Scalar => ColorType::L8,
        GridKind::Triple => ColorType::Rgb8,
    };
    let bytes = to_u8_samples(grid);
    image::save_buffer(path, &bytes, grid.width(), grid.height(), color)
        .map_err(|e| FilterError::save_with_source(origin, e))
}

/// Samples rescaled to `0..=255`, rounding to nearest.
pub fn to_u8_samples(grid: &PixelGrid) -> Vec<u8> {
    let max = u32::from(grid.max_value());
    grid.samples()
        .iter()
        .map(|&v| {
            if max == 255 {
                v as u8
            } else {
                ((u32::from(v) * 255 + max / 2) / max) as u8
            }
        })
        .collect()
}
