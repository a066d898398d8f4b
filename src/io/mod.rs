//! # Raster I/O
//!
//! Loading, saving and inspecting rasters. Plain-text `P2`/`P3` files go
//! through [`netpbm`]; any other format is handed to the `image` crate
//! through [`dynamic`].
//!
//! The strategies never touch the filesystem except through these functions
//! (and the distributed [`FileSource`](crate::strategy::distributed::FileSource),
//! which calls [`load_grid`] once per rank).

pub mod dynamic;
pub mod netpbm;

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use conv_kernel::{GridKind, PixelGrid};
use tracing::debug;

use crate::error::{FilterError, FilterResult};

/// Load a raster, choosing the parser from the file's magic number.
pub fn load_grid(path: impl AsRef<Path>) -> FilterResult<PixelGrid> {
    let path = path.as_ref();
    let origin = path.display().to_string();
    let bytes = std::fs::read(path).map_err(|e| {
        FilterError::load_with_source(&origin, e).with_operation("load_grid")
    })?;

    let grid = if bytes.starts_with(b"P2") || bytes.starts_with(b"P3") {
        let text = std::str::from_utf8(&bytes)
            .map_err(|e| FilterError::load_with_source(&origin, e))?;
        netpbm::parse(text, &origin)?
    } else {
        dynamic::load(path)?
    };

    debug!(
        path = %origin,
        format = grid.kind().magic(),
        width = grid.width(),
        height = grid.height(),
        max_value = grid.max_value(),
        "Loaded raster"
    );
    Ok(grid)
}

/// Persist a raster. `.pgm`, `.ppm`, `.pnm` or no extension write plain text;
/// other extensions are encoded by the `image` crate.
pub fn save_grid(grid: &PixelGrid, path: impl AsRef<Path>) -> FilterResult<()> {
    let path = path.as_ref();
    let origin = path.display().to_string();

    if is_plain_text_path(path) {
        std::fs::write(path, netpbm::render(grid)).map_err(|e| {
            FilterError::save_with_source(&origin, e).with_operation("save_grid")
        })?;
    } else {
        dynamic::save(grid, path)?;
    }

    debug!(path = %origin, width = grid.width(), height = grid.height(), "Saved raster");
    Ok(())
}

/// Deep copy with identical dimensions, metadata and samples.
pub fn clone_grid(grid: &PixelGrid) -> PixelGrid {
    grid.clone()
}

/// `dir/name.ext` becomes `dir/name_<suffix>.ext`; without an extension the
/// suffix is simply appended.
pub fn suffixed_path(base: &Path, suffix: &str) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match base.extension() {
        Some(ext) => format!("{}_{}.{}", stem, suffix, ext.to_string_lossy()),
        None => format!("{}_{}", stem, suffix),
    };
    base.with_file_name(name)
}

/// Whether the extension agrees with the grid kind: `None` when the extension
/// is not a netpbm one.
pub fn extension_matches(path: &Path, kind: GridKind) -> Option<bool> {
    let ext = path.extension()?.to_string_lossy().to_ascii_lowercase();
    match ext.as_str() {
        "pgm" => Some(kind == GridKind::Scalar),
        "ppm" => Some(kind == GridKind::Triple),
        "pnm" => Some(true),
        _ => None,
    }
}

fn is_plain_text_path(path: &Path) -> bool {
    match path.extension() {
        None => true,
        Some(ext) => matches!(
            ext.to_string_lossy().to_ascii_lowercase().as_str(),
            "pgm" | "ppm" | "pnm"
        ),
    }
}

/// Top-left `n x n` samples, one entry per pixel (clipped to the grid).
pub fn corner_sample(grid: &PixelGrid, n: u32) -> Vec<Vec<Vec<u16>>> {
    (0..n.min(grid.height()))
        .map(|y| {
            (0..n.min(grid.width()))
                .filter_map(|x| grid.pixel(x, y).map(<[u16]>::to_vec))
                .collect()
        })
        .collect()
}

/// Human-readable summary used by `pconv info`.
pub fn describe(grid: &PixelGrid) -> String {
    let mut out = String::new();
    let format = match grid.kind() {
        GridKind::Scalar => "P2 (grayscale)",
        GridKind::Triple => "P3 (color)",
    };
    let _ = writeln!(out, "Format:     {}", format);
    let _ = writeln!(out, "Dimensions: {}x{}", grid.width(), grid.height());
    let _ = writeln!(out, "Max value:  {}", grid.max_value());
    let _ = writeln!(out, "Pixels:     {}", grid.pixel_count());
    for comment in grid.comments() {
        let _ = writeln!(out, "Comment:    {}", comment);
    }
    let _ = writeln!(out, "Top-left sample:");
    for row in corner_sample(grid, 3) {
        let cells: Vec<String> = row
            .iter()
            .map(|px| match px.as_slice() {
                [v] => format!("{:>5}", v),
                other => format!(
                    "({})",
                    other
                        .iter()
                        .map(u16::to_string)
                        .collect::<Vec<_>>()
                        .join(",")
                ),
            })
            .collect();
        let _ = writeln!(out, "  {}", cells.join(" "));
    }
    out
}
