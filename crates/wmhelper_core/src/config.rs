//! Startup configuration: data file locations, image bounds and tunables.
//!
//! # Invariants
//! - Image bounds are fixed for the process lifetime once the editor opens.
//! - The three data files always live side by side in one directory.

use std::path::{Path, PathBuf};

/// File name of the circle marker list.
pub const CIRCLES_FILE_NAME: &str = "circles.jsonl";
/// File name of the square marker list.
pub const SQUARES_FILE_NAME: &str = "squares.jsonl";
/// File name of the canonical edge list.
pub const CONNECTIONS_FILE_NAME: &str = "connections.jsonl";

/// Coordinate snap/nudge unit in image pixels.
pub const NUDGE_STEP: f64 = 0.5;
/// Quiescence delay before the deferred full-quality render fires.
pub const HQ_RENDER_DELAY_MS: u64 = 90;

/// Locations of the persisted marker and connection files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    pub circles: PathBuf,
    pub squares: PathBuf,
    pub connections: PathBuf,
}

impl StorePaths {
    /// Resolves the standard file names inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            circles: dir.join(CIRCLES_FILE_NAME),
            squares: dir.join(SQUARES_FILE_NAME),
            connections: dir.join(CONNECTIONS_FILE_NAME),
        }
    }
}

/// Pixel size of the map image markers are placed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageBounds {
    pub width: u32,
    pub height: u32,
}

impl ImageBounds {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// `0 <= x < width && 0 <= y < height`; NaN is never inside.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        (0.0..f64::from(self.width)).contains(&x) && (0.0..f64::from(self.height)).contains(&y)
    }

    /// Snaps a click position to the nudge grid and clamps it inside the image.
    pub fn snap_inside(&self, x: f64, y: f64) -> (f64, f64) {
        (
            clamp_snapped(x, self.width),
            clamp_snapped(y, self.height),
        )
    }
}

/// Everything `EditorService::open` needs besides the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorConfig {
    pub paths: StorePaths,
    pub bounds: ImageBounds,
}

impl EditorConfig {
    pub fn new(data_dir: impl AsRef<Path>, bounds: ImageBounds) -> Self {
        Self {
            paths: StorePaths::in_dir(data_dir),
            bounds,
        }
    }
}

/// Rounds to the nearest multiple of `NUDGE_STEP`.
pub fn snap_to_half(value: f64) -> f64 {
    (value / NUDGE_STEP).round() * NUDGE_STEP
}

/// Moves `value` by `delta`, keeping it in `[0, limit - NUDGE_STEP]` on the nudge grid.
pub fn nudge(value: f64, delta: f64, limit: u32) -> f64 {
    snap_to_half((value + delta).clamp(0.0, max_coordinate(limit)))
}

fn clamp_snapped(value: f64, limit: u32) -> f64 {
    snap_to_half(value).clamp(0.0, max_coordinate(limit))
}

fn max_coordinate(limit: u32) -> f64 {
    (f64::from(limit) - NUDGE_STEP).max(0.0)
}
