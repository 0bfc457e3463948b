//! Rendering
//!
//! Scenes are rasterized once by [`Rasterizer`]; the terminal preview then
//! downsamples that bitmap into half-block cells.

pub mod halfblock;
pub mod raster;

use ratatui::text::Line;

pub use raster::{flatten, RasterError, Rasterizer};

use crate::scene::Scene;
use crate::terminal_capabilities::ColorSupport;

/// Factor that rasterizes `scene` at roughly twice the preview grid.
pub fn preview_factor(scene: &Scene, cols: u16, rows: u16) -> f32 {
    let fx = cols.max(1) as f32 / scene.width.max(1.0);
    let fy = (rows.max(1) as f32 * 2.0) / scene.height.max(1.0);
    (fx.min(fy) * 2.0).clamp(0.05, 4.0)
}

/// Rasterize `scene` and convert it for a `cols` x `rows` pane.
pub fn preview_lines(
    rasterizer: &Rasterizer,
    scene: &Scene,
    cols: u16,
    rows: u16,
    support: ColorSupport,
) -> Result<Vec<Line<'static>>, RasterError> {
    let bitmap = rasterizer.render(scene, preview_factor(scene, cols, rows))?;
    Ok(halfblock::to_lines(&bitmap, cols, rows, support))
}
