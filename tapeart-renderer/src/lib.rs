//! # tapeart Renderer
//!
//! Layer-styled raster snapshots of a layout: the top cells are flattened,
//! fitted to a fixed-size canvas and drawn layer by layer in the order of
//! the layer-property table.

pub mod patterns;
pub mod raster;
pub mod scene;
pub mod viewport;

use std::path::Path;

use image::{ImageFormat, RgbImage};
use thiserror::Error;

use tapeart_core::{CellId, Color, LayerStyleTable, LayoutDatabase, LayoutError};

pub use raster::Canvas;
pub use scene::Scene;
pub use viewport::Viewport;

use patterns::Stipples;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Canvas of {width}x{height} pixels is empty")]
    EmptyCanvas { width: u32, height: f64 },
    #[error(transparent)]
    Layout(#[from] LayoutError),
}

/// View decorations. All of them are on for an interactive view and off for
/// snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayOptions {
    pub grid_visible: bool,
    pub grid_ruler: bool,
    pub text_visible: bool,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            grid_visible: true,
            grid_ruler: true,
            text_visible: true,
        }
    }
}

impl DisplayOptions {
    /// Plain layout snapshot: no grid, no ruler, no text.
    pub fn snapshot() -> Self {
        Self {
            grid_visible: false,
            grid_ruler: false,
            text_visible: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    pub width: u32,
    /// Logical canvas height. The pixel buffer uses its integer part.
    pub height: f64,
    pub background: Color,
    pub display: DisplayOptions,
    /// Instance levels to expand; deeper cells are drawn as frames.
    pub max_depth: Option<usize>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self::with_aspect_ratio(4096, 1.2)
    }
}

impl RenderSettings {
    pub fn with_aspect_ratio(width: u32, aspect_ratio: f64) -> Self {
        Self {
            width,
            height: width as f64 / aspect_ratio,
            background: Color::WHITE,
            display: DisplayOptions::snapshot(),
            max_depth: None,
        }
    }

    pub fn pixel_height(&self) -> u32 {
        if self.height.is_finite() && self.height > 0.0 {
            self.height.trunc().min(u32::MAX as f64) as u32
        } else {
            0
        }
    }
}

/// Render the top cells of `db` with `styles`. A library with several top
/// cells is drawn whole, fitted to their common bounding box.
///
/// Only layers present in the table and visible are drawn, in
/// [`LayerStyleTable::drawing_order`].
pub fn render(
    db: &LayoutDatabase,
    styles: &LayerStyleTable,
    settings: &RenderSettings,
) -> Result<RgbImage, RenderError> {
    let (width, height) = (settings.width, settings.pixel_height());
    if width == 0 || height == 0 {
        return Err(RenderError::EmptyCanvas {
            width,
            height: settings.height,
        });
    }

    let tops = db.top_cells();
    if tops.is_empty() {
        return Err(LayoutError::NoTopCell.into());
    }
    let names: Vec<&str> = tops.iter().map(|c| c.name.as_str()).collect();
    if tops.len() > 1 {
        log::warn!("{} top cells, rendering all of them: {}", tops.len(), names.join(", "));
    }
    let ids: Vec<CellId> = tops.iter().map(|c| c.id).collect();
    let scene = Scene::build(db, &ids, settings.max_depth);
    log::info!(
        "Rendering '{}' ({} polygons) at {}x{}",
        names.join(", "),
        scene.polygon_count(),
        width,
        height
    );

    let mut viewport = Viewport::new(width as f64, settings.height);
    match &scene.bbox {
        Some(bbox) => viewport.fit_bbox(bbox),
        None => log::warn!("Layout '{}' is empty", names.join(", ")),
    }

    let mut canvas = Canvas::new(width, height, settings.background);
    let foreground = raster::contrast_color(settings.background);
    if settings.display.grid_visible {
        canvas.draw_grid(&viewport, foreground);
    }

    for spec in scene.layers.keys().filter(|s| !styles.contains(s)) {
        log::debug!("Layer {} has no style, not drawn", spec);
    }

    let stipples = Stipples::new(styles);
    for style in styles.drawing_order() {
        if !style.visible {
            log::debug!("Layer {} hidden", style.source);
            continue;
        }
        let Some(shapes) = scene.layers.get(&style.source) else {
            continue;
        };
        let dither = stipples.dither(style.dither_pattern);
        let line = stipples.line_style(style.line_style);
        let fill = !patterns::is_hollow(&dither);

        for polygon in &shapes.polygons {
            let screen: Vec<[f64; 2]> = polygon.iter().map(|p| viewport.layout_to_screen(*p)).collect();
            if fill {
                canvas.fill_polygon(&screen, style.fill_color, &dither, style.transparent);
            }
            canvas.stroke_polygon(&screen, style.frame_color, style.width, &line, style.transparent);
        }
        if settings.display.text_visible {
            for origin in &shapes.texts {
                canvas.draw_marker(viewport.layout_to_screen(*origin), style.frame_color);
            }
        }
    }

    let solid = tapeart_core::layer::LineStyle::from_pattern("solid", "*");
    for frame in &scene.frames {
        let screen = frame.map(|p| viewport.layout_to_screen(p));
        canvas.stroke_polygon(&screen, foreground, 1, &solid, false);
    }

    if settings.display.grid_ruler {
        canvas.draw_ruler(&viewport, foreground);
    }

    Ok(canvas.into_image())
}

/// Write the image as PNG, whatever the file extension.
pub fn save_image(image: &RgbImage, path: &Path) -> Result<(), RenderError> {
    image.save_with_format(path, ImageFormat::Png)?;
    log::info!("Wrote {}x{} image to {}", image.width(), image.height(), path.display());
    Ok(())
}
