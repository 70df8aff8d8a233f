//! Software rasterizer over an RGB pixel buffer.
//!
//! Pixel `(x, y)` covers `[x, x+1) × [y, y+1)` in screen space and is sampled
//! at its center.

use image::{Rgb, RgbImage};

use tapeart_core::layer::{DitherPattern, LineStyle};
use tapeart_core::Color;

use crate::Viewport;

/// Minimum grid pitch on screen.
const GRID_MIN_PIXELS: f64 = 32.0;
/// Distance of the scale bar from the lower-left corner.
const RULER_MARGIN: f64 = 20.0;
const MARKER_SIZE: i64 = 3;

pub struct Canvas {
    image: RgbImage,
}

impl Canvas {
    pub fn new(width: u32, height: u32, background: Color) -> Self {
        Self {
            image: RgbImage::from_pixel(width, height, Rgb(background.to_rgb_array())),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    fn plot(&mut self, x: i64, y: i64, color: Color, blend: bool) {
        if x < 0 || y < 0 || x >= self.width() as i64 || y >= self.height() as i64 {
            return;
        }
        let pixel = self.image.get_pixel_mut(x as u32, y as u32);
        let rgb = color.to_rgb_array();
        if blend {
            for (dst, src) in pixel.0.iter_mut().zip(rgb) {
                *dst = ((*dst as u16 + src as u16) / 2) as u8;
            }
        } else {
            pixel.0 = rgb;
        }
    }

    /// Fill with the non-zero winding rule. Returns the number of pixels
    /// covered.
    ///
    /// Shapes thinner than a pixel that hit no pixel center still mark the
    /// pixel under their center, so small features do not vanish.
    pub fn fill_polygon(
        &mut self,
        points: &[[f64; 2]],
        color: Color,
        pattern: &DitherPattern,
        blend: bool,
    ) -> usize {
        if points.len() < 3 {
            return 0;
        }
        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for p in points {
            min_x = min_x.min(p[0]);
            max_x = max_x.max(p[0]);
            min_y = min_y.min(p[1]);
            max_y = max_y.max(p[1]);
        }

        let width = self.width() as f64;
        let y_start = (min_y - 0.5).ceil().max(0.0) as i64;
        let y_end = (max_y - 0.5).ceil().min(self.height() as f64) as i64;

        let mut covered = 0;
        let mut crossings: Vec<(f64, i32)> = Vec::new();
        for y in y_start..y_end {
            let yc = y as f64 + 0.5;
            crossings.clear();
            for (i, p0) in points.iter().enumerate() {
                let p1 = &points[(i + 1) % points.len()];
                let dir = if p0[1] <= yc && p1[1] > yc {
                    1
                } else if p1[1] <= yc && p0[1] > yc {
                    -1
                } else {
                    continue;
                };
                let t = (yc - p0[1]) / (p1[1] - p0[1]);
                crossings.push((p0[0] + t * (p1[0] - p0[0]), dir));
            }
            crossings.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut winding = 0;
            let mut span_start = 0.0;
            for &(x, dir) in &crossings {
                let before = winding;
                winding += dir;
                if before == 0 && winding != 0 {
                    span_start = x;
                } else if before != 0 && winding == 0 {
                    let x0 = (span_start - 0.5).ceil().max(0.0) as i64;
                    let x1 = (x - 0.5).ceil().min(width) as i64;
                    for px in x0..x1 {
                        if pattern.is_set(px as u32, y as u32) {
                            self.plot(px, y, color, blend);
                        }
                        covered += 1;
                    }
                }
            }
        }

        if covered == 0 && (max_x - min_x < 1.0 || max_y - min_y < 1.0) {
            let cx = ((min_x + max_x) / 2.0).floor() as i64;
            let cy = ((min_y + max_y) / 2.0).floor() as i64;
            self.plot(cx, cy, color, blend);
            covered = 1;
        }
        covered
    }

    /// Outline of a closed polygon. A width of 0 draws nothing.
    pub fn stroke_polygon(
        &mut self,
        points: &[[f64; 2]],
        color: Color,
        width: u32,
        style: &LineStyle,
        blend: bool,
    ) {
        if width == 0 || points.len() < 2 {
            return;
        }
        let mut step = 0;
        for (i, a) in points.iter().enumerate() {
            let b = &points[(i + 1) % points.len()];
            self.draw_line(*a, *b, color, width, style, &mut step, blend);
        }
    }

    /// DDA line from `a` (inclusive) to `b` (exclusive). `step` carries the
    /// line-style phase across connected segments.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_line(
        &mut self,
        a: [f64; 2],
        b: [f64; 2],
        color: Color,
        width: u32,
        style: &LineStyle,
        step: &mut u32,
        blend: bool,
    ) {
        let (dx, dy) = (b[0] - a[0], b[1] - a[1]);
        let steps = dx.abs().max(dy.abs()).round().max(1.0);
        if !steps.is_finite() || steps > 1e7 {
            log::debug!("Skipping degenerate line {:?} -> {:?}", a, b);
            return;
        }
        for i in 0..steps as u32 {
            if style.is_set(*step) {
                let x = (a[0] + dx * i as f64 / steps).floor() as i64;
                let y = (a[1] + dy * i as f64 / steps).floor() as i64;
                self.stamp(x, y, width, color, blend);
            }
            *step = step.wrapping_add(1);
        }
    }

    fn stamp(&mut self, x: i64, y: i64, width: u32, color: Color, blend: bool) {
        let w = width as i64;
        let lo = (w - 1) / 2;
        for oy in 0..w {
            for ox in 0..w {
                self.plot(x - lo + ox, y - lo + oy, color, blend);
            }
        }
    }

    /// Small cross at a text origin.
    pub fn draw_marker(&mut self, at: [f64; 2], color: Color) {
        let (x, y) = (at[0].floor() as i64, at[1].floor() as i64);
        for d in -MARKER_SIZE..=MARKER_SIZE {
            self.plot(x + d, y, color, false);
            self.plot(x, y + d, color, false);
        }
    }

    /// Dots at every grid intersection.
    pub fn draw_grid(&mut self, viewport: &Viewport, color: Color) {
        let pitch = nice_step(GRID_MIN_PIXELS / viewport.zoom);
        let (x0, y0, x1, y1) = viewport.visible_bounds();
        let (i0, i1) = ((x0 / pitch).ceil() as i64, (x1 / pitch).floor() as i64);
        let (j0, j1) = ((y0 / pitch).ceil() as i64, (y1 / pitch).floor() as i64);
        for i in i0..=i1 {
            for j in j0..=j1 {
                let [sx, sy] = viewport.layout_to_screen([i as f64 * pitch, j as f64 * pitch]);
                self.plot(sx.floor() as i64, sy.floor() as i64, color, false);
            }
        }
    }

    /// Scale bar in the lower-left corner, one 1-2-5 step of at least a fifth
    /// of the canvas width. Returns its length in database units.
    pub fn draw_ruler(&mut self, viewport: &Viewport, color: Color) -> f64 {
        let length = nice_step(viewport.canvas_width * 0.2 / viewport.zoom);
        let x0 = RULER_MARGIN;
        let x1 = x0 + length * viewport.zoom;
        let y = self.height() as f64 - RULER_MARGIN;
        let solid = LineStyle::from_pattern("solid", "*");
        let mut step = 0;
        self.draw_line([x0, y], [x1, y], color, 1, &solid, &mut step, false);
        for x in [x0, x1] {
            self.draw_line([x, y - 6.0], [x, y + 1.0], color, 1, &solid, &mut step, false);
        }
        length
    }
}

/// Smallest value of the form `{1, 2, 5}·10^k` not below `min`.
pub fn nice_step(min: f64) -> f64 {
    if !(min.is_finite() && min > 0.0) {
        return 1.0;
    }
    let base = 10f64.powi(min.log10().floor() as i32);
    [1.0, 2.0, 5.0, 10.0]
        .into_iter()
        .map(|m| m * base)
        .find(|v| *v >= min * (1.0 - 1e-12))
        .unwrap_or(10.0 * base)
}

/// Black or white, whichever stands out against `background`.
pub fn contrast_color(background: Color) -> Color {
    let luma = 0.299 * background.r() as f64
        + 0.587 * background.g() as f64
        + 0.114 * background.b() as f64;
    if luma > 128.0 {
        Color::BLACK
    } else {
        Color::WHITE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid() -> DitherPattern {
        DitherPattern::from_rows("solid", &["*"])
    }

    fn count(canvas: &Canvas, color: Color) -> usize {
        let rgb = color.to_rgb_array();
        canvas.image.pixels().filter(|p| p.0 == rgb).count()
    }

    #[test]
    fn test_fill_rectangle_by_pixel_centers() {
        let mut canvas = Canvas::new(10, 10, Color::WHITE);
        let red = Color::rgb(255, 0, 0);
        let rect = [[1.0, 1.0], [4.0, 1.0], [4.0, 3.0], [1.0, 3.0]];
        assert_eq!(canvas.fill_polygon(&rect, red, &solid(), false), 6);
        assert_eq!(count(&canvas, red), 6);
        assert_eq!(canvas.image.get_pixel(1, 1).0, [255, 0, 0]);
        assert_eq!(canvas.image.get_pixel(4, 1).0, [255, 255, 255]);
    }

    #[test]
    fn test_nonzero_winding_fills_overlap() {
        let mut canvas = Canvas::new(10, 10, Color::WHITE);
        // Two same-direction loops sharing the middle; winding 2 there.
        let poly = [
            [0.0, 0.0],
            [6.0, 0.0],
            [6.0, 2.0],
            [2.0, 2.0],
            [2.0, 0.0],
            [4.0, 0.0],
            [4.0, 2.0],
            [0.0, 2.0],
        ];
        canvas.fill_polygon(&poly, Color::BLACK, &solid(), false);
        assert_eq!(canvas.image.get_pixel(3, 1).0, [0, 0, 0]);
    }

    #[test]
    fn test_dither_and_blend() {
        let mut canvas = Canvas::new(4, 4, Color::WHITE);
        let checker = DitherPattern::from_rows("checker", &["*.", ".*"]);
        let full = [[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0]];
        canvas.fill_polygon(&full, Color::BLACK, &checker, true);
        assert_eq!(canvas.image.get_pixel(0, 0).0, [127, 127, 127]);
        assert_eq!(canvas.image.get_pixel(1, 0).0, [255, 255, 255]);
    }

    #[test]
    fn test_subpixel_shape_still_visible() {
        let mut canvas = Canvas::new(10, 10, Color::WHITE);
        let sliver = [[2.1, 2.1], [2.3, 2.1], [2.3, 2.3], [2.1, 2.3]];
        assert_eq!(canvas.fill_polygon(&sliver, Color::BLACK, &solid(), false), 1);
        assert_eq!(canvas.image.get_pixel(2, 2).0, [0, 0, 0]);
    }

    #[test]
    fn test_stroke_width_zero_draws_nothing() {
        let mut canvas = Canvas::new(10, 10, Color::WHITE);
        let rect = [[1.0, 1.0], [8.0, 1.0], [8.0, 8.0], [1.0, 8.0]];
        let line = LineStyle::from_pattern("solid", "*");
        canvas.stroke_polygon(&rect, Color::BLACK, 0, &line, false);
        assert_eq!(count(&canvas, Color::BLACK), 0);

        canvas.stroke_polygon(&rect, Color::BLACK, 1, &line, false);
        assert_eq!(count(&canvas, Color::BLACK), 28);
        assert_eq!(canvas.image.get_pixel(4, 4).0, [255, 255, 255]);
    }

    #[test]
    fn test_dotted_line_style() {
        let mut canvas = Canvas::new(10, 1, Color::WHITE);
        let dotted = LineStyle::from_pattern("dotted", "*.");
        let mut step = 0;
        canvas.draw_line([0.0, 0.0], [10.0, 0.0], Color::BLACK, 1, &dotted, &mut step, false);
        assert_eq!(step, 10);
        assert_eq!(count(&canvas, Color::BLACK), 5);
    }

    #[test]
    fn test_nice_step() {
        assert_eq!(nice_step(0.7), 1.0);
        assert_eq!(nice_step(1.5), 2.0);
        assert_eq!(nice_step(3.0), 5.0);
        assert_eq!(nice_step(7.0), 10.0);
        assert_eq!(nice_step(2000.0), 2000.0);
        assert_eq!(nice_step(0.0), 1.0);
    }

    #[test]
    fn test_contrast_color() {
        assert_eq!(contrast_color(Color::WHITE), Color::BLACK);
        assert_eq!(contrast_color(Color::BLACK), Color::WHITE);
    }
}
