use tapeart_core::BBox;

/// Fraction of the canvas used by a fitted bounding box.
const FIT_MARGIN: f64 = 0.95;

/// Maps layout coordinates (database units) to canvas pixels.
///
/// Screen y grows downwards, layout y upwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Center X in layout coordinates.
    pub center_x: f64,
    /// Center Y in layout coordinates.
    pub center_y: f64,
    /// Zoom level (pixels per database unit).
    pub zoom: f64,
    /// Canvas width in pixels.
    pub canvas_width: f64,
    /// Canvas height in pixels.
    pub canvas_height: f64,
}

impl Viewport {
    pub fn new(canvas_width: f64, canvas_height: f64) -> Self {
        Self {
            center_x: 0.0,
            center_y: 0.0,
            zoom: 1.0,
            canvas_width,
            canvas_height,
        }
    }

    /// Zoom to fit a bounding box, keeping its aspect ratio.
    pub fn fit_bbox(&mut self, bbox: &BBox) {
        let width = bbox.width() as f64;
        let height = bbox.height() as f64;

        self.center_x = (bbox.min.x as f64 + bbox.max.x as f64) / 2.0;
        self.center_y = (bbox.min.y as f64 + bbox.max.y as f64) / 2.0;

        let zoom_x = if width > 0.0 {
            self.canvas_width / width * FIT_MARGIN
        } else {
            f64::INFINITY
        };
        let zoom_y = if height > 0.0 {
            self.canvas_height / height * FIT_MARGIN
        } else {
            f64::INFINITY
        };
        let zoom = zoom_x.min(zoom_y);
        if zoom.is_finite() {
            self.zoom = zoom;
        }
    }

    /// Convert layout X coordinate to screen coordinate.
    pub fn layout_to_screen_x(&self, layout_x: f64) -> f64 {
        (layout_x - self.center_x) * self.zoom + self.canvas_width / 2.0
    }

    /// Convert layout Y coordinate to screen coordinate.
    pub fn layout_to_screen_y(&self, layout_y: f64) -> f64 {
        self.canvas_height / 2.0 - (layout_y - self.center_y) * self.zoom
    }

    pub fn layout_to_screen(&self, point: [f64; 2]) -> [f64; 2] {
        [
            self.layout_to_screen_x(point[0]),
            self.layout_to_screen_y(point[1]),
        ]
    }

    /// Get the visible bounding box in layout coordinates: (min_x, min_y, max_x, max_y).
    pub fn visible_bounds(&self) -> (f64, f64, f64, f64) {
        let half_w = self.canvas_width / (2.0 * self.zoom);
        let half_h = self.canvas_height / (2.0 * self.zoom);
        (
            self.center_x - half_w,
            self.center_y - half_h,
            self.center_x + half_w,
            self.center_y + half_h,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tapeart_core::Point;

    #[test]
    fn test_fit_bbox_centers_and_flips() {
        let mut vp = Viewport::new(200.0, 100.0);
        vp.fit_bbox(&BBox::new(Point::new(0, 0), Point::new(1000, 1000)));
        assert!((vp.zoom - 100.0 / 1000.0 * FIT_MARGIN).abs() < 1e-12);

        let [x, y] = vp.layout_to_screen([500.0, 500.0]);
        assert!((x - 100.0).abs() < 1e-9);
        assert!((y - 50.0).abs() < 1e-9);

        // Layout top edge is above the center on screen.
        assert!(vp.layout_to_screen_y(1000.0) < 50.0);
    }

    #[test]
    fn test_fit_degenerate_bbox() {
        let mut vp = Viewport::new(100.0, 100.0);
        vp.fit_bbox(&BBox::new(Point::new(10, 0), Point::new(10, 400)));
        assert!((vp.zoom - 100.0 / 400.0 * FIT_MARGIN).abs() < 1e-12);

        let mut point = Viewport::new(100.0, 100.0);
        point.fit_bbox(&BBox::new(Point::new(3, 3), Point::new(3, 3)));
        assert_eq!(point.zoom, 1.0);
        assert_eq!(point.center_x, 3.0);
    }

    #[test]
    fn test_visible_bounds() {
        let vp = Viewport::new(100.0, 50.0);
        let (x0, y0, x1, y1) = vp.visible_bounds();
        assert_eq!((x0, y0, x1, y1), (-50.0, -25.0, 50.0, 25.0));
    }
}
