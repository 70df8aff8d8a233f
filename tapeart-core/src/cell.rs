use uuid::Uuid;

use crate::geometry::{BBox, Coord, ElementInfo, GeomPrimitive, Point};

/// Unique cell identifier.
pub type CellId = Uuid;

/// A placement transform, applied in GDS order: mirror about the x axis,
/// magnify, rotate counter-clockwise, then translate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Translation offset in database units.
    pub offset: Point,
    /// Rotation in degrees.
    pub rotation: f64,
    /// Mirror about X axis.
    pub mirror_x: bool,
    /// Magnification (typically 1.0).
    pub magnification: f64,
    /// STRANS absolute magnification bit. Kept for the stream only.
    pub abs_mag: bool,
    /// STRANS absolute angle bit. Kept for the stream only.
    pub abs_angle: bool,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            offset: Point::new(0, 0),
            rotation: 0.0,
            mirror_x: false,
            magnification: 1.0,
            abs_mag: false,
            abs_angle: false,
        }
    }
}

impl Transform {
    /// Rotation class R0 with the given translation.
    pub fn translate(x: Coord, y: Coord) -> Self {
        Self {
            offset: Point::new(x, y),
            ..Default::default()
        }
    }

    /// No rotation, no mirroring, unit magnification.
    pub fn is_r0(&self) -> bool {
        self.rotation == 0.0 && !self.mirror_x && self.magnification == 1.0
    }

    /// Row-major affine matrix `[a, b, c, d, tx, ty]` with
    /// `x' = a·x + b·y + tx` and `y' = c·x + d·y + ty`.
    pub fn to_matrix(&self) -> [f64; 6] {
        let (cos, sin) = cos_sin_degrees(self.rotation);
        let m = if self.mirror_x { -1.0 } else { 1.0 };
        let mag = self.magnification;
        [
            mag * cos,
            -mag * sin * m,
            mag * sin,
            mag * cos * m,
            self.offset.x as f64,
            self.offset.y as f64,
        ]
    }

    pub fn apply(&self, point: &Point) -> Point {
        let [a, b, c, d, tx, ty] = self.to_matrix();
        let (x, y) = (point.x as f64, point.y as f64);
        Point::new(
            (a * x + b * y + tx).round() as Coord,
            (c * x + d * y + ty).round() as Coord,
        )
    }

    /// Bounding box of `bbox` after transformation.
    pub fn apply_bbox(&self, bbox: &BBox) -> BBox {
        let corners = bbox.corners().map(|p| self.apply(&p));
        // Four corners always yield a box.
        BBox::from_points(&corners).unwrap_or(*bbox)
    }
}

/// Cosine and sine with exact results for multiples of 90 degrees.
fn cos_sin_degrees(degrees: f64) -> (f64, f64) {
    let quarter = degrees / 90.0;
    if quarter.fract() == 0.0 {
        match (quarter as i64).rem_euclid(4) {
            0 => (1.0, 0.0),
            1 => (0.0, 1.0),
            2 => (-1.0, 0.0),
            _ => (0.0, -1.0),
        }
    } else {
        let rad = degrees.to_radians();
        (rad.cos(), rad.sin())
    }
}

/// Array parameters of a GDS AREF. The corners are the lattice points
/// `origin + columns·col_step` and `origin + rows·row_step`, in parent
/// coordinates, exactly as stored in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayRef {
    pub columns: u16,
    pub rows: u16,
    pub col_corner: Point,
    pub row_corner: Point,
}

/// A reference to a subcell placed within a parent cell.
#[derive(Debug, Clone, PartialEq)]
pub struct CellInstance {
    pub id: Uuid,
    pub cell_id: CellId,
    /// Name of the referenced cell as written to the stream.
    pub cell_name: String,
    pub transform: Transform,
    pub array: Option<ArrayRef>,
    pub info: ElementInfo,
}

impl CellInstance {
    pub fn new(cell_id: CellId, cell_name: &str, transform: Transform) -> Self {
        Self {
            id: Uuid::new_v4(),
            cell_id,
            cell_name: cell_name.to_string(),
            transform,
            array: None,
            info: ElementInfo::default(),
        }
    }

    pub fn with_array(mut self, array: ArrayRef) -> Self {
        self.array = Some(array);
        self
    }

    /// One transform per placed copy; arrays expand to every lattice point.
    pub fn placements(&self) -> Vec<Transform> {
        let Some(array) = self.array else {
            return vec![self.transform];
        };
        let origin = self.transform.offset;
        let cols = array.columns.max(1) as f64;
        let rows = array.rows.max(1) as f64;
        let col_step = (
            (array.col_corner.x - origin.x) as f64 / cols,
            (array.col_corner.y - origin.y) as f64 / cols,
        );
        let row_step = (
            (array.row_corner.x - origin.x) as f64 / rows,
            (array.row_corner.y - origin.y) as f64 / rows,
        );

        let mut placements = Vec::with_capacity(array.columns as usize * array.rows as usize);
        for r in 0..array.rows.max(1) {
            for c in 0..array.columns.max(1) {
                let dx = c as f64 * col_step.0 + r as f64 * row_step.0;
                let dy = c as f64 * col_step.1 + r as f64 * row_step.1;
                placements.push(Transform {
                    offset: origin.translate(dx.round() as Coord, dy.round() as Coord),
                    ..self.transform
                });
            }
        }
        placements
    }

    /// Rescale offsets onto another database grid.
    pub fn scale(&mut self, factor: f64) {
        self.transform.offset = self.transform.offset.scaled(factor);
        if let Some(array) = &mut self.array {
            array.col_corner = array.col_corner.scaled(factor);
            array.row_corner = array.row_corner.scaled(factor);
        }
    }
}

/// A layout cell containing geometric primitives and subcell references.
#[derive(Debug, Clone)]
pub struct Cell {
    pub id: CellId,
    pub name: String,
    pub geometries: Vec<GeomPrimitive>,
    pub instances: Vec<CellInstance>,
    /// BGNSTR modification/access timestamps.
    pub timestamps: Option<[i16; 12]>,
}

impl Cell {
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            geometries: Vec::new(),
            instances: Vec::new(),
            timestamps: None,
        }
    }

    pub fn add_geometry(&mut self, geom: GeomPrimitive) {
        self.geometries.push(geom);
    }

    pub fn add_instance(&mut self, instance: CellInstance) {
        self.instances.push(instance);
    }

    /// Compute the bounding box of all geometry in this cell (not including subcells).
    pub fn local_bbox(&self) -> Option<BBox> {
        self.geometries
            .iter()
            .filter_map(|g| g.bbox())
            .fold(None, BBox::merge)
    }

    pub fn geometry_count(&self) -> usize {
        self.geometries.len()
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Polygon;
    use crate::layer::LayerSpec;

    const ACTIV: LayerSpec = LayerSpec::new(1, 0);

    #[test]
    fn test_cell_add_geometry() {
        let mut cell = Cell::new("test_cell");
        cell.add_geometry(GeomPrimitive::Polygon(Polygon::rect(ACTIV, 0, 0, 100, 50)));
        assert_eq!(cell.geometry_count(), 1);
    }

    #[test]
    fn test_cell_bbox() {
        let mut cell = Cell::new("test_cell");
        cell.add_geometry(GeomPrimitive::Polygon(Polygon::rect(ACTIV, 0, 0, 100, 50)));
        cell.add_geometry(GeomPrimitive::Polygon(Polygon::rect(
            LayerSpec::new(8, 0),
            50,
            25,
            200,
            75,
        )));
        let bb = cell.local_bbox().unwrap();
        assert_eq!(bb.min, Point::new(0, 0));
        assert_eq!(bb.max, Point::new(200, 75));
    }

    #[test]
    fn test_transform_translate() {
        let t = Transform::translate(10, 20);
        assert!(t.is_r0());
        assert_eq!(t.apply(&Point::new(5, 5)), Point::new(15, 25));
    }

    #[test]
    fn test_transform_rotate_mirror() {
        let t = Transform {
            rotation: 90.0,
            ..Default::default()
        };
        assert_eq!(t.apply(&Point::new(10, 0)), Point::new(0, 10));

        let m = Transform {
            mirror_x: true,
            rotation: 90.0,
            ..Default::default()
        };
        // mirror first: (0, 10) -> (0, -10), then rotate: (10, 0)
        assert_eq!(m.apply(&Point::new(0, 10)), Point::new(10, 0));

        let bb = t.apply_bbox(&BBox::new(Point::new(0, 0), Point::new(10, 5)));
        assert_eq!(bb.min, Point::new(-5, 0));
        assert_eq!(bb.max, Point::new(0, 10));
    }

    #[test]
    fn test_array_placements() {
        let inst = CellInstance::new(Uuid::nil(), "via", Transform::translate(100, 0)).with_array(
            ArrayRef {
                columns: 3,
                rows: 2,
                col_corner: Point::new(130, 0),
                row_corner: Point::new(100, 40),
            },
        );
        let placements = inst.placements();
        assert_eq!(placements.len(), 6);
        assert_eq!(placements[0].offset, Point::new(100, 0));
        assert_eq!(placements[2].offset, Point::new(120, 0));
        assert_eq!(placements[5].offset, Point::new(120, 20));
    }
}
