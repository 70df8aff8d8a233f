use crate::layer::LayerSpec;

/// Integer coordinate in database units.
pub type Coord = i32;

/// A 2D point in layout coordinates (database units).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: Coord,
    pub y: Coord,
}

impl Point {
    pub fn new(x: Coord, y: Coord) -> Self {
        Self { x, y }
    }

    pub fn translate(&self, dx: Coord, dy: Coord) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Scale onto another database grid, rounding to the nearest unit.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            x: (self.x as f64 * factor).round() as Coord,
            y: (self.y as f64 * factor).round() as Coord,
        }
    }
}

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BBox {
    pub min: Point,
    pub max: Point,
}

impl BBox {
    pub fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    pub fn from_points(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let mut bbox = BBox::new(*first, *first);
        for p in &points[1..] {
            bbox.min.x = bbox.min.x.min(p.x);
            bbox.min.y = bbox.min.y.min(p.y);
            bbox.max.x = bbox.max.x.max(p.x);
            bbox.max.y = bbox.max.y.max(p.y);
        }
        Some(bbox)
    }

    pub fn width(&self) -> i64 {
        self.max.x as i64 - self.min.x as i64
    }

    pub fn height(&self) -> i64 {
        self.max.y as i64 - self.min.y as i64
    }

    pub fn corners(&self) -> [Point; 4] {
        [
            self.min,
            Point::new(self.max.x, self.min.y),
            self.max,
            Point::new(self.min.x, self.max.y),
        ]
    }

    pub fn union(&self, other: &BBox) -> Self {
        Self {
            min: Point::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Point::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    /// Union of an optional accumulator with another box.
    pub fn merge(acc: Option<BBox>, other: BBox) -> Option<BBox> {
        Some(match acc {
            Some(bb) => bb.union(&other),
            None => other,
        })
    }
}

/// A GDS property: attribute number and value (PROPATTR/PROPVALUE).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub attr: i16,
    pub value: String,
}

impl Property {
    pub fn new(attr: i16, value: &str) -> Self {
        Self {
            attr,
            value: value.to_string(),
        }
    }
}

/// Stream attributes of an element that carry no geometry. They are kept
/// so a library written back contains everything it was read with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementInfo {
    /// ELFLAGS bit array.
    pub elflags: Option<u16>,
    pub plex: Option<i32>,
    pub properties: Vec<Property>,
}

/// A closed polygon (GDS BOUNDARY or BOX). The closing vertex is not stored.
///
/// Vertices are kept as read, even when fewer than three remain.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub layer: LayerSpec,
    pub vertices: Vec<Point>,
    /// Stored as a BOX element; `layer.datatype` is then its BOXTYPE.
    pub is_box: bool,
    pub info: ElementInfo,
}

impl Polygon {
    pub fn new(layer: LayerSpec, vertices: Vec<Point>) -> Self {
        Self {
            layer,
            vertices,
            is_box: false,
            info: ElementInfo::default(),
        }
    }

    /// Axis-aligned rectangle from two opposite corners.
    pub fn rect(layer: LayerSpec, x1: Coord, y1: Coord, x2: Coord, y2: Coord) -> Self {
        let bbox = BBox::new(
            Point::new(x1.min(x2), y1.min(y2)),
            Point::new(x1.max(x2), y1.max(y2)),
        );
        Self::new(layer, bbox.corners().to_vec())
    }

    pub fn bbox(&self) -> Option<BBox> {
        BBox::from_points(&self.vertices)
    }
}

/// End style of a GDS path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathType {
    /// Square ends flush with the end points.
    #[default]
    Flush,
    /// Round ends.
    Round,
    /// Square ends extended by half the width.
    HalfWidth,
    /// Explicit begin/end extensions.
    Custom,
}

impl PathType {
    pub fn from_gds(value: i16) -> Self {
        match value {
            1 => PathType::Round,
            2 => PathType::HalfWidth,
            4 => PathType::Custom,
            _ => PathType::Flush,
        }
    }

    pub fn to_gds(self) -> i16 {
        match self {
            PathType::Flush => 0,
            PathType::Round => 1,
            PathType::HalfWidth => 2,
            PathType::Custom => 4,
        }
    }
}

/// A path (wire) defined by a centerline and width.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub layer: LayerSpec,
    pub points: Vec<Point>,
    /// Negative widths are absolute (not scaled by magnification) in GDS.
    pub width: Coord,
    pub path_type: PathType,
    pub begin_extension: Coord,
    pub end_extension: Coord,
    pub info: ElementInfo,
}

impl Path {
    pub fn new(layer: LayerSpec, points: Vec<Point>, width: Coord) -> Self {
        Self {
            layer,
            points,
            width,
            path_type: PathType::Flush,
            begin_extension: 0,
            end_extension: 0,
            info: ElementInfo::default(),
        }
    }

    /// Extensions at (begin, end) implied by the path type.
    pub fn extensions(&self) -> (Coord, Coord) {
        let half = self.width.abs() / 2;
        match self.path_type {
            PathType::Flush => (0, 0),
            PathType::Round | PathType::HalfWidth => (half, half),
            PathType::Custom => (self.begin_extension, self.end_extension),
        }
    }

    pub fn bbox(&self) -> Option<BBox> {
        let (begin, end) = self.extensions();
        let grow = (self.width.abs() / 2).max(begin).max(end);
        let bb = BBox::from_points(&self.points)?;
        Some(BBox::new(
            bb.min.translate(-grow, -grow),
            bb.max.translate(grow, grow),
        ))
    }

    /// Outline polygons of the path, one quadrilateral per segment.
    ///
    /// Round ends are approximated by half-width square extensions.
    pub fn to_polygons(&self) -> Vec<Polygon> {
        let half = self.width.abs() as f64 / 2.0;
        if self.points.len() < 2 || half == 0.0 {
            return Vec::new();
        }
        let (begin_ext, end_ext) = self.extensions();
        let last = self.points.len() - 2;
        let mut polygons = Vec::with_capacity(self.points.len() - 1);

        for (i, seg) in self.points.windows(2).enumerate() {
            let (ax, ay) = (seg[0].x as f64, seg[0].y as f64);
            let (bx, by) = (seg[1].x as f64, seg[1].y as f64);
            let len = ((bx - ax).powi(2) + (by - ay).powi(2)).sqrt();
            if len == 0.0 {
                continue;
            }
            let (ux, uy) = ((bx - ax) / len, (by - ay) / len);
            // Interior joints are extended by half the width so consecutive
            // segments overlap at the corner.
            let start = if i == 0 { begin_ext as f64 } else { half };
            let stop = if i == last { end_ext as f64 } else { half };
            let (sx, sy) = (ax - ux * start, ay - uy * start);
            let (ex, ey) = (bx + ux * stop, by + uy * stop);
            let (nx, ny) = (-uy * half, ux * half);
            let corner = |x: f64, y: f64| Point::new(x.round() as Coord, y.round() as Coord);
            polygons.push(Polygon::new(
                self.layer,
                vec![
                    corner(sx + nx, sy + ny),
                    corner(sx - nx, sy - ny),
                    corner(ex - nx, ey - ny),
                    corner(ex + nx, ey + ny),
                ],
            ));
        }
        polygons
    }
}

/// A text label. Carries no area; only its origin contributes to bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct Text {
    pub layer: LayerSpec,
    pub string: String,
    pub position: Point,
    pub presentation: Option<i16>,
    pub mirror_x: bool,
    pub rotation: f64,
    pub magnification: f64,
    /// STRANS absolute magnification and absolute angle bits.
    pub abs_mag: bool,
    pub abs_angle: bool,
    pub width: Option<Coord>,
    pub info: ElementInfo,
}

impl Text {
    pub fn new(layer: LayerSpec, string: &str, position: Point) -> Self {
        Self {
            layer,
            string: string.to_string(),
            position,
            presentation: None,
            mirror_x: false,
            rotation: 0.0,
            magnification: 1.0,
            abs_mag: false,
            abs_angle: false,
            width: None,
            info: ElementInfo::default(),
        }
    }
}

/// A geometric primitive in the layout.
#[derive(Debug, Clone, PartialEq)]
pub enum GeomPrimitive {
    Polygon(Polygon),
    Path(Path),
    Text(Text),
}

impl GeomPrimitive {
    pub fn bbox(&self) -> Option<BBox> {
        match self {
            GeomPrimitive::Polygon(p) => p.bbox(),
            GeomPrimitive::Path(p) => p.bbox(),
            GeomPrimitive::Text(t) => Some(BBox::new(t.position, t.position)),
        }
    }

    pub fn layer(&self) -> LayerSpec {
        match self {
            GeomPrimitive::Polygon(p) => p.layer,
            GeomPrimitive::Path(p) => p.layer,
            GeomPrimitive::Text(t) => t.layer,
        }
    }

    /// Rescale every coordinate onto another database grid.
    pub fn scale(&mut self, factor: f64) {
        let s = |v: Coord| (v as f64 * factor).round() as Coord;
        match self {
            GeomPrimitive::Polygon(p) => {
                for pt in &mut p.vertices {
                    *pt = pt.scaled(factor);
                }
            }
            GeomPrimitive::Path(p) => {
                for pt in &mut p.points {
                    *pt = pt.scaled(factor);
                }
                p.width = s(p.width);
                p.begin_extension = s(p.begin_extension);
                p.end_extension = s(p.end_extension);
            }
            GeomPrimitive::Text(t) => {
                t.position = t.position.scaled(factor);
                t.width = t.width.map(s);
            }
        }
    }
}
