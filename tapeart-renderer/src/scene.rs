//! Flattening of the cell hierarchy into per-layer drawables.
//!
//! The layout itself is never modified; instances are expanded into world
//! coordinates for display only.

use std::collections::{BTreeMap, HashMap, HashSet};

use tapeart_core::{BBox, CellId, GeomPrimitive, LayerSpec, LayoutDatabase, Point};

/// Affine matrix `[a, b, c, d, tx, ty]`, see `Transform::to_matrix`.
pub type Matrix = [f64; 6];

pub const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// `outer ∘ inner`: apply `inner` first.
pub fn compose(outer: &Matrix, inner: &Matrix) -> Matrix {
    let [a, b, c, d, tx, ty] = *outer;
    let [ia, ib, ic, id, itx, ity] = *inner;
    [
        a * ia + b * ic,
        a * ib + b * id,
        c * ia + d * ic,
        c * ib + d * id,
        a * itx + b * ity + tx,
        c * itx + d * ity + ty,
    ]
}

pub fn apply(m: &Matrix, p: &Point) -> [f64; 2] {
    let (x, y) = (p.x as f64, p.y as f64);
    [m[0] * x + m[1] * y + m[4], m[2] * x + m[3] * y + m[5]]
}

/// Shapes of one layer in world coordinates (database units).
#[derive(Debug, Clone, Default)]
pub struct LayerShapes {
    pub polygons: Vec<Vec<[f64; 2]>>,
    /// Text origins.
    pub texts: Vec<[f64; 2]>,
}

/// A flattened view of one or more top cells.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub layers: BTreeMap<LayerSpec, LayerShapes>,
    /// Outlines of instances below the expansion depth.
    pub frames: Vec<[[f64; 2]; 4]>,
    /// Bounding box of the top cells including their hierarchy.
    pub bbox: Option<BBox>,
}

impl Scene {
    /// Flatten `tops` down to `max_depth` instance levels (unlimited if
    /// `None`). Level 0 is a top cell's own geometry.
    pub fn build(db: &LayoutDatabase, tops: &[CellId], max_depth: Option<usize>) -> Self {
        let mut flattener = Flattener {
            db,
            max_depth,
            scene: Scene {
                bbox: tops
                    .iter()
                    .filter_map(|top| db.cell_bbox(top))
                    .fold(None, BBox::merge),
                ..Default::default()
            },
            bboxes: HashMap::new(),
            stack: HashSet::new(),
        };
        for top in tops {
            flattener.visit(top, &IDENTITY, 0);
        }
        let scene = flattener.scene;
        log::debug!(
            "Flattened {} layers and {} cell frames",
            scene.layers.len(),
            scene.frames.len()
        );
        scene
    }

    pub fn polygon_count(&self) -> usize {
        self.layers.values().map(|l| l.polygons.len()).sum()
    }
}

struct Flattener<'a> {
    db: &'a LayoutDatabase,
    max_depth: Option<usize>,
    scene: Scene,
    bboxes: HashMap<CellId, Option<BBox>>,
    stack: HashSet<CellId>,
}

impl Flattener<'_> {
    fn visit(&mut self, id: &CellId, m: &Matrix, depth: usize) {
        let db = self.db;
        let Some(cell) = db.get_cell(id) else {
            return;
        };
        if !self.stack.insert(*id) {
            log::warn!("Skipping recursive reference to '{}'", cell.name);
            return;
        }

        for geom in &cell.geometries {
            let shapes = self.scene.layers.entry(geom.layer()).or_default();
            match geom {
                GeomPrimitive::Polygon(p) => {
                    shapes
                        .polygons
                        .push(p.vertices.iter().map(|v| apply(m, v)).collect());
                }
                GeomPrimitive::Path(p) => {
                    for poly in p.to_polygons() {
                        shapes
                            .polygons
                            .push(poly.vertices.iter().map(|v| apply(m, v)).collect());
                    }
                }
                GeomPrimitive::Text(t) => shapes.texts.push(apply(m, &t.position)),
            }
        }

        let expand = self.max_depth.map_or(true, |max| depth < max);
        for inst in &cell.instances {
            for placement in inst.placements() {
                let child = compose(m, &placement.to_matrix());
                if expand {
                    self.visit(&inst.cell_id, &child, depth + 1);
                } else {
                    self.push_frame(&inst.cell_id, &child);
                }
            }
        }

        self.stack.remove(id);
    }

    fn push_frame(&mut self, id: &CellId, m: &Matrix) {
        let db = self.db;
        let bbox = *self.bboxes.entry(*id).or_insert_with(|| db.cell_bbox(id));
        if let Some(bbox) = bbox {
            self.scene.frames.push(bbox.corners().map(|c| apply(m, &c)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tapeart_core::{Cell, CellInstance, Polygon, Transform};

    const M1: LayerSpec = LayerSpec::new(8, 0);

    fn hierarchy() -> (LayoutDatabase, CellId) {
        let mut db = LayoutDatabase::new("lib");
        let mut leaf = Cell::new("leaf");
        leaf.add_geometry(GeomPrimitive::Polygon(Polygon::rect(M1, 0, 0, 10, 10)));
        let leaf_id = db.add_cell(leaf).unwrap();

        let mut mid = Cell::new("mid");
        mid.add_instance(CellInstance::new(leaf_id, "leaf", Transform::translate(100, 0)));
        let mid_id = db.add_cell(mid).unwrap();

        let mut top = Cell::new("top");
        top.add_instance(CellInstance::new(
            mid_id,
            "mid",
            Transform {
                rotation: 90.0,
                ..Transform::translate(0, 1000)
            },
        ));
        let top_id = db.add_cell(top).unwrap();
        (db, top_id)
    }

    #[test]
    fn test_compose_order() {
        let rotate = Transform {
            rotation: 90.0,
            ..Default::default()
        }
        .to_matrix();
        let shift = Transform::translate(5, 0).to_matrix();
        // Shift first, then rotate: (0,0) -> (5,0) -> (0,5).
        let m = compose(&rotate, &shift);
        let p = apply(&m, &Point::new(0, 0));
        assert!((p[0] - 0.0).abs() < 1e-9 && (p[1] - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_full_expansion() {
        let (db, top) = hierarchy();
        let scene = Scene::build(&db, &[top], None);
        let polys = &scene.layers[&M1].polygons;
        assert_eq!(polys.len(), 1);
        // leaf (0,0) -> mid (100,0) -> rotated (0,100) -> shifted (0,1100).
        let first = polys[0][0];
        assert!((first[0] - 0.0).abs() < 1e-9);
        assert!((first[1] - 1100.0).abs() < 1e-9);
        assert!(scene.frames.is_empty());
        assert_eq!(scene.bbox, db.cell_bbox(&top));
    }

    #[test]
    fn test_depth_limit_draws_frames() {
        let (db, top) = hierarchy();
        let scene = Scene::build(&db, &[top], Some(1));
        assert_eq!(scene.polygon_count(), 0);
        assert_eq!(scene.frames.len(), 1);

        let scene = Scene::build(&db, &[top], Some(0));
        assert_eq!(scene.frames.len(), 1);
    }

    #[test]
    fn test_several_tops_share_one_bbox() {
        let mut db = LayoutDatabase::new("lib");
        let mut a = Cell::new("a");
        a.add_geometry(GeomPrimitive::Polygon(Polygon::rect(M1, 0, 0, 10, 10)));
        let a = db.add_cell(a).unwrap();
        let mut b = Cell::new("b");
        b.add_geometry(GeomPrimitive::Polygon(Polygon::rect(M1, 90, 40, 100, 50)));
        let b = db.add_cell(b).unwrap();

        let scene = Scene::build(&db, &[a, b], None);
        assert_eq!(scene.polygon_count(), 2);
        let bbox = scene.bbox.unwrap();
        assert_eq!((bbox.min, bbox.max), (Point::new(0, 0), Point::new(100, 50)));
    }

    #[test]
    fn test_paths_become_polygons() {
        let mut db = LayoutDatabase::new("lib");
        let mut top = Cell::new("top");
        top.add_geometry(GeomPrimitive::Path(tapeart_core::Path::new(
            M1,
            vec![Point::new(0, 0), Point::new(100, 0), Point::new(100, 100)],
            10,
        )));
        let id = db.add_cell(top).unwrap();
        let scene = Scene::build(&db, &[id], None);
        assert_eq!(scene.layers[&M1].polygons.len(), 2);
    }
}
