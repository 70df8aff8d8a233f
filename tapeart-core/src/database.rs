use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::cell::{Cell, CellId, CellInstance, Transform};
use crate::error::LayoutError;
use crate::geometry::{BBox, Coord};

/// Database units of a library.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Units {
    /// Size of one database unit in user units (µm).
    pub dbu_in_user_units: f64,
    /// Size of one database unit in meters.
    pub dbu_in_meters: f64,
}

impl Default for Units {
    /// 1 nm database unit, 1 µm user unit.
    fn default() -> Self {
        Self {
            dbu_in_user_units: 0.001,
            dbu_in_meters: 1e-9,
        }
    }
}

impl Units {
    /// Convert a length in user units to the nearest database unit.
    pub fn to_dbu(&self, user: f64) -> Coord {
        (user / self.dbu_in_user_units).round() as Coord
    }
}

/// The central layout database: a namespace of uniquely named cells.
#[derive(Debug)]
pub struct LayoutDatabase {
    /// Library name.
    pub name: String,
    /// GDS-II stream version.
    pub version: i16,
    /// BGNLIB modification/access timestamps.
    pub timestamps: Option<[i16; 12]>,
    pub units: Units,
    /// All cells indexed by ID.
    cells: HashMap<CellId, Cell>,
    /// Cell ids in insertion order; streams are written in this order.
    order: Vec<CellId>,
}

impl LayoutDatabase {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            version: 600,
            timestamps: None,
            units: Units::default(),
            cells: HashMap::new(),
            order: Vec::new(),
        }
    }

    // ── Cell management ──────────────────────────────────────────────

    pub fn add_cell(&mut self, cell: Cell) -> Result<CellId, LayoutError> {
        if self.find_cell_by_name(&cell.name).is_some() {
            return Err(LayoutError::DuplicateCell(cell.name));
        }
        let id = cell.id;
        self.order.push(id);
        self.cells.insert(id, cell);
        Ok(id)
    }

    pub fn get_cell(&self, id: &CellId) -> Option<&Cell> {
        self.cells.get(id)
    }

    pub fn get_cell_mut(&mut self, id: &CellId) -> Option<&mut Cell> {
        self.cells.get_mut(id)
    }

    pub fn find_cell_by_name(&self, name: &str) -> Option<&Cell> {
        self.all_cells().find(|c| c.name == name)
    }

    /// Look up a cell by exact name.
    pub fn cell_id(&self, name: &str) -> Result<CellId, LayoutError> {
        self.find_cell_by_name(name)
            .map(|c| c.id)
            .ok_or_else(|| LayoutError::CellNotFound(name.to_string()))
    }

    pub fn cell_names(&self) -> Vec<&str> {
        self.all_cells().map(|c| c.name.as_str()).collect()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Cells in insertion order.
    pub fn all_cells(&self) -> impl Iterator<Item = &Cell> {
        self.order.iter().filter_map(|id| self.cells.get(id))
    }

    // ── Hierarchy ────────────────────────────────────────────────────

    /// Point every instance at the cell its name refers to.
    pub fn resolve_references(&mut self) -> Result<(), LayoutError> {
        let ids: HashMap<String, CellId> = self
            .cells
            .values()
            .map(|c| (c.name.clone(), c.id))
            .collect();

        for id in &self.order {
            let Some(cell) = self.cells.get_mut(id) else {
                continue;
            };
            for inst in &mut cell.instances {
                inst.cell_id = *ids
                    .get(&inst.cell_name)
                    .ok_or_else(|| LayoutError::UndefinedCell(inst.cell_name.clone()))?;
            }
        }
        Ok(())
    }

    /// Cells not instantiated by any other cell, in insertion order.
    pub fn top_cells(&self) -> Vec<&Cell> {
        let referenced: HashSet<CellId> = self
            .cells
            .values()
            .flat_map(|c| c.instances.iter().map(|i| i.cell_id))
            .collect();
        self.all_cells()
            .filter(|c| !referenced.contains(&c.id))
            .collect()
    }

    /// The single root of the hierarchy.
    pub fn top_cell(&self) -> Result<&Cell, LayoutError> {
        let tops = self.top_cells();
        match tops.as_slice() {
            [] => Err(LayoutError::NoTopCell),
            [top] => Ok(*top),
            many => Err(LayoutError::AmbiguousTopCell(
                many.iter().map(|c| c.name.clone()).collect(),
            )),
        }
    }

    /// Place `child` inside `parent`. Nothing else in the database changes.
    pub fn insert_instance(
        &mut self,
        parent: &CellId,
        child: &CellId,
        transform: Transform,
    ) -> Result<Uuid, LayoutError> {
        let child_name = self
            .get_cell(child)
            .map(|c| c.name.clone())
            .ok_or_else(|| LayoutError::CellNotFound(child.to_string()))?;
        let parent_cell = self
            .get_cell_mut(parent)
            .ok_or_else(|| LayoutError::CellNotFound(parent.to_string()))?;

        let instance = CellInstance::new(*child, &child_name, transform);
        let id = instance.id;
        log::debug!(
            "Placing '{}' in '{}' at ({}, {})",
            child_name,
            parent_cell.name,
            transform.offset.x,
            transform.offset.y
        );
        parent_cell.add_instance(instance);
        Ok(id)
    }

    /// Move every cell of `other` into this namespace.
    ///
    /// Coordinates are rescaled when the database units differ. Fails without
    /// modifying `self` if any cell name already exists.
    pub fn merge(&mut self, other: LayoutDatabase) -> Result<Vec<CellId>, LayoutError> {
        if let Some(clash) = other
            .all_cells()
            .find(|c| self.find_cell_by_name(&c.name).is_some())
        {
            return Err(LayoutError::DuplicateCell(clash.name.clone()));
        }

        let factor = other.units.dbu_in_meters / self.units.dbu_in_meters;
        let rescale = (factor - 1.0).abs() > 1e-12;
        if rescale {
            log::info!(
                "Rescaling '{}' by {} onto the {} m database grid",
                other.name,
                factor,
                self.units.dbu_in_meters
            );
        }

        let LayoutDatabase {
            mut cells, order, ..
        } = other;
        let mut merged = Vec::with_capacity(order.len());
        for id in order {
            let Some(mut cell) = cells.remove(&id) else {
                continue;
            };
            if rescale {
                cell.geometries.iter_mut().for_each(|g| g.scale(factor));
                cell.instances.iter_mut().for_each(|i| i.scale(factor));
            }
            merged.push(self.add_cell(cell)?);
        }
        Ok(merged)
    }

    /// Bounding box of a cell including all of its subcells.
    pub fn cell_bbox(&self, id: &CellId) -> Option<BBox> {
        let mut cache = HashMap::new();
        self.cell_bbox_cached(id, &mut cache, &mut HashSet::new())
    }

    fn cell_bbox_cached(
        &self,
        id: &CellId,
        cache: &mut HashMap<CellId, Option<BBox>>,
        visiting: &mut HashSet<CellId>,
    ) -> Option<BBox> {
        if let Some(bb) = cache.get(id) {
            return *bb;
        }
        if !visiting.insert(*id) {
            log::warn!("Recursive cell hierarchy at {}", id);
            return None;
        }
        let cell = self.get_cell(id)?;
        let mut bbox = cell.local_bbox();
        for inst in &cell.instances {
            if let Some(child) = self.cell_bbox_cached(&inst.cell_id, cache, visiting) {
                for t in inst.placements() {
                    bbox = BBox::merge(bbox, t.apply_bbox(&child));
                }
            }
        }
        visiting.remove(id);
        cache.insert(*id, bbox);
        bbox
    }
}
