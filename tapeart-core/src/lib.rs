//! # tapeart Core
//!
//! Layout database with hierarchical cell management, integer geometry in
//! database units, placement transforms, and technology layer styles with
//! the override policy used for layout snapshots.

pub mod geometry;
pub mod cell;
pub mod database;
pub mod error;
pub mod layer;

pub use database::{LayoutDatabase, Units};
pub use cell::{Cell, CellId, CellInstance, Transform};
pub use error::LayoutError;
pub use layer::{
    Color, LayerOverridePolicy, LayerSpec, LayerStyle, LayerStyleTable, OverrideReport,
    PatternIndex,
};
pub use geometry::{
    BBox, Coord, ElementInfo, GeomPrimitive, Path, Point, Polygon, Property, Text,
};
