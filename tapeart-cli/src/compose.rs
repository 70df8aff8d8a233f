//! Logo insertion pipeline.

use uuid::Uuid;

use tapeart_core::{LayoutDatabase, LayoutError, Transform};
use tapeart_io::{read_gds, write_gds};

use crate::config::ComposeConfig;
use crate::Error;

/// Merge `logo` into `base` and place `cell` in the base's top cell at
/// `offset` (user units of `base`, rotation R0).
///
/// The top cell is determined before the merge, so the logo library's own
/// top cells never compete with it. Returns the new instance id.
pub fn insert_logo(
    base: &mut LayoutDatabase,
    logo: LayoutDatabase,
    cell: &str,
    offset: (f64, f64),
) -> Result<Uuid, LayoutError> {
    let top = base.top_cell()?.id;
    base.merge(logo)?;
    let logo_id = base.cell_id(cell)?;

    let transform = Transform::translate(base.units.to_dbu(offset.0), base.units.to_dbu(offset.1));
    base.insert_instance(&top, &logo_id, transform)
}

/// Read, compose and write according to `config`.
pub fn run(config: &ComposeConfig) -> Result<(), Error> {
    let mut base = read_gds(&config.input)?;
    let logo = read_gds(&config.logo)?;
    insert_logo(&mut base, logo, &config.logo_cell, config.offset)?;
    write_gds(&base, &config.output)?;
    log::info!(
        "Inserted '{}' at ({}, {}) into {}",
        config.logo_cell,
        config.offset.0,
        config.offset.1,
        config.output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tapeart_core::{
        Cell, CellInstance, GeomPrimitive, LayerSpec, Point, Polygon, Property, Text, Units,
    };

    const M1: LayerSpec = LayerSpec::new(8, 0);

    fn base() -> LayoutDatabase {
        let mut db = LayoutDatabase::new("chip");
        let mut block = Cell::new("block");
        block.add_geometry(GeomPrimitive::Polygon(Polygon::rect(M1, 0, 0, 500, 500)));
        let block_id = db.add_cell(block).unwrap();
        let mut top = Cell::new("chip_top");
        top.add_geometry(GeomPrimitive::Polygon(Polygon::rect(M1, 0, 0, 900_000, 900_000)));
        top.add_instance(CellInstance::new(block_id, "block", Transform::translate(10, 10)));
        db.add_cell(top).unwrap();
        db
    }

    fn logo(units: Units) -> LayoutDatabase {
        let mut db = LayoutDatabase::new("logo");
        db.units = units;
        let mut cell = Cell::new("fazyrv_small_logo");
        cell.add_geometry(GeomPrimitive::Polygon(Polygon::rect(M1, 5, 7, 100, 100)));
        db.add_cell(cell).unwrap();
        db
    }

    #[test]
    fn test_insert_is_additive() {
        let mut db = base();
        let before: Vec<Cell> = db.all_cells().cloned().collect();
        insert_logo(&mut db, logo(Units::default()), "fazyrv_small_logo", (412.8, 15.0)).unwrap();

        for old in &before {
            let new = db.find_cell_by_name(&old.name).unwrap();
            assert_eq!(new.geometries, old.geometries);
            if old.name != "chip_top" {
                assert_eq!(new.instances, old.instances);
            }
        }
        let top = db.find_cell_by_name("chip_top").unwrap();
        assert_eq!(top.instances.len(), 2);
        assert_eq!(top.instances[0], before[1].instances[0]);
        assert_eq!(db.cell_count(), 3);
    }

    #[test]
    fn test_placement_offset_exact() {
        let mut db = base();
        insert_logo(&mut db, logo(Units::default()), "fazyrv_small_logo", (412.8, 15.0)).unwrap();
        let top = db.find_cell_by_name("chip_top").unwrap();
        let inst = top.instances.last().unwrap();
        assert!(inst.transform.is_r0());
        assert_eq!(inst.transform.offset, Point::new(412_800, 15_000));

        let logo_bbox = db.cell_bbox(&inst.cell_id).unwrap();
        let placed = inst.transform.apply_bbox(&logo_bbox);
        assert_eq!(placed.min, Point::new(412_805, 15_007));
    }

    #[test]
    fn test_logo_on_finer_grid_is_rescaled() {
        let mut db = base();
        let fine = Units {
            dbu_in_user_units: 0.0005,
            dbu_in_meters: 5e-10,
        };
        insert_logo(&mut db, logo(fine), "fazyrv_small_logo", (1.0, 2.0)).unwrap();
        let cell = db.find_cell_by_name("fazyrv_small_logo").unwrap();
        assert_eq!(cell.local_bbox().unwrap().max, Point::new(50, 50));
        let inst = db.find_cell_by_name("chip_top").unwrap().instances.last().unwrap().clone();
        assert_eq!(inst.transform.offset, Point::new(1000, 2000));
    }

    #[test]
    fn test_missing_logo_cell() {
        let mut db = base();
        let err = insert_logo(&mut db, logo(Units::default()), "no_such_logo", (0.0, 0.0));
        assert_eq!(err, Err(LayoutError::CellNotFound("no_such_logo".into())));
    }

    #[test]
    fn test_name_collision_rejected() {
        let mut db = base();
        let mut clash = LayoutDatabase::new("logo");
        clash.add_cell(Cell::new("block")).unwrap();
        assert_eq!(
            insert_logo(&mut db, clash, "block", (0.0, 0.0)),
            Err(LayoutError::DuplicateCell("block".into()))
        );
    }

    #[test]
    fn test_run_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("chip.gds");
        let logo_path = dir.path().join("logo.gds");
        let output = dir.path().join("out.gds");
        write_gds(&base(), &input).unwrap();
        write_gds(&logo(Units::default()), &logo_path).unwrap();

        run(&ComposeConfig::new(&input, &logo_path, &output)).unwrap();

        let out = read_gds(&output).unwrap();
        let top = out.top_cell().unwrap();
        assert_eq!(top.name, "chip_top");
        assert_eq!(top.instances.len(), 2);
        assert_eq!(
            top.instances[1].transform.offset,
            Point::new(412_800, 15_000)
        );
    }

    #[test]
    fn test_run_keeps_stream_attributes() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("chip.gds");
        let logo_path = dir.path().join("logo.gds");
        let output = dir.path().join("out.gds");

        let mut chip = base();
        let top_id = chip.cell_id("chip_top").unwrap();
        let top = chip.get_cell_mut(&top_id).unwrap();
        let mut net = Polygon::rect(M1, 0, 0, 40, 40);
        net.info.properties.push(Property::new(1, "net=VDD"));
        top.add_geometry(GeomPrimitive::Polygon(net));
        top.add_geometry(GeomPrimitive::Polygon(Polygon::new(
            M1,
            vec![Point::new(3, 3), Point::new(9, 3)],
        )));
        top.add_geometry(GeomPrimitive::Text(Text::new(
            LayerSpec::new(8, 25),
            "\u{a9}2025",
            Point::new(0, 0),
        )));
        top.instances[0].info.properties.push(Property::new(61, "I_block"));
        top.instances[0].info.elflags = Some(1);
        write_gds(&chip, &input).unwrap();
        write_gds(&logo(Units::default()), &logo_path).unwrap();

        run(&ComposeConfig::new(&input, &logo_path, &output)).unwrap();

        let before = read_gds(&input).unwrap();
        let after = read_gds(&output).unwrap();
        for old in before.all_cells() {
            let new = after.find_cell_by_name(&old.name).unwrap();
            assert_eq!(new.geometries, old.geometries, "cell {}", old.name);
            for (a, b) in old.instances.iter().zip(&new.instances) {
                assert_eq!(a.cell_name, b.cell_name);
                assert_eq!(a.transform, b.transform);
                assert_eq!(a.info, b.info);
            }
        }
        let top = after.find_cell_by_name("chip_top").unwrap();
        assert_eq!(top.instances.len(), 2);

        let bytes = std::fs::read(&output).unwrap();
        let contains = |needle: &[u8]| bytes.windows(needle.len()).any(|w| w == needle);
        assert!(contains(b"net=VDD"));
        assert!(contains(b"I_block"));
        assert!(contains(&[0xA9, b'2', b'0', b'2', b'5']));
    }
}
