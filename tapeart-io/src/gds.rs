//! GDS-II binary stream reader and writer.
//!
//! GDS-II (Graphic Data System II) is the industry-standard binary format
//! used by semiconductor fabs. Coordinates are kept in integer database
//! units, so a library read and written again keeps every vertex in place.
//!
//! ## GDS-II Record Structure
//! Each record: [2-byte length][2-byte record type][payload]
//! Record types define the hierarchy: BGNLIB → BGNSTR → BOUNDARY/PATH/SREF → ENDSTR → ENDLIB

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;

use thiserror::Error;

use tapeart_core::cell::{ArrayRef, Cell, CellInstance, Transform};
use tapeart_core::database::{LayoutDatabase, Units};
use tapeart_core::geometry::{
    ElementInfo, GeomPrimitive, Path as LayoutPath, PathType, Point, Polygon, Property, Text,
};
use tapeart_core::{LayerSpec, LayoutError};

// ── GDS-II Record Types ──────────────────────────────────────────────

mod record_type {
    pub const HEADER: u16     = 0x0002;
    pub const BGNLIB: u16     = 0x0102;
    pub const LIBNAME: u16    = 0x0206;
    pub const UNITS: u16      = 0x0305;
    pub const ENDLIB: u16     = 0x0400;
    pub const BGNSTR: u16     = 0x0502;
    pub const STRNAME: u16    = 0x0606;
    pub const ENDSTR: u16     = 0x0700;
    pub const BOUNDARY: u16   = 0x0800;
    pub const PATH: u16       = 0x0900;
    pub const SREF: u16       = 0x0A00;
    pub const AREF: u16       = 0x0B00;
    pub const TEXT: u16       = 0x0C00;
    pub const LAYER: u16      = 0x0D02;
    pub const DATATYPE: u16   = 0x0E02;
    pub const WIDTH: u16      = 0x0F03;
    pub const XY: u16         = 0x1003;
    pub const ENDEL: u16      = 0x1100;
    pub const SNAME: u16      = 0x1206;
    pub const COLROW: u16     = 0x1302;
    pub const NODE: u16       = 0x1500;
    pub const TEXTTYPE: u16   = 0x1602;
    pub const PRESENTATION: u16 = 0x1701;
    pub const STRING: u16     = 0x1906;
    pub const STRANS: u16     = 0x1A01;
    pub const MAG: u16        = 0x1B05;
    pub const ANGLE: u16      = 0x1C05;
    pub const PATHTYPE: u16   = 0x2102;
    pub const ELFLAGS: u16    = 0x2601;
    pub const PROPATTR: u16   = 0x2B02;
    pub const PROPVALUE: u16  = 0x2C06;
    pub const BOX: u16        = 0x2D00;
    pub const BOXTYPE: u16    = 0x2E02;
    pub const PLEX: u16       = 0x2F03;
    pub const BGNEXTN: u16    = 0x3003;
    pub const ENDEXTN: u16    = 0x3103;
}

/// STRANS bits: reflection, absolute magnification, absolute angle.
const STRANS_REFLECT: u16 = 0x8000;
const STRANS_ABS_MAG: u16 = 0x0004;
const STRANS_ABS_ANGLE: u16 = 0x0002;

/// Timestamp written when the source carried none.
const DEFAULT_TIMESTAMP: [i16; 12] = [2000, 1, 1, 0, 0, 0, 2000, 1, 1, 0, 0, 0];

// ── Errors ────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum GdsError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid GDS-II record at offset {offset}: {message}")]
    InvalidRecord { offset: u64, message: String },

    #[error("Unexpected record type 0x{record_type:04X}, expected 0x{expected:04X}")]
    UnexpectedRecord { record_type: u16, expected: u16 },

    #[error("Invalid coordinate data in {0}")]
    InvalidCoordinates(&'static str),

    #[error("Record 0x{record_type:04X} too long for GDS-II ({len} bytes)")]
    RecordTooLong { record_type: u16, len: usize },

    #[error(transparent)]
    Layout(#[from] LayoutError),
}

// ── GDS-II Record ─────────────────────────────────────────────────────

#[derive(Debug)]
struct GdsRecord {
    record_type: u16,
    data: Vec<u8>,
}

impl GdsRecord {
    /// Parse payload as 16-bit integers.
    fn as_i16_vec(&self) -> Vec<i16> {
        self.data
            .chunks_exact(2)
            .map(|c| i16::from_be_bytes([c[0], c[1]]))
            .collect()
    }

    /// First 16-bit value, read as unsigned (layer and datatype numbers).
    fn first_u16(&self) -> u16 {
        self.as_i16_vec().first().map(|v| *v as u16).unwrap_or(0)
    }

    /// Parse payload as 32-bit integers.
    fn as_i32_vec(&self) -> Vec<i32> {
        self.data
            .chunks_exact(4)
            .map(|c| i32::from_be_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    /// Parse payload as XY point pairs.
    fn as_points(&self) -> Vec<Point> {
        self.as_i32_vec()
            .chunks_exact(2)
            .map(|pair| Point::new(pair[0], pair[1]))
            .collect()
    }

    /// Parse payload as a string, one char per byte (Latin-1).
    fn as_string(&self) -> String {
        let s: String = self.data.iter().map(|&b| b as char).collect();
        s.trim_end_matches('\0').to_string()
    }

    /// Parse payload as GDS-II 8-byte reals (excess-64 floating point).
    fn as_f64_vec(&self) -> Vec<f64> {
        self.data
            .chunks_exact(8)
            .map(|c| {
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(c);
                gds_real8_to_f64(&bytes)
            })
            .collect()
    }
}

/// Convert GDS-II excess-64 real format to IEEE 754 f64.
fn gds_real8_to_f64(bytes: &[u8; 8]) -> f64 {
    if bytes.iter().all(|&b| b == 0) {
        return 0.0;
    }

    let sign = if bytes[0] & 0x80 != 0 { -1.0 } else { 1.0 };
    let exponent = (bytes[0] & 0x7F) as i32 - 64;

    let mut mantissa: u64 = 0;
    for &b in &bytes[1..] {
        mantissa = (mantissa << 8) | (b as u64);
    }

    let mantissa_f = mantissa as f64 / (1u64 << 56) as f64;
    sign * mantissa_f * 16.0_f64.powi(exponent)
}

/// Convert IEEE 754 f64 to GDS-II excess-64 real format.
fn f64_to_gds_real8(value: f64) -> [u8; 8] {
    if value == 0.0 {
        return [0u8; 8];
    }

    let sign_bit: u8 = if value < 0.0 { 0x80 } else { 0x00 };
    let mut val = value.abs();

    // Normalise so that 1/16 <= mantissa < 1
    let mut exponent: i32 = 0;
    while val >= 1.0 && exponent < 63 {
        val /= 16.0;
        exponent += 1;
    }
    while val < 1.0 / 16.0 && exponent > -64 {
        val *= 16.0;
        exponent -= 1;
    }

    let mut mantissa = (val * (1u64 << 56) as f64).round() as u64;
    if mantissa >= 1u64 << 56 {
        mantissa >>= 4;
        exponent += 1;
    }

    let mut result = [0u8; 8];
    result[0] = sign_bit | ((exponent + 64) as u8 & 0x7F);
    result[1..].copy_from_slice(&mantissa.to_be_bytes()[1..]);
    result
}

/// Inverse of `GdsRecord::as_string`: chars up to U+00FF become one byte.
/// Anything above is written as UTF-8.
fn encode_string(s: &str) -> Vec<u8> {
    let mut data = Vec::with_capacity(s.len());
    for c in s.chars() {
        match u8::try_from(c) {
            Ok(b) => data.push(b),
            Err(_) => {
                let mut buf = [0u8; 4];
                data.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    data
}

/// Read a GDS-II file from disk.
pub fn read_gds<P: AsRef<Path>>(path: P) -> Result<LayoutDatabase, GdsError> {
    let path = path.as_ref();
    log::info!("Reading GDS-II stream {}", path.display());
    let file = File::open(path)?;
    GdsReader::new(BufReader::new(file)).read()
}

/// Write a layout database to a GDS-II file.
pub fn write_gds<P: AsRef<Path>>(db: &LayoutDatabase, path: P) -> Result<(), GdsError> {
    let path = path.as_ref();
    log::info!("Writing GDS-II stream {}", path.display());
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    GdsWriter::new(&mut writer).write(db)?;
    writer.flush()?;
    Ok(())
}

// ── GDS-II Reader ─────────────────────────────────────────────────────

pub struct GdsReader<R: Read + Seek> {
    reader: R,
}

impl<R: Read + Seek> GdsReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Read the entire GDS-II stream into a LayoutDatabase.
    ///
    /// Every instance is resolved against the cells of the stream.
    pub fn read(&mut self) -> Result<LayoutDatabase, GdsError> {
        let mut db = LayoutDatabase::new("imported");

        db.version = self.read_header()?;
        self.read_lib(&mut db)?;
        db.resolve_references()?;

        Ok(db)
    }

    fn offset(&mut self) -> u64 {
        self.reader.stream_position().unwrap_or(0)
    }

    fn read_record(&mut self) -> Result<Option<GdsRecord>, GdsError> {
        let mut len_buf = [0u8; 2];
        match self.reader.read_exact(&mut len_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(GdsError::Io(e)),
        }

        let total_len = u16::from_be_bytes(len_buf) as usize;
        if total_len < 4 {
            let offset = self.offset();
            return Err(GdsError::InvalidRecord {
                offset,
                message: format!("Record length {} is too small", total_len),
            });
        }

        let mut type_buf = [0u8; 2];
        self.reader.read_exact(&mut type_buf)?;
        let record_type = u16::from_be_bytes(type_buf);

        let data_len = total_len - 4;
        let mut data = vec![0u8; data_len];
        if data_len > 0 {
            self.reader.read_exact(&mut data)?;
        }

        Ok(Some(GdsRecord { record_type, data }))
    }

    /// Read a record inside a structure, where the stream may not end.
    fn next_record(&mut self) -> Result<GdsRecord, GdsError> {
        match self.read_record()? {
            Some(rec) => Ok(rec),
            None => {
                let offset = self.offset();
                Err(GdsError::InvalidRecord {
                    offset,
                    message: "Unexpected end of stream".into(),
                })
            }
        }
    }

    fn read_header(&mut self) -> Result<i16, GdsError> {
        let rec = self.read_record()?.ok_or(GdsError::InvalidRecord {
            offset: 0,
            message: "Empty file".into(),
        })?;

        if rec.record_type != record_type::HEADER {
            return Err(GdsError::UnexpectedRecord {
                record_type: rec.record_type,
                expected: record_type::HEADER,
            });
        }

        let version = rec.as_i16_vec().first().copied().unwrap_or(600);
        log::debug!("GDS-II version: {}", version);
        Ok(version)
    }

    fn read_lib(&mut self, db: &mut LayoutDatabase) -> Result<(), GdsError> {
        loop {
            let rec = self.next_record()?;

            match rec.record_type {
                record_type::BGNLIB => {
                    db.timestamps = timestamps(&rec);
                }
                record_type::LIBNAME => {
                    db.name = rec.as_string();
                    log::info!("Library name: {}", db.name);
                }
                record_type::UNITS => {
                    let units = rec.as_f64_vec();
                    if units.len() >= 2 {
                        db.units = Units {
                            dbu_in_user_units: units[0],
                            dbu_in_meters: units[1],
                        };
                        log::debug!(
                            "Database unit: {} user units, {} m",
                            units[0],
                            units[1]
                        );
                    }
                }
                record_type::BGNSTR => {
                    let cell = self.read_structure(&rec)?;
                    db.add_cell(cell)?;
                }
                record_type::ENDLIB => {
                    log::info!("End of library. {} cells read.", db.cell_count());
                    break;
                }
                _ => {
                    // Skip unknown records
                }
            }
        }

        Ok(())
    }

    fn read_structure(&mut self, bgnstr: &GdsRecord) -> Result<Cell, GdsError> {
        let mut cell = Cell::new("unnamed");
        cell.timestamps = timestamps(bgnstr);

        loop {
            let rec = self.next_record()?;

            match rec.record_type {
                record_type::STRNAME => {
                    cell.name = rec.as_string();
                    log::debug!("Reading cell: {}", cell.name);
                }
                record_type::BOUNDARY => {
                    let geom = self.read_boundary(false)?;
                    cell.add_geometry(geom);
                }
                record_type::BOX => {
                    let geom = self.read_boundary(true)?;
                    cell.add_geometry(geom);
                }
                record_type::PATH => {
                    let geom = self.read_path()?;
                    cell.add_geometry(geom);
                }
                record_type::TEXT => {
                    let geom = self.read_text()?;
                    cell.add_geometry(geom);
                }
                record_type::SREF | record_type::AREF => {
                    if let Some(inst) = self.read_reference(rec.record_type)? {
                        cell.add_instance(inst);
                    }
                }
                record_type::NODE => {
                    self.skip_to_endel()?;
                }
                record_type::ENDSTR => {
                    break;
                }
                _ => {}
            }
        }

        Ok(cell)
    }

    /// BOUNDARY and BOX elements. A BOX keeps its BOXTYPE as datatype.
    fn read_boundary(&mut self, is_box: bool) -> Result<GeomPrimitive, GdsError> {
        let type_record = if is_box {
            record_type::BOXTYPE
        } else {
            record_type::DATATYPE
        };
        let mut poly = Polygon::new(LayerSpec::new(0, 0), Vec::new());
        poly.is_box = is_box;

        loop {
            let rec = self.next_record()?;

            match rec.record_type {
                record_type::LAYER => poly.layer.layer = rec.first_u16(),
                t if t == type_record => poly.layer.datatype = rec.first_u16(),
                record_type::XY => poly.vertices = rec.as_points(),
                record_type::ENDEL => break,
                _ => {
                    self.read_info(&rec, &mut poly.info)?;
                }
            }
        }

        // GDS boundaries repeat the first point; remove it
        if poly.vertices.len() > 1 && poly.vertices.first() == poly.vertices.last() {
            poly.vertices.pop();
        }
        if poly.vertices.len() < 3 {
            log::debug!("Degenerate boundary on layer {}", poly.layer);
        }

        Ok(GeomPrimitive::Polygon(poly))
    }

    fn read_path(&mut self) -> Result<GeomPrimitive, GdsError> {
        let mut path = LayoutPath::new(LayerSpec::new(0, 0), Vec::new(), 0);

        loop {
            let rec = self.next_record()?;

            match rec.record_type {
                record_type::LAYER => path.layer.layer = rec.first_u16(),
                record_type::DATATYPE => path.layer.datatype = rec.first_u16(),
                record_type::PATHTYPE => {
                    path.path_type = PathType::from_gds(rec.first_u16() as i16);
                }
                record_type::WIDTH => {
                    path.width = rec.as_i32_vec().first().copied().unwrap_or(0);
                }
                record_type::BGNEXTN => {
                    path.begin_extension = rec.as_i32_vec().first().copied().unwrap_or(0);
                }
                record_type::ENDEXTN => {
                    path.end_extension = rec.as_i32_vec().first().copied().unwrap_or(0);
                }
                record_type::XY => path.points = rec.as_points(),
                record_type::ENDEL => break,
                _ => {
                    self.read_info(&rec, &mut path.info)?;
                }
            }
        }

        Ok(GeomPrimitive::Path(path))
    }

    fn read_text(&mut self) -> Result<GeomPrimitive, GdsError> {
        let mut text = Text::new(LayerSpec::new(0, 0), "", Point::new(0, 0));
        let mut has_position = false;

        loop {
            let rec = self.next_record()?;

            match rec.record_type {
                record_type::LAYER => text.layer.layer = rec.first_u16(),
                record_type::TEXTTYPE => text.layer.datatype = rec.first_u16(),
                record_type::PRESENTATION => text.presentation = Some(rec.first_u16() as i16),
                record_type::STRANS => {
                    let flags = rec.first_u16();
                    text.mirror_x = flags & STRANS_REFLECT != 0;
                    text.abs_mag = flags & STRANS_ABS_MAG != 0;
                    text.abs_angle = flags & STRANS_ABS_ANGLE != 0;
                }
                record_type::WIDTH => text.width = rec.as_i32_vec().first().copied(),
                record_type::MAG => {
                    text.magnification = rec.as_f64_vec().first().copied().unwrap_or(1.0);
                }
                record_type::ANGLE => {
                    text.rotation = rec.as_f64_vec().first().copied().unwrap_or(0.0);
                }
                record_type::XY => {
                    if let Some(p) = rec.as_points().first() {
                        text.position = *p;
                        has_position = true;
                    }
                }
                record_type::STRING => text.string = rec.as_string(),
                record_type::ENDEL => break,
                _ => {
                    self.read_info(&rec, &mut text.info)?;
                }
            }
        }

        if !has_position {
            return Err(GdsError::InvalidCoordinates("TEXT"));
        }
        Ok(GeomPrimitive::Text(text))
    }

    /// SREF and AREF elements. The referenced cell id is resolved once the
    /// whole library has been read.
    fn read_reference(&mut self, kind: u16) -> Result<Option<CellInstance>, GdsError> {
        let mut cell_name = String::new();
        let mut transform = Transform::default();
        let mut colrow: Option<(u16, u16)> = None;
        let mut points: Vec<Point> = Vec::new();
        let mut info = ElementInfo::default();

        loop {
            let rec = self.next_record()?;

            match rec.record_type {
                record_type::SNAME => {
                    cell_name = rec.as_string();
                }
                record_type::STRANS => {
                    let flags = rec.first_u16();
                    transform.mirror_x = flags & STRANS_REFLECT != 0;
                    transform.abs_mag = flags & STRANS_ABS_MAG != 0;
                    transform.abs_angle = flags & STRANS_ABS_ANGLE != 0;
                }
                record_type::MAG => {
                    if let Some(mag) = rec.as_f64_vec().first() {
                        transform.magnification = *mag;
                    }
                }
                record_type::ANGLE => {
                    if let Some(angle) = rec.as_f64_vec().first() {
                        transform.rotation = *angle;
                    }
                }
                record_type::COLROW => {
                    let vals = rec.as_i16_vec();
                    if vals.len() >= 2 {
                        colrow = Some((vals[0] as u16, vals[1] as u16));
                    }
                }
                record_type::XY => points = rec.as_points(),
                record_type::ENDEL => break,
                _ => {
                    self.read_info(&rec, &mut info)?;
                }
            }
        }

        if cell_name.is_empty() {
            log::warn!("Skipping reference without a cell name");
            return Ok(None);
        }

        let origin = *points
            .first()
            .ok_or(GdsError::InvalidCoordinates("SREF/AREF"))?;
        transform.offset = origin;
        let mut instance = CellInstance::new(uuid_nil(), &cell_name, transform);
        instance.info = info;

        if kind == record_type::AREF {
            let (columns, rows) = colrow.ok_or(GdsError::InvalidCoordinates("AREF"))?;
            if points.len() < 3 {
                return Err(GdsError::InvalidCoordinates("AREF"));
            }
            return Ok(Some(instance.with_array(ArrayRef {
                columns,
                rows,
                col_corner: points[1],
                row_corner: points[2],
            })));
        }

        Ok(Some(instance))
    }

    /// ELFLAGS, PLEX and properties, shared by every element kind. Other
    /// records are ignored.
    fn read_info(&mut self, rec: &GdsRecord, info: &mut ElementInfo) -> Result<(), GdsError> {
        match rec.record_type {
            record_type::ELFLAGS => info.elflags = Some(rec.first_u16()),
            record_type::PLEX => info.plex = rec.as_i32_vec().first().copied(),
            record_type::PROPATTR => {
                let attr = rec.as_i16_vec().first().copied().unwrap_or(0);
                let value = self.next_record()?;
                if value.record_type != record_type::PROPVALUE {
                    return Err(GdsError::UnexpectedRecord {
                        record_type: value.record_type,
                        expected: record_type::PROPVALUE,
                    });
                }
                info.properties.push(Property {
                    attr,
                    value: value.as_string(),
                });
            }
            _ => {}
        }
        Ok(())
    }

    fn skip_to_endel(&mut self) -> Result<(), GdsError> {
        loop {
            let rec = self.next_record()?;
            if rec.record_type == record_type::ENDEL {
                break;
            }
        }
        Ok(())
    }
}

fn timestamps(rec: &GdsRecord) -> Option<[i16; 12]> {
    let vals = rec.as_i16_vec();
    let mut ts = [0i16; 12];
    if vals.len() < ts.len() {
        return None;
    }
    ts.copy_from_slice(&vals[..12]);
    Some(ts)
}

fn uuid_nil() -> tapeart_core::CellId {
    tapeart_core::CellId::nil()
}

// ── GDS-II Writer ─────────────────────────────────────────────────────

pub struct GdsWriter<W: io::Write> {
    writer: W,
}

impl<W: io::Write> GdsWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Write a LayoutDatabase as a GDS-II stream, cells in database order.
    pub fn write(&mut self, db: &LayoutDatabase) -> Result<(), GdsError> {
        self.write_i16_record(record_type::HEADER, &[db.version])?;
        self.write_i16_record(
            record_type::BGNLIB,
            &db.timestamps.unwrap_or(DEFAULT_TIMESTAMP),
        )?;
        self.write_string_record(record_type::LIBNAME, &db.name)?;
        self.write_real8_record(
            record_type::UNITS,
            &[db.units.dbu_in_user_units, db.units.dbu_in_meters],
        )?;

        for cell in db.all_cells() {
            self.write_cell(cell)?;
        }

        self.write_record(record_type::ENDLIB, &[])?;
        Ok(())
    }

    fn write_record(&mut self, record_type: u16, data: &[u8]) -> Result<(), GdsError> {
        let total_len = data.len() + 4;
        if total_len > u16::MAX as usize {
            return Err(GdsError::RecordTooLong {
                record_type,
                len: total_len,
            });
        }
        self.writer.write_all(&(total_len as u16).to_be_bytes())?;
        self.writer.write_all(&record_type.to_be_bytes())?;
        if !data.is_empty() {
            self.writer.write_all(data)?;
        }
        Ok(())
    }

    fn write_i16_record(&mut self, record_type: u16, values: &[i16]) -> Result<(), GdsError> {
        let data: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();
        self.write_record(record_type, &data)
    }

    fn write_i32_record(&mut self, record_type: u16, values: &[i32]) -> Result<(), GdsError> {
        let data: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();
        self.write_record(record_type, &data)
    }

    fn write_string_record(&mut self, record_type: u16, s: &str) -> Result<(), GdsError> {
        let mut data = encode_string(s);
        // GDS strings must be even length
        if data.len() % 2 != 0 {
            data.push(0);
        }
        self.write_record(record_type, &data)
    }

    fn write_real8_record(&mut self, record_type: u16, values: &[f64]) -> Result<(), GdsError> {
        let data: Vec<u8> = values
            .iter()
            .flat_map(|v| f64_to_gds_real8(*v))
            .collect();
        self.write_record(record_type, &data)
    }

    fn write_points(&mut self, points: &[Point], close: bool) -> Result<(), GdsError> {
        let mut coords: Vec<i32> = points.iter().flat_map(|p| [p.x, p.y]).collect();
        if close {
            if let Some(first) = points.first() {
                coords.push(first.x);
                coords.push(first.y);
            }
        }
        self.write_i32_record(record_type::XY, &coords)
    }

    fn write_layer(&mut self, type_record: u16, layer: LayerSpec) -> Result<(), GdsError> {
        self.write_i16_record(record_type::LAYER, &[layer.layer as i16])?;
        self.write_i16_record(type_record, &[layer.datatype as i16])
    }

    /// Element header followed by its ELFLAGS and PLEX.
    fn begin_element(&mut self, kind: u16, info: &ElementInfo) -> Result<(), GdsError> {
        self.write_record(kind, &[])?;
        if let Some(flags) = info.elflags {
            self.write_i16_record(record_type::ELFLAGS, &[flags as i16])?;
        }
        if let Some(plex) = info.plex {
            self.write_i32_record(record_type::PLEX, &[plex])?;
        }
        Ok(())
    }

    /// Properties, then ENDEL.
    fn end_element(&mut self, info: &ElementInfo) -> Result<(), GdsError> {
        for prop in &info.properties {
            self.write_i16_record(record_type::PROPATTR, &[prop.attr])?;
            self.write_string_record(record_type::PROPVALUE, &prop.value)?;
        }
        self.write_record(record_type::ENDEL, &[])
    }

    fn write_strans(&mut self, flags: u16, magnification: f64, rotation: f64) -> Result<(), GdsError> {
        if flags == 0 && magnification == 1.0 && rotation == 0.0 {
            return Ok(());
        }
        self.write_i16_record(record_type::STRANS, &[flags as i16])?;
        if magnification != 1.0 {
            self.write_real8_record(record_type::MAG, &[magnification])?;
        }
        if rotation != 0.0 {
            self.write_real8_record(record_type::ANGLE, &[rotation])?;
        }
        Ok(())
    }

    fn write_cell(&mut self, cell: &Cell) -> Result<(), GdsError> {
        self.write_i16_record(
            record_type::BGNSTR,
            &cell.timestamps.unwrap_or(DEFAULT_TIMESTAMP),
        )?;
        self.write_string_record(record_type::STRNAME, &cell.name)?;

        for geom in &cell.geometries {
            match geom {
                GeomPrimitive::Polygon(poly) => self.write_polygon(poly)?,
                GeomPrimitive::Path(path) => self.write_path(path)?,
                GeomPrimitive::Text(text) => self.write_text(text)?,
            }
        }

        for inst in &cell.instances {
            self.write_reference(inst)?;
        }

        self.write_record(record_type::ENDSTR, &[])?;
        Ok(())
    }

    fn write_polygon(&mut self, poly: &Polygon) -> Result<(), GdsError> {
        let (kind, type_record) = if poly.is_box {
            (record_type::BOX, record_type::BOXTYPE)
        } else {
            (record_type::BOUNDARY, record_type::DATATYPE)
        };
        self.begin_element(kind, &poly.info)?;
        self.write_layer(type_record, poly.layer)?;
        self.write_points(&poly.vertices, true)?;
        self.end_element(&poly.info)
    }

    fn write_path(&mut self, path: &LayoutPath) -> Result<(), GdsError> {
        self.begin_element(record_type::PATH, &path.info)?;
        self.write_layer(record_type::DATATYPE, path.layer)?;
        if path.path_type != PathType::Flush {
            self.write_i16_record(record_type::PATHTYPE, &[path.path_type.to_gds()])?;
        }
        self.write_i32_record(record_type::WIDTH, &[path.width])?;
        if path.path_type == PathType::Custom {
            self.write_i32_record(record_type::BGNEXTN, &[path.begin_extension])?;
            self.write_i32_record(record_type::ENDEXTN, &[path.end_extension])?;
        }
        self.write_points(&path.points, false)?;
        self.end_element(&path.info)
    }

    fn write_text(&mut self, text: &Text) -> Result<(), GdsError> {
        self.begin_element(record_type::TEXT, &text.info)?;
        self.write_layer(record_type::TEXTTYPE, text.layer)?;
        if let Some(presentation) = text.presentation {
            self.write_i16_record(record_type::PRESENTATION, &[presentation])?;
        }
        if let Some(width) = text.width {
            self.write_i32_record(record_type::WIDTH, &[width])?;
        }
        let flags = strans_flags(text.mirror_x, text.abs_mag, text.abs_angle);
        self.write_strans(flags, text.magnification, text.rotation)?;
        self.write_points(&[text.position], false)?;
        self.write_string_record(record_type::STRING, &text.string)?;
        self.end_element(&text.info)
    }

    fn write_reference(&mut self, inst: &CellInstance) -> Result<(), GdsError> {
        let kind = if inst.array.is_some() {
            record_type::AREF
        } else {
            record_type::SREF
        };
        let t = &inst.transform;

        self.begin_element(kind, &inst.info)?;
        self.write_string_record(record_type::SNAME, &inst.cell_name)?;
        let flags = strans_flags(t.mirror_x, t.abs_mag, t.abs_angle);
        self.write_strans(flags, t.magnification, t.rotation)?;

        match &inst.array {
            Some(array) => {
                self.write_i16_record(
                    record_type::COLROW,
                    &[array.columns as i16, array.rows as i16],
                )?;
                self.write_points(&[t.offset, array.col_corner, array.row_corner], false)?;
            }
            None => self.write_points(&[t.offset], false)?,
        }

        self.end_element(&inst.info)
    }
}

fn strans_flags(mirror_x: bool, abs_mag: bool, abs_angle: bool) -> u16 {
    let mut flags = 0;
    if mirror_x {
        flags |= STRANS_REFLECT;
    }
    if abs_mag {
        flags |= STRANS_ABS_MAG;
    }
    if abs_angle {
        flags |= STRANS_ABS_ANGLE;
    }
    flags
}
