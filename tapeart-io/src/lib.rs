//! # tapeart I/O
//!
//! GDS-II stream reader and writer, and the KLayout layer-property (`.lyp`)
//! reader that produces technology layer styles.

pub mod gds;
pub mod lyp;

pub use gds::{read_gds, write_gds, GdsError, GdsReader, GdsWriter};
pub use lyp::{parse_lyp, read_lyp, LypError};
