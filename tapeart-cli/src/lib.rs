//! # tapeart
//!
//! Post-processing of GDS-II tapeouts: logo insertion into the top cell and
//! layer-styled PNG snapshots driven by a KLayout layer-property file.

pub mod compose;
pub mod config;
pub mod render;

use thiserror::Error;

pub use compose::insert_logo;
pub use config::{ComposeConfig, ConfigError, PdkEnv, RenderConfig};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Layout(#[from] tapeart_core::LayoutError),
    #[error("GDS error: {0}")]
    Gds(#[from] tapeart_io::GdsError),
    #[error("Layer properties error: {0}")]
    Lyp(#[from] tapeart_io::LypError),
    #[error("Render error: {0}")]
    Render(#[from] tapeart_renderer::RenderError),
}
