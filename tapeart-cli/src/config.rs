//! Run configuration for both pipelines and PDK environment resolution.

use std::path::{Path, PathBuf};

use thiserror::Error;

use tapeart_core::{Color, LayerOverridePolicy};
use tapeart_renderer::{DisplayOptions, RenderSettings};

pub const DEFAULT_PDK: &str = "ihp-sg13g2";
/// Stem of the layer-property file shipped with the default PDK.
pub const DEFAULT_TECH: &str = "sg13g2";
pub const DEFAULT_WIDTH: u32 = 4096;
pub const DEFAULT_ASPECT_RATIO: f64 = 60.0 / 50.0;
pub const DEFAULT_LOGO_CELL: &str = "fazyrv_small_logo";
/// Logo placement in the base layout's user units (µm).
pub const DEFAULT_LOGO_OFFSET: (f64, f64) = (412.8, 15.0);

const PDK_VAR: &str = "PDK";
const PDK_ROOT_VAR: &str = "PDK_ROOT";
const LYP_DIR: &str = "libs.tech/klayout/tech";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("PDK_ROOT not defined!")]
    MissingPdkRoot,
    #[error("Invalid background colour '{0}' (expected white, black or #rrggbb)")]
    InvalidColor(String),
    #[error("Invalid aspect ratio {0}")]
    InvalidAspectRatio(f64),
    #[error("Cannot read policy file {path}: {source}")]
    PolicyIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid policy file {path}: {source}")]
    PolicyParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// PDK selection taken from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdkEnv {
    pub pdk: String,
    pub pdk_root: PathBuf,
}

impl PdkEnv {
    /// Resolve through `lookup` (usually the process environment). An empty
    /// value counts as unset.
    pub fn resolve(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let pdk_root = get(PDK_ROOT_VAR).ok_or(ConfigError::MissingPdkRoot)?;
        let pdk = get(PDK_VAR).unwrap_or_else(|| DEFAULT_PDK.to_string());
        Ok(Self {
            pdk,
            pdk_root: PathBuf::from(pdk_root),
        })
    }

    /// `<root>/<pdk>/libs.tech/klayout/tech/<tech>.lyp`
    pub fn layer_props_path(&self, tech: &str) -> PathBuf {
        self.pdk_root
            .join(&self.pdk)
            .join(LYP_DIR)
            .join(format!("{tech}.lyp"))
    }
}

/// `white`, `black` or a hex colour.
pub fn parse_background(value: &str) -> Result<Color, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "white" => Ok(Color::WHITE),
        "black" => Ok(Color::BLACK),
        hex => Color::from_hex(hex).ok_or_else(|| ConfigError::InvalidColor(value.to_string())),
    }
}

pub fn load_policy(path: &Path) -> Result<LayerOverridePolicy, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::PolicyIo {
        path: path.to_path_buf(),
        source,
    })?;
    LayerOverridePolicy::from_json(&text).map_err(|source| ConfigError::PolicyParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Settings of one `layout-image` run.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub width: u32,
    pub aspect_ratio: f64,
    pub background: Color,
    pub display: DisplayOptions,
    /// Explicit layer-property file; skips PDK resolution.
    pub layer_props: Option<PathBuf>,
    pub tech: String,
    pub policy: LayerOverridePolicy,
    /// JSON policy replacing `policy`, read once the environment resolved.
    pub policy_file: Option<PathBuf>,
    pub max_depth: Option<usize>,
}

impl RenderConfig {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            width: DEFAULT_WIDTH,
            aspect_ratio: DEFAULT_ASPECT_RATIO,
            background: Color::WHITE,
            display: DisplayOptions::snapshot(),
            layer_props: None,
            tech: DEFAULT_TECH.to_string(),
            policy: LayerOverridePolicy::default(),
            policy_file: None,
            max_depth: None,
        }
    }

    /// Logical height, `width / aspect_ratio` without rounding.
    pub fn height(&self) -> f64 {
        self.width as f64 / self.aspect_ratio
    }

    pub fn pixel_height(&self) -> u32 {
        self.render_settings().pixel_height()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.aspect_ratio.is_finite() && self.aspect_ratio > 0.0) {
            return Err(ConfigError::InvalidAspectRatio(self.aspect_ratio));
        }
        Ok(())
    }

    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            width: self.width,
            height: self.height(),
            background: self.background,
            display: self.display,
            max_depth: self.max_depth,
        }
    }

    pub fn load_policy(&self) -> Result<LayerOverridePolicy, ConfigError> {
        match &self.policy_file {
            Some(path) => load_policy(path),
            None => Ok(self.policy.clone()),
        }
    }

    /// The layer-property file to load: the explicit one, else the PDK's.
    pub fn resolve_layer_props(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<PathBuf, ConfigError> {
        match &self.layer_props {
            Some(path) => Ok(path.clone()),
            None => Ok(PdkEnv::resolve(lookup)?.layer_props_path(&self.tech)),
        }
    }
}

/// Settings of one `insert-logo` run.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposeConfig {
    pub input: PathBuf,
    pub logo: PathBuf,
    pub output: PathBuf,
    /// Offset in the base layout's user units.
    pub offset: (f64, f64),
    pub logo_cell: String,
}

impl ComposeConfig {
    pub fn new(
        input: impl Into<PathBuf>,
        logo: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            input: input.into(),
            logo: logo.into(),
            output: output.into(),
            offset: DEFAULT_LOGO_OFFSET,
            logo_cell: DEFAULT_LOGO_CELL.to_string(),
        }
    }
}
