//! Layout snapshot pipeline.

use tapeart_core::OverrideReport;
use tapeart_io::{read_gds, read_lyp};
use tapeart_renderer::save_image;

use crate::config::RenderConfig;
use crate::Error;

/// Render `config.input` to `config.output`.
///
/// The environment is consulted through `lookup` and checked before any file
/// is opened. The image is written only after rendering succeeded.
pub fn run(
    config: &RenderConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<OverrideReport, Error> {
    let lyp_path = config.resolve_layer_props(lookup)?;
    config.validate()?;
    let policy = config.load_policy()?;

    let db = read_gds(&config.input)?;
    let mut styles = read_lyp(&lyp_path)?;
    let report = policy.apply(&mut styles);
    log::info!(
        "{} layer styles, {} hidden and {} filled by policy",
        styles.len(),
        report.hidden.len(),
        report.filled.len()
    );

    let image = tapeart_renderer::render(&db, &styles, &config.render_settings())?;
    save_image(&image, &config.output)?;
    Ok(report)
}
