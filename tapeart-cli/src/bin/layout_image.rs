use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;

use tapeart::config::{parse_background, DEFAULT_ASPECT_RATIO, DEFAULT_TECH, DEFAULT_WIDTH};
use tapeart::{render, RenderConfig};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = RenderConfig::new(args.input_gds, args.output_image);
    config.width = args.width;
    config.aspect_ratio = args.aspect_ratio;
    config.background = parse_background(&args.background)?;
    config.layer_props = args.layer_props;
    config.tech = args.tech;
    config.max_depth = args.max_depth;
    config.policy_file = args.policy;

    render::run(&config, |key| std::env::var(key).ok())
        .with_context(|| format!("Failed to render {:?}", config.input))?;

    Ok(())
}

/// Arguments to `layout-image`.
///
/// The layer properties come from `$PDK_ROOT/$PDK/libs.tech/klayout/tech/`
/// unless `--layer-props` is given. `PDK` defaults to `ihp-sg13g2`.
#[derive(Parser)]
#[command(
    version,
    about,
    long_about = "Render a layer-styled PNG snapshot of a GDS-II layout"
)]
struct Args {
    /// The layout to render.
    input_gds: PathBuf,
    /// Output image path, always written as PNG.
    output_image: PathBuf,
    /// Image width in pixels.
    #[arg(long, default_value_t = DEFAULT_WIDTH)]
    width: u32,
    /// Width divided by height.
    #[arg(long, default_value_t = DEFAULT_ASPECT_RATIO)]
    aspect_ratio: f64,
    /// `white`, `black` or `#rrggbb`.
    #[arg(long, default_value = "white")]
    background: String,
    /// Layer-property file to use instead of the PDK's.
    #[arg(long)]
    layer_props: Option<PathBuf>,
    /// JSON override policy, e.g. `{"disabled": [[189, 4]], "fill": [[126, 0]]}`.
    #[arg(long)]
    policy: Option<PathBuf>,
    /// Stem of the PDK's layer-property file.
    #[arg(long, default_value = DEFAULT_TECH)]
    tech: String,
    /// Hierarchy levels to expand; deeper cells are drawn as frames.
    #[arg(long)]
    max_depth: Option<usize>,
}
