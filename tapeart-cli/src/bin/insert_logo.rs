use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;

use tapeart::config::{DEFAULT_LOGO_CELL, DEFAULT_LOGO_OFFSET};
use tapeart::{compose, ComposeConfig};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = ComposeConfig {
        input: args.input_gds,
        logo: args.logo_gds,
        output: args.output_gds,
        offset: (args.offset_x, args.offset_y),
        logo_cell: args.logo_cell,
    };
    compose::run(&config).with_context(|| {
        format!(
            "Failed to insert '{}' from {:?} into {:?}",
            config.logo_cell, config.logo, config.input
        )
    })?;

    Ok(())
}

/// Arguments to `insert-logo`.
#[derive(Parser)]
#[command(
    version,
    about,
    long_about = "Insert a logo cell into the top cell of a GDS-II layout"
)]
struct Args {
    /// The layout to decorate.
    input_gds: PathBuf,
    /// GDS-II library containing the logo cell.
    logo_gds: PathBuf,
    /// Where to write the combined layout. Overwritten if it exists.
    output_gds: PathBuf,
    /// Logo X position in the input's user units (µm).
    #[arg(long, default_value_t = DEFAULT_LOGO_OFFSET.0, allow_negative_numbers = true)]
    offset_x: f64,
    /// Logo Y position in the input's user units (µm).
    #[arg(long, default_value_t = DEFAULT_LOGO_OFFSET.1, allow_negative_numbers = true)]
    offset_y: f64,
    /// Name of the cell to place.
    #[arg(long, default_value = DEFAULT_LOGO_CELL)]
    logo_cell: String,
}
