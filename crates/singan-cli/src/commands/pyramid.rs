use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use singan_core::io::image_io::load_rgb;
use singan_core::pyramid::build_sizes;
use singan_core::size::Size;

use crate::summary::print_pyramid;

#[derive(Args)]
pub struct PyramidArgs {
    /// Training image
    pub image: PathBuf,

    /// Config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Print the level sizes an image would be trained at.
pub fn run(args: &PyramidArgs) -> Result<()> {
    let config = super::load_config(args.config.as_deref())?;
    let source = load_rgb(&args.image)
        .with_context(|| format!("Failed to open {}", args.image.display()))?;
    let (w, h) = source.dimensions();
    let sizes = build_sizes(Size::new(w as usize, h as usize), &config.pyramid)?;

    print_pyramid(&args.image, config.pyramid.scale_factor, &sizes);
    Ok(())
}
