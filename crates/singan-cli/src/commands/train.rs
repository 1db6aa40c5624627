use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use ndarray::Array3;
use singan_core::config::SinGanConfig;
use singan_core::context::{ExecutionContext, Phase};
use singan_core::io::image_io::save_png;
use singan_core::pyramid::ImagePyramid;
use singan_core::sample::{multi_aspect, random_sample, reconstruction, super_resolve};
use singan_core::train::train_pyramid_levels;
use tracing::info;

use crate::progress::CliReporter;
use crate::summary::{print_reports, print_training_summary};

#[derive(Args)]
pub struct TrainArgs {
    /// Training image
    pub image: PathBuf,

    /// Config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory for samples, snapshots and the effective config
    #[arg(short, long, default_value = "output")]
    pub output: PathBuf,

    /// Training steps per level
    #[arg(long)]
    pub steps: Option<usize>,

    /// Random seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Train only the coarsest N levels
    #[arg(long)]
    pub max_levels: Option<usize>,

    /// Feature channels of every hidden layer
    #[arg(long)]
    pub channels: Option<usize>,
}

pub fn run(args: &TrainArgs) -> Result<()> {
    let config = build_config(args)?;

    let pyramid = ImagePyramid::load(&args.image, &config.pyramid)
        .with_context(|| format!("Failed to build pyramid of {}", args.image.display()))?;
    let levels = args
        .max_levels
        .map_or(pyramid.len(), |n| n.min(pyramid.len()));
    anyhow::ensure!(levels > 0, "--max-levels must be at least 1");

    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;
    config.save(&args.output.join("config.toml"))?;

    print_training_summary(&config, &args.image, &args.output, pyramid.sizes(), levels);

    let mut ctx = ExecutionContext::new(config.training.seed);
    let reporter = CliReporter::new(levels, args.output.clone())?;
    let trained = train_pyramid_levels(&pyramid, &config, levels, &mut ctx, &reporter);
    reporter.finish();

    ctx.set_phase(Phase::Inference);
    let out = &args.output;
    write(&random_sample(&trained, &mut ctx), &out.join("random.png"))?;
    write(&reconstruction(&trained, &mut ctx), &out.join("reconstruction.png"))?;

    for &initial in &config.sampling.multi_aspect_sizes {
        let image = multi_aspect(&trained.stack, initial, &mut ctx);
        write(
            &image,
            &out.join(format!("multi_aspect_{}x{}.png", initial.width, initial.height)),
        )?;
    }

    let source = &pyramid[levels - 1];
    let iterations = config.sampling.super_resolution_iterations;
    for (i, image) in super_resolve(&trained.stack, source, iterations, &mut ctx)
        .iter()
        .enumerate()
    {
        write(image, &out.join(format!("super_resolution_{}.png", i + 1)))?;
    }

    print_reports(&trained.reports);
    println!("Samples saved to {}", out.display());
    Ok(())
}

fn build_config(args: &TrainArgs) -> Result<SinGanConfig> {
    let mut config = super::load_config(args.config.as_deref())?;
    if let Some(steps) = args.steps {
        config.training.steps_per_layer = steps;
    }
    if let Some(seed) = args.seed {
        config.training.seed = Some(seed);
    }
    if let Some(channels) = args.channels {
        config.network.base_channels = channels;
    }
    config.validate().context("Invalid training config")?;
    Ok(config)
}

fn write(image: &Array3<f32>, path: &Path) -> Result<()> {
    save_png(image, path).with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), "Wrote sample");
    Ok(())
}
