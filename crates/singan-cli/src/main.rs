mod commands;
mod progress;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "singan", about = "Train a multi-scale GAN on a single image")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a pyramid on an image and write samples
    Train(commands::train::TrainArgs),
    /// Show the pyramid sizes of an image
    Pyramid(commands::pyramid::PyramidArgs),
    /// Print or save the default config
    Config(commands::config::ConfigArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Train(args) => commands::train::run(args),
        Commands::Pyramid(args) => commands::pyramid::run(args),
        Commands::Config(args) => commands::config::run(args),
    }
}
