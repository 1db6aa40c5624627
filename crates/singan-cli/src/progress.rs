use std::path::PathBuf;

use indicatif::{ProgressBar, ProgressStyle};
use ndarray::Array3;
use singan_core::io::image_io::save_png;
use singan_core::size::Size;
use singan_core::train::{ScaleReport, SnapshotKind, StepLosses, TrainingReporter};
use tracing::warn;

/// Drives a progress bar over the steps of each level and writes every
/// reported image into the output directory.
pub struct CliReporter {
    bar: ProgressBar,
    levels: usize,
    output: PathBuf,
}

impl CliReporter {
    pub fn new(levels: usize, output: PathBuf) -> anyhow::Result<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg:32} [{bar:40}] {pos}/{len} {elapsed_precise}")?
                .progress_chars("=> "),
        );
        Ok(Self { bar, levels, output })
    }

    pub fn finish(&self) {
        self.bar.finish_with_message("Done");
    }
}

impl TrainingReporter for CliReporter {
    fn begin_scale(&self, level: usize, size: Size, total_steps: usize) {
        self.bar.set_length(total_steps as u64);
        self.bar.set_position(0);
        self.bar
            .set_message(format!("Scale {}/{} ({size})", level + 1, self.levels));
    }

    fn advance(&self, steps_done: usize) {
        self.bar.set_position(steps_done as u64);
    }

    fn scalars(&self, level: usize, _step: usize, losses: &StepLosses) {
        self.bar.set_message(format!(
            "Scale {}/{} D {:.3} rec {:.4}",
            level + 1,
            self.levels,
            losses.discriminator,
            losses.reconstruction
        ));
    }

    fn image(&self, level: usize, kind: SnapshotKind, step: Option<usize>, image: &Array3<f32>) {
        let name = match step {
            Some(step) => format!("level{level}_{kind}_step{step}.png"),
            None => format!("level{level}_{kind}.png"),
        };
        let path = self.output.join(name);
        if let Err(e) = save_png(image, &path) {
            warn!(path = %path.display(), error = %e, "Failed to write snapshot");
        }
    }

    fn finish_scale(&self, report: &ScaleReport) {
        self.bar.println(format!(
            "  Scale {} ({}) trained, noise amplitude {:.4}",
            report.level, report.size, report.noise_amplitude
        ));
    }
}
