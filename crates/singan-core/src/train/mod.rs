mod reporter;
mod scale;

use ndarray::Array3;
use tracing::info;

use crate::config::SinGanConfig;
use crate::context::{ExecutionContext, Phase};
use crate::pyramid::ImagePyramid;
use crate::size::Size;
use crate::stack::ModelStack;

pub use reporter::{NoOpReporter, ScaleReport, SnapshotKind, StepLosses, TrainingReporter};
pub use scale::{calibrate_noise, ScaleTrainer};

/// Outcome of a training run: the trained stack together with everything
/// needed to sample from it.
#[derive(Clone, Debug)]
pub struct TrainedPyramid {
    pub stack: ModelStack,
    /// Fixed noise per pyramid level used for reconstruction.
    pub reconstruction_noises: Vec<Array3<f32>>,
    /// Sizes of the trained levels, coarsest first.
    pub sizes: Vec<Size>,
    pub reports: Vec<ScaleReport>,
}

/// Train every level of `pyramid`, coarse to fine.
pub fn train_pyramid(
    pyramid: &ImagePyramid,
    config: &SinGanConfig,
    ctx: &mut ExecutionContext,
    reporter: &dyn TrainingReporter,
) -> TrainedPyramid {
    train_pyramid_levels(pyramid, config, pyramid.len(), ctx, reporter)
}

/// Train the `levels` coarsest levels of `pyramid`. `levels` is clamped to
/// the pyramid depth. The final samples reported after each level are drawn
/// in the inference phase.
pub fn train_pyramid_levels(
    pyramid: &ImagePyramid,
    config: &SinGanConfig,
    levels: usize,
    ctx: &mut ExecutionContext,
    reporter: &dyn TrainingReporter,
) -> TrainedPyramid {
    let levels = levels.min(pyramid.len());
    let mut stack = ModelStack::from_config(config);
    let reconstruction_noises = stack
        .noise_sampler()
        .reconstruction_noises(pyramid.sizes(), ctx);
    let trainer = ScaleTrainer::new(&config.training, pyramid, &reconstruction_noises);

    info!(
        levels,
        total_levels = pyramid.len(),
        steps_per_level = trainer.total_steps(),
        "Starting pyramid training"
    );

    let mut reports = Vec::with_capacity(levels);
    for level in 0..levels {
        let report = trainer.train(&mut stack, ctx, reporter);

        let sizes = &pyramid.sizes()[..=level];
        let phase = ctx.phase;
        ctx.set_phase(Phase::Inference);
        let random = stack.generate(sizes, ctx);
        reporter.image(level, SnapshotKind::Random, None, &random);
        let reconstruction = stack.generate_with_noises(sizes, &reconstruction_noises, ctx);
        reporter.image(level, SnapshotKind::Reconstruction, None, &reconstruction);
        ctx.set_phase(phase);

        reporter.finish_scale(&report);
        reports.push(report);
    }

    TrainedPyramid {
        stack,
        reconstruction_noises,
        sizes: pyramid.sizes()[..levels].to_vec(),
        reports,
    }
}
