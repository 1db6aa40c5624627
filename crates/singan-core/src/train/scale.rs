//! Training of a single pyramid level.

use ndarray::Array3;
use tracing::{debug, info, warn};

use crate::config::TrainingConfig;
use crate::context::{ExecutionContext, Phase};
use crate::nn::{Adam, Discriminator, Generator, Module};
use crate::noise::NoiseSampler;
use crate::ops::{resize_bilinear, root_mean_squared_error, size_of, zero_pad, zeros};
use crate::pyramid::ImagePyramid;
use crate::stack::ModelStack;
use crate::train::reporter::{ScaleReport, SnapshotKind, StepLosses, TrainingReporter};

/// Noise amplitude for `level`, tied to how far the reconstruction through
/// the coarser levels is from the real image. Returns the amplitude and the
/// upsampled reconstruction it was measured on.
pub fn calibrate_noise(
    stack: &ModelStack,
    pyramid: &ImagePyramid,
    reconstruction_noises: &[Array3<f32>],
    noise_scale_base: f32,
    ctx: &mut ExecutionContext,
) -> (f32, Array3<f32>) {
    let level = stack.trained_layers();
    let sizes = pyramid.sizes();
    let size = sizes[level];
    if level == 0 {
        return (1.0, zeros(size));
    }

    let coarse = stack.generate_with_noises(&sizes[..level], reconstruction_noises, ctx);
    let reconstruction = resize_bilinear(&coarse, size);
    let rmse = root_mean_squared_error(&reconstruction, &pyramid[level]);
    let amplitude = noise_scale_base * rmse;
    debug!(level, rmse, amplitude, "Calibrated noise amplitude");
    (amplitude, reconstruction)
}

/// Trains the next untrained level of `stack` against `pyramid` and
/// appends it.
pub struct ScaleTrainer<'a> {
    config: &'a TrainingConfig,
    pyramid: &'a ImagePyramid,
    reconstruction_noises: &'a [Array3<f32>],
}

impl<'a> ScaleTrainer<'a> {
    pub fn new(
        config: &'a TrainingConfig,
        pyramid: &'a ImagePyramid,
        reconstruction_noises: &'a [Array3<f32>],
    ) -> Self {
        assert_eq!(
            pyramid.len(),
            reconstruction_noises.len(),
            "one reconstruction noise per pyramid level"
        );
        Self {
            config,
            pyramid,
            reconstruction_noises,
        }
    }

    pub fn total_steps(&self) -> usize {
        self.config.steps_per_layer * self.config.disc_ratio
    }

    pub fn train(
        &self,
        stack: &mut ModelStack,
        ctx: &mut ExecutionContext,
        reporter: &dyn TrainingReporter,
    ) -> ScaleReport {
        let level = stack.trained_layers();
        assert!(
            level < self.pyramid.len(),
            "all {} pyramid levels are already trained",
            self.pyramid.len()
        );
        let cfg = self.config;
        let size = self.pyramid.sizes()[level];
        let real = &self.pyramid[level];
        let border = stack.noise_sampler().border();
        let total_steps = self.total_steps();

        ctx.set_phase(Phase::Training);
        let (mut generator, mut discriminator) = stack.create_new_models(ctx);
        let (amplitude, reconstruction) = calibrate_noise(
            stack,
            self.pyramid,
            self.reconstruction_noises,
            cfg.noise_scale_base,
            ctx,
        );
        info!(
            level,
            %size,
            amplitude,
            parameters = generator.parameter_count(),
            "Training scale"
        );
        reporter.begin_scale(level, size, total_steps);

        let reconstruction_base = zero_pad(&reconstruction, border);
        let target = LevelTarget {
            real,
            amplitude,
            sampler: stack.noise_sampler(),
            reconstruction_base: &reconstruction_base,
            reconstruction_noise: &self.reconstruction_noises[level],
        };
        let zero_base = zero_pad(&zeros(size), border);

        let mut g_optimizer = Adam::new(cfg.learning_rate, cfg.beta1, cfg.beta2);
        let mut d_optimizer = Adam::new(cfg.learning_rate, cfg.beta1, cfg.beta2);
        let decay_step = self.decay_step();

        let mut losses = StepLosses::default();
        for step in 0..total_steps {
            if decay_step == Some(step) {
                let lr = cfg.learning_rate * cfg.gamma;
                g_optimizer.set_learning_rate(lr);
                d_optimizer.set_learning_rate(lr);
                debug!(level, step, learning_rate = lr, "Decayed learning rate");
            }

            let generator_step = step % cfg.disc_ratio == 0;
            if generator_step {
                generator.power_iterate();
            }

            let fake_base = if level == 0 {
                zero_base.clone()
            } else {
                let coarse = stack.generate(&self.pyramid.sizes()[..level], ctx);
                zero_pad(&resize_bilinear(&coarse, size), border)
            };
            let noise = target.sampler.sample(size, amplitude, ctx);
            let fake = generator.forward(&fake_base, &noise, Phase::Training);

            losses.discriminator = discriminator_step(
                &mut discriminator,
                &mut d_optimizer,
                cfg,
                real,
                &fake,
            );

            if generator_step {
                let (adversarial, rec_loss) = update_generator(
                    &mut generator,
                    &discriminator,
                    &mut g_optimizer,
                    cfg,
                    &target,
                    &fake_base,
                    ctx,
                );
                losses.generator = adversarial;
                losses.reconstruction = rec_loss;
            }

            let done = step + 1;
            reporter.advance(done);
            if done % cfg.log_every == 0 || done == total_steps {
                if !losses.is_finite() {
                    warn!(level, step = done, ?losses, "Non-finite loss");
                }
                info!(
                    level,
                    step = done,
                    d_loss = losses.discriminator,
                    g_loss = losses.generator,
                    rec_loss = losses.reconstruction,
                    "Training step"
                );
                reporter.scalars(level, done, &losses);
            }
            if done % cfg.snapshot_every == 0 {
                let rec = generator.forward(&reconstruction_base, target.reconstruction_noise, Phase::Training);
                reporter.image(level, SnapshotKind::Random, Some(done), &fake);
                reporter.image(level, SnapshotKind::Reconstruction, Some(done), &rec);
            }
        }

        info!(
            level,
            d_loss = losses.discriminator,
            g_loss = losses.generator,
            rec_loss = losses.reconstruction,
            generator_updates = g_optimizer.steps(),
            "Finished scale"
        );
        let learning_rate = g_optimizer.learning_rate();
        stack.append(generator, discriminator, amplitude);

        ScaleReport {
            level,
            size,
            noise_amplitude: amplitude,
            steps: total_steps,
            learning_rate,
            losses,
        }
    }

    /// Step index at which learning rates drop by `gamma`, if decay is
    /// enabled and falls inside the schedule.
    pub fn decay_step(&self) -> Option<usize> {
        let total = self.total_steps();
        self.config
            .lr_decay_at
            .map(|fraction| (fraction * total as f32) as usize)
            .filter(|&step| step < total)
    }
}

/// Per-level values shared by every generator update.
struct LevelTarget<'b> {
    real: &'b Array3<f32>,
    amplitude: f32,
    sampler: &'b NoiseSampler,
    reconstruction_base: &'b Array3<f32>,
    reconstruction_noise: &'b Array3<f32>,
}

fn discriminator_step(
    discriminator: &mut Discriminator,
    optimizer: &mut Adam,
    cfg: &TrainingConfig,
    real: &Array3<f32>,
    fake: &Array3<f32>,
) -> f32 {
    discriminator.power_iterate();
    let (real_score, real_trace) = discriminator.forward_traced(real, Phase::Training);
    let (fake_score, fake_trace) = discriminator.forward_traced(fake, Phase::Training);
    let loss = cfg.gan_loss.discriminator(&real_score, &fake_score);

    let (_, mut grads) = discriminator.backward(&real_trace, &loss.real_grad);
    let (_, fake_grads) = discriminator.backward(&fake_trace, &loss.fake_grad);
    grads.accumulate(&fake_grads);

    discriminator.record_statistics(&real_trace);
    discriminator.record_statistics(&fake_trace);
    optimizer.step(discriminator, &grads);
    loss.value
}

/// One generator update against the freshly updated discriminator. The fake
/// is synthesized again from new noise. Returns the adversarial and the
/// reconstruction loss.
fn update_generator(
    generator: &mut Generator,
    discriminator: &Discriminator,
    optimizer: &mut Adam,
    cfg: &TrainingConfig,
    target: &LevelTarget<'_>,
    fake_base: &Array3<f32>,
    ctx: &mut ExecutionContext,
) -> (f32, f32) {
    let size = size_of(target.real);
    let noise = target.sampler.sample(size, target.amplitude, ctx);
    let (fake, fake_trace) = generator.forward_traced(fake_base, &noise, Phase::Training);

    let (score, d_trace) = discriminator.forward_traced(&fake, Phase::Training);
    let (adversarial, grad_score) = cfg.gan_loss.generator(&score);
    let (grad_fake, _) = discriminator.backward(&d_trace, &grad_score);
    let mut grads = generator.backward(&fake_trace, &grad_fake);

    let (rec, rec_trace) = generator.forward_traced(
        target.reconstruction_base,
        target.reconstruction_noise,
        Phase::Training,
    );
    let (rec_loss, mut rec_grad) = cfg.reconstruction_loss.evaluate(target.real, &rec);
    rec_grad *= cfg.alpha;
    grads.accumulate(&generator.backward(&rec_trace, &rec_grad));

    generator.record_statistics(&fake_trace);
    generator.record_statistics(&rec_trace);
    optimizer.step(generator, &grads);
    (adversarial, rec_loss)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NoiseChannels, NoisePadding, RoleConfig};
    use crate::size::Size;

    #[test]
    fn generator_update_draws_its_own_noise() {
        let mut init = ExecutionContext::seeded(0);
        let generator = Generator::new(4, RoleConfig::default(), &mut init);
        let discriminator = Discriminator::new(4, RoleConfig::default(), &mut init);
        let cfg = TrainingConfig::default();
        let sampler = NoiseSampler::new(NoisePadding::Noise, NoiseChannels::Rgb);

        let size = Size::new(22, 22);
        let real = Array3::from_elem((3, 22, 22), 0.3);
        let fake_base = zero_pad(&zeros(size), sampler.border());
        let reconstruction_noise = sampler.zeros(size);
        let target = LevelTarget {
            real: &real,
            amplitude: 1.0,
            sampler: &sampler,
            reconstruction_base: &fake_base,
            reconstruction_noise: &reconstruction_noise,
        };

        let run = |ctx: &mut ExecutionContext| {
            let mut g = generator.clone();
            let mut optimizer = Adam::new(cfg.learning_rate, cfg.beta1, cfg.beta2);
            update_generator(&mut g, &discriminator, &mut optimizer, &cfg, &target, &fake_base, ctx).0
        };

        let mut ctx = ExecutionContext::seeded(1);
        let first = run(&mut ctx);
        assert_eq!(first, run(&mut ExecutionContext::seeded(1)));
        assert_ne!(first, run(&mut ExecutionContext::seeded(2)));

        let mut fresh = ExecutionContext::seeded(1);
        assert_ne!(ctx.standard_normal((1, 2, 2)), fresh.standard_normal((1, 2, 2)));
    }

    #[test]
    fn decay_step_falls_inside_the_schedule() {
        let pyramid = ImagePyramid::from_images(vec![Array3::zeros((3, 25, 25))]);
        let noises = vec![Array3::zeros((3, 35, 35))];
        let mut cfg = TrainingConfig {
            steps_per_layer: 10,
            disc_ratio: 2,
            ..TrainingConfig::default()
        };
        assert_eq!(ScaleTrainer::new(&cfg, &pyramid, &noises).decay_step(), Some(16));

        cfg.lr_decay_at = Some(1.0);
        assert_eq!(ScaleTrainer::new(&cfg, &pyramid, &noises).decay_step(), None);

        cfg.lr_decay_at = None;
        assert_eq!(ScaleTrainer::new(&cfg, &pyramid, &noises).decay_step(), None);
    }
}
