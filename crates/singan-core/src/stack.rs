//! Append-only stack of per-scale models and the cross-scale generation
//! protocol.
//!
//! Each trained level owns a generator, a discriminator and the amplitude of
//! the noise injected at that level. Generation runs coarse to fine: every
//! level upsamples the previous level's output, pads it and lets its
//! generator add detail on top.

use ndarray::Array3;
use tracing::debug;

use crate::config::{NetworkConfig, SinGanConfig};
use crate::context::ExecutionContext;
use crate::nn::{Discriminator, Generator};
use crate::noise::NoiseSampler;
use crate::ops::{resize_bilinear, size_of, zero_pad, zeros};
use crate::size::Size;

#[derive(Clone, Debug)]
pub struct ModelStack {
    generators: Vec<Generator>,
    discriminators: Vec<Discriminator>,
    noise_amplitudes: Vec<f32>,
    network: NetworkConfig,
    sampler: NoiseSampler,
    scale_factor: f32,
}

impl ModelStack {
    pub fn new(network: NetworkConfig, sampler: NoiseSampler, scale_factor: f32) -> Self {
        Self {
            generators: Vec::new(),
            discriminators: Vec::new(),
            noise_amplitudes: Vec::new(),
            network,
            sampler,
            scale_factor,
        }
    }

    /// Empty stack with the network layout and noise policy of `config`.
    pub fn from_config(config: &SinGanConfig) -> Self {
        let sampler = NoiseSampler::new(
            config.training.noise_padding,
            config.network.noise_channels,
        );
        Self::new(config.network.clone(), sampler, config.pyramid.scale_factor)
    }

    pub fn trained_layers(&self) -> usize {
        self.generators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }

    pub fn generators(&self) -> &[Generator] {
        &self.generators
    }

    pub fn discriminators(&self) -> &[Discriminator] {
        &self.discriminators
    }

    pub fn noise_amplitudes(&self) -> &[f32] {
        &self.noise_amplitudes
    }

    pub fn noise_sampler(&self) -> &NoiseSampler {
        &self.sampler
    }

    pub fn scale_factor(&self) -> f32 {
        self.scale_factor
    }

    /// Models for the next level to train. The first level gets freshly
    /// initialized networks; later levels start from an independent copy
    /// of the last trained pair.
    pub fn create_new_models(&self, ctx: &mut ExecutionContext) -> (Generator, Discriminator) {
        match (self.generators.last(), self.discriminators.last()) {
            (Some(g), Some(d)) => (g.clone(), d.clone()),
            _ => {
                let channels = self.network.base_channels;
                (
                    Generator::new(channels, self.network.generator, ctx),
                    Discriminator::new(channels, self.network.discriminator, ctx),
                )
            }
        }
    }

    /// Record a trained level. There is no way to remove it again.
    pub fn append(&mut self, generator: Generator, discriminator: Discriminator, noise_amplitude: f32) {
        debug!(
            level = self.generators.len(),
            noise_amplitude, "Appending trained level"
        );
        self.generators.push(generator);
        self.discriminators.push(discriminator);
        self.noise_amplitudes.push(noise_amplitude);
    }

    /// Random sample: fresh noise at every level, scaled by that level's
    /// amplitude.
    pub fn generate(&self, sizes: &[Size], ctx: &mut ExecutionContext) -> Array3<f32> {
        self.run_levels(sizes, ctx, |stack, level, size, ctx| {
            stack
                .sampler
                .sample(size, stack.noise_amplitudes[level], ctx)
        })
    }

    /// Deterministic sample driven by caller-supplied noise, one tensor per
    /// level. With the reconstruction noise set this reproduces the
    /// training image.
    pub fn generate_with_noises(
        &self,
        sizes: &[Size],
        noises: &[Array3<f32>],
        ctx: &mut ExecutionContext,
    ) -> Array3<f32> {
        if !self.is_empty() {
            assert!(
                noises.len() >= sizes.len(),
                "{} noise tensors for {} levels",
                noises.len(),
                sizes.len()
            );
        }
        self.run_levels(sizes, ctx, |_, level, _, _| noises[level].clone())
    }

    /// Refine `image` (unpadded, already at the level's size) with the
    /// generator of `level`.
    pub fn generate_level(
        &self,
        image: &Array3<f32>,
        level: usize,
        noise: &Array3<f32>,
        ctx: &ExecutionContext,
    ) -> Array3<f32> {
        let base = zero_pad(image, self.sampler.border());
        self.generators[level].forward(&base, noise, ctx.phase)
    }

    /// One super-resolution step: resize to `target` and refine with the
    /// finest generator under fresh noise at the finest amplitude.
    pub fn super_resolution(
        &self,
        image: &Array3<f32>,
        target: Size,
        ctx: &mut ExecutionContext,
    ) -> Array3<f32> {
        let finest = self
            .trained_layers()
            .checked_sub(1)
            .expect("super-resolution needs at least one trained level");
        let resized = resize_bilinear(image, target);
        let noise = self
            .sampler
            .sample(target, self.noise_amplitudes[finest], ctx);
        self.generate_level(&resized, finest, &noise, ctx)
    }

    fn run_levels<F>(&self, sizes: &[Size], ctx: &mut ExecutionContext, mut noise_for: F) -> Array3<f32>
    where
        F: FnMut(&Self, usize, Size, &mut ExecutionContext) -> Array3<f32>,
    {
        assert!(!sizes.is_empty(), "generation needs at least one size");
        let mut image = zeros(sizes[0]);
        if self.is_empty() {
            return image;
        }
        assert_eq!(
            sizes.len(),
            self.trained_layers(),
            "got {} sizes for {} trained levels",
            sizes.len(),
            self.trained_layers()
        );

        for (level, &size) in sizes.iter().enumerate() {
            if size_of(&image) != size {
                image = resize_bilinear(&image, size);
            }
            let noise = noise_for(self, level, size, &mut *ctx);
            image = self.generate_level(&image, level, &noise, ctx);
        }
        image
    }
}
