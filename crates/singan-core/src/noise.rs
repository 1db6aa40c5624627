use ndarray::Array3;

use crate::config::{NoiseChannels, NoisePadding};
use crate::consts::NOISE_PADDING;
use crate::context::ExecutionContext;
use crate::ops::zero_pad;
use crate::size::Size;

/// Draws the noise injected into generator inputs.
///
/// The sampler holds no random state of its own; every draw comes from the
/// caller's [`ExecutionContext`]. Its output always has the padded spatial
/// size of the generator input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NoiseSampler {
    padding: NoisePadding,
    channels: usize,
    border: usize,
}

impl NoiseSampler {
    pub fn new(padding: NoisePadding, channels: NoiseChannels) -> Self {
        Self {
            padding,
            channels: channels.count(),
            border: NOISE_PADDING,
        }
    }

    pub fn padding(&self) -> NoisePadding {
        self.padding
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Width of the border around generator inputs.
    pub fn border(&self) -> usize {
        self.border
    }

    /// Shape of a noise tensor for an image of `size`.
    pub fn padded_shape(&self, size: Size) -> (usize, usize, usize) {
        size.padded(self.border).shape(self.channels)
    }

    /// Unit-variance noise scaled by `amplitude`.
    pub fn sample(&self, size: Size, amplitude: f32, ctx: &mut ExecutionContext) -> Array3<f32> {
        match self.padding {
            NoisePadding::Zero => {
                let noise = ctx.standard_normal(size.shape(self.channels)) * amplitude;
                zero_pad(&noise, self.border)
            }
            NoisePadding::Noise => ctx.standard_normal(self.padded_shape(size)) * amplitude,
        }
    }

    /// The "no noise" form for an image of `size`.
    pub fn zeros(&self, size: Size) -> Array3<f32> {
        Array3::zeros(self.padded_shape(size))
    }

    /// Fixed noise used for reconstruction: unit noise at the coarsest level,
    /// zeros everywhere else.
    pub fn reconstruction_noises(
        &self,
        sizes: &[Size],
        ctx: &mut ExecutionContext,
    ) -> Vec<Array3<f32>> {
        sizes
            .iter()
            .enumerate()
            .map(|(level, &size)| {
                if level == 0 {
                    self.sample(size, 1.0, ctx)
                } else {
                    self.zeros(size)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_padding_keeps_border_exact() {
        let sampler = NoiseSampler::new(NoisePadding::Zero, NoiseChannels::Rgb);
        let mut ctx = ExecutionContext::seeded(3);
        let noise = sampler.sample(Size::new(8, 6), 2.0, &mut ctx);
        assert_eq!(noise.dim(), (3, 16, 18));
        for c in 0..3 {
            for col in 0..18 {
                assert_eq!(noise[[c, 0, col]], 0.0);
                assert_eq!(noise[[c, 4, col]], 0.0);
                assert_eq!(noise[[c, 15, col]], 0.0);
            }
        }
        assert!(noise.iter().any(|&v| v != 0.0));
    }

    #[test]
    fn noise_padding_fills_border() {
        let sampler = NoiseSampler::new(NoisePadding::Noise, NoiseChannels::Single);
        let mut ctx = ExecutionContext::seeded(3);
        let noise = sampler.sample(Size::new(8, 6), 1.0, &mut ctx);
        assert_eq!(noise.dim(), (1, 16, 18));
        assert!((0..18).any(|col| noise[[0, 0, col]] != 0.0));
    }

    #[test]
    fn zero_amplitude_is_silent() {
        let sampler = NoiseSampler::new(NoisePadding::Noise, NoiseChannels::Rgb);
        let mut ctx = ExecutionContext::seeded(3);
        let noise = sampler.sample(Size::new(5, 5), 0.0, &mut ctx);
        assert!(noise.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn reconstruction_noise_only_at_coarsest_level() {
        let sampler = NoiseSampler::new(NoisePadding::Noise, NoiseChannels::Rgb);
        let mut ctx = ExecutionContext::seeded(3);
        let sizes = [Size::new(20, 20), Size::new(26, 26), Size::new(35, 35)];
        let noises = sampler.reconstruction_noises(&sizes, &mut ctx);
        assert_eq!(noises.len(), 3);
        assert_eq!(noises[2].dim(), (3, 45, 45));
        assert!(noises[0].iter().any(|&v| v != 0.0));
        assert!(noises[1].iter().all(|&v| v == 0.0));
        assert!(noises[2].iter().all(|&v| v == 0.0));
    }
}
