use ndarray::{Array3, ArrayViewMutD, Zip};

use crate::config::RoleConfig;
use crate::consts::{COLOR_CHANNEL_COUNT, NOISE_PADDING};
use crate::context::{ExecutionContext, Phase};
use crate::nn::network::{ConvStack, StackTrace};
use crate::nn::{Gradients, Module};
use crate::ops::crop_border;

/// Refines a padded base image: `tanh(net(base + noise)) + crop(base)`.
///
/// `base` and `noise` share the padded spatial size. Single-channel noise
/// is broadcast over the color channels. The output has the unpadded size.
#[derive(Clone, Debug)]
pub struct Generator {
    net: ConvStack,
}

#[derive(Clone, Debug)]
pub struct GeneratorTrace {
    net: StackTrace,
    activation: Array3<f32>,
}

impl Generator {
    pub fn new(channels: usize, role: RoleConfig, ctx: &mut ExecutionContext) -> Self {
        debug_assert_eq!(ConvStack::shrinkage(), 2 * NOISE_PADDING);
        Self {
            net: ConvStack::new(channels, COLOR_CHANNEL_COUNT, role, ctx),
        }
    }

    /// Forward pass without a trace, for sampling.
    pub fn forward(&self, base: &Array3<f32>, noise: &Array3<f32>, phase: Phase) -> Array3<f32> {
        check_shapes(base, noise);
        let raw = self.net.apply(&(base + noise), phase);
        raw.mapv(f32::tanh) + crop_border(base, NOISE_PADDING)
    }

    pub fn forward_traced(
        &self,
        base: &Array3<f32>,
        noise: &Array3<f32>,
        phase: Phase,
    ) -> (Array3<f32>, GeneratorTrace) {
        check_shapes(base, noise);
        let input = base + noise;
        let (raw, net) = self.net.forward(&input, phase);
        let activation = raw.mapv(f32::tanh);
        let out = &activation + &crop_border(base, NOISE_PADDING);
        (out, GeneratorTrace { net, activation })
    }

    /// Parameter gradients for `grad_out`. Base and noise are constants.
    pub fn backward(&self, trace: &GeneratorTrace, grad_out: &Array3<f32>) -> Gradients {
        let mut grad = grad_out.clone();
        Zip::from(&mut grad)
            .and(&trace.activation)
            .for_each(|g, &t| *g *= 1.0 - t * t);
        self.net.backward(&trace.net, &grad).1
    }

    pub fn record_statistics(&mut self, trace: &GeneratorTrace) {
        self.net.record_statistics(&trace.net);
    }
}

impl Module for Generator {
    fn parameters_mut(&mut self) -> Vec<ArrayViewMutD<'_, f32>> {
        self.net.parameters_mut()
    }

    fn power_iterate(&mut self) {
        self.net.power_iterate();
    }
}

/// Scores every receptive-field patch of an image; the score map is the
/// image size shrunk by the network's valid convolutions.
#[derive(Clone, Debug)]
pub struct Discriminator {
    net: ConvStack,
}

#[derive(Clone, Debug)]
pub struct DiscriminatorTrace {
    net: StackTrace,
}

impl Discriminator {
    pub fn new(channels: usize, role: RoleConfig, ctx: &mut ExecutionContext) -> Self {
        Self {
            net: ConvStack::new(channels, 1, role, ctx),
        }
    }

    pub fn forward(&self, image: &Array3<f32>, phase: Phase) -> Array3<f32> {
        self.net.apply(image, phase)
    }

    pub fn forward_traced(&self, image: &Array3<f32>, phase: Phase) -> (Array3<f32>, DiscriminatorTrace) {
        let (score, net) = self.net.forward(image, phase);
        (score, DiscriminatorTrace { net })
    }

    /// Input gradient and parameter gradients for `grad_score`.
    pub fn backward(
        &self,
        trace: &DiscriminatorTrace,
        grad_score: &Array3<f32>,
    ) -> (Array3<f32>, Gradients) {
        self.net.backward(&trace.net, grad_score)
    }

    pub fn record_statistics(&mut self, trace: &DiscriminatorTrace) {
        self.net.record_statistics(&trace.net);
    }
}

impl Module for Discriminator {
    fn parameters_mut(&mut self) -> Vec<ArrayViewMutD<'_, f32>> {
        self.net.parameters_mut()
    }

    fn power_iterate(&mut self) {
        self.net.power_iterate();
    }
}

fn check_shapes(base: &Array3<f32>, noise: &Array3<f32>) {
    let (_, bh, bw) = base.dim();
    let (_, nh, nw) = noise.dim();
    assert_eq!(
        (bh, bw),
        (nh, nw),
        "generator base is {bw}x{bh} but noise is {nw}x{nh}"
    );
}
