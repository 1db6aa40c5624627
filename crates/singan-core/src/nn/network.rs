//! Fully convolutional body shared by the generator and the discriminator.

use ndarray::{Array3, ArrayViewMutD, Zip};

use crate::config::RoleConfig;
use crate::consts::{BODY_BLOCKS, COLOR_CHANNEL_COUNT, KERNEL_SIZE, LEAKY_RELU_SLOPE};
use crate::context::{ExecutionContext, Phase};
use crate::nn::conv::{Conv2d, ConvTrace};
use crate::nn::norm::{FeatureNorm, NormTrace};
use crate::nn::Gradients;

/// conv -> optional feature norm -> LeakyReLU.
#[derive(Clone, Debug)]
pub struct ConvBlock {
    conv: Conv2d,
    norm: Option<FeatureNorm>,
}

#[derive(Clone, Debug)]
pub struct BlockTrace {
    conv: ConvTrace,
    norm: Option<NormTrace>,
    pre_activation: Array3<f32>,
}

impl ConvBlock {
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        role: RoleConfig,
        ctx: &mut ExecutionContext,
    ) -> Self {
        let conv = Conv2d::new(in_channels, out_channels, KERNEL_SIZE, role.spectral_norm, ctx);
        let norm = role
            .feature_norm
            .then(|| FeatureNorm::new(out_channels, ctx));
        Self { conv, norm }
    }

    pub fn forward(&self, input: &Array3<f32>, phase: Phase) -> (Array3<f32>, BlockTrace) {
        let (conv_out, conv_trace) = self.conv.forward(input);
        let (pre_activation, norm_trace) = match &self.norm {
            Some(norm) => {
                let (y, t) = norm.forward(&conv_out, phase);
                (y, Some(t))
            }
            None => (conv_out, None),
        };
        let out = pre_activation.mapv(leaky_relu);
        let trace = BlockTrace {
            conv: conv_trace,
            norm: norm_trace,
            pre_activation,
        };
        (out, trace)
    }

    fn apply(&self, input: &Array3<f32>, phase: Phase) -> Array3<f32> {
        let conv_out = self.conv.apply(input);
        let mut out = match &self.norm {
            Some(norm) => norm.apply(&conv_out, phase),
            None => conv_out,
        };
        out.mapv_inplace(leaky_relu);
        out
    }

    fn backward(&self, trace: &BlockTrace, grad_out: &Array3<f32>) -> (Array3<f32>, Gradients) {
        let mut grad = grad_out.clone();
        Zip::from(&mut grad)
            .and(&trace.pre_activation)
            .for_each(|g, &x| *g *= leaky_relu_slope(x));

        let mut norm_grads = Vec::new();
        if let (Some(norm), Some(norm_trace)) = (&self.norm, &trace.norm) {
            let (g, params) = norm.backward(norm_trace, &grad);
            grad = g;
            norm_grads = params;
        }

        let (grad_input, mut params) = self.conv.backward(&trace.conv, &grad);
        params.extend(norm_grads);
        (grad_input, Gradients::from(params))
    }

    fn record_statistics(&mut self, trace: &BlockTrace) {
        if let (Some(norm), Some(norm_trace)) = (&mut self.norm, &trace.norm) {
            norm.record(norm_trace);
        }
    }

    fn parameters_mut(&mut self) -> Vec<ArrayViewMutD<'_, f32>> {
        let mut params = self.conv.parameters_mut();
        if let Some(norm) = &mut self.norm {
            params.extend(norm.parameters_mut());
        }
        params
    }
}

/// Head block (RGB -> C), body blocks (C -> C) and a plain tail conv
/// (C -> out). Every conv is valid, so each side shrinks by
/// `(BODY_BLOCKS + 2) * (KERNEL_SIZE - 1)` pixels.
#[derive(Clone, Debug)]
pub struct ConvStack {
    blocks: Vec<ConvBlock>,
    tail: Conv2d,
}

#[derive(Clone, Debug)]
pub struct StackTrace {
    blocks: Vec<BlockTrace>,
    tail: ConvTrace,
}

impl ConvStack {
    pub fn new(
        channels: usize,
        out_channels: usize,
        role: RoleConfig,
        ctx: &mut ExecutionContext,
    ) -> Self {
        let mut blocks = Vec::with_capacity(BODY_BLOCKS + 1);
        blocks.push(ConvBlock::new(COLOR_CHANNEL_COUNT, channels, role, ctx));
        for _ in 0..BODY_BLOCKS {
            blocks.push(ConvBlock::new(channels, channels, role, ctx));
        }
        let tail = Conv2d::new(channels, out_channels, KERNEL_SIZE, role.spectral_norm, ctx);
        Self { blocks, tail }
    }

    /// Total pixels removed from each spatial dimension.
    pub fn shrinkage() -> usize {
        (BODY_BLOCKS + 2) * (KERNEL_SIZE - 1)
    }

    pub fn forward(&self, input: &Array3<f32>, phase: Phase) -> (Array3<f32>, StackTrace) {
        let mut traces = Vec::with_capacity(self.blocks.len());
        let mut x = input.clone();
        for block in &self.blocks {
            let (y, trace) = block.forward(&x, phase);
            traces.push(trace);
            x = y;
        }
        let (out, tail) = self.tail.forward(&x);
        (
            out,
            StackTrace {
                blocks: traces,
                tail,
            },
        )
    }

    /// Forward pass for sampling. Each layer's intermediate buffers are
    /// dropped before the next layer runs.
    pub fn apply(&self, input: &Array3<f32>, phase: Phase) -> Array3<f32> {
        let mut blocks = self.blocks.iter();
        let mut x = match blocks.next() {
            Some(head) => head.apply(input, phase),
            None => input.clone(),
        };
        for block in blocks {
            x = block.apply(&x, phase);
        }
        self.tail.apply(&x)
    }

    /// Backpropagate `grad_out`. Parameter gradients are returned in the
    /// order of [`ConvStack::parameters_mut`].
    pub fn backward(&self, trace: &StackTrace, grad_out: &Array3<f32>) -> (Array3<f32>, Gradients) {
        let (mut grad, tail_params) = self.tail.backward(&trace.tail, grad_out);

        let mut per_block = Vec::with_capacity(self.blocks.len());
        for (block, block_trace) in self.blocks.iter().zip(&trace.blocks).rev() {
            let (g, params) = block.backward(block_trace, &grad);
            grad = g;
            per_block.push(params);
        }

        let mut grads = Gradients::default();
        for params in per_block.into_iter().rev() {
            grads.extend(params);
        }
        grads.extend(Gradients::from(tail_params));
        (grad, grads)
    }

    /// Fold the normalization statistics of a training pass into the
    /// running statistics.
    pub fn record_statistics(&mut self, trace: &StackTrace) {
        for (block, block_trace) in self.blocks.iter_mut().zip(&trace.blocks) {
            block.record_statistics(block_trace);
        }
    }

    pub fn power_iterate(&mut self) {
        for block in &mut self.blocks {
            block.conv.power_iterate();
        }
        self.tail.power_iterate();
    }

    pub fn parameters_mut(&mut self) -> Vec<ArrayViewMutD<'_, f32>> {
        let mut params: Vec<_> = self
            .blocks
            .iter_mut()
            .flat_map(|block| block.parameters_mut())
            .collect();
        params.extend(self.tail.parameters_mut());
        params
    }
}

fn leaky_relu(x: f32) -> f32 {
    if x > 0.0 {
        x
    } else {
        LEAKY_RELU_SLOPE * x
    }
}

fn leaky_relu_slope(x: f32) -> f32 {
    if x > 0.0 {
        1.0
    } else {
        LEAKY_RELU_SLOPE
    }
}
