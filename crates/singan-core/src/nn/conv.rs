//! Valid (unpadded) stride-1 convolution with optional spectral
//! normalization.

use ndarray::{s, Array1, Array2, Array3, ArrayD, ArrayViewMutD, Axis};
use rand::Rng;
use rand_distr::StandardNormal;

use crate::consts::{SPECTRAL_EPSILON, WEIGHT_INIT_STD};
use crate::context::ExecutionContext;

/// 2D convolution over a CHW tensor.
///
/// The kernel is stored flattened as `(out_channels, in_channels * k * k)`
/// so forward and backward passes reduce to matrix products over the
/// im2col expansion of the input.
#[derive(Clone, Debug)]
pub struct Conv2d {
    weight: Array2<f32>,
    bias: Array1<f32>,
    in_channels: usize,
    kernel: usize,
    spectral: Option<Array1<f32>>,
}

/// Values cached by [`Conv2d::forward`] for the backward pass.
#[derive(Clone, Debug)]
pub struct ConvTrace {
    cols: Array2<f32>,
    input_dim: (usize, usize, usize),
    sigma: f32,
}

impl Conv2d {
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel: usize,
        spectral_norm: bool,
        ctx: &mut ExecutionContext,
    ) -> Self {
        let fan_in = in_channels * kernel * kernel;
        let rng = ctx.rng();
        let weight = Array2::from_shape_simple_fn((out_channels, fan_in), || {
            rng.sample::<f32, _>(StandardNormal) * WEIGHT_INIT_STD
        });
        let spectral = spectral_norm.then(|| {
            l2_normalize(Array1::from_shape_simple_fn(out_channels, || {
                rng.sample::<f32, _>(StandardNormal)
            }))
        });
        Self {
            weight,
            bias: Array1::zeros(out_channels),
            in_channels,
            kernel,
            spectral,
        }
    }

    pub fn out_channels(&self) -> usize {
        self.weight.nrows()
    }

    /// Largest singular value estimate of the kernel matrix, or 1 when
    /// spectral normalization is disabled.
    pub fn sigma(&self) -> f32 {
        match &self.spectral {
            Some(u) => power_step(&self.weight, u).1,
            None => 1.0,
        }
    }

    /// Advance the stored singular vector by one power iteration.
    pub fn power_iterate(&mut self) {
        if let Some(u) = &self.spectral {
            let (next, _) = power_step(&self.weight, u);
            self.spectral = Some(next);
        }
    }

    pub fn forward(&self, input: &Array3<f32>) -> (Array3<f32>, ConvTrace) {
        let (c, h, w) = input.dim();
        assert_eq!(
            c, self.in_channels,
            "conv expects {} input channels, got {c}",
            self.in_channels
        );
        assert!(
            h >= self.kernel && w >= self.kernel,
            "{w}x{h} input is smaller than the {k}x{k} kernel",
            k = self.kernel
        );
        let (out_h, out_w) = (h - self.kernel + 1, w - self.kernel + 1);

        let cols = im2col(input, self.kernel);
        let sigma = self.sigma();
        let mut out = self.weight.dot(&cols);
        if sigma != 1.0 {
            out /= sigma;
        }
        out += &self.bias.view().insert_axis(Axis(1));

        let out = out
            .to_shape((self.out_channels(), out_h, out_w))
            .expect("conv output size matches dimensions")
            .into_owned();
        let trace = ConvTrace {
            cols,
            input_dim: (c, h, w),
            sigma,
        };
        (out, trace)
    }

    /// Output only. The im2col buffer is released before returning.
    pub fn apply(&self, input: &Array3<f32>) -> Array3<f32> {
        self.forward(input).0
    }

    /// Returns the input gradient and the gradients of `[weight, bias]`.
    pub fn backward(
        &self,
        trace: &ConvTrace,
        grad_out: &Array3<f32>,
    ) -> (Array3<f32>, Vec<ArrayD<f32>>) {
        let (o, out_h, out_w) = grad_out.dim();
        let grad = grad_out
            .to_shape((o, out_h * out_w))
            .expect("conv gradient size matches dimensions");

        // Sigma is held constant through the backward pass.
        let grad_weight = grad.dot(&trace.cols.t()) / trace.sigma;
        let grad_bias = grad.sum_axis(Axis(1));

        let mut grad_cols = self.weight.t().dot(&grad);
        if trace.sigma != 1.0 {
            grad_cols /= trace.sigma;
        }
        let grad_input = col2im(&grad_cols, trace.input_dim, self.kernel, (out_h, out_w));

        (grad_input, vec![grad_weight.into_dyn(), grad_bias.into_dyn()])
    }

    /// Mutable views of `[weight, bias]`.
    pub fn parameters_mut(&mut self) -> Vec<ArrayViewMutD<'_, f32>> {
        vec![self.weight.view_mut().into_dyn(), self.bias.view_mut().into_dyn()]
    }
}

/// Expand every k x k patch of `input` into a column.
fn im2col(input: &Array3<f32>, kernel: usize) -> Array2<f32> {
    let (c, h, w) = input.dim();
    let (out_h, out_w) = (h - kernel + 1, w - kernel + 1);
    let mut cols = Array2::<f32>::zeros((c * kernel * kernel, out_h * out_w));

    for ic in 0..c {
        for kh in 0..kernel {
            for kw in 0..kernel {
                let row = (ic * kernel + kh) * kernel + kw;
                let patch = input.slice(s![ic, kh..kh + out_h, kw..kw + out_w]);
                for (dst, &src) in cols.row_mut(row).iter_mut().zip(patch.iter()) {
                    *dst = src;
                }
            }
        }
    }

    cols
}

/// Scatter-add columns back onto an input-shaped tensor.
fn col2im(
    cols: &Array2<f32>,
    input_dim: (usize, usize, usize),
    kernel: usize,
    out_dim: (usize, usize),
) -> Array3<f32> {
    let (c, _, _) = input_dim;
    let (out_h, out_w) = out_dim;
    let mut grad = Array3::<f32>::zeros(input_dim);

    for ic in 0..c {
        for kh in 0..kernel {
            for kw in 0..kernel {
                let row = (ic * kernel + kh) * kernel + kw;
                let mut dst = grad.slice_mut(s![ic, kh..kh + out_h, kw..kw + out_w]);
                for (d, &g) in dst.iter_mut().zip(cols.row(row).iter()) {
                    *d += g;
                }
            }
        }
    }

    grad
}

/// One power iteration: returns the refreshed left singular vector and the
/// resulting singular value estimate.
fn power_step(weight: &Array2<f32>, u: &Array1<f32>) -> (Array1<f32>, f32) {
    let v = l2_normalize(weight.t().dot(u));
    let wv = weight.dot(&v);
    let next = l2_normalize(wv.clone());
    let sigma = next.dot(&wv);
    (next, sigma.max(SPECTRAL_EPSILON))
}

fn l2_normalize(v: Array1<f32>) -> Array1<f32> {
    let norm = v.dot(&v).sqrt() + SPECTRAL_EPSILON;
    v / norm
}
