use ndarray::{Array1, Array3, ArrayD, ArrayViewMutD, Axis, Zip};
use rand::Rng;
use rand_distr::StandardNormal;

use crate::consts::{NORM_EPSILON, NORM_MOMENTUM, WEIGHT_INIT_STD};
use crate::context::{ExecutionContext, Phase};

/// Per-channel normalization over spatial positions with a learned affine
/// transform. With a batch of one this is batch normalization: training
/// uses the statistics of the current input, inference the running ones.
#[derive(Clone, Debug)]
pub struct FeatureNorm {
    gamma: Array1<f32>,
    beta: Array1<f32>,
    running_mean: Array1<f32>,
    running_var: Array1<f32>,
}

#[derive(Clone, Debug)]
pub struct NormTrace {
    x_hat: Array3<f32>,
    inv_std: Array1<f32>,
    mean: Array1<f32>,
    var: Array1<f32>,
    phase: Phase,
}

impl FeatureNorm {
    pub fn new(channels: usize, ctx: &mut ExecutionContext) -> Self {
        let rng = ctx.rng();
        let gamma = Array1::from_shape_simple_fn(channels, || {
            1.0 + rng.sample::<f32, _>(StandardNormal) * WEIGHT_INIT_STD
        });
        Self {
            gamma,
            beta: Array1::zeros(channels),
            running_mean: Array1::zeros(channels),
            running_var: Array1::ones(channels),
        }
    }

    pub fn forward(&self, x: &Array3<f32>, phase: Phase) -> (Array3<f32>, NormTrace) {
        let (mean, var) = self.statistics(x, phase);
        let inv_std = var.mapv(|v| 1.0 / (v + NORM_EPSILON).sqrt());

        let mut x_hat = x.clone();
        for (ch, mut plane) in x_hat.axis_iter_mut(Axis(0)).enumerate() {
            let (m, s) = (mean[ch], inv_std[ch]);
            plane.mapv_inplace(|v| (v - m) * s);
        }

        let mut y = x_hat.clone();
        for (ch, mut plane) in y.axis_iter_mut(Axis(0)).enumerate() {
            let (g, b) = (self.gamma[ch], self.beta[ch]);
            plane.mapv_inplace(|v| v * g + b);
        }

        let trace = NormTrace {
            x_hat,
            inv_std,
            mean,
            var,
            phase,
        };
        (y, trace)
    }

    /// Normalized output without the values a backward pass needs.
    pub fn apply(&self, x: &Array3<f32>, phase: Phase) -> Array3<f32> {
        let (mean, var) = self.statistics(x, phase);
        let mut y = x.clone();
        for (ch, mut plane) in y.axis_iter_mut(Axis(0)).enumerate() {
            let scale = self.gamma[ch] / (var[ch] + NORM_EPSILON).sqrt();
            let (m, b) = (mean[ch], self.beta[ch]);
            plane.mapv_inplace(|v| (v - m) * scale + b);
        }
        y
    }

    fn statistics(&self, x: &Array3<f32>, phase: Phase) -> (Array1<f32>, Array1<f32>) {
        match phase {
            Phase::Training => {
                let (c, h, w) = x.dim();
                let n = (h * w) as f32;
                let mean = x.sum_axis(Axis(2)).sum_axis(Axis(1)) / n;
                let mut var = Array1::<f32>::zeros(c);
                for (ch, plane) in x.axis_iter(Axis(0)).enumerate() {
                    let m = mean[ch];
                    var[ch] = plane.iter().map(|&v| (v - m) * (v - m)).sum::<f32>() / n;
                }
                (mean, var)
            }
            Phase::Inference => (self.running_mean.clone(), self.running_var.clone()),
        }
    }

    /// Returns the input gradient and the gradients of `[gamma, beta]`.
    pub fn backward(
        &self,
        trace: &NormTrace,
        grad_y: &Array3<f32>,
    ) -> (Array3<f32>, Vec<ArrayD<f32>>) {
        let (c, h, w) = grad_y.dim();
        let n = (h * w) as f32;
        let mut grad_gamma = Array1::<f32>::zeros(c);
        let mut grad_beta = Array1::<f32>::zeros(c);
        let mut grad_x = Array3::<f32>::zeros((c, h, w));

        for ch in 0..c {
            let dy = grad_y.index_axis(Axis(0), ch);
            let x_hat = trace.x_hat.index_axis(Axis(0), ch);
            let sum_dy: f32 = dy.sum();
            let sum_dy_xhat: f32 = Zip::from(&dy).and(&x_hat).fold(0.0, |acc, &g, &x| acc + g * x);
            grad_beta[ch] = sum_dy;
            grad_gamma[ch] = sum_dy_xhat;

            let scale = self.gamma[ch] * trace.inv_std[ch];
            let mut dx = grad_x.index_axis_mut(Axis(0), ch);
            match trace.phase {
                Phase::Training => {
                    Zip::from(&mut dx).and(&dy).and(&x_hat).for_each(|d, &g, &x| {
                        *d = scale * (g - sum_dy / n - x * sum_dy_xhat / n);
                    });
                }
                Phase::Inference => {
                    Zip::from(&mut dx).and(&dy).for_each(|d, &g| *d = scale * g);
                }
            }
        }

        (grad_x, vec![grad_gamma.into_dyn(), grad_beta.into_dyn()])
    }

    /// Fold the statistics observed in a training forward pass into the
    /// running statistics.
    pub fn record(&mut self, trace: &NormTrace) {
        if trace.phase != Phase::Training {
            return;
        }
        let n = trace.x_hat.len_of(Axis(1)) * trace.x_hat.len_of(Axis(2));
        let unbiased = if n > 1 { n as f32 / (n - 1) as f32 } else { 1.0 };
        Zip::from(&mut self.running_mean)
            .and(&trace.mean)
            .for_each(|r, &m| *r = (1.0 - NORM_MOMENTUM) * *r + NORM_MOMENTUM * m);
        Zip::from(&mut self.running_var)
            .and(&trace.var)
            .for_each(|r, &v| *r = (1.0 - NORM_MOMENTUM) * *r + NORM_MOMENTUM * v * unbiased);
    }

    /// Mutable views of `[gamma, beta]`.
    pub fn parameters_mut(&mut self) -> Vec<ArrayViewMutD<'_, f32>> {
        vec![self.gamma.view_mut().into_dyn(), self.beta.view_mut().into_dyn()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sample_input() -> Array3<f32> {
        Array3::from_shape_fn((2, 4, 5), |(c, r, w)| {
            ((c * 13 + r * 5 + w * 7) % 9) as f32 * 0.3 - 1.0 + c as f32
        })
    }

    fn weights(dim: (usize, usize, usize)) -> Array3<f32> {
        Array3::from_shape_fn(dim, |(c, r, w)| ((c + 2 * r + 3 * w) % 5) as f32 - 2.0)
    }

    fn objective(norm: &FeatureNorm, x: &Array3<f32>) -> f32 {
        let (y, _) = norm.forward(x, Phase::Training);
        (&y * &weights(y.dim())).sum()
    }

    #[test]
    fn training_output_is_normalized() {
        let mut ctx = ExecutionContext::seeded(0);
        let mut norm = FeatureNorm::new(2, &mut ctx);
        norm.gamma.fill(1.0);
        let (y, _) = norm.forward(&sample_input(), Phase::Training);
        for plane in y.axis_iter(Axis(0)) {
            let n = plane.len() as f32;
            let mean = plane.sum() / n;
            let var = plane.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
            assert_abs_diff_eq!(mean, 0.0, epsilon = 1e-5);
            assert_abs_diff_eq!(var, 1.0, epsilon = 1e-3);
        }
    }

    #[test]
    fn training_gradient_matches_finite_differences() {
        let mut ctx = ExecutionContext::seeded(1);
        let norm = FeatureNorm::new(2, &mut ctx);
        let x = sample_input();
        let (y, trace) = norm.forward(&x, Phase::Training);
        let (grad_x, grads) = norm.backward(&trace, &weights(y.dim()));

        let h = 1e-2;
        for idx in [(0, 0, 0), (0, 2, 3), (1, 1, 4), (1, 3, 0)] {
            let mut plus = x.clone();
            plus[idx] += h;
            let mut minus = x.clone();
            minus[idx] -= h;
            let numeric = (objective(&norm, &plus) - objective(&norm, &minus)) / (2.0 * h);
            assert_abs_diff_eq!(grad_x[idx], numeric, epsilon = 2e-2);
        }

        let expected_beta: f32 = weights(y.dim()).index_axis(Axis(0), 1).sum();
        assert_abs_diff_eq!(grads[1][[1]], expected_beta, epsilon = 1e-5);
    }

    #[test]
    fn inference_uses_running_statistics() {
        let mut ctx = ExecutionContext::seeded(2);
        let mut norm = FeatureNorm::new(2, &mut ctx);
        let x = sample_input();
        let (_, trace) = norm.forward(&x, Phase::Training);
        for _ in 0..200 {
            norm.record(&trace);
        }
        let (train_y, _) = norm.forward(&x, Phase::Training);
        let (infer_y, _) = norm.forward(&x, Phase::Inference);
        for (a, b) in train_y.iter().zip(infer_y.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 0.1);
        }
    }

    #[test]
    fn record_ignores_inference_traces() {
        let mut ctx = ExecutionContext::seeded(3);
        let mut norm = FeatureNorm::new(2, &mut ctx);
        let (_, trace) = norm.forward(&sample_input(), Phase::Inference);
        norm.record(&trace);
        assert!(norm.running_mean.iter().all(|&m| m == 0.0));
        assert!(norm.running_var.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn apply_matches_traced_forward() {
        let mut ctx = ExecutionContext::seeded(4);
        let mut norm = FeatureNorm::new(2, &mut ctx);
        let x = sample_input();
        let (_, trace) = norm.forward(&x, Phase::Training);
        norm.record(&trace);
        for phase in [Phase::Training, Phase::Inference] {
            let (traced, _) = norm.forward(&x, phase);
            let plain = norm.apply(&x, phase);
            for (a, b) in traced.iter().zip(plain.iter()) {
                assert_abs_diff_eq!(*a, *b, epsilon = 1e-5);
            }
        }
    }
}
