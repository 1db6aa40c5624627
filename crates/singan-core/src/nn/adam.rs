use ndarray::{ArrayD, Zip};

use crate::consts::ADAM_EPSILON;
use crate::nn::{Gradients, Module};

/// Adam with bias-corrected moment estimates. Moment buffers are created on
/// the first step and bound to the parameter layout of that module.
#[derive(Clone, Debug)]
pub struct Adam {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    step: i32,
    first_moments: Vec<ArrayD<f32>>,
    second_moments: Vec<ArrayD<f32>>,
}

impl Adam {
    pub fn new(learning_rate: f32, beta1: f32, beta2: f32) -> Self {
        Self {
            learning_rate,
            beta1,
            beta2,
            step: 0,
            first_moments: Vec::new(),
            second_moments: Vec::new(),
        }
    }

    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    pub fn set_learning_rate(&mut self, learning_rate: f32) {
        self.learning_rate = learning_rate;
    }

    /// Number of updates applied so far.
    pub fn steps(&self) -> i32 {
        self.step
    }

    /// Apply one update of `grads` to the parameters of `module`.
    pub fn step<M: Module + ?Sized>(&mut self, module: &mut M, grads: &Gradients) {
        let mut params = module.parameters_mut();
        assert_eq!(
            params.len(),
            grads.len(),
            "optimizer got {} gradients for {} parameters",
            grads.len(),
            params.len()
        );

        if self.first_moments.is_empty() {
            self.first_moments = grads.iter().map(|g| ArrayD::zeros(g.raw_dim())).collect();
            self.second_moments = self.first_moments.clone();
        }

        self.step += 1;
        let correction1 = 1.0 - self.beta1.powi(self.step);
        let correction2 = 1.0 - self.beta2.powi(self.step);
        let step_size = self.learning_rate * correction2.sqrt() / correction1;
        let (beta1, beta2) = (self.beta1, self.beta2);

        for (((param, grad), m), v) in params
            .iter_mut()
            .zip(grads.iter())
            .zip(&mut self.first_moments)
            .zip(&mut self.second_moments)
        {
            Zip::from(param)
                .and(grad)
                .and(m)
                .and(v)
                .for_each(|p, &g, m, v| {
                    *m = beta1 * *m + (1.0 - beta1) * g;
                    *v = beta2 * *v + (1.0 - beta2) * g * g;
                    *p -= step_size * *m / (v.sqrt() + ADAM_EPSILON);
                });
        }
    }
}
