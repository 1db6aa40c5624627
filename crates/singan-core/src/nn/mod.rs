//! Minimal CPU network runtime: layers with hand-written backward passes,
//! the two SinGAN network roles and the Adam optimizer.

pub mod adam;
pub mod conv;
pub mod models;
pub mod network;
pub mod norm;

use ndarray::{ArrayD, ArrayViewMutD, Zip};

pub use adam::Adam;
pub use models::{Discriminator, Generator};

/// Something with trainable parameters.
pub trait Module {
    /// Mutable views of every trainable array, in a fixed order that
    /// matches the gradients produced by the module's backward pass.
    fn parameters_mut(&mut self) -> Vec<ArrayViewMutD<'_, f32>>;

    /// Advance spectral-norm power iterations, if any.
    fn power_iterate(&mut self) {}

    fn parameter_count(&mut self) -> usize {
        self.parameters_mut().iter().map(|p| p.len()).sum()
    }
}

/// Per-parameter gradient buffers, ordered like [`Module::parameters_mut`].
#[derive(Clone, Debug, Default)]
pub struct Gradients {
    buffers: Vec<ArrayD<f32>>,
}

impl Gradients {
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ArrayD<f32>> {
        self.buffers.iter()
    }

    /// Append the gradients of further parameters.
    pub fn extend(&mut self, other: Gradients) {
        self.buffers.extend(other.buffers);
    }

    /// Add the gradients of another pass over the same parameters.
    pub fn accumulate(&mut self, other: &Gradients) {
        if self.buffers.is_empty() {
            self.buffers = other.buffers.clone();
            return;
        }
        assert_eq!(
            self.buffers.len(),
            other.buffers.len(),
            "gradient sets cover different parameters"
        );
        for (acc, g) in self.buffers.iter_mut().zip(&other.buffers) {
            Zip::from(acc).and(g).for_each(|a, &b| *a += b);
        }
    }
}

impl From<Vec<ArrayD<f32>>> for Gradients {
    fn from(buffers: Vec<ArrayD<f32>>) -> Self {
        Self { buffers }
    }
}
