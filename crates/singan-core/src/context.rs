use ndarray::Array3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

/// Whether networks run with their current statistics (training) or with
/// the running statistics they accumulated (inference).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Training,
    Inference,
}

/// Explicit execution state threaded through every call that draws random
/// numbers or depends on the learning phase.
pub struct ExecutionContext {
    rng: StdRng,
    pub phase: Phase,
}

impl ExecutionContext {
    /// Reproducible context: the same seed yields the same run.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            phase: Phase::Training,
        }
    }

    /// Context drawing its seed from OS entropy.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            phase: Phase::Training,
        }
    }

    /// Seeded when `seed` is given, entropy-backed otherwise.
    pub fn new(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed),
            None => Self::from_entropy(),
        }
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    pub fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    /// Tensor of independent standard normal samples.
    pub fn standard_normal(&mut self, shape: (usize, usize, usize)) -> Array3<f32> {
        let rng = &mut self.rng;
        Array3::from_shape_simple_fn(shape, || rng.sample::<f32, _>(StandardNormal))
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}
