//! Adversarial and reconstruction losses.
//!
//! Every loss returns its scalar value together with the gradient of that
//! value with respect to the scored tensor(s), so the trainer can feed the
//! gradient straight into a backward pass.

use ndarray::{Array3, Zip};
use serde::{Deserialize, Serialize};

use crate::consts::EPSILON;

/// Adversarial loss family.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GanLoss {
    NonSaturating,
    LeastSquares,
    #[default]
    Hinge,
}

impl std::fmt::Display for GanLoss {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonSaturating => write!(f, "Non-saturating"),
            Self::LeastSquares => write!(f, "Least squares"),
            Self::Hinge => write!(f, "Hinge"),
        }
    }
}

/// Discriminator loss value with the gradients for both score maps.
#[derive(Clone, Debug)]
pub struct DiscriminatorLoss {
    pub value: f32,
    pub real_grad: Array3<f32>,
    pub fake_grad: Array3<f32>,
}

impl GanLoss {
    /// Generator loss of the discriminator's score on a fake image.
    pub fn generator(&self, fake_score: &Array3<f32>) -> (f32, Array3<f32>) {
        let n = fake_score.len() as f32;
        match self {
            Self::NonSaturating => (
                mean_of(fake_score, |x| softplus(-x)),
                fake_score.mapv(|x| -sigmoid(-x) / n),
            ),
            Self::LeastSquares => (
                mean_of(fake_score, |x| (x - 1.0).powi(2)),
                fake_score.mapv(|x| 2.0 * (x - 1.0) / n),
            ),
            Self::Hinge => (-mean_of(fake_score, |x| x), fake_score.mapv(|_| -1.0 / n)),
        }
    }

    /// Discriminator loss of its scores on a real and a fake image.
    pub fn discriminator(
        &self,
        real_score: &Array3<f32>,
        fake_score: &Array3<f32>,
    ) -> DiscriminatorLoss {
        let nr = real_score.len() as f32;
        let nf = fake_score.len() as f32;
        match self {
            Self::NonSaturating => DiscriminatorLoss {
                value: mean_of(real_score, |r| softplus(-r)) + mean_of(fake_score, softplus),
                real_grad: real_score.mapv(|r| -sigmoid(-r) / nr),
                fake_grad: fake_score.mapv(|f| sigmoid(f) / nf),
            },
            Self::LeastSquares => DiscriminatorLoss {
                value: mean_of(real_score, |r| (r - 1.0).powi(2))
                    + mean_of(fake_score, |f| f * f),
                real_grad: real_score.mapv(|r| 2.0 * (r - 1.0) / nr),
                fake_grad: fake_score.mapv(|f| 2.0 * f / nf),
            },
            Self::Hinge => DiscriminatorLoss {
                value: mean_of(real_score, |r| (1.0 - r).max(0.0))
                    + mean_of(fake_score, |f| (1.0 + f).max(0.0)),
                real_grad: real_score.mapv(|r| if r < 1.0 { -1.0 / nr } else { 0.0 }),
                fake_grad: fake_score.mapv(|f| if f > -1.0 { 1.0 / nf } else { 0.0 }),
            },
        }
    }
}

/// Pixel-wise loss anchoring the reconstruction path to the real image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconstructionLoss {
    #[default]
    MeanSquaredError,
    BinaryCrossEntropy,
}

impl std::fmt::Display for ReconstructionLoss {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MeanSquaredError => write!(f, "MSE"),
            Self::BinaryCrossEntropy => write!(f, "BCE"),
        }
    }
}

impl ReconstructionLoss {
    /// Loss of `fake` against `real`, with the gradient with respect to `fake`.
    pub fn evaluate(&self, real: &Array3<f32>, fake: &Array3<f32>) -> (f32, Array3<f32>) {
        assert_eq!(
            real.dim(),
            fake.dim(),
            "reconstruction loss of mismatched shapes"
        );
        let n = fake.len() as f32;
        match self {
            Self::MeanSquaredError => {
                let mut sum = 0.0f64;
                let mut grad = Array3::<f32>::zeros(fake.dim());
                Zip::from(&mut grad)
                    .and(fake)
                    .and(real)
                    .for_each(|g, &f, &r| {
                        let d = f - r;
                        sum += (d * d) as f64;
                        *g = 2.0 * d / n;
                    });
                ((sum / n as f64) as f32, grad)
            }
            Self::BinaryCrossEntropy => {
                let mut sum = 0.0f64;
                let mut grad = Array3::<f32>::zeros(fake.dim());
                Zip::from(&mut grad)
                    .and(fake)
                    .and(real)
                    .for_each(|g, &f, &r| {
                        let target = ((r + 1.0) / 2.0).clamp(0.0, 1.0);
                        let unit = (f + 1.0) / 2.0;
                        let p = unit.clamp(EPSILON, 1.0 - EPSILON);
                        sum += (-(target * p.ln()) - (1.0 - target) * (1.0 - p).ln()) as f64;
                        *g = if unit > 0.0 && unit < 1.0 {
                            0.5 * (-target / p + (1.0 - target) / (1.0 - p)) / n
                        } else {
                            0.0
                        };
                    });
                ((sum / n as f64) as f32, grad)
            }
        }
    }
}

fn mean_of(values: &Array3<f32>, f: impl Fn(f32) -> f32) -> f32 {
    let sum: f64 = values.iter().map(|&v| f(v) as f64).sum();
    (sum / values.len().max(1) as f64) as f32
}

fn softplus(x: f32) -> f32 {
    x.max(0.0) + (-x.abs()).exp().ln_1p()
}

fn sigmoid(x: f32) -> f32 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}
