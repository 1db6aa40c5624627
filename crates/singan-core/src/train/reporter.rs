use ndarray::Array3;

use crate::size::Size;

/// Losses of the most recent discriminator and generator updates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StepLosses {
    pub discriminator: f32,
    /// Adversarial part of the generator loss.
    pub generator: f32,
    /// Unweighted reconstruction loss.
    pub reconstruction: f32,
}

impl StepLosses {
    pub fn is_finite(&self) -> bool {
        self.discriminator.is_finite() && self.generator.is_finite() && self.reconstruction.is_finite()
    }
}

/// Summary of one trained level.
#[derive(Clone, Debug, PartialEq)]
pub struct ScaleReport {
    pub level: usize,
    pub size: Size,
    pub noise_amplitude: f32,
    pub steps: usize,
    /// Learning rate in effect at the end of the level, after any decay.
    pub learning_rate: f32,
    pub losses: StepLosses,
}

/// Which image a snapshot shows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SnapshotKind {
    Random,
    Reconstruction,
}

impl std::fmt::Display for SnapshotKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Random => write!(f, "random"),
            Self::Reconstruction => write!(f, "reconstruction"),
        }
    }
}

/// Observer of training progress.
///
/// Implementors can drive progress bars, write snapshots or collect
/// scalars. Callbacks must not fail the run; report problems through
/// logging instead. All methods default to no-ops.
pub trait TrainingReporter: Send + Sync {
    /// Training of `level` at `size` starts and will take `total_steps`.
    fn begin_scale(&self, _level: usize, _size: Size, _total_steps: usize) {}

    /// `steps_done` steps of the current level have completed.
    fn advance(&self, _steps_done: usize) {}

    /// Periodic scalar report, every `log_every` steps.
    fn scalars(&self, _level: usize, _step: usize, _losses: &StepLosses) {}

    /// An image sample. `step` is `None` for the final samples emitted once
    /// a level is done.
    fn image(&self, _level: usize, _kind: SnapshotKind, _step: Option<usize>, _image: &Array3<f32>) {}

    /// The level is trained and appended to the stack.
    fn finish_scale(&self, _report: &ScaleReport) {}
}

/// Reporter that ignores every event.
pub struct NoOpReporter;

impl TrainingReporter for NoOpReporter {}
