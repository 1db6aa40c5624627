use std::sync::Mutex;

use image::{Rgb, Rgb32FImage};
use ndarray::Array3;

use singan_core::config::SinGanConfig;
use singan_core::context::ExecutionContext;
use singan_core::pyramid::ImagePyramid;
use singan_core::size::Size;
use singan_core::train::{
    train_pyramid, ScaleReport, SnapshotKind, StepLosses, TrainedPyramid, TrainingReporter,
};

/// Uniformly colored image with channel values in [0, 1].
pub fn solid_rgb(width: u32, height: u32, color: [f32; 3]) -> Rgb32FImage {
    Rgb32FImage::from_pixel(width, height, Rgb(color))
}

/// Smooth diagonal gradient, useful where a constant image is too easy.
pub fn gradient_rgb(width: u32, height: u32) -> Rgb32FImage {
    Rgb32FImage::from_fn(width, height, |x, y| {
        let u = x as f32 / width.max(1) as f32;
        let v = y as f32 / height.max(1) as f32;
        Rgb([u, v, (u + v) / 2.0])
    })
}

/// Config small enough for tests: narrow networks, few steps.
pub fn small_config(min_size: usize, max_size: usize, steps: usize) -> SinGanConfig {
    let mut config = SinGanConfig::default();
    config.network.base_channels = 8;
    config.pyramid.image_min_size = min_size;
    config.pyramid.image_max_size = max_size;
    config.training.steps_per_layer = steps;
    config.training.learning_rate = 5e-3;
    config.training.log_every = 5;
    config.training.snapshot_every = 10_000;
    config
}

/// Build the pyramid of `image` and train every level of it.
pub fn train_image(image: &Rgb32FImage, config: &SinGanConfig, seed: u64) -> TrainedPyramid {
    let pyramid = ImagePyramid::from_rgb(image, &config.pyramid).unwrap();
    let mut ctx = ExecutionContext::seeded(seed);
    train_pyramid(&pyramid, config, &mut ctx, &RecordingReporter::default())
}

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Begin { level: usize, size: Size, total_steps: usize },
    Scalars { level: usize, step: usize },
    Image { level: usize, kind: SnapshotKind, step: Option<usize>, dim: (usize, usize, usize) },
    Finish { level: usize },
}

/// Reporter that keeps every event for later inspection.
#[derive(Default)]
pub struct RecordingReporter {
    pub events: Mutex<Vec<Event>>,
    /// Final per-level images, those reported without a step.
    pub finals: Mutex<Vec<(usize, SnapshotKind, Array3<f32>)>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn final_image(&self, level: usize, kind: SnapshotKind) -> Option<Array3<f32>> {
        self.finals
            .lock()
            .unwrap()
            .iter()
            .find(|(l, k, _)| *l == level && *k == kind)
            .map(|(_, _, image)| image.clone())
    }
}

impl TrainingReporter for RecordingReporter {
    fn begin_scale(&self, level: usize, size: Size, total_steps: usize) {
        self.events.lock().unwrap().push(Event::Begin {
            level,
            size,
            total_steps,
        });
    }

    fn scalars(&self, level: usize, step: usize, _losses: &StepLosses) {
        self.events
            .lock()
            .unwrap()
            .push(Event::Scalars { level, step });
    }

    fn image(&self, level: usize, kind: SnapshotKind, step: Option<usize>, image: &Array3<f32>) {
        self.events.lock().unwrap().push(Event::Image {
            level,
            kind,
            step,
            dim: image.dim(),
        });
        if step.is_none() {
            self.finals.lock().unwrap().push((level, kind, image.clone()));
        }
    }

    fn finish_scale(&self, report: &ScaleReport) {
        self.events
            .lock()
            .unwrap()
            .push(Event::Finish { level: report.level });
    }
}
