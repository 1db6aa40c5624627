//! Coarse-to-fine image pyramid of a single training image.
//!
//! Level 0 is the coarsest image; the last level is the source image fitted
//! to the configured maximum size. Every level is resampled from the source
//! independently, so no level accumulates the blur of the levels above it.

use std::ops::Index;
use std::path::Path;

use image::imageops::{self, FilterType};
use image::Rgb32FImage;
use ndarray::Array3;
use tracing::{debug, info};

use crate::config::PyramidConfig;
use crate::error::{Result, SinGanError};
use crate::io::image_io::{load_rgb, to_tensor};
use crate::ops::size_of;
use crate::size::Size;

/// Compute the pyramid's size sequence, coarsest first.
///
/// The finest size is `source` fitted to `image_max_size`. Coarser sizes are
/// obtained by repeatedly scaling the current coarsest size by
/// `scale_factor` until a side would fall below `image_min_size`.
pub fn build_sizes(source: Size, config: &PyramidConfig) -> Result<Vec<Size>> {
    assert!(
        config.scale_factor > 0.0 && config.scale_factor < 1.0,
        "scale factor {} outside (0, 1)",
        config.scale_factor
    );
    assert!(config.image_min_size > 0, "minimum pyramid size must be positive");

    let top = source.fit(config.image_max_size);
    if top.width < config.image_min_size || top.height < config.image_min_size {
        return Err(SinGanError::InvalidDimensions {
            width: top.width,
            height: top.height,
        });
    }

    let mut sizes = vec![top];
    loop {
        let candidate = sizes[0].scaled(config.scale_factor);
        if candidate.width < config.image_min_size || candidate.height < config.image_min_size {
            break;
        }
        sizes.insert(0, candidate);
    }

    Ok(sizes)
}

/// Resampled copies of one image, coarse to fine, values in [-1, 1].
#[derive(Clone, Debug)]
pub struct ImagePyramid {
    images: Vec<Array3<f32>>,
    sizes: Vec<Size>,
}

impl ImagePyramid {
    /// Decode `path` and build its pyramid.
    pub fn load(path: &Path, config: &PyramidConfig) -> Result<Self> {
        let source = load_rgb(path)?;
        info!(
            path = %path.display(),
            width = source.width(),
            height = source.height(),
            "Loaded source image"
        );
        Self::from_rgb(&source, config)
    }

    /// Build the pyramid of an in-memory RGB image with values in [0, 1].
    pub fn from_rgb(source: &Rgb32FImage, config: &PyramidConfig) -> Result<Self> {
        let (w, h) = source.dimensions();
        let sizes = build_sizes(Size::new(w as usize, h as usize), config)?;
        debug!(levels = sizes.len(), ?sizes, "Pyramid sizes");

        let images = sizes
            .iter()
            .map(|size| {
                if size.width == w as usize && size.height == h as usize {
                    to_tensor(source)
                } else {
                    let resized = imageops::resize(
                        source,
                        size.width as u32,
                        size.height as u32,
                        FilterType::Triangle,
                    );
                    to_tensor(&resized)
                }
            })
            .collect();

        Ok(Self { images, sizes })
    }

    /// Wrap already-resampled CHW tensors, coarsest first.
    pub fn from_images(images: Vec<Array3<f32>>) -> Self {
        let sizes = images.iter().map(size_of).collect();
        Self { images, sizes }
    }

    pub fn sizes(&self) -> &[Size] {
        &self.sizes
    }

    pub fn images(&self) -> &[Array3<f32>] {
        &self.images
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn get(&self, level: usize) -> Option<&Array3<f32>> {
        self.images.get(level)
    }

    /// The finest (largest) level.
    pub fn finest(&self) -> &Array3<f32> {
        self.images.last().expect("pyramid has at least one level")
    }
}

impl Index<usize> for ImagePyramid {
    type Output = Array3<f32>;

    fn index(&self, level: usize) -> &Self::Output {
        &self.images[level]
    }
}
