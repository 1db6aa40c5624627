//! Sampling from a trained pyramid.

use ndarray::Array3;
use tracing::debug;

use crate::context::ExecutionContext;
use crate::ops::size_of;
use crate::size::Size;
use crate::stack::ModelStack;
use crate::train::TrainedPyramid;

/// A novel image at the training sizes.
pub fn random_sample(trained: &TrainedPyramid, ctx: &mut ExecutionContext) -> Array3<f32> {
    trained.stack.generate(&trained.sizes, ctx)
}

/// The training image as reproduced from the fixed reconstruction noise.
pub fn reconstruction(trained: &TrainedPyramid, ctx: &mut ExecutionContext) -> Array3<f32> {
    trained
        .stack
        .generate_with_noises(&trained.sizes, &trained.reconstruction_noises, ctx)
}

/// Level sizes for generation starting from an arbitrary coarsest size:
/// each level is the previous one divided by `scale_factor`.
pub fn growth_sizes(initial: Size, levels: usize, scale_factor: f32) -> Vec<Size> {
    let mut sizes = Vec::with_capacity(levels);
    let mut size = initial;
    for _ in 0..levels {
        sizes.push(size);
        size = size.upscaled(scale_factor);
    }
    sizes
}

/// A random sample whose coarsest level has `initial` size, so the output
/// aspect ratio can differ from the training image.
pub fn multi_aspect(stack: &ModelStack, initial: Size, ctx: &mut ExecutionContext) -> Array3<f32> {
    let sizes = growth_sizes(initial, stack.trained_layers(), stack.scale_factor());
    debug!(?sizes, "Multi-aspect sizes");
    stack.generate(&sizes, ctx)
}

/// Repeated super-resolution of `image`. Every iteration grows the previous
/// output by `1 / scale_factor`; all intermediate outputs are returned.
pub fn super_resolve(
    stack: &ModelStack,
    image: &Array3<f32>,
    iterations: usize,
    ctx: &mut ExecutionContext,
) -> Vec<Array3<f32>> {
    let mut outputs: Vec<Array3<f32>> = Vec::with_capacity(iterations);
    for i in 0..iterations {
        let previous = outputs.last().unwrap_or(image);
        let target = size_of(previous).upscaled(stack.scale_factor());
        debug!(iteration = i, %target, "Super-resolution step");
        let next = stack.super_resolution(previous, target, ctx);
        outputs.push(next);
    }
    outputs
}
