//! Elementary operations on CHW image tensors.
//!
//! Every image in the crate is an `Array3<f32>` laid out as
//! `(channels, height, width)` with a batch size of one implied.

use ndarray::{s, Array3, ArrayView2, ArrayViewMut2, Axis};
use rayon::prelude::*;

use crate::consts::{COLOR_CHANNEL_COUNT, PARALLEL_ELEMENT_THRESHOLD};
use crate::size::Size;

/// Spatial size of a CHW tensor.
pub fn size_of(image: &Array3<f32>) -> Size {
    let (_, h, w) = image.dim();
    Size::new(w, h)
}

/// All-zero color image at `size`.
pub fn zeros(size: Size) -> Array3<f32> {
    Array3::zeros(size.shape(COLOR_CHANNEL_COUNT))
}

/// Bilinear resize with corner alignment: the corner pixels of the input
/// map exactly onto the corner pixels of the output.
pub fn resize_bilinear(image: &Array3<f32>, size: Size) -> Array3<f32> {
    let (c, in_h, in_w) = image.dim();
    if in_h == size.height && in_w == size.width {
        return image.clone();
    }
    let mut result = Array3::<f32>::zeros(size.shape(c));

    if c * size.area() >= PARALLEL_ELEMENT_THRESHOLD {
        result
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(image.axis_iter(Axis(0)).into_par_iter())
            .for_each(|(mut dst, src)| resize_plane(src, &mut dst));
    } else {
        for (mut dst, src) in result.axis_iter_mut(Axis(0)).zip(image.axis_iter(Axis(0))) {
            resize_plane(src, &mut dst);
        }
    }

    result
}

fn resize_plane(src: ArrayView2<f32>, dst: &mut ArrayViewMut2<f32>) {
    let (in_h, in_w) = src.dim();
    let (out_h, out_w) = dst.dim();
    let scale_y = align_corners_scale(in_h, out_h);
    let scale_x = align_corners_scale(in_w, out_w);

    for row in 0..out_h {
        let sy = row as f32 * scale_y;
        let y0 = (sy.floor() as usize).min(in_h - 1);
        let y1 = (y0 + 1).min(in_h - 1);
        let fy = sy - y0 as f32;
        for col in 0..out_w {
            let sx = col as f32 * scale_x;
            let x0 = (sx.floor() as usize).min(in_w - 1);
            let x1 = (x0 + 1).min(in_w - 1);
            let fx = sx - x0 as f32;

            let top = src[[y0, x0]] * (1.0 - fx) + src[[y0, x1]] * fx;
            let bottom = src[[y1, x0]] * (1.0 - fx) + src[[y1, x1]] * fx;
            dst[[row, col]] = top * (1.0 - fy) + bottom * fy;
        }
    }
}

fn align_corners_scale(input: usize, output: usize) -> f32 {
    if output > 1 {
        (input - 1) as f32 / (output - 1) as f32
    } else {
        0.0
    }
}

/// Surround the image with a border of exact zeros.
pub fn zero_pad(image: &Array3<f32>, border: usize) -> Array3<f32> {
    let (c, h, w) = image.dim();
    let mut result = Array3::<f32>::zeros((c, h + 2 * border, w + 2 * border));
    result
        .slice_mut(s![.., border..border + h, border..border + w])
        .assign(image);
    result
}

/// Remove a border of `border` pixels from every side.
pub fn crop_border(image: &Array3<f32>, border: usize) -> Array3<f32> {
    let (_, h, w) = image.dim();
    assert!(
        h > 2 * border && w > 2 * border,
        "cannot crop {border}px from a {w}x{h} image"
    );
    image
        .slice(s![.., border..h - border, border..w - border])
        .to_owned()
}

/// Mean squared difference between two tensors of identical shape.
pub fn mean_squared_error(predicted: &Array3<f32>, expected: &Array3<f32>) -> f32 {
    assert_eq!(
        predicted.dim(),
        expected.dim(),
        "mean squared error of mismatched shapes"
    );
    let sum: f64 = predicted
        .iter()
        .zip(expected.iter())
        .map(|(&p, &e)| {
            let d = (p - e) as f64;
            d * d
        })
        .sum();
    (sum / predicted.len().max(1) as f64) as f32
}

/// Root mean squared difference between two tensors of identical shape.
pub fn root_mean_squared_error(predicted: &Array3<f32>, expected: &Array3<f32>) -> f32 {
    mean_squared_error(predicted, expected).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn resize_keeps_corners() {
        let image = Array3::from_shape_fn((1, 2, 2), |(_, r, c)| (r * 2 + c) as f32);
        let resized = resize_bilinear(&image, Size::new(3, 3));
        assert_abs_diff_eq!(resized[[0, 0, 0]], 0.0);
        assert_abs_diff_eq!(resized[[0, 0, 2]], 1.0);
        assert_abs_diff_eq!(resized[[0, 2, 0]], 2.0);
        assert_abs_diff_eq!(resized[[0, 2, 2]], 3.0);
        assert_abs_diff_eq!(resized[[0, 1, 1]], 1.5);
    }

    #[test]
    fn resize_constant_stays_constant() {
        let image = Array3::from_elem((3, 7, 5), 0.25f32);
        let resized = resize_bilinear(&image, Size::new(11, 13));
        assert_eq!(resized.dim(), (3, 13, 11));
        for v in resized.iter() {
            assert_abs_diff_eq!(*v, 0.25, epsilon = 1e-6);
        }
    }

    #[test]
    fn pad_then_crop_is_identity() {
        let image = Array3::from_shape_fn((3, 4, 6), |(c, r, w)| (c + r * 10 + w) as f32);
        let padded = zero_pad(&image, 5);
        assert_eq!(padded.dim(), (3, 14, 16));
        assert_eq!(padded[[1, 0, 0]], 0.0);
        assert_eq!(padded[[1, 13, 15]], 0.0);
        assert_eq!(crop_border(&padded, 5), image);
    }

    #[test]
    fn rmse_of_offset_images() {
        let a = Array3::from_elem((3, 4, 4), 0.5f32);
        let b = Array3::from_elem((3, 4, 4), 0.1f32);
        assert_abs_diff_eq!(root_mean_squared_error(&a, &b), 0.4, epsilon = 1e-6);
        assert_abs_diff_eq!(root_mean_squared_error(&a, &a), 0.0);
    }
}
