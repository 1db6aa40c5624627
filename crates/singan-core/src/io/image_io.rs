use std::path::Path;

use image::{ImageFormat, Rgb, Rgb32FImage, RgbImage};
use ndarray::Array3;

use crate::consts::COLOR_CHANNEL_COUNT;
use crate::error::{Result, SinGanError};

/// Decode an image file into a floating point RGB buffer with values in
/// [0.0, 1.0]. Any format supported by the `image` crate is accepted.
pub fn load_rgb(path: &Path) -> Result<Rgb32FImage> {
    let img = image::open(path)?;
    let rgb = img.to_rgb32f();
    let (w, h) = rgb.dimensions();
    if w == 0 || h == 0 {
        return Err(SinGanError::InvalidDimensions {
            width: w as usize,
            height: h as usize,
        });
    }
    Ok(rgb)
}

/// Convert an RGB buffer with values in [0.0, 1.0] into a CHW tensor with
/// values in [-1.0, 1.0].
pub fn to_tensor(img: &Rgb32FImage) -> Array3<f32> {
    let (w, h) = img.dimensions();
    Array3::from_shape_fn(
        (COLOR_CHANNEL_COUNT, h as usize, w as usize),
        |(c, row, col)| img.get_pixel(col as u32, row as u32).0[c].clamp(0.0, 1.0) * 2.0 - 1.0,
    )
}

/// Convert a CHW tensor with values in [-1.0, 1.0] into an 8-bit RGB image.
/// Out-of-range values are clipped.
pub fn to_rgb_image(tensor: &Array3<f32>) -> RgbImage {
    let (c, h, w) = tensor.dim();
    assert_eq!(c, COLOR_CHANNEL_COUNT, "expected a 3-channel tensor");

    let mut img = RgbImage::new(w as u32, h as u32);
    for row in 0..h {
        for col in 0..w {
            let px = |ch: usize| {
                (((tensor[[ch, row, col]] + 1.0) / 2.0).clamp(0.0, 1.0) * 255.0).round() as u8
            };
            img.put_pixel(col as u32, row as u32, Rgb([px(0), px(1), px(2)]));
        }
    }
    img
}

/// Save a CHW tensor with values in [-1.0, 1.0] as an 8-bit RGB PNG.
pub fn save_png(tensor: &Array3<f32>, path: &Path) -> Result<()> {
    to_rgb_image(tensor).save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

/// Load an image file at its native resolution as a CHW tensor in [-1, 1].
pub fn load_image(path: &Path) -> Result<Array3<f32>> {
    Ok(to_tensor(&load_rgb(path)?))
}
