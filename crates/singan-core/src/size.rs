use serde::{Deserialize, Serialize};

/// Spatial dimensions of an image, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: usize,
    pub height: usize,
}

impl Size {
    pub const fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Uniformly downscale so that the longer side is at most `max_size`.
    ///
    /// Aspect ratio is preserved and sizes already within the bound are
    /// returned unchanged.
    pub fn fit(self, max_size: usize) -> Size {
        if self.width > max_size && self.width >= self.height {
            self.scaled(max_size as f32 / self.width as f32)
        } else if self.height > max_size && self.height >= self.width {
            self.scaled(max_size as f32 / self.height as f32)
        } else {
            self
        }
    }

    /// Multiply both dimensions by `factor`, truncating toward zero.
    pub fn scaled(self, factor: f32) -> Size {
        Size {
            width: (self.width as f32 * factor) as usize,
            height: (self.height as f32 * factor) as usize,
        }
    }

    /// Grow by one pyramid step: each dimension becomes
    /// `round(dim / scale_factor)`.
    pub fn upscaled(self, scale_factor: f32) -> Size {
        Size {
            width: (self.width as f32 / scale_factor).round() as usize,
            height: (self.height as f32 / scale_factor).round() as usize,
        }
    }

    /// Grow by `border` pixels on every side.
    pub fn padded(self, border: usize) -> Size {
        Size {
            width: self.width + 2 * border,
            height: self.height + 2 * border,
        }
    }

    pub fn area(self) -> usize {
        self.width * self.height
    }

    /// Shape of a CHW tensor with `channels` channels at this size.
    pub fn shape(self, channels: usize) -> (usize, usize, usize) {
        (channels, self.height, self.width)
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
