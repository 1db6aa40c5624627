/// Minimum element count (c*h*w) to use channel-level Rayon parallelism.
pub const PARALLEL_ELEMENT_THRESHOLD: usize = 65_536;

/// Number of channels in a color image (R, G, B).
pub const COLOR_CHANNEL_COUNT: usize = 3;

/// Border (in pixels) added around every generator input. Matches the total
/// shrink of five valid 3x3 convolutions.
pub const NOISE_PADDING: usize = 5;

/// Spatial size of every convolution kernel.
pub const KERNEL_SIZE: usize = 3;

/// Number of conv blocks between the head block and the tail conv.
pub const BODY_BLOCKS: usize = 3;

/// Negative slope of the leaky ReLU used after every conv block.
pub const LEAKY_RELU_SLOPE: f32 = 0.2;

/// Standard deviation of the normal distribution used for conv weights.
pub const WEIGHT_INIT_STD: f32 = 0.02;

/// Momentum of the running statistics kept by feature normalization.
pub const NORM_MOMENTUM: f32 = 0.1;

/// Variance epsilon of feature normalization.
pub const NORM_EPSILON: f32 = 1e-5;

/// Epsilon added to norms in spectral normalization power iteration.
pub const SPECTRAL_EPSILON: f32 = 1e-8;

/// Adam denominator epsilon.
pub const ADAM_EPSILON: f32 = 1e-8;

/// Small epsilon keeping logarithms finite in binary cross-entropy.
pub const EPSILON: f32 = 1e-7;
