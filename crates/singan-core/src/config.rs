use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SinGanError};
use crate::loss::{GanLoss, ReconstructionLoss};
use crate::size::Size;

/// Complete set of run parameters. Read-only once training starts.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SinGanConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub pyramid: PyramidConfig,
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub sampling: SamplingConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Feature channels of every hidden conv layer.
    pub base_channels: usize,
    pub noise_channels: NoiseChannels,
    pub generator: RoleConfig,
    pub discriminator: RoleConfig,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            base_channels: 32,
            noise_channels: NoiseChannels::default(),
            generator: RoleConfig::default(),
            discriminator: RoleConfig::default(),
        }
    }
}

/// Normalization toggles for one network role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleConfig {
    pub spectral_norm: bool,
    pub feature_norm: bool,
}

impl Default for RoleConfig {
    fn default() -> Self {
        Self {
            spectral_norm: false,
            feature_norm: true,
        }
    }
}

/// Channel count of injected noise. Single-channel noise is broadcast over
/// the color channels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoiseChannels {
    Single,
    #[default]
    Rgb,
}

impl NoiseChannels {
    pub fn count(self) -> usize {
        match self {
            Self::Single => 1,
            Self::Rgb => 3,
        }
    }
}

/// How the border around a generator input is filled with noise.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoisePadding {
    /// Noise over the image area only, exact zeros on the border.
    Zero,
    /// Noise over the whole padded area.
    #[default]
    Noise,
}

impl std::fmt::Display for NoisePadding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Zero => write!(f, "Zero border"),
            Self::Noise => write!(f, "Noise border"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PyramidConfig {
    /// Ratio between consecutive pyramid levels, in (0, 1).
    pub scale_factor: f32,
    /// No level may have a side shorter than this.
    pub image_min_size: usize,
    /// The finest level's longer side is clamped to this.
    pub image_max_size: usize,
}

impl Default for PyramidConfig {
    fn default() -> Self {
        Self {
            scale_factor: 0.75,
            image_min_size: 20,
            image_max_size: 250,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub steps_per_layer: usize,
    /// Discriminator updates per generator update.
    pub disc_ratio: usize,
    /// Weight of the reconstruction loss.
    pub alpha: f32,
    /// Learning rate multiplier applied at `lr_decay_at`.
    pub gamma: f32,
    /// Fraction of the schedule after which learning rates decay. `1.0`
    /// never reaches the decay step.
    pub lr_decay_at: Option<f32>,
    pub learning_rate: f32,
    pub beta1: f32,
    pub beta2: f32,
    /// Noise amplitude per unit of reconstruction RMSE.
    pub noise_scale_base: f32,
    pub noise_padding: NoisePadding,
    pub gan_loss: GanLoss,
    pub reconstruction_loss: ReconstructionLoss,
    /// Seed of the run's random source; `None` draws from OS entropy. A
    /// config file without the key gets the default seed.
    pub seed: Option<u64>,
    /// Steps between scalar reports.
    pub log_every: usize,
    /// Steps between image snapshots.
    pub snapshot_every: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            steps_per_layer: 3000,
            disc_ratio: 1,
            alpha: 50.0,
            gamma: 0.1,
            lr_decay_at: Some(0.8),
            learning_rate: 5e-4,
            beta1: 0.5,
            beta2: 0.999,
            noise_scale_base: 0.1,
            noise_padding: NoisePadding::default(),
            gan_loss: GanLoss::default(),
            reconstruction_loss: ReconstructionLoss::default(),
            seed: Some(42),
            log_every: 10,
            snapshot_every: 100,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub super_resolution_iterations: usize,
    /// Coarsest sizes used for multi-aspect sampling.
    pub multi_aspect_sizes: Vec<Size>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            super_resolution_iterations: 5,
            multi_aspect_sizes: vec![Size::new(25, 25), Size::new(25, 50), Size::new(40, 25)],
        }
    }
}

impl SinGanConfig {
    /// Read a TOML config file and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: SinGanConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write the config as TOML, e.g. next to a run's outputs.
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Check every numeric constraint. Called before any training starts.
    pub fn validate(&self) -> Result<()> {
        let n = &self.network;
        let p = &self.pyramid;
        let t = &self.training;

        require(n.base_channels > 0, "network.base_channels must be positive")?;
        require(
            p.scale_factor > 0.0 && p.scale_factor < 1.0,
            "pyramid.scale_factor must be in (0, 1)",
        )?;
        require(p.image_min_size > 0, "pyramid.image_min_size must be positive")?;
        require(
            p.image_min_size < p.image_max_size,
            "pyramid.image_min_size must be smaller than pyramid.image_max_size",
        )?;
        require(t.steps_per_layer > 0, "training.steps_per_layer must be positive")?;
        require(t.disc_ratio > 0, "training.disc_ratio must be positive")?;
        require(t.alpha > 0.0, "training.alpha must be positive")?;
        require(
            t.gamma > 0.0 && t.gamma <= 1.0,
            "training.gamma must be in (0, 1]",
        )?;
        if let Some(at) = t.lr_decay_at {
            require(
                at > 0.0 && at <= 1.0,
                "training.lr_decay_at must be in (0, 1]",
            )?;
        }
        require(t.learning_rate > 0.0, "training.learning_rate must be positive")?;
        require(
            (0.0..1.0).contains(&t.beta1) && (0.0..1.0).contains(&t.beta2),
            "training.beta1 and training.beta2 must be in [0, 1)",
        )?;
        require(
            t.noise_scale_base > 0.0,
            "training.noise_scale_base must be positive",
        )?;
        require(t.log_every > 0, "training.log_every must be positive")?;
        require(t.snapshot_every > 0, "training.snapshot_every must be positive")?;
        require(
            self.sampling
                .multi_aspect_sizes
                .iter()
                .all(|s| s.width > 0 && s.height > 0),
            "sampling.multi_aspect_sizes must have positive dimensions",
        )?;
        Ok(())
    }
}

fn require(condition: bool, message: &str) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(SinGanError::InvalidConfig(message.to_string()))
    }
}
