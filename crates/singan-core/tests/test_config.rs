use singan_core::config::{NoiseChannels, NoisePadding, RoleConfig, SinGanConfig};
use singan_core::error::SinGanError;
use singan_core::loss::{GanLoss, ReconstructionLoss};
use singan_core::size::Size;

fn assert_invalid(config: &SinGanConfig, fragment: &str) {
    match config.validate() {
        Err(SinGanError::InvalidConfig(message)) => {
            assert!(message.contains(fragment), "unexpected message: {message}")
        }
        other => panic!("expected InvalidConfig, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

#[test]
fn test_defaults() {
    let config = SinGanConfig::default();
    assert_eq!(config.network.base_channels, 32);
    assert_eq!(config.network.noise_channels, NoiseChannels::Rgb);
    assert_eq!(config.network.generator, RoleConfig::default());
    assert!(config.network.discriminator.feature_norm);
    assert!(!config.network.discriminator.spectral_norm);
    assert_eq!(config.pyramid.scale_factor, 0.75);
    assert_eq!(config.pyramid.image_min_size, 20);
    assert_eq!(config.pyramid.image_max_size, 250);
    assert_eq!(config.training.steps_per_layer, 3000);
    assert_eq!(config.training.disc_ratio, 1);
    assert_eq!(config.training.alpha, 50.0);
    assert_eq!(config.training.lr_decay_at, Some(0.8));
    assert_eq!(config.training.learning_rate, 5e-4);
    assert_eq!(config.training.noise_scale_base, 0.1);
    assert_eq!(config.training.noise_padding, NoisePadding::Noise);
    assert_eq!(config.training.gan_loss, GanLoss::Hinge);
    assert_eq!(
        config.training.reconstruction_loss,
        ReconstructionLoss::MeanSquaredError
    );
    assert_eq!(config.training.seed, Some(42));
    assert_eq!(config.sampling.super_resolution_iterations, 5);
    assert_eq!(
        config.sampling.multi_aspect_sizes,
        vec![Size::new(25, 25), Size::new(25, 50), Size::new(40, 25)]
    );
    assert!(config.validate().is_ok());
}

#[test]
fn test_enum_display() {
    assert_eq!(format!("{}", GanLoss::NonSaturating), "Non-saturating");
    assert_eq!(format!("{}", GanLoss::LeastSquares), "Least squares");
    assert_eq!(format!("{}", ReconstructionLoss::BinaryCrossEntropy), "BCE");
    assert_eq!(format!("{}", NoisePadding::Zero), "Zero border");
    assert_eq!(NoiseChannels::Single.count(), 1);
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[test]
fn test_scale_factor_must_be_below_one() {
    let mut config = SinGanConfig::default();
    config.pyramid.scale_factor = 1.0;
    assert_invalid(&config, "scale_factor");
}

#[test]
fn test_min_size_must_be_below_max_size() {
    let mut config = SinGanConfig::default();
    config.pyramid.image_min_size = 250;
    assert_invalid(&config, "image_min_size");
}

#[test]
fn test_zero_steps_rejected() {
    let mut config = SinGanConfig::default();
    config.training.steps_per_layer = 0;
    assert_invalid(&config, "steps_per_layer");
}

#[test]
fn test_lr_decay_point_must_be_a_fraction() {
    let mut config = SinGanConfig::default();
    config.training.lr_decay_at = Some(1.5);
    assert_invalid(&config, "lr_decay_at");

    config.training.lr_decay_at = None;
    assert!(config.validate().is_ok());
}

#[test]
fn test_betas_must_be_below_one() {
    let mut config = SinGanConfig::default();
    config.training.beta2 = 1.0;
    assert_invalid(&config, "beta");
}

#[test]
fn test_gamma_range() {
    let mut config = SinGanConfig::default();
    config.training.gamma = 0.0;
    assert_invalid(&config, "gamma");
}

#[test]
fn test_multi_aspect_sizes_must_be_positive() {
    let mut config = SinGanConfig::default();
    config.sampling.multi_aspect_sizes.push(Size::new(0, 10));
    assert_invalid(&config, "multi_aspect_sizes");
}

// ---------------------------------------------------------------------------
// TOML
// ---------------------------------------------------------------------------

#[test]
fn test_toml_round_trip() {
    let mut config = SinGanConfig::default();
    config.network.noise_channels = NoiseChannels::Single;
    config.network.discriminator.spectral_norm = true;
    config.training.gan_loss = GanLoss::LeastSquares;
    config.training.noise_padding = NoisePadding::Zero;

    let text = config.to_toml().unwrap();
    let parsed: SinGanConfig = toml::from_str(&text).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn test_missing_sections_use_defaults() {
    let text = r#"
[pyramid]
scale_factor = 0.5
image_min_size = 16
image_max_size = 128
"#;
    let config: SinGanConfig = toml::from_str(text).unwrap();
    assert_eq!(config.pyramid.scale_factor, 0.5);
    assert_eq!(config.training, SinGanConfig::default().training);
    assert_eq!(config.network, SinGanConfig::default().network);
}

#[test]
fn test_partial_section_fills_missing_keys() {
    let text = r#"
[training]
steps_per_layer = 10
"#;
    let config: SinGanConfig = toml::from_str(text).unwrap();
    let defaults = SinGanConfig::default().training;
    assert_eq!(config.training.steps_per_layer, 10);
    assert_eq!(config.training.disc_ratio, defaults.disc_ratio);
    assert_eq!(config.training.gan_loss, defaults.gan_loss);
    assert!(config.validate().is_ok());
}

#[test]
fn test_omitted_optional_keys_keep_their_defaults() {
    let mut text = SinGanConfig::default().to_toml().unwrap();
    text = text
        .lines()
        .filter(|line| !line.starts_with("lr_decay_at") && !line.starts_with("seed"))
        .collect::<Vec<_>>()
        .join("\n");
    assert!(!text.contains("lr_decay_at"));

    let config: SinGanConfig = toml::from_str(&text).unwrap();
    assert_eq!(config.training.lr_decay_at, Some(0.8));
    assert_eq!(config.training.seed, Some(42));
}

#[test]
fn test_partial_role_section() {
    let text = r#"
[network.discriminator]
spectral_norm = true
"#;
    let config: SinGanConfig = toml::from_str(text).unwrap();
    assert!(config.network.discriminator.spectral_norm);
    assert!(config.network.discriminator.feature_norm);
    assert_eq!(config.network.base_channels, 32);
}

#[test]
fn test_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    let mut config = SinGanConfig::default();
    config.training.steps_per_layer = 123;
    config.save(&path).unwrap();

    let loaded = SinGanConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_load_rejects_invalid_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[pyramid]\nscale_factor = 2.0\nimage_min_size = 20\nimage_max_size = 250\n")
        .unwrap();
    assert!(matches!(
        SinGanConfig::load(&path),
        Err(SinGanError::InvalidConfig(_))
    ));
}

#[test]
fn test_load_rejects_malformed_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[training\nsteps_per_layer = ").unwrap();
    assert!(matches!(
        SinGanConfig::load(&path),
        Err(SinGanError::ConfigParse(_))
    ));
}

#[test]
fn test_load_missing_file() {
    let result = SinGanConfig::load(std::path::Path::new("/nonexistent/config.toml"));
    assert!(matches!(result, Err(SinGanError::Io(_))));
}
