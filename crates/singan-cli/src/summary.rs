use std::path::Path;

use console::Style;
use singan_core::config::SinGanConfig;
use singan_core::size::Size;
use singan_core::train::ScaleReport;

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
        }
    }
}

fn print_title(s: &Styles, title: &str) {
    println!();
    println!("  {}", s.title.apply_to(title));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(title.chars().count())));
    println!();
}

fn toggles(s: &Styles, spectral_norm: bool, feature_norm: bool) -> String {
    let flag = |on: bool, name: &str| {
        if on {
            s.method.apply_to(name).to_string()
        } else {
            s.disabled.apply_to(format!("no {name}")).to_string()
        }
    };
    format!(
        "{}, {}",
        flag(spectral_norm, "spectral norm"),
        flag(feature_norm, "feature norm")
    )
}

pub fn print_training_summary(
    config: &SinGanConfig,
    input: &Path,
    output: &Path,
    sizes: &[Size],
    levels: usize,
) {
    let s = Styles::new();
    print_title(&s, "SinGAN Training");

    println!("  {:<14}{}", s.label.apply_to("Input"), s.path.apply_to(input.display()));
    println!("  {:<14}{}", s.label.apply_to("Output"), s.path.apply_to(output.display()));
    match config.training.seed {
        Some(seed) => println!("  {:<14}{}", s.label.apply_to("Seed"), s.value.apply_to(seed)),
        None => println!("  {:<14}{}", s.label.apply_to("Seed"), s.disabled.apply_to("entropy")),
    }
    println!();

    println!("  {}", s.header.apply_to("Pyramid"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Levels"),
        s.value.apply_to(format!("{levels} of {}", sizes.len()))
    );
    if let (Some(first), Some(last)) = (sizes.first(), sizes.last()) {
        println!(
            "    {:<12}{} \u{2192} {}",
            s.label.apply_to("Sizes"),
            s.value.apply_to(first),
            s.value.apply_to(last)
        );
    }
    println!(
        "    {:<12}{}",
        s.label.apply_to("Scale"),
        s.value.apply_to(config.pyramid.scale_factor)
    );
    println!();

    let n = &config.network;
    println!("  {}", s.header.apply_to("Network"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Channels"),
        s.value.apply_to(n.base_channels)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Noise"),
        s.method.apply_to(format!(
            "{} channel(s), {}",
            n.noise_channels.count(),
            config.training.noise_padding
        ))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Generator"),
        toggles(&s, n.generator.spectral_norm, n.generator.feature_norm)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Critic"),
        toggles(&s, n.discriminator.spectral_norm, n.discriminator.feature_norm)
    );
    println!();

    let t = &config.training;
    println!("  {}", s.header.apply_to("Training"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Steps"),
        s.value.apply_to(format!(
            "{} per level (D:G {}:1)",
            t.steps_per_layer, t.disc_ratio
        ))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Losses"),
        s.method.apply_to(format!(
            "{} + {} \u{00d7} {}",
            t.gan_loss, t.alpha, t.reconstruction_loss
        ))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Adam"),
        s.value.apply_to(format!(
            "lr {}, betas {}/{}",
            t.learning_rate, t.beta1, t.beta2
        ))
    );
    match t.lr_decay_at {
        Some(at) => println!(
            "    {:<12}{}",
            s.label.apply_to("LR decay"),
            s.value.apply_to(format!("\u{00d7}{} at {:.0}%", t.gamma, at * 100.0))
        ),
        None => println!(
            "    {:<12}{}",
            s.label.apply_to("LR decay"),
            s.disabled.apply_to("disabled")
        ),
    }
    println!();
}

pub fn print_pyramid(input: &Path, scale_factor: f32, sizes: &[Size]) {
    let s = Styles::new();
    print_title(&s, "Image Pyramid");

    println!("  {:<14}{}", s.label.apply_to("Input"), s.path.apply_to(input.display()));
    println!("  {:<14}{}", s.label.apply_to("Scale"), s.value.apply_to(scale_factor));
    println!();
    for (level, size) in sizes.iter().enumerate() {
        println!(
            "    {:<12}{}",
            s.label.apply_to(format!("Level {level}")),
            s.value.apply_to(size)
        );
    }
    println!();
}

pub fn print_reports(reports: &[ScaleReport]) {
    let s = Styles::new();
    print_title(&s, "Trained Scales");

    for report in reports {
        println!(
            "    {:<12}{:<10}{} {}  {} {}  {} {}  {} {}  {} {}",
            s.label.apply_to(format!("Level {}", report.level)),
            s.value.apply_to(report.size),
            s.label.apply_to("noise"),
            s.value.apply_to(format!("{:.4}", report.noise_amplitude)),
            s.label.apply_to("D"),
            s.value.apply_to(format!("{:.3}", report.losses.discriminator)),
            s.label.apply_to("G"),
            s.value.apply_to(format!("{:.3}", report.losses.generator)),
            s.label.apply_to("rec"),
            s.value.apply_to(format!("{:.4}", report.losses.reconstruction)),
            s.label.apply_to("lr"),
            s.value.apply_to(format!("{:.1e}", report.learning_rate)),
        );
    }
    println!();
}
