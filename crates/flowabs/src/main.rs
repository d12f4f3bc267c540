mod cli;

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;

use cli::Cli;
use flowabs::backend::{PixelFormat, RenderBackend};
use flowabs::cpu::CpuBackend;
use flowabs::effect::FlowAbsMode;
use flowabs::gpu::WgpuBackend;
use flowabs::graph::{EffectGraph, SourceFrame};
use flowabs::image::Image;
use flowabs::preset::EffectPreset;
use flowabs::settings::{BackendChoice, SettingsConfig};
use flowabs::target::RenderTarget;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    let mut config = SettingsConfig::load();

    if cli.save_settings {
        config = cli.merged_settings(&config);
        config.save();
        log::info!("Saved settings");
    }
    if cli.list {
        return print_catalogue();
    }
    if cli.input.is_none() {
        return Ok(());
    }

    match cli.backend.unwrap_or(config.backend) {
        BackendChoice::Cpu => run(CpuBackend::new(), &cli, &config),
        BackendChoice::Gpu => {
            let backend = WgpuBackend::new().context("GPU backend unavailable (try --backend cpu)")?;
            run(backend, &cli, &config)
        }
    }
}

fn print_catalogue() -> Result<()> {
    // Parameter lists do not depend on the backend or the frame size.
    let graph = EffectGraph::<CpuBackend>::with_standard_effects(1, 1)?;
    for index in 0..graph.len() {
        let Some(effect) = graph.effect(index) else {
            continue;
        };
        println!("{}", effect.name());
        for def in effect.params().defs() {
            println!(
                "    {:<14} {:<5} default {:<6} range [{}, {}]",
                def.name(),
                def.kind_name(),
                def.default_value(),
                def.min_value(),
                def.max_value()
            );
        }
    }
    Ok(())
}

fn run<B: RenderBackend + 'static>(mut backend: B, cli: &Cli, config: &SettingsConfig) -> Result<()> {
    let input = cli.input.as_ref().context("--input is required")?;
    let decoded = ::image::open(input)
        .with_context(|| format!("loading {}", input.display()))?
        .to_rgba8();
    let source = Image::from_rgba8(&decoded);
    let (width, height) = (source.width(), source.height());

    let mut graph = EffectGraph::<B>::with_standard_effects(width, height)?;
    let name = cli.effect.as_deref().unwrap_or(&config.default_effect);
    let index = graph
        .index_of(name)
        .with_context(|| format!("unknown effect '{name}' (see --list)"))?;
    graph.select(&mut backend, index)?;

    if let Some(path) = &cli.preset {
        EffectPreset::load(path)?.apply_to(graph.effect_mut(index)?)?;
    }

    // Overrides travel through the render queue like UI edits would.
    let queue = graph.queue();
    let params = graph.effect_mut(index)?.params();
    for (param, text) in &cli.sets {
        let i = params
            .index_of(param)
            .with_context(|| format!("'{name}' has no parameter '{param}'"))?;
        let value = params
            .def(i)?
            .parse(text)
            .with_context(|| format!("invalid value '{text}' for {param}"))?;
        queue.set_param(index, i, value);
    }
    let default_color = (name == FlowAbsMode::Composite.name()).then_some(config.edge_color);
    if let Some(rgb) = cli.edge_color.or(default_color) {
        queue.set_edge_color(index, rgb);
    }

    let src = backend.upload_texture(&source, PixelFormat::Rgba8Unorm, "input")?;
    let target = RenderTarget::new(&mut backend, width, height, PixelFormat::Rgba8Unorm, "output")?;
    let frame = SourceFrame::new(&src);

    let start = Instant::now();
    let frames = cli.frames.max(1);
    for n in 0..frames {
        graph.apply(&mut backend, &frame, &target)?;
        log::debug!("Frame {n} done");
    }
    let elapsed = start.elapsed();
    log::info!(
        "{name}: {frames} frame(s) at {width}x{height} in {elapsed:.2?} ({:.2?}/frame)",
        elapsed / frames
    );

    let result = backend.read_texture(target.texture())?;
    result
        .to_rgba8()
        .save(&cli.output)
        .with_context(|| format!("writing {}", cli.output.display()))?;
    log::info!("Wrote {}", cli.output.display());
    Ok(())
}
