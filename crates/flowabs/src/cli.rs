use std::path::PathBuf;

use clap::Parser;
use flowabs::settings::{BackendChoice, SettingsConfig};

#[derive(Parser, Debug)]
#[command(
    name = "flowabs",
    version,
    about = "Flow-based image abstraction on the GPU"
)]
pub struct Cli {
    /// Image to process (PNG or JPEG).
    #[arg(
        long,
        short,
        value_name = "PATH",
        required_unless_present_any = ["list", "save_settings"]
    )]
    pub input: Option<PathBuf>,

    /// Where to write the result.
    #[arg(long, short, value_name = "PATH", default_value = "flowabs.png")]
    pub output: PathBuf,

    /// Effect name; defaults to the one in settings.json.
    #[arg(long, short, value_name = "NAME")]
    pub effect: Option<String>,

    /// Parameter override, e.g. `--set fdog_tau=0.98`. Repeatable.
    #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_assignment)]
    pub sets: Vec<(String, String)>,

    /// JSON preset applied before any `--set`.
    #[arg(long, value_name = "PATH")]
    pub preset: Option<PathBuf>,

    /// Edge color for the composite effect, components in [0,1].
    #[arg(long, value_name = "R,G,B", value_parser = parse_rgb)]
    pub edge_color: Option<[f32; 3]>,

    /// Rendering backend: `gpu` or `cpu`.
    #[arg(long, value_name = "BACKEND", value_parser = parse_backend)]
    pub backend: Option<BackendChoice>,

    /// Render the frame this many times, like a video loop would.
    #[arg(long, value_name = "N", default_value_t = 1)]
    pub frames: u32,

    /// Print the effects and their parameters, then exit.
    #[arg(long)]
    pub list: bool,

    /// Store --backend, --effect and --edge-color as the new defaults.
    #[arg(long)]
    pub save_settings: bool,
}

impl Cli {
    /// `config` with the choices given on the command line written over it.
    pub fn merged_settings(&self, config: &SettingsConfig) -> SettingsConfig {
        let mut merged = config.clone();
        if let Some(backend) = self.backend {
            merged.backend = backend;
        }
        if let Some(effect) = &self.effect {
            merged.default_effect = effect.clone();
        }
        if let Some(rgb) = self.edge_color {
            merged.edge_color = rgb;
        }
        merged
    }
}

fn parse_assignment(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{s}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing parameter name in '{s}'"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

fn parse_rgb(s: &str) -> Result<[f32; 3], String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let [r, g, b] = parts.as_slice() else {
        return Err(format!("expected R,G,B, got '{s}'"));
    };
    let component = |c: &str| -> Result<f32, String> {
        let v: f32 = c.parse().map_err(|_| format!("invalid color component '{c}'"))?;
        Ok(v.clamp(0.0, 1.0))
    };
    Ok([component(*r)?, component(*g)?, component(*b)?])
}

fn parse_backend(s: &str) -> Result<BackendChoice, String> {
    match s.to_ascii_lowercase().as_str() {
        "gpu" | "wgpu" => Ok(BackendChoice::Gpu),
        "cpu" => Ok(BackendChoice::Cpu),
        other => Err(format!("unknown backend '{other}' (expected gpu or cpu)")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignments() {
        assert_eq!(
            parse_assignment("fdog_tau = 0.98").unwrap(),
            ("fdog_tau".to_string(), "0.98".to_string())
        );
        assert!(parse_assignment("fdog_tau").is_err());
        assert!(parse_assignment("=1").is_err());
    }

    #[test]
    fn colors() {
        assert_eq!(parse_rgb("1, 0.5,0").unwrap(), [1.0, 0.5, 0.0]);
        assert_eq!(parse_rgb("2,0,0").unwrap(), [1.0, 0.0, 0.0]);
        assert!(parse_rgb("1,0").is_err());
        assert!(parse_rgb("a,b,c").is_err());
    }

    #[test]
    fn full_command_line() {
        let cli = Cli::try_parse_from([
            "flowabs",
            "-i",
            "in.png",
            "--set",
            "fdog_n=2",
            "--set",
            "cq_nbins=4",
            "--backend",
            "cpu",
            "--frames",
            "3",
        ])
        .unwrap();
        assert_eq!(cli.sets.len(), 2);
        assert_eq!(cli.backend, Some(BackendChoice::Cpu));
        assert_eq!(cli.frames, 3);
        assert!(Cli::try_parse_from(["flowabs"]).is_err());
        assert!(Cli::try_parse_from(["flowabs", "--list"]).is_ok());
        assert!(Cli::try_parse_from(["flowabs", "--save-settings"]).is_ok());
    }

    #[test]
    fn command_line_overrides_saved_settings() {
        let config = SettingsConfig::default();
        let cli = Cli::try_parse_from([
            "flowabs",
            "--save-settings",
            "--backend",
            "cpu",
            "--edge-color",
            "0.2,0.4,0.6",
        ])
        .unwrap();
        let merged = cli.merged_settings(&config);
        assert_eq!(merged.backend, BackendChoice::Cpu);
        assert_eq!(merged.edge_color, [0.2, 0.4, 0.6]);
        assert_eq!(merged.default_effect, config.default_effect);
    }
}
