//! Command-line arguments for the `composer` binary.
//!
//! Flags override the values read from `COMPOSER_*` environment variables.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::{ComposerConfig, Device};

/// Default clip length in seconds.
pub const DEFAULT_DURATION_SECS: u32 = 12;

/// Execution device choices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum DeviceArg {
    /// Probe CUDA, then Metal, then fall back to CPU
    #[default]
    Auto,
    /// CPU only
    Cpu,
    /// NVIDIA GPU via CUDA
    Cuda,
    /// Apple Silicon via CoreML
    Metal,
}

impl From<DeviceArg> for Device {
    fn from(arg: DeviceArg) -> Self {
        match arg {
            DeviceArg::Auto => Device::Auto,
            DeviceArg::Cpu => Device::Cpu,
            DeviceArg::Cuda => Device::Cuda,
            DeviceArg::Metal => Device::Metal,
        }
    }
}

/// composer: generate a short instrumental clip in a musical style
#[derive(Parser, Debug)]
#[command(name = "composer")]
#[command(about = "Generate a short instrumental clip and print its record as JSON")]
#[command(version)]
pub struct Cli {
    /// Musical style, e.g. Classical, Jazz, Pop (other labels are accepted)
    #[arg(short, long)]
    pub style: String,

    /// Free-text description appended to the prompt
    #[arg(long)]
    pub hint: Option<String>,

    /// Clip length in seconds
    #[arg(
        short,
        long,
        default_value_t = DEFAULT_DURATION_SECS,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub duration: u32,

    /// Classifier-free guidance scale (1.0-20.0)
    #[arg(short, long)]
    pub guidance: Option<f32>,

    /// Directory generated files are written under
    #[arg(long)]
    pub media_root: Option<PathBuf>,

    /// Directory containing the MusicGen ONNX export
    #[arg(short, long)]
    pub model_dir: Option<PathBuf>,

    /// Execution device
    #[arg(long, value_enum)]
    pub device: Option<DeviceArg>,

    /// Write WAV only, never attempt MP3
    #[arg(long)]
    pub lossless_only: bool,

    /// Fail instead of downloading missing model files
    #[arg(long)]
    pub no_download: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Applies the flags on top of `config`.
    pub fn apply(&self, mut config: ComposerConfig) -> ComposerConfig {
        if let Some(ref root) = self.media_root {
            config.media_root = root.clone();
        }
        if let Some(ref dir) = self.model_dir {
            config.model_path = Some(dir.clone());
        }
        if let Some(device) = self.device {
            config.device = device.into();
        }
        if let Some(guidance) = self.guidance {
            config.guidance_scale = guidance;
        }
        if self.lossless_only {
            config.compressed_output = false;
        }
        if self.no_download {
            config.auto_download = false;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("composer").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults() {
        let cli = parse(&["--style", "Jazz"]);
        assert_eq!(cli.style, "Jazz");
        assert_eq!(cli.duration, DEFAULT_DURATION_SECS);
        assert!(cli.hint.is_none());
        assert!(!cli.lossless_only);
    }

    #[test]
    fn style_is_required() {
        assert!(Cli::try_parse_from(["composer"]).is_err());
    }

    #[test]
    fn zero_duration_is_rejected() {
        assert!(Cli::try_parse_from(["composer", "-s", "Pop", "-d", "0"]).is_err());
    }

    #[test]
    fn flags_override_config() {
        let cli = parse(&[
            "--style",
            "Pop",
            "--hint",
            "upbeat",
            "--guidance",
            "5.5",
            "--media-root",
            "/srv/media",
            "--model-dir",
            "/opt/musicgen",
            "--device",
            "cpu",
            "--lossless-only",
            "--no-download",
        ]);

        let config = cli.apply(ComposerConfig::default());
        assert_eq!(config.media_root, PathBuf::from("/srv/media"));
        assert_eq!(config.model_path, Some(PathBuf::from("/opt/musicgen")));
        assert_eq!(config.device, Device::Cpu);
        assert_eq!(config.guidance_scale, 5.5);
        assert!(!config.compressed_output);
        assert!(!config.auto_download);
    }

    #[test]
    fn absent_flags_keep_config() {
        let base = ComposerConfig {
            sample_rate: 22_050,
            guidance_scale: 4.0,
            ..ComposerConfig::default()
        };
        let config = parse(&["--style", "Classical"]).apply(base);
        assert_eq!(config.sample_rate, 22_050);
        assert_eq!(config.guidance_scale, 4.0);
        assert!(config.compressed_output);
    }

    #[test]
    fn device_args_map_to_devices() {
        assert_eq!(Device::from(DeviceArg::Metal), Device::Metal);
        assert_eq!(Device::from(DeviceArg::default()), Device::Auto);
    }
}
