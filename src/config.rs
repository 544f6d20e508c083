//! Composer configuration module.
//!
//! Process-wide settings: where output files go, where the model lives,
//! which accelerator to prefer, and the fixed output sample rate.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default output sample rate in Hz.
pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;

/// Default classifier-free guidance scale.
pub const DEFAULT_GUIDANCE_SCALE: f32 = 3.0;

/// Execution device for ONNX inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    /// Probe accelerators in priority order: CUDA > Metal > CPU.
    #[default]
    Auto,

    /// Force CPU execution.
    Cpu,

    /// NVIDIA GPU through the CUDA execution provider.
    Cuda,

    /// Apple Silicon through the CoreML execution provider.
    Metal,
}

impl Device {
    /// Returns the string representation of the device.
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Auto => "auto",
            Device::Cpu => "cpu",
            Device::Cuda => "cuda",
            Device::Metal => "metal",
        }
    }

    /// Parses a device from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Some(Device::Auto),
            "cpu" => Some(Device::Cpu),
            "cuda" => Some(Device::Cuda),
            "metal" | "mps" | "coreml" => Some(Device::Metal),
            _ => None,
        }
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Runtime configuration for the composer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposerConfig {
    /// Base directory all generated files are written under.
    pub media_root: PathBuf,

    /// Directory containing the MusicGen ONNX export.
    /// If None, uses the platform-specific default cache location.
    pub model_path: Option<PathBuf>,

    /// Preferred execution device.
    pub device: Device,

    /// Number of threads for intra-op parallelism in ONNX Runtime.
    pub threads: Option<u32>,

    /// Output sample rate in Hz for every generated file.
    pub sample_rate: u32,

    /// Classifier-free guidance scale passed to the model.
    pub guidance_scale: f32,

    /// Attempt MP3 output when an encoder is available.
    pub compressed_output: bool,

    /// Download missing model files on first use.
    pub auto_download: bool,
}

impl ComposerConfig {
    /// Creates a new ComposerConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a ComposerConfig from environment variables.
    ///
    /// Reads `COMPOSER_MEDIA_ROOT`, `COMPOSER_MODEL_PATH`, `COMPOSER_DEVICE`,
    /// `COMPOSER_THREADS`, `COMPOSER_SAMPLE_RATE`, `COMPOSER_GUIDANCE`,
    /// `COMPOSER_COMPRESSED` and `COMPOSER_AUTO_DOWNLOAD`. Unset or
    /// unparsable values keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = lookup("COMPOSER_MEDIA_ROOT") {
            config.media_root = PathBuf::from(path);
        }

        if let Some(path) = lookup("COMPOSER_MODEL_PATH") {
            config.model_path = Some(PathBuf::from(path));
        }

        if let Some(device) = lookup("COMPOSER_DEVICE").and_then(|s| Device::parse(&s)) {
            config.device = device;
        }

        if let Some(threads) = lookup("COMPOSER_THREADS").and_then(|s| s.parse::<u32>().ok()) {
            if (1..=256).contains(&threads) {
                config.threads = Some(threads);
            }
        }

        if let Some(rate) = lookup("COMPOSER_SAMPLE_RATE").and_then(|s| s.parse::<u32>().ok()) {
            if rate > 0 {
                config.sample_rate = rate;
            }
        }

        if let Some(guidance) = lookup("COMPOSER_GUIDANCE").and_then(|s| s.parse::<f32>().ok()) {
            if (1.0..=20.0).contains(&guidance) {
                config.guidance_scale = guidance;
            }
        }

        if let Some(flag) = lookup("COMPOSER_COMPRESSED").and_then(|s| parse_flag(&s)) {
            config.compressed_output = flag;
        }

        if let Some(flag) = lookup("COMPOSER_AUTO_DOWNLOAD").and_then(|s| parse_flag(&s)) {
            config.auto_download = flag;
        }

        config
    }

    /// Returns the effective model path, using platform defaults if not specified.
    pub fn effective_model_path(&self) -> PathBuf {
        match self.model_path {
            Some(ref path) => path.clone(),
            None => default_model_path(),
        }
    }

    /// Validates the configuration.
    ///
    /// Returns an error message if validation fails, None otherwise.
    pub fn validate(&self) -> Option<String> {
        if let Some(threads) = self.threads {
            if threads == 0 {
                return Some("threads must be > 0".to_string());
            }
            if threads > 256 {
                return Some(format!("threads too high: {} (max 256)", threads));
            }
        }

        if self.sample_rate == 0 {
            return Some("sample_rate must be > 0".to_string());
        }

        if !(1.0..=20.0).contains(&self.guidance_scale) {
            return Some(format!(
                "guidance_scale out of range: {} (expected 1.0-20.0)",
                self.guidance_scale
            ));
        }

        if self.media_root.as_os_str().is_empty() {
            return Some("media_root must not be empty".to_string());
        }

        None
    }
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            media_root: PathBuf::from("media"),
            model_path: None,
            device: Device::Auto,
            threads: None,
            sample_rate: DEFAULT_SAMPLE_RATE,
            guidance_scale: DEFAULT_GUIDANCE_SCALE,
            compressed_output: true,
            auto_download: true,
        }
    }
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Returns the platform-specific default model storage path.
///
/// - macOS: ~/Library/Caches/composer/musicgen
/// - Linux: ~/.cache/composer/musicgen
/// - Windows: C:\Users\<user>\AppData\Local\composer\cache\musicgen
fn default_model_path() -> PathBuf {
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "composer") {
        proj_dirs.cache_dir().join("musicgen")
    } else {
        PathBuf::from("./models/musicgen")
    }
}
