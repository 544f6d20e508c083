//! Output artifacts and the record handed to the persistence layer.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::SystemTime;

use super::request::Style;

/// Container format of a stored clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// 16-bit PCM WAV. Always available.
    Wav,
    /// MP3 at a fixed bitrate. Best-effort.
    Mp3,
}

impl AudioFormat {
    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Mp3 => "mp3",
        }
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// A stored audio file, addressed relative to the media root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioArtifact {
    /// Path relative to the media root, `/`-separated.
    pub relative_path: String,
    /// Container format of the file.
    pub format: AudioFormat,
}

/// Where an encoder writes a file, before the extension is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputBase {
    /// Base path relative to the media root, `/`-separated, no extension.
    pub relative: String,
    /// The same location on disk, no extension.
    pub absolute: PathBuf,
}

impl OutputBase {
    /// Relative path with the extension of `format`.
    pub fn relative_path(&self, format: AudioFormat) -> String {
        format!("{}.{}", self.relative, format.extension())
    }

    /// Absolute path with the extension of `format`.
    pub fn absolute_path(&self, format: AudioFormat) -> PathBuf {
        self.absolute.with_extension(format.extension())
    }

    /// Artifact record for a file written in `format`.
    pub fn artifact(&self, format: AudioFormat) -> AudioArtifact {
        AudioArtifact {
            relative_path: self.relative_path(format),
            format,
        }
    }
}

/// Result of one orchestrator call.
///
/// Both variants reference a playable file of the requested duration; the
/// tag only records which path produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    /// The model produced the audio.
    Generated(AudioArtifact),
    /// Generation failed and a silent track was stored instead.
    FallbackUsed {
        artifact: AudioArtifact,
        /// Display form of the error that triggered the fallback.
        reason: String,
    },
}

impl GenerationOutcome {
    /// The stored artifact, whichever path produced it.
    pub fn artifact(&self) -> &AudioArtifact {
        match self {
            GenerationOutcome::Generated(artifact) => artifact,
            GenerationOutcome::FallbackUsed { artifact, .. } => artifact,
        }
    }

    /// Relative path of the stored file.
    pub fn relative_path(&self) -> &str {
        &self.artifact().relative_path
    }

    /// Consumes the outcome, returning the relative path.
    pub fn into_relative_path(self) -> String {
        match self {
            GenerationOutcome::Generated(artifact) => artifact.relative_path,
            GenerationOutcome::FallbackUsed { artifact, .. } => artifact.relative_path,
        }
    }

    /// True when the silent fallback was used.
    pub fn is_fallback(&self) -> bool {
        matches!(self, GenerationOutcome::FallbackUsed { .. })
    }
}

/// The record a persistence layer stores for a generated clip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositionRecord {
    /// Display title, `"<style>_AI_Song"`.
    pub title: String,
    /// Style label of the request.
    pub style: Style,
    /// Relative path of the audio file under the media root.
    pub file: String,
    /// Container format of the file.
    pub format: AudioFormat,
    /// True if the file is the silent fallback.
    pub fallback: bool,
    /// Creation time, serialized as Unix seconds.
    #[serde(with = "unix_seconds")]
    pub created_at: SystemTime,
}

impl CompositionRecord {
    /// Builds the record for a finished request.
    pub fn new(style: &Style, outcome: &GenerationOutcome) -> Self {
        let artifact = outcome.artifact();
        Self {
            title: format!("{}_AI_Song", style.label()),
            style: style.clone(),
            file: artifact.relative_path.clone(),
            format: artifact.format,
            fallback: outcome.is_fallback(),
            created_at: SystemTime::now(),
        }
    }
}

mod unix_seconds {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let secs = time
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs();
        secs.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + Duration::from_secs(secs))
    }
}
