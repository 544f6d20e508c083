//! Audio encoder: lossless WAV first, best-effort MP3 second.

use std::sync::Arc;

use hound::WavReader;
use tracing::{debug, info, warn};

use crate::error::{ComposerError, Result};
use crate::types::{AudioArtifact, AudioFormat, NormalizedWaveform, OutputBase};

use super::transcode::{FfmpegTranscoder, Transcoder};
use super::wav::write_wav_pcm16;

/// Output formats the encoder can produce, resolved once at startup.
#[derive(Clone)]
pub enum EncoderCapability {
    /// Only WAV files are written.
    LosslessOnly,
    /// WAV files are written, then transcoded to MP3.
    Compressed(Arc<dyn Transcoder>),
}

impl EncoderCapability {
    /// Probes for an MP3 encoder.
    ///
    /// Order: in-process LAME (feature `mp3`), then `ffmpeg` on `PATH`.
    /// With `want_compressed` unset, or when no probe succeeds, the
    /// capability is [`EncoderCapability::LosslessOnly`].
    pub fn detect(want_compressed: bool) -> Self {
        if !want_compressed {
            return EncoderCapability::LosslessOnly;
        }

        if let Some(lame) = lame_transcoder() {
            return EncoderCapability::Compressed(lame);
        }

        match FfmpegTranscoder::locate() {
            Some(ffmpeg) => EncoderCapability::Compressed(Arc::new(ffmpeg)),
            None => EncoderCapability::LosslessOnly,
        }
    }

    /// Wraps a specific transcoder.
    pub fn with_transcoder(transcoder: impl Transcoder + 'static) -> Self {
        EncoderCapability::Compressed(Arc::new(transcoder))
    }

    /// True if MP3 output will be attempted.
    pub fn is_compressed(&self) -> bool {
        matches!(self, EncoderCapability::Compressed(_))
    }

    /// Short description for logs.
    pub fn describe(&self) -> String {
        match self {
            EncoderCapability::LosslessOnly => "wav".to_string(),
            EncoderCapability::Compressed(t) => format!("wav+mp3 via {}", t.name()),
        }
    }
}

#[cfg(feature = "mp3")]
fn lame_transcoder() -> Option<Arc<dyn Transcoder>> {
    Some(Arc::new(super::transcode::LameTranscoder))
}

#[cfg(not(feature = "mp3"))]
fn lame_transcoder() -> Option<Arc<dyn Transcoder>> {
    None
}

impl std::fmt::Debug for EncoderCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EncoderCapability({})", self.describe())
    }
}

/// Writes normalized waveforms to disk.
#[derive(Debug, Clone)]
pub struct AudioEncoder {
    capability: EncoderCapability,
}

impl AudioEncoder {
    /// Creates an encoder with the given capability.
    pub fn new(capability: EncoderCapability) -> Self {
        Self { capability }
    }

    /// Returns the capability this encoder was built with.
    pub fn capability(&self) -> &EncoderCapability {
        &self.capability
    }

    /// Writes the waveform as WAV, then tries to transcode it to MP3.
    ///
    /// Only a failed WAV write is an error. If transcoding fails the WAV
    /// artifact is returned; if it succeeds the WAV file is removed.
    pub fn encode(&self, waveform: &NormalizedWaveform, base: &OutputBase) -> Result<AudioArtifact> {
        let wav = self.encode_lossless(waveform, base)?;

        let EncoderCapability::Compressed(transcoder) = &self.capability else {
            return Ok(wav);
        };

        let wav_path = base.absolute_path(AudioFormat::Wav);
        let mp3_path = base.absolute_path(AudioFormat::Mp3);

        match transcoder.transcode(&wav_path, &mp3_path) {
            Ok(()) => {
                if let Err(e) = std::fs::remove_file(&wav_path) {
                    debug!(path = %wav_path.display(), error = %e, "could not remove intermediate WAV");
                }
                info!(path = %mp3_path.display(), "transcoded to mp3");
                Ok(base.artifact(AudioFormat::Mp3))
            }
            Err(e) => {
                // Leave no half-written MP3 behind.
                let _ = std::fs::remove_file(&mp3_path);
                warn!(transcoder = transcoder.name(), error = %e, "keeping WAV output");
                // A crashed transcoder may have clobbered its input.
                WavReader::open(&wav_path).map_err(|err| {
                    ComposerError::audio_write_failed(format!(
                        "WAV unreadable after failed transcode: {}",
                        err
                    ))
                })?;
                Ok(wav)
            }
        }
    }

    /// Writes the waveform as WAV without attempting transcoding.
    pub fn encode_lossless(
        &self,
        waveform: &NormalizedWaveform,
        base: &OutputBase,
    ) -> Result<AudioArtifact> {
        let wav_path = base.absolute_path(AudioFormat::Wav);
        write_wav_pcm16(waveform.samples(), &wav_path, waveform.sample_rate())?;
        debug!(
            path = %wav_path.display(),
            samples = waveform.len(),
            "wrote WAV"
        );
        Ok(base.artifact(AudioFormat::Wav))
    }
}
