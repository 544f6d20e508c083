//! WAV to MP3 transcoders.
//!
//! Two implementations exist: the in-process LAME encoder (cargo feature
//! `mp3`, needs `libmp3lame` on the system) and an external `ffmpeg`
//! process found on `PATH`.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

use crate::error::{ComposerError, Result};

/// Bitrate of every MP3 file, in kbit/s.
pub const MP3_BITRATE_KBPS: u32 = 192;

/// Converts a finished WAV file into a compressed file.
pub trait Transcoder: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Reads `wav_path` and writes the compressed file to `output_path`.
    fn transcode(&self, wav_path: &Path, output_path: &Path) -> Result<()>;
}

/// Transcodes by running `ffmpeg` with the libmp3lame codec.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    binary: PathBuf,
}

impl FfmpegTranscoder {
    /// Uses the given ffmpeg executable.
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Looks up `ffmpeg` on `PATH`.
    pub fn locate() -> Option<Self> {
        which::which("ffmpeg").ok().map(Self::new)
    }
}

impl Transcoder for FfmpegTranscoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn transcode(&self, wav_path: &Path, output_path: &Path) -> Result<()> {
        let bitrate = format!("{}k", MP3_BITRATE_KBPS);
        debug!(binary = %self.binary.display(), input = %wav_path.display(), "running ffmpeg");

        let output = Command::new(&self.binary)
            .args(["-y", "-loglevel", "error", "-i"])
            .arg(wav_path)
            .args(["-codec:a", "libmp3lame", "-b:a", &bitrate])
            .arg(output_path)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                ComposerError::transcode_failed(format!(
                    "failed to run {}: {}",
                    self.binary.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            return Err(ComposerError::transcode_failed(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(())
    }
}

/// Transcodes in-process with libmp3lame.
#[cfg(feature = "mp3")]
#[derive(Debug, Clone, Copy, Default)]
pub struct LameTranscoder;

#[cfg(feature = "mp3")]
impl Transcoder for LameTranscoder {
    fn name(&self) -> &str {
        "lame"
    }

    fn transcode(&self, wav_path: &Path, output_path: &Path) -> Result<()> {
        use mp3lame_encoder::{Bitrate, Builder, FlushNoGap, MonoPcm, Quality};

        let (samples, spec) = super::wav::read_wav_pcm16(wav_path)?;
        if spec.channels != 1 {
            return Err(ComposerError::transcode_failed(format!(
                "expected mono input, got {} channels",
                spec.channels
            )));
        }

        let mut encoder = Builder::new()
            .ok_or_else(|| ComposerError::transcode_failed("failed to create LAME encoder"))?
            .with_num_channels(1)
            .map_err(|e| ComposerError::transcode_failed(format!("LAME set_num_channels: {e:?}")))?
            .with_sample_rate(spec.sample_rate)
            .map_err(|e| ComposerError::transcode_failed(format!("LAME set_sample_rate: {e:?}")))?
            .with_brate(Bitrate::Kbps192)
            .map_err(|e| ComposerError::transcode_failed(format!("LAME set_brate: {e:?}")))?
            .with_quality(Quality::Best)
            .map_err(|e| ComposerError::transcode_failed(format!("LAME set_quality: {e:?}")))?
            .build()
            .map_err(|e| ComposerError::transcode_failed(format!("LAME build: {e:?}")))?;

        let mut buf = Vec::with_capacity(mp3lame_encoder::max_required_buffer_size(samples.len()));

        let encoded = encoder
            .encode(MonoPcm(&samples), buf.spare_capacity_mut())
            .map_err(|e| ComposerError::transcode_failed(format!("LAME encode: {e:?}")))?;
        // SAFETY: encode initialized exactly `encoded` bytes of spare capacity.
        unsafe { buf.set_len(encoded) };

        let flushed = encoder
            .flush::<FlushNoGap>(buf.spare_capacity_mut())
            .map_err(|e| ComposerError::transcode_failed(format!("LAME flush: {e:?}")))?;
        // SAFETY: flush initialized exactly `flushed` bytes of spare capacity.
        unsafe { buf.set_len(buf.len() + flushed) };

        std::fs::write(output_path, &buf).map_err(|e| {
            ComposerError::transcode_failed(format!(
                "failed to write {}: {}",
                output_path.display(),
                e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_ffmpeg_binary_is_a_transcode_error() {
        let dir = tempdir().unwrap();
        let transcoder = FfmpegTranscoder::new(dir.path().join("no-such-ffmpeg"));
        let err = transcoder
            .transcode(&dir.path().join("in.wav"), &dir.path().join("out.mp3"))
            .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::TranscodeFailed);
    }

    #[cfg(feature = "mp3")]
    #[test]
    fn lame_produces_mp3_frames() {
        let dir = tempdir().unwrap();
        let wav = dir.path().join("in.wav");
        let mp3 = dir.path().join("out.mp3");
        crate::audio::wav::write_wav_pcm16(&vec![0.0; 16_000], &wav, 16_000).unwrap();

        LameTranscoder.transcode(&wav, &mp3).unwrap();

        let bytes = std::fs::read(&mp3).unwrap();
        assert!(!bytes.is_empty());
        assert!(bytes[0] == 0xFF || bytes[0] == 0x49);
    }
}
