//! Audio post-processing and output.
//!
//! Raw model output is resampled, normalized to an exact mono length, written
//! as 16-bit WAV, and optionally transcoded to MP3.

pub mod encoder;
pub mod postprocess;
pub mod resample;
pub mod transcode;
pub mod wav;

// Re-export commonly used items
pub use encoder::{AudioEncoder, EncoderCapability};
pub use postprocess::{normalize, target_samples};
pub use resample::resample;
pub use transcode::{FfmpegTranscoder, Transcoder, MP3_BITRATE_KBPS};
pub use wav::{write_wav_pcm16, BITS_PER_SAMPLE, CHANNELS};

#[cfg(feature = "mp3")]
pub use transcode::LameTranscoder;
