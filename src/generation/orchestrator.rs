//! Generation orchestrator.
//!
//! Drives one request through prompt construction, the model backend, the
//! post-processor and the encoder. Any failure along that chain is replaced
//! by a silent lossless track of the requested duration, so the caller
//! always receives a playable file.

use std::sync::Arc;

use tracing::{info, warn};

use crate::audio::{normalize, AudioEncoder, EncoderCapability};
use crate::config::{ComposerConfig, DEFAULT_GUIDANCE_SCALE};
use crate::error::{ComposerError, Result};
use crate::models::{ModelBackend, MusicGenBackend};
use crate::types::{
    AudioArtifact, AudioFormat, GenerationOutcome, GenerationRequest, NormalizedWaveform,
    OutputBase, Style,
};

use super::prompt::build_prompt;
use super::storage::MediaStore;

/// Turns generation requests into stored audio files.
pub struct Composer {
    backend: Arc<dyn ModelBackend>,
    encoder: AudioEncoder,
    store: MediaStore,
    sample_rate: u32,
    guidance_scale: f32,
}

impl Composer {
    /// Creates an orchestrator from its collaborators.
    ///
    /// The backend must return waveforms at `sample_rate`.
    pub fn new(
        backend: Arc<dyn ModelBackend>,
        encoder: AudioEncoder,
        store: MediaStore,
        sample_rate: u32,
    ) -> Self {
        Self {
            backend,
            encoder,
            store,
            sample_rate,
            guidance_scale: DEFAULT_GUIDANCE_SCALE,
        }
    }

    /// Builds the MusicGen backend, probes the encoder capability and
    /// prepares the media store described by `config`.
    pub fn from_config(config: &ComposerConfig) -> Self {
        let capability = EncoderCapability::detect(config.compressed_output);
        info!(
            media_root = %config.media_root.display(),
            model = %config.effective_model_path().display(),
            sample_rate = config.sample_rate,
            encoder = %capability.describe(),
            "composer configured"
        );

        Self::new(
            Arc::new(MusicGenBackend::from_config(config)),
            AudioEncoder::new(capability),
            MediaStore::new(&config.media_root),
            config.sample_rate,
        )
        .with_guidance_scale(config.guidance_scale)
    }

    /// Sets the classifier-free guidance scale passed to the backend.
    pub fn with_guidance_scale(mut self, guidance_scale: f32) -> Self {
        self.guidance_scale = guidance_scale;
        self
    }

    /// The media store output is written to.
    pub fn store(&self) -> &MediaStore {
        &self.store
    }

    /// Output sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Generates and stores a clip for `request`.
    ///
    /// Model, post-processing and encoding failures are not returned: a
    /// silent WAV of the requested duration is stored instead and reported
    /// as [`GenerationOutcome::FallbackUsed`]. Only a failure to store that
    /// silent track is an error.
    pub fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutcome> {
        if request.duration_seconds == 0 {
            return Err(ComposerError::invalid_duration(request.duration_seconds));
        }

        let prompt = build_prompt(&request.style, request.trimmed_hint());
        info!(
            style = %request.style,
            duration = request.duration_seconds,
            prompt = %prompt,
            "generation requested"
        );

        match self.compose(request, &prompt) {
            Ok(artifact) => {
                info!(path = %artifact.relative_path, format = %artifact.format, "generated");
                Ok(GenerationOutcome::Generated(artifact))
            }
            Err(e) => {
                warn!(error = %e, "generation failed, storing silent track");
                let artifact = self.store_silence(request)?;
                Ok(GenerationOutcome::FallbackUsed {
                    artifact,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Generates a clip and returns its path relative to the media root.
    ///
    /// Unrecognized style labels are accepted as-is.
    pub fn generate_file(
        &self,
        style: &str,
        hint: Option<&str>,
        duration_seconds: u32,
    ) -> Result<String> {
        let request = GenerationRequest::new(
            Style::from_label(style),
            hint.map(str::to_string),
            duration_seconds,
        )?;
        Ok(self.generate(&request)?.into_relative_path())
    }

    fn compose(&self, request: &GenerationRequest, prompt: &str) -> Result<AudioArtifact> {
        let raw = self
            .backend
            .infer(prompt, request.duration_seconds, self.guidance_scale)?;
        let waveform = normalize(raw, request.duration_seconds, self.sample_rate);

        let base = self.store.prepare(&request.style)?;
        self.encoder.encode(&waveform, &base).inspect_err(|_| discard(&base))
    }

    fn store_silence(&self, request: &GenerationRequest) -> Result<AudioArtifact> {
        let silence = NormalizedWaveform::silence(request.duration_seconds, self.sample_rate);
        let base = self.store.prepare(&request.style)?;
        self.encoder
            .encode_lossless(&silence, &base)
            .inspect_err(|_| discard(&base))
    }
}

/// Removes whatever a failed encode left at `base`.
fn discard(base: &OutputBase) {
    for format in [AudioFormat::Wav, AudioFormat::Mp3] {
        let _ = std::fs::remove_file(base.absolute_path(format));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::wav::read_wav_pcm16;
    use crate::audio::Transcoder;
    use crate::error::ErrorCode;
    use crate::types::RawWaveform;
    use std::collections::HashSet;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::{tempdir, TempDir};

    const RATE: u32 = 16_000;

    /// Loud stereo sine, slightly longer than requested.
    struct ToneBackend;

    impl ModelBackend for ToneBackend {
        fn infer(&self, _prompt: &str, duration_seconds: u32, _guidance: f32) -> Result<RawWaveform> {
            let frames = duration_seconds as usize * RATE as usize + 1234;
            let samples = (0..frames)
                .flat_map(|i| {
                    let s = (i as f32 * 0.07).sin() * 1.5;
                    [s, s * 0.5]
                })
                .collect();
            Ok(RawWaveform::new(samples, 2, RATE))
        }
    }

    struct FailingBackend;

    impl ModelBackend for FailingBackend {
        fn infer(&self, _prompt: &str, _duration: u32, _guidance: f32) -> Result<RawWaveform> {
            Err(ComposerError::model_load_failed("no accelerator and no weights"))
        }
    }

    /// Records every call and returns a short mono clip.
    #[derive(Default)]
    struct CountingBackend {
        calls: AtomicUsize,
        seen: Mutex<Vec<(String, u32, f32)>>,
    }

    impl ModelBackend for CountingBackend {
        fn infer(&self, prompt: &str, duration_seconds: u32, guidance: f32) -> Result<RawWaveform> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen
                .lock()
                .unwrap()
                .push((prompt.to_string(), duration_seconds, guidance));
            Ok(RawWaveform::mono(vec![0.25; 100], RATE))
        }
    }

    struct BrokenTranscoder;

    impl Transcoder for BrokenTranscoder {
        fn name(&self) -> &str {
            "broken"
        }

        fn transcode(&self, _wav: &Path, mp3: &Path) -> Result<()> {
            std::fs::write(mp3, b"half").ok();
            Err(ComposerError::transcode_failed("encoder crashed"))
        }
    }

    /// Leaves a half-written MP3 and a corrupted WAV behind.
    struct ClobberingTranscoder;

    impl Transcoder for ClobberingTranscoder {
        fn name(&self) -> &str {
            "clobbering"
        }

        fn transcode(&self, wav: &Path, mp3: &Path) -> Result<()> {
            std::fs::write(mp3, b"half").ok();
            std::fs::write(wav, b"junk").ok();
            Err(ComposerError::transcode_failed("encoder crashed"))
        }
    }

    struct CopyTranscoder;

    impl Transcoder for CopyTranscoder {
        fn name(&self) -> &str {
            "copy"
        }

        fn transcode(&self, wav: &Path, mp3: &Path) -> Result<()> {
            std::fs::copy(wav, mp3)
                .map(|_| ())
                .map_err(|e| ComposerError::transcode_failed(e.to_string()))
        }
    }

    fn composer(dir: &TempDir, backend: impl ModelBackend + 'static) -> Composer {
        composer_with(dir, backend, EncoderCapability::LosslessOnly)
    }

    fn composer_with(
        dir: &TempDir,
        backend: impl ModelBackend + 'static,
        capability: EncoderCapability,
    ) -> Composer {
        Composer::new(
            Arc::new(backend),
            AudioEncoder::new(capability),
            MediaStore::new(dir.path()),
            RATE,
        )
    }

    fn decode(composer: &Composer, relative: &str) -> (Vec<i16>, hound::WavSpec) {
        read_wav_pcm16(&composer.store().resolve(relative)).unwrap()
    }

    #[test]
    fn jazz_clip_has_exact_length() {
        let dir = tempdir().unwrap();
        let composer = composer(&dir, ToneBackend);
        let request = GenerationRequest::new(Style::Jazz, Some(String::new()), 5).unwrap();

        let outcome = composer.generate(&request).unwrap();

        assert!(!outcome.is_fallback());
        assert!(outcome.relative_path().starts_with("compositions/Jazz_"));
        assert!(outcome.relative_path().ends_with(".wav"));

        let (samples, spec) = decode(&composer, outcome.relative_path());
        assert_eq!(samples.len(), 80_000);
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, RATE);
        // Clipped input reaches full scale without wrapping.
        assert!(samples.iter().any(|&s| s == i16::MAX || s == -i16::MAX));
        assert!(samples.iter().all(|&s| s >= -i16::MAX));
    }

    #[test]
    fn failing_backend_yields_silent_track() {
        let dir = tempdir().unwrap();
        let composer = composer(&dir, FailingBackend);
        let request = GenerationRequest::new(Style::Pop, Some("upbeat".into()), 3).unwrap();

        let outcome = composer.generate(&request).unwrap();

        let GenerationOutcome::FallbackUsed { artifact, reason } = &outcome else {
            panic!("expected fallback, got {:?}", outcome);
        };
        assert_eq!(artifact.format, AudioFormat::Wav);
        assert!(reason.contains("MODEL_LOAD_FAILED"));

        let (samples, _) = decode(&composer, &artifact.relative_path);
        assert_eq!(samples.len(), 3 * RATE as usize);
        assert!(samples.iter().all(|&s| s == 0));
    }

    #[test]
    fn repeated_fallbacks_get_distinct_names() {
        let dir = tempdir().unwrap();
        let composer = composer(&dir, FailingBackend);

        let paths: Vec<String> = (0..5)
            .map(|_| composer.generate_file("Pop", None, 2).unwrap())
            .collect();

        let unique: HashSet<&String> = paths.iter().collect();
        assert_eq!(unique.len(), paths.len());
        for path in &paths {
            let (samples, _) = decode(&composer, path);
            assert_eq!(samples.len(), 2 * RATE as usize);
            assert!(samples.iter().all(|&s| s == 0));
        }
    }

    #[test]
    fn prompt_and_guidance_reach_the_backend() {
        let dir = tempdir().unwrap();
        let backend = Arc::new(CountingBackend::default());
        let composer = Composer::new(
            backend.clone(),
            AudioEncoder::new(EncoderCapability::LosslessOnly),
            MediaStore::new(dir.path()),
            RATE,
        )
        .with_guidance_scale(4.5);

        let path = composer
            .generate_file("Classical", Some("  dreamy  "), 2)
            .unwrap();

        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        let seen = backend.seen.lock().unwrap();
        let (prompt, duration, guidance) = &seen[0];
        assert!(prompt.starts_with("classical instrumental track"));
        assert!(prompt.ends_with(". Details: dreamy"));
        assert_eq!(*duration, 2);
        assert_eq!(*guidance, 4.5);

        // Short model output is padded with silence.
        let (samples, _) = decode(&composer, &path);
        assert_eq!(samples.len(), 2 * RATE as usize);
        assert!(samples[..100].iter().all(|&s| s == 8192));
        assert!(samples[100..].iter().all(|&s| s == 0));
    }

    #[test]
    fn failed_transcode_keeps_generated_wav() {
        let dir = tempdir().unwrap();
        let composer = composer_with(
            &dir,
            ToneBackend,
            EncoderCapability::with_transcoder(BrokenTranscoder),
        );

        let outcome = composer.generate_file("Jazz", None, 1).unwrap();

        assert!(outcome.ends_with(".wav"));
        let (samples, _) = decode(&composer, &outcome);
        assert_eq!(samples.len(), RATE as usize);
        let mp3 = composer.store().resolve(&outcome).with_extension("mp3");
        assert!(!mp3.exists());
    }

    #[test]
    fn successful_transcode_returns_mp3() {
        let dir = tempdir().unwrap();
        let composer = composer_with(
            &dir,
            ToneBackend,
            EncoderCapability::with_transcoder(CopyTranscoder),
        );

        let outcome = composer
            .generate(&GenerationRequest::new(Style::Jazz, None, 1).unwrap())
            .unwrap();

        assert_eq!(outcome.artifact().format, AudioFormat::Mp3);
        let mp3 = composer.store().resolve(outcome.relative_path());
        assert!(mp3.exists());
        assert!(!mp3.with_extension("wav").exists());
    }

    #[test]
    fn encode_failure_discards_partial_files() {
        let dir = tempdir().unwrap();
        let composer = composer_with(
            &dir,
            ToneBackend,
            EncoderCapability::with_transcoder(ClobberingTranscoder),
        );

        let outcome = composer
            .generate(&GenerationRequest::new(Style::Jazz, None, 2).unwrap())
            .unwrap();

        let GenerationOutcome::FallbackUsed { artifact, reason } = &outcome else {
            panic!("expected fallback, got {:?}", outcome);
        };
        assert!(reason.contains("AUDIO_WRITE_FAILED"));
        let (samples, _) = decode(&composer, &artifact.relative_path);
        assert_eq!(samples.len(), 2 * RATE as usize);
        assert!(samples.iter().all(|&s| s == 0));

        let left: Vec<_> = std::fs::read_dir(composer.store().compositions_dir())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(left, vec![composer.store().resolve(&artifact.relative_path)]);
    }

    #[test]
    fn fallback_is_never_transcoded() {
        let dir = tempdir().unwrap();
        let composer = composer_with(
            &dir,
            FailingBackend,
            EncoderCapability::with_transcoder(CopyTranscoder),
        );

        let outcome = composer
            .generate(&GenerationRequest::new(Style::Pop, None, 1).unwrap())
            .unwrap();

        assert!(outcome.is_fallback());
        assert_eq!(outcome.artifact().format, AudioFormat::Wav);
    }

    #[test]
    fn unknown_style_is_accepted_and_sanitized() {
        let dir = tempdir().unwrap();
        let composer = composer(&dir, ToneBackend);

        let path = composer.generate_file("Synth Wave/80s", None, 1).unwrap();

        assert!(path.starts_with("compositions/Synth_Wave_80s_"));
        assert!(composer.store().resolve(&path).exists());
    }

    #[test]
    fn unusable_media_root_is_fatal() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("file");
        std::fs::write(&root, b"not a directory").unwrap();
        let composer = Composer::new(
            Arc::new(FailingBackend),
            AudioEncoder::new(EncoderCapability::LosslessOnly),
            MediaStore::new(&root),
            RATE,
        );

        let err = composer.generate_file("Jazz", None, 1).unwrap_err();
        assert_eq!(err.code, ErrorCode::StorageFailed);
    }

    #[test]
    fn zero_duration_is_rejected() {
        let dir = tempdir().unwrap();
        let composer = composer(&dir, ToneBackend);

        let err = composer.generate_file("Jazz", None, 0).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidDuration);

        let request = GenerationRequest {
            style: Style::Jazz,
            hint: None,
            duration_seconds: 0,
        };
        assert_eq!(
            composer.generate(&request).unwrap_err().code,
            ErrorCode::InvalidDuration
        );
    }

    #[test]
    fn concurrent_requests_share_one_composer() {
        let dir = tempdir().unwrap();
        let composer = composer(&dir, ToneBackend);

        let paths: Vec<String> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| s.spawn(|| composer.generate_file("Pop", None, 1).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let unique: HashSet<&String> = paths.iter().collect();
        assert_eq!(unique.len(), 4);
    }
}
