// Transcription pipeline
// integrity -> load -> condition -> separate -> segment -> pitch -> merge

use serde_json::json;
use std::path::Path;
use thiserror::Error;

use crate::audio::{self, AudioBuffer, AudioError, DspError, IntegrityError};
use crate::config::TranscriptionConfig;
use crate::notes::{self, Note};
use crate::pipeline::trace::{Stage, TraceBuilder, TraceEntry, TraceWriter};
use crate::pitch;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("File is corrupted or unreadable. {0}")]
    Integrity(#[from] IntegrityError),

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error("Audio analysis failed: {0}")]
    Dsp(#[from] DspError),
}

/// Runs the full pipeline for one file at a time
///
/// Holds no state between runs apart from its configuration and trace sink.
pub struct Transcriber {
    config: TranscriptionConfig,
    trace: Option<TraceWriter>,
}

impl Transcriber {
    pub fn new(config: TranscriptionConfig) -> Self {
        Transcriber {
            config,
            trace: None,
        }
    }

    /// Record one JSONL entry per finished stage
    pub fn with_trace(mut self, writer: TraceWriter) -> Self {
        self.trace = Some(writer);
        self
    }

    pub fn config(&self) -> &TranscriptionConfig {
        &self.config
    }

    fn record(&self, entry: TraceEntry) {
        if let Some(ref writer) = self.trace {
            if let Err(e) = writer.write(&entry) {
                log::warn!(
                    "Failed to write trace entry to {}: {}",
                    writer.path().display(),
                    e
                );
            }
        }
    }

    /// Check, load and transcribe an audio file
    pub fn transcribe_file(&self, path: &Path) -> Result<Vec<Note>, PipelineError> {
        let report = audio::check_integrity(path)?;
        self.record(TraceBuilder::stage(Stage::Integrity).complete_with_data(
            format!("Read {} bytes", report.byte_len),
            json!({ "bytes": report.byte_len, "sha256": report.sha256 }),
        ));

        let buffer = audio::load_audio(path)?;
        log::info!(
            "Loaded {}: {} Hz, {:.3} s",
            path.display(),
            buffer.sample_rate(),
            buffer.duration_secs()
        );
        self.record(TraceBuilder::stage(Stage::Load).complete_with_data(
            format!("Loaded {} samples", buffer.len()),
            json!({ "samples": buffer.len(), "sample_rate": buffer.sample_rate() }),
        ));

        self.transcribe(&buffer)
    }

    /// Transcribe an already loaded buffer
    ///
    /// Every stage is total: silence or unpitched audio yields an empty list.
    pub fn transcribe(&self, buffer: &AudioBuffer) -> Result<Vec<Note>, PipelineError> {
        let config = &self.config;

        let conditioned = audio::condition(
            buffer,
            &config.trim,
            &config.denoise,
            config.pre_emphasis,
        )?;
        self.record(TraceBuilder::stage(Stage::Condition).complete_with_data(
            format!("Conditioned to {} samples", conditioned.len()),
            json!({ "samples": conditioned.len() }),
        ));

        // The percussive half is not used for transcription
        let (harmonic, _percussive) = audio::separate(&conditioned, &config.hpss)?;
        self.record(TraceBuilder::stage(Stage::Separate).complete("Separated harmonic component"));

        let segments = audio::segment(&harmonic, &config.onset)?;
        log::info!("Detected {} segments", segments.len());
        self.record(TraceBuilder::stage(Stage::Segment).complete_with_data(
            format!("Detected {} onsets", segments.len()),
            json!({ "onsets": segments.len(), "duration_secs": harmonic.duration_secs() }),
        ));

        let raw_notes = pitch::estimate(&harmonic, &segments, &config.pitch)?;
        let pitched = raw_notes.iter().filter(|n| n.note_name.is_some()).count();
        log::info!("Pitched {} of {} segments", pitched, raw_notes.len());
        self.record(TraceBuilder::stage(Stage::Pitch).complete_with_data(
            format!("Pitched {} of {} segments", pitched, raw_notes.len()),
            json!({ "pitched": pitched, "segments": raw_notes.len() }),
        ));

        let notes = notes::merge(raw_notes);
        log::info!("Transcribed {} notes", notes.len());
        self.record(TraceBuilder::stage(Stage::Merge).complete_with_data(
            format!("Merged into {} notes", notes.len()),
            json!({ "notes": notes }),
        ));

        Ok(notes)
    }
}

impl Default for Transcriber {
    fn default() -> Self {
        Transcriber::new(TranscriptionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::trace::read_trace_file;
    use tempfile::TempDir;

    #[test]
    fn test_silence_transcribes_to_nothing() {
        let buffer = AudioBuffer::new(vec![0.0; 22050], 22050);
        let notes = Transcriber::default().transcribe(&buffer).unwrap();
        assert!(notes.is_empty());
    }

    #[test]
    fn test_missing_file_fails_integrity() {
        let temp_dir = TempDir::new().unwrap();
        let result = Transcriber::default().transcribe_file(&temp_dir.path().join("missing.wav"));
        assert!(matches!(result, Err(PipelineError::Integrity(_))));
    }

    #[test]
    fn test_undecodable_file_fails_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("notes.ogg");
        std::fs::write(&path, b"this is plain text, not audio").unwrap();

        let result = Transcriber::default().transcribe_file(&path);
        assert!(matches!(
            result,
            Err(PipelineError::Audio(AudioError::LoadFailure { .. }))
        ));
    }

    #[test]
    fn test_trace_records_every_stage() {
        let temp_dir = TempDir::new().unwrap();
        let trace_path = temp_dir.path().join("trace.jsonl");
        let transcriber =
            Transcriber::default().with_trace(TraceWriter::new(trace_path.clone()));

        let buffer = AudioBuffer::new(vec![0.0; 8000], 8000);
        transcriber.transcribe(&buffer).unwrap();

        let stages: Vec<Stage> = read_trace_file(&trace_path)
            .unwrap()
            .into_iter()
            .map(|e| e.stage)
            .collect();
        assert_eq!(
            stages,
            vec![
                Stage::Condition,
                Stage::Separate,
                Stage::Segment,
                Stage::Pitch,
                Stage::Merge
            ]
        );
    }

    #[test]
    fn test_trace_failure_does_not_fail_run() {
        let temp_dir = TempDir::new().unwrap();
        // A directory cannot be opened for appending
        let transcriber =
            Transcriber::default().with_trace(TraceWriter::new(temp_dir.path().to_path_buf()));

        let buffer = AudioBuffer::new(vec![0.0; 8000], 8000);
        assert!(transcriber.transcribe(&buffer).unwrap().is_empty());
    }
}
