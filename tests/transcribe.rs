// End-to-end transcription tests

use std::path::Path;

use fretnote_lib::audio::{load_audio, segments_from_onsets, AudioError};
use fretnote_lib::pipeline::{read_trace_file, PipelineError, Stage, TraceWriter};
use fretnote_lib::pitch::{estimate, PitchConfig, RawNote};
use fretnote_lib::{format_notes, merge, AudioBuffer, Note, Transcriber};
use tempfile::TempDir;

const SAMPLE_RATE: u32 = 22050;

fn tone(freq: f32, secs: f32) -> Vec<f32> {
    let len = (SAMPLE_RATE as f32 * secs) as usize;
    (0..len)
        .map(|i| 0.8 * (2.0 * std::f32::consts::PI * freq * i as f32 / SAMPLE_RATE as f32).sin())
        .collect()
}

fn write_wav(path: &Path, samples: &[f32]) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for &sample in samples {
        writer
            .write_sample((sample * i16::MAX as f32) as i16)
            .unwrap();
    }
    writer.finalize().unwrap();
}

#[test]
fn test_tone_then_silence_single_note() {
    let mut samples = tone(440.0, 1.0);
    samples.extend(vec![0.0; SAMPLE_RATE as usize]);
    let harmonic = AudioBuffer::new(samples, SAMPLE_RATE);

    let segments = segments_from_onsets(&[0.0], harmonic.duration_secs());
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].end, 2.0);

    let raw = estimate(&harmonic, &segments, &PitchConfig::default()).unwrap();
    assert_eq!(
        raw,
        vec![RawNote {
            note_name: Some("A4".to_string()),
            start: 0.0,
            end: 2.0,
        }]
    );

    let notes = merge(raw);
    assert_eq!(notes, vec![Note::new("A4", 0.0, 2.0)]);
    assert_eq!(format_notes(&notes), "[(A4, 0.000, 2.000)]");
}

#[test]
fn test_wav_file_transcribes_to_a4() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("a4.wav");
    write_wav(&path, &tone(440.0, 1.0));

    let notes = Transcriber::default().transcribe_file(&path).unwrap();

    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].note_name, "A4");
    assert!(notes[0].start < notes[0].end);
    assert!(notes[0].end <= 1.0);
}

#[test]
fn test_silent_wav_transcribes_to_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("silence.wav");
    write_wav(&path, &vec![0.0; SAMPLE_RATE as usize]);

    let notes = Transcriber::default().transcribe_file(&path).unwrap();
    assert!(notes.is_empty());
    assert_eq!(format_notes(&notes), "[]");
}

#[test]
fn test_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("missing.wav");

    assert!(matches!(load_audio(&path), Err(AudioError::NotFound(_))));

    let result = Transcriber::default().transcribe_file(&path);
    match result {
        Err(PipelineError::Integrity(e)) => {
            assert!(e.to_string().starts_with("File cannot be read:"));
        }
        other => panic!("expected integrity failure, got {:?}", other),
    }
}

#[test]
fn test_trace_covers_file_stages() {
    let temp_dir = TempDir::new().unwrap();
    let wav_path = temp_dir.path().join("a4.wav");
    let trace_path = temp_dir.path().join("trace.jsonl");
    write_wav(&wav_path, &tone(440.0, 0.5));

    let transcriber = Transcriber::default().with_trace(TraceWriter::new(trace_path.clone()));
    transcriber.transcribe_file(&wav_path).unwrap();

    let entries = read_trace_file(&trace_path).unwrap();
    let stages: Vec<Stage> = entries.iter().map(|e| e.stage).collect();
    assert_eq!(stages, Stage::ALL.to_vec());

    let load = &entries[1];
    assert_eq!(load.data.as_ref().unwrap()["sample_rate"], SAMPLE_RATE);
    assert_eq!(entries.last().unwrap().progress, 1.0);
}
