// Audio ingestion module
// Loads WAV (hound) or compressed audio (symphonia) from disk into a mono buffer

use hound::{SampleFormat, WavReader};
use std::fs::File;
use std::io::{self, BufReader, Read, Seek};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("The audio file was not found: {}. Check the provided file path.", .0.display())]
    NotFound(PathBuf),

    #[error("Permission denied for accessing the audio file: {}", .0.display())]
    PermissionDenied(PathBuf),

    #[error("An unexpected error occurred while loading the audio file: {source}")]
    LoadFailure {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },
}

/// Underlying cause of a `LoadFailure`
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Failed to read file: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read WAV file: {0}")]
    Wav(#[from] hound::Error),

    #[error("Failed to decode audio: {0}")]
    Codec(#[from] symphonia::core::errors::Error),

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),
}

/// Mono audio samples with their native sampling rate
///
/// Buffers are never mutated once built; every processing step returns a new
/// buffer via [`AudioBuffer::with_samples`].
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        debug_assert!(sample_rate > 0, "sample rate must be positive");
        AudioBuffer {
            samples,
            sample_rate,
        }
    }

    /// New buffer at the same sampling rate
    pub fn with_samples(&self, samples: Vec<f32>) -> Self {
        AudioBuffer::new(samples, self.sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds (`sample_count / sample_rate`)
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Largest absolute sample value
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }
}

/// Average interleaved channels into one
pub fn downmix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }

    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

fn classify_io(path: &Path, error: io::Error) -> AudioError {
    match error.kind() {
        io::ErrorKind::NotFound => AudioError::NotFound(path.to_path_buf()),
        io::ErrorKind::PermissionDenied => AudioError::PermissionDenied(path.to_path_buf()),
        _ => AudioError::LoadFailure {
            path: path.to_path_buf(),
            source: DecodeError::Io(error),
        },
    }
}

fn load_failure(path: &Path, source: impl Into<DecodeError>) -> AudioError {
    let source = source.into();
    match source {
        DecodeError::Io(e) => classify_io(path, e),
        DecodeError::Wav(hound::Error::IoError(e)) => classify_io(path, e),
        DecodeError::Codec(symphonia::core::errors::Error::IoError(e)) => classify_io(path, e),
        source => AudioError::LoadFailure {
            path: path.to_path_buf(),
            source,
        },
    }
}

/// Load an audio file at its native sampling rate, downmixed to mono
///
/// RIFF/WAVE files are read with hound; anything else is probed by symphonia.
pub fn load_audio(path: &Path) -> Result<AudioBuffer, AudioError> {
    let mut file = File::open(path).map_err(|e| classify_io(path, e))?;

    let metadata = file.metadata().map_err(|e| classify_io(path, e))?;
    if !metadata.is_file() {
        return Err(AudioError::NotFound(path.to_path_buf()));
    }

    let mut magic = Vec::with_capacity(4);
    (&mut file)
        .take(4)
        .read_to_end(&mut magic)
        .map_err(|e| classify_io(path, e))?;
    file.rewind().map_err(|e| classify_io(path, e))?;

    let buffer = if magic == b"RIFF" {
        decode_wav(BufReader::new(file)).map_err(|e| load_failure(path, e))?
    } else {
        decode_compressed(file, path).map_err(|e| load_failure(path, e))?
    };

    log::debug!(
        "Loaded {}: {} samples at {} Hz ({:.3} s)",
        path.display(),
        buffer.len(),
        buffer.sample_rate(),
        buffer.duration_secs()
    );

    Ok(buffer)
}

/// Decode a WAV stream, normalizing samples to f32 in [-1.0, 1.0]
pub fn decode_wav<R: Read>(reader: R) -> Result<AudioBuffer, DecodeError> {
    let mut reader = WavReader::new(reader)?;

    let spec = reader.spec();
    let sample_rate = spec.sample_rate;
    let channels = spec.channels as usize;
    let bit_depth = spec.bits_per_sample;
    let sample_format = spec.sample_format;

    if sample_rate == 0 || channels == 0 {
        return Err(DecodeError::UnsupportedFormat(format!(
            "{} Hz, {} channels",
            sample_rate, channels
        )));
    }

    let samples: Vec<f32> = match (sample_format, bit_depth) {
        (SampleFormat::Int, 8) => reader
            .samples::<i32>()
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|s| s as f32 / 128.0)
            .collect(),
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|s| s as f32 / 32768.0)
            .collect(),
        (SampleFormat::Int, 24) => reader
            .samples::<i32>()
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|s| s as f32 / 8388608.0)
            .collect(),
        (SampleFormat::Int, 32) => reader
            .samples::<i32>()
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|s| s as f32 / 2147483648.0)
            .collect(),
        (SampleFormat::Float, 32) => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        _ => {
            return Err(DecodeError::UnsupportedFormat(format!(
                "{:?} {}-bit audio",
                sample_format, bit_depth
            )));
        }
    };

    Ok(AudioBuffer::new(
        downmix_to_mono(&samples, channels),
        sample_rate,
    ))
}

/// Decode MP3/OGG/FLAC/MP4 audio through symphonia
fn decode_compressed(file: File, path: &Path) -> Result<AudioBuffer, DecodeError> {
    use symphonia::core::audio::SampleBuffer;
    use symphonia::core::codecs::DecoderOptions;
    use symphonia::core::errors::Error as SymphoniaError;
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| DecodeError::UnsupportedFormat("no audio track found".into()))?;

    let sample_rate = track
        .codec_params
        .sample_rate
        .filter(|&rate| rate > 0)
        .ok_or_else(|| DecodeError::UnsupportedFormat("unknown sample rate".into()))?;
    let track_id = track.id;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())?;

    let mut interleaved: Vec<f32> = Vec::new();
    let mut channels = 1usize;
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("Skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        channels = decoded.spec().channels.count().max(1);

        // Reuse the sample buffer unless this packet is larger
        if sample_buf
            .as_ref()
            .map_or(true, |buf| buf.capacity() < decoded.capacity())
        {
            sample_buf = Some(SampleBuffer::new(
                decoded.capacity() as u64,
                *decoded.spec(),
            ));
        }

        if let Some(buf) = sample_buf.as_mut() {
            buf.copy_interleaved_ref(decoded);
            interleaved.extend_from_slice(buf.samples());
        }
    }

    Ok(AudioBuffer::new(
        downmix_to_mono(&interleaved, channels),
        sample_rate,
    ))
}
