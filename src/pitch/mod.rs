// Pitch estimation module
// Per-frame pitch tracking, per-segment peak selection, and note naming

pub mod estimate;
pub mod note_name;
pub mod piptrack;

pub use estimate::{estimate, estimate_segment, round_millis, RawNote};
pub use note_name::{frequency_to_midi, frequency_to_note_name, midi_to_note_name};
pub use piptrack::{piptrack, PitchTrack};

use serde::{Deserialize, Serialize};

/// Configuration for pitch tracking and segment pitch selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PitchConfig {
    /// FFT window size in samples
    pub n_fft: usize,

    /// Hop size in samples; also converts segment times to frames
    pub hop_length: usize,

    /// Lowest candidate frequency in Hz (inclusive)
    pub fmin: f32,

    /// Highest candidate frequency in Hz (exclusive), capped at Nyquist
    pub fmax: f32,

    /// Peaks below this fraction of the frame maximum are ignored
    pub threshold: f32,

    /// Segments whose winning magnitude falls below this are left unpitched
    pub min_magnitude: f32,
}

impl Default for PitchConfig {
    fn default() -> Self {
        PitchConfig {
            n_fft: 2048,
            hop_length: 512,
            fmin: 150.0,
            fmax: 4000.0,
            threshold: 0.1,
            min_magnitude: 0.0,
        }
    }
}
