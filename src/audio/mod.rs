// Audio processing module
// Loading, conditioning, harmonic separation and onset segmentation

pub mod condition;
pub mod hpss;
pub mod ingest;
pub mod integrity;
pub mod onset;
pub mod stft;

pub use condition::{condition, normalize, pre_emphasis, reduce_noise, trim_silence};
pub use hpss::separate;
pub use ingest::{load_audio, AudioBuffer, AudioError, DecodeError};
pub use integrity::{check_integrity, IntegrityError, IntegrityReport};
pub use onset::{detect_onsets, segment, segments_from_onsets, Onset, TimeSegment};
pub use stft::DspError;
