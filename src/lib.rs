// Fretnote - monophonic guitar recording to note transcription
// Module declarations

pub mod audio;
pub mod config;
pub mod notes;
pub mod pipeline;
pub mod pitch;

pub use audio::{AudioBuffer, AudioError, TimeSegment};
pub use config::{ConfigError, TranscriptionConfig};
pub use notes::{format_notes, merge, Note};
pub use pipeline::{PipelineError, Transcriber};
pub use pitch::RawNote;
