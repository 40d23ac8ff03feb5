// Pipeline execution and monitoring module
// Runs the transcription stages in order and optionally traces their progress

pub mod trace;
pub mod transcribe;

pub use trace::{read_trace_file, Stage, TraceBuilder, TraceEntry, TraceError, TraceWriter};
pub use transcribe::{PipelineError, Transcriber};
