// Pipeline progress tracing
// Append-only JSONL file with one entry per transcription stage

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during trace operations
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Transcription stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Integrity,
    Load,
    Condition,
    Separate,
    Segment,
    Pitch,
    Merge,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::Integrity,
        Stage::Load,
        Stage::Condition,
        Stage::Separate,
        Stage::Segment,
        Stage::Pitch,
        Stage::Merge,
    ];

    /// Overall pipeline progress once this stage has finished [0.0, 1.0]
    pub fn progress(self) -> f32 {
        let index = Stage::ALL.iter().position(|&s| s == self).unwrap_or(0);
        (index + 1) as f32 / Stage::ALL.len() as f32
    }
}

/// A single trace entry in the pipeline execution log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    /// RFC 3339 timestamp of when this entry was created
    pub timestamp: String,

    pub stage: Stage,

    /// Progress [0.0, 1.0]
    pub progress: f32,

    /// Human-readable message describing the stage outcome
    pub message: String,

    /// Optional structured data (sample counts, onset counts, notes)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl TraceEntry {
    pub fn new(stage: Stage, progress: f32, message: String) -> Self {
        TraceEntry {
            timestamp: Utc::now().to_rfc3339(),
            stage,
            progress: progress.clamp(0.0, 1.0),
            message,
            data: None,
        }
    }

    /// Serialize to JSON line (with newline)
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{}\n", json))
    }
}

/// Appends trace entries to a JSONL file
pub struct TraceWriter {
    file_path: PathBuf,
}

impl TraceWriter {
    pub fn new(file_path: PathBuf) -> Self {
        TraceWriter { file_path }
    }

    /// Append a trace entry, creating the file if needed
    pub fn write(&self, entry: &TraceEntry) -> Result<(), TraceError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;

        let json_line = entry.to_json_line()?;
        file.write_all(json_line.as_bytes())?;
        file.flush()?;

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }
}

/// Helper builder for stage entries
pub struct TraceBuilder {
    stage: Stage,
}

impl TraceBuilder {
    pub fn stage(stage: Stage) -> Self {
        TraceBuilder { stage }
    }

    /// Entry marking the stage as finished
    pub fn complete(self, message: impl Into<String>) -> TraceEntry {
        TraceEntry::new(self.stage, self.stage.progress(), message.into())
    }

    /// Finished entry carrying structured data
    pub fn complete_with_data(
        self,
        message: impl Into<String>,
        data: serde_json::Value,
    ) -> TraceEntry {
        TraceEntry {
            data: Some(data),
            ..self.complete(message)
        }
    }
}

/// Read trace entries from a JSONL file
pub fn read_trace_file(path: &Path) -> Result<Vec<TraceEntry>, TraceError> {
    let contents = std::fs::read_to_string(path)?;
    let mut entries = Vec::new();

    for line in contents.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let entry: TraceEntry = serde_json::from_str(line)?;
        entries.push(entry);
    }

    Ok(entries)
}
