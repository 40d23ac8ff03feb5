use clap::Parser;
use std::path::PathBuf;

use fretnote_lib::pipeline::{PipelineError, TraceWriter};
use fretnote_lib::{format_notes, Transcriber, TranscriptionConfig};

/// Optional JSON file overriding the default analysis parameters
const CONFIG_ENV: &str = "FRETNOTE_CONFIG";

/// Optional JSONL file receiving one entry per pipeline stage
const TRACE_ENV: &str = "FRETNOTE_TRACE";

#[derive(Parser)]
#[command(
    name = "fretnote",
    version,
    about = "Process a single audio file to transcribe guitar notes."
)]
struct Cli {
    /// Path to the audio file.
    file_path: PathBuf,
}

fn load_config() -> Result<TranscriptionConfig, fretnote_lib::ConfigError> {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) => TranscriptionConfig::from_json_file(&PathBuf::from(path)),
        None => Ok(TranscriptionConfig::default()),
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            println!("An error occurred: {}", e);
            return;
        }
    };

    let mut transcriber = Transcriber::new(config);
    if let Some(path) = std::env::var_os(TRACE_ENV) {
        transcriber = transcriber.with_trace(TraceWriter::new(PathBuf::from(path)));
    }

    // Failures are reported on stdout; the process still exits normally
    match transcriber.transcribe_file(&cli.file_path) {
        Ok(notes) => println!("{}", format_notes(&notes)),
        Err(PipelineError::Integrity(e)) => {
            println!("{}", e);
            println!("File is corrupted or unreadable.");
        }
        Err(e) => println!("An error occurred: {}", e),
    }
}
