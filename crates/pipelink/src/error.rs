//! Error types for the pipelink binary

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Pipe error: {0}")]
    Pipe(#[from] libpipelink::PipeError),

    /// Spawning the stdin reader failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Pipe(libpipelink::PipeError::Config(_))
            | CliError::Pipe(libpipelink::PipeError::ConfigParse(_)) => 2,
            CliError::Pipe(_) => 3,
            CliError::Io(_) => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;
