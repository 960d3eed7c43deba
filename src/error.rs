use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum GenomeError {
    #[error("unknown genome build: {0}")]
    InvalidBuild(String),

    #[error("missing config file at {0}")]
    MissingConfig(PathBuf),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("request failed: {0}")]
    Http(String),

    #[error("{url} returned status {status}")]
    HttpStatus { status: u16, url: String },

    #[error("transfer incomplete: expected {expected} bytes, received {received}")]
    #[diagnostic(help("the server closed the stream early; re-run to restart the transfer"))]
    TransferIncomplete { expected: u64, received: u64 },

    #[error("gzip decompression failed: {0}")]
    Decompress(String),

    #[error("failed to open archive: {0}")]
    Archive(String),

    #[error("archive produced no usable members: {0}")]
    EmptyExtraction(PathBuf),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("annotation transform failed: {0}")]
    Transform(String),
}

impl GenomeError {
    /// Errors raised while talking to a remote source.
    pub fn is_transfer(&self) -> bool {
        matches!(
            self,
            GenomeError::Http(_)
                | GenomeError::HttpStatus { .. }
                | GenomeError::TransferIncomplete { .. }
        )
    }
}
