use std::io::{self, Write};

use flate2::read::MultiGzDecoder;

use crate::error::GenomeError;
use crate::staging::{StagedFile, Staging};

/// Gunzips a staged file into a new staged file. The input is consumed either way.
pub fn decompress(input: StagedFile, staging: &Staging) -> Result<StagedFile, GenomeError> {
    let mut decoder = MultiGzDecoder::new(input.open()?);
    let mut output = staging.create_file("gunzip")?;
    let written = io::copy(&mut decoder, output.as_file_mut())
        .map_err(|err| GenomeError::Decompress(err.to_string()))?;
    output
        .as_file_mut()
        .flush()
        .map_err(|err| GenomeError::Filesystem(err.to_string()))?;
    drop(decoder);

    tracing::debug!(
        compressed = input.len().unwrap_or_default(),
        decompressed = written,
        "gzip stream decompressed"
    );
    input.discard()?;
    Ok(StagedFile::from(output))
}
