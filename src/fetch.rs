use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::domain::Resource;
use crate::error::GenomeError;
use crate::progress::{ProgressSink, ProgressUnit, format_bytes};
use crate::staging::{StagedFile, Staging};
use crate::transport::Transport;

const BLOCK_SIZE: usize = 64 * 1024;

static REMOTE_SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?i)(https?|ftp)://").expect("valid scheme pattern"));

pub fn is_remote(locator: &str) -> bool {
    REMOTE_SCHEME.is_match(locator)
}

/// A resource copied into staging, plus what the transfer looked like.
#[derive(Debug)]
pub struct Fetched {
    pub file: StagedFile,
    pub received: u64,
    pub expected: Option<u64>,
}

impl Fetched {
    /// True when the source declared a length the stream did not deliver.
    pub fn is_incomplete(&self) -> bool {
        self.expected
            .map(|expected| expected != self.received)
            .unwrap_or(false)
    }
}

pub struct Fetcher<'a> {
    transport: &'a dyn Transport,
    staging: &'a Staging,
    strict: bool,
}

impl<'a> Fetcher<'a> {
    pub fn new(transport: &'a dyn Transport, staging: &'a Staging, strict: bool) -> Self {
        Self {
            transport,
            staging,
            strict,
        }
    }

    /// Always restarts from byte zero; there is no resume.
    pub fn fetch(
        &self,
        resource: &Resource,
        progress: &dyn ProgressSink,
    ) -> Result<Fetched, GenomeError> {
        if is_remote(resource.locator()) {
            self.fetch_remote(resource, progress)
        } else {
            self.fetch_local(Path::new(resource.locator()))
        }
    }

    fn fetch_remote(
        &self,
        resource: &Resource,
        progress: &dyn ProgressSink,
    ) -> Result<Fetched, GenomeError> {
        tracing::info!(url = %resource, post = resource.form().is_some(), "downloading");
        let mut body = self.transport.open(resource)?;
        let mut staged = self.staging.create_file("fetch")?;

        let task = progress.begin(
            &format!("Downloading {resource}"),
            body.total,
            ProgressUnit::Bytes,
        );
        let copied = copy_blocks(&mut body.reader, staged.as_file_mut(), |n| {
            task.advance(n as u64)
        });
        task.finish();
        let copied = copied?;
        let received = copied.bytes;

        // A body cut short of its declared length surfaces as a read error, not a clean EOF.
        if let Some(err) = copied.interrupted {
            match body.total {
                Some(expected) if received < expected => {
                    tracing::debug!(url = %resource, received, error = %err, "body ended early");
                }
                _ => return Err(GenomeError::Http(format!("read response body: {err}"))),
            }
        }

        let fetched = Fetched {
            file: StagedFile::from(staged),
            received,
            expected: body.total,
        };

        if let Some(expected) = fetched.expected.filter(|_| fetched.is_incomplete()) {
            if self.strict {
                return Err(GenomeError::TransferIncomplete { expected, received });
            }
            tracing::warn!(
                url = %resource,
                expected,
                received,
                "transfer incomplete, keeping partial payload"
            );
        } else {
            tracing::debug!(url = %resource, size = %format_bytes(received), "download finished");
        }
        Ok(fetched)
    }

    fn fetch_local(&self, source: &Path) -> Result<Fetched, GenomeError> {
        tracing::info!(path = %source.display(), "copying local file");
        let mut input = File::open(source).map_err(|err| {
            GenomeError::Filesystem(format!("open {}: {err}", source.display()))
        })?;
        let mut staged = self.staging.create_file("fetch")?;
        let received = io::copy(&mut input, staged.as_file_mut())
            .map_err(|err| GenomeError::Filesystem(err.to_string()))?;
        staged
            .as_file_mut()
            .flush()
            .map_err(|err| GenomeError::Filesystem(err.to_string()))?;
        Ok(Fetched {
            file: StagedFile::from(staged),
            received,
            expected: None,
        })
    }
}

/// Bytes written before the stream ended, and the read error that ended it, if any.
struct Copied {
    bytes: u64,
    interrupted: Option<io::Error>,
}

fn copy_blocks<R, W, F>(reader: &mut R, writer: &mut W, mut on_block: F) -> Result<Copied, GenomeError>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
    F: FnMut(usize),
{
    let mut buffer = vec![0u8; BLOCK_SIZE];
    let mut bytes = 0u64;
    let mut interrupted = None;
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                interrupted = Some(err);
                break;
            }
        };
        writer
            .write_all(&buffer[..read])
            .map_err(|err| GenomeError::Filesystem(err.to_string()))?;
        bytes += read as u64;
        on_block(read);
    }
    writer
        .flush()
        .map_err(|err| GenomeError::Filesystem(err.to_string()))?;
    Ok(Copied { bytes, interrupted })
}
