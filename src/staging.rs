use std::fs::{self, File};
use std::path::{Path, PathBuf};

use tempfile::{Builder, NamedTempFile, TempDir, TempPath};

use crate::error::GenomeError;

/// Hands out uniquely named scratch files and directories under one root.
#[derive(Debug, Clone)]
pub struct Staging {
    root: PathBuf,
}

impl Staging {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn ensure_root(&self) -> Result<(), GenomeError> {
        fs::create_dir_all(&self.root).map_err(|err| GenomeError::Filesystem(err.to_string()))
    }

    pub fn create_file(&self, prefix: &str) -> Result<NamedTempFile, GenomeError> {
        self.ensure_root()?;
        Builder::new()
            .prefix(prefix)
            .tempfile_in(&self.root)
            .map_err(|err| GenomeError::Filesystem(format!("create staging file: {err}")))
    }

    pub fn create_dir(&self, prefix: &str) -> Result<StagedDir, GenomeError> {
        self.ensure_root()?;
        let dir = Builder::new()
            .prefix(prefix)
            .tempdir_in(&self.root)
            .map_err(|err| GenomeError::Filesystem(format!("create staging dir: {err}")))?;
        Ok(StagedDir { dir })
    }
}

/// A finished staging file. Removed from disk when dropped.
#[derive(Debug)]
pub struct StagedFile {
    path: TempPath,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn open(&self) -> Result<File, GenomeError> {
        File::open(&self.path).map_err(|err| {
            GenomeError::Filesystem(format!("open staging {}: {err}", self.path.display()))
        })
    }

    pub fn len(&self) -> Result<u64, GenomeError> {
        fs::metadata(&self.path)
            .map(|meta| meta.len())
            .map_err(|err| GenomeError::Filesystem(err.to_string()))
    }

    pub fn is_empty(&self) -> Result<bool, GenomeError> {
        Ok(self.len()? == 0)
    }

    /// Deletes the file now, surfacing any error instead of ignoring it on drop.
    pub fn discard(self) -> Result<(), GenomeError> {
        self.path
            .close()
            .map_err(|err| GenomeError::Filesystem(format!("remove staging file: {err}")))
    }
}

impl From<NamedTempFile> for StagedFile {
    fn from(file: NamedTempFile) -> Self {
        Self {
            path: file.into_temp_path(),
        }
    }
}

/// A staging directory. Recursively removed when dropped.
#[derive(Debug)]
pub struct StagedDir {
    dir: TempDir,
}

impl StagedDir {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn discard(self) -> Result<(), GenomeError> {
        self.dir
            .close()
            .map_err(|err| GenomeError::Filesystem(format!("remove staging dir: {err}")))
    }
}

/// Intermediate or final form of a resource while its pipeline runs.
#[derive(Debug)]
pub enum StagingArtifact {
    File(StagedFile),
    Dir(StagedDir),
}

impl StagingArtifact {
    pub fn path(&self) -> &Path {
        match self {
            StagingArtifact::File(file) => file.path(),
            StagingArtifact::Dir(dir) => dir.path(),
        }
    }
}

impl From<StagedFile> for StagingArtifact {
    fn from(file: StagedFile) -> Self {
        StagingArtifact::File(file)
    }
}

impl From<StagedDir> for StagingArtifact {
    fn from(dir: StagedDir) -> Self {
        StagingArtifact::Dir(dir)
    }
}
