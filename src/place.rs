use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use camino::{Utf8Path, Utf8PathBuf};

use crate::archive::content_root;
use crate::domain::Destination;
use crate::error::GenomeError;
use crate::staging::{StagedDir, StagedFile, StagingArtifact};

/// One mutex per destination path, so gate checks and writes for the same path never overlap.
#[derive(Debug, Default)]
pub struct PathLocks {
    locks: Mutex<HashMap<Utf8PathBuf, Arc<Mutex<()>>>>,
}

impl PathLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self, path: &Utf8Path) -> Arc<Mutex<()>> {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(path.to_path_buf()).or_default().clone()
    }
}

/// Blocks until the lock is free; a poisoned lock still guards the path.
pub fn hold(lock: &Mutex<()>) -> MutexGuard<'_, ()> {
    lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct AssetPlacer;

impl AssetPlacer {
    pub fn place(artifact: StagingArtifact, dest: &Destination) -> Result<(), GenomeError> {
        match (artifact, dest) {
            (StagingArtifact::File(file), Destination::File(path)) => Self::place_file(file, path),
            (StagingArtifact::Dir(dir), Destination::Directory(path)) => {
                Self::place_dir(dir, path).map(|_| ())
            }
            (StagingArtifact::File(_), Destination::Directory(path)) => Err(
                GenomeError::Filesystem(format!("cannot place a single file as directory {path}")),
            ),
            (StagingArtifact::Dir(_), Destination::File(path)) => Err(GenomeError::Filesystem(
                format!("cannot place a directory as file {path}"),
            )),
        }
    }

    pub fn place_file(staged: StagedFile, dest: &Utf8Path) -> Result<(), GenomeError> {
        copy_file_atomic(staged.path(), dest)?;
        tracing::info!(destination = %dest, "placed");
        staged.discard()
    }

    /// Copies every extracted file into `dest`, leaving unrelated files already there alone.
    pub fn place_dir(staged: StagedDir, dest: &Utf8Path) -> Result<usize, GenomeError> {
        let root = content_root(staged.path())?;
        let mut placed = 0usize;
        for file in walk_files(&root)? {
            let relative = file
                .strip_prefix(&root)
                .map_err(|err| GenomeError::Filesystem(err.to_string()))?;
            let relative = Utf8Path::from_path(relative).ok_or_else(|| {
                GenomeError::Filesystem(format!("non-utf8 member path: {}", relative.display()))
            })?;
            copy_file_atomic(&file, &dest.join(relative))?;
            placed += 1;
        }
        tracing::info!(destination = %dest, files = placed, "placed");
        staged.discard()?;
        Ok(placed)
    }
}

/// Copies into a temp file beside `dest`, then renames it over `dest`.
pub fn copy_file_atomic(source: &Path, dest: &Utf8Path) -> Result<(), GenomeError> {
    let parent = dest
        .parent()
        .ok_or_else(|| GenomeError::Filesystem("invalid destination path".to_string()))?;
    fs::create_dir_all(parent.as_std_path()).map_err(|err| {
        GenomeError::Filesystem(format!("create directory {parent}: {err}"))
    })?;
    let temp = tempfile::Builder::new()
        .prefix(".refgenome-fetch")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| GenomeError::Filesystem(err.to_string()))?;
    fs::copy(source, temp.path()).map_err(|err| {
        GenomeError::Filesystem(format!("copy {} -> {dest}: {err}", source.display()))
    })?;
    // Staged and temp files are owner-only; placed assets are world-readable.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(temp.path(), fs::Permissions::from_mode(0o644)).map_err(|err| {
            GenomeError::Filesystem(format!("set permissions on {dest}: {err}"))
        })?;
    }
    if dest.as_std_path().is_dir() {
        return Err(GenomeError::Filesystem(format!(
            "destination is a directory: {dest}"
        )));
    }
    temp.persist(dest.as_std_path())
        .map_err(|err| GenomeError::Filesystem(err.to_string()))?;
    Ok(())
}

fn walk_files(root: &Path) -> Result<Vec<PathBuf>, GenomeError> {
    let mut items = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(path) = stack.pop() {
        let entries = fs::read_dir(&path).map_err(|err| GenomeError::Filesystem(err.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|err| GenomeError::Filesystem(err.to_string()))?;
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                items.push(path);
            }
        }
    }
    items.sort();
    Ok(items)
}
