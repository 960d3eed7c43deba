use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use serde::Serialize;
use zip::ZipArchive;

use crate::domain::AssetKind;
use crate::error::GenomeError;
use crate::progress::{ProgressSink, ProgressUnit};
use crate::staging::{StagedDir, StagedFile, Staging};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SkippedMember {
    pub name: String,
    pub reason: String,
}

/// What came out of an archive. Unreadable members are listed, not raised.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractionReport {
    /// Regular files written to the extraction directory.
    pub extracted: usize,
    pub skipped: Vec<SkippedMember>,
}

impl ExtractionReport {
    fn skip(&mut self, name: impl Into<String>, reason: impl ToString) {
        let member = SkippedMember {
            name: name.into(),
            reason: reason.to_string(),
        };
        tracing::warn!(member = %member.name, reason = %member.reason, "skipping archive member");
        self.skipped.push(member);
    }
}

#[derive(Debug)]
pub struct Extraction {
    pub dir: StagedDir,
    pub report: ExtractionReport,
}

/// Expands a tar.gz or zip staging file into a fresh staging directory.
///
/// Per-member failures are recorded in the report and extraction moves on. Only a container
/// that cannot be opened at all is an error. The input file is removed afterwards.
pub fn extract(
    input: StagedFile,
    kind: AssetKind,
    staging: &Staging,
    progress: &dyn ProgressSink,
) -> Result<Extraction, GenomeError> {
    let dir = staging.create_dir("extract")?;
    let mut report = ExtractionReport::default();
    match kind {
        AssetKind::TarGzipArchive => extract_tar_gz(input.path(), dir.path(), &mut report, progress)?,
        AssetKind::ZipArchive => extract_zip(input.path(), dir.path(), &mut report, progress)?,
        other => {
            return Err(GenomeError::Archive(format!("{other} is not an archive kind")));
        }
    }

    tracing::info!(
        extracted = report.extracted,
        skipped = report.skipped.len(),
        "archive extracted"
    );
    input.discard()?;
    Ok(Extraction { dir, report })
}

fn extract_tar_gz(
    archive_path: &Path,
    target_dir: &Path,
    report: &mut ExtractionReport,
    progress: &dyn ProgressSink,
) -> Result<(), GenomeError> {
    let file = File::open(archive_path).map_err(|err| {
        GenomeError::Filesystem(format!("open archive {}: {err}", archive_path.display()))
    })?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    let entries = archive
        .entries()
        .map_err(|err| GenomeError::Archive(err.to_string()))?;

    let task = progress.begin("Extracting tar members", None, ProgressUnit::Members);
    // A header-level error is the last item the tar iterator yields.
    for (index, entry) in entries.enumerate() {
        task.advance(1);
        let mut entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                report.skip(format!("#{index}"), err);
                continue;
            }
        };
        let relative = match entry.path() {
            Ok(path) => path.into_owned(),
            Err(err) => {
                report.skip(format!("#{index}"), err);
                continue;
            }
        };
        let name = relative.display().to_string();
        let is_dir = entry.header().entry_type().is_dir();

        match entry.unpack_in(target_dir) {
            Ok(true) if is_dir => {}
            Ok(true) => report.extracted += 1,
            Ok(false) => report.skip(name, "path escapes the extraction directory"),
            Err(err) => {
                remove_partial(target_dir, &relative);
                report.skip(name, err);
            }
        }
    }
    task.finish();

    if report.extracted == 0 && report.skipped.is_empty() {
        tracing::warn!(archive = %archive_path.display(), "tar archive has no members");
    }
    Ok(())
}

fn extract_zip(
    zip_path: &Path,
    target_dir: &Path,
    report: &mut ExtractionReport,
    progress: &dyn ProgressSink,
) -> Result<(), GenomeError> {
    let file = File::open(zip_path)
        .map_err(|err| GenomeError::Filesystem(format!("open zip {}: {err}", zip_path.display())))?;
    let mut archive =
        ZipArchive::new(file).map_err(|err| GenomeError::Archive(err.to_string()))?;

    let task = progress.begin(
        "Extracting zip entries",
        Some(archive.len() as u64),
        ProgressUnit::Members,
    );
    for i in 0..archive.len() {
        extract_zip_entry(&mut archive, i, target_dir, report);
        task.advance(1);
    }
    task.finish();
    Ok(())
}

fn extract_zip_entry(
    archive: &mut ZipArchive<File>,
    index: usize,
    target_dir: &Path,
    report: &mut ExtractionReport,
) {
    let mut entry = match archive.by_index(index) {
        Ok(entry) => entry,
        Err(err) => {
            report.skip(format!("#{index}"), err);
            return;
        }
    };
    let name = entry.name().to_string();
    let Some(relative) = entry.enclosed_name() else {
        report.skip(name, "path escapes the extraction directory");
        return;
    };
    let entry_path = target_dir.join(&relative);

    if entry.is_dir() {
        if let Err(err) = fs::create_dir_all(&entry_path) {
            report.skip(name, err);
        }
        return;
    }

    let written = entry_path
        .parent()
        .map(fs::create_dir_all)
        .unwrap_or(Ok(()))
        .and_then(|_| File::create(&entry_path))
        .and_then(|mut outfile| io::copy(&mut entry, &mut outfile));
    match written {
        Ok(_) => report.extracted += 1,
        Err(err) => {
            remove_partial(target_dir, &relative);
            report.skip(name, err);
        }
    }
}

fn remove_partial(target_dir: &Path, relative: &Path) {
    let contained = relative
        .components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
    if !contained {
        return;
    }
    let path = target_dir.join(relative);
    if path.is_file() {
        let _ = fs::remove_file(&path);
    }
}

/// The directory that actually holds the payload: `dir` itself, or its only child when
/// the archive wrapped everything in one top-level folder.
pub fn content_root(dir: &Path) -> Result<PathBuf, GenomeError> {
    let mut files = 0usize;
    let mut subdirs = Vec::new();
    for entry in fs::read_dir(dir).map_err(|err| GenomeError::Filesystem(err.to_string()))? {
        let entry = entry.map_err(|err| GenomeError::Filesystem(err.to_string()))?;
        let path = entry.path();
        if path.is_dir() {
            subdirs.push(path);
        } else {
            files += 1;
        }
    }
    match (files, subdirs.len()) {
        (0, 1) => Ok(subdirs.remove(0)),
        _ => Ok(dir.to_path_buf()),
    }
}
