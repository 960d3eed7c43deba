use std::cmp::Ordering;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use crate::archive::content_root;
use crate::error::GenomeError;
use crate::staging::{StagedDir, StagedFile, Staging};

/// Joins every fragment file of an extraction directory into one staged file, each fragment
/// followed by a newline, then removes the directory.
pub fn assemble(input: StagedDir, staging: &Staging) -> Result<StagedFile, GenomeError> {
    let root = content_root(input.path())?;
    let fragments = list_fragments(&root)?;
    if fragments.is_empty() {
        return Err(GenomeError::EmptyExtraction(root));
    }

    let mut staged = staging.create_file("assembled")?;
    {
        let mut writer = BufWriter::new(staged.as_file_mut());
        for fragment in &fragments {
            let mut reader = File::open(fragment).map_err(|err| {
                GenomeError::Filesystem(format!("open fragment {}: {err}", fragment.display()))
            })?;
            io::copy(&mut reader, &mut writer)
                .and_then(|_| writer.write_all(b"\n"))
                .map_err(|err| GenomeError::Filesystem(err.to_string()))?;
        }
        writer
            .flush()
            .map_err(|err| GenomeError::Filesystem(err.to_string()))?;
    }

    tracing::info!(fragments = fragments.len(), "joined chromosome fragments");
    input.discard()?;
    Ok(StagedFile::from(staged))
}

/// Regular files directly under `dir`, in chromosome order.
fn list_fragments(dir: &std::path::Path) -> Result<Vec<PathBuf>, GenomeError> {
    let mut fragments = Vec::new();
    for entry in fs::read_dir(dir).map_err(|err| GenomeError::Filesystem(err.to_string()))? {
        let entry = entry.map_err(|err| GenomeError::Filesystem(err.to_string()))?;
        let path = entry.path();
        if path.is_file() {
            fragments.push(path);
        }
    }
    fragments.sort_by(|a, b| {
        let a = a.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        let b = b.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        chromosome_order(&a, &b)
    });
    Ok(fragments)
}

/// Orders sequence names as chr1..chr22, chrX, chrY, chrM, then everything else naturally.
pub fn chromosome_order(a: &str, b: &str) -> Ordering {
    let (rank_a, rank_b) = (chromosome_rank(a), chromosome_rank(b));
    rank_a.cmp(&rank_b).then_with(|| natural_cmp(a, b))
}

fn chromosome_rank(name: &str) -> (u8, u64) {
    let stem = name.split('.').next().unwrap_or(name);
    let bare = stem
        .strip_prefix("chr")
        .or_else(|| stem.strip_prefix("Chr"))
        .or_else(|| stem.strip_prefix("CHR"))
        .unwrap_or(stem);

    if !bare.is_empty() && bare.bytes().all(|b| b.is_ascii_digit()) {
        return (0, bare.parse().unwrap_or(u64::MAX));
    }
    match bare {
        "X" | "x" => (1, 0),
        "Y" | "y" => (2, 0),
        "M" | "m" | "MT" | "Mt" => (3, 0),
        _ => (4, 0),
    }
}

/// Compares digit runs numerically and everything else bytewise.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (mut a, mut b) = (a.as_bytes(), b.as_bytes());
    loop {
        match (a.first(), b.first()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let len_a = a.iter().take_while(|c| c.is_ascii_digit()).count();
                let len_b = b.iter().take_while(|c| c.is_ascii_digit()).count();
                let (digits_a, rest_a) = a.split_at(len_a);
                let (digits_b, rest_b) = b.split_at(len_b);
                let trimmed_a = trim_zeros(digits_a);
                let trimmed_b = trim_zeros(digits_b);
                let ord = trimmed_a
                    .len()
                    .cmp(&trimmed_b.len())
                    .then_with(|| trimmed_a.cmp(trimmed_b))
                    .then_with(|| len_a.cmp(&len_b));
                if ord != Ordering::Equal {
                    return ord;
                }
                a = rest_a;
                b = rest_b;
            }
            (Some(x), Some(y)) => {
                if x != y {
                    return x.cmp(y);
                }
                a = &a[1..];
                b = &b[1..];
            }
        }
    }
}

fn trim_zeros(digits: &[u8]) -> &[u8] {
    let start = digits.iter().take_while(|d| **d == b'0').count();
    &digits[start..]
}
