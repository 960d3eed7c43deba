use std::fmt;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::GenomeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BuildId {
    Mm9,
    Mm10,
    Hg19,
    Hg38,
}

impl BuildId {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildId::Mm9 => "mm9",
            BuildId::Mm10 => "mm10",
            BuildId::Hg19 => "hg19",
            BuildId::Hg38 => "hg38",
        }
    }

    /// Organism name as the UCSC table browser expects it.
    pub fn organism(&self) -> &'static str {
        match self {
            BuildId::Mm9 | BuildId::Mm10 => "Mouse",
            BuildId::Hg19 | BuildId::Hg38 => "Human",
        }
    }
}

impl fmt::Display for BuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BuildId {
    type Err = GenomeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mm9" => Ok(BuildId::Mm9),
            "mm10" => Ok(BuildId::Mm10),
            "hg19" => Ok(BuildId::Hg19),
            "hg38" => Ok(BuildId::Hg38),
            _ => Err(GenomeError::InvalidBuild(value.to_string())),
        }
    }
}

/// What a single run materializes: one genome build or the pipeline's dependency tarballs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Selection {
    Build(BuildId),
    Dependencies,
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::Build(build) => write!(f, "{build}"),
            Selection::Dependencies => write!(f, "dependencies"),
        }
    }
}

impl FromStr for Selection {
    type Err = GenomeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.trim().eq_ignore_ascii_case("dependencies") {
            return Ok(Selection::Dependencies);
        }
        Ok(Selection::Build(value.parse()?))
    }
}

/// A source locator plus how to request it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    locator: String,
    form: Option<Vec<(String, String)>>,
    compressed: bool,
}

impl Resource {
    pub fn new(locator: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            form: None,
            compressed: false,
        }
    }

    pub fn gzip(locator: impl Into<String>) -> Self {
        Self {
            compressed: true,
            ..Self::new(locator)
        }
    }

    pub fn with_form(locator: impl Into<String>, form: Vec<(String, String)>) -> Self {
        Self {
            form: Some(form),
            ..Self::new(locator)
        }
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn form(&self) -> Option<&[(String, String)]> {
        self.form.as_deref()
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.locator)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetKind {
    PlainFile,
    GzipCompressedFile,
    TarGzipArchive,
    ZipArchive,
}

impl AssetKind {
    pub fn is_archive(&self) -> bool {
        matches!(self, AssetKind::TarGzipArchive | AssetKind::ZipArchive)
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetKind::PlainFile => write!(f, "plain-file"),
            AssetKind::GzipCompressedFile => write!(f, "gzip-compressed-file"),
            AssetKind::TarGzipArchive => write!(f, "tar-gzip-archive"),
            AssetKind::ZipArchive => write!(f, "zip-archive"),
        }
    }
}

/// Where a processed resource ends up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    File(Utf8PathBuf),
    /// Members are copied into the directory; existing files stay.
    Directory(Utf8PathBuf),
}

impl Destination {
    pub fn path(&self) -> &Utf8Path {
        match self {
            Destination::File(path) | Destination::Directory(path) => path,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path())
    }
}

/// What must exist on disk for an asset to count as already acquired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheTarget {
    File(Utf8PathBuf),
    /// Files in `dir` whose names start with `prefix` and end with `suffix`.
    Family {
        dir: Utf8PathBuf,
        prefix: String,
        suffix: String,
    },
}

impl CacheTarget {
    /// The path whose concurrent use must be serialized.
    pub fn lock_key(&self) -> &Utf8Path {
        match self {
            CacheTarget::File(path) => path,
            CacheTarget::Family { dir, .. } => dir,
        }
    }
}

impl fmt::Display for CacheTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheTarget::File(path) => write!(f, "{path}"),
            CacheTarget::Family {
                dir,
                prefix,
                suffix,
            } => write!(f, "{dir}/{prefix}*{suffix}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_build_case_insensitive() {
        let build: BuildId = "HG38".parse().unwrap();
        assert_eq!(build, BuildId::Hg38);
        assert_eq!(build.to_string(), "hg38");
    }

    #[test]
    fn parse_build_invalid() {
        let err = "hg17".parse::<BuildId>().unwrap_err();
        assert_matches!(err, GenomeError::InvalidBuild(_));
    }

    #[test]
    fn parse_selection() {
        assert_eq!(
            "dependencies".parse::<Selection>().unwrap(),
            Selection::Dependencies
        );
        assert_eq!(
            "mm10".parse::<Selection>().unwrap(),
            Selection::Build(BuildId::Mm10)
        );
    }

    #[test]
    fn family_display_and_lock_key() {
        let target = CacheTarget::Family {
            dir: Utf8PathBuf::from("/data/hg19"),
            prefix: "hg19.".to_string(),
            suffix: ".bt2".to_string(),
        };
        assert_eq!(target.to_string(), "/data/hg19/hg19.*.bt2");
        assert_eq!(target.lock_key(), Utf8Path::new("/data/hg19"));
    }
}
