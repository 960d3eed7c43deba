//! The fixed asset lists for each genome build and for dependency mode.

use std::sync::Arc;

use camino::Utf8Path;

use crate::config::ResolvedConfig;
use crate::domain::{AssetKind, BuildId, CacheTarget, Destination, Resource, Selection};
use crate::transform::{AssetTransform, LongestTranscript};

/// One UCSC table-browser export, rendered as the form the hgTables CGI expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableQuery {
    pub build: BuildId,
    pub track: String,
    pub table: String,
}

impl TableQuery {
    pub fn new(build: BuildId, track: &str, table: &str) -> Self {
        Self {
            build,
            track: track.to_string(),
            table: table.to_string(),
        }
    }

    pub fn form(&self) -> Vec<(String, String)> {
        [
            ("jsh_pageVertPos", "0"),
            ("clade", "mammal"),
            ("org", self.build.organism()),
            ("db", self.build.as_str()),
            ("hgta_group", "varRep"),
            ("hgta_track", self.track.as_str()),
            ("hgta_table", self.table.as_str()),
            ("hgta_regionType", "genome"),
            ("hgta_outputType", "primaryTable"),
            ("boolshad.sendToGalaxy", "0"),
            ("boolshad.sendToGreat", "0"),
            ("hgta_outFileName", "output.tsv"),
            ("hgta_compressType", "none"),
            ("hgta_doTopSubmit", "get output"),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
    }

    pub fn resource(&self, endpoint: &str) -> Resource {
        Resource::with_form(endpoint, self.form())
    }
}

#[derive(Clone)]
pub struct Asset {
    pub name: String,
    pub resource: Resource,
    pub kind: AssetKind,
    pub destination: Destination,
    pub gate: CacheTarget,
    /// Runs after the asset is placed or found cached.
    pub post: Option<Arc<dyn AssetTransform>>,
}

impl Asset {
    fn file(name: &str, resource: Resource, dest: &Utf8Path) -> Self {
        let kind = if resource.is_compressed() {
            AssetKind::GzipCompressedFile
        } else {
            AssetKind::PlainFile
        };
        Self {
            name: name.to_string(),
            resource,
            kind,
            destination: Destination::File(dest.to_path_buf()),
            gate: CacheTarget::File(dest.to_path_buf()),
            post: None,
        }
    }

    pub fn plain(name: &str, locator: impl Into<String>, dest: &Utf8Path) -> Self {
        Self::file(name, Resource::new(locator), dest)
    }

    pub fn gzip(name: &str, locator: impl Into<String>, dest: &Utf8Path) -> Self {
        Self::file(name, Resource::gzip(locator), dest)
    }

    pub fn table(name: &str, resource: Resource, dest: &Utf8Path) -> Self {
        Self::file(name, resource, dest)
    }

    /// Per-chromosome FASTA archive joined into one file.
    pub fn chromosomes(name: &str, locator: impl Into<String>, dest: &Utf8Path) -> Self {
        Self {
            kind: AssetKind::TarGzipArchive,
            ..Self::plain(name, locator, dest)
        }
    }

    /// Zip archive whose members land in `dir`; satisfied once one `prefix*suffix` file exists.
    pub fn index(
        name: &str,
        locator: impl Into<String>,
        dir: &Utf8Path,
        prefix: &str,
        suffix: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            resource: Resource::new(locator),
            kind: AssetKind::ZipArchive,
            destination: Destination::Directory(dir.to_path_buf()),
            gate: CacheTarget::Family {
                dir: dir.to_path_buf(),
                prefix: prefix.to_string(),
                suffix: suffix.to_string(),
            },
            post: None,
        }
    }

    pub fn with_post(mut self, transform: Arc<dyn AssetTransform>) -> Self {
        self.post = Some(transform);
        self
    }
}

pub struct Catalog;

impl Catalog {
    pub fn assets(selection: Selection, root: &Utf8Path, config: &ResolvedConfig) -> Vec<Asset> {
        match selection {
            Selection::Build(build) => Self::genome(build, root, config),
            Selection::Dependencies => Self::dependencies(root),
        }
    }

    pub fn genome(build: BuildId, root: &Utf8Path, config: &ResolvedConfig) -> Vec<Asset> {
        let g = build.as_str();
        let ucsc = config.ucsc_base_url.as_str();
        let build_dir = root.join(g);
        let annotation = build_dir.join("annotation");
        let gene_model = root.join(format!("{g}.refGene.gtf.gz"));

        let longest = LongestTranscript {
            output: annotation.join("refGene.bed"),
            clip_start: config.clip_start,
            strand_specific: config.clip_strand_specific,
        };

        vec![
            Asset::table(
                "repeatmasker",
                TableQuery::new(build, "rmsk", "rmsk").resource(&config.table_query_url),
                &annotation.join("ucsc_repeatmasker.tsv"),
            ),
            Asset::gzip(
                "chrom-info",
                format!("{ucsc}/goldenpath/{g}/database/chromInfo.txt.gz"),
                &annotation.join("ChromInfo.txt"),
            ),
            Asset::gzip(
                "cytoband",
                format!("{ucsc}/goldenpath/{g}/database/cytoBand.txt.gz"),
                &annotation.join("cytoBand.txt"),
            ),
            Asset::chromosomes(
                "raw-genome",
                format!("{ucsc}/goldenPath/{g}/bigZips/chromFa.tar.gz"),
                &build_dir.join(format!("{g}.fa")),
            ),
            Asset::plain(
                "chrom-sizes",
                format!("{ucsc}/goldenPath/{g}/bigZips/{g}.chrom.sizes"),
                &annotation.join(format!("{g}.chrom.sizes")),
            ),
            Asset::index(
                "bowtie2-index",
                format!("{}/{g}.zip", config.index_base_url),
                &build_dir,
                &format!("{g}."),
                ".bt2",
            ),
            Asset::plain(
                "gene-model",
                format!("{ucsc}/goldenPath/{g}/bigZips/genes/{g}.refGene.gtf.gz"),
                &gene_model,
            )
            .with_post(Arc::new(longest)),
        ]
    }

    pub fn dependencies(root: &Utf8Path) -> Vec<Asset> {
        vec![
            Asset::plain(
                "numpy",
                "https://github.com/numpy/numpy/releases/download/v1.16.6/numpy-1.16.6.tar.gz",
                &root.join("numpy-1.16.6.tar.gz"),
            ),
            Asset::plain(
                "macs2",
                "https://github.com/macs3-project/MACS/archive/refs/tags/v2.2.7.1.tar.gz",
                &root.join("v2.2.7.1.tar.gz"),
            ),
        ]
    }
}
