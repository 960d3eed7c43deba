use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use refgenome_fetch::catalog::Catalog;
use refgenome_fetch::config::ResolvedConfig;
use refgenome_fetch::domain::{AssetKind, BuildId, CacheTarget, Destination, Selection};
use refgenome_fetch::error::GenomeError;

#[test]
fn parse_selection() {
    assert_eq!(
        "hg38".parse::<Selection>().unwrap(),
        Selection::Build(BuildId::Hg38)
    );
    assert_eq!("MM9".parse::<Selection>().unwrap(), Selection::Build(BuildId::Mm9));
    assert_eq!(
        "dependencies".parse::<Selection>().unwrap(),
        Selection::Dependencies
    );
    assert_eq!(Selection::Build(BuildId::Mm10).to_string(), "mm10");
}

#[test]
fn parse_selection_invalid() {
    let err = "hg18".parse::<Selection>().unwrap_err();
    assert_matches!(err, GenomeError::InvalidBuild(value) if value == "hg18");
}

#[test]
fn genome_layout() {
    let root = Utf8PathBuf::from("/data/genomes");
    let config = ResolvedConfig::default();
    let assets = Catalog::assets(Selection::Build(BuildId::Mm10), &root, &config);
    assert_eq!(assets.len(), 7);

    let destinations: Vec<String> = assets
        .iter()
        .map(|asset| asset.destination.path().to_string())
        .collect();
    assert_eq!(
        destinations,
        vec![
            "/data/genomes/mm10/annotation/ucsc_repeatmasker.tsv",
            "/data/genomes/mm10/annotation/ChromInfo.txt",
            "/data/genomes/mm10/annotation/cytoBand.txt",
            "/data/genomes/mm10/mm10.fa",
            "/data/genomes/mm10/annotation/mm10.chrom.sizes",
            "/data/genomes/mm10",
            "/data/genomes/mm10.refGene.gtf.gz",
        ]
    );

    let kinds: Vec<AssetKind> = assets.iter().map(|asset| asset.kind).collect();
    assert_eq!(
        kinds,
        vec![
            AssetKind::PlainFile,
            AssetKind::GzipCompressedFile,
            AssetKind::GzipCompressedFile,
            AssetKind::TarGzipArchive,
            AssetKind::PlainFile,
            AssetKind::ZipArchive,
            AssetKind::PlainFile,
        ]
    );

    let repeatmasker = &assets[0];
    assert_eq!(
        repeatmasker.resource.locator(),
        "https://genome.ucsc.edu/cgi-bin/hgTables"
    );
    assert!(repeatmasker.resource.form().is_some());

    assert_eq!(
        assets[3].resource.locator(),
        "http://hgdownload.cse.ucsc.edu/goldenPath/mm10/bigZips/chromFa.tar.gz"
    );
    assert_matches!(&assets[5].destination, Destination::Directory(_));
    assert_eq!(assets[5].gate.to_string(), "/data/genomes/mm10/mm10.*.bt2");
    assert_matches!(&assets[5].gate, CacheTarget::Family { .. });

    let post = assets[6].post.as_ref().unwrap();
    assert_eq!(post.output(), "/data/genomes/mm10/annotation/refGene.bed");
    assert!(assets[..6].iter().all(|asset| asset.post.is_none()));
}

#[test]
fn dependencies_layout() {
    let root = Utf8PathBuf::from("/opt/pipeline");
    let assets = Catalog::assets(Selection::Dependencies, &root, &ResolvedConfig::default());
    let destinations: Vec<String> = assets
        .iter()
        .map(|asset| asset.destination.path().to_string())
        .collect();
    assert_eq!(
        destinations,
        vec![
            "/opt/pipeline/numpy-1.16.6.tar.gz",
            "/opt/pipeline/v2.2.7.1.tar.gz"
        ]
    );
}
