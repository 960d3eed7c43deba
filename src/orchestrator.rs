use std::fmt;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use rayon::prelude::*;
use serde::Serialize;

use crate::archive::{self, SkippedMember};
use crate::assemble;
use crate::cache::CacheGate;
use crate::catalog::{Asset, Catalog};
use crate::config::ResolvedConfig;
use crate::decompress;
use crate::domain::{AssetKind, CacheTarget, Destination, Selection};
use crate::error::GenomeError;
use crate::fetch::Fetcher;
use crate::place::{AssetPlacer, PathLocks, hold};
use crate::progress::ProgressSink;
use crate::staging::{Staging, StagingArtifact};
use crate::transform::AssetTransform;
use crate::transport::Transport;

/// Pipeline position of one asset; a failure records the last stage reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetStage {
    Pending,
    Fetched,
    Decompressed,
    Extracted,
    Assembled,
    Transformed,
    Placed,
}

impl fmt::Display for AssetStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AssetStage::Pending => "pending",
            AssetStage::Fetched => "fetched",
            AssetStage::Decompressed => "decompressed",
            AssetStage::Extracted => "extracted",
            AssetStage::Assembled => "assembled",
            AssetStage::Transformed => "transformed",
            AssetStage::Placed => "placed",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AssetOutcome {
    Done,
    Cached,
    Failed {
        stage: AssetStage,
        error: String,
        /// Set when the source could not be downloaded in full.
        transfer: bool,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct AssetReport {
    pub name: String,
    pub kind: Option<AssetKind>,
    pub destination: String,
    pub outcome: AssetOutcome,
    pub received_bytes: Option<u64>,
    pub incomplete: bool,
    pub skipped_members: Vec<SkippedMember>,
}

impl AssetReport {
    fn new(name: &str, kind: Option<AssetKind>, destination: &Utf8Path) -> Self {
        Self {
            name: name.to_string(),
            kind,
            destination: destination.to_string(),
            outcome: AssetOutcome::Done,
            received_bytes: None,
            incomplete: false,
            skipped_members: Vec::new(),
        }
    }

    fn fail(&mut self, stage: AssetStage, error: GenomeError) {
        tracing::error!(asset = %self.name, %stage, error = %error, "asset failed");
        self.outcome = AssetOutcome::Failed {
            stage,
            error: error.to_string(),
            transfer: error.is_transfer(),
        };
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, AssetOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub selection: String,
    pub root: String,
    pub assets: Vec<AssetReport>,
    pub finished_at: String,
}

impl BuildReport {
    fn count(&self, pred: impl Fn(&AssetOutcome) -> bool) -> usize {
        self.assets.iter().filter(|asset| pred(&asset.outcome)).count()
    }

    pub fn succeeded(&self) -> usize {
        self.count(|outcome| matches!(outcome, AssetOutcome::Done))
    }

    pub fn cached(&self) -> usize {
        self.count(|outcome| matches!(outcome, AssetOutcome::Cached))
    }

    pub fn failed(&self) -> usize {
        self.count(|outcome| matches!(outcome, AssetOutcome::Failed { .. }))
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    /// True when at least one asset failed and every failure was a download problem.
    pub fn failed_on_transfer_only(&self) -> bool {
        self.failed() > 0
            && self.failed()
                == self.count(|outcome| {
                    matches!(outcome, AssetOutcome::Failed { transfer: true, .. })
                })
    }
}

type StepError = (AssetStage, GenomeError);

pub struct GenomeOrchestrator<T: Transport> {
    transport: T,
    config: ResolvedConfig,
    staging: Staging,
    locks: PathLocks,
}

impl<T: Transport> GenomeOrchestrator<T> {
    pub fn new(transport: T, config: ResolvedConfig) -> Self {
        let staging = Staging::new(config.staging_dir.clone());
        Self {
            transport,
            config,
            staging,
            locks: PathLocks::new(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Materializes every asset of `selection` under `root`. Asset failures land in the
    /// report; only an unusable root is an error.
    pub fn acquire_genome(
        &self,
        selection: Selection,
        root: &Utf8Path,
        overwrite: bool,
        progress: &dyn ProgressSink,
    ) -> Result<BuildReport, GenomeError> {
        fs::create_dir_all(root.as_std_path())
            .map_err(|err| GenomeError::Filesystem(format!("create root {root}: {err}")))?;
        let root = absolute(root)?;

        tracing::info!(%selection, root = %root, overwrite, "acquiring assets");
        let assets = Catalog::assets(selection, &root, &self.config);
        let reports = self.run_assets(&assets, overwrite, progress)?;

        let report = BuildReport {
            selection: selection.to_string(),
            root: root.to_string(),
            assets: reports,
            finished_at: chrono::Utc::now().to_rfc3339(),
        };
        tracing::info!(
            done = report.succeeded(),
            cached = report.cached(),
            failed = report.failed(),
            "finished {selection}"
        );
        Ok(report)
    }

    /// Runs assets in catalog order, or on a bounded pool when more than one job is allowed.
    /// Reports keep catalog order either way.
    pub fn run_assets(
        &self,
        assets: &[Asset],
        overwrite: bool,
        progress: &dyn ProgressSink,
    ) -> Result<Vec<AssetReport>, GenomeError> {
        let nested = if self.config.jobs <= 1 {
            assets
                .iter()
                .map(|asset| self.acquire_asset(asset, overwrite, progress))
                .collect::<Vec<_>>()
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.jobs)
                .build()
                .map_err(|err| GenomeError::Filesystem(format!("worker pool: {err}")))?;
            pool.install(|| {
                assets
                    .par_iter()
                    .map(|asset| self.acquire_asset(asset, overwrite, progress))
                    .collect::<Vec<_>>()
            })
        };
        Ok(nested.into_iter().flatten().collect())
    }

    fn acquire_asset(
        &self,
        asset: &Asset,
        overwrite: bool,
        progress: &dyn ProgressSink,
    ) -> Vec<AssetReport> {
        let mut report = AssetReport::new(&asset.name, Some(asset.kind), asset.destination.path());
        {
            let lock = self.locks.handle(asset.gate.lock_key());
            let _guard = hold(&lock);
            if CacheGate::is_satisfied(&asset.gate, overwrite) {
                tracing::info!(asset = %asset.name, target = %asset.gate, "already exists, skipping");
                report.outcome = AssetOutcome::Cached;
            } else if let Err((stage, err)) = self.run_pipeline(asset, progress, &mut report) {
                report.fail(stage, err);
            }
        }

        let mut reports = vec![report];
        if let Some(transform) = &asset.post {
            if reports[0].is_failed() {
                tracing::warn!(asset = %asset.name, transform = transform.name(), "input failed, transform not run");
            } else {
                reports.push(self.run_transform(asset, transform.as_ref(), overwrite));
            }
        }
        reports
    }

    fn run_pipeline(
        &self,
        asset: &Asset,
        progress: &dyn ProgressSink,
        report: &mut AssetReport,
    ) -> Result<(), StepError> {
        let fetcher = Fetcher::new(&self.transport, &self.staging, self.config.strict_transfers);
        let fetched = fetcher
            .fetch(&asset.resource, progress)
            .map_err(|err| (AssetStage::Pending, err))?;
        report.received_bytes = Some(fetched.received);
        report.incomplete = fetched.is_incomplete();
        let mut stage = AssetStage::Fetched;
        let mut file = fetched.file;

        if asset.resource.is_compressed() {
            file = decompress::decompress(file, &self.staging).map_err(|err| (stage, err))?;
            stage = AssetStage::Decompressed;
        }

        let artifact = if asset.kind.is_archive() {
            let extraction = archive::extract(file, asset.kind, &self.staging, progress)
                .map_err(|err| (stage, err))?;
            stage = AssetStage::Extracted;
            report.skipped_members = extraction.report.skipped;
            if extraction.report.extracted == 0 {
                return Err((
                    stage,
                    GenomeError::EmptyExtraction(asset.destination.path().as_std_path().to_path_buf()),
                ));
            }
            if asset.kind == AssetKind::TarGzipArchive {
                let assembled = assemble::assemble(extraction.dir, &self.staging)
                    .map_err(|err| (stage, err))?;
                stage = AssetStage::Assembled;
                StagingArtifact::from(assembled)
            } else {
                StagingArtifact::from(extraction.dir)
            }
        } else {
            StagingArtifact::from(file)
        };

        AssetPlacer::place(artifact, &asset.destination).map_err(|err| (stage, err))?;
        tracing::debug!(asset = %asset.name, stage = %AssetStage::Placed, "asset done");
        Ok(())
    }

    fn run_transform(
        &self,
        asset: &Asset,
        transform: &dyn AssetTransform,
        overwrite: bool,
    ) -> AssetReport {
        let output = transform.output();
        let name = format!("{}:{}", asset.name, transform.name());
        let mut report = AssetReport::new(&name, None, output);
        let gate = CacheTarget::File(output.to_path_buf());

        let lock = self.locks.handle(gate.lock_key());
        let _guard = hold(&lock);
        if CacheGate::is_satisfied(&gate, overwrite) {
            tracing::info!(asset = %name, target = %gate, "already exists, skipping");
            report.outcome = AssetOutcome::Cached;
            return report;
        }

        let input = asset.destination.path().as_std_path();
        let result = transform
            .apply(input, &self.staging)
            .map_err(|err| (AssetStage::Pending, err))
            .and_then(|staged| {
                AssetPlacer::place(
                    staged.into(),
                    &Destination::File(output.to_path_buf()),
                )
                .map_err(|err| (AssetStage::Transformed, err))
            });
        if let Err((stage, err)) = result {
            report.fail(stage, err);
        }
        report
    }
}

fn absolute(path: &Utf8Path) -> Result<Utf8PathBuf, GenomeError> {
    let canonical = fs::canonicalize(path.as_std_path())
        .map_err(|err| GenomeError::Filesystem(format!("resolve {path}: {err}")))?;
    Utf8PathBuf::from_path_buf(canonical)
        .map_err(|_| GenomeError::Filesystem("non-utf8 output root".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(outcome: AssetOutcome) -> AssetReport {
        AssetReport {
            outcome,
            ..AssetReport::new("asset", None, Utf8Path::new("/tmp/asset"))
        }
    }

    #[test]
    fn build_report_counts() {
        let build = BuildReport {
            selection: "hg19".to_string(),
            root: "/data".to_string(),
            assets: vec![
                report(AssetOutcome::Done),
                report(AssetOutcome::Cached),
                report(AssetOutcome::Cached),
                report(AssetOutcome::Failed {
                    stage: AssetStage::Fetched,
                    error: "boom".to_string(),
                    transfer: false,
                }),
            ],
            finished_at: String::new(),
        };
        assert_eq!(build.succeeded(), 1);
        assert_eq!(build.cached(), 2);
        assert_eq!(build.failed(), 1);
        assert!(!build.is_success());
        assert!(!build.failed_on_transfer_only());
    }

    #[test]
    fn transfer_only_failures() {
        let mut failed = report(AssetOutcome::Done);
        failed.fail(
            AssetStage::Pending,
            GenomeError::HttpStatus {
                status: 503,
                url: "http://hgdownload.test/chromFa.tar.gz".to_string(),
            },
        );
        let mut build = BuildReport {
            selection: "mm10".to_string(),
            root: "/data".to_string(),
            assets: vec![report(AssetOutcome::Cached), failed],
            finished_at: String::new(),
        };
        assert!(build.failed_on_transfer_only());

        let mut broken = report(AssetOutcome::Done);
        broken.fail(
            AssetStage::Fetched,
            GenomeError::Decompress("invalid gzip header".to_string()),
        );
        build.assets.push(broken);
        assert!(!build.failed_on_transfer_only());

        build.assets.retain(|asset| !asset.is_failed());
        assert!(!build.failed_on_transfer_only());
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let json = serde_json::to_value(AssetOutcome::Failed {
            stage: AssetStage::Extracted,
            error: "empty".to_string(),
            transfer: false,
        })
        .unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["stage"], "extracted");
    }
}
