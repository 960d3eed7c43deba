use std::fs;
use std::path::PathBuf;

use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::GenomeError;

pub const CONFIG_FILE_NAME: &str = "refgenome-fetch.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub ucsc_base_url: Option<String>,
    #[serde(default)]
    pub table_query_url: Option<String>,
    #[serde(default)]
    pub index_base_url: Option<String>,
    #[serde(default)]
    pub jobs: Option<usize>,
    #[serde(default)]
    pub strict_transfers: Option<bool>,
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,
    #[serde(default)]
    pub staging_dir: Option<PathBuf>,
    #[serde(default)]
    pub clip_start: Option<u64>,
    #[serde(default)]
    pub clip_strand_specific: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub ucsc_base_url: String,
    pub table_query_url: String,
    pub index_base_url: String,
    pub jobs: usize,
    pub strict_transfers: bool,
    pub connect_timeout_secs: u64,
    pub staging_dir: PathBuf,
    pub clip_start: u64,
    pub clip_strand_specific: bool,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            schema_version: 1,
            ucsc_base_url: "http://hgdownload.cse.ucsc.edu".to_string(),
            table_query_url: "https://genome.ucsc.edu/cgi-bin/hgTables".to_string(),
            index_base_url: "https://genome-idx.s3.amazonaws.com/bt".to_string(),
            jobs: 1,
            strict_transfers: true,
            connect_timeout_secs: 30,
            staging_dir: std::env::temp_dir(),
            clip_start: 50,
            clip_strand_specific: true,
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// An explicit path must exist. Without one, the working directory and then the
    /// user config directory are searched, and defaults apply when neither has a file.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, GenomeError> {
        let config_path = match path {
            Some(path) => {
                let explicit = PathBuf::from(path);
                if !explicit.exists() {
                    return Err(GenomeError::MissingConfig(explicit));
                }
                Some(explicit)
            }
            None => Self::discover(),
        };

        let Some(config_path) = config_path else {
            return Ok(ResolvedConfig::default());
        };

        tracing::debug!(path = %config_path.display(), "loading config");
        let content = fs::read_to_string(&config_path)
            .map_err(|_| GenomeError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| GenomeError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, GenomeError> {
        let defaults = ResolvedConfig::default();
        let jobs = config.jobs.unwrap_or(defaults.jobs);
        if jobs == 0 {
            return Err(GenomeError::ConfigParse(
                "jobs must be at least 1".to_string(),
            ));
        }

        Ok(ResolvedConfig {
            schema_version: config.schema_version.unwrap_or(defaults.schema_version),
            ucsc_base_url: config
                .ucsc_base_url
                .map(trim_base_url)
                .unwrap_or(defaults.ucsc_base_url),
            table_query_url: config.table_query_url.unwrap_or(defaults.table_query_url),
            index_base_url: config
                .index_base_url
                .map(trim_base_url)
                .unwrap_or(defaults.index_base_url),
            jobs,
            strict_transfers: config
                .strict_transfers
                .unwrap_or(defaults.strict_transfers),
            connect_timeout_secs: config
                .connect_timeout_secs
                .unwrap_or(defaults.connect_timeout_secs),
            staging_dir: config.staging_dir.unwrap_or(defaults.staging_dir),
            clip_start: config.clip_start.unwrap_or(defaults.clip_start),
            clip_strand_specific: config
                .clip_strand_specific
                .unwrap_or(defaults.clip_strand_specific),
        })
    }

    fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            return Some(local);
        }
        BaseDirs::new()
            .map(|dirs| {
                dirs.home_dir()
                    .join(".config")
                    .join("refgenome-fetch")
                    .join("config.json")
            })
            .filter(|path| path.exists())
    }
}

fn trim_base_url(value: String) -> String {
    value.trim_end_matches('/').to_string()
}
