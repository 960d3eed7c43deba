//! Post-fetch derivations that turn a placed asset into another annotation file.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::LazyLock;

use camino::{Utf8Path, Utf8PathBuf};
use flate2::read::MultiGzDecoder;
use regex::Regex;

use crate::assemble::chromosome_order;
use crate::error::GenomeError;
use crate::staging::{StagedFile, Staging};

pub trait AssetTransform: Send + Sync {
    fn name(&self) -> &str;

    /// Where the derived file is placed.
    fn output(&self) -> &Utf8Path;

    fn apply(&self, input: &Path, staging: &Staging) -> Result<StagedFile, GenomeError>;
}

static GTF_ATTRIBUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(\w+)\s+"([^"]*)""#).expect("valid attribute pattern"));

/// Longest transcript per gene from a gzipped GTF, written as BED6.
///
/// Transcript length is the summed length of its exons; the first transcript seen wins ties.
/// `clip_start` bases are trimmed from the 5' end, which is the right-hand end for minus-strand
/// genes when `strand_specific` is set.
#[derive(Debug, Clone)]
pub struct LongestTranscript {
    pub output: Utf8PathBuf,
    pub clip_start: u64,
    pub strand_specific: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BedRecord {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
    pub name: String,
    pub strand: char,
}

#[derive(Debug)]
struct Transcript {
    gene_id: String,
    gene_name: Option<String>,
    chrom: String,
    strand: char,
    start: u64,
    end: u64,
    exonic: u64,
    order: usize,
}

impl LongestTranscript {
    pub fn records<R: BufRead>(&self, reader: R) -> Result<Vec<BedRecord>, GenomeError> {
        let transcripts = read_transcripts(reader)?;

        let mut best: HashMap<(String, String), Transcript> = HashMap::new();
        for transcript in transcripts {
            let key = (transcript.gene_id.clone(), transcript.chrom.clone());
            match best.get(&key) {
                Some(current)
                    if current.exonic > transcript.exonic
                        || (current.exonic == transcript.exonic
                            && current.order < transcript.order) => {}
                _ => {
                    best.insert(key, transcript);
                }
            }
        }

        let mut records: Vec<BedRecord> = best
            .into_values()
            .filter_map(|transcript| self.clip(transcript))
            .collect();
        records.sort_by(|a, b| {
            chromosome_order(&a.chrom, &b.chrom)
                .then(a.start.cmp(&b.start))
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(records)
    }

    fn clip(&self, transcript: Transcript) -> Option<BedRecord> {
        let (mut start, mut end) = (transcript.start, transcript.end);
        if self.strand_specific && transcript.strand == '-' {
            end = end.saturating_sub(self.clip_start);
        } else {
            start = start.saturating_add(self.clip_start);
        }
        if start >= end {
            return None;
        }
        Some(BedRecord {
            chrom: transcript.chrom,
            start,
            end,
            name: transcript.gene_name.unwrap_or(transcript.gene_id),
            strand: transcript.strand,
        })
    }
}

impl AssetTransform for LongestTranscript {
    fn name(&self) -> &str {
        "longest-transcript"
    }

    fn output(&self) -> &Utf8Path {
        &self.output
    }

    fn apply(&self, input: &Path, staging: &Staging) -> Result<StagedFile, GenomeError> {
        tracing::info!(gtf = %input.display(), "deriving longest transcript per gene");
        let file = File::open(input)
            .map_err(|err| GenomeError::Transform(format!("open {}: {err}", input.display())))?;
        let records = self.records(BufReader::new(MultiGzDecoder::new(file)))?;

        let mut staged = staging.create_file("transform")?;
        {
            let mut writer = BufWriter::new(staged.as_file_mut());
            for record in &records {
                writeln!(
                    writer,
                    "{}\t{}\t{}\t{}\t0\t{}",
                    record.chrom, record.start, record.end, record.name, record.strand
                )
                .map_err(|err| GenomeError::Filesystem(err.to_string()))?;
            }
            writer
                .flush()
                .map_err(|err| GenomeError::Filesystem(err.to_string()))?;
        }
        tracing::info!(genes = records.len(), "gene records written");
        Ok(StagedFile::from(staged))
    }
}

fn read_transcripts<R: BufRead>(reader: R) -> Result<Vec<Transcript>, GenomeError> {
    let mut by_id: HashMap<(String, String), Transcript> = HashMap::new();
    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line.map_err(|err| GenomeError::Transform(format!("line {line_no}: {err}")))?;
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 9 {
            return Err(GenomeError::Transform(format!(
                "line {line_no}: expected 9 columns, found {}",
                fields.len()
            )));
        }
        if fields[2] != "exon" {
            continue;
        }

        let start = parse_coordinate(fields[3], line_no)?;
        let end = parse_coordinate(fields[4], line_no)?;
        if start == 0 || end < start {
            return Err(GenomeError::Transform(format!(
                "line {line_no}: invalid interval {start}-{end}"
            )));
        }
        let strand = fields[6].chars().next().unwrap_or('.');

        let mut gene_id = None;
        let mut transcript_id = None;
        let mut gene_name = None;
        for capture in GTF_ATTRIBUTE.captures_iter(fields[8]) {
            let value = capture[2].to_string();
            match &capture[1] {
                "gene_id" => gene_id = Some(value),
                "transcript_id" => transcript_id = Some(value),
                "gene_name" => gene_name = Some(value),
                _ => {}
            }
        }
        let (Some(gene_id), Some(transcript_id)) = (gene_id, transcript_id) else {
            return Err(GenomeError::Transform(format!(
                "line {line_no}: missing gene_id or transcript_id"
            )));
        };

        let chrom = fields[0].to_string();
        let order = by_id.len();
        // GTF is 1-based inclusive; BED is 0-based half-open.
        let (bed_start, bed_end) = (start - 1, end);
        let entry = by_id
            .entry((transcript_id, chrom.clone()))
            .or_insert_with(|| Transcript {
                gene_id,
                gene_name,
                chrom,
                strand,
                start: bed_start,
                end: bed_end,
                exonic: 0,
                order,
            });
        entry.start = entry.start.min(bed_start);
        entry.end = entry.end.max(bed_end);
        entry.exonic += bed_end - bed_start;
    }

    let mut transcripts: Vec<Transcript> = by_id.into_values().collect();
    transcripts.sort_by_key(|transcript| transcript.order);
    Ok(transcripts)
}

fn parse_coordinate(value: &str, line_no: usize) -> Result<u64, GenomeError> {
    value.trim().parse().map_err(|_| {
        GenomeError::Transform(format!("line {line_no}: invalid coordinate {value:?}"))
    })
}
