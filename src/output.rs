use std::io::{self, Write};

use serde::Serialize;

use crate::orchestrator::{AssetOutcome, BuildReport};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Human,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_report(report: &BuildReport) -> io::Result<()> {
        Self::print_json(report)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub struct HumanOutput;

impl HumanOutput {
    pub fn print_report(report: &BuildReport) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        Self::write_report(&mut stdout, report)
    }

    pub fn write_report<W: Write>(out: &mut W, report: &BuildReport) -> io::Result<()> {
        let green = "\x1b[32m";
        let yellow = "\x1b[33m";
        let cyan = "\x1b[36m";
        let red = "\x1b[31m";
        let reset = "\x1b[0m";

        writeln!(out, "{cyan}{} -> {}{reset}", report.selection, report.root)?;
        for asset in &report.assets {
            let (label, color) = match &asset.outcome {
                AssetOutcome::Done => ("done", green),
                AssetOutcome::Cached => ("cached", yellow),
                AssetOutcome::Failed { .. } => ("failed", red),
            };
            writeln!(out, "{color}  {label:<7} {}{reset}", asset.name)?;
            writeln!(out, "          {}", asset.destination)?;
            if let AssetOutcome::Failed { stage, error, .. } = &asset.outcome {
                writeln!(out, "{red}          after {stage}: {error}{reset}")?;
            }
            if asset.incomplete {
                writeln!(out, "{yellow}          transfer was shorter than declared{reset}")?;
            }
            if !asset.skipped_members.is_empty() {
                writeln!(
                    out,
                    "{yellow}          {} archive member(s) skipped{reset}",
                    asset.skipped_members.len()
                )?;
            }
        }
        writeln!(
            out,
            "{} done, {} cached, {} failed",
            report.succeeded(),
            report.cached(),
            report.failed()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::{AssetReport, AssetStage};

    #[test]
    fn human_summary_lists_failures() {
        let report = BuildReport {
            selection: "mm10".to_string(),
            root: "/data".to_string(),
            assets: vec![AssetReport {
                name: "cytoband".to_string(),
                kind: None,
                destination: "/data/mm10/annotation/cytoBand.txt".to_string(),
                outcome: AssetOutcome::Failed {
                    stage: AssetStage::Fetched,
                    error: "gzip decompression failed: invalid gzip header".to_string(),
                    transfer: false,
                },
                received_bytes: Some(12),
                incomplete: false,
                skipped_members: Vec::new(),
            }],
            finished_at: String::new(),
        };

        let mut buffer = Vec::new();
        HumanOutput::write_report(&mut buffer, &report).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("cytoband"));
        assert!(text.contains("after fetched: gzip decompression failed"));
        assert!(text.ends_with("0 done, 0 cached, 1 failed\n"));
    }
}
