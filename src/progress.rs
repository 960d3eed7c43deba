//! Progress reporting handed explicitly to each pipeline step.
//!
//! A sink hands out one task per transfer or extraction, so pipelines running on
//! different threads never share a counter.

use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressUnit {
    Bytes,
    Members,
}

pub trait ProgressTask: Send {
    fn advance(&self, delta: u64);
    fn finish(&self);
}

pub trait ProgressSink: Send + Sync {
    fn begin(&self, label: &str, total: Option<u64>, unit: ProgressUnit)
    -> Box<dyn ProgressTask>;
}

/// Discards all progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

struct NoTask;

impl ProgressTask for NoTask {
    fn advance(&self, _delta: u64) {}
    fn finish(&self) {}
}

impl ProgressSink for NoProgress {
    fn begin(
        &self,
        _label: &str,
        _total: Option<u64>,
        _unit: ProgressUnit,
    ) -> Box<dyn ProgressTask> {
        Box::new(NoTask)
    }
}

/// Terminal bars on stderr, one line per running task.
pub struct ConsoleProgress {
    bars: MultiProgress,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self {
            bars: MultiProgress::with_draw_target(ProgressDrawTarget::stderr()),
        }
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ConsoleProgress {
    fn begin(
        &self,
        label: &str,
        total: Option<u64>,
        unit: ProgressUnit,
    ) -> Box<dyn ProgressTask> {
        let bar = match total {
            Some(total) => ProgressBar::new(total),
            None => ProgressBar::new_spinner(),
        };
        bar.set_style(style_for(total.is_some(), unit));
        bar.set_message(label.to_string());
        if total.is_none() {
            bar.enable_steady_tick(Duration::from_millis(120));
        }
        Box::new(BarTask {
            bar: self.bars.add(bar),
        })
    }
}

struct BarTask {
    bar: ProgressBar,
}

impl ProgressTask for BarTask {
    fn advance(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn finish(&self) {
        self.bar.finish();
    }
}

fn style_for(bounded: bool, unit: ProgressUnit) -> ProgressStyle {
    let template = match (bounded, unit) {
        (true, ProgressUnit::Bytes) => {
            "{msg}\n[{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})"
        }
        (false, ProgressUnit::Bytes) => "{spinner:.green} {msg} {bytes} ({bytes_per_sec})",
        (true, ProgressUnit::Members) => {
            "{msg}\n[{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} members"
        }
        (false, ProgressUnit::Members) => "{spinner:.green} {msg} {pos} members",
    };
    ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
}

/// Human-readable byte count for log lines.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", size as u64, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_bytes_units() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1073741824), "1.00 GB");
    }

    #[test]
    fn console_tasks_are_independent() {
        let sink = ConsoleProgress {
            bars: MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
        };
        let first = sink.begin("first", Some(100), ProgressUnit::Bytes);
        let second = sink.begin("second", None, ProgressUnit::Members);
        first.advance(40);
        second.advance(3);
        first.finish();
        second.finish();
    }
}
