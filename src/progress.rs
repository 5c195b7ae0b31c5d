// ABOUTME: Progress reporting for copy phases behind a small sink trait
// ABOUTME: Console sink draws indicatif bars; silent sink only logs through tracing

use crate::migration::TransferReport;
use indicatif::{ProgressBar, ProgressStyle};

/// Receives phase messages and per-item progress from a copy run.
pub trait ProgressSink: Send {
    /// A new phase (schema, data, indices, sequences) is starting.
    fn phase(&mut self, message: &str);

    /// Work on one item of `total` units is starting.
    fn start(&mut self, label: &str, total: u64);

    fn advance(&mut self, units: u64);

    /// The current item is done.
    fn finish(&mut self);

    fn summary(&mut self, report: &TransferReport);
}

/// Draws a progress bar per table on stderr.
pub struct ConsoleProgress {
    bar: Option<ProgressBar>,
    style: ProgressStyle,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        let style = ProgressStyle::with_template(
            "  {msg:<24} [{bar:40.cyan/blue}] {pos}/{len} rows ({per_sec}, eta {eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");

        Self { bar: None, style }
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ConsoleProgress {
    fn phase(&mut self, message: &str) {
        self.finish();
        tracing::info!("{}", message);
    }

    fn start(&mut self, label: &str, total: u64) {
        self.finish();
        let bar = ProgressBar::new(total);
        bar.set_style(self.style.clone());
        bar.set_message(label.to_string());
        self.bar = Some(bar);
    }

    fn advance(&mut self, units: u64) {
        if let Some(bar) = &self.bar {
            bar.inc(units);
        }
    }

    fn finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish();
        }
    }

    fn summary(&mut self, report: &TransferReport) {
        self.finish();
        tracing::info!("{}", report.summary());
    }
}

/// Logs milestones only; used in tests and non-interactive runs.
#[derive(Debug, Default)]
pub struct SilentProgress {
    current: Option<String>,
}

impl ProgressSink for SilentProgress {
    fn phase(&mut self, message: &str) {
        tracing::debug!("{}", message);
    }

    fn start(&mut self, label: &str, total: u64) {
        tracing::debug!("Starting {} ({} units)", label, total);
        self.current = Some(label.to_string());
    }

    fn advance(&mut self, _units: u64) {}

    fn finish(&mut self) {
        if let Some(label) = self.current.take() {
            tracing::debug!("  ✓ {}", label);
        }
    }

    fn summary(&mut self, report: &TransferReport) {
        tracing::info!("{}", report.summary());
    }
}
