//! Progress reporting for long sequential loops (geocoding).

use indicatif::{ProgressBar, ProgressStyle};

/// Receives a monotonically increasing position out of a known total
pub trait ProgressSink: Send + Sync {
    fn start(&self, total: u64);
    fn set_position(&self, position: u64);
    fn finish(&self);
}

/// Terminal bar, drawn on stderr next to the log output
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new(message: &'static str) -> Self {
        let bar = ProgressBar::hidden();
        let style = ProgressStyle::with_template("{msg} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({percent}%)")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        bar.set_style(style);
        bar.set_message(message);
        Self { bar }
    }
}

impl ProgressSink for BarProgress {
    fn start(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(0);
        self.bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
    }

    fn set_position(&self, position: u64) {
        self.bar.set_position(position);
    }

    fn finish(&self) {
        self.bar.finish();
    }
}

/// Discards progress, for tests and non-interactive runs
pub struct SilentProgress;

impl ProgressSink for SilentProgress {
    fn start(&self, _total: u64) {}
    fn set_position(&self, _position: u64) {}
    fn finish(&self) {}
}
