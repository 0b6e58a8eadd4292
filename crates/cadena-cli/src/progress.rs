//! The status line.
//!
//! One line on stderr: elapsed time, remaining time and completion when
//! the input length is known, output samples, and the running clip count.
//! Redraws are debounced to one per 150 ms of wall clock; the final call
//! leaves the line in place and emits a newline.

use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

const REDRAW_EVERY: Duration = Duration::from_millis(150);

/// Debounced single-line progress reporter.
pub struct Progress {
    bar: Option<ProgressBar>,
    last_draw: Instant,
    rate: f64,
    total_wide: Option<u64>,
}

impl Progress {
    /// Create a reporter. With `enabled` false every call is a no-op.
    pub fn new(enabled: bool, rate: u32, total_wide: Option<u64>) -> Self {
        let bar = enabled.then(|| {
            let bar = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
            bar.set_style(ProgressStyle::with_template("{msg}").expect("static template"));
            bar
        });
        Self {
            bar,
            // Far enough in the past that the first update draws.
            last_draw: Instant::now()
                .checked_sub(REDRAW_EVERY)
                .unwrap_or_else(Instant::now),
            rate: f64::from(rate.max(1)),
            total_wide,
        }
    }

    /// Redraw if the debounce window has passed.
    pub fn update(&mut self, read_wide: u64, out_wide: u64, clips: u64) {
        let Some(bar) = &self.bar else { return };
        if self.last_draw.elapsed() < REDRAW_EVERY {
            return;
        }
        self.last_draw = Instant::now();
        bar.set_message(self.line(read_wide, out_wide, clips));
    }

    /// Final redraw; leaves the line and moves to a new one.
    pub fn finish(&mut self, read_wide: u64, out_wide: u64, clips: u64) {
        let Some(bar) = self.bar.take() else { return };
        bar.set_message(self.line(read_wide, out_wide, clips));
        bar.finish();
    }

    fn line(&self, read_wide: u64, out_wide: u64, clips: u64) -> String {
        let elapsed = format_time(read_wide as f64 / self.rate);
        match self.total_wide.filter(|t| *t > 0) {
            Some(total) => {
                let percent = (read_wide as f64 / total as f64 * 100.0).min(100.0);
                let remaining = format_time(total.saturating_sub(read_wide) as f64 / self.rate);
                format!(
                    "In:{percent:5.1}% {elapsed} [{remaining}] Out:{out_wide} Clips:{clips}"
                )
            }
            None => format!("In:{elapsed} Out:{out_wide} Clips:{clips}"),
        }
    }
}

fn format_time(seconds: f64) -> String {
    let whole = seconds.max(0.0) as u64;
    let hours = whole / 3600;
    let minutes = whole % 3600 / 60;
    let secs = seconds - (hours * 3600 + minutes * 60) as f64;
    format!("{hours:02}:{minutes:02}:{secs:05.2}")
}
