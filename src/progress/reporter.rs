//! Progress reporter implementation
//!
//! Uses indicatif for a single byte-transfer bar with throughput and ETA,
//! plus a status line for the verification steps around it.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Progress reporter for a file transfer
pub struct ProgressReporter {
    /// Multi-progress container
    multi: MultiProgress,
    /// Byte progress bar
    bytes_bar: ProgressBar,
    /// Current status message
    status: ProgressBar,
    /// Start time
    start_time: Instant,
    /// Total bytes to transfer
    total_bytes: AtomicU64,
    /// Bytes transferred so far
    bytes_copied: AtomicU64,
    /// Is progress enabled
    enabled: AtomicBool,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let multi = MultiProgress::new();

        let status = multi.add(ProgressBar::new_spinner());
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            status.set_style(style);
        }

        let bytes_bar = multi.add(ProgressBar::new(0));
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:40.green/white}] {bytes}/{total_bytes} ({bytes_per_sec}, ETA {eta})")
        {
            bytes_bar.set_style(style.progress_chars("=> "));
        }
        bytes_bar.set_prefix("SCP");

        Self {
            multi,
            bytes_bar,
            status,
            start_time: Instant::now(),
            total_bytes: AtomicU64::new(0),
            bytes_copied: AtomicU64::new(0),
            enabled: AtomicBool::new(true),
        }
    }

    /// Create a disabled progress reporter (for quiet mode)
    pub fn disabled() -> Self {
        let reporter = Self::new();
        reporter.enabled.store(false, Ordering::SeqCst);
        reporter.multi.set_draw_target(ProgressDrawTarget::hidden());
        reporter
    }

    /// Start tracking a new transfer of `total` bytes
    pub fn start_transfer(&self, name: &str, total: u64) {
        self.total_bytes.store(total, Ordering::Relaxed);
        self.bytes_copied.store(0, Ordering::Relaxed);
        self.bytes_bar.reset();
        self.bytes_bar.set_length(total);
        self.set_status(name);
    }

    /// Increment bytes transferred
    pub fn increment_bytes(&self, bytes: u64) {
        self.bytes_copied.fetch_add(bytes, Ordering::Relaxed);
        self.bytes_bar.inc(bytes);
    }

    /// Set current status message
    pub fn set_status(&self, msg: &str) {
        let display = if msg.len() > 60 {
            let cut = msg
                .char_indices()
                .map(|(i, _)| i)
                .find(|&i| msg.len() - i <= 57)
                .unwrap_or(0);
            format!("...{}", &msg[cut..])
        } else {
            msg.to_string()
        };
        self.status.set_message(display);
    }

    /// Get elapsed time
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Get current throughput in bytes/second
    pub fn throughput(&self) -> f64 {
        let bytes = self.bytes_copied.load(Ordering::Relaxed);
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            bytes as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Finish progress with success message
    pub fn finish_success(&self, message: &str) {
        self.status.finish_with_message(format!("✓ {}", message));
        self.bytes_bar.finish();
    }

    /// Finish progress with error message
    pub fn finish_error(&self, message: &str) {
        self.status.finish_with_message(format!("✗ {}", message));
        self.bytes_bar.abandon();
    }

    /// Check if progress is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Get progress summary
    pub fn summary(&self) -> ProgressSummary {
        ProgressSummary {
            total_bytes: self.total_bytes.load(Ordering::Relaxed),
            bytes_copied: self.bytes_copied.load(Ordering::Relaxed),
            elapsed: self.elapsed(),
            throughput: self.throughput(),
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Progress summary
#[derive(Debug, Clone)]
pub struct ProgressSummary {
    /// Total bytes to transfer
    pub total_bytes: u64,
    /// Bytes transferred so far
    pub bytes_copied: u64,
    /// Elapsed time
    pub elapsed: Duration,
    /// Throughput in bytes/second
    pub throughput: f64,
}

impl ProgressSummary {
    /// Get completion percentage
    pub fn percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            0.0
        } else {
            (self.bytes_copied as f64 / self.total_bytes as f64) * 100.0
        }
    }

    /// One-line human-readable summary
    pub fn describe(&self) -> String {
        format!(
            "{}/{} in {:.1?} ({}/s)",
            humansize::format_size(self.bytes_copied, humansize::BINARY),
            humansize::format_size(self.total_bytes, humansize::BINARY),
            self.elapsed,
            humansize::format_size(self.throughput as u64, humansize::BINARY)
        )
    }
}
