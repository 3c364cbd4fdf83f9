use std::{
    sync::{Arc, LazyLock},
    time::Duration,
};

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use kvm_dl::types::Progress;

use crate::utils::progress_enabled;

/// Shared MultiProgress instance for suspend/stop from other modules.
static MULTI: LazyLock<Arc<MultiProgress>> = LazyLock::new(|| Arc::new(MultiProgress::new()));

/// Pause progress display, run the closure, then resume.
pub fn suspend<F: FnOnce()>(f: F) {
    MULTI.suspend(f);
}

/// Stop and clear all progress bars.
pub fn stop() {
    MULTI.clear().ok();
}

fn download_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{spinner:.cyan} {prefix}  {wide_bar:.cyan/dim}  {bytes}/{total_bytes}  {bytes_per_sec}  {eta}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("━━─")
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Create a download progress bar with bytes, throughput and ETA.
pub fn create_download_job(prefix: &str) -> ProgressBar {
    let pb = if progress_enabled() {
        MULTI.add(ProgressBar::new(0))
    } else {
        MULTI.add(ProgressBar::hidden())
    };
    pb.set_style(download_style());
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Create a spinner job.
pub fn create_spinner_job(message: &str) -> ProgressBar {
    let pb = if progress_enabled() {
        MULTI.add(ProgressBar::new_spinner())
    } else {
        MULTI.add(ProgressBar::hidden())
    };
    pb.set_style(spinner_style());
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Handle download progress events and update a progress bar.
pub fn handle_download_progress(state: Progress, pb: &ProgressBar) {
    match state {
        Progress::Starting {
            total,
        } => {
            pb.set_length(total);
        }
        Progress::Chunk {
            current, ..
        } => {
            pb.set_position(current);
        }
        Progress::Complete {
            ..
        } => {
            pb.finish_and_clear();
        }
    }
}
