//! Progress bar for the tile writer pool

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;

use butterfly_tiles::builder::ProgressCallback;

/// Creates a progress bar counting written tiles
pub fn create_progress_bar(total_tiles: u64) -> ProgressBar {
    let pb = ProgressBar::new(total_tiles);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} tiles ({percent}%) ETA: {eta}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// Tile progress shown on stderr
pub struct ProgressManager {
    pub pb: ProgressBar,
}

impl ProgressManager {
    pub fn new(message: &str) -> Self {
        eprintln!("{message}");
        Self {
            pb: create_progress_bar(0),
        }
    }

    /// Callback for the writer pool. The total is only known once the
    /// graph has been constructed, so the length is set on the first call.
    pub fn callback(&self) -> ProgressCallback {
        let pb = self.pb.clone();
        Arc::new(move |done: u64, total: u64| {
            if pb.length().unwrap_or(0) != total {
                pb.set_length(total);
            }
            pb.set_position(done);
            if done >= total {
                pb.finish_with_message("✅ Tiles written");
            }
        })
    }
}
