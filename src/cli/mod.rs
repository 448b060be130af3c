//! CLI-specific utilities for butterfly-tiles

pub mod progress;

pub use progress::ProgressManager;
