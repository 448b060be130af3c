//! Defect counters and build summary

use log::{info, warn};
use serde::Serialize;

/// Non-fatal data defects seen during the build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DataQuality {
    /// Ways with fewer than two distinct points or unresolvable geometry
    pub skipped_ways: u64,
    /// Restrictions referencing a raw node that never became a graph node
    pub dropped_restrictions: u64,
    /// Link chain walks stopped by the hop bound
    pub truncated_link_chains: u64,
}

impl DataQuality {
    pub fn is_clean(&self) -> bool {
        *self == DataQuality::default()
    }

    pub fn log_summary(&self) {
        if self.is_clean() {
            info!("No data defects");
            return;
        }
        if self.skipped_ways > 0 {
            warn!("Skipped {} ways with degenerate or unresolvable geometry", self.skipped_ways);
        }
        if self.dropped_restrictions > 0 {
            warn!("Dropped {} restrictions referencing non-graph nodes", self.dropped_restrictions);
        }
        if self.truncated_link_chains > 0 {
            warn!("Truncated {} link chains at the hop bound", self.truncated_link_chains);
        }
    }
}

/// What a finished build produced
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    pub level: u8,
    pub nodes: usize,
    pub edges: u64,
    pub shape_points: u64,
    pub reclassified_links: u64,
    pub restrictions: usize,
    pub sign_records: usize,
    pub tiles_written: usize,
    pub quality: DataQuality,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_serializes_counter_names() {
        let quality = DataQuality {
            skipped_ways: 2,
            dropped_restrictions: 1,
            truncated_link_chains: 0,
        };
        assert!(!quality.is_clean());
        let json = serde_json::to_value(quality).unwrap();
        assert_eq!(json["skipped_ways"], 2);
        assert_eq!(json["dropped_restrictions"], 1);
        assert_eq!(json["truncated_link_chains"], 0);
        assert!(DataQuality::default().is_clean());
    }
}
