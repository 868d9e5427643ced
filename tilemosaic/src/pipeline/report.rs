//! Per-run tile accounting.

use std::path::PathBuf;

use crate::coord::TileIndex;

use super::error::TileError;

/// A tile that did not make it into the mosaic.
#[derive(Debug)]
pub struct TileFailure {
    pub index: TileIndex,
    pub error: TileError,
}

/// Outcome of the fetch phase, surfaced when the run ends.
///
/// Never persisted; a run with failures still produces a mosaic as long as
/// one tile succeeded, and the gaps are listed here.
#[derive(Debug, Default)]
pub struct RunReport {
    pub tiles_requested: usize,
    pub tiles_succeeded: usize,
    pub tiles_failed: Vec<TileFailure>,
    /// Scratch directory that could not be removed at the end of the run.
    pub scratch_left_behind: Option<PathBuf>,
}

impl RunReport {
    pub fn new(tiles_requested: usize) -> Self {
        Self {
            tiles_requested,
            ..Self::default()
        }
    }

    pub(crate) fn record_success(&mut self) {
        self.tiles_succeeded += 1;
    }

    pub(crate) fn record_failure(&mut self, error: TileError) {
        self.tiles_failed.push(TileFailure {
            index: error.index(),
            error,
        });
    }

    pub(crate) fn record_cleanup_failure(&mut self, scratch: PathBuf) {
        self.scratch_left_behind = Some(scratch);
    }

    /// Tiles that finished, successfully or not.
    pub fn tiles_completed(&self) -> usize {
        self.tiles_succeeded + self.tiles_failed.len()
    }

    /// Indices of failed tiles in row-major order.
    pub fn failed_indices(&self) -> Vec<TileIndex> {
        let mut indices: Vec<_> = self.tiles_failed.iter().map(|f| f.index).collect();
        indices.sort_by_key(|i| (i.y, i.x));
        indices
    }

    /// True when every requested tile succeeded.
    pub fn is_complete(&self) -> bool {
        self.tiles_failed.is_empty() && self.tiles_succeeded == self.tiles_requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn missing(x: u32, y: u32) -> TileError {
        let index = TileIndex::new(x, y, 10).unwrap();
        TileError::MissingLocalFile {
            index,
            path: PathBuf::from("/nowhere"),
        }
    }

    #[test]
    fn test_counts() {
        let mut report = RunReport::new(4);
        report.record_success();
        report.record_success();
        report.record_failure(missing(843, 388));

        assert_eq!(report.tiles_completed(), 3);
        assert!(!report.is_complete());
        assert_eq!(report.tiles_failed[0].index, TileIndex::new(843, 388, 10).unwrap());
    }

    #[test]
    fn test_failed_indices_sorted_north_to_south() {
        let mut report = RunReport::new(3);
        report.record_failure(missing(843, 388));
        report.record_failure(missing(842, 387));
        report.record_failure(missing(843, 387));

        let indices: Vec<_> = report.failed_indices().iter().map(|i| (i.x, i.y)).collect();
        assert_eq!(indices, vec![(842, 387), (843, 387), (843, 388)]);
    }

    #[test]
    fn test_complete() {
        let mut report = RunReport::new(1);
        report.record_success();
        assert!(report.is_complete());
    }
}
