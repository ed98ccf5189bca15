use core::cmp::Reverse;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::*;

/// Per-rank histogram of deployment-cell usage, accumulated across games.
///
/// Rows are rank ordinals, columns are deployment-region cell indices in the
/// owner's own orientation (row-major over its starting rows). The matrix is
/// owned by the AI; the engine never reads or writes it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementMatrix {
    counts: Array2<u32>,
}

impl PlacementMatrix {
    pub fn new(region_cells: usize) -> Self {
        Self {
            counts: Array2::zeros((Rank::COUNT, region_cells)),
        }
    }

    pub fn region_cells(&self) -> usize {
        self.counts.dim().1
    }

    pub fn record(&mut self, rank: Rank, cell_index: usize) {
        self.counts[(rank.ordinal(), cell_index)] += 1;
    }

    pub fn count(&self, rank: Rank, cell_index: usize) -> u32 {
        self.counts[(rank.ordinal(), cell_index)]
    }

    /// Cell indices for `rank`, most-used first; ties break toward the lower
    /// index so a fresh matrix degrades to plain scan order.
    pub fn prioritized_cells(&self, rank: Rank) -> Vec<usize> {
        let row = self.counts.row(rank.ordinal());
        let mut indices: Vec<usize> = (0..row.len()).collect();
        indices.sort_by_key(|&index| (Reverse(row[index]), index));
        indices
    }
}

/// Load/save contract for the learned placement statistics. The storage
/// mechanism is outside the core; failures are reported as
/// [`GameError::Persistence`] and propagate uncaught.
pub trait PlacementStore {
    /// Loads the persisted matrix, or `None` when nothing was stored yet.
    fn load(&mut self) -> Result<Option<PlacementMatrix>>;

    fn save(&mut self, matrix: &PlacementMatrix) -> Result<()>;
}

/// JSON-on-disk placement store. Concurrent writers to the same path are not
/// synchronized.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PlacementStore for JsonFileStore {
    fn load(&mut self) -> Result<Option<PlacementMatrix>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&self.path).map_err(|err| {
            log::error!("failed to read placement matrix from {:?}: {err}", self.path);
            GameError::Persistence
        })?;
        let matrix = serde_json::from_str(&json).map_err(|err| {
            log::error!("failed to parse placement matrix from {:?}: {err}", self.path);
            GameError::Persistence
        })?;
        Ok(Some(matrix))
    }

    fn save(&mut self, matrix: &PlacementMatrix) -> Result<()> {
        let json = serde_json::to_string(matrix).map_err(|err| {
            log::error!("failed to serialize placement matrix: {err}");
            GameError::Persistence
        })?;
        std::fs::write(&self.path, json).map_err(|err| {
            log::error!("failed to write placement matrix to {:?}: {err}", self.path);
            GameError::Persistence
        })
    }
}
