use hashbrown::HashMap;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::*;

/// What a viewer knows about a piece. Enemy pieces never expose their rank.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewPiece {
    Known(Rank),
    Unknown,
}

/// Coarse per-cell classification inside a view.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewState {
    Open,
    Blocked,
    Owned,
    Enemy,
}

/// A legal move in play-region coordinates.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewMove {
    pub from: Coord2,
    pub to: Coord2,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
struct ViewCell {
    blocked: bool,
    owned: bool,
    starting: bool,
    piece: Option<ViewPiece>,
    moves: Vec<ViewMove>,
}

/// Fog-of-war projection of the play region for one viewer.
///
/// All coordinates are play-region local. In deployment mode the view also
/// tracks remaining per-rank counts and accepts placement commands restricted
/// to the viewer's own starting rows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerView {
    cells: Array2<ViewCell>,
    counts: HashMap<Rank, u8>,
    deployment: bool,
}

impl PlayerView {
    /// Projects the board for `viewer`. `None` produces the unobfuscated
    /// neutral view used for cross-game learning: every rank visible, no
    /// ownership, no moves.
    pub fn project(board: &Board, viewer: Option<Side>, deployment: bool) -> Result<Self> {
        let variant = board.variant();
        let (play_rows, play_cols) = variant.play_size();

        let mut counts = HashMap::new();
        if let Some(side) = viewer {
            for rank in Rank::ALL {
                counts.insert(rank, board.piece_count(side, rank).remaining());
            }
        }

        let starting_rows = viewer.map(|side| {
            let (first, last) = variant.deploy_row_span(side);
            let (origin_row, _) = variant.play_origin();
            (first - origin_row, last - origin_row)
        });

        let mut cells = Array2::from_elem(
            (play_rows as usize, play_cols as usize),
            ViewCell::default(),
        );

        for row in 0..play_rows {
            for col in 0..play_cols {
                let at = variant.to_grid((row, col));
                let cell = board.cell(at)?;
                let view_cell = &mut cells[(row, col).to_nd_index()];

                if !cell.kind.is_playable() {
                    view_cell.blocked = true;
                    continue;
                }

                view_cell.starting = starting_rows
                    .is_some_and(|(first, last)| row >= first && row <= last);

                let Some(piece) = cell.piece else {
                    continue;
                };

                let owned = viewer == Some(piece.owner);
                view_cell.owned = owned;
                view_cell.piece = if viewer.is_some() && !owned {
                    Some(ViewPiece::Unknown)
                } else {
                    Some(ViewPiece::Known(piece.rank))
                };

                if owned {
                    view_cell.moves = legal_moves(board, at)?
                        .into_iter()
                        .filter_map(|to| variant.to_play(to))
                        .map(|to| ViewMove { from: (row, col), to })
                        .collect();
                }
            }
        }

        Ok(Self { cells, counts, deployment })
    }

    pub fn size(&self) -> Coord2 {
        self.cells.size()
    }

    pub fn is_deployment(&self) -> bool {
        self.deployment
    }

    fn cell(&self, coords: Coord2) -> Result<&ViewCell> {
        if self.cells.in_bounds(coords) {
            Ok(&self.cells[coords.to_nd_index()])
        } else {
            Err(GameError::OutOfBounds)
        }
    }

    pub fn state(&self, coords: Coord2) -> Result<ViewState> {
        let cell = self.cell(coords)?;
        if cell.blocked {
            return Ok(ViewState::Blocked);
        }
        // In deployment mode emptiness only counts inside the starting rows;
        // everything else falls through to the occupancy classification.
        if cell.piece.is_none() && (!self.deployment || cell.starting) {
            return Ok(ViewState::Open);
        }
        if cell.owned {
            return Ok(ViewState::Owned);
        }
        Ok(ViewState::Enemy)
    }

    pub fn piece(&self, coords: Coord2) -> Result<Option<ViewPiece>> {
        Ok(self.cell(coords)?.piece)
    }

    /// Remaining undeployed count for `rank`. Zero outside deployment mode.
    pub fn remaining(&self, rank: Rank) -> u8 {
        self.counts.get(&rank).copied().unwrap_or(0)
    }

    /// Whether every rank has been fully placed.
    pub fn is_filled(&self) -> bool {
        self.counts.values().all(|&count| count == 0)
    }

    /// Places `rank` at `coords` during deployment. Rejected (non-fatally)
    /// outside deployment mode, outside the viewer's starting rows, or when
    /// the rank is exhausted. Replacing a previous placement returns it to
    /// the remaining counts first.
    pub fn place(&mut self, coords: Coord2, rank: Rank) -> Result<bool> {
        let cell = self.cell(coords)?;
        if !self.deployment || !cell.starting || cell.blocked {
            return Ok(false);
        }

        let previous = cell.piece;
        if self.remaining(rank) == 0 && previous != Some(ViewPiece::Known(rank)) {
            return Ok(false);
        }
        if let Some(ViewPiece::Known(previous)) = previous {
            *self.counts.entry(previous).or_insert(0) += 1;
        }
        let count = self.counts.entry(rank).or_insert(0);
        if *count == 0 {
            return Ok(false);
        }
        *count -= 1;

        let cell = &mut self.cells[coords.to_nd_index()];
        cell.piece = Some(ViewPiece::Known(rank));
        cell.owned = true;
        Ok(true)
    }

    /// All precomputed legal moves for the viewer's own pieces.
    pub fn available_moves(&self) -> impl Iterator<Item = ViewMove> + '_ {
        self.cells.iter().flat_map(|cell| cell.moves.iter().copied())
    }

    pub fn moves_from(&self, coords: Coord2) -> Result<&[ViewMove]> {
        Ok(&self.cell(coords)?.moves)
    }
}
