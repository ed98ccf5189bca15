use core::ops::Index;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::*;

/// One grid cell. The kind is derived from geometry and never changes; the
/// piece and highlight are the mutable parts.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub kind: CellKind,
    pub piece: Option<Piece>,
    pub highlighted: bool,
}

impl Cell {
    pub const fn is_empty(&self) -> bool {
        self.piece.is_none()
    }
}

/// A cell snapshot with its position, the payload of every cell-level event.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellSnapshot {
    pub at: Coord2,
    pub kind: CellKind,
    pub piece: Option<Piece>,
    pub highlighted: bool,
}

/// Cells touched by a piece mutation: the playable cell itself plus the tray
/// cell representing the affected rank, when that rank has a tray slot.
pub(crate) type Touched = (Coord2, Option<Coord2>);

/// The full grid plus piece bookkeeping and the rank-to-tray reverse index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    variant: BoardVariant,
    cells: Array2<Cell>,
    tray: [[Option<Coord2>; Rank::COUNT]; 2],
    inventory: Inventory,
}

impl Board {
    pub fn new(variant: BoardVariant) -> Self {
        let size = variant.size();
        let cells = Array2::from_shape_fn(size.to_nd_index(), |(row, col)| Cell {
            kind: variant.classify((row as Coord, col as Coord)),
            piece: None,
            highlighted: false,
        });

        let mut board = Self {
            variant,
            cells,
            tray: [[None; Rank::COUNT]; 2],
            inventory: Inventory::new(variant),
        };

        // Seed each tray cell with the rank it represents, in scan order.
        for side in [Side::Red, Side::Blue] {
            for (rank, coords) in Rank::ALL.into_iter().zip(variant.tray_cells(side)) {
                board.tray[side.index()][rank.ordinal()] = Some(coords);
                board.cells[coords.to_nd_index()].piece = Some(Piece { rank, owner: side });
            }
        }

        board
    }

    pub fn variant(&self) -> BoardVariant {
        self.variant
    }

    pub fn size(&self) -> Coord2 {
        self.variant.size()
    }

    pub fn validate_coords(&self, coords: Coord2) -> Result<Coord2> {
        if self.cells.in_bounds(coords) {
            Ok(coords)
        } else {
            Err(GameError::OutOfBounds)
        }
    }

    pub fn cell(&self, coords: Coord2) -> Result<&Cell> {
        let coords = self.validate_coords(coords)?;
        Ok(&self.cells[coords.to_nd_index()])
    }

    pub fn snapshot(&self, coords: Coord2) -> Result<CellSnapshot> {
        let cell = self.cell(coords)?;
        Ok(CellSnapshot {
            at: coords,
            kind: cell.kind,
            piece: cell.piece,
            highlighted: cell.highlighted,
        })
    }

    pub fn piece_count(&self, side: Side, rank: Rank) -> PieceCount {
        self.inventory.get(side, rank)
    }

    /// Pieces of `side` still waiting to be deployed.
    pub fn remaining(&self, side: Side) -> CellCount {
        self.inventory.remaining(side)
    }

    /// Tray cell representing `rank` for `side`. `None` only for the Blue
    /// Flag, which has no tray slot (it is never a meaningful guess).
    pub fn tray_cell(&self, side: Side, rank: Rank) -> Option<Coord2> {
        self.tray[side.index()][rank.ordinal()]
    }

    /// Places a piece onto an empty playable cell.
    pub(crate) fn add_piece(&mut self, rank: Rank, owner: Side, at: Coord2) -> Result<Touched> {
        let cell = self.cell(at)?;
        if !cell.kind.is_playable() {
            return Err(GameError::Invariant("piece placed on a non-playable cell"));
        }
        if !cell.is_empty() {
            return Err(GameError::Invariant("piece placed on an occupied cell"));
        }

        self.inventory.take(owner, rank)?;
        self.cells[at.to_nd_index()].piece = Some(Piece { rank, owner });
        Ok((at, self.tray_cell(owner, rank)))
    }

    /// Removes the piece at a playable cell, returning its rank to inventory.
    pub(crate) fn remove_piece(&mut self, at: Coord2) -> Result<(Piece, Touched)> {
        let cell = self.cell(at)?;
        if !cell.kind.is_playable() {
            return Err(GameError::Invariant("piece removed from a non-playable cell"));
        }
        let piece = cell.piece.ok_or(GameError::EmptyPiece)?;

        self.inventory.put_back(piece.owner, piece.rank)?;
        self.cells[at.to_nd_index()].piece = None;
        Ok((piece, (at, self.tray_cell(piece.owner, piece.rank))))
    }

    pub(crate) fn set_highlight(&mut self, at: Coord2, on: bool) -> Result<Coord2> {
        let cell = self.cell(at)?;
        if !cell.kind.is_selectable() {
            return Err(GameError::Invariant("highlighted a non-selectable cell"));
        }
        self.cells[at.to_nd_index()].highlighted = on;
        Ok(at)
    }

    pub(crate) fn unhighlight_all(&mut self) -> Vec<Coord2> {
        let (rows, cols) = self.size();
        let mut cleared = Vec::new();
        for row in 0..rows {
            for col in 0..cols {
                let cell = &mut self.cells[(row, col).to_nd_index()];
                if cell.highlighted {
                    cell.highlighted = false;
                    cleared.push((row, col));
                }
            }
        }
        cleared
    }
}

impl Index<Coord2> for Board {
    type Output = Cell;

    fn index(&self, (row, col): Coord2) -> &Self::Output {
        &self.cells[(row as usize, col as usize)]
    }
}
