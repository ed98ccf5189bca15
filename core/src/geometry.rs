use serde::{Deserialize, Serialize};

use crate::*;

/// Classification of a grid cell. Derived from `(row, col, variant)` alone and
/// never stored as mutable state.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellKind {
    /// Part of the play region; may hold a piece.
    Playable,
    /// Impassable terrain inside the play region.
    Island,
    /// Void space outside every region.
    Void,
    /// Tray cell representing one undeployed rank of `Side`.
    Tray(Side),
}

impl CellKind {
    pub const fn is_playable(self) -> bool {
        matches!(self, CellKind::Playable)
    }

    /// Whether a click on this cell can mean anything at all.
    pub const fn is_selectable(self) -> bool {
        matches!(self, CellKind::Playable | CellKind::Tray(_))
    }

    pub const fn may_hold_piece(self) -> bool {
        matches!(self, CellKind::Playable | CellKind::Tray(_))
    }
}

/// Inclusive rectangle of cells sharing one classification.
#[derive(Copy, Clone, Debug)]
struct Region {
    kind: CellKind,
    rows: (Coord, Coord),
    cols: (Coord, Coord),
}

impl Region {
    const fn contains(&self, (row, col): Coord2) -> bool {
        row >= self.rows.0 && row <= self.rows.1 && col >= self.cols.0 && col <= self.cols.1
    }
}

// Standard layout:
//
//  p = Playable  x = Void  h = Tray(Red)  a = Tray(Blue)  i = Island
//
//                        1 1
//    0 1 2 3 4 5 6 7 8 9 0 1
//  0 x p p p p p p p p p p x
//  1 a p p p p p p p p p p a
//  2 a p p p p p p p p p p a
//  3 a p p i i p p i i p p a
//  4 a p p i i p p i i p p a
//  5 a p p p p p p p p p p a
//  6 a p p p p p p p p p p a
//  7 x p p p p p p p p p p x
//  8 x x h h h h h h h h x x
//  9 x x x h h h h h x x x x
const STANDARD_REGIONS: &[Region] = &[
    Region { kind: CellKind::Island, rows: (3, 4), cols: (3, 4) },
    Region { kind: CellKind::Island, rows: (3, 4), cols: (7, 8) },
    Region { kind: CellKind::Playable, rows: (0, 7), cols: (1, 10) },
    Region { kind: CellKind::Tray(Side::Red), rows: (8, 8), cols: (2, 9) },
    Region { kind: CellKind::Tray(Side::Red), rows: (9, 9), cols: (3, 7) },
    Region { kind: CellKind::Tray(Side::Blue), rows: (1, 6), cols: (0, 0) },
    Region { kind: CellKind::Tray(Side::Blue), rows: (1, 6), cols: (11, 11) },
];

// Compact layout, same shape language on an 8x10 grid with a 6x8 play region.
const COMPACT_REGIONS: &[Region] = &[
    Region { kind: CellKind::Island, rows: (2, 3), cols: (3, 3) },
    Region { kind: CellKind::Island, rows: (2, 3), cols: (6, 6) },
    Region { kind: CellKind::Playable, rows: (0, 5), cols: (1, 8) },
    Region { kind: CellKind::Tray(Side::Red), rows: (6, 6), cols: (1, 8) },
    Region { kind: CellKind::Tray(Side::Red), rows: (7, 7), cols: (2, 6) },
    Region { kind: CellKind::Tray(Side::Blue), rows: (1, 6), cols: (0, 0) },
    Region { kind: CellKind::Tray(Side::Blue), rows: (1, 6), cols: (9, 9) },
];

const STANDARD_RANK_MAX: [u8; Rank::COUNT] = [1, 2, 5, 5, 2, 2, 2, 1, 1, 1, 1, 6, 1];
const COMPACT_RANK_MAX: [u8; Rank::COUNT] = [1, 1, 2, 2, 1, 1, 1, 1, 1, 1, 1, 2, 1];

/// Fixed board layout. Two sizes are supported; everything about a variant is
/// a pure function of this value.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoardVariant {
    Standard,
    Compact,
}

impl BoardVariant {
    /// Full grid dimensions, trays and void included.
    pub const fn size(self) -> Coord2 {
        match self {
            BoardVariant::Standard => (10, 12),
            BoardVariant::Compact => (8, 10),
        }
    }

    /// Top-left corner of the play region in grid coordinates.
    pub const fn play_origin(self) -> Coord2 {
        match self {
            BoardVariant::Standard => (0, 1),
            BoardVariant::Compact => (0, 1),
        }
    }

    /// Dimensions of the play region.
    pub const fn play_size(self) -> Coord2 {
        match self {
            BoardVariant::Standard => (8, 10),
            BoardVariant::Compact => (6, 8),
        }
    }

    /// Number of deployment rows granted to each side.
    pub const fn deploy_rows(self) -> Coord {
        match self {
            BoardVariant::Standard => 3,
            BoardVariant::Compact => 2,
        }
    }

    pub const fn rank_max(self, rank: Rank) -> u8 {
        match self {
            BoardVariant::Standard => STANDARD_RANK_MAX[rank.ordinal()],
            BoardVariant::Compact => COMPACT_RANK_MAX[rank.ordinal()],
        }
    }

    const fn regions(self) -> &'static [Region] {
        match self {
            BoardVariant::Standard => STANDARD_REGIONS,
            BoardVariant::Compact => COMPACT_REGIONS,
        }
    }

    /// Classifies a cell. Coordinates outside the grid are [`CellKind::Void`].
    pub fn classify(self, coords: Coord2) -> CellKind {
        let (rows, cols) = self.size();
        if coords.0 >= rows || coords.1 >= cols {
            return CellKind::Void;
        }
        self.regions()
            .iter()
            .find(|region| region.contains(coords))
            .map_or(CellKind::Void, |region| region.kind)
    }

    /// Absolute row span `(first, last)` of `side`'s deployment rows.
    pub const fn deploy_row_span(self, side: Side) -> (Coord, Coord) {
        let (origin_row, _) = self.play_origin();
        let (play_rows, _) = self.play_size();
        match side {
            Side::Blue => (origin_row, origin_row + self.deploy_rows() - 1),
            Side::Red => (
                origin_row + play_rows - self.deploy_rows(),
                origin_row + play_rows - 1,
            ),
        }
    }

    /// Whether an absolute coordinate lies in `side`'s deployment region.
    pub fn in_deploy_region(self, side: Side, coords: Coord2) -> bool {
        let (first, last) = self.deploy_row_span(side);
        let (_, origin_col) = self.play_origin();
        let (_, play_cols) = self.play_size();
        coords.0 >= first
            && coords.0 <= last
            && coords.1 >= origin_col
            && coords.1 < origin_col + play_cols
    }

    /// Translates absolute grid coordinates into play-region coordinates.
    pub fn to_play(self, coords: Coord2) -> Option<Coord2> {
        let (origin_row, origin_col) = self.play_origin();
        let (play_rows, play_cols) = self.play_size();
        let row = coords.0.checked_sub(origin_row)?;
        let col = coords.1.checked_sub(origin_col)?;
        (row < play_rows && col < play_cols).then_some((row, col))
    }

    /// Translates play-region coordinates into absolute grid coordinates.
    pub const fn to_grid(self, coords: Coord2) -> Coord2 {
        let (origin_row, origin_col) = self.play_origin();
        (coords.0 + origin_row, coords.1 + origin_col)
    }

    /// Total pieces each side deploys.
    pub fn piece_total(self) -> CellCount {
        Rank::ALL
            .iter()
            .map(|&rank| self.rank_max(rank) as CellCount)
            .sum()
    }

    /// Tray cells of `side` in grid scan order; ranks are seeded in this order.
    pub(crate) fn tray_cells(self, side: Side) -> impl Iterator<Item = Coord2> {
        let (rows, cols) = self.size();
        (0..rows)
            .flat_map(move |row| (0..cols).map(move |col| (row, col)))
            .filter(move |&coords| self.classify(coords) == CellKind::Tray(side))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARIANTS: [BoardVariant; 2] = [BoardVariant::Standard, BoardVariant::Compact];

    #[test]
    fn standard_classification_matches_layout() {
        let v = BoardVariant::Standard;
        assert_eq!(v.classify((0, 0)), CellKind::Void);
        assert_eq!(v.classify((0, 1)), CellKind::Playable);
        assert_eq!(v.classify((3, 3)), CellKind::Island);
        assert_eq!(v.classify((4, 8)), CellKind::Island);
        assert_eq!(v.classify((3, 5)), CellKind::Playable);
        assert_eq!(v.classify((8, 2)), CellKind::Tray(Side::Red));
        assert_eq!(v.classify((9, 7)), CellKind::Tray(Side::Red));
        assert_eq!(v.classify((9, 8)), CellKind::Void);
        assert_eq!(v.classify((1, 0)), CellKind::Tray(Side::Blue));
        assert_eq!(v.classify((6, 11)), CellKind::Tray(Side::Blue));
        assert_eq!(v.classify((0, 11)), CellKind::Void);
        assert_eq!(v.classify((20, 20)), CellKind::Void);
    }

    #[test]
    fn deployment_capacity_matches_piece_totals() {
        for variant in VARIANTS {
            let (_, play_cols) = variant.play_size();
            let capacity = mult(variant.deploy_rows(), play_cols);
            assert_eq!(capacity, variant.piece_total(), "{variant:?}");
        }
    }

    #[test]
    fn red_tray_holds_every_rank_and_blue_tray_all_but_flag() {
        for variant in VARIANTS {
            assert_eq!(variant.tray_cells(Side::Red).count(), Rank::COUNT);
            assert_eq!(variant.tray_cells(Side::Blue).count(), Rank::COUNT - 1);
        }
    }

    #[test]
    fn deployment_regions_are_playable_and_disjoint() {
        for variant in VARIANTS {
            let (rows, cols) = variant.size();
            for row in 0..rows {
                for col in 0..cols {
                    let red = variant.in_deploy_region(Side::Red, (row, col));
                    let blue = variant.in_deploy_region(Side::Blue, (row, col));
                    assert!(!(red && blue));
                    if red || blue {
                        assert_eq!(variant.classify((row, col)), CellKind::Playable);
                    }
                }
            }
        }
    }

    #[test]
    fn play_coordinate_translation_round_trips() {
        for variant in VARIANTS {
            let (play_rows, play_cols) = variant.play_size();
            for row in 0..play_rows {
                for col in 0..play_cols {
                    let grid = variant.to_grid((row, col));
                    assert_eq!(variant.to_play(grid), Some((row, col)));
                }
            }
            assert_eq!(variant.to_play((0, 0)), None);
        }
    }
}
