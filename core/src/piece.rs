use serde::{Deserialize, Serialize};

use crate::*;

/// Piece strength identifier.
///
/// Ordinary ranks compare numerically (higher beats lower). Bomb and Flag are
/// non-ranked specials that never move and are resolved by dedicated battle
/// rules; their [`Rank::value`] is only used as a stable ordinal.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rank {
    /// Rank 0. Loses to everything except the top rank (assassin rule).
    Spy,
    /// Rank 1. Attacks require a declared guess of the defender's identity.
    Declarer,
    /// Rank 2. Moves unbounded distance in a straight line.
    Scout,
    /// Rank 3. The only rank that defeats a Bomb.
    BombSquad,
    R4,
    R5,
    R6,
    R7,
    R8,
    R9,
    R10,
    Bomb,
    Flag,
}

impl Rank {
    pub const COUNT: usize = 13;

    pub const ALL: [Rank; Rank::COUNT] = [
        Rank::Spy,
        Rank::Declarer,
        Rank::Scout,
        Rank::BombSquad,
        Rank::R4,
        Rank::R5,
        Rank::R6,
        Rank::R7,
        Rank::R8,
        Rank::R9,
        Rank::R10,
        Rank::Bomb,
        Rank::Flag,
    ];

    /// Numeric strength for ordinary ranks; ordinal position for Bomb/Flag.
    pub const fn value(self) -> u8 {
        self as u8
    }

    pub const fn ordinal(self) -> usize {
        self as usize
    }

    pub const fn is_mobile(self) -> bool {
        !matches!(self, Rank::Bomb | Rank::Flag)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Red,
    Blue,
}

impl Side {
    pub const fn other(self) -> Side {
        match self {
            Side::Red => Side::Blue,
            Side::Blue => Side::Red,
        }
    }

    pub(crate) const fn index(self) -> usize {
        self as usize
    }
}

/// A piece standing on the board (or seeded into a tray cell).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Piece {
    pub rank: Rank,
    pub owner: Side,
}

/// Per-rank deployment bookkeeping.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PieceCount {
    pub max: u8,
    pub in_play: u8,
}

impl PieceCount {
    pub const fn remaining(self) -> u8 {
        self.max - self.in_play
    }
}

/// Per-player, per-rank max/in-play counters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    counts: [[PieceCount; Rank::COUNT]; 2],
}

impl Inventory {
    pub fn new(variant: BoardVariant) -> Self {
        let mut counts = [[PieceCount::default(); Rank::COUNT]; 2];
        for side_counts in &mut counts {
            for rank in Rank::ALL {
                side_counts[rank.ordinal()].max = variant.rank_max(rank);
            }
        }
        Self { counts }
    }

    pub fn get(&self, side: Side, rank: Rank) -> PieceCount {
        self.counts[side.index()][rank.ordinal()]
    }

    /// Pieces of `side` still waiting to be placed.
    pub fn remaining(&self, side: Side) -> CellCount {
        self.counts[side.index()]
            .iter()
            .map(|count| count.remaining() as CellCount)
            .sum()
    }

    pub(crate) fn take(&mut self, side: Side, rank: Rank) -> Result<()> {
        let count = &mut self.counts[side.index()][rank.ordinal()];
        if count.in_play >= count.max {
            return Err(GameError::Invariant("all pieces of this rank are in play"));
        }
        count.in_play += 1;
        Ok(())
    }

    pub(crate) fn put_back(&mut self, side: Side, rank: Rank) -> Result<()> {
        let count = &mut self.counts[side.index()][rank.ordinal()];
        if count.in_play == 0 {
            return Err(GameError::Invariant("no pieces of this rank in play"));
        }
        count.in_play -= 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinary_rank_values_are_numeric() {
        assert_eq!(Rank::Spy.value(), 0);
        assert_eq!(Rank::Declarer.value(), 1);
        assert_eq!(Rank::Scout.value(), 2);
        assert_eq!(Rank::BombSquad.value(), 3);
        assert_eq!(Rank::R10.value(), 10);
    }

    #[test]
    fn only_bomb_and_flag_are_immobile() {
        for rank in Rank::ALL {
            let expect_immobile = matches!(rank, Rank::Bomb | Rank::Flag);
            assert_eq!(rank.is_mobile(), !expect_immobile, "{rank:?}");
        }
    }

    #[test]
    fn inventory_take_and_put_back_round_trip() {
        let mut inventory = Inventory::new(BoardVariant::Standard);
        let before = inventory.remaining(Side::Red);

        inventory.take(Side::Red, Rank::Spy).unwrap();
        assert_eq!(inventory.get(Side::Red, Rank::Spy).remaining(), 0);
        assert_eq!(inventory.remaining(Side::Red), before - 1);

        inventory.put_back(Side::Red, Rank::Spy).unwrap();
        assert_eq!(inventory.remaining(Side::Red), before);
    }

    #[test]
    fn inventory_bounds_are_enforced() {
        let mut inventory = Inventory::new(BoardVariant::Standard);
        inventory.take(Side::Blue, Rank::Flag).unwrap();
        assert!(inventory.take(Side::Blue, Rank::Flag).is_err());
        inventory.put_back(Side::Blue, Rank::Flag).unwrap();
        assert!(inventory.put_back(Side::Blue, Rank::Flag).is_err());
    }
}
