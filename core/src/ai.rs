use core::cmp::Reverse;
use ndarray::Array2;
use rand::prelude::*;
use serde::{Deserialize, Serialize};

use crate::*;

/// What the AI believes stands on a play-region cell. `Empty` covers both
/// genuinely empty cells and its own pieces; only enemy pieces are tracked.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Belief {
    Empty,
    Known(Rank),
    /// Seen moving, identity unknown. Cannot be a Bomb or the Flag.
    UnknownMobile,
    /// Never seen moving. Guessed to be a Bomb when attacked.
    UnknownImmobile,
}

/// Move categories in strict priority order. The chosen move is drawn
/// uniformly from the first non-empty category.
const CATEGORIES: usize = 7;
const CATEGORY_NAMES: [&str; CATEGORIES] = [
    "attack",
    "retreat",
    "advance",
    "expendable attack",
    "forward",
    "backward",
    "other",
];

/// How many prioritized deployment cells each rank may pass over at random
/// before its placement falls back to strict priority order.
const SKIP_BUDGET: u8 = 5;

/// The built-in heuristic opponent.
///
/// Keeps a belief board of the enemy's pieces, updated from the move and
/// battle feedback, and a cross-game placement matrix of where the enemy
/// likes to put each rank. All randomness flows from the explicit seed, so a
/// match replays deterministically.
pub struct Commodore {
    side: Side,
    variant: BoardVariant,
    rng: SmallRng,
    belief: Array2<Belief>,
    matrix: PlacementMatrix,
    store: Option<Box<dyn PlacementStore>>,
}

impl Commodore {
    pub fn new(side: Side, variant: BoardVariant, seed: u64) -> Self {
        Self {
            side,
            variant,
            rng: SmallRng::seed_from_u64(seed),
            belief: initial_belief(side, variant),
            matrix: PlacementMatrix::new(deploy_region_cells(variant)),
            store: None,
        }
    }

    /// Like [`Commodore::new`], with placement statistics persisted through
    /// `store`. A stored matrix whose shape does not match the variant is
    /// discarded.
    pub fn with_store(
        side: Side,
        variant: BoardVariant,
        seed: u64,
        mut store: Box<dyn PlacementStore>,
    ) -> Result<Self> {
        let expected = deploy_region_cells(variant);
        let matrix = match store.load()? {
            Some(matrix) if matrix.region_cells() == expected => matrix,
            Some(_) => {
                log::warn!("stored placement matrix does not fit {variant:?}, starting fresh");
                PlacementMatrix::new(expected)
            }
            None => PlacementMatrix::new(expected),
        };
        Ok(Self {
            side,
            variant,
            rng: SmallRng::seed_from_u64(seed),
            belief: initial_belief(side, variant),
            matrix,
            store: Some(store),
        })
    }

    /// Maps a placement-matrix cell index onto this side's deployment region.
    /// Matrix row 0 is the back row, farthest from the enemy.
    fn own_deploy_cell(&self, index: usize) -> Coord2 {
        let (play_rows, play_cols) = self.variant.play_size();
        let row = (index / play_cols as usize) as Coord;
        let col = (index % play_cols as usize) as Coord;
        let row = match self.side {
            Side::Blue => row,
            Side::Red => play_rows - 1 - row,
        };
        (row, col)
    }

    /// Inverse of [`Commodore::own_deploy_cell`] for the enemy's region, so
    /// both sides' placements land in one shared orientation.
    fn enemy_matrix_index(&self, at: Coord2) -> usize {
        let (play_rows, play_cols) = self.variant.play_size();
        let row = match self.side.other() {
            Side::Blue => at.0,
            Side::Red => play_rows - 1 - at.0,
        };
        row as usize * play_cols as usize + at.1 as usize
    }

    /// Ranks in placement order: the bulk ranks first (most copies first),
    /// the pieces worth hiding (Flag, Spy, Declarer) last, so the prioritized
    /// cells learned for them stay available.
    fn placement_order(&self) -> [Rank; Rank::COUNT] {
        let mut order = Rank::ALL;
        order.sort_unstable_by_key(|&rank| {
            let precious = matches!(rank, Rank::Flag | Rank::Spy | Rank::Declarer);
            (precious, Reverse(self.variant.rank_max(rank)), rank.value())
        });
        order
    }

    /// Errors when the belief board and the observed view disagree about
    /// which cells hold enemy pieces. That means a feedback call was lost.
    fn check_sync(&self, view: &PlayerView) -> Result<()> {
        let (rows, cols) = view.size();
        for row in 0..rows {
            for col in 0..cols {
                let enemy = view.state((row, col))? == ViewState::Enemy;
                let believed = self.belief[(row, col).to_nd_index()] != Belief::Empty;
                if enemy != believed {
                    return Err(GameError::BeliefDesync);
                }
            }
        }
        Ok(())
    }

    /// Whether an attack by `me` against a piece believed to be `them` is
    /// worth making. Optimistic for the declare-rank, which can always win by
    /// guessing right.
    fn would_win(me: Rank, them: Rank) -> bool {
        if me == Rank::Declarer {
            return true;
        }
        match them {
            Rank::Flag => true,
            Rank::Bomb => me == Rank::BombSquad,
            Rank::R10 => me == Rank::Spy,
            _ => them.value() < me.value(),
        }
    }

    /// Whether `at` or one of its orthogonal neighbors holds a known enemy
    /// rank that outguns `me`.
    fn threatened(&self, me: Rank, at: Coord2) -> bool {
        let bounds = self.belief.size();
        let cells = core::iter::once(at)
            .chain(DIRECTIONS.iter().filter_map(|&delta| apply_delta(at, delta, bounds)));
        for cell in cells {
            if let Belief::Known(rank) = self.belief[cell.to_nd_index()] {
                if rank.is_mobile() && rank.value() > me.value() {
                    return true;
                }
            }
        }
        false
    }

    /// Distance from `at` to the nearest known enemy piece `me` can beat.
    fn target_distance(&self, me: Rank, at: Coord2) -> Option<CellCount> {
        let (rows, cols) = self.belief.size();
        let mut nearest = None;
        for row in 0..rows {
            for col in 0..cols {
                if let Belief::Known(rank) = self.belief[(row, col).to_nd_index()] {
                    if Self::would_win(me, rank) {
                        let distance = manhattan(at, (row, col));
                        if nearest.is_none_or(|best| distance < best) {
                            nearest = Some(distance);
                        }
                    }
                }
            }
        }
        nearest
    }

    /// Whether the move closes in on a beatable known target without parking
    /// next to something stronger.
    fn advances(&self, me: Rank, mv: ViewMove) -> bool {
        let Some(from_distance) = self.target_distance(me, mv.from) else {
            return false;
        };
        let Some(to_distance) = self.target_distance(me, mv.to) else {
            return false;
        };
        to_distance < from_distance && !self.threatened(me, mv.to)
    }

    /// Ranks cheap enough to probe an unidentified piece with.
    fn expendable(me: Rank) -> bool {
        !matches!(me, Rank::Spy | Rank::Declarer | Rank::BombSquad) && me.value() < 8
    }

    fn toward_enemy(&self, mv: ViewMove) -> bool {
        match self.side {
            Side::Blue => mv.to.0 > mv.from.0,
            Side::Red => mv.to.0 < mv.from.0,
        }
    }

    fn guess_for(&mut self, target: Belief) -> Option<Rank> {
        match target {
            Belief::Empty => None,
            Belief::Known(rank) => Some(rank),
            Belief::UnknownImmobile => Some(Rank::Bomb),
            // Any mobile rank is a fair guess.
            Belief::UnknownMobile => Some(Rank::ALL[self.rng.random_range(0..11)]),
        }
    }

    fn own_rank(view: &PlayerView, at: Coord2) -> Result<Rank> {
        match view.piece(at)? {
            Some(ViewPiece::Known(rank)) => Ok(rank),
            _ => Err(GameError::Invariant("a move originates from an unowned cell")),
        }
    }
}

impl Opponent for Commodore {
    fn starting_positions(&mut self, mut view: PlayerView) -> Result<PlayerView> {
        for rank in self.placement_order() {
            let mut skips = SKIP_BUDGET;
            for _ in 0..view.remaining(rank) {
                let candidates = self.matrix.prioritized_cells(rank);
                let mut placed = false;
                for &index in &candidates {
                    let at = self.own_deploy_cell(index);
                    if view.state(at)? != ViewState::Open {
                        continue;
                    }
                    if skips > 0 && self.rng.random_bool(0.5) {
                        skips -= 1;
                        continue;
                    }
                    placed = view.place(at, rank)?;
                    if placed {
                        break;
                    }
                }
                if !placed {
                    // Every open cell lost the coin flip; take the best one.
                    log::warn!("placement of {rank:?} fell through to the retry pass");
                    for &index in &candidates {
                        let at = self.own_deploy_cell(index);
                        if view.state(at)? == ViewState::Open && view.place(at, rank)? {
                            placed = true;
                            break;
                        }
                    }
                }
                if !placed {
                    return Err(GameError::DeploymentUnfilled);
                }
            }
        }
        if view.is_filled() {
            Ok(view)
        } else {
            Err(GameError::DeploymentUnfilled)
        }
    }

    fn choose_move(&mut self, view: &PlayerView) -> Result<OpponentMove> {
        self.check_sync(view)?;

        let mut buckets: [Vec<ViewMove>; CATEGORIES] = Default::default();
        for mv in view.available_moves() {
            let me = Self::own_rank(view, mv.from)?;
            match self.belief[mv.to.to_nd_index()] {
                Belief::Known(them) if Self::would_win(me, them) => buckets[0].push(mv),
                Belief::Empty => {
                    let bucket = if self.threatened(me, mv.from) && !self.threatened(me, mv.to) {
                        1
                    } else if self.advances(me, mv) {
                        2
                    } else if self.toward_enemy(mv) {
                        4
                    } else if mv.to.0 != mv.from.0 {
                        5
                    } else {
                        6
                    };
                    buckets[bucket].push(mv);
                }
                Belief::UnknownMobile | Belief::UnknownImmobile if Self::expendable(me) => {
                    buckets[3].push(mv)
                }
                // Hopeless attacks are still moves of last resort.
                _ => buckets[6].push(mv),
            }
        }

        for (category, bucket) in buckets.iter().enumerate() {
            if bucket.is_empty() {
                continue;
            }
            let mv = bucket[self.rng.random_range(0..bucket.len())];
            let guess = self.guess_for(self.belief[mv.to.to_nd_index()]);
            log::debug!(
                "{} move {:?} -> {:?}, guess {guess:?}",
                CATEGORY_NAMES[category],
                mv.from,
                mv.to
            );
            return Ok(OpponentMove { from: mv.from, to: mv.to, guess });
        }
        Err(GameError::NoMoveFound)
    }

    fn observe_move(&mut self, from: Coord2, to: Coord2) -> Result<()> {
        if !self.belief.in_bounds(from) || !self.belief.in_bounds(to) {
            return Err(GameError::OutOfBounds);
        }
        let prior = self.belief[from.to_nd_index()];
        self.belief[from.to_nd_index()] = Belief::Empty;
        self.belief[to.to_nd_index()] = if manhattan(from, to) > 1 {
            // Only one rank covers more than one cell at a time.
            Belief::Known(Rank::Scout)
        } else {
            match prior {
                Belief::Known(rank) => Belief::Known(rank),
                _ => Belief::UnknownMobile,
            }
        };
        Ok(())
    }

    fn observe_battle(
        &mut self,
        attacker: Combatant,
        defender: Combatant,
        verdict: Verdict,
    ) -> Result<()> {
        if !self.belief.in_bounds(attacker.at) || !self.belief.in_bounds(defender.at) {
            return Err(GameError::OutOfBounds);
        }
        if attacker.owner == self.side {
            // Our attack: the defender's cell either empties out or keeps a
            // now-identified survivor.
            self.belief[defender.at.to_nd_index()] = match verdict {
                Verdict::DefenderWins => Belief::Known(defender.rank),
                Verdict::AttackerWins | Verdict::MutualLoss => Belief::Empty,
            };
        } else {
            if self.belief[attacker.at.to_nd_index()] == Belief::Empty {
                return Err(GameError::BeliefDesync);
            }
            self.belief[attacker.at.to_nd_index()] = Belief::Empty;
            if verdict == Verdict::AttackerWins {
                self.belief[defender.at.to_nd_index()] = Belief::Known(attacker.rank);
            }
        }
        Ok(())
    }

    fn observe_deployment(&mut self, view: &PlayerView) -> Result<()> {
        let enemy = self.side.other();
        let (first, last) = self.variant.deploy_row_span(enemy);
        let (origin_row, _) = self.variant.play_origin();
        let (_, play_cols) = self.variant.play_size();

        for row in (first - origin_row)..=(last - origin_row) {
            for col in 0..play_cols {
                if let Some(ViewPiece::Known(rank)) = view.piece((row, col))? {
                    self.matrix.record(rank, self.enemy_matrix_index((row, col)));
                }
            }
        }
        if let Some(store) = &mut self.store {
            store.save(&self.matrix)?;
        }
        Ok(())
    }
}

fn deploy_region_cells(variant: BoardVariant) -> usize {
    let (_, play_cols) = variant.play_size();
    mult(variant.deploy_rows(), play_cols) as usize
}

fn initial_belief(side: Side, variant: BoardVariant) -> Array2<Belief> {
    let (rows, cols) = variant.play_size();
    let enemy = side.other();
    let (first, last) = variant.deploy_row_span(enemy);
    let (origin_row, _) = variant.play_origin();
    let span = (first - origin_row, last - origin_row);

    Array2::from_shape_fn((rows as usize, cols as usize), |(row, _)| {
        let row = row as Coord;
        if row >= span.0 && row <= span.1 {
            Belief::UnknownImmobile
        } else {
            Belief::Empty
        }
    })
}
