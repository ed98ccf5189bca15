use serde::{Deserialize, Serialize};

use crate::*;

/// A move chosen by an opponent, in play-region coordinates. `guess` is the
/// declared identity of the defender and is only meaningful when the moving
/// piece is the declare-rank and the destination is occupied.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpponentMove {
    pub from: Coord2,
    pub to: Coord2,
    pub guess: Option<Rank>,
}

/// One party of a resolved battle as reported to the opponent: where it
/// stood, its true rank, and whose piece it was.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combatant {
    pub at: Coord2,
    pub rank: Rank,
    pub owner: Side,
}

/// Decision contract for the non-human side.
///
/// The engine calls these at exactly two suspension points (initial
/// deployment, each opponent turn) plus the observation feedbacks. All
/// coordinates are play-region local; the engine translates to and from
/// absolute board coordinates at this boundary. Any error returned here is a
/// fatal contract violation that aborts the match.
pub trait Opponent {
    /// Fills the deployment view with this side's starting positions. Every
    /// rank must be fully placed in the returned view.
    fn starting_positions(&mut self, view: PlayerView) -> Result<PlayerView>;

    /// Picks a move from a fog-of-war view. The engine only calls this when
    /// at least one legal move exists.
    fn choose_move(&mut self, view: &PlayerView) -> Result<OpponentMove>;

    /// Reports an observed move by the human side. Never called for this
    /// opponent's own moves.
    fn observe_move(&mut self, from: Coord2, to: Coord2) -> Result<()>;

    /// Reports a resolved battle, whichever side initiated it.
    fn observe_battle(
        &mut self,
        attacker: Combatant,
        defender: Combatant,
        verdict: Verdict,
    ) -> Result<()>;

    /// Offers the completed human deployment, unobfuscated, for cross-game
    /// learning. Opponents that do not learn can ignore it.
    fn observe_deployment(&mut self, _view: &PlayerView) -> Result<()> {
        Ok(())
    }
}
