use serde::{Deserialize, Serialize};

use crate::*;

/// Battle result from the attacker's point of view.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    AttackerWins,
    DefenderWins,
    /// Equal ranks: both pieces are removed.
    MutualLoss,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleResolution {
    pub verdict: Verdict,
    /// `Some(correct)` when the declare-rank guess decided the battle.
    pub guess_applied: Option<bool>,
}

impl BattleResolution {
    const fn plain(verdict: Verdict) -> Self {
        Self { verdict, guess_applied: None }
    }
}

/// Resolves a battle between two ranks.
///
/// The rules apply strictly in order; in particular an equal-rank tie, a Flag
/// or Bomb defender, and a Spy attacker are all settled before the
/// declare-rank guess is consulted, so a Declarer attacking the Flag wins no
/// matter what was guessed.
pub fn resolve(attacker: Rank, defender: Rank, guess: Option<Rank>) -> Result<BattleResolution> {
    debug_assert!(attacker.is_mobile());

    if attacker == defender {
        return Ok(BattleResolution::plain(Verdict::MutualLoss));
    }
    if defender == Rank::Flag {
        return Ok(BattleResolution::plain(Verdict::AttackerWins));
    }
    if defender == Rank::Bomb {
        let verdict = if attacker == Rank::BombSquad {
            Verdict::AttackerWins
        } else {
            Verdict::DefenderWins
        };
        return Ok(BattleResolution::plain(verdict));
    }
    if attacker == Rank::Spy {
        let verdict = if defender == Rank::R10 {
            Verdict::AttackerWins
        } else {
            Verdict::DefenderWins
        };
        return Ok(BattleResolution::plain(verdict));
    }
    if attacker == Rank::Declarer {
        let guess = guess.ok_or(GameError::MissingGuess)?;
        let correct = guess == defender;
        let verdict = if correct {
            Verdict::AttackerWins
        } else {
            Verdict::DefenderWins
        };
        return Ok(BattleResolution { verdict, guess_applied: Some(correct) });
    }

    let verdict = if attacker.value() > defender.value() {
        Verdict::AttackerWins
    } else {
        Verdict::DefenderWins
    };
    Ok(BattleResolution::plain(verdict))
}
