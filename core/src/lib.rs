//! Flotilla game engine: a two-player hidden-information board game played
//! against a built-in heuristic opponent.
//!
//! The engine is click-driven: [`Game::select`] feeds one cell click into the
//! state machine, which pumps itself through move application, battles, and
//! whole opponent turns before suspending for the next click. Everything that
//! changed is reported through [`GameEvent`]s.
//!
//! The opponent sits behind the [`Opponent`] trait and only ever sees
//! fog-of-war [`PlayerView`] projections in play-region coordinates; the
//! shipped [`Commodore`] implementation keeps a belief board and learns enemy
//! placement habits across games through a [`PlacementStore`].

pub use ai::*;
pub use battle::*;
pub use board::*;
pub use engine::*;
pub use error::*;
pub use geometry::*;
pub use moves::*;
pub use opponent::*;
pub use piece::*;
pub use stats::*;
pub use types::*;
pub use view::*;

mod ai;
mod battle;
mod board;
mod engine;
mod error;
mod geometry;
mod moves;
mod opponent;
mod piece;
mod stats;
mod types;
mod view;
