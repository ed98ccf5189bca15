use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::sync::{Mutex, MutexGuard};

use crate::*;

/// Coarse lifecycle phase, derived from the fine-grained state.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    Initializing,
    InProgress,
    Over,
}

/// Fine-grained engine state. Clicks are only consumed in `Placing`,
/// `PlayerPlay`, `PickOpponent`, and `GameOver`; every other state is either
/// transient or resolved by the opponent callback.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameState {
    /// The human is placing their pieces.
    Placing,
    /// The opponent is asked for its starting positions.
    AwaitOpponentSetup,
    /// Win/stalemate check before the first turn.
    StartCheck,
    PlayerPlay,
    OpponentPlay,
    /// A validated move is being applied.
    MovePiece,
    /// A battle is being resolved.
    Battle,
    /// The human must pick a guess for a declare-rank attack.
    PickOpponent,
    /// Win/stalemate check after each turn.
    EndTurn,
    GameOver,
}

/// User-facing notification kinds. Each arrives with the cell snapshots it
/// concerns, which may be empty for global notices.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotifyReason {
    InvalidCellSelected,
    AllPiecesAreInPlay,
    PlayerPiecesSet,
    StaleMate,
    PlayerWins,
    OpponentWins,
    InvalidMove,
    CorrectlyGuessedPiece,
    IncorrectlyGuessedPiece,
    PickOpponent,
    GameOver,
    PieceMove,
    BattleLost,
    BattleWon,
    BattleTied,
    ChooseOpponent,
    PiecePlaced,
    YourTurn,
    TheirTurn,
}

/// Engine output, drained through [`Game::take_events`]. `CellUpdated` means
/// redraw that cell; `Notify` carries a game-level announcement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEvent {
    CellUpdated(CellSnapshot),
    Notify {
        reason: NotifyReason,
        cells: SmallVec<[CellSnapshot; 2]>,
    },
}

/// Whether the state machine may change from `from` to `to`. `Placing` is the
/// entry state and is never re-entered.
const fn transition_allowed(from: GameState, to: GameState) -> bool {
    use GameState::*;
    matches!(
        (from, to),
        (Placing, AwaitOpponentSetup)
            | (AwaitOpponentSetup, StartCheck)
            | (StartCheck, PlayerPlay)
            | (StartCheck, GameOver)
            | (EndTurn, PlayerPlay)
            | (EndTurn, OpponentPlay)
            | (EndTurn, GameOver)
            | (PlayerPlay, MovePiece)
            | (PlayerPlay, Battle)
            | (OpponentPlay, MovePiece)
            | (OpponentPlay, Battle)
            | (Battle, PickOpponent)
            | (Battle, EndTurn)
            | (PickOpponent, Battle)
            | (MovePiece, EndTurn)
    )
}

/// What the trampoline does after a handler returns.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Flow {
    /// Suspend and wait for the next click.
    Wait,
    /// Keep pumping the state machine.
    Continue,
}

/// A full match: the board, the state machine, the click registers, and the
/// opponent behind its trait object.
///
/// The engine is driven entirely by [`Game::select`]. A click runs the state
/// machine until it needs the next click, which may span whole opponent turns;
/// everything that happened is reported through [`Game::take_events`].
pub struct Game {
    board: Board,
    state: GameState,
    current: Option<Side>,
    human: Side,
    /// Selected cell: the tray rank while placing, the piece while playing,
    /// and the guess tray cell while battling.
    selected: Option<Coord2>,
    attacking: Option<Coord2>,
    target: Option<Coord2>,
    opponent: Box<dyn Opponent>,
    events: Vec<GameEvent>,
}

impl Game {
    pub fn new(variant: BoardVariant, opponent: Box<dyn Opponent>) -> Self {
        Self {
            board: Board::new(variant),
            state: GameState::Placing,
            current: None,
            human: Side::Red,
            selected: None,
            attacking: None,
            target: None,
            opponent,
            events: Vec::new(),
        }
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn phase(&self) -> GamePhase {
        match self.state {
            GameState::Placing | GameState::AwaitOpponentSetup => GamePhase::Initializing,
            GameState::GameOver => GamePhase::Over,
            _ => GamePhase::InProgress,
        }
    }

    pub fn current_player(&self) -> Option<Side> {
        self.current
    }

    pub fn variant(&self) -> BoardVariant {
        self.board.variant()
    }

    pub fn cell(&self, at: Coord2) -> Result<CellSnapshot> {
        self.board.snapshot(at)
    }

    pub fn piece_count(&self, side: Side, rank: Rank) -> PieceCount {
        self.board.piece_count(side, rank)
    }

    /// Drains the events accumulated since the last call.
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        core::mem::take(&mut self.events)
    }

    /// Feeds one click into the state machine. Clicks outside the grid, and
    /// clicks while no input is expected, are silently ignored.
    pub fn select(&mut self, at: Coord2) -> Result<()> {
        let accepts_clicks = matches!(
            self.state,
            GameState::Placing
                | GameState::PlayerPlay
                | GameState::PickOpponent
                | GameState::GameOver
        );
        if !accepts_clicks || self.board.validate_coords(at).is_err() {
            return Ok(());
        }
        self.run(Some(at))
    }

    fn run(&mut self, mut click: Option<Coord2>) -> Result<()> {
        loop {
            let flow = match self.state {
                GameState::Placing => self.handle_placing(click.take())?,
                GameState::AwaitOpponentSetup => self.handle_opponent_setup()?,
                GameState::StartCheck | GameState::EndTurn => self.handle_turn_check()?,
                GameState::PlayerPlay => self.handle_player_play(click.take())?,
                GameState::OpponentPlay => self.handle_opponent_play()?,
                GameState::MovePiece => self.handle_move()?,
                GameState::Battle => self.handle_battle()?,
                GameState::PickOpponent => self.handle_pick_opponent(click.take())?,
                GameState::GameOver => self.handle_game_over(),
            };
            if flow == Flow::Wait {
                return Ok(());
            }
        }
    }

    fn set_state(&mut self, to: GameState) -> Result<()> {
        if !transition_allowed(self.state, to) {
            return Err(GameError::InvalidTransition { from: self.state, to });
        }
        log::debug!("state {:?} -> {to:?}", self.state);
        self.state = to;
        Ok(())
    }

    fn emit_cell(&mut self, at: Coord2) -> Result<()> {
        let snapshot = self.board.snapshot(at)?;
        self.events.push(GameEvent::CellUpdated(snapshot));
        Ok(())
    }

    fn emit_touched(&mut self, touched: Touched) -> Result<()> {
        self.emit_cell(touched.0)?;
        if let Some(tray) = touched.1 {
            self.emit_cell(tray)?;
        }
        Ok(())
    }

    fn notify(&mut self, reason: NotifyReason, cells: &[Coord2]) -> Result<()> {
        let mut snapshots = SmallVec::new();
        for &at in cells {
            snapshots.push(self.board.snapshot(at)?);
        }
        self.events.push(GameEvent::Notify { reason, cells: snapshots });
        Ok(())
    }

    fn clear_highlights(&mut self) -> Result<()> {
        for at in self.board.unhighlight_all() {
            self.emit_cell(at)?;
        }
        Ok(())
    }

    fn handle_placing(&mut self, click: Option<Coord2>) -> Result<Flow> {
        let Some(at) = click else {
            return Ok(Flow::Wait);
        };
        let human = self.human;
        let cell = *self.board.cell(at)?;

        match cell.kind {
            CellKind::Tray(side) if side == human => {
                let rank = cell
                    .piece
                    .map(|piece| piece.rank)
                    .ok_or(GameError::Invariant("tray cell lost its rank marker"))?;
                if self.board.piece_count(human, rank).remaining() == 0 {
                    self.notify(NotifyReason::AllPiecesAreInPlay, &[at])?;
                    return Ok(Flow::Wait);
                }
                self.clear_highlights()?;
                self.selected = Some(at);
                let lit = self.board.set_highlight(at, true)?;
                self.emit_cell(lit)?;
            }
            CellKind::Playable if self.board.variant().in_deploy_region(human, at) => {
                let Some(tray) = self.selected else {
                    self.notify(NotifyReason::InvalidCellSelected, &[at])?;
                    return Ok(Flow::Wait);
                };
                let rank = self.board[tray]
                    .piece
                    .map(|piece| piece.rank)
                    .ok_or(GameError::Invariant("tray cell lost its rank marker"))?;

                if !self.board[at].is_empty() {
                    let (_, touched) = self.board.remove_piece(at)?;
                    self.emit_touched(touched)?;
                }
                let touched = self.board.add_piece(rank, human, at)?;
                self.emit_touched(touched)?;
                self.notify(NotifyReason::PiecePlaced, &[at])?;

                if self.board.remaining(human) == 0 {
                    self.clear_highlights()?;
                    self.selected = None;
                    self.notify(NotifyReason::PlayerPiecesSet, &[])?;
                    self.set_state(GameState::AwaitOpponentSetup)?;
                    return Ok(Flow::Continue);
                }
                if self.board.piece_count(human, rank).remaining() == 0 {
                    self.clear_highlights()?;
                    self.selected = None;
                }
            }
            _ => self.notify(NotifyReason::InvalidCellSelected, &[at])?,
        }
        Ok(Flow::Wait)
    }

    /// Feeds the finished human deployment to the opponent for learning, asks
    /// it for its own starting positions, and applies them to the board.
    fn handle_opponent_setup(&mut self) -> Result<Flow> {
        let ai = self.human.other();
        let neutral = PlayerView::project(&self.board, None, false)?;
        self.opponent.observe_deployment(&neutral)?;

        let view = PlayerView::project(&self.board, Some(ai), true)?;
        let filled = self.opponent.starting_positions(view)?;
        if !filled.is_filled() {
            return Err(GameError::DeploymentUnfilled);
        }

        let variant = self.board.variant();
        let (first, last) = variant.deploy_row_span(ai);
        let (origin_row, _) = variant.play_origin();
        let (_, play_cols) = variant.play_size();
        for row in (first - origin_row)..=(last - origin_row) {
            for col in 0..play_cols {
                let Some(ViewPiece::Known(rank)) = filled.piece((row, col))? else {
                    return Err(GameError::DeploymentUnfilled);
                };
                let touched = self.board.add_piece(rank, ai, variant.to_grid((row, col)))?;
                self.emit_touched(touched)?;
            }
        }
        self.set_state(GameState::StartCheck)?;
        Ok(Flow::Continue)
    }

    /// Shared win/stalemate check, run before the first turn and after every
    /// turn. Decides who plays next when the game goes on.
    fn handle_turn_check(&mut self) -> Result<Flow> {
        self.selected = None;
        self.attacking = None;
        self.target = None;
        self.clear_highlights()?;

        let human = self.human;
        let ai = human.other();
        let human_movable = count_movable(&self.board, human);
        let ai_movable = count_movable(&self.board, ai);

        if human_movable == 0 && ai_movable == 0 {
            self.notify(NotifyReason::StaleMate, &[])?;
            self.set_state(GameState::GameOver)?;
            return Ok(Flow::Continue);
        }
        if ai_movable == 0 || count_rank(&self.board, ai, Rank::Flag) == 0 {
            self.notify(NotifyReason::PlayerWins, &[])?;
            self.set_state(GameState::GameOver)?;
            return Ok(Flow::Continue);
        }
        if human_movable == 0 || count_rank(&self.board, human, Rank::Flag) == 0 {
            self.notify(NotifyReason::OpponentWins, &[])?;
            self.set_state(GameState::GameOver)?;
            return Ok(Flow::Continue);
        }

        let next = match self.current {
            None => human,
            Some(side) => side.other(),
        };
        self.current = Some(next);
        if next == human {
            self.notify(NotifyReason::YourTurn, &[])?;
            self.set_state(GameState::PlayerPlay)?;
            Ok(Flow::Wait)
        } else {
            self.notify(NotifyReason::TheirTurn, &[])?;
            self.set_state(GameState::OpponentPlay)?;
            Ok(Flow::Continue)
        }
    }

    fn handle_player_play(&mut self, click: Option<Coord2>) -> Result<Flow> {
        let Some(at) = click else {
            return Ok(Flow::Wait);
        };
        let human = self.human;
        let cell = *self.board.cell(at)?;

        let own_mobile = cell.kind.is_playable()
            && cell
                .piece
                .is_some_and(|piece| piece.owner == human && piece.rank.is_mobile());
        if own_mobile {
            let moves = legal_moves(&self.board, at)?;
            if moves.is_empty() {
                self.notify(NotifyReason::InvalidCellSelected, &[at])?;
                return Ok(Flow::Wait);
            }
            self.clear_highlights()?;
            self.selected = Some(at);
            for to in moves {
                let lit = self.board.set_highlight(to, true)?;
                self.emit_cell(lit)?;
            }
            return Ok(Flow::Wait);
        }

        if cell.highlighted {
            let from = self
                .selected
                .ok_or(GameError::Invariant("destination clicked without a selection"))?;
            self.clear_highlights()?;
            if cell.piece.is_some() {
                self.attacking = Some(from);
                self.target = Some(at);
                self.selected = None;
                self.set_state(GameState::Battle)?;
            } else {
                self.target = Some(at);
                self.set_state(GameState::MovePiece)?;
            }
            return Ok(Flow::Continue);
        }

        match self.selected {
            Some(from) => self.notify(NotifyReason::InvalidMove, &[from, at])?,
            None => self.notify(NotifyReason::InvalidCellSelected, &[at])?,
        }
        Ok(Flow::Wait)
    }

    /// Asks the opponent for its move and validates it against the board
    /// before handing it to the move or battle handler.
    fn handle_opponent_play(&mut self) -> Result<Flow> {
        let ai = self.human.other();
        let view = PlayerView::project(&self.board, Some(ai), false)?;
        let mv = self.opponent.choose_move(&view)?;

        let variant = self.board.variant();
        let (play_rows, play_cols) = variant.play_size();
        let in_play = |at: Coord2| at.0 < play_rows && at.1 < play_cols;
        if !in_play(mv.from) || !in_play(mv.to) {
            return Err(GameError::IllegalOpponentMove);
        }
        let from = variant.to_grid(mv.from);
        let to = variant.to_grid(mv.to);
        if !self.board[from].piece.is_some_and(|piece| piece.owner == ai)
            || !legal_moves(&self.board, from)?.contains(&to)
        {
            return Err(GameError::IllegalOpponentMove);
        }

        if self.board[to].is_empty() {
            self.selected = Some(from);
            self.target = Some(to);
            self.set_state(GameState::MovePiece)?;
        } else {
            self.attacking = Some(from);
            self.target = Some(to);
            self.selected = mv.guess.and_then(|rank| self.board.tray_cell(ai, rank));
            self.set_state(GameState::Battle)?;
        }
        Ok(Flow::Continue)
    }

    fn handle_move(&mut self) -> Result<Flow> {
        let from = self
            .selected
            .take()
            .ok_or(GameError::Invariant("move without a source"))?;
        let to = self
            .target
            .take()
            .ok_or(GameError::Invariant("move without a destination"))?;
        let mover = self.board.cell(from)?.piece.ok_or(GameError::EmptyPiece)?;
        if Some(mover.owner) != self.current {
            return Err(GameError::Invariant("moved a piece of the side not on turn"));
        }

        // Human moves are reported to the opponent; its own are not.
        if self.current == Some(self.human) {
            let variant = self.board.variant();
            let play_from = variant
                .to_play(from)
                .ok_or(GameError::Invariant("move source outside the play region"))?;
            let play_to = variant
                .to_play(to)
                .ok_or(GameError::Invariant("move destination outside the play region"))?;
            self.opponent.observe_move(play_from, play_to)?;
        }

        self.notify(NotifyReason::PieceMove, &[from, to])?;
        let (piece, touched) = self.board.remove_piece(from)?;
        self.emit_touched(touched)?;
        let touched = self.board.add_piece(piece.rank, piece.owner, to)?;
        self.emit_touched(touched)?;

        self.set_state(GameState::EndTurn)?;
        Ok(Flow::Continue)
    }

    fn handle_battle(&mut self) -> Result<Flow> {
        let attacker_at = self
            .attacking
            .ok_or(GameError::Invariant("battle without an attacker"))?;
        let defender_at = self
            .target
            .ok_or(GameError::Invariant("battle without a defender"))?;
        let attacker = self.board[attacker_at].piece.ok_or(GameError::EmptyPiece)?;
        let defender = self.board[defender_at].piece.ok_or(GameError::EmptyPiece)?;
        let guess = self
            .selected
            .and_then(|at| self.board[at].piece)
            .map(|piece| piece.rank);

        // A declare-rank attack suspends for the human to pick a guess. The
        // opponent must have supplied one with its move.
        if attacker.rank == Rank::Declarer && guess.is_none() {
            if self.current == Some(self.human) {
                self.notify(NotifyReason::PickOpponent, &[attacker_at, defender_at])?;
                self.set_state(GameState::PickOpponent)?;
                return Ok(Flow::Wait);
            }
            return Err(GameError::MissingGuess);
        }

        let resolution = resolve(attacker.rank, defender.rank, guess)?;
        if let Some(correct) = resolution.guess_applied {
            let reason = if correct {
                NotifyReason::CorrectlyGuessedPiece
            } else {
                NotifyReason::IncorrectlyGuessedPiece
            };
            self.notify(reason, &[defender_at])?;
        }

        let reason = match resolution.verdict {
            Verdict::AttackerWins => NotifyReason::BattleWon,
            Verdict::DefenderWins => NotifyReason::BattleLost,
            Verdict::MutualLoss => NotifyReason::BattleTied,
        };
        // Snapshots are taken before the pieces come off the board.
        self.notify(reason, &[attacker_at, defender_at])?;

        let variant = self.board.variant();
        let combatant = |piece: Piece, at: Coord2| -> Result<Combatant> {
            Ok(Combatant {
                at: variant
                    .to_play(at)
                    .ok_or(GameError::Invariant("combatant outside the play region"))?,
                rank: piece.rank,
                owner: piece.owner,
            })
        };
        self.opponent.observe_battle(
            combatant(attacker, attacker_at)?,
            combatant(defender, defender_at)?,
            resolution.verdict,
        )?;

        let (_, touched) = self.board.remove_piece(attacker_at)?;
        self.emit_touched(touched)?;
        if resolution.verdict != Verdict::DefenderWins {
            let (_, touched) = self.board.remove_piece(defender_at)?;
            self.emit_touched(touched)?;
        }
        if resolution.verdict == Verdict::AttackerWins {
            let touched = self.board.add_piece(attacker.rank, attacker.owner, defender_at)?;
            self.emit_touched(touched)?;
        }

        self.attacking = None;
        self.target = None;
        self.selected = None;
        self.set_state(GameState::EndTurn)?;
        Ok(Flow::Continue)
    }

    /// The human picks their declare-rank guess by clicking the opponent's
    /// tray cell carrying that rank.
    fn handle_pick_opponent(&mut self, click: Option<Coord2>) -> Result<Flow> {
        let Some(at) = click else {
            return Ok(Flow::Wait);
        };
        let ai = self.human.other();
        if self.board[at].kind != CellKind::Tray(ai) {
            self.notify(NotifyReason::InvalidCellSelected, &[at])?;
            return Ok(Flow::Wait);
        }
        self.selected = Some(at);
        self.notify(NotifyReason::ChooseOpponent, &[at])?;
        self.set_state(GameState::Battle)?;
        Ok(Flow::Continue)
    }

    fn handle_game_over(&mut self) -> Flow {
        self.events.push(GameEvent::Notify {
            reason: NotifyReason::GameOver,
            cells: SmallVec::new(),
        });
        Flow::Wait
    }
}

/// [`Game`] behind a mutex, for callers that drive the engine from UI
/// callbacks. A poisoned lock is recovered; the engine has no invariants that
/// survive a panic only halfway.
pub struct SharedGame {
    inner: Mutex<Game>,
}

impl SharedGame {
    pub fn new(game: Game) -> Self {
        Self { inner: Mutex::new(game) }
    }

    fn lock(&self) -> MutexGuard<'_, Game> {
        self.inner.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    pub fn select(&self, at: Coord2) -> Result<()> {
        self.lock().select(at)
    }

    pub fn take_events(&self) -> Vec<GameEvent> {
        self.lock().take_events()
    }

    pub fn state(&self) -> GameState {
        self.lock().state()
    }

    pub fn phase(&self) -> GamePhase {
        self.lock().phase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARIANT: BoardVariant = BoardVariant::Compact;

    const ALL_STATES: [GameState; 10] = [
        GameState::Placing,
        GameState::AwaitOpponentSetup,
        GameState::StartCheck,
        GameState::PlayerPlay,
        GameState::OpponentPlay,
        GameState::MovePiece,
        GameState::Battle,
        GameState::PickOpponent,
        GameState::EndTurn,
        GameState::GameOver,
    ];

    /// Test double that deploys a fixed layout and replays scripted moves.
    struct Scripted {
        placements: Vec<(Coord2, Rank)>,
        moves: Vec<OpponentMove>,
    }

    impl Scripted {
        fn new(moves: Vec<OpponentMove>) -> Self {
            Self { placements: blue_layout(), moves }
        }
    }

    impl Opponent for Scripted {
        fn starting_positions(&mut self, mut view: PlayerView) -> Result<PlayerView> {
            for &(at, rank) in &self.placements {
                assert!(view.place(at, rank)?, "scripted placement rejected at {at:?}");
            }
            Ok(view)
        }

        fn choose_move(&mut self, _view: &PlayerView) -> Result<OpponentMove> {
            assert!(!self.moves.is_empty(), "script ran out of moves");
            Ok(self.moves.remove(0))
        }

        fn observe_move(&mut self, _from: Coord2, _to: Coord2) -> Result<()> {
            Ok(())
        }

        fn observe_battle(
            &mut self,
            _attacker: Combatant,
            _defender: Combatant,
            _verdict: Verdict,
        ) -> Result<()> {
            Ok(())
        }
    }

    /// Blue's scripted Compact deployment, in play-region coordinates.
    fn blue_layout() -> Vec<(Coord2, Rank)> {
        vec![
            ((0, 0), Rank::Bomb),
            ((0, 1), Rank::Bomb),
            ((0, 2), Rank::Spy),
            ((0, 3), Rank::Declarer),
            ((0, 4), Rank::Scout),
            ((0, 5), Rank::BombSquad),
            ((0, 6), Rank::R10),
            ((0, 7), Rank::Flag),
            ((1, 0), Rank::BombSquad),
            ((1, 1), Rank::R4),
            ((1, 2), Rank::R5),
            ((1, 3), Rank::R6),
            ((1, 4), Rank::R7),
            ((1, 5), Rank::R8),
            ((1, 6), Rank::R9),
            ((1, 7), Rank::Scout),
        ]
    }

    /// Red's Compact deployment, in grid coordinates.
    fn red_layout() -> Vec<(Coord2, Rank)> {
        vec![
            ((4, 1), Rank::Scout),
            ((4, 2), Rank::Declarer),
            ((4, 3), Rank::Spy),
            ((4, 4), Rank::BombSquad),
            ((4, 5), Rank::R4),
            ((4, 6), Rank::R5),
            ((4, 7), Rank::R6),
            ((4, 8), Rank::R7),
            ((5, 1), Rank::Scout),
            ((5, 2), Rank::BombSquad),
            ((5, 3), Rank::R8),
            ((5, 4), Rank::R9),
            ((5, 5), Rank::R10),
            ((5, 6), Rank::Bomb),
            ((5, 7), Rank::Bomb),
            ((5, 8), Rank::Flag),
        ]
    }

    fn shuffle(from: Coord2, to: Coord2) -> OpponentMove {
        OpponentMove { from, to, guess: None }
    }

    /// Builds a game and clicks the whole Red deployment through, ending in
    /// `PlayerPlay` with both sides on the board.
    fn started_game(moves: Vec<OpponentMove>) -> Game {
        let mut game = Game::new(VARIANT, Box::new(Scripted::new(moves)));
        for (at, rank) in red_layout() {
            let tray = game.board.tray_cell(Side::Red, rank).unwrap();
            game.select(tray).unwrap();
            game.select(at).unwrap();
        }
        assert_eq!(game.state(), GameState::PlayerPlay);
        assert_eq!(game.current_player(), Some(Side::Red));
        game
    }

    fn reasons(events: &[GameEvent]) -> Vec<NotifyReason> {
        events
            .iter()
            .filter_map(|event| match event {
                GameEvent::Notify { reason, .. } => Some(*reason),
                GameEvent::CellUpdated(_) => None,
            })
            .collect()
    }

    #[test]
    fn transition_table_is_exactly_the_documented_one() {
        use GameState::*;
        let allowed = [
            (Placing, AwaitOpponentSetup),
            (AwaitOpponentSetup, StartCheck),
            (StartCheck, PlayerPlay),
            (StartCheck, GameOver),
            (EndTurn, PlayerPlay),
            (EndTurn, OpponentPlay),
            (EndTurn, GameOver),
            (PlayerPlay, MovePiece),
            (PlayerPlay, Battle),
            (OpponentPlay, MovePiece),
            (OpponentPlay, Battle),
            (Battle, PickOpponent),
            (Battle, EndTurn),
            (PickOpponent, Battle),
            (MovePiece, EndTurn),
        ];
        for from in ALL_STATES {
            for to in ALL_STATES {
                let expected = allowed.contains(&(from, to));
                assert_eq!(transition_allowed(from, to), expected, "{from:?} -> {to:?}");
            }
        }
    }

    #[test]
    fn placement_flow_reports_and_places() {
        let mut game = Game::new(VARIANT, Box::new(Scripted::new(Vec::new())));
        let flag_tray = game.board.tray_cell(Side::Red, Rank::Flag).unwrap();

        // Clicking outside the deployment region is rejected.
        game.select(flag_tray).unwrap();
        game.take_events();
        game.select((3, 1)).unwrap();
        assert_eq!(reasons(&game.take_events()), vec![NotifyReason::InvalidCellSelected]);

        game.select((4, 1)).unwrap();
        assert!(reasons(&game.take_events()).contains(&NotifyReason::PiecePlaced));
        assert_eq!(game.cell((4, 1)).unwrap().piece.unwrap().rank, Rank::Flag);

        // The only Flag is now in play.
        game.select(flag_tray).unwrap();
        assert_eq!(reasons(&game.take_events()), vec![NotifyReason::AllPiecesAreInPlay]);
    }

    #[test]
    fn replacing_a_placed_piece_returns_it_to_the_tray() {
        let mut game = Game::new(VARIANT, Box::new(Scripted::new(Vec::new())));
        let spy_tray = game.board.tray_cell(Side::Red, Rank::Spy).unwrap();
        let bomb_tray = game.board.tray_cell(Side::Red, Rank::Bomb).unwrap();

        game.select(spy_tray).unwrap();
        game.select((4, 1)).unwrap();
        game.select(bomb_tray).unwrap();
        game.select((4, 1)).unwrap();

        assert_eq!(game.cell((4, 1)).unwrap().piece.unwrap().rank, Rank::Bomb);
        assert_eq!(game.piece_count(Side::Red, Rank::Spy).in_play, 0);
        assert_eq!(game.piece_count(Side::Red, Rank::Bomb).in_play, 1);
    }

    #[test]
    fn out_of_grid_clicks_are_ignored() {
        let mut game = Game::new(VARIANT, Box::new(Scripted::new(Vec::new())));
        game.select((200, 200)).unwrap();
        assert!(game.take_events().is_empty());
        assert_eq!(game.state(), GameState::Placing);
    }

    #[test]
    fn finishing_the_deployment_starts_the_match() {
        let mut game = started_game(Vec::new());
        let events = game.take_events();
        let reasons = reasons(&events);

        assert!(reasons.contains(&NotifyReason::PlayerPiecesSet));
        assert!(reasons.contains(&NotifyReason::YourTurn));
        assert_eq!(game.phase(), GamePhase::InProgress);
        // Blue's scripted layout is on the board, ranks hidden only in views.
        assert_eq!(game.cell((0, 8)).unwrap().piece.unwrap().rank, Rank::Flag);
        assert_eq!(game.cell((1, 1)).unwrap().piece.unwrap().owner, Side::Blue);
    }

    #[test]
    fn a_plain_move_round_trips_through_the_opponent_turn() {
        let mut game = started_game(vec![
            shuffle((1, 6), (2, 6)),
        ]);
        game.take_events();

        // Scout runs two cells up an empty column.
        game.select((4, 1)).unwrap();
        game.select((2, 1)).unwrap();
        let reasons = reasons(&game.take_events());

        assert_eq!(game.cell((2, 1)).unwrap().piece.unwrap().rank, Rank::Scout);
        assert!(game.cell((4, 1)).unwrap().piece.is_none());
        // Blue's R9 shuffled from grid (1, 7) to (2, 7) in the same pump.
        assert_eq!(game.cell((2, 7)).unwrap().piece.unwrap().rank, Rank::R9);
        assert_eq!(
            reasons,
            vec![
                NotifyReason::PieceMove,
                NotifyReason::TheirTurn,
                NotifyReason::PieceMove,
                NotifyReason::YourTurn,
            ]
        );
        assert_eq!(game.state(), GameState::PlayerPlay);
    }

    #[test]
    fn clicking_an_unhighlighted_cell_is_an_invalid_move() {
        let mut game = started_game(Vec::new());
        game.take_events();

        game.select((4, 1)).unwrap();
        game.take_events();
        // A diagonal cell is never highlighted.
        game.select((3, 2)).unwrap();
        assert_eq!(reasons(&game.take_events()), vec![NotifyReason::InvalidMove]);
        assert_eq!(game.state(), GameState::PlayerPlay);
    }

    #[test]
    fn a_losing_attack_removes_only_the_attacker() {
        let mut game = started_game(vec![
            shuffle((1, 6), (2, 6)),
            shuffle((2, 6), (1, 6)),
        ]);

        game.select((4, 1)).unwrap();
        game.select((2, 1)).unwrap();
        game.take_events();

        // Scout attacks the BombSquad at grid (1, 1) and loses.
        game.select((2, 1)).unwrap();
        game.select((1, 1)).unwrap();
        let reasons = reasons(&game.take_events());

        assert!(reasons.contains(&NotifyReason::BattleLost));
        assert!(game.cell((2, 1)).unwrap().piece.is_none());
        assert_eq!(game.cell((1, 1)).unwrap().piece.unwrap().rank, Rank::BombSquad);
        assert_eq!(game.piece_count(Side::Red, Rank::Scout).in_play, 1);
    }

    #[test]
    fn a_declarer_attack_walks_through_the_guess_flow() {
        let mut game = started_game(vec![
            shuffle((1, 6), (2, 6)),
            shuffle((2, 6), (1, 6)),
            shuffle((1, 6), (2, 6)),
        ]);

        // Walk the Declarer up to grid (2, 2), one step per turn.
        game.select((4, 2)).unwrap();
        game.select((3, 2)).unwrap();
        game.select((3, 2)).unwrap();
        game.select((2, 2)).unwrap();
        game.take_events();

        // Attack the R4 at grid (1, 2): the engine suspends for a guess.
        game.select((2, 2)).unwrap();
        game.select((1, 2)).unwrap();
        assert_eq!(game.state(), GameState::PickOpponent);
        assert!(reasons(&game.take_events()).contains(&NotifyReason::PickOpponent));

        // Only the opponent's tray accepts the guess click.
        game.select((4, 1)).unwrap();
        assert_eq!(reasons(&game.take_events()), vec![NotifyReason::InvalidCellSelected]);
        assert_eq!(game.state(), GameState::PickOpponent);

        // Guess R4 via Blue's tray: correct, so the Declarer takes the cell.
        let r4_tray = game.board.tray_cell(Side::Blue, Rank::R4).unwrap();
        game.select(r4_tray).unwrap();
        let reasons = reasons(&game.take_events());

        assert!(reasons.contains(&NotifyReason::ChooseOpponent));
        assert!(reasons.contains(&NotifyReason::CorrectlyGuessedPiece));
        assert!(reasons.contains(&NotifyReason::BattleWon));
        assert_eq!(game.cell((1, 2)).unwrap().piece.unwrap().rank, Rank::Declarer);
    }

    #[test]
    fn a_wrong_guess_loses_the_declarer() {
        let mut game = started_game(vec![
            shuffle((1, 6), (2, 6)),
            shuffle((2, 6), (1, 6)),
            shuffle((1, 6), (2, 6)),
        ]);

        game.select((4, 2)).unwrap();
        game.select((3, 2)).unwrap();
        game.select((3, 2)).unwrap();
        game.select((2, 2)).unwrap();
        game.select((2, 2)).unwrap();
        game.select((1, 2)).unwrap();
        game.take_events();

        let bomb_tray = game.board.tray_cell(Side::Blue, Rank::Bomb).unwrap();
        game.select(bomb_tray).unwrap();
        let reasons = reasons(&game.take_events());

        assert!(reasons.contains(&NotifyReason::IncorrectlyGuessedPiece));
        assert!(reasons.contains(&NotifyReason::BattleLost));
        assert!(game.cell((2, 2)).unwrap().piece.is_none());
        assert_eq!(game.cell((1, 2)).unwrap().piece.unwrap().rank, Rank::R4);
    }

    #[test]
    fn capturing_the_flag_wins_the_game() {
        let mut game = started_game(vec![
            // Blue walks its Scout out of the flag column, then shuffles.
            shuffle((1, 7), (3, 7)),
            shuffle((1, 6), (2, 6)),
            shuffle((2, 6), (1, 6)),
            shuffle((1, 6), (2, 6)),
        ]);

        game.select((4, 1)).unwrap();
        game.select((3, 1)).unwrap();

        // R7 takes the Blue Scout now standing at grid (3, 8).
        game.select((4, 8)).unwrap();
        game.select((3, 8)).unwrap();
        assert!(reasons(&game.take_events()).contains(&NotifyReason::BattleWon));

        game.select((3, 8)).unwrap();
        game.select((2, 8)).unwrap();
        game.select((2, 8)).unwrap();
        game.select((1, 8)).unwrap();
        game.take_events();

        // The Flag at grid (0, 8) falls and the game ends.
        game.select((1, 8)).unwrap();
        game.select((0, 8)).unwrap();
        let reasons_now = reasons(&game.take_events());

        assert!(reasons_now.contains(&NotifyReason::BattleWon));
        assert!(reasons_now.contains(&NotifyReason::PlayerWins));
        assert!(reasons_now.contains(&NotifyReason::GameOver));
        assert_eq!(game.state(), GameState::GameOver);
        assert_eq!(game.phase(), GamePhase::Over);

        // Any further click only repeats the game-over notice.
        game.select((4, 4)).unwrap();
        assert_eq!(reasons(&game.take_events()), vec![NotifyReason::GameOver]);
    }

    #[test]
    fn a_move_by_the_side_not_on_turn_is_rejected() {
        let mut game = started_game(Vec::new());
        game.take_events();

        // Red is on turn; point the move registers at a Blue piece.
        game.selected = Some((1, 1));
        game.target = Some((2, 1));
        game.state = GameState::MovePiece;
        assert!(matches!(game.run(None), Err(GameError::Invariant(_))));
        assert_eq!(game.cell((1, 1)).unwrap().piece.unwrap().owner, Side::Blue);
        assert!(game.cell((2, 1)).unwrap().piece.is_none());
    }

    #[test]
    fn a_board_with_no_mobile_pieces_is_a_stalemate() {
        let mut game = Game::new(VARIANT, Box::new(Scripted::new(Vec::new())));
        game.board.add_piece(Rank::Flag, Side::Red, (5, 1)).unwrap();
        game.board.add_piece(Rank::Flag, Side::Blue, (1, 1)).unwrap();
        game.state = GameState::StartCheck;
        game.run(None).unwrap();

        let reasons = reasons(&game.take_events());
        assert!(reasons.contains(&NotifyReason::StaleMate));
        assert!(reasons.contains(&NotifyReason::GameOver));
        assert_eq!(game.state(), GameState::GameOver);
    }

    #[test]
    fn clicks_are_swallowed_while_no_input_is_expected() {
        let mut game = Game::new(VARIANT, Box::new(Scripted::new(Vec::new())));
        game.state = GameState::EndTurn;
        game.select((4, 1)).unwrap();
        assert!(game.take_events().is_empty());
        assert_eq!(game.state(), GameState::EndTurn);
    }
}
