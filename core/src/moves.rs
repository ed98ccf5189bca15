use crate::*;

/// Orthogonal scan directions, `(row, col)` deltas.
pub const DIRECTIONS: [(i8, i8); 4] = [(0, 1), (0, -1), (1, 0), (-1, 0)];

/// Legal destinations for the piece at `from`.
///
/// Bomb and Flag never move. Every other rank steps one cell per direction;
/// the Scout scans unbounded distance. A scan halts at the first non-playable
/// or occupied cell; an enemy occupant is included as a battle destination,
/// but nothing past it is.
pub fn legal_moves(board: &Board, from: Coord2) -> Result<Vec<Coord2>> {
    let cell = board.cell(from)?;
    if !cell.kind.is_playable() {
        return Err(GameError::Invariant("moves requested for a non-playable cell"));
    }
    let piece = cell.piece.ok_or(GameError::EmptyPiece)?;

    if !piece.rank.is_mobile() {
        return Ok(Vec::new());
    }

    let reach = if piece.rank == Rank::Scout {
        CellCount::MAX
    } else {
        1
    };
    let bounds = board.size();
    let mut moves = Vec::new();

    for delta in DIRECTIONS {
        let mut at = from;
        let mut steps = reach;
        while steps > 0 {
            let Some(next) = apply_delta(at, delta, bounds) else {
                break;
            };
            let next_cell = &board[next];
            if !next_cell.kind.is_playable() {
                break;
            }
            match next_cell.piece {
                Some(occupant) => {
                    if occupant.owner != piece.owner {
                        moves.push(next);
                    }
                    break;
                }
                None => moves.push(next),
            }
            at = next;
            steps -= 1;
        }
    }

    Ok(moves)
}

/// How many pieces of `side` have at least one legal move.
pub fn count_movable(board: &Board, side: Side) -> CellCount {
    let mut count = 0;
    for_each_piece(board, side, |board, at| {
        let movable = legal_moves(board, at).map(|moves| !moves.is_empty());
        if movable.unwrap_or(false) {
            count += 1;
        }
    });
    count
}

/// How many pieces of `side` with `rank` are standing on the play region.
pub fn count_rank(board: &Board, side: Side, rank: Rank) -> CellCount {
    let mut count = 0;
    for_each_piece(board, side, |board, at| {
        if board[at].piece.is_some_and(|piece| piece.rank == rank) {
            count += 1;
        }
    });
    count
}

fn for_each_piece(board: &Board, side: Side, mut visit: impl FnMut(&Board, Coord2)) {
    let (rows, cols) = board.size();
    for row in 0..rows {
        for col in 0..cols {
            let cell = &board[(row, col)];
            if cell.kind.is_playable() && cell.piece.is_some_and(|piece| piece.owner == side) {
                visit(board, (row, col));
            }
        }
    }
}
