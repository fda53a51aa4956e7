use std::time::Duration;

use thiserror::Error;

/// A board that cannot be searched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    #[error("board of {len} tiles is not a square")]
    NotSquare { len: usize },
    #[error("board has no blank tile")]
    MissingBlank,
    #[error("board has more than one blank tile")]
    DuplicateBlank,
    #[error("tile {tile} is outside 1..={max}")]
    TileOutOfRange { tile: u32, max: u32 },
    #[error("tile {tile} appears more than once")]
    DuplicateTile { tile: u32 },
    #[error("goal index {index} is outside a board of {len} tiles")]
    GoalOutOfRange { index: usize, len: usize },
    #[error("expected a board of side {expected}, got side {actual}")]
    SideMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolveError {
    #[error(transparent)]
    Board(#[from] BoardError),
    #[error("no solution: the goal cannot be reached from this board")]
    Unreachable,
    #[error("gave up after {limit} threshold increases")]
    IterationLimit { limit: usize },
    #[error("search timed out after {elapsed:?}")]
    TimedOut { elapsed: Duration },
}
