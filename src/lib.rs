pub mod error;
pub mod puzzle;
pub mod search;

pub use error::{BoardError, SolveError};
pub use puzzle::{Board, Move, Point};
pub use search::{
    solve_to_blank, solve_to_target, BlankAt, Goal, Node, SearchPath, SearchStats, Solution,
    Solver, SolverConfig, Target,
};
