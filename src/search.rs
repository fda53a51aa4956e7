//! Iterative deepening A* over sliding-puzzle boards.
//!
//! Each pass is a depth-first search that prunes every node whose
//! `cost + estimate` exceeds the current threshold. The smallest pruned
//! value becomes the next threshold, so memory stays linear in the depth of
//! the solution while the first goal found is optimal for an admissible
//! estimate.

use log::{debug, info, trace};
use std::ops::{Deref, DerefMut};
use std::time::{Duration, Instant};

use crate::error::{BoardError, SolveError};
use crate::puzzle::{Board, Move, Point, BLANK};

const DEFAULT_MAX_ITERATIONS: usize = 1_000_000;

/// A board together with the cost and moves that led to it from the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    board: Board,
    cost: usize,
    moves: Vec<Move>,
}

impl Node {
    pub fn root(board: Board) -> Self {
        Self {
            board,
            cost: 0,
            moves: Vec::new(),
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn cost(&self) -> usize {
        self.cost
    }

    pub fn moves(&self) -> &[Move] {
        &self.moves
    }
}

/// Cost of the slide turning `from` into `to`: the distance the blank
/// travelled, which is 1 for any legal slide.
pub fn step_cost(from: &Board, to: &Board) -> usize {
    from.blank_point().manhattan(to.blank_point())
}

/// Every node one slide away from `node`, in [`Move::ALL`] order.
pub fn successors<F>(node: &Node, step_cost: F) -> Vec<Node>
where
    F: Fn(&Board, &Board) -> usize,
{
    node.board
        .neighbours()
        .map(|(movement, board)| {
            let mut moves = Vec::with_capacity(node.moves.len() + 1);
            moves.extend_from_slice(&node.moves);
            moves.push(movement);
            Node {
                cost: node.cost + step_cost(&node.board, &board),
                board,
                moves,
            }
        })
        .collect()
}

/// What the search is looking for, and how far away a board is from it.
///
/// `estimate` must never exceed the real remaining cost, otherwise the first
/// solution found is no longer guaranteed to be the cheapest.
pub trait Goal {
    fn side(&self) -> usize;

    fn is_goal(&self, board: &Board) -> bool;

    fn estimate(&self, board: &Board) -> usize;

    /// The exact board the goal accepts, if there is only one.
    fn target(&self) -> Option<&Board> {
        None
    }
}

impl<G: Goal + ?Sized> Goal for &G {
    fn side(&self) -> usize {
        (**self).side()
    }

    fn is_goal(&self, board: &Board) -> bool {
        (**self).is_goal(board)
    }

    fn estimate(&self, board: &Board) -> usize {
        (**self).estimate(board)
    }

    fn target(&self) -> Option<&Board> {
        (**self).target()
    }
}

/// Accepts any board whose blank sits on `index`, whatever the other tiles
/// look like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlankAt {
    side: usize,
    index: usize,
    point: Point,
}

impl BlankAt {
    pub fn new(side: usize, index: usize) -> Result<Self, BoardError> {
        let len = side * side;
        if index >= len {
            return Err(BoardError::GoalOutOfRange { index, len });
        }
        Ok(Self {
            side,
            index,
            point: Point::from_index(side, index),
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

impl Goal for BlankAt {
    fn side(&self) -> usize {
        self.side
    }

    fn is_goal(&self, board: &Board) -> bool {
        board.blank_index() == self.index
    }

    fn estimate(&self, board: &Board) -> usize {
        board.blank_point().manhattan(self.point)
    }
}

/// Accepts exactly one board.
#[derive(Debug, Clone)]
pub struct Target {
    board: Board,
    // goal position of every tile, indexed by tile value
    slots: Vec<Point>,
}

impl Target {
    pub fn new(board: Board) -> Self {
        let side = board.side();
        let mut slots = vec![Point { x: 0, y: 0 }; board.len()];
        for (index, &tile) in board.tiles().iter().enumerate() {
            slots[tile as usize] = Point::from_index(side, index);
        }
        Self { board, slots }
    }

    /// The ordered board with the blank on `index`.
    pub fn canonical(side: usize, index: usize) -> Result<Self, BoardError> {
        Board::with_blank_at(side, index).map(Self::new)
    }

    pub fn board(&self) -> &Board {
        &self.board
    }
}

impl Goal for Target {
    fn side(&self) -> usize {
        self.board.side()
    }

    fn is_goal(&self, board: &Board) -> bool {
        board.tiles() == self.board.tiles()
    }

    fn estimate(&self, board: &Board) -> usize {
        let side = board.side();
        board
            .tiles()
            .iter()
            .enumerate()
            .filter(|&(_, &tile)| tile != BLANK)
            .map(|(index, &tile)| Point::from_index(side, index).manhattan(self.slots[tile as usize]))
            .sum()
    }

    fn target(&self) -> Option<&Board> {
        Some(&self.board)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolverConfig {
    /// Reject boards that cannot reach a fixed target board before searching.
    pub check_parity: bool,
    /// Maximum number of bounded passes.
    pub max_iterations: Option<usize>,
    pub time_limit: Option<Duration>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            check_parity: true,
            max_iterations: Some(DEFAULT_MAX_ITERATIONS),
            time_limit: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Bounded passes run, including the one that found the goal.
    pub iterations: usize,
    /// Nodes whose successors were generated, over all passes.
    pub expanded: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    pub moves: Vec<Move>,
    pub cost: usize,
    /// Threshold of the pass that found the goal.
    pub threshold: usize,
    pub stats: SearchStats,
}

impl Solution {
    pub fn move_names(&self) -> Vec<&'static str> {
        self.moves.iter().map(Move::name).collect()
    }
}

/// The nodes from the root to the one being expanded.
///
/// Nodes are only added through [`SearchPath::enter`], whose frame removes
/// the node again when dropped, so every return out of a recursive call
/// leaves the path as it found it.
#[derive(Debug)]
pub struct SearchPath {
    nodes: Vec<Node>,
}

impl SearchPath {
    pub fn new(root: Node) -> Self {
        Self { nodes: vec![root] }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn last(&self) -> Option<&Node> {
        self.nodes.last()
    }

    pub fn contains(&self, board: &Board) -> bool {
        self.nodes.iter().any(|node| node.board == *board)
    }

    pub fn enter(&mut self, node: Node) -> PathFrame<'_> {
        debug_assert!(!self.contains(&node.board), "board already on the path");
        self.nodes.push(node);
        PathFrame { path: self }
    }
}

pub struct PathFrame<'a> {
    path: &'a mut SearchPath,
}

impl Deref for PathFrame<'_> {
    type Target = SearchPath;

    fn deref(&self) -> &SearchPath {
        self.path
    }
}

impl DerefMut for PathFrame<'_> {
    fn deref_mut(&mut self) -> &mut SearchPath {
        self.path
    }
}

impl Drop for PathFrame<'_> {
    fn drop(&mut self) {
        self.path.nodes.pop();
    }
}

enum Bound {
    Found(Node),
    /// Smallest pruned `cost + estimate`, or `None` if nothing was pruned
    /// and the subtree is exhausted.
    Next(Option<usize>),
}

struct Pass {
    started: Instant,
    deadline: Option<Instant>,
    stats: SearchStats,
}

impl Pass {
    fn check_deadline(&self) -> Result<(), SolveError> {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(SolveError::TimedOut {
                elapsed: self.started.elapsed(),
            }),
            _ => Ok(()),
        }
    }
}

pub struct Solver<G> {
    goal: G,
    config: SolverConfig,
}

impl<G: Goal> Solver<G> {
    pub fn new(goal: G) -> Self {
        Self::with_config(goal, SolverConfig::default())
    }

    pub fn with_config(goal: G, config: SolverConfig) -> Self {
        Self { goal, config }
    }

    pub fn goal(&self) -> &G {
        &self.goal
    }

    pub fn solve(&self, board: Board) -> Result<Solution, SolveError> {
        if board.side() != self.goal.side() {
            return Err(BoardError::SideMismatch {
                expected: self.goal.side(),
                actual: board.side(),
            }
            .into());
        }

        if self.config.check_parity {
            if let Some(target) = self.goal.target() {
                if !board.can_reach(target) {
                    info!("board cannot reach the target under the parity rule");
                    return Err(SolveError::Unreachable);
                }
            }
        }

        let root = Node::root(board);
        let mut threshold = self.goal.estimate(&root.board);
        let mut path = SearchPath::new(root);

        let started = Instant::now();
        let mut pass = Pass {
            started,
            deadline: self.config.time_limit.map(|limit| started + limit),
            stats: SearchStats::default(),
        };

        loop {
            if let Some(limit) = self.config.max_iterations {
                if pass.stats.iterations >= limit {
                    return Err(SolveError::IterationLimit { limit });
                }
            }
            pass.stats.iterations += 1;
            debug!(
                "pass {} with threshold {} ({} nodes expanded so far)",
                pass.stats.iterations, threshold, pass.stats.expanded
            );

            match self.bounded(&mut path, threshold, &mut pass)? {
                Bound::Found(node) => {
                    info!(
                        "solved in {} moves after {} passes, {} nodes expanded",
                        node.moves.len(),
                        pass.stats.iterations,
                        pass.stats.expanded
                    );
                    return Ok(Solution {
                        moves: node.moves,
                        cost: node.cost,
                        threshold,
                        stats: pass.stats,
                    });
                }
                Bound::Next(Some(next)) => {
                    debug_assert!(next > threshold);
                    threshold = next;
                }
                Bound::Next(None) => {
                    info!(
                        "search space exhausted after {} passes",
                        pass.stats.iterations
                    );
                    return Err(SolveError::Unreachable);
                }
            }
        }
    }

    fn bounded(
        &self,
        path: &mut SearchPath,
        threshold: usize,
        pass: &mut Pass,
    ) -> Result<Bound, SolveError> {
        pass.check_deadline()?;

        let Some(node) = path.last() else {
            return Ok(Bound::Next(None));
        };

        let f = node.cost + self.goal.estimate(&node.board);
        if f > threshold {
            return Ok(Bound::Next(Some(f)));
        }
        if self.goal.is_goal(&node.board) {
            return Ok(Bound::Found(node.clone()));
        }

        trace!("expanding at depth {} with f = {}\n{}", node.moves.len(), f, node.board);
        let children = successors(node, step_cost);
        pass.stats.expanded += 1;

        let mut min: Option<usize> = None;
        for child in children {
            if path.contains(&child.board) {
                continue;
            }

            let mut frame = path.enter(child);
            match self.bounded(&mut frame, threshold, pass)? {
                Bound::Found(goal) => return Ok(Bound::Found(goal)),
                Bound::Next(Some(cost)) => min = Some(min.map_or(cost, |m| m.min(cost))),
                Bound::Next(None) => {}
            }
        }

        Ok(Bound::Next(min))
    }
}

/// Moves the blank of `board` onto `goal_index` with as few slides as
/// possible.
pub fn solve_to_blank(board: Board, goal_index: usize) -> Result<Solution, SolveError> {
    let goal = BlankAt::new(board.side(), goal_index)?;
    Solver::new(goal).solve(board)
}

/// Reorders `board` into the sorted board with the blank on `goal_index`.
pub fn solve_to_target(board: Board, goal_index: usize) -> Result<Solution, SolveError> {
    let goal = Target::canonical(board.side(), goal_index)?;
    Solver::new(goal).solve(board)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use test_log::test;

    fn board(tiles: &[u32]) -> Board {
        Board::new(tiles.to_vec()).unwrap()
    }

    fn replay(start: &Board, moves: &[Move]) -> Board {
        let mut end = start.clone();
        assert!(end.apply_moves(moves), "solution contains an illegal move");
        end
    }

    #[test]
    fn blank_goal_moves_blank_to_corner() {
        let start = board(&[1, 2, 3, 4, 5, 6, 0, 7, 8]);
        let solution = solve_to_blank(start.clone(), 8).unwrap();

        assert_eq!(solution.moves, [Move::Right, Move::Right]);
        assert_eq!(solution.move_names(), ["right", "right"]);
        assert_eq!(solution.cost, 2);
        assert_eq!(solution.threshold, 2);
        assert_eq!(replay(&start, &solution.moves).blank_index(), 8);
    }

    #[test]
    fn same_board_reaches_full_target() {
        let start = board(&[1, 2, 3, 4, 5, 6, 0, 7, 8]);
        let solution = solve_to_target(start.clone(), 8).unwrap();

        assert_eq!(solution.moves, [Move::Right, Move::Right]);
        assert_eq!(replay(&start, &solution.moves), Board::solved(3));
    }

    #[test]
    fn board_already_at_goal_needs_no_moves() {
        let start = board(&[1, 2, 3, 4, 0, 5, 6, 7, 8]);

        let solution = solve_to_blank(start.clone(), 4).unwrap();
        assert!(solution.moves.is_empty());
        assert_eq!(solution.cost, 0);
        assert_eq!(solution.stats.iterations, 1);
        assert_eq!(solution.stats.expanded, 0);

        let solution = solve_to_target(start, 4).unwrap();
        assert!(solution.moves.is_empty());
        assert_eq!(solution.cost, 0);
    }

    #[test]
    fn blank_goal_ignores_other_tiles() {
        let start = board(&[8, 7, 6, 5, 4, 3, 2, 1, 0]);
        let solution = solve_to_blank(start, 8).unwrap();
        assert!(solution.moves.is_empty());
    }

    #[test]
    fn parity_mismatch_is_unreachable() {
        let start = board(&[2, 1, 3, 4, 5, 6, 7, 8, 0]);
        assert_eq!(solve_to_target(start, 8), Err(SolveError::Unreachable));
    }

    #[test]
    fn exhausted_search_space_is_unreachable() {
        // a 2x2 board has two disjoint 12-state cycles, so without the parity
        // check the search has to run out of boards on its own
        let config = SolverConfig {
            check_parity: false,
            ..SolverConfig::default()
        };
        let solver = Solver::with_config(Target::new(Board::solved(2)), config);

        let result = solver.solve(board(&[2, 1, 3, 0]));
        assert_eq!(result, Err(SolveError::Unreachable));
    }

    #[test]
    fn goal_on_a_different_board_size_is_rejected() {
        let solver = Solver::new(BlankAt::new(4, 15).unwrap());
        assert_eq!(
            solver.solve(Board::solved(3)),
            Err(SolveError::Board(BoardError::SideMismatch {
                expected: 4,
                actual: 3
            }))
        );
        assert_eq!(
            solve_to_blank(Board::solved(3), 9),
            Err(SolveError::Board(BoardError::GoalOutOfRange { index: 9, len: 9 }))
        );
    }

    #[test]
    fn iteration_limit_is_reported() {
        let config = SolverConfig {
            max_iterations: Some(0),
            ..SolverConfig::default()
        };
        let solver = Solver::with_config(Target::new(Board::solved(3)), config);
        assert_eq!(
            solver.solve(Board::solved(3)),
            Err(SolveError::IterationLimit { limit: 0 })
        );
    }

    #[test]
    fn deadline_stops_the_search() {
        let config = SolverConfig {
            check_parity: false,
            time_limit: Some(Duration::ZERO),
            ..SolverConfig::default()
        };
        let solver = Solver::with_config(Target::new(Board::solved(3)), config);
        let start = board(&[8, 6, 7, 2, 5, 4, 3, 0, 1]);
        assert!(matches!(
            solver.solve(start),
            Err(SolveError::TimedOut { .. })
        ));
    }

    #[test]
    fn estimate_is_zero_at_goal() {
        let target = Target::canonical(3, 4).unwrap();
        assert_eq!(target.estimate(target.board()), 0);

        let blank = BlankAt::new(3, 4).unwrap();
        assert_eq!(blank.estimate(target.board()), 0);
        assert_eq!(blank.estimate(&Board::solved(3)), 2);
    }

    #[test]
    fn manhattan_estimate_sums_tile_distances() {
        let target = Target::new(Board::solved(3));
        // 7 is two columns from home, the blank does not count
        assert_eq!(target.estimate(&board(&[1, 2, 3, 4, 5, 6, 0, 8, 7])), 2);
        assert_eq!(target.estimate(&board(&[8, 1, 2, 3, 4, 5, 6, 7, 0])), 14);
    }

    #[test]
    fn step_cost_is_one_per_slide() {
        let start = Board::solved(3);
        for (_, next) in start.neighbours() {
            assert_eq!(step_cost(&start, &next), 1);
        }
    }

    #[test]
    fn successors_extend_the_move_history() {
        let root = Node::root(board(&[1, 2, 3, 4, 0, 5, 6, 7, 8]));
        let children = successors(&root, step_cost);
        assert_eq!(children.len(), 4);

        let grandchildren = successors(&children[0], step_cost);
        assert!(grandchildren.len() <= 4);
        for child in &grandchildren {
            assert_ne!(child.board(), children[0].board());
            assert_eq!(child.moves().len(), 2);
            assert_eq!(child.moves()[0], Move::Up);
            assert_eq!(child.cost(), 2);
        }
    }

    #[test]
    fn path_frame_pops_on_every_exit() {
        let root = Node::root(Board::solved(3));
        let mut path = SearchPath::new(root.clone());
        let children = successors(&root, step_cost);

        {
            let mut frame = path.enter(children[0].clone());
            assert_eq!(frame.len(), 2);
            {
                let frame = frame.enter(children[1].clone());
                assert_eq!(frame.len(), 3);
                assert!(frame.contains(children[1].board()));
            }
            assert_eq!(frame.len(), 2);
        }

        assert_eq!(path.len(), 1);
        assert_eq!(path.last(), Some(&root));
    }

    #[test]
    fn solutions_are_optimal_and_replayable() {
        let mut rng = StdRng::seed_from_u64(11);
        let solved = Board::solved(3);
        let goal = Target::new(solved.clone());
        let solver = Solver::new(&goal);

        for steps in [3, 8, 12, 16] {
            let start = solved.scrambled(&mut rng, steps);
            let solution = solver.solve(start.clone()).unwrap();

            assert_eq!(replay(&start, &solution.moves), solved);
            assert_eq!(solution.cost, solution.moves.len());
            assert_eq!(solution.cost, solution.threshold);
            assert!(solution.cost <= steps);
            assert!(goal.estimate(&start) <= solution.cost);
        }
    }

    #[test]
    fn estimate_never_overestimates_along_a_solution() {
        let mut rng = StdRng::seed_from_u64(5);
        let solved = Board::solved(3);
        let goal = Target::new(solved.clone());
        let start = solved.scrambled(&mut rng, 14);
        let solution = Solver::new(&goal).solve(start.clone()).unwrap();

        let mut current = start;
        for (done, &movement) in solution.moves.iter().enumerate() {
            assert!(goal.estimate(&current) <= solution.cost - done);
            assert!(current.apply_move(movement));
        }
        assert_eq!(goal.estimate(&current), 0);
    }

    #[test]
    fn blank_goal_cost_is_blank_distance() {
        let mut rng = StdRng::seed_from_u64(19);
        for index in 0..16 {
            let start = Board::shuffled(4, &mut rng);
            let solution = solve_to_blank(start.clone(), index).unwrap();
            let distance = start.blank_point().manhattan(Point::from_index(4, index));

            assert_eq!(solution.cost, distance);
            assert_eq!(solution.stats.iterations, 1);
            assert_eq!(replay(&start, &solution.moves).blank_index(), index);
        }
    }
}
