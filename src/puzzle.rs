use rand::{seq::SliceRandom, Rng};
use std::fmt;

use crate::error::BoardError;

/// Marker value of the empty slot.
pub const BLANK: u32 = 0;

/// A cell on the board, `x` is the column and `y` the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: usize,
    pub y: usize,
}

impl Point {
    pub fn from_index(side: usize, index: usize) -> Self {
        Point {
            x: index % side,
            y: index / side,
        }
    }

    pub fn to_index(self, side: usize) -> usize {
        self.y * side + self.x
    }

    pub fn manhattan(self, other: Point) -> usize {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

/// Side length of a board holding `size` numbered tiles plus the blank,
/// i.e. `floor(sqrt(size + 1))`.
pub fn side_for_size(size: usize) -> usize {
    let cells = size + 1;
    let mut side = 0;
    while (side + 1) * (side + 1) <= cells {
        side += 1;
    }
    side
}

pub fn blank_index(tiles: &[u32]) -> Option<usize> {
    tiles.iter().position(|&tile| tile == BLANK)
}

/// Position of the blank, or `None` when the tiles have no blank at all.
pub fn blank_point(side: usize, tiles: &[u32]) -> Option<Point> {
    blank_index(tiles).map(|index| Point::from_index(side, index))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Move {
    Up,
    Right,
    Down,
    Left,
}

impl Move {
    /// Expansion order used by the solver.
    pub const ALL: [Move; 4] = [Move::Up, Move::Right, Move::Down, Move::Left];

    pub fn opposite(&self) -> Self {
        match self {
            Move::Up => Move::Down,
            Move::Down => Move::Up,
            Move::Left => Move::Right,
            Move::Right => Move::Left,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Move::Up => "top",
            Move::Right => "right",
            Move::Down => "bottom",
            Move::Left => "left",
        }
    }

    /// Index the blank lands on when moved from `blank` on a board of `len`
    /// cells, or `None` if the move would leave the board.
    pub fn target_index(&self, side: usize, len: usize, blank: usize) -> Option<usize> {
        match self {
            Move::Up => blank.checked_sub(side),
            Move::Down => Some(blank + side).filter(|&index| index < len),
            Move::Left => (blank % side != 0).then(|| blank - 1),
            Move::Right => (blank % side != side - 1).then(|| blank + 1),
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A validated board: square, one blank, every other tile in `1..len`
/// exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Board {
    side: usize,
    tiles: Vec<u32>,
    blank: usize,
}

impl Board {
    pub fn new(tiles: Vec<u32>) -> Result<Self, BoardError> {
        let len = tiles.len();
        let side = side_for_size(len.saturating_sub(1));
        if len == 0 || side * side != len {
            return Err(BoardError::NotSquare { len });
        }

        let mut seen = vec![false; len];
        let mut blanks = 0;
        for &tile in &tiles {
            if tile == BLANK {
                blanks += 1;
                continue;
            }
            let slot = tile as usize;
            if slot >= len {
                return Err(BoardError::TileOutOfRange {
                    tile,
                    max: (len - 1) as u32,
                });
            }
            if seen[slot] {
                return Err(BoardError::DuplicateTile { tile });
            }
            seen[slot] = true;
        }

        let blank = blank_index(&tiles).ok_or(BoardError::MissingBlank)?;
        if blanks > 1 {
            return Err(BoardError::DuplicateBlank);
        }

        Ok(Self { side, tiles, blank })
    }

    /// Like [`Board::new`], but also checks the side length the caller expects.
    pub fn with_side(side: usize, tiles: Vec<u32>) -> Result<Self, BoardError> {
        let board = Self::new(tiles)?;
        if board.side != side {
            return Err(BoardError::SideMismatch {
                expected: side,
                actual: board.side,
            });
        }
        Ok(board)
    }

    /// The ordered board `1, 2, ..` with the blank in the last cell.
    pub fn solved(side: usize) -> Self {
        let len = side * side;
        let mut tiles: Vec<u32> = (1..len as u32).collect();
        tiles.push(BLANK);
        Self {
            side,
            tiles,
            blank: len - 1,
        }
    }

    /// The ordered board with the blank inserted at `index` instead of the
    /// last cell.
    pub fn with_blank_at(side: usize, index: usize) -> Result<Self, BoardError> {
        let len = side * side;
        if index >= len {
            return Err(BoardError::GoalOutOfRange { index, len });
        }
        let mut tiles: Vec<u32> = (1..len as u32).collect();
        tiles.insert(index, BLANK);
        Ok(Self {
            side,
            tiles,
            blank: index,
        })
    }

    pub fn side(&self) -> usize {
        self.side
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn tiles(&self) -> &[u32] {
        &self.tiles
    }

    pub fn blank_index(&self) -> usize {
        self.blank
    }

    pub fn blank_point(&self) -> Point {
        Point::from_index(self.side, self.blank)
    }

    pub fn apply_move(&mut self, movement: Move) -> bool {
        match movement.target_index(self.side, self.tiles.len(), self.blank) {
            Some(target) => {
                debug_assert_eq!(self.tiles[self.blank], BLANK);
                self.tiles.swap(self.blank, target);
                self.blank = target;
                true
            }
            None => false,
        }
    }

    pub fn try_move(&self, movement: Move) -> Option<Self> {
        let mut next = self.clone();
        if next.apply_move(movement) {
            Some(next)
        } else {
            None
        }
    }

    /// Applies `moves` in order, stopping at the first illegal one.
    pub fn apply_moves(&mut self, moves: &[Move]) -> bool {
        moves.iter().all(|&movement| self.apply_move(movement))
    }

    /// Every board one slide away, in [`Move::ALL`] order.
    pub fn neighbours(&self) -> impl Iterator<Item = (Move, Board)> + '_ {
        Move::ALL
            .into_iter()
            .filter_map(move |movement| self.try_move(movement).map(|next| (movement, next)))
    }

    /// Whether `target` can be reached by sliding tiles.
    ///
    /// Every slide swaps the blank with a neighbour, flipping both the parity
    /// of the tile permutation and the parity of the blank's distance to its
    /// target cell, so the sum of the two parities is invariant.
    pub fn can_reach(&self, target: &Board) -> bool {
        if self.side != target.side {
            return false;
        }

        let mut goal_slot = vec![0usize; self.tiles.len()];
        for (index, &tile) in target.tiles.iter().enumerate() {
            goal_slot[tile as usize] = index;
        }
        let permutation: Vec<usize> = self
            .tiles
            .iter()
            .map(|&tile| goal_slot[tile as usize])
            .collect();

        let transpositions = permutation.len() - count_cycles(&permutation);
        let blank_distance = self.blank_point().manhattan(target.blank_point());

        (transpositions + blank_distance) % 2 == 0
    }

    pub fn is_solvable(&self) -> bool {
        self.can_reach(&Board::solved(self.side))
    }

    pub fn shuffled<R: Rng + ?Sized>(side: usize, rng: &mut R) -> Self {
        let mut board = Board::solved(side);

        loop {
            board.tiles.shuffle(rng);
            board.blank = blank_index(&board.tiles).unwrap_or_default();

            if board.is_solvable() {
                return board;
            }
        }
    }

    /// Random walk of `steps` slides that never immediately undoes itself.
    pub fn scrambled<R: Rng + ?Sized>(&self, rng: &mut R, steps: usize) -> Self {
        let mut board = self.clone();
        let mut last: Option<Move> = None;

        for _ in 0..steps {
            let options: Vec<Move> = Move::ALL
                .into_iter()
                .filter(|movement| last.map_or(true, |prev| *movement != prev.opposite()))
                .filter(|movement| {
                    movement
                        .target_index(board.side, board.tiles.len(), board.blank)
                        .is_some()
                })
                .collect();

            if let Some(&movement) = options.choose(rng) {
                board.apply_move(movement);
                last = Some(movement);
            }
        }

        board
    }
}

fn count_cycles(permutation: &[usize]) -> usize {
    let mut visited = vec![false; permutation.len()];
    let mut cycles = 0;

    for start in 0..permutation.len() {
        if visited[start] {
            continue;
        }
        cycles += 1;
        let mut index = start;
        while !visited[index] {
            visited[index] = true;
            index = permutation[index];
        }
    }

    cycles
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.tiles.chunks(self.side) {
            for &val in row {
                write!(f, "{:2} ", val)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
