pub mod roads;

use crate::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const BOARD_SIZE: usize = 19;
pub const CELL_COUNT: usize = BOARD_SIZE * BOARD_SIZE;

/// Scan directions shared by the win check, the road table and the threat
/// detector: east, south, south-east, north-east.
pub const DIRECTIONS: [(i32, i32); 4] = [(1, 0), (0, 1), (1, 1), (1, -1)];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cell {
    Empty,
    Black,
    White,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Player {
    Black,
    White,
}

impl Player {
    #[inline]
    pub fn opponent(self) -> Player {
        match self {
            Player::Black => Player::White,
            Player::White => Player::Black,
        }
    }

    #[inline]
    pub fn cell(self) -> Cell {
        match self {
            Player::Black => Cell::Black,
            Player::White => Cell::White,
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Player::Black => write!(f, "Black"),
            Player::White => write!(f, "White"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pos {
    pub x: u8,
    pub y: u8,
}

pub const CENTER: Pos = Pos { x: 9, y: 9 };

impl Pos {
    #[inline]
    pub fn new(x: u8, y: u8) -> Self {
        debug_assert!((x as usize) < BOARD_SIZE && (y as usize) < BOARD_SIZE);
        Pos { x, y }
    }

    #[inline]
    pub fn in_bounds(x: i32, y: i32) -> bool {
        (0..BOARD_SIZE as i32).contains(&x) && (0..BOARD_SIZE as i32).contains(&y)
    }

    /// Flat index, row-major. Matches the oracle's `policy[y*19 + x]` layout.
    #[inline]
    pub fn index(self) -> usize {
        self.y as usize * BOARD_SIZE + self.x as usize
    }

    #[inline]
    pub fn from_index(idx: usize) -> Self {
        Pos {
            x: (idx % BOARD_SIZE) as u8,
            y: (idx / BOARD_SIZE) as u8,
        }
    }

    #[inline]
    pub fn manhattan(self, other: Pos) -> u32 {
        self.x.abs_diff(other.x) as u32 + self.y.abs_diff(other.y) as u32
    }

    #[inline]
    pub fn chebyshev(self, other: Pos) -> u32 {
        (self.x.abs_diff(other.x)).max(self.y.abs_diff(other.y)) as u32
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

/// The 19x19 grid. Row-major; the canonical serialization for hashing
/// concatenates rows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Board {
    cells: [Cell; CELL_COUNT],
}

impl Board {
    pub fn empty() -> Self {
        Board {
            cells: [Cell::Empty; CELL_COUNT],
        }
    }

    #[inline]
    pub fn get(&self, p: Pos) -> Cell {
        self.cells[p.index()]
    }

    #[inline]
    pub fn set(&mut self, p: Pos, c: Cell) {
        self.cells[p.index()] = c;
    }

    #[inline]
    pub fn is_empty_at(&self, p: Pos) -> bool {
        self.get(p) == Cell::Empty
    }

    pub fn stone_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c != Cell::Empty).count()
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().all(|&c| c != Cell::Empty)
    }

    /// All empty cells, row-major order.
    pub fn empties(&self) -> impl Iterator<Item = Pos> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, &c)| c == Cell::Empty)
            .map(|(i, _)| Pos::from_index(i))
    }

    /// All occupied cells with their color, row-major order.
    pub fn stones(&self) -> impl Iterator<Item = (Pos, Cell)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, &c)| c != Cell::Empty)
            .map(|(i, &c)| (Pos::from_index(i), c))
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "   {}", (0..BOARD_SIZE).map(|x| format!("{:2}", x % 10)).collect::<String>())?;
        for y in 0..BOARD_SIZE {
            write!(f, "{y:2} ")?;
            for x in 0..BOARD_SIZE {
                let ch = match self.get(Pos::new(x as u8, y as u8)) {
                    Cell::Empty => " .",
                    Cell::Black => " X",
                    Cell::White => " O",
                };
                write!(f, "{ch}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// One or two stones placed by `player` in a single turn. A single stone is
/// legal only for Black's opening ply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Move6 {
    pub player: Player,
    pub positions: Vec<Pos>,
}

impl Move6 {
    pub fn single(player: Player, p: Pos) -> Self {
        Move6 {
            player,
            positions: vec![p],
        }
    }

    pub fn pair(player: Player, a: Pos, b: Pos) -> Self {
        Move6 {
            player,
            positions: vec![a, b],
        }
    }

    /// Cells sorted, for unordered comparison and hashing.
    pub fn sorted_positions(&self) -> Vec<Pos> {
        let mut v = self.positions.clone();
        v.sort();
        v
    }
}

impl fmt::Display for Move6 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.player)?;
        for p in &self.positions {
            write!(f, " {p}")?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameOutcome {
    BlackWin,
    WhiteWin,
    Draw,
}

#[derive(Clone, Debug)]
pub struct GameState {
    pub board: Board,
    pub current_player: Player,
    pub move_number: u32,
    pub last_move: Option<Move6>,
    pub winner: Option<GameOutcome>,
}

/// Connect6 turn rule: Black opens with one stone, every later turn places two.
#[inline]
pub fn stones_to_place(move_number: u32) -> usize {
    if move_number == 0 {
        1
    } else {
        2
    }
}

impl GameState {
    pub fn initial() -> Self {
        GameState {
            board: Board::empty(),
            current_player: Player::Black,
            move_number: 0,
            last_move: None,
            winner: None,
        }
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.winner.is_some()
    }

    /// Validate and apply a move, producing the successor state. The input
    /// state is untouched; failures are recoverable errors.
    pub fn apply(&self, mv: &Move6) -> Result<GameState, EngineError> {
        if self.winner.is_some() {
            return Err(EngineError::TerminalState);
        }
        if mv.player != self.current_player {
            return Err(EngineError::InvalidMove(format!(
                "expected {} to move",
                self.current_player
            )));
        }
        let need = stones_to_place(self.move_number);
        if mv.positions.len() != need {
            return Err(EngineError::InvalidMove(format!(
                "move must place {need} stone(s), got {}",
                mv.positions.len()
            )));
        }
        for (i, &p) in mv.positions.iter().enumerate() {
            if !Pos::in_bounds(p.x as i32, p.y as i32) {
                return Err(EngineError::InvalidMove(format!("{p} out of bounds")));
            }
            if !self.board.is_empty_at(p) {
                return Err(EngineError::InvalidMove(format!("{p} is occupied")));
            }
            if mv.positions[..i].contains(&p) {
                return Err(EngineError::InvalidMove(format!("{p} placed twice")));
            }
        }

        let mut board = self.board.clone();
        for &p in &mv.positions {
            board.set(p, mv.player.cell());
        }
        let winner = check_winner(&board);
        Ok(GameState {
            board,
            current_player: self.current_player.opponent(),
            move_number: self.move_number + 1,
            last_move: Some(mv.clone()),
            winner,
        })
    }
}

/// Scan the whole board for a six-in-a-row of either color; draw iff the
/// board is full without one.
pub fn check_winner(board: &Board) -> Option<GameOutcome> {
    for y in 0..BOARD_SIZE as i32 {
        for x in 0..BOARD_SIZE as i32 {
            let p = Pos::new(x as u8, y as u8);
            let cell = board.get(p);
            if cell == Cell::Empty {
                continue;
            }
            for &(dx, dy) in &DIRECTIONS {
                // Only count runs from their first cell to scan each line once.
                let px = x - dx;
                let py = y - dy;
                if Pos::in_bounds(px, py) && board.get(Pos::new(px as u8, py as u8)) == cell {
                    continue;
                }
                let mut run = 1;
                let mut nx = x + dx;
                let mut ny = y + dy;
                while Pos::in_bounds(nx, ny) && board.get(Pos::new(nx as u8, ny as u8)) == cell {
                    run += 1;
                    nx += dx;
                    ny += dy;
                }
                if run >= 6 {
                    return Some(match cell {
                        Cell::Black => GameOutcome::BlackWin,
                        Cell::White => GameOutcome::WhiteWin,
                        Cell::Empty => unreachable!(),
                    });
                }
            }
        }
    }
    if board.is_full() {
        Some(GameOutcome::Draw)
    } else {
        None
    }
}
