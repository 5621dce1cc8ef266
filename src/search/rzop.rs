//! Relevance-Zone / Order-Preserving candidate generation.
//!
//! Every search node branches over a bounded, ordered set of empty cells
//! instead of the whole board: a radius-3 zone around existing stones,
//! forced-defense cells promoted unconditionally, low-value cells filtered
//! out, and long lines capped by per-line quotas.

use crate::board::roads::{all_roads, count_road, is_high_value_road_cell, road, roads_through};
use crate::board::{Cell, GameState, Move6, Player, Pos, BOARD_SIZE, CENTER, DIRECTIONS};
use crate::search::vcdt;
use std::collections::HashSet;

/// Quota of non-urgent candidates admitted per row / diagonal / anti-diagonal.
const LINE_QUOTA: usize = 4;
/// Default cap on enumerated two-stone moves per node.
pub const PAIR_CAP: usize = 1000;
/// Pairs among this many center-closest candidates form the preferred band.
const CENTER_BAND: usize = 30;

/// Empty cells the side to move should consider, urgent blocks first, then
/// by closeness to the center.
pub fn candidate_cells(state: &GameState, player: Player) -> Vec<Pos> {
    // Opening: the center and its orthogonal neighbors.
    if state.board.stone_count() == 0 {
        let c = CENTER;
        return vec![
            c,
            Pos::new(c.x, c.y - 1),
            Pos::new(c.x - 1, c.y),
            Pos::new(c.x + 1, c.y),
            Pos::new(c.x, c.y + 1),
        ];
    }

    let zone = relevance_zone(state);
    let urgent = urgent_block_cells(state, player);

    let mut cells: Vec<Pos> = Vec::new();
    for &p in &urgent {
        if !cells.contains(&p) {
            cells.push(p);
        }
    }

    let mut row_used = [0usize; BOARD_SIZE];
    let mut diag_used = [0usize; 2 * BOARD_SIZE - 1];
    let mut anti_used = [0usize; 2 * BOARD_SIZE - 1];
    let mut ordered_zone: Vec<Pos> = zone.iter().copied().collect();
    ordered_zone.sort_by_key(|p| (p.manhattan(CENTER), p.index()));

    for p in ordered_zone {
        if cells.contains(&p) {
            continue;
        }
        if !is_high_value_road_cell(state, p, 3) {
            continue;
        }
        if is_pure_line_extension(state, p) {
            continue;
        }
        if is_dead_line_cell(state, p) {
            continue;
        }
        // Quotas keep long lines from flooding the candidate list.
        let row = p.y as usize;
        let diag = (p.x as i32 - p.y as i32 + (BOARD_SIZE as i32 - 1)) as usize;
        let anti = (p.x + p.y) as usize;
        if row_used[row] >= LINE_QUOTA
            || diag_used[diag] >= LINE_QUOTA
            || anti_used[anti] >= LINE_QUOTA
        {
            continue;
        }
        row_used[row] += 1;
        diag_used[diag] += 1;
        anti_used[anti] += 1;
        cells.push(p);
    }

    if cells.is_empty() {
        // Everything got filtered; fall back to the raw zone.
        let mut fallback: Vec<Pos> = zone.into_iter().collect();
        fallback.sort_by_key(|p| (p.manhattan(CENTER), p.index()));
        return fallback;
    }
    cells
}

/// Empty cells within a Chebyshev radius of 3 of any stone.
fn relevance_zone(state: &GameState) -> HashSet<Pos> {
    let mut zone = HashSet::new();
    for (stone, _) in state.board.stones() {
        let x0 = (stone.x as i32 - 3).max(0);
        let x1 = (stone.x as i32 + 3).min(BOARD_SIZE as i32 - 1);
        let y0 = (stone.y as i32 - 3).max(0);
        let y1 = (stone.y as i32 + 3).min(BOARD_SIZE as i32 - 1);
        for y in y0..=y1 {
            for x in x0..=x1 {
                let p = Pos::new(x as u8, y as u8);
                if state.board.is_empty_at(p) {
                    zone.insert(p);
                }
            }
        }
    }
    zone
}

/// Empties of every length-6 window the opponent is about to convert:
/// five-plus stones needing one cell, or four stones with two holes.
pub fn urgent_block_cells(state: &GameState, player: Player) -> Vec<Pos> {
    let them = player.opponent().cell();
    let mut urgent: Vec<Pos> = Vec::new();
    for r in all_roads() {
        let c = count_road(state, r);
        let (theirs, mine) = match them {
            Cell::Black => (c.black, c.white),
            Cell::White => (c.white, c.black),
            Cell::Empty => unreachable!(),
        };
        if mine != 0 {
            continue;
        }
        let forcing = (theirs >= 5 && c.empty >= 1) || (theirs >= 4 && c.empty >= 2);
        if !forcing {
            continue;
        }
        for &p in &r.cells {
            if state.board.is_empty_at(p) && !urgent.contains(&p) {
                urgent.push(p);
            }
        }
    }
    urgent.sort_by_key(|p| (p.manhattan(CENTER), p.index()));
    urgent
}

/// A cell that merely extends an already >=5 contiguous run adds nothing the
/// mate logic does not already see.
fn is_pure_line_extension(state: &GameState, p: Pos) -> bool {
    for &(dx, dy) in &DIRECTIONS {
        for cell in [Cell::Black, Cell::White] {
            let mut run = 0;
            for sign in [-1i32, 1] {
                let mut x = p.x as i32 + dx * sign;
                let mut y = p.y as i32 + dy * sign;
                while Pos::in_bounds(x, y) && state.board.get(Pos::new(x as u8, y as u8)) == cell {
                    run += 1;
                    x += dx * sign;
                    y += dy * sign;
                }
            }
            if run >= 5 {
                return true;
            }
        }
    }
    false
}

/// A cell is dead when every road through it already holds both colors.
fn is_dead_line_cell(state: &GameState, p: Pos) -> bool {
    for &id in roads_through(p) {
        let c = count_road(state, road(id));
        if c.black == 0 || c.white == 0 {
            return false;
        }
    }
    true
}

/// Unordered two-stone moves over `cells`, urgent winning/blocking pairs
/// first, then central pairs, then the rest. Capped at `cap`.
pub fn enumerate_pair_moves(
    state: &GameState,
    player: Player,
    cells: &[Pos],
    cap: usize,
) -> Vec<Move6> {
    let mut moves: Vec<Move6> = Vec::new();
    let mut seen: HashSet<(Pos, Pos)> = HashSet::new();

    let mut push = |a: Pos, b: Pos, moves: &mut Vec<Move6>, seen: &mut HashSet<(Pos, Pos)>| {
        if a == b || moves.len() >= cap {
            return;
        }
        if !state.board.is_empty_at(a) || !state.board.is_empty_at(b) {
            return;
        }
        let key = if a < b { (a, b) } else { (b, a) };
        if seen.insert(key) {
            moves.push(Move6::pair(player, key.0, key.1));
        }
    };

    // Band (i): pairs the threat detector already singled out, opponent
    // pair-wins (must-block) ahead of our own pair-wins.
    for pair in vcdt::pair_wins(state, player.opponent()) {
        push(pair[0], pair[1], &mut moves, &mut seen);
    }
    for pair in vcdt::pair_wins(state, player) {
        push(pair[0], pair[1], &mut moves, &mut seen);
    }

    // Band (ii): pairs among the cells closest to the center.
    let mut central: Vec<Pos> = cells.to_vec();
    central.sort_by_key(|p| (p.manhattan(CENTER), p.index()));
    let band = central.len().min(CENTER_BAND);
    for i in 0..band {
        for j in (i + 1)..band {
            push(central[i], central[j], &mut moves, &mut seen);
        }
    }

    // Band (iii): everything else.
    for i in 0..central.len() {
        for j in (i + 1)..central.len() {
            if moves.len() >= cap {
                return moves;
            }
            push(central[i], central[j], &mut moves, &mut seen);
        }
    }
    moves
}

/// Single-stone moves for the opening ply.
pub fn enumerate_single_moves(player: Player, cells: &[Pos]) -> Vec<Move6> {
    cells.iter().map(|&p| Move6::single(player, p)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Board;

    fn state_with(stones: &[(u8, u8, Cell)], to_move: Player) -> GameState {
        let mut board = Board::empty();
        for &(x, y, c) in stones {
            board.set(Pos::new(x, y), c);
        }
        GameState {
            board,
            current_player: to_move,
            move_number: 4,
            last_move: None,
            winner: None,
        }
    }

    #[test]
    fn empty_board_opens_at_the_center_cross() {
        let s = GameState::initial();
        let cells = candidate_cells(&s, Player::Black);
        assert_eq!(cells[0], CENTER);
        assert_eq!(cells.len(), 5);
        assert!(cells.contains(&Pos::new(9, 8)));
        assert!(cells.contains(&Pos::new(8, 9)));
        assert!(cells.contains(&Pos::new(10, 9)));
        assert!(cells.contains(&Pos::new(9, 10)));
    }

    #[test]
    fn urgent_blocks_are_always_included() {
        // White four-with-two-holes on row 3; Black to move must see both
        // holes among its candidates.
        let s = state_with(
            &[
                (3, 3, Cell::White),
                (4, 3, Cell::White),
                (5, 3, Cell::White),
                (6, 3, Cell::White),
                (12, 12, Cell::Black),
            ],
            Player::Black,
        );
        let urgent = urgent_block_cells(&s, Player::Black);
        assert!(urgent.contains(&Pos::new(2, 3)));
        assert!(urgent.contains(&Pos::new(7, 3)));
        let cells = candidate_cells(&s, Player::Black);
        for u in urgent {
            assert!(cells.contains(&u), "urgent cell {u} missing from candidates");
        }
    }

    #[test]
    fn candidates_stay_near_the_stones() {
        let s = state_with(&[(9, 9, Cell::Black)], Player::White);
        let cells = candidate_cells(&s, Player::White);
        for p in &cells {
            assert!(p.chebyshev(Pos::new(9, 9)) <= 3);
        }
    }

    #[test]
    fn isolated_stone_yields_fallback_zone() {
        // A lone stone has no road with three same-color stones, so the
        // high-value filter rejects everything and the raw zone comes back.
        let s = state_with(&[(0, 0, Cell::Black)], Player::White);
        let cells = candidate_cells(&s, Player::White);
        assert!(!cells.is_empty());
        assert!(cells.contains(&Pos::new(1, 1)));
    }

    #[test]
    fn pair_moves_are_unique_unordered_and_on_empty_cells() {
        let s = state_with(
            &[
                (8, 8, Cell::Black),
                (9, 9, Cell::Black),
                (10, 10, Cell::Black),
                (8, 10, Cell::White),
            ],
            Player::White,
        );
        let cells = candidate_cells(&s, Player::White);
        let moves = enumerate_pair_moves(&s, Player::White, &cells, PAIR_CAP);
        assert!(!moves.is_empty());
        let mut keys = HashSet::new();
        for m in &moves {
            assert_eq!(m.positions.len(), 2);
            assert_ne!(m.positions[0], m.positions[1]);
            for &p in &m.positions {
                assert!(s.board.is_empty_at(p));
            }
            assert!(keys.insert(m.sorted_positions()), "duplicate pair {m}");
        }
        assert!(moves.len() <= PAIR_CAP);
    }

    #[test]
    fn opponent_pair_win_is_enumerated_first() {
        // White holds a live four on row 3; Black's move list must start
        // with the double block.
        let s = state_with(
            &[
                (3, 3, Cell::White),
                (4, 3, Cell::White),
                (5, 3, Cell::White),
                (6, 3, Cell::White),
                (9, 9, Cell::Black),
                (10, 9, Cell::Black),
                (11, 9, Cell::Black),
            ],
            Player::Black,
        );
        let cells = candidate_cells(&s, Player::Black);
        let moves = enumerate_pair_moves(&s, Player::Black, &cells, PAIR_CAP);
        let blocks: Vec<Vec<Pos>> = vcdt::pair_wins(&s, Player::White)
            .iter()
            .map(|p| {
                let mut v = p.to_vec();
                v.sort();
                v
            })
            .collect();
        assert!(blocks.contains(&moves[0].sorted_positions()));
    }
}
