use crate::board::{Board, Cell, GameState, Player, CELL_COUNT};
use std::sync::OnceLock;

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

static TABLE: OnceLock<[u64; 2 * CELL_COUNT]> = OnceLock::new();
static SIDE_KEY: OnceLock<u64> = OnceLock::new();

fn init_table() -> &'static [u64; 2 * CELL_COUNT] {
    TABLE.get_or_init(|| {
        let mut t = [0u64; 2 * CELL_COUNT];
        let mut seed = 0xC6C6_B0A2_D00D_FEED;
        for v in &mut t {
            seed = splitmix64(seed);
            *v = seed;
        }
        t
    })
}

fn side_key() -> u64 {
    *SIDE_KEY.get_or_init(|| splitmix64(0x1357_9BDF_2468_ACE0))
}

/// Key over (board, side to move). This is the MCTS transposition key.
pub fn position_key(board: &Board, side: Player) -> u64 {
    let table = init_table();
    let mut key = 0u64;
    for (pos, cell) in board.stones() {
        let color = match cell {
            Cell::Black => 0,
            Cell::White => 1,
            Cell::Empty => unreachable!(),
        };
        key ^= table[color * CELL_COUNT + pos.index()];
    }
    if side == Player::White {
        key ^= side_key();
    }
    key
}

/// Key over (board, side to move, move number). The PVS transposition table
/// keys on this, since the two-stone rule makes the same position at a
/// different move number a different search node.
pub fn search_key(state: &GameState) -> u64 {
    position_key(&state.board, state.current_player) ^ splitmix64(state.move_number as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Board, Pos};

    #[test]
    fn keys_differ_by_side_and_stone() {
        let mut b = Board::empty();
        let empty_black = position_key(&b, Player::Black);
        let empty_white = position_key(&b, Player::White);
        assert_ne!(empty_black, empty_white);

        b.set(Pos::new(9, 9), Cell::Black);
        assert_ne!(position_key(&b, Player::Black), empty_black);

        let mut b2 = Board::empty();
        b2.set(Pos::new(9, 9), Cell::White);
        assert_ne!(
            position_key(&b2, Player::Black),
            position_key(&b, Player::Black)
        );
    }

    #[test]
    fn key_is_order_independent() {
        let mut a = Board::empty();
        a.set(Pos::new(1, 2), Cell::Black);
        a.set(Pos::new(3, 4), Cell::White);
        let mut b = Board::empty();
        b.set(Pos::new(3, 4), Cell::White);
        b.set(Pos::new(1, 2), Cell::Black);
        assert_eq!(
            position_key(&a, Player::Black),
            position_key(&b, Player::Black)
        );
    }
}
