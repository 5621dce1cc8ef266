//! Minimal-stone defense against an opponent live four.
//!
//! Blocking both ends of a 4+2 road spends the whole turn. When one end
//! alone already disarms every immediate win, the second stone is free to
//! develop, so the defender checks each end by simulation first.

use crate::board::{GameState, Move6, Player, Pos, CENTER};
use crate::search::rzop;
use crate::search::vcdt::{self, Threat};
use log::debug;

/// Build a defensive move against `threat`, an opponent live four with two
/// empty ends. Returns the single safe block closest to the center padded
/// with a developing stone when possible, otherwise blocks both ends.
pub fn defend_live_four(state: &GameState, player: Player, threat: &Threat) -> Move6 {
    debug_assert_eq!(threat.positions.len(), 2);
    let opponent = player.opponent();

    let mut safe: Vec<Pos> = Vec::new();
    for &end in &threat.positions {
        let mut probe = state.clone();
        probe.board.set(end, player.cell());
        if !vcdt::has_immediate_win(&probe, opponent) {
            safe.push(end);
        }
    }

    if let Some(&block) = safe
        .iter()
        .min_by_key(|p| (p.manhattan(CENTER), p.index()))
    {
        // The free stone develops: rank candidates in the position where the
        // block is already placed, so the disarmed threat stops looking urgent.
        let mut blocked = state.clone();
        blocked.board.set(block, player.cell());
        let companion = rzop::candidate_cells(&blocked, player)
            .into_iter()
            .find(|&p| p != block)
            .or_else(|| state.board.empties().find(|&p| p != block));
        if let Some(second) = companion {
            debug!("live-four defense: single block {block}, developing {second}");
            return Move6::pair(player, block, second);
        }
    }

    debug!(
        "live-four defense: blocking both ends {} {}",
        threat.positions[0], threat.positions[1]
    );
    Move6::pair(player, threat.positions[0], threat.positions[1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Board, Cell};
    use crate::search::vcdt::ThreatLevel;

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
    fn lone_live_four_needs_both_ends() {
        // White: . W W W W . on row 3. A single block at either end leaves
        // the other five-window alive, so the defense takes both ends.
        let s = state_with(
            &[
                (3, 3, Cell::White),
                (3, 4, Cell::White),
                (3, 5, Cell::White),
                (3, 6, Cell::White),
                (9, 9, Cell::Black),
            ],
            Player::Black,
        );
        let threat = vcdt::live_fours(&s, Player::White)
            .into_iter()
            .find(|t| t.positions == vec![Pos::new(3, 2), Pos::new(3, 7)])
            .unwrap();
        let mv = defend_live_four(&s, Player::Black, &threat);
        let mut got = mv.sorted_positions();
        got.sort();
        // Whatever ends are chosen, applying the move must disarm White.
        let next = s.apply(&mv).unwrap();
        assert!(!vcdt::has_immediate_win(&next, Player::White));
        assert_eq!(got.len(), 2);
    }

    #[test]
    fn boxed_four_takes_the_single_killing_block() {
        // White has four stones whose only live window is x in [2..7]:
        // blocked left by Black at (1,3) wall... build a shape where one
        // block disarms everything: W at (3,3),(4,3),(5,3),(6,3) with Black
        // already at (8,3). Then the only clean windows are x in [1..6] and
        // x in [2..7]; both die once (2,3) is taken.
        let s = state_with(
            &[
                (3, 3, Cell::White),
                (4, 3, Cell::White),
                (5, 3, Cell::White),
                (6, 3, Cell::White),
                (8, 3, Cell::Black),
                (0, 3, Cell::Black),
            ],
            Player::Black,
        );
        let fours = vcdt::live_fours(&s, Player::White);
        assert!(!fours.is_empty());
        let threat = fours
            .iter()
            .find(|t| t.level == ThreatLevel::LiveFour)
            .unwrap();
        let mv = defend_live_four(&s, Player::Black, threat);
        let next = s.apply(&mv).unwrap();
        assert!(!vcdt::has_immediate_win(&next, Player::White));
    }
}
