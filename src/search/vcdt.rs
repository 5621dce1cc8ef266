//! Detection of winning and near-winning threats.
//!
//! Three shapes matter one turn out:
//! - a road with five friendly stones and one empty: a one-stone mate;
//! - a road with four friendly stones, two empties and no enemy: occupying
//!   both empties in one turn makes six (a pair win), and the same shape
//!   read defensively is a live four;
//! - any two distinct one-stone mate cells, which together form a composed
//!   pair win.

use crate::board::{GameState, Player, Pos};
use crate::board::roads::{all_roads, count_road, ROAD_LEN};
use std::collections::HashSet;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ThreatLevel {
    /// Level 0: a single empty completes six.
    Mate,
    /// Level 1: a pair of empties completes six when both are taken this turn.
    PairWin,
    /// Level 2: the 4+2 shape viewed as a threat the opponent must block.
    LiveFour,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Threat {
    /// The empty cells whose occupation realizes the threat.
    pub positions: Vec<Pos>,
    pub is_winning: bool,
    pub level: ThreatLevel,
}

/// All threats `player` holds in `state`, deduplicated per level by the
/// unordered set of their empty cells.
pub fn find_threats(state: &GameState, player: Player) -> Vec<Threat> {
    let mut threats = Vec::new();
    let mut seen: HashSet<(ThreatLevel, Vec<Pos>)> = HashSet::new();
    let mut mates: Vec<Pos> = Vec::new();

    for road in all_roads() {
        let c = count_road(state, road);
        let (mine, theirs) = match player {
            Player::Black => (c.black, c.white),
            Player::White => (c.white, c.black),
        };
        if theirs != 0 {
            continue;
        }
        if mine == 5 && c.empty == 1 {
            let hole = road
                .cells
                .iter()
                .copied()
                .find(|&p| state.board.is_empty_at(p))
                .unwrap();
            if seen.insert((ThreatLevel::Mate, vec![hole])) {
                threats.push(Threat {
                    positions: vec![hole],
                    is_winning: true,
                    level: ThreatLevel::Mate,
                });
            }
            if !mates.contains(&hole) {
                mates.push(hole);
            }
        } else if mine == 4 && c.empty == 2 {
            let mut holes: Vec<Pos> = road
                .cells
                .iter()
                .copied()
                .filter(|&p| state.board.is_empty_at(p))
                .collect();
            debug_assert_eq!(holes.len(), ROAD_LEN - 4);
            holes.sort();
            if seen.insert((ThreatLevel::PairWin, holes.clone())) {
                threats.push(Threat {
                    positions: holes.clone(),
                    is_winning: true,
                    level: ThreatLevel::PairWin,
                });
            }
            if seen.insert((ThreatLevel::LiveFour, holes.clone())) {
                threats.push(Threat {
                    positions: holes,
                    is_winning: false,
                    level: ThreatLevel::LiveFour,
                });
            }
        }
    }

    // Two distinct mate cells taken together also win in one turn.
    for i in 0..mates.len() {
        for j in (i + 1)..mates.len() {
            let mut pair = vec![mates[i], mates[j]];
            pair.sort();
            if seen.insert((ThreatLevel::PairWin, pair.clone())) {
                threats.push(Threat {
                    positions: pair,
                    is_winning: true,
                    level: ThreatLevel::PairWin,
                });
            }
        }
    }

    threats
}

/// One-stone mate cells for `player`.
pub fn mate_cells(state: &GameState, player: Player) -> Vec<Pos> {
    find_threats(state, player)
        .into_iter()
        .filter(|t| t.level == ThreatLevel::Mate)
        .map(|t| t.positions[0])
        .collect()
}

/// Winning pair cells (level 1), composed pairs included.
pub fn pair_wins(state: &GameState, player: Player) -> Vec<[Pos; 2]> {
    find_threats(state, player)
        .into_iter()
        .filter(|t| t.level == ThreatLevel::PairWin)
        .map(|t| [t.positions[0], t.positions[1]])
        .collect()
}

/// Live-four threats (level 2) held by `player`.
pub fn live_fours(state: &GameState, player: Player) -> Vec<Threat> {
    find_threats(state, player)
        .into_iter()
        .filter(|t| t.level == ThreatLevel::LiveFour)
        .collect()
}

/// True iff `player` still holds any immediate win (level 0 or 1).
pub fn has_immediate_win(state: &GameState, player: Player) -> bool {
    find_threats(state, player)
        .iter()
        .any(|t| t.is_winning)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Board, Cell, Player};

    fn state_with(stones: &[(u8, u8, Cell)]) -> GameState {
        let mut board = Board::empty();
        for &(x, y, c) in stones {
            board.set(Pos::new(x, y), c);
        }
        GameState {
            board,
            current_player: Player::Black,
            move_number: 4,
            last_move: None,
            winner: None,
        }
    }

    #[test]
    fn five_with_one_hole_is_a_mate() {
        // Row 9: B at x 4..9 except a hole at 7.
        let s = state_with(&[
            (4, 9, Cell::Black),
            (5, 9, Cell::Black),
            (6, 9, Cell::Black),
            (8, 9, Cell::Black),
            (9, 9, Cell::Black),
        ]);
        let mates = mate_cells(&s, Player::Black);
        assert!(mates.contains(&Pos::new(7, 9)));
        assert!(mate_cells(&s, Player::White).is_empty());
    }

    #[test]
    fn four_with_two_holes_is_pair_win_and_live_four() {
        let s = state_with(&[
            (3, 3, Cell::Black),
            (3, 4, Cell::Black),
            (3, 5, Cell::Black),
            (3, 6, Cell::Black),
        ]);
        let threats = find_threats(&s, Player::Black);
        let pair: Vec<Pos> = vec![Pos::new(3, 2), Pos::new(3, 7)];
        assert!(threats
            .iter()
            .any(|t| t.level == ThreatLevel::PairWin && t.positions == pair));
        assert!(threats
            .iter()
            .any(|t| t.level == ThreatLevel::LiveFour && t.positions == pair && !t.is_winning));
    }

    #[test]
    fn enemy_stone_in_road_kills_the_threat() {
        let s = state_with(&[
            (3, 3, Cell::Black),
            (3, 4, Cell::Black),
            (3, 5, Cell::Black),
            (3, 6, Cell::Black),
            (3, 7, Cell::White),
        ]);
        // The 2..7 road is mixed; the only clean 4+2 would need rows beyond
        // the blocked cell.
        let threats = find_threats(&s, Player::Black);
        assert!(!threats
            .iter()
            .any(|t| t.positions.contains(&Pos::new(3, 7))));
    }

    #[test]
    fn two_separate_mates_compose_into_a_pair_win() {
        // Two disjoint 5+1 shapes: one on row 2, one on column 15.
        let mut stones = Vec::new();
        for x in 2..7 {
            stones.push((x, 2, Cell::Black));
        }
        for y in 8..13 {
            stones.push((15, y, Cell::Black));
        }
        let s = state_with(&stones);
        let mates = mate_cells(&s, Player::Black);
        assert!(mates.len() >= 2);
        let pairs = pair_wins(&s, Player::Black);
        let composed: Vec<Pos> = {
            let mut v = vec![mates[0], mates[1]];
            v.sort();
            v
        };
        assert!(pairs
            .iter()
            .any(|p| { p.to_vec() == composed }));
    }

    #[test]
    fn threats_are_deduplicated_by_cell_set() {
        // A single 4+2 shape must not be reported twice per level even
        // though overlapping roads see the same stones.
        let s = state_with(&[
            (3, 3, Cell::Black),
            (3, 4, Cell::Black),
            (3, 5, Cell::Black),
            (3, 6, Cell::Black),
        ]);
        let threats = find_threats(&s, Player::Black);
        let pair = vec![Pos::new(3, 2), Pos::new(3, 7)];
        let n = threats
            .iter()
            .filter(|t| t.level == ThreatLevel::PairWin && t.positions == pair)
            .count();
        assert_eq!(n, 1);
    }
}
