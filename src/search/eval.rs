use crate::board::roads::{all_roads, count_road, Road};
use crate::board::{Cell, GameState, Player, BOARD_SIZE, CENTER};
use crate::search::vcdt::{self, ThreatLevel};
use serde::{Deserialize, Serialize};

/// Score of a realized six-in-a-row. Threat bonuses stay well below this so
/// an actual win always dominates.
pub const WIN_SCORE: f64 = 1_000_000.0;
/// Depth-preference step: faster mates and slower losses score better.
pub const WIN_PLY_BONUS: f64 = 10_000.0;
pub const DRAW_SCORE: f64 = 0.0;

/// Tunable evaluation weights. `road3` and `road4` are kept for the GA and
/// exported profiles but the evaluator itself does not read them; the
/// pattern and threat terms carry that signal.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaluationWeights {
    pub road3: f64,
    pub road4: f64,
    pub live4: f64,
    pub live5: f64,
    pub vcdt_bonus: f64,
}

impl Default for EvaluationWeights {
    fn default() -> Self {
        EvaluationWeights {
            road3: 100.0,
            road4: 350.0,
            live4: 3000.0,
            live5: 10_000.0,
            vcdt_bonus: 1500.0,
        }
    }
}

#[inline]
fn longest_run(state: &GameState, road: &Road, cell: Cell) -> u8 {
    let mut best = 0u8;
    let mut run = 0u8;
    for &p in &road.cells {
        if state.board.get(p) == cell {
            run += 1;
            best = best.max(run);
        } else {
            run = 0;
        }
    }
    best
}

/// Road terminal term: only realized sixes count here; everything shorter is
/// priced by the pattern and threat terms.
pub fn road_term(state: &GameState, player: Player) -> f64 {
    let me = player.cell();
    let them = player.opponent().cell();
    let mut mine_won = false;
    let mut theirs_won = false;
    for road in all_roads() {
        if !mine_won && longest_run(state, road, me) >= 6 {
            mine_won = true;
        }
        if !theirs_won && longest_run(state, road, them) >= 6 {
            theirs_won = true;
        }
        if mine_won && theirs_won {
            break;
        }
    }
    let mut score = 0.0;
    if mine_won {
        score += WIN_SCORE;
    }
    if theirs_won {
        score -= WIN_SCORE;
    }
    score
}

/// Pattern term over single-color roads: live fours (4+2) and live fives
/// (5+1), with the opponent's shapes discounted, plus the net VCDT count.
pub fn pattern_term(state: &GameState, player: Player, w: &EvaluationWeights) -> f64 {
    let me = player.cell();
    let mut my_live4 = 0.0;
    let mut my_live5 = 0.0;
    let mut opp_live4 = 0.0;
    let mut opp_live5 = 0.0;
    for road in all_roads() {
        let c = count_road(state, road);
        let (mine, theirs) = if me == Cell::Black {
            (c.black, c.white)
        } else {
            (c.white, c.black)
        };
        if theirs == 0 {
            if mine == 4 && c.empty == 2 {
                my_live4 += 1.0;
            } else if mine == 5 && c.empty == 1 {
                my_live5 += 1.0;
            }
        } else if mine == 0 {
            if theirs == 4 && c.empty == 2 {
                opp_live4 += 1.0;
            } else if theirs == 5 && c.empty == 1 {
                opp_live5 += 1.0;
            }
        }
    }
    let my_vcdts = vcdt::find_threats(state, player).len() as f64;
    let opp_vcdts = vcdt::find_threats(state, player.opponent()).len() as f64;
    my_live4 * w.live4 + my_live5 * w.live5
        - opp_live4 * w.live4 * 0.8
        - opp_live5 * w.live5 * 0.9
        + (my_vcdts - opp_vcdts) * w.vcdt_bonus
}

/// Threat-defense term. Unanswered opponent mates must dominate positional
/// shape, so the magnitudes sit in the hundred-thousands.
pub fn threat_defense_term(state: &GameState, player: Player) -> f64 {
    let mut score = 0.0;

    let opp = vcdt::find_threats(state, player.opponent());
    let opp_mates = opp.iter().filter(|t| t.level == ThreatLevel::Mate).count();
    let opp_pairs = opp.iter().filter(|t| t.level == ThreatLevel::PairWin).count();
    let opp_fours = opp.iter().filter(|t| t.level == ThreatLevel::LiveFour).count();
    score -= 200_000.0 * opp_mates as f64;
    score -= 120_000.0 * opp_pairs as f64;
    if opp_fours >= 2 {
        score -= 80_000.0 * opp_fours as f64;
    } else if opp_fours == 1 {
        score -= 40_000.0;
    }

    let mine = vcdt::find_threats(state, player);
    let my_mates = mine.iter().filter(|t| t.level == ThreatLevel::Mate).count();
    let my_pairs = mine.iter().filter(|t| t.level == ThreatLevel::PairWin).count();
    let my_fours = mine.iter().filter(|t| t.level == ThreatLevel::LiveFour).count();
    score += 200_000.0 * my_mates as f64;
    score += 100_000.0 * my_pairs as f64;
    if my_fours >= 2 {
        score += 30_000.0 * my_fours as f64;
    } else if my_fours == 1 {
        score += 10_000.0;
    }

    score
}

/// Gentle pull toward the center: every friendly stone earns twice its
/// closeness to the center, every enemy stone costs the same.
pub fn positional_term(state: &GameState, player: Player) -> f64 {
    let max_dist = 2.0 * ((BOARD_SIZE as f64 - 1.0) / 2.0);
    let me = player.cell();
    let mut score = 0.0;
    for (pos, cell) in state.board.stones() {
        let v = 2.0 * (max_dist - pos.manhattan(CENTER) as f64);
        if cell == me {
            score += v;
        } else {
            score -= v;
        }
    }
    score
}

/// Static evaluation of `state` from `player`'s perspective.
pub fn evaluate(state: &GameState, player: Player, w: &EvaluationWeights) -> f64 {
    road_term(state, player)
        + pattern_term(state, player, w)
        + threat_defense_term(state, player)
        + positional_term(state, player)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Board, Pos};

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
    fn empty_board_evaluates_to_zero() {
        let s = state_with(&[]);
        let w = EvaluationWeights::default();
        assert_eq!(evaluate(&s, Player::Black, &w), 0.0);
    }

    #[test]
    fn road_term_is_antisymmetric() {
        let s = state_with(&[
            (9, 9, Cell::Black),
            (9, 10, Cell::Black),
            (10, 10, Cell::White),
        ]);
        assert_eq!(road_term(&s, Player::Black), -road_term(&s, Player::White));

        let mut winning = Vec::new();
        for x in 3..9 {
            winning.push((x, 5, Cell::Black));
        }
        let s2 = state_with(&winning);
        assert_eq!(road_term(&s2, Player::Black), WIN_SCORE);
        assert_eq!(road_term(&s2, Player::White), -WIN_SCORE);
    }

    #[test]
    fn positional_term_rewards_central_stones() {
        let center = state_with(&[(9, 9, Cell::Black)]);
        let corner = state_with(&[(0, 0, Cell::Black)]);
        assert!(
            positional_term(&center, Player::Black) > positional_term(&corner, Player::Black)
        );
        assert_eq!(positional_term(&center, Player::Black), 36.0);
        assert_eq!(positional_term(&center, Player::White), -36.0);
    }

    #[test]
    fn live_four_scores_through_pattern_term() {
        let w = EvaluationWeights::default();
        let s = state_with(&[
            (3, 3, Cell::Black),
            (3, 4, Cell::Black),
            (3, 5, Cell::Black),
            (3, 6, Cell::Black),
        ]);
        assert!(pattern_term(&s, Player::Black, &w) > 0.0);
        assert!(pattern_term(&s, Player::White, &w) < 0.0);
    }

    #[test]
    fn opponent_mate_dominates_the_evaluation() {
        let w = EvaluationWeights::default();
        // White threatens (7,9); Black has shape but no immediate win.
        let s = state_with(&[
            (4, 9, Cell::White),
            (5, 9, Cell::White),
            (6, 9, Cell::White),
            (8, 9, Cell::White),
            (9, 9, Cell::White),
            (12, 12, Cell::Black),
            (13, 13, Cell::Black),
            (14, 14, Cell::Black),
        ]);
        assert!(evaluate(&s, Player::Black, &w) < -100_000.0);
    }

    #[test]
    fn evaluation_is_finite_on_busy_boards() {
        let mut stones = Vec::new();
        for y in 0..BOARD_SIZE as u8 {
            for x in 0..BOARD_SIZE as u8 {
                if (x + y) % 3 == 0 {
                    stones.push((x, y, if (x + 2 * y) % 2 == 0 { Cell::Black } else { Cell::White }));
                }
            }
        }
        let s = state_with(&stones);
        let w = EvaluationWeights::default();
        assert!(evaluate(&s, Player::Black, &w).is_finite());
        assert!(evaluate(&s, Player::White, &w).is_finite());
    }
}
