//! Per-turn engine selection.
//!
//! Early and late game belong to PVS; in the tactical middlegame a complex
//! enough position is worth running both engines and keeping the better
//! answer. Operators can pin either engine.

use crate::board::roads::{all_roads, count_road};
use crate::board::{GameState, CELL_COUNT};
use crate::errors::EngineError;
use crate::mcts::MctsEngine;
use crate::oracle::Oracle;
use crate::search::eval::EvaluationWeights;
use crate::search::pvs::{PvsEngine, SearchConfig};
use crate::search::Decision;
use log::debug;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyMode {
    /// Pick per the move-number / complexity table.
    Auto,
    /// PVS only.
    Traditional,
    /// MCTS only.
    Deep,
}

/// Middlegame window where MCTS becomes an option.
const MIDGAME_START: u32 = 10;
const MIDGAME_END: u32 = 30;
const COMPLEXITY_THRESHOLD: f64 = 0.6;
/// Win-rate-to-evaluator scale used when both engines ran and their scores
/// must be compared: 2*(w - 0.5) * SCALE.
const WIN_RATE_SCALE: f64 = 100_000.0;

/// Position complexity in [0, 1]: half stone density, half the share of
/// roads contested by both colors.
pub fn complexity(state: &GameState) -> f64 {
    let stones_ratio = state.board.stone_count() as f64 / CELL_COUNT as f64;
    let mut mixed = 0usize;
    let roads = all_roads();
    for road in roads {
        let c = count_road(state, road);
        if c.black > 0 && c.white > 0 {
            mixed += 1;
        }
    }
    let mixed_ratio = mixed as f64 / roads.len() as f64;
    0.5 * stones_ratio + 0.5 * mixed_ratio
}

pub struct HybridEngine<O: Oracle> {
    pub pvs: PvsEngine,
    pub mcts: MctsEngine<O>,
}

impl<O: Oracle> HybridEngine<O> {
    pub fn new(pvs: PvsEngine, mcts: MctsEngine<O>) -> Self {
        HybridEngine { pvs, mcts }
    }

    pub fn decide(
        &mut self,
        state: &GameState,
        weights: &EvaluationWeights,
        config: &SearchConfig,
        mode: StrategyMode,
    ) -> Result<Decision, EngineError> {
        let config = config.adjusted_for(state.move_number);
        match mode {
            StrategyMode::Traditional => {
                let mut d = self.pvs.search(state, weights, &config)?;
                d.meta.strategy = "traditional".into();
                Ok(d)
            }
            StrategyMode::Deep => {
                let mut d = self.mcts.search(state)?;
                d.meta.strategy = "deep".into();
                Ok(d)
            }
            StrategyMode::Auto => self.decide_auto(state, weights, &config),
        }
    }

    fn decide_auto(
        &mut self,
        state: &GameState,
        weights: &EvaluationWeights,
        config: &SearchConfig,
    ) -> Result<Decision, EngineError> {
        let m = state.move_number;
        let c = complexity(state);
        let run_both = m > MIDGAME_START && m <= MIDGAME_END && c > COMPLEXITY_THRESHOLD;
        if !run_both {
            let mut d = self.pvs.search(state, weights, config)?;
            d.meta.strategy = "auto".into();
            d.meta.reason = Some(format!("move {m}, complexity {c:.2}: pvs"));
            return Ok(d);
        }

        debug!("complex middlegame (m={m}, c={c:.2}): running both engines");
        let pvs_decision = self.pvs.search(state, weights, config)?;
        let mcts_decision = self.mcts.search(state)?;
        let mcts_scaled = 2.0 * (mcts_decision.score - 0.5) * WIN_RATE_SCALE;
        let mut d = if mcts_scaled > pvs_decision.score {
            mcts_decision
        } else {
            pvs_decision
        };
        d.meta.strategy = "hybrid".into();
        d.meta.reason = Some(format!("move {m}, complexity {c:.2}: both engines ran"));
        Ok(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Board, Cell, Player, Pos};
    use crate::mcts::MctsConfig;
    use crate::oracle::UniformOracle;

    #[test]
    fn complexity_is_zero_on_an_empty_board_and_grows() {
        let empty = GameState::initial();
        assert_eq!(complexity(&empty), 0.0);

        let mut board = Board::empty();
        for i in 0..6u8 {
            board.set(Pos::new(6 + i, 9), Cell::Black);
            board.set(Pos::new(6 + i, 10), Cell::White);
        }
        let s = GameState {
            board,
            current_player: Player::Black,
            move_number: 6,
            last_move: None,
            winner: None,
        };
        let c = complexity(&s);
        assert!(c > 0.0 && c <= 1.0);
    }

    #[test]
    fn forced_modes_pick_the_requested_engine() {
        let mut board = Board::empty();
        for &(x, y, c) in &[
            (8, 9, Cell::Black),
            (9, 9, Cell::Black),
            (10, 9, Cell::Black),
            (9, 10, Cell::White),
            (10, 10, Cell::White),
            (11, 10, Cell::White),
        ] {
            board.set(Pos::new(x, y), c);
        }
        let s = GameState {
            board,
            current_player: Player::Black,
            move_number: 4,
            last_move: None,
            winner: None,
        };
        let cfg = SearchConfig {
            max_depth: 1,
            time_limit_ms: 300,
            use_multithreading: false,
        };
        let mcts_cfg = MctsConfig {
            simulation_count: 8,
            simulation_steps: 2,
            expand_nodes: 6,
            seed: 3,
            ..MctsConfig::default()
        };
        let mut engine = HybridEngine::new(PvsEngine::new(), MctsEngine::new(UniformOracle, mcts_cfg));
        let w = EvaluationWeights::default();

        let d = engine.decide(&s, &w, &cfg, StrategyMode::Traditional).unwrap();
        assert_eq!(d.meta.engine, "pvs");
        assert_eq!(d.meta.strategy, "traditional");

        let d = engine.decide(&s, &w, &cfg, StrategyMode::Deep).unwrap();
        assert_eq!(d.meta.engine, "mcts");
        assert_eq!(d.meta.strategy, "deep");
    }

    #[test]
    fn auto_mode_stays_on_pvs_in_the_opening() {
        let s = GameState::initial();
        let cfg = SearchConfig::default();
        let mut engine = HybridEngine::new(
            PvsEngine::new(),
            MctsEngine::new(UniformOracle, MctsConfig::default()),
        );
        let d = engine
            .decide(&s, &EvaluationWeights::default(), &cfg, StrategyMode::Auto)
            .unwrap();
        assert_eq!(d.meta.engine, "pvs");
        assert_eq!(d.meta.strategy, "auto");
    }
}
