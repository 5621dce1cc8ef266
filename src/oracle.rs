use crate::board::{GameState, CELL_COUNT};
use anyhow::Result;

/// Per-cell prior and scalar position value produced by the policy/value
/// oracle. `policy[y*19 + x]` is the prior for cell (x, y); entries must be
/// non-negative but need not sum to 1. `value` is in [-1, 1] from the
/// perspective of the side to move.
pub struct OracleOutput {
    pub policy: Vec<f64>,
    pub value: f64,
}

/// The pluggable policy/value boundary. The MCTS engine projects `value`
/// across colors negamax-style, which assumes a symmetric oracle; an
/// asymmetric implementation must audit that sign handling.
pub trait Oracle {
    fn evaluate(&self, state: &GameState) -> Result<OracleOutput>;
}

/// Flat prior and neutral value. Good enough for tests and as a baseline.
pub struct UniformOracle;

impl Oracle for UniformOracle {
    fn evaluate(&self, _state: &GameState) -> Result<OracleOutput> {
        Ok(OracleOutput {
            policy: vec![1.0 / CELL_COUNT as f64; CELL_COUNT],
            value: 0.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_oracle_covers_every_cell() {
        let out = UniformOracle.evaluate(&GameState::initial()).unwrap();
        assert_eq!(out.policy.len(), CELL_COUNT);
        assert!(out.policy.iter().all(|&p| p > 0.0));
        assert_eq!(out.value, 0.0);
    }
}
