pub mod defense;
pub mod eval;
pub mod pvs;
pub mod rzop;
pub mod tt;
pub mod vcdt;
pub mod zobrist;

use crate::board::Move6;

/// What an engine hands back for one turn: the move, its score (evaluator
/// units for PVS, win rate in [0,1] for MCTS) and debug metadata.
#[derive(Clone, Debug)]
pub struct Decision {
    pub mv: Move6,
    pub score: f64,
    pub meta: DecisionMeta,
}

#[derive(Clone, Debug, Default)]
pub struct DecisionMeta {
    pub engine: String,
    pub strategy: String,
    pub depth: Option<u32>,
    pub nodes: Option<u64>,
    pub tt_size: Option<usize>,
    pub mode: Option<String>,
    pub reason: Option<String>,
}
