use std::fmt;

/// Errors surfaced by the decision core. Invalid input is always a value,
/// never a panic, so self-play loops keep running on a bad sampled move.
#[derive(Debug)]
pub enum EngineError {
    /// Move rejected before application: wrong side, wrong stone count,
    /// out-of-bounds, duplicated or occupied cell.
    InvalidMove(String),
    /// `apply` was called on a state that already has a winner.
    TerminalState,
    /// Candidate generation produced nothing even after the relevance-zone
    /// fallback. Engines normally absorb this into a fallback decision; it
    /// only escapes when the board has no playable cells left.
    NoCandidate,
    /// MCTS could not expand a single child at the root.
    EmptyMctsRoot,
    /// The policy/value oracle failed; the source error is passed through
    /// unchanged.
    Oracle(anyhow::Error),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::InvalidMove(reason) => write!(f, "invalid move: {reason}"),
            EngineError::TerminalState => write!(f, "game is already decided"),
            EngineError::NoCandidate => write!(f, "no candidate cells available"),
            EngineError::EmptyMctsRoot => write!(f, "MCTS root could not be expanded"),
            EngineError::Oracle(e) => write!(f, "oracle failure: {e}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Oracle(e) => e.source(),
            _ => None,
        }
    }
}
