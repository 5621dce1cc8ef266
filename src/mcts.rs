//! PUCT Monte-Carlo tree search over oracle priors.
//!
//! Nodes live in two transposition tables keyed by (board, side to move),
//! one for nodes where the root player moves and one for the opponent. The
//! tables are the sole owners: parents hold child keys, never references.
//! Eviction is LRU on the last visit tick, so an evicted node is simply
//! re-expanded if the search walks into it again.

use crate::board::{stones_to_place, GameOutcome, GameState, Move6, Player, Pos};
use crate::errors::EngineError;
use crate::oracle::Oracle;
use crate::search::{rzop, zobrist, Decision, DecisionMeta};
use log::debug;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Gamma};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const DIRICHLET_ALPHA: f64 = 0.3;
/// Default prior for a cell the oracle gives no mass.
const POLICY_FLOOR: f64 = 1e-4;
/// A transposition child with more visits than this and a win rate below the
/// configured threshold is not re-attached during expansion.
const SKIP_VISIT_THRESHOLD: f64 = 5.0;

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct MctsConfig {
    pub simulation_count: u32,
    /// Rollout length bound, in plies.
    pub simulation_steps: u32,
    /// Children attached per expansion.
    pub expand_nodes: usize,
    pub min_win_rate_threshold: f64,
    pub ucb_constant: f64,
    pub dirichlet_epsilon: f64,
    pub max_transposition_size: usize,
    pub rollout_top_k: usize,
    pub seed: u64,
}

impl Default for MctsConfig {
    fn default() -> Self {
        MctsConfig {
            simulation_count: 400,
            simulation_steps: 8,
            expand_nodes: 16,
            min_win_rate_threshold: 0.1,
            ucb_constant: 1.4,
            dirichlet_epsilon: 0.25,
            max_transposition_size: 50_000,
            rollout_top_k: 6,
            seed: 0,
        }
    }
}

struct ChildEdge {
    mv: Move6,
    prior: f64,
    key: u64,
}

struct MctsNode {
    player_to_move: Player,
    visits: f64,
    /// Accumulated win rate from the perspective of the player who moved
    /// into this node.
    wins_sum: f64,
    expanded: bool,
    children: Vec<ChildEdge>,
    last_visit_tick: u64,
}

impl MctsNode {
    fn leaf(player_to_move: Player, tick: u64) -> Self {
        MctsNode {
            player_to_move,
            visits: 0.0,
            wins_sum: 0.0,
            expanded: false,
            children: Vec::new(),
            last_visit_tick: tick,
        }
    }

    fn q(&self) -> f64 {
        if self.visits > 0.0 {
            self.wins_sum / self.visits
        } else {
            0.0
        }
    }
}

pub struct MctsEngine<O: Oracle> {
    oracle: O,
    pub config: MctsConfig,
    self_table: HashMap<u64, MctsNode>,
    opp_table: HashMap<u64, MctsNode>,
    tick: u64,
}

impl<O: Oracle> MctsEngine<O> {
    pub fn new(oracle: O, config: MctsConfig) -> Self {
        MctsEngine {
            oracle,
            config,
            self_table: HashMap::new(),
            opp_table: HashMap::new(),
            tick: 0,
        }
    }

    /// Forget everything learned so far. Tables otherwise persist between
    /// searches to reuse work across consecutive turns.
    pub fn reset(&mut self) {
        self.self_table.clear();
        self.opp_table.clear();
        self.tick = 0;
    }

    pub fn transposition_len(&self) -> usize {
        self.self_table.len() + self.opp_table.len()
    }

    fn table(&self, side: Player, root: Player) -> &HashMap<u64, MctsNode> {
        if side == root {
            &self.self_table
        } else {
            &self.opp_table
        }
    }

    fn table_mut(&mut self, side: Player, root: Player) -> &mut HashMap<u64, MctsNode> {
        if side == root {
            &mut self.self_table
        } else {
            &mut self.opp_table
        }
    }

    pub fn search(&mut self, state: &GameState) -> Result<Decision, EngineError> {
        if state.winner.is_some() {
            return Err(EngineError::TerminalState);
        }
        let root = state.current_player;
        let root_key = zobrist::position_key(&state.board, root);
        let mut rng = SmallRng::seed_from_u64(self.config.seed ^ root_key);

        let children = self.expand(state, root_key, root, true, &mut rng)?;
        if children == 0 {
            return Err(EngineError::EmptyMctsRoot);
        }

        for _ in 0..self.config.simulation_count {
            self.simulate(state, root, root_key, &mut rng)?;
        }

        // Most-visited child, Q as the tiebreak.
        let root_node = &self.self_table[&root_key];
        let mut best: Option<(&ChildEdge, f64, f64)> = None;
        for edge in &root_node.children {
            let (visits, q) = match self.table(root.opponent(), root).get(&edge.key) {
                Some(child) => (child.visits, child.q()),
                None => (0.0, 0.0),
            };
            let better = match best {
                None => true,
                Some((_, bv, bq)) => visits > bv || (visits == bv && q > bq),
            };
            if better {
                best = Some((edge, visits, q));
            }
        }
        let (edge, visits, q) = best.ok_or(EngineError::EmptyMctsRoot)?;
        debug!(
            "mcts: {} visits {visits:.0} q {q:.3} ({} table entries)",
            edge.mv,
            self.transposition_len()
        );
        Ok(Decision {
            mv: edge.mv.clone(),
            score: q,
            meta: DecisionMeta {
                engine: "mcts".into(),
                mode: Some("normal".into()),
                nodes: Some(self.config.simulation_count as u64),
                tt_size: Some(self.transposition_len()),
                ..DecisionMeta::default()
            },
        })
    }

    fn simulate(
        &mut self,
        root_state: &GameState,
        root: Player,
        root_key: u64,
        rng: &mut SmallRng,
    ) -> Result<(), EngineError> {
        let mut state = root_state.clone();
        let mut path: Vec<(u64, Player)> = vec![(root_key, root)];

        // Selection: walk expanded nodes by PUCT until a leaf or terminal.
        loop {
            if state.winner.is_some() {
                break;
            }
            let side = state.current_player;
            let key = path.last().unwrap().0;
            let (edge_mv, edge_key) = {
                let node = match self.table(side, root).get(&key) {
                    Some(n) if n.expanded && !n.children.is_empty() => n,
                    _ => break,
                };
                let parent_visits = node.visits.max(1.0);
                let c = self.config.ucb_constant;
                let child_side = side.opponent();
                let mut best_idx = 0;
                let mut best_uct = f64::NEG_INFINITY;
                for (i, edge) in node.children.iter().enumerate() {
                    let (n_child, q) = match self.table(child_side, root).get(&edge.key) {
                        Some(child) => (child.visits, child.q()),
                        None => (0.0, 0.0),
                    };
                    let uct = q + c * edge.prior * parent_visits.sqrt() / (1.0 + n_child);
                    let uct = if uct.is_nan() { 0.0 } else { uct };
                    if uct > best_uct {
                        best_uct = uct;
                        best_idx = i;
                    }
                }
                let edge = &node.children[best_idx];
                (edge.mv.clone(), edge.key)
            };
            state = state.apply(&edge_mv)?;
            path.push((edge_key, state.current_player));
        }

        // Expansion + evaluation.
        let value = if let Some(outcome) = state.winner {
            terminal_value(outcome, root)
        } else {
            let (key, _) = *path.last().unwrap();
            self.expand(&state, key, root, false, rng)?;
            self.rollout(state.clone(), root)?
        };

        // Backup along the path, sign-flipped per side relative to the root.
        self.tick += 1;
        let tick = self.tick;
        for &(key, side) in &path {
            let node = self
                .table_mut(side, root)
                .entry(key)
                .or_insert_with(|| MctsNode::leaf(side, tick));
            node.visits += 1.0;
            node.wins_sum += if side == root { 1.0 - value } else { value };
            node.last_visit_tick = tick;
        }
        self.prune_tables();
        Ok(())
    }

    /// Attach up to `expand_nodes` children below the node for `state`,
    /// scoring RZOP candidates by the oracle policy (Dirichlet-perturbed at
    /// the root) and pairing the strongest cells.
    fn expand(
        &mut self,
        state: &GameState,
        key: u64,
        root: Player,
        is_root: bool,
        rng: &mut SmallRng,
    ) -> Result<usize, EngineError> {
        let side = state.current_player;
        if let Some(node) = self.table(side, root).get(&key) {
            if node.expanded {
                return Ok(node.children.len());
            }
        }

        let out = self.oracle.evaluate(state).map_err(EngineError::Oracle)?;
        let cells = rzop::candidate_cells(state, side);
        let mut scored: Vec<(Pos, f64)> = cells
            .into_iter()
            .map(|p| {
                let prior = out
                    .policy
                    .get(p.index())
                    .copied()
                    .unwrap_or(0.0)
                    .max(POLICY_FLOOR);
                (p, prior)
            })
            .collect();

        if is_root && self.config.dirichlet_epsilon > 0.0 && scored.len() > 1 {
            let gamma = Gamma::new(DIRICHLET_ALPHA, 1.0).expect("valid gamma parameters");
            let mut noise: Vec<f64> = (0..scored.len()).map(|_| gamma.sample(rng)).collect();
            let sum: f64 = noise.iter().sum();
            if sum > 0.0 {
                for n in &mut noise {
                    *n /= sum;
                }
            }
            let eps = self.config.dirichlet_epsilon;
            for (s, n) in scored.iter_mut().zip(noise) {
                s.1 = (1.0 - eps) * s.1 + eps * n;
            }
        }

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(3 * self.config.expand_nodes.max(1));

        let child_side = side.opponent();
        let need = stones_to_place(state.move_number);
        let mut children: Vec<ChildEdge> = Vec::new();
        let mut skipped: Vec<ChildEdge> = Vec::new();
        let mut consider = |mv: Move6, prior: f64, engine: &Self, kept: &mut Vec<ChildEdge>, dropped: &mut Vec<ChildEdge>| {
            let child_state = match state.apply(&mv) {
                Ok(c) => c,
                Err(_) => return,
            };
            let child_key = zobrist::position_key(&child_state.board, child_state.current_player);
            let edge = ChildEdge {
                mv,
                prior,
                key: child_key,
            };
            if let Some(existing) = engine.table(child_side, root).get(&child_key) {
                if existing.visits > SKIP_VISIT_THRESHOLD
                    && existing.q() < engine.config.min_win_rate_threshold
                {
                    dropped.push(edge);
                    return;
                }
            }
            kept.push(edge);
        };

        if need == 1 {
            for &(p, prior) in &scored {
                if children.len() >= self.config.expand_nodes {
                    break;
                }
                consider(
                    Move6::single(side, p),
                    prior,
                    self,
                    &mut children,
                    &mut skipped,
                );
            }
        } else {
            'outer: for i in 0..scored.len() {
                for j in (i + 1)..scored.len() {
                    if children.len() >= self.config.expand_nodes {
                        break 'outer;
                    }
                    let (a, pa) = scored[i];
                    let (b, pb) = scored[j];
                    consider(
                        Move6::pair(side, a, b),
                        pa * pb,
                        self,
                        &mut children,
                        &mut skipped,
                    );
                }
            }
        }
        // Losing transpositions are skipped, but never down to nothing.
        if children.is_empty() {
            if let Some(first) = skipped.into_iter().next() {
                children.push(first);
            }
        }

        let total: f64 = children.iter().map(|c| c.prior).sum();
        if total > 0.0 {
            for c in &mut children {
                c.prior /= total;
            }
        }

        let count = children.len();
        self.tick += 1;
        let tick = self.tick;
        let node = self
            .table_mut(side, root)
            .entry(key)
            .or_insert_with(|| MctsNode::leaf(side, tick));
        node.expanded = true;
        node.children = children;
        self.prune_tables();
        Ok(count)
    }

    /// Bounded semi-random playout: each stone sampled from the top-K policy
    /// candidates proportionally to their scores. Terminal states score 1,
    /// 0 or 0.5 from the root's perspective; otherwise the oracle value of
    /// the final position is projected onto the root.
    fn rollout(&self, mut state: GameState, root: Player) -> Result<f64, EngineError> {
        // Rollout sampling shares the search seed but is keyed on the leaf
        // position so repeated visits explore different lines.
        let mut rng = SmallRng::seed_from_u64(
            self.config.seed ^ zobrist::search_key(&state) ^ self.tick,
        );
        for _ in 0..self.config.simulation_steps {
            if state.winner.is_some() {
                break;
            }
            let side = state.current_player;
            let out = self.oracle.evaluate(&state).map_err(EngineError::Oracle)?;
            let cells = rzop::candidate_cells(&state, side);
            if cells.is_empty() {
                break;
            }
            let mut scored: Vec<(Pos, f64)> = cells
                .into_iter()
                .map(|p| {
                    let s = out
                        .policy
                        .get(p.index())
                        .copied()
                        .unwrap_or(0.0)
                        .max(POLICY_FLOOR);
                    (p, s)
                })
                .collect();
            scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

            let first = sample_top_k(&scored, self.config.rollout_top_k, &mut rng);
            let mv = if stones_to_place(state.move_number) == 1 {
                Move6::single(side, first)
            } else {
                scored.retain(|&(p, _)| p != first);
                if scored.is_empty() {
                    break;
                }
                let second = sample_top_k(&scored, self.config.rollout_top_k, &mut rng);
                Move6::pair(side, first, second)
            };
            match state.apply(&mv) {
                Ok(next) => state = next,
                Err(_) => break,
            }
        }

        if let Some(outcome) = state.winner {
            return Ok(terminal_value(outcome, root));
        }
        let out = self.oracle.evaluate(&state).map_err(EngineError::Oracle)?;
        let q_side = (out.value + 1.0) / 2.0;
        Ok(if state.current_player == root {
            q_side
        } else {
            1.0 - q_side
        })
    }

    fn prune_tables(&mut self) {
        let max = self.config.max_transposition_size.max(1);
        for table in [&mut self.self_table, &mut self.opp_table] {
            if table.len() <= max {
                continue;
            }
            let keep = (max * 9) / 10;
            let mut nodes: Vec<(u64, MctsNode)> = table.drain().collect();
            nodes.sort_by(|a, b| b.1.last_visit_tick.cmp(&a.1.last_visit_tick));
            nodes.truncate(keep);
            *table = nodes.into_iter().collect();
        }
    }
}

fn terminal_value(outcome: GameOutcome, root: Player) -> f64 {
    match outcome {
        GameOutcome::Draw => 0.5,
        GameOutcome::BlackWin => {
            if root == Player::Black {
                1.0
            } else {
                0.0
            }
        }
        GameOutcome::WhiteWin => {
            if root == Player::White {
                1.0
            } else {
                0.0
            }
        }
    }
}

/// Proportional draw over the `k` best-scored cells.
fn sample_top_k(scored: &[(Pos, f64)], k: usize, rng: &mut SmallRng) -> Pos {
    let pool = &scored[..scored.len().min(k.max(1))];
    let total: f64 = pool.iter().map(|s| s.1).sum();
    let mut roll = rng.gen::<f64>() * total;
    for &(p, s) in pool {
        roll -= s;
        if roll <= 0.0 {
            return p;
        }
    }
    pool[pool.len() - 1].0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Board, Cell};
    use crate::oracle::UniformOracle;

    fn state_with(stones: &[(u8, u8, Cell)], to_move: Player, move_number: u32) -> GameState {
        let mut board = Board::empty();
        for &(x, y, c) in stones {
            board.set(Pos::new(x, y), c);
        }
        GameState {
            board,
            current_player: to_move,
            move_number,
            last_move: None,
            winner: None,
        }
    }

    fn small_config(simulations: u32) -> MctsConfig {
        MctsConfig {
            simulation_count: simulations,
            simulation_steps: 4,
            expand_nodes: 8,
            seed: 7,
            ..MctsConfig::default()
        }
    }

    #[test]
    fn search_returns_a_legal_move() {
        let s = state_with(
            &[(9, 9, Cell::Black), (9, 10, Cell::White), (10, 9, Cell::White)],
            Player::Black,
            2,
        );
        let mut engine = MctsEngine::new(UniformOracle, small_config(24));
        let d = engine.search(&s).unwrap();
        assert_eq!(d.mv.positions.len(), 2);
        for &p in &d.mv.positions {
            assert!(s.board.is_empty_at(p));
        }
        assert!((0.0..=1.0).contains(&d.score));
        assert_eq!(d.meta.engine, "mcts");
    }

    #[test]
    fn search_on_terminal_state_is_an_error() {
        let mut s = state_with(&[], Player::Black, 4);
        s.winner = Some(GameOutcome::Draw);
        let mut engine = MctsEngine::new(UniformOracle, small_config(8));
        assert!(matches!(
            engine.search(&s),
            Err(EngineError::TerminalState)
        ));
    }

    #[test]
    fn fixed_seed_reproduces_the_same_decision() {
        let s = state_with(
            &[(9, 9, Cell::Black), (8, 8, Cell::White), (10, 10, Cell::White)],
            Player::Black,
            2,
        );
        let mut a = MctsEngine::new(UniformOracle, small_config(32));
        let mut b = MctsEngine::new(UniformOracle, small_config(32));
        let da = a.search(&s).unwrap();
        let db = b.search(&s).unwrap();
        assert_eq!(da.mv, db.mv);
        assert_eq!(da.score, db.score);
        assert_eq!(a.transposition_len(), b.transposition_len());
    }

    #[test]
    fn tables_grow_and_persist_across_searches() {
        let s = state_with(
            &[(9, 9, Cell::Black), (9, 10, Cell::White), (8, 9, Cell::White)],
            Player::Black,
            2,
        );
        let mut engine = MctsEngine::new(UniformOracle, small_config(16));
        engine.search(&s).unwrap();
        let after_first = engine.transposition_len();
        assert!(after_first > 0);
        engine.search(&s).unwrap();
        assert!(engine.transposition_len() >= after_first);
        engine.reset();
        assert_eq!(engine.transposition_len(), 0);
    }
}
