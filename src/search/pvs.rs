//! Iterative-deepening principal-variation search.
//!
//! The root first consults the threat detector: mates are played and
//! opponent mates blocked without spending any depth. Only quiet roots go
//! through deepening, with aspiration windows around the previous score and
//! a monotonic deadline that returns the last fully completed iteration.

use crate::board::{stones_to_place, GameState, Move6, Player, Pos, CENTER};
use crate::errors::EngineError;
use crate::search::eval::{evaluate, EvaluationWeights, DRAW_SCORE, WIN_PLY_BONUS, WIN_SCORE};
use crate::search::tt::{Bound, Entry, Tt};
use crate::search::vcdt::{self, ThreatLevel};
use crate::search::{defense, rzop, zobrist, Decision, DecisionMeta};
use crate::board::GameOutcome;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SearchConfig {
    pub max_depth: u32,
    pub time_limit_ms: u64,
    /// Reserved; the decision core is single-threaded.
    pub use_multithreading: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            max_depth: 4,
            time_limit_ms: 2000,
            use_multithreading: false,
        }
    }
}

impl SearchConfig {
    /// Late-game adjustment: deeper and slower once the board fills up.
    pub fn adjusted_for(mut self, move_number: u32) -> Self {
        if move_number > 24 {
            self.max_depth = (self.max_depth + 1).min(6);
        }
        if move_number > 16 {
            self.time_limit_ms += 400;
        }
        self
    }
}

/// Aspiration half-window around the previous iteration's score.
const ASPIRATION_WINDOW: f64 = 50_000.0;
/// Slice reserved for returning before the hard budget expires.
const DEADLINE_MARGIN_MS: u64 = 100;
/// Candidate and move caps inside quiescence.
const QUIESCENCE_CAP: usize = 30;
const QUIESCENCE_DEPTH: u32 = 2;
const MAX_PLY: usize = 64;
const KILLER_BONUS: [f64; 2] = [40_000.0, 20_000.0];

/// Unordered cell-index pair identifying a move for history/killer tables.
type MoveKey = (u16, u16);

fn move_key(m: &Move6) -> MoveKey {
    let a = m.positions[0].index() as u16;
    if m.positions.len() == 1 {
        (a, u16::MAX)
    } else {
        let b = m.positions[1].index() as u16;
        (a.min(b), a.max(b))
    }
}

enum RootOutcome {
    Done { mv: Move6, score: f64 },
    Aborted,
}

pub struct PvsEngine {
    tt: Tt,
    killers: Vec<[Option<MoveKey>; 2]>,
    history: HashMap<MoveKey, f64>,
    nodes: u64,
    deadline: Option<Instant>,
}

impl Default for PvsEngine {
    fn default() -> Self {
        PvsEngine {
            tt: Tt::new(),
            killers: vec![[None; 2]; MAX_PLY],
            history: HashMap::new(),
            nodes: 0,
            deadline: None,
        }
    }
}

impl PvsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all per-position state. Call between unrelated games; within one
    /// game the transposition table carries over and speeds up later turns.
    pub fn reset(&mut self) {
        self.tt.clear();
        self.history.clear();
        self.killers = vec![[None; 2]; MAX_PLY];
    }

    pub fn search(
        &mut self,
        state: &GameState,
        weights: &EvaluationWeights,
        config: &SearchConfig,
    ) -> Result<Decision, EngineError> {
        if state.winner.is_some() {
            return Err(EngineError::TerminalState);
        }
        let player = state.current_player;
        self.nodes = 0;
        self.history.clear();
        self.killers = vec![[None; 2]; MAX_PLY];

        // The only book move: Black's opening stone takes the center.
        if state.board.stone_count() == 0 && stones_to_place(state.move_number) == 1 {
            let mut d = self.decision(Move6::single(player, CENTER), 0.0, "normal");
            d.meta.reason = Some("opening_book".into());
            return Ok(d);
        }

        if let Some(found) = self.root_forcing(state, player, weights)? {
            return Ok(found);
        }

        self.iterative_deepening(state, player, weights, config)
    }

    fn decision(&self, mv: Move6, score: f64, mode: &str) -> Decision {
        Decision {
            mv,
            score,
            meta: DecisionMeta {
                engine: "pvs".into(),
                mode: Some(mode.into()),
                nodes: Some(self.nodes),
                tt_size: Some(self.tt.len()),
                ..DecisionMeta::default()
            },
        }
    }

    /// A second stone to accompany a forced placement: the best remaining
    /// candidate, or any empty cell.
    fn companion(&self, state: &GameState, player: Player, taken: &[Pos]) -> Option<Pos> {
        rzop::candidate_cells(state, player)
            .into_iter()
            .find(|p| !taken.contains(p))
            .or_else(|| state.board.empties().find(|p| !taken.contains(p)))
    }

    /// Root threat ladder: win now, or neutralize whatever wins for the
    /// opponent next turn. Returns None when the position is quiet.
    fn root_forcing(
        &mut self,
        state: &GameState,
        player: Player,
        weights: &EvaluationWeights,
    ) -> Result<Option<Decision>, EngineError> {
        let need = stones_to_place(state.move_number);
        let opponent = player.opponent();

        // Mover mate: one stone finishes six.
        let my_mates = vcdt::mate_cells(state, player);
        if let Some(&mate) = my_mates.first() {
            let mv = if need == 1 {
                Move6::single(player, mate)
            } else {
                let second = my_mates
                    .iter()
                    .copied()
                    .find(|&p| p != mate)
                    .or_else(|| self.companion(state, player, &[mate]))
                    .ok_or(EngineError::NoCandidate)?;
                Move6::pair(player, mate, second)
            };
            let mut d = self.decision(mv, WIN_SCORE, "vcdt_root");
            d.meta.reason = Some("mate".into());
            return Ok(Some(d));
        }

        // Mover pair win: both stones of this turn finish six. Among the
        // winning pairs prefer the one whose cells appear in the most pairs.
        if need == 2 {
            let my_pairs = vcdt::pair_wins(state, player);
            if !my_pairs.is_empty() {
                let mut coverage: HashMap<Pos, usize> = HashMap::new();
                for pair in &my_pairs {
                    for &p in pair {
                        *coverage.entry(p).or_default() += 1;
                    }
                }
                let best = my_pairs
                    .iter()
                    .max_by_key(|pair| {
                        let cov = coverage[&pair[0]] + coverage[&pair[1]];
                        let centrality =
                            pair[0].manhattan(CENTER) + pair[1].manhattan(CENTER);
                        (cov, std::cmp::Reverse((centrality, pair[0], pair[1])))
                    })
                    .unwrap();
                let mv = Move6::pair(player, best[0], best[1]);
                let mut d = self.decision(mv, WIN_SCORE, "vcdt_root");
                d.meta.reason = Some("pair_win".into());
                return Ok(Some(d));
            }
        }

        // Opponent wins next turn unless hit: mates are one-cell units, pair
        // wins two-cell units; two stones must cover as much as possible.
        let opp_mates = vcdt::mate_cells(state, opponent);
        let opp_pairs = vcdt::pair_wins(state, opponent);
        if need == 2 && !opp_pairs.is_empty() {
            let mv = self.block_winning_units(state, player, &opp_mates, &opp_pairs)?;
            let child = state.apply(&mv)?;
            let score = evaluate(&child, player, weights);
            let mut d = self.decision(mv, score, "vcdt_root");
            d.meta.reason = Some("block_pair_win".into());
            return Ok(Some(d));
        }
        if let Some(&mate) = opp_mates.first() {
            let mv = if need == 1 {
                Move6::single(player, mate)
            } else {
                let second = self
                    .companion(state, player, &[mate])
                    .ok_or(EngineError::NoCandidate)?;
                Move6::pair(player, mate, second)
            };
            let child = state.apply(&mv)?;
            let score = evaluate(&child, player, weights);
            let mut d = self.decision(mv, score, "vcdt_root");
            d.meta.reason = Some("block_mate".into());
            return Ok(Some(d));
        }

        // Opponent live four: spend as little as possible on the block.
        if need == 2 {
            let opp_fours = vcdt::live_fours(state, opponent);
            if let Some(threat) = opp_fours.first() {
                let mv = defense::defend_live_four(state, player, threat);
                let child = state.apply(&mv)?;
                let score = evaluate(&child, player, weights);
                let mut d = self.decision(mv, score, "vcdt_root");
                d.meta.reason = Some("smart_defense".into());
                return Ok(Some(d));
            }
        }

        Ok(None)
    }

    /// Pick two blocking cells against the opponent's winning units. A cell
    /// covering every unit gets a developing companion; a lone pair is
    /// blocked on both cells; otherwise greedy max-coverage, preferring mate
    /// cells since only they can stop their unit.
    fn block_winning_units(
        &self,
        state: &GameState,
        player: Player,
        opp_mates: &[Pos],
        opp_pairs: &[[Pos; 2]],
    ) -> Result<Move6, EngineError> {
        let mut units: Vec<Vec<Pos>> = opp_mates.iter().map(|&m| vec![m]).collect();
        units.extend(opp_pairs.iter().map(|p| p.to_vec()));

        let mut coverage: HashMap<Pos, usize> = HashMap::new();
        for unit in &units {
            for &p in unit {
                *coverage.entry(p).or_default() += 1;
            }
        }

        let covers_all = coverage
            .iter()
            .filter(|e| *e.1 == units.len())
            .map(|e| *e.0)
            .min_by_key(|p| (p.manhattan(CENTER), *p));
        if let Some(all) = covers_all {
            let second = self
                .companion(state, player, &[all])
                .ok_or(EngineError::NoCandidate)?;
            return Ok(Move6::pair(player, all, second));
        }
        if units.len() == 1 && units[0].len() == 2 {
            return Ok(Move6::pair(player, units[0][0], units[0][1]));
        }

        let pick = |cov: &HashMap<Pos, usize>, units: &[Vec<Pos>], mates: &[Pos]| -> Pos {
            *cov.keys()
                .max_by_key(|&&p| {
                    let hits = units.iter().filter(|u| u.contains(&p)).count();
                    let is_mate = mates.contains(&p);
                    (hits, is_mate, std::cmp::Reverse((p.manhattan(CENTER), p)))
                })
                .unwrap()
        };
        let first = pick(&coverage, &units, opp_mates);
        let remaining: Vec<Vec<Pos>> = units
            .iter()
            .filter(|u| !u.contains(&first))
            .cloned()
            .collect();
        let second = if remaining.is_empty() {
            self.companion(state, player, &[first])
                .ok_or(EngineError::NoCandidate)?
        } else {
            let mut cov2: HashMap<Pos, usize> = HashMap::new();
            for unit in &remaining {
                for &p in unit {
                    if p != first {
                        *cov2.entry(p).or_default() += 1;
                    }
                }
            }
            pick(&cov2, &remaining, opp_mates)
        };
        Ok(Move6::pair(player, first, second))
    }

    fn generate_moves(&self, state: &GameState, player: Player, cap: usize) -> Vec<Move6> {
        let cells = rzop::candidate_cells(state, player);
        if stones_to_place(state.move_number) == 1 {
            rzop::enumerate_single_moves(player, &cells)
        } else {
            rzop::enumerate_pair_moves(state, player, &cells, cap)
        }
    }

    fn no_candidate_fallback(
        &self,
        state: &GameState,
        player: Player,
    ) -> Result<Decision, EngineError> {
        let mut empties = state.board.empties();
        let mv = if stones_to_place(state.move_number) == 1 {
            Move6::single(player, empties.next().ok_or(EngineError::NoCandidate)?)
        } else {
            let a = empties.next().ok_or(EngineError::NoCandidate)?;
            let b = empties.next().ok_or(EngineError::NoCandidate)?;
            Move6::pair(player, a, b)
        };
        Ok(self.decision(mv, 0.0, "no_candidate_fallback"))
    }

    fn iterative_deepening(
        &mut self,
        state: &GameState,
        player: Player,
        weights: &EvaluationWeights,
        config: &SearchConfig,
    ) -> Result<Decision, EngineError> {
        let mut moves = self.generate_moves(state, player, rzop::PAIR_CAP);
        if moves.is_empty() {
            return self.no_candidate_fallback(state, player);
        }
        let budget = Duration::from_millis(config.time_limit_ms.saturating_sub(DEADLINE_MARGIN_MS));
        self.deadline = Some(Instant::now() + budget);

        self.order_root_moves(state, player, weights, &mut moves);
        let mut best_mv = moves[0].clone();
        let mut best_score = 0.0;
        let mut completed_depth = 0;
        let mut last_score = 0.0;

        'deepening: for d in 1..=config.max_depth.max(1) {
            if d > 1 {
                self.order_root_moves(state, player, weights, &mut moves);
            }
            let mut aspirating = d >= 2;
            loop {
                let (alpha, beta) = if aspirating {
                    (last_score - ASPIRATION_WINDOW, last_score + ASPIRATION_WINDOW)
                } else {
                    (f64::NEG_INFINITY, f64::INFINITY)
                };
                match self.search_root(state, weights, &moves, d, alpha, beta) {
                    RootOutcome::Aborted => break 'deepening,
                    RootOutcome::Done { mv, score } => {
                        if aspirating && (score <= alpha || score >= beta) {
                            debug!("depth {d}: aspiration fail ({score:.0}), re-searching wide");
                            aspirating = false;
                            continue;
                        }
                        best_mv = mv;
                        best_score = score;
                        last_score = score;
                        completed_depth = d;
                        debug!(
                            "depth {d}: best {} score {score:.0} nodes {}",
                            best_mv, self.nodes
                        );
                        break;
                    }
                }
            }
            if self.deadline_passed() {
                break;
            }
        }
        self.deadline = None;

        let mut d = self.decision(best_mv, best_score, "normal");
        d.meta.depth = Some(completed_depth);
        Ok(d)
    }

    fn search_root(
        &mut self,
        state: &GameState,
        weights: &EvaluationWeights,
        moves: &[Move6],
        depth: u32,
        mut alpha: f64,
        beta: f64,
    ) -> RootOutcome {
        let mut best: Option<(Move6, f64)> = None;
        for (idx, m) in moves.iter().enumerate() {
            if self.deadline_passed() {
                // Partial iterations are discarded; the caller keeps the
                // previous depth's answer.
                return RootOutcome::Aborted;
            }
            let child = match state.apply(m) {
                Ok(c) => c,
                Err(_) => continue,
            };
            let score = if idx == 0 {
                -self.pvs(&child, depth - 1, -beta, -alpha, 1, weights)
            } else {
                let null = -self.pvs(&child, depth - 1, -(alpha + 1.0), -alpha, 1, weights);
                if null > alpha {
                    -self.pvs(&child, depth - 1, -beta, -alpha, 1, weights)
                } else {
                    null
                }
            };
            if best.as_ref().map_or(true, |(_, s)| score > *s) {
                best = Some((m.clone(), score));
            }
            if score > alpha {
                alpha = score;
                *self.history.entry(move_key(m)).or_default() += (depth * depth) as f64;
            }
            if alpha >= beta {
                break;
            }
        }
        match best {
            Some((mv, score)) => RootOutcome::Done { mv, score },
            None => RootOutcome::Aborted,
        }
    }

    fn pvs(
        &mut self,
        state: &GameState,
        depth: u32,
        mut alpha: f64,
        beta: f64,
        ply: usize,
        weights: &EvaluationWeights,
    ) -> f64 {
        self.nodes += 1;
        if let Some(outcome) = state.winner {
            // The previous mover produced this; deeper remaining depth means
            // a faster win, which should be preferred.
            return match outcome {
                GameOutcome::Draw => DRAW_SCORE,
                _ => -(WIN_SCORE + WIN_PLY_BONUS * depth as f64),
            };
        }
        if self.deadline_passed() {
            return evaluate(state, state.current_player, weights);
        }

        let key = zobrist::search_key(state);
        if let Some(e) = self.tt.get(key) {
            if e.depth >= depth {
                match e.bound {
                    Bound::Exact => return e.score,
                    Bound::Lower => {
                        if e.score >= beta {
                            return e.score;
                        }
                    }
                    Bound::Upper => {
                        if e.score <= alpha {
                            return e.score;
                        }
                    }
                }
            }
        }

        if depth == 0 {
            return self.quiescence(state, alpha, beta, QUIESCENCE_DEPTH, weights);
        }

        let player = state.current_player;
        let mut moves = self.generate_moves(state, player, rzop::PAIR_CAP);
        if moves.is_empty() {
            return evaluate(state, player, weights);
        }
        self.order_interior_moves(&mut moves, ply);
        if let Some(e) = self.tt.get(key) {
            if let Some(ttm) = e.best.clone() {
                if let Some(pos) = moves.iter().position(|m| move_key(m) == move_key(&ttm)) {
                    let m = moves.remove(pos);
                    moves.insert(0, m);
                }
            }
        }

        let orig_alpha = alpha;
        let mut best = f64::NEG_INFINITY;
        let mut best_move: Option<Move6> = None;
        for (idx, m) in moves.iter().enumerate() {
            let child = match state.apply(m) {
                Ok(c) => c,
                Err(_) => continue,
            };
            let score = if idx == 0 {
                -self.pvs(&child, depth - 1, -beta, -alpha, ply + 1, weights)
            } else {
                let null = -self.pvs(&child, depth - 1, -(alpha + 1.0), -alpha, ply + 1, weights);
                if null > alpha && null < beta {
                    -self.pvs(&child, depth - 1, -beta, -alpha, ply + 1, weights)
                } else {
                    null
                }
            };
            if score > best {
                best = score;
                best_move = Some(m.clone());
            }
            if best > alpha {
                alpha = best;
                *self.history.entry(move_key(m)).or_default() += (depth * depth) as f64;
            }
            if alpha >= beta {
                self.update_killers(ply, move_key(m));
                break;
            }
            if self.deadline_passed() {
                break;
            }
        }

        let bound = if best <= orig_alpha {
            Bound::Upper
        } else if best >= beta {
            Bound::Lower
        } else {
            Bound::Exact
        };
        self.tt.put(Entry {
            key,
            depth,
            score: best,
            best: best_move,
            bound,
        });
        best
    }

    /// Tactical extension past the horizon: stand pat on the static score,
    /// then try a handful of zone moves for up to two plies.
    fn quiescence(
        &mut self,
        state: &GameState,
        mut alpha: f64,
        beta: f64,
        qdepth: u32,
        weights: &EvaluationWeights,
    ) -> f64 {
        self.nodes += 1;
        if let Some(outcome) = state.winner {
            return match outcome {
                GameOutcome::Draw => DRAW_SCORE,
                _ => -WIN_SCORE,
            };
        }
        let player = state.current_player;
        let stand = evaluate(state, player, weights);
        if qdepth == 0 {
            return stand;
        }
        if stand >= beta {
            return beta;
        }
        if stand > alpha {
            alpha = stand;
        }

        let mut cells = rzop::candidate_cells(state, player);
        cells.truncate(QUIESCENCE_CAP);
        let moves = if stones_to_place(state.move_number) == 1 {
            rzop::enumerate_single_moves(player, &cells)
        } else {
            rzop::enumerate_pair_moves(state, player, &cells, QUIESCENCE_CAP)
        };
        for m in moves {
            let child = match state.apply(&m) {
                Ok(c) => c,
                Err(_) => continue,
            };
            let score = -self.quiescence(&child, -beta, -alpha, qdepth - 1, weights);
            if score >= beta {
                return beta;
            }
            if score > alpha {
                alpha = score;
            }
            if self.deadline_passed() {
                break;
            }
        }
        alpha
    }

    /// Root ordering: child evaluation blended with history, killers and the
    /// threats a move creates or concedes.
    fn order_root_moves(
        &mut self,
        state: &GameState,
        player: Player,
        weights: &EvaluationWeights,
        moves: &mut Vec<Move6>,
    ) {
        let opponent = player.opponent();
        let mut scored: Vec<(f64, Move6)> = moves
            .drain(..)
            .map(|m| {
                let score = match state.apply(&m) {
                    Ok(child) => {
                        let mut s = evaluate(&child, player, weights);
                        let mine = vcdt::find_threats(&child, player);
                        if mine.iter().any(|t| t.level == ThreatLevel::Mate) {
                            s += 200_000.0;
                        }
                        if mine.iter().any(|t| t.level == ThreatLevel::PairWin) {
                            s += 100_000.0;
                        }
                        s += 10_000.0
                            * mine
                                .iter()
                                .filter(|t| t.level == ThreatLevel::LiveFour)
                                .count() as f64;
                        let theirs = vcdt::find_threats(&child, opponent);
                        if theirs.iter().any(|t| t.level == ThreatLevel::Mate) {
                            s -= 180_000.0;
                        }
                        if theirs.iter().any(|t| t.level == ThreatLevel::PairWin) {
                            s -= 90_000.0;
                        }
                        s -= 80_000.0
                            * theirs
                                .iter()
                                .filter(|t| t.level == ThreatLevel::LiveFour)
                                .count() as f64;
                        s += self.history.get(&move_key(&m)).copied().unwrap_or(0.0) * 100.0;
                        s += self.killer_bonus(0, move_key(&m));
                        s
                    }
                    Err(_) => f64::NEG_INFINITY,
                };
                (score, m)
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        *moves = scored.into_iter().map(|(_, m)| m).collect();
    }

    /// Interior ordering stays cheap: the generator's urgency order, bent by
    /// history and killer hits.
    fn order_interior_moves(&self, moves: &mut [Move6], ply: usize) {
        moves.sort_by(|a, b| {
            let sa = self.history.get(&move_key(a)).copied().unwrap_or(0.0)
                + self.killer_bonus(ply, move_key(a));
            let sb = self.history.get(&move_key(b)).copied().unwrap_or(0.0)
                + self.killer_bonus(ply, move_key(b));
            sb.partial_cmp(&sa).unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    fn update_killers(&mut self, ply: usize, key: MoveKey) {
        if ply >= self.killers.len() {
            return;
        }
        let slot = &mut self.killers[ply];
        if slot[0] == Some(key) {
            return;
        }
        slot[1] = slot[0];
        slot[0] = Some(key);
    }

    fn killer_bonus(&self, ply: usize, key: MoveKey) -> f64 {
        if ply >= self.killers.len() {
            return 0.0;
        }
        let slot = &self.killers[ply];
        if slot[0] == Some(key) {
            KILLER_BONUS[0]
        } else if slot[1] == Some(key) {
            KILLER_BONUS[1]
        } else {
            0.0
        }
    }

    #[inline]
    fn deadline_passed(&self) -> bool {
        self.deadline.map_or(false, |dl| Instant::now() >= dl)
    }

    pub fn nodes(&self) -> u64 {
        self.nodes
    }

    pub fn tt_len(&self) -> usize {
        self.tt.len()
    }
}
