//! Self-play GA tuning of the evaluation weight vector.
//!
//! Each individual is scored by short self-games driven by the PVS engine
//! with its own weights; selection is fitness-proportionate, crossover is the
//! arithmetic mean, and mutation jitters each field by up to 7.5%. The best
//! individual ever seen is tracked across generations and can be exported as
//! a portable JSON profile.

use crate::board::{GameOutcome, GameState, Player};
use crate::search::eval::{evaluate, EvaluationWeights};
use crate::search::pvs::{PvsEngine, SearchConfig};
use anyhow::{Context, Result};
use chrono::Utc;
use log::{debug, info};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct GaConfig {
    pub population_size: usize,
    pub generations: usize,
    pub match_count: usize,
    pub mutation_rate: f64,
    pub seed: u64,
}

impl Default for GaConfig {
    fn default() -> Self {
        GaConfig {
            population_size: 12,
            generations: 10,
            match_count: 4,
            mutation_rate: 0.2,
            seed: 42,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Individual {
    pub weights: EvaluationWeights,
    pub fitness: f64,
}

#[derive(Clone, Debug)]
pub struct GenerationReport {
    pub generation: usize,
    pub best_fitness: f64,
    pub avg_fitness: f64,
    pub champion: EvaluationWeights,
}

/// Mutation clamp for every weight field.
const WEIGHT_MIN: f64 = 50.0;
const WEIGHT_MAX: f64 = 20_000.0;
/// Relative mutation half-width.
const MUTATION_SPAN: f64 = 0.075;
/// Self-game bounds: ply cap and per-move budget.
const MATCH_PLY_CAP: usize = 36;
const MATCH_TIME_MS: u64 = 120;
/// Shallower searches for the opening plies of a fitness game.
const EARLY_PLIES: usize = 10;

pub fn random_weights(rng: &mut SmallRng) -> EvaluationWeights {
    EvaluationWeights {
        road3: rng.gen_range(80.0..=120.0),
        road4: rng.gen_range(300.0..=400.0),
        live4: rng.gen_range(2500.0..=3500.0),
        live5: rng.gen_range(8000.0..=12_000.0),
        vcdt_bonus: rng.gen_range(1000.0..=2000.0),
    }
}

/// Run the optimizer, reporting each generation through `progress`. Returns
/// the best individual seen across all generations.
pub fn optimize<F: FnMut(&GenerationReport)>(cfg: &GaConfig, mut progress: F) -> Individual {
    let mut rng = SmallRng::seed_from_u64(cfg.seed);
    let pop_size = cfg.population_size.max(2);
    let generations = cfg.generations.max(1);
    let mut population: Vec<EvaluationWeights> =
        (0..pop_size).map(|_| random_weights(&mut rng)).collect();
    let mut best: Option<Individual> = None;

    for generation in 0..generations {
        let fitnesses: Vec<f64> = population
            .iter()
            .map(|w| fitness(w, cfg.match_count))
            .collect();

        let (best_idx, &best_fitness) = fitnesses
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .expect("population is never empty");
        if best.as_ref().map_or(true, |b| best_fitness > b.fitness) {
            best = Some(Individual {
                weights: population[best_idx],
                fitness: best_fitness,
            });
        }
        let avg_fitness = fitnesses.iter().sum::<f64>() / fitnesses.len() as f64;
        let report = GenerationReport {
            generation,
            best_fitness,
            avg_fitness,
            champion: best.as_ref().expect("set above").weights,
        };
        info!(
            "generation {}: best {:.3} avg {:.3}",
            report.generation, report.best_fitness, report.avg_fitness
        );
        progress(&report);

        let mut next = Vec::with_capacity(pop_size);
        while next.len() < pop_size {
            let a = select(&population, &fitnesses, &mut rng);
            let b = select(&population, &fitnesses, &mut rng);
            let mut child = crossover(&a, &b);
            mutate(&mut child, cfg.mutation_rate, &mut rng);
            next.push(child);
        }
        population = next;
    }

    best.expect("the generation loop runs at least once")
}

/// Mean match score over `match_count` self-games.
fn fitness(weights: &EvaluationWeights, match_count: usize) -> f64 {
    let n = match_count.max(1);
    let total: f64 = (0..n).map(|k| play_match(weights, k)).sum();
    total / n as f64
}

/// One self-game under the individual's weights. The rules always give the
/// opening ply to Black; `k` labels the match within the individual's slate.
/// Scored as win bonus (Black 1, White 0, draw 1/2) plus small longevity and
/// evaluation-stability bonuses.
fn play_match(weights: &EvaluationWeights, k: usize) -> f64 {
    let mut engine = PvsEngine::new();
    let mut state = GameState::initial();
    let mut steps = 0usize;
    while state.winner.is_none() && steps < MATCH_PLY_CAP {
        let depth = if steps < EARLY_PLIES { 2 } else { 3 };
        let cfg = SearchConfig {
            max_depth: depth,
            time_limit_ms: MATCH_TIME_MS,
            use_multithreading: false,
        };
        let decision = match engine.search(&state, weights, &cfg) {
            Ok(d) => d,
            Err(e) => {
                debug!("match {k} stopped at ply {steps}: {e}");
                break;
            }
        };
        match state.apply(&decision.mv) {
            Ok(next) => {
                state = next;
                steps += 1;
            }
            Err(e) => {
                debug!("match {k}: engine produced an unplayable move: {e}");
                break;
            }
        }
    }

    let win_bonus = match state.winner {
        Some(GameOutcome::BlackWin) => 1.0,
        Some(GameOutcome::WhiteWin) => 0.0,
        Some(GameOutcome::Draw) | None => 0.5,
    };
    let longevity = (steps as f64 / 40.0) * 0.1;
    let final_eval = evaluate(&state, Player::Black, weights)
        .abs()
        .min(50_000.0);
    let stability = (final_eval / 50_000.0) * 0.05;
    win_bonus + longevity + stability
}

/// Fitness-proportionate (roulette-wheel) selection.
fn select(
    population: &[EvaluationWeights],
    fitnesses: &[f64],
    rng: &mut SmallRng,
) -> EvaluationWeights {
    let total: f64 = fitnesses.iter().map(|f| f.max(0.0)).sum();
    if total <= 0.0 {
        return population[rng.gen_range(0..population.len())];
    }
    let mut roll = rng.gen::<f64>() * total;
    for (w, f) in population.iter().zip(fitnesses) {
        roll -= f.max(0.0);
        if roll <= 0.0 {
            return *w;
        }
    }
    population[population.len() - 1]
}

/// Arithmetic-mean crossover, field by field.
fn crossover(a: &EvaluationWeights, b: &EvaluationWeights) -> EvaluationWeights {
    EvaluationWeights {
        road3: (a.road3 + b.road3) / 2.0,
        road4: (a.road4 + b.road4) / 2.0,
        live4: (a.live4 + b.live4) / 2.0,
        live5: (a.live5 + b.live5) / 2.0,
        vcdt_bonus: (a.vcdt_bonus + b.vcdt_bonus) / 2.0,
    }
}

/// Each field independently jittered by up to +-7.5% with probability
/// `rate`, then clamped to the legal weight range.
fn mutate(w: &mut EvaluationWeights, rate: f64, rng: &mut SmallRng) {
    for field in [
        &mut w.road3,
        &mut w.road4,
        &mut w.live4,
        &mut w.live5,
        &mut w.vcdt_bonus,
    ] {
        if rng.gen::<f64>() < rate {
            let factor = 1.0 + rng.gen_range(-MUTATION_SPAN..=MUTATION_SPAN);
            *field = (*field * factor).clamp(WEIGHT_MIN, WEIGHT_MAX);
        }
    }
}

/// Portable snapshot of a tuned weight vector.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WeightProfile {
    pub name: String,
    pub exported_at: String,
    pub weights: EvaluationWeights,
    pub search_config: SearchConfig,
    pub note: String,
}

impl WeightProfile {
    pub fn new(
        name: impl Into<String>,
        weights: EvaluationWeights,
        search_config: SearchConfig,
        note: impl Into<String>,
    ) -> Self {
        WeightProfile {
            name: name.into(),
            exported_at: Utc::now().to_rfc3339(),
            weights,
            search_config,
            note: note.into(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("serializing weight profile")
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("parsing weight profile")
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path.as_ref(), self.to_json()?)
            .with_context(|| format!("writing {}", path.as_ref().display()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref())
            .with_context(|| format!("reading {}", path.as_ref().display()))?;
        Self::from_json(&raw)
    }
}
