use anyhow::Result;
use clap::Parser;
use hexabot::board::{stones_to_place, GameOutcome, GameState, Move6, Player, Pos};
use hexabot::hybrid::{HybridEngine, StrategyMode};
use hexabot::mcts::{MctsConfig, MctsEngine};
use hexabot::oracle::UniformOracle;
use hexabot::search::eval::EvaluationWeights;
use hexabot::search::pvs::{PvsEngine, SearchConfig};
use hexabot::selfplay::{self, GaConfig, WeightProfile};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(author, version, about = "Play Connect6 against the engine", long_about = None)]
struct Args {
    /// Operation mode: 'h' play as human, 's' engine self-play, 'g' run the GA optimizer
    #[arg(long, default_value = "h")]
    mode: String,

    /// Your color: 'b' for black, 'w' for white
    #[arg(long, default_value = "b")]
    color: String,

    /// Engine strategy: auto, traditional (PVS) or deep (MCTS)
    #[arg(long, default_value = "auto")]
    strategy: String,

    /// Maximum PVS depth
    #[arg(long, default_value_t = 4)]
    depth: u32,

    /// Per-move time budget in milliseconds
    #[arg(long, default_value_t = 2000)]
    movetime: u64,

    /// MCTS simulations per move
    #[arg(long, default_value_t = 400)]
    simulations: u32,

    /// Load evaluation weights from an exported profile
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Where the GA writes its champion profile
    #[arg(long, default_value = "champion.json")]
    out: PathBuf,

    /// GA population size
    #[arg(long, default_value_t = 12)]
    population: usize,

    /// GA generations
    #[arg(long, default_value_t = 10)]
    generations: usize,

    /// Print search statistics
    #[arg(long)]
    verbose: bool,
}

fn parse_color(s: &str) -> Result<Player> {
    match s.to_lowercase().as_str() {
        "b" | "black" => Ok(Player::Black),
        "w" | "white" => Ok(Player::White),
        _ => anyhow::bail!("Invalid color: use 'b' or 'w'"),
    }
}

fn parse_strategy(s: &str) -> Result<StrategyMode> {
    match s.to_lowercase().as_str() {
        "auto" => Ok(StrategyMode::Auto),
        "traditional" | "pvs" => Ok(StrategyMode::Traditional),
        "deep" | "mcts" => Ok(StrategyMode::Deep),
        _ => anyhow::bail!("Invalid strategy: use auto, traditional or deep"),
    }
}

/// Read one or two cells in "x,y" form, space separated.
fn get_human_move(state: &GameState) -> Result<Move6> {
    let need = stones_to_place(state.move_number);
    loop {
        print!("Enter {need} cell(s) as x,y (e.g. 9,9 10,9): ");
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        let mut cells = Vec::new();
        let mut ok = true;
        for token in input.trim().split_whitespace() {
            let parts: Vec<&str> = token.split(',').collect();
            let parsed = (|| -> Option<Pos> {
                if parts.len() != 2 {
                    return None;
                }
                let x: u8 = parts[0].parse().ok()?;
                let y: u8 = parts[1].parse().ok()?;
                if x >= 19 || y >= 19 {
                    return None;
                }
                Some(Pos::new(x, y))
            })();
            match parsed {
                Some(p) => cells.push(p),
                None => {
                    ok = false;
                    break;
                }
            }
        }
        if !ok || cells.len() != need {
            println!("Invalid input! Give exactly {need} cell(s) like 9,9");
            continue;
        }
        let mv = Move6 {
            player: state.current_player,
            positions: cells,
        };
        match state.apply(&mv) {
            Ok(_) => return Ok(mv),
            Err(e) => println!("Illegal move: {e}"),
        }
    }
}

fn announce(outcome: GameOutcome) {
    match outcome {
        GameOutcome::BlackWin => println!("\nSix in a row! Black wins!"),
        GameOutcome::WhiteWin => println!("\nSix in a row! White wins!"),
        GameOutcome::Draw => println!("\nBoard is full: draw."),
    }
}

fn run_ga(args: &Args) -> Result<()> {
    let cfg = GaConfig {
        population_size: args.population,
        generations: args.generations,
        ..GaConfig::default()
    };
    println!(
        "Optimizing weights: population {}, {} generations",
        cfg.population_size, cfg.generations
    );
    let best = selfplay::optimize(&cfg, |report| {
        println!(
            "generation {:3}: best {:.3} avg {:.3}",
            report.generation, report.best_fitness, report.avg_fitness
        );
    });
    println!("Champion fitness: {:.3}", best.fitness);
    let search_config = SearchConfig {
        max_depth: args.depth,
        time_limit_ms: args.movetime,
        use_multithreading: false,
    };
    let profile = WeightProfile::new(
        "ga-champion",
        best.weights,
        search_config,
        format!(
            "self-play GA, population {} x {} generations",
            cfg.population_size, cfg.generations
        ),
    );
    profile.save(&args.out)?;
    println!("Saved champion profile to {}", args.out.display());
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.mode.starts_with('g') {
        return run_ga(&args);
    }

    let human_color = parse_color(&args.color)?;
    let strategy = parse_strategy(&args.strategy)?;
    let weights = match &args.profile {
        Some(path) => {
            let profile = WeightProfile::load(path)?;
            println!("Loaded profile '{}' from {}", profile.name, path.display());
            profile.weights
        }
        None => EvaluationWeights::default(),
    };
    let search_config = SearchConfig {
        max_depth: args.depth,
        time_limit_ms: args.movetime,
        use_multithreading: false,
    };
    let mcts_config = MctsConfig {
        simulation_count: args.simulations,
        ..MctsConfig::default()
    };
    let mut engine = HybridEngine::new(PvsEngine::new(), MctsEngine::new(UniformOracle, mcts_config));

    let selfplay_mode = args.mode.starts_with('s');
    let mut state = GameState::initial();
    loop {
        if let Some(outcome) = state.winner {
            announce(outcome);
            break;
        }
        println!("\n{} to move (ply {})", state.current_player, state.move_number);
        println!("{}", state.board);

        let human_turn = !selfplay_mode && state.current_player == human_color;
        let mv = if human_turn {
            get_human_move(&state)?
        } else {
            if args.verbose {
                println!("Thinking...");
            }
            let start = Instant::now();
            let decision = engine.decide(&state, &weights, &search_config, strategy)?;
            if args.verbose {
                println!(
                    "engine={} strategy={} score={:.0} depth={:?} nodes={:?} in {:.2}s",
                    decision.meta.engine,
                    decision.meta.strategy,
                    decision.score,
                    decision.meta.depth,
                    decision.meta.nodes,
                    start.elapsed().as_secs_f32()
                );
            }
            println!("Engine plays: {}", decision.mv);
            decision.mv
        };
        state = state.apply(&mv)?;
    }

    Ok(())
}
