use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hexabot::board::{Board, Cell, GameState, Player, Pos};
use hexabot::search::eval::EvaluationWeights;
use hexabot::search::pvs::{PvsEngine, SearchConfig};
use hexabot::search::rzop;

fn quiet_state() -> GameState {
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
    GameState {
        board,
        current_player: Player::Black,
        move_number: 4,
        last_move: None,
        winner: None,
    }
}

fn bench_candidates(c: &mut Criterion) {
    let state = quiet_state();
    c.bench_function("rzop_candidates", |b| {
        b.iter(|| {
            let cells = rzop::candidate_cells(black_box(&state), Player::Black);
            black_box(cells)
        })
    });
}

fn bench_search_depth2(c: &mut Criterion) {
    let state = quiet_state();
    let w = EvaluationWeights::default();
    let cfg = SearchConfig {
        max_depth: 2,
        time_limit_ms: 5000,
        use_multithreading: false,
    };
    c.bench_function("pvs_depth2_quiet", |b| {
        b.iter(|| {
            let mut engine = PvsEngine::new();
            let d = engine.search(black_box(&state), &w, &cfg).unwrap();
            black_box(d)
        })
    });
}

criterion_group!(benches, bench_candidates, bench_search_depth2);
criterion_main!(benches);
