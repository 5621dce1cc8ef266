use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hexabot::board::{Board, Cell, GameState, Player, Pos};
use hexabot::search::eval::{evaluate, EvaluationWeights};

fn midgame_state() -> GameState {
    let mut board = Board::empty();
    for i in 0..5u8 {
        board.set(Pos::new(6 + i, 9), Cell::Black);
        board.set(Pos::new(6 + i, 10), Cell::White);
    }
    board.set(Pos::new(4, 4), Cell::Black);
    board.set(Pos::new(14, 14), Cell::White);
    GameState {
        board,
        current_player: Player::Black,
        move_number: 6,
        last_move: None,
        winner: None,
    }
}

fn bench_eval(c: &mut Criterion) {
    let state = midgame_state();
    let w = EvaluationWeights::default();
    c.bench_function("evaluate_midgame", |b| {
        b.iter(|| {
            let v = evaluate(black_box(&state), Player::Black, &w);
            black_box(v)
        })
    });
}

criterion_group!(benches, bench_eval);
criterion_main!(benches);
