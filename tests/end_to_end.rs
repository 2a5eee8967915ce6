use expectimax_2048::engine::{self as GameEngine, transpose, Board, EngineError, Move};
use expectimax_2048::expectimax::{Expectimax, ExpectimaxConfig};
use expectimax_2048::game::{Action, Game, MoveSource, SearchDriven, Turn};
use rand::{rngs::StdRng, Rng, SeedableRng};

#[test]
fn merge_scores_its_result() {
    GameEngine::new();
    let b = Board::from_raw(0x0000_0000_0000_0011);
    assert_eq!(b.score(), 0);
    let merged = b.shift(Move::Left);
    assert_eq!(merged.raw(), 0x0000_0000_0000_0002);
    assert_eq!(merged.score(), 4);
}

#[test]
fn transpose_is_an_involution_on_random_boards() {
    let mut rng = StdRng::seed_from_u64(99);
    for _ in 0..1000 {
        let raw: u64 = rng.gen();
        assert_eq!(transpose(transpose(raw)), raw);
    }
}

#[test]
fn shifting_twice_changes_nothing_more() {
    let mut rng = StdRng::seed_from_u64(5);
    let mut b = Board::initial(&mut rng);
    for i in 0..200 {
        for dir in Move::ALL {
            let once = b.shift(dir);
            assert_eq!(once.shift(dir), once);
        }
        let dir = Move::ALL[i % 4];
        let next = b.shift(dir);
        if next != b {
            b = next.with_random_tile(&mut rng);
        }
        if b.is_game_over() {
            b = Board::initial(&mut rng);
        }
    }
}

#[test]
fn rejects_unknown_direction_codes() {
    assert_eq!(Move::try_from(2), Ok(Move::Left));
    assert_eq!(Move::try_from(4), Err(EngineError::InvalidDirection(4)));
}

#[test]
fn search_driven_game_plays_requested_moves() {
    let search = Expectimax::with_config(ExpectimaxConfig { depth_cap: Some(2), ..Default::default() });
    let mut game = Game::new(SearchDriven::new(search), StdRng::seed_from_u64(17));
    let mut moved = 0;
    let summary = game.run(Some(20), |_, turn| {
        if matches!(turn, Turn::Moved { .. }) {
            moved += 1;
        }
    });
    assert_eq!(summary.moves, 20);
    assert_eq!(moved, 20);
    assert!(summary.highest_tile >= 4);
    assert_eq!(summary.board, game.board());
}

struct Alternating(u32);

impl MoveSource for Alternating {
    fn next_action(&mut self, _board: Board) -> Action {
        self.0 += 1;
        if self.0 % 3 == 0 { Action::Undo } else { Action::Move(Move::ALL[(self.0 % 4) as usize]) }
    }
}

#[test]
fn undo_restores_earlier_positions() {
    let mut game = Game::new(Alternating(0), StdRng::seed_from_u64(3));
    let mut seen = vec![game.board()];
    for _ in 0..60 {
        match game.step() {
            Turn::Moved { .. } => seen.push(game.board()),
            Turn::Undone => {
                seen.pop();
                assert_eq!(Some(&game.board()), seen.last());
            }
            Turn::GameOver | Turn::Quit => break,
            Turn::Illegal(_) | Turn::NothingToUndo => {}
        }
        assert_eq!(game.moves() as usize, seen.len() - 1);
    }
}
