//! Turn loop around the engine: where moves come from, tile spawning,
//! score bookkeeping and undo.
//!
//! ```
//! use expectimax_2048::expectimax::Expectimax;
//! use expectimax_2048::game::{Game, SearchDriven};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut game = Game::new(SearchDriven::new(Expectimax::new()), StdRng::seed_from_u64(1));
//! let summary = game.run(Some(5), |_, _| {});
//! assert_eq!(summary.moves, 5);
//! ```

use std::collections::VecDeque;
use std::io::BufRead;

use rand::Rng;
use tracing::warn;

use crate::engine::{draw_tile, Board, Move, Rank, Score};
use crate::expectimax::Expectimax;

/// How many past positions can be taken back.
pub const UNDO_CAPACITY: usize = 64;

/// Points the classic score over-credits for a spawned "4", which was never merged.
const FOUR_SPAWN_PENALTY: Score = 4;

/// What a player wants to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Move(Move),
    Undo,
    Quit,
}

/// A source of player decisions, chosen when the game is built.
pub trait MoveSource {
    fn next_action(&mut self, board: Board) -> Action;
}

impl<T: MoveSource + ?Sized> MoveSource for Box<T> {
    fn next_action(&mut self, board: Board) -> Action { (**self).next_action(board) }
}

/// Moves picked by the expectimax search.
pub struct SearchDriven {
    search: Expectimax,
}

impl SearchDriven {
    pub fn new(search: Expectimax) -> Self { Self { search } }

    pub fn search(&self) -> &Expectimax { &self.search }
}

impl MoveSource for SearchDriven {
    fn next_action(&mut self, board: Board) -> Action {
        match self.search.best_move(board) {
            Some(dir) => Action::Move(dir),
            None => Action::Quit,
        }
    }
}

/// Moves typed by a person, one command per line.
///
/// `w`/`k` up, `s`/`j` down, `a`/`h` left, `d`/`l` right, `r` undo, `q` quit.
/// The first recognised key on a line wins; lines without one are skipped.
pub struct HumanDriven<R> {
    input: R,
    line: String,
}

impl<R: BufRead> HumanDriven<R> {
    pub fn new(input: R) -> Self { Self { input, line: String::new() } }
}

impl<R: BufRead> MoveSource for HumanDriven<R> {
    fn next_action(&mut self, _board: Board) -> Action {
        loop {
            self.line.clear();
            match self.input.read_line(&mut self.line) {
                Ok(0) => return Action::Quit,
                Ok(_) => {
                    if let Some(action) = self.line.chars().find_map(parse_key) {
                        return action;
                    }
                }
                Err(err) => {
                    warn!(error = %err, "failed to read move; quitting");
                    return Action::Quit;
                }
            }
        }
    }
}

/// Map a single key to an action (vi keys work too).
pub fn parse_key(key: char) -> Option<Action> {
    let action = match key.to_ascii_lowercase() {
        'w' | 'k' => Action::Move(Move::Up),
        's' | 'j' => Action::Move(Move::Down),
        'a' | 'h' => Action::Move(Move::Left),
        'd' | 'l' => Action::Move(Move::Right),
        'r' => Action::Undo,
        'q' => Action::Quit,
        _ => return None,
    };
    Some(action)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Snapshot {
    board: Board,
    penalty: Score,
}

/// Bounded history of positions; the oldest entry falls off when full.
#[derive(Debug, Clone)]
pub struct UndoRing {
    entries: VecDeque<Snapshot>,
    capacity: usize,
}

impl UndoRing {
    pub fn new(capacity: usize) -> Self {
        Self { entries: VecDeque::with_capacity(capacity), capacity }
    }

    /// Remember `board` together with the penalty charged by the move played from it.
    pub fn push(&mut self, board: Board, penalty: Score) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(Snapshot { board, penalty });
    }

    /// Most recent position and its penalty, if any.
    pub fn pop(&mut self) -> Option<(Board, Score)> {
        self.entries.pop_back().map(|s| (s.board, s.penalty))
    }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

impl Default for UndoRing {
    fn default() -> Self { Self::new(UNDO_CAPACITY) }
}

/// Outcome of a single [`Game::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    /// A legal move was played and a tile of rank `spawned` appeared.
    Moved { dir: Move, spawned: Rank },
    /// The move would not change the board; nothing happened.
    Illegal(Move),
    Undone,
    NothingToUndo,
    Quit,
    GameOver,
}

/// Final state of a finished (or stopped) game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameSummary {
    pub score: Score,
    pub moves: u64,
    pub highest_tile: u32,
    pub board: Board,
}

/// A game in progress: board, score penalty, history and the player.
pub struct Game<S, R> {
    board: Board,
    penalty: Score,
    moves: u64,
    history: UndoRing,
    source: S,
    rng: R,
}

impl<S: MoveSource, R: Rng> Game<S, R> {
    /// Start from the standard two-tile opening.
    pub fn new(source: S, mut rng: R) -> Self {
        let board = Board::initial(&mut rng);
        Self::from_board(board, source, rng)
    }

    /// Continue from an arbitrary position.
    pub fn from_board(board: Board, source: S, rng: R) -> Self {
        Self { board, penalty: 0, moves: 0, history: UndoRing::default(), source, rng }
    }

    pub fn board(&self) -> Board { self.board }

    /// Legal moves played (undone moves excluded).
    pub fn moves(&self) -> u64 { self.moves }

    /// Score earned so far: merged tile values, without credit for spawned 4s.
    pub fn score(&self) -> Score { self.board.score().saturating_sub(self.penalty) }

    pub fn is_over(&self) -> bool { self.board.is_game_over() }

    pub fn source(&self) -> &S { &self.source }

    pub fn history(&self) -> &UndoRing { &self.history }

    /// Ask the player for one action and apply it.
    pub fn step(&mut self) -> Turn {
        if self.is_over() {
            return Turn::GameOver;
        }
        match self.source.next_action(self.board) {
            Action::Quit => Turn::Quit,
            Action::Undo => match self.history.pop() {
                Some((board, penalty)) => {
                    self.board = board;
                    self.penalty -= penalty;
                    self.moves -= 1;
                    Turn::Undone
                }
                None => Turn::NothingToUndo,
            },
            Action::Move(dir) => {
                let moved = self.board.shift(dir);
                if moved == self.board {
                    return Turn::Illegal(dir);
                }
                let spawned = draw_tile(&mut self.rng);
                let penalty = if spawned == 2 { FOUR_SPAWN_PENALTY } else { 0 };
                self.history.push(self.board, penalty);
                self.penalty += penalty;
                self.board = moved.with_tile(spawned, &mut self.rng);
                self.moves += 1;
                Turn::Moved { dir, spawned }
            }
        }
    }

    /// Play until the game ends, the player quits, or `max_moves` legal moves are on the board.
    ///
    /// `on_turn` sees the game after every step.
    pub fn run(&mut self, max_moves: Option<u64>, mut on_turn: impl FnMut(&Self, &Turn)) -> GameSummary {
        loop {
            if max_moves.is_some_and(|limit| self.moves >= limit) {
                break;
            }
            let turn = self.step();
            on_turn(self, &turn);
            if matches!(turn, Turn::GameOver | Turn::Quit) {
                break;
            }
        }
        self.summary()
    }

    pub fn summary(&self) -> GameSummary {
        GameSummary {
            score: self.score(),
            moves: self.moves,
            highest_tile: self.board.highest_tile(),
            board: self.board,
        }
    }
}
