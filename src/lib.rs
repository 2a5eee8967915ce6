//! expectimax-2048: a bitboard 2048 engine + Expectimax player
//!
//! This crate provides:
//! - A compact `Board` type (16 four-bit ranks in a `u64`) with table-driven
//!   moves and scoring (`engine` module)
//! - An Expectimax player that scores the four candidate moves concurrently
//!   (`expectimax` module)
//! - A turn loop with pluggable move sources and undo (`game` module)
//!
//! Quick start:
//! ```
//! use expectimax_2048::engine::{self as GameEngine, Board, Move};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! // One-time table init (optional, tables are also built on first use)
//! GameEngine::new();
//!
//! // Two merging 2s score 4
//! let b0 = Board::from_raw(0x0000_0000_0000_0011);
//! assert_eq!(b0.score(), 0);
//! assert_eq!(b0.shift(Move::Left).score(), 4);
//!
//! // Deterministic board initialization with a seeded RNG
//! let mut rng = StdRng::seed_from_u64(42);
//! let b1 = Board::initial(&mut rng);
//! assert_eq!(b1.count_empty(), 14);
//! ```
//!
//! Full loop (simplest possible)
//! ```
//! use expectimax_2048::engine::Board;
//! use expectimax_2048::expectimax::Expectimax;
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut policy = Expectimax::new();
//! let mut rng = StdRng::seed_from_u64(123);
//! let mut b = Board::initial(&mut rng);
//! let mut moves = 0u32;
//!
//! // Loop a couple of moves to demonstrate flow (keep doctests fast)
//! while !b.is_game_over() && moves < 4 {
//!     match policy.best_move(b) {
//!         Some(dir) => b = b.make_move(dir, &mut rng),
//!         None => break,
//!     }
//!     moves += 1;
//! }
//! assert_eq!(moves, 4);
//! ```
//!
pub mod engine;
pub mod expectimax;
pub mod game;
