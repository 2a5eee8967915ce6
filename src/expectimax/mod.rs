//! Expectimax search policy for 2048.
//!
//! [`Expectimax`] scores the four candidate moves of a position on four
//! freshly spawned worker threads, each running an independent depth-limited
//! expectimax search with its own transposition table, and picks the best.
//!
//! Notes
//! - The engine's move tables and the heuristic table are built lazily; the
//!   constructors warm them for you. It's still fine to call `engine::new()`.
//! - The search is deterministic; randomness only occurs when applying moves
//!   with `Board::make_move` or inside the game driver.
//!
//! Quick start
//! ```
//! use expectimax_2048::engine::Board;
//! use expectimax_2048::expectimax::Expectimax;
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut rng = StdRng::seed_from_u64(123);
//! let b0 = Board::initial(&mut rng);
//!
//! let mut ex = Expectimax::new();
//! let m = ex.best_move(b0);
//! assert!(m.is_some());
//! assert!(ex.last_stats().nodes > 0);
//! ```

use crate::engine::{self, Move};

mod heuristic;
mod scorer;
mod search;

pub use scorer::Expectimax;

/// Configurable knobs for Expectimax. Defaults reproduce the reference tuning.
///
/// - `prob_cutoff`: stop expanding chance nodes whose path probability falls below this value.
/// - `depth_cap`: optional hard cap applied on top of the adaptive depth limit.
/// - `cache_enabled`: enable/disable transposition table usage.
/// - `cache_depth_limit`: only chance nodes shallower than this are cached.
#[derive(Debug, Clone)]
pub struct ExpectimaxConfig {
    /// Probability cutoff for chance-node pruning.
    pub prob_cutoff: f64,
    /// Optional hard cap on depth (None keeps the adaptive limit).
    pub depth_cap: Option<u32>,
    /// Enable/disable transposition caching.
    pub cache_enabled: bool,
    /// Recursion depth below which chance nodes are memoized.
    pub cache_depth_limit: u32,
}

impl Default for ExpectimaxConfig {
    fn default() -> Self {
        Self {
            prob_cutoff: 1e-4,
            depth_cap: None,
            cache_enabled: true,
            cache_depth_limit: 15,
        }
    }
}

/// Per-branch expected value at the root (no normalization).
///
/// - `ev` is the expected value for taking `dir` from the current board,
///   including the tie-break epsilon when legal.
/// - `legal` is false when the move is a no-op for the current board.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchEval {
    pub dir: Move,
    pub ev: f64,
    pub legal: bool,
}

/// Search counters for one branch or one whole decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Moves tried at move nodes.
    pub nodes: u64,
    /// Moves that left the board unchanged.
    pub no_moves: u64,
    /// Chance nodes answered by the static heuristic.
    pub table_hits: u64,
    /// Chance nodes answered by the transposition table.
    pub cache_hits: u64,
    /// Transposition table entries at the end of the search.
    pub cache_size: u64,
    /// Deepest recursion level reached.
    pub max_depth: u32,
    /// Largest `nodes` seen across decisions since the last reset.
    pub peak_nodes: u64,
}

impl SearchStats {
    /// Fold another branch's counters into this one.
    pub(crate) fn absorb(&mut self, other: &SearchStats) {
        self.nodes += other.nodes;
        self.no_moves += other.no_moves;
        self.table_hits += other.table_hits;
        self.cache_hits += other.cache_hits;
        self.cache_size += other.cache_size;
        self.max_depth = self.max_depth.max(other.max_depth);
    }
}

/// Common helper for constructors to ensure tables are initialized.
fn warm_engine_and_heuristics() {
    // Safe to call multiple times.
    engine::new();
    heuristic::warm();
}

/// Static heuristic estimate of a board (sum over rows and columns).
///
/// Only meaningful for ranking boards against each other.
#[inline]
pub fn score_heur_board(board: engine::Board) -> f64 { heuristic::score_heur_board(board) }

