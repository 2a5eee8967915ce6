use std::panic;
use std::thread;

use tracing::debug;

use crate::engine::{Board, Move};

use super::heuristic::depth_limit;
use super::search::EvalState;
use super::{warm_engine_and_heuristics, BranchEval, ExpectimaxConfig, SearchStats};

/// Added to every legal branch so a legal move always beats an illegal one.
const TIE_BREAK_EPSILON: f64 = 1e-6;

/// Expectimax player: one worker thread per candidate move.
///
/// Every decision spawns four scoped threads, one per direction, each with its
/// own search state. The move tables are the only shared data and are
/// read-only, so the workers never synchronize; the caller just joins them.
pub struct Expectimax {
    cfg: ExpectimaxConfig,
    stats: SearchStats,
}

impl Expectimax {
    pub fn new() -> Self { Self::with_config(ExpectimaxConfig::default()) }

    pub fn with_config(cfg: ExpectimaxConfig) -> Self {
        warm_engine_and_heuristics();
        Self { cfg, stats: SearchStats::default() }
    }

    /// The configuration this player searches with.
    #[inline]
    pub fn config(&self) -> &ExpectimaxConfig { &self.cfg }

    /// Back-compat shim.
    ///
    /// Equivalent to [`Self::best_move`].
    #[inline]
    pub fn get_next_move(&mut self, board: Board) -> Option<Move> { self.best_move(board) }

    /// Compute the best move, or `None` when every direction is illegal.
    ///
    /// Ties go to the earlier direction in [`Move::ALL`].
    ///
    /// ```
    /// use expectimax_2048::engine::{Board, Move};
    /// use expectimax_2048::expectimax::Expectimax;
    /// let mut ex = Expectimax::new();
    /// // Two 2s in the top row: sliding left merges them.
    /// assert!(ex.best_move(Board::from_raw(0x0011)).is_some());
    /// // A checkerboard of 2s and 4s cannot move at all.
    /// assert_eq!(ex.best_move(Board::from_raw(0x1212_2121_1212_2121)), None);
    /// ```
    pub fn best_move(&mut self, board: Board) -> Option<Move> {
        let branches = self.branch_evals(board);
        let mut best = 0.0;
        let mut best_move = None;
        for branch in branches {
            if branch.ev > best {
                best = branch.ev;
                best_move = Some(branch.dir);
            }
        }
        debug!(board = ?board, best_move = ?best_move, ev = best, "selected move");
        best_move
    }

    /// Compute EV for each direction.
    ///
    /// Returns a fixed array in order `[Up, Down, Left, Right]`; illegal moves
    /// are marked `legal=false` with `ev=0.0`.
    pub fn branch_evals(&mut self, board: Board) -> [BranchEval; 4] {
        let depth_limit = self.depth_limit(board);
        let cfg = &self.cfg;
        let results: [(BranchEval, SearchStats); 4] = thread::scope(|s| {
            let handles = Move::ALL.map(|dir| s.spawn(move || score_toplevel_move(cfg, board, dir, depth_limit)));
            handles.map(|handle| handle.join().unwrap_or_else(|payload| panic::resume_unwind(payload)))
        });

        let mut stats = SearchStats { peak_nodes: self.stats.peak_nodes, ..SearchStats::default() };
        for (_, branch_stats) in &results {
            stats.absorb(branch_stats);
        }
        stats.peak_nodes = stats.peak_nodes.max(stats.nodes);
        self.stats = stats;
        results.map(|(branch, _)| branch)
    }

    /// Depth limit the next decision on `board` will search with.
    pub fn depth_limit(&self, board: Board) -> u32 {
        let dyn_depth = depth_limit(board);
        match self.cfg.depth_cap { Some(cap) => dyn_depth.min(cap), None => dyn_depth }
    }

    /// Statistics collected from the last call to [`Self::best_move`] or
    /// [`Self::branch_evals`].
    #[inline]
    pub fn last_stats(&self) -> SearchStats { self.stats }

    /// Reset accumulated stats to zero.
    #[inline]
    pub fn reset_stats(&mut self) { self.stats = SearchStats::default(); }
}

impl Default for Expectimax { fn default() -> Self { Self::new() } }

/// Score one top-level move with a private search state.
fn score_toplevel_move(cfg: &ExpectimaxConfig, board: Board, dir: Move, depth_limit: u32) -> (BranchEval, SearchStats) {
    let new_board = board.shift(dir);
    if new_board == board {
        debug!(%dir, "illegal move");
        return (BranchEval { dir, ev: 0.0, legal: false }, SearchStats::default());
    }
    let mut state = EvalState::new(cfg, depth_limit);
    let ev = state.score_chance_node(new_board, 1.0) + TIE_BREAK_EPSILON;
    let stats = state.stats();
    debug!(
        %dir,
        ev,
        nodes = stats.nodes,
        no_moves = stats.no_moves,
        table_hits = stats.table_hits,
        cache_hits = stats.cache_hits,
        cache_size = stats.cache_size,
        max_depth = stats.max_depth,
        "evaluated move"
    );
    (BranchEval { dir, ev, legal: true }, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expectimax::score_heur_board;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn flags_illegal_branches() {
        let mut ex = Expectimax::new();
        // Tiles packed into the top-left corner: up and left change nothing.
        let b = Board::from_raw(0x0000_0000_0002_0021);
        let branches = ex.branch_evals(b);
        assert_eq!(branches.map(|br| br.dir), Move::ALL);
        assert!(!branches[Move::Up.index()].legal);
        assert!(!branches[Move::Left.index()].legal);
        assert_eq!(branches[Move::Up.index()].ev, 0.0);
        assert!(branches[Move::Down.index()].legal);
        assert!(branches[Move::Right.index()].legal);
        assert!(branches[Move::Down.index()].ev > 0.0);
        let best = ex.best_move(b);
        assert!(matches!(best, Some(Move::Down) | Some(Move::Right)));
    }

    #[test]
    fn depth_cap_bounds_search() {
        let mut capped = Expectimax::with_config(ExpectimaxConfig { depth_cap: Some(0), ..Default::default() });
        let b = Board::from_raw(0x0011);
        assert_eq!(capped.depth_limit(b), 0);
        let branches = capped.branch_evals(b);
        // With no lookahead each legal branch is its post-move estimate.
        for branch in branches.iter().filter(|br| br.legal) {
            let expected = score_heur_board(b.shift(branch.dir)) + TIE_BREAK_EPSILON;
            assert_eq!(branch.ev, expected);
        }
        assert_eq!(capped.last_stats().nodes, 0);
        let legal = branches.iter().filter(|br| br.legal).count() as u64;
        assert_eq!(legal, 3);
        assert_eq!(capped.last_stats().table_hits, legal);
    }

    #[test]
    fn choice_is_deterministic() {
        let mut rng = StdRng::seed_from_u64(2048);
        let mut b = Board::initial(&mut rng);
        for _ in 0..12 {
            b = b.make_move(Move::ALL[first_legal(b)], &mut rng);
        }
        let mut a = Expectimax::new();
        let mut c = Expectimax::new();
        let first = a.branch_evals(b);
        let second = c.branch_evals(b);
        for (x, y) in first.iter().zip(second.iter()) {
            assert_eq!(x.ev.to_bits(), y.ev.to_bits());
        }
        assert_eq!(a.best_move(b), c.best_move(b));
        assert_eq!(a.last_stats().nodes, c.last_stats().nodes);
    }

    fn first_legal(b: Board) -> usize {
        Move::ALL.iter().position(|&d| b.shift(d) != b).unwrap_or(0)
    }

    #[test]
    fn tracks_peak_nodes() {
        let mut ex = Expectimax::new();
        ex.best_move(Board::from_raw(0x0000_0000_0012_0031));
        let first = ex.last_stats();
        assert_eq!(first.peak_nodes, first.nodes);
        ex.best_move(Board::from_raw(0x0011));
        assert!(ex.last_stats().peak_nodes >= first.nodes);
        ex.reset_stats();
        assert_eq!(ex.last_stats(), SearchStats::default());
    }
}
