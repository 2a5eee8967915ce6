use ahash::AHashMap;

use crate::engine::{Board, Move};

use super::heuristic::score_heur_board;
use super::{ExpectimaxConfig, SearchStats};

#[derive(Clone, Copy)]
struct TranspositionEntry {
    depth: u32,
    heuristic: f64,
}

/// Search state owned by exactly one top-level branch.
///
/// Built fresh per evaluation and dropped afterwards, so nothing leaks
/// between sibling branches or between turns.
pub(crate) struct EvalState<'a> {
    cfg: &'a ExpectimaxConfig,
    trans_table: AHashMap<Board, TranspositionEntry>,
    depth_limit: u32,
    cur_depth: u32,
    stats: SearchStats,
}

impl<'a> EvalState<'a> {
    pub(crate) fn new(cfg: &'a ExpectimaxConfig, depth_limit: u32) -> Self {
        Self {
            cfg,
            trans_table: AHashMap::default(),
            depth_limit,
            cur_depth: 0,
            stats: SearchStats::default(),
        }
    }

    pub(crate) fn stats(&self) -> SearchStats {
        SearchStats { cache_size: self.trans_table.len() as u64, ..self.stats }
    }

    /// Expected value of `board` right after a move, before the new tile appears.
    ///
    /// `cprob` is the probability of reaching this node from the root.
    pub(crate) fn score_chance_node(&mut self, board: Board, cprob: f64) -> f64 {
        if cprob < self.cfg.prob_cutoff || self.cur_depth >= self.depth_limit {
            self.stats.max_depth = self.stats.max_depth.max(self.cur_depth);
            self.stats.table_hits += 1;
            return score_heur_board(board);
        }

        let cacheable = self.cfg.cache_enabled && self.cur_depth < self.cfg.cache_depth_limit;
        if cacheable {
            if let Some(entry) = self.trans_table.get(&board) {
                // Entries from shallower recursion saw at least as far ahead.
                if entry.depth <= self.cur_depth {
                    self.stats.cache_hits += 1;
                    return entry.heuristic;
                }
            }
        }

        let num_open = board.count_empty();
        if num_open == 0 {
            self.stats.table_hits += 1;
            return score_heur_board(board);
        }
        let cprob = cprob / num_open as f64;

        let mut res = 0.0;
        let mut tmp = board.raw();
        let mut tile_2: u64 = 1;
        while tile_2 != 0 {
            if (tmp & 0xf) == 0 {
                res += self.score_move_node(Board::from_raw(board.raw() | tile_2), cprob * 0.9) * 0.9;
                res += self.score_move_node(Board::from_raw(board.raw() | (tile_2 << 1)), cprob * 0.1) * 0.1;
            }
            tmp >>= 4;
            tile_2 <<= 4;
        }
        res /= num_open as f64;

        if cacheable {
            self.trans_table.insert(board, TranspositionEntry { depth: self.cur_depth, heuristic: res });
        }
        res
    }

    /// Best chance-node value over the legal moves; 0.0 when none is legal.
    fn score_move_node(&mut self, board: Board, cprob: f64) -> f64 {
        let mut best = 0.0;
        self.cur_depth += 1;
        for dir in Move::ALL {
            let new_board = board.shift(dir);
            self.stats.nodes += 1;
            if new_board != board {
                best = f64::max(best, self.score_chance_node(new_board, cprob));
            } else {
                self.stats.no_moves += 1;
            }
        }
        self.cur_depth -= 1;
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine;

    fn eval(board: Board, cfg: &ExpectimaxConfig, depth_limit: u32) -> (f64, SearchStats) {
        engine::new();
        let mut state = EvalState::new(cfg, depth_limit);
        let v = state.score_chance_node(board, 1.0);
        (v, state.stats())
    }

    #[test]
    fn depth_zero_is_static() {
        let b = Board::from_raw(0x0000_0000_0012_0031);
        let (v, stats) = eval(b, &ExpectimaxConfig::default(), 0);
        assert_eq!(v, score_heur_board(b));
        assert_eq!(stats.table_hits, 1);
        assert_eq!(stats.nodes, 0);
    }

    #[test]
    fn one_ply_averages_over_spawns() {
        // A single 2 in the corner; every spawn leaves a legal reply.
        let b = Board::from_raw(0x1);
        let cfg = ExpectimaxConfig::default();
        let (v, stats) = eval(b, &cfg, 1);

        let mut expected = 0.0;
        for cell in 1..16 {
            for (rank, weight) in [(1u64, 0.9), (2u64, 0.1)] {
                let spawned = Board::from_raw(b.raw() | (rank << (4 * cell)));
                let best = Move::ALL
                    .iter()
                    .map(|&d| spawned.shift(d))
                    .filter(|&nb| nb != spawned)
                    .map(score_heur_board)
                    .fold(0.0, f64::max);
                expected += best * weight;
            }
        }
        expected /= 15.0;
        assert!((v - expected).abs() < 1e-6);
        assert_eq!(stats.nodes, 15 * 2 * 4);
        assert_eq!(stats.max_depth, 1);
    }

    #[test]
    fn dead_board_scores_zero_at_move_node() {
        let cfg = ExpectimaxConfig::default();
        let mut state = EvalState::new(&cfg, 3);
        let locked = Board::from_raw(0x1212_2121_1212_2121);
        assert_eq!(state.score_move_node(locked, 1.0), 0.0);
        assert_eq!(state.stats().no_moves, 4);
    }

    #[test]
    fn tiny_probability_is_pruned() {
        let b = Board::from_raw(0x0000_0000_0000_0021);
        let cfg = ExpectimaxConfig::default();
        let mut state = EvalState::new(&cfg, 8);
        assert_eq!(state.score_chance_node(b, 1e-5), score_heur_board(b));
        assert_eq!(state.stats().nodes, 0);
    }

    #[test]
    fn cache_is_exact_at_uniform_depth() {
        let cached = ExpectimaxConfig::default();
        let uncached = ExpectimaxConfig { cache_enabled: false, ..Default::default() };
        // With two plies every cached node sits at depth 1, well above the
        // probability cutoff, so reuse is exact. From three plies on, an entry
        // stored deeper can be reused higher up and the values drift slightly.
        for raw in [0x1u64, 0x0000_0000_0012_0031, 0x0000_1000_0021_0132, 0x0001_0000_0000_0001] {
            let b = Board::from_raw(raw);
            let (with_cache, stats) = eval(b, &cached, 2);
            let (without_cache, plain) = eval(b, &uncached, 2);
            assert_eq!(with_cache.to_bits(), without_cache.to_bits(), "board {:?}", b);
            assert_eq!(plain.cache_hits, 0);
            assert_eq!(plain.cache_size, 0);
            assert!(stats.cache_size > 0);
        }
        // A lone 2 reaches the same board by merging left or merging up.
        let (_, stats) = eval(Board::from_raw(0x1), &cached, 2);
        assert!(stats.cache_hits > 0);
    }

    #[test]
    fn cache_depth_limit_bounds_table() {
        let b = Board::from_raw(0x0000_0000_0012_0031);
        let size_with_limit = |limit| {
            let cfg = ExpectimaxConfig { cache_depth_limit: limit, ..Default::default() };
            eval(b, &cfg, 3).1.cache_size
        };
        assert_eq!(size_with_limit(0), 0);
        // Only the root chance node is shallow enough.
        assert_eq!(size_with_limit(1), 1);
        assert!(size_with_limit(15) > 1);
    }

    #[test]
    fn cache_respects_depth() {
        let cfg = ExpectimaxConfig::default();
        let b = Board::from_raw(0x0000_0000_0012_0031);
        let mut state = EvalState::new(&cfg, 2);
        // Seed an entry recorded deeper than the query: it must be ignored.
        state.trans_table.insert(b, TranspositionEntry { depth: 1, heuristic: -1.0 });
        let v = state.score_chance_node(b, 1.0);
        assert!(v > 0.0);
        // The recomputed entry replaces the stale one and is now reusable.
        let hits = state.stats().cache_hits;
        assert_eq!(state.score_chance_node(b, 1.0), v);
        assert_eq!(state.stats().cache_hits, hits + 1);
    }
}
