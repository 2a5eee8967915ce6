use std::sync::OnceLock;

use crate::engine::{self as GameEngine, row_to_ranks, Board, Row};

const LOST_PENALTY: f64 = 200_000.0;
const MONOTONICITY_POWER: f64 = 4.0;
const MONOTONICITY_WEIGHT: f64 = 47.0;
const SUM_POWER: f64 = 3.5;
const SUM_WEIGHT: f64 = 11.0;
const MERGES_WEIGHT: f64 = 700.0;
const EMPTY_WEIGHT: f64 = 270.0;

static HEURISTIC_SCORES: OnceLock<Box<[f64]>> = OnceLock::new();

pub(crate) fn warm() {
    let _ = heuristic_scores();
}

fn heuristic_scores() -> &'static [f64] {
    HEURISTIC_SCORES
        .get_or_init(|| {
            let mut v = vec![0.0f64; 0x1_0000];
            for (i, slot) in v.iter_mut().enumerate() {
                *slot = calc_heuristic_score(i as Row);
            }
            v.into_boxed_slice()
        })
        .as_ref()
}

#[inline(always)]
fn row_heuristic(scores: &[f64], row: Row) -> f64 {
    unsafe { *scores.get_unchecked(row as usize) }
}

#[inline]
fn sum_rows(scores: &[f64], board: Board) -> f64 {
    row_heuristic(scores, board.row(0))
        + row_heuristic(scores, board.row(1))
        + row_heuristic(scores, board.row(2))
        + row_heuristic(scores, board.row(3))
}

/// Static board estimate: every row plus every column through the row table.
///
/// `LOST_PENALTY` is counted once per line, so only differences between
/// boards are meaningful.
#[inline]
pub(crate) fn score_heur_board(board: Board) -> f64 {
    let scores = heuristic_scores();
    let transposed = Board::from_raw(GameEngine::transpose(board.raw()));
    sum_rows(scores, board) + sum_rows(scores, transposed)
}

// Credit to Nneonneo for heuristic structure
fn calc_heuristic_score(row: Row) -> f64 {
    let line = row_to_ranks(row);

    let mut sum = 0.0;
    let mut empty = 0u32;
    let mut merges = 0u32;
    let mut prev = 0;
    let mut counter = 0u32;
    for &rank in &line {
        sum += (rank as f64).powf(SUM_POWER);
        if rank == 0 {
            empty += 1;
        } else {
            // Gaps don't break a run: those tiles meet once the row compacts.
            if prev == rank {
                counter += 1;
            } else if counter > 0 {
                merges += 1 + counter;
                counter = 0;
            }
            prev = rank;
        }
    }
    if counter > 0 {
        merges += 1 + counter;
    }

    let mut monotonicity_left = 0.0;
    let mut monotonicity_right = 0.0;
    for i in 1..4 {
        let tile1 = (line[i - 1] as f64).powf(MONOTONICITY_POWER);
        let tile2 = (line[i] as f64).powf(MONOTONICITY_POWER);
        if line[i - 1] > line[i] {
            monotonicity_left += tile1 - tile2;
        } else {
            monotonicity_right += tile2 - tile1;
        }
    }

    LOST_PENALTY
        + EMPTY_WEIGHT * empty as f64
        + MERGES_WEIGHT * merges as f64
        - MONOTONICITY_WEIGHT * f64::min(monotonicity_left, monotonicity_right)
        - SUM_WEIGHT * sum
}

/// Bitset of the ranks present, scanning cells from 0 up to the highest occupied one.
fn rank_bitset(board: Board) -> u32 {
    let mut bitset = 0u32;
    let mut board_copy = board.raw();
    while board_copy != 0 {
        bitset |= 1 << (board_copy & 0xf);
        board_copy >>= 4;
    }
    bitset
}

// Credit to Nneonneo
pub(crate) fn count_unique(board: Board) -> u32 {
    // don't count empty tiles
    (rank_bitset(board) >> 1).count_ones()
}

/// Adaptive search depth for a decision on `board`.
///
/// Boards whose tiles are all below 2048 search 3 plies. Past that the limit
/// follows the number of distinct tiles, capped while the top tiles are still
/// modest.
pub(crate) fn depth_limit(board: Board) -> u32 {
    let bitset = rank_bitset(board);
    let cap = if bitset <= 2048 {
        return 3;
    } else if bitset <= 2048 + 1024 {
        Some(4)
    } else if bitset <= 4096 {
        Some(5)
    } else if bitset <= 4096 + 2048 {
        Some(6)
    } else {
        None
    };
    let dyn_depth = 3.max(count_unique(board) as i32 - 2) as u32;
    match cap { Some(cap) => dyn_depth.min(cap), None => dyn_depth }
}
