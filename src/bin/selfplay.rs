use std::collections::BTreeMap;
use std::io;
use std::time::{Duration, Instant};

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use expectimax_2048::engine as GameEngine;
use expectimax_2048::expectimax::{Expectimax, ExpectimaxConfig};
use expectimax_2048::game::{Game, GameSummary, SearchDriven};

#[derive(Debug, Parser)]
#[command(name = "selfplay", about = "Batch 2048 expectimax self-play")]
struct Args {
    /// Number of games to play
    #[arg(long, default_value_t = 8)]
    games: u64,

    /// Base seed; game i uses seed + i
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Per-game: stop after this many moves
    #[arg(long)]
    steps: Option<u64>,

    /// Never search deeper than this many plies
    #[arg(long)]
    depth_cap: Option<u32>,

    /// Suppress the progress bar
    #[arg(long)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    GameEngine::new();

    let pb = if args.quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(args.games);
        pb.set_style(
            ProgressStyle::with_template("{spinner} {elapsed_precise} [{bar:30}] {pos}/{len} games | {msg}")?
                .tick_chars("⠁⠃⠇⠧⠷⠿⠻⠟⠯⠷⠧⠇⠃"),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    };

    let start = Instant::now();
    let cfg = ExpectimaxConfig { depth_cap: args.depth_cap, ..Default::default() };
    let summaries: Vec<GameSummary> = (0..args.games)
        .into_par_iter()
        .map(|i| {
            let summary = play_one(args.seed.wrapping_add(i), cfg.clone(), args.steps);
            pb.inc(1);
            pb.set_message(format!("last score {}", summary.score));
            summary
        })
        .collect();
    pb.finish_and_clear();

    report(&summaries, start.elapsed());
    Ok(())
}

fn play_one(seed: u64, cfg: ExpectimaxConfig, steps: Option<u64>) -> GameSummary {
    let source = SearchDriven::new(Expectimax::with_config(cfg));
    let mut game = Game::new(source, StdRng::seed_from_u64(seed));
    let summary = game.run(steps, |_, _| {});
    debug!(seed, score = summary.score, moves = summary.moves, highest_tile = summary.highest_tile, "game done");
    summary
}

fn report(summaries: &[GameSummary], elapsed: Duration) {
    if summaries.is_empty() {
        println!("No games played.");
        return;
    }
    let games = summaries.len() as f64;
    let total_score: u64 = summaries.iter().map(|s| s.score).sum();
    let total_moves: u64 = summaries.iter().map(|s| s.moves).sum();
    let max_score = summaries.iter().map(|s| s.score).max().unwrap_or(0);
    let secs = elapsed.as_secs_f64().max(1e-6);

    println!(
        "Games: {} | mean score: {:.1} | max score: {} | moves/sec: {:.1}",
        summaries.len(),
        total_score as f64 / games,
        max_score,
        total_moves as f64 / secs
    );

    let mut tiles: BTreeMap<u32, usize> = BTreeMap::new();
    for s in summaries {
        *tiles.entry(s.highest_tile).or_default() += 1;
    }
    for (tile, count) in tiles.iter().rev() {
        println!("{:>6}: {:>5.1}% ({})", tile, 100.0 * *count as f64 / games, count);
    }
    info!(games = summaries.len(), mean_score = total_score as f64 / games, "self-play finished");
}
