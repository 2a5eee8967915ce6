use std::io;

use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use expectimax_2048::engine as GameEngine;
use expectimax_2048::expectimax::{self, Expectimax, ExpectimaxConfig};
use expectimax_2048::game::{Game, HumanDriven, MoveSource, SearchDriven, Turn};

#[derive(Debug, Parser)]
#[command(name = "expectimax-2048", about = "Play 2048 with the expectimax player or by hand")]
struct Args {
    /// Read moves from stdin (wasd / hjkl, r = undo, q = quit) instead of searching
    #[arg(long)]
    human: bool,

    /// Seed for tile spawns (random when omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this many moves
    #[arg(long)]
    steps: Option<u64>,

    /// Never search deeper than this many plies
    #[arg(long)]
    depth_cap: Option<u32>,

    /// Disable the transposition table
    #[arg(long)]
    no_cache: bool,

    /// Only print the final result
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

    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let source: Box<dyn MoveSource> = if args.human {
        Box::new(HumanDriven::new(io::stdin().lock()))
    } else {
        let cfg = ExpectimaxConfig {
            depth_cap: args.depth_cap,
            cache_enabled: !args.no_cache,
            ..Default::default()
        };
        Box::new(SearchDriven::new(Expectimax::with_config(cfg)))
    };
    info!(human = args.human, seed = ?args.seed, "starting game");

    let mut game = Game::new(source, rng);
    let quiet = args.quiet;
    let mut last_score = 0;
    if !quiet {
        print_position(&game.board(), game.moves() + 1, game.score(), 0);
    }
    let summary = game.run(args.steps, |game, turn| {
        if quiet {
            return;
        }
        match turn {
            Turn::Moved { .. } | Turn::Undone => {
                let score = game.score();
                let gained = score as i64 - last_score as i64;
                last_score = score;
                print_position(&game.board(), game.moves() + 1, score, gained);
            }
            Turn::Illegal(dir) => println!("Can't move {dir}."),
            Turn::NothingToUndo => println!("Nothing to undo."),
            Turn::Quit | Turn::GameOver => {}
        }
    });

    println!("{}", summary.board);
    println!("Game over. Your score is {}.", summary.score);
    info!(
        moves = summary.moves,
        score = summary.score,
        highest_tile = summary.highest_tile,
        "game finished"
    );
    Ok(())
}

fn print_position(board: &GameEngine::Board, move_no: u64, score: u64, gained: i64) {
    println!("{board}");
    println!(
        "Move #{move_no}, current score={score}({gained:+}), heuristic {:.1}",
        expectimax::score_heur_board(*board)
    );
}
