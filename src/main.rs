use anyhow::{bail, Context};
use crossterm::style::Stylize;
use log::info;
use rand::thread_rng;
use std::time::Instant;

use slider_ida::puzzle::{side_for_size, BLANK};
use slider_ida::{BlankAt, Board, Goal, Solution, SolveError, Solver, Target};

const DEFAULT_SIDE: usize = 3;
const SCRAMBLE_STEPS: usize = 40;

/// `slider-ida [side] [goal-index] [full|blank]`
///
/// A goal index of `-1` puts the goal on the last cell.
struct Options {
    side: usize,
    goal_index: usize,
    blank_only: bool,
}

fn parse_options() -> anyhow::Result<Options> {
    let mut args = std::env::args().skip(1);

    let side = match args.next() {
        Some(raw) => raw.parse().with_context(|| format!("invalid side '{}'", raw))?,
        None => DEFAULT_SIDE,
    };
    if side < 2 {
        bail!("side must be at least 2, got {}", side);
    }
    let size = side * side - 1;

    let goal_index = match args.next() {
        Some(raw) => {
            let index: i64 = raw
                .parse()
                .with_context(|| format!("invalid goal index '{}'", raw))?;
            if index == -1 {
                size
            } else {
                usize::try_from(index).with_context(|| format!("invalid goal index {}", index))?
            }
        }
        None => size,
    };

    let blank_only = match args.next().as_deref() {
        None | Some("full") => false,
        Some("blank") => true,
        Some(other) => bail!("unknown goal kind '{}', expected 'full' or 'blank'", other),
    };

    debug_assert_eq!(side_for_size(size), side);
    Ok(Options {
        side,
        goal_index,
        blank_only,
    })
}

fn render(board: &Board) -> String {
    let mut out = String::new();
    for row in board.tiles().chunks(board.side()) {
        for &val in row {
            let cell = format!("{:2} ", val);
            if val == BLANK {
                out.push_str(&cell.dark_grey().to_string());
            } else {
                out.push_str(&cell.bold().to_string());
            }
        }
        out.push('\n');
    }
    out
}

fn run<G: Goal>(goal: G, board: &Board) -> Result<Solution, SolveError> {
    let started = Instant::now();
    let result = Solver::new(goal).solve(board.clone());
    info!("IDA* took {:?}", started.elapsed());
    result
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options = parse_options()?;
    let target = Target::canonical(options.side, options.goal_index)?;

    let mut rng = thread_rng();
    let mut original = target.board().scrambled(&mut rng, SCRAMBLE_STEPS);

    println!("Target:\n{}", render(target.board()));
    println!("Scrambled:\n{}", render(&original));

    let result = if options.blank_only {
        run(BlankAt::new(options.side, options.goal_index)?, &original)
    } else {
        run(&target, &original)
    };

    let solution = match result {
        Ok(solution) => solution,
        Err(SolveError::Unreachable) => {
            println!("The given board is not solvable!");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    println!(
        "Found optimal solution with cost {} ({} moves)",
        solution.threshold,
        solution.moves.len()
    );

    for item in solution.moves {
        original.apply_move(item);
        println!("{}\n{}", item, render(&original));
    }

    Ok(())
}
