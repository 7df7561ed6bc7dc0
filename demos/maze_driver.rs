use std::{env, error::Error, fs, path::Path};

use mazelab::{
    agent::{AgentKind, FitOptions},
    control::{Control, PlayOptions},
    env::Environment,
    maze::Maze,
};

const ITERATIONS: usize = 500;
const STEP_MAX: usize = 10_000;

/// Usage: `maze_driver [random|human|monte_carlo|q_learning|sarsa|dynamic_programming] [iterations]`
fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let mut args = env::args().skip(1);
    let kind = args.next().as_deref().unwrap_or("monte_carlo").parse::<AgentKind>()?;
    let iterations = match args.next() {
        Some(n) => n.parse()?,
        None => ITERATIONS,
    };

    let path = Path::new("demos/out");
    fs::create_dir_all(path)?;

    let maze = Maze::default();
    let agent = kind.build(&maze, Some(path.join("data")), None);
    let mut control = Control::new(maze, vec![agent], false);

    let mut wtr = csv::Writer::from_path(path.join(format!("{kind}.csv")))?;
    wtr.write_record(["iteration", "moves", "steps", "reached"])?;

    let play = PlayOptions {
        step_max: STEP_MAX,
        ..Default::default()
    };
    let mut best = usize::MAX;
    for i in 0..iterations {
        let experience = control.play(&play);
        let steps = experience[0][0].len();
        let moves = control.environment().count();
        let reached = !control.environment().is_play();
        if reached {
            best = best.min(moves);
        }
        wtr.write_record(&[
            i.to_string(),
            moves.to_string(),
            steps.to_string(),
            reached.to_string(),
        ])?;

        control.fit(
            &experience,
            &FitOptions {
                number: i,
                ..Default::default()
            },
        );
        println!("play {i}: {moves} moves in {steps} steps");
    }

    wtr.flush()?;

    if let Some(q_table) = control.agents()[0].q_table() {
        println!("{}", control.environment().display(Some(&q_table)));
    }
    if best != usize::MAX {
        println!("fewest moves: {best}");
    }

    Ok(())
}
