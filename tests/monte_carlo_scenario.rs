use mazelab::{
    agent::{Agent, FitOptions, MonteCarloAgent, MonteCarloConfig},
    control::{Control, PlayOptions},
    env::{Environment, TransitionModel},
    maze::{Action, Maze, Position, Walls},
};

const EPISODES: usize = 300;

/// Open 8x8 grid whose goal column can only be entered from the top row
fn barrier_maze() -> Maze {
    let mut walls = Walls::open(8, 8).unwrap();
    for y in 1..8 {
        walls.set(Position::new(6, y), Action::Right, true);
    }
    Maze::new(walls)
}

fn mean(counts: &[usize]) -> f64 {
    counts.iter().sum::<usize>() as f64 / counts.len() as f64
}

#[test]
fn monte_carlo_shortens_episodes() {
    let maze = barrier_maze();
    assert_eq!(maze.actions_effective_at(Position::new(6, 3)), [Action::Up, Action::Down, Action::Left]);

    let agent = MonteCarloAgent::new(MonteCarloConfig {
        random_budget: 10,
        seed: Some(2024),
        ..Default::default()
    });
    let agents: Vec<Box<dyn Agent>> = vec![Box::new(agent)];
    let mut control = Control::new(maze, agents, false);
    let play = PlayOptions {
        step_max: 50_000,
        ..Default::default()
    };

    let mut moves = Vec::with_capacity(EPISODES);
    for number in 0..EPISODES {
        let experience = control.play(&play);
        moves.push(control.environment().count());
        control.fit(
            &experience,
            &FitOptions {
                number,
                ..Default::default()
            },
        );
    }

    let first = mean(&moves[..10]);
    let last = mean(&moves[EPISODES - 20..]);
    assert!(last < first, "first 10 averaged {first} moves, last 20 averaged {last}");

    let q = control.agents()[0].q_table().unwrap();
    assert!(q.get(Position::new(7, 6), Action::Down) > 0.0, "The final move was rewarded");
}
