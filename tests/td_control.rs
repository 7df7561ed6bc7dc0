use mazelab::{
    agent::{Agent, FitOptions, TdAgent, TdConfig},
    control::{Control, PlayOptions},
    env::Environment,
    maze::{Maze, Position},
};

const EPISODES: usize = 300;

fn train(mode_sarsa: bool) -> (Vec<usize>, Control<Maze>) {
    let agent = TdAgent::new(TdConfig {
        mode_sarsa,
        seed: Some(7),
        ..Default::default()
    });
    let agents: Vec<Box<dyn Agent>> = vec![Box::new(agent)];
    let mut control = Control::new(Maze::default(), agents, false);
    let play = PlayOptions {
        step_max: 20_000,
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
    (moves, control)
}

fn mean(counts: &[usize]) -> f64 {
    counts.iter().sum::<usize>() as f64 / counts.len() as f64
}

#[test]
fn q_learning_shortens_episodes() {
    let (moves, control) = train(false);
    let first = mean(&moves[..10]);
    let last = mean(&moves[EPISODES - 20..]);
    assert!(last < first, "first 10 averaged {first} moves, last 20 averaged {last}");
    assert!(!control.agents()[0].mode_sarsa());
}

#[test]
fn sarsa_shortens_episodes() {
    let (moves, control) = train(true);
    let first = mean(&moves[..10]);
    let last = mean(&moves[EPISODES - 20..]);
    assert!(last < first, "first 10 averaged {first} moves, last 20 averaged {last}");

    let q = control.agents()[0].q_table().unwrap();
    assert!(q.max(Position::new(7, 6)) > 0.0, "Value flows back from the goal");
}
