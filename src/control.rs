use std::time::{Duration, Instant};

use log::{debug, trace, warn};

use crate::{
    agent::{Agent, FitOptions, Transition},
    env::Environment,
    experience::{Episode, Experience, Step},
};

/// Options of [`Control::play`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayOptions {
    /// Episodes to play
    pub count: usize,
    /// Recorded steps after which an episode is abandoned, `0` for no limit
    pub step_max: usize,
    /// Report episode starts and every hundredth step at debug level
    pub indicate: bool,
}

impl Default for PlayOptions {
    fn default() -> Self {
        Self {
            count: 1,
            step_max: 0,
            indicate: false,
        }
    }
}

/// Drives agents through episodes of an environment and hands them their experience
///
/// Agents take turns on the shared environment. On its turn an agent keeps acting
/// until one of its moves is effective, and every attempt is recorded as a step.
pub struct Control<E: Environment> {
    environment: E,
    agents: Vec<Box<dyn Agent>>,
    is_display: bool,
    time_start: Instant,
    time_elapsed: Duration,
}

impl<E: Environment> Control<E> {
    /// With `is_display`, the environment is rendered at debug level after every turn
    pub fn new(environment: E, agents: Vec<Box<dyn Agent>>, is_display: bool) -> Self {
        Self {
            environment,
            agents,
            is_display,
            time_start: Instant::now(),
            time_elapsed: Duration::ZERO,
        }
    }

    pub fn environment(&self) -> &E {
        &self.environment
    }

    pub fn environment_mut(&mut self) -> &mut E {
        &mut self.environment
    }

    pub fn agents(&self) -> &[Box<dyn Agent>] {
        &self.agents
    }

    pub fn agents_mut(&mut self) -> &mut [Box<dyn Agent>] {
        &mut self.agents
    }

    pub fn into_agents(self) -> Vec<Box<dyn Agent>> {
        self.agents
    }

    /// Time spent in the running episode, or in the last one to reach the goal
    pub fn time_elapsed(&self) -> Duration {
        if self.environment.is_play() {
            self.time_start.elapsed()
        } else {
            self.time_elapsed
        }
    }

    /// Play `options.count` episodes
    ///
    /// **Returns** the experience indexed `[agent][episode]`
    pub fn play(&mut self, options: &PlayOptions) -> Experience {
        let mut experience: Experience = self.agents.iter().map(|_| Vec::new()).collect();
        if self.agents.is_empty() {
            warn!("nothing to play without agents");
            return experience;
        }

        for number in 1..=options.count {
            if options.indicate {
                debug!("start play {number}/{}", options.count);
            }
            let episodes = self.play_episode(options);
            for (record, episode) in experience.iter_mut().zip(episodes) {
                record.push(episode);
            }
        }
        experience
    }

    fn play_episode(&mut self, options: &PlayOptions) -> Vec<Episode> {
        let env = &mut self.environment;
        let agents = &mut self.agents;
        let is_display = self.is_display;

        self.time_start = Instant::now();
        env.start();
        let mut episodes = agents
            .iter_mut()
            .map(|agent| {
                agent.initialize();
                Episode::new()
            })
            .collect::<Vec<_>>();
        if is_display {
            debug!("\n{}", env.display(None));
        }

        let mut attempts = 0;
        let limit_reached = |attempts: usize| options.step_max > 0 && attempts >= options.step_max;
        let mut first_turn = vec![true; agents.len()];

        'episode: while env.is_play() {
            for ((agent, episode), is_first) in agents.iter_mut().zip(&mut episodes).zip(&mut first_turn) {
                loop {
                    attempts += 1;
                    let status = env.status();
                    let actions_effective = env.actions_effective();
                    let is_previous = agent.mode_sarsa() && !*is_first;
                    let action = agent.get_action(status, &actions_effective, is_previous);
                    *is_first = false;

                    let can_action = env.set_action(action);
                    let status_next = env.status();
                    let actions_effective_next = env.actions_effective();
                    let reward = agent.get_reward(&Transition {
                        status,
                        action,
                        can_action,
                        status_next,
                        is_play: env.is_play(),
                        score: env.score(),
                        actions_effective_next: &actions_effective_next,
                    });
                    let action_next = if agent.mode_sarsa() {
                        Some(agent.get_action(status_next, &actions_effective_next, false))
                    } else {
                        None
                    };
                    let q = agent.get_q(status, action, status_next, action_next, reward);
                    trace!("{status} {action:?} -> {status_next} effective={can_action} reward={reward} q={q}");

                    episode.push(Step {
                        status,
                        actions_effective,
                        action,
                        status_next,
                        action_next,
                        actions_effective_next,
                        reward,
                        q,
                    });

                    if options.indicate && attempts % 100 == 0 {
                        debug!("play count {attempts}");
                    }
                    if can_action || limit_reached(attempts) {
                        break;
                    }
                }

                if is_display {
                    debug!("\n{}", env.display(agent.q_table().as_ref()));
                }
                if !env.is_play() {
                    break 'episode;
                }
                if limit_reached(attempts) {
                    break 'episode;
                }
            }
        }

        let score = env.score();
        if env.is_play() {
            debug!("abandoned after {attempts} steps");
        } else {
            self.time_elapsed = self.time_start.elapsed();
            for (agent, episode) in agents.iter_mut().zip(&mut episodes) {
                agent.adjust_experience(episode, score);
            }
            debug!(
                "goal reached in {} moves, {attempts} steps, {:?}",
                env.count(),
                self.time_elapsed
            );
        }

        let status = env.status();
        for agent in agents.iter_mut() {
            agent.finalize(status, score);
        }
        episodes
    }

    /// Let every agent learn from its share of `experience`
    ///
    /// Agents that learn from a model rather than from play get no episodes.
    pub fn fit(&mut self, experience: &Experience, options: &FitOptions) {
        for (index, agent) in self.agents.iter_mut().enumerate() {
            let episodes: &[Episode] = match experience.get(index) {
                Some(episodes) if agent.necessary_experience() => episodes.as_slice(),
                _ => &[],
            };
            agent.fit(episodes, options);
        }
    }
}
