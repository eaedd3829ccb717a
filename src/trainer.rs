//! Episode loop: epsilon-greedy rollouts, experience replay and checkpointing.

use std::{collections::VecDeque, path::PathBuf};

use rand::{SeedableRng, rngs::StdRng};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::{
    config::TrainingConfig,
    environment::Environment,
    error::{Error, Result},
    experience::Transition,
    history::{EpisodeRecord, TrainingHistory},
    learner::{Learner, bootstrapped_targets},
    policy::{EpsilonGreedy, EpsilonSchedule},
    replay::ReplayBuffer,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Resetting,
    Stepping,
    Replaying,
    Checkpointing,
    Solved,
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrainingOutcome {
    /// `trials` is the episode index minus the score window
    Solved { episode: usize, trials: usize },
    Exhausted { last_episode: usize },
}

#[derive(Debug, Clone)]
pub struct CheckpointFailure {
    pub episode: usize,
    pub path: PathBuf,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub outcome: TrainingOutcome,
    pub history: TrainingHistory,
    pub checkpoint_failures: Vec<CheckpointFailure>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpisodeSummary {
    pub steps: usize,
    pub episode_return: f64,
    pub epsilon: f64,
}

/// Mutable state of one training run.
pub struct Session {
    /// Ceiling of the per-episode exploration rate
    pub epsilon: f64,
    pub replay: ReplayBuffer,
    pub scores: VecDeque<f64>,
    pub phase: Phase,
    pub history: TrainingHistory,
    rng: StdRng,
}

impl Session {
    pub fn new(config: &TrainingConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            epsilon: config.agent.epsilon_start,
            replay: ReplayBuffer::new(config.agent.replay_capacity),
            scores: VecDeque::with_capacity(config.score_window),
            phase: Phase::Resetting,
            history: TrainingHistory::default(),
            rng,
        }
    }

    pub fn mean_score(&self) -> f64 {
        if self.scores.is_empty() {
            return 0.0;
        }
        self.scores.iter().sum::<f64>() / self.scores.len() as f64
    }
}

pub struct Trainer<E, L> {
    env: E,
    learner: L,
    config: TrainingConfig,
    policy: EpsilonGreedy,
    schedule: EpsilonSchedule,
    session: Session,
    checkpoint_failures: Vec<CheckpointFailure>,
}

impl<E: Environment, L: Learner> Trainer<E, L> {
    pub fn new(env: E, learner: L, config: TrainingConfig) -> Result<Self> {
        config.validate()?;
        let action_space = env.action_space();
        if learner.num_actions() != action_space.n {
            return Err(Error::DimensionMismatch {
                expected: action_space.n,
                actual: learner.num_actions(),
            });
        }
        Ok(Self {
            policy: EpsilonGreedy::new(action_space),
            schedule: EpsilonSchedule::from_config(&config.agent),
            session: Session::new(&config),
            env,
            learner,
            config,
            checkpoint_failures: Vec::new(),
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn learner(&self) -> &L {
        &self.learner
    }

    pub fn into_parts(self) -> (E, L) {
        (self.env, self.learner)
    }

    /// Play one episode until the environment reports `done` or the
    /// per-episode step cap is reached, storing every transition.
    pub fn run_episode(&mut self, episode: usize) -> Result<EpisodeSummary> {
        self.session.phase = Phase::Resetting;
        let mut state = self.env.reset();
        let epsilon = self
            .schedule
            .epsilon_for_episode(episode, self.session.epsilon);

        self.session.phase = Phase::Stepping;
        let mut steps = 0;
        let mut episode_return = 0.0;
        loop {
            let action =
                self.policy
                    .select_action(&self.learner, &state, epsilon, &mut self.session.rng)?;
            let step = self.env.step(action)?;
            self.session.replay.store(Transition {
                state,
                action,
                reward: step.reward,
                next_state: step.next_state,
                done: step.done,
            });
            episode_return += step.reward as f64;
            steps += 1;
            state = step.next_state;
            if step.done {
                break;
            }
            if steps >= self.config.max_steps_per_episode {
                debug!(episode, steps, "episode cut at the per-episode step cap");
                break;
            }
        }

        Ok(EpisodeSummary {
            steps,
            episode_return,
            epsilon,
        })
    }

    /// One batched learner update from a replay sample, then decay epsilon once
    /// per replayed transition. `None` when there was nothing to learn from.
    pub fn replay(&mut self) -> Result<Option<f32>> {
        self.session.phase = Phase::Replaying;
        let batch = match self
            .session
            .replay
            .sample(self.config.agent.batch_size, &mut self.session.rng)
        {
            Ok(batch) if batch.is_empty() => return Ok(None),
            Ok(batch) => batch,
            Err(Error::EmptyBufferSample) => {
                debug!("replay buffer is empty, skipping update");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        let processed = batch.len();
        let (states, targets) =
            bootstrapped_targets(&self.learner, &batch, self.config.agent.gamma)?;
        let loss = self.learner.update(&states, &targets)?;
        if !loss.is_finite() {
            warn!(loss, "replay update produced a non-finite loss");
        }

        for _ in 0..processed {
            self.session.epsilon = self.schedule.decay(self.session.epsilon);
        }
        debug!(
            batch = processed,
            loss,
            epsilon = self.session.epsilon,
            "replay update"
        );
        Ok(Some(loss))
    }

    fn checkpoint(&mut self, episode: usize) {
        self.session.phase = Phase::Checkpointing;
        let path = self.config.checkpoint_path.clone();
        match self.learner.save(&path) {
            Ok(()) => debug!(episode, path = %path.display(), "checkpoint saved"),
            Err(err) => {
                error!(episode, path = %path.display(), error = %err, "checkpoint failed");
                self.checkpoint_failures.push(CheckpointFailure {
                    episode,
                    path,
                    message: err.to_string(),
                });
            }
        }
    }

    fn report(&mut self, outcome: TrainingOutcome) -> TrainingReport {
        TrainingReport {
            outcome,
            history: std::mem::take(&mut self.session.history),
            checkpoint_failures: std::mem::take(&mut self.checkpoint_failures),
        }
    }

    /// Train until the rolling mean return reaches the win threshold or the
    /// episode budget runs out.
    pub fn run(&mut self) -> Result<TrainingReport> {
        let window = self.config.score_window;

        for episode in 0..self.config.n_episodes {
            let summary = self.run_episode(episode)?;

            self.session.phase = Phase::Replaying;
            self.session.scores.push_back(summary.episode_return);
            while self.session.scores.len() > window {
                self.session.scores.pop_front();
            }
            let mean_return = self.session.mean_score();
            let mut record = EpisodeRecord {
                episode,
                steps: summary.steps,
                episode_return: summary.episode_return,
                mean_return,
                epsilon: summary.epsilon,
                loss: None,
            };

            if mean_return >= self.config.win_threshold && episode > window {
                let trials = episode - window;
                info!(episode, trials, mean_return, "solved");
                self.session.history.push(record);
                self.checkpoint(episode);
                self.session.phase = Phase::Solved;
                return Ok(self.report(TrainingOutcome::Solved { episode, trials }));
            }

            if self.config.checkpoint_every > 0 && episode % self.config.checkpoint_every == 0 {
                info!(
                    episode,
                    mean_return,
                    epsilon = summary.epsilon,
                    "mean survival over last {} episodes was {:.1} ticks",
                    self.session.scores.len(),
                    mean_return
                );
                self.checkpoint(episode);
            }

            record.loss = self.replay()?;
            self.session.history.push(record);
        }

        let last_episode = self.config.n_episodes.saturating_sub(1);
        info!(last_episode, "did not solve within the episode budget");
        self.checkpoint(last_episode);
        self.session.phase = Phase::Exhausted;
        Ok(self.report(TrainingOutcome::Exhausted { last_episode }))
    }
}
