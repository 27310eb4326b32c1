use getset::{CopyGetters, Setters};
use rand::prelude::SliceRandom;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tch::{Kind, Tensor};
use tch::nn::{Adam, Optimizer};
use moa_core::env::Environment;
use moa_core::frame_stack::FrameStack;
use crate::error::{MoaRlError, TensorError};
use crate::policy::{ActMode, MixtureOfActorsPolicy};

/// Configuration of PPO training.
#[derive(Copy, Clone, Debug, CopyGetters, Setters, Serialize, Deserialize)]
#[getset(get_copy = "pub", set = "pub")]
pub struct ConfigPpo{
    pub gamma: f64,
    pub gae_lambda: f64,
    pub clip_coef: f64,
    pub vf_coef: f64,
    pub ent_coef: f64,
    pub max_grad_norm: f64,
    pub learning_rate: f64,
    /// Environment steps collected before every update.
    pub num_steps: usize,
    pub num_updates: usize,
    pub ppo_epochs: usize,
    pub mini_batch_size: usize,
    /// Seed of mini-batch shuffling.
    pub seed: u64,
    /// Number of updates between progress reports.
    pub log_interval: usize,
}

impl Default for ConfigPpo{
    fn default() -> Self {
        Self{
            gamma: 0.99,
            gae_lambda: 0.95,
            clip_coef: 0.2,
            vf_coef: 0.5,
            ent_coef: 0.01,
            max_grad_norm: 0.5,
            learning_rate: 3e-4,
            num_steps: 2048,
            num_updates: 100,
            ppo_epochs: 10,
            mini_batch_size: 64,
            seed: 1,
            log_interval: 10,
        }
    }
}

/// Statistics of single update.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateSummary{
    pub update: usize,
    pub env_steps: usize,
    /// Mean return of (up to) ten most recently finished episodes.
    pub mean_return: Option<f32>,
    pub value_loss: f64,
    pub action_loss: f64,
    pub entropy: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TrainSummary{
    pub episodes: usize,
    pub updates: Vec<UpdateSummary>,
}

impl TrainSummary{
    pub fn last_mean_return(&self) -> Option<f32>{
        self.updates.iter().rev().find_map(|u| u.mean_return)
    }
}

struct RolloutBatch{
    observations: Tensor,
    actions: Tensor,
    choices: Tensor,
    log_probs: Tensor,
    advantages: Tensor,
    returns: Tensor,
}

/// Generalized advantage estimation over single rollout.
/// `dones[t]` marks that episode ended after step `t`. Returns advantages and returns (`advantage + value`).
pub fn generalized_advantages(rewards: &[f32], values: &[f32], dones: &[bool], last_value: f32, gamma: f64, gae_lambda: f64)
    -> (Vec<f32>, Vec<f32>){

    let steps = rewards.len();
    let mut advantages = vec![0.0f32; steps];
    let mut gae = 0.0f64;
    for t in (0..steps).rev(){
        let next_value = match t + 1 == steps{
            true => last_value,
            false => values[t + 1],
        } as f64;
        let nonterminal = if dones[t] { 0.0 } else { 1.0 };
        let delta = rewards[t] as f64 + gamma * next_value * nonterminal - values[t] as f64;
        gae = delta + gamma * gae_lambda * nonterminal * gae;
        advantages[t] = gae as f32;
    }
    let returns = advantages.iter().zip(values.iter()).map(|(a, v)| a + v).collect();
    (advantages, returns)
}

/// Trains [`MixtureOfActorsPolicy`] with PPO on single environment.
///
/// Actor choice and action are both sampled, the probability of a step is the product of
/// choice and action probabilities. Observation statistics are updated with every raw frame.
pub struct PpoTrainer<E: Environment>{
    env: E,
    policy: MixtureOfActorsPolicy,
    optimizer: Optimizer,
    config: ConfigPpo,
    frames: FrameStack,
    rng: StdRng,
    episode_return: f32,
    finished_returns: Vec<f32>,
    env_steps: usize,
}

impl<E: Environment> PpoTrainer<E>{

    pub fn new(mut env: E, policy: MixtureOfActorsPolicy, config: ConfigPpo) -> Result<Self, MoaRlError>{
        let spec = policy.spec();
        if env.action_space() != spec.action_space || env.observation_size() != spec.frame_size{
            return Err(MoaRlError::ActionSpaceMismatch {
                space: format!("{}", spec.action_space),
                context: format!("Environment {} with observation size {} and action space {}",
                    env.name(), env.observation_size(), env.action_space()),
            })
        }
        let optimizer = policy.network().build_optimizer(Adam::default(), config.learning_rate)
            .map_err(|e| TensorError::from_tch_with_context(e, "Building Adam optimizer".into()))?;
        let frames = FrameStack::new(spec.frame_size, spec.num_stack);
        let first = env.reset()?;
        let mut trainer = Self{
            env,
            policy,
            optimizer,
            config,
            frames,
            rng: StdRng::seed_from_u64(config.seed),
            episode_return: 0.0,
            finished_returns: Vec::new(),
            env_steps: 0,
        };
        trainer.observe(&first)?;
        Ok(trainer)
    }

    pub fn policy(&self) -> &MixtureOfActorsPolicy{
        &self.policy
    }

    pub fn into_policy(self) -> MixtureOfActorsPolicy{
        self.policy
    }

    pub fn config(&self) -> &ConfigPpo{
        &self.config
    }

    fn observe(&mut self, raw_frame: &[f32]) -> Result<(), MoaRlError>{
        self.policy.normalizer_mut().update_slice(raw_frame)?;
        let normalized = self.policy.normalize_frame(raw_frame)?;
        self.frames.push(&normalized)?;
        Ok(())
    }

    fn current_observation(&self) -> Tensor{
        Tensor::from_slice(self.frames.as_slice()).view([1, -1])
    }

    fn recent_mean_return(&self) -> Option<f32>{
        let recent: Vec<f32> = self.finished_returns.iter().rev().take(10).copied().collect();
        match recent.is_empty(){
            true => None,
            false => Some(recent.iter().sum::<f32>() / recent.len() as f32),
        }
    }

    fn collect_rollout(&mut self) -> Result<RolloutBatch, MoaRlError>{
        let steps = self.config.num_steps;
        if steps == 0{
            return Err(MoaRlError::NoTrainingData)
        }
        let mut observations = Vec::with_capacity(steps);
        let mut actions = Vec::with_capacity(steps);
        let mut choices = Vec::with_capacity(steps);
        let mut log_probs = Vec::with_capacity(steps);
        let mut values = Vec::with_capacity(steps);
        let mut rewards = Vec::with_capacity(steps);
        let mut dones = Vec::with_capacity(steps);

        let states = self.policy.initial_states(1);
        let masks = Tensor::ones([1, 1], (Kind::Float, self.policy.device()));

        for _ in 0..steps{
            let obs = self.current_observation();
            let out = tch::no_grad(|| self.policy.act(&obs, &states, &masks, ActMode::exploring()))?;
            let action = self.policy.tensor_to_env_actions(&out.action)?
                .into_iter().next()
                .ok_or_else(|| MoaRlError::ActionSpaceMismatch {
                    space: format!("{}", self.policy.spec().action_space),
                    context: "Policy returned empty action tensor".into(),
                })?;

            let outcome = self.env.step(&action)?;
            self.env_steps += 1;
            self.episode_return += outcome.reward;
            let next_frame = match outcome.done{
                true => {
                    #[cfg(feature = "log_debug")]
                    log::debug!("Episode finished with return {}", self.episode_return);
                    self.finished_returns.push(self.episode_return);
                    self.episode_return = 0.0;
                    self.frames.clear();
                    self.env.reset()?
                },
                false => outcome.observation,
            };
            self.observe(&next_frame)?;

            observations.push(obs.squeeze_dim(0));
            actions.push(out.action.squeeze_dim(0));
            choices.push(out.choice.squeeze_dim(0));
            log_probs.push((out.action_log_prob + out.choice_log_prob).squeeze_dim(0));
            values.push(out.value.double_value(&[0, 0]) as f32);
            rewards.push(outcome.reward);
            dones.push(outcome.done);
        }

        let last_obs = self.current_observation();
        let last_value = tch::no_grad(|| self.policy.get_value(&last_obs, &states, &masks))?
            .double_value(&[0, 0]) as f32;
        let (advantages, returns) = generalized_advantages(
            &rewards, &values, &dones, last_value, self.config.gamma, self.config.gae_lambda);

        let device = self.policy.device();
        let stack = |v: &[Tensor], what: &str| Tensor::f_stack(v, 0)
            .and_then(|t| t.f_to_device(device))
            .map_err(|e| TensorError::from_tch_with_context(e, format!("Stacking rollout {what}")));
        let advantages = Tensor::from_slice(&advantages).view([-1, 1]).to_device(device);
        let advantages = (&advantages - advantages.mean(Kind::Float)) / (advantages.std(false) + 1e-5);
        Ok(RolloutBatch{
            observations: stack(&observations, "observations")?,
            actions: stack(&actions, "actions")?,
            choices: stack(&choices, "choices")?,
            log_probs: stack(&log_probs, "log probabilities")?,
            advantages,
            returns: Tensor::from_slice(&returns).view([-1, 1]).to_device(device),
        })
    }

    fn update(&mut self, batch: &RolloutBatch) -> Result<(f64, f64, f64), MoaRlError>{
        let batch_size = batch.observations.size()[0];
        let mini_batch = self.config.mini_batch_size.max(1);
        let mut indices: Vec<i64> = (0..batch_size).collect();
        let (mut value_sum, mut action_sum, mut entropy_sum, mut count) = (0.0, 0.0, 0.0, 0usize);

        for _epoch in 0..self.config.ppo_epochs{
            indices.shuffle(&mut self.rng);
            for chunk in indices.chunks(mini_batch){
                let index = Tensor::from_slice(chunk).to_device(self.policy.device());
                let select = |t: &Tensor| t.f_index_select(0, &index)
                    .map_err(|e| TensorError::from_tch_with_context(e, "Selecting mini-batch".into()));
                let observations = select(&batch.observations)?;
                let old_log_probs = select(&batch.log_probs)?;
                let advantages = select(&batch.advantages)?;
                let returns = select(&batch.returns)?;

                let n = chunk.len() as i64;
                let states = self.policy.initial_states(n);
                let masks = Tensor::ones([n, 1], (Kind::Float, self.policy.device()));
                let eval = self.policy.evaluate_actions(
                    &observations, &states, &masks,
                    &select(&batch.actions)?, &select(&batch.choices)?)?;

                let log_probs = &eval.action_log_prob + &eval.choice_log_prob;
                let ratio = (log_probs - old_log_probs).exp();
                let surrogate = &ratio * &advantages;
                let clipped = ratio.clamp(1.0 - self.config.clip_coef, 1.0 + self.config.clip_coef) * &advantages;
                let action_loss = -surrogate.min_other(&clipped).mean(Kind::Float);
                let value_loss = (returns - &eval.value).square().mean(Kind::Float);
                let loss = &value_loss * self.config.vf_coef + &action_loss - &eval.entropy * self.config.ent_coef;

                self.optimizer.zero_grad();
                self.optimizer.backward_step_clip_norm(&loss, self.config.max_grad_norm);

                value_sum += value_loss.double_value(&[]);
                action_sum += action_loss.double_value(&[]);
                entropy_sum += eval.entropy.double_value(&[]);
                count += 1;
            }
        }
        let count = count.max(1) as f64;
        Ok((value_sum / count, action_sum / count, entropy_sum / count))
    }

    /// Runs `num_updates` iterations of rollout collection and optimisation.
    pub fn train(&mut self) -> Result<TrainSummary, MoaRlError>{
        let mut summary = TrainSummary::default();
        for update in 0..self.config.num_updates{
            let batch = self.collect_rollout()?;
            let (value_loss, action_loss, entropy) = self.update(&batch)?;
            let record = UpdateSummary{
                update,
                env_steps: self.env_steps,
                mean_return: self.recent_mean_return(),
                value_loss,
                action_loss,
                entropy,
            };
            #[cfg(feature = "log_info")]
            if self.config.log_interval > 0 && update % self.config.log_interval == 0{
                log::info!("Update {}, steps {}, mean return {:?}, value loss {:.4}, action loss {:.4}, entropy {:.4}",
                    record.update, record.env_steps, record.mean_return, record.value_loss, record.action_loss, record.entropy);
            }
            summary.updates.push(record);
        }
        summary.episodes = self.finished_returns.len();
        Ok(summary)
    }
}

#[cfg(test)]
mod tests{
    use tch::Device;
    use tch::nn::VarStore;
    use moa_core::env::{ActionSpace, EnvAction, Environment, StepOutcome};
    use moa_core::error::MoaError;
    use crate::policy::{MixtureOfActorsPolicy, PolicySpec};
    use crate::train::{generalized_advantages, ConfigPpo, PpoTrainer};

    /// Reward 1 for action equal to sign of observation, episodes of 5 steps.
    struct SignGame{
        state: f32,
        steps: usize,
    }

    impl Environment for SignGame{
        fn name(&self) -> &str {
            "sign-game"
        }

        fn observation_size(&self) -> usize {
            1
        }

        fn action_space(&self) -> ActionSpace {
            ActionSpace::Discrete(2)
        }

        fn reset(&mut self) -> Result<Vec<f32>, MoaError> {
            self.steps = 0;
            self.state = 1.0;
            Ok(vec![self.state])
        }

        fn step(&mut self, action: &EnvAction) -> Result<StepOutcome, MoaError> {
            self.check_action(action)?;
            let reward = match (action, self.state > 0.0){
                (EnvAction::Discrete(1), true) | (EnvAction::Discrete(0), false) => 1.0,
                _ => 0.0,
            };
            self.steps += 1;
            self.state = -self.state;
            Ok(StepOutcome{observation: vec![self.state], reward, done: self.steps == 5})
        }
    }

    #[test]
    fn advantages_stop_at_episode_end(){
        let (adv, ret) = generalized_advantages(&[1.0, 1.0], &[0.0, 0.0], &[true, false], 10.0, 0.5, 1.0);
        assert!((adv[0] - 1.0).abs() < 1e-6);
        assert!((adv[1] - 6.0).abs() < 1e-6);
        assert_eq!(adv, ret);
    }

    #[test]
    fn training_runs_and_reports(){
        tch::manual_seed(5);
        let policy = MixtureOfActorsPolicy::new(VarStore::new(Device::Cpu),
            PolicySpec::new(1, 2, 2, ActionSpace::Discrete(2))).unwrap();
        let mut config = ConfigPpo::default();
        config.set_num_steps(20).set_num_updates(3).set_ppo_epochs(2).set_mini_batch_size(8);
        let mut trainer = PpoTrainer::new(SignGame{state: 1.0, steps: 0}, policy, config).unwrap();
        let summary = trainer.train().unwrap();
        assert_eq!(summary.updates.len(), 3);
        assert_eq!(summary.episodes, 12);
        assert!(summary.last_mean_return().is_some());
        assert!(summary.updates.iter().all(|u| u.value_loss.is_finite() && u.entropy.is_finite()));
        assert!(trainer.policy().normalizer().count() > 60.0);
    }

    #[test]
    fn single_step_rollouts_keep_weights_finite(){
        tch::manual_seed(6);
        let policy = MixtureOfActorsPolicy::new(VarStore::new(Device::Cpu),
            PolicySpec::new(1, 1, 2, ActionSpace::Discrete(2))).unwrap();
        let mut config = ConfigPpo::default();
        config.set_num_steps(1).set_num_updates(3).set_ppo_epochs(1).set_mini_batch_size(1);
        let mut trainer = PpoTrainer::new(SignGame{state: 1.0, steps: 0}, policy, config).unwrap();
        let summary = trainer.train().unwrap();
        assert!(summary.updates.iter().all(|u| u.action_loss.is_finite() && u.value_loss.is_finite()));
        let policy = trainer.into_policy();
        for (name, var) in policy.var_store().variables(){
            let non_finite = var.isfinite().logical_not().sum(tch::Kind::Int64).int64_value(&[]);
            assert_eq!(non_finite, 0, "variable {name} is not finite");
        }
    }

    #[test]
    fn mismatched_environment_is_rejected(){
        let policy = MixtureOfActorsPolicy::new(VarStore::new(Device::Cpu),
            PolicySpec::new(1, 1, 2, ActionSpace::Discrete(3))).unwrap();
        assert!(PpoTrainer::new(SignGame{state: 1.0, steps: 0}, policy, ConfigPpo::default()).is_err());
    }
}
