use tch::{Device, Kind, Tensor};
use tch::nn::{Linear, Module, Path, VarStore};
use moa_core::env::{ActionSpace, EnvAction};
use crate::distribution::{ActionDistribution, CategoricalDist, DiagGaussianDist};
use crate::error::{MoaRlError, TensorError};
use crate::normalization::ObservationNormalizer;
use crate::policy::{ActMode, PolicySpec};
use crate::torch_net::{normc_linear, MixtureNet, TensorMixtureOfActors, HEAD_GAIN};

/// Result of [`MixtureOfActorsPolicy::act`] for batch of `B` observations.
#[derive(Debug)]
pub struct ActOutput{
    /// `B x 1`
    pub value: Tensor,
    /// `B x 1` (`i64`) for discrete spaces, `B x N` for continuous.
    pub action: Tensor,
    /// Index of chosen actor, `B x 1` (`i64`).
    pub choice: Tensor,
    pub action_log_prob: Tensor,
    pub choice_log_prob: Tensor,
    /// Recurrent state passed through (multiplied by masks), `B x 1`.
    pub states: Tensor,
}

/// Result of [`MixtureOfActorsPolicy::evaluate_actions`].
#[derive(Debug)]
pub struct EvaluateOutput{
    pub value: Tensor,
    pub action_log_prob: Tensor,
    pub choice_log_prob: Tensor,
    /// Mean entropy of action distribution plus mean entropy of decider distribution (scalar).
    pub entropy: Tensor,
    pub states: Tensor,
}

/// Distribution head shared by all actors, applied to hidden representation of the chosen one.
#[derive(Debug)]
enum ActionHead{
    Categorical{
        logits: Linear,
    },
    DiagGaussian{
        mean: Linear,
        log_std: Tensor,
    }
}

impl ActionHead{
    fn new(path: &Path, hidden: i64, space: &ActionSpace) -> Result<Self, TensorError>{
        match space{
            ActionSpace::Discrete(n) => Ok(Self::Categorical {
                logits: normc_linear(path / "linear", hidden, *n as i64, HEAD_GAIN)?,
            }),
            ActionSpace::Continuous {dimension, ..} => Ok(Self::DiagGaussian {
                mean: normc_linear(path / "fc_mean", hidden, *dimension as i64, 1.0)?,
                log_std: path.zeros("logstd", &[*dimension as i64]),
            })
        }
    }

    fn distribution(&self, hidden: &Tensor) -> Result<ActionDistribution, TensorError>{
        match self{
            ActionHead::Categorical {logits} => {
                CategoricalDist::from_logits(&logits.forward(hidden)).map(ActionDistribution::Categorical)
            },
            ActionHead::DiagGaussian {mean, log_std} => {
                DiagGaussianDist::new(mean.forward(hidden), log_std).map(ActionDistribution::DiagGaussian)
            }
        }
    }
}

/// Builds closure computing critic value, decider logits and hidden output of every actor.
///
/// Decider is two linear layers (no activation between them) followed by categorical logits,
/// every actor is a single linear layer, critic is two `tanh` layers and linear value output.
fn mixture_trunk(path: &Path, input: i64, hidden: i64, num_actors: usize)
    -> Result<impl Fn(&Tensor) -> TensorMixtureOfActors + Send + 'static, TensorError>{

    let decider_path = path / "decider";
    let decider_in = normc_linear(&decider_path / 0, input, hidden, 1.0)?;
    let decider_hidden = normc_linear(&decider_path / 1, hidden, hidden, 1.0)?;
    let decider_logits = normc_linear(path / "ddist", hidden, num_actors as i64, HEAD_GAIN)?;

    let actors_path = path / "actors";
    let actor_layers = (0..num_actors)
        .map(|i| normc_linear(&actors_path / i, input, hidden, 1.0))
        .collect::<Result<Vec<Linear>, TensorError>>()?;

    let critic_path = path / "critic";
    let critic_in = normc_linear(&critic_path / 0, input, hidden, 1.0)?;
    let critic_hidden = normc_linear(&critic_path / 1, hidden, hidden, 1.0)?;
    let critic_out = normc_linear(path / "critic_linear", hidden, 1, 1.0)?;

    Ok(move |x: &Tensor| {
        let decider = x.apply(&decider_in).apply(&decider_hidden).apply(&decider_logits);
        let hidden_actors: Vec<Tensor> = actor_layers.iter().map(|a| x.apply(a)).collect();
        let actors = Tensor::stack(&hidden_actors, 1);
        let critic = x.apply(&critic_in).tanh().apply(&critic_hidden).tanh().apply(&critic_out);
        TensorMixtureOfActors{critic, decider, actors}
    })
}

/// Actor-critic policy with a decider choosing one of several actors for every observation.
///
/// All variables (network weights and observation statistics) live in one [`VarStore`]:
/// trunk at the root, action head under `dist`, normalizer under `ob_rms`.
pub struct MixtureOfActorsPolicy{
    spec: PolicySpec,
    network: MixtureNet,
    head: ActionHead,
    normalizer: ObservationNormalizer,
}

impl MixtureOfActorsPolicy{

    pub fn new(var_store: VarStore, spec: PolicySpec) -> Result<Self, MoaRlError>{
        spec.validate()?;
        let input = spec.observation_size() as i64;
        let hidden = spec.hidden_size as i64;
        let num_actors = spec.num_actors;

        let (head, normalizer) = {
            let root = var_store.root();
            let head = ActionHead::new(&(&root / "dist"), hidden, &spec.action_space)?;
            let normalizer = ObservationNormalizer::new(&(&root / "ob_rms"), spec.frame_size as i64)?;
            (head, normalizer)
        };
        let network = MixtureNet::try_new(var_store, |path| mixture_trunk(path, input, hidden, num_actors))?;

        #[cfg(feature = "log_debug")]
        log::debug!("Built mixture-of-actors policy: {:?}", spec);
        Ok(Self{spec, network, head, normalizer})
    }

    pub fn spec(&self) -> &PolicySpec{
        &self.spec
    }

    pub fn num_actors(&self) -> usize{
        self.spec.num_actors
    }

    /// Size of recurrent state. Policy is not recurrent, state is only passed through.
    pub fn state_size(&self) -> i64{
        1
    }

    pub fn network(&self) -> &MixtureNet{
        &self.network
    }

    pub fn network_mut(&mut self) -> &mut MixtureNet{
        &mut self.network
    }

    pub fn var_store(&self) -> &VarStore{
        self.network.var_store()
    }

    pub fn device(&self) -> Device{
        self.network.device()
    }

    pub fn normalizer(&self) -> &ObservationNormalizer{
        &self.normalizer
    }

    pub fn normalizer_mut(&mut self) -> &mut ObservationNormalizer{
        &mut self.normalizer
    }

    /// Normalizes single (not stacked) frame with current observation statistics.
    pub fn normalize_frame(&self, frame: &[f32]) -> Result<Vec<f32>, MoaRlError>{
        Ok(self.normalizer.normalize_slice(frame)?)
    }

    /// Zero recurrent state for batch of `batch_size`.
    pub fn initial_states(&self, batch_size: i64) -> Tensor{
        Tensor::zeros([batch_size, self.state_size()], (Kind::Float, self.device()))
    }

    fn batch_input(&self, observations: &Tensor) -> Result<Tensor, TensorError>{
        let batch = match observations.dim(){
            1 => observations.unsqueeze(0),
            _ => observations.shallow_clone(),
        };
        let size = batch.size();
        match size.as_slice(){
            [_, d] if *d == self.spec.observation_size() as i64 => {
                batch.f_to_kind(Kind::Float)
                    .and_then(|b| b.f_to_device(self.device()))
                    .map_err(|e| TensorError::from_tch_with_context(e, "Moving observations to policy device".into()))
            },
            _ => Err(TensorError::Shape {
                shape: size.clone(),
                expected: vec![-1, self.spec.observation_size() as i64],
                context: "Observation batch for mixture-of-actors policy".into(),
            })
        }
    }

    fn pass_states(&self, states: &Tensor, masks: &Tensor) -> Result<Tensor, TensorError>{
        states.f_to_device(self.device())
            .and_then(|s| s.f_mul(&masks.to_device(self.device())))
            .map_err(|e| TensorError::from_tch_with_context(e, "Masking recurrent states".into()))
    }

    fn choice_index(&self, choice: &Tensor) -> Result<Tensor, TensorError>{
        choice.f_to_kind(Kind::Int64)
            .and_then(|c| c.f_to_device(self.device()))
            .and_then(|c| c.f_view([-1, 1]))
            .map_err(|e| TensorError::from_tch_with_context(e, format!("Actor choice tensor {:?}", choice.size())))
    }

    /// Raw trunk output for observations (`B x D` or single `D`).
    pub fn forward(&self, observations: &Tensor) -> Result<TensorMixtureOfActors, MoaRlError>{
        let input = self.batch_input(observations)?;
        Ok((self.network.net())(&input))
    }

    /// Decider's distribution over actors.
    pub fn choice_distribution(&self, observations: &Tensor) -> Result<CategoricalDist, MoaRlError>{
        let out = self.forward(observations)?;
        Ok(CategoricalDist::from_logits(&out.decider)?)
    }

    /// Distribution of action when actor `choice` handles the observations.
    pub fn action_distribution(&self, observations: &Tensor, choice: &Tensor) -> Result<ActionDistribution, MoaRlError>{
        let out = self.forward(observations)?;
        let hidden = out.select_actor(&self.choice_index(choice)?)?;
        Ok(self.head.distribution(&hidden)?)
    }

    /// Chooses actor for every observation and takes action from its distribution.
    pub fn act(&self, observations: &Tensor, states: &Tensor, masks: &Tensor, mode: ActMode) -> Result<ActOutput, MoaRlError>{
        let out = self.forward(observations)?;
        let decider = CategoricalDist::from_logits(&out.decider)?;
        let choice = decider.select(mode.choice)?;
        let choice_log_prob = decider.log_prob(&choice)?;

        let hidden = out.select_actor(&choice)?;
        let dist = self.head.distribution(&hidden)?;
        let action = dist.select(mode.action)?;
        let action_log_prob = dist.log_prob(&action)?;

        #[cfg(feature = "log_trace")]
        log::trace!("Decider probabilities: {}, choice: {}", decider.probs(), choice);

        Ok(ActOutput{
            value: out.critic,
            action,
            choice,
            action_log_prob,
            choice_log_prob,
            states: self.pass_states(states, masks)?,
        })
    }

    pub fn get_value(&self, observations: &Tensor, _states: &Tensor, _masks: &Tensor) -> Result<Tensor, MoaRlError>{
        Ok(self.forward(observations)?.critic)
    }

    /// Recomputes log probabilities of recorded actions and choices, used in training.
    pub fn evaluate_actions(&self, observations: &Tensor, states: &Tensor, masks: &Tensor, action: &Tensor, choice: &Tensor)
        -> Result<EvaluateOutput, MoaRlError>{

        let out = self.forward(observations)?;
        let decider = CategoricalDist::from_logits(&out.decider)?;
        let choice = self.choice_index(choice)?;
        let choice_log_prob = decider.log_prob(&choice)?;

        let hidden = out.select_actor(&choice)?;
        let dist = self.head.distribution(&hidden)?;
        let action_log_prob = dist.log_prob(&action.to_device(self.device()))?;
        let entropy = dist.entropy().mean(Kind::Float) + decider.entropy().mean(Kind::Float);

        Ok(EvaluateOutput{
            value: out.critic,
            action_log_prob,
            choice_log_prob,
            entropy,
            states: self.pass_states(states, masks)?,
        })
    }

    /// Converts action tensor returned by [`act`](MixtureOfActorsPolicy::act) into one action per batch row.
    pub fn tensor_to_env_actions(&self, action: &Tensor) -> Result<Vec<EnvAction>, MoaRlError>{
        let flat = action.to_device(Device::Cpu).view([-1]);
        match &self.spec.action_space{
            ActionSpace::Discrete(n) => {
                let indices = Vec::<i64>::try_from(&flat)
                    .map_err(|e| TensorError::from_tch_with_context(e, "Converting discrete actions".into()))?;
                indices.into_iter().map(|i| match i >= 0 && (i as usize) < *n{
                    true => Ok(EnvAction::Discrete(i as usize)),
                    false => Err(MoaRlError::ActionSpaceMismatch {
                        space: format!("{}", self.spec.action_space),
                        context: format!("Action index {i}"),
                    })
                }).collect()
            },
            ActionSpace::Continuous {dimension, ..} => {
                let values = Vec::<f32>::try_from(&flat.to_kind(Kind::Float))
                    .map_err(|e| TensorError::from_tch_with_context(e, "Converting continuous actions".into()))?;
                if *dimension == 0 || values.len() % dimension != 0{
                    return Err(MoaRlError::ActionSpaceMismatch {
                        space: format!("{}", self.spec.action_space),
                        context: format!("Action tensor of shape {:?}", action.size()),
                    })
                }
                Ok(values.chunks(*dimension).map(|c| EnvAction::Continuous(c.to_vec())).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests{
    use tch::{Device, Kind, Tensor};
    use tch::nn::VarStore;
    use moa_core::env::{ActionSpace, EnvAction};
    use crate::distribution::{CategoricalDist, SelectionMode};
    use crate::policy::{ActMode, MixtureOfActorsPolicy, PolicySpec};

    fn policy(action_space: ActionSpace) -> MixtureOfActorsPolicy{
        tch::manual_seed(17);
        MixtureOfActorsPolicy::new(VarStore::new(Device::Cpu), PolicySpec::new(4, 2, 3, action_space)).unwrap()
    }

    fn max_abs_diff(a: &Tensor, b: &Tensor) -> f64{
        (a - b).abs().max().double_value(&[])
    }

    #[test]
    fn choice_probabilities_sum_to_one(){
        let policy = policy(ActionSpace::Discrete(2));
        let obs = Tensor::randn([16, 8], (Kind::Float, Device::Cpu));
        let dist = policy.choice_distribution(&obs).unwrap();
        let sums = Vec::<f32>::try_from(&dist.probs().sum_dim_intlist(-1i64, false, Kind::Float)).unwrap();
        assert_eq!(sums.len(), 16);
        for s in sums{
            assert!((s - 1.0).abs() < 1e-5);
        }

        let states = policy.initial_states(16);
        let masks = Tensor::ones([16, 1], (Kind::Float, Device::Cpu));
        let out = policy.act(&obs, &states, &masks, ActMode::exploring()).unwrap();
        let choices = Vec::<i64>::try_from(&out.choice.view([-1])).unwrap();
        assert!(choices.iter().all(|c| (0..3).contains(c)));
        assert_eq!(out.value.size(), vec![16, 1]);
        assert_eq!(out.action.size(), vec![16, 1]);
        assert_eq!(out.states.size(), vec![16, 1]);
    }

    #[test]
    fn greedy_choice_invariant_to_logit_scaling(){
        let policy = policy(ActionSpace::Discrete(2));
        let obs = Tensor::randn([10, 8], (Kind::Float, Device::Cpu));
        let states = policy.initial_states(10);
        let masks = Tensor::ones([10, 1], (Kind::Float, Device::Cpu));
        let out = policy.act(&obs, &states, &masks, ActMode::greedy()).unwrap();

        let logits = policy.forward(&obs).unwrap().decider;
        let scaled = CategoricalDist::from_logits(&(logits * 7.5)).unwrap();
        let scaled_choice = scaled.select(SelectionMode::Greedy).unwrap();
        assert_eq!(Vec::<i64>::try_from(&out.choice.view([-1])).unwrap(),
                   Vec::<i64>::try_from(&scaled_choice.view([-1])).unwrap());
    }

    #[test]
    fn non_selected_actor_does_not_affect_action(){
        let policy = policy(ActionSpace::Continuous {dimension: 2, low: -1.0, high: 1.0});
        let obs = Tensor::randn([5, 8], (Kind::Float, Device::Cpu));
        let choice = Tensor::zeros([5], (Kind::Int64, Device::Cpu));
        let before = policy.action_distribution(&obs, &choice).unwrap().parameters();

        let mut variables = policy.var_store().variables();
        let mut other = variables.remove("actors.1.weight").unwrap();
        tch::no_grad(|| other.f_add_scalar_(1.0)).unwrap();
        let after = policy.action_distribution(&obs, &choice).unwrap().parameters();
        assert!(max_abs_diff(&before, &after) < 1e-7);

        let mut selected = variables.remove("actors.0.weight").unwrap();
        tch::no_grad(|| selected.f_add_scalar_(1.0)).unwrap();
        let changed = policy.action_distribution(&obs, &choice).unwrap().parameters();
        assert!(max_abs_diff(&before, &changed) > 1e-4);
    }

    #[test]
    fn log_probabilities_are_finite_and_recomputable(){
        for space in [ActionSpace::Discrete(2), ActionSpace::Continuous {dimension: 1, low: -2.0, high: 2.0}]{
            let policy = policy(space);
            let obs = Tensor::randn([12, 8], (Kind::Float, Device::Cpu));
            let states = policy.initial_states(12);
            let masks = Tensor::ones([12, 1], (Kind::Float, Device::Cpu));
            let out = policy.act(&obs, &states, &masks, ActMode::exploring()).unwrap();
            for lp in Vec::<f32>::try_from(&out.action_log_prob.view([-1])).unwrap(){
                assert!(lp.is_finite());
            }
            for lp in Vec::<f32>::try_from(&out.choice_log_prob.view([-1])).unwrap(){
                assert!(lp.is_finite() && lp <= 0.0);
            }
            let eval = policy.evaluate_actions(&obs, &states, &masks, &out.action, &out.choice).unwrap();
            assert!(max_abs_diff(&eval.action_log_prob, &out.action_log_prob) < 1e-5);
            assert!(max_abs_diff(&eval.choice_log_prob, &out.choice_log_prob) < 1e-5);
            assert!(eval.entropy.double_value(&[]).is_finite());
        }
    }

    #[test]
    fn masks_reset_passed_states(){
        let policy = policy(ActionSpace::Discrete(2));
        let obs = Tensor::randn([2, 8], (Kind::Float, Device::Cpu));
        let states = Tensor::ones([2, 1], (Kind::Float, Device::Cpu));
        let masks = Tensor::from_slice(&[1.0f32, 0.0]).view([2, 1]);
        let out = policy.act(&obs, &states, &masks, ActMode::default()).unwrap();
        assert_eq!(Vec::<f32>::try_from(&out.states.view([-1])).unwrap(), vec![1.0, 0.0]);
    }

    #[test]
    fn wrong_observation_width_is_rejected(){
        let policy = policy(ActionSpace::Discrete(2));
        let obs = Tensor::zeros([3, 4], (Kind::Float, Device::Cpu));
        assert!(policy.choice_distribution(&obs).is_err());
    }

    #[test]
    fn actions_convert_to_env_actions(){
        let policy = policy(ActionSpace::Discrete(2));
        let actions = policy.tensor_to_env_actions(&Tensor::from_slice(&[1i64, 0]).view([2, 1])).unwrap();
        assert_eq!(actions, vec![EnvAction::Discrete(1), EnvAction::Discrete(0)]);
        assert!(policy.tensor_to_env_actions(&Tensor::from_slice(&[2i64])).is_err());
    }
}
