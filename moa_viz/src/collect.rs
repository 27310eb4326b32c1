use std::path::PathBuf;
use log::{debug, info};
use serde::Serialize;
use moa_core::env::Environment;
use moa_core::frame_stack::FrameStack;
use moa_core::table::{CompleteRollout, RolloutTable};
use moa_rl::error::MoaRlError;
use moa_rl::policy::{ActMode, MixtureOfActorsPolicy};
use moa_rl::tch::{self, Kind, Tensor};
use moa_rl::torch_net::index_tensor_to_i64;
use crate::capture::FrameCapture;
use crate::error::VizError;

/// Name of directory (inside data directory) with captured frames.
pub const IMAGES_DIR: &str = "images";

/// Parameters of rollout collection.
#[derive(Debug, Clone)]
pub struct CollectorConfig{
    /// Number of rows to record.
    pub num_samples: usize,
    /// Frame is captured when number of rows recorded so far is divisible by this number; `0` disables capture.
    pub save_rate: usize,
    pub data_dir: PathBuf,
    pub mode: ActMode,
}

impl CollectorConfig{
    pub fn new(data_dir: PathBuf, num_samples: usize) -> Self{
        Self{
            num_samples,
            save_rate: 1,
            data_dir,
            mode: ActMode::default(),
        }
    }

    pub fn image_dir(&self) -> PathBuf{
        self.data_dir.join(IMAGES_DIR)
    }

    pub fn image_path(&self, index: usize) -> PathBuf{
        self.image_dir().join(format!("img{index}.png"))
    }
}

/// What happened during collection besides recorded rows.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CollectionSummary{
    pub samples: usize,
    pub env_steps: usize,
    /// Episodes finished during collection (environment was reset after each of them).
    pub episodes_finished: usize,
    pub frames_captured: usize,
    /// Number of rows recorded for every actor.
    pub choice_histogram: Vec<usize>,
}

/// Rolls policy out in environment and records `num_samples` pairs of stacked (normalized)
/// observation and chosen actor.
///
/// Row is recorded before the step is made, so collection performs `num_samples - 1` steps.
/// After finished episode environment is reset, stacked frames and recurrent state are zeroed.
/// Observation statistics of policy are not updated.
pub fn collect<E: Environment, C: FrameCapture<E>>(
    env: &mut E,
    policy: &MixtureOfActorsPolicy,
    capture: &mut C,
    config: &CollectorConfig,
) -> Result<(CompleteRollout, CollectionSummary), VizError>{

    let spec = policy.spec();
    if env.observation_size() != spec.frame_size || env.action_space() != spec.action_space{
        return Err(VizError::EnvironmentMismatch {
            policy: format!("observation size {} and action space {}", spec.frame_size, spec.action_space),
            env: format!("{} (observation size {}, action space {})", env.name(), env.observation_size(), env.action_space()),
        })
    }
    let capturing = capture.is_enabled() && config.save_rate > 0;
    if capturing{
        std::fs::create_dir_all(config.image_dir()).map_err(moa_core::error::MoaError::from)?;
    }

    let mut frames = FrameStack::new(spec.frame_size, spec.num_stack);
    let mut table = RolloutTable::new(config.num_samples, spec.observation_size());
    let mut summary = CollectionSummary::default();
    let mut states = policy.initial_states(1);
    let mut masks = Tensor::zeros([1, 1], (Kind::Float, policy.device()));

    let first = env.reset()?;
    frames.push(&policy.normalize_frame(&first)?)?;
    info!("Collecting {} samples from {} with {} actors", config.num_samples, env.name(), spec.num_actors);

    while !table.is_complete(){
        let observation = Tensor::from_slice(frames.as_slice()).view([1, -1]);
        let out = tch::no_grad(|| policy.act(&observation, &states, &masks, config.mode))?;
        let choice = index_tensor_to_i64(&out.choice, "Recording actor choice")? as usize;
        let recorded = table.push(frames.as_slice(), choice)?;
        if table.is_complete(){
            break;
        }

        debug!("Choice {} with probability {}", choice, out.choice_log_prob.exp().double_value(&[0, 0]));
        let action = policy.tensor_to_env_actions(&out.action)?
            .into_iter().next()
            .ok_or_else(|| MoaRlError::ActionSpaceMismatch {
                space: format!("{}", spec.action_space),
                context: "Policy returned empty action tensor".into(),
            })?;
        let outcome = env.step(&action)?;
        summary.env_steps += 1;
        states = out.states;

        let next = match outcome.done{
            true => {
                let _ = masks.f_fill_(0.0).map_err(MoaRlError::from)?;
                states = states.f_mul(&masks).map_err(MoaRlError::from)?;
                frames.clear();
                summary.episodes_finished += 1;
                debug!("Episode finished after {} steps in total, resetting", summary.env_steps);
                env.reset()?
            },
            false => {
                let _ = masks.f_fill_(1.0).map_err(MoaRlError::from)?;
                outcome.observation
            }
        };
        frames.push(&policy.normalize_frame(&next)?)?;

        if capturing && recorded % config.save_rate == 0{
            capture.capture(env, &config.image_path(recorded))?;
            summary.frames_captured += 1;
        }
    }

    let rollout = table.finish()?;
    summary.samples = rollout.len();
    summary.choice_histogram = rollout.choice_histogram(spec.num_actors)?;
    info!("Collected {} samples, choices per actor: {:?}", summary.samples, summary.choice_histogram);
    Ok((rollout, summary))
}
