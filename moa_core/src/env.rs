use std::fmt::{Display, Formatter};
use serde::{Deserialize, Serialize};
use crate::error::{EnvironmentError, MoaError};

/// Shape of actions accepted by environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActionSpace{
    /// `n` discrete actions indexed `0..n`.
    Discrete(usize),
    /// Real vector of `dimension` elements, each in `[low, high]`.
    Continuous{
        dimension: usize,
        low: f32,
        high: f32,
    }
}

impl ActionSpace{
    /// Number of outputs of distribution head needed to parameterise this space.
    /// For discrete space it is the number of categories, for continuous the number of means.
    pub fn num_outputs(&self) -> usize{
        match self{
            ActionSpace::Discrete(n) => *n,
            ActionSpace::Continuous {dimension, ..} => *dimension,
        }
    }

    pub fn contains(&self, action: &EnvAction) -> bool{
        match (self, action){
            (ActionSpace::Discrete(n), EnvAction::Discrete(a)) => a < n,
            (ActionSpace::Continuous {dimension, ..}, EnvAction::Continuous(v)) => v.len() == *dimension,
            _ => false
        }
    }
}

impl Display for ActionSpace{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self{
            ActionSpace::Discrete(n) => write!(f, "Discrete({n})"),
            ActionSpace::Continuous {dimension, low, high} => write!(f, "Box({low}, {high}, ({dimension},))"),
        }
    }
}

/// Action passed to [`Environment::step`].
#[derive(Debug, Clone, PartialEq)]
pub enum EnvAction{
    Discrete(usize),
    Continuous(Vec<f32>),
}

impl Display for EnvAction{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self{
            EnvAction::Discrete(a) => write!(f, "{a}"),
            EnvAction::Continuous(v) => write!(f, "{v:?}"),
        }
    }
}

/// Result of single environment step.
#[derive(Debug, Clone)]
pub struct StepOutcome{
    pub observation: Vec<f32>,
    pub reward: f32,
    /// Episode ended (terminated or truncated). Environment must be reset before next step.
    pub done: bool,
}

/// Simulated environment driven by rollout loop.
///
/// Environments are expected to be seeded on construction, so that two environments built
/// with the same seed produce identical episodes for identical actions.
pub trait Environment{
    fn name(&self) -> &str;

    /// Length of (single, not stacked) observation vector.
    fn observation_size(&self) -> usize;

    fn action_space(&self) -> ActionSpace;

    /// Starts new episode and returns first observation.
    fn reset(&mut self) -> Result<Vec<f32>, MoaError>;

    /// Advances simulation by one step.
    fn step(&mut self, action: &EnvAction) -> Result<StepOutcome, MoaError>;

    /// Helper for implementations to reject actions not matching [`action_space`](Environment::action_space).
    fn check_action(&self, action: &EnvAction) -> Result<(), MoaError>{
        let space = self.action_space();
        match space.contains(action){
            true => Ok(()),
            false => Err(EnvironmentError::ActionMismatch {
                action: format!("{action}"),
                space: format!("{space}"),
            }.into())
        }
    }
}

#[cfg(test)]
mod tests{
    use crate::env::{ActionSpace, EnvAction};

    #[test]
    fn action_space_membership(){
        let discrete = ActionSpace::Discrete(2);
        assert!(discrete.contains(&EnvAction::Discrete(1)));
        assert!(!discrete.contains(&EnvAction::Discrete(2)));
        assert!(!discrete.contains(&EnvAction::Continuous(vec![0.0])));

        let continuous = ActionSpace::Continuous {dimension: 1, low: -2.0, high: 2.0};
        assert!(continuous.contains(&EnvAction::Continuous(vec![5.0])));
        assert!(!continuous.contains(&EnvAction::Continuous(vec![0.0, 1.0])));
        assert_eq!(continuous.num_outputs(), 1);
        assert_eq!(discrete.num_outputs(), 2);
    }
}
