use serde::{Deserialize, Serialize};
use moa_core::env::ActionSpace;
use crate::distribution::SelectionMode;
use crate::error::MoaRlError;

/// Width of hidden layers of decider, actors and critic.
pub const DEFAULT_HIDDEN_SIZE: usize = 64;

/// Architecture of mixture-of-actors policy. Stored next to weights in policy artifact,
/// so that the network can be rebuilt before loading variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySpec{
    /// Length of single environment observation.
    pub frame_size: usize,
    /// Number of consecutive frames concatenated into network input.
    pub num_stack: usize,
    pub num_actors: usize,
    pub hidden_size: usize,
    pub action_space: ActionSpace,
}

impl PolicySpec{
    pub fn new(frame_size: usize, num_stack: usize, num_actors: usize, action_space: ActionSpace) -> Self{
        Self{
            frame_size,
            num_stack,
            num_actors,
            hidden_size: DEFAULT_HIDDEN_SIZE,
            action_space,
        }
    }

    pub fn with_hidden_size(mut self, hidden_size: usize) -> Self{
        self.hidden_size = hidden_size;
        self
    }

    /// Length of network input: `frame_size * num_stack`.
    pub fn observation_size(&self) -> usize{
        self.frame_size * self.num_stack
    }

    pub fn validate(&self) -> Result<(), MoaRlError>{
        let problem = if self.observation_size() == 0{
            Some("observation size must be positive")
        } else if self.num_actors == 0{
            Some("at least one actor is required")
        } else if self.hidden_size == 0{
            Some("hidden size must be positive")
        } else if self.action_space.num_outputs() == 0{
            Some("action space is empty")
        } else {
            None
        };
        match problem{
            None => Ok(()),
            Some(p) => Err(MoaRlError::InvalidPolicySpec {explanation: p.into()})
        }
    }
}

/// Selection of actor and of action when acting.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActMode{
    pub choice: SelectionMode,
    pub action: SelectionMode,
}

impl ActMode{
    /// Both actor and action sampled, used while training.
    pub fn exploring() -> Self{
        Self{
            choice: SelectionMode::Sample,
            action: SelectionMode::Sample,
        }
    }

    /// Both actor and action most likely.
    pub fn greedy() -> Self{
        Self{
            choice: SelectionMode::Greedy,
            action: SelectionMode::Greedy,
        }
    }
}

/// Actor is sampled from decider, action is taken deterministically from actor's distribution.
impl Default for ActMode{
    fn default() -> Self {
        Self{
            choice: SelectionMode::Sample,
            action: SelectionMode::Greedy,
        }
    }
}

#[cfg(test)]
mod tests{
    use moa_core::env::ActionSpace;
    use crate::policy::PolicySpec;

    #[test]
    fn spec_validation(){
        let spec = PolicySpec::new(4, 2, 3, ActionSpace::Discrete(2));
        assert_eq!(spec.observation_size(), 8);
        assert!(spec.validate().is_ok());
        assert!(PolicySpec::new(4, 1, 0, ActionSpace::Discrete(2)).validate().is_err());
        assert!(PolicySpec::new(4, 1, 2, ActionSpace::Discrete(0)).validate().is_err());
        assert!(PolicySpec::new(0, 1, 2, ActionSpace::Discrete(2)).validate().is_err());
    }

    #[test]
    fn spec_serializes_to_json(){
        let spec = PolicySpec::new(3, 1, 2, ActionSpace::Continuous {dimension: 1, low: -2.0, high: 2.0});
        let json = serde_json::to_string(&spec).unwrap();
        let back: PolicySpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, spec);
    }
}
