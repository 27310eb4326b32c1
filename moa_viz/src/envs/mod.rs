mod cart_pole;
mod pendulum;

pub use cart_pole::*;
pub use pendulum::*;

use clap::ValueEnum;
use plotters::coord::Shift;
use plotters::prelude::*;
use serde::{Deserialize, Serialize};
use moa_core::env::{ActionSpace, EnvAction, Environment, StepOutcome};
use moa_core::error::{EnvironmentError, MoaError};
use crate::capture::Render;

/// Environments available from command line.
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvName{
    CartPole,
    Pendulum,
}

impl EnvName{
    /// Identifier used in artifact directories, e.g. `CartPole-v1`.
    pub fn id(&self) -> &'static str{
        match self{
            EnvName::CartPole => "CartPole-v1",
            EnvName::Pendulum => "Pendulum-v1",
        }
    }

    pub fn from_id(id: &str) -> Result<Self, EnvironmentError>{
        [EnvName::CartPole, EnvName::Pendulum].into_iter()
            .find(|e| e.id() == id)
            .ok_or_else(|| EnvironmentError::UnknownEnvironment(id.to_string()))
    }

    pub fn build(&self, seed: u64) -> AnyEnv{
        match self{
            EnvName::CartPole => AnyEnv::CartPole(CartPole::new(seed)),
            EnvName::Pendulum => AnyEnv::Pendulum(Pendulum::new(seed)),
        }
    }
}

/// One of the bundled environments.
#[derive(Debug, Clone)]
pub enum AnyEnv{
    CartPole(CartPole),
    Pendulum(Pendulum),
}

impl Environment for AnyEnv{
    fn name(&self) -> &str {
        match self{
            AnyEnv::CartPole(e) => e.name(),
            AnyEnv::Pendulum(e) => e.name(),
        }
    }

    fn observation_size(&self) -> usize {
        match self{
            AnyEnv::CartPole(e) => e.observation_size(),
            AnyEnv::Pendulum(e) => e.observation_size(),
        }
    }

    fn action_space(&self) -> ActionSpace {
        match self{
            AnyEnv::CartPole(e) => e.action_space(),
            AnyEnv::Pendulum(e) => e.action_space(),
        }
    }

    fn reset(&mut self) -> Result<Vec<f32>, MoaError> {
        match self{
            AnyEnv::CartPole(e) => e.reset(),
            AnyEnv::Pendulum(e) => e.reset(),
        }
    }

    fn step(&mut self, action: &EnvAction) -> Result<StepOutcome, MoaError> {
        match self{
            AnyEnv::CartPole(e) => e.step(action),
            AnyEnv::Pendulum(e) => e.step(action),
        }
    }
}

impl Render for AnyEnv{
    fn render<DB: DrawingBackend>(&self, area: &DrawingArea<DB, Shift>) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
        match self{
            AnyEnv::CartPole(e) => e.render(area),
            AnyEnv::Pendulum(e) => e.render(area),
        }
    }
}
