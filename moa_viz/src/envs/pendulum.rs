use std::f32::consts::PI;
use plotters::coord::Shift;
use plotters::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use moa_core::env::{ActionSpace, EnvAction, Environment, StepOutcome};
use moa_core::error::{EnvironmentError, MoaError};
use crate::capture::Render;

/// Angle wrapped to `[-pi, pi)`.
fn angle_normalize(angle: f32) -> f32{
    (angle + PI).rem_euclid(2.0 * PI) - PI
}

/// Inverted pendulum swing-up. Observation is `[cos(theta), sin(theta), theta_dot]`,
/// action is a single torque clipped to `[-max_torque, max_torque]`.
#[derive(Debug, Clone)]
pub struct Pendulum{
    max_speed: f32,
    max_torque: f32,
    dt: f32,
    gravity: f32,
    mass: f32,
    length: f32,

    theta: f32,
    theta_dot: f32,
    initialized: bool,
    max_episode_steps: usize,
    steps_made: usize,
    rng: StdRng,
}

impl Pendulum{
    pub fn new(seed: u64) -> Self{
        Self{
            max_speed: 8.0,
            max_torque: 2.0,
            dt: 0.05,
            gravity: 10.0,
            mass: 1.0,
            length: 1.0,
            theta: 0.0,
            theta_dot: 0.0,
            initialized: false,
            max_episode_steps: 200,
            steps_made: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn with_max_episode_steps(mut self, max_episode_steps: usize) -> Self{
        self.max_episode_steps = max_episode_steps;
        self
    }

    fn observation(&self) -> Vec<f32>{
        vec![self.theta.cos(), self.theta.sin(), self.theta_dot]
    }
}

impl Environment for Pendulum{
    fn name(&self) -> &str {
        "Pendulum-v1"
    }

    fn observation_size(&self) -> usize {
        3
    }

    fn action_space(&self) -> ActionSpace {
        ActionSpace::Continuous {
            dimension: 1,
            low: -self.max_torque,
            high: self.max_torque,
        }
    }

    fn reset(&mut self) -> Result<Vec<f32>, MoaError> {
        self.theta = self.rng.random_range(-PI..PI);
        self.theta_dot = self.rng.random_range(-1.0..1.0);
        self.steps_made = 0;
        self.initialized = true;
        Ok(self.observation())
    }

    fn step(&mut self, action: &EnvAction) -> Result<StepOutcome, MoaError> {
        self.check_action(action)?;
        if !self.initialized{
            return Err(EnvironmentError::NotInitialized.into())
        }
        if self.steps_made >= self.max_episode_steps{
            return Err(EnvironmentError::EpisodeFinished {steps: self.steps_made}.into())
        }
        let torque = match action{
            EnvAction::Continuous(v) => v.first().copied().unwrap_or(0.0),
            EnvAction::Discrete(_) => 0.0,
        }.clamp(-self.max_torque, self.max_torque);

        let (g, m, l, dt) = (self.gravity, self.mass, self.length, self.dt);
        let cost = angle_normalize(self.theta).powi(2) + 0.1 * self.theta_dot.powi(2) + 0.001 * torque.powi(2);

        let theta_dot = self.theta_dot + (3.0 * g / (2.0 * l) * self.theta.sin() + 3.0 / (m * l * l) * torque) * dt;
        self.theta_dot = theta_dot.clamp(-self.max_speed, self.max_speed);
        self.theta += self.theta_dot * dt;
        self.steps_made += 1;

        Ok(StepOutcome{
            observation: self.observation(),
            reward: -cost,
            done: self.steps_made >= self.max_episode_steps,
        })
    }
}

impl Render for Pendulum{
    fn render<DB: DrawingBackend>(&self, area: &DrawingArea<DB, Shift>) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
        let (width, height) = area.dim_in_pixel();
        let center = (width as i32 / 2, height as i32 / 2);
        let rod = 0.4 * width.min(height) as f32;
        let tip = (
            center.0 + (rod * self.theta.sin()) as i32,
            center.1 - (rod * self.theta.cos()) as i32,
        );
        area.draw(&PathElement::new(vec![center, tip], RGBColor(204, 77, 77).stroke_width(12)))?;
        area.draw(&Circle::new(tip, 8, RGBColor(204, 77, 77).filled()))?;
        area.draw(&Circle::new(center, 5, BLACK.filled()))?;
        Ok(())
    }
}
