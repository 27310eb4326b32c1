use plotters::coord::Shift;
use plotters::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use moa_core::env::{ActionSpace, EnvAction, Environment, StepOutcome};
use moa_core::error::{EnvironmentError, MoaError};
use crate::capture::Render;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CartPoleObservation{
    pub position: f32,
    pub velocity: f32,
    pub angle: f32,
    pub angular_velocity: f32,
}

impl CartPoleObservation{
    pub fn to_vec(&self) -> Vec<f32>{
        vec![self.position, self.velocity, self.angle, self.angular_velocity]
    }
}

/// Classic cart-pole balancing task. Action `0` pushes cart left, `1` pushes it right.
/// Reward is 1 for every step, episode ends when pole falls, cart leaves track
/// or after `max_episode_steps`.
#[derive(Debug, Clone)]
pub struct CartPole{
    gravity: f32,
    mass_cart: f32,
    mass_pole: f32,
    length: f32,
    pole_mass_length: f32,
    force_mag: f32,
    tau: f32,

    theta_threshold_radians: f32,
    x_threshold: f32,

    state: Option<CartPoleObservation>,
    finished: bool,
    max_episode_steps: usize,
    steps_made: usize,
    rng: StdRng,
}

impl CartPole{
    #[inline]
    fn total_mass(&self) -> f32{
        self.mass_cart + self.mass_pole
    }

    pub fn new(seed: u64) -> Self{
        let mass_pole = 0.1;
        let length = 0.5;
        Self{
            gravity: 9.8,
            mass_cart: 1.0,
            mass_pole,
            length,
            pole_mass_length: mass_pole * length,
            force_mag: 10.0,
            tau: 0.02,
            theta_threshold_radians: 12.0 * 2.0 * std::f32::consts::PI / 360.0,
            x_threshold: 2.4,
            state: None,
            finished: false,
            max_episode_steps: 500,
            steps_made: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn with_max_episode_steps(mut self, max_episode_steps: usize) -> Self{
        self.max_episode_steps = max_episode_steps;
        self
    }
}

impl Environment for CartPole{
    fn name(&self) -> &str {
        "CartPole-v1"
    }

    fn observation_size(&self) -> usize {
        4
    }

    fn action_space(&self) -> ActionSpace {
        ActionSpace::Discrete(2)
    }

    fn reset(&mut self) -> Result<Vec<f32>, MoaError> {
        let state = CartPoleObservation{
            position: self.rng.random_range(-0.05..0.05),
            velocity: self.rng.random_range(-0.05..0.05),
            angle: self.rng.random_range(-0.05..0.05),
            angular_velocity: self.rng.random_range(-0.05..0.05),
        };
        self.finished = false;
        self.steps_made = 0;
        self.state = Some(state);
        Ok(state.to_vec())
    }

    fn step(&mut self, action: &EnvAction) -> Result<StepOutcome, MoaError> {
        self.check_action(action)?;
        if self.finished{
            return Err(EnvironmentError::EpisodeFinished {steps: self.steps_made}.into())
        }
        let s = self.state.ok_or(EnvironmentError::NotInitialized)?;
        let (mut x, mut x_dot, mut theta, mut theta_dot) = (s.position, s.velocity, s.angle, s.angular_velocity);
        let force = match action {
            EnvAction::Discrete(0) => -self.force_mag,
            _ => self.force_mag,
        };
        let costheta = f32::cos(theta);
        let sintheta = f32::sin(theta);

        let temp = (force + (self.pole_mass_length * theta_dot * theta_dot * sintheta)) / self.total_mass();
        let thetaacc = (self.gravity * sintheta - (costheta * temp)) / (
            self.length * (4.0/3.0 - (self.mass_pole * costheta * costheta / self.total_mass()))
        );
        let xacc = temp - self.pole_mass_length * thetaacc * costheta / self.total_mass();

        x += self.tau * x_dot;
        x_dot += self.tau * xacc;
        theta += self.tau * theta_dot;
        theta_dot += self.tau * thetaacc;
        let state = CartPoleObservation{
            position: x,
            velocity: x_dot,
            angle: theta,
            angular_velocity: theta_dot,
        };
        self.state = Some(state);
        self.steps_made += 1;

        let terminated = x < -self.x_threshold
            || x > self.x_threshold
            || theta < -self.theta_threshold_radians
            || theta > self.theta_threshold_radians;
        self.finished = terminated || self.steps_made >= self.max_episode_steps;
        log::trace!("Cart pole step {}: {:?}, finished: {}", self.steps_made, state, self.finished);

        Ok(StepOutcome{
            observation: state.to_vec(),
            reward: 1.0,
            done: self.finished,
        })
    }
}

impl Render for CartPole{
    fn render<DB: DrawingBackend>(&self, area: &DrawingArea<DB, Shift>) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
        let (width, height) = area.dim_in_pixel();
        let scale = width as f32 / (self.x_threshold * 2.0);
        let track_y = (height as f32 * 0.6) as i32;
        let (cart_w, cart_h) = (50, 30);
        let pole_len = scale * 2.0 * self.length;

        area.draw(&PathElement::new(vec![(0, track_y), (width as i32, track_y)], BLACK))?;
        let state = match &self.state{
            Some(s) => *s,
            None => return Ok(())
        };
        let cart_x = (state.position * scale + width as f32 / 2.0) as i32;
        area.draw(&Rectangle::new(
            [(cart_x - cart_w / 2, track_y - cart_h / 2), (cart_x + cart_w / 2, track_y + cart_h / 2)],
            BLACK.filled()))?;
        let axle = (cart_x, track_y - cart_h / 4);
        let tip = (
            axle.0 + (pole_len * state.angle.sin()) as i32,
            axle.1 - (pole_len * state.angle.cos()) as i32,
        );
        area.draw(&PathElement::new(vec![axle, tip], RGBColor(202, 152, 101).stroke_width(10)))?;
        area.draw(&Circle::new(axle, 5, RGBColor(129, 132, 203).filled()))?;
        Ok(())
    }
}
