//! Exact t-SNE (t-distributed stochastic neighbour embedding) to two dimensions.
//!
//! Pairwise affinities are computed for all pairs of samples, so memory and time are
//! quadratic in number of samples. This is fine for rollouts of a few thousand rows.

use std::ops::Range;
use log::{debug, info};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use crate::error::VizError;

const PERPLEXITY_TOLERANCE: f64 = 1e-5;
const MAX_BINARY_SEARCH_STEPS: usize = 100;
const MACHINE_EPSILON: f64 = 1e-12;

/// Parameters of t-SNE optimisation.
#[derive(Debug, Clone, Copy)]
pub struct TsneConfig{
    pub perplexity: f64,
    pub iterations: usize,
    pub learning_rate: f64,
    pub early_exaggeration: f64,
    /// Number of first iterations run with exaggerated affinities and initial momentum.
    pub exploration_iterations: usize,
    pub initial_momentum: f64,
    pub final_momentum: f64,
    pub min_gain: f64,
    pub seed: u64,
}

impl Default for TsneConfig{
    fn default() -> Self {
        Self{
            perplexity: 40.0,
            iterations: 300,
            learning_rate: 200.0,
            early_exaggeration: 12.0,
            exploration_iterations: 250,
            initial_momentum: 0.5,
            final_momentum: 0.8,
            min_gain: 0.01,
            seed: 0,
        }
    }
}

impl TsneConfig{
    /// Perplexity actually used for `samples` rows: too large perplexity cannot be reached
    /// with few neighbours, so it is limited to `(samples - 1) / 3`.
    pub fn effective_perplexity(&self, samples: usize) -> f64{
        let limit = ((samples as f64 - 1.0) / 3.0).max(1.0);
        self.perplexity.min(limit)
    }
}

/// Squared euclidean distances between rows.
pub fn squared_distances(data: ArrayView2<f64>) -> Array2<f64>{
    let norms: Array1<f64> = data.map_axis(Axis(1), |row| row.dot(&row));
    let gram = data.dot(&data.t());
    let n = data.nrows();
    Array2::from_shape_fn((n, n), |(i, j)| {
        match i == j{
            true => 0.0,
            false => (norms[i] + norms[j] - 2.0 * gram[[i, j]]).max(0.0)
        }
    })
}

/// Conditional probabilities `p(j|i)` of row `i`, with Gaussian precision found by binary
/// search so that the entropy of the distribution equals `ln(perplexity)`.
fn conditional_row(distances: ArrayView1<f64>, i: usize, target_entropy: f64) -> Array1<f64>{
    let n = distances.len();
    let min_distance = distances.iter().enumerate()
        .filter(|(j, _)| *j != i)
        .map(|(_, d)| *d)
        .fold(f64::INFINITY, f64::min);
    let shifted: Array1<f64> = distances.mapv(|d| d - min_distance);

    let mut beta = 1.0;
    let mut beta_min = f64::NEG_INFINITY;
    let mut beta_max = f64::INFINITY;
    let mut row = Array1::<f64>::zeros(n);

    for _ in 0..MAX_BINARY_SEARCH_STEPS{
        for j in 0..n{
            row[j] = match j == i{
                true => 0.0,
                false => (-shifted[j] * beta).exp(),
            };
        }
        let sum = row.sum().max(MACHINE_EPSILON);
        let weighted: f64 = row.iter().zip(shifted.iter()).map(|(p, d)| p * d).sum();
        let entropy = sum.ln() + beta * weighted / sum;
        row /= sum;

        let diff = entropy - target_entropy;
        if diff.abs() < PERPLEXITY_TOLERANCE{
            break;
        }
        if diff > 0.0{
            beta_min = beta;
            beta = match beta_max.is_infinite(){
                true => beta * 2.0,
                false => (beta + beta_max) / 2.0,
            };
        } else {
            beta_max = beta;
            beta = match beta_min.is_infinite(){
                true => beta / 2.0,
                false => (beta + beta_min) / 2.0,
            };
        }
    }
    row
}

/// Symmetric joint probabilities `P` of high dimensional data.
pub fn joint_probabilities(data: ArrayView2<f64>, perplexity: f64) -> Array2<f64>{
    let n = data.nrows();
    let distances = squared_distances(data);
    let target_entropy = perplexity.ln();
    let mut conditional = Array2::<f64>::zeros((n, n));
    for (i, mut row) in conditional.axis_iter_mut(Axis(0)).enumerate(){
        row.assign(&conditional_row(distances.row(i), i, target_entropy));
    }
    let symmetric = &conditional + &conditional.t();
    let total = symmetric.sum().max(MACHINE_EPSILON);
    symmetric.mapv(|p| (p / total).max(MACHINE_EPSILON))
}

/// Kullback-Leibler divergence between `P` and `Q`.
fn kl_divergence(p: &Array2<f64>, q: &Array2<f64>) -> f64{
    p.iter().zip(q.iter())
        .map(|(p, q)| p * (p / q.max(MACHINE_EPSILON)).ln())
        .sum()
}

pub struct Tsne{
    config: TsneConfig,
}

impl Tsne{
    pub fn new(config: TsneConfig) -> Self{
        Self{config}
    }

    pub fn config(&self) -> &TsneConfig{
        &self.config
    }

    /// Embeds rows of `data` (`N x D`) into `N x 2`.
    ///
    /// Optimisation runs in two phases (exaggerated exploration, then refinement), each one
    /// starting with zero update and unit gains.
    pub fn fit(&self, data: ArrayView2<f64>) -> Result<Array2<f64>, VizError>{
        let n = data.nrows();
        if n < 2{
            return Err(VizError::TooFewSamples {samples: n, required: 2})
        }
        let cfg = &self.config;
        let perplexity = cfg.effective_perplexity(n);
        info!("Running t-SNE on {} samples of {} features, perplexity {}, {} iterations",
            n, data.ncols(), perplexity, cfg.iterations);
        let p = joint_probabilities(data, perplexity);

        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let normal = Normal::new(0.0, 1e-4)
            .map_err(|e| VizError::Moa {source: moa_core::error::MoaError::Custom(format!("{e}"))})?;
        let mut y = Array2::from_shape_fn((n, 2), |_| normal.sample(&mut rng));

        let exploration = cfg.exploration_iterations.min(cfg.iterations);
        self.descend(&p, &mut y, 0..exploration, cfg.early_exaggeration, cfg.initial_momentum);
        self.descend(&p, &mut y, exploration..cfg.iterations, 1.0, cfg.final_momentum);
        Ok(y)
    }

    /// Gradient descent with momentum and adaptive gains over `iterations` of one phase.
    fn descend(&self, p: &Array2<f64>, y: &mut Array2<f64>, iterations: Range<usize>, exaggeration: f64, momentum: f64){
        let cfg = &self.config;
        let n = y.nrows();
        let mut update = Array2::<f64>::zeros((n, 2));
        let mut gains = Array2::<f64>::ones((n, 2));

        for iteration in iterations{
            let mut num = Array2::<f64>::zeros((n, n));
            for i in 0..n{
                for j in (i + 1)..n{
                    let dx = y[[i, 0]] - y[[j, 0]];
                    let dy = y[[i, 1]] - y[[j, 1]];
                    let v = 1.0 / (1.0 + dx * dx + dy * dy);
                    num[[i, j]] = v;
                    num[[j, i]] = v;
                }
            }
            let num_sum = num.sum().max(MACHINE_EPSILON);

            let mut gradient = Array2::<f64>::zeros((n, 2));
            for i in 0..n{
                for j in 0..n{
                    if i == j{
                        continue;
                    }
                    let q = (num[[i, j]] / num_sum).max(MACHINE_EPSILON);
                    let force = (exaggeration * p[[i, j]] - q) * num[[i, j]];
                    gradient[[i, 0]] += 4.0 * force * (y[[i, 0]] - y[[j, 0]]);
                    gradient[[i, 1]] += 4.0 * force * (y[[i, 1]] - y[[j, 1]]);
                }
            }

            for ((g, u), gain) in gradient.iter().zip(update.iter_mut()).zip(gains.iter_mut()){
                *gain = match *u * *g < 0.0{
                    true => *gain + 0.2,
                    false => *gain * 0.8,
                }.max(cfg.min_gain);
                *u = momentum * *u - cfg.learning_rate * *gain * g;
            }
            *y += &update;
            if let Some(mean) = y.mean_axis(Axis(0)){
                *y -= &mean;
            }

            if (iteration + 1) % 50 == 0{
                let q = num.mapv(|v| (v / num_sum).max(MACHINE_EPSILON));
                debug!("t-SNE iteration {}: KL divergence {:.4}", iteration + 1, kl_divergence(p, &q) );
            }
        }
    }
}
