use std::f64::consts::PI;
use serde::{Deserialize, Serialize};
use tch::{Kind, Tensor};
use crate::error::TensorError;

/// How value is taken from distribution.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionMode{
    /// Draw random value.
    Sample,
    /// Take most likely value (arg-max for categorical, mean for Gaussian).
    Greedy,
}

/// Distribution entropy for categorical distribution.
/// Given the probabilities and log probabilities tensors in shape:
/// `BATCH_SIZE x CATEGORY_NUMBER` outputs a [`Tensor`] of size `BATCH_SIZE`.
#[inline]
pub fn categorical_dist_entropy(probabilities: &Tensor, log_probabilities: &Tensor,  kind: Kind) -> Tensor {
    (-log_probabilities * probabilities).sum_dim_intlist(-1i64, false, kind)
}

/// Categorical distribution over last dimension of logits tensor (`B x K`).
#[derive(Debug)]
pub struct CategoricalDist{
    log_probs: Tensor,
}

impl CategoricalDist{
    pub fn from_logits(logits: &Tensor) -> Result<Self, TensorError>{
        let log_probs = logits.f_log_softmax(-1, Kind::Float)
            .map_err(|e| TensorError::from_tch_with_context(e, "Normalizing categorical logits".into()))?;
        Ok(Self{log_probs})
    }

    /// Normalized log probabilities, `B x K`.
    pub fn log_probs(&self) -> &Tensor{
        &self.log_probs
    }

    pub fn probs(&self) -> Tensor{
        self.log_probs.exp()
    }

    /// Samples one category per row, `i64` tensor of shape `B x 1`.
    pub fn sample(&self) -> Result<Tensor, TensorError>{
        self.probs().f_multinomial(1, true)
            .map_err(|e| TensorError::from_tch_with_context(e, "Sampling categorical distribution".into()))
    }

    /// Most likely category per row, `i64` tensor of shape `B x 1`.
    pub fn mode(&self) -> Result<Tensor, TensorError>{
        self.log_probs.f_argmax(-1, true)
            .map_err(|e| TensorError::from_tch_with_context(e, "Arg-max of categorical distribution".into()))
    }

    pub fn select(&self, mode: SelectionMode) -> Result<Tensor, TensorError>{
        match mode{
            SelectionMode::Sample => self.sample(),
            SelectionMode::Greedy => self.mode(),
        }
    }

    /// Log probability of categories (shape `B` or `B x 1`), output `B x 1`.
    pub fn log_prob(&self, value: &Tensor) -> Result<Tensor, TensorError>{
        value.f_to_kind(Kind::Int64)
            .and_then(|v| v.f_view([-1, 1]))
            .and_then(|index| self.log_probs.f_gather(1, &index, false))
            .map_err(|e| TensorError::from_tch_with_context(e, format!("Log probability of categories {:?}", value.size())))
    }

    /// Entropy per row, shape `B`.
    pub fn entropy(&self) -> Tensor{
        categorical_dist_entropy(&self.probs(), &self.log_probs, Kind::Float)
    }
}

/// Gaussian with diagonal covariance, mean `B x N`, log standard deviation broadcastable to it.
#[derive(Debug)]
pub struct DiagGaussianDist{
    mean: Tensor,
    log_std: Tensor,
}

impl DiagGaussianDist{
    pub fn new(mean: Tensor, log_std: &Tensor) -> Result<Self, TensorError>{
        let log_std = log_std.f_expand_as(&mean)
            .map_err(|e| TensorError::from_tch_with_context(e,
                format!("Broadcasting log std {:?} to mean {:?}", log_std.size(), mean.size())))?;
        Ok(Self{mean, log_std})
    }

    pub fn mean(&self) -> &Tensor{
        &self.mean
    }

    pub fn std(&self) -> Tensor{
        self.log_std.exp()
    }

    pub fn sample(&self) -> Result<Tensor, TensorError>{
        let noise = self.mean.f_randn_like()
            .map_err(|e| TensorError::from_tch_with_context(e, "Sampling Gaussian noise".into()))?;
        Ok(&self.mean + noise * self.std())
    }

    pub fn mode(&self) -> Tensor{
        self.mean.shallow_clone()
    }

    pub fn select(&self, mode: SelectionMode) -> Result<Tensor, TensorError>{
        match mode{
            SelectionMode::Sample => self.sample(),
            SelectionMode::Greedy => Ok(self.mode()),
        }
    }

    /// Log density summed over action dimensions, output `B x 1`.
    pub fn log_prob(&self, value: &Tensor) -> Result<Tensor, TensorError>{
        let var = (&self.log_std * 2.0).exp();
        let diff = value.f_sub(&self.mean)
            .map_err(|e| TensorError::from_tch_with_context(e,
                format!("Action {:?} against mean {:?}", value.size(), self.mean.size())))?;
        let per_dim = -(diff.square() / (var * 2.0)) - &self.log_std - 0.5 * (2.0 * PI).ln();
        per_dim.f_sum_dim_intlist(-1i64, true, Kind::Float)
            .map_err(|e| TensorError::from_tch_with_context(e, "Summing Gaussian log density".into()))
    }

    /// Entropy per row, shape `B`.
    pub fn entropy(&self) -> Tensor{
        (&self.log_std + 0.5 + 0.5 * (2.0 * PI).ln()).sum_dim_intlist(-1i64, false, Kind::Float)
    }
}

/// Distribution of final action, categorical for discrete spaces, diagonal Gaussian for continuous.
#[derive(Debug)]
pub enum ActionDistribution{
    Categorical(CategoricalDist),
    DiagGaussian(DiagGaussianDist),
}

impl ActionDistribution{
    pub fn select(&self, mode: SelectionMode) -> Result<Tensor, TensorError>{
        match self{
            ActionDistribution::Categorical(d) => d.select(mode),
            ActionDistribution::DiagGaussian(d) => d.select(mode),
        }
    }

    pub fn log_prob(&self, action: &Tensor) -> Result<Tensor, TensorError>{
        match self{
            ActionDistribution::Categorical(d) => d.log_prob(action),
            ActionDistribution::DiagGaussian(d) => d.log_prob(action),
        }
    }

    pub fn entropy(&self) -> Tensor{
        match self{
            ActionDistribution::Categorical(d) => d.entropy(),
            ActionDistribution::DiagGaussian(d) => d.entropy(),
        }
    }

    /// Tensor parameterising distribution: probabilities or means.
    pub fn parameters(&self) -> Tensor{
        match self{
            ActionDistribution::Categorical(d) => d.probs(),
            ActionDistribution::DiagGaussian(d) => d.mean().shallow_clone(),
        }
    }
}

#[cfg(test)]
mod tests{
    use std::f64::consts::PI;
    use tch::{Kind, Tensor};
    use crate::distribution::{CategoricalDist, DiagGaussianDist, SelectionMode};

    #[test]
    fn categorical_probabilities_and_entropy(){
        let logits = Tensor::from_slice(&[0.0f32, 0.0, 0.0, 0.0, 10.0, 0.0]).view([2, 3]);
        let dist = CategoricalDist::from_logits(&logits).unwrap();
        let sums = Vec::<f32>::try_from(&dist.probs().sum_dim_intlist(-1i64, false, Kind::Float)).unwrap();
        for s in sums{
            assert!((s - 1.0).abs() < 1e-5);
        }
        let entropy = Vec::<f32>::try_from(&dist.entropy()).unwrap();
        assert!((entropy[0] as f64 - 3f64.ln()).abs() < 1e-5);
        assert!(entropy[1] < 0.01);
        let mode = Vec::<i64>::try_from(&dist.mode().unwrap().view([-1])).unwrap();
        assert_eq!(mode[1], 1);
    }

    #[test]
    fn categorical_log_prob_matches_log_softmax(){
        let logits = Tensor::from_slice(&[1.0f32, 2.0, 3.0]).view([1, 3]);
        let dist = CategoricalDist::from_logits(&logits).unwrap();
        let lp = dist.log_prob(&Tensor::from_slice(&[2i64])).unwrap();
        assert_eq!(lp.size(), vec![1, 1]);
        let expected = 3.0 - (1f64.exp() + 2f64.exp() + 3f64.exp()).ln();
        assert!((lp.double_value(&[0, 0]) - expected).abs() < 1e-5);
    }

    #[test]
    fn gaussian_log_prob_of_mean(){
        let mean = Tensor::from_slice(&[0.5f32, -1.0]).view([1, 2]);
        let log_std = Tensor::from_slice(&[0.0f32, 0.0]);
        let dist = DiagGaussianDist::new(mean, &log_std).unwrap();
        let action = dist.select(SelectionMode::Greedy).unwrap();
        let lp = dist.log_prob(&action).unwrap().double_value(&[0, 0]);
        assert!((lp - (-(2.0 * PI).ln())).abs() < 1e-5);
        let entropy = dist.entropy().double_value(&[0]);
        assert!((entropy - (1.0 + (2.0 * PI).ln())).abs() < 1e-5);
        let sampled = dist.sample().unwrap();
        assert_eq!(sampled.size(), vec![1, 2]);
    }
}
