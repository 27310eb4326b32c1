//! Running mean and variance of observations, normalizing them before they reach the network.
//!
//! Statistics are kept as non-trainable variables in the policy's [`VarStore`](tch::nn::VarStore),
//! so they are saved and loaded together with network weights.

use tch::{Kind, Tensor};
use tch::nn::Path;
use crate::error::TensorError;

/// Default clipping range for normalized values.
pub const DEFAULT_CLIP: f64 = 10.0;
/// Added to variance before taking square root.
pub const DEFAULT_EPSILON: f64 = 1e-8;
/// Initial sample count, keeps first update from dividing by zero.
const INITIAL_COUNT: f64 = 1e-4;

#[derive(Debug)]
pub struct ObservationNormalizer{
    mean: Tensor,
    var: Tensor,
    count: Tensor,
    clip: f64,
    epsilon: f64,
}

impl ObservationNormalizer{
    /// Registers `mean`, `var` and `count` under `path` (e.g. `root / "ob_rms"`).
    pub fn new(path: &Path, size: i64) -> Result<Self, TensorError>{
        let mean = path.zeros_no_train("mean", &[size]);
        let var = path.ones_no_train("var", &[size]);
        let mut count = path.zeros_no_train("count", &[1]);
        tch::no_grad(|| count.f_fill_(INITIAL_COUNT))
            .map_err(|e| TensorError::from_tch_with_context(e, "Initialising normalizer count".into()))?;
        Ok(Self{
            mean,
            var,
            count,
            clip: DEFAULT_CLIP,
            epsilon: DEFAULT_EPSILON,
        })
    }

    pub fn size(&self) -> i64{
        self.mean.size().first().copied().unwrap_or(0)
    }

    pub fn count(&self) -> f64{
        self.count.double_value(&[0])
    }

    pub fn mean(&self) -> &Tensor{
        &self.mean
    }

    pub fn var(&self) -> &Tensor{
        &self.var
    }

    /// `clip((obs - mean) / sqrt(var + epsilon), -clip, clip)`, works on single observation or batch.
    pub fn normalize(&self, observation: &Tensor) -> Result<Tensor, TensorError>{
        let std = (&self.var + self.epsilon).sqrt();
        observation.f_to_kind(Kind::Float)
            .and_then(|o| o.f_sub(&self.mean))
            .and_then(|centered| centered.f_div(&std))
            .and_then(|scaled| scaled.f_clamp(-self.clip, self.clip))
            .map_err(|e| TensorError::from_tch_with_context(e,
                format!("Normalizing observation of shape {:?} with statistics of size {}", observation.size(), self.size())))
    }

    pub fn normalize_slice(&self, observation: &[f32]) -> Result<Vec<f32>, TensorError>{
        let t = Tensor::from_slice(observation).to_device(self.mean.device());
        let normalized = self.normalize(&t)?;
        Vec::<f32>::try_from(&normalized.to_device(tch::Device::Cpu))
            .map_err(|e| TensorError::from_tch_with_context(e, "Converting normalized observation to vector".into()))
    }

    /// Merges moments of batch (`B x size`) into running statistics (parallel variance algorithm).
    pub fn update(&mut self, batch: &Tensor) -> Result<(), TensorError>{
        let batch = match batch.dim(){
            1 => batch.unsqueeze(0),
            _ => batch.shallow_clone(),
        }.to_kind(Kind::Float).to_device(self.mean.device());
        let batch_count = batch.size()[0] as f64;
        if batch_count == 0.0{
            return Ok(())
        }
        tch::no_grad(|| -> Result<(), tch::TchError>{
            let batch_mean = batch.f_mean_dim(0i64, false, Kind::Float)?;
            let batch_var = batch.f_var_dim(0i64, false, false)?;
            let count = self.count.double_value(&[0]);
            let total = count + batch_count;

            let delta = batch_mean.f_sub(&self.mean)?;
            let new_mean = &self.mean + &delta * (batch_count / total);
            let m2 = &self.var * count + batch_var * batch_count + delta.square() * (count * batch_count / total);
            let new_var = m2 / total;

            self.mean.f_copy_(&new_mean)?;
            self.var.f_copy_(&new_var)?;
            let _ = self.count.f_fill_(total)?;
            Ok(())
        }).map_err(|e| TensorError::from_tch_with_context(e, "Updating running observation statistics".into()))?;

        #[cfg(feature = "log_trace")]
        log::trace!("Observation statistics after update: count = {}, mean = {}", self.count(), self.mean);
        Ok(())
    }

    pub fn update_slice(&mut self, observation: &[f32]) -> Result<(), TensorError>{
        self.update(&Tensor::from_slice(observation))
    }
}
