use tch::Tensor;
use crate::error::TensorError;


/// Marker trait describing output format for neural network.
pub trait NetOutput{}

/// Output of mixture-of-actors trunk for batch of `B` observations.
pub struct TensorMixtureOfActors{
    /// Value estimate, shape `B x 1`.
    pub critic: Tensor,
    /// Logits of distribution over actors, shape `B x K`.
    pub decider: Tensor,
    /// Hidden representation computed by every actor, shape `B x K x H`.
    pub actors: Tensor,
}

impl NetOutput for Tensor{}
impl NetOutput for TensorMixtureOfActors{}

impl TensorMixtureOfActors{

    pub fn number_of_actors(&self) -> i64{
        self.decider.size().last().copied().unwrap_or(0)
    }

    /// Picks for every row of batch hidden representation of the actor indexed by `choice`
    /// (`i64` tensor of shape `B` or `B x 1`). Output has shape `B x H`.
    pub fn select_actor(&self, choice: &Tensor) -> Result<Tensor, TensorError>{
        let size = self.actors.size();
        let hidden = match size.as_slice(){
            [_, _, h] => *h,
            _ => return Err(TensorError::Shape {
                shape: size.clone(),
                expected: vec![-1, self.number_of_actors(), -1],
                context: "Actor hidden tensor".into(),
            })
        };
        let index = choice.f_view([-1, 1, 1])
            .and_then(|t| t.f_expand([-1, 1, hidden], false))
            .map_err(|e| TensorError::from_tch_with_context(e, format!("Expanding choice tensor of shape {:?}", choice.size())))?;
        self.actors.f_gather(1, &index, false)
            .and_then(|t| t.f_squeeze_dim(1))
            .map_err(|e| TensorError::from_tch_with_context(e, "Gathering hidden of chosen actors".into()))
    }
}

/// Converts tensor of shape `(1,)` and type i64 to i64. Technically it will work
/// with shape `(n,)`, but it will take the very first element.
///
/// Used when converting sampled choice of actor (or discrete action) to plain index.
/// # Example:
/// ```
/// use tch::Tensor;
/// use moa_rl::torch_net::index_tensor_to_i64;
/// let t = Tensor::from_slice(&[0.3f64, 0.5, 0.1, 0.1]);
/// let index_tensor = t.multinomial(1, true);
/// assert_eq!(index_tensor.size(), vec![1]);
/// let index = index_tensor_to_i64(&index_tensor, "context message if error").unwrap();
/// assert!(index >=0 && index <= 3);
/// ```
#[inline]
pub fn index_tensor_to_i64(tensor: &Tensor, additional_context: &str) -> Result<i64, TensorError>{
    tensor.f_view([-1])
        .and_then(|t| t.f_int64_value(&[0]))
        .map_err(|e|{
            TensorError::from_tch_with_context(e, format!("From tensor {} in context \"{}\"", tensor, additional_context))
        })
}

#[cfg(test)]
mod tests{
    use tch::{Kind, Tensor};
    use crate::torch_net::TensorMixtureOfActors;

    #[test]
    fn select_actor_gathers_rows(){
        // 2 observations, 3 actors, hidden of 2
        let actors = Tensor::arange(12i64, (Kind::Float, tch::Device::Cpu)).view([2, 3, 2]);
        let out = TensorMixtureOfActors{
            critic: Tensor::zeros([2, 1], (Kind::Float, tch::Device::Cpu)),
            decider: Tensor::zeros([2, 3], (Kind::Float, tch::Device::Cpu)),
            actors,
        };
        let choice = Tensor::from_slice(&[2i64, 0]);
        let selected = out.select_actor(&choice).unwrap();
        assert_eq!(selected.size(), vec![2, 2]);
        let values = Vec::<f32>::try_from(&selected.view([-1])).unwrap();
        assert_eq!(values, vec![4.0, 5.0, 6.0, 7.0]);
        assert_eq!(out.number_of_actors(), 3);
    }
}
