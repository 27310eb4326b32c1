use tch::{nn, Kind};
use tch::nn::{Init, Linear, LinearConfig, Path};
use crate::error::TensorError;

/// Gain used for output heads (distribution parameters), so that the initial policy is close to uniform.
pub const HEAD_GAIN: f64 = 0.01;

/// Linear layer with zero bias and "normalized columns" weight initialisation:
/// every output unit's weight vector is drawn from `N(0, 1)` and scaled to norm `gain`.
pub fn normc_linear(path: Path, in_dim: i64, out_dim: i64, gain: f64) -> Result<Linear, TensorError>{
    let config = LinearConfig{
        ws_init: Init::Randn {mean: 0.0, stdev: 1.0},
        bs_init: Some(Init::Const(0.0)),
        bias: true,
    };
    let mut linear = nn::linear(path, in_dim, out_dim, config);
    tch::no_grad(|| -> Result<(), tch::TchError>{
        let norm = linear.ws.f_square()?
            .f_sum_dim_intlist(1i64, true, Kind::Float)?
            .f_sqrt()?;
        let scaled = (&linear.ws * gain).f_div(&norm)?;
        linear.ws.f_copy_(&scaled)
    }).map_err(|e| TensorError::from_tch_with_context(e, format!("Normalizing weights of linear {in_dim} -> {out_dim}")))?;
    Ok(linear)
}

#[cfg(test)]
mod tests{
    use tch::Device;
    use tch::nn::VarStore;
    use tch::{Kind, Tensor};
    use crate::torch_net::normc_linear;

    fn row_norms(weights: &Tensor) -> Tensor{
        weights.square().sum_dim_intlist(1i64, false, Kind::Float).sqrt()
    }

    #[test]
    fn normc_rows_have_gain_norm(){
        let vs = VarStore::new(Device::Cpu);
        let linear = normc_linear(&vs.root() / "l", 5, 7, 0.5).unwrap();
        let norms = Vec::<f32>::try_from(&row_norms(&linear.ws)).unwrap();
        assert_eq!(norms.len(), 7);
        for n in norms{
            assert!((n - 0.5).abs() < 1e-5);
        }
        let bias = linear.bs.as_ref().unwrap();
        assert_eq!(bias.abs().sum(tch::Kind::Float).double_value(&[]), 0.0);
    }
}
