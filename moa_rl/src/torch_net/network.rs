use std::path::Path as FsPath;
use tch::{Device, TchError, Tensor};
use tch::nn::{Optimizer, OptimizerConfig, Path, VarStore};
use crate::torch_net::{NetOutput, TensorMixtureOfActors};

/// Structure wrapping [`VarStore`] and network closure used to build neural network based function.
/// Examples in [`tch`](https://github.com/LaurentMazare/tch-rs) show how neural networks are used.
/// This structure shortens some steps of setting and provides some helpful functions - especially
/// [`build_optimizer`](NeuralNet::build_optimizer).
pub struct NeuralNet<Output: NetOutput>{
    net: Box<dyn Fn(&Tensor) -> Output + Send>,
    var_store: VarStore,
}

/// [`NeuralNet`] producing critic, decider logits and hidden outputs of every actor.
pub type MixtureNet = NeuralNet<TensorMixtureOfActors>;

/// To construct network you need `VarStore` and function (closure) taking `nn::Path` as argument
/// and constructing function (closure) which applies network model to `Tensor` producing `NetOutput`.
/// # Example:
/// ```
/// use tch::{Device, Kind, nn, Tensor};
/// use tch::nn::VarStore;
/// use moa_rl::torch_net::NeuralNet;
/// let var_store = VarStore::new(Device::Cpu);
/// let neural_net = NeuralNet::new(var_store, |path|{
///     let seq = nn::seq()
///         .add(nn::linear(path / "input", 32, 4, Default::default()));
///     move |tensor: &Tensor|{tensor.apply(&seq)}
/// });
/// let input_tensor = Tensor::zeros([32], (Kind::Float, Device::Cpu));
/// let output_tensor = (neural_net.net())(&input_tensor);
/// assert_eq!(output_tensor.size(), vec![4]);
/// ```
impl<Output: NetOutput> NeuralNet<Output>{

    pub fn new<
        N: 'static + Send + Fn(&Tensor) -> Output,
        F: FnOnce(&Path) -> N>
    (var_store: VarStore, model_closure: F) -> Self{

        let device = var_store.root().device();
        let model = (model_closure)(&var_store.root());
        Self{
            var_store,
            net: Box::new(move |x| {(model)(&x.to_device(device))}),
        }
    }
    /// Like [`new`](NeuralNet::new), but building closure may fail (e.g. when layer initialisation
    /// involves tensor operations).
    pub fn try_new<
        N: 'static + Send + Fn(&Tensor) -> Output,
        E,
        F: FnOnce(&Path) -> Result<N, E>>
    (var_store: VarStore, model_closure: F) -> Result<Self, E>{

        let device = var_store.root().device();
        let model = (model_closure)(&var_store.root())?;
        Ok(Self{
            var_store,
            net: Box::new(move |x| {(model)(&x.to_device(device))}),
        })
    }

    /// Build optimiser for network, given `OptimizerConfig`. Uses [`VarStore`] stored in [`NeuralNet`] struct;
    pub fn build_optimizer<OptC: OptimizerConfig>
        (&self, optimiser_config: OptC, learning_rate: f64) -> Result<Optimizer, TchError>{

        optimiser_config.build(&self.var_store, learning_rate)
    }

    /// Returns reference to internal network offering `Tensor -> Output` application.
    pub fn net(&self) -> &(dyn Fn(&Tensor) -> Output + Send){&self.net}

    pub fn device(&self) -> Device{
        self.var_store.device()
    }
    pub fn var_store(&self) -> &VarStore{
        &self.var_store
    }

    /// Saves every variable of store (trainable or not).
    pub fn save(&self, path: &FsPath) -> Result<(), TchError>{
        self.var_store.save(path)
    }

    /// Loads variables into already constructed network. Names and shapes must match.
    pub fn load(&mut self, path: &FsPath) -> Result<(), TchError>{
        self.var_store.load(path)
    }
}
