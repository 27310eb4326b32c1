//! # moa rl
//! Mixture-of-actors actor-critic policy built on [`tch`].
//! A decider network picks one of several actor networks for every observation,
//! action distribution is parameterised by the chosen actor only.
//! Crate also provides observation normalization, policy artifacts and PPO training.



/// Neural network wrapper and layer helpers built on [`tch`] crate
pub mod torch_net;
/// Error types defined in this crate
pub mod error;
/// Categorical and diagonal Gaussian distributions over tensors
pub mod distribution;
/// Running observation statistics stored alongside network weights
pub mod normalization;
/// Mixture-of-actors policy
pub mod policy;
/// Saving and loading trained policies
pub mod artifact;
/// PPO training of mixture-of-actors policy
pub mod train;

/// Reexports compatible [`tch`]
pub use tch;
