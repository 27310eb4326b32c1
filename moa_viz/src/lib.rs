//! # moa viz
//! Visualization of which actor of a mixture-of-actors policy acts where.
//! Policy is rolled out in environment, stacked observations are recorded with chosen actor,
//! embedded in 2D with t-SNE and drawn as scatter plot coloured by actor.

/// Errors of this crate
pub mod error;
/// Drawing environment state to image files
pub mod capture;
/// Bundled environments: cart-pole and pendulum
pub mod envs;
/// Rolling policy out and recording observations with actor choices
pub mod collect;
/// Exact t-SNE on [`ndarray`]
pub mod tsne;
/// Embedding of recorded rollout and its csv table
pub mod embedding;
pub mod plots;
/// Command line options
pub mod options;
pub mod pipeline;
