//! # moa core
//! Data model shared by the mixture-of-actors crates: environment contract, frame stacking
//! and the tables produced by rollout collection and embedding.
//! Neural network parts live in `moa_rl`, this crate does not depend on `tch`.


/// Error types defined in this crate
pub mod error;
/// Environment contract (reset/step) and action space description
pub mod env;
/// Buffer stacking last few observation frames into one vector
pub mod frame_stack;
/// Rollout and embedding tables together with their text formats
pub mod table;
