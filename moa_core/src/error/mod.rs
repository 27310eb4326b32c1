mod moa;
mod data;
mod environment;

pub use moa::*;
pub use data::*;
pub use environment::*;
