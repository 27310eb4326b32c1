mod config;
mod mixture;

pub use config::*;
pub use mixture::*;
