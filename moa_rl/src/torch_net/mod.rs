mod network;
mod net_output;
mod init;

pub use network::*;
pub use net_output::*;
pub use init::*;
