pub mod icmp;
pub mod resolve;
pub mod socket;

pub use icmp::*;
pub use resolve::*;
pub use socket::*;
