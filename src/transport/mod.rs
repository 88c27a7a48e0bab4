//! Transport module - pluggable peer links.
//!
//! Two transports are provided:
//! - [`socket`]: TCP streams for cross-host peers (full protocol variant)
//! - [`loopback`]: an in-process duplex pipe (lean protocol variant)

mod loopback;
mod socket;

pub use loopback::{loopback_pair, loopback_pair_with_capacity, DEFAULT_LOOPBACK_CAPACITY};
pub use socket::{connect, SocketListener};
