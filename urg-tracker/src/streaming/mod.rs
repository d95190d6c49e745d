//! Event streaming to external consumers
//!
//! Each lifecycle event becomes one UDP datagram holding a JSON object:
//!
//! ```text
//! {"sensor":"wall","event":"pressed","object":{"id":3,"position":{"x":12.0,"y":980.5},...}}
//! ```

mod udp_publisher;

pub use udp_publisher::{EventMessage, UdpEventPublisher};
