//! visalign-link: command link to the robot controller
//!
//! Provides:
//! - Pluggable transport abstraction (TCP, in-memory)
//! - `RobotLink` with serialized sends and a single reconnect-and-retry
//!   when a write fails

pub mod error;
pub mod transport;
pub mod tcp;
pub mod memory;
pub mod link;

pub use error::LinkError;
pub use transport::{Transport, TransportType};
pub use tcp::TcpTransport;
pub use memory::{MemoryEvent, MemoryLog, MemoryTransport};
pub use link::{LinkState, LinkStats, RobotLink};
