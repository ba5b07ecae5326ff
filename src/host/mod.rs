//! Host side of the link: command queue, dispatch loop, status delivery.

pub mod diagnostics;
pub mod dispatch;
pub mod queue;
pub mod status;
pub mod thread;

pub use diagnostics::{LinkMetrics, LinkStats};
pub use dispatch::{DispatchLoop, Link};
pub use queue::CommandQueue;
pub use status::{SharedStatus, StatusSink};
