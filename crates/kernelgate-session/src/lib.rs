//! Per-kernel sessions for the kernel messaging gateway.
//!
//! A [`KernelSession`] holds one kernel's signing key, session id, routing
//! identity and dispatch tables. A [`ChannelRouter`] takes raw frames from the
//! transport, authenticates them, bootstraps the identity and hands each
//! message to the table for its channel. Rejected messages are logged and
//! dropped; they never surface as errors to the transport.
//!
//! Enable the `async` feature for tokio-based per-channel delivery loops.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod registry;
pub mod router;
pub mod session;

#[cfg(feature = "async")]
pub mod pump;

pub use config::{ConnectionInfo, SessionConfig};
pub use dispatch::{ChannelTables, DispatchOutcome, DispatchTable, MessageHandler};
pub use error::{ConfigError, Result, RouteError, SessionError};
pub use registry::SessionRegistry;
pub use router::{ChannelRouter, RouteOutcome, RouterStats};
pub use session::{Bootstrap, KernelSession};

#[cfg(feature = "async")]
pub use pump::{pump_channel, spawn_session_pumps, PumpExit, PumpReport, SessionPumps};
