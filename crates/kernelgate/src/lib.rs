//! Authenticated messaging with remote Jupyter kernels.
//!
//! kernelgate decodes, verifies and dispatches kernel wire-protocol messages
//! and builds signed outgoing ones.
//!
//! # Crate Structure
//!
//! - [`wire`]: Frame codec, header model and HMAC-SHA256 signing
//! - [`session`]: Per-kernel sessions, identity bootstrap, routing and dispatch tables
//!
//! The `async` feature adds tokio delivery loops to [`session`].

/// Re-export wire types.
pub mod wire {
    pub use kernelgate_wire::*;
}

/// Re-export session types.
pub mod session {
    pub use kernelgate_session::*;
}
