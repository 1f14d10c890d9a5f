//! Server half of the Wasel notification channel.
//!
//! An Axum HTTP + WebSocket relay: viewer contexts connect to `/ws`, send
//! their one-time registration, and the relay fans order-status and
//! UI-setting updates out to the connections they apply to. Updates enter
//! through an [`UpdatePublisher`] — either in-process or via the HTTP
//! publish endpoints the ordering API calls.

pub mod connection;
pub mod publisher;
pub mod registry;
pub mod server;
pub mod ws;

pub use connection::{Registration, RelayConnection};
pub use publisher::{StatusUpdate, UpdatePublisher};
pub use registry::ConnectionRegistry;
pub use server::{start, ServerConfig, ServerHandle};
