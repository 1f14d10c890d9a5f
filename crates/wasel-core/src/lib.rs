//! Shared wire schema for the Wasel notification channel.
//!
//! Both halves of the channel — the viewer-side client in `wasel-client` and
//! the fan-out server in `wasel-relay` — speak the envelope format defined
//! here. The string values are frozen: the web frontend depends on them.

pub mod envelope;
pub mod errors;
pub mod ids;

pub use envelope::{Envelope, RegisterFrame, Role, Update};
pub use errors::EnvelopeError;
pub use ids::{ConnectionId, OrderId};
