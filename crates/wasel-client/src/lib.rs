//! Viewer-side half of the Wasel notification channel.
//!
//! A viewer context (customer, admin or driver screen) calls
//! [`channel::open`] on mount and [`channel::Connection::close`] on teardown.
//! Incoming envelopes are interpreted by the [`dispatcher::UpdateDispatcher`]
//! into at most one effect each: a data refresh, a refresh plus a
//! permission-gated alert, or nothing. There is no automatic reconnect — a
//! closed connection stays closed until the owning context remounts.

pub mod channel;
pub mod dispatcher;
pub mod endpoint;
pub mod state;

pub use channel::{open, open_with_capabilities, ChannelConfig, Connection};
pub use dispatcher::{Notifier, Refresh, UpdateDispatcher, ORDER_ALERT_TITLE};
pub use endpoint::Endpoint;
pub use state::ConnectionState;
