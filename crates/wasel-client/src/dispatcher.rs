//! Envelope dispatch — decides and applies exactly one effect per envelope.
//!
//! The dispatcher holds the viewer's subject (the order it is watching, if
//! any) plus two injected capabilities, so it has no platform dependency and
//! is unit-testable with fakes. It never reloads anything itself: "refresh"
//! is whatever the owning context wired in, assumed idempotent.

use std::sync::Arc;

use tracing::{debug, warn};
use wasel_core::envelope::Update;
use wasel_core::{Envelope, EnvelopeError, OrderId};

/// Title used for every order-status alert.
pub const ORDER_ALERT_TITLE: &str = "تحديث الطلب";

/// Re-fetches the data behind the current view. Idempotent.
pub trait Refresh: Send + Sync {
    fn refresh(&self);
}

/// Permission-gated user-visible alert capability.
///
/// The dispatcher checks [`is_granted`](Notifier::is_granted) before every
/// alert and never requests permission itself — permission flow belongs to
/// the collaborator that supplies this.
pub trait Notifier: Send + Sync {
    fn is_granted(&self) -> bool;
    fn notify(&self, title: &str, body: &str);
}

/// The effect an envelope calls for, before capabilities are applied.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// Re-fetch state, no alert.
    Refresh,
    /// Re-fetch state and alert the user with this message body.
    RefreshAndAlert(String),
    /// Not applicable to this viewer, or an unknown tag.
    Nothing,
}

/// Interprets incoming envelopes for one viewer context.
pub struct UpdateDispatcher {
    subject: Option<OrderId>,
    refresh: Arc<dyn Refresh>,
    notifier: Arc<dyn Notifier>,
}

impl UpdateDispatcher {
    /// Build a dispatcher for a viewer watching `subject` (or everything, if
    /// `None`).
    pub fn new(
        subject: Option<OrderId>,
        refresh: Arc<dyn Refresh>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            subject,
            refresh,
            notifier,
        }
    }

    /// The order this viewer is watching, if any.
    pub fn subject(&self) -> Option<&OrderId> {
        self.subject.as_ref()
    }

    /// Decide the effect for a raw text frame without applying it.
    ///
    /// First match wins: a UI-setting update always refreshes; an
    /// order-status update applies only if the viewer watches that order or
    /// watches nothing in particular; everything else is a no-op.
    pub fn evaluate(&self, text: &str) -> Result<Outcome, EnvelopeError> {
        match Envelope::parse(text)?.classify()? {
            Update::UiSettingUpdated => Ok(Outcome::Refresh),
            Update::OrderStatusUpdated { order_id, message } => {
                let applies = match &self.subject {
                    Some(watched) => *watched == order_id,
                    None => true,
                };
                if applies {
                    Ok(Outcome::RefreshAndAlert(message))
                } else {
                    debug!(%order_id, "order update for a different order, ignoring");
                    Ok(Outcome::Nothing)
                }
            }
            Update::Unknown(tag) => {
                debug!(tag, "unrecognized envelope type, ignoring");
                Ok(Outcome::Nothing)
            }
        }
    }

    /// Apply the effect for a raw text frame.
    ///
    /// Malformed frames are logged and dropped; they never tear down the
    /// connection. The alert fires only if permission was granted earlier.
    pub fn dispatch(&self, text: &str) {
        match self.evaluate(text) {
            Ok(Outcome::Refresh) => self.refresh.refresh(),
            Ok(Outcome::RefreshAndAlert(body)) => {
                self.refresh.refresh();
                if self.notifier.is_granted() {
                    self.notifier.notify(ORDER_ALERT_TITLE, &body);
                } else {
                    debug!("alert permission not granted, skipping notification");
                }
            }
            Ok(Outcome::Nothing) => {}
            Err(e) => warn!(error = %e, "dropping malformed envelope"),
        }
    }
}
