//! The tagged envelope exchanged over the notification channel.
//!
//! Three `type` values are recognized: `register` (client→server, sent once
//! right after the socket opens), `order_status_updated` and
//! `ui_setting_updated` (server→client). Anything else is carried but
//! ignored — unknown tags are a forward-compatibility escape hatch, not an
//! error.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::EnvelopeError;
use crate::ids::OrderId;

/// `type` tag of the one-time registration frame.
pub const REGISTER: &str = "register";
/// `type` tag of an order-status push.
pub const ORDER_STATUS_UPDATED: &str = "order_status_updated";
/// `type` tag of the global UI-settings push.
pub const UI_SETTING_UPDATED: &str = "ui_setting_updated";

/// Which kind of viewer context opened the connection.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Admin,
    Driver,
}

/// A wire envelope: a `type` tag plus a tag-specific payload.
///
/// `data` is opaque at this level; [`Envelope::classify`] inspects it only
/// for tags that require one.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    /// Closed tag identifying the message kind.
    #[serde(rename = "type")]
    pub tag: String,
    /// Tag-specific payload, absent for payloadless tags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Order-status payload: `{"orderId": ..., "message": ...}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderStatusData {
    order_id: OrderId,
    message: String,
}

/// A recognized server→client push, extracted from an [`Envelope`].
#[derive(Clone, Debug, PartialEq)]
pub enum Update {
    /// UI configuration changed; every viewer should re-fetch it.
    UiSettingUpdated,
    /// An order moved to a new status.
    OrderStatusUpdated {
        /// The order the update is about.
        order_id: OrderId,
        /// Human-readable status line, shown verbatim in the alert.
        message: String,
    },
    /// A tag this build does not know. Never an error, never an effect.
    Unknown(String),
}

impl Envelope {
    /// Parse a text frame into an envelope.
    pub fn parse(text: &str) -> Result<Self, EnvelopeError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Classify this envelope into a typed [`Update`].
    ///
    /// A recognized tag with a missing or ill-shaped payload is malformed
    /// (an error); an unrecognized tag is `Update::Unknown`.
    pub fn classify(&self) -> Result<Update, EnvelopeError> {
        match self.tag.as_str() {
            UI_SETTING_UPDATED => Ok(Update::UiSettingUpdated),
            ORDER_STATUS_UPDATED => {
                let data = self.data.as_ref().ok_or_else(|| EnvelopeError::MissingData {
                    tag: self.tag.clone(),
                })?;
                let payload: OrderStatusData = serde_json::from_value(data.clone())?;
                Ok(Update::OrderStatusUpdated {
                    order_id: payload.order_id,
                    message: payload.message,
                })
            }
            other => Ok(Update::Unknown(other.to_owned())),
        }
    }

    /// Build an `order_status_updated` envelope.
    pub fn order_status(order_id: &OrderId, message: &str) -> Self {
        Self {
            tag: ORDER_STATUS_UPDATED.to_owned(),
            data: Some(serde_json::json!({
                "orderId": order_id,
                "message": message,
            })),
        }
    }

    /// Build a `ui_setting_updated` envelope.
    pub fn ui_setting() -> Self {
        Self {
            tag: UI_SETTING_UPDATED.to_owned(),
            data: None,
        }
    }

    /// Serialize to the text frame sent over the socket.
    pub fn to_json(&self) -> Result<String, EnvelopeError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// The one-time registration frame a connection sends after opening.
///
/// Unlike the push envelopes, its fields sit at the top level of the frame:
/// `{"type":"register","userType":"customer","userId":"guest","orderId":"12345"}`.
/// Fire-and-forget — the server never acknowledges it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterFrame {
    /// Always [`REGISTER`].
    #[serde(rename = "type")]
    pub tag: String,
    /// Role of the viewer context that owns the connection.
    pub user_type: Role,
    /// Identifier of the viewing user (`"guest"` for anonymous sessions).
    pub user_id: String,
    /// The order this connection is watching, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
}

impl RegisterFrame {
    /// Build a registration frame for the given identity.
    pub fn new(role: Role, user_id: impl Into<String>, subject: Option<OrderId>) -> Self {
        Self {
            tag: REGISTER.to_owned(),
            user_type: role,
            user_id: user_id.into(),
            order_id: subject,
        }
    }

    /// Parse a text frame as a registration.
    pub fn parse(text: &str) -> Result<Self, EnvelopeError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Serialize to the text frame sent over the socket.
    pub fn to_json(&self) -> Result<String, EnvelopeError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Role ─────────────────────────────────────────────────────────

    #[test]
    fn role_wire_strings() {
        assert_eq!(serde_json::to_string(&Role::Customer).unwrap(), "\"customer\"");
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        assert_eq!(serde_json::to_string(&Role::Driver).unwrap(), "\"driver\"");
    }

    #[test]
    fn role_rejects_unknown() {
        assert!(serde_json::from_str::<Role>("\"manager\"").is_err());
    }

    // ── Envelope parse / classify ────────────────────────────────────

    #[test]
    fn ui_setting_classifies_without_data() {
        let env = Envelope::parse(r#"{"type":"ui_setting_updated"}"#).unwrap();
        assert_eq!(env.classify().unwrap(), Update::UiSettingUpdated);
    }

    #[test]
    fn order_status_classifies_with_payload() {
        let text = r#"{"type":"order_status_updated","data":{"orderId":"12345","message":"في الطريق"}}"#;
        let env = Envelope::parse(text).unwrap();
        let update = env.classify().unwrap();
        assert_eq!(
            update,
            Update::OrderStatusUpdated {
                order_id: OrderId::new("12345"),
                message: "في الطريق".into(),
            }
        );
    }

    #[test]
    fn unknown_tag_is_not_an_error() {
        let env = Envelope::parse(r#"{"type":"driver_location","data":{"lat":15.3}}"#).unwrap();
        assert_eq!(env.classify().unwrap(), Update::Unknown("driver_location".into()));
    }

    #[test]
    fn order_status_without_data_is_malformed() {
        let env = Envelope::parse(r#"{"type":"order_status_updated"}"#).unwrap();
        let err = env.classify().unwrap_err();
        assert!(matches!(err, EnvelopeError::MissingData { ref tag } if tag == "order_status_updated"));
    }

    #[test]
    fn order_status_with_wrong_shape_is_malformed() {
        let env =
            Envelope::parse(r#"{"type":"order_status_updated","data":{"orderId":"1"}}"#).unwrap();
        assert!(env.classify().is_err());
    }

    #[test]
    fn not_json_is_malformed() {
        assert!(Envelope::parse("not json at all").is_err());
    }

    #[test]
    fn missing_type_is_malformed() {
        assert!(Envelope::parse(r#"{"data":{}}"#).is_err());
    }

    #[test]
    fn non_object_is_malformed() {
        assert!(Envelope::parse("[1,2,3]").is_err());
    }

    // ── Envelope construction ────────────────────────────────────────

    #[test]
    fn order_status_roundtrip() {
        let env = Envelope::order_status(&OrderId::new("ord_9"), "تم تأكيد الطلب");
        let json = env.to_json().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["type"], "order_status_updated");
        assert_eq!(parsed["data"]["orderId"], "ord_9");
        assert_eq!(parsed["data"]["message"], "تم تأكيد الطلب");
    }

    #[test]
    fn ui_setting_omits_data() {
        let json = Envelope::ui_setting().to_json().unwrap();
        assert_eq!(json, r#"{"type":"ui_setting_updated"}"#);
    }

    // ── RegisterFrame ────────────────────────────────────────────────

    #[test]
    fn register_frame_wire_format() {
        let frame = RegisterFrame::new(Role::Customer, "guest", Some(OrderId::new("12345")));
        let json = frame.to_json().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["type"], "register");
        assert_eq!(parsed["userType"], "customer");
        assert_eq!(parsed["userId"], "guest");
        assert_eq!(parsed["orderId"], "12345");
    }

    #[test]
    fn register_frame_omits_absent_order() {
        let frame = RegisterFrame::new(Role::Admin, "admin_1", None);
        let json = frame.to_json().unwrap();
        assert!(!json.contains("orderId"), "got: {json}");
    }

    #[test]
    fn register_frame_parse_roundtrip() {
        let frame = RegisterFrame::new(Role::Driver, "drv_7", Some(OrderId::new("88")));
        let back = RegisterFrame::parse(&frame.to_json().unwrap()).unwrap();
        assert_eq!(back, frame);
    }

    #[test]
    fn register_frame_requires_identity_fields() {
        assert!(RegisterFrame::parse(r#"{"type":"register"}"#).is_err());
        assert!(RegisterFrame::parse(r#"{"type":"register","userType":"customer"}"#).is_err());
    }
}
