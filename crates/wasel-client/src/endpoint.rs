//! Channel endpoint derivation.
//!
//! The channel always targets the host that served the page, with the socket
//! scheme matched to the page scheme (`http` → `ws`, `https` → `wss`) and no
//! path segment.

use thiserror::Error;

/// A page origin scheme the channel cannot be derived from.
#[derive(Debug, Error)]
#[error("cannot derive a channel endpoint from page scheme {scheme:?}")]
pub struct InvalidOrigin {
    /// The scheme that was rejected.
    pub scheme: String,
}

/// Where the channel connects: host plus secure/insecure transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    secure: bool,
}

impl Endpoint {
    /// Derive the endpoint from the serving page's origin.
    ///
    /// `host` may include a port (`"example.com:8443"`), exactly as the page
    /// reports it.
    pub fn from_page_origin(scheme: &str, host: impl Into<String>) -> Result<Self, InvalidOrigin> {
        let secure = match scheme {
            "http" => false,
            "https" => true,
            other => {
                return Err(InvalidOrigin {
                    scheme: other.to_owned(),
                })
            }
        };
        Ok(Self {
            host: host.into(),
            secure,
        })
    }

    /// Plain `ws://` endpoint for a known host, used for local relays.
    pub fn insecure(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            secure: false,
        }
    }

    /// The URL handed to the transport.
    pub fn url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{scheme}://{}", self.host)
    }
}
