use thiserror::Error;

/// Errors raised while parsing or building wire envelopes.
///
/// A malformed envelope is never fatal to a connection — callers log the
/// error, drop the frame, and keep reading.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The frame was not well-formed JSON, or a payload had the wrong shape.
    #[error("malformed envelope: {0}")]
    Json(#[from] serde_json::Error),

    /// A recognized type arrived without its required `data` payload.
    #[error("envelope type {tag:?} is missing its data payload")]
    MissingData {
        /// The `type` tag of the offending envelope.
        tag: String,
    },
}
