//! JSON envelope codec.
//!
//! Envelope: `{"messageType": "<name>", "payload": <any JSON>}`, one message
//! per encoded string.

use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::message::{Message, MessageType};

/// Codec error.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Message {0} has no payload")]
    MissingPayload(MessageType),
    #[error("Invalid {message_type} payload: {source}")]
    InvalidPayload {
        message_type: MessageType,
        #[source]
        source: serde_json::Error,
    },
}

/// Encode a message envelope.
///
/// # Errors
/// Returns error if the payload cannot be serialized.
pub fn encode(message: &Message) -> Result<String, CodecError> {
    Ok(serde_json::to_string(message)?)
}

/// Decode a message envelope.
///
/// # Errors
/// Returns error if `raw` is not a valid envelope.
pub fn decode(raw: &str) -> Result<Message, CodecError> {
    Ok(serde_json::from_str(raw)?)
}

/// Decode the payload of `message` into `T`.
///
/// # Errors
/// Returns error if the payload is absent or does not match `T`.
pub fn decode_payload<T: DeserializeOwned>(message: &Message) -> Result<T, CodecError> {
    let payload = message
        .payload
        .as_ref()
        .ok_or_else(|| CodecError::MissingPayload(message.message_type.clone()))?;
    T::deserialize(payload).map_err(|source| CodecError::InvalidPayload {
        message_type: message.message_type.clone(),
        source,
    })
}

/// Build a message carrying `payload`.
///
/// # Errors
/// Returns error if the payload cannot be serialized.
pub fn message_with<T: Serialize>(
    message_type: MessageType,
    payload: &T,
) -> Result<Message, CodecError> {
    Ok(Message::new(message_type, serde_json::to_value(payload)?))
}
