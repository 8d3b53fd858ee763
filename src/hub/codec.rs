//! Event wire format
//!
//! Field values and whole events are bincode-encoded (fixed-width little-endian
//! integers, u64 length prefixes). A batch message is the u64 event count
//! followed by the already-encoded events, which is exactly how bincode lays
//! out a `Vec<Event>`. Events are therefore encoded once, on emit, and never
//! re-serialized when batches are assembled.

use std::collections::HashMap;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use super::types::{EncodedEventBatch, Event};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("encode failed: {0}")]
    Encode(String),

    #[error("decode failed: {0}")]
    Decode(String),

    #[error("missing field: {0}")]
    MissingField(String),
}

pub fn encode_value<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
    bincode::serialize(value).map_err(|e| CodecError::Encode(e.to_string()))
}

pub fn decode_value<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    bincode::deserialize(bytes).map_err(|e| CodecError::Decode(e.to_string()))
}

/// Decode the field `name` out of a field map built by `into_field_map`.
pub fn decode_field<T: DeserializeOwned>(
    fields: &HashMap<String, Vec<u8>>,
    name: &str,
) -> Result<T, CodecError> {
    let bytes = fields
        .get(name)
        .ok_or_else(|| CodecError::MissingField(name.to_string()))?;
    decode_value(bytes)
}

/// Like [`decode_field`] but absent fields yield `None`.
pub fn decode_optional_field<T: DeserializeOwned>(
    fields: &HashMap<String, Vec<u8>>,
    name: &str,
) -> Result<Option<T>, CodecError> {
    fields.get(name).map(|bytes| decode_value(bytes)).transpose()
}

pub fn encode_event(event: &Event) -> Result<Vec<u8>, CodecError> {
    encode_value(event)
}

/// Encoded size of an event in bytes.
pub fn encoded_size(event: &Event) -> Result<usize, CodecError> {
    bincode::serialized_size(event)
        .map(|n| n as usize)
        .map_err(|e| CodecError::Encode(e.to_string()))
}

/// Frame a batch as a bincode `Vec<Event>`.
pub fn encode_batch_message(batch: &EncodedEventBatch) -> Vec<u8> {
    let mut msg = Vec::with_capacity(8 + batch.content.len());
    msg.extend_from_slice(&(batch.events_count as u64).to_le_bytes());
    msg.extend_from_slice(&batch.content);
    msg
}

pub fn decode_batch_message(bytes: &[u8]) -> Result<Vec<Event>, CodecError> {
    decode_value(bytes)
}
