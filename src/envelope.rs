//! Envelope codec.
//!
//! Every cache entry is stored as an envelope pairing the caller's payload
//! with the tag versions captured at write time:
//!
//! ```text
//! {"v":1,"tags":{"site":"1718000000"},"data":"PGh0bWw+"}
//! ```
//!
//! The payload is base64 encoded so arbitrary bytes survive the JSON wrapper.
//! Tags are kept sorted, which makes encoding deterministic across processes.

use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Current wire format version.
pub const ENVELOPE_VERSION: u8 = 1;

/// Tag name to the version timestamp observed when the entry was written.
pub type TagSnapshot = BTreeMap<String, String>;

/// Decode failure for bytes read back from the store.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("not a valid envelope: {0}")]
    Json(#[from] serde_json::Error),

    #[error("payload is not valid base64: {0}")]
    Payload(#[from] base64::DecodeError),

    #[error("unsupported envelope version {0}")]
    Version(u8),
}

/// A cache entry as physically stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub tags: TagSnapshot,
    pub data: Vec<u8>,
}

#[derive(Serialize)]
struct WireOut<'a> {
    v: u8,
    tags: &'a TagSnapshot,
    data: String,
}

#[derive(Deserialize)]
struct WireIn {
    v: u8,
    tags: TagSnapshot,
    data: String,
}

impl Envelope {
    pub fn new(data: Vec<u8>, tags: TagSnapshot) -> Self {
        Self { tags, data }
    }

    /// Serialize to the bytes written to the store.
    pub fn encode(&self) -> Result<Vec<u8>, EnvelopeError> {
        encode(&self.data, &self.tags)
    }

    /// Parse bytes read from the store.
    pub fn decode(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        decode(bytes)
    }
}

/// Serialize a payload and its tag snapshot.
pub fn encode(data: &[u8], tags: &TagSnapshot) -> Result<Vec<u8>, EnvelopeError> {
    let wire = WireOut {
        v: ENVELOPE_VERSION,
        tags,
        data: STANDARD.encode(data),
    };
    Ok(serde_json::to_vec(&wire)?)
}

/// Parse bytes read from the store.
///
/// Corrupted or foreign bytes yield an error, never a panic.
pub fn decode(bytes: &[u8]) -> Result<Envelope, EnvelopeError> {
    let wire: WireIn = serde_json::from_slice(bytes)?;
    if wire.v != ENVELOPE_VERSION {
        return Err(EnvelopeError::Version(wire.v));
    }

    Ok(Envelope {
        tags: wire.tags,
        data: STANDARD.decode(wire.data)?,
    })
}
