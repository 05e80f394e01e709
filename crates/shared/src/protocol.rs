//! Envelope contract between the voice agent and the form client.
//!
//! Every message on the wire is `{"type": <string>, "payload": <object>}`.
//! Only three types are understood; anything else is reported as
//! [`MessageError::UnknownType`] so callers can log and move on.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::domain::FieldSpec;

pub const OPEN_FORM: &str = "open_form";
pub const UPDATE_FIELD: &str = "update_field";
pub const SUBMIT_FORM: &str = "submit_form";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum InboundEvent {
    OpenForm {
        fields: Vec<FieldSpec>,
    },
    UpdateField {
        field_name: String,
        field_value: String,
    },
    SubmitForm {},
}

impl InboundEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::OpenForm { .. } => OPEN_FORM,
            Self::UpdateField { .. } => UPDATE_FIELD,
            Self::SubmitForm {} => SUBMIT_FORM,
        }
    }

    pub fn update_field(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::UpdateField {
            field_name: name.into(),
            field_value: value.into(),
        }
    }

    pub fn to_text(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("message is not a valid envelope: {0}")]
    InvalidEnvelope(#[source] serde_json::Error),
    #[error("unrecognized message type {0:?}")]
    UnknownType(String),
    #[error("malformed {kind} payload: {source}")]
    InvalidPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

impl MessageError {
    /// Unknown types are expected from newer agents; everything else means
    /// the sender broke the contract.
    pub fn is_forward_compatible(&self) -> bool {
        matches!(self, Self::UnknownType(_))
    }
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

/// Decodes one text frame into an [`InboundEvent`].
///
/// A missing or `null` payload is read as `{}`, which is what `submit_form`
/// senders tend to omit.
pub fn parse_inbound(text: &str) -> Result<InboundEvent, MessageError> {
    let raw: RawEnvelope = serde_json::from_str(text).map_err(MessageError::InvalidEnvelope)?;
    if ![OPEN_FORM, UPDATE_FIELD, SUBMIT_FORM].contains(&raw.kind.as_str()) {
        return Err(MessageError::UnknownType(raw.kind));
    }

    let payload = match raw.payload {
        Value::Null => Value::Object(Map::new()),
        other => other,
    };
    serde_json::from_value(json!({ "type": raw.kind, "payload": payload })).map_err(|source| {
        MessageError::InvalidPayload {
            kind: raw.kind,
            source,
        }
    })
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
