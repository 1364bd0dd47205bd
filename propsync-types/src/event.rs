//! Real-time notification envelopes.
//!
//! The relay pushes one JSON object per server-sent event:
//!
//! ```json
//! { "type": "property_updated", "property": { ... }, "message": "..." }
//! ```
//!
//! Each envelope carries a full listing snapshot (or none, for the
//! connection greeting), so it can be applied on its own and more than once
//! without changing the outcome. Unknown `type` values decode to
//! [`Decoded::Ignored`] instead of an error so newer relays can add kinds
//! without breaking older clients.

use crate::{Error, Property, PropertyId, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind tag of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connection,
    PropertyCreated,
    PropertyUpdated,
    PropertyDeleted,
}

impl EventKind {
    /// Wire name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connection => "connection",
            Self::PropertyCreated => "property_created",
            Self::PropertyUpdated => "property_updated",
            Self::PropertyDeleted => "property_deleted",
        }
    }

    /// Parses a wire name. Returns `None` for kinds this crate does not know.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "connection" => Some(Self::Connection),
            "property_created" => Some(Self::PropertyCreated),
            "property_updated" => Some(Self::PropertyUpdated),
            "property_deleted" => Some(Self::PropertyDeleted),
            _ => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The raw JSON shape of an envelope.
///
/// `property` stays untyped here so that an envelope of an unknown kind is
/// skipped even when its payload would not parse as a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A decoded notification.
#[derive(Debug, Clone, PartialEq)]
pub enum EventEnvelope {
    /// Greeting sent by the relay when a stream opens.
    Connection { message: Option<String> },
    PropertyCreated(Property),
    PropertyUpdated(Property),
    PropertyDeleted(Property),
}

/// Outcome of decoding one message body.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Envelope(EventEnvelope),
    /// A well-formed message of a kind this client does not handle.
    Ignored { kind: String },
}

impl EventEnvelope {
    /// Decodes one `data:` payload.
    pub fn decode(data: &str) -> Result<Decoded> {
        let wire: WireEnvelope = serde_json::from_str(data)?;
        Self::from_wire(wire)
    }

    /// Converts an already-parsed wire envelope.
    pub fn from_wire(wire: WireEnvelope) -> Result<Decoded> {
        let Some(kind) = EventKind::parse(&wire.kind) else {
            return Ok(Decoded::Ignored { kind: wire.kind });
        };

        let envelope = match kind {
            EventKind::Connection => Self::Connection {
                message: wire.message,
            },
            EventKind::PropertyCreated => Self::PropertyCreated(take_property(wire)?),
            EventKind::PropertyUpdated => Self::PropertyUpdated(take_property(wire)?),
            EventKind::PropertyDeleted => Self::PropertyDeleted(take_property(wire)?),
        };
        Ok(Decoded::Envelope(envelope))
    }

    /// Builds the wire shape of this envelope.
    pub fn to_wire(&self) -> Result<WireEnvelope> {
        let (property, message) = match self {
            Self::Connection { message } => (None, message.clone()),
            Self::PropertyCreated(p) | Self::PropertyUpdated(p) | Self::PropertyDeleted(p) => {
                (Some(serde_json::to_value(p)?), None)
            }
        };
        Ok(WireEnvelope {
            kind: self.kind().as_str().to_string(),
            property,
            message,
        })
    }

    /// Serializes this envelope to its JSON wire form.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_wire()?)?)
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::Connection { .. } => EventKind::Connection,
            Self::PropertyCreated(_) => EventKind::PropertyCreated,
            Self::PropertyUpdated(_) => EventKind::PropertyUpdated,
            Self::PropertyDeleted(_) => EventKind::PropertyDeleted,
        }
    }

    /// The listing snapshot, if this envelope carries one.
    pub fn property(&self) -> Option<&Property> {
        match self {
            Self::Connection { .. } => None,
            Self::PropertyCreated(p) | Self::PropertyUpdated(p) | Self::PropertyDeleted(p) => {
                Some(p)
            }
        }
    }

    /// The id of the listing this envelope is about.
    pub fn property_id(&self) -> Option<PropertyId> {
        self.property().map(|p| p.id)
    }
}

fn take_property(wire: WireEnvelope) -> Result<Property> {
    match wire.property {
        Some(value) if !value.is_null() => Ok(serde_json::from_value(value)?),
        _ => Err(Error::MissingProperty { kind: wire.kind }),
    }
}
