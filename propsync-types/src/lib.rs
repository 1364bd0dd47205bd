//! Core type definitions for propsync.
//!
//! This crate defines the plain data types shared by the query pipeline,
//! the live sync engine and the notification relay:
//! - [`Property`] and its attribute enums, the managed listing entity
//! - [`PropertyId`], the identifier assigned by the backing store
//! - [`EventEnvelope`], a decoded real-time notification
//!
//! Nothing here performs I/O. Wire decoding of envelopes lives here so the
//! client and the relay agree on one format.

mod event;
mod ids;
mod property;

pub use event::{Decoded, EventEnvelope, EventKind, WireEnvelope};
pub use ids::PropertyId;
pub use property::{
    CreatePropertyRequest, Property, PropertyImage, PropertyKind, PropertyPatch, PropertyStatus,
};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while decoding wire types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid property id: {0}")]
    InvalidId(#[from] std::num::ParseIntError),

    #[error("`{kind}` envelope carries no property")]
    MissingProperty { kind: String },
}
