//! Outbound messages queued for a session's writer.

use crate::wml::Data;

/// Something to send to a client.
///
/// Every payload is compressed and framed on its own, so a [`Outbound::Tags`]
/// batch becomes one frame per document, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// A single WML document.
    Tag(Data),
    /// Several documents sent back to back.
    Tags(Vec<Data>),
    /// Pre-serialised payload bytes (still compressed and framed).
    Raw(Vec<u8>),
}

impl Outbound {
    pub fn tag(data: Data) -> Self {
        Outbound::Tag(data)
    }

    pub fn tags(docs: Vec<Data>) -> Self {
        Outbound::Tags(docs)
    }

    pub fn raw(bytes: impl Into<Vec<u8>>) -> Self {
        Outbound::Raw(bytes.into())
    }

    /// Serialise into per-frame payloads.
    pub fn into_payloads(self) -> Vec<Vec<u8>> {
        match self {
            Outbound::Tag(data) => vec![data.to_bytes()],
            Outbound::Tags(docs) => docs.iter().map(Data::to_bytes).collect(),
            Outbound::Raw(bytes) => vec![bytes],
        }
    }
}
