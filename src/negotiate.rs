//! Finding the input extension and agreeing on a protocol version.

use crate::server::{Server, ServerError, Version, BAD_REQUEST};

/// The version asked for when nobody says otherwise. 2.2 is the first with touch events.
pub const DEFAULT_VERSION: Version = Version::new(2, 2);

/// Result of negotiation. An `opcode` of zero means XI2 is unusable on this connection.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Negotiated {
    /// Major opcode of the extension. Event types arrive offset by this.
    pub opcode: u8,
    /// The version the server answered with, which may be lower than what was asked for.
    pub version: Version,
}
impl Negotiated {
    pub(crate) const UNSUPPORTED: Self = Self {
        opcode: 0,
        version: Version::new(0, 0),
    };
    #[must_use]
    pub fn is_supported(&self) -> bool {
        self.opcode != 0
    }
}

/// Query the server. Never fails, failures come back as an unsupported [`Negotiated`] and are
/// logged here.
pub(crate) fn negotiate<S: Server + ?Sized>(server: &S, wanted: Version) -> Negotiated {
    let opcode = match server.query_extension() {
        Ok(Some(opcode)) => opcode,
        Ok(None) => {
            tracing::warn!("X Input extension not available");
            return Negotiated::UNSUPPORTED;
        }
        Err(err) => {
            tracing::error!(%err, "QueryExtension failed");
            return Negotiated::UNSUPPORTED;
        }
    };

    match server.query_version(wanted) {
        Ok(version) if version >= wanted => {
            tracing::debug!(opcode, %version, "negotiated XI2");
            Negotiated { opcode, version }
        }
        Ok(version) => {
            tracing::warn!(%wanted, %version, "server XI2 version too old");
            Negotiated { opcode: 0, version }
        }
        Err(ServerError::Request { code: BAD_REQUEST }) => {
            tracing::warn!(%wanted, "server doesn't speak XI2");
            Negotiated::UNSUPPORTED
        }
        Err(err) => {
            tracing::error!(%wanted, %err, "XIQueryVersion failed unexpectedly");
            Negotiated::UNSUPPORTED
        }
    }
}
