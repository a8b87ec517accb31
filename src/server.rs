//! The seam between this crate and a live display connection.
//!
//! Everything the core needs from the server goes through [`Server`], one method per XI2 request.
//! Replies are handed back as plain wire structs defined here, so the decoding logic never has to
//! care which X binding produced them. The x11rb implementation lives in `platform::xinput2`.

use crate::events::wire::Fixed3232;

/// An X11 atom. Zero is the `None` atom.
pub type Atom = u32;
/// An X11 window ID. Zero is `None`.
pub type Window = u32;

/// X error code for `BadRequest`. XIQueryVersion answers with this when the server can't speak the
/// version we asked for, which is a "normal" failure rather than a bug.
pub const BAD_REQUEST: u8 = 1;

/// Errors that may occur while talking to the server.
#[derive(thiserror::Error, Debug)]
pub enum ServerError {
    /// The server answered a request with an X error.
    #[error("request failed with X error code {code}")]
    Request { code: u8 },
    /// The reply was well-formed X, but not shaped like the XI2 protocol says it should be.
    #[error("malformed reply from server")]
    Malformed,
    #[cfg(xinput2)]
    #[error(transparent)]
    Connection(#[from] x11rb::errors::ConnectionError),
}

/// An XI protocol version. Ordering is lexicographic, major first.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u16,
    pub minor: u16,
}
impl Version {
    #[must_use]
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }
}
impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// One entry of an XIQueryDevice reply.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceInfo {
    pub deviceid: u16,
    /// Raw `XIMasterPointer`..`XIFloatingSlave` code.
    pub use_: u16,
    pub attachment: u16,
    pub enabled: bool,
    /// Not necessarily UTF8.
    pub name: Vec<u8>,
    pub classes: Vec<DeviceClass>,
}

/// One capability class of a device, as sent by the server.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceClass {
    pub sourceid: u16,
    pub data: ClassData,
}

/// The class-specific payload of a [`DeviceClass`].
#[derive(Clone, Debug, PartialEq)]
pub enum ClassData {
    Key {
        keycodes: Vec<u32>,
    },
    Button {
        /// Bitmask of currently held buttons.
        state: Vec<u32>,
        /// One label atom per button, zero for unlabeled.
        labels: Vec<Atom>,
    },
    Valuator {
        number: u16,
        label: Atom,
        min: Fixed3232,
        max: Fixed3232,
        value: Fixed3232,
        resolution: u32,
        mode: u8,
    },
    Scroll {
        number: u16,
        scroll_type: u16,
        flags: u32,
        increment: Fixed3232,
    },
    Touch {
        mode: u8,
        num_touches: u8,
    },
    /// A class type newer than this crate.
    Unknown {
        class_type: u16,
    },
}

/// Property payload, split by the format the server reported.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PropertyData {
    Data8(Vec<u8>),
    Data16(Vec<u16>),
    Data32(Vec<u32>),
}
impl PropertyData {
    /// Bits per item.
    #[must_use]
    pub fn format(&self) -> u8 {
        match self {
            Self::Data8(_) => 8,
            Self::Data16(_) => 16,
            Self::Data32(_) => 32,
        }
    }
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Data8(v) => v.len(),
            Self::Data16(v) => v.len(),
            Self::Data32(v) => v.len(),
        }
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An XIGetProperty reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyReply {
    /// Actual type of the property, `0` if it doesn't exist.
    pub type_: Atom,
    /// How many bytes are left on the server past what we read.
    pub bytes_after: u32,
    pub data: PropertyData,
}

/// Trait that all display connections implement, giving the core access to the XI2 requests it
/// needs.
///
/// Requests are synchronous unless noted. Nothing here is cached, that's the caller's business.
pub trait Server {
    /// Look up the input extension. `Ok(None)` if the server doesn't have it, otherwise its major
    /// opcode.
    #[allow(clippy::missing_errors_doc)]
    fn query_extension(&self) -> Result<Option<u8>, ServerError>;
    /// Announce the version we speak, get back the version the server will use.
    #[allow(clippy::missing_errors_doc)]
    fn query_version(&self, wanted: Version) -> Result<Version, ServerError>;
    /// Submit an event mask for a window/device pair. Fire-and-forget, no reply is awaited.
    #[allow(clippy::missing_errors_doc)]
    fn select_events(&self, window: Window, deviceid: u16, mask: &[u32]) -> Result<(), ServerError>;
    /// Push any buffered requests out to the server.
    #[allow(clippy::missing_errors_doc)]
    fn flush(&self) -> Result<(), ServerError>;
    #[allow(clippy::missing_errors_doc)]
    fn query_devices(&self, deviceid: u16) -> Result<Vec<DeviceInfo>, ServerError>;
    #[allow(clippy::missing_errors_doc)]
    fn list_properties(&self, deviceid: u16) -> Result<Vec<Atom>, ServerError>;
    /// `offset` and `len` are in 4-byte units, as on the wire.
    #[allow(clippy::missing_errors_doc)]
    fn get_property(
        &self,
        deviceid: u16,
        property: Atom,
        type_: Atom,
        offset: u32,
        len: u32,
    ) -> Result<PropertyReply, ServerError>;
    /// Resolve an atom to its name. `Ok(None)` for the `None` atom.
    #[allow(clippy::missing_errors_doc)]
    fn atom_name(&self, atom: Atom) -> Result<Option<String>, ServerError>;
}

// Lets a `Bindings` borrow a connection that something else owns.
impl<S: Server + ?Sized> Server for &S {
    fn query_extension(&self) -> Result<Option<u8>, ServerError> {
        (**self).query_extension()
    }
    fn query_version(&self, wanted: Version) -> Result<Version, ServerError> {
        (**self).query_version(wanted)
    }
    fn select_events(
        &self,
        window: Window,
        deviceid: u16,
        mask: &[u32],
    ) -> Result<(), ServerError> {
        (**self).select_events(window, deviceid, mask)
    }
    fn flush(&self) -> Result<(), ServerError> {
        (**self).flush()
    }
    fn query_devices(&self, deviceid: u16) -> Result<Vec<DeviceInfo>, ServerError> {
        (**self).query_devices(deviceid)
    }
    fn list_properties(&self, deviceid: u16) -> Result<Vec<Atom>, ServerError> {
        (**self).list_properties(deviceid)
    }
    fn get_property(
        &self,
        deviceid: u16,
        property: Atom,
        type_: Atom,
        offset: u32,
        len: u32,
    ) -> Result<PropertyReply, ServerError> {
        (**self).get_property(deviceid, property, type_, offset, len)
    }
    fn atom_name(&self, atom: Atom) -> Result<Option<String>, ServerError> {
        (**self).atom_name(atom)
    }
}
