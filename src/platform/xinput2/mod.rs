//! [`Server`] over an `x11rb` [`RustConnection`].
//!
//! Events are read off the connection raw, so the full 64-bit sequence number is kept and so events
//! this crate (or x11rb) doesn't know can still be handed to the decoder by their header alone.

use x11rb::{
    connection::{Connection, RequestConnection},
    errors::{ConnectError, ParseError, ReplyError},
    protocol::{
        xinput::{self, ConnectionExt as _},
        xproto::ConnectionExt as _,
    },
    rust_connection::RustConnection,
    x11_utils::TryParse,
};

use crate::events::wire::{
    Cookie, DeviceEventWire, Fixed3232, GenericEventWire, HierarchyEventWire, Payload,
    RawEventWire, WireHeader, SEND_EVENT_BIT,
};
use crate::events::EventName;
use crate::server::{
    Atom, ClassData, DeviceClass, DeviceInfo, PropertyData, PropertyReply, Server, ServerError,
    Version, Window,
};
use crate::strings::EXTENSION_NAME;

/// `response_type` of every extension generic event.
const GE_GENERIC: u8 = 35;

impl From<ReplyError> for ServerError {
    fn from(value: ReplyError) -> Self {
        match value {
            ReplyError::ConnectionError(err) => Self::Connection(err),
            ReplyError::X11Error(err) => Self::Request {
                code: err.error_code,
            },
        }
    }
}

fn fixed3232(fixed: xinput::Fp3232) -> Fixed3232 {
    Fixed3232 {
        integral: fixed.integral,
        frac: fixed.frac,
    }
}

/// A connection to an X server.
pub struct X11Server {
    conn: RustConnection,
    screen: usize,
}
impl std::fmt::Debug for X11Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("X11Server")
            .field("screen", &self.screen)
            .finish_non_exhaustive()
    }
}
impl X11Server {
    /// Connect to `display`, or `$DISPLAY` if `None`.
    #[allow(clippy::missing_errors_doc)]
    pub fn connect(display: Option<&str>) -> Result<Self, ConnectError> {
        let (conn, screen) = x11rb::connect(display)?;
        Ok(Self { conn, screen })
    }
    /// Wrap an existing connection. `screen` is only used to find the [root window](Self::root).
    #[must_use]
    pub fn from_connection(conn: RustConnection, screen: usize) -> Self {
        Self { conn, screen }
    }
    #[must_use]
    pub fn connection(&self) -> &RustConnection {
        &self.conn
    }
    /// Root window of the connection's default screen.
    #[must_use]
    pub fn root(&self) -> Option<Window> {
        self.conn.setup().roots.get(self.screen).map(|screen| screen.root)
    }
    /// Look up an atom by name, creating it if needed.
    #[allow(clippy::missing_errors_doc)]
    pub fn intern(&self, name: &str) -> Result<Atom, ServerError> {
        Ok(self.conn.intern_atom(false, name.as_bytes())?.reply()?.atom)
    }
    /// Next queued event, if any. Doesn't block.
    #[allow(clippy::missing_errors_doc)]
    pub fn poll_cookie(&self) -> Result<Option<X11Cookie>, ServerError> {
        let Some((bytes, serial)) = self.conn.poll_for_raw_event_with_sequence()? else {
            return Ok(None);
        };
        Ok(Some(X11Cookie::new(bytes, serial, self.query_extension()?)))
    }
    /// Block until an event arrives.
    #[allow(clippy::missing_errors_doc)]
    pub fn wait_cookie(&self) -> Result<X11Cookie, ServerError> {
        let (bytes, serial) = self.conn.wait_for_raw_event_with_sequence()?;
        Ok(X11Cookie::new(bytes, serial, self.query_extension()?))
    }
}

impl Server for X11Server {
    fn query_extension(&self) -> Result<Option<u8>, ServerError> {
        // x11rb caches this per connection, only the first call does a round trip.
        Ok(self
            .conn
            .extension_information(EXTENSION_NAME)?
            .map(|info| info.major_opcode))
    }
    fn query_version(&self, wanted: Version) -> Result<Version, ServerError> {
        let reply = self
            .conn
            .xinput_xi_query_version(wanted.major, wanted.minor)?
            .reply()?;
        Ok(Version::new(reply.major_version, reply.minor_version))
    }
    fn select_events(
        &self,
        window: Window,
        deviceid: u16,
        mask: &[u32],
    ) -> Result<(), ServerError> {
        let mask = xinput::EventMask {
            deviceid,
            mask: mask.iter().copied().map(xinput::XIEventMask::from).collect(),
        };
        // Not checked, any error shows up in the event queue.
        drop(
            self.conn
                .xinput_xi_select_events(window, std::slice::from_ref(&mask))?,
        );
        Ok(())
    }
    fn flush(&self) -> Result<(), ServerError> {
        self.conn.flush()?;
        Ok(())
    }
    fn query_devices(&self, deviceid: u16) -> Result<Vec<DeviceInfo>, ServerError> {
        let infos = self.conn.xinput_xi_query_device(deviceid)?.reply()?.infos;
        Ok(infos
            .into_iter()
            .map(|info| DeviceInfo {
                deviceid: info.deviceid,
                use_: u16::from(info.type_),
                attachment: info.attachment,
                enabled: info.enabled,
                name: info.name,
                classes: info.classes.into_iter().map(device_class).collect(),
            })
            .collect())
    }
    fn list_properties(&self, deviceid: u16) -> Result<Vec<Atom>, ServerError> {
        Ok(self
            .conn
            .xinput_xi_list_properties(deviceid)?
            .reply()?
            .properties)
    }
    fn get_property(
        &self,
        deviceid: u16,
        property: Atom,
        type_: Atom,
        offset: u32,
        len: u32,
    ) -> Result<PropertyReply, ServerError> {
        let reply = self
            .conn
            .xinput_xi_get_property(deviceid, false, property, type_, offset, len)?
            .reply()?;
        let items = &reply.items;
        let data = if let Some(data) = items.as_data8() {
            PropertyData::Data8(data.clone())
        } else if let Some(data) = items.as_data16() {
            PropertyData::Data16(data.clone())
        } else if let Some(data) = items.as_data32() {
            PropertyData::Data32(data.clone())
        } else if reply.type_ == 0 {
            // Missing properties come back with format 0.
            PropertyData::Data8(vec![])
        } else {
            return Err(ServerError::Malformed);
        };
        Ok(PropertyReply {
            type_: reply.type_,
            bytes_after: reply.bytes_after,
            data,
        })
    }
    fn atom_name(&self, atom: Atom) -> Result<Option<String>, ServerError> {
        if atom == 0 {
            return Ok(None);
        }
        let name = self.conn.get_atom_name(atom)?.reply()?.name;
        Ok(Some(String::from_utf8_lossy(&name).into_owned()))
    }
}

fn device_class(class: xinput::DeviceClass) -> DeviceClass {
    use xinput::DeviceClassData as D;
    let data = match class.data {
        D::Key(key) => ClassData::Key { keycodes: key.keys },
        D::Button(button) => ClassData::Button {
            state: button.state,
            labels: button.labels,
        },
        D::Valuator(valuator) => ClassData::Valuator {
            number: valuator.number,
            label: valuator.label,
            min: fixed3232(valuator.min),
            max: fixed3232(valuator.max),
            value: fixed3232(valuator.value),
            resolution: valuator.resolution,
            mode: u8::from(valuator.mode),
        },
        D::Scroll(scroll) => ClassData::Scroll {
            number: scroll.number,
            scroll_type: u16::from(scroll.scroll_type),
            flags: u32::from(scroll.flags),
            increment: fixed3232(scroll.increment),
        },
        D::Touch(touch) => ClassData::Touch {
            mode: u8::from(touch.mode),
            num_touches: touch.num_touches,
        },
        D::Gesture(_) => ClassData::Unknown {
            class_type: u16::from(xinput::DeviceClassType::GESTURE),
        },
        D::InvalidValue(class_type) => ClassData::Unknown { class_type },
    };
    DeviceClass {
        sourceid: class.sourceid,
        data,
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum CookieState {
    Pending,
    Fetched,
    Released,
}

/// One event as read off the connection.
///
/// Only XI2 events have data to [get](Cookie::get_data). For anything else the raw bytes are still
/// available to parse by other means.
pub struct X11Cookie {
    bytes: Vec<u8>,
    serial: u64,
    /// XI opcode, if the server has the extension at all.
    opcode: Option<u8>,
    state: CookieState,
}
impl X11Cookie {
    fn new(bytes: Vec<u8>, serial: u64, opcode: Option<u8>) -> Self {
        Self {
            bytes,
            serial,
            opcode,
            state: CookieState::Pending,
        }
    }
    /// Full sequence number of the event.
    #[must_use]
    pub fn serial(&self) -> u64 {
        self.serial
    }
    /// The event as sent by the server. Empty once released.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
    /// Whether this is a generic event belonging to the input extension.
    #[must_use]
    pub fn is_xi2(&self) -> bool {
        match self.bytes.get(..2) {
            Some(&[response_type, extension]) => {
                response_type & !SEND_EVENT_BIT == GE_GENERIC && Some(extension) == self.opcode
            }
            _ => false,
        }
    }
}
impl Cookie for X11Cookie {
    fn get_data(&mut self) -> Option<Payload> {
        if self.state != CookieState::Pending || !self.is_xi2() {
            return None;
        }
        match parse(&self.bytes, self.serial) {
            Ok(payload) => {
                self.state = CookieState::Fetched;
                Some(payload)
            }
            Err(err) => {
                tracing::warn!(serial = self.serial, %err, "malformed XI2 event");
                None
            }
        }
    }
    fn free_data(&mut self) {
        self.state = CookieState::Released;
        self.bytes = Vec::new();
    }
}

/// Header straight from the bytes, for types we don't parse further. All XI2 events share
/// the layout up to `time`.
fn raw_header(bytes: &[u8], event_type: u16, serial: u64) -> Result<WireHeader, ParseError> {
    let Some(&[response_type, extension]) = bytes.get(..2) else {
        return Err(ParseError::InsufficientData);
    };
    let Some(&[a, b, c, d]) = bytes.get(12..16) else {
        return Err(ParseError::InsufficientData);
    };
    Ok(WireHeader::new(
        response_type,
        extension,
        event_type,
        serial,
        u32::from_ne_bytes([a, b, c, d]),
    ))
}

macro_rules! header {
    ($e:expr, $serial:expr) => {
        WireHeader::new(
            $e.response_type,
            $e.extension,
            $e.event_type,
            $serial,
            $e.time,
        )
    };
}

/// Key, button, motion and touch events all share a layout, but are distinct types in x11rb.
macro_rules! device_wire {
    ($ty:ty, $bytes:expr, $serial:expr) => {{
        let (e, _) = <$ty>::try_parse($bytes)?;
        Payload::Device(DeviceEventWire {
            header: header!(e, $serial),
            deviceid: e.deviceid,
            sourceid: e.sourceid,
            detail: e.detail,
            root: e.root,
            event: e.event,
            child: e.child,
            root_x: e.root_x,
            root_y: e.root_y,
            event_x: e.event_x,
            event_y: e.event_y,
            flags: u32::from(e.flags),
            mods: [e.mods.base, e.mods.latched, e.mods.locked, e.mods.effective],
            group: [e.group.base, e.group.latched, e.group.locked, e.group.effective],
            button_mask: e.button_mask,
            valuator_mask: e.valuator_mask,
            axisvalues: e.axisvalues.into_iter().map(fixed3232).collect(),
        })
    }};
}

macro_rules! raw_wire {
    ($ty:ty, $bytes:expr, $serial:expr) => {{
        let (e, _) = <$ty>::try_parse($bytes)?;
        Payload::Raw(RawEventWire {
            header: header!(e, $serial),
            deviceid: e.deviceid,
            sourceid: e.sourceid,
            detail: e.detail,
            flags: u32::from(e.flags),
            valuator_mask: e.valuator_mask,
            axisvalues: e.axisvalues.into_iter().map(fixed3232).collect(),
            axisvalues_raw: e.axisvalues_raw.into_iter().map(fixed3232).collect(),
        })
    }};
}

/// Types where only the header and event window are kept.
macro_rules! generic_wire {
    ($ty:ty, $bytes:expr, $serial:expr) => {{
        let (e, _) = <$ty>::try_parse($bytes)?;
        Payload::Generic(GenericEventWire {
            header: header!(e, $serial),
            window: e.event,
        })
    }};
}

fn parse(bytes: &[u8], serial: u64) -> Result<Payload, ParseError> {
    use EventName as E;
    let Some(&[lo, hi]) = bytes.get(8..10) else {
        return Err(ParseError::InsufficientData);
    };
    let event_type = u16::from_ne_bytes([lo, hi]);
    let header_only = || -> Result<Payload, ParseError> {
        Ok(Payload::Generic(GenericEventWire {
            header: raw_header(bytes, event_type, serial)?,
            window: 0,
        }))
    };

    let Some(name) = E::from_repr(event_type) else {
        // The decoder decides what to do with these.
        return header_only();
    };
    Ok(match name {
        E::KeyPress | E::KeyRelease => device_wire!(xinput::KeyPressEvent, bytes, serial),
        E::ButtonPress | E::ButtonRelease | E::Motion => {
            device_wire!(xinput::ButtonPressEvent, bytes, serial)
        }
        E::TouchBegin | E::TouchUpdate | E::TouchEnd => {
            device_wire!(xinput::TouchBeginEvent, bytes, serial)
        }
        E::RawKeyPress | E::RawKeyRelease => raw_wire!(xinput::RawKeyPressEvent, bytes, serial),
        E::RawButtonPress | E::RawButtonRelease | E::RawMotion => {
            raw_wire!(xinput::RawButtonPressEvent, bytes, serial)
        }
        E::RawTouchBegin | E::RawTouchUpdate | E::RawTouchEnd => {
            raw_wire!(xinput::RawTouchBeginEvent, bytes, serial)
        }
        E::HierarchyChanged => {
            let (e, _) = xinput::HierarchyEvent::try_parse(bytes)?;
            Payload::Hierarchy(HierarchyEventWire {
                header: header!(e, serial),
                deviceid: e.deviceid,
                flags: u32::from(e.flags),
            })
        }
        E::Enter | E::Leave | E::FocusIn | E::FocusOut => {
            generic_wire!(xinput::EnterEvent, bytes, serial)
        }
        E::TouchOwnership => generic_wire!(xinput::TouchOwnershipEvent, bytes, serial),
        E::BarrierHit | E::BarrierLeave => generic_wire!(xinput::BarrierHitEvent, bytes, serial),
        // Device changes, properties and gestures.
        _ => return header_only(),
    })
}
