//! Wire-shaped views of the XI2 generic events, as handed over by the event loop.
//!
//! These mirror the protocol layout field for field (packed valuator arrays and all) and make no
//! attempt at being nice to use. [`super::decode`] turns them into [`super::Event`]s.

use crate::server::Window;

/// Bit set in `response_type` when an event came from `SendEvent` rather than the server.
pub const SEND_EVENT_BIT: u8 = 0x80;

/// XI 32.32 fixed point number, as used for valuator values.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Fixed3232 {
    pub integral: i32,
    /// Unsigned fraction of 2^32, *added* to `integral` regardless of sign.
    pub frac: u32,
}
impl Fixed3232 {
    #[must_use]
    pub const fn from_int(integral: i32) -> Self {
        Self { integral, frac: 0 }
    }
    #[must_use]
    pub fn to_f64(self) -> f64 {
        // 2^32
        const FRAC_SCALE: f64 = 4_294_967_296.0;
        f64::from(self.integral) + f64::from(self.frac) / FRAC_SCALE
    }
}
impl From<Fixed3232> for f64 {
    fn from(value: Fixed3232) -> Self {
        value.to_f64()
    }
}

/// XI 16.16 fixed point number, as used for pointer coordinates.
pub type Fixed1616 = i32;
#[must_use]
pub fn fixed1616_to_f64(fixed: Fixed1616) -> f64 {
    f64::from(fixed) / 65536.0
}

/// Fields every generic event carries.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct WireHeader {
    /// Sent via `SendEvent`.
    pub send_event: bool,
    /// Major opcode of the extension that owns this event.
    pub extension: u8,
    /// Extension-relative event type, `XI_KeyPress` and friends.
    pub event_type: u16,
    /// Full sequence number, as tracked by the connection.
    pub serial: u64,
    pub time: u32,
}
impl WireHeader {
    /// Build from the raw `response_type` byte.
    #[must_use]
    pub fn new(response_type: u8, extension: u8, event_type: u16, serial: u64, time: u32) -> Self {
        Self {
            send_event: response_type & SEND_EVENT_BIT != 0,
            extension,
            event_type,
            serial,
            time,
        }
    }
}

/// Access to the common header, regardless of which shape of event we're holding.
#[enum_dispatch::enum_dispatch]
pub trait GenericEvent {
    fn header(&self) -> &WireHeader;
}

/// `XIDeviceEvent`: key, button, motion and touch events.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceEventWire {
    pub header: WireHeader,
    pub deviceid: u16,
    pub sourceid: u16,
    pub detail: u32,
    pub root: Window,
    pub event: Window,
    pub child: Window,
    pub root_x: Fixed1616,
    pub root_y: Fixed1616,
    pub event_x: Fixed1616,
    pub event_y: Fixed1616,
    pub flags: u32,
    /// base, latched, locked, effective.
    pub mods: [u32; 4],
    /// base, latched, locked, effective.
    pub group: [u8; 4],
    pub button_mask: Vec<u32>,
    pub valuator_mask: Vec<u32>,
    /// One entry per *set* bit of `valuator_mask`, in bit order.
    pub axisvalues: Vec<Fixed3232>,
}
impl GenericEvent for DeviceEventWire {
    fn header(&self) -> &WireHeader {
        &self.header
    }
}

/// `XIRawEvent`: raw key, button, motion and touch events.
#[derive(Clone, Debug, PartialEq)]
pub struct RawEventWire {
    pub header: WireHeader,
    pub deviceid: u16,
    pub sourceid: u16,
    pub detail: u32,
    pub flags: u32,
    pub valuator_mask: Vec<u32>,
    /// Processed values, one per set mask bit.
    pub axisvalues: Vec<Fixed3232>,
    /// Unaccelerated values, parallel to `axisvalues`.
    pub axisvalues_raw: Vec<Fixed3232>,
}
impl GenericEvent for RawEventWire {
    fn header(&self) -> &WireHeader {
        &self.header
    }
}

/// `XIHierarchyEvent`. Per-device infos are dropped, the protocol for this event says clients
/// should just rescan anyway.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HierarchyEventWire {
    pub header: WireHeader,
    pub deviceid: u16,
    pub flags: u32,
}
impl GenericEvent for HierarchyEventWire {
    fn header(&self) -> &WireHeader {
        &self.header
    }
}

/// Any other XI event, including types newer than this crate. Only the header is kept.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenericEventWire {
    pub header: WireHeader,
    /// The event window, for those types that have one.
    pub window: Window,
}
impl GenericEvent for GenericEventWire {
    fn header(&self) -> &WireHeader {
        &self.header
    }
}

/// The payload behind a cookie.
#[enum_dispatch::enum_dispatch(GenericEvent)]
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Device(DeviceEventWire),
    Raw(RawEventWire),
    Hierarchy(HierarchyEventWire),
    Generic(GenericEventWire),
}

/// A generic-event cookie handed to us by the event loop.
///
/// Mirrors `XGetEventData`/`XFreeEventData`: the payload must be fetched before use and, once
/// fetched, released exactly once.
pub trait Cookie {
    /// Fetch the payload. `None` when it was already consumed or the event isn't an input-extension
    /// event at all - both are ordinary, and nothing needs releasing afterwards.
    fn get_data(&mut self) -> Option<Payload>;
    /// Release whatever backs the fetched payload.
    fn free_data(&mut self);
}

/// A fetched payload that releases its cookie when dropped, so every return path frees it exactly
/// once.
pub(crate) struct Fetched<'c, C: Cookie + ?Sized> {
    cookie: &'c mut C,
    pub payload: Payload,
}
impl<'c, C: Cookie + ?Sized> Fetched<'c, C> {
    pub fn fetch(cookie: &'c mut C) -> Option<Self> {
        let payload = cookie.get_data()?;
        Some(Self { cookie, payload })
    }
}
impl<C: Cookie + ?Sized> Drop for Fetched<'_, C> {
    fn drop(&mut self) {
        self.cookie.free_data();
    }
}
