//! # `XInput2` event decoding, history, and per-window dispatch
//!
//! The X Input Extension v2 delivers its events as *generic events*: an opaque "cookie" whose
//! payload has to be fetched, parsed, and then released. On top of that, XI packs its per-axis
//! values into sparse, bitmask-indexed arrays, and some servers will happily deliver the same
//! cookie twice.
//! This crate deals with all of that and hands out plain [`Event`](events::Event)s.
//!
//! The flow is:
//! * [Negotiate](Bindings::negotiate) the protocol version, which also learns the extension opcode.
//! * [Select](Bindings::select_events) the event classes you want on a window.
//! * Feed every cookie from your event loop into [`Bindings::parse_event`]. Events are decoded,
//!   deduplicated, kept in a short [history](history::History), and handed to whatever handler was
//!   [connected](Bindings::connect) for their window.
//!
//! Device enumeration and property read-back live alongside, see [`Bindings::list_devices`].
//!
//! The connection itself is abstracted behind [`Server`](server::Server). With the default
//! `xorg-xinput2` feature, an `x11rb` implementation is provided, and [`Builder`] can set the whole
//! thing up in one go.
//!
//! **Note:** This crate decodes, it does not interpret. What a key press *means* (focus, IME, drag
//! and drop, ...) is up to the handlers.

#![warn(clippy::pedantic)]
#![forbid(unsafe_op_in_unsafe_fn)]

use std::collections::BTreeMap;
use std::sync::Arc;

pub mod builder;
pub mod device;
pub mod dispatch;
pub mod events;
pub mod history;
pub mod mask;
pub mod negotiate;
pub mod platform;
pub mod server;
mod strings;
#[cfg(test)]
pub(crate) mod testing;

pub use builder::Builder;

use device::{DeviceRecord, Devices, InventoryError, PropertyError, PropertyValue};
use dispatch::Registry;
use events::wire::{Cookie, Fetched, GenericEvent};
use events::{Event, EventName};
use history::History;
use mask::{DeviceSelector, EventMask, SelectError};
use negotiate::Negotiated;
use server::{Atom, Server, ServerError, Version, Window};

/// Everything needed to turn one connection's cookies into dispatched events.
///
/// There should be exactly one of these per display connection. All state (the negotiated opcode,
/// the event history, the device cache and the handlers) is scoped to it.
pub struct Bindings<S: Server> {
    server: S,
    negotiated: Option<Negotiated>,
    history: History,
    registry: Registry,
    devices: Arc<Devices>,
}
impl<S: Server + std::fmt::Debug> std::fmt::Debug for Bindings<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bindings")
            .field("server", &self.server)
            .field("negotiated", &self.negotiated)
            .field("history", &self.history.len())
            .field("registry", &self.registry)
            .field("devices", &self.devices.len())
            .finish()
    }
}

/// # Setup
impl<S: Server> Bindings<S> {
    /// Wrap a connection. Nothing is sent until the first request.
    pub fn new(server: S) -> Self {
        Self {
            server,
            negotiated: None,
            history: History::new(),
            registry: Registry::new(),
            devices: Arc::default(),
        }
    }
    pub fn server(&self) -> &S {
        &self.server
    }
    /// Negotiate protocol version `major.minor`.
    ///
    /// Only the first call talks to the server, later calls return that same result no matter what
    /// version they ask for. Check [`Negotiated::is_supported`] before going further.
    pub fn negotiate(&mut self, major: u16, minor: u16) -> Negotiated {
        if let Some(negotiated) = self.negotiated {
            return negotiated;
        }
        let negotiated = negotiate::negotiate(&self.server, Version::new(major, minor));
        self.negotiated = Some(negotiated);
        negotiated
    }
    /// The cached negotiation result, if [`negotiate`](Self::negotiate) has run.
    #[must_use]
    pub fn negotiated(&self) -> Option<Negotiated> {
        self.negotiated
    }
    /// The extension opcode. Zero if XI2 is unavailable or nothing was negotiated yet.
    #[must_use]
    pub fn opcode(&self) -> u8 {
        self.negotiated.map_or(0, |negotiated| negotiated.opcode)
    }
    /// Subscribe `window` to the events in `mask` from the devices matched by `selector`.
    ///
    /// The request is only queued, call [`flush`](Self::flush) to make sure it's on its way.
    /// Fails with [`SelectError::Unsupported`] until a successful [`negotiate`](Self::negotiate).
    #[allow(clippy::missing_errors_doc)]
    pub fn select_events(
        &mut self,
        window: Window,
        selector: DeviceSelector,
        mask: &EventMask,
    ) -> Result<(), SelectError> {
        let negotiated = self.negotiated.unwrap_or(Negotiated::UNSUPPORTED);
        mask::select(&self.server, negotiated, window, selector, mask)
    }
    #[allow(clippy::missing_errors_doc)]
    pub fn flush(&self) -> Result<(), ServerError> {
        self.server.flush()
    }
}

/// # Events
impl<S: Server> Bindings<S> {
    /// Decode a cookie, record it, and run its handler.
    ///
    /// Returns `None` for anything that didn't produce a new event: cookies that aren't XI2, event
    /// types this crate has never heard of, and repeated deliveries. The returned event has already
    /// been dispatched, it's only handed back for convenience.
    ///
    /// Never talks to the server. Type codes are offset by the cached [`opcode`](Self::opcode).
    pub fn parse_event<C: Cookie + ?Sized>(&mut self, cookie: &mut C) -> Option<&Event> {
        // From here on the cookie is released when `fetched` goes, on every path.
        let fetched = Fetched::fetch(cookie)?;
        let opcode = self.opcode();
        let header = *fetched.payload.header();
        let (name, type_code) = events::decode::identify(&header, opcode)?;

        if self.history.is_duplicate(type_code, header.serial) {
            tracing::trace!(%name, serial = header.serial, "dropping repeated delivery");
            return None;
        }
        let event = events::decode::decode(&fetched.payload, name, type_code);
        drop(fetched);

        self.history.push(event);
        let event = self.history.newest()?;
        let device = event.device().and_then(|id| self.devices.get(&id));
        self.registry.dispatch(event, device);
        Some(event)
    }
    /// See [`History::find_event`].
    #[must_use]
    pub fn find_event(&self, name: EventName, serial: u64) -> Option<&Event> {
        self.history.find_event(name, serial)
    }
    /// See [`History::find_events`].
    #[must_use]
    pub fn find_events(&self, name: EventName, windows: &[Window]) -> Vec<&Event> {
        self.history.find_events(name, windows)
    }
    #[must_use]
    pub fn history(&self) -> &History {
        &self.history
    }
    /// Handle `name` events on `window` with `handler`. Replaces whatever was there before.
    pub fn connect(
        &mut self,
        window: Window,
        name: EventName,
        handler: impl FnMut(&Event, Option<&DeviceRecord>) + 'static,
    ) {
        self.registry.connect(window, name, Box::new(handler));
    }
    /// Drop every handler on `window`, eg. when it's destroyed.
    pub fn disconnect(&mut self, window: Window) {
        self.registry.disconnect(window);
    }
}

/// # Devices
impl<S: Server> Bindings<S> {
    /// Re-enumerate devices, replacing the cache that handlers see.
    ///
    /// Without `include_secondary` only master devices are listed. Disabled devices are left out
    /// unless `include_disabled` is set.
    #[allow(clippy::missing_errors_doc)]
    pub fn list_devices(
        &mut self,
        include_secondary: bool,
        include_disabled: bool,
    ) -> Result<Arc<Devices>, InventoryError> {
        let devices = Arc::new(device::query(
            &self.server,
            include_secondary,
            include_disabled,
        )?);
        self.devices = Arc::clone(&devices);
        Ok(devices)
    }
    /// The device cache as of the last [`list_devices`](Self::list_devices). Empty before that.
    #[must_use]
    pub fn devices(&self) -> Arc<Devices> {
        Arc::clone(&self.devices)
    }
    #[must_use]
    pub fn device(&self, id: u16) -> Option<&DeviceRecord> {
        self.devices.get(&id)
    }
    /// Read one property of a device. `Ok(None)` if the device doesn't have it.
    ///
    /// With `requested_type`, the property must be of exactly that type atom.
    #[allow(clippy::missing_errors_doc)]
    pub fn get_property(
        &self,
        deviceid: u16,
        property: Atom,
        requested_type: Option<Atom>,
    ) -> Result<Option<PropertyValue>, PropertyError> {
        device::property::get(&self.server, deviceid, property, requested_type)
    }
    /// Read every property of a device, by name. Ones that can't be read are skipped.
    #[allow(clippy::missing_errors_doc)]
    pub fn get_device_properties(
        &self,
        deviceid: u16,
    ) -> Result<BTreeMap<String, PropertyValue>, PropertyError> {
        Ok(device::property::get_all(&self.server, deviceid)?)
    }
}
