//! Fakes for unit tests: a scripted server and hand-built cookies.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use crate::events::wire::{
    Cookie, DeviceEventWire, GenericEventWire, HierarchyEventWire, Payload, RawEventWire,
    WireHeader,
};
use crate::events::{Event, EventData, EventName};
use crate::server::{
    Atom, DeviceInfo, PropertyData, PropertyReply, Server, ServerError, Version, Window,
};

/// Extension opcode the mock reports. Same as a typical Xorg.
pub(crate) const OPCODE: u8 = 131;
/// Generic event code, the `response_type` of every XI2 event.
const GE_GENERIC: u8 = 35;

/// Atoms the mock knows out of the box.
pub(crate) mod atoms {
    use crate::server::Atom;
    pub const CARDINAL: Atom = 6;
    pub const INTEGER: Atom = 19;
    pub const FLOAT: Atom = 300;
}

/// X error code for `BadAtom`.
const BAD_ATOM: u8 = 5;

#[derive(Debug)]
pub(crate) struct MockServer {
    extension: Option<u8>,
    /// Error side is an X error code.
    version: Result<Version, u8>,
    devices: RefCell<Vec<DeviceInfo>>,
    properties: HashMap<(u16, Atom), Result<PropertyReply, u8>>,
    atoms: HashMap<Atom, String>,

    extension_queries: Cell<usize>,
    version_queries: Cell<usize>,
    device_queries: Cell<usize>,
    flushes: Cell<usize>,
    selections: RefCell<Vec<(Window, u16, Vec<u32>)>>,
    last_property_request: Cell<Option<(u16, Atom, Atom, u32, u32)>>,
}
impl MockServer {
    /// A server with XI 2.4 at opcode [`OPCODE`], no devices.
    pub fn new() -> Self {
        let atoms = [
            (atoms::CARDINAL, "CARDINAL"),
            (atoms::INTEGER, "INTEGER"),
            (atoms::FLOAT, "FLOAT"),
        ]
        .into_iter()
        .map(|(atom, name)| (atom, name.to_owned()))
        .collect();
        Self {
            extension: Some(OPCODE),
            version: Ok(Version::new(2, 4)),
            devices: RefCell::default(),
            properties: HashMap::new(),
            atoms,
            extension_queries: Cell::new(0),
            version_queries: Cell::new(0),
            device_queries: Cell::new(0),
            flushes: Cell::new(0),
            selections: RefCell::default(),
            last_property_request: Cell::new(None),
        }
    }
    pub fn without_extension(mut self) -> Self {
        self.extension = None;
        self
    }
    pub fn with_version(mut self, version: Result<Version, ServerError>) -> Self {
        self.version = version.map_err(|err| match err {
            ServerError::Request { code } => code,
            other => panic!("mock can only fail with X errors, got {other}"),
        });
        self
    }
    pub fn with_device(self, device: DeviceInfo) -> Self {
        self.devices.borrow_mut().push(device);
        self
    }
    /// Swap the device list out from under a live connection.
    pub fn set_devices(&self, devices: Vec<DeviceInfo>) {
        *self.devices.borrow_mut() = devices;
    }
    pub fn with_atom(mut self, atom: Atom, name: &str) -> Self {
        self.atoms.insert(atom, name.to_owned());
        self
    }
    pub fn with_property(mut self, deviceid: u16, property: Atom, reply: PropertyReply) -> Self {
        self.properties.insert((deviceid, property), Ok(reply));
        self
    }
    /// Reading this property fails with X error `code`.
    pub fn with_failing_property(mut self, deviceid: u16, property: Atom, code: u8) -> Self {
        self.properties.insert((deviceid, property), Err(code));
        self
    }

    pub fn extension_queries(&self) -> usize {
        self.extension_queries.get()
    }
    pub fn version_queries(&self) -> usize {
        self.version_queries.get()
    }
    pub fn device_queries(&self) -> usize {
        self.device_queries.get()
    }
    pub fn flushes(&self) -> usize {
        self.flushes.get()
    }
    pub fn selections(&self) -> Vec<(Window, u16, Vec<u32>)> {
        self.selections.borrow().clone()
    }
    pub fn last_property_request(&self) -> Option<(u16, Atom, Atom, u32, u32)> {
        self.last_property_request.get()
    }
}

fn bump(counter: &Cell<usize>) {
    counter.set(counter.get() + 1);
}

impl Server for MockServer {
    fn query_extension(&self) -> Result<Option<u8>, ServerError> {
        bump(&self.extension_queries);
        Ok(self.extension)
    }
    fn query_version(&self, _wanted: Version) -> Result<Version, ServerError> {
        bump(&self.version_queries);
        self.version.map_err(|code| ServerError::Request { code })
    }
    fn select_events(
        &self,
        window: Window,
        deviceid: u16,
        mask: &[u32],
    ) -> Result<(), ServerError> {
        self.selections
            .borrow_mut()
            .push((window, deviceid, mask.to_vec()));
        Ok(())
    }
    fn flush(&self) -> Result<(), ServerError> {
        bump(&self.flushes);
        Ok(())
    }
    fn query_devices(&self, deviceid: u16) -> Result<Vec<DeviceInfo>, ServerError> {
        bump(&self.device_queries);
        let devices = self.devices.borrow();
        Ok(devices
            .iter()
            .filter(|device| match deviceid {
                0 => true,
                // Master pointer or keyboard.
                1 => matches!(device.use_, 1 | 2),
                id => device.deviceid == id,
            })
            .cloned()
            .collect())
    }
    fn list_properties(&self, deviceid: u16) -> Result<Vec<Atom>, ServerError> {
        let mut atoms: Vec<Atom> = self
            .properties
            .keys()
            .filter(|(device, _)| *device == deviceid)
            .map(|&(_, atom)| atom)
            .collect();
        atoms.sort_unstable();
        Ok(atoms)
    }
    fn get_property(
        &self,
        deviceid: u16,
        property: Atom,
        type_: Atom,
        offset: u32,
        len: u32,
    ) -> Result<PropertyReply, ServerError> {
        self.last_property_request
            .set(Some((deviceid, property, type_, offset, len)));
        match self.properties.get(&(deviceid, property)) {
            Some(Ok(reply)) => Ok(reply.clone()),
            Some(Err(code)) => Err(ServerError::Request { code: *code }),
            None => Ok(PropertyReply {
                type_: 0,
                bytes_after: 0,
                data: PropertyData::Data8(vec![]),
            }),
        }
    }
    fn atom_name(&self, atom: Atom) -> Result<Option<String>, ServerError> {
        if atom == 0 {
            return Ok(None);
        }
        self.atoms
            .get(&atom)
            .cloned()
            .map(Some)
            .ok_or(ServerError::Request { code: BAD_ATOM })
    }
}

/// A cookie holding a ready-made payload, counting how often it gets released.
pub(crate) struct MockCookie {
    payload: Option<Payload>,
    frees: usize,
}
impl MockCookie {
    pub fn new(payload: Payload) -> Self {
        Self {
            payload: Some(payload),
            frees: 0,
        }
    }
    /// Header-only payload with no window.
    pub fn generic(event_type: u16, serial: u64) -> Self {
        Self::new(Payload::Generic(generic_wire(event_type, serial, 0)))
    }
    /// A cookie with nothing behind it, like a core event or one already consumed.
    pub fn empty() -> Self {
        Self {
            payload: None,
            frees: 0,
        }
    }
    pub fn frees(&self) -> usize {
        self.frees
    }
}
impl Cookie for MockCookie {
    fn get_data(&mut self) -> Option<Payload> {
        self.payload.take()
    }
    fn free_data(&mut self) {
        self.frees += 1;
    }
}

fn header(event_type: u16, serial: u64) -> WireHeader {
    WireHeader::new(GE_GENERIC, OPCODE, event_type, serial, 1000)
}

/// A header-only decoded event.
pub(crate) fn event(name: EventName, serial: u64, window: Window) -> Event {
    Event {
        name,
        xi_type: name.code(),
        type_code: u32::from(OPCODE) + u32::from(name.code()),
        send_event: false,
        serial,
        time: 1000,
        window,
        data: EventData::Header,
    }
}

/// Device 2 driven by slave 8, on root window 1 with no event or child window.
pub(crate) fn device_wire(name: EventName, serial: u64) -> DeviceEventWire {
    DeviceEventWire {
        header: header(name.code(), serial),
        deviceid: 2,
        sourceid: 8,
        detail: 1,
        root: 1,
        event: 0,
        child: 0,
        root_x: 0,
        root_y: 0,
        event_x: 0,
        event_y: 0,
        flags: 0,
        mods: [0; 4],
        group: [0; 4],
        button_mask: vec![],
        valuator_mask: vec![],
        axisvalues: vec![],
    }
}

pub(crate) fn raw_wire(name: EventName, serial: u64) -> RawEventWire {
    RawEventWire {
        header: header(name.code(), serial),
        deviceid: 2,
        sourceid: 8,
        detail: 0,
        flags: 0,
        valuator_mask: vec![],
        axisvalues: vec![],
        axisvalues_raw: vec![],
    }
}

pub(crate) fn hierarchy_wire(serial: u64, flags: u32) -> HierarchyEventWire {
    HierarchyEventWire {
        header: header(EventName::HierarchyChanged.code(), serial),
        deviceid: 0,
        flags,
    }
}

pub(crate) fn generic_wire(event_type: u16, serial: u64, window: Window) -> GenericEventWire {
    GenericEventWire {
        header: header(event_type, serial),
        window,
    }
}
