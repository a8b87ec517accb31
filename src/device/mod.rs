//! # Devices
//!
//! A snapshot of the input devices the server knows about, as reported by XIQueryDevice. Each
//! [`DeviceRecord`] lists the device's capability [classes](ClassInfo) and, if they could be
//! read, its properties.
//!
//! Devices come in two layers. *Master* devices are the virtual pointer/keyboard pairs that
//! drive the cursor and focus, and *slave* devices are the physical hardware attached to them.
//! A slave may also be *floating*, in which case it drives nothing at all.
//!
//! The snapshot is only refreshed on request, see
//! [`Bindings::list_devices`](crate::Bindings::list_devices).

use std::collections::BTreeMap;

use smallvec::SmallVec;

use crate::events::set_bits;
use crate::mask::DeviceSelector;
use crate::server::{Atom, ClassData, DeviceClass, DeviceInfo, Server, ServerError};
use crate::strings;

pub mod property;

pub use property::{Number, PropertyError, PropertyValue, PROPERTY_BUFFER_SIZE};

/// Every cached device, by ID.
pub type Devices = BTreeMap<u16, DeviceRecord>;

#[derive(thiserror::Error, Debug)]
pub enum InventoryError {
    #[error(transparent)]
    Server(#[from] ServerError),
}

/// The role a device plays in the master/slave hierarchy.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DeviceUse {
    MasterPointer,
    MasterKeyboard,
    SlavePointer,
    SlaveKeyboard,
    FloatingSlave,
    /// A use code newer than this crate.
    Unknown(u16),
}
impl DeviceUse {
    /// From the `XIMasterPointer`..`XIFloatingSlave` protocol codes.
    #[must_use]
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => Self::MasterPointer,
            2 => Self::MasterKeyboard,
            3 => Self::SlavePointer,
            4 => Self::SlaveKeyboard,
            5 => Self::FloatingSlave,
            other => Self::Unknown(other),
        }
    }
    #[must_use]
    pub fn is_master(self) -> bool {
        matches!(self, Self::MasterPointer | Self::MasterKeyboard)
    }
    #[must_use]
    pub fn as_str(self) -> &'static str {
        use strings::device_use as s;
        match self {
            Self::MasterPointer => s::MASTER_POINTER,
            Self::MasterKeyboard => s::MASTER_KEYBOARD,
            Self::SlavePointer => s::SLAVE_POINTER,
            Self::SlaveKeyboard => s::SLAVE_KEYBOARD,
            Self::FloatingSlave => s::FLOATING_SLAVE,
            Self::Unknown(_) => s::UNKNOWN,
        }
    }
}
impl std::fmt::Display for DeviceUse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a valuator reports its value.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ValuatorMode {
    /// Deltas, eg. a mouse.
    Relative,
    /// Positions within `min..=max`, eg. a tablet.
    Absolute,
    Unknown(u8),
}
impl From<u8> for ValuatorMode {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Relative,
            1 => Self::Absolute,
            other => Self::Unknown(other),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ScrollType {
    Vertical,
    Horizontal,
    Unknown(u16),
}
impl From<u16> for ScrollType {
    fn from(value: u16) -> Self {
        match value {
            1 => Self::Vertical,
            2 => Self::Horizontal,
            other => Self::Unknown(other),
        }
    }
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
    pub struct ScrollFlags: u32 {
        /// The server won't emulate button 4-7 presses for this axis.
        const NO_EMULATION = 1;
        /// This is the preferred axis for its direction.
        const PREFERRED = 2;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TouchMode {
    /// Touchscreen, touches land where they're made.
    Direct,
    /// Touchpad, touches go where the pointer is.
    Dependent,
    Unknown(u8),
}
impl From<u8> for TouchMode {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Direct,
            2 => Self::Dependent,
            other => Self::Unknown(other),
        }
    }
}

/// One capability class of a device. `source` is the device the class originates from, which
/// for master devices is the slave that last drove them.
#[derive(Clone, Debug, PartialEq)]
pub enum ClassInfo {
    Button {
        source: u16,
        /// Label of each button, by index. `None` where unlabeled.
        labels: Vec<Option<String>>,
        /// Indices of buttons currently held.
        pressed: SmallVec<[u16; 8]>,
    },
    Key {
        source: u16,
        keycodes: Vec<u32>,
    },
    Valuator {
        source: u16,
        /// Axis number, the key this valuator shows up under in events.
        number: u16,
        label: Option<String>,
        min: f64,
        max: f64,
        value: f64,
        /// Units per meter.
        resolution: u32,
        mode: ValuatorMode,
    },
    Scroll {
        source: u16,
        /// The valuator this scroll axis rides on.
        number: u16,
        scroll_type: ScrollType,
        /// Valuator delta that makes up one scroll "click".
        increment: f64,
        flags: ScrollFlags,
    },
    Touch {
        source: u16,
        mode: TouchMode,
        /// Most simultaneous touches, zero if unknown.
        num_touches: u8,
    },
    /// Kept so class indices stay aligned with the server's.
    Unknown { source: u16, class_type: u16 },
}
impl ClassInfo {
    #[must_use]
    pub fn source(&self) -> u16 {
        match self {
            Self::Button { source, .. }
            | Self::Key { source, .. }
            | Self::Valuator { source, .. }
            | Self::Scroll { source, .. }
            | Self::Touch { source, .. }
            | Self::Unknown { source, .. } => *source,
        }
    }
    /// Human readable class name.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        use strings::class as s;
        match self {
            Self::Button { .. } => s::BUTTON,
            Self::Key { .. } => s::KEY,
            Self::Valuator { .. } => s::VALUATOR,
            Self::Scroll { .. } => s::SCROLL,
            Self::Touch { .. } => s::TOUCH,
            Self::Unknown { .. } => s::UNKNOWN,
        }
    }
}

/// Everything known about one device.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceRecord {
    pub id: u16,
    pub name: String,
    pub use_: DeviceUse,
    /// For masters, the paired master. For attached slaves, their master. Otherwise meaningless.
    pub attachment: u16,
    pub enabled: bool,
    /// By position in the server's class list.
    pub classes: BTreeMap<usize, ClassInfo>,
    /// `None` if the property list itself couldn't be read.
    pub properties: Option<BTreeMap<String, PropertyValue>>,
}
impl DeviceRecord {
    pub fn valuators(&self) -> impl Iterator<Item = &ClassInfo> {
        self.classes
            .values()
            .filter(|class| matches!(class, ClassInfo::Valuator { .. }))
    }
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.as_ref()?.get(name)
    }
}

/// Query the server and build a fresh snapshot.
pub(crate) fn query<S: Server + ?Sized>(
    server: &S,
    include_secondary: bool,
    include_disabled: bool,
) -> Result<Devices, InventoryError> {
    let selector = if include_secondary {
        DeviceSelector::All
    } else {
        DeviceSelector::AllMaster
    };
    let mut devices = Devices::new();
    for info in server.query_devices(selector.id())? {
        if !info.enabled && !include_disabled {
            continue;
        }
        let record = build_record(server, info);
        devices.insert(record.id, record);
    }
    Ok(devices)
}

fn build_record<S: Server + ?Sized>(server: &S, info: DeviceInfo) -> DeviceRecord {
    let classes = info
        .classes
        .iter()
        .enumerate()
        .map(|(idx, class)| (idx, build_class(server, info.deviceid, class)))
        .collect();
    let properties = match property::get_all(server, info.deviceid) {
        Ok(properties) => Some(properties),
        Err(err) => {
            tracing::debug!(deviceid = info.deviceid, %err, "couldn't list properties");
            None
        }
    };
    DeviceRecord {
        id: info.deviceid,
        name: String::from_utf8_lossy(&info.name).into_owned(),
        use_: DeviceUse::from_code(info.use_),
        attachment: info.attachment,
        enabled: info.enabled,
        classes,
        properties,
    }
}

fn build_class<S: Server + ?Sized>(
    server: &S,
    deviceid: u16,
    class: &DeviceClass,
) -> ClassInfo {
    let source = class.sourceid;
    match &class.data {
        ClassData::Button { state, labels } => ClassInfo::Button {
            source,
            labels: labels.iter().map(|&atom| label(server, atom)).collect(),
            pressed: set_bits(state).collect(),
        },
        ClassData::Key { keycodes } => ClassInfo::Key {
            source,
            keycodes: keycodes.clone(),
        },
        ClassData::Valuator {
            number,
            label: atom,
            min,
            max,
            value,
            resolution,
            mode,
        } => ClassInfo::Valuator {
            source,
            number: *number,
            label: label(server, *atom),
            min: min.to_f64(),
            max: max.to_f64(),
            value: value.to_f64(),
            resolution: *resolution,
            mode: (*mode).into(),
        },
        ClassData::Scroll {
            number,
            scroll_type,
            flags,
            increment,
        } => ClassInfo::Scroll {
            source,
            number: *number,
            scroll_type: (*scroll_type).into(),
            increment: increment.to_f64(),
            flags: ScrollFlags::from_bits_retain(*flags),
        },
        ClassData::Touch { mode, num_touches } => ClassInfo::Touch {
            source,
            mode: (*mode).into(),
            num_touches: *num_touches,
        },
        ClassData::Unknown { class_type } => {
            tracing::warn!(deviceid, class_type, "unknown device class");
            ClassInfo::Unknown {
                source,
                class_type: *class_type,
            }
        }
    }
}

/// Name of a label atom. A label that can't be resolved is treated as no label.
fn label<S: Server + ?Sized>(server: &S, atom: Atom) -> Option<String> {
    if atom == 0 {
        return None;
    }
    match server.atom_name(atom) {
        Ok(name) => name,
        Err(err) => {
            tracing::debug!(atom, %err, "couldn't resolve label");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::wire::Fixed3232;
    use crate::testing::MockServer;

    fn pointer(deviceid: u16, use_: u16, enabled: bool) -> DeviceInfo {
        DeviceInfo {
            deviceid,
            use_,
            attachment: 3,
            enabled,
            name: format!("device {deviceid}").into_bytes(),
            classes: vec![
                DeviceClass {
                    sourceid: deviceid,
                    data: ClassData::Button {
                        state: vec![0b100],
                        labels: vec![400, 0, 401],
                    },
                },
                DeviceClass {
                    sourceid: deviceid,
                    data: ClassData::Valuator {
                        number: 0,
                        label: 402,
                        min: Fixed3232::from_int(0),
                        max: Fixed3232::from_int(1920),
                        value: Fixed3232 {
                            integral: 10,
                            frac: 1 << 31,
                        },
                        resolution: 1,
                        mode: 1,
                    },
                },
                DeviceClass {
                    sourceid: deviceid,
                    data: ClassData::Unknown { class_type: 99 },
                },
            ],
        }
    }

    fn server() -> MockServer {
        MockServer::new()
            .with_atom(400, "Button Left")
            .with_atom(401, "Button Right")
            .with_atom(402, "Abs X")
            .with_device(pointer(2, 1, true))
            .with_device(pointer(8, 3, true))
            .with_device(pointer(9, 5, false))
    }

    #[test]
    fn classes_are_decoded() {
        let devices = query(&server(), false, false).unwrap();
        let record = &devices[&2];
        assert_eq!(record.name, "device 2");
        assert_eq!(record.use_, DeviceUse::MasterPointer);
        assert_eq!(record.classes.len(), 3);
        assert_eq!(
            record.classes[&0],
            ClassInfo::Button {
                source: 2,
                labels: vec![
                    Some("Button Left".to_owned()),
                    None,
                    Some("Button Right".to_owned())
                ],
                pressed: SmallVec::from_slice(&[2]),
            }
        );
        let ClassInfo::Valuator {
            label, value, max, mode, ..
        } = &record.classes[&1]
        else {
            panic!("expected a valuator, got {:?}", record.classes[&1]);
        };
        assert_eq!(label.as_deref(), Some("Abs X"));
        assert!((value - 10.5).abs() < f64::EPSILON);
        assert!((max - 1920.0).abs() < f64::EPSILON);
        assert_eq!(*mode, ValuatorMode::Absolute);
        assert_eq!(
            record.classes[&2],
            ClassInfo::Unknown {
                source: 2,
                class_type: 99
            }
        );
        assert_eq!(record.valuators().count(), 1);
    }

    #[test]
    fn selector_and_filter() {
        let server = server();
        // The mock filters by selector like a real server would.
        let masters = query(&server, false, true).unwrap();
        assert_eq!(masters.keys().copied().collect::<Vec<_>>(), vec![2]);

        let enabled = query(&server, true, false).unwrap();
        assert_eq!(enabled.keys().copied().collect::<Vec<_>>(), vec![2, 8]);

        let everything = query(&server, true, true).unwrap();
        assert_eq!(everything.keys().copied().collect::<Vec<_>>(), vec![2, 8, 9]);
        assert_eq!(everything[&9].use_, DeviceUse::FloatingSlave);
    }

    #[test]
    fn unresolvable_label_is_unlabeled() {
        let mut info = pointer(2, 1, true);
        info.classes.truncate(1);
        // No atom 400 on this server.
        let server = MockServer::new().with_atom(401, "Button Right").with_device(info);
        let devices = query(&server, false, false).unwrap();
        let ClassInfo::Button { labels, .. } = &devices[&2].classes[&0] else {
            panic!("expected buttons");
        };
        assert_eq!(labels, &vec![None, None, Some("Button Right".to_owned())]);
    }

    #[test]
    fn use_codes() {
        assert!(DeviceUse::from_code(2).is_master());
        assert!(!DeviceUse::from_code(4).is_master());
        assert_eq!(DeviceUse::from_code(17), DeviceUse::Unknown(17));
        assert_eq!(DeviceUse::SlaveKeyboard.to_string(), "slave keyboard");
    }
}
