//! Decoded XI2 events.
//!
//! An [`Event`] is what a cookie becomes after going through the decoder: every field the protocol
//! sent, with the packed valuator arrays unpacked into sparse maps and fixed-point values turned
//! into floats. The shape of the variable part depends on the event's category, see [`EventData`].

use std::collections::BTreeMap;

use smallvec::SmallVec;

use crate::server::Window;

pub(crate) mod decode;
pub mod wire;

pub use decode::set_bits;

/// Every event type the input extension defines, up to XI 2.4, by their `XI_*` protocol names.
///
/// Discriminants are the extension-relative type codes.
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::FromRepr,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
    strum::EnumIter,
    strum::EnumCount,
)]
#[repr(u16)]
pub enum EventName {
    #[strum(serialize = "XI_DeviceChanged")]
    DeviceChanged = 1,
    #[strum(serialize = "XI_KeyPress")]
    KeyPress = 2,
    #[strum(serialize = "XI_KeyRelease")]
    KeyRelease = 3,
    #[strum(serialize = "XI_ButtonPress")]
    ButtonPress = 4,
    #[strum(serialize = "XI_ButtonRelease")]
    ButtonRelease = 5,
    #[strum(serialize = "XI_Motion")]
    Motion = 6,
    #[strum(serialize = "XI_Enter")]
    Enter = 7,
    #[strum(serialize = "XI_Leave")]
    Leave = 8,
    #[strum(serialize = "XI_FocusIn")]
    FocusIn = 9,
    #[strum(serialize = "XI_FocusOut")]
    FocusOut = 10,
    #[strum(serialize = "XI_HierarchyChanged")]
    HierarchyChanged = 11,
    #[strum(serialize = "XI_PropertyEvent")]
    PropertyEvent = 12,
    #[strum(serialize = "XI_RawKeyPress")]
    RawKeyPress = 13,
    #[strum(serialize = "XI_RawKeyRelease")]
    RawKeyRelease = 14,
    #[strum(serialize = "XI_RawButtonPress")]
    RawButtonPress = 15,
    #[strum(serialize = "XI_RawButtonRelease")]
    RawButtonRelease = 16,
    #[strum(serialize = "XI_RawMotion")]
    RawMotion = 17,
    #[strum(serialize = "XI_TouchBegin")]
    TouchBegin = 18,
    #[strum(serialize = "XI_TouchUpdate")]
    TouchUpdate = 19,
    #[strum(serialize = "XI_TouchEnd")]
    TouchEnd = 20,
    #[strum(serialize = "XI_TouchOwnership")]
    TouchOwnership = 21,
    #[strum(serialize = "XI_RawTouchBegin")]
    RawTouchBegin = 22,
    #[strum(serialize = "XI_RawTouchUpdate")]
    RawTouchUpdate = 23,
    #[strum(serialize = "XI_RawTouchEnd")]
    RawTouchEnd = 24,
    #[strum(serialize = "XI_BarrierHit")]
    BarrierHit = 25,
    #[strum(serialize = "XI_BarrierLeave")]
    BarrierLeave = 26,
    #[strum(serialize = "XI_GesturePinchBegin")]
    GesturePinchBegin = 27,
    #[strum(serialize = "XI_GesturePinchUpdate")]
    GesturePinchUpdate = 28,
    #[strum(serialize = "XI_GesturePinchEnd")]
    GesturePinchEnd = 29,
    #[strum(serialize = "XI_GestureSwipeBegin")]
    GestureSwipeBegin = 30,
    #[strum(serialize = "XI_GestureSwipeUpdate")]
    GestureSwipeUpdate = 31,
    #[strum(serialize = "XI_GestureSwipeEnd")]
    GestureSwipeEnd = 32,
}

/// Which payload shape an event type decodes into.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Category {
    Device,
    Raw,
    Hierarchy,
    /// Known, but only the header is decoded.
    Other,
}

impl EventName {
    /// Extension-relative type code.
    #[must_use]
    pub fn code(self) -> u16 {
        self as u16
    }
    #[must_use]
    pub fn category(self) -> Category {
        match self {
            Self::KeyPress
            | Self::KeyRelease
            | Self::ButtonPress
            | Self::ButtonRelease
            | Self::Motion
            | Self::TouchBegin
            | Self::TouchUpdate
            | Self::TouchEnd => Category::Device,
            Self::RawKeyPress
            | Self::RawKeyRelease
            | Self::RawButtonPress
            | Self::RawButtonRelease
            | Self::RawMotion
            | Self::RawTouchBegin
            | Self::RawTouchUpdate
            | Self::RawTouchEnd => Category::Raw,
            Self::HierarchyChanged => Category::Hierarchy,
            _ => Category::Other,
        }
    }
}

bitflags::bitflags! {
    /// Per-event flags of device and raw events. The same bits mean different things depending
    /// on the event type, hence the aliases.
    #[derive(Clone, Copy, Default, Debug, PartialEq, Eq, Hash)]
    pub struct EventFlags: u32 {
        /// Key events: this is an autorepeat.
        const KEY_REPEAT = 1 << 16;
        /// Button/motion events: emulated from another device class (eg. touch or smooth scroll).
        const POINTER_EMULATED = 1 << 16;
        /// Touch events: the touch has ended but ownership is unresolved.
        const TOUCH_PENDING_END = 1 << 16;
        /// Touch events: this touch also drives the pointer.
        const TOUCH_EMULATING_POINTER = 1 << 17;
    }
}

bitflags::bitflags! {
    /// What happened in a hierarchy change.
    #[derive(Clone, Copy, Default, Debug, PartialEq, Eq, Hash)]
    pub struct HierarchyFlags: u32 {
        const MASTER_ADDED = 1 << 0;
        const MASTER_REMOVED = 1 << 1;
        const SLAVE_ADDED = 1 << 2;
        const SLAVE_REMOVED = 1 << 3;
        const SLAVE_ATTACHED = 1 << 4;
        const SLAVE_DETACHED = 1 << 5;
        const DEVICE_ENABLED = 1 << 6;
        const DEVICE_DISABLED = 1 << 7;
    }
}

/// The four faces of the modifier (or group) state, as XKB reports them.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    pub base: u32,
    pub latched: u32,
    pub locked: u32,
    pub effective: u32,
}

/// Sparse axis values, indexed by valuator number.
pub type Valuators = BTreeMap<u16, f64>;

/// Payload of key, button, motion and touch events.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceEvent {
    /// The device the event was delivered for, often a master.
    pub device: u16,
    /// The physical device that caused it.
    pub source: u16,
    /// Keycode, button number or touch ID, depending on the type.
    pub detail: u32,
    pub flags: EventFlags,
    pub root: Window,
    pub event: Window,
    pub child: Window,
    pub root_x: f64,
    pub root_y: f64,
    /// Relative to `event`.
    pub x: f64,
    pub y: f64,
    pub valuators: Valuators,
    /// Buttons held at the time of the event, by button number.
    pub buttons: SmallVec<[u16; 8]>,
    pub modifiers: Modifiers,
    pub group: Modifiers,
    /// Same as `modifiers.effective`, for consumers used to core-protocol `state`.
    pub state: u32,
}

/// Payload of raw events.
#[derive(Clone, Debug, PartialEq)]
pub struct RawEvent {
    pub device: u16,
    pub source: u16,
    pub detail: u32,
    pub flags: EventFlags,
    /// Values after acceleration.
    pub valuators: Valuators,
    /// Values as the device sent them. Always the same keys as `valuators`.
    pub raw_valuators: Valuators,
}

/// The category-specific part of an [`Event`].
#[derive(Clone, Debug, PartialEq)]
pub enum EventData {
    Device(DeviceEvent),
    Raw(RawEvent),
    Hierarchy { flags: HierarchyFlags },
    /// A type this crate knows the name of, but doesn't decode further.
    Header,
}

/// One decoded XI2 event.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub name: EventName,
    /// Extension-relative type code.
    pub xi_type: u16,
    /// `xi_type` plus the extension opcode, unique across the connection.
    pub type_code: u32,
    /// Came from `SendEvent` rather than the server.
    pub send_event: bool,
    pub serial: u64,
    pub time: u32,
    /// The window this event is about. Zero for events that aren't window-scoped, like raw and
    /// hierarchy events.
    pub window: Window,
    pub data: EventData,
}
impl Event {
    /// The device the event was delivered for, if it carries one.
    #[must_use]
    pub fn device(&self) -> Option<u16> {
        match &self.data {
            EventData::Device(d) => Some(d.device),
            EventData::Raw(r) => Some(r.device),
            EventData::Hierarchy { .. } | EventData::Header => None,
        }
    }
    #[must_use]
    pub fn as_device(&self) -> Option<&DeviceEvent> {
        match &self.data {
            EventData::Device(d) => Some(d),
            _ => None,
        }
    }
    #[must_use]
    pub fn as_raw(&self) -> Option<&RawEvent> {
        match &self.data {
            EventData::Raw(r) => Some(r),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn names_match_protocol() {
        assert_eq!(EventName::KeyPress.to_string(), "XI_KeyPress");
        assert_eq!(
            "XI_HierarchyChanged".parse::<EventName>().unwrap(),
            EventName::HierarchyChanged
        );
        assert_eq!(EventName::from_repr(17), Some(EventName::RawMotion));
        assert_eq!(EventName::from_repr(0), None);
        assert_eq!(EventName::from_repr(33), None);
    }

    #[test]
    fn codes_are_contiguous() {
        for (idx, name) in EventName::iter().enumerate() {
            assert_eq!(usize::from(name.code()), idx + 1);
        }
    }

    #[test]
    fn categories() {
        assert_eq!(EventName::Motion.category(), Category::Device);
        assert_eq!(EventName::TouchEnd.category(), Category::Device);
        assert_eq!(EventName::RawKeyRelease.category(), Category::Raw);
        assert_eq!(EventName::HierarchyChanged.category(), Category::Hierarchy);
        assert_eq!(EventName::DeviceChanged.category(), Category::Other);
        assert_eq!(EventName::TouchOwnership.category(), Category::Other);
    }
}
