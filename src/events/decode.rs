//! Wire payload to [`Event`] conversion.
//!
//! The one subtle part is the valuator arrays. The mask says *which* axes reported, and the value
//! array holds only those axes, packed: the n-th set bit owns the n-th value, not the value at the
//! bit's index. Get that wrong and every axis after the first gap reads its neighbour's value.

use super::wire::{
    fixed1616_to_f64, DeviceEventWire, GenericEvent, HierarchyEventWire, Payload, RawEventWire,
    WireHeader,
};
use super::{
    Category, DeviceEvent, Event, EventData, EventFlags, EventName, HierarchyFlags, Modifiers,
    RawEvent, Valuators,
};
use crate::server::Window;

/// Indices of the set bits of an XI mask, lowest first.
///
/// Bit `n` lives in word `n / 32`, at bit `n % 32`. Indices that don't fit a `u16` end the scan, XI
/// numbers its axes and buttons with `u16`s so there's nothing meaningful up there anyway.
pub fn set_bits(mask: &[u32]) -> impl Iterator<Item = u16> + '_ {
    mask.iter()
        .enumerate()
        .flat_map(|(word_idx, &word)| {
            let base = word_idx * u32::BITS as usize;
            let mut remaining = word;
            std::iter::from_fn(move || {
                if remaining == 0 {
                    return None;
                }
                let bit = remaining.trailing_zeros();
                // Clear lowest set bit.
                remaining &= remaining - 1;
                Some(base + bit as usize)
            })
        })
        .map_while(|idx| u16::try_from(idx).ok())
}

fn count_bits(mask: &[u32]) -> usize {
    mask.iter().map(|word| word.count_ones() as usize).sum()
}

/// Resolve the header into a known name and the connection-wide type code.
///
/// Unknown types are logged and dropped. Future servers may well send things we've never heard of.
pub(crate) fn identify(header: &WireHeader, opcode: u8) -> Option<(EventName, u32)> {
    let Some(name) = EventName::from_repr(header.event_type) else {
        tracing::warn!(
            event_type = header.event_type,
            serial = header.serial,
            "unknown XI event type, ignoring"
        );
        return None;
    };
    Some((name, u32::from(opcode) + u32::from(header.event_type)))
}

/// Decode a payload whose header has already been [identified](identify).
pub(crate) fn decode(payload: &Payload, name: EventName, type_code: u32) -> Event {
    let header = payload.header();
    let (window, data) = match (name.category(), payload) {
        (Category::Device, Payload::Device(wire)) => {
            let (window, event) = decode_device(wire);
            (window, EventData::Device(event))
        }
        (Category::Raw, Payload::Raw(wire)) => (0, EventData::Raw(decode_raw(wire))),
        (Category::Hierarchy, Payload::Hierarchy(wire)) => (0, decode_hierarchy(wire)),
        (_, Payload::Generic(wire)) => (wire.window, EventData::Header),
        // Known type, but not something we have a decoder for (or the payload doesn't look like
        // what that type should). Hand out the header, it's still useful for correlation.
        _ => {
            tracing::trace!(%name, "no decoder for payload, keeping header only");
            (0, EventData::Header)
        }
    };

    Event {
        name,
        xi_type: header.event_type,
        type_code,
        send_event: header.send_event,
        serial: header.serial,
        time: header.time,
        window,
        data,
    }
}

/// Zip the packed `values` onto the set bits of `mask`.
fn unpack_valuators(mask: &[u32], values: &[super::wire::Fixed3232]) -> Valuators {
    let expected = count_bits(mask);
    if expected != values.len() {
        tracing::warn!(
            mask_bits = expected,
            values = values.len(),
            "valuator mask and value array disagree"
        );
    }
    set_bits(mask)
        .zip(values)
        .map(|(idx, &value)| (idx, value.to_f64()))
        .collect()
}

fn decode_device(wire: &DeviceEventWire) -> (Window, DeviceEvent) {
    // Most specific window first.
    let window = [wire.child, wire.event, wire.root]
        .into_iter()
        .find(|&window| window != 0)
        .unwrap_or(0);

    let [base, latched, locked, effective] = wire.mods;
    let modifiers = Modifiers {
        base,
        latched,
        locked,
        effective,
    };
    let [base, latched, locked, effective] = wire.group.map(u32::from);
    let group = Modifiers {
        base,
        latched,
        locked,
        effective,
    };

    let event = DeviceEvent {
        device: wire.deviceid,
        source: wire.sourceid,
        detail: wire.detail,
        flags: EventFlags::from_bits_retain(wire.flags),
        root: wire.root,
        event: wire.event,
        child: wire.child,
        root_x: fixed1616_to_f64(wire.root_x),
        root_y: fixed1616_to_f64(wire.root_y),
        x: fixed1616_to_f64(wire.event_x),
        y: fixed1616_to_f64(wire.event_y),
        valuators: unpack_valuators(&wire.valuator_mask, &wire.axisvalues),
        buttons: set_bits(&wire.button_mask).collect(),
        modifiers,
        group,
        state: modifiers.effective,
    };
    tracing::trace!(
        device = event.device,
        detail = event.detail,
        window,
        valuators = event.valuators.len(),
        buttons = event.buttons.len(),
        "decoded device event"
    );
    (window, event)
}

fn decode_raw(wire: &RawEventWire) -> RawEvent {
    let expected = count_bits(&wire.valuator_mask);
    if expected != wire.axisvalues.len() || expected != wire.axisvalues_raw.len() {
        tracing::warn!(
            mask_bits = expected,
            values = wire.axisvalues.len(),
            raw_values = wire.axisvalues_raw.len(),
            "raw valuator mask and value arrays disagree"
        );
    }

    // Both arrays are packed against the same mask, walk them together so the keys can't diverge.
    let mut valuators = Valuators::new();
    let mut raw_valuators = Valuators::new();
    for (idx, (value, raw)) in set_bits(&wire.valuator_mask)
        .zip(wire.axisvalues.iter().zip(&wire.axisvalues_raw))
    {
        valuators.insert(idx, value.to_f64());
        raw_valuators.insert(idx, raw.to_f64());
    }

    RawEvent {
        device: wire.deviceid,
        source: wire.sourceid,
        detail: wire.detail,
        flags: EventFlags::from_bits_retain(wire.flags),
        valuators,
        raw_valuators,
    }
}

fn decode_hierarchy(wire: &HierarchyEventWire) -> EventData {
    EventData::Hierarchy {
        flags: HierarchyFlags::from_bits_retain(wire.flags),
    }
}
