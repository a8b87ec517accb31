//! Event selection masks.
//!
//! XISelectEvents takes one bit per event type. The mask is sized at compile time from the newest
//! event type this crate knows, and a server that could send types past that is refused outright
//! rather than given a silently truncated mask.

use strum::IntoEnumIterator;

use crate::events::EventName;
use crate::negotiate::Negotiated;
use crate::server::{Server, ServerError, Version, Window};

/// Highest event type known at compile time.
pub const XI_LASTEVENT: u16 = EventName::GestureSwipeEnd as u16;
/// Number of `u32` words in an [`EventMask`].
pub const MASK_WORDS: usize = (XI_LASTEVENT as usize / 32) + 1;
/// Number of event types an [`EventMask`] can hold.
pub const MASK_BITS: usize = MASK_WORDS * 32;

const _: () = assert!((XI_LASTEVENT as usize) < MASK_BITS);

#[derive(thiserror::Error, Debug)]
pub enum SelectError {
    /// Negotiation didn't produce a usable opcode.
    #[error("XI2 is not supported on this connection")]
    Unsupported,
    /// The server speaks a protocol whose event types don't fit the mask.
    #[error(
        "XI {version} defines event types up to {}, mask only holds {bound}",
        DisplayLast(.last_event)
    )]
    MaskBound {
        version: Version,
        /// `None` if the version is too new to know.
        last_event: Option<u16>,
        bound: usize,
    },
    #[error(transparent)]
    Server(#[from] ServerError),
}

struct DisplayLast<'a>(&'a Option<u16>);
impl std::fmt::Display for DisplayLast<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self.0 {
            Some(last) => write!(f, "{last}"),
            None => f.write_str("an unknown type"),
        }
    }
}

/// Which devices a selection applies to.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum DeviceSelector {
    /// Every device, masters and slaves.
    All,
    /// Master devices only.
    #[default]
    AllMaster,
    Device(u16),
}
impl DeviceSelector {
    /// The device ID as sent on the wire, where 0 and 1 are the `XIAllDevices` and
    /// `XIAllMasterDevices` wildcards.
    #[must_use]
    pub fn id(self) -> u16 {
        match self {
            Self::All => 0,
            Self::AllMaster => 1,
            Self::Device(id) => id,
        }
    }
}

/// A set of event types to select.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct EventMask([u32; MASK_WORDS]);
impl EventMask {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
    /// The classes a typical client wants. Raw key events aren't among them, add them with
    /// [`with`](Self::with) if needed.
    #[must_use]
    pub fn default_classes() -> Self {
        use EventName as E;
        [
            E::KeyPress,
            E::KeyRelease,
            E::Motion,
            E::HierarchyChanged,
            E::ButtonPress,
            E::ButtonRelease,
            E::RawButtonPress,
            E::RawButtonRelease,
            E::TouchBegin,
            E::TouchUpdate,
            E::TouchEnd,
            E::RawTouchBegin,
            E::RawTouchUpdate,
            E::RawTouchEnd,
            E::RawMotion,
        ]
        .into_iter()
        .collect()
    }
    pub fn set(&mut self, name: EventName) {
        let code = usize::from(name.code());
        self.0[code / 32] |= 1 << (code % 32);
    }
    pub fn unset(&mut self, name: EventName) {
        let code = usize::from(name.code());
        self.0[code / 32] &= !(1 << (code % 32));
    }
    #[must_use]
    pub fn with(mut self, name: EventName) -> Self {
        self.set(name);
        self
    }
    #[must_use]
    pub fn contains(&self, name: EventName) -> bool {
        let code = usize::from(name.code());
        self.0[code / 32] & (1 << (code % 32)) != 0
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|&word| word == 0)
    }
    /// The mask as sent to the server.
    #[must_use]
    pub fn words(&self) -> &[u32] {
        &self.0
    }
    pub fn iter(&self) -> impl Iterator<Item = EventName> + '_ {
        EventName::iter().filter(|&name| self.contains(name))
    }
}
impl FromIterator<EventName> for EventMask {
    fn from_iter<T: IntoIterator<Item = EventName>>(iter: T) -> Self {
        let mut mask = Self::empty();
        for name in iter {
            mask.set(name);
        }
        mask
    }
}

/// Newest event type a protocol version defines. `None` for versions newer than this crate.
#[must_use]
pub fn last_event_type(version: Version) -> Option<u16> {
    match (version.major, version.minor) {
        // 2.0 and 2.1 share a type list, ending at RawMotion.
        (2, 0 | 1) => Some(EventName::RawMotion.code()),
        (2, 2) => Some(EventName::RawTouchEnd.code()),
        (2, 3) => Some(EventName::BarrierLeave.code()),
        (2, 4) => Some(EventName::GestureSwipeEnd.code()),
        _ => None,
    }
}

/// Make sure every event `version` can send fits in `bound` bits.
fn check_bound(version: Version, bound: usize) -> Result<(), SelectError> {
    match last_event_type(version) {
        Some(last) if usize::from(last) < bound => Ok(()),
        last_event => {
            tracing::error!(%version, ?last_event, bound, "event mask too small for protocol");
            Err(SelectError::MaskBound {
                version,
                last_event,
                bound,
            })
        }
    }
}

/// Submit a selection. Nothing is awaited, follow with a flush to be sure it reached the server.
pub(crate) fn select<S: Server + ?Sized>(
    server: &S,
    negotiated: Negotiated,
    window: Window,
    selector: DeviceSelector,
    mask: &EventMask,
) -> Result<(), SelectError> {
    if !negotiated.is_supported() {
        return Err(SelectError::Unsupported);
    }
    check_bound(negotiated.version, MASK_BITS)?;
    tracing::trace!(window, ?selector, ?mask, "selecting events");
    server.select_events(window, selector.id(), mask.words())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockServer;

    #[test]
    fn defaults_skip_raw_keys() {
        let mask = EventMask::default_classes();
        assert_eq!(mask.iter().count(), 15);
        assert!(mask.contains(EventName::RawMotion));
        assert!(mask.contains(EventName::HierarchyChanged));
        assert!(!mask.contains(EventName::RawKeyPress));
        assert!(!mask.contains(EventName::RawKeyRelease));
        assert!(mask.with(EventName::RawKeyPress).contains(EventName::RawKeyPress));
    }

    #[test]
    fn bit_layout() {
        let mask = EventMask::empty()
            .with(EventName::KeyPress)
            .with(EventName::GestureSwipeEnd);
        assert_eq!(mask.words(), &[1 << 2, 1 << 0]);

        let mut mask = mask;
        mask.unset(EventName::GestureSwipeEnd);
        assert_eq!(mask.words(), &[1 << 2, 0]);
        mask.unset(EventName::KeyPress);
        assert!(mask.is_empty());
    }

    #[test]
    fn every_known_version_fits() {
        for minor in 0..=4 {
            assert!(check_bound(Version::new(2, minor), MASK_BITS).is_ok());
        }
        assert_eq!(last_event_type(Version::new(2, 2)), Some(24));
        assert_eq!(last_event_type(Version::new(2, 3)), Some(26));
    }

    #[test]
    fn too_small_or_too_new_is_fatal() {
        // 2.4 defines type 32, which doesn't fit in 32 bits.
        assert!(matches!(
            check_bound(Version::new(2, 4), 32),
            Err(SelectError::MaskBound {
                last_event: Some(32),
                bound: 32,
                ..
            })
        ));
        assert!(matches!(
            check_bound(Version::new(2, 5), MASK_BITS),
            Err(SelectError::MaskBound {
                last_event: None,
                ..
            })
        ));
    }

    #[test]
    fn selects_through_server() {
        let server = MockServer::new();
        let negotiated = Negotiated {
            opcode: 131,
            version: Version::new(2, 2),
        };
        let mask = EventMask::default_classes();
        select(&server, negotiated, 42, DeviceSelector::All, &mask).unwrap();
        assert_eq!(server.selections(), vec![(42, 0, mask.words().to_vec())]);

        assert!(matches!(
            select(&server, Negotiated::UNSUPPORTED, 42, DeviceSelector::All, &mask),
            Err(SelectError::Unsupported)
        ));
        assert_eq!(server.selections().len(), 1);
    }
}
