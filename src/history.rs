//! The last few decoded events, newest last.
//!
//! Used to drop duplicate deliveries (the server sometimes hands out the same cookie twice) and to
//! let callers correlate events after the fact, eg. "which motion burst did this button press
//! end?".

use std::collections::VecDeque;

use crate::events::{Event, EventName};
use crate::server::Window;

/// How many events are remembered.
pub const HISTORY_CAPACITY: usize = 100;

/// Fixed-capacity ring of decoded events, in arrival order.
///
/// Since the server hands out serials in non-decreasing order, serials are non-increasing when
/// scanned from the newest end. The lookups rely on that.
#[derive(Debug)]
pub struct History {
    events: VecDeque<Event>,
}
impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}
impl History {
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: VecDeque::with_capacity(HISTORY_CAPACITY),
        }
    }
    /// Record an event, evicting the oldest if full.
    pub fn push(&mut self, event: Event) {
        if self.events.len() == HISTORY_CAPACITY {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }
    #[must_use]
    pub fn newest(&self) -> Option<&Event> {
        self.events.back()
    }
    /// True if `type_code`/`serial` is exactly the newest recorded event, ie. a redelivery.
    #[must_use]
    pub fn is_duplicate(&self, type_code: u32, serial: u64) -> bool {
        self.newest()
            .is_some_and(|last| last.type_code == type_code && last.serial == serial)
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
    /// Oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Event> + ExactSizeIterator {
        self.events.iter()
    }
    pub fn clear(&mut self) {
        self.events.clear();
    }
    /// Find the event called `name` with the given serial.
    ///
    /// Scans newest to oldest and gives up at the first event older than `serial`, since nothing
    /// past it can match if the ordering holds. If the ordering *doesn't* hold, that's still the
    /// answer: `None`, no guessing.
    #[must_use]
    pub fn find_event(&self, name: EventName, serial: u64) -> Option<&Event> {
        for event in self.events.iter().rev() {
            if event.serial < serial {
                return None;
            }
            if event.serial == serial && event.name == name {
                return Some(event);
            }
        }
        None
    }
    /// The most recent unbroken run of `name` events on a single window from `windows`, newest
    /// first.
    ///
    /// The window is pinned by the first (newest) match, the run ends at the first event that
    /// doesn't match.
    #[must_use]
    pub fn find_events(&self, name: EventName, windows: &[Window]) -> Vec<&Event> {
        let mut pinned: Option<Window> = None;
        let mut run = vec![];
        for event in self.events.iter().rev() {
            let matches = event.name == name
                && windows.contains(&event.window)
                && pinned.map_or(true, |window| window == event.window);
            if matches {
                pinned.get_or_insert(event.window);
                run.push(event);
            } else if pinned.is_some() {
                break;
            }
        }
        run
    }
}
