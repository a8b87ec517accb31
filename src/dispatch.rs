//! Per-window event handlers.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::device::DeviceRecord;
use crate::events::{Event, EventName};
use crate::server::Window;

/// Called with each decoded event for the window and name it was registered on, along with the
/// cached record of the device that sent it, if the inventory knows it.
pub type Handler = Box<dyn FnMut(&Event, Option<&DeviceRecord>)>;

/// What became of a dispatched event.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Dispatched {
    Handled,
    /// Nobody registered for this window and name.
    NoHandler,
    /// The handler panicked. It stays registered.
    Panicked,
}

/// One handler per `(window, name)` pair. Registering again replaces, there is no fan-out.
#[derive(Default)]
pub struct Registry {
    handlers: HashMap<(Window, EventName), Handler>,
}
impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Closures aren't Debug, show what they're bound to instead.
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}
impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    /// Register `handler`, replacing any previous one for this pair.
    pub fn connect(&mut self, window: Window, name: EventName, handler: Handler) {
        if self.handlers.insert((window, name), handler).is_some() {
            tracing::trace!(window, %name, "replaced handler");
        }
    }
    /// Drop every handler registered on `window`.
    pub fn disconnect(&mut self, window: Window) {
        self.handlers.retain(|&(bound, _), _| bound != window);
    }
    #[must_use]
    pub fn is_connected(&self, window: Window, name: EventName) -> bool {
        self.handlers.contains_key(&(window, name))
    }
    /// Run the handler for this event, if any.
    ///
    /// Handlers run on the event loop's thread, so a panic here would take the loop down with it.
    /// It's caught and logged instead.
    pub fn dispatch(&mut self, event: &Event, device: Option<&DeviceRecord>) -> Dispatched {
        let Some(handler) = self.handlers.get_mut(&(event.window, event.name)) else {
            tracing::trace!(window = event.window, name = %event.name, "no handler");
            return Dispatched::NoHandler;
        };
        match catch_unwind(AssertUnwindSafe(|| handler(event, device))) {
            Ok(()) => Dispatched::Handled,
            Err(_) => {
                tracing::error!(
                    window = event.window,
                    name = %event.name,
                    serial = event.serial,
                    "event handler panicked"
                );
                Dispatched::Panicked
            }
        }
    }
}
