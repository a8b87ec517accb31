//! Builder-style configuration for setting up [`Bindings`] on a connection.
//!
//! For a default configuration, `Builder::new().window(w).build_x11(None)` is all you need!

use crate::events::EventName;
use crate::mask::{DeviceSelector, EventMask, SelectError};
use crate::negotiate::DEFAULT_VERSION;
use crate::server::{Server, ServerError, Version, Window};
use crate::Bindings;

#[derive(thiserror::Error, Debug)]
pub enum BuildError {
    /// The server has no XI2, or only an older version than requested.
    #[error("XI2 unavailable (server offers {version})")]
    Unsupported { version: Version },
    /// The given window handle isn't an X11 window.
    #[error("handle doesn't contain an X11 window")]
    UnsupportedHandle,
    /// Failed to acquire a window handle
    #[error("{:?}", .0)]
    HandleError(raw_window_handle::HandleError),
    #[error(transparent)]
    Select(#[from] SelectError),
    #[error(transparent)]
    Server(#[from] ServerError),
    /// Couldn't open the display.
    #[cfg(xinput2)]
    #[error(transparent)]
    Connect(#[from] x11rb::errors::ConnectError),
}
// #[from] thiserror attribute breaks horribly D:
impl From<raw_window_handle::HandleError> for BuildError {
    fn from(value: raw_window_handle::HandleError) -> Self {
        Self::HandleError(value)
    }
}

/// Pre-construction configuration for [`Bindings`].
#[derive(Clone, Debug)]
pub struct Builder {
    version: Version,
    classes: EventMask,
    selector: DeviceSelector,
    window: Option<Window>,
}
impl Default for Builder {
    fn default() -> Self {
        Self {
            version: DEFAULT_VERSION,
            classes: EventMask::default_classes(),
            selector: DeviceSelector::AllMaster,
            window: None,
        }
    }
}

/// # Configuration
impl Builder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    /// Protocol version to ask for. Defaults to 2.2.
    #[must_use]
    pub fn version(self, major: u16, minor: u16) -> Self {
        Self {
            version: Version::new(major, minor),
            ..self
        }
    }
    /// Replace the set of selected events. Defaults to [`EventMask::default_classes`].
    #[must_use]
    pub fn classes(self, classes: EventMask) -> Self {
        Self { classes, ..self }
    }
    /// Add one event to the selection.
    #[must_use]
    pub fn with_class(self, name: EventName) -> Self {
        Self {
            classes: self.classes.with(name),
            ..self
        }
    }
    /// Which devices to listen to. Defaults to master devices only.
    #[must_use]
    pub fn selector(self, selector: DeviceSelector) -> Self {
        Self { selector, ..self }
    }
    /// Select events on this window during build.
    #[must_use]
    pub fn window(self, window: Window) -> Self {
        Self {
            window: Some(window),
            ..self
        }
    }
    /// Select events on the window behind a raw handle. Only Xlib and Xcb handles are X11 windows.
    #[allow(clippy::missing_errors_doc)]
    pub fn window_handle(
        self,
        handle: raw_window_handle::RawWindowHandle,
    ) -> Result<Self, BuildError> {
        use raw_window_handle::RawWindowHandle;
        let window = match handle {
            // Xlib windows are `unsigned long`, but X IDs only ever use 29 bits.
            RawWindowHandle::Xlib(xlib) => {
                Window::try_from(xlib.window).map_err(|_| BuildError::UnsupportedHandle)?
            }
            RawWindowHandle::Xcb(xcb) => xcb.window.get(),
            _ => return Err(BuildError::UnsupportedHandle),
        };
        Ok(self.window(window))
    }
    /// Select events on a window from a handle carrier, such as a `winit` window.
    #[allow(clippy::missing_errors_doc)]
    pub fn window_from(
        self,
        window: &impl raw_window_handle::HasWindowHandle,
    ) -> Result<Self, BuildError> {
        self.window_handle(window.window_handle()?.as_raw())
    }
}
/// # Finishing
impl Builder {
    /// Set up on an existing connection.
    ///
    /// Negotiates, and if a window was configured, selects events on it and flushes.
    #[allow(clippy::missing_errors_doc)]
    pub fn build_with<S: Server>(self, server: S) -> Result<Bindings<S>, BuildError> {
        let mut bindings = Bindings::new(server);
        let negotiated = bindings.negotiate(self.version.major, self.version.minor);
        if !negotiated.is_supported() {
            return Err(BuildError::Unsupported {
                version: negotiated.version,
            });
        }
        if let Some(window) = self.window {
            bindings.select_events(window, self.selector, &self.classes)?;
            bindings.flush()?;
        }
        Ok(bindings)
    }
    /// Open a connection to `display` (`$DISPLAY` if `None`) and set up on it.
    ///
    /// Without a configured window, events are selected on the root window of the default screen.
    #[cfg(xinput2)]
    #[allow(clippy::missing_errors_doc)]
    pub fn build_x11(
        self,
        display: Option<&str>,
    ) -> Result<Bindings<crate::platform::xinput2::X11Server>, BuildError> {
        let server = crate::platform::xinput2::X11Server::connect(display)?;
        let builder = match (self.window, server.root()) {
            (None, Some(root)) => self.window(root),
            _ => self,
        };
        builder.build_with(server)
    }
}
