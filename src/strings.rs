//! Magic strings used by the XI protocol and by this crate's human-readable output.

/// Name of the extension, as passed to `QueryExtension`.
#[cfg_attr(not(xinput2), allow(dead_code))]
pub const EXTENSION_NAME: &str = "XInputExtension";

/// Atom names of the property types we know how to unpack.
pub mod property_type {
    /// Signed, 8/16/32 bit.
    pub const INTEGER: &str = "INTEGER";
    /// Unsigned, 8/16/32 bit.
    pub const CARDINAL: &str = "CARDINAL";
    /// IEEE754 single, 32 bit only.
    pub const FLOAT: &str = "FLOAT";
}

/// Display names of the device uses.
pub mod device_use {
    pub const MASTER_POINTER: &str = "master pointer";
    pub const MASTER_KEYBOARD: &str = "master keyboard";
    pub const SLAVE_POINTER: &str = "slave pointer";
    pub const SLAVE_KEYBOARD: &str = "slave keyboard";
    pub const FLOATING_SLAVE: &str = "floating slave";
    pub const UNKNOWN: &str = "unknown";
}

/// Display names of the device classes.
pub mod class {
    pub const KEY: &str = "key";
    pub const BUTTON: &str = "button";
    pub const VALUATOR: &str = "valuator";
    pub const SCROLL: &str = "scroll";
    pub const TOUCH: &str = "touch";
    pub const UNKNOWN: &str = "unknown";
}
