//! Concrete display connections.
//!
//! Each backend implements [`Server`](crate::server::Server) and provides a
//! [`Cookie`](crate::events::wire::Cookie) type for its events. Backends are compiled in only when
//! their feature is enabled *and* the target can use them.

#[cfg(xinput2)]
pub mod xinput2;
