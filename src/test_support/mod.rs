//! Helpers shared by unit tests.

// Same guard the integration tests use.
#[path = "../../tests/support/socket_guard.rs"]
pub(crate) mod socket_guard;
