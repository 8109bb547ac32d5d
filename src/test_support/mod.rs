//! Helpers shared by unit and integration tests.

pub mod socket_guard;
