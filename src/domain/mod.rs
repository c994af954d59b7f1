//! Domain types for the request pipeline
//!
//! Everything in this module is pure: session token extraction from cookies
//! and security event detection never perform I/O or mutate shared state.

pub mod security_event;
pub mod session;
