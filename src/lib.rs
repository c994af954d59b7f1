#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(warnings)]
// Allow some overly strict pedantic lints for middleware code
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

//! Tabletop Platform Service
//!
//! The request pipeline of a board-game community/marketplace platform:
//! a per-request session/security middleware chain (security event
//! detection, auth-cookie refresh, rate-limit circuit breaking) fronting
//! thin REST endpoints that proxy to a hosted backend.

pub mod domain;
pub mod infrastructure;
pub mod presentation;

// Re-export commonly used types
pub use domain::security_event::{SecurityEvent, SecurityEventKind};
pub use domain::session::SessionTokenPair;
