pub mod client;
pub mod guard;

pub use client::{BackendClient, BackendError, Filter};
pub use guard::{is_rate_limit_signature, RateLimitGuard};
