//! Middleware modules for HTTP request processing
//!
//! The per-request pipeline of the platform service:
//! - Security event detection (pure inspection, logged and forgotten)
//! - Session refresh against the auth provider, with cookie rewriting
//! - Global error taxonomy and response shaping

pub mod error;
pub mod session;

// Re-export commonly used types
pub use error::{AppError, ErrorResponse};
pub use session::{is_excluded_path, pipeline_middleware, refresh_session_cookies, CookieChanges};
