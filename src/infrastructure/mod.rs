pub mod auth;
pub mod backend;
pub mod config;
pub mod http;
