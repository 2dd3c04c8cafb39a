// Re-export internals for use under the ideawheel_server crate namespace
// Mainly for use in tests
pub mod auth;
pub mod config;
pub mod context;
pub mod crypto;
pub mod csrf;
pub mod db;
pub mod error;
pub mod modules;
pub mod request_scope;
pub mod session;
pub mod util;
