//! Mirror Console: operator-side controller for the mirror service's admin
//! API.
//!
//! The library holds the session lifecycle, the authenticated HTTP client
//! and one controller per console region. The `mirror-admin` binary drives
//! them from the command line.

pub mod api;
pub mod config;
pub mod console;
pub mod errors;
pub mod models;
pub mod notification;
pub mod session;
pub mod totp;
