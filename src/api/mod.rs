//! The admin REST surface consumed by the console.

pub mod client;

pub use client::{AuthenticatedClient, RequestBody};

pub const TWO_FACTOR_STATUS: &str = "/api/auth/2fa/status";
pub const LOGIN: &str = "/api/login";
pub const ADMIN_CONFIG: &str = "/api/admin/config";
pub const ADMIN_FILES: &str = "/api/admin/files";
pub const ADMIN_FILES_DOWNLOAD: &str = "/api/admin/files/download";
pub const ADMIN_BLACKLIST: &str = "/api/admin/blacklist";
