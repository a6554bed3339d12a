//! CLI command modules.

pub mod http;
pub mod offer;
pub mod status;
