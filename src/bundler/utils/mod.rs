//! Shared filesystem and download helpers.

pub mod fs;
pub mod http;
