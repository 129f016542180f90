//! HTTP handlers.

pub mod files;
pub mod parse;
pub mod system;
