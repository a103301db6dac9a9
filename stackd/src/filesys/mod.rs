//! Filesystem access

pub mod file;
pub mod project;
