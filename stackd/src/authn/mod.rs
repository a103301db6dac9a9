//! Authentication and authorization

pub mod access;
pub mod context;
pub mod token;
