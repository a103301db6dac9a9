//! Domain models

pub mod endpoint;
pub mod registry;
pub mod resource_control;
pub mod stack;
pub mod user;
