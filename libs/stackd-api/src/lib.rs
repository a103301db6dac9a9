//! Wire models for the stackd HTTP API.

pub mod models;

pub use models::*;
