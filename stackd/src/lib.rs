//! stackd library
//!
//! Compose stack deployment control plane: stack sources, name and policy checks,
//! registry credential sessions and the HTTP API in front of them.

pub mod app;
pub mod authn;
pub mod datastore;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod logs;
pub mod models;
pub mod server;
pub mod storage;
pub mod utils;
