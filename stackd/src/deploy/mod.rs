//! Stack deployment

pub mod command;
pub mod compose;
pub mod engine;
pub mod fsm;
pub mod git;
pub mod names;
pub mod orchestrator;
pub mod policy;
pub mod rollback;
pub mod session;
pub mod source;
