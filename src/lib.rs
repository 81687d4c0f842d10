pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod devcontainer;
pub mod docker;
pub mod envfiles;
pub mod error;
pub mod identity;
pub mod orchestrator;
pub mod proxy;
pub mod store;
pub mod ui;
pub mod worktree;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, Result};
