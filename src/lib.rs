//! Oracle node: bootstrap sequencer and local node commands.
//!
//! The binary in `main.rs` is a thin clap front end over [`bootstrap::Client`].

pub mod app;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod logger;
pub mod orm_log;
pub mod prompt;

#[cfg(test)]
mod testing;
