//! Subprocess transport implementation using the agent CLI
//!
//! Spawns the CLI as a child process and talks line-delimited JSON over its
//! stdin/stdout.

mod command;
mod config;
mod lifecycle;
mod reader;
mod transport;

pub use command::CommandBuilder;
pub use transport::SubprocessTransport;
