//! Transport layer for communicating with the agent CLI
//!
//! This module provides the transport abstraction and the subprocess
//! implementation used by the CLI backend.

pub mod subprocess;

use tokio::sync::mpsc;

use crate::error::Result;

/// Transport trait for communicating with an agent process
pub trait Transport: Send + Sync {
    /// Connect to the transport
    ///
    /// # Errors
    /// Returns error if connection fails
    fn connect(&mut self) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Write data to the transport
    ///
    /// # Arguments
    /// * `data` - String data to write (typically one JSON line)
    ///
    /// # Errors
    /// Returns error if write fails or transport is not ready
    fn write(&mut self, data: &str) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Read messages from the transport
    ///
    /// Returns a receiver fed by a background task, so writes never wait on
    /// reads. The receiver closes when the transport ends.
    fn read_messages(&mut self) -> mpsc::UnboundedReceiver<Result<serde_json::Value>>;

    /// Check if transport is ready for communication
    fn is_ready(&self) -> bool;

    /// Close the transport and clean up resources
    ///
    /// # Errors
    /// Returns error if cleanup fails
    fn close(&mut self) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub use subprocess::{CommandBuilder, SubprocessTransport};
