//! Configuration constants for subprocess transport

/// Default maximum buffer size for JSON messages (1MB)
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 1024 * 1024;

/// Environment variables never forwarded from session configuration
///
/// These affect how the child process loads code.
pub const DANGEROUS_ENV_VARS: &[&str] = &[
    "LD_PRELOAD",
    "LD_LIBRARY_PATH",
    "DYLD_INSERT_LIBRARIES",
    "DYLD_LIBRARY_PATH",
    "PATH",
    "NODE_OPTIONS",
    "PYTHONPATH",
];

/// Grace period for the child to exit after stdin closes
pub const EXIT_GRACE_SECS: u64 = 5;
