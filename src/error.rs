//! Error types for the agent gateway

use thiserror::Error;

/// Main error type for the agent gateway
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Session is not registered (or has no live agent handle)
    #[error("Session {0} not found")]
    SessionNotFound(String),

    /// Permission request is unknown, already resolved or expired
    #[error("Permission request {0} not found")]
    PermissionRequestNotFound(String),

    /// Concurrent session limit reached
    #[error("Maximum concurrent sessions ({0}) reached")]
    CapacityExceeded(usize),

    /// Identifier collides with a live session or agent handle
    #[error("Session {0} already exists")]
    AlreadyExists(String),

    /// Backend agent could not be started
    #[error("Failed to create agent: {0}")]
    AgentCreationFailed(String),

    /// Backend misbehaved while streaming a response
    #[error("Error processing response: {0}")]
    StreamFailure(String),

    /// Client credentials missing or wrong
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Storage service call failed
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Agent CLI not found or not installed
    #[error("Claude Code CLI not found: {0}")]
    CliNotFound(String),

    /// Connection error when communicating with the agent CLI
    #[error("Connection error: {0}")]
    Connection(String),

    /// Process execution error with exit code and stderr
    #[error("Process error (exit code {exit_code}): {message}")]
    Process {
        /// Error message
        message: String,
        /// Process exit code
        exit_code: i32,
        /// Standard error output
        stderr: Option<String>,
    },

    /// JSON decode error
    #[error("JSON decode error: {0}")]
    JsonDecode(#[from] serde_json::Error),

    /// Message parse error with optional raw data
    #[error("Message parse error: {message}")]
    MessageParse {
        /// Error message
        message: String,
        /// Raw message data that failed to parse
        data: Option<serde_json::Value>,
    },

    /// Transport layer error
    #[error("Transport error: {0}")]
    Transport(String),

    /// Control protocol error
    #[error("Control protocol error: {0}")]
    ControlProtocol(String),

    /// Hook execution error
    #[error("Hook error: {0}")]
    Hook(String),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Timeout error
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

impl GatewayError {
    /// Create a CLI not found error
    #[must_use]
    pub fn cli_not_found() -> Self {
        Self::CliNotFound(
            "Claude Code not found. Install with:\n\
             npm install -g @anthropic-ai/claude-code\n\
             \n\
             Or set AGENT_SERVER_CLI_PATH to the binary"
                .to_string(),
        )
    }

    /// Create a session not found error
    pub fn session_not_found(session_id: impl Into<String>) -> Self {
        Self::SessionNotFound(session_id.into())
    }

    /// Create a permission request not found error
    pub fn permission_not_found(request_id: impl Into<String>) -> Self {
        Self::PermissionRequestNotFound(request_id.into())
    }

    /// Create a capacity error
    #[must_use]
    pub fn capacity_exceeded(max: usize) -> Self {
        Self::CapacityExceeded(max)
    }

    /// Create an already exists error
    pub fn already_exists(session_id: impl Into<String>) -> Self {
        Self::AlreadyExists(session_id.into())
    }

    /// Create an agent creation error
    pub fn agent_creation(msg: impl Into<String>) -> Self {
        Self::AgentCreationFailed(msg.into())
    }

    /// Create a stream failure error
    pub fn stream_failure(msg: impl Into<String>) -> Self {
        Self::StreamFailure(msg.into())
    }

    /// Create an authentication error
    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::AuthenticationFailed(msg.into())
    }

    /// Create a persistence error
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a process error
    pub fn process(msg: impl Into<String>, exit_code: i32, stderr: Option<String>) -> Self {
        Self::Process {
            message: msg.into(),
            exit_code,
            stderr,
        }
    }

    /// Create a message parse error
    pub fn message_parse(msg: impl Into<String>, data: Option<serde_json::Value>) -> Self {
        Self::MessageParse {
            message: msg.into(),
            data,
        }
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a control protocol error
    pub fn protocol_error(msg: impl Into<String>) -> Self {
        Self::ControlProtocol(msg.into())
    }

    /// Create a hook error
    pub fn hook(msg: impl Into<String>) -> Self {
        Self::Hook(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Whether the client can correct this error by sending a different frame.
    ///
    /// Client errors are reported as `error` frames and leave the connection open.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::SessionNotFound(_)
                | Self::PermissionRequestNotFound(_)
                | Self::CapacityExceeded(_)
                | Self::AlreadyExists(_)
        )
    }
}
