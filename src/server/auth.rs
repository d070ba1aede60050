//! WebSocket authentication
//!
//! A client authenticates either with a `token` query parameter or with an
//! `auth` frame sent first. Failures close the socket with a policy-violation
//! code.

use thiserror::Error;

use crate::protocol::{InboundFrame, parse_inbound};

/// Close code for rejected credentials
pub const POLICY_VIOLATION: u16 = 1008;

/// Close reason for rejected credentials
pub const AUTH_CLOSE_REASON: &str = "Authentication required";

const BEARER_PREFIX: &str = "Bearer ";

/// Why in-band authentication failed
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// The first frame was something other than `auth`
    #[error("First message must be authentication")]
    NotAuthFrame,
    /// The token did not match the shared secret
    #[error("Invalid authentication token")]
    InvalidToken,
}

/// Decision taken when the socket opens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission<'a> {
    /// Authentication is disabled
    Open,
    /// The query token matched
    Authenticated,
    /// The first frame must carry the secret
    AwaitFrame {
        /// Expected secret
        expected: &'a str,
    },
    /// No secret is configured, so nobody can authenticate
    Refused,
}

/// Decide how a new connection authenticates
#[must_use]
pub fn admit<'a>(
    auth_enabled: bool,
    api_key: Option<&'a str>,
    query_token: Option<&str>,
) -> Admission<'a> {
    if !auth_enabled {
        return Admission::Open;
    }
    let Some(expected) = api_key else {
        log::error!("No API key configured; rejecting connection");
        return Admission::Refused;
    };
    match query_token {
        Some(token) if token_matches(expected, token) => Admission::Authenticated,
        _ => Admission::AwaitFrame { expected },
    }
}

/// Compare a presented token against the secret; a `Bearer ` prefix is ignored
#[must_use]
pub fn token_matches(expected: &str, presented: &str) -> bool {
    let presented = presented.strip_prefix(BEARER_PREFIX).unwrap_or(presented);
    let (a, b) = (expected.as_bytes(), presented.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Check the first text frame of a connection
///
/// # Errors
/// Returns [`AuthError`] if the frame is not an `auth` frame or carries the
/// wrong token
pub fn check_auth_frame(expected: &str, text: &str) -> Result<(), AuthError> {
    match parse_inbound(text) {
        Ok(InboundFrame::Auth { token }) if token_matches(expected, &token) => Ok(()),
        Ok(InboundFrame::Auth { .. }) => Err(AuthError::InvalidToken),
        _ => Err(AuthError::NotAuthFrame),
    }
}
