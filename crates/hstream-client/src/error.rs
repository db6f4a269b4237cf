//! Error types for client routing, failover and RPC operations.

use std::fmt;

use tonic::{Code, Status};

/// Main error type for the HStream client.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientError {
    /// The target could not be reached. Control-plane calls fail over once on this.
    TransportUnavailable {
        context: String,
        reason: String,
    },
    /// Any other non-OK RPC outcome. Never retried by the client.
    RpcFailed {
        context: String,
        code: Code,
        reason: String,
    },
    /// Failover evicted every known target.
    ExhaustedTargets,
    /// The client was shut down and no longer opens channels.
    Shutdown,
    /// A lookup answered for a different key than the one requested.
    ConsistencyViolation {
        context: String,
        expected: String,
        actual: String,
    },
    /// A required field was missing from a response.
    MalformedResponse {
        context: String,
        reason: String,
    },
    NoMatchingShard {
        stream: String,
        key: String,
    },
    InvalidConfig {
        context: String,
        reason: String,
    },
    Io {
        context: String,
        reason: String,
    },
    /// A record payload could not be decoded.
    Decode {
        context: String,
        reason: String,
    },
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::TransportUnavailable { context, reason } => {
                write!(f, "Target unavailable in {context}: {reason}")
            }
            ClientError::RpcFailed {
                context,
                code,
                reason,
            } => {
                write!(f, "RPC failed in {context} ({code:?}): {reason}")
            }
            ClientError::ExhaustedTargets => {
                write!(f, "No reachable targets left to fail over to")
            }
            ClientError::Shutdown => write!(f, "Client has been shut down"),
            ClientError::ConsistencyViolation {
                context,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Consistency violation in {context}: requested '{expected}', server answered for '{actual}'"
                )
            }
            ClientError::MalformedResponse { context, reason } => {
                write!(f, "Malformed response in {context}: {reason}")
            }
            ClientError::NoMatchingShard { stream, key } => {
                write!(f, "No shard of stream '{stream}' covers key '{key}'")
            }
            ClientError::InvalidConfig { context, reason } => {
                write!(f, "Invalid configuration in {context}: {reason}")
            }
            ClientError::Io { context, reason } => {
                write!(f, "I/O error in {context}: {reason}")
            }
            ClientError::Decode { context, reason } => {
                write!(f, "Failed to decode {context}: {reason}")
            }
        }
    }
}

impl std::error::Error for ClientError {}

impl ClientError {
    /// True for the one signal that triggers failover.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ClientError::TransportUnavailable { .. })
    }

    /// True for any error reported by a remote call, as opposed to local failures.
    pub fn is_rpc_error(&self) -> bool {
        matches!(
            self,
            ClientError::TransportUnavailable { .. } | ClientError::RpcFailed { .. }
        )
    }

    pub fn from_status(status: Status, context: &str) -> Self {
        match status.code() {
            Code::Unavailable => ClientError::TransportUnavailable {
                context: context.to_string(),
                reason: status.message().to_string(),
            },
            code => ClientError::RpcFailed {
                context: context.to_string(),
                code,
                reason: status.message().to_string(),
            },
        }
    }

    pub fn from_io_error(e: std::io::Error, context: &str) -> Self {
        ClientError::Io {
            context: context.to_string(),
            reason: e.to_string(),
        }
    }

    pub fn from_parse_error(e: impl fmt::Display, context: &str) -> Self {
        ClientError::InvalidConfig {
            context: context.to_string(),
            reason: e.to_string(),
        }
    }

    pub fn missing_field(field: &str, context: &str) -> Self {
        ClientError::MalformedResponse {
            context: context.to_string(),
            reason: format!("missing field '{field}'"),
        }
    }
}
