//! Error types for the monitor core.
//!
//! Two error types exist:
//!
//! - [`CodecError`] is returned by the wire codec. It is `Copy`, carries no
//!   heap data and is always recoverable: the offending frame is dropped.
//! - [`MonitorError`] covers everything else a task can run into. None of
//!   its variants terminate the process; tasks log them with their task tag
//!   and carry on.
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use heartlink::MonitorError;
//! use std::time::Duration;
//!
//! let error = MonitorError::channel_timeout("ble-tx", Duration::from_millis(16));
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::time::Duration;
use thiserror::Error;

use crate::link::ConnectionState;

/// Result type alias for monitor operations.
pub type Result<T, E = MonitorError> = std::result::Result<T, E>;

/// Failure decoding a wire frame.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    /// Fewer bytes than the header, or than the body the kind declares.
    #[error("frame too short: need {needed} bytes, have {available}")]
    TooShort { needed: usize, available: usize },

    /// The two leading marker bytes are not the sentinel.
    #[error("bad frame marker {found:#06x}")]
    BadMarker { found: u16 },

    /// The kind byte is outside the message enumeration.
    #[error("unknown message kind {kind}")]
    UnknownKind { kind: u8 },
}

/// Main error type for monitor operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum MonitorError {
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("cannot {operation} while link is {state:?}")]
    StateConflict { operation: &'static str, state: ConnectionState },

    #[error("channel '{channel}' timed out after {duration:?}")]
    ChannelTimeout { channel: &'static str, duration: Duration },

    #[error("channel '{channel}' is closed")]
    ChannelClosed { channel: &'static str },

    #[error("transport error: {context}")]
    Transport {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("radio driver failed to {operation}: {reason}")]
    Driver { operation: &'static str, reason: String },

    #[error("configuration error in {context}: {details}")]
    Config { context: String, details: String },

    #[error("could not allocate {resource}")]
    ResourceExhausted { resource: &'static str },

    #[error("unrecognized instruction code {code:#04x}")]
    InvalidInstruction { code: u8 },
}

impl MonitorError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            MonitorError::Codec(_) => false,
            MonitorError::StateConflict { .. } => false,
            MonitorError::ChannelTimeout { .. } => true,
            MonitorError::ChannelClosed { .. } => false,
            MonitorError::Transport { .. } => true,
            MonitorError::Driver { .. } => true,
            MonitorError::Config { .. } => false,
            MonitorError::ResourceExhausted { .. } => false,
            MonitorError::InvalidInstruction { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            MonitorError::Codec(_) => vec![
                "Drop the frame and wait for the next one",
                "Check that the client speaks the same protocol revision",
            ],
            MonitorError::StateConflict { .. } => vec![
                "Wait for the pending link transition to finish",
                "Re-issue the request from a legal state",
            ],
            MonitorError::ChannelTimeout { .. } => vec![
                "Treat as backpressure and retry on the next tick",
                "Drop best-effort data instead of blocking",
            ],
            MonitorError::ChannelClosed { .. } => vec![
                "Check that the consuming task is still running",
                "Restart the monitor runtime",
            ],
            MonitorError::Transport { .. } => vec![
                "Close and reopen the connection",
                "Verify the remote address and port",
                "Check long-range link connectivity",
            ],
            MonitorError::Driver { .. } => vec![
                "Retry the driver operation",
                "Verify credentials are configured",
            ],
            MonitorError::Config { .. } => vec![
                "Check the configuration file for typos",
                "Compare against the documented defaults",
            ],
            MonitorError::ResourceExhausted { .. } => {
                vec!["Reduce queue capacities", "Free memory before startup"]
            }
            MonitorError::InvalidInstruction { .. } => vec![
                "Update the paired client to a supported instruction set",
                "Ignore the instruction",
            ],
        }
    }

    /// Short stable name of the error kind, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            MonitorError::Codec(_) => "codec",
            MonitorError::StateConflict { .. } => "state_conflict",
            MonitorError::ChannelTimeout { .. } => "channel_timeout",
            MonitorError::ChannelClosed { .. } => "channel_closed",
            MonitorError::Transport { .. } => "transport",
            MonitorError::Driver { .. } => "driver",
            MonitorError::Config { .. } => "config",
            MonitorError::ResourceExhausted { .. } => "resource_exhausted",
            MonitorError::InvalidInstruction { .. } => "invalid_instruction",
        }
    }

    /// Helper constructor for illegal state-machine transitions.
    pub fn state_conflict(operation: &'static str, state: ConnectionState) -> Self {
        MonitorError::StateConflict { operation, state }
    }

    /// Helper constructor for channel timeouts.
    pub fn channel_timeout(channel: &'static str, duration: Duration) -> Self {
        MonitorError::ChannelTimeout { channel, duration }
    }

    /// Helper constructor for transport failures.
    pub fn transport(context: impl Into<String>) -> Self {
        MonitorError::Transport { context: context.into(), source: None }
    }

    /// Helper constructor for transport failures with source.
    pub fn transport_with_source(
        context: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        MonitorError::Transport { context: context.into(), source: Some(source) }
    }

    /// Helper constructor for radio driver failures.
    pub fn driver(operation: &'static str, reason: impl Into<String>) -> Self {
        MonitorError::Driver { operation, reason: reason.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config(context: impl Into<String>, details: impl Into<String>) -> Self {
        MonitorError::Config { context: context.into(), details: details.into() }
    }
}

impl From<std::io::Error> for MonitorError {
    fn from(err: std::io::Error) -> Self {
        MonitorError::Transport { context: err.kind().to_string(), source: Some(Box::new(err)) }
    }
}

impl From<serde_yaml_ng::Error> for MonitorError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        MonitorError::Config { context: "YAML".to_string(), details: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn error_messages_carry_context(
            context in ".*",
            needed in 3usize..200,
            available in 0usize..3,
            kind in 8u8..=255,
        ) {
            let transport = MonitorError::transport(context.clone());
            prop_assert!(transport.to_string().contains(&context));

            let short = CodecError::TooShort { needed, available };
            prop_assert!(short.to_string().contains(&needed.to_string()));

            let unknown: MonitorError = CodecError::UnknownKind { kind }.into();
            prop_assert!(unknown.to_string().contains(&kind.to_string()));
        }
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<MonitorError>();
        assert_send_sync_static::<CodecError>();

        let error = MonitorError::transport("test");
        let _: &dyn std::error::Error = &error;
    }

    #[test]
    fn recovery_methods_work() {
        let timeout = MonitorError::channel_timeout("ble-tx", Duration::from_millis(16));
        let conflict = MonitorError::state_conflict("start", ConnectionState::Connected);
        let codec: MonitorError = CodecError::BadMarker { found: 0x1234 }.into();

        assert!(timeout.is_retryable());
        assert!(!conflict.is_retryable());
        assert!(!codec.is_retryable());

        for error in [&timeout, &conflict, &codec] {
            let suggestions = error.recovery_suggestions();
            assert!(!suggestions.is_empty());
            assert!(suggestions.iter().all(|s| s.len() > 5));
        }
    }

    #[test]
    fn io_errors_become_transport_errors() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "peer reset");
        let err: MonitorError = io_err.into();
        assert_eq!(err.kind(), "transport");
        let source = std::error::Error::source(&err).expect("source preserved");
        assert_eq!(source.to_string(), "peer reset");
    }

    #[test]
    fn state_conflict_names_operation_and_state() {
        let err = MonitorError::state_conflict("stop", ConnectionState::Uninit);
        let msg = err.to_string();
        assert!(msg.contains("stop"));
        assert!(msg.contains("Uninit"));
    }
}
