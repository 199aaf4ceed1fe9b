//! Error types for the eISCP client.

use std::io;
use thiserror::Error;

/// Result type alias for eISCP operations.
pub type Result<T> = std::result::Result<T, EiscpError>;

/// Errors that can occur while resolving, framing or sending eISCP messages.
#[derive(Debug, Error)]
pub enum EiscpError {
    /// The high-level command string could not be split into zone, command and argument.
    #[error("Cannot parse command: {reason}")]
    Parse {
        /// Description of what is malformed.
        reason: String,
    },

    /// The zone is not present in the dictionary.
    #[error("Zone '{zone}' does not exist")]
    UnknownZone {
        /// Zone name as given by the caller.
        zone: String,
    },

    /// No command name or alias matches in the given zone.
    #[error("Command '{command}' does not exist in zone '{zone}'")]
    UnknownCommand {
        /// Command name as given by the caller.
        command: String,
        /// Zone that was searched.
        zone: String,
    },

    /// The argument is neither a named value nor an integer accepted by a range.
    #[error("Argument '{value}' does not exist for command '{command}'")]
    UnknownValue {
        /// Argument as given by the caller.
        value: String,
        /// Command the argument was resolved against.
        command: String,
    },

    /// The integer argument falls outside every range applicable to the device.
    #[error("Value {value} is out of range for command '{command}'")]
    ValueOutOfRange {
        /// Integer argument.
        value: i64,
        /// Command the argument was resolved against.
        command: String,
    },

    /// The value exists but is excluded by the connected device's model sets.
    #[error("Value '{value}' of command '{command}' is not supported by this model")]
    UnsupportedForModel {
        /// Argument as given by the caller.
        value: String,
        /// Command the argument was resolved against.
        command: String,
    },

    /// A send was attempted while no connection is established.
    #[error("Not connected to a receiver")]
    NotConnected,

    /// A connect was requested while a session is already active.
    #[error("Already connected or connecting")]
    AlreadyConnected,

    /// The bytes received do not form a valid eISCP frame.
    #[error("Invalid frame: {reason}")]
    InvalidFrame {
        /// Description of the framing error.
        reason: String,
    },

    /// The command dictionary failed validation.
    #[error("Invalid dictionary: {reason}")]
    Dictionary {
        /// Description of the inconsistency.
        reason: String,
    },

    /// Socket-level failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The dictionary source is not valid JSON for the expected shape.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EiscpError {
    /// Creates a new `Parse` error.
    ///
    /// # Example
    ///
    /// ```
    /// use eiscp::EiscpError;
    ///
    /// let err = EiscpError::parse("missing argument");
    /// assert_eq!(err.to_string(), "Cannot parse command: missing argument");
    /// ```
    pub fn parse(reason: impl Into<String>) -> Self {
        Self::Parse {
            reason: reason.into(),
        }
    }

    /// Creates a new `InvalidFrame` error.
    pub fn invalid_frame(reason: impl Into<String>) -> Self {
        Self::InvalidFrame {
            reason: reason.into(),
        }
    }

    /// Creates a new `Dictionary` error.
    pub fn dictionary(reason: impl Into<String>) -> Self {
        Self::Dictionary {
            reason: reason.into(),
        }
    }

    pub(crate) fn unknown_command(command: &str, zone: &str) -> Self {
        Self::UnknownCommand {
            command: command.to_string(),
            zone: zone.to_string(),
        }
    }

    pub(crate) fn unknown_value(value: &str, command: &str) -> Self {
        Self::UnknownValue {
            value: value.to_string(),
            command: command.to_string(),
        }
    }

    pub(crate) fn unsupported_for_model(value: &str, command: &str) -> Self {
        Self::UnsupportedForModel {
            value: value.to_string(),
            command: command.to_string(),
        }
    }

    /// Returns whether this error comes from resolving a command string
    /// against the dictionary (as opposed to the network or framing).
    ///
    /// # Example
    ///
    /// ```
    /// use eiscp::EiscpError;
    ///
    /// assert!(EiscpError::parse("empty").is_resolution());
    /// assert!(!EiscpError::NotConnected.is_resolution());
    /// ```
    pub fn is_resolution(&self) -> bool {
        matches!(
            self,
            Self::Parse { .. }
                | Self::UnknownZone { .. }
                | Self::UnknownCommand { .. }
                | Self::UnknownValue { .. }
                | Self::ValueOutOfRange { .. }
                | Self::UnsupportedForModel { .. }
        )
    }
}
