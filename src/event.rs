//! Events published by a [`Client`](crate::Client) and its connection state.

use std::fmt;

use crate::response::{Argument, DecodedMessage};

/// Notification broadcast to every subscriber of a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The TCP session to the receiver is established.
    Connected {
        /// Receiver host.
        host: String,
        /// Receiver port.
        port: u16,
    },
    /// The TCP session ended.
    Closed {
        /// `true` when the close was requested through `disconnect()`.
        user_initiated: bool,
    },
    /// A message arrived from the receiver.
    Data(DecodedMessage),
    /// A recognised message, once per command name or alias.
    Command {
        /// Zone of the command.
        zone: String,
        /// Command name or alias (e.g. `"volume"`).
        name: String,
        /// Decoded argument.
        argument: Argument,
    },
    /// A resolution, send or socket failure.
    Error(String),
    /// Raw traffic trace (`"Sent command ..."` / `"Received data ..."`).
    Debug(String),
}

/// Lifecycle of a client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No session and none requested.
    #[default]
    Idle,
    /// Looking for a receiver before connecting.
    Discovering,
    /// TCP connect in progress.
    Connecting,
    /// Session established; sends are accepted.
    Connected,
    /// Session lost; a reconnect may be pending.
    Disconnected,
}

impl ConnectionState {
    /// Whether a new `connect()` may start from this state.
    pub fn can_connect(self) -> bool {
        matches!(self, Self::Idle | Self::Disconnected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Discovering => "discovering",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        };
        f.write_str(name)
    }
}
