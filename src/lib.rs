//! # eISCP Client Library
//!
//! A Rust library for discovering and controlling networked AV receivers
//! over eISCP, the Ethernet transport of the Integra Serial Control Protocol.
//!
//! The library translates human-readable commands such as `"volume=40"` or
//! `"zone2.power=on"` into ISCP messages (`MVL28`, `ZPW01`) using a command
//! dictionary, frames them for TCP, and decodes everything the receiver sends
//! back into typed events.
//!
//! ## Features
//!
//! - **Dictionary driven** — zones, commands, aliases and value tables are loaded from JSON
//! - **Model aware** — values and ranges restricted to certain models are rejected for others
//! - **Discovery** — finds receivers with a UDP broadcast
//! - **Serialized sends** — one write in flight at a time, in call order
//! - **Reconnect** — optional delayed reconnect after the connection drops
//! - **No panics** — all errors returned as `Result<T, EiscpError>`
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use eiscp::{Client, ConnectConfig, Dictionary, Event};
//!
//! #[tokio::main]
//! async fn main() -> eiscp::Result<()> {
//!     let dictionary = Arc::new(Dictionary::from_path("eiscp-commands.json")?);
//!     let client = Client::new(dictionary);
//!     let mut events = client.subscribe();
//!
//!     // No host: connect to the first receiver answering a broadcast.
//!     client.connect(ConnectConfig::discover()).await?;
//!
//!     while let Ok(event) = events.recv().await {
//!         match event {
//!             Event::Connected { host, .. } => {
//!                 println!("connected to {}", host);
//!                 client.command("system-power=query").await?;
//!             }
//!             Event::Command { name, argument, .. } => println!("{} = {}", name, argument),
//!             Event::Error(detail) => eprintln!("{}", detail),
//!             _ => {}
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Command Strings
//!
//! Commands are written `[zone.]command[=argument[,argument...]]` or with
//! dots and spaces as separators (`"zone2 volume 30"`). The zone defaults to
//! `main`. Arguments are either a named value of the command or, for commands
//! with integer ranges, a decimal number sent as upper-case hexadecimal.
//!
//! ```
//! use eiscp::{CommandResolver, Dictionary};
//!
//! let dictionary = Dictionary::from_json_str(r#"{ "zones": [{
//!     "name": "main",
//!     "commands": [{
//!         "code": "PWR",
//!         "name": ["system-power", "power"],
//!         "values": [{ "value": "01", "name": "on" }]
//!     }, {
//!         "code": "MVL",
//!         "name": "volume",
//!         "ranges": [{ "min": 0, "max": 100 }]
//!     }]
//! }] }"#)?;
//!
//! let resolver = CommandResolver::new(&dictionary, None);
//! assert_eq!(resolver.encode_command("power=on")?, "PWR01");
//! assert_eq!(resolver.encode_command("main volume 100")?, "MVL64");
//! # Ok::<(), eiscp::EiscpError>(())
//! ```
//!
//! ## Wire Format
//!
//! Every message travels in a frame with a 16 byte big-endian header:
//!
//! | Offset | Size | Content |
//! |--------|------|---------|
//! | 0 | 4 | `"ISCP"` |
//! | 4 | 4 | header length (16) |
//! | 8 | 4 | payload length |
//! | 12 | 1 | version (1) |
//! | 13 | 3 | reserved |
//! | 16 | n | `'!'`, destination, message, `"\r\n"` |
//!
//! See the [`packet`] module for the codec.
//!
//! ## Error Handling
//!
//! ```no_run
//! use eiscp::{Client, EiscpError};
//!
//! # async fn example(client: Client) {
//! match client.command("volume=120").await {
//!     Ok(sent) => println!("sent {}", sent),
//!     Err(EiscpError::ValueOutOfRange { value, command }) => {
//!         eprintln!("{} is out of range for {}", value, command);
//!     }
//!     Err(EiscpError::UnsupportedForModel { value, .. }) => {
//!         eprintln!("{} is not available on this receiver", value);
//!     }
//!     Err(EiscpError::NotConnected) => eprintln!("not connected"),
//!     Err(e) => eprintln!("error: {}", e),
//! }
//! # }
//! ```

#![warn(clippy::all)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod client;
mod command;
mod device;
mod dictionary;
mod discovery;
mod error;
mod event;
pub mod packet;
mod response;
mod transport;

#[cfg(test)]
mod test_support;

// Public re-exports
pub use client::{Client, ConnectConfig, DEFAULT_MODEL_TIMEOUT, DEFAULT_RECONNECT_SLEEP};
pub use command::{CommandResolver, ParsedCommand};
pub use device::DeviceContext;
pub use dictionary::{
    CommandSpec, Dictionary, RangeEntry, RangeSpec, ValueEntry, Zone, DEFAULT_ZONE,
};
pub use discovery::{
    discover, DiscoveredDevice, DiscoveryOptions, DiscoveryOutcome, DiscoveryReport,
    BROADCAST_ADDRESS, DEFAULT_DISCOVERY_TIMEOUT, DISCOVERY_QUERY,
};
pub use error::{EiscpError, Result};
pub use event::{ConnectionState, Event};
pub use response::{Argument, DecodedMessage, ResolvedCommand, CODE_LEN};
pub use transport::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_PORT, DEFAULT_WRITE_TIMEOUT};
