//! High-level command parsing and encoding.
//!
//! Human-readable commands are written as `zone.command=argument` and
//! resolved against the [`Dictionary`] into raw ISCP messages:
//!
//! | Input | ISCP |
//! |-------|------|
//! | `system-power=on` | `PWR01` |
//! | `main.volume=22` | `MVL16` |
//! | `zone2.power:standby` | `ZPW00` |
//! | `main.mute.toggle` | `AMTTG` |
//! | `volume level-up` | `MVLUP` |
//!
//! # Syntax
//!
//! - With `:` or `=`: the part before the first separator holds
//!   `[zone.]command` (`.` or space separated); the part after holds one or
//!   more arguments separated by `,` or space.
//! - Without a separator the string is split on `.` and space: three or more
//!   tokens are `zone command args...`, two tokens are `command arg` in the
//!   default zone `main`.
//!
//! Tokens are trimmed and lower-cased; empty tokens are dropped.
//!
//! # Example
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
//! }] }"#).unwrap();
//!
//! let resolver = CommandResolver::new(&dictionary, None);
//! assert_eq!(resolver.encode_command("power=on").unwrap(), "PWR01");
//! assert_eq!(resolver.encode_command("main.volume=100").unwrap(), "MVL64");
//! ```

use crate::device::{is_allowed, DeviceContext};
use crate::dictionary::{CommandSpec, Dictionary, DEFAULT_ZONE};
use crate::error::{EiscpError, Result};

/// A command string split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    /// Zone name.
    pub zone: String,
    /// Command name or alias.
    pub command: String,
    /// One or more argument tokens.
    pub arguments: Vec<String>,
}

impl ParsedCommand {
    /// Splits a high-level command string.
    ///
    /// # Errors
    ///
    /// Returns `EiscpError::Parse` if the string does not contain both a
    /// command and an argument.
    ///
    /// # Example
    ///
    /// ```
    /// use eiscp::ParsedCommand;
    ///
    /// let parsed = ParsedCommand::parse("Zone2.Volume = 30").unwrap();
    /// assert_eq!(parsed.zone, "zone2");
    /// assert_eq!(parsed.command, "volume");
    /// assert_eq!(parsed.arguments, vec!["30"]);
    ///
    /// assert!(ParsedCommand::parse("volume").is_err());
    /// ```
    pub fn parse(input: &str) -> Result<Self> {
        if let Some(pos) = input.find(|c: char| c == ':' || c == '=') {
            let base = tokens(&input[..pos], &['.', ' ']);
            let arguments = tokens(&input[pos + 1..], &[',', ' ']);

            let (zone, command) = match base.as_slice() {
                [command] => (DEFAULT_ZONE.to_string(), command.clone()),
                [zone, command] => (zone.clone(), command.clone()),
                [] => return Err(EiscpError::parse(format!("missing command in '{}'", input))),
                _ => {
                    return Err(EiscpError::parse(format!(
                        "expected [zone.]command before separator in '{}'",
                        input
                    )))
                }
            };
            if arguments.is_empty() {
                return Err(EiscpError::parse(format!("missing argument in '{}'", input)));
            }

            return Ok(Self {
                zone,
                command,
                arguments,
            });
        }

        let mut parts = tokens(input, &['.', ' ']);
        match parts.len() {
            0 | 1 => Err(EiscpError::parse(format!(
                "need at least a command and an argument in '{}'",
                input
            ))),
            2 => {
                let argument = parts.pop().unwrap_or_default();
                let command = parts.pop().unwrap_or_default();
                Ok(Self {
                    zone: DEFAULT_ZONE.to_string(),
                    command,
                    arguments: vec![argument],
                })
            }
            _ => {
                let arguments = parts.split_off(2);
                let command = parts.pop().unwrap_or_default();
                let zone = parts.pop().unwrap_or_default();
                Ok(Self {
                    zone,
                    command,
                    arguments,
                })
            }
        }
    }

    /// Returns the arguments as the single lookup key used against the
    /// dictionary (tokens joined with `,`).
    pub fn argument(&self) -> String {
        self.arguments.join(",")
    }
}

fn tokens(input: &str, separators: &[char]) -> Vec<String> {
    input
        .split(|c: char| separators.contains(&c))
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Translates between high-level commands and ISCP messages.
///
/// Borrows the shared dictionary and, when the receiver's model is known,
/// its [`DeviceContext`]. Without a context the resolver is permissive and
/// accepts every value regardless of model-set tags.
#[derive(Debug, Clone, Copy)]
pub struct CommandResolver<'a> {
    pub(crate) dictionary: &'a Dictionary,
    pub(crate) context: Option<&'a DeviceContext>,
}

impl<'a> CommandResolver<'a> {
    /// Creates a resolver.
    pub fn new(dictionary: &'a Dictionary, context: Option<&'a DeviceContext>) -> Self {
        Self {
            dictionary,
            context,
        }
    }

    /// Resolves a high-level command string to an ISCP message such as `"PWR01"`.
    ///
    /// Named values are tried first, then integer ranges. Integers are sent
    /// as upper-case hexadecimal padded to at least two digits.
    ///
    /// # Errors
    ///
    /// - `Parse` if the string is malformed
    /// - `UnknownZone` / `UnknownCommand` if the lookup fails
    /// - `UnsupportedForModel` if the value exists but not for this model
    /// - `ValueOutOfRange` if an integer fits no applicable range
    /// - `UnknownValue` otherwise
    pub fn encode_command(&self, input: &str) -> Result<String> {
        let parsed = ParsedCommand::parse(input)?;
        self.encode_parsed(&parsed)
    }

    /// Resolves an already parsed command.
    pub fn encode_parsed(&self, parsed: &ParsedCommand) -> Result<String> {
        let zone = self
            .dictionary
            .zone(&parsed.zone)
            .ok_or_else(|| EiscpError::UnknownZone {
                zone: parsed.zone.clone(),
            })?;

        let command = zone
            .command_by_name(&parsed.command)
            .ok_or_else(|| EiscpError::unknown_command(&parsed.command, &parsed.zone))?;

        let argument = parsed.argument();
        let value = self.resolve_value(command, &parsed.command, &argument)?;
        Ok(format!("{}{}", command.code, value))
    }

    fn resolve_value(&self, command: &CommandSpec, name: &str, argument: &str) -> Result<String> {
        if let Some(value) = command.value_by_name(argument) {
            if !is_allowed(self.context, value.models.as_deref()) {
                return Err(EiscpError::unsupported_for_model(argument, name));
            }
            return Ok(value.raw.clone());
        }

        if command.has_ranges() && is_decimal(argument) {
            let number: i64 = argument
                .parse()
                .map_err(|_| EiscpError::unknown_value(argument, name))?;
            return self.resolve_integer(command, name, argument, number);
        }

        Err(EiscpError::unknown_value(argument, name))
    }

    fn resolve_integer(
        &self,
        command: &CommandSpec,
        name: &str,
        argument: &str,
        number: i64,
    ) -> Result<String> {
        let mut excluded_by_model = false;
        for spec in &command.ranges {
            let active = is_allowed(self.context, spec.models.as_deref());
            if !spec.range.contains(number) {
                continue;
            }
            if active {
                return Ok(format!("{:02X}", number));
            }
            excluded_by_model = true;
        }

        if excluded_by_model {
            Err(EiscpError::unsupported_for_model(argument, name))
        } else {
            Err(EiscpError::ValueOutOfRange {
                value: number,
                command: name.to_string(),
            })
        }
    }
}

fn is_decimal(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
