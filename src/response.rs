//! Decoding of inbound ISCP messages.
//!
//! A message from the receiver such as `"MVL2A"` starts with its three
//! character command code followed by the raw value. Decoding looks the code
//! up in the dictionary (first declared zone wins) and turns the raw value
//! into either a value name or, for range commands, an integer.
//!
//! Codes the dictionary does not know are not an error: the message is kept
//! as raw data and [`DecodedMessage::command`] is `None`.
//!
//! # Example
//!
//! ```
//! use eiscp::{Argument, CommandResolver, Dictionary};
//!
//! let dictionary = Dictionary::from_json_str(r#"{ "zones": [{
//!     "name": "main",
//!     "commands": [{
//!         "code": "MVL",
//!         "name": ["master-volume", "volume"],
//!         "ranges": [{ "min": 0, "max": 100 }]
//!     }]
//! }] }"#).unwrap();
//!
//! let decoded = CommandResolver::new(&dictionary, None).decode_message("MVL2A");
//! let command = decoded.command.unwrap();
//! assert_eq!(command.names, vec!["master-volume", "volume"]);
//! assert_eq!(command.argument, Argument::Number(42));
//! ```

use std::fmt;

use crate::command::CommandResolver;

/// Length of an ISCP command code.
pub const CODE_LEN: usize = 3;

/// Decoded argument of an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    /// Primary name of a named value (e.g. `"on"`).
    Name(String),
    /// Integer parsed from a hexadecimal range value.
    Number(i64),
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Name(name) => f.write_str(name),
            Argument::Number(n) => write!(f, "{}", n),
        }
    }
}

/// A message resolved to a dictionary command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommand {
    /// Zone the code was found in.
    pub zone: String,
    /// Three character command code.
    pub code: String,
    /// Command name and aliases; one event is emitted per entry.
    pub names: Vec<String>,
    /// Decoded argument.
    pub argument: Argument,
}

/// An inbound message with its optional decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMessage {
    /// Raw ISCP message (code followed by value).
    pub iscp_command: String,
    /// Dictionary decoding, if one is available.
    pub command: Option<ResolvedCommand>,
}

impl CommandResolver<'_> {
    /// Decodes a raw ISCP message received from the receiver.
    ///
    /// Never fails: unknown codes or values produce a message with
    /// `command: None`.
    pub fn decode_message(&self, body: &str) -> DecodedMessage {
        DecodedMessage {
            iscp_command: body.to_string(),
            command: self.resolve_message(body),
        }
    }

    fn resolve_message(&self, body: &str) -> Option<ResolvedCommand> {
        let code = body.get(..CODE_LEN)?;
        let raw_value = &body[CODE_LEN..];
        let (zone, command) = self.dictionary.find_code(code)?;

        let argument = if let Some(value) = command.value_by_raw(raw_value) {
            Argument::Name(value.name().to_string())
        } else if command.has_ranges() && is_hex(raw_value) {
            Argument::Number(i64::from_str_radix(raw_value, 16).ok()?)
        } else {
            tracing::trace!(code, raw_value, "no decoding for value");
            return None;
        };

        Some(ResolvedCommand {
            zone: zone.name.clone(),
            code: command.code.clone(),
            names: command.names.clone(),
            argument,
        })
    }
}

fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceContext;
    use crate::test_support::fixture_dictionary;

    #[test]
    fn test_decode_named_value() {
        let dictionary = fixture_dictionary();
        let decoded = CommandResolver::new(&dictionary, None).decode_message("PWR01");

        assert_eq!(decoded.iscp_command, "PWR01");
        let command = decoded.command.unwrap();
        assert_eq!(command.zone, "main");
        assert_eq!(command.code, "PWR");
        assert_eq!(command.names, vec!["system-power", "power"]);
        assert_eq!(command.argument, Argument::Name("on".to_string()));
    }

    #[test]
    fn test_decode_primary_value_name() {
        let dictionary = fixture_dictionary();
        let decoded = CommandResolver::new(&dictionary, None).decode_message("PWR00");
        assert_eq!(
            decoded.command.unwrap().argument,
            Argument::Name("standby".to_string())
        );
    }

    #[test]
    fn test_decode_range_value() {
        let dictionary = fixture_dictionary();
        let decoded = CommandResolver::new(&dictionary, None).decode_message("ZVL1e");
        let command = decoded.command.unwrap();
        assert_eq!(command.zone, "zone2");
        assert_eq!(command.argument, Argument::Number(30));
    }

    #[test]
    fn test_decode_named_value_before_range() {
        let dictionary = fixture_dictionary();
        let decoded = CommandResolver::new(&dictionary, None).decode_message("MVLUP");
        assert_eq!(
            decoded.command.unwrap().argument,
            Argument::Name("level-up".to_string())
        );
    }

    #[test]
    fn test_decode_unknown_code_is_raw_only() {
        let dictionary = fixture_dictionary();
        let resolver = CommandResolver::new(&dictionary, None);

        let decoded = resolver.decode_message("NLSC0Pfoo");
        assert_eq!(decoded.iscp_command, "NLSC0Pfoo");
        assert!(decoded.command.is_none());

        assert!(resolver.decode_message("PW").command.is_none());
        assert!(resolver.decode_message("").command.is_none());
    }

    #[test]
    fn test_decode_unknown_value_is_raw_only() {
        let dictionary = fixture_dictionary();
        let resolver = CommandResolver::new(&dictionary, None);
        // PWR has no ranges.
        assert!(resolver.decode_message("PWR05").command.is_none());
        // MVL has ranges but the value is not hexadecimal.
        assert!(resolver.decode_message("MVLN/A").command.is_none());
    }

    #[test]
    fn test_named_values_round_trip() {
        let dictionary = fixture_dictionary();
        let context = DeviceContext::resolve(&dictionary, "TX-NR3009");
        let resolver = CommandResolver::new(&dictionary, Some(&context));

        for zone in dictionary.zones() {
            for command in &zone.commands {
                for value in &command.values {
                    let input = format!("{}.{}={}", zone.name, command.name(), value.name());
                    let Ok(iscp) = resolver.encode_command(&input) else {
                        // Excluded by this model.
                        continue;
                    };
                    let decoded = resolver.decode_message(&iscp).command.unwrap();
                    assert_eq!(decoded.names[0], command.name(), "{}", input);
                    assert_eq!(decoded.argument, Argument::Name(value.name().to_string()));
                }
            }
        }
    }

    #[test]
    fn test_range_bounds_round_trip() {
        let dictionary = fixture_dictionary();
        let resolver = CommandResolver::new(&dictionary, None);

        for zone in dictionary.zones() {
            for command in zone.commands.iter().filter(|c| c.has_ranges()) {
                for spec in &command.ranges {
                    for n in [spec.range.lo, spec.range.hi] {
                        let input = format!("{}.{}={}", zone.name, command.name(), n);
                        let iscp = resolver.encode_command(&input).unwrap();
                        let decoded = resolver.decode_message(&iscp).command.unwrap();
                        assert_eq!(decoded.argument, Argument::Number(n), "{}", input);
                    }
                }
            }
        }
    }
}
