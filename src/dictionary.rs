//! Command/value dictionary.
//!
//! The dictionary maps every zone to the ISCP commands it supports. Each
//! command has a three character code (`PWR`, `MVL`, ...), one or more
//! human-readable names, a table of named values and optionally a list of
//! integer ranges. Values and ranges may carry a model-set tag restricting
//! them to receivers whose model string matches that set.
//!
//! The dictionary is immutable once loaded and is normally shared through an
//! `Arc` by every client in the process.
//!
//! # JSON Source
//!
//! ```
//! use eiscp::Dictionary;
//!
//! let dictionary = Dictionary::from_json_str(r#"{
//!     "modelsets": { "set1": ["TX-NR509"] },
//!     "zones": [{
//!         "name": "main",
//!         "commands": [{
//!             "code": "PWR",
//!             "name": ["system-power", "power"],
//!             "values": [
//!                 { "value": "00", "name": ["standby", "off"] },
//!                 { "value": "01", "name": "on" }
//!             ]
//!         }, {
//!             "code": "MVL",
//!             "name": "volume",
//!             "ranges": [{ "min": 0, "max": 100, "models": "set1" }]
//!         }]
//!     }]
//! }"#).unwrap();
//!
//! let zone = dictionary.zone("main").unwrap();
//! assert_eq!(zone.command_by_name("POWER").unwrap().code, "PWR");
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use crate::error::{EiscpError, Result};

/// Zone used when a command string does not name one.
pub const DEFAULT_ZONE: &str = "main";

/// A named value of a command, e.g. `"01"` named `"on"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueEntry {
    /// Raw ISCP value appended to the command code.
    pub raw: String,
    /// Names (primary first, then aliases), lower-cased.
    pub names: Vec<String>,
    /// Optional human description.
    pub description: Option<String>,
    /// Model-set tag; `None` applies to every model.
    pub models: Option<String>,
}

impl ValueEntry {
    /// Returns the primary name.
    pub fn name(&self) -> &str {
        &self.names[0]
    }
}

/// A closed integer interval accepted by a command, encoded as hexadecimal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeEntry {
    /// Lowest accepted value.
    pub lo: i64,
    /// Highest accepted value.
    pub hi: i64,
}

impl RangeEntry {
    /// Returns whether `value` lies in `[lo, hi]`.
    pub fn contains(&self, value: i64) -> bool {
        self.lo <= value && value <= self.hi
    }
}

/// A range together with its model-set tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeSpec {
    /// The interval.
    pub range: RangeEntry,
    /// Model-set tag; `None` applies to every model.
    pub models: Option<String>,
}

/// One ISCP command within a zone.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Three character protocol code.
    pub code: String,
    /// Names (primary first, then aliases), lower-cased.
    pub names: Vec<String>,
    /// Optional human description.
    pub description: Option<String>,
    /// Named values in declaration order.
    pub values: Vec<ValueEntry>,
    /// Integer ranges in declaration order.
    pub ranges: Vec<RangeSpec>,
    value_by_name: HashMap<String, usize>,
    value_by_raw: HashMap<String, usize>,
}

impl CommandSpec {
    /// Returns the primary name.
    pub fn name(&self) -> &str {
        &self.names[0]
    }

    /// Looks up a named value (case-insensitive).
    pub fn value_by_name(&self, name: &str) -> Option<&ValueEntry> {
        self.value_by_name
            .get(&name.to_lowercase())
            .map(|&i| &self.values[i])
    }

    /// Looks up a value by its raw ISCP representation.
    pub fn value_by_raw(&self, raw: &str) -> Option<&ValueEntry> {
        self.value_by_raw.get(raw).map(|&i| &self.values[i])
    }

    /// Returns whether the command accepts integer arguments.
    pub fn has_ranges(&self) -> bool {
        !self.ranges.is_empty()
    }
}

/// A zone (main, zone2, ...) and its commands.
#[derive(Debug, Clone)]
pub struct Zone {
    /// Zone name, lower-cased.
    pub name: String,
    /// Commands in declaration order.
    pub commands: Vec<CommandSpec>,
    command_by_name: HashMap<String, usize>,
    command_by_code: HashMap<String, usize>,
}

impl Zone {
    /// Looks up a command by name or alias (case-insensitive).
    pub fn command_by_name(&self, name: &str) -> Option<&CommandSpec> {
        self.command_by_name
            .get(&name.to_lowercase())
            .map(|&i| &self.commands[i])
    }

    /// Looks up a command by its protocol code.
    pub fn command_by_code(&self, code: &str) -> Option<&CommandSpec> {
        self.command_by_code.get(code).map(|&i| &self.commands[i])
    }

    /// Returns every command name and alias in declaration order.
    pub fn command_names(&self) -> Vec<String> {
        self.commands
            .iter()
            .flat_map(|c| c.names.iter().cloned())
            .collect()
    }
}

/// Immutable, indexed command dictionary.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    zones: Vec<Zone>,
    zone_by_name: HashMap<String, usize>,
    model_sets: BTreeMap<String, Vec<String>>,
}

impl Dictionary {
    /// Parses and validates a dictionary from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns `EiscpError::Json` for malformed JSON and
    /// `EiscpError::Dictionary` when validation fails.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let source: DictionarySource = serde_json::from_str(json)?;
        Self::from_source(source)
    }

    /// Parses and validates a dictionary from a reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let source: DictionarySource = serde_json::from_reader(reader)?;
        Self::from_source(source)
    }

    /// Parses and validates a dictionary from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    fn from_source(source: DictionarySource) -> Result<Self> {
        let mut zones = Vec::with_capacity(source.zones.len());
        let mut zone_by_name = HashMap::new();

        for zone_source in source.zones {
            let name = zone_source.name.trim().to_lowercase();
            if name.is_empty() {
                return Err(EiscpError::dictionary("zone with empty name"));
            }
            if zone_by_name.insert(name.clone(), zones.len()).is_some() {
                return Err(EiscpError::dictionary(format!("duplicate zone '{}'", name)));
            }
            zones.push(build_zone(name, zone_source.commands)?);
        }

        Ok(Self {
            zones,
            zone_by_name,
            model_sets: source.modelsets,
        })
    }

    /// Looks up a zone (case-insensitive).
    pub fn zone(&self, name: &str) -> Option<&Zone> {
        self.zone_by_name
            .get(&name.to_lowercase())
            .map(|&i| &self.zones[i])
    }

    /// Returns zones in declaration order.
    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    /// Finds the first zone, in declaration order, defining `code`.
    ///
    /// Codes are expected to be unique across zones; when they are not,
    /// the earliest declared zone wins.
    pub fn find_code(&self, code: &str) -> Option<(&Zone, &CommandSpec)> {
        self.zones
            .iter()
            .find_map(|zone| zone.command_by_code(code).map(|cmd| (zone, cmd)))
    }

    /// Returns the named model sets.
    pub fn model_sets(&self) -> &BTreeMap<String, Vec<String>> {
        &self.model_sets
    }

    /// Returns the names of every model set `model` belongs to.
    ///
    /// A model belongs to a set when its model string contains any of the
    /// set's members as a substring.
    ///
    /// # Example
    ///
    /// ```
    /// use eiscp::Dictionary;
    ///
    /// let dictionary = Dictionary::from_json_str(r#"{
    ///     "modelsets": { "set1": ["NR509", "NR609"], "set2": ["NR1009"] },
    ///     "zones": []
    /// }"#).unwrap();
    ///
    /// let sets = dictionary.model_sets_for("TX-NR609");
    /// assert!(sets.contains("set1"));
    /// assert!(!sets.contains("set2"));
    /// ```
    pub fn model_sets_for(&self, model: &str) -> BTreeSet<String> {
        self.model_sets
            .iter()
            .filter(|(_, members)| members.iter().any(|m| !m.is_empty() && model.contains(m.as_str())))
            .map(|(name, _)| name.clone())
            .collect()
    }
}

fn build_zone(name: String, sources: Vec<CommandSource>) -> Result<Zone> {
    let mut commands = Vec::with_capacity(sources.len());
    let mut command_by_name = HashMap::new();
    let mut command_by_code = HashMap::new();

    for CommandSource {
        code,
        name: source_names,
        description,
        values,
        ranges,
    } in sources
    {
        let code = code.trim().to_string();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(EiscpError::dictionary(format!(
                "invalid command code '{}' in zone '{}'",
                code, name
            )));
        }
        if command_by_code.insert(code.clone(), commands.len()).is_some() {
            return Err(EiscpError::dictionary(format!(
                "duplicate command code '{}' in zone '{}'",
                code, name
            )));
        }

        let names = source_names.into_normalized();
        if names.is_empty() {
            return Err(EiscpError::dictionary(format!("command '{}' has no name", code)));
        }
        for n in &names {
            command_by_name.entry(n.clone()).or_insert(commands.len());
        }

        commands.push(build_command(code, names, description, values, ranges)?);
    }

    Ok(Zone {
        name,
        commands,
        command_by_name,
        command_by_code,
    })
}

fn build_command(
    code: String,
    names: Vec<String>,
    description: Option<String>,
    value_sources: Vec<ValueSource>,
    range_sources: Vec<RangeSource>,
) -> Result<CommandSpec> {
    let mut values = Vec::with_capacity(value_sources.len());
    let mut value_by_name = HashMap::new();
    let mut value_by_raw = HashMap::new();
    let mut seen_raw = HashSet::new();

    for value in value_sources {
        let value_names = value.name.into_normalized();
        if value_names.is_empty() {
            return Err(EiscpError::dictionary(format!(
                "value '{}' of command '{}' has no name",
                value.value, code
            )));
        }
        if !seen_raw.insert(value.value.clone()) {
            return Err(EiscpError::dictionary(format!(
                "duplicate value '{}' for command '{}'",
                value.value, code
            )));
        }

        let index = values.len();
        for n in &value_names {
            value_by_name.entry(n.clone()).or_insert(index);
        }
        value_by_raw.insert(value.value.clone(), index);
        values.push(ValueEntry {
            raw: value.value,
            names: value_names,
            description: value.description,
            models: value.models,
        });
    }

    let mut ranges = Vec::with_capacity(range_sources.len());
    for range in range_sources {
        if range.min > range.max {
            return Err(EiscpError::dictionary(format!(
                "range {}..{} of command '{}' is empty",
                range.min, range.max, code
            )));
        }
        ranges.push(RangeSpec {
            range: RangeEntry {
                lo: range.min,
                hi: range.max,
            },
            models: range.models,
        });
    }

    Ok(CommandSpec {
        code,
        names,
        description,
        values,
        ranges,
        value_by_name,
        value_by_raw,
    })
}

// ---------------------------------------------------------------------------
// JSON source shape
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct DictionarySource {
    #[serde(default)]
    modelsets: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    zones: Vec<ZoneSource>,
}

#[derive(Debug, Deserialize)]
struct ZoneSource {
    name: String,
    #[serde(default)]
    commands: Vec<CommandSource>,
}

#[derive(Debug, Deserialize)]
struct CommandSource {
    code: String,
    name: Names,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    values: Vec<ValueSource>,
    #[serde(default)]
    ranges: Vec<RangeSource>,
}

#[derive(Debug, Deserialize)]
struct ValueSource {
    value: String,
    name: Names,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    models: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RangeSource {
    min: i64,
    max: i64,
    #[serde(default)]
    models: Option<String>,
}

/// A single name or a list of aliases.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Names {
    One(String),
    Many(Vec<String>),
}

impl Names {
    fn into_normalized(self) -> Vec<String> {
        let raw = match self {
            Names::One(name) => vec![name],
            Names::Many(names) => names,
        };
        raw.into_iter()
            .map(|n| n.trim().to_lowercase())
            .filter(|n| !n.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fixture_dictionary;

    #[test]
    fn test_fixture_loads() {
        let dictionary = fixture_dictionary();
        assert!(dictionary.zone("main").is_some());
        assert!(dictionary.zone("zone2").is_some());
        assert!(dictionary.zone("zone9").is_none());
    }

    #[test]
    fn test_command_lookup_case_insensitive() {
        let dictionary = fixture_dictionary();
        let main = dictionary.zone("MAIN").unwrap();
        assert_eq!(main.command_by_name("System-Power").unwrap().code, "PWR");
        assert_eq!(main.command_by_name("power").unwrap().code, "PWR");
        assert_eq!(main.command_by_code("MVL").unwrap().name(), "master-volume");
    }

    #[test]
    fn test_value_lookup() {
        let dictionary = fixture_dictionary();
        let pwr = dictionary.zone("main").unwrap().command_by_code("PWR").unwrap();
        assert_eq!(pwr.value_by_name("Off").unwrap().raw, "00");
        assert_eq!(pwr.value_by_raw("01").unwrap().name(), "on");
        assert!(pwr.value_by_raw("02").is_none());
    }

    #[test]
    fn test_command_names_include_aliases() {
        let dictionary = fixture_dictionary();
        let names = dictionary.zone("main").unwrap().command_names();
        assert!(names.contains(&"system-power".to_string()));
        assert!(names.contains(&"power".to_string()));
        assert!(names.contains(&"volume".to_string()));
    }

    #[test]
    fn test_command_fields_preserved() {
        let dictionary = Dictionary::from_json_str(
            r#"{ "zones": [{ "name": "main", "commands": [{
                "code": "MVL",
                "name": ["Master-Volume", "volume"],
                "description": "Master volume",
                "values": [
                    { "value": "UP", "name": "level-up", "description": "Volume up" },
                    { "value": "DOWN", "name": ["level-down", "down"], "models": "set_rx" }
                ],
                "ranges": [
                    { "min": 0, "max": 80, "models": "set_rx" },
                    { "min": 0, "max": 100 }
                ]
            }] }] }"#,
        )
        .unwrap();

        let command = dictionary.zone("main").unwrap().command_by_code("MVL").unwrap();
        assert_eq!(command.code, "MVL");
        assert_eq!(command.names, vec!["master-volume", "volume"]);
        assert_eq!(command.description.as_deref(), Some("Master volume"));

        assert_eq!(command.values.len(), 2);
        assert_eq!(command.values[0].description.as_deref(), Some("Volume up"));
        assert_eq!(command.values[1].models.as_deref(), Some("set_rx"));
        assert_eq!(command.value_by_name("down").unwrap().raw, "DOWN");
        assert_eq!(command.value_by_raw("UP").unwrap().name(), "level-up");

        assert_eq!(command.ranges.len(), 2);
        assert_eq!(command.ranges[0].range, RangeEntry { lo: 0, hi: 80 });
        assert_eq!(command.ranges[0].models.as_deref(), Some("set_rx"));
        assert_eq!(command.ranges[1].range, RangeEntry { lo: 0, hi: 100 });
        assert!(command.ranges[1].models.is_none());
    }

    #[test]
    fn test_find_code_first_zone_wins() {
        let dictionary = Dictionary::from_json_str(
            r#"{ "zones": [
                { "name": "main", "commands": [{ "code": "TUN", "name": "tuning" }] },
                { "name": "zone2", "commands": [{ "code": "TUN", "name": "tuning-z2" }] }
            ] }"#,
        )
        .unwrap();

        let (zone, cmd) = dictionary.find_code("TUN").unwrap();
        assert_eq!(zone.name, "main");
        assert_eq!(cmd.name(), "tuning");
        assert!(dictionary.find_code("XYZ").is_none());
    }

    #[test]
    fn test_model_sets_substring_match() {
        let dictionary = fixture_dictionary();
        let sets = dictionary.model_sets_for("TX-NR609");
        assert!(sets.contains("set_rx"));
        assert!(sets.contains("set_net"));
        assert!(!sets.contains("set_hi"));
        assert!(dictionary.model_sets_for("UNKNOWN-1").is_empty());
    }

    #[test]
    fn test_rejects_duplicate_code() {
        let err = Dictionary::from_json_str(
            r#"{ "zones": [{ "name": "main", "commands": [
                { "code": "PWR", "name": "a" },
                { "code": "PWR", "name": "b" }
            ] }] }"#,
        )
        .unwrap_err();
        assert!(matches!(err, EiscpError::Dictionary { .. }));
    }

    #[test]
    fn test_rejects_bad_code() {
        let err = Dictionary::from_json_str(
            r#"{ "zones": [{ "name": "main", "commands": [{ "code": "PW", "name": "a" }] }] }"#,
        )
        .unwrap_err();
        assert!(matches!(err, EiscpError::Dictionary { .. }));
    }

    #[test]
    fn test_rejects_inverted_range() {
        let err = Dictionary::from_json_str(
            r#"{ "zones": [{ "name": "main", "commands": [
                { "code": "MVL", "name": "volume", "ranges": [{ "min": 10, "max": 0 }] }
            ] }] }"#,
        )
        .unwrap_err();
        assert!(matches!(err, EiscpError::Dictionary { .. }));
    }

    #[test]
    fn test_rejects_duplicate_zone() {
        let err = Dictionary::from_json_str(
            r#"{ "zones": [{ "name": "main" }, { "name": "Main" }] }"#,
        )
        .unwrap_err();
        assert!(matches!(err, EiscpError::Dictionary { .. }));
    }

    #[test]
    fn test_malformed_json() {
        let err = Dictionary::from_json_str("{ zones: ").unwrap_err();
        assert!(matches!(err, EiscpError::Json(_)));
    }

    #[test]
    fn test_range_contains() {
        let range = RangeEntry { lo: 0, hi: 80 };
        assert!(range.contains(0));
        assert!(range.contains(80));
        assert!(!range.contains(81));
        assert!(!range.contains(-1));
    }
}
