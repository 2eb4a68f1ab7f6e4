//! Configuration data model and the process-wide snapshot.
//!
//! The authoritative form of the configuration is a flat map of string
//! keys to string values (`ConfigSet`). Metadata about a key lives in
//! sidecar entries under `key + ".type"` and `key + ".desc"`; those are
//! descriptions of the base key, not independent values. A `Snapshot`
//! pairs the flat map with its derived `ConfigTree` and the `delay`
//! flag marking a load that ran before the HSM was ready.

pub mod shared;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

use crate::tree::ConfigTree;

pub use shared::SharedConfig;

/// Flat authoritative key → value form. Ordered so that parses and
/// snapshot comparisons are deterministic.
pub type ConfigSet = BTreeMap<String, String>;

/// Namespace prefix some keys carry; case-insensitive delete strips
/// exactly this literal prefix when matching.
pub const NAMESPACE_PREFIX: &str = "linotp.";

/// Type tag of a configuration entry.
///
/// Tags are open-ended strings in the store; only `password` changes
/// behavior here (log redaction and HSM-gated loading).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EntryType {
    /// Plain string value (the default).
    #[default]
    String,
    /// Secret value; redacted in logs, unreadable until the HSM is ready.
    Password,
    /// Any other tag, carried through verbatim.
    Other(std::string::String),
}

impl EntryType {
    /// Parse a type tag.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "string" => EntryType::String,
            "password" => EntryType::Password,
            other => EntryType::Other(other.to_string()),
        }
    }

    /// The string tag persisted in the store.
    pub fn as_tag(&self) -> &str {
        match self {
            EntryType::String => "string",
            EntryType::Password => "password",
            EntryType::Other(tag) => tag,
        }
    }

    /// Whether values of this type must never appear in logs.
    pub fn is_secret(&self) -> bool {
        matches!(self, EntryType::Password)
    }
}

impl Serialize for EntryType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_tag())
    }
}

impl<'de> Deserialize<'de> for EntryType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = std::string::String::deserialize(deserializer)?;
        Ok(EntryType::from_tag(&tag))
    }
}

/// A single configuration entry as written to the backing store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    /// Case-sensitive key, conventionally dotted.
    pub key: String,

    /// String-encoded value (numbers and booleans included).
    pub value: String,

    /// Type tag, `string` if the caller gave none.
    #[serde(default)]
    pub entry_type: EntryType,

    /// Optional free-text description.
    #[serde(default)]
    pub description: Option<String>,
}

/// An immutable configuration snapshot, replaced wholesale on reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// The flat key → value map, sidecar entries included.
    pub entries: ConfigSet,

    /// Tree derived from `entries`; rebuilt on every reload, never patched.
    pub tree: ConfigTree,

    /// True when the load ran before the HSM was ready; the snapshot is
    /// provisional and must be reloaded once the HSM reports ready.
    pub delay: bool,
}

impl Snapshot {
    /// Flat lookup.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }
}

/// Redact a value for logging: secrets become an `X` run of equal
/// character length, everything else passes through.
pub fn mask_value(entry_type: &EntryType, value: &str) -> String {
    if entry_type.is_secret() {
        "X".repeat(value.chars().count())
    } else {
        value.to_string()
    }
}
