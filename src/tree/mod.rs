//! Config tree parser.
//!
//! # Data Flow
//! ```text
//! ConfigSet (flat key → value, sidecars inline)
//!     → parse() folds .type/.desc sidecars into their base entry
//!     → expands %(here)s against the install base path
//!     → ConfigTree (read-only, rebuilt on every reload)
//! ```
//!
//! # Design Decisions
//! - `parse` is a pure function: the tree is derivable from the
//!   ConfigSet alone, so reload can rebuild it wholesale
//! - A sidecar without its base key stays in the tree as an ordinary
//!   orphan entry rather than failing the parse

use std::collections::BTreeMap;

use crate::snapshot::{ConfigSet, EntryType, NAMESPACE_PREFIX};

/// Placeholder token substituted with the application base path.
pub const HERE_TOKEN: &str = "%(here)s";

/// Suffix marking a type sidecar key.
pub const TYPE_SUFFIX: &str = ".type";

/// Suffix marking a description sidecar key.
pub const DESC_SUFFIX: &str = ".desc";

/// A base entry with its sidecar metadata folded in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Value with `%(here)s` already expanded.
    pub value: String,
    /// Type from the `.type` sidecar, `string` if absent.
    pub entry_type: EntryType,
    /// Description from the `.desc` sidecar, if any.
    pub description: Option<String>,
}

/// Structured view over a ConfigSet, for prefix-grouped lookups.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigTree {
    entries: BTreeMap<String, TreeEntry>,
}

impl ConfigTree {
    /// Look up a base key.
    pub fn get(&self, key: &str) -> Option<&TreeEntry> {
        self.entries.get(key)
    }

    /// Iterate the entries under `prefix.`, yielding the remainder of
    /// each key. The `linotp.` namespace prefix is transparent here, so
    /// `group("resolver")` sees both `resolver.x` and `linotp.resolver.x`.
    pub fn group<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a TreeEntry)> + 'a {
        self.entries.iter().filter_map(move |(key, entry)| {
            let key = key.strip_prefix(NAMESPACE_PREFIX).unwrap_or(key);
            let rest = key.strip_prefix(prefix)?.strip_prefix('.')?;
            Some((rest, entry))
        })
    }

    /// Iterate all base entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &TreeEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Substitute every occurrence of [`HERE_TOKEN`] with the base path.
pub fn expand_here(value: &str, here: &str) -> String {
    if value.contains(HERE_TOKEN) {
        value.replace(HERE_TOKEN, here)
    } else {
        value.to_string()
    }
}

/// Build the structured tree from a flat ConfigSet.
///
/// Deterministic for a given input: same set, same base path,
/// structurally equal tree.
pub fn parse(entries: &ConfigSet, here: &str) -> ConfigTree {
    let mut tree = BTreeMap::new();

    for (key, value) in entries {
        // Sidecars whose base key exists are folded into it below.
        let folded = [TYPE_SUFFIX, DESC_SUFFIX].iter().any(|suffix| {
            key.strip_suffix(suffix)
                .is_some_and(|base| entries.contains_key(base))
        });
        if folded {
            continue;
        }

        let entry_type = entries
            .get(&format!("{key}{TYPE_SUFFIX}"))
            .map(|tag| EntryType::from_tag(tag))
            .unwrap_or_default();
        let description = entries.get(&format!("{key}{DESC_SUFFIX}")).cloned();

        tree.insert(
            key.clone(),
            TreeEntry {
                value: expand_here(value, here),
                entry_type,
                description,
            },
        );
    }

    ConfigTree { entries: tree }
}
