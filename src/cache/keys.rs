//! Key Derivation Module
//!
//! Maps a unit name onto the store keys it owns.

use serde::{Deserialize, Serialize};

/// Slot kind of a unit's cache record.
const DATA_SLOT: &str = "data";
/// Slot kind of a unit's refresh guard.
const GUARD_SLOT: &str = "guard";

// == Namespace ==
/// Identity of the object owning a set of units.
///
/// `version` must change whenever the data the computations depend on
/// changes; every key derived from the old version is then ignored.
///
/// Keys have the shape `{owner}@{version}/{slot}/{unit}`. Owner and version
/// are escaped so they never contain `@` or `/`, and the slot kind comes
/// before the unit name, so no unit name can reach another unit's slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Namespace {
    pub owner: String,
    pub version: String,
}

impl Namespace {
    pub fn new(owner: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            version: version.into(),
        }
    }

    /// Key holding the cache record of `unit`.
    pub fn data_key(&self, unit: &str) -> String {
        self.slot_key(DATA_SLOT, unit)
    }

    /// Key holding the queued/processing guard of `unit`.
    pub fn guard_key(&self, unit: &str) -> String {
        self.slot_key(GUARD_SLOT, unit)
    }

    fn slot_key(&self, slot: &str, unit: &str) -> String {
        format!(
            "{}@{}/{}/{}",
            escape(&self.owner),
            escape(&self.version),
            slot,
            unit
        )
    }
}

/// Percent-encodes the key separators.
fn escape(part: &str) -> String {
    let mut escaped = String::with_capacity(part.len());
    for c in part.chars() {
        match c {
            '%' => escaped.push_str("%25"),
            '@' => escaped.push_str("%40"),
            '/' => escaped.push_str("%2F"),
            c => escaped.push(c),
        }
    }
    escaped
}
