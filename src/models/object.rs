//! Listing results: what sits directly beneath one key prefix.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A leaf object found by a listing, named relative to the listed prefix.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ObjectEntry {
    /// Object name with the queried prefix stripped (e.g. `photo.jpg`).
    pub name: String,

    /// Timestamp when the object was last modified, if the provider reported one.
    pub last_modified: Option<DateTime<Utc>>,
}

/// One level of the folder-like hierarchy under a prefix.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Listing {
    /// Distinct immediate child segments ("folder names"), without slashes.
    pub folders: BTreeSet<String>,

    /// Leaf objects directly under the prefix.
    pub objects: Vec<ObjectEntry>,
}
