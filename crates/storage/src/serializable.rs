use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::ValueBag;

/// Projection of the storage read by the save pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SerializableStorage {
    pub map: BTreeMap<String, Value>,
    /// Content digest, independent of insertion order. Empty for an empty map.
    pub hash: String,
    /// Bitmap ids the saved records refer to.
    pub transfer: Vec<String>,
}

impl SerializableStorage {
    pub(crate) fn from_values(values: &BTreeMap<String, ValueBag>) -> Self {
        let map: BTreeMap<String, Value> = values
            .iter()
            .map(|(key, value)| (key.clone(), Value::Object(value.clone())))
            .collect();
        let hash = compute_hash(&map);

        let transfer = map
            .values()
            .filter_map(|value| value.get("bitmapId").and_then(Value::as_str))
            .map(str::to_owned)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        Self { map, hash, transfer }
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// SHA-256 over `key:json` lines in key order.
///
/// Keys are sorted before hashing, so two maps with the same entries hash the
/// same no matter how they were filled.
pub fn compute_hash(map: &BTreeMap<String, Value>) -> String {
    if map.is_empty() {
        return String::new();
    }

    let mut hasher = Sha256::new();
    for (key, value) in map {
        hasher.update(key.as_bytes());
        hasher.update(b":");
        hasher.update(value.to_string().as_bytes());
        hasher.update(b"\n");
    }

    hasher.finalize().iter().map(|byte| format!("{byte:02x}")).collect()
}
