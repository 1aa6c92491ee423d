use std::collections::BTreeMap;

use crate::{
    merge_over, AnnotationStore, SerializableStorage, StorageError, StorageResult, ValueBag,
};

/// Read-only copy of a storage taken once, used while printing.
///
/// The serializable projection is computed at construction; every mutation is
/// rejected with [`StorageError::Frozen`].
#[derive(Debug, Clone, PartialEq)]
pub struct FrozenAnnotationStorage {
    values: BTreeMap<String, ValueBag>,
    serializable: SerializableStorage,
}

impl FrozenAnnotationStorage {
    pub(crate) fn new(values: BTreeMap<String, ValueBag>) -> Self {
        let serializable = SerializableStorage::from_values(&values);
        Self { values, serializable }
    }
}

impl AnnotationStore for FrozenAnnotationStorage {
    fn get_value(&self, key: &str, default: &ValueBag) -> ValueBag {
        merge_over(default, self.values.get(key))
    }

    fn get_raw_value(&self, key: &str) -> Option<&ValueBag> {
        self.values.get(key)
    }

    fn set_value(&mut self, _key: &str, _value: ValueBag) -> StorageResult<()> {
        Err(StorageError::Frozen)
    }

    fn remove(&mut self, _key: &str) -> StorageResult<()> {
        Err(StorageError::Frozen)
    }

    fn size(&self) -> usize {
        self.values.len()
    }

    fn modified(&self) -> bool {
        false
    }

    fn serializable(&self) -> SerializableStorage {
        self.serializable.clone()
    }
}
