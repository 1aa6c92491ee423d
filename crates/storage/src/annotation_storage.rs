use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;
use tracing::debug;

use crate::{
    merge_over, AnnotationStore, FrozenAnnotationStorage, SerializableStorage, StorageResult,
    ValueBag,
};

type Callback = Box<dyn FnMut()>;
type EditorCallback = Box<dyn FnMut(Option<u64>)>;

/// Live key/value storage for one open document.
///
/// The `modified` flag is edge triggered: `on_set_modified` runs on the
/// transition from unmodified to modified only, and `on_reset_modified` on the
/// way back.
#[derive(Default)]
pub struct AnnotationStorage {
    values: BTreeMap<String, ValueBag>,
    modified: bool,
    on_set_modified: Option<Callback>,
    on_reset_modified: Option<Callback>,
    on_annotation_editor: Option<EditorCallback>,
}

impl fmt::Debug for AnnotationStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnnotationStorage")
            .field("values", &self.values)
            .field("modified", &self.modified)
            .finish_non_exhaustive()
    }
}

impl AnnotationStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_set_modified(&mut self, callback: impl FnMut() + 'static) {
        self.on_set_modified = Some(Box::new(callback));
    }

    pub fn on_reset_modified(&mut self, callback: impl FnMut() + 'static) {
        self.on_reset_modified = Some(Box::new(callback));
    }

    /// Called with the `annotationType` of every editor record written, and
    /// with `None` once the last editor record is removed.
    pub fn on_annotation_editor(&mut self, callback: impl FnMut(Option<u64>) + 'static) {
        self.on_annotation_editor = Some(Box::new(callback));
    }

    /// Writes the whole record, dropping fields that are absent from `value`.
    pub fn replace_value(&mut self, key: &str, value: ValueBag) {
        let editor_type = annotation_type(&value);
        if self.values.get(key) != Some(&value) {
            self.values.insert(key.to_owned(), value);
            self.set_modified();
        }
        self.notify_editor(editor_type);
    }

    pub fn reset_modified(&mut self) {
        if self.modified {
            self.modified = false;
            debug!("annotation storage reset to unmodified");
            if let Some(callback) = self.on_reset_modified.as_mut() {
                callback();
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Number of editor records per `annotationType`, or `None` when there are
    /// no editor records.
    pub fn editor_stats(&self) -> Option<BTreeMap<u64, usize>> {
        let mut stats = BTreeMap::new();
        for value in self.values.values() {
            if let Some(kind) = annotation_type(value) {
                *stats.entry(kind).or_insert(0) += 1;
            }
        }
        (!stats.is_empty()).then_some(stats)
    }

    /// Snapshot that cannot be modified, used for printing.
    pub fn freeze(&self) -> FrozenAnnotationStorage {
        FrozenAnnotationStorage::new(self.values.clone())
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.reset_modified();
    }

    fn set_modified(&mut self) {
        if !self.modified {
            self.modified = true;
            debug!("annotation storage modified");
            if let Some(callback) = self.on_set_modified.as_mut() {
                callback();
            }
        }
    }

    fn notify_editor(&mut self, editor_type: Option<u64>) {
        if let (Some(kind), Some(callback)) = (editor_type, self.on_annotation_editor.as_mut()) {
            callback(Some(kind));
        }
    }
}

impl AnnotationStore for AnnotationStorage {
    fn get_value(&self, key: &str, default: &ValueBag) -> ValueBag {
        merge_over(default, self.values.get(key))
    }

    fn get_raw_value(&self, key: &str) -> Option<&ValueBag> {
        self.values.get(key)
    }

    /// Merges `value` into the stored record field by field.
    fn set_value(&mut self, key: &str, value: ValueBag) -> StorageResult<()> {
        let editor_type = annotation_type(&value);
        let mut changed = false;

        match self.values.get_mut(key) {
            Some(existing) => {
                for (field, new_value) in value {
                    if existing.get(&field) != Some(&new_value) {
                        existing.insert(field, new_value);
                        changed = true;
                    }
                }
            }
            None => {
                self.values.insert(key.to_owned(), value);
                changed = true;
            }
        }

        if changed {
            self.set_modified();
        }
        self.notify_editor(editor_type);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> StorageResult<()> {
        if self.values.remove(key).is_none() {
            return Ok(());
        }

        if self.values.is_empty() {
            self.reset_modified();
        } else {
            self.set_modified();
        }

        if self.on_annotation_editor.is_some()
            && !self.values.values().any(|value| annotation_type(value).is_some())
        {
            if let Some(callback) = self.on_annotation_editor.as_mut() {
                callback(None);
            }
        }
        Ok(())
    }

    fn size(&self) -> usize {
        self.values.len()
    }

    fn modified(&self) -> bool {
        self.modified
    }

    fn serializable(&self) -> SerializableStorage {
        SerializableStorage::from_values(&self.values)
    }
}

fn annotation_type(value: &ValueBag) -> Option<u64> {
    value.get("annotationType").and_then(Value::as_u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;
    use std::rc::Rc;

    fn bag(value: Value) -> ValueBag {
        crate::to_value_bag("test", value).expect("object literal")
    }

    fn counting_storage() -> (AnnotationStorage, Rc<Cell<u32>>) {
        let calls = Rc::new(Cell::new(0));
        let mut storage = AnnotationStorage::new();
        let counter = Rc::clone(&calls);
        storage.on_set_modified(move || counter.set(counter.get() + 1));
        (storage, calls)
    }

    #[test]
    fn get_value_merges_without_touching_default() {
        let mut storage = AnnotationStorage::new();
        storage.set_value("123A", bag(json!({ "value": "stored" }))).expect("set");

        let default = bag(json!({ "value": "default", "other": 1 }));
        let merged = storage.get_value("123A", &default);

        assert_eq!(merged, bag(json!({ "value": "stored", "other": 1 })));
        assert_eq!(default, bag(json!({ "value": "default", "other": 1 })));
        assert_eq!(storage.get_value("missing", &default), default);
    }

    #[test]
    fn set_value_merges_fields() {
        let mut storage = AnnotationStorage::new();
        storage.set_value("a", bag(json!({ "x": 1, "y": 2 }))).expect("set");
        storage.set_value("a", bag(json!({ "y": 3 }))).expect("set");

        assert_eq!(storage.get_raw_value("a"), Some(&bag(json!({ "x": 1, "y": 3 }))));
    }

    #[test]
    fn modified_callback_fires_on_first_change_only() {
        let (mut storage, calls) = counting_storage();

        storage.set_value("asdf", bag(json!({ "value": "original" }))).expect("set");
        assert_eq!(calls.get(), 1);

        storage.reset_modified();
        storage.set_value("asdf", bag(json!({ "value": "original" }))).expect("set");
        assert_eq!(calls.get(), 1);
        assert!(!storage.modified());

        storage.set_value("asdf", bag(json!({ "value": "modified" }))).expect("set");
        assert_eq!(calls.get(), 2);
        assert!(storage.modified());

        storage.set_value("asdf", bag(json!({ "value": "again" }))).expect("set");
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn removing_last_entry_resets_modified() {
        let resets = Rc::new(Cell::new(0));
        let mut storage = AnnotationStorage::new();
        let counter = Rc::clone(&resets);
        storage.on_reset_modified(move || counter.set(counter.get() + 1));

        storage.set_value("a", bag(json!({ "v": 1 }))).expect("set");
        storage.set_value("b", bag(json!({ "v": 2 }))).expect("set");
        storage.remove("a").expect("remove");
        assert!(storage.modified());

        storage.remove("b").expect("remove");
        assert!(!storage.modified());
        assert_eq!(resets.get(), 1);

        storage.remove("b").expect("removing twice is a no-op");
        assert_eq!(resets.get(), 1);
    }

    #[test]
    fn replace_value_drops_stale_fields() {
        let mut storage = AnnotationStorage::new();
        storage.replace_value("a", bag(json!({ "x": 1, "stale": true })));
        storage.replace_value("a", bag(json!({ "x": 2 })));

        assert_eq!(storage.get_raw_value("a"), Some(&bag(json!({ "x": 2 }))));
    }

    #[test]
    fn editor_callback_reports_types_and_last_removal() {
        let seen = Rc::new(std::cell::RefCell::new(Vec::new()));
        let mut storage = AnnotationStorage::new();
        let log = Rc::clone(&seen);
        storage.on_annotation_editor(move |kind| log.borrow_mut().push(kind));

        storage.replace_value("e1", bag(json!({ "annotationType": 15 })));
        storage.set_value("field", bag(json!({ "value": "x" }))).expect("set");
        storage.remove("e1").expect("remove");

        assert_eq!(*seen.borrow(), vec![Some(15), None]);
    }

    #[test]
    fn editor_stats_counts_by_type() {
        let mut storage = AnnotationStorage::new();
        assert_eq!(storage.editor_stats(), None);

        storage.replace_value("e1", bag(json!({ "annotationType": 3 })));
        storage.replace_value("e2", bag(json!({ "annotationType": 3 })));
        storage.replace_value("e3", bag(json!({ "annotationType": 13 })));

        let stats = storage.editor_stats().expect("stats");
        assert_eq!(stats.get(&3), Some(&2));
        assert_eq!(stats.get(&13), Some(&1));
    }
}
