use std::collections::HashMap;
use std::sync::Arc;

use crate::record::FileRecord;

/// Path-keyed lookup over every record of one bundle.
/// 以完整路徑為鍵的套件記錄索引。
///
/// Iteration follows ingestion order. A duplicate path keeps the slot of its first
/// occurrence but holds the record written last.
#[derive(Debug, Clone, Default)]
pub struct FlatIndex {
    records: Vec<Arc<FileRecord>>,
    positions: HashMap<String, usize>,
}

impl FlatIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record, returning the one it replaced when the path was already taken.
    /// 插入記錄；若路徑已存在則回傳被取代的記錄。
    pub fn insert(&mut self, record: FileRecord) -> Option<Arc<FileRecord>> {
        let record = Arc::new(record);
        match self.positions.get(record.path()) {
            Some(&slot) => Some(std::mem::replace(&mut self.records[slot], record)),
            None => {
                self.positions
                    .insert(record.path().to_string(), self.records.len());
                self.records.push(record);
                None
            }
        }
    }

    pub fn get(&self, path: &str) -> Option<&Arc<FileRecord>> {
        self.positions.get(path).map(|&slot| &self.records[slot])
    }

    pub fn contains(&self, path: &str) -> bool {
        self.positions.contains_key(path)
    }

    /// Returns `true` when `path` names a text or binary record.
    pub fn is_openable(&self, path: &str) -> bool {
        self.get(path).is_some_and(|record| record.is_openable())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<FileRecord>> {
        self.records.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|record| record.path())
    }

    /// First record, in ingestion order, whose file name equals `name`.
    pub fn find_by_name(&self, name: &str) -> Option<&Arc<FileRecord>> {
        self.records.iter().find(|record| record.name() == name)
    }

    /// First record, in ingestion order, whose path ends with `suffix` on a
    /// component boundary (`notes/img.png` matches `img.png`, `bigimg.png` does not).
    pub fn find_by_suffix(&self, suffix: &str) -> Option<&Arc<FileRecord>> {
        if suffix.is_empty() {
            return None;
        }
        self.records
            .iter()
            .find(|record| has_path_suffix(record.path(), suffix))
    }
}

fn has_path_suffix(path: &str, suffix: &str) -> bool {
    match path.strip_suffix(suffix) {
        Some("") => true,
        Some(head) => head.ends_with('/'),
        None => false,
    }
}
