use std::collections::HashMap;

use parking_lot::RwLock;

use super::{File, FileList, Storage};
use crate::error::ChordError;

/// In-memory `Storage`, grounded on `store::backend::MemoryStorage`. Used
/// as the default backup/local store in tests.
pub struct MemoryStorage {
    data: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    fn get_files_name(&self) -> Vec<String> {
        self.data.read().keys().cloned().collect()
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, ChordError> {
        self.data
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| ChordError::Storage(format!("key not found: {key}")))
    }

    fn put(&self, key: &str, value: Vec<u8>) -> Result<(), ChordError> {
        self.data.write().insert(key.to_string(), value);
        Ok(())
    }

    fn update(&self, key: &str, value: Vec<u8>) -> Result<(), ChordError> {
        let mut guard = self.data.write();
        if !guard.contains_key(key) {
            return Err(ChordError::Storage(format!("key not found: {key}")));
        }
        guard.insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), ChordError> {
        self.data
            .write()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| ChordError::Storage(format!("key not found: {key}")))
    }

    fn put_files(&self, files: FileList) -> Result<(), ChordError> {
        let mut guard = self.data.write();
        for file in files {
            guard.insert(file.key, file.value);
        }
        Ok(())
    }

    fn get_all_files(&self) -> Result<FileList, ChordError> {
        Ok(self
            .data
            .read()
            .iter()
            .map(|(k, v)| File {
                key: k.clone(),
                value: v.clone(),
            })
            .collect())
    }

    fn get_files_by_filter(&self, filter: &dyn Fn(&str) -> bool) -> Result<FileList, ChordError> {
        Ok(self
            .data
            .read()
            .iter()
            .filter(|(k, _)| filter(k))
            .map(|(k, v)| File {
                key: k.clone(),
                value: v.clone(),
            })
            .collect())
    }

    fn extract_files_by_filter(&self, filter: &dyn Fn(&str) -> bool) -> Result<FileList, ChordError> {
        let mut guard = self.data.write();
        let keys: Vec<String> = guard.keys().filter(|k| filter(k)).cloned().collect();
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = guard.remove(&key) {
                out.push(File { key, value });
            }
        }
        Ok(out)
    }

    fn clear(&self) -> Result<(), ChordError> {
        self.data.write().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trips() {
        let s = MemoryStorage::new();
        s.put("x", b"hi".to_vec()).unwrap();
        assert_eq!(s.get("x").unwrap(), b"hi".to_vec());
    }

    #[test]
    fn update_absent_key_errors() {
        let s = MemoryStorage::new();
        assert!(s.update("missing", b"x".to_vec()).is_err());
    }

    #[test]
    fn delete_absent_key_errors() {
        let s = MemoryStorage::new();
        assert!(s.delete("missing").is_err());
    }

    #[test]
    fn extract_by_filter_removes_matches_only() {
        let s = MemoryStorage::new();
        s.put("a1", b"1".to_vec()).unwrap();
        s.put("a2", b"2".to_vec()).unwrap();
        s.put("b1", b"3".to_vec()).unwrap();
        let extracted = s.extract_files_by_filter(&|k| k.starts_with('a')).unwrap();
        assert_eq!(extracted.len(), 2);
        assert_eq!(s.get_files_name(), vec!["b1".to_string()]);
    }

    #[test]
    fn hash_collisions_keep_distinct_filenames() {
        let s = MemoryStorage::new();
        s.put("name-one", b"v1".to_vec()).unwrap();
        s.put("name-two", b"v2".to_vec()).unwrap();
        assert_eq!(s.get("name-one").unwrap(), b"v1".to_vec());
        assert_eq!(s.get("name-two").unwrap(), b"v2".to_vec());
    }
}
