use std::path::Path;

use super::{File, FileList, Storage};
use crate::error::ChordError;

/// `sled`-backed `Storage`, one embedded tree per directory, grounded on
/// `store::backend::SledStorage`. Used for the on-disk local store and the
/// `r` numbered backup stores.
pub struct SledStorage {
    db: sled::Db,
}

impl SledStorage {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ChordError> {
        let db = sled::open(path).map_err(|e| ChordError::Storage(e.to_string()))?;
        Ok(Self { db })
    }

    fn flush(&self) -> Result<(), ChordError> {
        self.db.flush().map_err(|e| ChordError::Storage(e.to_string()))?;
        Ok(())
    }
}

impl Storage for SledStorage {
    fn get_files_name(&self) -> Vec<String> {
        self.db
            .iter()
            .keys()
            .filter_map(|k| k.ok())
            .map(|k| String::from_utf8_lossy(&k).into_owned())
            .collect()
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, ChordError> {
        self.db
            .get(key)
            .map_err(|e| ChordError::Storage(e.to_string()))?
            .map(|v| v.to_vec())
            .ok_or_else(|| ChordError::Storage(format!("key not found: {key}")))
    }

    fn put(&self, key: &str, value: Vec<u8>) -> Result<(), ChordError> {
        self.db
            .insert(key, value)
            .map_err(|e| ChordError::Storage(e.to_string()))?;
        self.flush()
    }

    fn update(&self, key: &str, value: Vec<u8>) -> Result<(), ChordError> {
        if !self
            .db
            .contains_key(key)
            .map_err(|e| ChordError::Storage(e.to_string()))?
        {
            return Err(ChordError::Storage(format!("key not found: {key}")));
        }
        self.put(key, value)
    }

    fn delete(&self, key: &str) -> Result<(), ChordError> {
        let removed = self
            .db
            .remove(key)
            .map_err(|e| ChordError::Storage(e.to_string()))?;
        if removed.is_none() {
            return Err(ChordError::Storage(format!("key not found: {key}")));
        }
        self.flush()
    }

    fn put_files(&self, files: FileList) -> Result<(), ChordError> {
        for file in files {
            self.db
                .insert(file.key, file.value)
                .map_err(|e| ChordError::Storage(e.to_string()))?;
        }
        self.flush()
    }

    fn get_all_files(&self) -> Result<FileList, ChordError> {
        let mut out = Vec::new();
        for item in self.db.iter() {
            let (k, v) = item.map_err(|e| ChordError::Storage(e.to_string()))?;
            out.push(File {
                key: String::from_utf8_lossy(&k).into_owned(),
                value: v.to_vec(),
            });
        }
        Ok(out)
    }

    fn get_files_by_filter(&self, filter: &dyn Fn(&str) -> bool) -> Result<FileList, ChordError> {
        let mut out = Vec::new();
        for item in self.db.iter() {
            let (k, v) = item.map_err(|e| ChordError::Storage(e.to_string()))?;
            let key = String::from_utf8_lossy(&k).into_owned();
            if filter(&key) {
                out.push(File { key, value: v.to_vec() });
            }
        }
        Ok(out)
    }

    fn extract_files_by_filter(&self, filter: &dyn Fn(&str) -> bool) -> Result<FileList, ChordError> {
        let matching: Vec<String> = self
            .get_files_by_filter(filter)?
            .into_iter()
            .map(|f| f.key)
            .collect();
        let mut out = Vec::with_capacity(matching.len());
        for key in matching {
            if let Ok(Some(v)) = self.db.remove(&key) {
                out.push(File {
                    key,
                    value: v.to_vec(),
                });
            }
        }
        self.flush()?;
        Ok(out)
    }

    fn clear(&self) -> Result<(), ChordError> {
        self.db.clear().map_err(|e| ChordError::Storage(e.to_string()))?;
        self.flush()
    }
}
