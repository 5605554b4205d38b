//! An in-memory `KeyValueStore`, so persistence tests can inspect exactly
//! what the store wrote without touching the filesystem.

use std::collections::HashMap;
use std::io;
use std::sync::Mutex;

use innerworld_core::storage::store::KeyValueStore;

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw record last written under `key`, if any.
    pub fn contents(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    /// Pre-seed a record, e.g. with a malformed payload.
    pub fn seed(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }
}

impl KeyValueStore for MemoryStore {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.contents(key))
    }

    fn write(&self, key: &str, value: &str) -> io::Result<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
