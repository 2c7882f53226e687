//! Windows registry collaborator
//!
//! Only the printer resource touches the registry, and it does so through
//! this trait so probes and handlers stay testable on any host. Methods
//! return `io::Result`; call sites map failures into the probe/execution
//! error taxonomy.

use std::collections::BTreeMap;
use std::io;
use std::sync::Mutex;

/// Key-existence checks and value read/write under a registry hive
pub trait RegistryAccessor: std::fmt::Debug + Send + Sync {
    fn key_exists(&self, key: &str) -> io::Result<bool>;

    fn read_value(&self, key: &str, name: &str) -> io::Result<Option<String>>;

    /// Set a value, creating the key if needed
    fn set_value(&self, key: &str, name: &str, value: &str) -> io::Result<()>;

    /// Delete a key and its values; returns whether the key existed
    fn delete_key(&self, key: &str) -> io::Result<bool>;
}

/// In-memory registry used in tests and on non-Windows hosts
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    keys: Mutex<BTreeMap<String, BTreeMap<String, String>>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a key, e.g. to simulate an already-installed printer
    pub fn seed_key(&self, key: &str) {
        self.keys
            .lock()
            .expect("registry lock")
            .entry(key.to_string())
            .or_default();
    }
}

impl RegistryAccessor for MemoryRegistry {
    fn key_exists(&self, key: &str) -> io::Result<bool> {
        Ok(self.keys.lock().expect("registry lock").contains_key(key))
    }

    fn read_value(&self, key: &str, name: &str) -> io::Result<Option<String>> {
        Ok(self
            .keys
            .lock()
            .expect("registry lock")
            .get(key)
            .and_then(|values| values.get(name).cloned()))
    }

    fn set_value(&self, key: &str, name: &str, value: &str) -> io::Result<()> {
        self.keys
            .lock()
            .expect("registry lock")
            .entry(key.to_string())
            .or_default()
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn delete_key(&self, key: &str) -> io::Result<bool> {
        Ok(self
            .keys
            .lock()
            .expect("registry lock")
            .remove(key)
            .is_some())
    }
}
