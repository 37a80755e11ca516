// Key-value slot backends for persisted snapshots

use eyre::{Context, Result, eyre};
use fs2::FileExt;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A string-keyed slot store, modelled on browser local storage.
///
/// Reads of a missing key return `Ok(None)`. Writes fully overwrite.
pub trait Storage {
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    fn set_item(&mut self, key: &str, value: &str) -> Result<()>;

    /// Removing a missing key is not an error
    fn remove_item(&mut self, key: &str) -> Result<()>;
}

impl<S: Storage + ?Sized> Storage for Box<S> {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        (**self).get_item(key)
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        (**self).set_item(key, value)
    }

    fn remove_item(&mut self, key: &str) -> Result<()> {
        (**self).remove_item(key)
    }
}

/// Keys double as file names and SQL values, so keep them tame
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(eyre!("Storage key cannot be empty"));
    }
    if key.len() > 64 {
        return Err(eyre!("Storage key too long: {} (max 64 chars)", key));
    }
    if !key.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
        return Err(eyre!("Invalid storage key: {} (must be alphanumeric with _/-)", key));
    }
    Ok(())
}

/// In-process storage; contents vanish with the value
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    items: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        validate_key(key)?;
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<()> {
        validate_key(key)?;
        self.items.remove(key);
        Ok(())
    }
}

/// One JSON file per key inside a directory
#[derive(Debug, Clone)]
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    /// Open (or create) file storage rooted at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).context("Failed to create storage directory")?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn item_path(&self, key: &str) -> PathBuf {
        self.base_path.join(format!("{}.json", key))
    }

    /// Take the per-key writer lock. `<key>.lock` is never renamed or
    /// removed, so every writer contends on the same inode.
    fn lock_key(&self, key: &str) -> Result<File> {
        let lock_path = self.base_path.join(format!("{}.lock", key));
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .context("Failed to open lock file")?;

        // Lock is released when file is dropped
        file.lock_exclusive().context("Failed to acquire file lock")?;
        Ok(file)
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        validate_key(key)?;
        let path = self.item_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Some(content))
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;
        let path = self.item_path(key);
        let tmp_path = self.base_path.join(format!("{}.json.tmp", key));

        let _lock = self.lock_key(key)?;

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)
            .context("Failed to open temp file for writing")?;

        file.write_all(value.as_bytes())?;
        file.sync_all()?;

        fs::rename(&tmp_path, &path).context("Failed to replace storage file")?;
        debug!(key, path = ?path, bytes = value.len(), "set_item: written");
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<()> {
        validate_key(key)?;
        let path = self.item_path(key);
        let _lock = self.lock_key(key)?;
        if path.exists() {
            fs::remove_file(&path).with_context(|| format!("Failed to remove {}", path.display()))?;
            debug!(key, "remove_item: removed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("todo-list-data").is_ok());
        assert!(validate_key("tasks_v2").is_ok());

        assert!(validate_key("").is_err());
        assert!(validate_key("../escape").is_err());
        assert!(validate_key("has space").is_err());
        assert!(validate_key(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_memory_storage() {
        let mut storage = MemoryStorage::new();
        assert!(storage.get_item("k").unwrap().is_none());

        storage.set_item("k", "one").unwrap();
        storage.set_item("k", "two").unwrap();
        assert_eq!(storage.get_item("k").unwrap().as_deref(), Some("two"));
        assert_eq!(storage.len(), 1);

        storage.remove_item("k").unwrap();
        storage.remove_item("k").unwrap();
        assert!(storage.is_empty());
    }

    #[test]
    fn test_file_storage_open_creates_directory() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("nested").join("store");

        let storage = FileStorage::open(&dir).unwrap();
        assert!(dir.exists());
        assert_eq!(storage.base_path(), dir.as_path());
    }

    #[test]
    fn test_file_storage_overwrite_and_remove() {
        let temp = TempDir::new().unwrap();
        let mut storage = FileStorage::open(temp.path()).unwrap();

        assert!(storage.get_item("slot").unwrap().is_none());

        storage.set_item("slot", r#"{"v":1}"#).unwrap();
        storage.set_item("slot", r#"{"v":2}"#).unwrap();
        assert_eq!(storage.get_item("slot").unwrap().as_deref(), Some(r#"{"v":2}"#));

        // Temp file is renamed away
        assert!(temp.path().join("slot.json").exists());
        assert!(!temp.path().join("slot.json.tmp").exists());

        storage.remove_item("slot").unwrap();
        assert!(storage.get_item("slot").unwrap().is_none());
        storage.remove_item("slot").unwrap();
    }

    #[test]
    fn test_file_storage_writer_waits_for_key_lock() {
        let temp = TempDir::new().unwrap();
        let mut storage = FileStorage::open(temp.path()).unwrap();
        storage.set_item("slot", r#"{"v":"first"}"#).unwrap();

        // Another writer holds the key lock
        let held = File::create(temp.path().join("slot.lock")).unwrap();
        held.lock_exclusive().unwrap();

        let mut writer = storage.clone();
        let handle = std::thread::spawn(move || writer.set_item("slot", r#"{"v":"second"}"#));

        std::thread::sleep(std::time::Duration::from_millis(200));
        assert!(!handle.is_finished());
        assert!(!temp.path().join("slot.json.tmp").exists());
        assert_eq!(storage.get_item("slot").unwrap().as_deref(), Some(r#"{"v":"first"}"#));

        FileExt::unlock(&held).unwrap();
        handle.join().unwrap().unwrap();

        assert_eq!(storage.get_item("slot").unwrap().as_deref(), Some(r#"{"v":"second"}"#));
        assert!(temp.path().join("slot.lock").exists());
    }

    #[test]
    fn test_file_storage_survives_reopen() {
        let temp = TempDir::new().unwrap();
        {
            let mut storage = FileStorage::open(temp.path()).unwrap();
            storage.set_item("slot", "persisted").unwrap();
        }
        let storage = FileStorage::open(temp.path()).unwrap();
        assert_eq!(storage.get_item("slot").unwrap().as_deref(), Some("persisted"));
    }

    #[test]
    fn test_boxed_storage_delegates() {
        let mut storage: Box<dyn Storage> = Box::new(MemoryStorage::new());
        storage.set_item("k", "v").unwrap();
        assert_eq!(storage.get_item("k").unwrap().as_deref(), Some("v"));
        assert!(storage.set_item("bad key", "v").is_err());
    }
}
