// Configuration loaded from YAML

use crate::snapshot::DEFAULT_EXPIRATION_MS;
use crate::sqlite::SqliteStorage;
use crate::storage::{FileStorage, MemoryStorage, Storage, validate_key};
use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const CONFIG_FILENAME: &str = "config.yml";
pub const DEFAULT_STORAGE_KEY: &str = "todo-list-data";
pub const DEFAULT_MODE: &str = "work";
const DB_FILENAME: &str = "todostore.db";

/// Where snapshots are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Memory,
    #[default]
    File,
    Sqlite,
}

impl Backend {
    /// Open the backend rooted at `data_dir`
    pub fn open(self, data_dir: &Path) -> Result<Box<dyn Storage>> {
        debug!(backend = ?self, data_dir = ?data_dir, "Opening storage backend");
        let storage: Box<dyn Storage> = match self {
            Backend::Memory => Box::new(MemoryStorage::new()),
            Backend::File => Box::new(FileStorage::open(data_dir)?),
            Backend::Sqlite => Box::new(SqliteStorage::open(data_dir.join(DB_FILENAME))?),
        };
        Ok(storage)
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("todostore")
}

fn default_storage_key() -> String {
    DEFAULT_STORAGE_KEY.to_string()
}

fn default_mode() -> String {
    DEFAULT_MODE.to_string()
}

fn default_expiration_hours() -> u32 {
    (DEFAULT_EXPIRATION_MS / (60 * 60 * 1000)) as u32
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: Backend,
    pub data_dir: PathBuf,
    pub storage_key: String,
    pub default_mode: String,
    /// Snapshots older than this are discarded on load
    pub expiration_hours: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            data_dir: default_data_dir(),
            storage_key: default_storage_key(),
            default_mode: default_mode(),
            expiration_hours: default_expiration_hours(),
        }
    }
}

impl Config {
    /// Read a config file. A missing file yields the defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = ?path, "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config =
            serde_yaml::from_str(&content).with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;

        info!(path = ?path, backend = ?config.backend, "Loaded config");
        Ok(config)
    }

    /// Resolve config from an explicit file, else `<data_dir>/config.yml`.
    /// An explicit `data_dir` wins over the file's value.
    pub fn resolve(config_path: Option<&Path>, data_dir: Option<&Path>) -> Result<Self> {
        let path = match (config_path, data_dir) {
            (Some(p), _) => p.to_path_buf(),
            (None, Some(dir)) => dir.join(CONFIG_FILENAME),
            (None, None) => default_data_dir().join(CONFIG_FILENAME),
        };

        let mut config = Self::load(&path)?;
        if let Some(dir) = data_dir {
            config.data_dir = dir.to_path_buf();
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_key(&self.storage_key)?;
        if self.default_mode.trim().is_empty() {
            return Err(eyre!("default_mode cannot be empty"));
        }
        if self.expiration_hours == 0 {
            return Err(eyre!("expiration_hours must be at least 1"));
        }
        Ok(())
    }

    pub fn expiration_ms(&self) -> i64 {
        i64::from(self.expiration_hours) * 60 * 60 * 1000
    }

    pub fn open_storage(&self) -> Result<Box<dyn Storage>> {
        self.backend.open(&self.data_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.backend, Backend::File);
        assert_eq!(config.storage_key, "todo-list-data");
        assert_eq!(config.default_mode, "work");
        assert_eq!(config.expiration_hours, 24);
        assert_eq!(config.expiration_ms(), DEFAULT_EXPIRATION_MS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_missing_file_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let config = Config::load(temp.path().join("nope.yml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_partial_yaml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILENAME);
        fs::write(&path, "backend: sqlite\nexpiration_hours: 2\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.backend, Backend::Sqlite);
        assert_eq!(config.expiration_hours, 2);
        assert_eq!(config.expiration_ms(), 2 * 60 * 60 * 1000);
        assert_eq!(config.storage_key, DEFAULT_STORAGE_KEY);
    }

    #[test]
    fn test_load_rejects_invalid() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILENAME);

        fs::write(&path, "backend: [not, a, backend]\n").unwrap();
        assert!(Config::load(&path).is_err());

        fs::write(&path, "storage_key: \"bad/key\"\n").unwrap();
        assert!(Config::load(&path).is_err());

        fs::write(&path, "expiration_hours: 0\n").unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_resolve_data_dir_overrides_file() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(CONFIG_FILENAME), "default_mode: life\ndata_dir: /elsewhere\n").unwrap();

        let config = Config::resolve(None, Some(temp.path())).unwrap();
        assert_eq!(config.default_mode, "life");
        assert_eq!(config.data_dir, temp.path());
    }

    #[test]
    fn test_open_storage_backends() {
        let temp = TempDir::new().unwrap();
        for backend in [Backend::Memory, Backend::File, Backend::Sqlite] {
            let config = Config {
                backend,
                data_dir: temp.path().to_path_buf(),
                ..Config::default()
            };
            let mut storage = config.open_storage().unwrap();
            storage.set_item("probe", "1").unwrap();
            assert_eq!(storage.get_item("probe").unwrap().as_deref(), Some("1"));
        }
        assert!(temp.path().join(DB_FILENAME).exists());
    }
}
