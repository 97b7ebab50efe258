//! Load and save the whole position under one storage key.
//!
//! Loading never fails: a missing key, unparsable JSON, or a document that
//! does not pass the schema check all fall back to the default configuration
//! (with a warning for the latter two).

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use lendcalc_common::types::{AssetId, BorrowedAsset, CollateralAsset, PositionConfig, Token};

/// Storage key holding the serialized configuration.
pub const CONFIG_KEY: &str = "defiConfig";

/// Key-value backend failures.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Reasons a stored document is not a valid configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("configuration must be a JSON object")]
    NotAnObject,

    #[error("field `{field}` must be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("invalid record in `{field}`: {source}")]
    InvalidRecord {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("multiplier must be a finite number within [0, 1] (got {0})")]
    InvalidMultiplier(f64),

    #[error("`{field}` of {collection} asset {id} must be a non-negative number")]
    InvalidValue {
        collection: &'static str,
        id: AssetId,
        field: &'static str,
    },

    #[error("duplicate id {id} in {collection}")]
    DuplicateId {
        collection: &'static str,
        id: AssetId,
    },
}

/// Durable string storage keyed by name.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// One `<key>.json` file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// Process-local storage, used in tests and when no directory is configured.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| StorageError::Unavailable("memory store lock poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StorageError::Unavailable("memory store lock poisoned".to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Parse and schema-check a stored configuration document.
pub fn parse_config(raw: &str) -> Result<PositionConfig, ConfigError> {
    let value: Value = serde_json::from_str(raw)?;
    validate_config(value)
}

/// Schema check for a configuration document.
pub fn validate_config(value: Value) -> Result<PositionConfig, ConfigError> {
    let Value::Object(mut object) = value else {
        return Err(ConfigError::NotAnObject);
    };

    let collaterals: Vec<CollateralAsset> = take_array(&mut object, "collaterals")?;
    let borrowed_assets: Vec<BorrowedAsset> = take_array(&mut object, "borrowedAssets")?;

    let borrow = match object.remove("borrow") {
        Some(v @ Value::Object(_)) => serde_json::from_value::<Token>(v).map_err(|source| {
            ConfigError::InvalidRecord {
                field: "borrow",
                source,
            }
        })?,
        _ => {
            return Err(ConfigError::WrongType {
                field: "borrow",
                expected: "an object",
            });
        }
    };

    let multiplier = object
        .get("multiplier")
        .and_then(Value::as_f64)
        .ok_or(ConfigError::WrongType {
            field: "multiplier",
            expected: "a number",
        })?;
    if !multiplier.is_finite() || !(0.0..=1.0).contains(&multiplier) {
        return Err(ConfigError::InvalidMultiplier(multiplier));
    }

    check_records(
        "collaterals",
        collaterals.iter().map(|c| (&c.id, c.price, c.amount)),
    )?;
    check_records(
        "borrowedAssets",
        borrowed_assets.iter().map(|a| (&a.id, a.price, a.amount)),
    )?;

    Ok(PositionConfig {
        collaterals,
        borrowed_assets,
        borrow,
        multiplier,
    })
}

/// Load the configuration, substituting the default on any failure.
pub fn load_config(store: &dyn KeyValueStore) -> PositionConfig {
    let raw = match store.get(CONFIG_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            tracing::info!("No saved configuration found, starting empty");
            return PositionConfig::default();
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read saved configuration, using defaults");
            return PositionConfig::default();
        }
    };

    match parse_config(&raw) {
        Ok(config) => {
            tracing::info!(
                collaterals = config.collaterals.len(),
                borrowed = config.borrowed_assets.len(),
                multiplier = config.multiplier,
                "Loaded saved configuration"
            );
            config
        }
        Err(e) => {
            tracing::warn!(error = %e, "Saved configuration is invalid, using defaults");
            PositionConfig::default()
        }
    }
}

/// Serialize and overwrite the stored configuration.
pub fn save_config(store: &dyn KeyValueStore, config: &PositionConfig) -> Result<(), StorageError> {
    let raw = serde_json::to_string(config)?;
    store.set(CONFIG_KEY, &raw)
}

fn take_array<T: DeserializeOwned>(
    object: &mut serde_json::Map<String, Value>,
    field: &'static str,
) -> Result<Vec<T>, ConfigError> {
    match object.remove(field) {
        Some(v @ Value::Array(_)) => {
            serde_json::from_value(v).map_err(|source| ConfigError::InvalidRecord { field, source })
        }
        _ => Err(ConfigError::WrongType {
            field,
            expected: "an array",
        }),
    }
}

fn check_records<'a>(
    collection: &'static str,
    records: impl Iterator<Item = (&'a AssetId, f64, f64)>,
) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for (id, price, amount) in records {
        for (field, value) in [("price", price), ("amount", amount)] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidValue {
                    collection,
                    id: id.clone(),
                    field,
                });
            }
        }
        if !seen.insert(id) {
            return Err(ConfigError::DuplicateId {
                collection,
                id: id.clone(),
            });
        }
    }
    Ok(())
}
