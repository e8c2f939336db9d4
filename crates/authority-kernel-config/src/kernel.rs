// crates/authority-kernel-config/src/kernel.rs
// ============================================================================
// Module: Config Kernel
// Description: Namespaced key/value store with versions, validation, and cache.
// Purpose: Hold runtime configuration with history, rollback, and snapshots.
// Dependencies: authority-kernel-core, jsonschema, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Every write bumps a per-key version counter and is validated against a
//! registered JSON Schema before it applies. Deletes deactivate rather than
//! remove, so history survives. Snapshots are deterministic ordered maps;
//! `validate_snapshot` diffs an external snapshot against live state.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;

use authority_kernel_core::Clock;
use authority_kernel_core::SystemClock;
use authority_kernel_core::Timestamp;
use jsonschema::Draft;
use jsonschema::Validator;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Data Types
// ============================================================================

/// JSON data-type tag stored with each entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigDataType {
    /// UTF-8 string value.
    String,
    /// Numeric value.
    Number,
    /// Boolean value.
    Boolean,
    /// JSON object value.
    Object,
    /// JSON array value.
    Array,
}

impl ConfigDataType {
    /// Classifies a JSON value; `null` is not a storable configuration value.
    #[must_use]
    pub const fn of(value: &Value) -> Option<Self> {
        match value {
            Value::String(_) => Some(Self::String),
            Value::Number(_) => Some(Self::Number),
            Value::Bool(_) => Some(Self::Boolean),
            Value::Object(_) => Some(Self::Object),
            Value::Array(_) => Some(Self::Array),
            Value::Null => None,
        }
    }
}

/// One stored configuration version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry {
    /// Namespace the key lives in.
    pub namespace: String,
    /// Key within the namespace.
    pub key: String,
    /// Stored value.
    pub value: Value,
    /// Data-type tag of the stored value.
    pub data_type: ConfigDataType,
    /// Per-key monotonic version, starting at 1.
    pub version: u32,
    /// False once the key is deleted (deactivated).
    pub is_active: bool,
    /// Identity that applied this version.
    pub updated_by: String,
    /// Instant this version was applied.
    pub updated_at: Timestamp,
}

/// Deterministic ordered snapshot of active values.
pub type ConfigSnapshot = BTreeMap<String, BTreeMap<String, Value>>;

/// Diff between an external snapshot and live state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDiff {
    /// Keys present live but missing from the snapshot.
    pub missing: Vec<(String, String)>,
    /// Keys present in the snapshot but not live.
    pub extra: Vec<(String, String)>,
    /// Keys present in both with differing values.
    pub changed: Vec<(String, String)>,
}

impl SnapshotDiff {
    /// Returns true when the snapshot matches live state exactly.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty() && self.changed.is_empty()
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration kernel errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No active value exists for the key.
    #[error("config key not found: {namespace}/{key}")]
    NotFound {
        /// Namespace the lookup used.
        namespace: String,
        /// Key the lookup used.
        key: String,
    },
    /// The value failed the registered schema.
    #[error("config value rejected by schema for {namespace}/{key}: {message}")]
    SchemaViolation {
        /// Namespace of the rejected write.
        namespace: String,
        /// Key of the rejected write.
        key: String,
        /// Validator message.
        message: String,
    },
    /// The registered schema itself is invalid.
    #[error("invalid config schema: {0}")]
    InvalidSchema(String),
    /// `null` is not a storable configuration value.
    #[error("config value must not be null")]
    NullValue,
    /// The requested rollback version does not exist.
    #[error("config version not found: {namespace}/{key} v{version}")]
    VersionNotFound {
        /// Namespace of the rollback target.
        namespace: String,
        /// Key of the rollback target.
        key: String,
        /// Requested version.
        version: u32,
    },
}

// ============================================================================
// SECTION: Config Kernel
// ============================================================================

/// Composite key addressing one configuration slot.
type SlotKey = (String, String);

/// Namespaced, versioned configuration store.
///
/// # Invariants
/// - Versions per key are strictly increasing from 1 and never removed.
/// - A write validated by a registered schema is the only way a value
///   becomes visible.
pub struct ConfigKernel {
    /// Version history per slot, ascending by version.
    entries: RwLock<BTreeMap<SlotKey, Vec<ConfigEntry>>>,
    /// Compiled validation schemas per slot.
    schemas: RwLock<HashMap<SlotKey, Validator>>,
    /// Read cache of active values, invalidated on writes and `reload`.
    cache: RwLock<HashMap<SlotKey, Value>>,
    /// Clock stamping entry updates.
    clock: Arc<dyn Clock>,
}

impl Default for ConfigKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigKernel {
    /// Creates a kernel stamped by the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates a kernel stamped by an injected clock.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            schemas: RwLock::new(HashMap::new()),
            cache: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Registers a validation schema for one slot.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidSchema`] when the schema fails to
    /// compile under draft 2020-12.
    pub fn register_schema(
        &self,
        namespace: &str,
        key: &str,
        schema: &Value,
    ) -> Result<(), ConfigError> {
        let validator = jsonschema::options()
            .with_draft(Draft::Draft202012)
            .build(schema)
            .map_err(|err| ConfigError::InvalidSchema(err.to_string()))?;
        self.schemas
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(slot(namespace, key), validator);
        Ok(())
    }

    /// Returns the active value for a slot.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] when no active value exists.
    pub fn get(&self, namespace: &str, key: &str) -> Result<Value, ConfigError> {
        let slot_key = slot(namespace, key);
        if let Some(value) =
            self.cache.read().unwrap_or_else(PoisonError::into_inner).get(&slot_key)
        {
            return Ok(value.clone());
        }
        let value = {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            latest_active(&entries, &slot_key).map(|entry| entry.value.clone())
        };
        let Some(value) = value else {
            return Err(ConfigError::NotFound {
                namespace: namespace.to_string(),
                key: key.to_string(),
            });
        };
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(slot_key, value.clone());
        Ok(value)
    }

    /// Returns every active value within a namespace, ordered by key.
    #[must_use]
    pub fn get_namespace(&self, namespace: &str) -> BTreeMap<String, Value> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .iter()
            .filter(|((entry_namespace, _), _)| entry_namespace == namespace)
            .filter_map(|(_, history)| {
                history
                    .last()
                    .filter(|entry| entry.is_active)
                    .map(|entry| (entry.key.clone(), entry.value.clone()))
            })
            .collect()
    }

    /// Returns values for many slots, aligned to the request order.
    #[must_use]
    pub fn get_many(&self, slots: &[(&str, &str)]) -> Vec<Option<Value>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        slots
            .iter()
            .map(|(namespace, key)| {
                latest_active(&entries, &slot(namespace, key)).map(|entry| entry.value.clone())
            })
            .collect()
    }

    /// Writes a new version after schema validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NullValue`] for `null` values and
    /// [`ConfigError::SchemaViolation`] when a registered schema rejects the
    /// value.
    pub fn set(
        &self,
        namespace: &str,
        key: &str,
        value: Value,
        updated_by: &str,
    ) -> Result<ConfigEntry, ConfigError> {
        let Some(data_type) = ConfigDataType::of(&value) else {
            return Err(ConfigError::NullValue);
        };
        let slot_key = slot(namespace, key);
        {
            let schemas = self.schemas.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(validator) = schemas.get(&slot_key)
                && let Err(err) = validator.validate(&value)
            {
                return Err(ConfigError::SchemaViolation {
                    namespace: namespace.to_string(),
                    key: key.to_string(),
                    message: err.to_string(),
                });
            }
        }
        let entry = {
            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            let history = entries.entry(slot_key.clone()).or_default();
            let version = history.last().map_or(1, |last| last.version.saturating_add(1));
            let entry = ConfigEntry {
                namespace: namespace.to_string(),
                key: key.to_string(),
                value,
                data_type,
                version,
                is_active: true,
                updated_by: updated_by.to_string(),
                updated_at: self.clock.now(),
            };
            history.push(entry.clone());
            entry
        };
        self.cache.write().unwrap_or_else(PoisonError::into_inner).remove(&slot_key);
        Ok(entry)
    }

    /// Deactivates a slot, preserving its history.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] when no active value exists.
    pub fn delete(&self, namespace: &str, key: &str, updated_by: &str) -> Result<(), ConfigError> {
        let slot_key = slot(namespace, key);
        {
            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            let last_active = entries
                .get(&slot_key)
                .and_then(|history| history.last())
                .filter(|entry| entry.is_active)
                .cloned();
            let Some(last) = last_active else {
                return Err(ConfigError::NotFound {
                    namespace: namespace.to_string(),
                    key: key.to_string(),
                });
            };
            if let Some(history) = entries.get_mut(&slot_key) {
                history.push(ConfigEntry {
                    version: last.version.saturating_add(1),
                    is_active: false,
                    updated_by: updated_by.to_string(),
                    updated_at: self.clock.now(),
                    ..last
                });
            }
        }
        self.cache.write().unwrap_or_else(PoisonError::into_inner).remove(&slot_key);
        Ok(())
    }

    /// Returns the full version history for a slot, ascending by version.
    #[must_use]
    pub fn history(&self, namespace: &str, key: &str) -> Vec<ConfigEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&slot(namespace, key))
            .cloned()
            .unwrap_or_default()
    }

    /// Restores a prior version's value as a new version.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::VersionNotFound`] when the requested version
    /// does not exist.
    pub fn rollback(
        &self,
        namespace: &str,
        key: &str,
        version: u32,
        updated_by: &str,
    ) -> Result<ConfigEntry, ConfigError> {
        let target = self
            .history(namespace, key)
            .into_iter()
            .find(|entry| entry.version == version)
            .ok_or_else(|| ConfigError::VersionNotFound {
                namespace: namespace.to_string(),
                key: key.to_string(),
                version,
            })?;
        self.set(namespace, key, target.value, updated_by)
    }

    /// Returns a deterministic snapshot of the requested namespaces.
    #[must_use]
    pub fn snapshot(&self, namespaces: &[&str]) -> ConfigSnapshot {
        namespaces
            .iter()
            .map(|namespace| ((*namespace).to_string(), self.get_namespace(namespace)))
            .collect()
    }

    /// Diffs an external snapshot against live state for the namespaces.
    #[must_use]
    pub fn validate_snapshot(
        &self,
        snapshot: &ConfigSnapshot,
        namespaces: &[&str],
    ) -> SnapshotDiff {
        let live = self.snapshot(namespaces);
        let mut diff = SnapshotDiff::default();
        for (namespace, live_keys) in &live {
            let snapshot_keys = snapshot.get(namespace);
            for (key, live_value) in live_keys {
                match snapshot_keys.and_then(|keys| keys.get(key)) {
                    None => diff.missing.push((namespace.clone(), key.clone())),
                    Some(snapshot_value) if snapshot_value != live_value => {
                        diff.changed.push((namespace.clone(), key.clone()));
                    }
                    Some(_) => {}
                }
            }
        }
        for namespace in namespaces {
            let Some(snapshot_keys) = snapshot.get(*namespace) else {
                continue;
            };
            let live_keys = live.get(*namespace);
            for key in snapshot_keys.keys() {
                if live_keys.and_then(|keys| keys.get(key)).is_none() {
                    diff.extra.push(((*namespace).to_string(), key.clone()));
                }
            }
        }
        diff
    }

    /// Invalidates every cached value.
    pub fn reload(&self) {
        self.cache.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds a slot key.
fn slot(namespace: &str, key: &str) -> SlotKey {
    (namespace.to_string(), key.to_string())
}

/// Returns the latest version of a slot when it is active.
fn latest_active<'a>(
    entries: &'a BTreeMap<SlotKey, Vec<ConfigEntry>>,
    slot_key: &SlotKey,
) -> Option<&'a ConfigEntry> {
    entries.get(slot_key).and_then(|history| history.last()).filter(|entry| entry.is_active)
}
