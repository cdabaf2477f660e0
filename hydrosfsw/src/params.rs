//! Runtime parameter store
//!
//! Process-wide named configuration values. Records are created at startup
//! from compiled defaults overlaid with the persisted snapshot; `set`
//! mutates them and, on a hard set, rewrites the full snapshot document so
//! memory and disk converge. Records are never deleted.

use log::{error, info, warn};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use hydroslibgs::{FswError, FswResult, ParamValue};

use crate::config::default_parameters;

/// A single named runtime parameter
#[derive(Debug, Clone)]
pub struct ParameterRecord {
    pub value: ParamValue,
    /// Whether the last write requested snapshot persistence
    pub persisted: bool,
}

pub struct ParameterStore {
    records: BTreeMap<String, ParameterRecord>,
    snapshot_path: Option<PathBuf>,
}

impl ParameterStore {
    /// Store seeded from defaults only, with no persistence. Hard sets are
    /// accepted but stay in memory.
    pub fn in_memory() -> Self {
        Self {
            records: seeded_records(),
            snapshot_path: None,
        }
    }

    /// Store seeded from defaults overlaid with the snapshot document at
    /// `path`. A missing snapshot is not an error; the first hard set
    /// creates it.
    pub fn with_snapshot<P: AsRef<Path>>(path: P) -> FswResult<Self> {
        let path = path.as_ref();
        let mut records = seeded_records();

        if path.exists() {
            let doc = read_snapshot_document(path)?;
            info!(
                "loaded {} persisted parameters from {}",
                doc.len(),
                path.display()
            );
            for (name, value) in doc {
                let value: ParamValue = serde_json::from_value(value)?;
                records.insert(
                    name,
                    ParameterRecord {
                        value,
                        persisted: true,
                    },
                );
            }
        } else {
            info!(
                "no parameter snapshot at {}; starting from defaults",
                path.display()
            );
        }

        Ok(Self {
            records,
            snapshot_path: Some(path.to_path_buf()),
        })
    }

    pub fn get(&self, name: &str) -> FswResult<ParamValue> {
        self.records
            .get(name)
            .map(|r| r.value.clone())
            .ok_or_else(|| FswError::UnknownParameter(name.to_string()))
    }

    /// Numeric view of a parameter
    pub fn get_f64(&self, name: &str) -> FswResult<f64> {
        let value = self.get(name)?;
        value
            .as_f64()
            .ok_or_else(|| FswError::ParameterValidation {
                name: name.to_string(),
                reason: format!("expected numeric value, found {}", value.type_name()),
            })
    }

    /// Update a parameter, returning the previous value. The in-memory
    /// record is updated unconditionally; with `hard_set` the full snapshot
    /// document is then rewritten. A crash between the two is an accepted,
    /// unresolved window: the error path below flags it rather than rolling
    /// the memory update back.
    pub fn set(&mut self, name: &str, value: ParamValue, hard_set: bool) -> FswResult<ParamValue> {
        let record = self
            .records
            .get_mut(name)
            .ok_or_else(|| FswError::UnknownParameter(name.to_string()))?;
        let previous = std::mem::replace(&mut record.value, value.clone());
        record.persisted = hard_set;

        if hard_set {
            if let Err(e) = self.rewrite_snapshot(name, &value) {
                error!(
                    "parameter {name} updated in memory but snapshot write failed: {e}; \
                     persisted and in-memory values now diverge"
                );
                return Err(e);
            }
        }

        Ok(previous)
    }

    /// Load-modify-store of the entire snapshot document
    fn rewrite_snapshot(&self, name: &str, value: &ParamValue) -> FswResult<()> {
        let Some(path) = &self.snapshot_path else {
            warn!("hard set of {name} with no snapshot path; value kept in memory only");
            return Ok(());
        };

        let mut doc = if path.exists() {
            read_snapshot_document(path)?
        } else {
            Map::new()
        };
        doc.insert(name.to_string(), serde_json::to_value(value)?);
        fs::write(path, serde_json::to_string_pretty(&Value::Object(doc))?)?;
        Ok(())
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }
}

/// Read the full snapshot document. A zero-length file counts as an empty
/// document rather than malformed JSON.
fn read_snapshot_document(path: &Path) -> FswResult<Map<String, Value>> {
    let contents = fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(Map::new());
    }
    Ok(serde_json::from_str(&contents)?)
}

fn seeded_records() -> BTreeMap<String, ParameterRecord> {
    default_parameters()
        .into_iter()
        .map(|(name, value)| {
            (
                name.to_string(),
                ParameterRecord {
                    value,
                    persisted: false,
                },
            )
        })
        .collect()
}
