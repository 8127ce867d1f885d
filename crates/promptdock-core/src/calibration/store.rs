// Promptdock Calibration Store
// Persisted container -> sub-target -> record mapping

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::target::Target;

/// One persisted calibration for one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    pub anchor_image_path: PathBuf,
    pub offset_x: i32,
    pub offset_y: i32,
    pub window_title_pattern: String,
    /// Explicit calibration flag. Optional for compatibility with
    /// stores written before the flag existed; those inferred
    /// calibration state from a non-zero offset, which made a
    /// legitimate (0,0) offset indistinguishable from "never
    /// calibrated".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    calibrated: Option<bool>,
}

impl CalibrationRecord {
    /// A record produced by a completed calibration session.
    pub fn calibrated(
        anchor_image_path: PathBuf,
        offset_x: i32,
        offset_y: i32,
        window_title_pattern: String,
    ) -> Self {
        Self {
            anchor_image_path,
            offset_x,
            offset_y,
            window_title_pattern,
            calibrated: Some(true),
        }
    }

    /// Placeholder record for a target that has never been calibrated.
    pub fn uncalibrated(anchor_image_path: PathBuf, window_title_pattern: String) -> Self {
        Self {
            anchor_image_path,
            offset_x: 0,
            offset_y: 0,
            window_title_pattern,
            calibrated: Some(false),
        }
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrated
            .unwrap_or(self.offset_x != 0 || self.offset_y != 0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("calibration store parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// The container -> sub-target -> record mapping, loaded at startup
/// and written back immediately after each completed calibration.
///
/// Only the main thread writes; send workers read a snapshot of the
/// record they need before touching any external window.
#[derive(Debug)]
pub struct CalibrationStore {
    records: IndexMap<String, IndexMap<String, CalibrationRecord>>,
    path: PathBuf,
}

impl CalibrationStore {
    /// Load the store, starting empty when the file does not exist yet.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let records = if path.exists() {
            serde_json::from_str(&std::fs::read_to_string(&path)?)?
        } else {
            IndexMap::new()
        };
        Ok(Self { records, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, target: &Target) -> Option<&CalibrationRecord> {
        self.records
            .get(&target.container)
            .and_then(|subs| subs.get(&target.sub_target))
    }

    /// Replace the target's record and persist the whole store.
    pub fn upsert(&mut self, target: &Target, record: CalibrationRecord) -> Result<(), StoreError> {
        self.records
            .entry(target.container.clone())
            .or_default()
            .insert(target.sub_target.clone(), record);
        self.save()
    }

    fn save(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.records)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}
