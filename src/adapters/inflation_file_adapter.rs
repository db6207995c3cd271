//! Cumulative inflation persisted as JSON: `{"10": 45.0, "1": 4.5}`.
//!
//! Values on disk are percentages; [`InflationTable`] holds fractions.

use crate::domain::error::MelaoError;
use crate::domain::inflation::InflationTable;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub struct InflationFile {
    path: PathBuf,
}

impl InflationFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file reads as an empty table.
    pub fn load(&self) -> Result<InflationTable, MelaoError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no inflation file, using zeros");
                return Ok(InflationTable::new());
            }
            Err(e) => return Err(e.into()),
        };

        let raw: BTreeMap<String, f64> =
            serde_json::from_str(&content).map_err(|e| MelaoError::InvalidData {
                reason: format!("{}: {}", self.path.display(), e),
            })?;

        let mut entries = Vec::with_capacity(raw.len());
        for (key, pct) in raw {
            let period = key
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|p| *p >= 1)
                .ok_or_else(|| MelaoError::InvalidData {
                    reason: format!("{}: '{}' is not a period in years", self.path.display(), key),
                })?;
            entries.push((period, pct));
        }

        Ok(InflationTable::from_percentages(entries))
    }

    pub fn save(&self, table: &InflationTable) -> Result<(), MelaoError> {
        let raw: BTreeMap<String, f64> = table
            .to_percentages()
            .into_iter()
            .map(|(p, pct)| (p.to_string(), pct))
            .collect();

        let json = serde_json::to_string_pretty(&raw).map_err(|e| MelaoError::InvalidData {
            reason: e.to_string(),
        })?;
        fs::write(&self.path, json)?;
        tracing::info!(path = %self.path.display(), periods = raw.len(), "saved inflation table");
        Ok(())
    }
}
