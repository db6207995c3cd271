//! Configuration validation.
//!
//! Checks config fields before any command opens the store.

use crate::domain::asset::parse_codes;
use crate::domain::error::MelaoError;
use crate::ports::config_port::ConfigPort;

pub const SOURCE_KINDS: [&str; 2] = ["csv", "nasdaq"];

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), MelaoError> {
    validate_sqlite(config)?;
    validate_ingest_codes(config)?;
    validate_inflation(config)?;
    Ok(())
}

/// Source settings are only needed by commands that fetch.
pub fn validate_source_config(config: &dyn ConfigPort) -> Result<(), MelaoError> {
    let kind = config
        .get_string("source", "kind")
        .unwrap_or_else(|| "csv".to_string());

    match kind.trim().to_lowercase().as_str() {
        "csv" => match config.get_string("source", "csv_dir") {
            Some(dir) if !dir.trim().is_empty() => Ok(()),
            _ => Err(MelaoError::ConfigMissing {
                section: "source".to_string(),
                key: "csv_dir".to_string(),
            }),
        },
        "nasdaq" => Ok(()),
        other => Err(MelaoError::ConfigInvalid {
            section: "source".to_string(),
            key: "kind".to_string(),
            reason: format!("unknown source '{other}', expected one of {SOURCE_KINDS:?}"),
        }),
    }
}

fn validate_sqlite(config: &dyn ConfigPort) -> Result<(), MelaoError> {
    match config.get_string("sqlite", "path") {
        Some(s) if !s.trim().is_empty() => {}
        _ => {
            return Err(MelaoError::ConfigMissing {
                section: "sqlite".to_string(),
                key: "path".to_string(),
            });
        }
    }

    let pool_size = config.get_int("sqlite", "pool_size", 4);
    if pool_size < 1 {
        return Err(MelaoError::ConfigInvalid {
            section: "sqlite".to_string(),
            key: "pool_size".to_string(),
            reason: "pool_size must be at least 1".to_string(),
        });
    }
    Ok(())
}

fn validate_ingest_codes(config: &dyn ConfigPort) -> Result<(), MelaoError> {
    if let Some(codes) = config.get_string("ingest", "codes") {
        parse_codes(&codes).map_err(|e| MelaoError::ConfigInvalid {
            section: "ingest".to_string(),
            key: "codes".to_string(),
            reason: e.to_string(),
        })?;
    }
    Ok(())
}

fn validate_inflation(config: &dyn ConfigPort) -> Result<(), MelaoError> {
    for key in config.keys("inflation") {
        if key == "path" {
            continue;
        }

        let invalid = |reason: String| MelaoError::ConfigInvalid {
            section: "inflation".to_string(),
            key: key.clone(),
            reason,
        };

        match key.parse::<u32>() {
            Ok(p) if p >= 1 => {}
            _ => return Err(invalid("key must be a period in whole years".to_string())),
        }

        let raw = config.get_string("inflation", &key).unwrap_or_default();
        match raw.trim().parse::<f64>() {
            Ok(pct) if pct.is_finite() && pct > -100.0 => {}
            _ => {
                return Err(invalid(format!(
                    "'{raw}' is not a cumulative percentage above -100"
                )));
            }
        }
    }
    Ok(())
}
