//! Incremental ingestion of external price history into the store.
//!
//! The store's latest date per asset is the cursor: each fetch retrieves the
//! full history and only strictly newer records are handed to the store.

use crate::domain::asset::AssetSpec;
use crate::domain::error::MelaoError;
use crate::ports::price_source_port::PriceSource;
use crate::ports::price_store_port::PriceStore;

/// Fetch `code` and append records newer than its stored cursor.
/// Returns the number of rows inserted.
pub fn ingest(
    code: &str,
    source: &dyn PriceSource,
    store: &dyn PriceStore,
) -> Result<usize, MelaoError> {
    let last = store.last_date(code)?;
    let mut records = source.fetch(code)?;
    let fetched = records.len();

    if let Some(last) = last {
        records.retain(|r| r.date.is_some_and(|d| d > last));
    }
    records.sort_by_key(|r| r.date);

    let inserted = store.upsert_batch(code, &records)?;
    tracing::info!(
        asset = code,
        fetched,
        candidates = records.len(),
        inserted,
        "ingested"
    );
    Ok(inserted)
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssetStatus {
    Updated { inserted: usize },
    Failed { reason: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefreshSummary {
    pub statuses: Vec<(String, AssetStatus)>,
}

impl RefreshSummary {
    pub fn inserted_total(&self) -> usize {
        self.statuses
            .iter()
            .map(|(_, s)| match s {
                AssetStatus::Updated { inserted } => *inserted,
                AssetStatus::Failed { .. } => 0,
            })
            .sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.statuses.iter().filter_map(|(code, s)| match s {
            AssetStatus::Failed { reason } => Some((code.as_str(), reason.as_str())),
            AssetStatus::Updated { .. } => None,
        })
    }
}

/// Ingest each code in turn. A failure for one asset is recorded and the
/// loop moves on; only store failures abort the run.
pub fn refresh(
    codes: &[String],
    source: &dyn PriceSource,
    store: &dyn PriceStore,
    register_unknown: bool,
) -> Result<RefreshSummary, MelaoError> {
    let mut summary = RefreshSummary::default();

    for code in codes {
        if register_unknown {
            store.ensure_asset(&AssetSpec::new(code, None))?;
        }

        let status = match ingest(code, source, store) {
            Ok(inserted) => AssetStatus::Updated { inserted },
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!(asset = code.as_str(), error = %e, "ingest failed");
                AssetStatus::Failed {
                    reason: e.to_string(),
                }
            }
        };
        summary.statuses.push((code.clone(), status));
    }

    Ok(summary)
}
