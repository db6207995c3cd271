//! Persistent price store port.

use crate::domain::asset::{Asset, AssetSpec};
use crate::domain::error::MelaoError;
use crate::domain::price::RawPrice;
use crate::domain::price_matrix::PriceMatrix;
use chrono::NaiveDate;

pub trait PriceStore {
    /// Latest stored date for the asset, `None` when it has no prices or is not catalogued.
    fn last_date(&self, code: &str) -> Result<Option<NaiveDate>, MelaoError>;

    /// Insert valid records, skipping dates already stored. Returns the number
    /// of rows actually inserted. All-or-nothing per call.
    fn upsert_batch(&self, code: &str, records: &[RawPrice]) -> Result<usize, MelaoError>;

    fn load_matrix(&self) -> Result<PriceMatrix, MelaoError>;

    /// Insert the asset if its code is not catalogued yet; returns the stored entry.
    fn ensure_asset(&self, spec: &AssetSpec) -> Result<Asset, MelaoError>;

    fn find_asset(&self, code: &str) -> Result<Option<Asset>, MelaoError>;

    fn list_assets(&self) -> Result<Vec<Asset>, MelaoError>;

    /// `(first, last, count)` of stored prices.
    fn data_range(&self, code: &str) -> Result<Option<(NaiveDate, NaiveDate, usize)>, MelaoError>;

    /// Register every asset not yet catalogued. Returns how many were new.
    fn seed_catalog(&self, specs: &[AssetSpec]) -> Result<usize, MelaoError> {
        let mut added = 0;
        for spec in specs {
            if self.find_asset(&spec.code)?.is_none() {
                self.ensure_asset(spec)?;
                added += 1;
            }
        }
        Ok(added)
    }
}
