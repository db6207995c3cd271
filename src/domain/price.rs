//! Raw and validated daily price observations.

use chrono::NaiveDate;

/// One record as delivered by a price source. Either half may be missing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawPrice {
    pub date: Option<NaiveDate>,
    pub price: Option<f64>,
}

impl RawPrice {
    pub fn new(date: NaiveDate, price: f64) -> Self {
        Self {
            date: Some(date),
            price: Some(price),
        }
    }

    /// Returns the observation if the date is present and the price is finite and positive.
    pub fn validated(&self) -> Option<(NaiveDate, f64)> {
        match (self.date, self.price) {
            (Some(date), Some(price)) if price.is_finite() && price > 0.0 => Some((date, price)),
            _ => None,
        }
    }
}

/// A stored observation. At most one per `(asset_id, date)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub asset_id: i64,
    pub date: NaiveDate,
    pub price: f64,
}

/// Valid observations of one batch plus the number of records dropped as malformed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SanitizedBatch {
    pub points: Vec<(NaiveDate, f64)>,
    pub rejected: usize,
}

pub fn sanitize(records: &[RawPrice]) -> SanitizedBatch {
    let mut batch = SanitizedBatch::default();
    for record in records {
        match record.validated() {
            Some(point) => batch.points.push(point),
            None => batch.rejected += 1,
        }
    }
    batch
}
