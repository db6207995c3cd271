//! Dense date × asset view of stored prices.
//!
//! Rows are the union of all observation dates in ascending order; each asset
//! column holds `None` on dates the asset has no observation for.

use crate::domain::error::MelaoError;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Range;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceMatrix {
    dates: Vec<NaiveDate>,
    codes: Vec<String>,
    columns: Vec<Vec<Option<f64>>>,
}

impl PriceMatrix {
    /// Pivot `(code, date, price)` observations. Columns are ordered by code.
    pub fn from_observations<I>(observations: I) -> Self
    where
        I: IntoIterator<Item = (String, NaiveDate, f64)>,
    {
        let mut by_code: BTreeMap<String, Vec<(NaiveDate, f64)>> = BTreeMap::new();
        let mut all_dates = BTreeSet::new();

        for (code, date, price) in observations {
            all_dates.insert(date);
            by_code.entry(code).or_default().push((date, price));
        }

        let dates: Vec<NaiveDate> = all_dates.into_iter().collect();
        let date_index: HashMap<NaiveDate, usize> =
            dates.iter().enumerate().map(|(i, &d)| (d, i)).collect();

        let mut codes = Vec::with_capacity(by_code.len());
        let mut columns = Vec::with_capacity(by_code.len());
        for (code, points) in by_code {
            let mut column = vec![None; dates.len()];
            for (date, price) in points {
                column[date_index[&date]] = Some(price);
            }
            codes.push(code);
            columns.push(column);
        }

        Self {
            dates,
            codes,
            columns,
        }
    }

    /// Build from wide rows (`date`, one cell per code). Rows may arrive in any
    /// order but dates must be unique and every row must match `codes` in width.
    pub fn from_rows(
        codes: Vec<String>,
        mut rows: Vec<(NaiveDate, Vec<Option<f64>>)>,
    ) -> Result<Self, MelaoError> {
        rows.sort_by_key(|(date, _)| *date);

        if let Some(pair) = rows.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(MelaoError::InvalidData {
                reason: format!("duplicate date {}", pair[0].0),
            });
        }

        let mut columns = vec![Vec::with_capacity(rows.len()); codes.len()];
        let mut dates = Vec::with_capacity(rows.len());
        for (date, cells) in rows {
            if cells.len() != codes.len() {
                return Err(MelaoError::InvalidData {
                    reason: format!(
                        "row {} has {} values, expected {}",
                        date,
                        cells.len(),
                        codes.len()
                    ),
                });
            }
            dates.push(date);
            for (column, cell) in columns.iter_mut().zip(cells) {
                column.push(cell);
            }
        }

        Ok(Self {
            dates,
            codes,
            columns,
        })
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn asset_count(&self) -> usize {
        self.codes.len()
    }

    pub fn column(&self, code: &str) -> Option<&[Option<f64>]> {
        self.codes
            .iter()
            .position(|c| c == code)
            .map(|i| self.columns[i].as_slice())
    }

    /// Columns in presentation order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &[Option<f64>])> {
        self.codes
            .iter()
            .map(String::as_str)
            .zip(self.columns.iter().map(Vec::as_slice))
    }

    /// The latest date across every asset.
    pub fn final_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Non-null observations of one column, ascending.
    pub fn series(&self, code: &str) -> Vec<(NaiveDate, f64)> {
        self.column(code)
            .map(|column| present_points(&self.dates, column))
            .unwrap_or_default()
    }

    /// Row indices whose dates fall in `[start, end]`.
    pub fn window(&self, start: NaiveDate, end: NaiveDate) -> Range<usize> {
        let lo = self.dates.partition_point(|d| *d < start);
        let hi = self.dates.partition_point(|d| *d <= end);
        lo..hi.max(lo)
    }
}

pub(crate) fn present_points(dates: &[NaiveDate], column: &[Option<f64>]) -> Vec<(NaiveDate, f64)> {
    dates
        .iter()
        .zip(column)
        .filter_map(|(&date, value)| value.map(|v| (date, v)))
        .collect()
}
