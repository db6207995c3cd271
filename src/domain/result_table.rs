//! The computed rows and the pure operations applied to them for display.

use crate::domain::metrics::MetricResult;
use crate::domain::stats::round_to;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::str::FromStr;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTable {
    rows: Vec<MetricResult>,
}

impl ResultTable {
    pub fn new(rows: Vec<MetricResult>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[MetricResult] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MetricResult> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows satisfying every active criterion, in their original order.
    pub fn filter(&self, criteria: &FilterCriteria) -> ResultTable {
        ResultTable {
            rows: self
                .rows
                .iter()
                .filter(|row| criteria.matches(row))
                .cloned()
                .collect(),
        }
    }

    /// Stable sort on one column. Rows with no Hurst value stay last.
    pub fn sort_by(&self, column: SortColumn, descending: bool) -> ResultTable {
        let mut rows = self.rows.clone();
        rows.sort_by(|a, b| {
            if column == SortColumn::Hurst {
                match (a.hurst, b.hurst) {
                    (None, None) => return Ordering::Equal,
                    (None, Some(_)) => return Ordering::Greater,
                    (Some(_), None) => return Ordering::Less,
                    _ => {}
                }
            }
            let ord = column.compare(a, b);
            if descending { ord.reverse() } else { ord }
        });
        ResultTable { rows }
    }

    pub fn records(&self) -> impl Iterator<Item = [String; 10]> + '_ {
        self.rows.iter().map(MetricResult::to_record)
    }
}

impl<'a> IntoIterator for &'a ResultTable {
    type Item = &'a MetricResult;
    type IntoIter = std::slice::Iter<'a, MetricResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Inclusive numeric bounds; an absent side is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bounds {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Bounds {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    pub fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    pub fn contains(&self, value: f64) -> bool {
        if self.min.is_some_and(|min| value < min) {
            return false;
        }
        if self.max.is_some_and(|max| value > max) {
            return false;
        }
        true
    }
}

/// Display filters. Values are compared at the precision they are shown
/// with, so a bound of `0.05` keeps a Melão Index printed as `0.0500`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterCriteria {
    pub melao_index: Bounds,
    pub hurst: Bounds,
    pub annual_return_pct: Bounds,
    pub mdd_pct: Bounds,
    /// Case-insensitive substring of the asset code.
    pub asset_contains: Option<String>,
    /// `None` keeps every period; an empty set keeps none.
    pub periods: Option<BTreeSet<u32>>,
}

impl FilterCriteria {
    pub fn matches(&self, row: &MetricResult) -> bool {
        if !self.melao_index.contains(round_to(row.melao_index, 4)) {
            return false;
        }
        // Rows without a Hurst estimate are never excluded by its bounds.
        if let Some(h) = row.hurst {
            if !self.hurst.contains(round_to(h, 4)) {
                return false;
            }
        }
        if !self.annual_return_pct.contains(round_to(row.annual_return_pct(), 2)) {
            return false;
        }
        if !self.mdd_pct.contains(round_to(row.mdd_pct(), 2)) {
            return false;
        }
        if let Some(needle) = &self.asset_contains {
            if !row.asset.to_uppercase().contains(&needle.to_uppercase()) {
                return false;
            }
        }
        if let Some(periods) = &self.periods {
            if !periods.contains(&row.period_years) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    Asset,
    Period,
    AnnualReturn,
    Mdd,
    MddStar,
    MelaoIndex,
    Sharpe,
    Inflation,
    Slope,
    Hurst,
}

impl SortColumn {
    fn compare(self, a: &MetricResult, b: &MetricResult) -> Ordering {
        let num = |f: fn(&MetricResult) -> f64| f(a).total_cmp(&f(b));
        match self {
            SortColumn::Asset => a.asset.cmp(&b.asset),
            SortColumn::Period => a.period_years.cmp(&b.period_years),
            SortColumn::AnnualReturn => num(|r| r.annual_return),
            SortColumn::Mdd => num(|r| r.mdd),
            SortColumn::MddStar => num(|r| r.mdd_star),
            SortColumn::MelaoIndex => num(|r| r.melao_index),
            SortColumn::Sharpe => num(|r| r.sharpe),
            SortColumn::Inflation => num(|r| r.inflation_annual),
            SortColumn::Slope => num(|r| r.slope),
            SortColumn::Hurst => num(|r| r.hurst.unwrap_or(f64::NAN)),
        }
    }
}

impl FromStr for SortColumn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "asset" => Ok(SortColumn::Asset),
            "period" => Ok(SortColumn::Period),
            "annual_return" | "return" => Ok(SortColumn::AnnualReturn),
            "mdd" => Ok(SortColumn::Mdd),
            "mdd_star" => Ok(SortColumn::MddStar),
            "melao" | "melao_index" => Ok(SortColumn::MelaoIndex),
            "sharpe" => Ok(SortColumn::Sharpe),
            "inflation" => Ok(SortColumn::Inflation),
            "slope" => Ok(SortColumn::Slope),
            "hurst" => Ok(SortColumn::Hurst),
            other => Err(format!("unknown sort column '{other}'")),
        }
    }
}
