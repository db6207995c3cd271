//! Cumulative inflation per lookback period.

use std::collections::BTreeMap;

/// Cumulative inflation rates as fractions (0.45 = 45%), keyed by period in years.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InflationTable {
    rates: BTreeMap<u32, f64>,
}

impl InflationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from cumulative percentages as entered by users (45.0 = 45%).
    pub fn from_percentages<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (u32, f64)>,
    {
        Self {
            rates: entries
                .into_iter()
                .map(|(period, pct)| (period, pct / 100.0))
                .collect(),
        }
    }

    pub fn with_rate(mut self, period_years: u32, cumulative: f64) -> Self {
        self.set(period_years, cumulative);
        self
    }

    pub fn set(&mut self, period_years: u32, cumulative: f64) {
        self.rates.insert(period_years, cumulative);
    }

    /// Cumulative rate for the period, 0 when unset.
    pub fn get(&self, period_years: u32) -> f64 {
        self.rates.get(&period_years).copied().unwrap_or(0.0)
    }

    /// Geometric de-annualization: `(1 + cum)^(1/p) - 1`.
    pub fn annualized(&self, period_years: u32) -> f64 {
        annualize(self.get(period_years), period_years)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.rates.iter().map(|(&p, &r)| (p, r))
    }

    /// Entries as percentages, for persistence and display.
    pub fn to_percentages(&self) -> BTreeMap<u32, f64> {
        self.rates.iter().map(|(&p, &r)| (p, r * 100.0)).collect()
    }
}

pub fn annualize(cumulative: f64, period_years: u32) -> f64 {
    (1.0 + cumulative).powf(1.0 / period_years as f64) - 1.0
}
