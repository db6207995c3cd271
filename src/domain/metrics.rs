//! Per-asset, per-period risk/return metrics and the Melão Index.
//!
//! Every window is anchored at the latest date of the whole matrix so that
//! assets are compared over the same calendar span. Assets whose last
//! observation trails that date by more than a week are left out entirely.

use crate::domain::hurst;
use crate::domain::inflation::InflationTable;
use crate::domain::price_matrix::{PriceMatrix, present_points};
use crate::domain::result_table::ResultTable;
use crate::domain::stats::{linear_fit, log_returns, mean, population_std};
use chrono::{Duration, NaiveDate};
use std::fmt;
use std::ops::ControlFlow;

/// Lookback periods in years, in output order.
pub const LOOKBACK_PERIODS: [u32; 6] = [10, 8, 5, 3, 2, 1];

pub const DAYS_PER_YEAR: i64 = 365;
pub const FRESHNESS_DAYS: i64 = 7;
const TRADING_DAYS_PER_YEAR: f64 = 252.0;
pub const RISK_FREE_ANNUAL: f64 = 0.10;

pub const RESULT_HEADER: [&str; 10] = [
    "Asset",
    "Period",
    "Annual Return %",
    "MDD %",
    "MDD*",
    "Melão Index",
    "Sharpe",
    "Annual Inflation %",
    "Slope",
    "Hurst (DFA)",
];

/// One `(asset, period)` row. Rates are fractions; the `_pct` accessors scale them.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricResult {
    pub asset: String,
    pub period_years: u32,
    pub annual_return: f64,
    pub mdd: f64,
    pub mdd_star: f64,
    pub melao_index: f64,
    pub sharpe: f64,
    pub inflation_annual: f64,
    pub slope: f64,
    pub hurst: Option<f64>,
}

impl MetricResult {
    pub fn period_label(&self) -> String {
        if self.period_years == 1 {
            "1 year".to_string()
        } else {
            format!("{} years", self.period_years)
        }
    }

    pub fn annual_return_pct(&self) -> f64 {
        self.annual_return * 100.0
    }

    pub fn mdd_pct(&self) -> f64 {
        self.mdd * 100.0
    }

    pub fn inflation_annual_pct(&self) -> f64 {
        self.inflation_annual * 100.0
    }

    pub fn hurst_text(&self) -> String {
        match self.hurst {
            Some(h) => format!("{h:.4}"),
            None => "N/A".to_string(),
        }
    }

    /// The row in its fixed textual form, matching [`RESULT_HEADER`].
    pub fn to_record(&self) -> [String; 10] {
        [
            self.asset.clone(),
            self.period_label(),
            format!("{:.2}", self.annual_return_pct()),
            format!("{:.2}", self.mdd_pct()),
            format!("{:.4}", self.mdd_star),
            format!("{:.4}", self.melao_index),
            format!("{:.4}", self.sharpe),
            format!("{:.2}", self.inflation_annual_pct()),
            format!("{:.6}", self.slope),
            self.hurst_text(),
        ]
    }
}

/// Why an asset or an asset/period pair produced no row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoData,
    Stale {
        last: NaiveDate,
        data_final: NaiveDate,
    },
    InsufficientHistory {
        first: NaiveDate,
        window_start: NaiveDate,
    },
    EmptyWindow,
    DegenerateRegression {
        points: usize,
    },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoData => write!(f, "no prices"),
            SkipReason::Stale { last, data_final } => {
                write!(f, "last price {last} trails {data_final} by more than {FRESHNESS_DAYS} days")
            }
            SkipReason::InsufficientHistory {
                first,
                window_start,
            } => write!(f, "history starts {first}, window starts {window_start}"),
            SkipReason::EmptyWindow => write!(f, "no prices inside the window"),
            SkipReason::DegenerateRegression { points } => {
                write!(f, "cannot fit a trend through {points} points")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Skipped {
    pub asset: String,
    /// `None` when the whole asset was skipped.
    pub period_years: Option<u32>,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsReport {
    pub table: ResultTable,
    pub skipped: Vec<Skipped>,
    /// True when the observer stopped the run before every asset was visited.
    pub cancelled: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct AssetProgress<'a> {
    pub code: &'a str,
    pub position: usize,
    pub total: usize,
}

pub fn compute_metrics(matrix: &PriceMatrix, inflation: &InflationTable) -> ResultTable {
    compute_metrics_with(matrix, inflation, |_| ControlFlow::Continue(())).table
}

/// Compute every row, reporting each asset to `observer` before it is
/// evaluated. Returning `Break` stops the run; rows already built are kept.
pub fn compute_metrics_with<F>(
    matrix: &PriceMatrix,
    inflation: &InflationTable,
    mut observer: F,
) -> MetricsReport
where
    F: FnMut(&AssetProgress<'_>) -> ControlFlow<()>,
{
    let mut report = MetricsReport::default();
    let Some(data_final) = matrix.final_date() else {
        return report;
    };

    let mut rows = Vec::new();
    let total = matrix.asset_count();

    for (position, (code, column)) in matrix.columns().enumerate() {
        let progress = AssetProgress {
            code,
            position: position + 1,
            total,
        };
        if observer(&progress).is_break() {
            report.cancelled = true;
            break;
        }

        let series = present_points(matrix.dates(), column);
        let first = match check_asset(&series, data_final) {
            Ok(first) => first,
            Err(reason) => {
                tracing::debug!(asset = code, ?reason, "asset skipped");
                report.skipped.push(Skipped {
                    asset: code.to_string(),
                    period_years: None,
                    reason,
                });
                continue;
            }
        };

        for period in LOOKBACK_PERIODS {
            match evaluate_period(matrix, code, column, first, data_final, period, inflation) {
                Ok(row) => rows.push(row),
                Err(reason) => {
                    tracing::debug!(asset = code, period, ?reason, "period skipped");
                    report.skipped.push(Skipped {
                        asset: code.to_string(),
                        period_years: Some(period),
                        reason,
                    });
                }
            }
        }
    }

    report.table = ResultTable::new(rows);
    report
}

/// Returns the first observation date of an asset that passes the freshness gate.
fn check_asset(series: &[(NaiveDate, f64)], data_final: NaiveDate) -> Result<NaiveDate, SkipReason> {
    let (Some(&(first, _)), Some(&(last, _))) = (series.first(), series.last()) else {
        return Err(SkipReason::NoData);
    };
    if last < data_final - Duration::days(FRESHNESS_DAYS) {
        return Err(SkipReason::Stale { last, data_final });
    }
    Ok(first)
}

pub fn evaluate_period(
    matrix: &PriceMatrix,
    code: &str,
    column: &[Option<f64>],
    first: NaiveDate,
    data_final: NaiveDate,
    period_years: u32,
    inflation: &InflationTable,
) -> Result<MetricResult, SkipReason> {
    let window_start = data_final - Duration::days(period_years as i64 * DAYS_PER_YEAR);
    if first > window_start {
        return Err(SkipReason::InsufficientHistory {
            first,
            window_start,
        });
    }

    let range = matrix.window(window_start, data_final);
    let dates = &matrix.dates()[range.clone()];
    let prices = fill_gaps(&column[range]).ok_or(SkipReason::EmptyWindow)?;

    let elapsed: Vec<f64> = dates
        .iter()
        .map(|d| (*d - window_start).num_days() as f64)
        .collect();
    let log_prices: Vec<f64> = prices.iter().map(|p| p.ln()).collect();
    let (slope, _) = linear_fit(&elapsed, &log_prices).ok_or(SkipReason::DegenerateRegression {
        points: prices.len(),
    })?;
    let annual_return = (slope * DAYS_PER_YEAR as f64).exp() - 1.0;

    let mdd = max_drawdown(&prices);
    let mdd_star = mdd / (1.0 - mdd);
    let inflation_annual = inflation.annualized(period_years);
    let melao_index = melao_index(annual_return, inflation_annual, mdd_star, period_years);

    let returns = log_returns(&prices);
    let sharpe = sharpe_ratio(&returns);
    let hurst = hurst_of(&returns);

    Ok(MetricResult {
        asset: code.to_string(),
        period_years,
        annual_return,
        mdd,
        mdd_star,
        melao_index,
        sharpe,
        inflation_annual,
        slope,
        hurst,
    })
}

/// Forward-fill then back-fill. `None` when every cell is empty.
fn fill_gaps(cells: &[Option<f64>]) -> Option<Vec<f64>> {
    let mut carry = cells.iter().find_map(|c| *c)?;
    Some(
        cells
            .iter()
            .map(|cell| {
                if let Some(v) = cell {
                    carry = *v;
                }
                carry
            })
            .collect(),
    )
}

/// Largest peak-to-trough decline as a positive fraction.
pub fn max_drawdown(prices: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for &price in prices {
        peak = peak.max(price);
        worst = worst.min(price / peak - 1.0);
    }
    worst.abs()
}

/// Excess log return over inflation per unit of period-scaled drawdown risk.
/// A zero denominator (no drawdown) yields 0 whatever the return.
pub fn melao_index(annual_return: f64, inflation_annual: f64, mdd_star: f64, period_years: u32) -> f64 {
    let numerator = (1.0 + annual_return).ln() - (1.0 + inflation_annual).ln();
    let denominator = (1.0 + mdd_star).ln() / (period_years as f64).sqrt();
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Annualized Sharpe ratio of daily log returns against a 10% risk-free rate.
pub fn sharpe_ratio(returns: &[f64]) -> f64 {
    let (Some(m), Some(std)) = (mean(returns), population_std(returns)) else {
        return 0.0;
    };
    if std > 0.0 {
        (m * TRADING_DAYS_PER_YEAR - RISK_FREE_ANNUAL) / (std * TRADING_DAYS_PER_YEAR.sqrt())
    } else {
        0.0
    }
}

fn hurst_of(returns: &[f64]) -> Option<f64> {
    let finite: Vec<f64> = returns.iter().copied().filter(|r| r.is_finite()).collect();
    if finite.len() < hurst::MIN_OBSERVATIONS {
        return None;
    }
    hurst::dfa(&finite)
}
