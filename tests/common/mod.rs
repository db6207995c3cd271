#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use melao::domain::error::MelaoError;
use melao::domain::price::RawPrice;
use melao::domain::price_matrix::PriceMatrix;
use melao::ports::price_source_port::PriceSource;
use std::cell::RefCell;
use std::collections::HashMap;

pub struct MockPriceSource {
    pub data: HashMap<String, Vec<RawPrice>>,
    pub errors: HashMap<String, String>,
    pub calls: RefCell<Vec<String>>,
}

impl MockPriceSource {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn with_prices(mut self, code: &str, prices: Vec<RawPrice>) -> Self {
        self.data.insert(code.to_string(), prices);
        self
    }

    pub fn with_error(mut self, code: &str, reason: &str) -> Self {
        self.errors.insert(code.to_string(), reason.to_string());
        self
    }

    pub fn set_prices(&mut self, code: &str, prices: Vec<RawPrice>) {
        self.data.insert(code.to_string(), prices);
    }
}

impl PriceSource for MockPriceSource {
    fn fetch(&self, code: &str) -> Result<Vec<RawPrice>, MelaoError> {
        self.calls.borrow_mut().push(code.to_string());
        if let Some(reason) = self.errors.get(code) {
            return Err(MelaoError::Fetch {
                code: code.to_string(),
                reason: reason.clone(),
            });
        }
        Ok(self.data.get(code).cloned().unwrap_or_default())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// `count` consecutive daily records starting at `start`, priced by `price(i)`.
pub fn daily_prices(start: NaiveDate, count: usize, price: impl Fn(usize) -> f64) -> Vec<RawPrice> {
    (0..count)
        .map(|i| RawPrice::new(start + Duration::days(i as i64), price(i)))
        .collect()
}

/// Observations for one asset over consecutive days.
pub fn daily_observations(
    code: &str,
    start: NaiveDate,
    count: usize,
    price: impl Fn(usize) -> f64,
) -> Vec<(String, NaiveDate, f64)> {
    (0..count)
        .map(|i| (code.to_string(), start + Duration::days(i as i64), price(i)))
        .collect()
}

/// Continuous growth at `annual` per year on a daily calendar axis.
pub fn growth_price(annual: f64) -> impl Fn(usize) -> f64 {
    let daily = (1.0 + annual).ln() / 365.0;
    move |i| 100.0 * (daily * i as f64).exp()
}

pub fn matrix_of(observations: Vec<Vec<(String, NaiveDate, f64)>>) -> PriceMatrix {
    PriceMatrix::from_observations(observations.into_iter().flatten())
}
