//! Integration tests.
//!
//! Tests cover:
//! - Metrics over known price paths (steady growth, late listing, sparse data)
//! - Freshness gate and zero-drawdown policy
//! - Ingestion through the SQLite store: idempotence, cursor monotonicity,
//!   fetch-failure isolation
//! - Full pipeline: ingest, load matrix, compute, filter

mod common;

use approx::assert_relative_eq;
use common::*;
use melao::domain::inflation::InflationTable;
use melao::domain::metrics::{
    LOOKBACK_PERIODS, SkipReason, compute_metrics, compute_metrics_with, max_drawdown,
};
use melao::domain::result_table::{Bounds, FilterCriteria};
use std::ops::ControlFlow;

mod metric_scenarios {
    use super::*;

    #[test]
    fn steady_growth_over_ten_years() {
        let start = date(2014, 1, 1);
        let matrix = matrix_of(vec![daily_observations(
            "GROW",
            start,
            3651,
            growth_price(0.10),
        )]);

        let table = compute_metrics(&matrix, &InflationTable::new());
        let periods: Vec<u32> = table.iter().map(|r| r.period_years).collect();
        assert_eq!(periods, LOOKBACK_PERIODS.to_vec());

        for row in &table {
            assert_relative_eq!(row.annual_return, 0.10, epsilon = 1e-3);
            assert_eq!(row.mdd, 0.0);
            assert_eq!(row.mdd_star, 0.0);
            assert_eq!(row.melao_index, 0.0);
            assert!(row.sharpe.is_finite());
            assert_eq!(row.inflation_annual, 0.0);
        }
    }

    #[test]
    fn late_listing_gets_no_one_year_row() {
        let start = date(2023, 1, 1);
        let matrix = matrix_of(vec![
            daily_observations("OLD", start, 400, |i| 50.0 + (i % 17) as f64),
            daily_observations(
                "NEW",
                start + chrono::Duration::days(350),
                50,
                |i| 10.0 + i as f64,
            ),
        ]);

        let report = compute_metrics_with(&matrix, &InflationTable::new(), |_| {
            ControlFlow::Continue(())
        });

        assert!(report.table.iter().any(|r| r.asset == "OLD" && r.period_years == 1));
        assert!(report.table.iter().all(|r| r.asset != "NEW"));
        assert!(report.skipped.iter().any(|s| s.asset == "NEW"
            && s.period_years == Some(1)
            && matches!(s.reason, SkipReason::InsufficientHistory { .. })));
    }

    #[test]
    fn sparse_history_has_no_hurst() {
        // Weekly prices: about 52 returns in the one-year window.
        let start = date(2023, 1, 2);
        let observations: Vec<_> = (0..60)
            .map(|w| {
                (
                    "WEEKLY".to_string(),
                    start + chrono::Duration::weeks(w),
                    100.0 + (w % 5) as f64,
                )
            })
            .collect();
        let matrix = matrix_of(vec![observations]);

        let table = compute_metrics(&matrix, &InflationTable::new());
        let one_year = table.iter().find(|r| r.period_years == 1).unwrap();
        assert_eq!(one_year.hurst, None);
        assert_eq!(one_year.hurst_text(), "N/A");
    }

    #[test]
    fn dense_noisy_history_has_hurst() {
        let start = date(2022, 1, 1);
        let matrix = matrix_of(vec![daily_observations("NOISY", start, 800, |i| {
            100.0 + 10.0 * ((i as f64) * 0.7).sin() + (i % 13) as f64
        })]);

        let table = compute_metrics(&matrix, &InflationTable::new());
        let row = table.iter().find(|r| r.period_years == 2).unwrap();
        assert!(row.hurst.is_some_and(f64::is_finite));
    }

    #[test]
    fn stale_asset_produces_no_rows() {
        let start = date(2022, 1, 1);
        let matrix = matrix_of(vec![
            daily_observations("LIVE", start, 800, |i| 100.0 + i as f64),
            daily_observations("DEAD", start, 790, |i| 100.0 + i as f64),
        ]);

        let report = compute_metrics_with(&matrix, &InflationTable::new(), |_| {
            ControlFlow::Continue(())
        });
        assert!(report.table.iter().all(|r| r.asset == "LIVE"));
        assert!(report.skipped.iter().any(|s| s.asset == "DEAD"
            && matches!(s.reason, SkipReason::Stale { .. })));
    }

    #[test]
    fn asset_within_freshness_tolerance_is_kept() {
        let start = date(2022, 1, 1);
        let matrix = matrix_of(vec![
            daily_observations("LIVE", start, 800, |i| 100.0 + i as f64),
            daily_observations("LAG", start, 793, |i| 100.0 + i as f64),
        ]);
        let table = compute_metrics(&matrix, &InflationTable::new());
        assert!(table.iter().any(|r| r.asset == "LAG"));
    }

    #[test]
    fn flat_stretches_have_zero_drawdown() {
        let start = date(2022, 1, 1);
        let matrix = matrix_of(vec![daily_observations("STEP", start, 800, |i| {
            100.0 + (i / 30) as f64
        })]);

        for row in &compute_metrics(&matrix, &InflationTable::new()) {
            assert_eq!(row.mdd, 0.0);
            assert_eq!(row.melao_index, 0.0);
            assert!(row.annual_return > 0.0);
        }
    }

    #[test]
    fn melao_index_matches_its_components() {
        let start = date(2022, 1, 1);
        let matrix = matrix_of(vec![daily_observations("SWING", start, 800, |i| {
            let base = 100.0 * (0.0004 * i as f64).exp();
            if (600..660).contains(&i) { base * 0.8 } else { base }
        })]);
        let inflation = InflationTable::new().with_rate(1, 0.05).with_rate(2, 0.1025);

        let table = compute_metrics(&matrix, &inflation);
        for row in &table {
            let p = row.period_years as f64;
            assert_relative_eq!(row.inflation_annual, 0.05, epsilon = 1e-9);
            assert!(row.mdd > 0.0 && row.mdd < 1.0);
            assert_relative_eq!(row.mdd_star, row.mdd / (1.0 - row.mdd), epsilon = 1e-12);
            let expected = ((1.0 + row.annual_return).ln() - 1.05_f64.ln())
                / ((1.0 + row.mdd_star).ln() / p.sqrt());
            assert_relative_eq!(row.melao_index, expected, epsilon = 1e-9);
        }
    }

    #[test]
    fn rows_follow_asset_then_period_order() {
        let start = date(2021, 1, 1);
        let matrix = matrix_of(vec![
            daily_observations("ZZZ", start, 1200, |i| 10.0 + (i % 7) as f64),
            daily_observations("AAA", start, 1200, |i| 20.0 + (i % 11) as f64),
        ]);
        let table = compute_metrics(&matrix, &InflationTable::new());
        let keys: Vec<(String, u32)> = table
            .iter()
            .map(|r| (r.asset.clone(), r.period_years))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("AAA".to_string(), 3),
                ("AAA".to_string(), 2),
                ("AAA".to_string(), 1),
                ("ZZZ".to_string(), 3),
                ("ZZZ".to_string(), 2),
                ("ZZZ".to_string(), 1),
            ]
        );
    }

    #[test]
    fn filtering_narrows_without_recomputing() {
        let start = date(2021, 1, 1);
        let matrix = matrix_of(vec![
            daily_observations("AAA", start, 1200, |i| 20.0 + (i % 11) as f64),
            daily_observations("BBB", start, 1200, growth_price(0.3)),
        ]);
        let table = compute_metrics(&matrix, &InflationTable::new());

        let criteria = FilterCriteria {
            annual_return_pct: Bounds::new(Some(20.0), None),
            ..Default::default()
        };
        let filtered = table.filter(&criteria);
        assert!(!filtered.is_empty());
        assert!(filtered.iter().all(|r| r.asset == "BBB"));
        assert_eq!(table.len(), 6);
    }
}

mod drawdown_properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn drawdown_is_a_fraction(prices in prop::collection::vec(0.01f64..1e6, 1..200)) {
            let mdd = max_drawdown(&prices);
            prop_assert!((0.0..1.0).contains(&mdd));
        }

        #[test]
        fn sorted_prices_never_draw_down(mut prices in prop::collection::vec(0.01f64..1e6, 1..200)) {
            prices.sort_by(f64::total_cmp);
            prop_assert_eq!(max_drawdown(&prices), 0.0);
        }
    }
}

#[cfg(feature = "sqlite")]
mod sqlite_store {
    use super::*;
    use melao::adapters::sqlite_adapter::SqliteAdapter;
    use melao::domain::asset::AssetSpec;
    use melao::domain::error::MelaoError;
    use melao::domain::ingestion::{AssetStatus, ingest, refresh};
    use melao::domain::price::RawPrice;
    use melao::ports::price_store_port::PriceStore;

    fn store_with(codes: &[&str]) -> SqliteAdapter {
        let store = SqliteAdapter::in_memory().unwrap();
        store.initialize_schema().unwrap();
        let specs: Vec<AssetSpec> = codes.iter().map(|c| AssetSpec::new(c, None)).collect();
        store.seed_catalog(&specs).unwrap();
        store
    }

    #[test]
    fn reingestion_is_idempotent() {
        let store = store_with(&["BTCUSD"]);
        let source = MockPriceSource::new().with_prices(
            "BTCUSD",
            daily_prices(date(2024, 1, 1), 30, |i| 100.0 + i as f64),
        );

        assert_eq!(ingest("BTCUSD", &source, &store).unwrap(), 30);
        let before = store.load_matrix().unwrap();
        assert_eq!(ingest("BTCUSD", &source, &store).unwrap(), 0);
        assert_eq!(store.load_matrix().unwrap(), before);
    }

    #[test]
    fn cursor_never_moves_backwards() {
        let store = store_with(&["BTCUSD"]);
        let mut source = MockPriceSource::new().with_prices(
            "BTCUSD",
            daily_prices(date(2024, 1, 1), 10, |_| 100.0),
        );
        ingest("BTCUSD", &source, &store).unwrap();
        let first_cursor = store.last_date("BTCUSD").unwrap().unwrap();

        // A later fetch that only returns older history leaves the cursor alone.
        source.set_prices("BTCUSD", daily_prices(date(2023, 12, 1), 5, |_| 90.0));
        assert_eq!(ingest("BTCUSD", &source, &store).unwrap(), 0);
        assert_eq!(store.last_date("BTCUSD").unwrap(), Some(first_cursor));

        source.set_prices("BTCUSD", daily_prices(date(2024, 1, 1), 15, |_| 100.0));
        assert_eq!(ingest("BTCUSD", &source, &store).unwrap(), 5);
        assert!(store.last_date("BTCUSD").unwrap().unwrap() > first_cursor);
    }

    #[test]
    fn malformed_records_are_dropped_not_fatal() {
        let store = store_with(&["ETHUSD"]);
        let mut prices = daily_prices(date(2024, 1, 1), 5, |i| 10.0 + i as f64);
        prices.push(RawPrice {
            date: Some(date(2024, 1, 6)),
            price: Some(f64::NAN),
        });
        prices.push(RawPrice {
            date: None,
            price: Some(12.0),
        });
        let source = MockPriceSource::new().with_prices("ETHUSD", prices);

        assert_eq!(ingest("ETHUSD", &source, &store).unwrap(), 5);
        assert_eq!(
            store.data_range("ETHUSD").unwrap(),
            Some((date(2024, 1, 1), date(2024, 1, 5), 5))
        );
    }

    #[test]
    fn fetch_failure_leaves_other_assets_untouched() {
        let store = store_with(&["AAA", "BBB", "CCC"]);
        let source = MockPriceSource::new()
            .with_prices("AAA", daily_prices(date(2024, 1, 1), 3, |_| 1.0))
            .with_error("BBB", "HTTP 503")
            .with_prices("CCC", daily_prices(date(2024, 1, 1), 4, |_| 2.0));

        let codes = vec!["AAA".to_string(), "BBB".to_string(), "CCC".to_string()];
        let summary = refresh(&codes, &source, &store, false).unwrap();

        assert_eq!(summary.statuses[0].1, AssetStatus::Updated { inserted: 3 });
        assert!(matches!(summary.statuses[1].1, AssetStatus::Failed { .. }));
        assert_eq!(summary.statuses[2].1, AssetStatus::Updated { inserted: 4 });
        assert_eq!(store.last_date("BBB").unwrap(), None);
        assert_eq!(*source.calls.borrow(), codes);
    }

    #[test]
    fn unknown_asset_is_registered_on_first_sighting() {
        let store = store_with(&[]);
        let source = MockPriceSource::new()
            .with_prices("SOLUSD", daily_prices(date(2024, 1, 1), 3, |_| 1.0));

        let codes = vec!["SOLUSD".to_string()];
        let without = refresh(&codes, &source, &store, false).unwrap();
        assert!(matches!(without.statuses[0].1, AssetStatus::Failed { .. }));

        let with = refresh(&codes, &source, &store, true).unwrap();
        assert_eq!(with.statuses[0].1, AssetStatus::Updated { inserted: 3 });
        assert!(store.find_asset("SOLUSD").unwrap().is_some());
    }

    #[test]
    fn unknown_asset_error_names_the_code() {
        let store = store_with(&[]);
        let err = store
            .upsert_batch("XRPUSD", &[RawPrice::new(date(2024, 1, 1), 0.5)])
            .unwrap_err();
        assert!(matches!(err, MelaoError::UnknownAsset { code } if code == "XRPUSD"));
    }

    #[test]
    fn ingest_then_compute_end_to_end() {
        let store = store_with(&["BTCUSD", "ETHUSD"]);
        let start = date(2022, 1, 1);
        let source = MockPriceSource::new()
            .with_prices("BTCUSD", daily_prices(start, 800, growth_price(0.25)))
            .with_prices(
                "ETHUSD",
                daily_prices(start, 800, |i| 50.0 + 5.0 * ((i as f64) / 20.0).sin()),
            );

        let codes = vec!["BTCUSD".to_string(), "ETHUSD".to_string()];
        let summary = refresh(&codes, &source, &store, false).unwrap();
        assert_eq!(summary.inserted_total(), 1600);

        let matrix = store.load_matrix().unwrap();
        assert_eq!(matrix.codes(), &codes[..]);

        let inflation = InflationTable::from_percentages([(1, 4.0), (2, 8.16)]);
        let table = compute_metrics(&matrix, &inflation);
        assert_eq!(table.len(), 4);

        let btc = table
            .iter()
            .find(|r| r.asset == "BTCUSD" && r.period_years == 2)
            .unwrap();
        assert_relative_eq!(btc.annual_return, 0.25, epsilon = 1e-3);
        assert_relative_eq!(btc.inflation_annual, 0.04, epsilon = 1e-4);
        assert_eq!(btc.melao_index, 0.0);

        let eth = table
            .iter()
            .find(|r| r.asset == "ETHUSD" && r.period_years == 1)
            .unwrap();
        assert!(eth.mdd > 0.0);
        assert!(eth.melao_index.is_finite());
    }
}
