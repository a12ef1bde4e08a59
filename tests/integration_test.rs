//! End-to-end tests through the session: ingestion, windowing, statistics
//! and the rolling backtest.

mod common;

use approx::assert_relative_eq;
use common::*;
use mptfolio::adapters::csv_price_adapter::{parse_prices, template, CsvPriceAdapter};
use mptfolio::domain::backtest::{BacktestConfig, Strategy};
use mptfolio::domain::error::MptError;
use mptfolio::domain::session::{PortfolioRequest, Session};
use mptfolio::domain::statistics::Measure;
use mptfolio::domain::validation::ValidationIssue;
use tempfile::TempDir;

fn loaded_session(rows: usize) -> Session {
    let mut session = Session::new();
    session
        .load(&MockPricePort::with_matrix(synthetic_prices(rows)))
        .unwrap();
    session
}

fn request() -> PortfolioRequest {
    PortfolioRequest {
        instruments: instruments(),
        estimation: range(day(0), day(19)),
        evaluation: range(day(20), day(29)),
    }
}

mod ingestion {
    use super::*;

    #[test]
    fn failing_port_leaves_session_empty() {
        let mut session = Session::new();
        let err = session.load(&MockPricePort::failing("bad header")).unwrap_err();
        assert!(matches!(err, MptError::MalformedFile { .. }));
        assert!(!session.is_loaded());
    }

    #[test]
    fn csv_file_round_trip_through_session() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prices.csv");
        write_prices_csv(&synthetic_prices(12), &path);

        let mut session = Session::new();
        session.load(&CsvPriceAdapter::new(path).unwrap()).unwrap();
        assert_eq!(session.instruments().unwrap(), instruments().as_slice());
        assert!(session.validate().unwrap().is_empty());
    }

    #[test]
    fn template_is_valid_input() {
        let matrix = parse_prices(template().as_bytes()).unwrap();
        let session = Session::with_prices(matrix);
        assert!(session.validate().unwrap().is_empty());
    }

    #[test]
    fn validator_reports_every_problem() {
        let text = "date,a,b\n2024-01-02,1,2\n2024-01-01x,x,3\n";
        let session = Session::with_prices(parse_prices(text.as_bytes()).unwrap());
        assert_eq!(
            session.validate().unwrap(),
            vec![
                ValidationIssue::DatesNotAscending,
                ValidationIssue::InvalidDateFormat,
                ValidationIssue::NonNumericValues,
            ]
        );
    }
}

mod windows {
    use super::*;

    #[test]
    fn ten_price_rows_give_nine_returns() {
        let session = loaded_session(30);
        let returns = session
            .returns_view(&instruments(), range(day(5), day(14)))
            .unwrap();
        assert_eq!(returns.row_count(), 9);
        assert_eq!(returns.instrument_count(), 3);
        assert_eq!(returns.dates[0], "2024-01-07");
    }

    #[test]
    fn log_return_matches_price_ratio() {
        let matrix = synthetic_prices(30);
        let session = Session::with_prices(matrix.clone());
        let returns = session
            .returns_view(&["stock B".to_string()], range(day(0), day(2)))
            .unwrap();
        let p0 = matrix.rows[0][1].as_f64().unwrap();
        let p1 = matrix.rows[1][1].as_f64().unwrap();
        assert_relative_eq!(returns.values[(0, 0)], (p1 / p0).ln(), epsilon = 1e-12);
    }

    #[test]
    fn instrument_order_follows_request() {
        let session = loaded_session(30);
        let names = vec!["stock C".to_string(), "stock A".to_string()];
        let returns = session.returns_view(&names, range(day(0), day(9))).unwrap();
        assert_eq!(returns.instruments, names);
    }

    #[test]
    fn unknown_instrument_and_empty_window() {
        let session = loaded_session(30);
        assert!(matches!(
            session.returns_view(&["stock Z".to_string()], range(day(0), day(9))),
            Err(MptError::UnknownInstrument { .. })
        ));
        assert!(matches!(
            session.returns_view(&instruments(), range(day(100), day(120))),
            Err(MptError::EmptyWindow { .. })
        ));
    }

    #[test]
    fn describe_over_window() {
        let session = loaded_session(30);
        let stats = session
            .describe_instrument("stock A", range(day(0), day(29)))
            .unwrap();
        assert_eq!(stats.len(), 10);
        assert_eq!(stats[0], (Measure::Count, 29.0));
        let get = |m: Measure| stats.iter().find(|(k, _)| *k == m).unwrap().1;
        assert!(get(Measure::Min) <= get(Measure::Q25));
        assert!(get(Measure::Q25) <= get(Measure::Median));
        assert!(get(Measure::Median) <= get(Measure::Q75));
        assert!(get(Measure::Q75) <= get(Measure::Max));
    }

    #[test]
    fn correlation_diagonal_is_one() {
        let session = loaded_session(30);
        let corr = session
            .correlation(&instruments(), range(day(0), day(29)))
            .unwrap();
        for i in 0..3 {
            assert_relative_eq!(corr[(i, i)], 1.0, epsilon = 1e-12);
        }
        assert_relative_eq!(corr[(0, 1)], corr[(1, 0)], epsilon = 1e-12);
    }
}

mod backtest {
    use super::*;

    #[test]
    fn full_sweep_record_count() {
        let session = loaded_session(30);
        let result = session
            .run_portfolio(&request(), &BacktestConfig::default())
            .unwrap();
        assert_eq!(result.records.len(), 48);
        for strategy in Strategy::ALL {
            let days: Vec<usize> = result.for_strategy(strategy).map(|r| r.days).collect();
            assert_eq!(days, (3..19).collect::<Vec<_>>());
        }
    }

    #[test]
    fn weights_are_long_only_and_fully_invested() {
        let session = loaded_session(30);
        let result = session
            .run_portfolio(&request(), &BacktestConfig::default())
            .unwrap();
        for record in &result.records {
            assert_eq!(record.weights.len(), 3);
            assert!(record.weights.iter().all(|w| *w >= -1e-12));
            assert_relative_eq!(record.weights.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
            assert!(record.risk >= 0.0);
        }
    }

    #[test]
    fn sharpe_is_excess_return_over_risk() {
        let session = loaded_session(30);
        let config = BacktestConfig {
            risk_free_rate: 0.001,
            ..BacktestConfig::default()
        };
        let result = session.run_portfolio(&request(), &config).unwrap();
        for record in result.records.iter().filter(|r| r.risk > 0.0) {
            assert_relative_eq!(
                record.sharpe,
                (record.exp_return - 0.001) / record.risk,
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn naive_rows_are_identical_across_windows() {
        let session = loaded_session(30);
        let result = session
            .run_portfolio(&request(), &BacktestConfig::default())
            .unwrap();
        let naive: Vec<_> = result.for_strategy(Strategy::Naive).collect();
        for r in &naive {
            assert_relative_eq!(r.exp_return, naive[0].exp_return, epsilon = 1e-15);
            assert_relative_eq!(r.risk, naive[0].risk, epsilon = 1e-15);
        }
    }

    #[test]
    fn parallel_sweep_matches_sequential() {
        let session = loaded_session(30);
        let sequential = session
            .run_portfolio(&request(), &BacktestConfig::default())
            .unwrap();
        let parallel = session
            .run_portfolio(
                &request(),
                &BacktestConfig {
                    parallel: true,
                    ..BacktestConfig::default()
                },
            )
            .unwrap();
        assert_eq!(sequential.records, parallel.records);
    }

    #[test]
    fn single_row_evaluation_is_rejected() {
        let session = loaded_session(30);
        let mut req = request();
        req.evaluation = range(day(20), day(21));
        assert!(matches!(
            session.run_portfolio(&req, &BacktestConfig::default()),
            Err(MptError::InsufficientData { .. })
        ));
    }
}
