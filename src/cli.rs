//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_price_adapter::{self, CsvPriceAdapter};
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::allocator::SolverOptions;
use crate::domain::backtest::{BacktestConfig, BacktestResult, Strategy};
use crate::domain::config_validation::{
    parse_config_date, validate_portfolio_config, validate_solver_config,
};
use crate::domain::error::MptError;
use crate::domain::price_matrix::PriceMatrix;
use crate::domain::session::{DateRange, PortfolioRequest, Session};
use crate::domain::validation::{validate, ValidationIssue};
use crate::domain::window::parse_date;
use crate::ports::config_port::ConfigPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "mptfolio", about = "Rolling-window mean-variance portfolio backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check a price file for ordering, date and value problems
    Validate {
        #[arg(short, long)]
        data: PathBuf,
    },
    /// Print log-returns for a date window
    Returns {
        #[arg(short, long)]
        data: PathBuf,
        /// Comma-separated instrument names
        #[arg(short, long)]
        instruments: String,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
    },
    /// Summary statistics of one instrument's returns
    Describe {
        #[arg(short, long)]
        data: PathBuf,
        #[arg(short, long)]
        instrument: String,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
        /// Also print a histogram with this many bins
        #[arg(long)]
        bins: Option<usize>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Correlation matrix of instrument returns
    Correlation {
        #[arg(short, long)]
        data: PathBuf,
        #[arg(short, long)]
        instruments: String,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
    },
    /// Run the rolling-window backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Print an example price file
    Template,
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Validate { data } => run_validate(&data),
        Command::Returns {
            data,
            instruments,
            start,
            end,
        } => run_returns(&data, &instruments, &start, &end),
        Command::Describe {
            data,
            instrument,
            start,
            end,
            bins,
            output,
        } => run_describe(&data, &instrument, &start, &end, bins, output.as_deref()),
        Command::Correlation {
            data,
            instruments,
            start,
            end,
        } => run_correlation(&data, &instruments, &start, &end),
        Command::Backtest {
            config,
            output,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config)
            } else {
                run_backtest(&config, output.as_deref())
            }
        }
        Command::Template => {
            print!("{}", csv_price_adapter::template());
            ExitCode::SUCCESS
        }
    }
}

fn fail(err: MptError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(fail)
}

pub fn load_session(data: &Path) -> Result<Session, MptError> {
    let adapter = CsvPriceAdapter::new(data.to_path_buf())?;
    let mut session = Session::new();
    session.load(&adapter)?;
    Ok(session)
}

pub fn parse_instruments(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn parse_range(start: &str, end: &str) -> Result<DateRange, MptError> {
    Ok(DateRange::new(parse_date(start)?, parse_date(end)?))
}

pub const PREVIEW_ROWS: usize = 10;
pub const PREVIEW_INSTRUMENTS: usize = 8;

/// Numbered findings followed by a repair hint, or the pass message.
pub fn validation_messages(issues: &[ValidationIssue]) -> Vec<String> {
    if issues.is_empty() {
        return vec!["Data set passed the validation.".to_string()];
    }
    let mut lines: Vec<String> = issues
        .iter()
        .enumerate()
        .map(|(i, issue)| format!("Issue #{} {}", i + 1, issue))
        .collect();
    lines.push("Try to repair the data set and reupload it.".to_string());
    lines
}

/// Leading rows and instrument columns of the table as CSV-style lines.
pub fn preview_lines(matrix: &PriceMatrix) -> Vec<String> {
    let preview = matrix.preview(PREVIEW_ROWS, PREVIEW_INSTRUMENTS);
    let mut lines = vec![format!("date,{}", preview.instruments.join(","))];
    for (date, row) in preview.dates.iter().zip(&preview.rows) {
        let cells: Vec<String> = row.iter().map(|c| c.to_string()).collect();
        lines.push(format!("{},{}", date, cells.join(",")));
    }
    lines
}

fn run_validate(data: &Path) -> ExitCode {
    eprintln!("Validating {}", data.display());
    let session = match load_session(data) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let matrix = match session.prices() {
        Ok(m) => m,
        Err(e) => return fail(e),
    };
    let issues = validate(matrix);

    for line in preview_lines(matrix) {
        println!("{}", line);
    }
    let dates = matrix.sorted_dates();
    if let (Some(first), Some(last)) = (dates.first(), dates.last()) {
        eprintln!(
            "\n{} rows x {} instruments, dates {} to {}",
            matrix.row_count(),
            matrix.instruments.len(),
            first,
            last
        );
    }

    for line in validation_messages(&issues) {
        eprintln!("{}", line);
    }
    if issues.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(5)
    }
}

fn run_returns(data: &Path, instruments: &str, start: &str, end: &str) -> ExitCode {
    let result = load_session(data).and_then(|session| {
        let range = parse_range(start, end)?;
        session.returns_view(&parse_instruments(instruments), range)
    });
    let returns = match result {
        Ok(r) => r,
        Err(e) => return fail(e),
    };

    println!("date,{}", returns.instruments.join(","));
    for (i, date) in returns.dates.iter().enumerate() {
        let row: Vec<String> = returns.values.row(i).iter().map(|v| v.to_string()).collect();
        println!("{},{}", date, row.join(","));
    }
    ExitCode::SUCCESS
}

fn run_describe(
    data: &Path,
    instrument: &str,
    start: &str,
    end: &str,
    bins: Option<usize>,
    output: Option<&Path>,
) -> ExitCode {
    let session = match load_session(data) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let range = match parse_range(start, end) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };
    let stats = match session.describe_instrument(instrument, range) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    println!("{}", instrument);
    for (measure, value) in &stats {
        println!("  {:<10} {:>14.6}", measure.to_string(), value);
    }

    if let Some(bins) = bins {
        match session.return_histogram(instrument, range, bins) {
            Ok(histogram) => {
                println!("\nHistogram:");
                for bin in histogram {
                    println!("  [{:>10.6}, {:>10.6}) {}", bin.lower, bin.upper, bin.count);
                }
            }
            Err(e) => return fail(e),
        }
    }

    if let Some(path) = output {
        if let Err(e) = CsvReportAdapter::new().write_statistics(&stats, path) {
            return fail(e);
        }
        eprintln!("Statistics written to {}", path.display());
    }
    ExitCode::SUCCESS
}

fn run_correlation(data: &Path, instruments: &str, start: &str, end: &str) -> ExitCode {
    let instruments = parse_instruments(instruments);
    let result = load_session(data).and_then(|session| {
        let range = parse_range(start, end)?;
        session.correlation(&instruments, range)
    });
    let corr = match result {
        Ok(c) => c,
        Err(e) => return fail(e),
    };

    let width = instruments.iter().map(|i| i.len()).max().unwrap_or(0).max(8);
    print!("{:width$}", "", width = width);
    for name in &instruments {
        print!(" {:>width$}", name, width = width);
    }
    println!();
    for (i, name) in instruments.iter().enumerate() {
        print!("{:width$}", name, width = width);
        for j in 0..instruments.len() {
            print!(" {:>width$.4}", corr[(i, j)], width = width);
        }
        println!();
    }
    ExitCode::SUCCESS
}

pub fn build_portfolio_request(config: &dyn ConfigPort) -> Result<PortfolioRequest, MptError> {
    validate_portfolio_config(config)?;
    let instruments = config
        .get_list("portfolio", "instruments")
        .ok_or_else(|| MptError::ConfigMissing {
            section: "portfolio".into(),
            key: "instruments".into(),
        })?;
    Ok(PortfolioRequest {
        instruments,
        estimation: DateRange::new(
            parse_config_date(config, "estimation_start")?,
            parse_config_date(config, "estimation_end")?,
        ),
        evaluation: DateRange::new(
            parse_config_date(config, "evaluation_start")?,
            parse_config_date(config, "evaluation_end")?,
        ),
    })
}

pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, MptError> {
    validate_solver_config(config)?;
    let defaults = BacktestConfig::default();
    let solver_defaults = SolverOptions::default();
    Ok(BacktestConfig {
        risk_free_rate: config.get_double("portfolio", "risk_free_rate", defaults.risk_free_rate),
        solver: SolverOptions {
            max_iterations: config.get_int(
                "solver",
                "max_iterations",
                solver_defaults.max_iterations as i64,
            ) as usize,
            tolerance: config.get_double("solver", "tolerance", solver_defaults.tolerance),
            accept_non_converged: config.get_bool(
                "solver",
                "accept_non_converged",
                solver_defaults.accept_non_converged,
            ),
            multi_start: config.get_bool("solver", "multi_start", solver_defaults.multi_start),
        },
        min_window: config.get_int("backtest", "min_window", defaults.min_window as i64) as usize,
        parallel: config.get_bool("backtest", "parallel", defaults.parallel),
    })
}

/// Data path from the config; relative paths resolve against the config file's directory.
pub fn resolve_data_path(config: &dyn ConfigPort, config_path: &Path) -> Result<PathBuf, MptError> {
    let raw = config
        .get_string("data", "path")
        .ok_or_else(|| MptError::ConfigMissing {
            section: "data".into(),
            key: "path".into(),
        })?;
    let path = PathBuf::from(raw.trim());
    if path.is_absolute() {
        return Ok(path);
    }
    Ok(match config_path.parent() {
        Some(dir) => dir.join(path),
        None => path,
    })
}

/// Loads prices, runs the sweep and writes the table when `output` is set.
pub fn run_backtest_pipeline(
    session: &Session,
    request: &PortfolioRequest,
    config: &BacktestConfig,
    output: Option<&Path>,
) -> Result<BacktestResult, MptError> {
    let result = session.run_portfolio(request, config)?;
    let report = CsvReportAdapter::new();
    match output {
        Some(path) => {
            report.write_backtest(&result, &request.instruments, path)?;
            eprintln!("Results written to {}", path.display());
        }
        None => {
            CsvReportAdapter::records_to_writer(
                &result.records,
                &request.instruments,
                io::stdout().lock(),
            )?;
        }
    }
    Ok(result)
}

fn run_backtest(config_path: &Path, output_override: Option<&Path>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let request = match build_portfolio_request(&adapter) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };
    let bt_config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    let data_path = match resolve_data_path(&adapter, config_path) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };

    eprintln!("Loading prices from {}", data_path.display());
    let session = match load_session(&data_path) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    let configured_output = adapter.get_string("report", "output").map(PathBuf::from);
    let output = output_override.or(configured_output.as_deref());

    eprintln!(
        "Running backtest on {} instruments...",
        request.instruments.len()
    );
    let result = match run_backtest_pipeline(&session, &request, &bt_config, output) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };

    print_summary(&result);
    ExitCode::SUCCESS
}

pub fn print_summary(result: &BacktestResult) {
    eprintln!("\n=== Backtest Summary ===");
    for strategy in Strategy::ALL {
        let records: Vec<_> = result.for_strategy(strategy).collect();
        let best = records
            .iter()
            .filter(|r| r.sharpe.is_finite())
            .max_by(|a, b| a.sharpe.total_cmp(&b.sharpe));
        match best {
            Some(r) => eprintln!(
                "  {:<9} {:>3} windows, best Sharpe {:.4} at {} days (return {:.4}, risk {:.4})",
                strategy.to_string(),
                records.len(),
                r.sharpe,
                r.days,
                r.exp_return,
                r.risk
            ),
            None => eprintln!(
                "  {:<9} {:>3} windows, no finite Sharpe ratio",
                strategy.to_string(),
                records.len()
            ),
        }
    }
    if result.non_converged > 0 {
        eprintln!(
            "  {} solves stopped at the iteration limit",
            result.non_converged
        );
    }
    for failure in &result.failures {
        eprintln!(
            "  skipped {} at {} days: {}",
            failure.strategy, failure.days, failure.error
        );
    }
}

pub fn run_dry_run(config_path: &Path) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let request = match build_portfolio_request(&adapter) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };
    let bt_config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    eprintln!("Config validated successfully");

    eprintln!("\nPortfolio:");
    eprintln!("  instruments: {}", request.instruments.join(", "));
    eprintln!(
        "  estimation:  {} to {}",
        request.estimation.start, request.estimation.end
    );
    eprintln!(
        "  evaluation:  {} to {}",
        request.evaluation.start, request.evaluation.end
    );
    eprintln!("  risk-free:   {}", bt_config.risk_free_rate);

    eprintln!("\nSolver:");
    eprintln!("  max_iterations:       {}", bt_config.solver.max_iterations);
    eprintln!("  tolerance:            {:e}", bt_config.solver.tolerance);
    eprintln!(
        "  accept_non_converged: {}",
        bt_config.solver.accept_non_converged
    );
    eprintln!("  multi_start:          {}", bt_config.solver.multi_start);
    eprintln!("  min_window:           {}", bt_config.min_window);
    eprintln!("  parallel:             {}", bt_config.parallel);

    eprintln!("\nDry run complete: configuration is valid");
    ExitCode::SUCCESS
}
