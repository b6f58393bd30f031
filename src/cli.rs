//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvDataAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::pinescript_report::PineScriptReport;
use crate::domain::backtest::run_backtest;
use crate::domain::config_validation::{
    backtest_config, initial_cash, parameter_grid, portfolio_settings, segments, split,
    strategy_kind, strategy_parameters, validate_backtest_config, validate_data_config,
    validate_portfolio_config, validate_strategy_config, validate_training_config,
    validate_walk_forward_config,
};
use crate::domain::error::BarlabError;
use crate::domain::metrics::BacktestResults;
use crate::domain::portfolio::PortfolioRebalance;
use crate::domain::series::PriceSeries;
use crate::domain::strategy::Strategy;
use crate::domain::trainer::train;
use crate::domain::walk_forward::walk_forward;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "barlab", about = "Event-driven strategy backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one strategy over the configured price series
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Write entry/exit markers as a Pine Script indicator
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Grid-search strategy parameters and score them on held-out bars
    Train {
        #[arg(short, long)]
        config: PathBuf,
        /// Pine Script markers for the test window trades
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Train and test over successive expanding windows
    WalkForward {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Simulate a periodically rebalanced multi-asset portfolio
    Rebalance {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Validate a configuration file without running anything
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Backtest { config, output } => run_backtest_command(&config, output.as_deref()),
        Command::Train { config, output } => run_train(&config, output.as_deref()),
        Command::WalkForward { config } => run_walk_forward(&config),
        Command::Rebalance { config } => run_rebalance(&config),
        Command::Validate { config } => run_validate(&config),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, BarlabError> {
    eprintln!("Loading config from {}", path.display());
    FileConfigAdapter::from_file(path)
}

/// `[data] path` names a CSV file, or a directory when `symbol` is set.
pub fn load_series(config: &dyn ConfigPort) -> PriceSeries {
    let path = PathBuf::from(config.get_string("data", "path").unwrap_or_default());
    let (base, symbol) = match config.get_string("data", "symbol") {
        Some(symbol) => (path, symbol),
        None => (
            path.parent().map(Path::to_path_buf).unwrap_or_default(),
            path.file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_default(),
        ),
    };
    let series = CsvDataAdapter::new(base).fetch_or_empty(&symbol);
    eprintln!("Loaded {} bars for {}", series.len(), symbol);
    series
}

fn build_strategy(config: &dyn ConfigPort) -> Result<Strategy, BarlabError> {
    strategy_kind(config)?.build(&strategy_parameters(config)?)
}

fn run_backtest_command(config_path: &Path, output: Option<&Path>) -> Result<(), BarlabError> {
    let config = load_config(config_path)?;
    validate_backtest_config(&config)?;
    validate_strategy_config(&config)?;

    let strategy = build_strategy(&config)?;
    let bt_config = backtest_config(&config)?;
    let series = load_series(&config);

    eprintln!("Running {}", strategy);
    let results = run_backtest(&strategy, &series, &bt_config);
    print_summary("Backtest", &results);

    if let Some(path) = output {
        export(&results, &strategy, path)?;
    }
    Ok(())
}

fn run_train(config_path: &Path, output: Option<&Path>) -> Result<(), BarlabError> {
    let config = load_config(config_path)?;
    validate_data_config(&config)?;
    validate_training_config(&config)?;

    let kind = strategy_kind(&config)?;
    let grid = parameter_grid(&config, kind)?;
    let split = split(&config)?;
    let cash = initial_cash(&config)?;
    let series = load_series(&config);

    eprintln!(
        "Training {} over {} combinations",
        kind,
        grid.combination_count()
    );
    let Some(outcome) = train(&series, kind, &grid, split, cash)? else {
        println!("No parameter combinations to evaluate");
        return Ok(());
    };

    println!("Best parameters: {}", outcome.parameters);
    println!("Train/test cutoff: bar {}", outcome.cutoff);
    print_summary("Training window", &outcome.train_results);
    print_summary("Test window", &outcome.test_results);

    if let Some(path) = output {
        export(&outcome.test_results, &outcome.strategy, path)?;
    }
    Ok(())
}

fn run_walk_forward(config_path: &Path) -> Result<(), BarlabError> {
    let config = load_config(config_path)?;
    validate_data_config(&config)?;
    validate_walk_forward_config(&config)?;

    let kind = strategy_kind(&config)?;
    let grid = parameter_grid(&config, kind)?;
    let segments = segments(&config)?;
    let cash = initial_cash(&config)?;
    let series = load_series(&config);

    eprintln!("Walk-forward {} with {} segments", kind, segments);
    let steps = walk_forward(&series, kind, &grid, segments, cash)?;

    let mut excesses = Vec::new();
    for (i, step) in steps.iter().enumerate() {
        match (&step.parameters, &step.test_results) {
            (Some(params), Some(results)) => {
                println!(
                    "step {}: test [{}, {}) {} trades, excess {:.4}, params {}",
                    i + 1,
                    step.test_start,
                    step.boundary,
                    results.trade_number,
                    results.excess,
                    params
                );
                excesses.push(results.excess);
            }
            _ => println!(
                "step {}: test [{}, {}) no result",
                i + 1,
                step.test_start,
                step.boundary
            ),
        }
    }
    if !excesses.is_empty() {
        let mean = excesses.iter().sum::<f64>() / excesses.len() as f64;
        println!("Mean test excess: {:.4}", mean);
    }
    Ok(())
}

fn run_rebalance(config_path: &Path) -> Result<(), BarlabError> {
    let config = load_config(config_path)?;
    validate_portfolio_config(&config)?;
    let settings = portfolio_settings(&config)?;

    let base = PathBuf::from(config.get_string("data", "path").unwrap_or_default());
    let adapter = CsvDataAdapter::new(base);
    let assets: Vec<PriceSeries> = settings
        .assets
        .iter()
        .map(|symbol| adapter.fetch_or_empty(symbol))
        .collect();

    let portfolio = if settings.momentum {
        PortfolioRebalance::on_momentum(
            assets,
            settings.frequency,
            settings.initial_value,
            settings.cash_asset,
        )?
    } else {
        PortfolioRebalance::new(
            assets,
            &settings.weights,
            settings.frequency,
            settings.initial_value,
        )?
    };

    eprintln!("Rebalancing {} assets", settings.assets.len());
    let results = portfolio.run();
    for (date, value) in results.date_history.iter().zip(&results.value_history) {
        println!("{}  {:.2}", date, value);
    }
    println!("Final value: {:.2}", results.final_value);
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), BarlabError> {
    let config = load_config(config_path)?;
    let mut checked = Vec::new();

    if config.has_section("strategy") {
        validate_strategy_config(&config)?;
        checked.push("strategy");
    }
    if config.has_section("data") {
        validate_backtest_config(&config)?;
        checked.push("backtest");
    }
    if config.has_section("grid") {
        validate_training_config(&config)?;
        checked.push("training");
    }
    if config.has_section("walk_forward") {
        validate_walk_forward_config(&config)?;
        checked.push("walk-forward");
    }
    if config.has_section("portfolio") {
        validate_portfolio_config(&config)?;
        checked.push("portfolio");
    }

    if checked.is_empty() {
        return Err(BarlabError::ConfigMissing {
            section: "strategy".into(),
            key: "kind".into(),
        });
    }
    println!("Config OK ({})", checked.join(", "));
    Ok(())
}

fn export(results: &BacktestResults, strategy: &Strategy, path: &Path) -> Result<(), BarlabError> {
    PineScriptReport::new().write(results, strategy, &path.to_string_lossy())?;
    eprintln!("Pine Script written to {}", path.display());
    Ok(())
}

pub fn print_summary(label: &str, results: &BacktestResults) {
    println!("{label}");
    println!(
        "  trades:      {} ({} wins, {} losses)",
        results.trade_number, results.wins, results.losses
    );
    println!("  final cash:  {:.2}", results.cash_final);
    println!(
        "  pnl:         {:.2} ({:.2}%)",
        results.pnl,
        results.pnl_percentage * 100.0
    );
    println!("  buy & hold:  {:.2}", results.buy_and_hold_pnl);
    println!("  excess:      {:.4}", results.excess);
    println!("  win rate:    {:.1}%", results.win_rate * 100.0);
    println!("  kelly:       {:.4}", results.kelly_criterion);
}
