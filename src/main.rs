use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use backtester::Backtester;
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Cell, Table};
use configuration::{load_settings, Cadence};
use core_types::StrategyKind;
use strategies::create_strategy;
use supervisor::{BotSpec, BotSupervisor};
use tracing_subscriber::EnvFilter;
use venue::{MarketData, MemorySink, PaperVenue};

/// The main entry point for the Armada trading fleet.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Backtest(args) => handle_backtest(args).await,
        Commands::Fleet(args) => handle_fleet(args).await,
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// An autonomous, risk-bounded trading bot fleet.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a strategy over a deterministic synthetic history.
    Backtest(BacktestArgs),
    /// Run a small demo fleet against the paper venue for a bounded time.
    Fleet(FleetArgs),
}

#[derive(Parser)]
struct BacktestArgs {
    /// The symbol to simulate (e.g., "BTC/USDT").
    #[arg(long, default_value = "BTC/USDT")]
    symbol: String,

    /// The bar interval (e.g., "1m", "1h", "1d").
    #[arg(long, default_value = "1h")]
    cadence: String,

    /// The strategy kind (e.g., "ma_crossover", "momentum").
    #[arg(long, default_value = "ma_crossover")]
    strategy: String,

    /// How many bars of history to simulate.
    #[arg(long, default_value_t = 500)]
    bars: usize,

    /// Seed for the synthetic price walk.
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

#[derive(Parser)]
struct FleetArgs {
    /// How long to let the fleet run, in seconds.
    #[arg(long, default_value_t = 30)]
    duration: u64,

    /// Seed for the paper venue's price walks.
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

// ==============================================================================
// Backtest Command
// ==============================================================================

async fn handle_backtest(args: BacktestArgs) -> anyhow::Result<()> {
    let settings = load_settings().context("failed to load settings")?;
    let cadence: Cadence = args.cadence.parse().context("invalid cadence")?;
    let kind: StrategyKind = args.strategy.parse().context("invalid strategy kind")?;

    let strategy = create_strategy(kind, &settings).context("strategy construction failed")?;
    tracing::info!(
        symbol = %args.symbol,
        strategy = %kind,
        bars = args.bars,
        "starting backtest"
    );

    // The paper venue doubles as the deterministic history generator.
    let venue = PaperVenue::new(args.seed);
    let bars = venue
        .fetch_bars(&args.symbol, cadence, args.bars)
        .await
        .context("synthetic history generation failed")?;

    let mut backtester = Backtester::new(&args.symbol, cadence, strategy, &settings.backtest);
    let result = backtester.run(&bars)?;

    println!(
        "\nBacktest of {} ({}) over {} bars: {} trades\n",
        args.symbol,
        kind,
        args.bars,
        result.trades.len()
    );
    println!("{}", report_table(&result.report));
    Ok(())
}

fn report_table(report: &analytics::PerformanceReport) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![Cell::new("Metric"), Cell::new("Value")]);

    let fmt_opt = |value: Option<rust_decimal::Decimal>| match value {
        Some(v) => v.round_dp(4).to_string(),
        None => "n/a".to_string(),
    };

    table.add_row(vec![
        "Total net profit".to_string(),
        report.total_net_profit.round_dp(2).to_string(),
    ]);
    table.add_row(vec![
        "Total return %".to_string(),
        report.total_return_pct.round_dp(2).to_string(),
    ]);
    table.add_row(vec![
        "Profit factor".to_string(),
        report.profit_factor.to_string(),
    ]);
    table.add_row(vec![
        "Max drawdown %".to_string(),
        report.max_drawdown_pct.round_dp(2).to_string(),
    ]);
    table.add_row(vec!["Sharpe ratio".to_string(), fmt_opt(report.sharpe_ratio)]);
    table.add_row(vec!["Calmar ratio".to_string(), fmt_opt(report.calmar_ratio)]);
    table.add_row(vec![
        "Trades (win/lose)".to_string(),
        format!(
            "{} ({}/{})",
            report.total_trades, report.winning_trades, report.losing_trades
        ),
    ]);
    table.add_row(vec![
        "Win rate %".to_string(),
        report.win_rate_pct.round_dp(2).to_string(),
    ]);
    table.add_row(vec![
        "Average win / loss".to_string(),
        format!(
            "{} / {}",
            report.average_win.round_dp(2),
            report.average_loss.round_dp(2)
        ),
    ]);
    table.add_row(vec![
        "Avg holding period".to_string(),
        format!("{:?}", report.average_holding_period),
    ]);
    table
}

// ==============================================================================
// Fleet Command
// ==============================================================================

async fn handle_fleet(args: FleetArgs) -> anyhow::Result<()> {
    let settings = load_settings().context("failed to load settings")?;

    let venue = Arc::new(PaperVenue::new(args.seed));
    let sink = Arc::new(MemorySink::new());
    let supervisor = Arc::new(BotSupervisor::new(
        settings,
        venue.clone(),
        venue.clone(),
        sink.clone(),
    ));

    let demo_bots = [
        ("demo-ma", "BTC/USDT", StrategyKind::MaCrossover),
        ("demo-momentum", "ETH/USDT", StrategyKind::Momentum),
    ];
    for (name, symbol, kind) in demo_bots {
        supervisor
            .deploy(BotSpec {
                name: name.to_string(),
                symbol: symbol.to_string(),
                cadence: Cadence::M1,
                kind,
            })
            .await?;
        supervisor.start(name).await?;
    }
    let health_monitor = supervisor.spawn_health_monitor();

    tracing::info!(duration = args.duration, "fleet running");
    tokio::time::sleep(Duration::from_secs(args.duration)).await;

    health_monitor.abort();
    supervisor.shutdown().await;

    println!("\n{}", fleet_table(&supervisor.status_all().await));
    let metrics = supervisor.fleet_metrics().await;
    println!(
        "Fleet totals: {} trades, realized P&L {}, win rate {}",
        metrics.total_trades,
        metrics.total_realized_pnl.round_dp(2),
        metrics
            .win_rate_pct
            .map(|r| format!("{}%", r.round_dp(1)))
            .unwrap_or_else(|| "n/a".to_string()),
    );
    println!("{} events recorded", sink.events().len());
    Ok(())
}

fn fleet_table(snapshots: &[supervisor::BotDescriptor]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        "Bot", "Symbol", "Strategy", "Status", "Cycles", "Trades", "P&L", "Last error",
    ]);
    for snapshot in snapshots {
        table.add_row(vec![
            snapshot.name.clone(),
            snapshot.symbol.clone(),
            snapshot.kind.to_string(),
            snapshot.status.to_string(),
            snapshot.cycles.to_string(),
            snapshot.trades_closed.to_string(),
            snapshot.realized_pnl.round_dp(2).to_string(),
            snapshot.last_error.clone().unwrap_or_default(),
        ]);
    }
    table
}
