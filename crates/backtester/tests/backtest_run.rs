use backtester::{BacktestError, Backtester};
use chrono::{Duration, TimeZone, Utc};
use configuration::{Cadence, Settings};
use core_types::{Bar, CloseReason, StrategyKind};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use strategies::create_strategy;

/// A steady 1%-per-bar uptrend with small wicks, hourly bars.
fn uptrend(len: usize) -> Vec<Bar> {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let mut close = dec!(100);
    let mut bars = Vec::with_capacity(len);
    for i in 0..len {
        let open = close;
        close = (open * dec!(1.01)).round_dp(8);
        bars.push(Bar {
            timestamp: start + Duration::hours(i as i64),
            open,
            high: (close * dec!(1.002)).round_dp(8),
            low: (open * dec!(0.998)).round_dp(8),
            close,
            volume: dec!(100),
        });
    }
    bars
}

fn momentum_backtester(settings: &Settings) -> Backtester {
    let strategy = create_strategy(StrategyKind::Momentum, settings).unwrap();
    Backtester::new("BTC/USDT", Cadence::H1, strategy, &settings.backtest)
}

#[test]
fn uptrend_produces_profitable_momentum_trades() {
    let settings = Settings::default();
    let mut backtester = momentum_backtester(&settings);
    let bars = uptrend(250);

    let result = backtester.run(&bars).unwrap();

    assert!(!result.trades.is_empty());
    assert!(result.trades.iter().any(|t| t.is_winner()));
    assert!(result.report.total_net_profit > Decimal::ZERO);

    // Breakout entries in a monotone uptrend never hit the stop.
    assert!(result
        .trades
        .iter()
        .all(|t| t.reason != CloseReason::StopLoss));

    // No unrealized exposure survives the run.
    let last_reason = result.trades.last().unwrap().reason;
    assert!(matches!(
        last_reason,
        CloseReason::TakeProfit | CloseReason::ExitSignal | CloseReason::EndOfBacktest
    ));

    // One equity point per evaluated bar, final equity reflects the profit.
    let final_equity = result.equity_curve.last().unwrap().equity;
    assert!(final_equity > settings.backtest.initial_capital);
}

#[test]
fn identical_inputs_replay_identically() {
    let settings = Settings::default();
    let bars = uptrend(250);

    let first = momentum_backtester(&settings).run(&bars).unwrap();
    let second = momentum_backtester(&settings).run(&bars).unwrap();

    // Trade records round-trip byte for byte, ids included.
    assert_eq!(first.trades, second.trades);
    assert_eq!(first.equity_curve, second.equity_curve);
    assert_eq!(first.report, second.report);
}

#[test]
fn short_history_is_rejected_before_simulation() {
    let settings = Settings::default();
    let mut backtester = momentum_backtester(&settings);
    let bars = uptrend(10);

    match backtester.run(&bars) {
        Err(BacktestError::InsufficientHistory { required, got }) => {
            assert!(required > got);
            assert_eq!(got, 10);
        }
        other => panic!("expected InsufficientHistory, got {other:?}"),
    }
}
