use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use configuration::{Cadence, Settings};
use core_types::{Bar, BotStatus, StrategyKind};
use supervisor::{BotSpec, BotSupervisor, SupervisorError};
use venue::{Fault, MarketData, MemorySink, PaperVenue, VenueError};

fn spec(name: &str, symbol: &str) -> BotSpec {
    BotSpec {
        name: name.to_string(),
        symbol: symbol.to_string(),
        cadence: Cadence::M1,
        kind: StrategyKind::MaCrossover,
    }
}

fn fleet(settings: Settings) -> (Arc<BotSupervisor>, Arc<PaperVenue>, Arc<MemorySink>) {
    let venue = Arc::new(PaperVenue::new(7));
    let sink = Arc::new(MemorySink::new());
    let supervisor = Arc::new(BotSupervisor::new(
        settings,
        venue.clone(),
        venue.clone(),
        sink.clone(),
    ));
    (supervisor, venue, sink)
}

#[tokio::test]
async fn duplicate_names_are_rejected_without_mutation() {
    let (supervisor, _venue, _sink) = fleet(Settings::default());

    supervisor.deploy(spec("alpha", "BTC/USDT")).await.unwrap();
    let err = supervisor
        .deploy(spec("alpha", "ETH/USDT"))
        .await
        .unwrap_err();
    assert!(matches!(err, SupervisorError::DuplicateName(_)));

    let all = supervisor.status_all().await;
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].symbol, "BTC/USDT");
}

#[tokio::test]
async fn capacity_rejection_leaves_the_fleet_untouched() {
    let mut settings = Settings::default();
    settings.fleet.max_concurrent_bots = 2;
    let (supervisor, _venue, _sink) = fleet(settings);

    supervisor.deploy(spec("one", "BTC/USDT")).await.unwrap();
    supervisor.deploy(spec("two", "ETH/USDT")).await.unwrap();
    let err = supervisor
        .deploy(spec("three", "SOL/USDT"))
        .await
        .unwrap_err();
    assert!(matches!(err, SupervisorError::FleetFull(2)));
    assert_eq!(supervisor.status_all().await.len(), 2);
}

#[tokio::test]
async fn malformed_symbols_are_rejected_at_deploy() {
    let (supervisor, _venue, _sink) = fleet(Settings::default());

    for symbol in ["BTCUSDT", "BTC/", "/USDT", "BTC/USD/T"] {
        let err = supervisor.deploy(spec("bad", symbol)).await.unwrap_err();
        assert!(matches!(err, SupervisorError::InvalidConfig(_)));
    }
    assert!(supervisor.status_all().await.is_empty());
}

#[tokio::test]
async fn lifecycle_start_pause_resume_stop() {
    let (supervisor, _venue, sink) = fleet(Settings::default());

    supervisor.deploy(spec("alpha", "BTC/USDT")).await.unwrap();
    assert_eq!(
        supervisor.status("alpha").await.unwrap().status,
        BotStatus::Stopped
    );

    supervisor.start("alpha").await.unwrap();
    // The first cycle runs immediately; give it a moment to complete.
    tokio::time::sleep(Duration::from_millis(300)).await;
    let snapshot = supervisor.status("alpha").await.unwrap();
    assert_eq!(snapshot.status, BotStatus::Running);
    assert!(snapshot.cycles >= 1);

    supervisor.pause("alpha").await.unwrap();
    assert_eq!(
        supervisor.status("alpha").await.unwrap().status,
        BotStatus::Paused
    );

    supervisor.resume("alpha").await.unwrap();
    assert_eq!(
        supervisor.status("alpha").await.unwrap().status,
        BotStatus::Running
    );

    supervisor.stop("alpha").await.unwrap();
    assert_eq!(
        supervisor.status("alpha").await.unwrap().status,
        BotStatus::Stopped
    );

    let kinds: Vec<String> = sink.events().iter().map(|e| e.kind.clone()).collect();
    for expected in ["deployed", "started", "paused", "resumed", "stopped"] {
        assert!(kinds.iter().any(|k| k == expected), "missing event {expected}");
    }
}

#[tokio::test]
async fn starting_a_running_bot_is_an_invalid_state() {
    let (supervisor, _venue, _sink) = fleet(Settings::default());

    supervisor.deploy(spec("alpha", "BTC/USDT")).await.unwrap();
    supervisor.start("alpha").await.unwrap();

    let err = supervisor.start("alpha").await.unwrap_err();
    assert!(matches!(err, SupervisorError::InvalidState { .. }));

    supervisor.shutdown().await;
}

#[tokio::test]
async fn authentication_failure_stops_the_worker_with_the_error() {
    let (supervisor, venue, _sink) = fleet(Settings::default());

    supervisor.deploy(spec("alpha", "BTC/USDT")).await.unwrap();
    venue.inject_fault(Fault::Authentication);
    supervisor.start("alpha").await.unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    let snapshot = supervisor.status("alpha").await.unwrap();
    assert_eq!(snapshot.status, BotStatus::StoppedWithError);
    let error = snapshot.last_error.expect("last_error should be preserved");
    assert!(error.contains("Authentication"));
}

/// A market-data source whose fetch never completes.
struct StalledMarket;

#[async_trait]
impl MarketData for StalledMarket {
    async fn fetch_bars(
        &self,
        _symbol: &str,
        _cadence: Cadence,
        _limit: usize,
    ) -> Result<Vec<Bar>, VenueError> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn stalled_worker_is_aborted_after_the_grace_period() {
    let mut settings = Settings::default();
    // A fetch timeout far beyond the grace period keeps the worker wedged
    // inside its fetch, where it cannot observe the stop signal.
    settings.fleet.fetch_timeout = Duration::from_secs(3600);
    settings.fleet.shutdown_grace = Duration::from_millis(100);

    let venue = Arc::new(PaperVenue::new(7));
    let sink = Arc::new(MemorySink::new());
    let supervisor = Arc::new(BotSupervisor::new(
        settings,
        Arc::new(StalledMarket),
        venue,
        sink.clone(),
    ));

    supervisor.deploy(spec("alpha", "BTC/USDT")).await.unwrap();
    supervisor.start("alpha").await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    supervisor.stop("alpha").await.unwrap();

    // The task was torn down, not detached: the descriptor says stopped and
    // the abort is on the record.
    let snapshot = supervisor.status("alpha").await.unwrap();
    assert_eq!(snapshot.status, BotStatus::Stopped);
    assert!(sink.events().iter().any(|e| e.kind == "aborted"));
}

#[tokio::test]
async fn remove_stops_and_forgets() {
    let (supervisor, _venue, _sink) = fleet(Settings::default());

    supervisor.deploy(spec("alpha", "BTC/USDT")).await.unwrap();
    supervisor.start("alpha").await.unwrap();
    supervisor.remove("alpha").await.unwrap();

    assert!(supervisor.status_all().await.is_empty());
    let err = supervisor.status("alpha").await.unwrap_err();
    assert!(matches!(err, SupervisorError::NotFound(_)));
}

#[tokio::test]
async fn fleet_metrics_count_statuses() {
    let (supervisor, _venue, _sink) = fleet(Settings::default());

    supervisor.deploy(spec("one", "BTC/USDT")).await.unwrap();
    supervisor.deploy(spec("two", "ETH/USDT")).await.unwrap();
    supervisor.start("one").await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let metrics = supervisor.fleet_metrics().await;
    assert_eq!(metrics.total_bots, 2);
    assert_eq!(metrics.running, 1);
    assert_eq!(metrics.stopped, 1);

    supervisor.shutdown().await;
    let metrics = supervisor.fleet_metrics().await;
    assert_eq!(metrics.running, 0);
}
