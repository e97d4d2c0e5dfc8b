//! End-to-end tests for the edge trading engine.
//!
//! Every scenario runs on a manual clock against the mock executor, so no
//! network or wall-clock time is involved.
//! Run with: cargo test --test integration

use std::sync::Arc;

use polymarket_edge::clock::{Clock, ManualClock};
use polymarket_edge::config::Config;
use polymarket_edge::engine::Engine;
use polymarket_edge::market::{Direction, Market, MarketKind, PriceSample, Quote, Resolution};
use polymarket_edge::replay;
use polymarket_edge::trading::{ExitReason, MockExecutor, PositionStatus};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use time::macros::datetime;
use time::{Duration, OffsetDateTime};

const START: OffsetDateTime = datetime!(2025-02-09 13:00 UTC);
const BTC_MARKET: &str = "btc-updown-15m-1739106000";

fn updown_market(id: &str, asset: &str, start: OffsetDateTime, reference: Decimal) -> Market {
    Market {
        id: id.to_string(),
        asset: asset.to_string(),
        kind: MarketKind::UpDown {
            reference_price: Some(reference),
        },
        period_start: start,
        period_end: start + Duration::minutes(15),
        resolution: Resolution::Unresolved,
        question: None,
    }
}

struct Harness {
    clock: Arc<ManualClock>,
    executor: MockExecutor,
    engine: Engine,
}

impl Harness {
    fn new(config: Config, at: OffsetDateTime) -> Self {
        let clock = Arc::new(ManualClock::new(at));
        let executor = MockExecutor::new().with_fill_time(at);
        let engine = Engine::new(&config, Arc::new(executor.clone()), clock.clone());
        Self {
            clock,
            executor,
            engine,
        }
    }

    async fn price(&self, asset: &str, price: Decimal) {
        self.engine
            .ingest_price(PriceSample::new(asset, price, self.clock.now()))
            .await;
    }

    async fn quote(&self, market_id: &str, yes: Decimal) {
        self.engine.update_quote(market_id, Quote::from_yes(yes)).await;
    }

    /// BTC up 0.49% with three minutes left, YES quoted at 0.60.
    async fn open_btc_yes(&self) {
        self.engine
            .upsert_market(updown_market(BTC_MARKET, "BTC", START, dec!(103000)))
            .await;
        self.price("BTC", dec!(103500)).await;
        self.quote(BTC_MARKET, dec!(0.60)).await;

        let report = self.engine.tick().await;
        assert_eq!(report.opportunities, 1);
        assert_eq!(report.opened, 1);
    }
}

#[tokio::test]
async fn opens_on_edge_and_exits_at_profit_target() {
    let h = Harness::new(Config::default(), START + Duration::minutes(12));
    h.open_btc_yes().await;

    let opportunity = h.engine.opportunities().await.remove(0);
    assert_eq!(opportunity.direction, Direction::BuyYes);
    assert_eq!(opportunity.probability, dec!(0.76));
    assert_eq!(opportunity.edge_percent, dec!(16));

    let opens = h.executor.opens();
    assert_eq!(opens.len(), 1);
    assert_eq!(opens[0].price, dec!(0.60));
    let size = opens[0].size;

    // The move extends and the market reprices YES to 0.94.
    h.clock.advance(Duration::seconds(30));
    h.price("BTC", dec!(104600)).await;
    h.quote(BTC_MARKET, dec!(0.94)).await;

    let report = h.engine.tick().await;
    assert_eq!(report.closed, 1);
    assert_eq!(report.opened, 0);

    let closes = h.executor.closes();
    assert_eq!(closes.len(), 1);
    assert_eq!(closes[0].price, dec!(0.94));

    let view = h.engine.positions().await;
    assert!(view.open.is_empty());
    let closed = &view.closed[0];
    assert_eq!(closed.status, PositionStatus::Closed);
    assert_eq!(closed.exit_reason, Some(ExitReason::ProfitTarget));
    assert_eq!(closed.realized_pnl, Some(dec!(0.34) * size / dec!(0.60)));

    let status = h.engine.status().await;
    assert_eq!(status.risk.total_exposure, Decimal::ZERO);
    assert_eq!(status.performance.stats.total_trades, 1);
    assert_eq!(status.performance.stats.winning_trades, 1);
}

#[tokio::test]
async fn resolution_settles_without_an_order() {
    let h = Harness::new(Config::default(), START + Duration::minutes(12));
    h.open_btc_yes().await;
    let size = h.executor.opens()[0].size;

    h.clock.set(START + Duration::minutes(15) + Duration::seconds(20));
    assert!(h.engine.resolve_market(BTC_MARKET, Resolution::ResolvedYes).await);

    let report = h.engine.tick().await;
    assert_eq!(report.closed, 1);
    assert!(h.executor.closes().is_empty());

    let view = h.engine.positions().await;
    let closed = &view.closed[0];
    assert_eq!(closed.exit_reason, Some(ExitReason::Resolved));
    assert_eq!(closed.exit_price, Some(Decimal::ONE));
    assert_eq!(closed.realized_pnl, Some(dec!(0.40) * size / dec!(0.60)));
}

#[tokio::test]
async fn pending_close_is_polled_until_filled() {
    let h = Harness::new(Config::default(), START + Duration::minutes(12));
    h.executor.set_pending_closes(true);
    h.open_btc_yes().await;

    h.clock.advance(Duration::seconds(30));
    h.price("BTC", dec!(104600)).await;
    h.quote(BTC_MARKET, dec!(0.94)).await;

    let report = h.engine.tick().await;
    assert_eq!(report.closing, 1);
    assert_eq!(report.closed, 0);

    let view = h.engine.positions().await;
    let position_id = view.open[0].id;
    assert_eq!(view.open[0].status, PositionStatus::Closing);

    // Still pending: no second close order goes out.
    h.clock.advance(Duration::seconds(2));
    let report = h.engine.tick().await;
    assert_eq!(report.closed, 0);
    assert_eq!(h.executor.closes().len(), 1);

    h.executor.release_close(position_id, dec!(0.93));
    h.clock.advance(Duration::seconds(2));
    let report = h.engine.tick().await;
    assert_eq!(report.closed, 1);

    let view = h.engine.positions().await;
    assert!(view.open.is_empty());
    assert_eq!(view.closed[0].exit_price, Some(dec!(0.93)));
    assert_eq!(view.closed[0].exit_reason, Some(ExitReason::ProfitTarget));
    assert_eq!(h.engine.status().await.risk.open_positions, 0);
}

#[tokio::test]
async fn daily_loss_blocks_admissions_until_utc_midnight() {
    let config = Config {
        max_daily_loss: dec!(30),
        ..Config::default()
    };
    let h = Harness::new(config, START + Duration::minutes(12));
    h.open_btc_yes().await;

    // Lose the whole stake.
    h.clock.set(START + Duration::minutes(15) + Duration::seconds(10));
    h.engine.resolve_market(BTC_MARKET, Resolution::ResolvedNo).await;
    assert_eq!(h.engine.tick().await.closed, 1);

    let status = h.engine.status().await;
    assert!(status.risk.breaker_tripped);
    assert!(status.risk.daily_loss >= dec!(30));

    // A fresh opportunity the same day is rejected.
    let eth_start = START + Duration::minutes(15);
    h.clock.set(eth_start + Duration::minutes(11));
    h.engine
        .upsert_market(updown_market("eth-updown-15m-1739106900", "ETH", eth_start, dec!(2000)))
        .await;
    h.price("ETH", dec!(2010)).await;
    h.quote("eth-updown-15m-1739106900", dec!(0.60)).await;

    let report = h.engine.tick().await;
    assert_eq!(report.opportunities, 1);
    assert_eq!(report.rejected, 1);
    assert_eq!(report.opened, 0);

    // Next UTC day the counter resets.
    let next_day = datetime!(2025-02-10 00:00 UTC);
    h.clock.set(next_day + Duration::minutes(11));
    h.engine
        .upsert_market(updown_market("eth-updown-15m-1739145600", "ETH", next_day, dec!(2000)))
        .await;
    h.price("ETH", dec!(2010)).await;
    h.quote("eth-updown-15m-1739145600", dec!(0.60)).await;

    let report = h.engine.tick().await;
    assert_eq!(report.opened, 1);

    let status = h.engine.status().await;
    assert!(!status.risk.breaker_tripped);
    assert_eq!(status.risk.daily_loss, Decimal::ZERO);
}

#[tokio::test]
async fn exposure_never_exceeds_cap() {
    let config = Config {
        max_total_exposure: dec!(100),
        ..Config::default()
    };
    let at = START + Duration::minutes(11);
    let h = Harness::new(config, at);

    for asset in ["BTC", "ETH", "SOL", "XRP"] {
        let id = format!("{}-updown-15m-1739106000", asset.to_lowercase());
        h.engine
            .upsert_market(updown_market(&id, asset, START, dec!(2000)))
            .await;
        h.price(asset, dec!(2010)).await;
        h.quote(&id, dec!(0.60)).await;
    }

    let report = h.engine.tick().await;
    assert_eq!(report.opportunities, 4);
    assert_eq!(report.opened, 2);
    assert_eq!(report.rejected, 2);

    let status = h.engine.status().await;
    assert_eq!(status.risk.total_exposure, dec!(100));
    assert_eq!(status.risk.headroom, Decimal::ZERO);
    assert_eq!(status.open_positions, 2);

    // Held positions block repeats; the cap blocks the rest.
    h.clock.advance(Duration::seconds(2));
    let report = h.engine.tick().await;
    assert_eq!(report.opened, 0);
    assert!(h.engine.status().await.risk.total_exposure <= dec!(100));
}

#[tokio::test]
async fn replays_a_recorded_session() {
    let input = r#"
# BTC 15m up/down, 2025-02-09 13:00 UTC
{"at":"2025-02-09T13:00:00Z","type":"market","slug":"btc-updown-15m-1739106000"}
{"at":"2025-02-09T13:00:01Z","type":"price","asset":"BTC","price":"103000"}
{"at":"2025-02-09T13:11:59Z","type":"price","asset":"BTC","price":"103500"}
{"at":"2025-02-09T13:11:59Z","type":"quote","market_id":"btc-updown-15m-1739106000","yes":"0.60"}
{"at":"2025-02-09T13:15:30Z","type":"resolve","market_id":"btc-updown-15m-1739106000","outcome":"resolved_yes"}
"#;
    let events = replay::parse_events(input).unwrap();
    let clock = Arc::new(ManualClock::new(events[0].at));
    let engine = Engine::new(&Config::default(), Arc::new(MockExecutor::new()), clock.clone());

    let summary = replay::replay(&engine, &clock, events, Duration::seconds(30)).await;

    assert_eq!(summary.events, 5);
    assert_eq!(summary.samples_dropped, 0);
    assert_eq!(summary.totals.references_captured, 1);
    assert_eq!(summary.totals.opened, 1);
    assert_eq!(summary.totals.closed, 1);

    let view = engine.positions().await;
    let closed = &view.closed[0];
    assert_eq!(closed.entry_price, dec!(0.60));
    assert_eq!(closed.opened_at, datetime!(2025-02-09 13:12 UTC));
    assert_eq!(closed.exit_reason, Some(ExitReason::Resolved));

    let status = engine.status().await;
    assert!(status.performance.stats.total_pnl > Decimal::ZERO);
    assert_eq!(status.risk.open_positions, 0);
}
