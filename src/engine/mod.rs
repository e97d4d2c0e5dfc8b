//! Tick-driven trading engine.
//!
//! This module handles:
//! - Ingesting prices, market descriptors and quotes from collaborators
//! - Reference price capture for up/down markets
//! - Scanning markets for opportunities and admitting them
//! - Managing open positions through their exits
//!
//! All mutable state lives in one [`CoreState`] behind a single async mutex.
//! Decisions are made while holding it; executor calls happen after it is
//! released, and their results are applied under the lock again.

use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use rust_decimal::Decimal;
use serde::Serialize;
use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::clock::Clock;
use crate::config::Config;
use crate::edge::{rank, EdgeDetector, Opportunity};
use crate::estimator;
use crate::market::{CatalogUpdate, Ingest, Market, MarketCatalog, PriceFeed, PriceSample, Quote, Resolution};
use crate::metrics;
use crate::risk::{Admission, PositionKey, RiskLimits, RiskSnapshot, RiskState};
use crate::trading::{
    CloseAck, ExitAction, ExitReason, ExitRules, LifecycleManager, NewPosition, OpenRequest,
    OrderExecutor, PerformanceStats, Position, PositionId,
};

/// State mutated by ticks and collaborator updates.
#[derive(Debug)]
pub struct CoreState {
    catalog: MarketCatalog,
    feed: PriceFeed,
    risk: RiskState,
    lifecycle: LifecycleManager,
    detector: EdgeDetector,
    opportunities: Vec<Opportunity>,
    ticks: u64,
    last_tick: Option<OffsetDateTime>,
}

/// Counts from one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Up/down reference prices captured.
    pub references_captured: usize,
    /// Markets dropped from the catalog.
    pub markets_pruned: usize,
    /// Actionable opportunities found.
    pub opportunities: usize,
    /// Opportunities refused by the risk manager.
    pub rejected: usize,
    /// Positions opened.
    pub opened: usize,
    /// Positions closed.
    pub closed: usize,
    /// Closes acknowledged but still pending.
    pub closing: usize,
    /// Failed executor calls.
    pub execution_failures: usize,
}

impl TickReport {
    /// Add another report's counts to this one.
    pub fn merge(&mut self, other: TickReport) {
        self.references_captured += other.references_captured;
        self.markets_pruned += other.markets_pruned;
        self.opportunities += other.opportunities;
        self.rejected += other.rejected;
        self.opened += other.opened;
        self.closed += other.closed;
        self.closing += other.closing;
        self.execution_failures += other.execution_failures;
    }
}

/// Performance figures for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceSummary {
    /// Raw statistics.
    #[serde(flatten)]
    pub stats: PerformanceStats,
    /// Winning trades in percent.
    pub win_rate: Decimal,
    /// Realized P&L over capital deployed, in percent.
    pub roi_percent: Decimal,
    /// Mean hold time in seconds.
    pub average_hold_seconds: i64,
}

/// Engine status for the control channel.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    /// Completed ticks.
    pub ticks: u64,
    /// Time of the last completed tick.
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_tick: Option<OffsetDateTime>,
    /// Markets in the catalog.
    pub markets: usize,
    /// Positions not yet closed.
    pub open_positions: usize,
    /// Sum of unrealized P&L.
    pub unrealized_pnl: Decimal,
    /// Risk counters.
    pub risk: RiskSnapshot,
    /// Closed-trade performance.
    pub performance: PerformanceSummary,
}

/// Held and archived positions.
#[derive(Debug, Clone, Serialize)]
pub struct PositionsView {
    /// Open and closing positions.
    pub open: Vec<Position>,
    /// Closed positions, oldest first.
    pub closed: Vec<Position>,
}

struct PendingOpen {
    admission: Admission,
    request: OpenRequest,
    opportunity: Opportunity,
}

/// Trading engine. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Engine {
    state: Arc<Mutex<CoreState>>,
    executor: Arc<dyn OrderExecutor>,
    clock: Arc<dyn Clock>,
    reference_grace: Duration,
}

impl Engine {
    /// Build an engine from validated configuration.
    pub fn new(config: &Config, executor: Arc<dyn OrderExecutor>, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        let state = CoreState {
            catalog: MarketCatalog::new(),
            feed: PriceFeed::new(config.price_window_size),
            risk: RiskState::new(RiskLimits::from_config(config), now),
            lifecycle: LifecycleManager::new(ExitRules::from_config(config)),
            detector: EdgeDetector::from_config(config),
            opportunities: Vec::new(),
            ticks: 0,
            last_tick: None,
        };
        let grace_secs = i64::try_from(config.reference_capture_grace_secs).unwrap_or(i64::MAX);

        Self {
            state: Arc::new(Mutex::new(state)),
            executor,
            clock,
            reference_grace: Duration::seconds(grace_secs),
        }
    }

    /// Current time from the injected clock.
    pub fn now(&self) -> OffsetDateTime {
        self.clock.now()
    }

    /// Record a price sample. Out-of-order and invalid samples are dropped.
    pub async fn ingest_price(&self, sample: PriceSample) -> Ingest {
        let result = self.state.lock().await.feed.ingest(&sample);
        if result != Ingest::Accepted {
            metrics::inc_samples_dropped();
        }
        result
    }

    /// Insert or refresh a market descriptor.
    pub async fn upsert_market(&self, market: Market) -> CatalogUpdate {
        let id = market.id.clone();
        let update = self.state.lock().await.catalog.upsert(market);
        if update == CatalogUpdate::Inserted {
            debug!(market = %id, "Market added");
        }
        update
    }

    /// Record the latest quote for a market.
    pub async fn update_quote(&self, market_id: &str, quote: Quote) -> bool {
        self.state.lock().await.catalog.set_quote(market_id, quote)
    }

    /// Record a market's resolution. Only the first transition counts.
    pub async fn resolve_market(&self, market_id: &str, resolution: Resolution) -> bool {
        self.state.lock().await.catalog.resolve(market_id, resolution)
    }

    /// Stop admitting new positions.
    pub async fn pause(&self) {
        self.state.lock().await.risk.pause();
        info!("Admissions paused");
    }

    /// Resume admitting new positions.
    pub async fn resume(&self) {
        self.state.lock().await.risk.resume();
        info!("Admissions resumed");
    }

    /// Whether admissions are paused.
    pub async fn is_paused(&self) -> bool {
        self.state.lock().await.risk.is_paused()
    }

    /// Opportunities from the most recent tick, best first.
    pub async fn opportunities(&self) -> Vec<Opportunity> {
        self.state.lock().await.opportunities.clone()
    }

    /// Held and archived positions.
    pub async fn positions(&self) -> PositionsView {
        let state = self.state.lock().await;
        PositionsView {
            open: state.lifecycle.positions().cloned().collect(),
            closed: state.lifecycle.closed().cloned().collect(),
        }
    }

    /// Status snapshot.
    pub async fn status(&self) -> EngineStatus {
        let state = self.state.lock().await;
        let stats = state.lifecycle.stats();
        EngineStatus {
            ticks: state.ticks,
            last_tick: state.last_tick,
            markets: state.catalog.len(),
            open_positions: state.lifecycle.open_count(),
            unrealized_pnl: state.lifecycle.unrealized_pnl(),
            risk: state.risk.snapshot(),
            performance: PerformanceSummary {
                stats: stats.clone(),
                win_rate: stats.win_rate(),
                roi_percent: stats.roi_percent(),
                average_hold_seconds: stats.average_hold_time().whole_seconds(),
            },
        }
    }

    /// Run one evaluation cycle.
    #[instrument(skip(self))]
    pub async fn tick(&self) -> TickReport {
        let _timer = metrics::timer_tick();
        let now = self.clock.now();

        let mut report = self.prepare(now).await;
        let (managed, scanned) = tokio::join!(self.manage_positions(now), self.scan_markets(now));
        report.merge(managed);
        report.merge(scanned);

        let mut state = self.state.lock().await;
        state.ticks += 1;
        state.last_tick = Some(now);
        drop(state);

        debug!(
            opportunities = report.opportunities,
            opened = report.opened,
            closed = report.closed,
            rejected = report.rejected,
            "Tick complete"
        );
        report
    }

    /// Tick every `interval` until `shutdown` completes.
    pub async fn run(&self, interval: std::time::Duration, shutdown: impl Future<Output = ()>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(interval_ms = interval.as_millis() as u64, "Engine started");
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Engine stopping");
                    break;
                }
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }
    }

    /// Day roll, reference capture and catalog pruning.
    async fn prepare(&self, now: OffsetDateTime) -> TickReport {
        let mut report = TickReport::default();
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        state.risk.roll_day(now);

        let grace = self.reference_grace;
        let captures: Vec<(String, Decimal)> = state
            .catalog
            .markets()
            .filter(|m| {
                let in_grace = match m.period_start.checked_add(grace) {
                    Some(grace_end) => now <= grace_end,
                    None => true,
                };
                m.is_updown() && m.reference_price().is_none() && now >= m.period_start && in_grace
            })
            .filter_map(|m| {
                // Samples from before the period opened are not a reference.
                state
                    .feed
                    .latest_price_since(&m.asset, m.period_start)
                    .filter(|price| *price > Decimal::ZERO)
                    .map(|price| (m.id.clone(), price))
            })
            .collect();

        for (market_id, price) in captures {
            if state.catalog.capture_reference(&market_id, price) {
                info!(market = %market_id, reference = %price, "Reference price captured");
                report.references_captured += 1;
            }
        }

        let lifecycle = &state.lifecycle;
        report.markets_pruned = state.catalog.prune(now, |id| lifecycle.holds_market(id));
        report
    }

    /// Estimate, detect and admit, then open admitted positions.
    async fn scan_markets(&self, now: OffsetDateTime) -> TickReport {
        let mut report = TickReport::default();

        let pending = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;

            let headroom = state.risk.headroom();
            let mut opportunities = Vec::new();
            for market in state.catalog.markets() {
                if market.resolution.is_resolved() || !state.detector.is_monitored(market) {
                    continue;
                }
                let Some(quote) = state.catalog.quote(&market.id) else {
                    continue;
                };
                let estimate =
                    match estimator::estimate(market, &state.feed, now, state.detector.model()) {
                        Ok(estimate) => estimate,
                        Err(e) => {
                            debug!(market = %market.id, error = %e, "No estimate");
                            continue;
                        }
                    };
                if let Some(opportunity) = state.detector.check(market, &estimate, &quote, now, headroom) {
                    opportunities.push(opportunity);
                }
            }

            rank(&mut opportunities);
            report.opportunities = opportunities.len();
            metrics::inc_opportunities_detected(opportunities.len() as u64);

            let mut pending = Vec::new();
            for opportunity in &opportunities {
                let key = PositionKey::new(opportunity.market_id.clone(), opportunity.direction);
                match state.risk.admit(key, opportunity.size, now) {
                    Ok(admission) => {
                        metrics::inc_admissions();
                        let position_id = state.lifecycle.allocate_id();
                        pending.push(PendingOpen {
                            request: OpenRequest {
                                position_id,
                                market_id: opportunity.market_id.clone(),
                                direction: opportunity.direction,
                                price: opportunity.quoted_price,
                                size: admission.size(),
                            },
                            admission,
                            opportunity: opportunity.clone(),
                        });
                    }
                    Err(reason) => {
                        debug!(market = %opportunity.market_id, reason = %reason, "Admission rejected");
                        metrics::inc_rejections(reason.into());
                        report.rejected += 1;
                    }
                }
            }

            state.opportunities = opportunities;
            pending
        };

        if pending.is_empty() {
            return report;
        }

        let results = join_all(pending.iter().map(|p| self.executor.open(p.request.clone()))).await;

        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        for (pending, result) in pending.into_iter().zip(results) {
            match result {
                Ok(fill) => {
                    let opportunity = pending.opportunity;
                    let entry = NewPosition {
                        market_id: opportunity.market_id,
                        asset: opportunity.asset,
                        market_kind: opportunity.kind.to_string(),
                        direction: opportunity.direction,
                        entry_price: fill.price,
                        size: pending.request.size,
                        entry_probability: opportunity.side_probability,
                        entry_edge_percent: opportunity.edge_percent,
                        opened_at: now,
                    };
                    state.lifecycle.open(
                        &mut state.risk,
                        pending.admission,
                        pending.request.position_id,
                        entry,
                    );
                    metrics::inc_positions_opened();
                    report.opened += 1;
                }
                Err(e) => {
                    warn!(
                        market = %pending.request.market_id,
                        error = %e,
                        "Open failed, admission cancelled"
                    );
                    state.risk.cancel(pending.admission);
                    metrics::inc_execution_failures("open");
                    report.execution_failures += 1;
                }
            }
        }

        report
    }

    /// Re-mark positions, settle resolved ones and send exits.
    async fn manage_positions(&self, now: OffsetDateTime) -> TickReport {
        let mut report = TickReport::default();

        let (sells, polls) = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;

            state.lifecycle.refresh_marks(&state.catalog);
            let actions =
                state
                    .lifecycle
                    .evaluate(&state.catalog, &state.feed, state.detector.model(), now);

            let mut sells = Vec::new();
            let mut polls = Vec::new();
            for action in actions {
                match action {
                    ExitAction::Settle {
                        position_id,
                        payout,
                    } => {
                        if state
                            .lifecycle
                            .finalize(&mut state.risk, position_id, ExitReason::Resolved, payout, now)
                            .is_some()
                        {
                            metrics::inc_positions_closed(ExitReason::Resolved.into());
                            report.closed += 1;
                        }
                    }
                    ExitAction::Sell { reason, request } => sells.push((reason, request)),
                    ExitAction::Poll { position_id } => polls.push(position_id),
                }
            }
            (sells, polls)
        };

        if sells.is_empty() && polls.is_empty() {
            return report;
        }

        let (sell_results, poll_results) = tokio::join!(
            join_all(sells.iter().map(|(_, request)| self.executor.close(request.clone()))),
            join_all(polls.iter().map(|id| self.executor.poll_close(*id))),
        );

        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        for ((reason, request), result) in sells.into_iter().zip(sell_results) {
            match result {
                Ok(CloseAck::Filled(fill)) => {
                    if Self::finish(state, request.position_id, reason, fill.price, now) {
                        report.closed += 1;
                    }
                }
                Ok(CloseAck::Pending) => {
                    if state.lifecycle.mark_closing(request.position_id, reason) {
                        debug!(position = %request.position_id, reason = %reason, "Close pending");
                        report.closing += 1;
                    }
                }
                Err(e) => {
                    warn!(
                        position = %request.position_id,
                        reason = %reason,
                        error = %e,
                        "Close failed, position stays open"
                    );
                    metrics::inc_execution_failures("close");
                    report.execution_failures += 1;
                }
            }
        }

        for (position_id, result) in polls.into_iter().zip(poll_results) {
            match result {
                Ok(CloseAck::Filled(fill)) => {
                    let Some(reason) = state.lifecycle.get(position_id).and_then(|p| p.exit_reason)
                    else {
                        continue;
                    };
                    if Self::finish(state, position_id, reason, fill.price, now) {
                        report.closed += 1;
                    }
                }
                Ok(CloseAck::Pending) => {}
                Err(e) => {
                    warn!(position = %position_id, error = %e, "Close poll failed");
                    metrics::inc_execution_failures("poll_close");
                    report.execution_failures += 1;
                }
            }
        }

        report
    }

    fn finish(
        state: &mut CoreState,
        position_id: PositionId,
        reason: ExitReason,
        price: Decimal,
        now: OffsetDateTime,
    ) -> bool {
        let closed = state
            .lifecycle
            .finalize(&mut state.risk, position_id, reason, price, now)
            .is_some();
        if closed {
            metrics::inc_positions_closed(reason.into());
        }
        closed
    }
}
