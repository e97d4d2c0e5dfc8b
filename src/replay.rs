//! Recorded event replay.
//!
//! A replay file holds one JSON event per line, ordered by time. Blank lines
//! and lines starting with `#` are skipped. Events are applied to the engine
//! through the same entry points the live collaborators use, and the engine
//! is ticked at the configured interval on a manual clock in between.
//!
//! ```text
//! {"at":"2025-02-09T13:00:00Z","type":"market","slug":"btc-updown-15m-1739106000"}
//! {"at":"2025-02-09T13:00:01Z","type":"price","asset":"BTC","price":"103000"}
//! {"at":"2025-02-09T13:12:00Z","type":"quote","market_id":"btc-updown-15m-1739106000","yes":"0.60"}
//! {"at":"2025-02-09T13:15:30Z","type":"resolve","market_id":"btc-updown-15m-1739106000","outcome":"resolved_yes"}
//! ```

use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tracing::{debug, info, instrument};

use crate::clock::ManualClock;
use crate::engine::{Engine, TickReport};
use crate::error::{MarketEventError, ReplayError};
use crate::market::{
    classify_question, detect_asset, parse_updown_slug, Ingest, Market, MarketKind, PriceSample,
    Quote, Resolution,
};

/// Market descriptor as recorded.
///
/// Either an up/down slug, or a question (or explicit target) with an asset
/// and a period.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MarketEvent {
    /// Market identifier; defaults to the slug.
    #[serde(default)]
    pub id: Option<String>,
    /// Up/down slug carrying asset and period.
    #[serde(default)]
    pub slug: Option<String>,
    /// Market question.
    #[serde(default)]
    pub question: Option<String>,
    /// Asset symbol; detected from the question when absent.
    #[serde(default)]
    pub asset: Option<String>,
    /// Price-target strike; parsed from the question when absent.
    #[serde(default)]
    pub target_price: Option<Decimal>,
    /// Period start.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub period_start: Option<OffsetDateTime>,
    /// Period end.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub period_end: Option<OffsetDateTime>,
}

impl MarketEvent {
    /// Build a market from the recorded fields.
    pub fn into_market(self) -> Result<Market, MarketEventError> {
        if let Some(parsed) = self.slug.as_deref().and_then(parse_updown_slug) {
            let id = self.id.or(self.slug).unwrap_or_default();
            return Ok(Market {
                id,
                asset: parsed.asset,
                kind: MarketKind::UpDown {
                    reference_price: None,
                },
                period_start: parsed.period_start,
                period_end: parsed.period_end,
                resolution: Resolution::Unresolved,
                question: self.question,
            });
        }

        let id = self
            .id
            .or(self.slug)
            .ok_or(MarketEventError::MissingId)?;
        let kind = match (self.target_price, self.question.as_deref()) {
            (Some(target_price), _) => MarketKind::PriceTarget { target_price },
            (None, Some(question)) => classify_question(question)
                .ok_or_else(|| MarketEventError::Unclassifiable(question.to_string()))?,
            (None, None) => return Err(MarketEventError::MissingKind),
        };
        let asset = self
            .asset
            .map(|a| a.trim().to_uppercase())
            .or_else(|| self.question.as_deref().and_then(detect_asset).map(str::to_string))
            .ok_or(MarketEventError::UnknownAsset)?;
        let period_start = self
            .period_start
            .ok_or(MarketEventError::MissingPeriod("period_start"))?;
        let period_end = self
            .period_end
            .ok_or(MarketEventError::MissingPeriod("period_end"))?;
        if period_end <= period_start {
            return Err(MarketEventError::InvertedPeriod);
        }

        Ok(Market {
            id,
            asset,
            kind,
            period_start,
            period_end,
            resolution: Resolution::Unresolved,
            question: self.question,
        })
    }
}

/// One recorded collaborator event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplayEvent {
    /// Market listing update.
    Market(MarketEvent),
    /// Underlying price observation.
    Price {
        /// Asset symbol.
        asset: String,
        /// Observed price.
        price: Decimal,
    },
    /// Market quote update.
    Quote {
        /// Market identifier.
        market_id: String,
        /// YES price.
        yes: Decimal,
        /// NO price; complementary when absent.
        #[serde(default)]
        no: Option<Decimal>,
    },
    /// Market resolution.
    Resolve {
        /// Market identifier.
        market_id: String,
        /// Resolved outcome.
        outcome: Resolution,
    },
}

/// An event with its timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TimedEvent {
    /// When the event happened.
    #[serde(with = "time::serde::rfc3339")]
    pub at: OffsetDateTime,
    /// The event.
    #[serde(flatten)]
    pub event: ReplayEvent,
}

/// Counts accumulated over a replay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    /// Events applied.
    pub events: usize,
    /// Price samples dropped by the feed.
    pub samples_dropped: usize,
    /// Ticks run.
    pub ticks: usize,
    /// Totals over all ticks.
    pub totals: TickReport,
}

/// Parse a JSON-lines event stream.
pub fn parse_events(input: &str) -> Result<Vec<TimedEvent>, ReplayError> {
    let mut events: Vec<TimedEvent> = Vec::new();

    for (index, raw) in input.lines().enumerate() {
        let line = index + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let event: TimedEvent =
            serde_json::from_str(trimmed).map_err(|source| ReplayError::Parse { line, source })?;
        if events.last().is_some_and(|last| event.at < last.at) {
            return Err(ReplayError::OutOfOrder { line });
        }
        if let ReplayEvent::Market(market) = &event.event {
            market
                .clone()
                .into_market()
                .map_err(|source| ReplayError::InvalidMarket { line, source })?;
        }
        events.push(event);
    }

    Ok(events)
}

/// Read and parse an event file.
pub async fn load_events(path: impl AsRef<Path>) -> Result<Vec<TimedEvent>, ReplayError> {
    let input = tokio::fs::read_to_string(path).await?;
    parse_events(&input)
}

/// Drive `engine` through `events`, ticking every `tick_interval` of
/// simulated time. A final tick runs after the last event.
#[instrument(skip(engine, clock, events), fields(events = events.len()))]
pub async fn replay(
    engine: &Engine,
    clock: &ManualClock,
    events: Vec<TimedEvent>,
    tick_interval: Duration,
) -> ReplaySummary {
    let mut summary = ReplaySummary::default();
    let Some(first) = events.first() else {
        return summary;
    };

    let step = if tick_interval.is_positive() {
        tick_interval
    } else {
        Duration::seconds(1)
    };
    let mut next_tick = first.at;

    for TimedEvent { at, event } in events {
        while next_tick < at {
            clock.set(next_tick);
            summary.record_tick(engine.tick().await);
            next_tick += step;
        }
        clock.set(at);
        apply(engine, at, event, &mut summary).await;
    }

    summary.record_tick(engine.tick().await);

    info!(
        events = summary.events,
        ticks = summary.ticks,
        opened = summary.totals.opened,
        closed = summary.totals.closed,
        "Replay complete"
    );
    summary
}

async fn apply(engine: &Engine, at: OffsetDateTime, event: ReplayEvent, summary: &mut ReplaySummary) {
    summary.events += 1;
    match event {
        ReplayEvent::Market(market) => match market.into_market() {
            Ok(market) => {
                engine.upsert_market(market).await;
            }
            Err(e) => debug!(reason = %e, "Skipping market event"),
        },
        ReplayEvent::Price { asset, price } => {
            if engine.ingest_price(PriceSample::new(asset, price, at)).await != Ingest::Accepted {
                summary.samples_dropped += 1;
            }
        }
        ReplayEvent::Quote { market_id, yes, no } => {
            let quote = match no {
                Some(no) => Quote { yes, no },
                None => Quote::from_yes(yes),
            };
            if !engine.update_quote(&market_id, quote).await {
                debug!(market = %market_id, "Quote for unknown market ignored");
            }
        }
        ReplayEvent::Resolve { market_id, outcome } => {
            engine.resolve_market(&market_id, outcome).await;
        }
    }
}

impl ReplaySummary {
    fn record_tick(&mut self, report: TickReport) {
        self.ticks += 1;
        self.totals.merge(report);
    }
}
