//! Latest prices and bounded rolling sample windows per underlying asset.

use std::collections::{HashMap, VecDeque};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::debug;

/// A timestamped price observation for an underlying asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSample {
    /// Asset symbol, e.g. "BTC".
    pub asset: String,
    /// Observed price.
    pub price: Decimal,
    /// Observation time.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl PriceSample {
    /// Create a new sample.
    pub fn new(asset: impl Into<String>, price: Decimal, timestamp: OffsetDateTime) -> Self {
        Self {
            asset: asset.into(),
            price,
            timestamp,
        }
    }
}

/// Outcome of pushing a sample into a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingest {
    /// Sample stored.
    Accepted,
    /// Sample older than the newest stored sample; dropped.
    OutOfOrder,
    /// Price was zero or negative; dropped.
    Invalid,
}

/// Bounded window of recent samples, evicted oldest-first.
#[derive(Debug, Clone)]
pub struct PriceWindow {
    samples: VecDeque<(OffsetDateTime, Decimal)>,
    capacity: usize,
}

impl PriceWindow {
    /// Create an empty window holding at most `capacity` samples.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a sample. Timestamps must be non-decreasing.
    pub fn push(&mut self, timestamp: OffsetDateTime, price: Decimal) -> Ingest {
        if price <= Decimal::ZERO {
            return Ingest::Invalid;
        }
        if let Some((last, _)) = self.samples.back() {
            if timestamp < *last {
                return Ingest::OutOfOrder;
            }
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back((timestamp, price));
        Ingest::Accepted
    }

    /// Most recent sample.
    pub fn latest(&self) -> Option<(OffsetDateTime, Decimal)> {
        self.samples.back().copied()
    }

    /// Number of stored samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the window is empty.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples observed at or after `since`, oldest first.
    pub fn since(&self, since: OffsetDateTime) -> impl Iterator<Item = &(OffsetDateTime, Decimal)> {
        self.samples.iter().filter(move |(ts, _)| *ts >= since)
    }
}

/// Per-asset price store fed by the price collaborator.
#[derive(Debug, Clone)]
pub struct PriceFeed {
    windows: HashMap<String, PriceWindow>,
    capacity: usize,
}

impl PriceFeed {
    /// Create an empty feed whose windows hold `capacity` samples each.
    pub fn new(capacity: usize) -> Self {
        Self {
            windows: HashMap::new(),
            capacity,
        }
    }

    /// Store a sample, dropping out-of-order or invalid ones.
    pub fn ingest(&mut self, sample: &PriceSample) -> Ingest {
        let capacity = self.capacity;
        let result = self
            .windows
            .entry(sample.asset.clone())
            .or_insert_with(|| PriceWindow::new(capacity))
            .push(sample.timestamp, sample.price);

        if result != Ingest::Accepted {
            debug!(
                asset = %sample.asset,
                price = %sample.price,
                result = ?result,
                "Price sample dropped"
            );
        }
        result
    }

    /// Latest price for an asset.
    pub fn latest_price(&self, asset: &str) -> Option<Decimal> {
        self.window(asset)?.latest().map(|(_, price)| price)
    }

    /// Latest price for an asset, only if it was sampled at or after `since`.
    pub fn latest_price_since(&self, asset: &str, since: OffsetDateTime) -> Option<Decimal> {
        self.window(asset)?
            .latest()
            .filter(|(timestamp, _)| *timestamp >= since)
            .map(|(_, price)| price)
    }

    /// Sample window for an asset.
    pub fn window(&self, asset: &str) -> Option<&PriceWindow> {
        self.windows.get(asset)
    }
}
