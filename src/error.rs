//! Unified error types for the trading core.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::trading::PositionId;

/// Unified error type for the trading core.
#[derive(Error, Debug)]
pub enum BotError {
    /// Configuration loading or validation error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Probability estimation error.
    #[error("estimate error: {0}")]
    Estimate(#[from] EstimateError),

    /// Order execution error.
    #[error("execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// Replay source error.
    #[error("replay error: {0}")]
    Replay(#[from] ReplayError),

    /// JSON parsing error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors. Always fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Environment could not be deserialized.
    #[error("failed to load configuration: {0}")]
    Load(#[from] envy::Error),

    /// A parameter is out of its allowed range.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Offending option name.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Malformed or missing inputs to the probability model.
///
/// These never abort a tick; the market simply yields no opportunity.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EstimateError {
    /// No price has been observed for the underlying asset.
    #[error("no price observed for {asset}")]
    NoPrice {
        /// Underlying asset symbol.
        asset: String,
    },

    /// A price was zero or negative.
    #[error("non-positive price {price} for {asset}")]
    NonPositivePrice {
        /// Underlying asset symbol.
        asset: String,
        /// Offending price.
        price: Decimal,
    },

    /// The up/down reference price has not been captured yet.
    #[error("reference price not captured for market {market_id}")]
    ReferenceNotCaptured {
        /// Market identifier.
        market_id: String,
    },

    /// The market period is empty or inverted.
    #[error("invalid period for market {market_id}")]
    InvalidPeriod {
        /// Market identifier.
        market_id: String,
    },
}

/// Order execution failures reported by the venue collaborator.
///
/// A failure leaves the position in its prior state; the decision is retried
/// on the next tick.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    /// The order could not be submitted.
    #[error("order submission failed: {0}")]
    SubmissionFailed(String),

    /// The venue rejected the order.
    #[error("order rejected: {reason}")]
    OrderRejected {
        /// Rejection reason from the venue.
        reason: String,
    },

    /// The venue does not know the position.
    #[error("unknown position {0}")]
    UnknownPosition(PositionId),

    /// Invalid order parameters.
    #[error("invalid order parameters: {0}")]
    InvalidParams(String),
}

/// A recorded market descriptor that does not describe a tradeable market.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketEventError {
    #[error("market needs an id or slug")]
    MissingId,

    #[error("market needs a slug, question or target_price")]
    MissingKind,

    #[error("cannot classify question {0:?}")]
    Unclassifiable(String),

    #[error("cannot determine asset")]
    UnknownAsset,

    /// A period bound is absent.
    #[error("missing {0}")]
    MissingPeriod(&'static str),

    #[error("period_end must be after period_start")]
    InvertedPeriod,
}

/// Errors while reading a recorded event stream.
#[derive(Error, Debug)]
pub enum ReplayError {
    /// A line could not be parsed.
    #[error("line {line}: {source}")]
    Parse {
        /// One-based line number.
        line: usize,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// An event is older than the one before it.
    #[error("line {line}: event timestamp goes backwards")]
    OutOfOrder {
        /// One-based line number.
        line: usize,
    },

    /// A market event could not be turned into a market.
    #[error("line {line}: {source}")]
    InvalidMarket {
        /// One-based line number.
        line: usize,
        /// What was wrong with it.
        #[source]
        source: MarketEventError,
    },

    /// IO error while reading the file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, BotError>;
