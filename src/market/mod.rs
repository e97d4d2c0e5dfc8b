//! Market module for binary crypto prediction markets.
//!
//! This module handles:
//! - Market types and data structures
//! - Price feed storage with bounded sample windows
//! - The market catalog with edge-triggered resolution
//! - Question and slug parsing

pub mod catalog;
pub mod feed;
pub mod parse;
pub mod types;

pub use catalog::{CatalogUpdate, MarketCatalog};
pub use feed::{Ingest, PriceFeed, PriceSample, PriceWindow};
pub use parse::{classify_question, detect_asset, extract_target_price, parse_updown_slug};
pub use types::{Direction, Market, MarketKind, Quote, Resolution};
