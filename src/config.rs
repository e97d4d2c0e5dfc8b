//! Application configuration loaded from environment variables.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // === Edge Detection ===
    /// Minimum |edge| in percentage points for an opportunity to be actionable.
    #[serde(default = "default_min_edge")]
    pub min_edge_percent: Decimal,

    // === Position Sizing ===
    /// Base position size in USD.
    #[serde(default = "default_position_size")]
    pub default_position_size: Decimal,

    /// Largest single position in USD.
    #[serde(default = "default_max_position_size")]
    pub max_position_size: Decimal,

    /// Smallest position worth opening in USD.
    #[serde(default = "default_min_position_size")]
    pub min_position_size: Decimal,

    /// Edge (percentage points) above which a setup counts as strong.
    #[serde(default = "default_strong_setup_edge")]
    pub strong_setup_edge_percent: Decimal,

    /// Strong setups must also have less than this many minutes left.
    #[serde(default = "default_strong_setup_minutes")]
    pub strong_setup_minutes: Decimal,

    /// Size multiplier for strong setups (1.2 = 20% larger).
    #[serde(default = "default_strong_setup_multiplier")]
    pub strong_setup_multiplier: Decimal,

    // === Risk Limits ===
    /// Cap on the sum of open position sizes in USD.
    #[serde(default = "default_max_total_exposure")]
    pub max_total_exposure: Decimal,

    /// Cap on simultaneously open positions.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_positions: usize,

    /// Realized loss in USD after which admissions stop until UTC midnight.
    #[serde(default = "default_max_daily_loss")]
    pub max_daily_loss: Decimal,

    // === Exit Rules ===
    /// Close when ROI reaches this percentage. 0 disables.
    #[serde(default = "default_profit_target")]
    pub profit_target_percent: Decimal,

    /// Close when ROI falls to minus this percentage. 0 disables.
    #[serde(default = "default_stop_loss")]
    pub stop_loss_percent: Decimal,

    /// Close after holding this many minutes. 0 disables.
    #[serde(default = "default_time_limit")]
    pub time_limit_minutes: u64,

    /// Enable expected-value exits.
    #[serde(default = "default_true")]
    pub smart_exit_enabled: bool,

    /// Per-share amount by which selling must beat holding for an EV exit.
    #[serde(default = "default_smart_exit_margin")]
    pub smart_exit_margin: Decimal,

    // === Market Monitoring ===
    /// Underlying assets to monitor (comma-separated in the environment).
    #[serde(default = "default_monitored_assets")]
    pub monitored_assets: Vec<String>,

    /// Trade price-target markets.
    #[serde(default = "default_true")]
    pub monitor_price_target: bool,

    /// Trade up/down markets.
    #[serde(default = "default_true")]
    pub monitor_updown: bool,

    /// Up/down markets are only traded in their last N minutes.
    #[serde(default = "default_updown_window_minutes")]
    pub updown_window_minutes: Decimal,

    /// Up/down markets are only traded in this final fraction of the period.
    #[serde(default = "default_updown_window_fraction")]
    pub updown_window_fraction: Decimal,

    /// Seconds after period start during which a reference price may be captured.
    #[serde(default = "default_reference_grace")]
    pub reference_capture_grace_secs: u64,

    // === Probability Model ===
    /// Per-minute log-price volatility for price-target markets.
    #[serde(default = "default_price_target_volatility")]
    pub price_target_volatility: Decimal,

    /// Hard ceiling on up/down probabilities.
    #[serde(default = "default_probability_ceiling")]
    pub probability_ceiling: Decimal,

    /// Fixed persistence bonus.
    #[serde(default = "default_persistence_bonus")]
    pub persistence_bonus: Decimal,

    /// Fraction of samples that must sit on one side of the reference.
    #[serde(default = "default_persistence_threshold")]
    pub persistence_threshold: Decimal,

    /// Fewest samples needed before persistence can apply.
    #[serde(default = "default_persistence_min_samples")]
    pub persistence_min_samples: usize,

    /// Samples kept per asset in the rolling window.
    #[serde(default = "default_price_window_size")]
    pub price_window_size: usize,

    // === Scheduling ===
    /// Evaluation tick interval in milliseconds.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,

    // === Server Configuration ===
    /// HTTP server port for the control API and metrics.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub rust_log: String,

    /// Enable verbose logging.
    #[serde(default)]
    pub verbose: bool,

    /// Emit logs as JSON lines.
    #[serde(default)]
    pub log_json: bool,
}

fn default_min_edge() -> Decimal {
    Decimal::new(3, 0) // 3 percentage points
}

fn default_position_size() -> Decimal {
    Decimal::new(50, 0)
}

fn default_max_position_size() -> Decimal {
    Decimal::new(200, 0)
}

fn default_min_position_size() -> Decimal {
    Decimal::new(10, 0)
}

fn default_strong_setup_edge() -> Decimal {
    Decimal::new(10, 0)
}

fn default_strong_setup_minutes() -> Decimal {
    Decimal::new(3, 0)
}

fn default_strong_setup_multiplier() -> Decimal {
    Decimal::new(12, 1) // 1.2
}

fn default_max_total_exposure() -> Decimal {
    Decimal::new(1000, 0)
}

fn default_max_concurrent() -> usize {
    10
}

fn default_max_daily_loss() -> Decimal {
    Decimal::new(200, 0)
}

fn default_profit_target() -> Decimal {
    Decimal::new(50, 0)
}

fn default_stop_loss() -> Decimal {
    Decimal::new(20, 0)
}

fn default_time_limit() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_smart_exit_margin() -> Decimal {
    Decimal::new(2, 2) // 0.02 per share
}

fn default_monitored_assets() -> Vec<String> {
    ["BTC", "ETH", "SOL", "XRP"].map(String::from).to_vec()
}

fn default_updown_window_minutes() -> Decimal {
    Decimal::new(5, 0)
}

fn default_updown_window_fraction() -> Decimal {
    Decimal::ONE
}

fn default_reference_grace() -> u64 {
    60
}

fn default_price_target_volatility() -> Decimal {
    Decimal::new(1, 3) // 0.1% per minute
}

fn default_probability_ceiling() -> Decimal {
    Decimal::new(96, 2)
}

fn default_persistence_bonus() -> Decimal {
    Decimal::new(5, 2)
}

fn default_persistence_threshold() -> Decimal {
    Decimal::new(8, 1)
}

fn default_persistence_min_samples() -> usize {
    5
}

fn default_price_window_size() -> usize {
    600
}

fn default_tick_interval() -> u64 {
    2000
}

fn default_port() -> u16 {
    8080
}

/// Upper bound for `TIME_LIMIT_MINUTES`.
pub const MAX_TIME_LIMIT_MINUTES: u64 = 7 * 24 * 60;

/// Upper bound for `REFERENCE_CAPTURE_GRACE_SECS`.
pub const MAX_REFERENCE_GRACE_SECS: u64 = 3600;

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_edge_percent: default_min_edge(),
            default_position_size: default_position_size(),
            max_position_size: default_max_position_size(),
            min_position_size: default_min_position_size(),
            strong_setup_edge_percent: default_strong_setup_edge(),
            strong_setup_minutes: default_strong_setup_minutes(),
            strong_setup_multiplier: default_strong_setup_multiplier(),
            max_total_exposure: default_max_total_exposure(),
            max_concurrent_positions: default_max_concurrent(),
            max_daily_loss: default_max_daily_loss(),
            profit_target_percent: default_profit_target(),
            stop_loss_percent: default_stop_loss(),
            time_limit_minutes: default_time_limit(),
            smart_exit_enabled: true,
            smart_exit_margin: default_smart_exit_margin(),
            monitored_assets: default_monitored_assets(),
            monitor_price_target: true,
            monitor_updown: true,
            updown_window_minutes: default_updown_window_minutes(),
            updown_window_fraction: default_updown_window_fraction(),
            reference_capture_grace_secs: default_reference_grace(),
            price_target_volatility: default_price_target_volatility(),
            probability_ceiling: default_probability_ceiling(),
            persistence_bonus: default_persistence_bonus(),
            persistence_threshold: default_persistence_threshold(),
            persistence_min_samples: default_persistence_min_samples(),
            price_window_size: default_price_window_size(),
            tick_interval_ms: default_tick_interval(),
            port: default_port(),
            rust_log: default_log_level(),
            verbose: false,
            log_json: false,
        }
    }
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Ok(envy::from_env()?)
    }

    /// Check that every parameter is in range. Values are never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let hundred = Decimal::ONE_HUNDRED;

        if self.min_edge_percent < Decimal::ZERO || self.min_edge_percent > hundred {
            return Err(ConfigError::invalid(
                "MIN_EDGE_PERCENT",
                "must be between 0 and 100",
            ));
        }

        if self.default_position_size <= Decimal::ZERO {
            return Err(ConfigError::invalid(
                "DEFAULT_POSITION_SIZE",
                "must be positive",
            ));
        }

        if self.max_position_size < self.default_position_size {
            return Err(ConfigError::invalid(
                "MAX_POSITION_SIZE",
                "must be at least DEFAULT_POSITION_SIZE",
            ));
        }

        if self.min_position_size < Decimal::ZERO || self.min_position_size > self.max_position_size {
            return Err(ConfigError::invalid(
                "MIN_POSITION_SIZE",
                "must be between 0 and MAX_POSITION_SIZE",
            ));
        }

        if self.strong_setup_edge_percent < Decimal::ZERO || self.strong_setup_minutes < Decimal::ZERO {
            return Err(ConfigError::invalid(
                "STRONG_SETUP_EDGE_PERCENT",
                "strong setup thresholds must not be negative",
            ));
        }

        if self.strong_setup_multiplier < Decimal::ONE {
            return Err(ConfigError::invalid(
                "STRONG_SETUP_MULTIPLIER",
                "must be at least 1.0",
            ));
        }

        if self.max_total_exposure <= Decimal::ZERO {
            return Err(ConfigError::invalid("MAX_TOTAL_EXPOSURE", "must be positive"));
        }

        if self.max_concurrent_positions == 0 {
            return Err(ConfigError::invalid(
                "MAX_CONCURRENT_POSITIONS",
                "must be at least 1",
            ));
        }

        if self.max_daily_loss <= Decimal::ZERO {
            return Err(ConfigError::invalid("MAX_DAILY_LOSS", "must be positive"));
        }

        if self.profit_target_percent < Decimal::ZERO {
            return Err(ConfigError::invalid(
                "PROFIT_TARGET_PERCENT",
                "must not be negative",
            ));
        }

        if self.stop_loss_percent < Decimal::ZERO || self.stop_loss_percent > hundred {
            return Err(ConfigError::invalid(
                "STOP_LOSS_PERCENT",
                "must be between 0 and 100",
            ));
        }

        if self.time_limit_minutes > MAX_TIME_LIMIT_MINUTES {
            return Err(ConfigError::invalid(
                "TIME_LIMIT_MINUTES",
                "must be at most 10080 (one week)",
            ));
        }

        if self.smart_exit_margin < Decimal::ZERO {
            return Err(ConfigError::invalid("SMART_EXIT_MARGIN", "must not be negative"));
        }

        if self.updown_window_minutes <= Decimal::ZERO {
            return Err(ConfigError::invalid(
                "UPDOWN_WINDOW_MINUTES",
                "must be positive",
            ));
        }

        if self.updown_window_fraction <= Decimal::ZERO || self.updown_window_fraction > Decimal::ONE {
            return Err(ConfigError::invalid(
                "UPDOWN_WINDOW_FRACTION",
                "must be in (0, 1]",
            ));
        }

        if self.reference_capture_grace_secs > MAX_REFERENCE_GRACE_SECS {
            return Err(ConfigError::invalid(
                "REFERENCE_CAPTURE_GRACE_SECS",
                "must be at most 3600",
            ));
        }

        if self.price_target_volatility <= Decimal::ZERO {
            return Err(ConfigError::invalid(
                "PRICE_TARGET_VOLATILITY",
                "must be positive",
            ));
        }

        if self.probability_ceiling <= Decimal::new(5, 1) || self.probability_ceiling >= Decimal::ONE {
            return Err(ConfigError::invalid(
                "PROBABILITY_CEILING",
                "must be in (0.5, 1)",
            ));
        }

        if self.persistence_bonus < Decimal::ZERO || self.persistence_bonus >= Decimal::new(5, 1) {
            return Err(ConfigError::invalid(
                "PERSISTENCE_BONUS",
                "must be in [0, 0.5)",
            ));
        }

        if self.persistence_threshold <= Decimal::ZERO || self.persistence_threshold > Decimal::ONE {
            return Err(ConfigError::invalid(
                "PERSISTENCE_THRESHOLD",
                "must be in (0, 1]",
            ));
        }

        if self.price_window_size == 0 {
            return Err(ConfigError::invalid("PRICE_WINDOW_SIZE", "must be at least 1"));
        }

        if self.tick_interval_ms == 0 {
            return Err(ConfigError::invalid("TICK_INTERVAL_MS", "must be at least 1"));
        }

        if self.monitored_assets.iter().any(|asset| asset.trim().is_empty()) {
            return Err(ConfigError::invalid(
                "MONITORED_ASSETS",
                "asset symbols must not be empty",
            ));
        }

        Ok(())
    }
}
