use std::str::FromStr;

use crate::error::{AppError, Result};

pub const API_BASE_URL: &str = "https://api.arsha.io/v2";
pub const REGION: &str = "na";
pub const LANGUAGE: &str = "en";

/// Per-item sub list: current price, stock and cumulative trade counter.
pub const SUB_LIST_ENDPOINT: &str = "GetWorldMarketSubList";
/// Per-item order book.
pub const BIDDING_ENDPOINT: &str = "GetBiddingInfoList";

/// Upper bound for a single upstream call (seconds). A stalled call is a fetch failure.
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Minimum spacing between two upstream calls (milliseconds).
pub const MIN_REQUEST_INTERVAL_MS: u64 = 250;

/// Fraction of the sale price withheld by the market.
/// Matches an after-fee multiplier of 0.88725.
pub const MARKET_FEE_RATE: f64 = 0.11275;

/// How far back the analyzer looks for the latest snapshot of each item.
pub const ANALYSIS_LOOKBACK_HOURS: i64 = 24;

/// Trend and volume window for item-detail reports.
pub const TREND_WINDOW_HOURS: i64 = 168;

/// Width of one volume bucket.
pub const VOLUME_INTERVAL_HOURS: i64 = 24;

/// How far back the report API searches for the most recent report.
pub const REPORT_MAX_HOURS_BACK: i64 = 24;

/// Upper bound on any hour window, about ten years.
pub const MAX_WINDOW_HOURS: i64 = 24 * 366 * 10;

/// Longest trade-activity period the report API accepts (days).
pub const MAX_ACTIVITY_PERIOD_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// One scrape + analysis pass, then exit.
    Once,
    /// Hourly ETL plus the report API.
    Schedule,
}

impl FromStr for RunMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "once" => Ok(RunMode::Once),
            "schedule" => Ok(RunMode::Schedule),
            other => Err(AppError::Config(format!(
                "ETL_MODE must be 'once' or 'schedule', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub region: String,
    pub language: String,
    pub log_level: String,
    /// Root of the time-partitioned store (DATA_DIR)
    pub data_dir: String,
    /// Item registry JSON file (REGISTRY_PATH)
    pub registry_path: String,
    pub api_port: u16,
    pub request_timeout_secs: u64,
    pub min_request_interval_ms: u64,
    /// Withheld fraction on sale, 0 <= rate < 1 (MARKET_FEE_RATE)
    pub fee_rate: f64,
    pub lookback_hours: i64,
    pub trend_window_hours: i64,
    pub volume_interval_hours: i64,
    pub report_max_hours_back: i64,
    pub run_mode: RunMode,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let cfg = Self {
            api_base_url: std::env::var("API_BASE_URL")
                .unwrap_or_else(|_| API_BASE_URL.to_string()),
            region: std::env::var("REGION").unwrap_or_else(|_| REGION.to_string()),
            language: std::env::var("LANGUAGE").unwrap_or_else(|_| LANGUAGE.to_string()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            data_dir: std::env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()),
            registry_path: std::env::var("REGISTRY_PATH")
                .unwrap_or_else(|_| "registry.json".to_string()),
            api_port: env_parse("API_PORT", 3000)?,
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", REQUEST_TIMEOUT_SECS)?,
            min_request_interval_ms: env_parse("MIN_REQUEST_INTERVAL_MS", MIN_REQUEST_INTERVAL_MS)?,
            fee_rate: env_parse("MARKET_FEE_RATE", MARKET_FEE_RATE)?,
            lookback_hours: env_parse("ANALYSIS_LOOKBACK_HOURS", ANALYSIS_LOOKBACK_HOURS)?,
            trend_window_hours: env_parse("TREND_WINDOW_HOURS", TREND_WINDOW_HOURS)?,
            volume_interval_hours: env_parse("VOLUME_INTERVAL_HOURS", VOLUME_INTERVAL_HOURS)?,
            report_max_hours_back: env_parse("REPORT_MAX_HOURS_BACK", REPORT_MAX_HOURS_BACK)?,
            run_mode: env_parse("ETL_MODE", RunMode::Schedule)?,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.fee_rate) {
            return Err(AppError::Config(
                "MARKET_FEE_RATE must be in [0, 1)".to_string(),
            ));
        }
        for (name, hours) in [
            ("ANALYSIS_LOOKBACK_HOURS", self.lookback_hours),
            ("TREND_WINDOW_HOURS", self.trend_window_hours),
            ("VOLUME_INTERVAL_HOURS", self.volume_interval_hours),
            ("REPORT_MAX_HOURS_BACK", self.report_max_hours_back),
        ] {
            if !(1..=MAX_WINDOW_HOURS).contains(&hours) {
                return Err(AppError::Config(format!(
                    "{name} must be between 1 and {MAX_WINDOW_HOURS}"
                )));
            }
        }
        Ok(())
    }

    /// Upstream URL prefix including the region segment.
    pub fn market_url(&self) -> String {
        format!("{}/{}", self.api_base_url.trim_end_matches('/'), self.region)
    }
}

fn env_parse<T: FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::Config(format!("{name} has an invalid value: '{raw}'"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Config {
        Config {
            api_base_url: API_BASE_URL.to_string(),
            region: REGION.to_string(),
            language: LANGUAGE.to_string(),
            log_level: "info".to_string(),
            data_dir: "data".to_string(),
            registry_path: "registry.json".to_string(),
            api_port: 3000,
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            min_request_interval_ms: MIN_REQUEST_INTERVAL_MS,
            fee_rate: MARKET_FEE_RATE,
            lookback_hours: ANALYSIS_LOOKBACK_HOURS,
            trend_window_hours: TREND_WINDOW_HOURS,
            volume_interval_hours: VOLUME_INTERVAL_HOURS,
            report_max_hours_back: REPORT_MAX_HOURS_BACK,
            run_mode: RunMode::Once,
        }
    }

    #[test]
    fn defaults_validate() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn rejects_fee_rate_of_one() {
        let cfg = Config { fee_rate: 1.0, ..base() };
        assert!(matches!(cfg.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn rejects_zero_volume_interval() {
        let cfg = Config { volume_interval_hours: 0, ..base() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_oversized_windows() {
        let cfg = Config { lookback_hours: 3_000_000_000, ..base() };
        assert!(matches!(cfg.validate(), Err(AppError::Config(_))));
        let cfg = Config { report_max_hours_back: MAX_WINDOW_HOURS + 1, ..base() };
        assert!(cfg.validate().is_err());
        let cfg = Config { trend_window_hours: MAX_WINDOW_HOURS, ..base() };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn market_url_joins_region() {
        let cfg = Config { api_base_url: "http://localhost:9000/v2/".to_string(), ..base() };
        assert_eq!(cfg.market_url(), "http://localhost:9000/v2/na");
    }

    #[test]
    fn run_mode_parses_case_insensitively() {
        assert_eq!("ONCE".parse::<RunMode>().unwrap(), RunMode::Once);
        assert_eq!("schedule".parse::<RunMode>().unwrap(), RunMode::Schedule);
        assert!("hourly".parse::<RunMode>().is_err());
    }
}
