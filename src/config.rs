use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::time::ms_to_ns;
use crate::types::{price_utils, Price, Qty};

fn is_zero_i64(v: &i64) -> bool {
    *v == 0
}

fn is_zero_f64(v: &f64) -> bool {
    *v == 0.0
}

/// All parameters for a simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub name: String,
    pub seed: u64,
    /// total simulation duration in nanos
    #[serde(rename = "duration_ns")]
    pub duration: i64,

    pub fast_trader: TraderConfig,
    pub slow_trader: TraderConfig,

    pub scenario: ScenarioParams,
}

/// Trader-specific parameters. Latencies are user-facing milliseconds,
/// converted to nanoseconds at model construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraderConfig {
    pub id: String,
    pub base_latency_ms: i64,
    pub jitter_ms: i64,
}

/// Background order flow parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioParams {
    /// fixed-point
    pub initial_mid_price: Price,
    /// fixed-point
    pub initial_spread: Price,
    /// mean inter-arrival of background orders
    pub order_interval_ns: i64,
    /// fraction of orders that are market
    pub market_order_ratio: f64,
    /// probability of a cancel per interval
    pub cancel_rate: f64,
    pub min_order_size: Qty,
    pub max_order_size: Qty,
    pub price_tick_size: Price,
    /// how many levels to populate
    pub max_price_levels: usize,
    /// how often signals fire
    pub signal_interval_ns: i64,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub depth_per_level: i64,

    // Spike specific
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub burst_window_ns: i64,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub burst_interval_ns: i64,
    /// multiplier on arrival rate during bursts
    #[serde(default, skip_serializing_if = "is_zero_f64")]
    pub burst_rate: f64,
    /// cancel rate multiplier during bursts
    #[serde(default, skip_serializing_if = "is_zero_f64")]
    pub burst_cancel_mul: f64,
    /// market order ratio multiplier during bursts
    #[serde(default, skip_serializing_if = "is_zero_f64")]
    pub burst_market_mul: f64,
    /// order size multiplier during bursts
    #[serde(default, skip_serializing_if = "is_zero_f64")]
    pub burst_size_mul: f64,
    /// max cancel rate during bursts
    #[serde(default, skip_serializing_if = "is_zero_f64")]
    pub burst_cancel_cap: f64,
    /// max market ratio during bursts
    #[serde(default, skip_serializing_if = "is_zero_f64")]
    pub burst_market_cap: f64,
}

fn default_traders() -> (TraderConfig, TraderConfig) {
    (
        TraderConfig {
            id: "fast".to_string(),
            base_latency_ms: 1,
            jitter_ms: 0,
        },
        TraderConfig {
            id: "slow".to_string(),
            base_latency_ms: 50,
            jitter_ms: 10,
        },
    )
}

impl Config {
    /// Default configuration for a calm, deep market
    pub fn calm(seed: u64) -> Self {
        let (fast_trader, slow_trader) = default_traders();
        Self {
            name: "calm".to_string(),
            seed,
            duration: ms_to_ns(10_000),
            fast_trader,
            slow_trader,
            scenario: ScenarioParams {
                initial_mid_price: price_utils::from_f64(100.0),
                initial_spread: price_utils::from_f64(0.02),
                order_interval_ns: ms_to_ns(5),
                market_order_ratio: 0.15,
                cancel_rate: 0.10,
                min_order_size: 1,
                max_order_size: 10,
                price_tick_size: price_utils::from_f64(0.01),
                max_price_levels: 5,
                signal_interval_ns: ms_to_ns(200),
                depth_per_level: 20,
                burst_window_ns: 0,
                burst_interval_ns: 0,
                burst_rate: 0.0,
                burst_cancel_mul: 0.0,
                burst_market_mul: 0.0,
                burst_size_mul: 0.0,
                burst_cancel_cap: 0.0,
                burst_market_cap: 0.0,
            },
        }
    }

    /// Default configuration for a thin book with sporadic sweeps
    pub fn thin(seed: u64) -> Self {
        let (fast_trader, slow_trader) = default_traders();
        Self {
            name: "thin".to_string(),
            seed,
            duration: ms_to_ns(10_000),
            fast_trader,
            slow_trader,
            scenario: ScenarioParams {
                initial_mid_price: price_utils::from_f64(100.0),
                initial_spread: price_utils::from_f64(0.05),
                order_interval_ns: ms_to_ns(20),
                market_order_ratio: 0.25,
                cancel_rate: 0.15,
                min_order_size: 1,
                max_order_size: 5,
                price_tick_size: price_utils::from_f64(0.01),
                max_price_levels: 3,
                signal_interval_ns: ms_to_ns(200),
                depth_per_level: 5,
                burst_window_ns: 0,
                burst_interval_ns: 0,
                burst_rate: 0.0,
                burst_cancel_mul: 0.0,
                burst_market_mul: 0.0,
                burst_size_mul: 0.0,
                burst_cancel_cap: 0.0,
                burst_market_cap: 0.0,
            },
        }
    }

    /// Default configuration for periodic burst windows
    pub fn spike(seed: u64) -> Self {
        let (fast_trader, slow_trader) = default_traders();
        Self {
            name: "spike".to_string(),
            seed,
            duration: ms_to_ns(10_000),
            fast_trader,
            slow_trader,
            scenario: ScenarioParams {
                initial_mid_price: price_utils::from_f64(100.0),
                initial_spread: price_utils::from_f64(0.03),
                order_interval_ns: ms_to_ns(8),
                market_order_ratio: 0.20,
                cancel_rate: 0.25,
                min_order_size: 1,
                max_order_size: 15,
                price_tick_size: price_utils::from_f64(0.01),
                max_price_levels: 5,
                signal_interval_ns: ms_to_ns(150),
                depth_per_level: 15,
                burst_window_ns: ms_to_ns(500),
                burst_interval_ns: ms_to_ns(2000),
                burst_rate: 4.0,
                burst_cancel_mul: 2.0,
                burst_market_mul: 2.0,
                burst_size_mul: 2.0,
                burst_cancel_cap: 0.5,
                burst_market_cap: 0.6,
            },
        }
    }

    /// Resolve a named scenario. Unknown names fail before any run state exists.
    pub fn named(name: &str, seed: u64) -> SimResult<Self> {
        match name {
            "calm" => Ok(Self::calm(seed)),
            "thin" => Ok(Self::thin(seed)),
            "spike" => Ok(Self::spike(seed)),
            other => Err(SimError::UnknownScenario {
                name: other.to_string(),
            }),
        }
    }

    /// Load a configuration from a TOML file
    pub fn load_toml<P: AsRef<Path>>(path: P) -> SimResult<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file (the per-run artifact format)
    pub fn load_json<P: AsRef<Path>>(path: P) -> SimResult<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save the configuration as TOML
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> SimResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| SimError::invalid_config(format!("serialize config: {e}")))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> SimResult<()> {
        if !matches!(self.name.as_str(), "calm" | "thin" | "spike") {
            return Err(SimError::UnknownScenario {
                name: self.name.clone(),
            });
        }
        if self.duration <= 0 {
            return Err(SimError::invalid_config("duration must be positive"));
        }
        if self.fast_trader.id == self.slow_trader.id {
            return Err(SimError::invalid_config("trader ids must be distinct"));
        }
        if self.fast_trader.base_latency_ms < 0 || self.slow_trader.base_latency_ms < 0 {
            return Err(SimError::invalid_config("base latency cannot be negative"));
        }
        if self.fast_trader.jitter_ms < 0 || self.slow_trader.jitter_ms < 0 {
            return Err(SimError::invalid_config("jitter cannot be negative"));
        }

        let p = &self.scenario;
        if p.initial_mid_price <= 0 {
            return Err(SimError::invalid_config("initial mid price must be positive"));
        }
        if p.initial_spread <= 0 {
            return Err(SimError::invalid_config("initial spread must be positive"));
        }
        if p.order_interval_ns <= 0 {
            return Err(SimError::invalid_config("order interval must be positive"));
        }
        if !(0.0..=1.0).contains(&p.market_order_ratio) {
            return Err(SimError::invalid_config(
                "market order ratio must be between 0.0 and 1.0",
            ));
        }
        if !(0.0..=1.0).contains(&p.cancel_rate) {
            return Err(SimError::invalid_config(
                "cancel rate must be between 0.0 and 1.0",
            ));
        }
        if p.cancel_rate + p.market_order_ratio > 1.0 {
            return Err(SimError::invalid_config(
                "cancel rate plus market ratio cannot exceed 1.0",
            ));
        }
        if p.min_order_size <= 0 {
            return Err(SimError::invalid_config("minimum order size must be positive"));
        }
        if p.max_order_size < p.min_order_size {
            return Err(SimError::invalid_config(
                "maximum order size cannot be less than minimum order size",
            ));
        }
        if p.price_tick_size <= 0 {
            return Err(SimError::invalid_config("price tick size must be positive"));
        }
        if p.max_price_levels == 0 {
            return Err(SimError::invalid_config("max price levels cannot be 0"));
        }
        if p.signal_interval_ns < 0 {
            return Err(SimError::invalid_config("signal interval cannot be negative"));
        }
        if p.depth_per_level < 0 {
            return Err(SimError::invalid_config("depth per level cannot be negative"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_defaults_validate() {
        for name in ["calm", "thin", "spike"] {
            let cfg = Config::named(name, 42).unwrap();
            assert_eq!(cfg.name, name);
            assert_eq!(cfg.seed, 42);
            cfg.validate().unwrap();
        }
    }

    #[test]
    fn test_unknown_scenario_fails_before_starting() {
        let err = Config::named("storm", 42).unwrap_err();
        assert!(matches!(err, SimError::UnknownScenario { .. }));
    }

    #[test]
    fn test_default_trader_latencies() {
        let cfg = Config::calm(1);
        assert_eq!(cfg.fast_trader.base_latency_ms, 1);
        assert_eq!(cfg.fast_trader.jitter_ms, 0);
        assert_eq!(cfg.slow_trader.base_latency_ms, 50);
        assert_eq!(cfg.slow_trader.jitter_ms, 10);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut cfg = Config::calm(1);
        cfg.scenario.market_order_ratio = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::calm(1);
        cfg.scenario.max_order_size = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::calm(1);
        cfg.duration = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::calm(1);
        cfg.slow_trader.id = "fast".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let cfg = Config::spike(7);
        cfg.save_toml(&path).unwrap();
        let loaded = Config::load_toml(&path).unwrap();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn test_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let cfg = Config::thin(9);
        std::fs::write(&path, serde_json::to_vec_pretty(&cfg).unwrap()).unwrap();
        let loaded = Config::load_json(&path).unwrap();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn test_spike_fields_omitted_for_calm() {
        let cfg = Config::calm(1);
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(!json.contains("burst_window_ns"));

        let cfg = Config::spike(1);
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(json.contains("burst_window_ns"));
    }
}
