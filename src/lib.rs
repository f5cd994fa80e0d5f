pub mod agent;
pub mod book;
pub mod config;
pub mod error;
pub mod eventlog;
pub mod eventloop;
pub mod generator;
pub mod latency;
pub mod logging;
pub mod metrics;
pub mod report;
pub mod runner;
pub mod time;
pub mod types;

// Re-export core types for convenience
pub use types::{Bbo, Event, EventType, Order, OrderId, OrderType, Price, Qty, Side, Signal, Trade};

// Re-export price utilities
pub use types::price_utils;

// Re-export error types
pub use error::{ErrorSeverity, SimError, SimResult};

// Re-export the main entry points
pub use book::Book;
pub use config::Config;
pub use eventloop::{EventHandler, EventLoop};
pub use latency::LatencyModel;
pub use runner::{RunResult, Runner};

// Re-export time utilities
pub use time::{format_ns, ms_to_ns, ns_to_ms, ns_to_secs, secs_to_ns};

// Re-export logging functions
pub use logging::{init_logging, init_test_logging, log_sim_error};
