use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::SimError;

/// Initialize the logging system with appropriate filters and formatting
pub fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    // Respect RUST_LOG; default to "info" when unset
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).compact())
        .try_init()?;

    Ok(())
}

/// Initialize logging for tests (captured writer, debug level)
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("debug")
        .try_init();
}

/// Log a simulator error with appropriate severity level
pub fn log_sim_error(error: &SimError, context: Option<&str>) {
    let level = error.severity().to_tracing_level();
    let message = match context {
        Some(ctx) => format!("{}: {}", ctx, error),
        None => error.to_string(),
    };

    match level {
        tracing::Level::INFO => info!("{}", message),
        tracing::Level::WARN => warn!("{}", message),
        _ => error!("{}", message),
    }
}

/// Log the start of a simulation run
pub fn log_run_started(scenario: &str, seed: u64, duration_ns: i64) {
    info!(
        scenario = scenario,
        seed = seed,
        duration_ns = duration_ns,
        "Simulation run started"
    );
}

/// Log run completion with the key reproducibility facts
pub fn log_run_finished(scenario: &str, events: u64, trades: usize, log_hash: &str) {
    info!(
        scenario = scenario,
        events = events,
        trades = trades,
        log_hash = log_hash,
        "Simulation run finished"
    );
}

/// Log the outcome of a deterministic replay comparison
pub fn log_replay_verdict(target_hash: &str, replay_hash: &str) {
    if target_hash == replay_hash {
        info!(hash = target_hash, "Replay hash matches recorded run");
    } else {
        warn!(
            target = target_hash,
            replay = replay_hash,
            "Replay hash MISMATCH"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorSeverity;

    #[test]
    fn test_logging_helpers_do_not_panic() {
        init_test_logging();

        let error = SimError::UnknownScenario {
            name: "storm".to_string(),
        };
        log_sim_error(&error, Some("test context"));
        log_run_started("calm", 42, 1_000_000);
        log_run_finished("calm", 100, 5, "abc123");
        log_replay_verdict("abc", "abc");
        log_replay_verdict("abc", "def");
    }

    #[test]
    fn test_error_severity_mapping() {
        let err = SimError::log_io("boom");
        assert_eq!(err.severity(), ErrorSeverity::Critical);
    }
}
