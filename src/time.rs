//! Time conversions for simulated clocks. All simulation timestamps are
//! signed nanoseconds; user-facing parameters are milliseconds.

/// Convert milliseconds to nanoseconds
pub fn ms_to_ns(ms: i64) -> i64 {
    ms * 1_000_000
}

/// Convert nanoseconds to milliseconds
pub fn ns_to_ms(ns: i64) -> i64 {
    ns / 1_000_000
}

/// Convert nanoseconds to seconds as f64
pub fn ns_to_secs(ns: i64) -> f64 {
    ns as f64 / 1_000_000_000.0
}

/// Convert seconds to nanoseconds
pub fn secs_to_ns(secs: f64) -> i64 {
    (secs * 1_000_000_000.0) as i64
}

/// Format a nanosecond timestamp as a seconds string
pub fn format_ns(ns: i64) -> String {
    format!("{:.9}", ns_to_secs(ns))
}
