//! Environment-variable parsing helpers.
//!
//! All tuning-knob reads go through these so the truthy and positive-integer
//! parsing rules live in one place.

/// Worker count for the distributed strategy.
pub const WORKERS_VAR: &str = "PCONV_WORKERS";
/// Per-receive timeout for the distributed coordinator, in milliseconds.
pub const COMM_TIMEOUT_VAR: &str = "PCONV_COMM_TIMEOUT_MS";
/// Enables row progress events for sequential and fan-out runs.
pub const PROGRESS_VAR: &str = "PCONV_PROGRESS";

/// `1`, `true`, `yes` or `on`, case-insensitive and trimmed.
pub fn parse_truthy(raw: &str) -> bool {
    let normalized = raw.trim().to_ascii_lowercase();
    normalized == "1" || normalized == "true" || normalized == "yes" || normalized == "on"
}

/// A positive (> 0) integer, or `None`.
pub fn parse_positive_u64(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok().filter(|value| *value > 0)
}

#[inline]
pub fn env_var_truthy(var_name: &str) -> bool {
    std::env::var(var_name)
        .map(|raw| parse_truthy(&raw))
        .unwrap_or(false)
}

#[inline]
pub fn env_var_positive_u64(var_name: &str) -> Option<u64> {
    std::env::var(var_name)
        .ok()
        .and_then(|raw| parse_positive_u64(&raw))
}

/// Logical CPUs, falling back to 1 when the platform cannot tell.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
