//! Human-readable time formatting
//!
//! Provides the "Xm Ys" style durations shown by progress displays.

/// Format a duration in whole seconds as `Xm Ys` (or `Xh Ym Zs` past an
/// hour, plain `Ys` under a minute).
pub fn format_duration_secs(seconds: u64) -> String {
    if seconds >= 3600 {
        let hours = seconds / 3600;
        let mins = (seconds % 3600) / 60;
        let secs = seconds % 60;
        format!("{}h {}m {}s", hours, mins, secs)
    } else if seconds >= 60 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{}s", seconds)
    }
}

/// Format an estimated remaining time. Negative or non-finite estimates
/// (possible when progress jumps to 100 between polls) clamp to zero.
pub fn format_remaining(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "0s".to_string();
    }
    format_duration_secs(seconds.round() as u64)
}
