//! # Freshness Clock
//!
//! Tracks when data was last confirmed fresh and renders the elapsed time as
//! a short label for the "Last Updated" indicator.
//!
//! ## Label Buckets
//! ```text
//! elapsed <= 0s     → "just now"
//! elapsed <  60s    → "45s ago"
//! elapsed <  3600s  → "1m ago"     (floored)
//! otherwise         → "1h ago"     (floored)
//! ```
//!
//! The clock itself holds only the confirmation instant. Re-rendering on a
//! wall-clock cadence is the job of the ticker in `fleet-sync`.

use chrono::Utc;

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Renders the age of `confirmed_at_ms` as seen at `now_ms`.
///
/// ## Example
/// ```rust
/// use fleet_core::freshness::relative_age;
///
/// let t = 1_700_000_000_000;
/// assert_eq!(relative_age(t, t), "just now");
/// assert_eq!(relative_age(t, t + 45_000), "45s ago");
/// assert_eq!(relative_age(t, t + 90_000), "1m ago");
/// assert_eq!(relative_age(t, t + 3_661_000), "1h ago");
/// ```
pub fn relative_age(confirmed_at_ms: i64, now_ms: i64) -> String {
    let elapsed = now_ms.saturating_sub(confirmed_at_ms).div_euclid(1000);
    if elapsed <= 0 {
        "just now".to_string()
    } else if elapsed < 60 {
        format!("{elapsed}s ago")
    } else if elapsed < 3600 {
        format!("{}m ago", elapsed / 60)
    } else {
        format!("{}h ago", elapsed / 3600)
    }
}

/// The moment data was last confirmed fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessClock {
    confirmed_at_ms: i64,
}

impl FreshnessClock {
    /// Starts the clock at `now`.
    pub fn new() -> Self {
        FreshnessClock { confirmed_at_ms: now_millis() }
    }

    /// Starts the clock at a fixed instant.
    pub fn at(confirmed_at_ms: i64) -> Self {
        FreshnessClock { confirmed_at_ms }
    }

    /// The single mutation point. `None` means "confirmed now".
    pub fn set_confirmed(&mut self, timestamp_ms: Option<i64>) {
        self.confirmed_at_ms = timestamp_ms.unwrap_or_else(now_millis);
    }

    pub fn confirmed_at(&self) -> i64 {
        self.confirmed_at_ms
    }

    /// Label as of `now_ms`.
    pub fn relative_age_at(&self, now_ms: i64) -> String {
        relative_age(self.confirmed_at_ms, now_ms)
    }

    /// Label as of the wall clock.
    pub fn relative_age(&self) -> String {
        self.relative_age_at(now_millis())
    }
}

impl Default for FreshnessClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: i64 = 1_705_314_600_000;

    #[test]
    fn test_label_buckets() {
        assert_eq!(relative_age(T, T), "just now");
        assert_eq!(relative_age(T, T + 999), "just now");
        assert_eq!(relative_age(T, T + 1_000), "1s ago");
        assert_eq!(relative_age(T, T + 45_000), "45s ago");
        assert_eq!(relative_age(T, T + 59_999), "59s ago");
        assert_eq!(relative_age(T, T + 60_000), "1m ago");
        assert_eq!(relative_age(T, T + 90_000), "1m ago");
        assert_eq!(relative_age(T, T + 3_599_000), "59m ago");
        assert_eq!(relative_age(T, T + 3_661_000), "1h ago");
        assert_eq!(relative_age(T, T + 26 * 3_600_000), "26h ago");
    }

    #[test]
    fn test_future_confirmation_is_just_now() {
        // Server clocks ahead of ours must not produce negative ages.
        assert_eq!(relative_age(T + 30_000, T), "just now");
    }

    #[test]
    fn test_set_confirmed() {
        let mut clock = FreshnessClock::at(0);
        clock.set_confirmed(Some(T));
        assert_eq!(clock.confirmed_at(), T);
        assert_eq!(clock.relative_age_at(T + 45_000), "45s ago");

        let before = now_millis();
        clock.set_confirmed(None);
        assert!(clock.confirmed_at() >= before);
        assert_eq!(clock.relative_age_at(clock.confirmed_at()), "just now");
    }
}
