//! Doomscroll time accounting
//!
//! Bills the time between consecutive active reports. A report only extends
//! the bill when the previous report was also active and arrived no more than
//! `max_accrual_gap_seconds` earlier, so dropped or delayed reports can only
//! understate the total.

use crate::config::SessionConfig;
use crate::types::SessionStats;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SessionAccounting {
    penalty_rate_per_second: f64,
    max_accrual_gap_seconds: f64,
    session_id: Uuid,
    session_start: f64,
    doom_seconds: f64,
    /// Start of the current (or most recent) doomscrolling streak
    last_doomscrolled_at: Option<f64>,
    /// Timestamp of the most recent active report
    last_active_at: Option<f64>,
    clean_streak_seconds: f64,
    is_doomscrolling: bool,
    reports_received: u64,
}

impl SessionAccounting {
    pub fn new(config: &SessionConfig, session_start: f64) -> Self {
        Self {
            penalty_rate_per_second: config.penalty_rate_per_second,
            max_accrual_gap_seconds: config.max_accrual_gap_seconds,
            session_id: Uuid::new_v4(),
            session_start,
            doom_seconds: 0.0,
            last_doomscrolled_at: None,
            last_active_at: None,
            clean_streak_seconds: 0.0,
            is_doomscrolling: false,
            reports_received: 0,
        }
    }

    /// Apply one validated report
    pub fn record(&mut self, is_active: bool, timestamp: f64) {
        self.reports_received += 1;

        if is_active {
            let continuing = self.is_doomscrolling;
            if !continuing || self.last_doomscrolled_at.is_none() {
                self.last_doomscrolled_at = Some(timestamp);
            }

            if let (true, Some(previous)) = (continuing, self.last_active_at) {
                let delta = (timestamp - previous).max(0.0);
                if delta <= self.max_accrual_gap_seconds {
                    self.doom_seconds += delta;
                }
            }

            // Out-of-order reports must not move the anchor backwards
            self.last_active_at = Some(match self.last_active_at {
                Some(previous) if continuing => previous.max(timestamp),
                _ => timestamp,
            });
            self.is_doomscrolling = true;
            self.clean_streak_seconds = 0.0;
        } else {
            self.is_doomscrolling = false;
            let since = self.last_active_at.unwrap_or(self.session_start);
            self.clean_streak_seconds = (timestamp - since).max(0.0);
        }
    }

    /// Return to an empty session, keeping the configured rate
    pub fn reset(&mut self, session_start: f64) {
        *self = Self {
            penalty_rate_per_second: self.penalty_rate_per_second,
            max_accrual_gap_seconds: self.max_accrual_gap_seconds,
            ..Self::new(&SessionConfig::default(), session_start)
        };
    }

    pub fn snapshot(&self) -> SessionStats {
        SessionStats {
            session_id: self.session_id,
            doom_seconds_today: self.doom_seconds,
            last_doomscrolled_at: self.last_doomscrolled_at,
            clean_streak_seconds: self.clean_streak_seconds,
            penalty_rate_per_second: self.penalty_rate_per_second,
            is_doomscrolling: self.is_doomscrolling,
            owed_usd: self.doom_seconds * self.penalty_rate_per_second,
            reports_received: self.reports_received,
        }
    }

    pub fn session_start(&self) -> f64 {
        self.session_start
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const START: f64 = 1_000.0;

    fn accounting() -> SessionAccounting {
        SessionAccounting::new(
            &SessionConfig {
                penalty_rate_per_second: 0.5,
                max_accrual_gap_seconds: 5.0,
                heartbeat_timeout_seconds: 10.0,
            },
            START,
        )
    }

    #[test]
    fn test_fresh_session_is_zeroed() {
        let stats = accounting().snapshot();
        assert_eq!(stats.doom_seconds_today, 0.0);
        assert_eq!(stats.last_doomscrolled_at, None);
        assert_eq!(stats.clean_streak_seconds, 0.0);
        assert_eq!(stats.penalty_rate_per_second, 0.5);
        assert!(!stats.is_doomscrolling);
        assert_eq!(stats.owed_usd, 0.0);
        assert_eq!(stats.reports_received, 0);
    }

    #[test]
    fn test_active_streak_accrues_between_reports() {
        let mut acc = accounting();
        acc.record(true, START + 10.0);
        acc.record(true, START + 11.0);
        acc.record(true, START + 13.0);

        let stats = acc.snapshot();
        assert_eq!(stats.doom_seconds_today, 3.0);
        assert_eq!(stats.last_doomscrolled_at, Some(START + 10.0));
        assert!(stats.is_doomscrolling);
        assert_eq!(stats.clean_streak_seconds, 0.0);
        assert_eq!(stats.owed_usd, 1.5);
    }

    #[test]
    fn test_first_active_report_accrues_nothing() {
        let mut acc = accounting();
        acc.record(false, START + 1.0);
        acc.record(true, START + 4.0);
        assert_eq!(acc.snapshot().doom_seconds_today, 0.0);
    }

    #[test]
    fn test_inactive_without_history_counts_from_session_start() {
        let mut acc = accounting();
        acc.record(false, START + 42.0);
        let stats = acc.snapshot();
        assert_eq!(stats.clean_streak_seconds, 42.0);
        assert!(!stats.is_doomscrolling);
    }

    #[test]
    fn test_inactive_before_session_start_clamps() {
        let mut acc = accounting();
        acc.record(false, START - 30.0);
        assert_eq!(acc.snapshot().clean_streak_seconds, 0.0);
    }

    #[test]
    fn test_clean_streak_measured_from_last_activity() {
        let mut acc = accounting();
        acc.record(true, START + 1.0);
        acc.record(true, START + 2.0);
        acc.record(false, START + 7.0);
        acc.record(false, START + 9.5);

        let stats = acc.snapshot();
        assert_eq!(stats.clean_streak_seconds, 7.5);
        assert_eq!(stats.doom_seconds_today, 1.0);
        assert!(!stats.is_doomscrolling);
    }

    #[test]
    fn test_new_streak_moves_streak_start() {
        let mut acc = accounting();
        acc.record(true, START + 1.0);
        acc.record(false, START + 2.0);
        acc.record(true, START + 20.0);
        acc.record(true, START + 21.0);

        let stats = acc.snapshot();
        assert_eq!(stats.last_doomscrolled_at, Some(START + 20.0));
        // Gap across the inactive report is not billed
        assert_eq!(stats.doom_seconds_today, 1.0);
    }

    #[test]
    fn test_out_of_order_reports_clamp_at_zero() {
        let mut acc = accounting();
        acc.record(true, START + 10.0);
        acc.record(true, START + 8.0);
        assert_eq!(acc.snapshot().doom_seconds_today, 0.0);

        // Anchor stays at the latest timestamp seen
        acc.record(true, START + 11.0);
        assert_eq!(acc.snapshot().doom_seconds_today, 1.0);
    }

    #[test]
    fn test_long_gap_is_not_billed() {
        let mut acc = accounting();
        acc.record(true, START);
        acc.record(true, START + 60.0);
        acc.record(true, START + 61.0);
        assert_eq!(acc.snapshot().doom_seconds_today, 1.0);
    }

    #[test]
    fn test_owed_always_derived() {
        let mut acc = accounting();
        let mut t = START;
        for i in 0..200 {
            t += 0.37 + (i % 5) as f64 * 0.41;
            acc.record(i % 7 != 0, t);
            let stats = acc.snapshot();
            assert_eq!(
                stats.owed_usd,
                stats.doom_seconds_today * stats.penalty_rate_per_second
            );
            assert!(stats.doom_seconds_today >= 0.0);
            assert!(stats.clean_streak_seconds >= 0.0);
        }
    }

    #[test]
    fn test_reset_restores_defaults_and_keeps_rate() {
        let mut acc = accounting();
        let before = acc.session_id();
        acc.record(true, START + 1.0);
        acc.record(true, START + 2.0);
        acc.record(false, START + 3.0);

        acc.reset(START + 100.0);
        let stats = acc.snapshot();

        assert_eq!(stats.doom_seconds_today, 0.0);
        assert_eq!(stats.last_doomscrolled_at, None);
        assert_eq!(stats.clean_streak_seconds, 0.0);
        assert!(!stats.is_doomscrolling);
        assert_eq!(stats.owed_usd, 0.0);
        assert_eq!(stats.reports_received, 0);
        assert_eq!(stats.penalty_rate_per_second, 0.5);
        assert_eq!(acc.session_start(), START + 100.0);
        assert_ne!(acc.session_id(), before);

        // Clean streak now counts from the new session start
        acc.record(false, START + 110.0);
        assert_eq!(acc.snapshot().clean_streak_seconds, 10.0);
    }
}
