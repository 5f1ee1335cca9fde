//! Daily generation quota shared across concurrent requests.
//!
//! The check and the increment happen inside one critical section, so two
//! requests can never both observe the last free slot. The count resets when
//! the UTC date changes. A slot is consumed when acquired, whether or not the
//! request later succeeds.

use std::sync::{Mutex, MutexGuard};

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::PipelineError;

/// Snapshot of the quota.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaStatus {
    pub current_count: u32,
    pub max_quota: u32,
    pub remaining: u32,
    /// UTC date the count applies to.
    pub reset_date: NaiveDate,
}

#[derive(Debug)]
struct QuotaState {
    count: u32,
    date: NaiveDate,
}

/// Counter of generations per UTC day.
#[derive(Debug)]
pub struct QuotaCounter {
    max_quota: u32,
    state: Mutex<QuotaState>,
}

impl QuotaCounter {
    pub fn new(max_quota: u32) -> Self {
        Self::starting_on(max_quota, today())
    }

    /// A counter whose current day is `date`.
    pub fn starting_on(max_quota: u32, date: NaiveDate) -> Self {
        Self {
            max_quota,
            state: Mutex::new(QuotaState { count: 0, date }),
        }
    }

    pub fn max_quota(&self) -> u32 {
        self.max_quota
    }

    /// Take one slot for today, or fail with `QuotaExceeded`.
    pub fn try_acquire(&self) -> Result<QuotaStatus, PipelineError> {
        self.try_acquire_on(today())
    }

    /// Take one slot as of `date`.
    pub fn try_acquire_on(&self, date: NaiveDate) -> Result<QuotaStatus, PipelineError> {
        let mut state = self.lock();
        roll_over(&mut state, date);
        if state.count >= self.max_quota {
            return Err(PipelineError::QuotaExceeded {
                current_count: state.count,
                max_quota: self.max_quota,
            });
        }
        state.count += 1;
        debug!("Quota slot {}/{} taken ({})", state.count, self.max_quota, state.date);
        Ok(self.snapshot(&state))
    }

    pub fn status(&self) -> QuotaStatus {
        self.status_on(today())
    }

    pub fn status_on(&self, date: NaiveDate) -> QuotaStatus {
        let mut state = self.lock();
        roll_over(&mut state, date);
        self.snapshot(&state)
    }

    /// Zero the count for today.
    pub fn reset(&self) {
        let mut state = self.lock();
        info!("Quota manually reset ({} used on {})", state.count, state.date);
        state.count = 0;
        state.date = today();
    }

    fn snapshot(&self, state: &QuotaState) -> QuotaStatus {
        QuotaStatus {
            current_count: state.count,
            max_quota: self.max_quota,
            remaining: self.max_quota.saturating_sub(state.count),
            reset_date: state.date,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QuotaState> {
        // Poisoning is ignored: every update is a single assignment.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn roll_over(state: &mut QuotaState, date: NaiveDate) {
    if date > state.date {
        info!("Quota reset: {} generations on {}", state.count, state.date);
        state.count = 0;
        state.date = date;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, d).unwrap()
    }

    #[test]
    fn test_acquire_until_exhausted() {
        let q = QuotaCounter::starting_on(2, day(1));
        assert_eq!(q.try_acquire_on(day(1)).unwrap().remaining, 1);
        assert_eq!(q.try_acquire_on(day(1)).unwrap().remaining, 0);
        match q.try_acquire_on(day(1)) {
            Err(PipelineError::QuotaExceeded {
                current_count,
                max_quota,
            }) => {
                assert_eq!((current_count, max_quota), (2, 2));
            }
            other => panic!("expected QuotaExceeded, got {other:?}"),
        }
    }

    #[test]
    fn test_resets_on_new_day() {
        let q = QuotaCounter::starting_on(1, day(1));
        q.try_acquire_on(day(1)).unwrap();
        assert!(q.try_acquire_on(day(1)).is_err());
        let status = q.try_acquire_on(day(2)).unwrap();
        assert_eq!(status.current_count, 1);
        assert_eq!(status.reset_date, day(2));
    }

    #[test]
    fn test_earlier_date_does_not_reset() {
        let q = QuotaCounter::starting_on(1, day(5));
        q.try_acquire_on(day(5)).unwrap();
        assert!(q.try_acquire_on(day(4)).is_err());
    }

    #[test]
    fn test_status_and_reset() {
        let q = QuotaCounter::new(10);
        q.try_acquire().unwrap();
        q.try_acquire().unwrap();
        let s = q.status();
        assert_eq!((s.current_count, s.max_quota, s.remaining), (2, 10, 8));
        q.reset();
        assert_eq!(q.status().current_count, 0);
    }

    #[test]
    fn test_zero_quota_rejects() {
        let q = QuotaCounter::new(0);
        assert!(q.try_acquire().is_err());
    }

    #[test]
    fn test_concurrent_acquire_never_overshoots() {
        let q = Arc::new(QuotaCounter::starting_on(25, day(1)));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let q = q.clone();
                std::thread::spawn(move || (0..10).filter(|_| q.try_acquire_on(day(1)).is_ok()).count())
            })
            .collect();
        let granted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(granted, 25);
        assert_eq!(q.status_on(day(1)).current_count, 25);
    }
}
