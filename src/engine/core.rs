// src/engine/core.rs

//! Pure scheduling decisions.
//!
//! Which schedules are due, and what a schedule looks like after a
//! successful run. No Tokio, no store, no clock: the async scheduler in
//! [`super::scheduler`] feeds these functions and performs the IO.

use chrono::{DateTime, Utc};

use crate::duration::parse_positive_duration;
use crate::errors::{Result, SpeedwatchError};
use crate::types::Schedule;

/// Schedules to fire at `now`: enabled and `next_run <= now`.
///
/// Each id appears at most once even if the store returned duplicates, so
/// one tick never spawns two runs of the same schedule.
pub fn due_schedules(schedules: &[Schedule], now: DateTime<Utc>) -> Vec<Schedule> {
    let mut seen = std::collections::HashSet::new();
    schedules
        .iter()
        .filter(|s| s.enabled && s.next_run <= now)
        .filter(|s| seen.insert(s.id.clone()))
        .cloned()
        .collect()
}

/// Schedule after a successful run finishing at `now`:
/// `last_run = now`, `next_run = now + interval`.
///
/// An unparsable interval is an error and the schedule must be left as it
/// was.
pub fn reschedule(schedule: &Schedule, now: DateTime<Utc>) -> Result<Schedule> {
    let interval = parse_positive_duration(&schedule.interval).map_err(|reason| {
        SpeedwatchError::InvalidInterval {
            interval: schedule.interval.clone(),
            reason,
        }
    })?;
    let step = chrono::Duration::from_std(interval).map_err(|e| SpeedwatchError::InvalidInterval {
        interval: schedule.interval.clone(),
        reason: e.to_string(),
    })?;
    let next_run = now
        .checked_add_signed(step)
        .ok_or_else(|| SpeedwatchError::InvalidInterval {
            interval: schedule.interval.clone(),
            reason: "next run out of range".to_string(),
        })?;

    Ok(Schedule {
        last_run: Some(now),
        next_run,
        ..schedule.clone()
    })
}
