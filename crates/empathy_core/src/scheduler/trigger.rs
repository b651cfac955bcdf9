//! Calendar and interval triggers.
//!
//! Triggers work on wall-clock time in the timezone of the `now` they are
//! given. Local times skipped by a DST jump are passed over; ambiguous local
//! times resolve to the earlier instant.

use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike};
use std::collections::BTreeSet;

const MINUTES_PER_DAY: u32 = 24 * 60;

/// When a job fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobTrigger {
    /// At minute 0 of each listed hour, every day.
    DailyAt { hours: BTreeSet<u32> },
    /// Every `minutes`, aligned to multiples of `minutes` since local midnight.
    Every { minutes: u32 },
}

impl JobTrigger {
    /// First fire time strictly after `now`.
    ///
    /// Returns `None` when the trigger can never fire (no valid hours or a
    /// zero interval).
    pub fn next_after<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let local = now.naive_local();
        let today = local.date();

        match self {
            Self::DailyAt { hours } => {
                let hours: Vec<u32> = hours.iter().copied().filter(|hour| *hour < 24).collect();
                if hours.is_empty() {
                    return None;
                }
                // Two days cover every hour even when one candidate falls
                // into a DST gap.
                (0..=2u64)
                    .filter_map(|offset| today.checked_add_days(Days::new(offset)))
                    .flat_map(|day| hours.iter().map(move |hour| at_minute(day, hour * 60)))
                    .flatten()
                    .filter_map(|naive| resolve(now, naive))
                    .find(|candidate| candidate > now)
            }
            Self::Every { minutes } => {
                let step = *minutes;
                if step == 0 {
                    return None;
                }
                let elapsed = local.hour() * 60 + local.minute();
                let mut day = today;
                let mut slot = (elapsed / step + 1) * step;
                // Bounded walk: at most two days of slots.
                for _ in 0..(2 * MINUTES_PER_DAY / step.min(MINUTES_PER_DAY) + 2) {
                    if slot >= MINUTES_PER_DAY {
                        day = day.checked_add_days(Days::new(1))?;
                        slot = 0;
                    }
                    if let Some(candidate) = at_minute(day, slot).and_then(|naive| resolve(now, naive)) {
                        if candidate > *now {
                            return Some(candidate);
                        }
                    }
                    slot += step;
                }
                None
            }
        }
    }

    /// Next fire time after a run that fired at `fired`.
    ///
    /// Never returns `fired` or an earlier slot, even when the wall clock has
    /// stepped back behind it. Slots missed while the clock jumped forward
    /// are skipped.
    pub fn next_after_fire<Tz: TimeZone>(
        &self,
        fired: &DateTime<Tz>,
        now: &DateTime<Tz>,
    ) -> Option<DateTime<Tz>> {
        self.next_after(if now > fired { now } else { fired })
    }
}

fn at_minute(day: NaiveDate, minute_of_day: u32) -> Option<NaiveDateTime> {
    NaiveTime::from_hms_opt(minute_of_day / 60, minute_of_day % 60, 0).map(|time| day.and_time(time))
}

fn resolve<Tz: TimeZone>(now: &DateTime<Tz>, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    now.timezone().from_local_datetime(&naive).earliest()
}
