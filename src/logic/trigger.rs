use crate::models::TimeOfDay;
use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, TimeZone};

/// Next instant strictly after `now` whose local time of day is `at`
///
/// A `now` whose hour and minute already equal `at` counts as past and rolls
/// over to tomorrow. Seconds are always zero.
pub fn next_trigger<Tz: TimeZone>(now: &DateTime<Tz>, at: TimeOfDay) -> DateTime<Tz> {
    let tz = now.timezone();
    let local_now = now.naive_local();

    let mut date = local_now.date();
    if TimeOfDay::of(&local_now) >= at {
        date = date.succ_opt().unwrap_or(date);
    }

    resolve_local(&tz, date.and_time(at.as_naive_time()), now)
}

/// Map a local wall-clock time to an instant after `now`
///
/// Times inside a DST gap move forward an hour at a time. A repeated time
/// takes its earlier occurrence unless that has already passed.
fn resolve_local<Tz: TimeZone>(
    tz: &Tz,
    mut local: NaiveDateTime,
    now: &DateTime<Tz>,
) -> DateTime<Tz> {
    // Gaps are at most a few hours; bound the search regardless
    for _ in 0..24 {
        match tz.from_local_datetime(&local) {
            LocalResult::Single(instant) => return instant,
            LocalResult::Ambiguous(earliest, latest) => {
                return if earliest > *now { earliest } else { latest };
            }
            LocalResult::None => local += Duration::hours(1),
        }
    }
    tz.from_utc_datetime(&local)
}
