// src/services/schedule.rs

use chrono::{Duration, NaiveDate};

use crate::error::AppError;

/// Longest schedule accepted, in weeks.
pub const MAX_WEEKS: usize = 104;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekRange {
    pub week_number: i64,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Splits `[start, end]` into consecutive 7-day weeks numbered from 1.
/// The last week is clipped to `end`.
pub fn derive_weeks(start: NaiveDate, end: NaiveDate) -> Result<Vec<WeekRange>, AppError> {
    if end < start {
        return Err(AppError::BadRequest(
            "endDate must not be before startDate".to_string(),
        ));
    }

    let days = (end - start).num_days() as usize + 1;
    let week_count = days.div_ceil(7);
    if week_count > MAX_WEEKS {
        return Err(AppError::BadRequest(format!(
            "A schedule can span at most {} weeks",
            MAX_WEEKS
        )));
    }

    Ok((0..week_count)
        .map(|i| {
            let week_start = start + Duration::days(7 * i as i64);
            let week_end = (week_start + Duration::days(6)).min(end);
            WeekRange {
                week_number: i as i64 + 1,
                start: week_start,
                end: week_end,
            }
        })
        .collect())
}

/// Spreads `items` over `buckets` in order; earlier buckets take the remainder.
pub fn distribute<T>(items: Vec<T>, buckets: usize) -> Vec<Vec<T>> {
    if buckets == 0 {
        return Vec::new();
    }
    let base = items.len() / buckets;
    let remainder = items.len() % buckets;

    let mut iter = items.into_iter();
    (0..buckets)
        .map(|i| {
            let take = base + usize::from(i < remainder);
            iter.by_ref().take(take).collect()
        })
        .collect()
}
