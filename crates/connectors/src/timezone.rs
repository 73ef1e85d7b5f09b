//! Business-timezone day bucketing
//!
//! Every connector converts source timestamps here before producing records,
//! so outputs from different sources land on the same calendar days.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tally_model::DateRange;

/// Convert any instant to the business timezone, keeping a serializable offset
pub fn to_business<T: TimeZone>(instant: &DateTime<T>, tz: Tz) -> DateTime<FixedOffset> {
    instant.with_timezone(&tz).fixed_offset()
}

/// Interpret a naive local time as business-local
pub fn localize(naive: NaiveDateTime, tz: Tz) -> DateTime<FixedOffset> {
    tz.from_local_datetime(&naive)
        .earliest()
        .unwrap_or_else(|| tz.from_utc_datetime(&naive))
        .fixed_offset()
}

/// First and last instant of a range, in business time
pub fn range_bounds(range: &DateRange, tz: Tz) -> (DateTime<FixedOffset>, DateTime<FixedOffset>) {
    let start = localize(range.start_date.and_time(NaiveTime::MIN), tz);
    let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
    let end = localize(range.end_date.and_time(end_of_day), tz);
    (start, end)
}

/// Current business-timezone calendar day
pub fn business_today(now: DateTime<Utc>, tz: Tz) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}
