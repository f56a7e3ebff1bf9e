use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};

/// Monday of the ISO week containing `date`. Batches are keyed by this, so
/// every invocation inside one week maps to the same key.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let days_from_monday = date.weekday().num_days_from_monday() as i64;
    date - Duration::days(days_from_monday)
}

pub fn current_week_start(now_utc: DateTime<Utc>) -> NaiveDate {
    week_start(now_utc.date_naive())
}

/// Resolves an optional `YYYY-MM-DD` argument to a week-start date,
/// defaulting to the current ISO week. Any date inside a week is accepted
/// and normalized to its Monday.
pub fn resolve_week_start(
    week_start_arg: Option<&str>,
    now_utc: DateTime<Utc>,
) -> anyhow::Result<NaiveDate> {
    if let Some(s) = week_start_arg {
        let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")?;
        return Ok(week_start(date));
    }
    Ok(current_week_start(now_utc))
}
