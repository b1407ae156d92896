use time::{Duration, OffsetDateTime};

/// Number of whole days between `now` and the picked deadline date.
///
/// The remaining time is rounded up to full hours and then rounded to the
/// nearest day, so a date picked ten days ahead is stored as 10 even
/// though a few moments pass between picking and computing. Dates in the
/// past yield 0.
pub fn days_until(now: OffsetDateTime, target: OffsetDateTime) -> u32 {
  let seconds = (target - now).whole_seconds();
  if seconds <= 0 {
    return 0;
  }

  let hours = (seconds + 3599) / 3600;
  let days = (hours + 12) / 24;
  u32::try_from(days).unwrap_or(u32::MAX)
}

/// [`days_until`] measured from the current wall clock time.
pub fn days_from_now(target: OffsetDateTime) -> u32 {
  days_until(OffsetDateTime::now_utc(), target)
}

/// Unix timestamp at which a campaign started at `start` with the given
/// duration stops accepting contributions, or None when the deadline
/// falls outside the representable calendar range.
pub fn deadline_timestamp(start: OffsetDateTime, days: u32) -> Option<i64> {
  start
    .checked_add(Duration::days(days as i64))
    .map(OffsetDateTime::unix_timestamp)
}

#[cfg(test)]
mod tests {
  use {
    super::{days_until, deadline_timestamp},
    time::{Duration, OffsetDateTime},
  };

  #[test]
  fn ten_days_ahead_rounds_to_ten() {
    let now = OffsetDateTime::now_utc();
    let picked = now + Duration::days(10) - Duration::seconds(3);
    assert_eq!(days_until(now, picked), 10);
    assert_eq!(days_until(now, now + Duration::days(10)), 10);
  }

  #[test]
  fn past_dates_yield_zero() {
    let now = OffsetDateTime::now_utc();
    assert_eq!(days_until(now, now - Duration::days(3)), 0);
    assert_eq!(days_until(now, now), 0);
  }

  #[test]
  fn partial_days_round_to_nearest() {
    let now = OffsetDateTime::now_utc();
    assert_eq!(days_until(now, now + Duration::hours(5)), 0);
    assert_eq!(days_until(now, now + Duration::hours(12)), 1);
    assert_eq!(days_until(now, now + Duration::hours(35)), 1);
    assert_eq!(days_until(now, now + Duration::hours(36)), 2);
  }

  #[test]
  fn deadline_adds_whole_days() {
    let start = OffsetDateTime::from_unix_timestamp(1_600_000_000).unwrap();
    assert_eq!(
      deadline_timestamp(start, 2),
      Some(1_600_000_000 + 2 * 86_400)
    );
  }

  #[test]
  fn out_of_range_deadline_is_none() {
    let start = OffsetDateTime::from_unix_timestamp(1_600_000_000).unwrap();
    assert_eq!(deadline_timestamp(start, 3_000_000), None);
    assert_eq!(deadline_timestamp(start, u32::MAX), None);
  }
}
