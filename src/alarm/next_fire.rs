use chrono::{DateTime, Days, Duration, Local, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};

/// Longest DST gap searched when a local time does not exist.
const MAX_GAP_MINUTES: i64 = 3 * 60;

/// Nearest instant strictly after `now` whose wall-clock time is `time_of_day`.
///
/// Today's occurrence is used when it is still ahead; otherwise (including
/// exact equality with `now`) the alarm rolls over to tomorrow. Ambiguous local
/// times resolve to their first instant, nonexistent ones to the first valid
/// minute after the gap.
pub fn next_fire_time<Tz>(time_of_day: NaiveTime, now: &DateTime<Tz>) -> DateTime<Tz>
where
    Tz: TimeZone,
{
    let timezone = now.timezone();
    let today = now.date_naive();

    if let Some(candidate) = occurrence_on(&timezone, today, time_of_day) {
        if candidate > *now {
            return candidate;
        }
    }

    today
        .checked_add_days(Days::new(1))
        .and_then(|tomorrow| occurrence_on(&timezone, tomorrow, time_of_day))
        .unwrap_or_else(|| now.clone() + Duration::days(1))
}

pub fn next_fire_time_local(time_of_day: NaiveTime, now: &DateTime<Local>) -> DateTime<Local> {
    next_fire_time(time_of_day, now)
}

fn occurrence_on<Tz: TimeZone>(
    timezone: &Tz,
    date: NaiveDate,
    time_of_day: NaiveTime,
) -> Option<DateTime<Tz>> {
    let naive = date.and_time(time_of_day);
    resolve_local_datetime(timezone, naive).or_else(|| {
        (1..=MAX_GAP_MINUTES).find_map(|minutes| {
            resolve_local_datetime(timezone, naive + Duration::minutes(minutes))
        })
    })
}

fn resolve_local_datetime<Tz: TimeZone>(timezone: &Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    match timezone.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(first, _second) => Some(first),
        LocalResult::None => None,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, NaiveDate, Timelike};
    use chrono_tz::America::New_York;

    use super::*;

    fn hm(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).expect("valid time")
    }

    fn utc_plus_two(hour: u32, minute: u32, second: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(2 * 3600)
            .expect("offset")
            .with_ymd_and_hms(2026, 10, 16, hour, minute, second)
            .single()
            .expect("valid datetime")
    }

    #[test]
    fn passed_time_rolls_to_tomorrow() {
        let now = utc_plus_two(8, 0, 0);
        let next = next_fire_time(hm(7, 30), &now);
        assert_eq!(
            next.date_naive(),
            NaiveDate::from_ymd_opt(2026, 10, 17).expect("date")
        );
        assert_eq!((next.hour(), next.minute()), (7, 30));
    }

    #[test]
    fn upcoming_time_fires_today() {
        let now = utc_plus_two(7, 0, 0);
        let next = next_fire_time(hm(7, 30), &now);
        assert_eq!(next.date_naive(), now.date_naive());
        assert_eq!((next.hour(), next.minute()), (7, 30));
    }

    #[test]
    fn exact_match_counts_as_passed() {
        let now = utc_plus_two(7, 30, 0);
        let next = next_fire_time(hm(7, 30), &now);
        assert_eq!(next - now, Duration::days(1));
    }

    #[test]
    fn seconds_past_the_minute_roll_over() {
        let now = utc_plus_two(7, 30, 1);
        let next = next_fire_time(hm(7, 30), &now);
        assert_eq!(
            next.date_naive(),
            NaiveDate::from_ymd_opt(2026, 10, 17).expect("date")
        );
    }

    #[test]
    fn every_minute_of_the_day_lands_within_one_day() {
        let now = utc_plus_two(13, 17, 42);
        for hour in 0..24 {
            for minute in 0..60 {
                let target = hm(hour, minute);
                let next = next_fire_time(target, &now);
                assert!(next > now, "{target} resolved into the past");
                assert!(next - now <= Duration::days(1), "{target} is more than a day out");
                let expected_date = if target > now.time() {
                    now.date_naive()
                } else {
                    now.date_naive().succ_opt().expect("tomorrow")
                };
                assert_eq!(next.date_naive(), expected_date, "{target}");
                assert_eq!(next.time(), target);
            }
        }
    }

    #[test]
    fn spring_forward_gap_resolves_to_first_valid_minute() {
        let now = New_York
            .with_ymd_and_hms(2026, 3, 8, 0, 30, 0)
            .single()
            .expect("valid");
        let next = next_fire_time(hm(2, 30), &now);
        assert_eq!(
            next.date_naive(),
            NaiveDate::from_ymd_opt(2026, 3, 8).expect("date")
        );
        assert_eq!((next.hour(), next.minute()), (3, 0));
    }

    #[test]
    fn fall_back_ambiguity_uses_first_instance() {
        let now = New_York
            .with_ymd_and_hms(2026, 11, 1, 0, 0, 0)
            .single()
            .expect("valid");
        let naive = NaiveDate::from_ymd_opt(2026, 11, 1)
            .expect("date")
            .and_time(hm(1, 30));
        let expected = match New_York.from_local_datetime(&naive) {
            LocalResult::Ambiguous(first, _second) => first,
            _ => panic!("expected ambiguous local time"),
        };

        assert_eq!(next_fire_time(hm(1, 30), &now), expected);
    }
}
