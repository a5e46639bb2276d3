use chrono::{DateTime, Datelike, Utc};

/// Short age label for a bookmark's creation time.
///
/// "just now" under a minute, then minutes, hours and days up to a week.
/// Older dates show as "Mar 4", with the year appended when it differs from
/// `now`'s. Future timestamps (clock skew) read as "just now".
pub fn format_relative(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(at);
    let mins = elapsed.num_minutes();
    let hours = elapsed.num_hours();
    let days = elapsed.num_days();

    if mins < 1 {
        "just now".to_string()
    } else if mins < 60 {
        format!("{}m ago", mins)
    } else if hours < 24 {
        format!("{}h ago", hours)
    } else if days < 7 {
        format!("{}d ago", days)
    } else if at.year() != now.year() {
        at.format("%b %-d, %Y").to_string()
    } else {
        at.format("%b %-d").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_recent_buckets() {
        let now = now();
        assert_eq!(format_relative(now - Duration::seconds(30), now), "just now");
        assert_eq!(format_relative(now - Duration::minutes(5), now), "5m ago");
        assert_eq!(format_relative(now - Duration::hours(3), now), "3h ago");
        assert_eq!(format_relative(now - Duration::days(2), now), "2d ago");
    }

    #[test]
    fn test_older_dates() {
        let now = now();
        let same_year = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
        assert_eq!(format_relative(same_year, now), "Mar 4");

        let last_year = Utc.with_ymd_and_hms(2023, 3, 4, 9, 0, 0).unwrap();
        assert_eq!(format_relative(last_year, now), "Mar 4, 2023");
    }

    #[test]
    fn test_future_is_just_now() {
        let now = now();
        assert_eq!(format_relative(now + Duration::minutes(10), now), "just now");
    }
}
