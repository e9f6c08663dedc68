use std::sync::OnceLock;

use anyhow::{Context, anyhow};
use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc, Weekday,
};
use chrono_tz::Tz;
use regex::Regex;

use crate::task::Status;

const TIMEZONE_ENV_VAR: &str = "TASKFLOW_TIMEZONE";

static PROJECT_TZ: OnceLock<Tz> = OnceLock::new();

/// Installs the calendar used for every day-granularity decision, from
/// the loaded config's `timezone` key. Resolution order:
/// `TASKFLOW_TIMEZONE`, the configured id, then UTC. The first caller
/// wins; later calls are ignored.
pub fn init_project_timezone(configured: Option<&str>) {
    let _ = PROJECT_TZ.set(resolve_project_timezone(configured));
}

/// The installed calendar; without [`init_project_timezone`] it falls
/// back to `TASKFLOW_TIMEZONE` or UTC.
pub fn project_timezone() -> &'static Tz {
    PROJECT_TZ.get_or_init(|| resolve_project_timezone(None))
}

#[must_use]
pub fn to_project_date(dt: DateTime<Utc>) -> NaiveDate {
    dt.with_timezone(project_timezone()).date_naive()
}

/// Same project-local calendar day as `now`.
#[must_use]
pub fn is_today(d: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    to_project_date(d) == to_project_date(now)
}

/// Within the Monday-start week containing `now`.
#[must_use]
pub fn is_this_week(d: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    let week = to_project_date(now).week(Weekday::Mon);
    let date = to_project_date(d);
    date >= week.first_day() && date <= week.last_day()
}

/// Day-granularity overdue: the local day of `d` is strictly before
/// today's local day and the task is not completed. A due date of today
/// is never overdue, whatever the time of day.
#[must_use]
pub fn is_overdue(d: DateTime<Utc>, status: Status, now: DateTime<Utc>) -> bool {
    status != Status::Completed && to_project_date(d) < to_project_date(now)
}

fn resolve_project_timezone(configured: Option<&str>) -> Tz {
    if let Ok(raw) = std::env::var(TIMEZONE_ENV_VAR)
        && let Some(tz) = parse_timezone(&raw, TIMEZONE_ENV_VAR)
    {
        return tz;
    }

    if let Some(raw) = configured
        && let Some(tz) = parse_timezone(raw, "config")
    {
        return tz;
    }

    chrono_tz::UTC
}

fn parse_timezone(raw: &str, source: &str) -> Option<Tz> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    match trimmed.parse::<Tz>() {
        Ok(tz) => {
            tracing::info!(source, timezone = %trimmed, "configured project timezone");
            Some(tz)
        }
        Err(err) => {
            tracing::error!(source, timezone = %trimmed, error = %err, "failed to parse timezone id");
            None
        }
    }
}

fn to_utc_from_project_local(
    local_naive: NaiveDateTime,
    context: &str,
) -> anyhow::Result<DateTime<Utc>> {
    match project_timezone().from_local_datetime(&local_naive) {
        LocalResult::Single(local_dt) => Ok(local_dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(first, second) => {
            tracing::warn!(
                context,
                first = %first,
                second = %second,
                "ambiguous local datetime; using earliest"
            );
            let chosen = if first <= second { first } else { second };
            Ok(chosen.with_timezone(&Utc))
        }
        LocalResult::None => Err(anyhow!(
            "local datetime does not exist in configured timezone: {context}"
        )),
    }
}

/// Parses a due-date expression from the command line into an instant.
/// Accepts now/today/tomorrow/yesterday, weekday names, signed relative
/// offsets (+3d, -1w), YYYY-MM-DD, YYYY-MM-DDTHH:MM, and RFC 3339.
#[tracing::instrument(skip(now), fields(input = input))]
pub fn parse_due_expr(input: &str, now: DateTime<Utc>) -> anyhow::Result<DateTime<Utc>> {
    let token = input.trim();
    let lower = token.to_ascii_lowercase();

    match lower.as_str() {
        "now" => return Ok(now),
        "today" => return local_midnight(to_project_date(now), "today"),
        "tomorrow" => {
            let today = parse_due_expr("today", now)?;
            return Ok(today + Duration::days(1));
        }
        "yesterday" => {
            let today = parse_due_expr("today", now)?;
            return Ok(today - Duration::days(1));
        }
        _ => {}
    }

    if let Some(target_weekday) = parse_weekday_name(&lower) {
        let target_date = next_weekday_date(to_project_date(now), target_weekday);
        return local_midnight(target_date, "weekday-name");
    }

    let rel_re = Regex::new(r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dw])$")
        .map_err(|e| anyhow!("internal regex compile failure: {e}"))?;
    if let Some(caps) = rel_re.captures(token) {
        let num: i64 = caps["num"].parse().context("invalid relative amount")?;
        let duration = match &caps["unit"] {
            "d" => Duration::days(num),
            "w" => Duration::weeks(num),
            other => return Err(anyhow!("unknown relative unit: {other}")),
        };
        let today = parse_due_expr("today", now)?;
        return Ok(if &caps["sign"] == "-" {
            today - duration
        } else {
            today + duration
        });
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(token) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(date) = NaiveDate::parse_from_str(token, "%Y-%m-%d") {
        return local_midnight(date, "date");
    }

    for fmt in ["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(token, fmt) {
            return to_utc_from_project_local(ndt, fmt);
        }
    }

    Err(anyhow!("unrecognized due date expression: {input}")).with_context(|| {
        "supported formats: now/today/tomorrow/yesterday, weekday names \
         (e.g. monday), +Nd/-Nd/+Nw, YYYY-MM-DD, YYYY-MM-DDTHH:MM, RFC3339"
    })
}

fn local_midnight(date: NaiveDate, context: &str) -> anyhow::Result<DateTime<Utc>> {
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow!("failed to construct midnight for {context}"))?;
    to_utc_from_project_local(midnight, context)
}

fn parse_weekday_name(token: &str) -> Option<Weekday> {
    match token.trim() {
        "monday" | "mon" => Some(Weekday::Mon),
        "tuesday" | "tue" | "tues" => Some(Weekday::Tue),
        "wednesday" | "wed" => Some(Weekday::Wed),
        "thursday" | "thu" | "thur" | "thurs" => Some(Weekday::Thu),
        "friday" | "fri" => Some(Weekday::Fri),
        "saturday" | "sat" => Some(Weekday::Sat),
        "sunday" | "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

fn next_weekday_date(from: NaiveDate, target: Weekday) -> NaiveDate {
    let from_idx = from.weekday().num_days_from_monday() as i64;
    let target_idx = target.num_days_from_monday() as i64;
    let mut delta = (7 + target_idx - from_idx) % 7;
    if delta == 0 {
        delta = 7;
    }
    from.checked_add_signed(Duration::days(delta)).unwrap_or(from)
}

/// Human-facing due date: Today/Tomorrow/Yesterday, "N days overdue",
/// "In N days" within a week, otherwise a short absolute date.
#[must_use]
pub fn format_due(due: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(due) = due else {
        return "No due date".to_string();
    };

    let today = to_project_date(now);
    let target = to_project_date(due);
    let diff_days = (target - today).num_days();

    match diff_days {
        0 => "Today".to_string(),
        1 => "Tomorrow".to_string(),
        -1 => "Yesterday".to_string(),
        d if d < -1 => format!("{} days overdue", -d),
        d if d > 1 && d <= 7 => format!("In {d} days"),
        _ => target.format("%b %-d, %Y").to_string(),
    }
}

#[must_use]
pub fn format_project_date(dt: DateTime<Utc>) -> String {
    dt.with_timezone(project_timezone())
        .format("%Y-%m-%d")
        .to_string()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{format_due, is_overdue, is_this_week, is_today, parse_due_expr};
    use crate::task::Status;

    // All instants sit mid-day so the default UTC project calendar and
    // the assertions agree.
    fn noon(y: i32, m: u32, d: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).single().expect("valid instant")
    }

    #[test]
    fn configured_timezone_id_feeds_resolution() {
        // Exercises the resolver directly so the process-wide calendar
        // stays at its UTC default for the other tests.
        assert_eq!(
            super::resolve_project_timezone(Some("Europe/Berlin")),
            chrono_tz::Europe::Berlin
        );
        assert_eq!(
            super::resolve_project_timezone(Some("not/a-zone")),
            chrono_tz::UTC
        );
        assert_eq!(super::resolve_project_timezone(None), chrono_tz::UTC);
    }

    #[test]
    fn today_matches_calendar_day_not_instant() {
        let now = noon(2026, 3, 4);
        let late_tonight = Utc.with_ymd_and_hms(2026, 3, 4, 23, 59, 59).unwrap();
        let early_today = Utc.with_ymd_and_hms(2026, 3, 4, 0, 0, 1).unwrap();

        assert!(is_today(late_tonight, now));
        assert!(is_today(early_today, now));
        assert!(!is_today(noon(2026, 3, 5), now));
    }

    #[test]
    fn week_starts_on_monday() {
        // 2026-03-04 is a Wednesday; its week is Mon 03-02 .. Sun 03-08.
        let now = noon(2026, 3, 4);

        assert!(is_this_week(noon(2026, 3, 2), now));
        assert!(is_this_week(noon(2026, 3, 8), now));
        assert!(!is_this_week(noon(2026, 3, 1), now));
        assert!(!is_this_week(noon(2026, 3, 9), now));
    }

    #[test]
    fn overdue_is_day_granular() {
        let now = noon(2026, 3, 4);
        let due_today_late = Utc.with_ymd_and_hms(2026, 3, 4, 23, 59, 59).unwrap();
        let due_yesterday_early = Utc.with_ymd_and_hms(2026, 3, 3, 0, 0, 1).unwrap();
        let due_yesterday_late = Utc.with_ymd_and_hms(2026, 3, 3, 23, 59, 0).unwrap();

        assert!(!is_overdue(due_today_late, Status::Todo, now));
        assert!(is_overdue(due_yesterday_early, Status::Todo, now));
        assert!(is_overdue(due_yesterday_late, Status::InProgress, now));
    }

    #[test]
    fn completed_tasks_are_never_overdue() {
        let now = noon(2026, 3, 4);
        let long_past = noon(2025, 12, 1);
        assert!(!is_overdue(long_past, Status::Completed, now));
        assert!(is_overdue(long_past, Status::Review, now));
    }

    #[test]
    fn parses_relative_and_absolute_expressions() {
        let now = noon(2026, 3, 4);

        assert_eq!(parse_due_expr("now", now).expect("now"), now);

        let tomorrow = parse_due_expr("tomorrow", now).expect("tomorrow");
        assert_eq!(
            super::to_project_date(tomorrow).to_string(),
            "2026-03-05"
        );

        let in_three = parse_due_expr("+3d", now).expect("+3d");
        assert_eq!(super::to_project_date(in_three).to_string(), "2026-03-07");

        let fixed = parse_due_expr("2026-04-01", now).expect("date");
        assert_eq!(super::to_project_date(fixed).to_string(), "2026-04-01");

        assert!(parse_due_expr("whenever", now).is_err());
    }

    #[test]
    fn parses_weekday_name_strictly_forward() {
        // Wednesday the 4th: "wednesday" means next week's, not today.
        let now = noon(2026, 3, 4);
        let next_wed = parse_due_expr("wednesday", now).expect("weekday");
        assert_eq!(super::to_project_date(next_wed).to_string(), "2026-03-11");

        let friday = parse_due_expr("fri", now).expect("weekday abbrev");
        assert_eq!(super::to_project_date(friday).to_string(), "2026-03-06");
    }

    #[test]
    fn formats_relative_due_dates() {
        let now = noon(2026, 3, 4);

        assert_eq!(format_due(None, now), "No due date");
        assert_eq!(format_due(Some(noon(2026, 3, 4)), now), "Today");
        assert_eq!(format_due(Some(noon(2026, 3, 5)), now), "Tomorrow");
        assert_eq!(format_due(Some(noon(2026, 3, 3)), now), "Yesterday");
        assert_eq!(format_due(Some(noon(2026, 3, 1)), now), "3 days overdue");
        assert_eq!(format_due(Some(noon(2026, 3, 9)), now), "In 5 days");
        assert_eq!(
            format_due(Some(now + Duration::days(30)), now),
            "Apr 3, 2026"
        );
    }
}
