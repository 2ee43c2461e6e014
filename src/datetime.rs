//! Timezone handling shared by the formatter and the validation payload builder.
//!
//! A [`DateTimeContext`] is passed explicitly wherever a timestamp is rendered
//! or interpreted. It carries the user's timezone, the browser's timezone and
//! the clock, so tests can pin "now".

use std::fmt;
use std::str::FromStr;

use chrono::{
    DateTime, FixedOffset, Local, LocalResult, NaiveDateTime, TimeDelta, TimeZone, Utc,
};
use thiserror::Error;

/// Input format of naive timestamps in absolute time ranges.
pub const NAIVE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Wire format for absolute instants sent to the backend.
pub const UTC_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

#[derive(Debug, Error)]
pub enum TimeParseError {
    #[error("malformed timestamp {input:?}, expected YYYY-MM-DD HH:mm:ss.SSS: {source}")]
    Malformed {
        input: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("timestamp {input:?} does not exist in timezone {timezone}")]
    NonexistentLocalTime { input: String, timezone: Timezone },

    #[error("invalid timezone {0:?}, expected \"UTC\", \"local\" or an offset like \"-06:00\"")]
    InvalidTimezone(String),

    #[error("unrecognized date time {0:?}")]
    UnrecognizedDateTime(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timezone {
    #[default]
    Utc,
    Local,
    Fixed(FixedOffset),
}

impl fmt::Display for Timezone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timezone::Utc => f.write_str("UTC"),
            Timezone::Local => f.write_str("local"),
            Timezone::Fixed(offset) => write!(f, "{offset}"),
        }
    }
}

impl FromStr for Timezone {
    type Err = TimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || TimeParseError::InvalidTimezone(s.to_string());

        if trimmed.eq_ignore_ascii_case("utc") || trimmed.eq_ignore_ascii_case("z") {
            return Ok(Timezone::Utc);
        }
        if trimmed.eq_ignore_ascii_case("local") {
            return Ok(Timezone::Local);
        }

        trimmed
            .parse::<FixedOffset>()
            .map(Timezone::Fixed)
            .map_err(|_| invalid())
    }
}

/// Source of "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Clock {
    #[default]
    System,
    Fixed(DateTime<Utc>),
}

impl Clock {
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Fixed(instant) => *instant,
        }
    }
}

/// Named display formats for timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateTimeFormat {
    #[default]
    Default,
    Complete,
    WithTz,
    Date,
    Time,
    /// ISO-8601 in UTC, as used on the wire.
    Internal,
}

impl DateTimeFormat {
    fn pattern(self) -> &'static str {
        match self {
            DateTimeFormat::Default => "%Y-%m-%d %H:%M:%S",
            DateTimeFormat::Complete => "%Y-%m-%d %H:%M:%S%.3f",
            DateTimeFormat::WithTz => "%Y-%m-%d %H:%M:%S %:z",
            DateTimeFormat::Date => "%Y-%m-%d",
            DateTimeFormat::Time => "%H:%M:%S",
            DateTimeFormat::Internal => UTC_TIMESTAMP_FORMAT,
        }
    }
}

impl FromStr for DateTimeFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(DateTimeFormat::Default),
            "complete" => Ok(DateTimeFormat::Complete),
            "withTz" | "with-tz" => Ok(DateTimeFormat::WithTz),
            "date" => Ok(DateTimeFormat::Date),
            "time" => Ok(DateTimeFormat::Time),
            "internal" => Ok(DateTimeFormat::Internal),
            other => Err(format!("unknown date time format {other:?}")),
        }
    }
}

/// Anything a caller may hand over as "a date time".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateTimeInput {
    Instant(DateTime<Utc>),
    /// RFC 3339 / ISO-8601 with offset.
    Text(String),
    /// Seconds after the UNIX epoch.
    EpochSeconds(i64),
}

impl DateTimeInput {
    pub fn resolve(&self) -> Result<DateTime<Utc>, TimeParseError> {
        match self {
            DateTimeInput::Instant(instant) => Ok(*instant),
            DateTimeInput::Text(text) => DateTime::parse_from_rfc3339(text.trim())
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| TimeParseError::UnrecognizedDateTime(text.clone())),
            DateTimeInput::EpochSeconds(secs) => match Utc.timestamp_opt(*secs, 0) {
                LocalResult::Single(dt) => Ok(dt),
                _ => Err(TimeParseError::UnrecognizedDateTime(secs.to_string())),
            },
        }
    }
}

impl fmt::Display for DateTimeInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateTimeInput::Instant(instant) => write!(f, "{}", instant.to_rfc3339()),
            DateTimeInput::Text(text) => f.write_str(text),
            DateTimeInput::EpochSeconds(secs) => write!(f, "{secs}"),
        }
    }
}

/// A timestamp rendered in the browser timezone, keeping the original value
/// around for tooltips and machine-readable attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserTime {
    pub date_time: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateTimeContext {
    pub user_timezone: Timezone,
    pub browser_timezone: Timezone,
    pub clock: Clock,
}

impl DateTimeContext {
    pub fn new(user_timezone: Timezone) -> Self {
        Self {
            user_timezone,
            browser_timezone: Timezone::Local,
            clock: Clock::System,
        }
    }

    pub fn with_browser_timezone(mut self, timezone: Timezone) -> Self {
        self.browser_timezone = timezone;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// The instant as seen in the user's timezone.
    pub fn adjust_timezone(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        in_timezone(self.user_timezone, instant)
    }

    /// Interpret a naive `YYYY-MM-DD HH:mm:ss.SSS` timestamp in the user's
    /// timezone and return the absolute instant.
    ///
    /// Ambiguous local times (DST fold) resolve to the earlier instant.
    pub fn to_utc(&self, input: &str) -> Result<DateTime<Utc>, TimeParseError> {
        let naive = NaiveDateTime::parse_from_str(input.trim(), NAIVE_TIMESTAMP_FORMAT).map_err(
            |source| TimeParseError::Malformed {
                input: input.to_string(),
                source,
            },
        )?;

        let resolved = match self.user_timezone {
            Timezone::Utc => LocalResult::Single(naive.and_utc()),
            Timezone::Local => Local
                .from_local_datetime(&naive)
                .map(|dt| dt.with_timezone(&Utc)),
            Timezone::Fixed(offset) => offset
                .from_local_datetime(&naive)
                .map(|dt| dt.with_timezone(&Utc)),
        };

        pick_instant(resolved, input, self.user_timezone)
    }

    /// "5 minutes ago", "in an hour", measured against the context clock.
    pub fn from_now<Tz: TimeZone>(&self, instant: &DateTime<Tz>) -> String {
        self.from_now_at(instant, &self.now())
    }

    /// Like [`Self::from_now`], with "now" supplied by the caller.
    pub fn from_now_at<Tz: TimeZone, Tz2: TimeZone>(
        &self,
        instant: &DateTime<Tz>,
        now: &DateTime<Tz2>,
    ) -> String {
        let delta: TimeDelta =
            now.clone().with_timezone(&Utc) - instant.clone().with_timezone(&Utc);
        let seconds = delta.num_milliseconds() as f64 / 1000.0;
        let phrase = humanize(seconds.abs());

        if seconds < 0.0 {
            format!("in {phrase}")
        } else {
            format!("{phrase} ago")
        }
    }

    pub fn format_as_user_time(&self, instant: DateTime<Utc>, format: DateTimeFormat) -> String {
        format_in(self.user_timezone, instant, format)
    }

    pub fn format_as_browser_time(&self, instant: DateTime<Utc>, format: DateTimeFormat) -> String {
        format_in(self.browser_timezone, instant, format)
    }

    pub fn browser_time(
        &self,
        input: &DateTimeInput,
        format: DateTimeFormat,
    ) -> Result<BrowserTime, TimeParseError> {
        let instant = input.resolve()?;
        Ok(BrowserTime {
            date_time: input.to_string(),
            text: self.format_as_browser_time(instant, format),
        })
    }
}

/// Ambiguous local times take the earlier instant; gaps are an error.
fn pick_instant(
    resolved: LocalResult<DateTime<Utc>>,
    input: &str,
    timezone: Timezone,
) -> Result<DateTime<Utc>, TimeParseError> {
    match resolved {
        LocalResult::Single(dt) => Ok(dt),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest),
        LocalResult::None => Err(TimeParseError::NonexistentLocalTime {
            input: input.to_string(),
            timezone,
        }),
    }
}

fn in_timezone(timezone: Timezone, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
    match timezone {
        Timezone::Utc => instant.fixed_offset(),
        Timezone::Local => instant.with_timezone(&Local).fixed_offset(),
        Timezone::Fixed(offset) => instant.with_timezone(&offset),
    }
}

fn format_in(timezone: Timezone, instant: DateTime<Utc>, format: DateTimeFormat) -> String {
    if format == DateTimeFormat::Internal {
        return instant.format(format.pattern()).to_string();
    }
    in_timezone(timezone, instant)
        .format(format.pattern())
        .to_string()
}

/// Relative duration wording with the usual "time ago" rounding thresholds.
fn humanize(seconds: f64) -> String {
    let days_exact = seconds / 86_400.0;
    let secs = seconds.round();
    let minutes = (seconds / 60.0).round();
    let hours = (seconds / 3_600.0).round();
    let days = days_exact.round();
    let months = (days_exact * 4_800.0 / 146_097.0).round();
    let years = (days_exact * 400.0 / 146_097.0).round();

    if secs <= 44.0 {
        "a few seconds".to_string()
    } else if minutes <= 1.0 {
        "a minute".to_string()
    } else if minutes < 45.0 {
        format!("{} minutes", minutes as i64)
    } else if hours <= 1.0 {
        "an hour".to_string()
    } else if hours < 22.0 {
        format!("{} hours", hours as i64)
    } else if days <= 1.0 {
        "a day".to_string()
    } else if days < 26.0 {
        format!("{} days", days as i64)
    } else if months <= 1.0 {
        "a month".to_string()
    } else if months < 11.0 {
        format!("{} months", months as i64)
    } else if years <= 1.0 {
        "a year".to_string()
    } else {
        format!("{} years", years as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 1, 1, 12, 0, 0).unwrap()
    }

    fn ctx(tz: &str) -> DateTimeContext {
        DateTimeContext::new(tz.parse().unwrap()).with_clock(Clock::Fixed(fixed_now()))
    }

    #[test]
    fn parses_timezones() {
        assert_eq!("UTC".parse::<Timezone>().unwrap(), Timezone::Utc);
        assert_eq!("local".parse::<Timezone>().unwrap(), Timezone::Local);
        assert_eq!(
            "-06:00".parse::<Timezone>().unwrap(),
            Timezone::Fixed(FixedOffset::west_opt(6 * 3600).unwrap())
        );
        assert_eq!(
            "+0130".parse::<Timezone>().unwrap(),
            Timezone::Fixed(FixedOffset::east_opt(90 * 60).unwrap())
        );
        assert!("+5".parse::<Timezone>().is_err());
        assert!("Europe/Berlin".parse::<Timezone>().is_err());
        assert!("06:00".parse::<Timezone>().is_err());
    }

    #[test]
    fn naive_timestamp_converts_through_offset() {
        let utc = ctx("-06:00").to_utc("2021-01-01 16:00:00.000").unwrap();
        assert_eq!(utc, Utc.with_ymd_and_hms(2021, 1, 1, 22, 0, 0).unwrap());
    }

    #[test]
    fn fractional_seconds_are_optional() {
        let utc = ctx("UTC").to_utc("2021-01-01 16:00:00").unwrap();
        assert_eq!(utc, Utc.with_ymd_and_hms(2021, 1, 1, 16, 0, 0).unwrap());
    }

    #[test]
    fn malformed_timestamp_is_an_error() {
        let err = ctx("UTC").to_utc("yesterday at noon").unwrap_err();
        assert!(matches!(err, TimeParseError::Malformed { .. }));

        let err = ctx("UTC").to_utc("2021-13-01 16:00:00.000").unwrap_err();
        assert!(matches!(err, TimeParseError::Malformed { .. }));
    }

    #[test]
    fn dst_fold_takes_earlier_instant_and_gap_fails() {
        // The system timezone cannot be switched per test, so the decision is
        // checked on the resolved candidates directly.
        let earlier = Utc.with_ymd_and_hms(2021, 10, 31, 0, 30, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2021, 10, 31, 1, 30, 0).unwrap();

        let picked = pick_instant(
            LocalResult::Ambiguous(earlier, later),
            "2021-10-31 02:30:00.000",
            Timezone::Local,
        )
        .unwrap();
        assert_eq!(picked, earlier);

        let err = pick_instant(LocalResult::None, "2021-03-28 02:30:00.000", Timezone::Local)
            .unwrap_err();
        assert!(matches!(
            err,
            TimeParseError::NonexistentLocalTime { timezone: Timezone::Local, .. }
        ));
    }

    #[test]
    fn humanize_thresholds() {
        assert_eq!(humanize(0.0), "a few seconds");
        assert_eq!(humanize(44.0), "a few seconds");
        assert_eq!(humanize(60.0), "a minute");
        assert_eq!(humanize(300.0), "5 minutes");
        assert_eq!(humanize(3_600.0), "an hour");
        assert_eq!(humanize(2.0 * 3_600.0), "2 hours");
        assert_eq!(humanize(86_400.0), "a day");
        assert_eq!(humanize(7.0 * 86_400.0), "7 days");
        assert_eq!(humanize(30.0 * 86_400.0), "a month");
        assert_eq!(humanize(90.0 * 86_400.0), "3 months");
        assert_eq!(humanize(365.0 * 86_400.0), "a year");
        assert_eq!(humanize(3.0 * 365.0 * 86_400.0), "3 years");
    }

    #[test]
    fn from_now_past_and_future() {
        let c = ctx("UTC");
        let past = fixed_now() - TimeDelta::seconds(300);
        let future = fixed_now() + TimeDelta::seconds(7_200);
        assert_eq!(c.from_now(&past), "5 minutes ago");
        assert_eq!(c.from_now(&future), "in 2 hours");
    }

    #[test]
    fn formats_in_user_and_browser_timezones() {
        let c = ctx("-06:00").with_browser_timezone(Timezone::Utc);
        let instant = Utc.with_ymd_and_hms(2021, 1, 1, 22, 0, 0).unwrap();

        assert_eq!(
            c.format_as_user_time(instant, DateTimeFormat::Default),
            "2021-01-01 16:00:00"
        );
        assert_eq!(
            c.format_as_user_time(instant, DateTimeFormat::WithTz),
            "2021-01-01 16:00:00 -06:00"
        );
        assert_eq!(
            c.format_as_browser_time(instant, DateTimeFormat::Complete),
            "2021-01-01 22:00:00.000"
        );
        assert_eq!(
            c.format_as_user_time(instant, DateTimeFormat::Internal),
            "2021-01-01T22:00:00.000Z"
        );
    }

    #[test]
    fn browser_time_keeps_original_value() {
        let c = ctx("UTC").with_browser_timezone("+02:00".parse().unwrap());
        let input = DateTimeInput::Text("2021-01-01T10:00:00Z".to_string());
        let shown = c.browser_time(&input, DateTimeFormat::Time).unwrap();
        assert_eq!(shown.date_time, "2021-01-01T10:00:00Z");
        assert_eq!(shown.text, "12:00:00");

        let epoch = DateTimeInput::EpochSeconds(0);
        let shown = c.browser_time(&epoch, DateTimeFormat::Date).unwrap();
        assert_eq!(shown.date_time, "0");
        assert_eq!(shown.text, "1970-01-01");

        assert!(c
            .browser_time(&DateTimeInput::Text("not a date".into()), DateTimeFormat::Default)
            .is_err());
    }
}
