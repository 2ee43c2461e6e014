use chrono::{DateTime, FixedOffset, TimeDelta, Utc};

use crate::datetime::DateTimeContext;
use crate::timerange::{AbsoluteTimeRange, RelativeTimeRange, TimeRange};

pub const ALL_TIME: &str = "All Time";
pub const NOW: &str = "Now";

type Localizer<'a> = Box<dyn Fn(&str) -> String + 'a>;

/// Renders time ranges for display, e.g. "5 minutes ago - Now".
pub struct TimeRangeFormatter<'a> {
    context: &'a DateTimeContext,
    localizer: Option<Localizer<'a>>,
}

impl<'a> TimeRangeFormatter<'a> {
    pub fn new(context: &'a DateTimeContext) -> Self {
        Self {
            context,
            localizer: None,
        }
    }

    /// Applied to both timestamps of absolute ranges. Identity if unset.
    pub fn with_localizer(mut self, localizer: impl Fn(&str) -> String + 'a) -> Self {
        self.localizer = Some(Box::new(localizer));
        self
    }

    pub fn format(&self, timerange: &TimeRange) -> String {
        match timerange {
            TimeRange::Relative(relative) => self.format_relative(relative),
            TimeRange::Absolute(absolute) => self.format_absolute(absolute),
            TimeRange::Keyword(keyword) => keyword.keyword.clone(),
            TimeRange::Unknown => String::new(),
        }
    }

    /// A missing time range renders as the empty string.
    pub fn format_opt(&self, timerange: Option<&TimeRange>) -> String {
        timerange.map(|tr| self.format(tr)).unwrap_or_default()
    }

    fn format_relative(&self, timerange: &RelativeTimeRange) -> String {
        // One "now" per call so both bounds are measured against the same instant.
        let now = self.context.adjust_timezone(self.context.now());

        match *timerange {
            RelativeTimeRange::StartOnly { range: 0 } => ALL_TIME.to_string(),
            RelativeTimeRange::StartOnly { range } => {
                format!("{} - {}", self.readable_range(&now, range, ALL_TIME), NOW)
            }
            RelativeTimeRange::Bounded { from, to } => format!(
                "{} - {}",
                self.readable_range(&now, from.unwrap_or(0), ALL_TIME),
                self.readable_range(&now, to.unwrap_or(0), NOW)
            ),
        }
    }

    fn readable_range(
        &self,
        now: &DateTime<FixedOffset>,
        seconds: u64,
        placeholder: &str,
    ) -> String {
        if seconds == 0 {
            return placeholder.to_string();
        }
        let delta = i64::try_from(seconds)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX);
        let start = now
            .checked_sub_signed(delta)
            .unwrap_or_else(|| DateTime::<Utc>::MIN_UTC.fixed_offset());
        self.context.from_now_at(&start, now)
    }

    fn format_absolute(&self, timerange: &AbsoluteTimeRange) -> String {
        match &self.localizer {
            Some(localize) => format!(
                "{} - {}",
                localize(&timerange.from),
                localize(&timerange.to)
            ),
            None => format!("{} - {}", timerange.from, timerange.to),
        }
    }
}

/// One-shot form of [`TimeRangeFormatter::format`].
pub fn time_range_to_string(
    timerange: Option<&TimeRange>,
    context: &DateTimeContext,
    localizer: Option<&dyn Fn(&str) -> String>,
) -> String {
    let formatter = TimeRangeFormatter::new(context);
    match localizer {
        Some(localize) => formatter.with_localizer(localize).format_opt(timerange),
        None => formatter.format_opt(timerange),
    }
}
