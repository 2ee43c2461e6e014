use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A search time range as exchanged with the backend.
///
/// The JSON form is tagged by a `type` field. Anything with a type this
/// console does not know becomes `Unknown` instead of failing to parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TimeRange {
    Relative(RelativeTimeRange),
    Absolute(AbsoluteTimeRange),
    Keyword(KeywordTimeRange),
    #[serde(other)]
    Unknown,
}

/// Relative range in seconds before now.
///
/// `range: 0`, or a zero or absent `from`, means there is no lower bound.
/// An absent `to` means the range ends now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelativeTimeRange {
    StartOnly {
        range: u64,
    },
    Bounded {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<u64>,
    },
}

/// Naive local timestamps (`YYYY-MM-DD HH:mm:ss.SSS`) in the user's timezone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbsoluteTimeRange {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordTimeRange {
    pub keyword: String,
}

impl TimeRange {
    /// "Last `range` seconds" up to now.
    pub fn relative(range: u64) -> Self {
        TimeRange::Relative(RelativeTimeRange::StartOnly { range })
    }

    pub fn relative_between(from: impl Into<Option<u64>>, to: Option<u64>) -> Self {
        TimeRange::Relative(RelativeTimeRange::Bounded {
            from: from.into(),
            to,
        })
    }

    pub fn all_time() -> Self {
        Self::relative(0)
    }

    pub fn absolute(from: impl Into<String>, to: impl Into<String>) -> Self {
        TimeRange::Absolute(AbsoluteTimeRange {
            from: from.into(),
            to: to.into(),
        })
    }

    pub fn keyword(keyword: impl Into<String>) -> Self {
        TimeRange::Keyword(KeywordTimeRange {
            keyword: keyword.into(),
        })
    }

    /// The tag this range carries on the wire, if it has a known one.
    pub fn type_name(&self) -> Option<&'static str> {
        match self {
            TimeRange::Relative(_) => Some("relative"),
            TimeRange::Absolute(_) => Some("absolute"),
            TimeRange::Keyword(_) => Some("keyword"),
            TimeRange::Unknown => None,
        }
    }

    /// Lookback window of a start-only relative range.
    ///
    /// `None` for every other shape and for "All Time".
    pub fn lookback(&self) -> Option<Duration> {
        match self {
            TimeRange::Relative(RelativeTimeRange::StartOnly { range }) if *range > 0 => {
                Some(Duration::from_secs(*range))
            }
            _ => None,
        }
    }
}

impl RelativeTimeRange {
    pub fn is_start_only(&self) -> bool {
        matches!(self, RelativeTimeRange::StartOnly { .. })
    }
}
