//! Query validation request shaping.
//!
//! [`build_validation_payload`] turns what the search bar holds into the body
//! the validation endpoint expects. The only real transformation is on
//! absolute time ranges, whose naive local timestamps become UTC instants.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::datetime::{DateTimeContext, TimeParseError, UTC_TIMESTAMP_FORMAT};
use crate::timerange::{KeywordTimeRange, RelativeTimeRange, TimeRange};

pub const VALUE_PARAMETER_TYPE: &str = "value-parameter-v1";

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid `{bound}` of absolute time range: {source}")]
    AbsoluteBound {
        bound: &'static str,
        #[source]
        source: TimeParseError,
    },

    #[error("time range has an unknown type and cannot be sent for validation")]
    UnknownTimeRange,
}

/// A query parameter definition, e.g. `$source$` in `source:$source$`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type", default = "value_parameter_type")]
    pub kind: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "any_data_type")]
    pub data_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<JsonValue>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binding: Option<ParameterBinding>,
}

fn value_parameter_type() -> String {
    VALUE_PARAMETER_TYPE.to_string()
}

fn any_data_type() -> String {
    "any".to_string()
}

impl Parameter {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            title: name.clone(),
            name,
            kind: value_parameter_type(),
            description: String::new(),
            data_type: any_data_type(),
            default_value: None,
            optional: false,
            binding: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ParameterBinding {
    Value { value: JsonValue },
}

impl ParameterBinding {
    pub fn value(value: impl Into<JsonValue>) -> Self {
        ParameterBinding::Value {
            value: value.into(),
        }
    }
}

/// Everything the search bar knows about the query being validated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationQuery {
    pub query_string: String,
    pub time_range: Option<TimeRange>,
    pub streams: Vec<String>,
    pub parameters: Vec<Parameter>,
    pub parameter_bindings: BTreeMap<String, ParameterBinding>,
    pub filter: Option<String>,
}

/// Time range as sent to the backend. Absolute bounds are already instants,
/// so a payload can never carry an unconverted timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PayloadTimeRange {
    Relative(RelativeTimeRange),
    Absolute {
        #[serde(serialize_with = "serialize_utc")]
        from: DateTime<Utc>,
        #[serde(serialize_with = "serialize_utc")]
        to: DateTime<Utc>,
    },
    Keyword(KeywordTimeRange),
}

fn serialize_utc<S: Serializer>(instant: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&instant.format(UTC_TIMESTAMP_FORMAT))
}

impl PayloadTimeRange {
    pub fn normalize(
        timerange: &TimeRange,
        context: &DateTimeContext,
    ) -> Result<Self, ValidationError> {
        match timerange {
            TimeRange::Relative(relative) => Ok(PayloadTimeRange::Relative(*relative)),
            TimeRange::Keyword(keyword) => Ok(PayloadTimeRange::Keyword(keyword.clone())),
            TimeRange::Absolute(absolute) => Ok(PayloadTimeRange::Absolute {
                from: context
                    .to_utc(&absolute.from)
                    .map_err(|source| ValidationError::AbsoluteBound {
                        bound: "from",
                        source,
                    })?,
                to: context
                    .to_utc(&absolute.to)
                    .map_err(|source| ValidationError::AbsoluteBound {
                        bound: "to",
                        source,
                    })?,
            }),
            TimeRange::Unknown => Err(ValidationError::UnknownTimeRange),
        }
    }
}

/// Body of `POST /search/validate`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timerange: Option<PayloadTimeRange>,
    pub streams: Vec<String>,
    pub parameters: Vec<Parameter>,
    pub parameter_bindings: BTreeMap<String, ParameterBinding>,
}

pub fn build_validation_payload(
    query: &ValidationQuery,
    context: &DateTimeContext,
) -> Result<ValidationRequest, ValidationError> {
    let timerange = query
        .time_range
        .as_ref()
        .map(|tr| PayloadTimeRange::normalize(tr, context))
        .transpose()?;

    Ok(ValidationRequest {
        query: query.query_string.clone(),
        filter: query.filter.clone(),
        timerange,
        streams: query.streams.clone(),
        parameters: query.parameters.clone(),
        parameter_bindings: query.parameter_bindings.clone(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValidationStatus {
    Ok,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationExplanation {
    pub error_type: String,
    pub error_message: String,
    pub begin_line: Option<u32>,
    pub begin_column: Option<u32>,
    pub end_line: Option<u32>,
    pub end_column: Option<u32>,
    pub related_property: Option<String>,
}

/// Validation verdict returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryValidationState {
    pub status: ValidationStatus,
    #[serde(default)]
    pub explanations: Vec<ValidationExplanation>,
}

impl QueryValidationState {
    pub fn is_ok(&self) -> bool {
        self.status == ValidationStatus::Ok
    }

    /// `line:column: message` for every explanation, in backend order.
    pub fn messages(&self) -> Vec<String> {
        self.explanations
            .iter()
            .map(|e| match (e.begin_line, e.begin_column) {
                (Some(line), Some(column)) => format!("{line}:{column}: {}", e.error_message),
                _ => e.error_message.clone(),
            })
            .collect()
    }
}
