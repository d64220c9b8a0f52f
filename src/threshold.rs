//! Custom ordering and threshold predicates
//!
//! A threshold field is a `(key, value, type, operator)` predicate. Threshold
//! fields are either supplied by a connection implementor as static filters or
//! derived by the planner from the entity a cursor points at.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// Value type used to cast and compare threshold values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ThresholdType {
    Char,
    Numeric,
    Signed,
    Unsigned,
    Decimal,
    Binary,
    Date,
    Datetime,
    Time,
}

impl ThresholdType {
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::Numeric | Self::Signed | Self::Unsigned | Self::Decimal
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CompareOperator {
    Lt,
    Gt,
    Lte,
    Gte,
    Eq,
    Ne,
}

impl CompareOperator {
    /// Whether `candidate <op> threshold` holds, given `candidate.cmp(threshold)`
    pub fn admits(self, ordering: Ordering) -> bool {
        match self {
            Self::Lt => ordering == Ordering::Less,
            Self::Gt => ordering == Ordering::Greater,
            Self::Lte => ordering != Ordering::Greater,
            Self::Gte => ordering != Ordering::Less,
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Lte => "<=",
            Self::Gte => ">=",
            Self::Eq => "=",
            Self::Ne => "<>",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn reversed(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }

    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Asc => ordering,
            Self::Desc => ordering.reverse(),
        }
    }
}

/// One column of a connection's ordering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub key: String,
    pub direction: SortDirection,
    pub value_type: ThresholdType,
}

impl OrderBy {
    pub fn asc(key: impl Into<String>, value_type: ThresholdType) -> Self {
        Self {
            key: key.into(),
            direction: SortDirection::Asc,
            value_type,
        }
    }

    pub fn desc(key: impl Into<String>, value_type: ThresholdType) -> Self {
        Self {
            key: key.into(),
            direction: SortDirection::Desc,
            value_type,
        }
    }

    pub fn reversed(&self) -> Self {
        Self {
            direction: self.direction.reversed(),
            ..self.clone()
        }
    }

    /// Strict operator an item must satisfy to lie after a cursor on this column
    pub fn after_operator(&self) -> CompareOperator {
        match self.direction {
            SortDirection::Asc => CompareOperator::Gt,
            SortDirection::Desc => CompareOperator::Lt,
        }
    }

    /// Strict operator an item must satisfy to lie before a cursor on this column
    pub fn before_operator(&self) -> CompareOperator {
        match self.direction {
            SortDirection::Asc => CompareOperator::Lt,
            SortDirection::Desc => CompareOperator::Gt,
        }
    }
}

/// A comparison predicate on one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdField {
    pub key: String,
    pub value: Value,
    #[serde(rename = "type")]
    pub value_type: ThresholdType,
    #[serde(rename = "compare")]
    pub compare_operator: CompareOperator,
}

impl ThresholdField {
    pub fn new(
        key: impl Into<String>,
        value: Value,
        value_type: ThresholdType,
        compare_operator: CompareOperator,
    ) -> Self {
        Self {
            key: key.into(),
            value,
            value_type,
            compare_operator,
        }
    }

    /// Whether `candidate` satisfies this predicate
    pub fn matches(&self, candidate: &Value) -> bool {
        self.compare_operator
            .admits(compare_values(candidate, &self.value, self.value_type))
    }
}

/// Type-aware comparison of two JSON values. `Null` sorts first.
pub fn compare_values(a: &Value, b: &Value, value_type: ThresholdType) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => return Ordering::Equal,
        (Value::Null, _) => return Ordering::Less,
        (_, Value::Null) => return Ordering::Greater,
        _ => {}
    }

    let ordering = if value_type.is_numeric() {
        // integers compare exactly; f64 only for fractional values
        as_integer(a)
            .zip(as_integer(b))
            .map(|(a, b)| a.cmp(&b))
            .or_else(|| as_f64(a).zip(as_f64(b)).and_then(|(a, b)| a.partial_cmp(&b)))
    } else {
        match value_type {
            ThresholdType::Date | ThresholdType::Datetime => {
                as_datetime(a).zip(as_datetime(b)).map(|(a, b)| a.cmp(&b))
            }
            ThresholdType::Time => as_time(a).zip(as_time(b)).map(|(a, b)| a.cmp(&b)),
            _ => None,
        }
    };

    ordering.unwrap_or_else(|| match value_type {
        ThresholdType::Binary => as_text(a).as_bytes().cmp(as_text(b).as_bytes()),
        _ => as_text(a).cmp(&as_text(b)),
    })
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn as_integer(value: &Value) -> Option<i128> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(i128::from)
            .or_else(|| n.as_u64().map(i128::from)),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(i128::from(*b)),
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

pub(crate) fn as_datetime(value: &Value) -> Option<NaiveDateTime> {
    let text = value.as_str()?;
    chrono::DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.naive_utc())
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

fn as_time(value: &Value) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.as_str()?, "%H:%M:%S").ok()
}
