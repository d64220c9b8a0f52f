//! Connection arguments and their validation
//!
//! Follows the Relay Cursor Connections Specification:
//! https://relay.dev/graphql/connections.htm#sec-Arguments

use crate::config::PaginationConfig;
use crate::cursor::{CursorCodec, PositionKey};
use serde::{Deserialize, Serialize};

/// Type-specific `where` input, keyed by argument name
pub type WhereFilter = serde_json::Map<String, serde_json::Value>;

/// Raw pagination arguments as received from a query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionArgs {
    /// Number of items to return (forward pagination)
    pub first: Option<i64>,

    /// Number of items to return (backward pagination)
    pub last: Option<i64>,

    /// Cursor to start after
    pub after: Option<String>,

    /// Cursor to end before
    pub before: Option<String>,

    #[serde(rename = "where", default)]
    pub where_filter: WhereFilter,
}

/// Which end of the ordered set a page is taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageDirection {
    Forward,
    Backward,
}

/// Arguments that passed validation, with cursors decoded
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedArgs {
    pub page_size: usize,
    pub direction: PageDirection,
    pub after: Option<PositionKey>,
    pub before: Option<PositionKey>,
    pub where_filter: WhereFilter,
}

impl ConnectionArgs {
    pub fn forward(first: i64, after: Option<String>) -> Self {
        Self {
            first: Some(first),
            after,
            ..Default::default()
        }
    }

    pub fn backward(last: i64, before: Option<String>) -> Self {
        Self {
            last: Some(last),
            before,
            ..Default::default()
        }
    }

    pub fn with_where(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.where_filter.insert(key.into(), value);
        self
    }

    /// Validate the arguments and decode their cursors
    pub fn validate(&self, config: &PaginationConfig) -> crate::Result<ValidatedArgs> {
        if self.first.is_some() && self.last.is_some() {
            return Err(crate::ConnectionError::InvalidPaginationArgs(
                "Cannot specify both 'first' and 'last'".to_string(),
            ));
        }

        let first = non_negative("first", self.first)?;
        let last = non_negative("last", self.last)?;

        let after = CursorCodec::decode_optional(self.after.as_deref())?;
        let before = CursorCodec::decode_optional(self.before.as_deref())?;

        let backward_only = first.is_none() && after.is_none() && before.is_some();
        let direction = if last.is_some() || backward_only {
            PageDirection::Backward
        } else {
            PageDirection::Forward
        };

        Ok(ValidatedArgs {
            page_size: config.page_size(first.or(last)),
            direction,
            after,
            before,
            where_filter: self.where_filter.clone(),
        })
    }
}

fn non_negative(name: &str, value: Option<i64>) -> crate::Result<Option<usize>> {
    match value {
        Some(amount) if amount < 0 => Err(crate::ConnectionError::InvalidPaginationArgs(
            format!("'{name}' must be non-negative"),
        )),
        Some(amount) => Ok(Some(amount as usize)),
        None => Ok(None),
    }
}
