//! Query slice planning
//!
//! Turns validated arguments into a [`SlicePlan`]: how many rows to fetch
//! (page size plus one sentinel), in which order, and which keyset boundaries
//! an item must lie within.

use crate::args::{PageDirection, ValidatedArgs, WhereFilter};
use crate::backend::{ConnectionBackend, Node};
use crate::cursor::PositionKey;
use crate::threshold::{compare_values, OrderBy, ThresholdField, ThresholdType};
use serde_json::Value;
use std::cmp::Ordering;
use tracing::debug;

/// A keyset boundary derived from a cursor
#[derive(Debug, Clone, PartialEq)]
pub struct Boundary {
    /// Key decoded from the cursor
    pub key: PositionKey,

    /// One strict predicate per ordering column, tie-breaker last
    pub thresholds: Vec<ThresholdField>,
}

impl Boundary {
    /// Whether an item lies strictly on the admitted side of the boundary.
    ///
    /// The first column whose value differs from the threshold decides.
    pub fn admits(&self, value_of: impl Fn(&str) -> Value) -> bool {
        for threshold in &self.thresholds {
            let ordering = compare_values(
                &value_of(&threshold.key),
                &threshold.value,
                threshold.value_type,
            );
            if ordering != Ordering::Equal {
                return threshold.compare_operator.admits(ordering);
            }
        }
        false
    }
}

/// Everything a backend needs to fetch one page
#[derive(Debug, Clone, PartialEq)]
pub struct SlicePlan {
    pub page_size: usize,

    /// `page_size + 1`; the extra row is the sentinel
    pub limit: usize,

    pub direction: PageDirection,

    /// Key of the tie-breaking column (the position key)
    pub id_key: String,

    /// Canonical ordering, tie-breaker last
    pub order: Vec<OrderBy>,

    pub after: Option<Boundary>,
    pub before: Option<Boundary>,

    /// Static predicates every item must satisfy
    pub predicates: Vec<ThresholdField>,

    pub where_filter: WhereFilter,
}

impl SlicePlan {
    /// Order rows must be fetched in. Backward pages are fetched from the far
    /// end and reversed by the assembler.
    pub fn fetch_order(&self) -> Vec<OrderBy> {
        match self.direction {
            PageDirection::Forward => self.order.clone(),
            PageDirection::Backward => self.order.iter().map(OrderBy::reversed).collect(),
        }
    }
}

#[derive(Clone, Copy)]
enum Side {
    After,
    Before,
}

/// Builds [`SlicePlan`]s for one connection's ordering
#[derive(Debug, Clone)]
pub struct SlicePlanner {
    order_by: Vec<OrderBy>,
    tie_breaker: OrderBy,
    predicates: Vec<ThresholdField>,
}

impl Default for SlicePlanner {
    fn default() -> Self {
        Self {
            order_by: Vec::new(),
            tie_breaker: OrderBy::asc("id", ThresholdType::Numeric),
            predicates: Vec::new(),
        }
    }
}

impl SlicePlanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an ordering column; columns take precedence in insertion order
    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    /// Set the position-key column. It is always compared ascending.
    pub fn tie_breaker(mut self, key: impl Into<String>, value_type: ThresholdType) -> Self {
        self.tie_breaker = OrderBy::asc(key, value_type);
        self
    }

    /// Add a static predicate
    pub fn threshold(mut self, field: ThresholdField) -> Self {
        self.predicates.push(field);
        self
    }

    /// Caller ordering followed by the tie-breaker, unless the caller already
    /// orders on the position key
    pub fn canonical_order(&self) -> Vec<OrderBy> {
        let mut order = self.order_by.clone();
        if !order.iter().any(|o| o.key == self.tie_breaker.key) {
            order.push(self.tie_breaker.clone());
        }
        order
    }

    pub async fn plan<B>(&self, args: ValidatedArgs, backend: &B) -> crate::Result<SlicePlan>
    where
        B: ConnectionBackend + ?Sized,
    {
        let order = self.canonical_order();

        let after = match args.after {
            Some(key) => self.boundary(key, Side::After, &order, backend).await?,
            None => None,
        };
        let before = match args.before {
            Some(key) => self.boundary(key, Side::Before, &order, backend).await?,
            None => None,
        };

        Ok(SlicePlan {
            page_size: args.page_size,
            limit: args.page_size + 1,
            direction: args.direction,
            id_key: self.tie_breaker.key.clone(),
            order,
            after,
            before,
            predicates: self.predicates.clone(),
            where_filter: args.where_filter,
        })
    }

    /// Derive threshold values for a cursor. Ordering on anything but the
    /// position key needs the cursor's entity; when it is gone the boundary
    /// is dropped.
    async fn boundary<B>(
        &self,
        key: PositionKey,
        side: Side,
        order: &[OrderBy],
        backend: &B,
    ) -> crate::Result<Option<Boundary>>
    where
        B: ConnectionBackend + ?Sized,
    {
        let needs_entity = order.iter().any(|o| o.key != self.tie_breaker.key);
        let entity = if needs_entity {
            match backend.load_by_key(&key).await {
                Ok(Some(entity)) => Some(entity),
                Ok(None) | Err(crate::ConnectionError::BackendEntityMissing(_)) => {
                    debug!(%key, "cursor entity not found, ignoring boundary");
                    return Ok(None);
                }
                Err(e) => return Err(e),
            }
        } else {
            None
        };

        let thresholds = order
            .iter()
            .map(|column| {
                let value = if column.key == self.tie_breaker.key {
                    key.to_value()
                } else {
                    entity
                        .as_ref()
                        .and_then(|e| e.field(&column.key))
                        .unwrap_or(Value::Null)
                };
                let operator = match side {
                    Side::After => column.after_operator(),
                    Side::Before => column.before_operator(),
                };
                ThresholdField::new(column.key.clone(), value, column.value_type, operator)
            })
            .collect();

        Ok(Some(Boundary { key, thresholds }))
    }
}
