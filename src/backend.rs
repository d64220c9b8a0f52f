//! Backend query capability consumed by connection resolvers

use crate::args::WhereFilter;
use crate::cursor::PositionKey;
use crate::planner::SlicePlan;
use crate::threshold::compare_values;
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;

/// An item that can sit at the end of an edge
pub trait Node: Clone + Send + Sync + 'static {
    /// Stable key encoded into this item's cursor
    fn position_key(&self) -> PositionKey;

    /// Field value used for ordering, thresholds and `where` filters
    fn field(&self, key: &str) -> Option<Value>;
}

/// JSON objects keyed by their `id` member
impl Node for Value {
    fn position_key(&self) -> PositionKey {
        match self.get("id") {
            Some(Value::String(id)) => PositionKey::new(id.clone()),
            Some(Value::Number(id)) => PositionKey::new(id.to_string()),
            _ => PositionKey::new(""),
        }
    }

    fn field(&self, key: &str) -> Option<Value> {
        self.get(key).cloned()
    }
}

/// Data source a connection is resolved against
///
/// `fetch` must honour the plan's filters, boundaries and fetch order, and
/// return at most `plan.limit` items.
#[async_trait]
pub trait ConnectionBackend: Send + Sync {
    type Node: Node;

    async fn fetch(&self, plan: &SlicePlan) -> crate::Result<Vec<Self::Node>>;

    /// Look up the entity a cursor points at
    async fn load_by_key(&self, key: &PositionKey) -> crate::Result<Option<Self::Node>>;
}

/// In-memory backend over an owned list (plugins, themes, roles, resolver
/// return arrays)
#[derive(Debug, Clone)]
pub struct ArrayBackend<T> {
    items: Vec<T>,
}

impl<T: Node> ArrayBackend<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self { items }
    }

    /// Apply a plan to the list
    pub fn apply(&self, plan: &SlicePlan) -> Vec<T> {
        let value_of = |node: &T, key: &str| -> Value {
            if key == plan.id_key {
                node.position_key().to_value()
            } else {
                node.field(key).unwrap_or(Value::Null)
            }
        };

        let mut items: Vec<T> = self
            .items
            .iter()
            .filter(|node| matches_where(*node, &plan.where_filter))
            .filter(|node| {
                plan.predicates
                    .iter()
                    .all(|p| p.matches(&value_of(*node, &p.key)))
            })
            .filter(|node| {
                plan.after
                    .as_ref()
                    .map_or(true, |b| b.admits(|key| value_of(*node, key)))
            })
            .filter(|node| {
                plan.before
                    .as_ref()
                    .map_or(true, |b| b.admits(|key| value_of(*node, key)))
            })
            .cloned()
            .collect();

        let order = plan.fetch_order();
        items.sort_by(|a, b| {
            order
                .iter()
                .map(|o| {
                    o.direction.apply(compare_values(
                        &value_of(a, &o.key),
                        &value_of(b, &o.key),
                        o.value_type,
                    ))
                })
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
        items.truncate(plan.limit);
        items
    }
}

#[async_trait]
impl<T: Node> ConnectionBackend for ArrayBackend<T> {
    type Node = T;

    async fn fetch(&self, plan: &SlicePlan) -> crate::Result<Vec<T>> {
        Ok(self.apply(plan))
    }

    async fn load_by_key(&self, key: &PositionKey) -> crate::Result<Option<T>> {
        Ok(self
            .items
            .iter()
            .find(|node| node.position_key() == *key)
            .cloned())
    }
}

/// Equality filter; array values match any member, nulls match everything
fn matches_where<T: Node>(node: &T, filter: &WhereFilter) -> bool {
    filter.iter().all(|(key, expected)| match expected {
        Value::Null => true,
        Value::Array(options) => node
            .field(key)
            .map_or(false, |value| options.contains(&value)),
        _ => node.field(key).as_ref() == Some(expected),
    })
}
