//! Relay-style connection assembly

use crate::args::PageDirection;
use crate::backend::Node;
use crate::cursor::CursorCodec;
use crate::planner::SlicePlan;
use serde::Serialize;

/// Page information
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
}

/// Edge in a connection
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Edge<T> {
    pub cursor: String,
    pub node: T,
}

/// Connection (paginated result)
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Connection<T> {
    pub edges: Vec<Edge<T>>,
    pub page_info: PageInfo,
}

impl<T> Connection<T> {
    /// Create empty connection
    pub fn empty() -> Self {
        Self {
            edges: Vec::new(),
            page_info: PageInfo::default(),
        }
    }

    /// Nodes, index-aligned with `edges`
    pub fn nodes(&self) -> Vec<&T> {
        self.edges.iter().map(|edge| &edge.node).collect()
    }

    /// Recompute start/end cursors after edges were changed
    pub fn refresh_cursors(&mut self) {
        self.page_info.start_cursor = self.edges.first().map(|e| e.cursor.clone());
        self.page_info.end_cursor = self.edges.last().map(|e| e.cursor.clone());
    }
}

impl<T: Node> Connection<T> {
    /// Build a connection from a fetched slice.
    ///
    /// `items` must be in the plan's fetch order and hold at most
    /// `plan.limit` entries; anything past `plan.page_size` is the sentinel.
    pub fn assemble(mut items: Vec<T>, plan: &SlicePlan) -> Self {
        let has_more = items.len() > plan.page_size;
        items.truncate(plan.page_size);
        if plan.direction == PageDirection::Backward {
            items.reverse();
        }

        let edges: Vec<Edge<T>> = items
            .into_iter()
            .map(|node| Edge {
                cursor: CursorCodec::encode(&node.position_key()),
                node,
            })
            .collect();

        let backward = plan.direction == PageDirection::Backward;
        let mut connection = Self {
            edges,
            page_info: PageInfo {
                has_next_page: (!backward && has_more) || plan.before.is_some(),
                has_previous_page: (backward && has_more) || plan.after.is_some(),
                start_cursor: None,
                end_cursor: None,
            },
        };
        connection.refresh_cursors();
        connection
    }
}
