//! Connection resolution: validate, plan, fetch, assemble

use crate::args::ConnectionArgs;
use crate::backend::ConnectionBackend;
use crate::config::PaginationConfig;
use crate::context::AppContext;
use crate::pagination::Connection;
use crate::planner::SlicePlanner;
use crate::threshold::{OrderBy, ThresholdField, ThresholdType};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

/// Resolves connections against one backend with a fixed ordering
pub struct ConnectionResolver<B> {
    backend: B,
    config: PaginationConfig,
    planner: SlicePlanner,
}

impl<B: ConnectionBackend> ConnectionResolver<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            config: PaginationConfig::default(),
            planner: SlicePlanner::new(),
        }
    }

    pub fn with_config(mut self, config: PaginationConfig) -> Self {
        self.config = config;
        self
    }

    /// Order by a field ahead of the position key
    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.planner = self.planner.order_by(order);
        self
    }

    /// Add a static threshold predicate
    pub fn threshold(mut self, field: ThresholdField) -> Self {
        self.planner = self.planner.threshold(field);
        self
    }

    /// Name and type of the position-key column (default: numeric `id`)
    pub fn position_key(mut self, key: impl Into<String>, value_type: ThresholdType) -> Self {
        self.planner = self.planner.tie_breaker(key, value_type);
        self
    }

    pub async fn resolve(&self, args: ConnectionArgs) -> crate::Result<Connection<B::Node>> {
        let args = args.validate(&self.config)?;
        let plan = self.planner.plan(args, &self.backend).await?;
        debug!(
            limit = plan.limit,
            direction = ?plan.direction,
            after = plan.after.is_some(),
            before = plan.before.is_some(),
            "resolving connection slice"
        );
        let items = self.backend.fetch(&plan).await?;
        Ok(Connection::assemble(items, &plan))
    }
}

/// Inputs handed to a registered connection source
pub struct SourceRequest<'a> {
    /// Value of the object the connection field hangs off, if any
    pub source: Option<&'a Value>,
    pub args: ConnectionArgs,
    pub context: &'a AppContext,
}

/// Resolver bound to a registered connection field
#[async_trait]
pub trait ConnectionSource: Send + Sync {
    async fn resolve(&self, request: SourceRequest<'_>) -> crate::Result<Connection<Value>>;
}

#[async_trait]
impl<B> ConnectionSource for ConnectionResolver<B>
where
    B: ConnectionBackend<Node = Value>,
{
    async fn resolve(&self, request: SourceRequest<'_>) -> crate::Result<Connection<Value>> {
        ConnectionResolver::resolve(self, request.args).await
    }
}
