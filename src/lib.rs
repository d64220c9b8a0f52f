//! # graphql-connections
//!
//! Relay-style connection engine for GraphQL APIs.
//!
//! ## Features
//!
//! - **Cursor Codec** - opaque, stable `arrayconnection:<key>` cursors
//! - **Argument Validation** - `first`/`last`/`before`/`after` rules
//! - **Slice Planning** - keyset boundaries, sentinel fetches, backward paging
//! - **Custom Ordering** - threshold fields with type-aware comparison
//! - **Connection Registrar** - dynamic connection types on `async_graphql::dynamic`
//! - **Request Context** - namespaced per-request key/value store
//!
//! ## Usage
//!
//! ```rust,no_run
//! use graphql_connections::{ArrayBackend, ConnectionArgs, ConnectionResolver};
//! use serde_json::json;
//!
//! # async fn example() -> graphql_connections::Result<()> {
//! let backend = ArrayBackend::new(vec![json!({"id": 1}), json!({"id": 2})]);
//! let resolver = ConnectionResolver::new(backend);
//! let connection = resolver.resolve(ConnectionArgs::forward(1, None)).await?;
//! assert!(connection.page_info.has_next_page);
//! # Ok(())
//! # }
//! ```

pub mod args;
pub mod auth;
pub mod backend;
pub mod config;
pub mod context;
pub mod cursor;
pub mod handler;
pub mod pagination;
pub mod planner;
pub mod registry;
pub mod resolver;
pub mod sql;
pub mod threshold;

pub use args::{ConnectionArgs, PageDirection, ValidatedArgs, WhereFilter};
pub use auth::{AuthCallback, AuthRequest, AuthRule, AuthSource};
pub use backend::{ArrayBackend, ConnectionBackend, Node};
pub use config::PaginationConfig;
pub use context::AppContext;
pub use cursor::{CursorCodec, PositionKey};
pub use handler::graphql_handler;
pub use pagination::{Connection, Edge, PageInfo};
pub use planner::{Boundary, SlicePlan, SlicePlanner};
pub use registry::{
    json_object, ConnectionArg, ConnectionMiddleware, ConnectionPayload, ConnectionRegistration,
    ConnectionSchema, ConnectionState, Diagnostic, ExtraField, ResolveInfo, SchemaBuilder,
};
pub use resolver::{ConnectionResolver, ConnectionSource, SourceRequest};
pub use sql::{SqlDialect, SqlSlice};
pub use threshold::{CompareOperator, OrderBy, SortDirection, ThresholdField, ThresholdType};

use async_graphql::ErrorExtensions;
use thiserror::Error;

/// Connection engine errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConnectionError {
    #[error("Invalid pagination arguments: {0}")]
    InvalidPaginationArgs(String),

    #[error("Malformed cursor: {0}")]
    MalformedCursor(String),

    #[error("{0}")]
    AuthorizationDenied(String),

    #[error("No entity found for cursor key {0}")]
    BackendEntityMissing(String),

    #[error("Schema conflict: {0}")]
    SchemaConflict(String),

    #[error("Invalid connection registration: {0}")]
    InvalidRegistration(String),

    #[error("Invalid column name: {0}")]
    InvalidColumnName(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Schema build error: {0}")]
    Schema(String),
}

impl ConnectionError {
    /// Stable machine-readable code, exposed as `extensions.code`
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidPaginationArgs(_) => "INVALID_PAGINATION_ARGS",
            Self::MalformedCursor(_) => "MALFORMED_CURSOR",
            Self::AuthorizationDenied(_) => "AUTHORIZATION_DENIED",
            Self::BackendEntityMissing(_) => "BACKEND_ENTITY_MISSING",
            Self::SchemaConflict(_) => "SCHEMA_CONFLICT",
            Self::InvalidRegistration(_) => "INVALID_REGISTRATION",
            Self::InvalidColumnName(_) => "INVALID_COLUMN_NAME",
            Self::Backend(_) => "BACKEND_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Schema(_) => "SCHEMA_ERROR",
        }
    }
}

impl ErrorExtensions for ConnectionError {
    fn extend(&self) -> async_graphql::Error {
        async_graphql::Error::new(self.to_string()).extend_with(|_, e| e.set("code", self.code()))
    }
}

/// Result type for connection operations
pub type Result<T> = std::result::Result<T, ConnectionError>;
