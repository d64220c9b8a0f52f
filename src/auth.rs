//! Authorization gates for connection types and fields
//!
//! A connection field can carry a type-level rule (checked before the
//! connection resolves) and each exposed field of the generated types can
//! carry its own rule. A denied field resolves to `null` with an error at its
//! path; sibling fields keep resolving.

use crate::args::ConnectionArgs;
use crate::context::AppContext;
use crate::pagination::Edge;
use crate::registry::{ConnectionPayload, ResolveInfo};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

const DEFAULT_DENIED_MESSAGE: &str = "You are not authorized to access this field";

/// Value a gated field is being resolved against
#[derive(Clone, Copy)]
pub enum AuthSource<'a> {
    /// The object the connection field hangs off (`None` at the root)
    Parent(Option<&'a Value>),
    Connection(&'a ConnectionPayload),
    Edge(&'a Edge<Value>),
}

/// Everything an auth callback can inspect
pub struct AuthRequest<'a> {
    /// Field being resolved
    pub field: &'a str,
    /// `Type.field` coordinate
    pub field_key: &'a str,
    pub source: AuthSource<'a>,
    pub args: &'a ConnectionArgs,
    pub context: &'a AppContext,
    pub info: &'a ResolveInfo<'a>,
}

pub trait AuthCallback: Send + Sync {
    fn authorize(&self, request: &AuthRequest<'_>) -> bool;
}

impl<F> AuthCallback for F
where
    F: Fn(&AuthRequest<'_>) -> bool + Send + Sync,
{
    fn authorize(&self, request: &AuthRequest<'_>) -> bool {
        self(request)
    }
}

/// A callback plus the error message reported when it denies access
#[derive(Clone)]
pub struct AuthRule {
    callback: Arc<dyn AuthCallback>,
    message: String,
}

impl fmt::Debug for AuthRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthRule")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

impl AuthRule {
    pub fn new(callback: impl AuthCallback + 'static) -> Self {
        Self {
            callback: Arc::new(callback),
            message: DEFAULT_DENIED_MESSAGE.to_string(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn check(&self, request: &AuthRequest<'_>) -> crate::Result<()> {
        if self.callback.authorize(request) {
            Ok(())
        } else {
            tracing::debug!(field = request.field_key, "authorization denied");
            Err(crate::ConnectionError::AuthorizationDenied(self.message.clone()))
        }
    }
}

/// Run an optional rule
pub(crate) fn check_rule(
    rule: Option<&AuthRule>,
    request: &AuthRequest<'_>,
) -> crate::Result<()> {
    match rule {
        Some(rule) => rule.check(request),
        None => Ok(()),
    }
}
