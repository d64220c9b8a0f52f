//! Connection registrar for `async_graphql::dynamic` schemas
//!
//! A [`ConnectionRegistration`] describes one connection field hanging off a
//! registered object: the field name, the node type it pages over, the source
//! that produces pages, and any extra arguments or fields. [`SchemaBuilder`]
//! collects registrations and, on [`SchemaBuilder::finish`], generates the
//! connection, edge and `where` input types and binds the fields.
//!
//! Naming:
//!
//! - connection type: `{From}To{To}Connection` unless a name is given
//! - edge type: `{Connection}Edge`
//! - `where` input: `{Connection}WhereArgs`, only when extra arguments exist
//! - one-to-one connections resolve straight to the edge type
//!
//! Type name conflicts never abort the build. The first shape wins and a
//! `DUPLICATE_TYPE` diagnostic is reported in the `debug` response extension.

use crate::args::ConnectionArgs;
use crate::auth::{check_rule, AuthRequest, AuthRule, AuthSource};
use crate::context::AppContext;
use crate::pagination::{Connection, Edge, PageInfo};
use crate::resolver::{ConnectionSource, SourceRequest};
use crate::ConnectionError;
use async_graphql::dynamic::{
    Field, FieldFuture, FieldValue, InputObject, InputValue, Interface, InterfaceField, Object,
    ObjectAccessor, ResolverContext, Schema, Type, TypeRef,
};
use async_graphql::{ErrorExtensions, Request, Response, Value as ConstValue};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

const PAGE_INFO: &str = "PageInfo";
const CONNECTION_INTERFACE: &str = "Connection";
const EDGE_INTERFACE: &str = "Edge";
const DEFAULT_QUERY_TYPE: &str = "RootQuery";

/// An extra `where` argument of a connection field
#[derive(Debug, Clone)]
pub struct ConnectionArg {
    pub name: String,
    pub type_ref: TypeRef,
    pub description: Option<String>,
}

impl ConnectionArg {
    pub fn new(name: impl Into<String>, type_ref: TypeRef) -> Self {
        Self {
            name: name.into(),
            type_ref,
            description: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

type ExtraResolver<P> = Arc<dyn Fn(&P, &AppContext) -> crate::Result<Value> + Send + Sync>;

/// An extra field on a generated connection (`P = ConnectionPayload`) or
/// edge (`P = Edge<Value>`) type
pub struct ExtraField<P> {
    pub name: String,
    pub type_ref: TypeRef,
    pub description: Option<String>,
    pub auth: Option<AuthRule>,
    resolve: ExtraResolver<P>,
}

impl<P> Clone for ExtraField<P> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            type_ref: self.type_ref.clone(),
            description: self.description.clone(),
            auth: self.auth.clone(),
            resolve: self.resolve.clone(),
        }
    }
}

impl<P> fmt::Debug for ExtraField<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtraField")
            .field("name", &self.name)
            .field("type_ref", &self.type_ref)
            .finish_non_exhaustive()
    }
}

impl<P> ExtraField<P> {
    pub fn new(
        name: impl Into<String>,
        type_ref: TypeRef,
        resolve: impl Fn(&P, &AppContext) -> crate::Result<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            type_ref,
            description: None,
            auth: None,
            resolve: Arc::new(resolve),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn auth(mut self, rule: AuthRule) -> Self {
        self.auth = Some(rule);
        self
    }
}

/// What a connection field resolves to, and what connection-type fields read
#[derive(Debug, Clone)]
pub struct ConnectionPayload {
    pub connection: Connection<Value>,
    /// Arguments after middleware ran
    pub args: ConnectionArgs,
    /// The object the connection field hangs off
    pub source: Option<Value>,
}

/// Declarative description of one connection field
#[derive(Clone)]
pub struct ConnectionRegistration {
    pub from_type: String,
    pub to_type: String,
    pub from_field_name: String,
    resolve: Arc<dyn ConnectionSource>,
    pub connection_args: Vec<ConnectionArg>,
    pub connection_fields: Vec<ExtraField<ConnectionPayload>>,
    pub edge_fields: Vec<ExtraField<Edge<Value>>>,
    pub connection_type_name: Option<String>,
    pub one_to_one: bool,
    pub auth: Option<AuthRule>,
    pub field_auth: HashMap<String, AuthRule>,
    pub include_default_interfaces: bool,
    pub description: Option<String>,
}

impl fmt::Debug for ConnectionRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRegistration")
            .field("from_type", &self.from_type)
            .field("to_type", &self.to_type)
            .field("from_field_name", &self.from_field_name)
            .field("connection_type_name", &self.connection_type_name())
            .field("one_to_one", &self.one_to_one)
            .finish_non_exhaustive()
    }
}

impl ConnectionRegistration {
    pub fn new(
        from_type: impl Into<String>,
        to_type: impl Into<String>,
        from_field_name: impl Into<String>,
        resolve: impl ConnectionSource + 'static,
    ) -> Self {
        Self {
            from_type: from_type.into(),
            to_type: to_type.into(),
            from_field_name: from_field_name.into(),
            resolve: Arc::new(resolve),
            connection_args: Vec::new(),
            connection_fields: Vec::new(),
            edge_fields: Vec::new(),
            connection_type_name: None,
            one_to_one: false,
            auth: None,
            field_auth: HashMap::new(),
            include_default_interfaces: true,
            description: None,
        }
    }

    pub fn connection_arg(mut self, arg: ConnectionArg) -> Self {
        self.connection_args.push(arg);
        self
    }

    pub fn connection_field(mut self, field: ExtraField<ConnectionPayload>) -> Self {
        self.connection_fields.push(field);
        self
    }

    pub fn edge_field(mut self, field: ExtraField<Edge<Value>>) -> Self {
        self.edge_fields.push(field);
        self
    }

    pub fn type_name(mut self, name: impl Into<String>) -> Self {
        self.connection_type_name = Some(name.into());
        self
    }

    /// Resolve to a single edge instead of a list
    pub fn one_to_one(mut self) -> Self {
        self.one_to_one = true;
        self
    }

    /// Rule checked before the connection resolves
    pub fn auth(mut self, rule: AuthRule) -> Self {
        self.auth = Some(rule);
        self
    }

    /// Rule for one field of the generated connection or edge type
    pub fn field_auth(mut self, field: impl Into<String>, rule: AuthRule) -> Self {
        self.field_auth.insert(field.into(), rule);
        self
    }

    pub fn without_default_interfaces(mut self) -> Self {
        self.include_default_interfaces = false;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Name of the generated connection type
    pub fn connection_type_name(&self) -> String {
        self.connection_type_name.clone().unwrap_or_else(|| {
            format!(
                "{}To{}Connection",
                upper_first(&self.from_type),
                upper_first(&self.to_type)
            )
        })
    }

    pub fn edge_type_name(&self) -> String {
        format!("{}Edge", self.connection_type_name())
    }

    pub fn where_type_name(&self) -> String {
        format!("{}WhereArgs", self.connection_type_name())
    }

    /// Type the connection field itself returns
    pub fn output_type_name(&self) -> String {
        match (&self.connection_type_name, self.one_to_one) {
            (Some(name), true) => name.clone(),
            (None, true) => self.edge_type_name(),
            (_, false) => self.connection_type_name(),
        }
    }

    fn validate(&self) -> crate::Result<()> {
        let mut names = vec![
            ("fromType", self.from_type.clone()),
            ("toType", self.to_type.clone()),
            ("fromFieldName", self.from_field_name.clone()),
            ("connectionTypeName", self.connection_type_name()),
        ];
        names.extend(self.connection_args.iter().map(|a| ("connectionArgs", a.name.clone())));
        names.extend(self.connection_fields.iter().map(|f| ("connectionFields", f.name.clone())));
        names.extend(self.edge_fields.iter().map(|f| ("edgeFields", f.name.clone())));

        for (what, name) in names {
            if !is_graphql_name(&name) {
                return Err(ConnectionError::InvalidRegistration(format!(
                    "{what} `{name}` is not a valid GraphQL name"
                )));
            }
        }
        Ok(())
    }

    /// Fold a later registration of the same field into this one
    fn merge(&mut self, later: ConnectionRegistration) {
        self.to_type = later.to_type;
        self.resolve = later.resolve;
        self.one_to_one = later.one_to_one;
        self.include_default_interfaces = later.include_default_interfaces;
        if later.connection_type_name.is_some() {
            self.connection_type_name = later.connection_type_name;
        }
        if later.auth.is_some() {
            self.auth = later.auth;
        }
        if later.description.is_some() {
            self.description = later.description;
        }
        merge_by_name(&mut self.connection_args, later.connection_args, |a| &a.name);
        merge_by_name(&mut self.connection_fields, later.connection_fields, |f| &f.name);
        merge_by_name(&mut self.edge_fields, later.edge_fields, |f| &f.name);
        self.field_auth.extend(later.field_auth);
    }
}

fn merge_by_name<T>(into: &mut Vec<T>, later: Vec<T>, name: impl Fn(&T) -> &String) {
    for item in later {
        match into.iter().position(|existing| name(existing) == name(&item)) {
            Some(i) => into[i] = item,
            None => into.push(item),
        }
    }
}

fn upper_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn is_graphql_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Identifies the field being resolved, for middleware and auth callbacks
pub struct ResolveInfo<'a> {
    /// Type the field is declared on
    pub from_type: &'a str,
    pub field_name: &'a str,
    /// Type the field returns
    pub type_name: &'a str,
    pub context: &'a AppContext,
}

/// Hooks around every connection resolution, run in registration order
pub trait ConnectionMiddleware: Send + Sync {
    fn before_resolve(
        &self,
        _info: &ResolveInfo<'_>,
        _args: &mut ConnectionArgs,
    ) -> crate::Result<()> {
        Ok(())
    }

    fn after_resolve(
        &self,
        _info: &ResolveInfo<'_>,
        _connection: &mut Connection<Value>,
    ) -> crate::Result<()> {
        Ok(())
    }
}

/// Non-fatal schema build problem, surfaced under `extensions.debug`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

impl Diagnostic {
    fn duplicate_type(name: &str) -> Self {
        let conflict = ConnectionError::SchemaConflict(format!(
            "You cannot register duplicate Types to the Schema. The Type '{name}' already \
             exists in the Schema. Make sure to give new Types a unique name."
        ));
        tracing::debug!(code = conflict.code(), "{conflict}");
        Self {
            kind: "DUPLICATE_TYPE".to_string(),
            message: conflict.to_string(),
        }
    }
}

/// Lifecycle of one `(fromType, fieldName)` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unregistered,
    Registered,
    Bound,
}

/// Collects objects and connection registrations, then builds the schema
pub struct SchemaBuilder {
    query_type: String,
    objects: IndexMap<String, Object>,
    types: Vec<Type>,
    fields: Vec<(String, Field)>,
    connections: IndexMap<(String, String), ConnectionRegistration>,
    middlewares: Vec<Arc<dyn ConnectionMiddleware>>,
    diagnostics: Vec<Diagnostic>,
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::with_query_type(DEFAULT_QUERY_TYPE)
    }

    pub fn with_query_type(name: impl Into<String>) -> Self {
        let query_type = name.into();
        let mut objects = IndexMap::new();
        objects.insert(query_type.clone(), Object::new(query_type.as_str()));
        Self {
            query_type,
            objects,
            types: Vec::new(),
            fields: Vec::new(),
            connections: IndexMap::new(),
            middlewares: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Register an object type. A second object with the same name is
    /// dropped with a diagnostic.
    pub fn register_object(mut self, object: Object) -> Self {
        let name = object.type_name().to_string();
        if self.objects.contains_key(&name) {
            tracing::debug!(type_name = %name, "duplicate object registration ignored");
            self.diagnostics.push(Diagnostic::duplicate_type(&name));
        } else {
            self.objects.insert(name, object);
        }
        self
    }

    /// Register any other type (inputs, enums, scalars, interfaces)
    pub fn register_type(mut self, ty: impl Into<Type>) -> Self {
        self.types.push(ty.into());
        self
    }

    /// Add a plain field to a registered object
    pub fn register_field(mut self, type_name: impl Into<String>, field: Field) -> Self {
        self.fields.push((type_name.into(), field));
        self
    }

    /// Register a connection field. Registering the same `(fromType, field)`
    /// again merges the two configurations, later values winning.
    pub fn register_connection(
        mut self,
        registration: ConnectionRegistration,
    ) -> crate::Result<Self> {
        registration.validate()?;
        let key = (registration.from_type.clone(), registration.from_field_name.clone());
        match self.connections.get_mut(&key) {
            Some(existing) => {
                tracing::debug!(
                    from_type = %key.0,
                    field = %key.1,
                    "merging connection re-registration"
                );
                existing.merge(registration);
            }
            None => {
                self.connections.insert(key, registration);
            }
        }
        Ok(self)
    }

    pub fn middleware(mut self, middleware: impl ConnectionMiddleware + 'static) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    pub fn connection_state(&self, from_type: &str, field_name: &str) -> ConnectionState {
        if self
            .connections
            .contains_key(&(from_type.to_string(), field_name.to_string()))
        {
            ConnectionState::Registered
        } else {
            ConnectionState::Unregistered
        }
    }

    /// Generate connection types, bind every registered connection field and
    /// build the schema
    pub fn finish(self) -> crate::Result<ConnectionSchema> {
        let SchemaBuilder {
            query_type,
            objects,
            types,
            fields,
            connections,
            middlewares,
            diagnostics,
        } = self;
        let middlewares = Arc::new(middlewares);
        let mut set = TypeSet {
            objects,
            generated: HashSet::new(),
            diagnostics,
        };

        let mut attachments = fields;
        let mut inputs = Vec::new();
        let mut bound = HashSet::new();
        let mut uses_interfaces = false;

        for (key, registration) in connections {
            if !set.objects.contains_key(&registration.from_type) {
                return Err(ConnectionError::InvalidRegistration(format!(
                    "cannot register connection `{}` on unknown type `{}`",
                    registration.from_field_name, registration.from_type
                )));
            }
            uses_interfaces |= registration.include_default_interfaces && !registration.one_to_one;

            let where_type = (!registration.connection_args.is_empty()).then(|| {
                let name = registration.where_type_name();
                inputs.push(where_input(&name, &registration.connection_args));
                name
            });

            let edge_fields = edge_object_fields(&registration);
            if registration.one_to_one {
                set.claim(&registration.output_type_name(), |object| {
                    edge_fields.into_iter().fold(object, Object::field)
                });
            } else {
                let interfaces = registration.include_default_interfaces;
                let edge_name = registration.edge_type_name();
                set.claim(&edge_name, |object| {
                    let object = edge_fields.into_iter().fold(object, Object::field);
                    if interfaces {
                        object.implement(EDGE_INTERFACE)
                    } else {
                        object
                    }
                });
                let connection_fields = connection_object_fields(&registration, &edge_name);
                set.claim(&registration.connection_type_name(), |object| {
                    let object = connection_fields.into_iter().fold(object, Object::field);
                    if interfaces {
                        object.implement(CONNECTION_INTERFACE)
                    } else {
                        object
                    }
                });
            }

            tracing::debug!(
                from_type = %key.0,
                field = %key.1,
                type_name = %registration.output_type_name(),
                "binding connection field"
            );
            let from_type = registration.from_type.clone();
            let connection = BoundConnection {
                output_type: registration.output_type_name(),
                registration,
                middlewares: middlewares.clone(),
            };
            attachments.push((from_type, connection.into_field(where_type.as_deref())));
            bound.insert(key);
        }

        if !bound.is_empty() {
            set.replace(PAGE_INFO, page_info_object());
        }

        let TypeSet {
            mut objects,
            diagnostics,
            ..
        } = set;
        for (type_name, field) in attachments {
            let Some(object) = objects.get_mut(&type_name) else {
                return Err(ConnectionError::InvalidRegistration(format!(
                    "cannot add field to unknown type `{type_name}`"
                )));
            };
            let taken = std::mem::replace(object, Object::new(type_name.as_str()));
            *object = taken.field(field);
        }

        let mut schema = Schema::build(&query_type, None, None);
        for (_, object) in objects {
            schema = schema.register(object);
        }
        for input in inputs {
            schema = schema.register(input);
        }
        if uses_interfaces && !bound.is_empty() {
            schema = schema
                .register(
                    Interface::new(CONNECTION_INTERFACE)
                        .field(InterfaceField::new("pageInfo", TypeRef::named_nn(PAGE_INFO))),
                )
                .register(
                    Interface::new(EDGE_INTERFACE)
                        .field(InterfaceField::new("cursor", TypeRef::named(TypeRef::STRING))),
                );
        }
        for ty in types {
            schema = schema.register(ty);
        }

        let schema = schema
            .finish()
            .map_err(|e| ConnectionError::Schema(e.to_string()))?;

        Ok(ConnectionSchema {
            schema,
            diagnostics: Arc::new(diagnostics),
            bound: Arc::new(bound),
        })
    }
}

/// Object types keyed by name, tracking which ones connections generated
struct TypeSet {
    objects: IndexMap<String, Object>,
    generated: HashSet<String>,
    diagnostics: Vec<Diagnostic>,
}

impl TypeSet {
    /// Build a generated type. A type already generated keeps its first shape;
    /// a pre-registered object of the same name gets the generated fields.
    fn claim(&mut self, name: &str, build: impl FnOnce(Object) -> Object) {
        if !self.generated.insert(name.to_string()) {
            tracing::debug!(type_name = name, "generated type already exists, keeping first");
            self.diagnostics.push(Diagnostic::duplicate_type(name));
            return;
        }
        match self.objects.get_mut(name) {
            Some(existing) => {
                tracing::debug!(type_name = name, "merging generated type into registered object");
                self.diagnostics.push(Diagnostic::duplicate_type(name));
                let taken = std::mem::replace(existing, Object::new(name));
                *existing = build(taken);
            }
            None => {
                self.objects.insert(name.to_string(), build(Object::new(name)));
            }
        }
    }

    fn replace(&mut self, name: &str, object: Object) {
        if self.objects.insert(name.to_string(), object).is_some() {
            self.diagnostics.push(Diagnostic::duplicate_type(name));
        }
    }
}

fn where_input(name: &str, args: &[ConnectionArg]) -> InputObject {
    args.iter().fold(InputObject::new(name), |input, arg| {
        let mut value = InputValue::new(arg.name.as_str(), arg.type_ref.clone());
        if let Some(description) = &arg.description {
            value = value.description(description.as_str());
        }
        input.field(value)
    })
}

/// A connection field ready to attach to its parent type
struct BoundConnection {
    registration: ConnectionRegistration,
    output_type: String,
    middlewares: Arc<Vec<Arc<dyn ConnectionMiddleware>>>,
}

impl BoundConnection {
    fn into_field(self, where_type: Option<&str>) -> Field {
        let name = self.registration.from_field_name.clone();
        let ty = TypeRef::named(self.output_type.as_str());
        let description = self.registration.description.clone();
        let one_to_one = self.registration.one_to_one;

        let bound = Arc::new(self);
        let mut field = Field::new(name, ty, move |ctx| {
            let bound = bound.clone();
            FieldFuture::new(async move { bound.resolve(ctx).await.map_err(|e| e.extend()) })
        });

        if !one_to_one {
            field = field
                .argument(
                    InputValue::new("first", TypeRef::named(TypeRef::INT))
                        .description(
                            "Paginate forward, returning the given amount of edges at most.",
                        ),
                )
                .argument(
                    InputValue::new("after", TypeRef::named(TypeRef::STRING))
                        .description("Return edges after the given cursor."),
                )
                .argument(
                    InputValue::new("last", TypeRef::named(TypeRef::INT))
                        .description(
                            "Paginate backward, returning the given amount of edges at most.",
                        ),
                )
                .argument(
                    InputValue::new("before", TypeRef::named(TypeRef::STRING))
                        .description("Return edges before the given cursor."),
                );
        }
        if let Some(where_type) = where_type {
            field = field.argument(
                InputValue::new("where", TypeRef::named(where_type))
                    .description("Arguments for filtering the connection"),
            );
        }
        if let Some(description) = description {
            field = field.description(description);
        }
        field
    }

    async fn resolve<'a>(
        &self,
        ctx: ResolverContext<'a>,
    ) -> crate::Result<Option<FieldValue<'a>>> {
        let registration = &self.registration;
        let context = ctx.data_opt::<AppContext>().cloned().unwrap_or_default();
        let source = ctx.parent_value.downcast_ref::<Value>();
        let mut args = read_args(&ctx.args)?;
        let field_key = format!("{}.{}", registration.from_type, registration.from_field_name);
        let info = ResolveInfo {
            from_type: &registration.from_type,
            field_name: &registration.from_field_name,
            type_name: &self.output_type,
            context: &context,
        };

        check_rule(
            registration.auth.as_ref(),
            &AuthRequest {
                field: &registration.from_field_name,
                field_key: &field_key,
                source: AuthSource::Parent(source),
                args: &args,
                context: &context,
                info: &info,
            },
        )?;

        if registration.one_to_one {
            args.first = Some(1);
            args.last = None;
        }

        for middleware in self.middlewares.iter() {
            middleware.before_resolve(&info, &mut args)?;
        }

        let mut connection = registration
            .resolve
            .resolve(SourceRequest {
                source,
                args: args.clone(),
                context: &context,
            })
            .await?;

        for middleware in self.middlewares.iter() {
            middleware.after_resolve(&info, &mut connection)?;
        }

        if registration.one_to_one {
            let args = Arc::new(args);
            return Ok(connection.edges.into_iter().next().map(|edge| {
                FieldValue::owned_any(EdgeSource {
                    edge,
                    args: args.clone(),
                })
            }));
        }

        Ok(Some(FieldValue::owned_any(ConnectionPayload {
            connection,
            args,
            source: source.cloned(),
        })))
    }
}

fn read_args(args: &ObjectAccessor<'_>) -> crate::Result<ConnectionArgs> {
    let invalid = |e: async_graphql::Error| ConnectionError::InvalidPaginationArgs(e.message);
    let int = |name: &str| match args.get(name) {
        Some(value) if !value.is_null() => value.i64().map(Some).map_err(invalid),
        _ => Ok(None),
    };
    let string = |name: &str| match args.get(name) {
        Some(value) if !value.is_null() => value
            .string()
            .map(|s| Some(s.to_string()))
            .map_err(invalid),
        _ => Ok(None),
    };

    let where_filter = match args.get("where") {
        Some(value) if !value.is_null() => match value.as_value().clone().into_json() {
            Ok(Value::Object(map)) => map,
            Ok(_) => serde_json::Map::new(),
            Err(e) => return Err(ConnectionError::InvalidPaginationArgs(e.to_string())),
        },
        _ => serde_json::Map::new(),
    };

    Ok(ConnectionArgs {
        first: int("first")?,
        last: int("last")?,
        after: string("after")?,
        before: string("before")?,
        where_filter,
    })
}

/// Parent value of edge-type fields
struct EdgeSource {
    edge: Edge<Value>,
    args: Arc<ConnectionArgs>,
}

/// Parent values that gated fields can be checked against
trait FieldSource: Any + Send + Sync {
    fn auth_source(&self) -> AuthSource<'_>;
    fn args(&self) -> &ConnectionArgs;
}

impl FieldSource for ConnectionPayload {
    fn auth_source(&self) -> AuthSource<'_> {
        AuthSource::Connection(self)
    }

    fn args(&self) -> &ConnectionArgs {
        &self.args
    }
}

impl FieldSource for EdgeSource {
    fn auth_source(&self) -> AuthSource<'_> {
        AuthSource::Edge(&self.edge)
    }

    fn args(&self) -> &ConnectionArgs {
        &self.args
    }
}

/// Owned output of a generated field
enum Resolved {
    PageInfo(PageInfo),
    Edges(Vec<EdgeSource>),
    Json(Value),
}

impl Resolved {
    fn into_field_value<'a>(self) -> async_graphql::Result<Option<FieldValue<'a>>> {
        match self {
            Resolved::PageInfo(page_info) => Ok(Some(FieldValue::owned_any(page_info))),
            Resolved::Edges(edges) => Ok(Some(FieldValue::list(
                edges.into_iter().map(FieldValue::owned_any),
            ))),
            Resolved::Json(value) => json_field_value(value),
        }
    }
}

/// Objects stay `serde_json::Value` parents, scalars become GraphQL values
fn json_field_value<'a>(value: Value) -> async_graphql::Result<Option<FieldValue<'a>>> {
    match value {
        Value::Null => Ok(None),
        Value::Object(_) => Ok(Some(FieldValue::owned_any(value))),
        Value::Array(items) => {
            let items = items
                .into_iter()
                .map(|item| Ok(json_field_value(item)?.unwrap_or(FieldValue::NULL)))
                .collect::<async_graphql::Result<Vec<_>>>()?;
            Ok(Some(FieldValue::list(items)))
        }
        scalar => Ok(Some(FieldValue::value(ConstValue::from_json(scalar)?))),
    }
}

struct GatedField<S> {
    name: String,
    parent_type: String,
    return_type: String,
    field_key: String,
    rule: Option<AuthRule>,
    resolve: Box<dyn Fn(&S, &AppContext) -> crate::Result<Resolved> + Send + Sync>,
}

/// A field of a generated type, checked against its auth rule before it
/// resolves
fn gated_field<S: FieldSource>(
    type_name: &str,
    name: &str,
    type_ref: TypeRef,
    rule: Option<AuthRule>,
    resolve: impl Fn(&S, &AppContext) -> crate::Result<Resolved> + Send + Sync + 'static,
) -> Field {
    let gated = Arc::new(GatedField {
        name: name.to_string(),
        parent_type: type_name.to_string(),
        return_type: type_ref.to_string(),
        field_key: format!("{type_name}.{name}"),
        rule,
        resolve: Box::new(resolve),
    });
    Field::new(name, type_ref, move |ctx| {
        let gated = gated.clone();
        FieldFuture::new(async move {
            let source = ctx.parent_value.try_downcast_ref::<S>()?;
            let context = ctx.data_opt::<AppContext>().cloned().unwrap_or_default();
            let info = ResolveInfo {
                from_type: &gated.parent_type,
                field_name: &gated.name,
                type_name: &gated.return_type,
                context: &context,
            };
            check_rule(
                gated.rule.as_ref(),
                &AuthRequest {
                    field: &gated.name,
                    field_key: &gated.field_key,
                    source: source.auth_source(),
                    args: source.args(),
                    context: &context,
                    info: &info,
                },
            )
            .map_err(|e| e.extend())?;
            (gated.resolve)(source, &context)
                .map_err(|e| e.extend())?
                .into_field_value()
        })
    })
}

fn describe(field: Field, description: &Option<String>) -> Field {
    match description {
        Some(description) => field.description(description.as_str()),
        None => field,
    }
}

fn connection_object_fields(registration: &ConnectionRegistration, edge_type: &str) -> Vec<Field> {
    let type_name = registration.connection_type_name();
    let rule = |field: &str| registration.field_auth.get(field).cloned();

    let mut fields = vec![
        gated_field(
            &type_name,
            "pageInfo",
            TypeRef::named_nn(PAGE_INFO),
            rule("pageInfo"),
            |payload: &ConnectionPayload, _| {
                Ok(Resolved::PageInfo(payload.connection.page_info.clone()))
            },
        )
        .description("Information about pagination in a connection."),
        gated_field(
            &type_name,
            "edges",
            TypeRef::named_list(edge_type),
            rule("edges"),
            |payload: &ConnectionPayload, _| {
                let args = Arc::new(payload.args.clone());
                Ok(Resolved::Edges(
                    payload
                        .connection
                        .edges
                        .iter()
                        .map(|edge| EdgeSource {
                            edge: edge.clone(),
                            args: args.clone(),
                        })
                        .collect(),
                ))
            },
        )
        .description("Edges for the connection"),
        gated_field(
            &type_name,
            "nodes",
            TypeRef::named_list(registration.to_type.as_str()),
            rule("nodes"),
            |payload: &ConnectionPayload, _| {
                Ok(Resolved::Json(Value::Array(
                    payload.connection.nodes().into_iter().cloned().collect(),
                )))
            },
        )
        .description("The nodes of the connection, without the edges"),
    ];

    for extra in &registration.connection_fields {
        let resolve = extra.resolve.clone();
        let field = gated_field(
            &type_name,
            &extra.name,
            extra.type_ref.clone(),
            extra.auth.clone().or_else(|| rule(&extra.name)),
            move |payload: &ConnectionPayload, context| {
                resolve(payload, context).map(Resolved::Json)
            },
        );
        fields.push(describe(field, &extra.description));
    }
    fields
}

/// Fields of the edge type, or of the one-to-one type when there is no list
fn edge_object_fields(registration: &ConnectionRegistration) -> Vec<Field> {
    let type_name = registration.output_type_name();
    let type_name = if registration.one_to_one {
        type_name
    } else {
        registration.edge_type_name()
    };
    let rule = |field: &str| registration.field_auth.get(field).cloned();

    let mut fields = Vec::new();
    if !registration.one_to_one {
        fields.push(
            gated_field(
                &type_name,
                "cursor",
                TypeRef::named(TypeRef::STRING),
                rule("cursor"),
                |source: &EdgeSource, _| {
                    Ok(Resolved::Json(Value::String(source.edge.cursor.clone())))
                },
            )
            .description("A cursor for use in pagination"),
        );
    }
    fields.push(
        gated_field(
            &type_name,
            "node",
            TypeRef::named(registration.to_type.as_str()),
            rule("node"),
            |source: &EdgeSource, _| Ok(Resolved::Json(source.edge.node.clone())),
        )
        .description("The item at the end of the edge"),
    );

    for extra in &registration.edge_fields {
        let resolve = extra.resolve.clone();
        let field = gated_field(
            &type_name,
            &extra.name,
            extra.type_ref.clone(),
            extra.auth.clone().or_else(|| rule(&extra.name)),
            move |source: &EdgeSource, context| resolve(&source.edge, context).map(Resolved::Json),
        );
        fields.push(describe(field, &extra.description));
    }
    fields
}

fn page_info_object() -> Object {
    Object::new(PAGE_INFO)
        .description("Information about pagination in a connection.")
        .field(Field::new(
            "hasNextPage",
            TypeRef::named_nn(TypeRef::BOOLEAN),
            resolve_has_next_page,
        ))
        .field(Field::new(
            "hasPreviousPage",
            TypeRef::named_nn(TypeRef::BOOLEAN),
            resolve_has_previous_page,
        ))
        .field(Field::new(
            "startCursor",
            TypeRef::named(TypeRef::STRING),
            resolve_start_cursor,
        ))
        .field(Field::new(
            "endCursor",
            TypeRef::named(TypeRef::STRING),
            resolve_end_cursor,
        ))
}

fn resolve_has_next_page(ctx: ResolverContext) -> FieldFuture {
    FieldFuture::new(async move {
        let parent = ctx.parent_value.try_downcast_ref::<PageInfo>()?;
        Ok(Some(FieldValue::value(parent.has_next_page)))
    })
}

fn resolve_has_previous_page(ctx: ResolverContext) -> FieldFuture {
    FieldFuture::new(async move {
        let parent = ctx.parent_value.try_downcast_ref::<PageInfo>()?;
        Ok(Some(FieldValue::value(parent.has_previous_page)))
    })
}

fn resolve_start_cursor(ctx: ResolverContext) -> FieldFuture {
    FieldFuture::new(async move {
        let parent = ctx.parent_value.try_downcast_ref::<PageInfo>()?;
        Ok(parent.start_cursor.clone().map(FieldValue::value))
    })
}

fn resolve_end_cursor(ctx: ResolverContext) -> FieldFuture {
    FieldFuture::new(async move {
        let parent = ctx.parent_value.try_downcast_ref::<PageInfo>()?;
        Ok(parent.end_cursor.clone().map(FieldValue::value))
    })
}

/// Object type whose fields read keys of a `serde_json::Value` parent
///
/// Connection nodes are JSON values, so node types are usually built with
/// this.
pub fn json_object(name: impl Into<String>, fields: &[(&str, TypeRef)]) -> Object {
    fields
        .iter()
        .fold(Object::new(name.into()), |object, (field_name, type_ref)| {
            let key = field_name.to_string();
            object.field(Field::new(*field_name, type_ref.clone(), move |ctx| {
                let key = key.clone();
                FieldFuture::new(async move {
                    let parent = ctx.parent_value.try_downcast_ref::<Value>()?;
                    json_field_value(parent.get(&key).cloned().unwrap_or(Value::Null))
                })
            }))
        })
}

/// A built schema with its connection fields bound
#[derive(Clone)]
pub struct ConnectionSchema {
    schema: Schema,
    diagnostics: Arc<Vec<Diagnostic>>,
    bound: Arc<HashSet<(String, String)>>,
}

impl ConnectionSchema {
    /// Execute a request against a per-request context
    pub async fn execute(&self, request: impl Into<Request>, context: AppContext) -> Response {
        let request = request.into().data(context);
        let mut response = self.schema.execute(request).await;
        if !self.diagnostics.is_empty() {
            if let Ok(debug) =
                serde_json::to_value(self.diagnostics.as_ref()).and_then(ConstValue::from_json)
            {
                response.extensions.insert("debug".to_string(), debug);
            }
        }
        response
    }

    pub fn sdl(&self) -> String {
        self.schema.sdl()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn is_bound(&self, from_type: &str, field_name: &str) -> bool {
        self.bound
            .contains(&(from_type.to_string(), field_name.to_string()))
    }

    pub fn connection_state(&self, from_type: &str, field_name: &str) -> ConnectionState {
        if self.is_bound(from_type, field_name) {
            ConnectionState::Bound
        } else {
            ConnectionState::Unregistered
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ArrayBackend;
    use crate::resolver::ConnectionResolver;
    use async_graphql::PathSegment;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    fn test_objects() -> ConnectionResolver<ArrayBackend<Value>> {
        ConnectionResolver::new(ArrayBackend::new(vec![
            json!({"id": 1, "name": "one"}),
            json!({"id": 2, "name": "two"}),
            json!({"id": 3, "name": "three"}),
        ]))
    }

    fn test_object_type() -> Object {
        json_object(
            "TestObject",
            &[
                ("id", TypeRef::named_nn(TypeRef::INT)),
                ("name", TypeRef::named(TypeRef::STRING)),
            ],
        )
    }

    fn builder() -> SchemaBuilder {
        SchemaBuilder::new().register_object(test_object_type())
    }

    fn test_connection() -> ConnectionRegistration {
        ConnectionRegistration::new("RootQuery", "TestObject", "testConnection", test_objects())
    }

    async fn run(schema: &ConnectionSchema, query: &str) -> Response {
        schema.execute(query, AppContext::new()).await
    }

    fn data(response: &Response) -> Value {
        response.data.clone().into_json().unwrap()
    }

    #[tokio::test]
    async fn test_resolves_nodes_and_edges() {
        let schema = builder()
            .register_connection(test_connection())
            .unwrap()
            .finish()
            .unwrap();
        assert!(schema.is_bound("RootQuery", "testConnection"));

        let response = run(
            &schema,
            concat!(
                "{ testConnection(first: 2) { nodes { id name } edges { cursor node { id } } ",
                "pageInfo { hasNextPage hasPreviousPage endCursor } } }",
            ),
        )
        .await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        let data = data(&response);
        assert_eq!(
            data["testConnection"]["nodes"],
            json!([{"id": 1, "name": "one"}, {"id": 2, "name": "two"}])
        );
        assert_eq!(data["testConnection"]["edges"][1]["node"]["id"], json!(2));
        assert_eq!(
            data["testConnection"]["pageInfo"]["endCursor"],
            data["testConnection"]["edges"][1]["cursor"]
        );
        assert_eq!(data["testConnection"]["pageInfo"]["hasNextPage"], json!(true));
        assert_eq!(data["testConnection"]["pageInfo"]["hasPreviousPage"], json!(false));
    }

    #[tokio::test]
    async fn test_conflicting_type_is_merged_with_diagnostic() {
        let conflicting = Object::new("RootQueryToTestObjectConnection").field(Field::new(
            "preRegistered",
            TypeRef::named(TypeRef::STRING),
            |_| FieldFuture::new(async { Ok(Some(FieldValue::value("yes"))) }),
        ));
        let schema = builder()
            .register_object(conflicting)
            .register_connection(test_connection())
            .unwrap()
            .finish()
            .unwrap();

        let response = run(
            &schema,
            "{ testConnection { nodes { id } edges { node { name } } } }",
        )
        .await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        let data = data(&response);
        assert_eq!(data["testConnection"]["nodes"].as_array().unwrap().len(), 3);
        assert_eq!(data["testConnection"]["edges"].as_array().unwrap().len(), 3);

        let debug = response.extensions.get("debug").unwrap().clone().into_json().unwrap();
        assert_eq!(debug[0]["type"], json!("DUPLICATE_TYPE"));
        assert!(debug[0]["message"]
            .as_str()
            .unwrap()
            .contains("RootQueryToTestObjectConnection"));
    }

    #[tokio::test]
    async fn test_auth_gate_nulls_field_with_error() {
        let gated = test_connection().auth(
            AuthRule::new(|req: &AuthRequest<'_>| req.args.first.is_some_and(|n| n > 0))
                .with_message("first is required"),
        );
        let schema = builder()
            .register_connection(gated)
            .unwrap()
            .finish()
            .unwrap();

        let response = run(&schema, "{ testConnection { nodes { id } } }").await;
        assert_eq!(data(&response), json!({"testConnection": null}));
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].message, "first is required");
        assert_eq!(
            response.errors[0].path,
            vec![PathSegment::Field("testConnection".to_string())]
        );

        let response = run(&schema, "{ testConnection(first: 1) { nodes { id } } }").await;
        assert!(response.errors.is_empty());
        assert_eq!(data(&response)["testConnection"]["nodes"], json!([{"id": 1}]));
    }

    #[tokio::test]
    async fn test_invalid_args_do_not_affect_siblings() {
        let other = ConnectionRegistration::new(
            "RootQuery",
            "TestObject",
            "otherConnection",
            test_objects(),
        )
        .type_name("OtherTestObjectConnection");
        let schema = builder()
            .register_connection(test_connection())
            .unwrap()
            .register_connection(other)
            .unwrap()
            .finish()
            .unwrap();
        assert!(schema.sdl().contains("OtherTestObjectConnection"));
        assert!(schema.sdl().contains("OtherTestObjectConnectionEdge"));

        let response = run(
            &schema,
            concat!(
                "{ testConnection(first: 1, last: 1) { nodes { id } } ",
                "otherConnection(first: 1) { nodes { id } } }",
            ),
        )
        .await;
        let data = data(&response);
        assert_eq!(data["testConnection"], Value::Null);
        assert_eq!(data["otherConnection"]["nodes"], json!([{"id": 1}]));

        let error = serde_json::to_value(&response.errors[0]).unwrap();
        assert_eq!(error["extensions"]["code"], json!("INVALID_PAGINATION_ARGS"));
    }

    #[tokio::test]
    async fn test_connection_and_edge_fields() {
        let registration = test_connection()
            .connection_field(ExtraField::new(
                "count",
                TypeRef::named(TypeRef::INT),
                |payload: &ConnectionPayload, _: &AppContext| {
                    Ok(json!(payload.connection.edges.len()))
                },
            ))
            .edge_field(ExtraField::new(
                "upperName",
                TypeRef::named(TypeRef::STRING),
                |edge: &Edge<Value>, _: &AppContext| {
                    Ok(json!(edge.node["name"].as_str().map(str::to_uppercase)))
                },
            ));
        let schema = builder()
            .register_connection(registration)
            .unwrap()
            .finish()
            .unwrap();

        let response = run(
            &schema,
            "{ testConnection(first: 2) { count edges { upperName node { name } } } }",
        )
        .await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        assert_eq!(
            data(&response),
            json!({"testConnection": {
                "count": 2,
                "edges": [
                    {"upperName": "ONE", "node": {"name": "one"}},
                    {"upperName": "TWO", "node": {"name": "two"}}
                ]
            }})
        );
    }

    #[tokio::test]
    async fn test_field_auth_only_nulls_that_field() {
        let registration = test_connection().field_auth(
            "nodes",
            AuthRule::new(|_: &AuthRequest<'_>| false).with_message("nodes hidden"),
        );
        let schema = builder()
            .register_connection(registration)
            .unwrap()
            .finish()
            .unwrap();

        let response = run(
            &schema,
            "{ testConnection(first: 1) { nodes { id } edges { node { id } } } }",
        )
        .await;
        let data = data(&response);
        assert_eq!(data["testConnection"]["nodes"], Value::Null);
        assert_eq!(data["testConnection"]["edges"][0]["node"]["id"], json!(1));
        assert_eq!(response.errors[0].message, "nodes hidden");
        assert_eq!(
            response.errors[0].path,
            vec![
                PathSegment::Field("testConnection".to_string()),
                PathSegment::Field("nodes".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_auth_callbacks_see_resolve_info() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let record = |seen: Arc<Mutex<Vec<String>>>| {
            AuthRule::new(move |req: &AuthRequest<'_>| {
                let info = req.info;
                seen.lock().unwrap().push(format!(
                    "{}.{}: {}",
                    info.from_type, info.field_name, info.type_name
                ));
                true
            })
        };
        let registration = test_connection()
            .auth(record(seen.clone()))
            .field_auth("cursor", record(seen.clone()));
        let schema = builder()
            .register_connection(registration)
            .unwrap()
            .finish()
            .unwrap();

        let response = run(&schema, "{ testConnection(first: 1) { edges { cursor } } }").await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                "RootQuery.testConnection: RootQueryToTestObjectConnection".to_string(),
                "RootQueryToTestObjectConnectionEdge.cursor: String".to_string(),
            ]
        );
    }

    #[test]
    fn test_edges_and_cursor_are_nullable() {
        let schema = builder()
            .register_connection(test_connection())
            .unwrap()
            .finish()
            .unwrap();
        let sdl = schema.sdl();
        assert!(sdl.contains("edges: [RootQueryToTestObjectConnectionEdge]\n"));
        assert!(sdl.contains("cursor: String\n"));
        assert!(!sdl.contains("cursor: String!"));
    }

    #[tokio::test]
    async fn test_one_to_one() {
        let registration = ConnectionRegistration::new(
            "RootQuery",
            "TestObject",
            "firstTestObject",
            test_objects(),
        )
        .one_to_one();
        let schema = builder()
            .register_connection(registration)
            .unwrap()
            .finish()
            .unwrap();
        assert!(schema.sdl().contains("RootQueryToTestObjectConnectionEdge"));

        let response = run(&schema, "{ firstTestObject { node { id name } } }").await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        assert_eq!(
            data(&response),
            json!({"firstTestObject": {"node": {"id": 1, "name": "one"}}})
        );
    }

    #[tokio::test]
    async fn test_where_argument_filters() {
        let registration = test_connection()
            .connection_arg(ConnectionArg::new("name", TypeRef::named(TypeRef::STRING)));
        let schema = builder()
            .register_connection(registration)
            .unwrap()
            .finish()
            .unwrap();
        assert!(schema.sdl().contains("RootQueryToTestObjectConnectionWhereArgs"));

        let response = run(
            &schema,
            r#"{ testConnection(where: {name: "two"}) { nodes { id } } }"#,
        )
        .await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        assert_eq!(data(&response)["testConnection"]["nodes"], json!([{"id": 2}]));
    }

    struct Recording {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl ConnectionMiddleware for Recording {
        fn before_resolve(
            &self,
            info: &ResolveInfo<'_>,
            args: &mut ConnectionArgs,
        ) -> crate::Result<()> {
            self.log
                .lock()
                .unwrap()
                .push(format!("before:{}:{}", self.name, info.field_name));
            args.first.get_or_insert(1);
            Ok(())
        }

        fn after_resolve(
            &self,
            _info: &ResolveInfo<'_>,
            connection: &mut Connection<Value>,
        ) -> crate::Result<()> {
            self.log.lock().unwrap().push(format!("after:{}", self.name));
            connection.page_info.has_next_page = false;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_middleware_runs_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let schema = builder()
            .middleware(Recording {
                name: "a",
                log: log.clone(),
            })
            .middleware(Recording {
                name: "b",
                log: log.clone(),
            })
            .register_connection(test_connection())
            .unwrap()
            .finish()
            .unwrap();

        let query = "{ testConnection { nodes { id } pageInfo { hasNextPage } } }";
        let response = run(&schema, query).await;
        assert_eq!(
            data(&response)["testConnection"],
            json!({"nodes": [{"id": 1}], "pageInfo": {"hasNextPage": false}})
        );
        assert_eq!(
            *log.lock().unwrap(),
            vec!["before:a:testConnection", "before:b:testConnection", "after:a", "after:b"]
        );
    }

    #[tokio::test]
    async fn test_reregistration_merges() {
        let first = test_connection().connection_field(ExtraField::new(
            "count",
            TypeRef::named(TypeRef::INT),
            |payload: &ConnectionPayload, _: &AppContext| Ok(json!(payload.connection.edges.len())),
        ));
        let second = test_connection().connection_field(ExtraField::new(
            "label",
            TypeRef::named(TypeRef::STRING),
            |_: &ConnectionPayload, _: &AppContext| Ok(json!("merged")),
        ));
        let builder = builder().register_connection(first).unwrap();
        assert_eq!(
            builder.connection_state("RootQuery", "testConnection"),
            ConnectionState::Registered
        );
        let schema = builder.register_connection(second).unwrap().finish().unwrap();
        assert_eq!(
            schema.connection_state("RootQuery", "testConnection"),
            ConnectionState::Bound
        );
        assert!(schema.diagnostics().is_empty());

        let response = run(&schema, "{ testConnection(first: 1) { count label } }").await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        assert_eq!(
            data(&response),
            json!({"testConnection": {"count": 1, "label": "merged"}})
        );
    }

    struct CountingSource;

    #[async_trait]
    impl ConnectionSource for CountingSource {
        async fn resolve(&self, request: SourceRequest<'_>) -> crate::Result<Connection<Value>> {
            let calls = request.context.get("test", "calls", json!(0));
            request
                .context
                .set("test", "calls", json!(calls.as_i64().unwrap_or(0) + 1));
            Ok(Connection::empty())
        }
    }

    #[tokio::test]
    async fn test_context_is_per_request() {
        let schema = builder()
            .register_connection(ConnectionRegistration::new(
                "RootQuery",
                "TestObject",
                "counted",
                CountingSource,
            ))
            .unwrap()
            .finish()
            .unwrap();

        for _ in 0..2 {
            let context = AppContext::new();
            let response = schema
                .execute(
                    "{ a: counted { nodes { id } } b: counted { nodes { id } } }",
                    context.clone(),
                )
                .await;
            assert!(response.errors.is_empty(), "{:?}", response.errors);
            assert_eq!(context.get("test", "calls", Value::Null), json!(2));
        }
    }

    #[test]
    fn test_unknown_from_type_is_rejected() {
        let registration =
            ConnectionRegistration::new("Missing", "TestObject", "things", test_objects());
        let err = builder()
            .register_connection(registration)
            .unwrap()
            .finish()
            .err()
            .unwrap();
        assert_eq!(err.code(), "INVALID_REGISTRATION");
    }

    #[test]
    fn test_invalid_names_are_rejected() {
        let registration =
            ConnectionRegistration::new("RootQuery", "TestObject", "bad-name", test_objects());
        let err = builder().register_connection(registration).err().unwrap();
        assert_eq!(err.code(), "INVALID_REGISTRATION");
    }

    #[test]
    fn test_type_names() {
        let registration = ConnectionRegistration::new("user", "post", "posts", test_objects());
        assert_eq!(registration.connection_type_name(), "UserToPostConnection");
        assert_eq!(registration.edge_type_name(), "UserToPostConnectionEdge");
        assert_eq!(registration.where_type_name(), "UserToPostConnectionWhereArgs");
        assert_eq!(
            registration.clone().one_to_one().output_type_name(),
            "UserToPostConnectionEdge"
        );
        assert_eq!(
            registration.type_name("Feed").output_type_name(),
            "Feed"
        );
    }
}
