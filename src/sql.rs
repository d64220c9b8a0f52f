//! SQL rendering of slice plans
//!
//! Produces a `WHERE` / `ORDER BY` / `LIMIT` fragment with `?` placeholders
//! for SQL-backed connection backends. Keyset boundaries over `(c1, .., cn)`
//! expand to `(c1 op v1) OR (c1 = v1 AND c2 op v2) OR ...`.
//!
//! Identifier quoting and value-type coercion depend on the target database,
//! so rendering takes a [`SqlDialect`].

use crate::planner::{Boundary, SlicePlan};
use crate::threshold::{as_datetime, CompareOperator, SortDirection, ThresholdField, ThresholdType};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Database the fragment is rendered for. Both use `?` placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    /// `"ident"` quoting. Dates and times are compared as normalized ISO
    /// strings through `date()`, `datetime()` and `time()`.
    Sqlite,
    /// `` `ident` `` quoting and `CAST(.. AS SIGNED/DATE/..)` coercion
    MySql,
}

impl SqlDialect {
    fn quote(self, name: &str) -> String {
        match self {
            Self::Sqlite => format!("\"{name}\""),
            Self::MySql => format!("`{name}`"),
        }
    }

    /// Column expression coerced to `value_type`
    fn coerce(self, column: String, value_type: ThresholdType) -> String {
        match (self, value_type) {
            (_, ThresholdType::Char) => column,
            (
                Self::Sqlite,
                ThresholdType::Numeric | ThresholdType::Signed | ThresholdType::Unsigned,
            ) => format!("CAST({column} AS INTEGER)"),
            (Self::Sqlite, ThresholdType::Decimal) => format!("CAST({column} AS REAL)"),
            (Self::Sqlite, ThresholdType::Binary) => format!("CAST({column} AS BLOB)"),
            (Self::Sqlite, ThresholdType::Date) => format!("date({column})"),
            (Self::Sqlite, ThresholdType::Datetime) => format!("datetime({column})"),
            (Self::Sqlite, ThresholdType::Time) => format!("time({column})"),
            (Self::MySql, ThresholdType::Numeric | ThresholdType::Signed) => {
                format!("CAST({column} AS SIGNED)")
            }
            (Self::MySql, ThresholdType::Unsigned) => format!("CAST({column} AS UNSIGNED)"),
            (Self::MySql, ThresholdType::Decimal) => format!("CAST({column} AS DECIMAL(65, 30))"),
            (Self::MySql, ThresholdType::Binary) => format!("CAST({column} AS BINARY)"),
            (Self::MySql, ThresholdType::Date) => format!("CAST({column} AS DATE)"),
            (Self::MySql, ThresholdType::Datetime) => format!("CAST({column} AS DATETIME)"),
            (Self::MySql, ThresholdType::Time) => format!("CAST({column} AS TIME)"),
        }
    }
}

/// A rendered query fragment and its bind parameters, in placeholder order
#[derive(Debug, Clone, PartialEq)]
pub struct SqlSlice {
    /// Conditions joined with `AND`, `None` when unfiltered
    pub where_clause: Option<String>,
    pub order_by: String,
    pub limit: usize,
    pub params: Vec<Value>,
}

impl SqlSlice {
    pub fn render(plan: &SlicePlan, dialect: SqlDialect) -> crate::Result<Self> {
        let renderer = Renderer { dialect };
        let mut conditions = Vec::new();
        let mut params = Vec::new();

        for (key, value) in &plan.where_filter {
            let column = renderer.identifier(key)?;
            match value {
                Value::Null => {}
                Value::Array(options) if options.is_empty() => {
                    conditions.push("1 = 0".to_string())
                }
                Value::Array(options) => {
                    let placeholders = vec!["?"; options.len()].join(", ");
                    conditions.push(format!("{column} IN ({placeholders})"));
                    params.extend(options.iter().cloned());
                }
                other => {
                    conditions.push(format!("{column} = ?"));
                    params.push(other.clone());
                }
            }
        }

        for predicate in &plan.predicates {
            conditions.push(renderer.comparison(
                predicate,
                predicate.compare_operator,
                &mut params,
            )?);
        }

        for boundary in [&plan.after, &plan.before].into_iter().flatten() {
            conditions.push(renderer.keyset(boundary, &mut params)?);
        }

        let order_by = plan
            .fetch_order()
            .iter()
            .map(|o| {
                let column = renderer.column(&o.key, o.value_type)?;
                let direction = match o.direction {
                    SortDirection::Asc => "ASC",
                    SortDirection::Desc => "DESC",
                };
                Ok(format!("{column} {direction}"))
            })
            .collect::<crate::Result<Vec<_>>>()?
            .join(", ");

        Ok(Self {
            where_clause: (!conditions.is_empty()).then(|| conditions.join(" AND ")),
            order_by,
            limit: plan.limit,
            params,
        })
    }

    /// `WHERE .. ORDER BY .. LIMIT ..` suffix for a `SELECT`
    pub fn to_sql(&self) -> String {
        let mut sql = String::new();
        if let Some(where_clause) = &self.where_clause {
            sql.push_str("WHERE ");
            sql.push_str(where_clause);
            sql.push(' ');
        }
        sql.push_str(&format!("ORDER BY {} LIMIT {}", self.order_by, self.limit));
        sql
    }
}

struct Renderer {
    dialect: SqlDialect,
}

impl Renderer {
    fn keyset(&self, boundary: &Boundary, params: &mut Vec<Value>) -> crate::Result<String> {
        let mut branches = Vec::new();
        for (i, threshold) in boundary.thresholds.iter().enumerate() {
            let mut parts = Vec::new();
            for equal in &boundary.thresholds[..i] {
                parts.push(self.comparison(equal, CompareOperator::Eq, params)?);
            }
            parts.push(self.comparison(threshold, threshold.compare_operator, params)?);
            branches.push(format!("({})", parts.join(" AND ")));
        }
        Ok(format!("({})", branches.join(" OR ")))
    }

    fn comparison(
        &self,
        field: &ThresholdField,
        operator: CompareOperator,
        params: &mut Vec<Value>,
    ) -> crate::Result<String> {
        let column = self.column(&field.key, field.value_type)?;
        if field.value.is_null() {
            return Ok(match operator {
                CompareOperator::Eq => format!("{column} IS NULL"),
                CompareOperator::Ne | CompareOperator::Gt => format!("{column} IS NOT NULL"),
                CompareOperator::Gte => "1 = 1".to_string(),
                CompareOperator::Lt => "1 = 0".to_string(),
                CompareOperator::Lte => format!("{column} IS NULL"),
            });
        }
        params.push(bind_value(&field.value, field.value_type));
        Ok(format!("{column} {} ?", operator.as_sql()))
    }

    fn column(&self, key: &str, value_type: ThresholdType) -> crate::Result<String> {
        let column = self.identifier(key)?;
        Ok(self.dialect.coerce(column, value_type))
    }

    /// Validate `[a-zA-Z_][a-zA-Z0-9_.]*` and quote each dotted part
    fn identifier(&self, name: &str) -> crate::Result<String> {
        let mut chars = name.chars();
        let valid = chars
            .next()
            .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
            && !name.split('.').any(str::is_empty);
        if !valid {
            return Err(crate::ConnectionError::InvalidColumnName(name.to_string()));
        }
        Ok(name
            .split('.')
            .map(|part| self.dialect.quote(part))
            .collect::<Vec<_>>()
            .join("."))
    }
}

/// Dates are bound in the same ISO form the column expression produces
fn bind_value(value: &Value, value_type: ThresholdType) -> Value {
    let format = match value_type {
        ThresholdType::Date => "%Y-%m-%d",
        ThresholdType::Datetime => "%Y-%m-%d %H:%M:%S",
        _ => return value.clone(),
    };
    as_datetime(value)
        .map(|dt| Value::String(dt.format(format).to_string()))
        .unwrap_or_else(|| value.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::ConnectionArgs;
    use crate::backend::ArrayBackend;
    use crate::config::PaginationConfig;
    use crate::cursor::{CursorCodec, PositionKey};
    use crate::planner::SlicePlanner;
    use crate::threshold::OrderBy;
    use serde_json::json;

    async fn plan(planner: SlicePlanner, args: ConnectionArgs) -> SlicePlan {
        let backend = ArrayBackend::new(vec![
            json!({"id": 7, "slug": "letter-g", "post_date": "2024-03-01T12:00:00Z"}),
        ]);
        let args = args.validate(&PaginationConfig::default()).unwrap();
        planner.plan(args, &backend).await.unwrap()
    }

    #[tokio::test]
    async fn test_plain_forward_page() {
        let plan = plan(SlicePlanner::new(), ConnectionArgs::forward(10, None)).await;

        let slice = SqlSlice::render(&plan, SqlDialect::Sqlite).unwrap();
        assert_eq!(slice.to_sql(), r#"ORDER BY CAST("id" AS INTEGER) ASC LIMIT 11"#);
        assert!(slice.params.is_empty());

        let slice = SqlSlice::render(&plan, SqlDialect::MySql).unwrap();
        assert_eq!(slice.to_sql(), "ORDER BY CAST(`id` AS SIGNED) ASC LIMIT 11");
    }

    #[tokio::test]
    async fn test_keyset_after_cursor() {
        let planner = SlicePlanner::new()
            .order_by(OrderBy::desc("slug", ThresholdType::Char))
            .tie_breaker("term_id", ThresholdType::Numeric);
        let cursor = CursorCodec::encode(&PositionKey::from(7));
        let plan = plan(planner, ConnectionArgs::forward(5, Some(cursor))).await;
        // entity lookup resolves through the json `id`, so the slug is found
        let slice = SqlSlice::render(&plan, SqlDialect::MySql).unwrap();
        assert_eq!(
            slice.where_clause.as_deref(),
            Some("((`slug` < ?) OR (`slug` = ? AND CAST(`term_id` AS SIGNED) > ?))")
        );
        assert_eq!(slice.params, vec![json!("letter-g"), json!("letter-g"), json!(7)]);
        assert_eq!(slice.order_by, "`slug` DESC, CAST(`term_id` AS SIGNED) ASC");
    }

    #[tokio::test]
    async fn test_date_keyset_compares_iso_strings_on_sqlite() {
        let planner = SlicePlanner::new().order_by(OrderBy::desc("post_date", ThresholdType::Date));
        let cursor = CursorCodec::encode(&PositionKey::from(7));
        let plan = plan(planner, ConnectionArgs::forward(5, Some(cursor))).await;

        let slice = SqlSlice::render(&plan, SqlDialect::Sqlite).unwrap();
        assert_eq!(
            slice.where_clause.as_deref(),
            Some(concat!(
                r#"((date("post_date") < ?) OR "#,
                r#"(date("post_date") = ? AND CAST("id" AS INTEGER) > ?))"#
            ))
        );
        assert_eq!(
            slice.params,
            vec![json!("2024-03-01"), json!("2024-03-01"), json!(7)]
        );
        assert_eq!(
            slice.order_by,
            r#"date("post_date") DESC, CAST("id" AS INTEGER) ASC"#
        );
        assert!(!slice.to_sql().contains("AS DATE"));

        let slice = SqlSlice::render(&plan, SqlDialect::MySql).unwrap();
        assert!(slice
            .where_clause
            .unwrap()
            .starts_with("((CAST(`post_date` AS DATE) < ?)"));
    }

    #[tokio::test]
    async fn test_backward_with_where() {
        let args = ConnectionArgs::backward(3, None)
            .with_where("id", json!([1, 2]))
            .with_where("status", json!("active"));
        let plan = plan(SlicePlanner::new(), args).await;
        let slice = SqlSlice::render(&plan, SqlDialect::Sqlite).unwrap();
        assert_eq!(
            slice.to_sql(),
            r#"WHERE "id" IN (?, ?) AND "status" = ? ORDER BY CAST("id" AS INTEGER) DESC LIMIT 4"#
        );
        assert_eq!(slice.params, vec![json!(1), json!(2), json!("active")]);
    }

    #[tokio::test]
    async fn test_datetime_predicate_is_normalised() {
        let planner = SlicePlanner::new().threshold(ThresholdField::new(
            "post_date",
            json!("2024-03-01T12:00:00Z"),
            ThresholdType::Datetime,
            CompareOperator::Gte,
        ));
        let plan = plan(planner, ConnectionArgs::forward(1, None)).await;
        let slice = SqlSlice::render(&plan, SqlDialect::Sqlite).unwrap();
        assert_eq!(slice.params, vec![json!("2024-03-01 12:00:00")]);
        assert_eq!(
            slice.where_clause.as_deref(),
            Some(r#"datetime("post_date") >= ?"#)
        );
    }

    #[tokio::test]
    async fn test_qualified_columns_quote_each_part() {
        let args = ConnectionArgs::forward(1, None).with_where("posts.status", json!("publish"));
        let plan = plan(SlicePlanner::new(), args).await;
        let slice = SqlSlice::render(&plan, SqlDialect::MySql).unwrap();
        assert_eq!(slice.where_clause.as_deref(), Some("`posts`.`status` = ?"));
    }

    #[tokio::test]
    async fn test_rejects_unsafe_columns() {
        for column in ["id; DROP TABLE", "posts..id", "`id`"] {
            let args = ConnectionArgs::forward(1, None).with_where(column, json!(1));
            let plan = plan(SlicePlanner::new(), args).await;
            let err = SqlSlice::render(&plan, SqlDialect::Sqlite).unwrap_err();
            assert_eq!(err.code(), "INVALID_COLUMN_NAME");
        }
    }
}
