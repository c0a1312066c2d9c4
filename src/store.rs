// Relational store access
// A parameterized SELECT builder with filters, sorting and pagination, shared by
// every repository. Table and column names only ever come from `TableSpec`
// constants and repository code; caller values are always bound.

use chrono::{DateTime, Utc};
use sqlx::query::{QueryAs, QueryScalar};
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Executor, FromRow, Sqlite};

use crate::db::KEY_COLLATION;
use crate::error::RepoResult;
use crate::pagination::PageWindow;

/// Static description of a table as the repositories see it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSpec {
    pub table: &'static str,
    pub id_column: &'static str,
    /// Comma-separated projection matching the row struct's `FromRow`
    pub columns: &'static str,
}

/// A bound parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Int(i64),
    Real(f64),
    Text(String),
    Bool(bool),
    Timestamp(DateTime<Utc>),
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Int(i64::from(value))
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Real(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(value: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(value)
    }
}

/// SELECT builder for one table
///
/// Builds `SELECT <columns> FROM <table> [WHERE ...] [ORDER BY ...] [LIMIT/OFFSET]`
/// and the matching `SELECT COUNT(*)` over the same predicate.
#[derive(Debug, Clone)]
pub struct SelectBuilder {
    spec: TableSpec,
    where_clauses: Vec<String>,
    params: Vec<SqlValue>,
    order_clause: Option<&'static str>,
    window: Option<PageWindow>,
}

impl SelectBuilder {
    pub fn new(spec: TableSpec) -> Self {
        Self {
            spec,
            where_clauses: Vec::new(),
            params: Vec::new(),
            order_clause: None,
            window: None,
        }
    }

    /// `column = value`
    pub fn eq(mut self, column: &'static str, value: impl Into<SqlValue>) -> Self {
        self.where_clauses.push(format!("{column} = ?"));
        self.params.push(value.into());
        self
    }

    /// Trimmed, case-insensitive text equality under the key collation
    pub fn eq_ignore_case(mut self, column: &'static str, value: &str) -> Self {
        self.where_clauses
            .push(format!("{column} = ? COLLATE {KEY_COLLATION}"));
        self.params.push(SqlValue::Text(value.to_string()));
        self
    }

    /// Float equality within a tolerance (REAL columns)
    pub fn approx_eq(mut self, column: &'static str, value: f64) -> Self {
        self.where_clauses.push(format!("ABS({column} - ?) < 0.000001"));
        self.params.push(SqlValue::Real(value));
        self
    }

    /// Inclusive range; either bound may be absent
    pub fn between(
        mut self,
        column: &'static str,
        from: Option<SqlValue>,
        to: Option<SqlValue>,
    ) -> Self {
        if let Some(from) = from {
            self.where_clauses.push(format!("{column} >= ?"));
            self.params.push(from);
        }
        if let Some(to) = to {
            self.where_clauses.push(format!("{column} <= ?"));
            self.params.push(to);
        }
        self
    }

    /// Fixed predicate with no bound values, e.g. `(a = 1 OR b = 1)`
    pub fn filter(mut self, predicate: &'static str) -> Self {
        self.where_clauses.push(predicate.to_string());
        self
    }

    /// Excludes the row with the given primary key (used by update-time uniqueness checks)
    pub fn exclude_id(mut self, id: Option<i64>) -> Self {
        if let Some(id) = id {
            self.where_clauses.push(format!("{} <> ?", self.spec.id_column));
            self.params.push(SqlValue::Int(id));
        }
        self
    }

    pub fn order_by(mut self, order: &'static str) -> Self {
        self.order_clause = Some(order);
        self
    }

    pub fn paginate(mut self, window: PageWindow) -> Self {
        self.window = Some(window);
        self
    }

    fn where_sql(&self) -> String {
        if self.where_clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.where_clauses.join(" AND "))
        }
    }

    /// Builds the row query and its parameters
    pub fn build(&self) -> (String, Vec<SqlValue>) {
        let mut query = format!("SELECT {} FROM {}", self.spec.columns, self.spec.table);
        query.push_str(&self.where_sql());

        if let Some(order) = self.order_clause {
            query.push_str(" ORDER BY ");
            query.push_str(order);
        }

        // LIMIT and OFFSET come from a clamped window, so they are inlined as integers
        if let Some(window) = self.window {
            query.push_str(&format!(" LIMIT {}", window.limit()));
            query.push_str(&format!(" OFFSET {}", window.offset()));
        }

        (query, self.params.clone())
    }

    /// Builds the COUNT query over the same predicate
    pub fn build_count(&self) -> (String, Vec<SqlValue>) {
        let query = format!("SELECT COUNT(*) FROM {}{}", self.spec.table, self.where_sql());
        (query, self.params.clone())
    }

    pub async fn fetch_all<'c, T, E>(&self, executor: E) -> RepoResult<Vec<T>>
    where
        T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
        E: Executor<'c, Database = Sqlite>,
    {
        let (sql, params) = self.build();
        let rows = bind_as(sqlx::query_as::<_, T>(&sql), &params)
            .fetch_all(executor)
            .await?;
        Ok(rows)
    }

    pub async fn fetch_optional<'c, T, E>(&self, executor: E) -> RepoResult<Option<T>>
    where
        T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
        E: Executor<'c, Database = Sqlite>,
    {
        let (sql, params) = self.build();
        let row = bind_as(sqlx::query_as::<_, T>(&sql), &params)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }

    pub async fn count<'c, E>(&self, executor: E) -> RepoResult<i64>
    where
        E: Executor<'c, Database = Sqlite>,
    {
        let (sql, params) = self.build_count();
        let count = bind_scalar(sqlx::query_scalar::<_, i64>(&sql), &params)
            .fetch_one(executor)
            .await?;
        Ok(count)
    }

    pub async fn exists<'c, E>(&self, executor: E) -> RepoResult<bool>
    where
        E: Executor<'c, Database = Sqlite>,
    {
        Ok(self.count(executor).await? > 0)
    }
}

fn bind_as<'q, T>(
    mut query: QueryAs<'q, Sqlite, T, SqliteArguments<'q>>,
    params: &[SqlValue],
) -> QueryAs<'q, Sqlite, T, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            SqlValue::Int(v) => query.bind(*v),
            SqlValue::Real(v) => query.bind(*v),
            SqlValue::Text(v) => query.bind(v.clone()),
            SqlValue::Bool(v) => query.bind(*v),
            SqlValue::Timestamp(v) => query.bind(*v),
        };
    }
    query
}

fn bind_scalar<'q, O>(
    mut query: QueryScalar<'q, Sqlite, O, SqliteArguments<'q>>,
    params: &[SqlValue],
) -> QueryScalar<'q, Sqlite, O, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            SqlValue::Int(v) => query.bind(*v),
            SqlValue::Real(v) => query.bind(*v),
            SqlValue::Text(v) => query.bind(v.clone()),
            SqlValue::Bool(v) => query.bind(*v),
            SqlValue::Timestamp(v) => query.bind(*v),
        };
    }
    query
}

/// Fetches one page plus the unfiltered total for the same predicate.
pub async fn fetch_page<T>(
    pool: &sqlx::SqlitePool,
    builder: SelectBuilder,
    window: PageWindow,
) -> RepoResult<(Vec<T>, i64)>
where
    T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    let total = builder.count(pool).await?;
    let rows = builder.paginate(window).fetch_all(pool).await?;
    Ok((rows, total))
}

pub async fn fetch_by_id<'c, T, E>(executor: E, spec: TableSpec, id: i64) -> RepoResult<Option<T>>
where
    T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    E: Executor<'c, Database = Sqlite>,
{
    SelectBuilder::new(spec)
        .eq(spec.id_column, id)
        .fetch_optional(executor)
        .await
}

pub async fn row_exists<'c, E>(executor: E, spec: TableSpec, id: i64) -> RepoResult<bool>
where
    E: Executor<'c, Database = Sqlite>,
{
    SelectBuilder::new(spec).eq(spec.id_column, id).exists(executor).await
}

/// Deletes one row by primary key, returning whether a row was removed.
pub async fn delete_by_id<'c, E>(executor: E, spec: TableSpec, id: i64) -> RepoResult<bool>
where
    E: Executor<'c, Database = Sqlite>,
{
    let sql = format!("DELETE FROM {} WHERE {} = ?", spec.table, spec.id_column);
    let result = sqlx::query(&sql).bind(id).execute(executor).await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPEC: TableSpec = TableSpec {
        table: "dolce",
        id_column: "articolo_id",
        columns: "articolo_id, nome",
    };

    #[test]
    fn test_builder_basic_query() {
        let (query, params) = SelectBuilder::new(SPEC).build();
        assert_eq!(query, "SELECT articolo_id, nome FROM dolce");
        assert!(params.is_empty());
    }

    #[test]
    fn test_builder_with_filters_and_order() {
        let (query, params) = SelectBuilder::new(SPEC)
            .eq("disponibile", true)
            .eq_ignore_case("nome", " Crostata ")
            .order_by("priorita DESC, nome ASC")
            .build();

        assert_eq!(
            query,
            "SELECT articolo_id, nome FROM dolce WHERE disponibile = ? AND nome = ? COLLATE KEY_NOCASE ORDER BY priorita DESC, nome ASC"
        );
        assert_eq!(params[0], SqlValue::Bool(true));
        assert_eq!(params[1], SqlValue::Text(" Crostata ".to_string()));
    }

    #[test]
    fn test_builder_with_pagination() {
        let (query, _) = SelectBuilder::new(SPEC)
            .paginate(PageWindow::new(2, 20))
            .build();
        assert!(query.ends_with("LIMIT 20 OFFSET 20"));
    }

    #[test]
    fn test_count_ignores_order_and_window() {
        let (query, params) = SelectBuilder::new(SPEC)
            .eq("priorita", 5)
            .exclude_id(Some(3))
            .order_by("nome")
            .paginate(PageWindow::new(1, 10))
            .build_count();
        assert_eq!(
            query,
            "SELECT COUNT(*) FROM dolce WHERE priorita = ? AND articolo_id <> ?"
        );
        assert_eq!(params, vec![SqlValue::Int(5), SqlValue::Int(3)]);
    }

    #[test]
    fn test_between_with_open_bounds() {
        let (query, params) = SelectBuilder::new(SPEC)
            .between("prezzo", Some(SqlValue::Real(2.0)), None)
            .build();
        assert!(query.ends_with("WHERE prezzo >= ?"));
        assert_eq!(params.len(), 1);
    }
}
