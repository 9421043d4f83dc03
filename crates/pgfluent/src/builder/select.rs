//! SELECT statement builder.

use super::{normalize, require_table};
use crate::clause::{Conditions, Filter};
use crate::error::{SqlError, SqlResult};
use crate::executor::Executor;
use crate::record::{PartialScan, Record, Rows, scan_all, scan_one};
use crate::render::{Rendered, Renderer};
use crate::validate::{validate_field_expression, validate_table_expression};
use crate::value::IntoArgs;

/// Kind of JOIN clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
}

impl JoinKind {
    pub const fn as_sql(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::Full => "FULL JOIN",
        }
    }
}

#[derive(Debug, Clone)]
struct Join {
    kind: JoinKind,
    table: String,
    on: String,
}

#[derive(Debug, Clone)]
struct Order {
    field: String,
    desc: bool,
}

/// SELECT builder bound to an executor.
pub struct Select<'e, E> {
    executor: &'e E,
    table: Option<String>,
    fields: Vec<String>,
    distinct: bool,
    joins: Vec<Join>,
    conditions: Conditions,
    group_by: Vec<String>,
    having: Conditions,
    order_by: Vec<Order>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl<E> Clone for Select<'_, E> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor,
            table: self.table.clone(),
            fields: self.fields.clone(),
            distinct: self.distinct,
            joins: self.joins.clone(),
            conditions: self.conditions.clone(),
            group_by: self.group_by.clone(),
            having: self.having.clone(),
            order_by: self.order_by.clone(),
            limit: self.limit,
            offset: self.offset,
        }
    }
}

impl<E> std::fmt::Debug for Select<'_, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Select")
            .field("table", &self.table)
            .field("fields", &self.fields)
            .field("conditions", &self.conditions.len())
            .finish_non_exhaustive()
    }
}

impl<E> Filter for Select<'_, E> {
    fn conditions(&self) -> &Conditions {
        &self.conditions
    }

    fn conditions_mut(&mut self) -> &mut Conditions {
        &mut self.conditions
    }
}

impl<'e, E: Executor> Select<'e, E> {
    pub(crate) fn new(executor: &'e E) -> Self {
        Self {
            executor,
            table: None,
            fields: Vec::new(),
            distinct: false,
            joins: Vec::new(),
            conditions: Conditions::new(),
            group_by: Vec::new(),
            having: Conditions::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Set the FROM table: `users`, `users u`, `users AS u` or `public.users`.
    pub fn table(mut self, table: &str) -> SqlResult<Self> {
        validate_table_expression(table)?;
        self.table = Some(normalize(table));
        Ok(self)
    }

    /// Add select-list terms. Nothing selected means `*`.
    pub fn select(mut self, fields: &[&str]) -> SqlResult<Self> {
        for field in fields {
            validate_field_expression(field)?;
        }
        self.fields.extend(fields.iter().map(|f| f.trim().to_string()));
        Ok(self)
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Add a JOIN of `kind`.
    ///
    /// `table` is validated like [`Select::table`]. The `on` predicate is
    /// caller SQL and is **not** validated; never build it from user input.
    pub fn join_with(mut self, kind: JoinKind, table: &str, on: &str) -> SqlResult<Self> {
        validate_table_expression(table)?;
        self.joins.push(Join {
            kind,
            table: normalize(table),
            on: on.trim().to_string(),
        });
        Ok(self)
    }

    /// `INNER JOIN table ON on`. See [`Select::join_with`].
    pub fn join(self, table: &str, on: &str) -> SqlResult<Self> {
        self.join_with(JoinKind::Inner, table, on)
    }

    /// `LEFT JOIN table ON on`. See [`Select::join_with`].
    pub fn left_join(self, table: &str, on: &str) -> SqlResult<Self> {
        self.join_with(JoinKind::Left, table, on)
    }

    /// `RIGHT JOIN table ON on`. See [`Select::join_with`].
    pub fn right_join(self, table: &str, on: &str) -> SqlResult<Self> {
        self.join_with(JoinKind::Right, table, on)
    }

    /// `FULL JOIN table ON on`. See [`Select::join_with`].
    pub fn full_join(self, table: &str, on: &str) -> SqlResult<Self> {
        self.join_with(JoinKind::Full, table, on)
    }

    pub fn group_by(mut self, fields: &[&str]) -> SqlResult<Self> {
        for field in fields {
            validate_field_expression(field)?;
        }
        self.group_by.extend(fields.iter().map(|f| f.trim().to_string()));
        Ok(self)
    }

    /// Add a HAVING predicate joined with AND. Its `?` markers continue the
    /// numbering of the WHERE clause.
    pub fn having(mut self, template: &str, args: impl IntoArgs) -> Self {
        self.having.and(template, args.into_args());
        self
    }

    /// Add a HAVING predicate joined with OR.
    pub fn or_having(mut self, template: &str, args: impl IntoArgs) -> Self {
        self.having.or(template, args.into_args());
        self
    }

    pub fn order_by(self, field: &str) -> SqlResult<Self> {
        self.push_order(field, false)
    }

    /// Sort descending by `field`. The direction comes from the method, so
    /// `field` must not end in `ASC` or `DESC`.
    pub fn order_by_desc(self, field: &str) -> SqlResult<Self> {
        self.push_order(field, true)
    }

    fn push_order(mut self, field: &str, desc: bool) -> SqlResult<Self> {
        validate_field_expression(field)?;
        if let Some(last) = field.split_whitespace().last()
            && (last.eq_ignore_ascii_case("asc") || last.eq_ignore_ascii_case("desc"))
        {
            return Err(SqlError::invalid_expression(
                field,
                "sort direction belongs in order_by/order_by_desc",
            ));
        }
        self.order_by.push(Order {
            field: field.trim().to_string(),
            desc,
        });
        Ok(self)
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Set LIMIT/OFFSET for 1-based `page` of `per_page` rows. Page 0 is
    /// treated as page 1.
    pub fn paginate(self, page: u64, per_page: u64) -> Self {
        let offset = page.saturating_sub(1).saturating_mul(per_page);
        self.limit(per_page).offset(offset)
    }

    /// Render without executing.
    pub fn build(&self) -> SqlResult<Rendered> {
        let mut r = Renderer::new();
        r.push("SELECT ");
        r.push(&self.projection());
        self.render_from(&mut r)?;

        if !self.order_by.is_empty() {
            let terms: Vec<String> = self
                .order_by
                .iter()
                .map(|o| {
                    if o.desc {
                        format!("{} DESC", o.field)
                    } else {
                        o.field.clone()
                    }
                })
                .collect();
            r.push(" ORDER BY ");
            r.push(&terms.join(", "));
        }
        if let Some(limit) = self.limit {
            r.push(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            r.push(&format!(" OFFSET {offset}"));
        }
        Ok(r.finish())
    }

    /// Render the `COUNT(*)` form used by [`Select::count`].
    ///
    /// ORDER BY, LIMIT and OFFSET are dropped. Grouped or DISTINCT queries are
    /// counted through a subquery so the result is the number of output rows.
    pub fn build_count(&self) -> SqlResult<Rendered> {
        let mut r = Renderer::new();
        if self.distinct || !self.group_by.is_empty() || !self.having.is_empty() {
            r.push("SELECT COUNT(*) FROM (SELECT ");
            r.push(&self.projection());
            self.render_from(&mut r)?;
            r.push(") AS counted");
        } else {
            r.push("SELECT COUNT(*)");
            self.render_from(&mut r)?;
        }
        Ok(r.finish())
    }

    fn projection(&self) -> String {
        let fields = if self.fields.is_empty() {
            "*".to_string()
        } else {
            self.fields.join(", ")
        };
        if self.distinct {
            format!("DISTINCT {fields}")
        } else {
            fields
        }
    }

    fn render_from(&self, r: &mut Renderer) -> SqlResult<()> {
        let table = require_table(&self.table)?;
        r.push(" FROM ");
        r.push(table);
        for join in &self.joins {
            r.push(" ");
            r.push(join.kind.as_sql());
            r.push(" ");
            r.push(&join.table);
            r.push(" ON ");
            r.push(&join.on);
        }
        r.conditions("WHERE", &self.conditions)?;
        if !self.group_by.is_empty() {
            r.push(" GROUP BY ");
            r.push(&self.group_by.join(", "));
        }
        r.conditions("HAVING", &self.having)?;
        Ok(())
    }

    /// Execute and return the raw result set.
    pub async fn rows(self) -> SqlResult<Rows> {
        let Rendered { sql, args } = self.build()?;
        self.executor.query(&sql, &args).await
    }

    /// Execute and materialize the first row into `record`.
    ///
    /// Fails with [`SqlError::NoRows`] when nothing matches.
    pub async fn scan<R: Record + ?Sized>(self, record: &mut R) -> SqlResult<()> {
        let rows = self.rows().await?;
        scan_one(rows, record)
    }

    /// Execute and materialize every row, in server order, calling `factory`
    /// for a fresh record per row.
    ///
    /// No matching rows is an empty `Vec`. On failure the records built so
    /// far are returned inside the [`PartialScan`].
    pub async fn scan_all<R, F>(self, factory: F) -> Result<Vec<R>, PartialScan<R>>
    where
        R: Record,
        F: FnMut() -> R,
    {
        let rows = self.rows().await.map_err(PartialScan::new)?;
        scan_all(rows, factory)
    }

    /// Execute `SELECT COUNT(*)` over the same FROM/WHERE/GROUP BY.
    pub async fn count(self) -> SqlResult<i64> {
        let Rendered { sql, args } = self.build_count()?;
        let rows = self.executor.query(&sql, &args).await?;
        let row = rows.into_iter().next().ok_or(SqlError::NoRows)?;
        let column = row.columns().first().cloned().unwrap_or_else(|| "count".to_string());
        let value = row.values().first().cloned().ok_or(SqlError::NoRows)?;
        value
            .get::<i64>()
            .map_err(|source| SqlError::Scan { column, source })
    }
}
