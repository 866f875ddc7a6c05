//! A mutable SELECT statement that predicates and ordering callbacks operate on.
//!
//! Predicates accumulate into a single AND condition that is attached when the
//! statement is built, so a predicate can be evaluated on a fork of the selector
//! (for `or` / `not`) or reused as the WHERE clause of an UPDATE or DELETE.
//! Ordering callbacks get the same selector and may reshape it freely, e.g. join
//! a derived table and order by one of its columns.

use sea_orm::sea_query::{
    Alias, Condition, Expr, IntoCondition, JoinType, Order, Query, SelectStatement, SimpleExpr,
};
use sea_orm::{DbBackend, Statement};

use crate::error::{LumenError, Result};
use crate::schema::TableSchema;

/// Limit used when an offset is requested without a limit; the target dialects
/// reject OFFSET without LIMIT.
pub const OFFSET_ONLY_LIMIT: u64 = i32::MAX as u64;

/// Qualified column reference `table.column`
pub fn column(table: &str, column: &str) -> Expr {
    Expr::col((Alias::new(table), Alias::new(column)))
}

#[derive(Clone, Debug)]
pub struct Selector {
    table: String,
    known_columns: Option<&'static [&'static str]>,
    stmt: SelectStatement,
    conditions: Condition,
    has_conditions: bool,
    joins: Vec<String>,
    errors: Vec<(String, String)>,
}

impl Selector {
    /// Selector reading from `table` with nothing projected yet
    pub fn new(table: &str) -> Self {
        let mut stmt = Query::select();
        stmt.from(Alias::new(table));
        Self {
            table: table.to_string(),
            known_columns: None,
            stmt,
            conditions: Condition::all(),
            has_conditions: false,
            joins: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Selector over an entity table that validates column names against the schema
    pub fn for_schema(schema: &'static TableSchema) -> Self {
        let mut selector = Self::new(schema.table);
        selector.known_columns = Some(schema.columns);
        selector
    }

    /// Same table, empty statement and conditions
    pub fn fork(&self) -> Self {
        let mut forked = Self::new(&self.table);
        forked.known_columns = self.known_columns;
        forked
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Column of this selector's table
    pub fn c(&self, name: &str) -> Expr {
        column(&self.table, name)
    }

    /// Records a validation error for unknown column names; a no-op for selectors
    /// without schema information.
    pub fn check_column(&mut self, name: &str) -> bool {
        match self.known_columns {
            Some(known) if !known.contains(&name) => {
                let message = format!("invalid field {:?} for {}", name, self.table);
                self.add_error(name, message);
                false
            }
            _ => true,
        }
    }

    /// Records a validation failure that surfaces when the statement is compiled
    pub fn add_error(&mut self, name: impl Into<String>, message: impl Into<String>) -> &mut Self {
        self.errors.push((name.into(), message.into()));
        self
    }

    /// Moves errors recorded on a fork or sub-selector into this one
    pub fn absorb_errors(&mut self, other: &mut Selector) -> &mut Self {
        self.errors.append(&mut other.errors);
        self
    }

    /// First error recorded by a predicate or ordering callback
    pub fn err(&mut self) -> Result<()> {
        if self.errors.is_empty() {
            return Ok(());
        }
        let (name, message) = self.errors.remove(0);
        Err(LumenError::validation(name, message))
    }

    /// Replaces the projection with columns of this selector's table
    pub fn select<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.stmt.clear_selects();
        for name in columns {
            let qualified = (Alias::new(self.table.as_str()), Alias::new(name.as_ref()));
            self.stmt.column(qualified);
        }
        self
    }

    /// Adds `expr AS alias` to the projection
    pub fn select_as(&mut self, expr: impl Into<SimpleExpr>, alias: &str) -> &mut Self {
        self.stmt.expr_as(expr, Alias::new(alias));
        self
    }

    /// ANDs a condition into the WHERE clause
    pub fn where_(&mut self, cond: impl IntoCondition) -> &mut Self {
        let current = std::mem::replace(&mut self.conditions, Condition::all());
        self.conditions = current.add(cond.into_condition());
        self.has_conditions = true;
        self
    }

    /// Condition accumulated so far, if any
    pub fn condition(&self) -> Option<Condition> {
        self.has_conditions.then(|| self.conditions.clone())
    }

    pub fn distinct(&mut self) -> &mut Self {
        self.stmt.distinct();
        self
    }

    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.stmt.limit(limit);
        self
    }

    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.stmt.offset(offset);
        self
    }

    pub fn order_by(&mut self, expr: impl Into<SimpleExpr>, order: Order) -> &mut Self {
        self.stmt.order_by_expr(expr.into(), order);
        self
    }

    /// Groups by columns of this selector's table
    pub fn group_by<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in columns {
            let qualified = (Alias::new(self.table.as_str()), Alias::new(name.as_ref()));
            self.stmt.group_by_col(qualified);
        }
        self
    }

    /// INNER JOIN a derived table built from another selector
    pub fn join(&mut self, sub: Selector, alias: &str, on: impl IntoCondition) -> &mut Self {
        self.join_subquery(JoinType::InnerJoin, sub, alias, on)
    }

    /// LEFT JOIN a derived table built from another selector
    pub fn left_join(&mut self, sub: Selector, alias: &str, on: impl IntoCondition) -> &mut Self {
        self.join_subquery(JoinType::LeftJoin, sub, alias, on)
    }

    /// Whether a derived table was already joined under `alias`
    pub fn has_join(&self, alias: &str) -> bool {
        self.joins.iter().any(|j| j == alias)
    }

    fn join_subquery(
        &mut self,
        join: JoinType,
        sub: Selector,
        alias: &str,
        on: impl IntoCondition,
    ) -> &mut Self {
        let mut sub = sub;
        self.absorb_errors(&mut sub);
        if self.has_join(alias) {
            return self.add_error(alias, format!("duplicate join alias {:?}", alias));
        }
        self.joins.push(alias.to_string());
        self.stmt
            .join_subquery(join, sub.into_statement(), Alias::new(alias), on);
        self
    }

    /// Raw access for callbacks that need statement features not wrapped here
    pub fn statement_mut(&mut self) -> &mut SelectStatement {
        &mut self.stmt
    }

    /// The statement with the accumulated WHERE clause attached
    pub fn into_statement(self) -> SelectStatement {
        let Self {
            mut stmt,
            conditions,
            has_conditions,
            ..
        } = self;
        if has_conditions {
            stmt.cond_where(conditions);
        }
        stmt
    }

    /// Builds SQL text and bound values for `backend`
    pub fn build(&self, backend: DbBackend) -> Statement {
        let stmt = self.clone().into_statement();
        backend.build(&stmt)
    }
}
