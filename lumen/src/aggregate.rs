use std::fmt;
use std::sync::Arc;

use sea_orm::sea_query::{Expr, Func, SimpleExpr};

use crate::selector::Selector;

type AggregateFn = Arc<dyn Fn(&mut Selector) -> Option<(SimpleExpr, String)> + Send + Sync>;

/// Aggregate expression added to a group-by projection under its own alias
#[derive(Clone)]
pub struct Aggregate(AggregateFn);

impl fmt::Debug for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Aggregate")
    }
}

impl Aggregate {
    pub fn new(
        f: impl Fn(&mut Selector) -> Option<(SimpleExpr, String)> + Send + Sync + 'static,
    ) -> Self {
        Self(Arc::new(f))
    }

    /// Appends the aggregate to the projection, or records an error on the selector
    pub fn apply(&self, selector: &mut Selector) {
        if let Some((expr, alias)) = (self.0)(selector) {
            selector.select_as(expr, &alias);
        }
    }
}

fn over_column(
    name: &str,
    alias: &'static str,
    build: fn(Expr) -> SimpleExpr,
) -> Aggregate {
    let name = name.to_string();
    Aggregate::new(move |s| {
        if !s.check_column(&name) {
            return None;
        }
        Some((build(s.c(&name)), alias.to_string()))
    })
}

/// `COUNT(*) AS count`
pub fn count() -> Aggregate {
    Aggregate::new(|_| Some((Expr::cust("COUNT(*)"), "count".to_string())))
}

/// `SUM(column) AS sum`
pub fn sum(column: &str) -> Aggregate {
    over_column(column, "sum", |c| c.sum())
}

/// `MIN(column) AS min`
pub fn min(column: &str) -> Aggregate {
    over_column(column, "min", |c| c.min())
}

/// `MAX(column) AS max`
pub fn max(column: &str) -> Aggregate {
    over_column(column, "max", |c| c.max())
}

/// `AVG(column) AS mean`
pub fn mean(column: &str) -> Aggregate {
    over_column(column, "mean", |c| Func::avg(c).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::fixtures::POSTS_TABLE;
    use sea_orm::DbBackend;

    #[test]
    fn aggregates_are_aliased() {
        let mut s = Selector::for_schema(&POSTS_TABLE);
        s.select(["user_id"]);
        count().apply(&mut s);
        max("id").apply(&mut s);
        let sql = s.build(DbBackend::Sqlite).sql;
        assert!(sql.contains(r#"COUNT(*) AS "count""#));
        assert!(sql.contains(r#"MAX("posts"."id") AS "max""#));
        assert!(s.err().is_ok());
    }

    #[test]
    fn unknown_column_is_rejected() {
        let mut s = Selector::for_schema(&POSTS_TABLE);
        sum("views").apply(&mut s);
        assert!(s.err().unwrap_err().is_validation());
    }
}
