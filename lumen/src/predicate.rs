//! Row-narrowing conditions. A predicate is a function over a [`Selector`];
//! predicates added to one builder are AND-ed in the order they were added.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use sea_orm::sea_query::{Condition, Expr, SimpleExpr};
use sea_orm::Value;

use crate::entity::{Column, Edge, Entity};
use crate::schema::Rel;
use crate::selector::Selector;

pub(crate) type SelectorFn = Arc<dyn Fn(&mut Selector) + Send + Sync>;

pub struct Predicate<E> {
    apply: SelectorFn,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for Predicate<E> {
    fn clone(&self) -> Self {
        Self {
            apply: Arc::clone(&self.apply),
            _entity: PhantomData,
        }
    }
}

impl<E> fmt::Debug for Predicate<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Predicate")
    }
}

impl<E: Entity> Predicate<E> {
    pub fn new(f: impl Fn(&mut Selector) + Send + Sync + 'static) -> Self {
        Self {
            apply: Arc::new(f),
            _entity: PhantomData,
        }
    }

    pub fn apply(&self, selector: &mut Selector) {
        (self.apply)(selector)
    }

    pub(crate) fn func(&self) -> SelectorFn {
        Arc::clone(&self.apply)
    }
}

fn field<C: Column>(
    column: C,
    build: impl Fn(Expr) -> SimpleExpr + Send + Sync + 'static,
) -> Predicate<C::Entity> {
    Predicate::new(move |s| {
        let cond = build(s.c(column.as_str()));
        s.where_(cond);
    })
}

pub fn eq<C: Column>(column: C, value: impl Into<Value>) -> Predicate<C::Entity> {
    let value = value.into();
    field(column, move |c| c.eq(value.clone()))
}

pub fn ne<C: Column>(column: C, value: impl Into<Value>) -> Predicate<C::Entity> {
    let value = value.into();
    field(column, move |c| c.ne(value.clone()))
}

pub fn gt<C: Column>(column: C, value: impl Into<Value>) -> Predicate<C::Entity> {
    let value = value.into();
    field(column, move |c| c.gt(value.clone()))
}

pub fn gte<C: Column>(column: C, value: impl Into<Value>) -> Predicate<C::Entity> {
    let value = value.into();
    field(column, move |c| c.gte(value.clone()))
}

pub fn lt<C: Column>(column: C, value: impl Into<Value>) -> Predicate<C::Entity> {
    let value = value.into();
    field(column, move |c| c.lt(value.clone()))
}

pub fn lte<C: Column>(column: C, value: impl Into<Value>) -> Predicate<C::Entity> {
    let value = value.into();
    field(column, move |c| c.lte(value.clone()))
}

pub fn is_in<C, I, V>(column: C, values: I) -> Predicate<C::Entity>
where
    C: Column,
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    let values: Vec<Value> = values.into_iter().map(Into::into).collect();
    field(column, move |c| c.is_in(values.clone()))
}

pub fn not_in<C, I, V>(column: C, values: I) -> Predicate<C::Entity>
where
    C: Column,
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    let values: Vec<Value> = values.into_iter().map(Into::into).collect();
    field(column, move |c| c.is_not_in(values.clone()))
}

pub fn is_null<C: Column>(column: C) -> Predicate<C::Entity> {
    field(column, |c| c.is_null())
}

pub fn not_null<C: Column>(column: C) -> Predicate<C::Entity> {
    field(column, |c| c.is_not_null())
}

pub fn contains<C: Column>(column: C, needle: &str) -> Predicate<C::Entity> {
    let pattern = format!("%{}%", needle);
    field(column, move |c| c.like(pattern.clone()))
}

pub fn has_prefix<C: Column>(column: C, prefix: &str) -> Predicate<C::Entity> {
    let pattern = format!("{}%", prefix);
    field(column, move |c| c.like(pattern.clone()))
}

pub fn id_eq<E: Entity>(id: i64) -> Predicate<E> {
    Predicate::new(move |s| {
        let cond = s.c(E::SCHEMA.id_column).eq(id);
        s.where_(cond);
    })
}

pub fn id_in<E: Entity>(ids: impl IntoIterator<Item = i64>) -> Predicate<E> {
    let ids: Vec<i64> = ids.into_iter().collect();
    Predicate::new(move |s| {
        let cond = s.c(E::SCHEMA.id_column).is_in(ids.clone());
        s.where_(cond);
    })
}

/// All predicates must hold
pub fn and<E: Entity>(predicates: Vec<Predicate<E>>) -> Predicate<E> {
    Predicate::new(move |s| {
        for p in &predicates {
            p.apply(s);
        }
    })
}

/// At least one predicate must hold
pub fn or<E: Entity>(predicates: Vec<Predicate<E>>) -> Predicate<E> {
    Predicate::new(move |s| {
        let mut any = Condition::any();
        for p in &predicates {
            let mut branch = s.fork();
            p.apply(&mut branch);
            s.absorb_errors(&mut branch);
            if let Some(cond) = branch.condition() {
                any = any.add(cond);
            }
        }
        s.where_(any);
    })
}

pub fn not<E: Entity>(predicate: Predicate<E>) -> Predicate<E> {
    Predicate::new(move |s| {
        let mut branch = s.fork();
        predicate.apply(&mut branch);
        s.absorb_errors(&mut branch);
        if let Some(cond) = branch.condition() {
            s.where_(cond.not());
        }
    })
}

/// Rows that have at least one neighbour over `edge`
pub fn has_edge<P: Entity, T: Entity>(edge: Edge<P, T>) -> Predicate<P> {
    has_edge_with(edge, Vec::new())
}

/// Rows that have at least one neighbour over `edge` matching all `predicates`
pub fn has_edge_with<P: Entity, T: Entity>(
    edge: Edge<P, T>,
    predicates: Vec<Predicate<T>>,
) -> Predicate<P> {
    let spec = edge.spec();
    Predicate::new(move |s| match spec.rel {
        Rel::M2O if predicates.is_empty() => {
            let cond = s.c(spec.column).is_not_null();
            s.where_(cond);
        }
        Rel::M2O => {
            let mut to = Selector::for_schema(T::SCHEMA);
            to.select([spec.target_id]);
            for p in &predicates {
                p.apply(&mut to);
            }
            s.absorb_errors(&mut to);
            let cond = s.c(spec.column).in_subquery(to.into_statement());
            s.where_(cond);
        }
        Rel::O2M => {
            let mut to = Selector::for_schema(T::SCHEMA);
            to.select([spec.column]);
            let fk_set = to.c(spec.column).is_not_null();
            to.where_(fk_set);
            for p in &predicates {
                p.apply(&mut to);
            }
            s.absorb_errors(&mut to);
            let cond = s.c(spec.owner_id).in_subquery(to.into_statement());
            s.where_(cond);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Post, PostColumn, User, UserColumn, CREATOR_EDGE};
    use sea_orm::DbBackend;

    fn sql_of<E: Entity>(p: Predicate<E>) -> String {
        let mut s = Selector::for_schema(E::SCHEMA);
        s.select(E::SCHEMA.columns);
        p.apply(&mut s);
        s.build(DbBackend::Sqlite).sql
    }

    #[test]
    fn field_predicates_qualify_columns() {
        let sql = sql_of(eq(UserColumn::Name, "A"));
        assert!(sql.ends_with(r#"WHERE "users"."name" = ?"#));

        let sql = sql_of(is_in(PostColumn::UserId, [1i64, 2, 3]));
        assert!(sql.ends_with(r#"WHERE "posts"."user_id" IN (?, ?, ?)"#));
    }

    #[test]
    fn or_combines_branches() {
        let sql = sql_of(or(vec![
            eq(UserColumn::Name, "A"),
            eq(UserColumn::Name, "B"),
        ]));
        assert!(sql.contains(r#""users"."name" = ? OR "users"."name" = ?"#));
    }

    #[test]
    fn not_negates() {
        let sql = sql_of(not(eq::<UserColumn>(UserColumn::Name, "A")));
        assert!(sql.contains("NOT"));
    }

    #[test]
    fn has_edge_on_owner_side_checks_column() {
        let sql = sql_of::<Post>(has_edge(CREATOR_EDGE));
        assert!(sql.ends_with(r#"WHERE "posts"."user_id" IS NOT NULL"#));
    }

    #[test]
    fn has_edge_with_uses_subquery() {
        let sql = sql_of::<Post>(has_edge_with(
            CREATOR_EDGE,
            vec![eq(UserColumn::Name, "B")],
        ));
        assert!(sql.contains(r#""posts"."user_id" IN (SELECT "users"."id" FROM "users" WHERE "users"."name" = ?)"#));
    }

    #[test]
    fn id_predicates_use_schema_key() {
        let sql = sql_of::<User>(id_in([4, 5]));
        assert!(sql.ends_with(r#"WHERE "users"."id" IN (?, ?)"#));
    }
}
