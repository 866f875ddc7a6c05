//! Ordering callbacks. Each one receives the query's selector after all
//! predicates were applied and may join derived tables before ordering.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use sea_orm::sea_query::{Alias, Expr, Func, SimpleExpr};

pub use sea_orm::sea_query::Order;

use crate::entity::{Column, Edge, Entity};
use crate::predicate::SelectorFn;
use crate::schema::Rel;
use crate::selector::{column, Selector};

pub struct OrderFn<E> {
    apply: SelectorFn,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for OrderFn<E> {
    fn clone(&self) -> Self {
        Self {
            apply: Arc::clone(&self.apply),
            _entity: PhantomData,
        }
    }
}

impl<E> fmt::Debug for OrderFn<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OrderFn")
    }
}

impl<E: Entity> OrderFn<E> {
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

pub fn asc<C: Column>(col: C) -> OrderFn<C::Entity> {
    OrderFn::new(move |s| {
        let expr = s.c(col.as_str());
        s.order_by(expr, Order::Asc);
    })
}

pub fn desc<C: Column>(col: C) -> OrderFn<C::Entity> {
    OrderFn::new(move |s| {
        let expr = s.c(col.as_str());
        s.order_by(expr, Order::Desc);
    })
}

/// Orders by a column given by name; unknown names fail when the query compiles
pub fn by_field<E: Entity>(name: &str, order: Order) -> OrderFn<E> {
    let name = name.to_string();
    OrderFn::new(move |s| {
        if s.check_column(&name) {
            let expr = s.c(&name);
            s.order_by(expr, order.clone());
        }
    })
}

/// Orders by the number of neighbours over a one-to-many edge.
///
/// The child table is grouped by its foreign key in a derived table aliased
/// `<edge>_count` and LEFT JOINed on the owner id, so owners without children
/// sort as zero instead of disappearing. Repeating the ordering reuses the join.
pub fn by_edge_count<P: Entity, T: Entity>(edge: Edge<P, T>, order: Order) -> OrderFn<P> {
    let spec = edge.spec();
    OrderFn::new(move |s| {
        if spec.rel != Rel::O2M {
            s.add_error(
                spec.name,
                format!(
                    "ordering by count needs a one-to-many edge, {} is many-to-one",
                    spec.qualified_name()
                ),
            );
            return;
        }
        let alias = format!("{}_count", spec.name);
        if !s.has_join(&alias) {
            let mut counts = Selector::new(spec.target_table);
            counts
                .select([spec.column])
                .select_as(Expr::cust("COUNT(*)"), "c")
                .group_by([spec.column]);
            let on = s
                .c(spec.owner_id)
                .equals((Alias::new(alias.as_str()), Alias::new(spec.column)));
            s.left_join(counts, &alias, on);
        }
        let count: SimpleExpr = Func::coalesce([
            SimpleExpr::from(column(&alias, "c")),
            Expr::val(0).into(),
        ])
        .into();
        s.order_by(count, order.clone());
    })
}

/// Arbitrary ordering logic over the selector
pub fn custom<E: Entity>(f: impl Fn(&mut Selector) + Send + Sync + 'static) -> OrderFn<E> {
    OrderFn::new(f)
}
