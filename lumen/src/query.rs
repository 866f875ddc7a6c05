use std::fmt;
use std::sync::Arc;

use sea_orm::sea_query::Order;
use sea_orm::{FromQueryResult, Statement, TryGetable};

use crate::aggregate::Aggregate;
use crate::driver::Driver;
use crate::entity::{Edge, Entity};
use crate::error::{LumenError, Result};
use crate::graph::{self, QuerySpec};
use crate::loader::{EagerLoad, EdgeLoad};
use crate::order::OrderFn;
use crate::predicate::Predicate;
use crate::selector::Selector;

type PathFn = Arc<dyn Fn() -> Result<Selector> + Send + Sync>;

/// Builder for queries over one entity
pub struct Query<E: Entity> {
    driver: Driver,
    limit: Option<u64>,
    offset: Option<u64>,
    unique: bool,
    order: Vec<OrderFn<E>>,
    fields: Vec<String>,
    predicates: Vec<Predicate<E>>,
    eager: Vec<Box<dyn EagerLoad<E>>>,
    path: Option<PathFn>,
}

impl<E: Entity> Clone for Query<E> {
    fn clone(&self) -> Self {
        Self {
            driver: self.driver.clone(),
            limit: self.limit,
            offset: self.offset,
            unique: self.unique,
            order: self.order.clone(),
            fields: self.fields.clone(),
            predicates: self.predicates.clone(),
            eager: self.eager.iter().map(|e| e.boxed_clone()).collect(),
            path: self.path.clone(),
        }
    }
}

impl<E: Entity> fmt::Debug for Query<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("entity", &E::SCHEMA.label)
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .field("unique", &self.unique)
            .field("fields", &self.fields)
            .field("predicates", &self.predicates.len())
            .field("order", &self.order.len())
            .field(
                "with",
                &self.eager.iter().map(|e| e.edge().name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl<E: Entity> Query<E> {
    pub fn new(driver: Driver) -> Self {
        Self {
            driver,
            limit: None,
            offset: None,
            unique: false,
            order: Vec::new(),
            fields: Vec::new(),
            predicates: Vec::new(),
            eager: Vec::new(),
            path: None,
        }
    }

    /// Adds a predicate; all predicates must hold
    pub fn filter(mut self, predicate: Predicate<E>) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// SELECT DISTINCT
    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    pub fn order(mut self, order: OrderFn<E>) -> Self {
        self.order.push(order);
        self
    }

    /// Orders with a raw callback over the selector
    pub fn order_by_fn(mut self, f: impl Fn(&mut Selector) + Send + Sync + 'static) -> Self {
        self.order.push(OrderFn::new(f));
        self
    }

    /// Orders by a column name, validated when the query compiles
    pub fn order_by(self, column: &str, order: Order) -> Self {
        self.order(crate::order::by_field(column, order))
    }

    /// Restricts the columns read into entities; the primary key is always read
    pub fn fields<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for column in columns {
            let column = column.as_ref();
            if !self.fields.iter().any(|f| f == column) {
                self.fields.push(column.to_string());
            }
        }
        self
    }

    pub(crate) fn ensure_column(mut self, column: &str) -> Self {
        if !self.fields.is_empty() && !self.fields.iter().any(|f| f == column) {
            self.fields.push(column.to_string());
        }
        self
    }

    /// Eager-loads `edge`; `configure` narrows, orders or nests the neighbour query
    pub fn with<T: Entity>(
        mut self,
        edge: Edge<E, T>,
        configure: impl FnOnce(Query<T>) -> Query<T>,
    ) -> Self {
        let query = configure(Query::new(self.driver.clone()));
        self.eager.push(Box::new(EdgeLoad { edge, query }));
        self
    }

    pub fn with_edge<T: Entity>(self, edge: Edge<E, T>) -> Self {
        self.with(edge, |q| q)
    }

    /// Query over the neighbours, across `edge`, of the rows this query selects
    pub fn query_edge<T: Entity>(&self, edge: Edge<E, T>) -> Query<T> {
        let parent = self.clone();
        let mut query = Query::new(self.driver.clone());
        query.path = Some(Arc::new(move || {
            let from = parent.query_spec()?.selector()?;
            Ok(graph::set_neighbors::<T>(edge.spec(), from))
        }));
        query
    }

    /// Projects `columns` for scanning into a custom row type
    pub fn select<I, S>(self, columns: I) -> Select<E>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Select {
            columns: columns.into_iter().map(|c| c.as_ref().to_string()).collect(),
            query: self,
        }
    }

    pub fn group_by<I, S>(self, columns: I) -> GroupBy<E>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        GroupBy {
            columns: columns.into_iter().map(|c| c.as_ref().to_string()).collect(),
            aggregates: Vec::new(),
            query: self,
        }
    }

    pub(crate) fn driver(&self) -> &Driver {
        &self.driver
    }

    pub(crate) fn predicates(&self) -> &[Predicate<E>] {
        &self.predicates
    }

    pub(crate) fn query_spec(&self) -> Result<QuerySpec> {
        let schema = E::SCHEMA;
        let mut spec = QuerySpec::new(schema);
        if !self.fields.is_empty() {
            let mut columns = vec![schema.id_column.to_string()];
            columns.extend(
                self.fields
                    .iter()
                    .filter(|f| f.as_str() != schema.id_column)
                    .cloned(),
            );
            for load in &self.eager {
                if let Some(column) = load.parent_column() {
                    if !columns.iter().any(|c| c == column) {
                        columns.push(column.to_string());
                    }
                }
            }
            spec.columns = columns;
        }
        if let Some(path) = &self.path {
            spec.from = Some(path()?);
        }
        spec.predicates = self.predicates.iter().map(Predicate::func).collect();
        spec.order = self.order.iter().map(OrderFn::func).collect();
        spec.unique = self.unique;
        spec.limit = self.limit;
        spec.offset = self.offset;
        Ok(spec)
    }

    /// The SELECT this query sends, without running it
    pub fn statement(&self) -> Result<Statement> {
        let selector = self.query_spec()?.selector()?;
        Ok(selector.build(self.driver.backend()))
    }

    pub async fn all(&self) -> Result<Vec<E>> {
        let spec = self.query_spec()?;
        let mut nodes = graph::query_nodes::<E>(&self.driver, &spec).await?;
        if nodes.is_empty() {
            return Ok(nodes);
        }
        for load in &self.eager {
            load.load(&mut nodes).await?;
        }
        Ok(nodes)
    }

    pub async fn all_x(&self) -> Vec<E> {
        unwrap_x(self.all().await)
    }

    pub async fn ids(&self) -> Result<Vec<i64>> {
        graph::query_ids(&self.driver, &self.query_spec()?).await
    }

    pub async fn ids_x(&self) -> Vec<i64> {
        unwrap_x(self.ids().await)
    }

    pub async fn count(&self) -> Result<u64> {
        graph::count_nodes(&self.driver, &self.query_spec()?).await
    }

    pub async fn count_x(&self) -> u64 {
        unwrap_x(self.count().await)
    }

    /// First matching node; `NotFound` when there is none
    pub async fn first(&self) -> Result<E> {
        self.clone()
            .limit(1)
            .all()
            .await?
            .into_iter()
            .next()
            .ok_or(LumenError::NotFound {
                label: E::SCHEMA.label,
            })
    }

    /// Like [`Query::first`], but `None` when nothing matched; panics on other errors
    pub async fn first_x(&self) -> Option<E> {
        match self.first().await {
            Ok(node) => Some(node),
            Err(err) if err.is_not_found() => None,
            Err(err) => panic!("{}", err),
        }
    }

    pub async fn first_id(&self) -> Result<i64> {
        self.clone()
            .limit(1)
            .ids()
            .await?
            .into_iter()
            .next()
            .ok_or(LumenError::NotFound {
                label: E::SCHEMA.label,
            })
    }

    pub async fn first_id_x(&self) -> Option<i64> {
        match self.first_id().await {
            Ok(id) => Some(id),
            Err(err) if err.is_not_found() => None,
            Err(err) => panic!("{}", err),
        }
    }

    /// The single matching node; `NotFound` for none, `NotSingular` for more than one
    pub async fn only(&self) -> Result<E> {
        let mut nodes = self.clone().limit(2).all().await?;
        match nodes.len() {
            1 => Ok(nodes.remove(0)),
            0 => Err(LumenError::NotFound {
                label: E::SCHEMA.label,
            }),
            _ => Err(LumenError::NotSingular {
                label: E::SCHEMA.label,
            }),
        }
    }

    pub async fn only_x(&self) -> E {
        unwrap_x(self.only().await)
    }

    pub async fn only_id(&self) -> Result<i64> {
        let ids = self.clone().limit(2).ids().await?;
        match ids.as_slice() {
            [id] => Ok(*id),
            [] => Err(LumenError::NotFound {
                label: E::SCHEMA.label,
            }),
            _ => Err(LumenError::NotSingular {
                label: E::SCHEMA.label,
            }),
        }
    }

    pub async fn only_id_x(&self) -> i64 {
        unwrap_x(self.only_id().await)
    }

    /// Whether any row matches, without reading any field
    pub async fn exist(&self) -> Result<bool> {
        match self.first_id().await {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    pub async fn exist_x(&self) -> bool {
        unwrap_x(self.exist().await)
    }
}

fn unwrap_x<T>(res: Result<T>) -> T {
    match res {
        Ok(value) => value,
        Err(err) => panic!("{}", err),
    }
}

/// Query projected to a fixed list of columns
pub struct Select<E: Entity> {
    query: Query<E>,
    columns: Vec<String>,
}

impl<E: Entity> Select<E> {
    fn spec(&self) -> Result<QuerySpec> {
        let mut spec = self.query.query_spec()?;
        spec.columns = self.columns.clone();
        Ok(spec)
    }

    pub fn statement(&self) -> Result<Statement> {
        let selector = self.spec()?.selector()?;
        Ok(selector.build(self.query.driver.backend()))
    }

    /// Scans each row into `T`
    pub async fn scan<T: FromQueryResult>(&self) -> Result<Vec<T>> {
        let rows = self.query.driver.query(self.statement()?).await?;
        rows.iter()
            .map(|row| T::from_query_result(row, "").map_err(LumenError::from))
            .collect()
    }

    /// Values of the only selected column
    pub async fn values<V: TryGetable>(&self) -> Result<Vec<V>> {
        let column = match self.columns.as_slice() {
            [column] => column.clone(),
            _ => {
                return Err(LumenError::validation(
                    "select",
                    format!(
                        "values is only allowed when selecting one field, got {}",
                        self.columns.len()
                    ),
                ))
            }
        };
        let rows = self.query.driver.query(self.statement()?).await?;
        rows.iter()
            .map(|row| row.try_get::<V>("", &column).map_err(LumenError::from))
            .collect()
    }

    /// Entities holding only the selected columns plus the primary key
    pub async fn all(&self) -> Result<Vec<E>> {
        self.query.clone().fields(&self.columns).all().await
    }
}

/// Grouped query with aggregate columns
pub struct GroupBy<E: Entity> {
    query: Query<E>,
    columns: Vec<String>,
    aggregates: Vec<Aggregate>,
}

impl<E: Entity> GroupBy<E> {
    pub fn aggregate(mut self, aggregate: Aggregate) -> Self {
        self.aggregates.push(aggregate);
        self
    }

    pub fn statement(&self) -> Result<Statement> {
        let mut spec = self.query.query_spec()?;
        spec.columns = self.columns.clone();
        let mut selector = spec.selector()?;
        for aggregate in &self.aggregates {
            aggregate.apply(&mut selector);
        }
        selector.group_by(&self.columns);
        selector.err()?;
        Ok(selector.build(self.query.driver.backend()))
    }

    pub async fn scan<T: FromQueryResult>(&self) -> Result<Vec<T>> {
        let rows = self.query.driver.query(self.statement()?).await?;
        rows.iter()
            .map(|row| T::from_query_result(row, "").map_err(LumenError::from))
            .collect()
    }
}
