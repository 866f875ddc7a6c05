//! Statement execution over entity tables: node queries, counts, inserts,
//! updates, deletes and neighbour selection across edges. Builders compile
//! their state into the specs below and run them through a [`Driver`].

use sea_orm::sea_query::{Alias, Expr, Keyword, Query, SimpleExpr};
use sea_orm::Value;

use crate::driver::Driver;
use crate::entity::Entity;
use crate::error::{LumenError, Result};
use crate::mutation::{EdgeChange, EdgeOp};
use crate::predicate::SelectorFn;
use crate::schema::{EdgeSpec, Rel, TableSchema};
use crate::selector::{column, Selector, OFFSET_ONLY_LIMIT};

/// Everything needed to compile a SELECT over one entity table
#[derive(Clone)]
pub struct QuerySpec {
    pub schema: &'static TableSchema,
    pub columns: Vec<String>,
    /// Starting selector produced by a traversal
    pub from: Option<Selector>,
    pub predicates: Vec<SelectorFn>,
    pub order: Vec<SelectorFn>,
    pub unique: bool,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl QuerySpec {
    pub fn new(schema: &'static TableSchema) -> Self {
        Self {
            schema,
            columns: schema.columns.iter().map(|c| c.to_string()).collect(),
            from: None,
            predicates: Vec::new(),
            order: Vec::new(),
            unique: false,
            limit: None,
            offset: None,
        }
    }

    pub fn selector(&self) -> Result<Selector> {
        let mut s = match &self.from {
            Some(from) => from.clone(),
            None => Selector::for_schema(self.schema),
        };
        for name in &self.columns {
            s.check_column(name);
        }
        s.select(&self.columns);
        if self.unique {
            s.distinct();
        }
        for p in &self.predicates {
            p(&mut s);
        }
        for o in &self.order {
            o(&mut s);
        }
        if let Some(offset) = self.offset {
            s.offset(offset);
            s.limit(OFFSET_ONLY_LIMIT);
        }
        if let Some(limit) = self.limit {
            s.limit(limit);
        }
        s.err()?;
        Ok(s)
    }
}

pub async fn query_nodes<E: Entity>(driver: &Driver, spec: &QuerySpec) -> Result<Vec<E>> {
    let selector = spec.selector()?;
    let rows = driver.query(selector.build(driver.backend())).await?;
    rows.iter().map(|row| E::scan(&spec.columns, row)).collect()
}

/// Primary keys of the rows `spec` selects
pub async fn query_ids(driver: &Driver, spec: &QuerySpec) -> Result<Vec<i64>> {
    let mut spec = spec.clone();
    spec.columns = vec![spec.schema.id_column.to_string()];
    let selector = spec.selector()?;
    let rows = driver.query(selector.build(driver.backend())).await?;
    rows.iter()
        .map(|row| {
            row.try_get::<i64>("", spec.schema.id_column)
                .map_err(LumenError::from)
        })
        .collect()
}

/// Number of rows `spec` selects; ordering is dropped, limit and offset are kept
pub async fn count_nodes(driver: &Driver, spec: &QuerySpec) -> Result<u64> {
    let mut spec = spec.clone();
    spec.order.clear();
    let inner = spec.selector()?;
    let mut outer = Query::select();
    outer
        .expr_as(Expr::cust("COUNT(*)"), Alias::new("count"))
        .from_subquery(inner.into_statement(), Alias::new("t"));
    let rows = driver.query(driver.build(&outer)).await?;
    let count = match rows.first() {
        Some(row) => row.try_get::<i64>("", "count")?,
        None => 0,
    };
    Ok(count as u64)
}

pub struct CreateSpec {
    pub schema: &'static TableSchema,
    pub values: Vec<(&'static str, Value)>,
    /// One-to-many edges to attach once the row exists
    pub edges: Vec<EdgeChange>,
}

/// Inserts one row and returns its primary key
pub async fn create_node(driver: &Driver, spec: CreateSpec) -> Result<i64> {
    let schema = spec.schema;
    let mut insert = Query::insert();
    insert.into_table(Alias::new(schema.table));
    if spec.values.is_empty() {
        insert.or_default_values();
    } else {
        insert.columns(spec.values.iter().map(|(c, _)| Alias::new(*c)));
        insert
            .values(spec.values.iter().map(|(_, v)| SimpleExpr::from(v.clone())))
            .map_err(|e| LumenError::validation(schema.label, e.to_string()))?;
    }
    let id = if driver.support_returning() {
        insert.returning_col(Alias::new(schema.id_column));
        let rows = driver.query(driver.build(&insert)).await?;
        match rows.first() {
            Some(row) => row.try_get::<i64>("", schema.id_column)?,
            None => {
                return Err(LumenError::consistency(format!(
                    "insert into {} returned no id",
                    schema.table
                )))
            }
        }
    } else {
        let res = driver.exec(driver.build(&insert)).await?;
        res.last_insert_id() as i64
    };
    apply_child_edges(driver, &[id], &spec.edges).await?;
    Ok(id)
}

pub struct UpdateSpec {
    pub schema: &'static TableSchema,
    pub id: Option<i64>,
    pub predicates: Vec<SelectorFn>,
    pub assignments: Vec<(&'static str, SimpleExpr)>,
    pub edges: Vec<EdgeChange>,
}

impl UpdateSpec {
    fn matching(&self) -> QuerySpec {
        let mut spec = QuerySpec::new(self.schema);
        spec.predicates = self.predicates.clone();
        if let Some(id) = self.id {
            let id_column = self.schema.id_column;
            spec.predicates.push(std::sync::Arc::new(move |s: &mut Selector| {
                let cond = s.c(id_column).eq(id);
                s.where_(cond);
            }));
        }
        spec
    }
}

/// Updates every row matching the predicates; returns how many rows matched
pub async fn update_nodes(driver: &Driver, spec: UpdateSpec) -> Result<u64> {
    let ids = query_ids(driver, &spec.matching()).await?;
    if ids.is_empty() {
        return Ok(0);
    }
    update_by_ids(driver, &spec, &ids).await?;
    Ok(ids.len() as u64)
}

/// Updates one row by id and returns it re-read with `columns`
pub async fn update_node<E: Entity>(
    driver: &Driver,
    spec: UpdateSpec,
    columns: Vec<String>,
) -> Result<E> {
    let schema = spec.schema;
    let id = spec.id.ok_or_else(|| {
        LumenError::validation(
            schema.id_column,
            format!("missing {}.{} value for update", schema.label, schema.id_column),
        )
    })?;
    let mut reread = QuerySpec::new(schema);
    reread.columns = columns;
    reread.predicates.push(std::sync::Arc::new(move |s: &mut Selector| {
        let cond = s.c(schema.id_column).eq(id);
        s.where_(cond);
    }));
    reread.selector()?;

    let ids = query_ids(driver, &spec.matching()).await?;
    if ids.is_empty() {
        return Err(LumenError::NotFound {
            label: schema.label,
        });
    }
    update_by_ids(driver, &spec, &[id]).await?;

    query_nodes::<E>(driver, &reread)
        .await?
        .into_iter()
        .next()
        .ok_or(LumenError::NotFound {
            label: schema.label,
        })
}

async fn update_by_ids(driver: &Driver, spec: &UpdateSpec, ids: &[i64]) -> Result<()> {
    let schema = spec.schema;
    check_child_edges(ids.len(), &spec.edges)?;
    if !spec.assignments.is_empty() {
        let mut update = Query::update();
        update
            .table(Alias::new(schema.table))
            .values(
                spec.assignments
                    .iter()
                    .map(|(c, v)| (Alias::new(*c), v.clone())),
            )
            .and_where(column(schema.table, schema.id_column).is_in(ids.iter().copied()));
        driver.exec(driver.build(&update)).await?;
    }
    apply_child_edges(driver, ids, &spec.edges).await
}

/// Deletes every row matching the predicates; returns the affected count
pub async fn delete_nodes(
    driver: &Driver,
    schema: &'static TableSchema,
    predicates: &[SelectorFn],
) -> Result<u64> {
    let mut s = Selector::for_schema(schema);
    for p in predicates {
        p(&mut s);
    }
    s.err()?;
    let mut delete = Query::delete();
    delete.from_table(Alias::new(schema.table));
    if let Some(cond) = s.condition() {
        delete.cond_where(cond);
    }
    let res = driver.exec(driver.build(&delete)).await?;
    Ok(res.rows_affected())
}

fn shared_children(spec: &EdgeSpec, owners: usize) -> LumenError {
    LumenError::validation(
        spec.name,
        format!(
            "edge {:?} can not attach the same children to {} owners",
            spec.qualified_name(),
            owners
        ),
    )
}

/// Rejects attaching children when more than one owner would claim them
fn check_child_edges(owners: usize, edges: &[EdgeChange]) -> Result<()> {
    for change in edges {
        match &change.op {
            EdgeOp::Add(ids) if change.spec.rel == Rel::O2M && !ids.is_empty() && owners != 1 => {
                return Err(shared_children(change.spec, owners));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Applies one-to-many edge changes for `owners` to the child table
pub async fn apply_child_edges(driver: &Driver, owners: &[i64], edges: &[EdgeChange]) -> Result<()> {
    check_child_edges(owners.len(), edges)?;
    for change in edges {
        let spec = change.spec;
        if spec.rel != Rel::O2M {
            continue;
        }
        let fk = || column(spec.target_table, spec.column);
        let child_id = || column(spec.target_table, spec.target_id);
        let mut update = Query::update();
        update.table(Alias::new(spec.target_table));
        match &change.op {
            EdgeOp::Clear => {
                update
                    .value(Alias::new(spec.column), SimpleExpr::Keyword(Keyword::Null))
                    .and_where(fk().is_in(owners.iter().copied()));
            }
            EdgeOp::Remove(ids) => {
                if ids.is_empty() {
                    continue;
                }
                update
                    .value(Alias::new(spec.column), SimpleExpr::Keyword(Keyword::Null))
                    .and_where(child_id().is_in(ids.iter().copied()))
                    .and_where(fk().is_in(owners.iter().copied()));
            }
            EdgeOp::Add(ids) => {
                if ids.is_empty() {
                    continue;
                }
                let owner = match owners {
                    [owner] => *owner,
                    _ => return Err(shared_children(spec, owners.len())),
                };
                update
                    .value(Alias::new(spec.column), owner)
                    .and_where(child_id().is_in(ids.iter().copied()))
                    .and_where(fk().is_null().or(fk().eq(owner)));
                let res = driver.exec(driver.build(&update)).await?;
                let distinct = {
                    let mut ids = ids.clone();
                    ids.sort_unstable();
                    ids.dedup();
                    ids.len() as u64
                };
                if res.rows_affected() < distinct {
                    let message = format!(
                        "one of {:?} is already connected to a different {}",
                        ids, spec.owner
                    );
                    return Err(LumenError::Constraint {
                        source: sea_orm::DbErr::Custom(message.clone()),
                        message,
                    });
                }
                continue;
            }
            EdgeOp::Set(_) => continue,
        }
        driver.exec(driver.build(&update)).await?;
    }
    Ok(())
}

/// Selector over `T` restricted to the neighbours of the rows `from` selects
pub fn set_neighbors<T: Entity>(spec: &'static EdgeSpec, from: Selector) -> Selector {
    let mut from = from;
    let mut to = Selector::for_schema(T::SCHEMA);
    to.absorb_errors(&mut from);
    let cond = match spec.rel {
        Rel::M2O => {
            from.select([spec.column]);
            to.c(spec.target_id).in_subquery(from.into_statement())
        }
        Rel::O2M => {
            from.select([spec.owner_id]);
            to.c(spec.column).in_subquery(from.into_statement())
        }
    };
    to.where_(cond);
    to
}
