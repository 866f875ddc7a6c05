//! Batch loading of edges for a set of already fetched parents.
//!
//! Each requested edge costs exactly one extra statement no matter how many
//! parents there are; nested requests on the neighbour query recurse from there.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::entity::{Edge, Entity, Link, Loaded, LoadedMany};
use crate::error::{LumenError, Result};
use crate::predicate::{self, Predicate};
use crate::query::Query;
use crate::schema::EdgeSpec;

/// A pending eager-load request attached to a parent query
#[async_trait]
pub trait EagerLoad<P: Entity>: Send + Sync {
    fn edge(&self) -> &'static EdgeSpec;

    /// Column the parent query must project for the load to work, if any
    fn parent_column(&self) -> Option<&'static str>;

    async fn load(&self, parents: &mut [P]) -> Result<()>;

    fn boxed_clone(&self) -> Box<dyn EagerLoad<P>>;
}

pub(crate) struct EdgeLoad<P: Entity, T: Entity> {
    pub(crate) edge: Edge<P, T>,
    pub(crate) query: Query<T>,
}

#[async_trait]
impl<P: Entity, T: Entity> EagerLoad<P> for EdgeLoad<P, T> {
    fn edge(&self) -> &'static EdgeSpec {
        self.edge.spec()
    }

    fn parent_column(&self) -> Option<&'static str> {
        match self.edge.link() {
            Link::ManyToOne { .. } => Some(self.edge.spec().column),
            Link::OneToMany { .. } => None,
        }
    }

    async fn load(&self, parents: &mut [P]) -> Result<()> {
        let spec = self.edge.spec();
        log::trace!(
            target: "lumen::loader",
            "loading {} for {} parents",
            spec.qualified_name(),
            parents.len()
        );
        match self.edge.link() {
            Link::ManyToOne { foreign_key, slot } => {
                load_many_to_one(parents, spec, foreign_key, slot, &self.query).await
            }
            Link::OneToMany { foreign_key, slot } => {
                load_one_to_many(parents, spec, foreign_key, slot, &self.query).await
            }
        }
    }

    fn boxed_clone(&self) -> Box<dyn EagerLoad<P>> {
        Box::new(EdgeLoad {
            edge: self.edge,
            query: self.query.clone(),
        })
    }
}

/// Attaches the target of a many-to-one edge to every parent.
///
/// Parents sharing a foreign key share one lookup; a returned row whose id no
/// parent asked for is a consistency error.
pub async fn load_many_to_one<P: Entity, T: Entity>(
    parents: &mut [P],
    spec: &'static EdgeSpec,
    foreign_key: fn(&P) -> Option<i64>,
    slot: fn(&mut P) -> &mut Loaded<T>,
    query: &Query<T>,
) -> Result<()> {
    let mut ids: Vec<i64> = Vec::new();
    let mut buckets: HashMap<i64, Vec<usize>> = HashMap::new();
    for (i, parent) in parents.iter_mut().enumerate() {
        slot(parent).mark_loaded();
        if let Some(fk) = foreign_key(parent) {
            let bucket = buckets.entry(fk).or_default();
            if bucket.is_empty() {
                ids.push(fk);
            }
            bucket.push(i);
        }
    }
    if ids.is_empty() {
        return Ok(());
    }
    let neighbors = query.clone().filter(predicate::id_in(ids)).all().await?;
    for node in neighbors {
        let bucket = buckets.get(&node.id()).ok_or_else(|| {
            LumenError::consistency(format!(
                "unexpected foreign-key {:?} returned {}",
                spec.column,
                node.id()
            ))
        })?;
        for &i in bucket {
            slot(&mut parents[i]).set(node.clone());
        }
    }
    Ok(())
}

/// Pushes every child of a one-to-many edge onto its parent
pub async fn load_one_to_many<P: Entity, T: Entity>(
    parents: &mut [P],
    spec: &'static EdgeSpec,
    foreign_key: fn(&T) -> Option<i64>,
    slot: fn(&mut P) -> &mut LoadedMany<T>,
    query: &Query<T>,
) -> Result<()> {
    let mut ids: Vec<i64> = Vec::new();
    let mut index: HashMap<i64, Vec<usize>> = HashMap::new();
    for (i, parent) in parents.iter_mut().enumerate() {
        slot(parent).mark_loaded();
        let bucket = index.entry(parent.id()).or_default();
        if bucket.is_empty() {
            ids.push(parent.id());
        }
        bucket.push(i);
    }
    if ids.is_empty() {
        return Ok(());
    }
    let column = spec.column;
    let owned_by = Predicate::<T>::new(move |s| {
        let cond = s.c(column).is_in(ids.clone());
        s.where_(cond);
    });
    let children = query.clone().ensure_column(column).filter(owned_by).all().await?;
    for child in children {
        let fk = foreign_key(&child).ok_or_else(|| {
            LumenError::consistency(format!(
                "foreign-key {:?} is nil for {} {}",
                spec.column,
                spec.target,
                child.id()
            ))
        })?;
        let bucket = index.get(&fk).ok_or_else(|| {
            LumenError::consistency(format!(
                "unexpected foreign-key {:?} returned {}",
                spec.column, fk
            ))
        })?;
        for &i in bucket {
            slot(&mut parents[i]).push(child.clone());
        }
    }
    Ok(())
}
