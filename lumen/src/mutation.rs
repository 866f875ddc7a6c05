//! Pending changes for one create, update or delete.
//!
//! A [`Mutation`] is what hooks see: they can inspect and rewrite field
//! assignments and edge changes before the base persistence call runs.

use sea_orm::sea_query::{Keyword, SimpleExpr};
use sea_orm::Value;

use crate::entity::{Column, Edge, Entity};
use crate::error::{LumenError, Result};
use crate::predicate::Predicate;
use crate::schema::{EdgeSpec, Rel};

/// Mutation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Create,
    Update,
    UpdateOne,
    Delete,
    DeleteOne,
}

impl Op {
    pub fn is_update(self) -> bool {
        matches!(self, Op::Update | Op::UpdateOne)
    }

    pub fn is_delete(self) -> bool {
        matches!(self, Op::Delete | Op::DeleteOne)
    }
}

/// Change to one edge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeOp {
    /// Point a many-to-one edge at a target
    Set(i64),
    /// Detach every neighbour
    Clear,
    /// Attach children over a one-to-many edge
    Add(Vec<i64>),
    /// Detach specific children over a one-to-many edge
    Remove(Vec<i64>),
}

#[derive(Debug, Clone)]
pub struct EdgeChange {
    pub spec: &'static EdgeSpec,
    pub op: EdgeOp,
}

#[derive(Debug, Clone)]
pub struct Mutation<E: Entity> {
    op: Op,
    id: Option<i64>,
    fields: Vec<(E::Column, Value)>,
    cleared: Vec<E::Column>,
    edges: Vec<EdgeChange>,
    predicates: Vec<Predicate<E>>,
}

impl<E: Entity> Mutation<E> {
    pub fn new(op: Op) -> Self {
        Self {
            op,
            id: None,
            fields: Vec::new(),
            cleared: Vec::new(),
            edges: Vec::new(),
            predicates: Vec::new(),
        }
    }

    pub fn op(&self) -> Op {
        self.op
    }

    /// Target id of an `UpdateOne` / `DeleteOne`
    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    pub fn fields(&self) -> &[(E::Column, Value)] {
        &self.fields
    }

    pub fn field(&self, column: E::Column) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(c, _)| *c == column)
            .map(|(_, v)| v)
    }

    pub fn cleared_fields(&self) -> &[E::Column] {
        &self.cleared
    }

    pub fn edges(&self) -> &[EdgeChange] {
        &self.edges
    }

    pub fn predicates(&self) -> &[Predicate<E>] {
        &self.predicates
    }

    /// Assigns a field; a later assignment of the same column wins
    pub fn set_field(&mut self, column: E::Column, value: Value) {
        self.cleared.retain(|c| *c != column);
        match self.fields.iter_mut().find(|(c, _)| *c == column) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((column, value)),
        }
    }

    /// Sets a nullable field to NULL
    pub fn clear_field(&mut self, column: E::Column) {
        self.fields.retain(|(c, _)| *c != column);
        if !self.cleared.contains(&column) {
            self.cleared.push(column);
        }
    }

    pub fn add_predicate(&mut self, predicate: Predicate<E>) {
        self.predicates.push(predicate);
    }

    pub fn set_edge(&mut self, spec: &'static EdgeSpec, id: i64) {
        self.edges.retain(|e| {
            e.spec.name != spec.name || matches!(e.op, EdgeOp::Add(_) | EdgeOp::Remove(_))
        });
        self.edges.push(EdgeChange {
            spec,
            op: EdgeOp::Set(id),
        });
    }

    pub fn clear_edge(&mut self, spec: &'static EdgeSpec) {
        if spec.rel == Rel::M2O {
            self.edges
                .retain(|e| e.spec.name != spec.name || !matches!(e.op, EdgeOp::Set(_)));
        }
        if !self.edge_cleared(spec) {
            self.edges.push(EdgeChange {
                spec,
                op: EdgeOp::Clear,
            });
        }
    }

    pub fn add_edge_ids(&mut self, spec: &'static EdgeSpec, ids: Vec<i64>) {
        self.edges.push(EdgeChange {
            spec,
            op: EdgeOp::Add(ids),
        });
    }

    pub fn remove_edge_ids(&mut self, spec: &'static EdgeSpec, ids: Vec<i64>) {
        self.edges.push(EdgeChange {
            spec,
            op: EdgeOp::Remove(ids),
        });
    }

    /// Target id a many-to-one edge is being pointed at, either through the edge
    /// itself or through a direct assignment of its column
    pub fn edge_id(&self, spec: &EdgeSpec) -> Option<i64> {
        let via_edge = self.edges.iter().rev().find_map(|e| match e.op {
            EdgeOp::Set(id) if e.spec.name == spec.name => Some(id),
            _ => None,
        });
        via_edge.or_else(|| {
            self.fields
                .iter()
                .find(|(c, _)| c.as_str() == spec.column)
                .and_then(|(_, v)| value_as_id(v))
        })
    }

    pub fn edge_cleared(&self, spec: &EdgeSpec) -> bool {
        self.edges
            .iter()
            .any(|e| e.spec.name == spec.name && e.op == EdgeOp::Clear)
    }

    /// Rejects changes that can never succeed before any statement is compiled
    pub fn check(&self) -> Result<()> {
        let schema = E::SCHEMA;
        for change in &self.edges {
            let spec = change.spec;
            if change.op == EdgeOp::Clear
                && spec.is_unique()
                && spec.required
                && self.edge_id(spec).is_none()
            {
                return Err(LumenError::validation(
                    spec.name,
                    format!("clearing a required unique edge {:?}", spec.qualified_name()),
                ));
            }
            if spec.rel == Rel::M2O && matches!(change.op, EdgeOp::Add(_) | EdgeOp::Remove(_)) {
                return Err(LumenError::validation(
                    spec.name,
                    format!("edge {:?} holds a single target", spec.qualified_name()),
                ));
            }
            if spec.rel == Rel::O2M && matches!(change.op, EdgeOp::Set(_)) {
                return Err(LumenError::validation(
                    spec.name,
                    format!("edge {:?} holds many targets", spec.qualified_name()),
                ));
            }
        }
        if self.op.is_update() {
            if let Some((column, _)) = self
                .fields
                .iter()
                .find(|(c, _)| c.as_str() == schema.id_column)
            {
                return Err(LumenError::validation(
                    column.as_str(),
                    format!("field \"{}.{}\" is immutable", schema.label, column.as_str()),
                ));
            }
        }
        for column in &self.cleared {
            let nullable = schema
                .field(column.as_str())
                .map(|f| f.nullable)
                .unwrap_or(false);
            if !nullable {
                return Err(LumenError::validation(
                    column.as_str(),
                    format!(
                        "clearing a non-nullable field \"{}.{}\"",
                        schema.label,
                        column.as_str()
                    ),
                ));
            }
        }
        if self.op == Op::Create {
            for field in schema.fields {
                if field.nullable || schema.edge_for_column(field.column).is_some() {
                    continue;
                }
                if !self.fields.iter().any(|(c, _)| c.as_str() == field.column) {
                    return Err(LumenError::validation(
                        field.column,
                        format!("missing required field \"{}.{}\"", schema.label, field.column),
                    ));
                }
            }
            for spec in schema.edges {
                if spec.rel == Rel::M2O && spec.required && self.edge_id(spec).is_none() {
                    return Err(LumenError::validation(
                        spec.name,
                        format!("missing required edge {:?}", spec.qualified_name()),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Values to INSERT, many-to-one edges folded into their columns
    pub(crate) fn insert_values(&self) -> Vec<(&'static str, Value)> {
        let mut values: Vec<(&'static str, Value)> = self
            .fields
            .iter()
            .map(|(c, v)| (c.as_str(), v.clone()))
            .collect();
        for change in &self.edges {
            if let (Rel::M2O, EdgeOp::Set(id)) = (change.spec.rel, &change.op) {
                values.retain(|(c, _)| *c != change.spec.column);
                values.push((change.spec.column, Value::BigInt(Some(*id))));
            }
        }
        values
    }

    /// SET clause of an UPDATE, including NULLs for cleared fields and edges
    pub(crate) fn update_assignments(&self) -> Vec<(&'static str, SimpleExpr)> {
        let mut sets: Vec<(&'static str, SimpleExpr)> = Vec::new();
        let mut assign = |column: &'static str, expr: SimpleExpr| {
            sets.retain(|(c, _)| *c != column);
            sets.push((column, expr));
        };
        for (c, v) in &self.fields {
            assign(c.as_str(), SimpleExpr::from(v.clone()));
        }
        for c in &self.cleared {
            assign(c.as_str(), SimpleExpr::Keyword(Keyword::Null));
        }
        for change in &self.edges {
            if change.spec.rel != Rel::M2O {
                continue;
            }
            match change.op {
                EdgeOp::Set(id) => assign(change.spec.column, SimpleExpr::from(id)),
                EdgeOp::Clear if self.edge_id(change.spec).is_none() => {
                    assign(change.spec.column, SimpleExpr::Keyword(Keyword::Null))
                }
                _ => {}
            }
        }
        sets
    }

    /// Follow-up changes to child tables over one-to-many edges
    pub(crate) fn child_edges(&self) -> Vec<EdgeChange> {
        self.edges
            .iter()
            .filter(|e| e.spec.rel == Rel::O2M)
            .cloned()
            .collect()
    }
}

pub(crate) fn value_as_id(value: &Value) -> Option<i64> {
    match value {
        Value::BigInt(Some(v)) => Some(*v),
        Value::Int(Some(v)) => Some(i64::from(*v)),
        Value::SmallInt(Some(v)) => Some(i64::from(*v)),
        Value::BigUnsigned(Some(v)) => i64::try_from(*v).ok(),
        Value::Unsigned(Some(v)) => Some(i64::from(*v)),
        _ => None,
    }
}

/// Setters shared by every builder that owns a [`Mutation`]
pub trait MutationBuilder<E: Entity>: Sized {
    fn mutation_mut(&mut self) -> &mut Mutation<E>;

    fn set(mut self, column: E::Column, value: impl Into<Value>) -> Self {
        self.mutation_mut().set_field(column, value.into());
        self
    }

    /// Sets `column` when `value` is present
    fn set_nillable(self, column: E::Column, value: Option<impl Into<Value>>) -> Self {
        match value {
            Some(v) => self.set(column, v),
            None => self,
        }
    }

    fn clear(mut self, column: E::Column) -> Self {
        self.mutation_mut().clear_field(column);
        self
    }

    fn set_edge<T: Entity>(mut self, edge: Edge<E, T>, id: i64) -> Self {
        self.mutation_mut().set_edge(edge.spec(), id);
        self
    }

    fn set_edge_node<T: Entity>(self, edge: Edge<E, T>, node: &T) -> Self {
        self.set_edge(edge, node.id())
    }

    fn clear_edge<T: Entity>(mut self, edge: Edge<E, T>) -> Self {
        self.mutation_mut().clear_edge(edge.spec());
        self
    }

    fn add_edge_ids<T: Entity>(mut self, edge: Edge<E, T>, ids: impl IntoIterator<Item = i64>) -> Self {
        self.mutation_mut()
            .add_edge_ids(edge.spec(), ids.into_iter().collect());
        self
    }

    fn add_edge_nodes<T: Entity>(self, edge: Edge<E, T>, nodes: &[T]) -> Self {
        self.add_edge_ids(edge, nodes.iter().map(Entity::id))
    }

    fn remove_edge_ids<T: Entity>(
        mut self,
        edge: Edge<E, T>,
        ids: impl IntoIterator<Item = i64>,
    ) -> Self {
        self.mutation_mut()
            .remove_edge_ids(edge.spec(), ids.into_iter().collect());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Post, PostColumn, User, UserColumn, CREATOR_EDGE, POSTS_EDGE};

    #[test]
    fn clearing_required_edge_without_replacement() {
        let mut m: Mutation<Post> = Mutation::new(Op::UpdateOne);
        m.clear_edge(CREATOR_EDGE.spec());
        let err = m.check().unwrap_err();
        assert!(err.is_validation());
        assert_eq!(
            err.to_string(),
            "lumen: clearing a required unique edge \"Post.creator\""
        );
    }

    #[test]
    fn clear_then_set_is_accepted() {
        let mut m: Mutation<Post> = Mutation::new(Op::Update);
        m.clear_edge(CREATOR_EDGE.spec());
        m.add_predicate(crate::predicate::id_eq(1));
        m.set_field(PostColumn::UserId, Value::BigInt(Some(9)));
        assert!(m.check().is_ok());
        let sets = m.update_assignments();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].0, "user_id");
    }

    #[test]
    fn set_edge_replaces_earlier_clear() {
        let mut m: Mutation<Post> = Mutation::new(Op::Update);
        m.clear_edge(CREATOR_EDGE.spec());
        m.set_edge(CREATOR_EDGE.spec(), 4);
        assert!(!m.edge_cleared(CREATOR_EDGE.spec()));
        assert_eq!(m.edge_id(CREATOR_EDGE.spec()), Some(4));
        assert!(m.check().is_ok());
    }

    #[test]
    fn create_requires_fields_and_edges() {
        let mut m: Mutation<Post> = Mutation::new(Op::Create);
        assert_eq!(
            m.check().unwrap_err().to_string(),
            "lumen: missing required field \"Post.name\""
        );
        m.set_field(PostColumn::Name, Value::from("hello"));
        assert_eq!(
            m.check().unwrap_err().to_string(),
            "lumen: missing required edge \"Post.creator\""
        );
        m.set_edge(CREATOR_EDGE.spec(), 1);
        assert!(m.check().is_ok());
        let values = m.insert_values();
        assert!(values.contains(&("user_id", Value::BigInt(Some(1)))));
    }

    #[test]
    fn id_is_immutable_on_update() {
        let mut m: Mutation<User> = Mutation::new(Op::Update);
        m.set_field(UserColumn::Id, Value::BigInt(Some(3)));
        assert!(m.check().unwrap_err().is_validation());
    }

    #[test]
    fn later_assignment_wins() {
        let mut m: Mutation<User> = Mutation::new(Op::Update);
        m.set_field(UserColumn::Name, Value::from("a"));
        m.set_field(UserColumn::Name, Value::from("b"));
        assert_eq!(m.fields().len(), 1);
        assert_eq!(m.field(UserColumn::Name), Some(&Value::from("b")));
    }

    #[test]
    fn one_to_many_changes_are_follow_ups() {
        let mut m: Mutation<User> = Mutation::new(Op::UpdateOne);
        m.add_edge_ids(POSTS_EDGE.spec(), vec![1, 2]);
        m.clear_edge(POSTS_EDGE.spec());
        assert!(m.update_assignments().is_empty());
        assert_eq!(m.child_edges().len(), 2);
        assert!(m.check().is_ok());
    }
}
