use crate::driver::Driver;
use crate::entity::Entity;
use crate::error::Result;
use crate::graph::{self, UpdateSpec};
use crate::hook::{Hook, Hooks, Mutator, Outcome};
use crate::mutation::{Mutation, MutationBuilder, Op};
use crate::predicate::Predicate;

fn update_spec<E: Entity>(m: &Mutation<E>) -> UpdateSpec {
    UpdateSpec {
        schema: E::SCHEMA,
        id: m.id(),
        predicates: m.predicates().iter().map(Predicate::func).collect(),
        assignments: m.update_assignments(),
        edges: m.child_edges(),
    }
}

/// Builder for updating every node that matches its predicates
pub struct Update<E: Entity> {
    driver: Driver,
    hooks: Hooks<E>,
    mutation: Mutation<E>,
}

impl<E: Entity> MutationBuilder<E> for Update<E> {
    fn mutation_mut(&mut self) -> &mut Mutation<E> {
        &mut self.mutation
    }
}

impl<E: Entity> Update<E> {
    pub fn new(driver: Driver, hooks: Hooks<E>) -> Self {
        Self {
            driver,
            hooks,
            mutation: Mutation::new(Op::Update),
        }
    }

    pub fn filter(mut self, predicate: Predicate<E>) -> Self {
        self.mutation.add_predicate(predicate);
        self
    }

    pub fn mutation(&self) -> &Mutation<E> {
        &self.mutation
    }

    pub fn hook(mut self, hook: Hook<E>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Runs the update and returns the number of matched nodes
    pub async fn save(self) -> Result<u64> {
        let driver = self.driver.clone();
        let base = Mutator::new(move |m: Mutation<E>| {
            let driver = driver.clone();
            async move {
                m.check()?;
                graph::update_nodes(&driver, update_spec(&m))
                    .await
                    .map(Outcome::Affected)
            }
        });
        let mutator = self.hooks.chain(base)?;
        mutator.mutate(self.mutation).await?.into_affected()
    }

    pub async fn save_x(self) -> u64 {
        match self.save().await {
            Ok(n) => n,
            Err(err) => panic!("{}", err),
        }
    }

    pub async fn exec(self) -> Result<()> {
        self.save().await.map(|_| ())
    }
}

/// Builder for updating one node by id
pub struct UpdateOne<E: Entity> {
    driver: Driver,
    hooks: Hooks<E>,
    mutation: Mutation<E>,
    fields: Vec<String>,
}

impl<E: Entity> MutationBuilder<E> for UpdateOne<E> {
    fn mutation_mut(&mut self) -> &mut Mutation<E> {
        &mut self.mutation
    }
}

impl<E: Entity> UpdateOne<E> {
    pub fn new(driver: Driver, hooks: Hooks<E>, id: i64) -> Self {
        let mut mutation = Mutation::new(Op::UpdateOne);
        mutation.set_id(id);
        Self {
            driver,
            hooks,
            mutation,
            fields: Vec::new(),
        }
    }

    /// Extra condition the node must satisfy; otherwise the update is `NotFound`
    pub fn filter(mut self, predicate: Predicate<E>) -> Self {
        self.mutation.add_predicate(predicate);
        self
    }

    /// Columns to read back into the returned node; the primary key is always read
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.fields
            .extend(columns.into_iter().map(|c| c.as_ref().to_string()));
        self
    }

    pub fn mutation(&self) -> &Mutation<E> {
        &self.mutation
    }

    pub fn hook(mut self, hook: Hook<E>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Runs the update and returns the node as stored afterwards
    pub async fn save(self) -> Result<E> {
        let schema = E::SCHEMA;
        let columns: Vec<String> = if self.fields.is_empty() {
            schema.columns.iter().map(|c| c.to_string()).collect()
        } else {
            let mut columns = vec![schema.id_column.to_string()];
            for f in &self.fields {
                if !columns.contains(f) {
                    columns.push(f.clone());
                }
            }
            columns
        };
        let driver = self.driver.clone();
        let base = Mutator::new(move |m: Mutation<E>| {
            let driver = driver.clone();
            let columns = columns.clone();
            async move {
                m.check()?;
                graph::update_node::<E>(&driver, update_spec(&m), columns)
                    .await
                    .map(Outcome::Node)
            }
        });
        let mutator = self.hooks.chain(base)?;
        mutator.mutate(self.mutation).await?.into_node()
    }

    pub async fn save_x(self) -> E {
        match self.save().await {
            Ok(node) => node,
            Err(err) => panic!("{}", err),
        }
    }

    pub async fn exec(self) -> Result<()> {
        self.save().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Client;
    use crate::predicate::eq;
    use crate::testing::{mock_client, transaction_log, post_row, Post, PostColumn, PostSetters, User, UserColumn, CREATOR_EDGE};
    use sea_orm::{DbBackend, MockDatabase, MockExecResult};

    #[tokio::test]
    async fn clearing_creator_is_rejected_before_sql() {
        let (client, conn) = mock_client(MockDatabase::new(DbBackend::Sqlite));
        let err = client
            .entity::<Post>()
            .update_one_id(1)
            .clear_edge(CREATOR_EDGE)
            .save()
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(
            err.to_string(),
            "lumen: clearing a required unique edge \"Post.creator\""
        );
        drop(client);
        assert!(transaction_log(conn).is_empty());
    }

    #[tokio::test]
    async fn missing_id_is_a_validation_error() {
        let conn = MockDatabase::new(DbBackend::Sqlite).into_connection();
        let client = Client::new(conn);
        let err = client
            .entity::<User>()
            .update_one_id(1)
            .hook(Hook::new(|next: Mutator<User>| {
                Mutator::new(move |m: Mutation<User>| {
                    let mut fresh = Mutation::new(Op::UpdateOne);
                    for (c, v) in m.fields() {
                        fresh.set_field(*c, v.clone());
                    }
                    next.mutate(fresh)
                })
            }))
            .set(UserColumn::Name, "x")
            .save()
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("missing User.id"));
    }

    #[tokio::test]
    async fn update_one_rereads_selected_fields() {
        let db = MockDatabase::new(DbBackend::Sqlite)
            .append_query_results([vec![post_row(5, "old", 1)]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .append_query_results([vec![post_row(5, "new", 1)]]);
        let (client, conn) = mock_client(db);
        let post = client
            .entity::<Post>()
            .update_one_id(5)
            .set_name("new")
            .select([PostColumn::Name])
            .save()
            .await
            .unwrap();
        assert_eq!(post.id, 5);
        assert_eq!(post.name, "new");
        drop(client);
        let log = transaction_log(conn);
        assert_eq!(log.len(), 3);
        let update = format!("{:?}", log[1]);
        assert!(update.contains(r#"UPDATE \"posts\" SET \"name\" = ?"#));
    }

    #[tokio::test]
    async fn update_counts_matched_rows() {
        let conn = MockDatabase::new(DbBackend::Sqlite)
            .append_query_results([vec![post_row(1, "a", 1), post_row(2, "a", 2)]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 2,
            }])
            .into_connection();
        let client = Client::new(conn);
        let n = client
            .entity::<Post>()
            .update()
            .filter(eq(PostColumn::Name, "a"))
            .set_name("b")
            .save()
            .await
            .unwrap();
        assert_eq!(n, 2);
    }

    #[tokio::test]
    async fn update_without_match_touches_nothing() {
        let db = MockDatabase::new(DbBackend::Sqlite)
            .append_query_results([Vec::<std::collections::BTreeMap<String, sea_orm::Value>>::new()]);
        let (client, conn) = mock_client(db);
        let n = client
            .entity::<Post>()
            .update()
            .filter(eq(PostColumn::Name, "missing"))
            .set_name("b")
            .save()
            .await
            .unwrap();
        assert_eq!(n, 0);
        drop(client);
        assert_eq!(transaction_log(conn).len(), 1);
    }
}
