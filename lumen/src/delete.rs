use crate::driver::Driver;
use crate::entity::Entity;
use crate::error::{LumenError, Result};
use crate::graph;
use crate::hook::{Hook, Hooks, Mutator, Outcome};
use crate::mutation::{Mutation, Op};
use crate::predicate::{self, Predicate};

/// Builder for deleting every node that matches its predicates
pub struct Delete<E: Entity> {
    driver: Driver,
    hooks: Hooks<E>,
    mutation: Mutation<E>,
}

impl<E: Entity> Delete<E> {
    pub fn new(driver: Driver, hooks: Hooks<E>) -> Self {
        Self::with_op(driver, hooks, Op::Delete)
    }

    fn with_op(driver: Driver, hooks: Hooks<E>, op: Op) -> Self {
        Self {
            driver,
            hooks,
            mutation: Mutation::new(op),
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

    /// Deletes and returns the number of removed rows
    pub async fn exec(self) -> Result<u64> {
        let driver = self.driver.clone();
        let base = Mutator::new(move |m: Mutation<E>| {
            let driver = driver.clone();
            async move {
                let predicates: Vec<_> = m.predicates().iter().map(Predicate::func).collect();
                graph::delete_nodes(&driver, E::SCHEMA, &predicates)
                    .await
                    .map(Outcome::Affected)
            }
        });
        let mutator = self.hooks.chain(base)?;
        mutator.mutate(self.mutation).await?.into_affected()
    }

    pub async fn exec_x(self) -> u64 {
        match self.exec().await {
            Ok(n) => n,
            Err(err) => panic!("{}", err),
        }
    }
}

/// Builder for deleting one node by id
pub struct DeleteOne<E: Entity> {
    inner: Delete<E>,
}

impl<E: Entity> DeleteOne<E> {
    pub fn new(driver: Driver, hooks: Hooks<E>, id: i64) -> Self {
        let mut inner = Delete::with_op(driver, hooks, Op::DeleteOne);
        inner.mutation.set_id(id);
        inner.mutation.add_predicate(predicate::id_eq(id));
        Self { inner }
    }

    pub fn filter(mut self, predicate: Predicate<E>) -> Self {
        self.inner = self.inner.filter(predicate);
        self
    }

    pub fn hook(mut self, hook: Hook<E>) -> Self {
        self.inner = self.inner.hook(hook);
        self
    }

    /// Deletes the node; `NotFound` when it did not exist
    pub async fn exec(self) -> Result<()> {
        match self.inner.exec().await? {
            0 => Err(LumenError::NotFound {
                label: E::SCHEMA.label,
            }),
            _ => Ok(()),
        }
    }

    pub async fn exec_x(self) {
        if let Err(err) = self.exec().await {
            panic!("{}", err);
        }
    }
}
