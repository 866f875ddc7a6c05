use sea_orm::Value;

use crate::driver::Driver;
use crate::entity::Entity;
use crate::error::{LumenError, Result};
use crate::graph::{self, CreateSpec};
use crate::hook::{Hook, Hooks, Mutator, Outcome};
use crate::mutation::{Mutation, MutationBuilder, Op};

/// Builder for inserting one node
pub struct Create<E: Entity> {
    driver: Driver,
    hooks: Hooks<E>,
    mutation: Mutation<E>,
}

impl<E: Entity> MutationBuilder<E> for Create<E> {
    fn mutation_mut(&mut self) -> &mut Mutation<E> {
        &mut self.mutation
    }
}

impl<E: Entity> Create<E> {
    pub fn new(driver: Driver, hooks: Hooks<E>) -> Self {
        Self {
            driver,
            hooks,
            mutation: Mutation::new(Op::Create),
        }
    }

    pub fn mutation(&self) -> &Mutation<E> {
        &self.mutation
    }

    /// Adds a hook that only wraps this builder's save
    pub fn hook(mut self, hook: Hook<E>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Inserts the node and returns it with its assigned id
    pub async fn save(self) -> Result<E> {
        let driver = self.driver.clone();
        let base = Mutator::new(move |m: Mutation<E>| {
            let driver = driver.clone();
            async move { create_node(&driver, m).await.map(Outcome::Node) }
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

async fn create_node<E: Entity>(driver: &Driver, m: Mutation<E>) -> Result<E> {
    m.check()?;
    let schema = E::SCHEMA;
    let values = m.insert_values();
    let spec = CreateSpec {
        schema,
        values: values.clone(),
        edges: m.child_edges(),
    };
    let id = graph::create_node(driver, spec).await?;
    log::trace!(target: "lumen::mutation", "created {} {}", schema.label, id);

    let mut node = E::default();
    assign(&mut node, schema.id_column, Value::BigInt(Some(id)))?;
    for (column, value) in values {
        assign(&mut node, column, value)?;
    }
    Ok(node)
}

fn assign<E: Entity>(node: &mut E, column: &'static str, value: Value) -> Result<()> {
    node.assign_value(column, value).map_err(|_| {
        LumenError::validation(
            column,
            format!(
                "unexpected value type for field \"{}.{}\"",
                E::SCHEMA.label,
                column
            ),
        )
    })
}

/// Builder for inserting several nodes, each through its own hooks
pub struct CreateBulk<E: Entity> {
    builders: Vec<Create<E>>,
}

impl<E: Entity> CreateBulk<E> {
    pub fn new(builders: Vec<Create<E>>) -> Self {
        Self { builders }
    }

    pub async fn save(self) -> Result<Vec<E>> {
        let mut nodes = Vec::with_capacity(self.builders.len());
        for builder in self.builders {
            nodes.push(builder.save().await?);
        }
        Ok(nodes)
    }

    pub async fn save_x(self) -> Vec<E> {
        match self.save().await {
            Ok(nodes) => nodes,
            Err(err) => panic!("{}", err),
        }
    }

    pub async fn exec(self) -> Result<()> {
        self.save().await.map(|_| ())
    }
}
