use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::RwLock;
use sea_orm::DatabaseConnection;

use crate::config::Config;
use crate::create::{Create, CreateBulk};
use crate::delete::{Delete, DeleteOne};
use crate::driver::Driver;
use crate::entity::{Edge, Entity};
use crate::error::Result;
use crate::hook::{Hook, Hooks};
use crate::predicate;
use crate::query::Query;
use crate::update::{Update, UpdateOne};

type HookRegistry = HashMap<TypeId, Box<dyn Any + Send + Sync>>;

/// Entry point: a driver plus the hooks registered per entity
#[derive(Clone)]
pub struct Client {
    driver: Driver,
    hooks: Arc<RwLock<HookRegistry>>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("driver", &self.driver)
            .finish_non_exhaustive()
    }
}

impl Client {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self::with_config(conn, Config::default())
    }

    pub fn with_config(conn: DatabaseConnection, config: Config) -> Self {
        Self::from_shared(Arc::new(conn), config)
    }

    /// Client over a connection the caller keeps a handle to
    pub fn from_shared(conn: Arc<DatabaseConnection>, config: Config) -> Self {
        Self {
            driver: Driver::shared(conn, config),
            hooks: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// A client sharing hooks with this one that logs every statement
    pub fn debug(&self) -> Self {
        Self {
            driver: self.driver.debug(),
            hooks: Arc::clone(&self.hooks),
        }
    }

    pub fn driver(&self) -> &Driver {
        &self.driver
    }

    pub fn connection(&self) -> &DatabaseConnection {
        self.driver.connection()
    }

    pub fn entity<E: Entity>(&self) -> EntityClient<E> {
        EntityClient {
            client: self.clone(),
            _entity: PhantomData,
        }
    }

    /// Registers a hook for every mutation of `E` built afterwards
    pub fn use_hook<E: Entity>(&self, hook: Hook<E>) {
        self.update_hooks::<E, _>(|hooks| hooks.push(hook));
    }

    /// Declares a hook slot for `E` to be filled later with [`Client::install_hook`]
    pub fn reserve_hook<E: Entity>(&self) -> usize {
        self.update_hooks::<E, _>(|hooks| hooks.reserve())
    }

    pub fn install_hook<E: Entity>(&self, slot: usize, hook: Hook<E>) -> Result<()> {
        self.update_hooks::<E, _>(|hooks| hooks.install(slot, hook))
    }

    /// Snapshot of the hooks registered for `E`
    pub fn hooks<E: Entity>(&self) -> Hooks<E> {
        self.hooks
            .read()
            .get(&TypeId::of::<E>())
            .and_then(|h| h.downcast_ref::<Hooks<E>>())
            .cloned()
            .unwrap_or_default()
    }

    fn update_hooks<E: Entity, R>(&self, f: impl FnOnce(&mut Hooks<E>) -> R) -> R {
        let mut registry = self.hooks.write();
        let mut hooks = registry
            .remove(&TypeId::of::<E>())
            .and_then(|h| h.downcast::<Hooks<E>>().ok())
            .map(|h| *h)
            .unwrap_or_default();
        let res = f(&mut hooks);
        registry.insert(TypeId::of::<E>(), Box::new(hooks));
        res
    }
}

/// Builders for one entity
pub struct EntityClient<E: Entity> {
    client: Client,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Clone for EntityClient<E> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> EntityClient<E> {
    pub fn query(&self) -> Query<E> {
        Query::new(self.client.driver.clone())
    }

    pub fn create(&self) -> Create<E> {
        Create::new(self.client.driver.clone(), self.client.hooks::<E>())
    }

    pub fn create_bulk(&self, builders: Vec<Create<E>>) -> CreateBulk<E> {
        CreateBulk::new(builders)
    }

    pub fn update(&self) -> Update<E> {
        Update::new(self.client.driver.clone(), self.client.hooks::<E>())
    }

    pub fn update_one(&self, node: &E) -> UpdateOne<E> {
        self.update_one_id(node.id())
    }

    pub fn update_one_id(&self, id: i64) -> UpdateOne<E> {
        UpdateOne::new(self.client.driver.clone(), self.client.hooks::<E>(), id)
    }

    pub fn delete(&self) -> Delete<E> {
        Delete::new(self.client.driver.clone(), self.client.hooks::<E>())
    }

    pub fn delete_one(&self, node: &E) -> DeleteOne<E> {
        self.delete_one_id(node.id())
    }

    pub fn delete_one_id(&self, id: i64) -> DeleteOne<E> {
        DeleteOne::new(self.client.driver.clone(), self.client.hooks::<E>(), id)
    }

    /// The node with the given id
    pub async fn get(&self, id: i64) -> Result<E> {
        self.query().filter(predicate::id_eq(id)).only().await
    }

    pub async fn get_x(&self, id: i64) -> E {
        match self.get(id).await {
            Ok(node) => node,
            Err(err) => panic!("{}", err),
        }
    }

    /// Neighbours of `node` across `edge`
    pub fn query_edge_of<T: Entity>(&self, node: &E, edge: Edge<E, T>) -> Query<T> {
        self.query()
            .filter(predicate::id_eq(node.id()))
            .query_edge(edge)
    }

    pub fn use_hook(&self, hook: Hook<E>) {
        self.client.use_hook(hook);
    }
}
