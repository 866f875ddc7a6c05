//! Mutation middleware.
//!
//! A [`Mutator`] performs a mutation; a [`Hook`] takes the next mutator and
//! returns one that wraps it. [`Hooks`] keeps them in registration order, the
//! first registered hook being the outermost.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::entity::Entity;
use crate::error::{LumenError, Result};
use crate::mutation::{Mutation, Op};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result of a mutation as seen by hooks
#[derive(Debug, Clone)]
pub enum Outcome<E> {
    /// Rows changed by a bulk update or delete
    Affected(u64),
    /// The created or updated node
    Node(E),
}

impl<E: Entity> Outcome<E> {
    pub fn into_node(self) -> Result<E> {
        match self {
            Outcome::Node(node) => Ok(node),
            Outcome::Affected(_) => Err(LumenError::UnexpectedMutation {
                label: E::SCHEMA.label,
                expected: "node",
            }),
        }
    }

    pub fn into_affected(self) -> Result<u64> {
        match self {
            Outcome::Affected(n) => Ok(n),
            Outcome::Node(_) => Err(LumenError::UnexpectedMutation {
                label: E::SCHEMA.label,
                expected: "affected rows",
            }),
        }
    }
}

type MutateFn<E> = dyn Fn(Mutation<E>) -> BoxFuture<'static, Result<Outcome<E>>> + Send + Sync;

pub struct Mutator<E: Entity>(Arc<MutateFn<E>>);

impl<E: Entity> Clone for Mutator<E> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<E: Entity> Mutator<E> {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Mutation<E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Outcome<E>>> + Send + 'static,
    {
        Self(Arc::new(move |m| Box::pin(f(m))))
    }

    pub fn mutate(&self, mutation: Mutation<E>) -> BoxFuture<'static, Result<Outcome<E>>> {
        (self.0)(mutation)
    }
}

pub struct Hook<E: Entity>(Arc<dyn Fn(Mutator<E>) -> Mutator<E> + Send + Sync>);

impl<E: Entity> Clone for Hook<E> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<E: Entity> fmt::Debug for Hook<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hook<{}>", E::SCHEMA.label)
    }
}

impl<E: Entity> Hook<E> {
    pub fn new(f: impl Fn(Mutator<E>) -> Mutator<E> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn wrap(&self, next: Mutator<E>) -> Mutator<E> {
        (self.0)(next)
    }

    /// Runs `hook` only for mutations of the given kinds
    pub fn on(ops: &'static [Op], hook: Hook<E>) -> Hook<E> {
        Hook::new(move |next: Mutator<E>| {
            let hooked = hook.wrap(next.clone());
            Mutator::new(move |m: Mutation<E>| {
                if ops.contains(&m.op()) {
                    hooked.mutate(m)
                } else {
                    next.mutate(m)
                }
            })
        })
    }
}

/// Ordered hook slots of one entity
pub struct Hooks<E: Entity> {
    slots: Vec<Option<Hook<E>>>,
}

impl<E: Entity> Default for Hooks<E> {
    fn default() -> Self {
        Self { slots: Vec::new() }
    }
}

impl<E: Entity> Clone for Hooks<E> {
    fn clone(&self) -> Self {
        Self {
            slots: self.slots.clone(),
        }
    }
}

impl<E: Entity> fmt::Debug for Hooks<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("label", &E::SCHEMA.label)
            .field("slots", &self.slots.len())
            .finish()
    }
}

impl<E: Entity> Hooks<E> {
    pub fn push(&mut self, hook: Hook<E>) {
        self.slots.push(Some(hook));
    }

    /// Declares a slot to be filled by [`Hooks::install`]; returns its index
    pub fn reserve(&mut self) -> usize {
        self.slots.push(None);
        self.slots.len() - 1
    }

    pub fn install(&mut self, slot: usize, hook: Hook<E>) -> Result<()> {
        match self.slots.get_mut(slot) {
            Some(entry) => {
                *entry = Some(hook);
                Ok(())
            }
            None => Err(LumenError::validation(
                "hook",
                format!("no hook slot {} reserved for {}", slot, E::SCHEMA.label),
            )),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Wraps `base` in every hook; an empty slot fails before anything runs
    pub fn chain(&self, base: Mutator<E>) -> Result<Mutator<E>> {
        let mut mutator = base;
        for (slot, hook) in self.slots.iter().enumerate().rev() {
            let hook = hook.as_ref().ok_or(LumenError::UninitializedHook {
                label: E::SCHEMA.label,
                slot,
            })?;
            mutator = hook.wrap(mutator);
        }
        log::trace!(target: "lumen::hook", "{} hooks chained for {}", self.slots.len(), E::SCHEMA.label);
        Ok(mutator)
    }
}
