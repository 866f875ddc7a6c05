//! Typed query builder and batch relation loader over SeaORM connections.
//!
//! Entities are plain structs deriving [`Entity`]. A [`Client`] hands out
//! per-entity builders: [`Query`] for reads (predicates, ordering callbacks,
//! projections, eager loading and traversal) and [`Create`], [`Update`],
//! [`UpdateOne`], [`Delete`] for writes, the latter running through a hook chain.

extern crate self as lumen;

pub mod aggregate;
pub mod client;
pub mod config;
pub mod create;
pub mod delete;
pub mod driver;
pub mod entity;
pub mod error;
pub mod graph;
pub mod hook;
pub mod loader;
pub mod mutation;
pub mod order;
pub mod predicate;
pub mod query;
pub mod schema;
pub mod selector;
pub mod update;

#[cfg(test)]
mod testing;

pub use client::{Client, EntityClient};
pub use config::Config;
pub use create::{Create, CreateBulk};
pub use delete::{Delete, DeleteOne};
pub use driver::Driver;
pub use entity::{Column, Edge, Entity, Link, Loaded, LoadedMany};
pub use error::{LumenError, Result};
pub use hook::{Hook, Hooks, Mutator, Outcome};
pub use loader::EagerLoad;
pub use mutation::{EdgeOp, Mutation, MutationBuilder, Op};
pub use order::{Order, OrderFn};
pub use predicate::Predicate;
pub use query::{GroupBy, Query, Select};
pub use schema::{EdgeSpec, FieldSpec, Rel, TableSchema};
pub use selector::Selector;
pub use update::{Update, UpdateOne};

pub use lumen_macros::Entity;
pub use sea_orm;
