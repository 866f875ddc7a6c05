use std::fmt;

use sea_orm::sea_query::ValueTypeErr;
use sea_orm::{DbErr, QueryResult, Value};

use crate::error::{LumenError, Result};
use crate::schema::{EdgeSpec, TableSchema};

/// A typed row with an integer identity, implemented by `#[derive(Entity)]`
pub trait Entity: Clone + Default + fmt::Debug + Send + Sync + 'static {
    type Column: Column;

    const SCHEMA: &'static TableSchema;

    fn id(&self) -> i64;

    /// Reads `column` from a result row into the matching field
    fn assign(&mut self, column: &str, row: &QueryResult) -> std::result::Result<(), DbErr>;

    /// Writes an already bound value into the matching field
    fn assign_value(
        &mut self,
        column: &str,
        value: Value,
    ) -> std::result::Result<(), ValueTypeErr>;

    /// Scans a row holding `columns` into a fresh entity
    fn scan(columns: &[String], row: &QueryResult) -> Result<Self> {
        let mut node = Self::default();
        for column in columns {
            node.assign(column, row)?;
        }
        Ok(node)
    }
}

/// Column enum of one entity
pub trait Column: Copy + fmt::Debug + PartialEq + Eq + AsRef<str> + Send + Sync + 'static {
    type Entity: Entity;

    fn as_str(&self) -> &'static str;

    fn all() -> &'static [Self];
}

/// Accessors that connect an [`EdgeSpec`] to concrete entity types
pub enum Link<P, T> {
    ManyToOne {
        foreign_key: fn(&P) -> Option<i64>,
        slot: fn(&mut P) -> &mut Loaded<T>,
    },
    OneToMany {
        foreign_key: fn(&T) -> Option<i64>,
        slot: fn(&mut P) -> &mut LoadedMany<T>,
    },
}

impl<P, T> Clone for Link<P, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P, T> Copy for Link<P, T> {}

/// Typed handle for an edge from `P` to `T`
pub struct Edge<P, T> {
    spec: &'static EdgeSpec,
    link: Link<P, T>,
}

impl<P, T> Edge<P, T> {
    pub const fn many_to_one(
        spec: &'static EdgeSpec,
        foreign_key: fn(&P) -> Option<i64>,
        slot: fn(&mut P) -> &mut Loaded<T>,
    ) -> Self {
        Self {
            spec,
            link: Link::ManyToOne { foreign_key, slot },
        }
    }

    pub const fn one_to_many(
        spec: &'static EdgeSpec,
        foreign_key: fn(&T) -> Option<i64>,
        slot: fn(&mut P) -> &mut LoadedMany<T>,
    ) -> Self {
        Self {
            spec,
            link: Link::OneToMany { foreign_key, slot },
        }
    }

    pub fn spec(&self) -> &'static EdgeSpec {
        self.spec
    }

    pub fn link(&self) -> Link<P, T> {
        self.link
    }
}

impl<P, T> Clone for Edge<P, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P, T> Copy for Edge<P, T> {}

impl<P, T> fmt::Debug for Edge<P, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Edge").field(&self.spec.qualified_name()).finish()
    }
}

/// Slot for a single-valued edge that tells "not loaded" apart from "loaded, absent"
#[derive(Clone, Debug)]
pub struct Loaded<T> {
    loaded: bool,
    value: Option<Box<T>>,
}

impl<T> Default for Loaded<T> {
    fn default() -> Self {
        Self {
            loaded: false,
            value: None,
        }
    }
}

impl<T> Loaded<T> {
    /// Returns the neighbour, `NotLoaded` if it was never requested, `NotFound` if it was
    /// requested and absent.
    pub fn get(&self, spec: &EdgeSpec) -> Result<&T> {
        match (&self.value, self.loaded) {
            (Some(value), _) => Ok(&**value),
            (None, true) => Err(LumenError::NotFound { label: spec.target }),
            (None, false) => Err(LumenError::NotLoaded { edge: spec.name }),
        }
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_deref()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn mark_loaded(&mut self) {
        self.loaded = true;
        self.value = None;
    }

    pub fn set(&mut self, value: T) {
        self.loaded = true;
        self.value = Some(Box::new(value));
    }
}

/// Slot for a multi-valued edge
#[derive(Clone, Debug)]
pub struct LoadedMany<T> {
    loaded: bool,
    values: Vec<T>,
}

impl<T> Default for LoadedMany<T> {
    fn default() -> Self {
        Self {
            loaded: false,
            values: Vec::new(),
        }
    }
}

impl<T> LoadedMany<T> {
    pub fn get(&self, spec: &EdgeSpec) -> Result<&[T]> {
        if self.loaded {
            Ok(&self.values)
        } else {
            Err(LumenError::NotLoaded { edge: spec.name })
        }
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn mark_loaded(&mut self) {
        self.loaded = true;
        self.values.clear();
    }

    pub fn push(&mut self, value: T) {
        self.loaded = true;
        self.values.push(value);
    }
}
