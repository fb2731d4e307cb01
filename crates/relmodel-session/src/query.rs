//! Typed query execution.
//!
//! `Query<M>` wraps the statement builder with execution against a
//! `Session`: `build_query` renders the SQL, `get_result` runs it once and
//! memoizes the materialized instances, and every projection derives from
//! that memoized result without re-querying.

use crate::session::Session;
use relmodel_core::error::{Error, Result};
use relmodel_core::model::{Entity, Model, ModelRef};
use relmodel_core::value::Value;
use relmodel_query::builder::{BuiltQuery, GroupBuilder, QueryBuilder};
use relmodel_query::where_clause::ConditionValue;
use std::collections::BTreeMap;

/// A query against one model type.
pub struct Query<M: Entity> {
    builder: QueryBuilder,
    built: Option<BuiltQuery>,
    result: Option<Vec<ModelRef<M>>>,
    count: Option<i64>,
}

impl<M: Entity> Query<M> {
    pub fn new() -> Self {
        Query {
            builder: QueryBuilder::for_model::<M>(),
            built: None,
            result: None,
            count: None,
        }
    }

    /// Add a WHERE condition; see `QueryBuilder::where_`.
    pub fn where_(
        mut self,
        property: &str,
        value: impl Into<ConditionValue>,
        comparison: &str,
        connective: &str,
    ) -> Result<Self> {
        self.builder = self.builder.where_(property, value, comparison, connective)?;
        Ok(self)
    }

    /// Start a validated sub-tree against this model.
    pub fn group(&self) -> GroupBuilder {
        self.builder.group()
    }

    /// Attach a sub-tree with its connective.
    pub fn where_group(mut self, group: GroupBuilder, connective: &str) -> Result<Self> {
        self.builder = self.builder.where_group(group, connective)?;
        Ok(self)
    }

    /// Inner join; see `QueryBuilder::join`.
    pub fn join<T: Entity>(mut self, property: &str, target_property: &str) -> Result<Self> {
        self.builder = self.builder.join::<T>(property, target_property)?;
        Ok(self)
    }

    /// Left outer join.
    pub fn left_join<T: Entity>(mut self, property: &str, target_property: &str) -> Result<Self> {
        self.builder = self.builder.left_join::<T>(property, target_property)?;
        Ok(self)
    }

    /// Append to ORDER BY.
    pub fn order_by(mut self, property: &str, direction: &str) -> Result<Self> {
        self.builder = self.builder.order_by(property, direction)?;
        Ok(self)
    }

    /// Set LIMIT/OFFSET (silently ignored when invalid).
    pub fn limit(mut self, count: i64, offset: i64) -> Self {
        self.builder = self.builder.limit(count, offset);
        self
    }

    /// Render the statement. Must run before any result accessor.
    pub fn build_query(mut self, session: &mut Session) -> Result<Self> {
        self.built = Some(session.build(&self.builder)?);
        Ok(self)
    }

    /// The rendered SQL and parameters.
    pub fn built(&self) -> Result<&BuiltQuery> {
        self.built.as_ref().ok_or(Error::NoQueryBuilt)
    }

    /// Execute once and materialize; repeated calls return the memoized
    /// result. Every instance is registered as tracked. Returns an empty
    /// vec when nothing matches.
    pub fn get_result(&mut self, session: &mut Session) -> Result<Vec<ModelRef<M>>> {
        if let Some(result) = &self.result {
            return Ok(result.clone());
        }

        let built = self.built.as_ref().ok_or(Error::NoQueryBuilt)?;
        let rows = session.adapter_mut().fetch(&built.sql, &built.params)?;
        let result = session.materialize::<M>(built, &rows)?;

        self.result = Some(result.clone());
        Ok(result)
    }

    /// `SELECT COUNT(*)` over the same FROM/WHERE (memoized).
    pub fn get_count(&mut self, session: &mut Session) -> Result<i64> {
        if let Some(count) = self.count {
            return Ok(count);
        }

        let built = self.built.as_ref().ok_or(Error::NoQueryBuilt)?;
        let count = session
            .adapter_mut()
            .fetch_value(&built.count_sql, &built.params)?
            .and_then(|v| v.as_i64())
            .unwrap_or(0);

        self.count = Some(count);
        Ok(count)
    }

    /// First result, if any.
    pub fn single(&mut self, session: &mut Session) -> Result<Option<ModelRef<M>>> {
        Ok(self.get_result(session)?.into_iter().next())
    }

    /// Results keyed by primary key; unsaved instances are skipped.
    pub fn by_id(&mut self, session: &mut Session) -> Result<BTreeMap<i64, ModelRef<M>>> {
        let mut map = BTreeMap::new();
        for handle in self.get_result(session)? {
            let id = handle.read().expect("lock poisoned").id();
            if let Some(id) = id {
                map.insert(id, handle);
            }
        }
        Ok(map)
    }

    /// Plain keyed-value projection of each result row's mapped columns.
    pub fn value_maps(&mut self, session: &mut Session) -> Result<Vec<BTreeMap<&'static str, Value>>> {
        let mut maps = Vec::new();
        for handle in self.get_result(session)? {
            let guard = handle.read().expect("lock poisoned");
            maps.push(guard.column_values()?.into_iter().collect());
        }
        Ok(maps)
    }
}

impl<M: Entity> Default for Query<M> {
    fn default() -> Self {
        Self::new()
    }
}
