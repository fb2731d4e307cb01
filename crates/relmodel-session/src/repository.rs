//! Finder facade.
//!
//! Thin wrappers that configure a `Query` and execute it; every finder
//! orders by `ID ASC`.

use crate::query::Query;
use crate::session::Session;
use relmodel_core::error::Result;
use relmodel_core::model::{Entity, ModelRef};
use relmodel_core::value::Value;
use std::marker::PhantomData;

/// Repository over one model type, borrowing the session it queries.
pub struct Repository<'a, M: Entity> {
    session: &'a mut Session,
    _marker: PhantomData<M>,
}

impl<'a, M: Entity> Repository<'a, M> {
    pub fn new(session: &'a mut Session) -> Self {
        Repository {
            session,
            _marker: PhantomData,
        }
    }

    /// Find a single object by primary key.
    pub fn find(&mut self, id: i64) -> Result<Option<ModelRef<M>>> {
        Query::<M>::new()
            .where_("ID", id, "=", "AND")?
            .order_by("ID", "ASC")?
            .build_query(self.session)?
            .single(self.session)
    }

    /// Return all objects of this type.
    pub fn find_all(&mut self) -> Result<Vec<ModelRef<M>>> {
        Query::<M>::new()
            .order_by("ID", "ASC")?
            .build_query(self.session)?
            .get_result(self.session)
    }

    /// All objects matching every property/value pair.
    pub fn find_by(&mut self, criteria: &[(&str, Value)]) -> Result<Vec<ModelRef<M>>> {
        let mut query = Query::<M>::new();
        for (property, value) in criteria {
            query = query.where_(property, value.clone(), "=", "AND")?;
        }
        query
            .order_by("ID", "ASC")?
            .build_query(self.session)?
            .get_result(self.session)
    }

    /// First object matching every property/value pair.
    pub fn find_single(&mut self, criteria: &[(&str, Value)]) -> Result<Option<ModelRef<M>>> {
        let mut query = Query::<M>::new();
        for (property, value) in criteria {
            query = query.where_(property, value.clone(), "=", "AND")?;
        }
        query
            .order_by("ID", "ASC")?
            .build_query(self.session)?
            .single(self.session)
    }

    /// All objects whose primary key is in the list.
    pub fn find_ids(&mut self, ids: &[i64]) -> Result<Vec<ModelRef<M>>> {
        let values: Vec<Value> = ids.iter().map(|id| Value::Int(*id)).collect();
        Query::<M>::new()
            .where_("ID", values, "IN", "AND")?
            .order_by("ID", "ASC")?
            .build_query(self.session)?
            .get_result(self.session)
    }

    /// Start a custom query against this model.
    pub fn query(&self) -> Query<M> {
        Query::new()
    }
}

impl Session {
    /// Repository facade for a model type.
    pub fn repository<M: Entity>(&mut self) -> Repository<'_, M> {
        Repository::new(self)
    }
}
