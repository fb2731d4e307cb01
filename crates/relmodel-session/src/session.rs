//! Session context and batched persistence.
//!
//! `Session` is the explicit context object the caller constructs and
//! threads through every operation: it owns the database adapter, the
//! mapper cache, the model registry, the unit-of-work tracker, and the
//! optional translation service.
//!
//! `flush()` runs update, then insert, then delete, batching all rows of
//! one table into a single statement per phase. Only the insert phase is
//! wrapped in an adapter transaction; update and delete execute bare, which
//! means a failure mid-phase can leave earlier tables written.

use crate::tracker::{ChangeKind, TableData, TrackedCollection};
use relmodel_core::adapter::DatabaseAdapter;
use relmodel_core::error::{Error, Result};
use relmodel_core::i18n::TranslationService;
use relmodel_core::model::{
    Entity, Model, ModelRef, SharedModel, erase, read_model, write_model,
};
use relmodel_core::registry::ModelRegistry;
use relmodel_core::row::Row;
use relmodel_core::schema::SchemaInfo;
use relmodel_core::value::Value;
use relmodel_query::builder::{BuildEnv, BuiltQuery, QueryBuilder};
use relmodel_schema::Mapper;
use std::sync::Arc;

/// Context object owning every collaborator of one unit of work.
///
/// Not safe for concurrent mutation; confine one `Session` to one logical
/// unit of work at a time.
pub struct Session {
    adapter: Box<dyn DatabaseAdapter>,
    mapper: Mapper,
    registry: ModelRegistry,
    tracked: TrackedCollection,
    i18n: Option<Box<dyn TranslationService>>,
}

impl Session {
    /// Create a session over an adapter.
    pub fn new(adapter: Box<dyn DatabaseAdapter>) -> Self {
        Session {
            adapter,
            mapper: Mapper::new(),
            registry: ModelRegistry::new(),
            tracked: TrackedCollection::new(),
            i18n: None,
        }
    }

    /// Attach a translation service.
    pub fn with_translations(mut self, service: Box<dyn TranslationService>) -> Self {
        self.i18n = Some(service);
        self
    }

    /// Register a model type for name-based lookups.
    pub fn register<M: Entity>(&mut self) {
        self.registry.register::<M>();
    }

    /// Register a custom repository name.
    pub fn register_repository(&mut self, name: &'static str) {
        self.registry.register_repository(name);
    }

    /// The model registry.
    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Direct adapter access.
    pub fn adapter_mut(&mut self) -> &mut dyn DatabaseAdapter {
        self.adapter.as_mut()
    }

    /// Resolve a model type's schema through the session's mapper cache.
    pub fn schema<M: Entity>(&mut self) -> Result<Arc<SchemaInfo>> {
        self.mapper.resolve::<M>(&self.registry)
    }

    /// Full table name for a resolved schema, adapter prefix applied.
    pub fn table_name(&self, schema: &SchemaInfo) -> String {
        schema.table_name(self.adapter.prefix())
    }

    /// Queue a model to be INSERTed on the next `flush()`.
    pub fn persist<M: Entity>(&mut self, handle: &ModelRef<M>) {
        self.tracked.mark_new(erase(handle.clone()));
    }

    /// Queue a type-erased model to be INSERTed on the next `flush()`.
    pub fn persist_dyn(&mut self, handle: SharedModel) {
        self.tracked.mark_new(handle);
    }

    /// Start tracking a model known to exist in storage.
    pub fn track<M: Entity>(&mut self, handle: &ModelRef<M>) {
        self.tracked.mark_tracked(erase(handle.clone()));
    }

    /// Queue a model for deletion on the next `flush()`.
    pub fn remove<M: Entity>(&mut self, handle: &ModelRef<M>) {
        self.tracked.unmark(&erase(handle.clone()));
    }

    /// Drop a model from tracking entirely.
    pub fn clean<M: Entity>(&mut self, handle: &ModelRef<M>) {
        self.tracked.mark_clean(&erase(handle.clone()));
    }

    /// Whether a model is currently tracked.
    pub fn contains<M: Entity>(&self, handle: &ModelRef<M>) -> bool {
        self.tracked.contains(&erase(handle.clone()))
    }

    /// The unit-of-work tracker.
    pub fn tracked(&self) -> &TrackedCollection {
        &self.tracked
    }

    /// Apply all queued changes: update, then insert, then delete.
    ///
    /// One statement per table per phase. The insert phase assumes the
    /// engine allocates contiguous auto-increment ids for a multi-row
    /// insert (true for MySQL-style engines with the default autoinc lock
    /// mode); ids are assigned `first, first+1, ...` in submission order.
    pub fn flush(&mut self) -> Result<()> {
        self.flush_update()?;
        self.flush_insert()?;
        self.flush_delete()?;
        Ok(())
    }

    fn flush_update(&mut self) -> Result<()> {
        let prefix = self.adapter.prefix().to_string();
        let data = self
            .tracked
            .table_data(ChangeKind::Update, &mut self.mapper, &self.registry, &prefix)?;

        for (model, batch) in data {
            tracing::debug!(model, table = %batch.table_name, rows = batch.row_count, "flush update");

            let row = format!("({})", placeholder_list(&batch));
            let rows = vec![row; batch.row_count].join(", ");
            let update_set: Vec<String> = batch
                .columns
                .iter()
                .skip(1)
                .map(|c| format!("{}=VALUES({})", c, c))
                .collect();
            let sql = format!(
                "INSERT INTO {} ({}) VALUES {} ON DUPLICATE KEY UPDATE {};",
                batch.table_name,
                batch.columns.join(", "),
                rows,
                update_set.join(", ")
            );

            let affected = self.adapter.execute(&sql, &batch.values)?;
            if affected == 0 {
                return Err(Error::FailedToUpdate {
                    table: batch.table_name,
                });
            }

            for object in batch.objects {
                self.tracked.mark_tracked(object);
            }
        }

        Ok(())
    }

    fn flush_insert(&mut self) -> Result<()> {
        let prefix = self.adapter.prefix().to_string();
        let data = self
            .tracked
            .table_data(ChangeKind::Insert, &mut self.mapper, &self.registry, &prefix)?;

        for (model, batch) in data {
            tracing::debug!(model, table = %batch.table_name, rows = batch.row_count, "flush insert");

            self.adapter.begin()?;
            match self.insert_batch(&batch) {
                Ok(()) => self.adapter.commit()?,
                Err(error) => {
                    // Roll the transaction back before re-raising; a failed
                    // rollback must not mask the original failure.
                    let _ = self.adapter.rollback();
                    return Err(error);
                }
            }

            for object in batch.objects {
                self.tracked.mark_tracked(object);
            }
        }

        Ok(())
    }

    /// One table's batched insert, inside an open transaction: execute,
    /// read the first generated id and the affected count, verify, assign
    /// sequential ids.
    fn insert_batch(&mut self, batch: &TableData) -> Result<()> {
        let row = format!("({})", placeholder_list(batch));
        let rows = vec![row; batch.row_count].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES {};",
            batch.table_name,
            batch.columns.join(", "),
            rows
        );

        let affected = self.adapter.execute(&sql, &batch.values)?;
        let first_id = self
            .adapter
            .fetch_value("SELECT LAST_INSERT_ID()", &[])?
            .and_then(|v| v.as_i64())
            .unwrap_or(0);

        let submitted = batch.objects.len() as u64;
        if affected == 0 || affected != batch.row_count as u64 || affected != submitted {
            tracing::warn!(
                table = %batch.table_name,
                affected,
                submitted,
                "insert batch affected-row mismatch"
            );
            return Err(Error::FailedToInsert {
                table: batch.table_name.clone(),
            });
        }

        for (offset, object) in batch.objects.iter().enumerate() {
            let id = first_id + offset as i64;
            let mut guard = write_model(object);
            guard.base_mut().set_id(Some(id));

            // Link the translation shadow to its freshly assigned owner.
            if let Some(shadow) = guard.base().i18n() {
                drop(guard);
                write_model(&shadow).set("object_id", Value::Int(id))?;
            }
        }

        Ok(())
    }

    fn flush_delete(&mut self) -> Result<()> {
        let prefix = self.adapter.prefix().to_string();
        let data = self
            .tracked
            .table_data(ChangeKind::Remove, &mut self.mapper, &self.registry, &prefix)?;

        for (model, batch) in data {
            tracing::debug!(model, table = %batch.table_name, rows = batch.row_count, "flush delete");

            let placeholders = vec!["%d"; batch.row_count].join(", ");
            let sql = format!(
                "DELETE FROM {} WHERE ID IN ({});",
                batch.table_name, placeholders
            );

            let affected = self.adapter.execute(&sql, &batch.values)?;
            if affected == 0 {
                return Err(Error::FailedToDelete {
                    table: batch.table_name,
                });
            }

            for token in batch.tokens {
                self.tracked.remove_token(token);
            }
        }

        Ok(())
    }

    /// Render a built query through this session's mapper and adapter.
    pub(crate) fn build(&mut self, builder: &QueryBuilder) -> Result<BuiltQuery> {
        let mut env = BuildEnv {
            mapper: &mut self.mapper,
            registry: &self.registry,
            adapter_prefix: self.adapter.prefix(),
            i18n: self.i18n.as_deref(),
        };
        builder.build_query(&mut env)
    }

    /// Materialize result rows into tracked, typed instances.
    ///
    /// Every materialized instance (base, joined, shadow) registers as
    /// tracked, so a later mutation-then-flush is an UPDATE, never a
    /// duplicate INSERT.
    pub(crate) fn materialize<M: Entity>(
        &mut self,
        built: &BuiltQuery,
        rows: &[Row],
    ) -> Result<Vec<ModelRef<M>>> {
        let schema = self.mapper.resolve::<M>(&self.registry)?;
        let mut out = Vec::with_capacity(rows.len());

        for row in rows {
            let mut model = M::create();
            fill_from_row(&mut model, &schema, row, "")?;
            let handle = Arc::new(std::sync::RwLock::new(model));
            let dyn_handle: SharedModel = handle.clone();

            self.attach_row_extras(&dyn_handle, built, row, &schema)?;

            write_model(&dyn_handle).after_load();
            self.tracked.mark_tracked(dyn_handle);
            out.push(handle);
        }

        tracing::debug!(model = schema.model, rows = out.len(), "materialized result");
        Ok(out)
    }

    /// Materialize through the registry, for name-driven call sites.
    pub(crate) fn materialize_dyn(
        &mut self,
        model_name: &str,
        requester: &str,
        built: &BuiltQuery,
        rows: &[Row],
    ) -> Result<Vec<SharedModel>> {
        let schema = {
            let factory = self.registry.require(model_name, requester)?;
            self.mapper.resolve_decl(factory.decl(), &self.registry)?
        };
        let mut out = Vec::with_capacity(rows.len());

        for row in rows {
            let mut model = self.registry.require(model_name, requester)?.make();
            fill_from_row(model.as_mut(), &schema, row, "")?;
            let handle = model.into_shared();

            self.attach_row_extras(&handle, built, row, &schema)?;

            write_model(&handle).after_load();
            self.tracked.mark_tracked(handle.clone());
            out.push(handle);
        }

        Ok(out)
    }

    /// Construct, track, and attach joined instances and the translation
    /// shadow carried by one result row.
    fn attach_row_extras(
        &mut self,
        handle: &SharedModel,
        built: &BuiltQuery,
        row: &Row,
        schema: &SchemaInfo,
    ) -> Result<()> {
        for join in &built.plan.joins {
            let factory = self.registry.require(join.model, schema.model)?;
            let join_schema = self.mapper.resolve_decl(factory.decl(), &self.registry)?;
            let alias_prefix = format!("{}__", join.property);

            // A left-join miss leaves every aliased cell NULL; skip.
            if row_misses(row, &alias_prefix) {
                continue;
            }

            let mut related = factory.make();
            fill_from_row(related.as_mut(), &join_schema, row, &alias_prefix)?;
            let related = related.into_shared();
            self.tracked.mark_tracked(related.clone());
            write_model(handle)
                .base_mut()
                .cache_related(&join.property, related);
        }

        if let Some(i18n_plan) = &built.plan.i18n {
            let factory = self.registry.require(&i18n_plan.model, schema.model)?;
            let shadow_schema = self.mapper.resolve_decl(factory.decl(), &self.registry)?;

            if !row_misses(row, "i18n__") {
                let mut shadow = factory.make();
                fill_from_row(shadow.as_mut(), &shadow_schema, row, "i18n__")?;

                // Overlay translated columns onto the base instance.
                let mut guard = write_model(handle);
                for property in &i18n_plan.translated {
                    if let Some(value) = row.get_by_name(&format!("i18n__{}", property)) {
                        if !value.is_null() {
                            guard.set(property, value.clone())?;
                        }
                    }
                }
                drop(guard);

                let shadow = shadow.into_shared();
                self.tracked.mark_tracked(shadow.clone());
                write_model(handle).base_mut().set_i18n(shadow);
            }
        }

        Ok(())
    }

    /// Lazily resolve a many-to-one reference, caching on the instance.
    ///
    /// Returns `Ok(None)` when the property carries no many-to-one
    /// declaration or nothing matches the foreign key value.
    pub fn related_object(
        &mut self,
        handle: &SharedModel,
        property: &str,
    ) -> Result<Option<SharedModel>> {
        if let Some(cached) = read_model(handle).base().related(property) {
            return Ok(Some(cached));
        }

        let (decl, fk_value, requester) = {
            let guard = read_model(handle);
            (guard.decl(), guard.get(property)?, guard.model_name())
        };

        let schema = self.mapper.resolve_decl(decl, &self.registry)?;
        let Some(reference) = schema.column(property)?.many_to_one else {
            return Ok(None);
        };

        let found =
            self.find_single_dyn(reference.model, requester, reference.property, fk_value)?;

        if let Some(found) = &found {
            write_model(handle)
                .base_mut()
                .cache_related(property, found.clone());
        }
        Ok(found)
    }

    /// Associate a related instance with a many-to-one property: the
    /// property must be declared many-to-one, the instance must be of the
    /// declared target model, and the foreign key column takes the target's
    /// key value.
    pub fn set_related(
        &mut self,
        handle: &SharedModel,
        property: &str,
        target: &SharedModel,
    ) -> Result<()> {
        let decl = read_model(handle).decl();
        let schema = self.mapper.resolve_decl(decl, &self.registry)?;
        let reference =
            schema
                .column(property)?
                .many_to_one
                .ok_or_else(|| Error::NotManyToOneProperty {
                    property: property.to_string(),
                })?;

        let target_guard = read_model(target);
        if target_guard.model_name() != reference.model {
            return Err(Error::NotInstanceOfExpectedClass {
                expected: reference.model.to_string(),
                actual: target_guard.model_name(),
            });
        }
        let key_value = target_guard.get(reference.property)?;
        drop(target_guard);

        let mut guard = write_model(handle);
        guard.set(property, key_value)?;
        guard.base_mut().cache_related(property, target.clone());
        Ok(())
    }

    /// Find one instance of a named model by property equality.
    pub(crate) fn find_single_dyn(
        &mut self,
        model_name: &str,
        requester: &str,
        property: &str,
        value: Value,
    ) -> Result<Option<SharedModel>> {
        let decl = self.registry.require(model_name, requester)?.decl();

        let builder = QueryBuilder::for_decl(decl)
            .where_(property, value, "=", "AND")?
            .order_by("ID", "ASC")?;
        let built = self.build(&builder)?;

        let rows = self.adapter.fetch(&built.sql, &built.params)?;
        let mut found = self.materialize_dyn(model_name, requester, &built, &rows)?;
        Ok(if found.is_empty() {
            None
        } else {
            Some(found.remove(0))
        })
    }
}

/// Set every schema column present in the row (under an alias prefix) on
/// the instance.
pub(crate) fn fill_from_row(
    model: &mut dyn Model,
    schema: &SchemaInfo,
    row: &Row,
    alias_prefix: &str,
) -> Result<()> {
    for column in &schema.columns {
        let key = if alias_prefix.is_empty() {
            column.property.to_string()
        } else {
            format!("{}{}", alias_prefix, column.property)
        };
        if let Some(value) = row.get_by_name(&key) {
            model.set(column.property, value.clone())?;
        }
    }
    Ok(())
}

/// Whether an aliased sub-row is entirely absent (left-join miss): the
/// aliased ID cell is missing or NULL.
fn row_misses(row: &Row, alias_prefix: &str) -> bool {
    match row.get_by_name(&format!("{}ID", alias_prefix)) {
        Some(value) => value.is_null(),
        None => true,
    }
}

fn placeholder_list(batch: &TableData) -> String {
    batch
        .placeholders
        .iter()
        .map(|p| p.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
