//! Model trait and per-instance base state.
//!
//! Shared handles are `Arc<RwLock<_>>`: the unit-of-work tracker and the
//! caller both hold references to the same instance, so a mutation made
//! through one handle is what the next `flush()` sees.

use crate::decl::ModelDecl;
use crate::error::Result;
use crate::value::Value;
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Storage-independent identity ticket.
///
/// Assigned at construction from a process-local monotonic counter and never
/// changed afterward; keys the unit-of-work tracker and works before the
/// instance has a database ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectToken(u64);

impl ObjectToken {
    /// Take the next ticket.
    pub fn fresh() -> Self {
        ObjectToken(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed))
    }
}

/// A type-erased shared model handle.
pub type SharedModel = Arc<RwLock<dyn Model>>;

/// A typed shared model handle.
pub type ModelRef<M> = Arc<RwLock<M>>;

/// Per-instance state every entity embeds as its `base` field: the primary
/// key, the identity token, the related-object cache, and the attached
/// translation shadow instance.
#[derive(Clone)]
pub struct ModelBase {
    id: Option<i64>,
    token: ObjectToken,
    related: HashMap<String, SharedModel>,
    i18n: Option<SharedModel>,
}

impl ModelBase {
    pub fn new() -> Self {
        ModelBase {
            id: None,
            token: ObjectToken::fresh(),
            related: HashMap::new(),
            i18n: None,
        }
    }

    /// The primary key, if assigned.
    pub fn id(&self) -> Option<i64> {
        self.id
    }

    /// Assign the primary key. Done by the insert phase after a successful
    /// INSERT, and by the materializer when loading rows.
    pub fn set_id(&mut self, id: Option<i64>) {
        self.id = id;
    }

    /// Whether a non-zero primary key is assigned.
    pub fn has_id(&self) -> bool {
        matches!(self.id, Some(id) if id != 0)
    }

    /// The identity token.
    pub fn token(&self) -> ObjectToken {
        self.token
    }

    /// Cached related instance for a many-to-one property, if loaded.
    pub fn related(&self, property: &str) -> Option<SharedModel> {
        self.related.get(property).cloned()
    }

    /// Cache a related instance under its foreign-key property.
    pub fn cache_related(&mut self, property: &str, object: SharedModel) {
        self.related.insert(property.to_string(), object);
    }

    /// The attached translation shadow instance, if any.
    pub fn i18n(&self) -> Option<SharedModel> {
        self.i18n.clone()
    }

    /// Attach a translation shadow instance.
    pub fn set_i18n(&mut self, shadow: SharedModel) {
        self.i18n = Some(shadow);
    }
}

impl Default for ModelBase {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ModelBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelBase")
            .field("id", &self.id)
            .field("token", &self.token)
            .field("related", &self.related.len())
            .field("i18n", &self.i18n.is_some())
            .finish()
    }
}

/// Lifecycle hooks, overridable per model.
///
/// `#[derive(Entity)]` emits an empty impl unless the struct opts out with
/// `#[orm(custom_hooks)]` and provides its own.
pub trait ModelHooks {
    /// Runs right before the instance is queued for an insert/update batch.
    fn before_save(&mut self) {}

    /// Runs right after the instance is materialized from a database row.
    fn after_load(&mut self) {}
}

/// Object-safe model contract.
///
/// Implemented by `#[derive(Entity)]`; the generated `get`/`set` go through
/// a per-model property-name match, so the tracker and materializer can work
/// over heterogeneous models without knowing concrete types.
pub trait Model: Any + ModelHooks + Send + Sync {
    /// The static declaration this model was derived from.
    fn decl(&self) -> &'static ModelDecl;

    /// Base state (primary key, identity token, caches).
    fn base(&self) -> &ModelBase;

    /// Mutable base state.
    fn base_mut(&mut self) -> &mut ModelBase;

    /// Read a mapped property by name. Unknown names fail
    /// `PropertyDoesNotExist`; unset options read as `Value::Null`.
    fn get(&self, property: &str) -> Result<Value>;

    /// Write a mapped property by name, converting from a dynamic value.
    fn set(&mut self, property: &str, value: Value) -> Result<()>;

    /// Deep copy preserving the primary key (snapshot clone).
    fn boxed_clone(&self) -> Box<dyn Model>;

    /// Move a boxed instance into a shared handle.
    fn into_shared(self: Box<Self>) -> SharedModel;

    /// Upcast for concrete-type recovery.
    fn as_any(&self) -> &dyn Any;

    /// Model name from the declaration.
    fn model_name(&self) -> &'static str {
        self.decl().model
    }

    /// The primary key, if assigned.
    fn id(&self) -> Option<i64> {
        self.base().id()
    }

    /// The identity token.
    fn token(&self) -> ObjectToken {
        self.base().token()
    }

    /// Keyed values of every mapped column, in declaration order.
    fn column_values(&self) -> Result<Vec<(&'static str, Value)>> {
        self.decl()
            .columns
            .iter()
            .map(|(property, _)| Ok((*property, self.get(property)?)))
            .collect()
    }

    /// Field-by-field equality over mapped columns. Related-object caches
    /// and the i18n shadow never participate.
    fn same_mapped_state(&self, other: &dyn Model) -> bool {
        self.decl().columns.iter().all(|(property, _)| {
            matches!(
                (self.get(property), other.get(property)),
                (Ok(a), Ok(b)) if a == b
            )
        })
    }
}

/// Static companion to [`Model`] for typed call sites.
pub trait Entity: Model + Clone {
    /// The declaration emitted by the derive.
    const DECL: &'static ModelDecl;

    /// A blank instance with default field values and a fresh token.
    fn create() -> Self;

    /// Deep copy of all mapped columns except the primary key: a distinct
    /// new-record candidate with its own identity token.
    fn duplicate(&self) -> Self;
}

/// Wrap a model into a typed shared handle.
pub fn shared<M: Model + Sized>(model: M) -> ModelRef<M> {
    Arc::new(RwLock::new(model))
}

/// Coerce a typed handle into the type-erased form the tracker stores.
pub fn erase<M: Model>(handle: ModelRef<M>) -> SharedModel {
    handle
}

/// Read-lock a shared handle. Poisoning is unrecoverable here.
pub fn read_model(handle: &SharedModel) -> RwLockReadGuard<'_, dyn Model> {
    handle.read().expect("lock poisoned")
}

/// Write-lock a shared handle.
pub fn write_model(handle: &SharedModel) -> RwLockWriteGuard<'_, dyn Model> {
    handle.write().expect("lock poisoned")
}
