//! Unit-of-work tracking.
//!
//! `TrackedCollection` keys entries by identity token. An entry holds the
//! live reference and, when the object is known to exist in storage, a deep
//! snapshot taken at track time:
//!
//! - new: live reference only (INSERT candidate)
//! - tracked/clean: both, field-equal
//! - changed: both, unequal (UPDATE candidate)
//! - removed: snapshot only (DELETE candidate)
//!
//! Entries live in a `BTreeMap` so iteration follows token order, which is
//! submission order; the batched SQL and the sequential id assignment both
//! rely on that.

use relmodel_core::error::Result;
use relmodel_core::model::{Model, ObjectToken, SharedModel, read_model, write_model};
use relmodel_core::registry::ModelRegistry;
use relmodel_core::schema::Placeholder;
use relmodel_core::value::Value;
use relmodel_schema::Mapper;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

/// One tracked entry.
struct TrackedEntry {
    current: Option<SharedModel>,
    snapshot: Option<Box<dyn Model>>,
}

impl TrackedEntry {
    fn is_new(&self) -> bool {
        self.current.is_some() && self.snapshot.is_none()
    }

    fn is_removed(&self) -> bool {
        self.current.is_none() && self.snapshot.is_some()
    }

    fn is_changed(&self) -> bool {
        match (&self.current, &self.snapshot) {
            (Some(current), Some(snapshot)) => {
                !read_model(current).same_mapped_state(snapshot.as_ref())
            }
            _ => false,
        }
    }
}

/// Which filtered view of the collection to batch up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// New objects, no snapshot.
    Insert,
    /// Tracked objects whose current state differs from the snapshot.
    Update,
    /// Removed objects, snapshot only.
    Remove,
}

/// Per-table batch input for one flush phase: everything the persistence
/// manager needs to render one combined statement.
pub struct TableData {
    /// Live references (empty for the remove kind).
    pub objects: Vec<SharedModel>,
    /// Identity tokens, for post-phase bookkeeping.
    pub tokens: Vec<ObjectToken>,
    /// Full table name, prefixes applied.
    pub table_name: String,
    /// Ordered column names for this phase.
    pub columns: Vec<&'static str>,
    /// Placeholder classes matching `columns`.
    pub placeholders: Vec<Placeholder>,
    /// Number of rows batched.
    pub row_count: usize,
    /// Row values, flattened in row-major order.
    pub values: Vec<Value>,
}

/// Identity-keyed collection of tracked objects.
#[derive(Default)]
pub struct TrackedCollection {
    entries: BTreeMap<ObjectToken, TrackedEntry>,
}

impl TrackedCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an object with no snapshot: an INSERT candidate.
    /// Overwrites any prior entry for the same identity.
    pub fn mark_new(&mut self, object: SharedModel) {
        let token = read_model(&object).token();
        tracing::trace!(?token, "tracking new object");
        self.entries.insert(
            token,
            TrackedEntry {
                current: Some(object),
                snapshot: None,
            },
        );
    }

    /// Register an object together with a deep snapshot of its current
    /// state: considered in sync with storage.
    pub fn mark_tracked(&mut self, object: SharedModel) {
        let (token, snapshot) = {
            let guard = read_model(&object);
            (guard.token(), guard.boxed_clone())
        };
        tracing::trace!(?token, "tracking object with snapshot");
        self.entries.insert(
            token,
            TrackedEntry {
                current: Some(object),
                snapshot: Some(snapshot),
            },
        );
    }

    /// Remove an object from tracking entirely (post-DELETE bookkeeping).
    pub fn mark_clean(&mut self, object: &SharedModel) {
        let token = read_model(object).token();
        self.remove_token(token);
    }

    /// Remove an entry by token.
    pub fn remove_token(&mut self, token: ObjectToken) {
        tracing::trace!(?token, "untracking object");
        self.entries.remove(&token);
    }

    /// Queue an object for deletion: objects never persisted are dropped
    /// outright, otherwise only the live reference is cleared and the
    /// snapshot stays as the DELETE candidate.
    pub fn unmark(&mut self, object: &SharedModel) {
        let token = read_model(object).token();
        if let Some(entry) = self.entries.get_mut(&token) {
            if entry.snapshot.is_none() {
                self.entries.remove(&token);
            } else {
                entry.current = None;
            }
        }
    }

    /// Whether the object is currently tracked (any state).
    pub fn contains(&self, object: &SharedModel) -> bool {
        self.entries.contains_key(&read_model(object).token())
    }

    /// Number of tracked entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Objects to INSERT: live reference, no snapshot.
    pub fn persisted_objects(&self) -> impl Iterator<Item = &SharedModel> {
        self.entries
            .values()
            .filter(|e| e.is_new())
            .filter_map(|e| e.current.as_ref())
    }

    /// Objects to UPDATE: live and snapshot present, states unequal.
    pub fn changed_objects(&self) -> impl Iterator<Item = &SharedModel> {
        self.entries
            .values()
            .filter(|e| e.is_changed())
            .filter_map(|e| e.current.as_ref())
    }

    /// Snapshots to DELETE: snapshot present, live reference gone.
    pub fn removed_objects(&self) -> impl Iterator<Item = &dyn Model> {
        self.entries
            .values()
            .filter(|e| e.is_removed())
            .filter_map(|e| e.snapshot.as_deref())
    }

    /// Group one filtered view by concrete model type into per-table batch
    /// data. Each model type maps to its own table and column set, so the
    /// grouping key is the model name.
    ///
    /// For the insert/update kinds, each object's `before_save` hook runs as
    /// it is queued.
    pub fn table_data(
        &self,
        kind: ChangeKind,
        mapper: &mut Mapper,
        registry: &ModelRegistry,
        adapter_prefix: &str,
    ) -> Result<BTreeMap<&'static str, TableData>> {
        match kind {
            ChangeKind::Insert | ChangeKind::Update => {
                self.insert_update_table_data(kind, mapper, registry, adapter_prefix)
            }
            ChangeKind::Remove => self.remove_table_data(mapper, registry, adapter_prefix),
        }
    }

    fn insert_update_table_data(
        &self,
        kind: ChangeKind,
        mapper: &mut Mapper,
        registry: &ModelRegistry,
        adapter_prefix: &str,
    ) -> Result<BTreeMap<&'static str, TableData>> {
        let mut data: BTreeMap<&'static str, TableData> = BTreeMap::new();

        let entries = self.entries.values().filter(|e| match kind {
            ChangeKind::Insert => e.is_new(),
            ChangeKind::Update => e.is_changed(),
            ChangeKind::Remove => unreachable!(),
        });

        for entry in entries {
            let Some(object) = &entry.current else {
                continue;
            };

            write_model(object).before_save();

            let guard = read_model(object);
            let decl = guard.decl();
            let schema = mapper.resolve_decl(decl, registry)?;

            let batch = match data.entry(decl.model) {
                Entry::Occupied(occupied) => occupied.into_mut(),
                Entry::Vacant(vacant) => {
                    // Inserts never carry the primary key (the engine
                    // assigns it); updates lead with it so the upsert can
                    // match existing rows.
                    let mut columns: Vec<&'static str> = Vec::new();
                    let mut placeholders: Vec<Placeholder> = Vec::new();
                    if kind == ChangeKind::Update {
                        columns.push("ID");
                        placeholders.push(Placeholder::Int);
                    }
                    for column in schema.update_columns().filter(|c| !c.primary) {
                        columns.push(column.property);
                        placeholders.push(column.placeholder);
                    }

                    vacant.insert(TableData {
                        objects: Vec::new(),
                        tokens: Vec::new(),
                        table_name: schema.table_name(adapter_prefix),
                        columns,
                        placeholders,
                        row_count: 0,
                        values: Vec::new(),
                    })
                }
            };

            let mut row_values = Vec::with_capacity(batch.columns.len());
            for column in &batch.columns {
                row_values.push(guard.get(column)?);
            }
            batch.values.extend(row_values);
            batch.row_count += 1;
            batch.tokens.push(guard.token());
            drop(guard);
            batch.objects.push(object.clone());
        }

        Ok(data)
    }

    fn remove_table_data(
        &self,
        mapper: &mut Mapper,
        registry: &ModelRegistry,
        adapter_prefix: &str,
    ) -> Result<BTreeMap<&'static str, TableData>> {
        let mut data: BTreeMap<&'static str, TableData> = BTreeMap::new();

        for entry in self.entries.values().filter(|e| e.is_removed()) {
            let Some(snapshot) = entry.snapshot.as_deref() else {
                continue;
            };

            let decl = snapshot.decl();
            let schema = mapper.resolve_decl(decl, registry)?;

            let batch = data.entry(decl.model).or_insert_with(|| TableData {
                objects: Vec::new(),
                tokens: Vec::new(),
                table_name: schema.table_name(adapter_prefix),
                columns: vec!["ID"],
                placeholders: vec![Placeholder::Int],
                row_count: 0,
                values: Vec::new(),
            });

            batch.values.push(Value::from(snapshot.id()));
            batch.row_count += 1;
            batch.tokens.push(snapshot.token());
        }

        Ok(data)
    }
}
