//! Unit of work and persistence for relmodel.
//!
//! `relmodel-session` is the **runtime layer**. It coordinates object
//! identity, change tracking, and batched persistence:
//!
//! - **Tracked collection**: token-keyed entries classifying objects as
//!   new, clean, changed, or removed via snapshot comparison.
//! - **Session**: the caller-owned context threading the adapter, mapper
//!   cache, registry, and translation service through every operation;
//!   `flush()` applies queued changes as one batched statement per table in
//!   update → insert → delete order.
//! - **Query / Repository**: typed execution and materialization over the
//!   statement builder, registering every loaded instance as tracked.

pub mod query;
pub mod repository;
pub mod session;
pub mod tracker;

pub use query::Query;
pub use repository::Repository;
pub use session::Session;
pub use tracker::{ChangeKind, TableData, TrackedCollection};
