//! Query construction for relmodel.
//!
//! `relmodel-query` is the **statement construction layer**: composable
//! WHERE trees with per-condition connectives, join and left-join expansion,
//! the automatic translation shadow join, and `build_query` rendering one
//! SQL string plus an ordered parameter list. Execution and materialization
//! live in `relmodel-session`.

pub mod builder;
pub mod where_clause;

pub use builder::{
    BuildEnv, BuiltQuery, GroupBuilder, I18nSelection, JoinSelection, QueryBuilder, SelectPlan,
};
pub use where_clause::{Comparison, Condition, ConditionValue, Connective, RenderContext, Where};
