//! Database adapter boundary.
//!
//! The core never executes SQL itself; every round trip goes through this
//! trait. Queries carry printf-style placeholders (`%s`/`%d`/`%f`) with the
//! bound values passed alongside, and the adapter owns escaping and
//! interpolation.

use crate::error::Result;
use crate::row::Row;
use crate::schema::SchemaInfo;
use crate::value::Value;

/// Abstract driver the persistence layer calls into.
pub trait DatabaseAdapter {
    /// Open the underlying connection.
    fn connect(&mut self) -> Result<()>;

    /// Close the underlying connection.
    fn disconnect(&mut self) -> Result<()>;

    /// Run a statement, returning the affected row count.
    fn execute(&mut self, query: &str, values: &[Value]) -> Result<u64>;

    /// Run a query, returning all result rows.
    fn fetch(&mut self, query: &str, values: &[Value]) -> Result<Vec<Row>>;

    /// Run a query, returning the first row if any.
    fn fetch_row(&mut self, query: &str, values: &[Value]) -> Result<Option<Row>> {
        Ok(self.fetch(query, values)?.into_iter().next())
    }

    /// Run a query, returning the first column of the first row if any.
    fn fetch_value(&mut self, query: &str, values: &[Value]) -> Result<Option<Value>> {
        Ok(self
            .fetch_row(query, values)?
            .and_then(|row| row.get(0).cloned()))
    }

    /// Escape a single value for literal inclusion.
    fn escape(&self, value: &Value) -> String;

    /// Host-wide table prefix (e.g. `wp_`).
    fn prefix(&self) -> &str;

    /// Charset/collation suffix for CREATE TABLE.
    fn charset_collate(&self) -> String;

    /// Delegate a schema migration to the host's mechanism.
    fn update_schema(&mut self, schema: &SchemaInfo) -> Result<()>;

    /// Begin a transaction. Used by the insert phase only.
    fn begin(&mut self) -> Result<()>;

    /// Commit the open transaction.
    fn commit(&mut self) -> Result<()>;

    /// Roll back the open transaction.
    fn rollback(&mut self) -> Result<()>;
}
