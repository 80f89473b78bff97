//! Table layout and construction-time schema validation
//!
//! The saver works against two fixed tables. Both are checked when the saver
//! is created so a wrong schema fails fast, before any read or write.
//!
//! ```text
//! {schema}.{table}            one row per (thread_id, checkpoint_ns, checkpoint_id)
//! {schema}.{table}_writes     one row per (thread_id, checkpoint_ns, checkpoint_id, task_id, idx)
//! ```

use crate::error::{AlloyDBError, Result};
use std::collections::BTreeSet;
use tracing::warn;

/// Columns required in the checkpoints table
pub const CHECKPOINTS_COLUMNS: [&str; 7] = [
    "thread_id",
    "checkpoint_ns",
    "checkpoint_id",
    "parent_checkpoint_id",
    "type",
    "checkpoint",
    "metadata",
];

/// Columns required in the checkpoint writes table
pub const CHECKPOINT_WRITES_COLUMNS: [&str; 8] = [
    "thread_id",
    "checkpoint_ns",
    "checkpoint_id",
    "task_id",
    "idx",
    "channel",
    "type",
    "blob",
];

/// Column names of a table as found in the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub schema_name: String,
    pub table_name: String,
    pub columns: BTreeSet<String>,
}

impl TableSchema {
    pub fn new<I, S>(schema_name: impl Into<String>, table_name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            schema_name: schema_name.into(),
            table_name: table_name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// A table with no columns means it does not exist
    pub fn exists(&self) -> bool {
        !self.columns.is_empty()
    }

    /// Required columns not present in this table, in declaration order
    pub fn missing<'a>(&self, required: &[&'a str]) -> Vec<&'a str> {
        required
            .iter()
            .copied()
            .filter(|column| !self.columns.contains(*column))
            .collect()
    }
}

/// The two tables backing the saver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointTable {
    Checkpoints,
    Writes,
}

impl CheckpointTable {
    pub fn required_columns(&self) -> &'static [&'static str] {
        match self {
            CheckpointTable::Checkpoints => &CHECKPOINTS_COLUMNS,
            CheckpointTable::Writes => &CHECKPOINT_WRITES_COLUMNS,
        }
    }

    /// `CREATE TABLE` statement for this table
    pub fn create_table_sql(&self, schema_name: &str, table_name: &str) -> String {
        let name = qualified_name(schema_name, table_name);
        match self {
            CheckpointTable::Checkpoints => format!(
                "CREATE TABLE {name} (\n    thread_id TEXT NOT NULL,\n    checkpoint_ns TEXT NOT NULL,\n    checkpoint_id TEXT NOT NULL,\n    parent_checkpoint_id TEXT,\n    type TEXT,\n    checkpoint JSONB NOT NULL,\n    metadata JSONB NOT NULL,\n    PRIMARY KEY (thread_id, checkpoint_ns, checkpoint_id)\n);"
            ),
            CheckpointTable::Writes => format!(
                "CREATE TABLE {name} (\n    thread_id TEXT NOT NULL,\n    checkpoint_ns TEXT NOT NULL,\n    checkpoint_id TEXT NOT NULL,\n    task_id TEXT NOT NULL,\n    idx INT NOT NULL,\n    channel TEXT NOT NULL,\n    type TEXT,\n    blob JSONB NOT NULL,\n    PRIMARY KEY (thread_id, checkpoint_ns, checkpoint_id, task_id, idx)\n);"
            ),
        }
    }

    /// Verify `schema` carries every required column.
    ///
    /// The error names the missing columns and carries the expected DDL.
    pub fn validate(&self, schema: &TableSchema) -> Result<()> {
        let required = self.required_columns();
        let missing = schema.missing(required);
        if missing.is_empty() {
            return Ok(());
        }

        warn!(
            schema = %schema.schema_name,
            table = %schema.table_name,
            missing = ?missing,
            "checkpoint table has incorrect schema"
        );

        Err(AlloyDBError::SchemaMismatch {
            table: schema.table_name.clone(),
            schema: schema.schema_name.clone(),
            found: schema.columns.iter().cloned().collect(),
            required: required.iter().map(|c| c.to_string()).collect(),
            missing: missing.into_iter().map(String::from).collect(),
            expected_ddl: self.create_table_sql(&schema.schema_name, &schema.table_name),
        })
    }
}

/// Quote an identifier for PostgreSQL, doubling embedded quotes
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// `"schema"."table"`
pub fn qualified_name(schema_name: &str, table_name: &str) -> String {
    format!("{}.{}", quote_ident(schema_name), quote_ident(table_name))
}
