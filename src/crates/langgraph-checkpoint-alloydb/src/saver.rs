//! [`CheckpointSaver`] backed by AlloyDB for PostgreSQL
//!
//! Checkpoints live in `{schema}.{table}`, pending writes in
//! `{schema}.{table}_writes`. Both tables must exist before a saver is
//! created; see [`AlloyDBEngine::init_checkpoint_tables`].
//!
//! # Example
//!
//! ```rust,no_run
//! use langgraph_checkpoint::{Checkpoint, CheckpointConfig, CheckpointMetadata, CheckpointSaver};
//! use langgraph_checkpoint_alloydb::{AlloyDBEngine, AlloyDBSaver, EngineConfig};
//! use std::collections::HashMap;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = AlloyDBEngine::connect(EngineConfig::new("postgres://localhost/graphs")).await?;
//! let saver = AlloyDBSaver::create(&engine).await?;
//!
//! let config = CheckpointConfig::new().with_thread_id("thread-1");
//! let next = saver
//!     .put(&config, Checkpoint::empty(), CheckpointMetadata::new(), HashMap::new())
//!     .await?;
//! assert!(saver.get_tuple(&next).await?.is_some());
//! # Ok(())
//! # }
//! ```

use crate::encoding::{dump_checkpoint, dump_metadata, dump_writes, WriteConflict, WriteTarget};
use crate::engine::AlloyDBEngine;
use crate::error::{AlloyDBError, Result};
use crate::models::{CheckpointRow, WriteRecord};
use crate::queries::Queries;
use crate::schema::CheckpointTable;
use async_trait::async_trait;
use futures::stream;
use langgraph_checkpoint::{
    writes::TASKS, ChannelVersions, Checkpoint, CheckpointConfig, CheckpointError,
    CheckpointMetadata, CheckpointSaver, CheckpointStream, CheckpointTuple, JsonPlusSerializer,
    PendingWrite, SerializerProtocol,
};
use sqlx::{postgres::PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info, instrument};

/// Checkpoint saver over a pair of AlloyDB tables.
///
/// Only constructed through the async `create*` functions, which verify the
/// table layout first.
#[derive(Clone)]
pub struct AlloyDBSaver<S = JsonPlusSerializer> {
    pool: PgPool,
    schema_name: String,
    table_name: String,
    table_name_writes: String,
    queries: Queries,
    serde: S,
}

impl<S> fmt::Debug for AlloyDBSaver<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlloyDBSaver")
            .field("schema_name", &self.schema_name)
            .field("table_name", &self.table_name)
            .field("table_name_writes", &self.table_name_writes)
            .finish_non_exhaustive()
    }
}

impl AlloyDBSaver<JsonPlusSerializer> {
    /// Create a saver on the tables named by the engine's configuration
    pub async fn create(engine: &AlloyDBEngine) -> Result<Self> {
        let config = engine.config();
        Self::create_with_serde(
            engine,
            &config.table_name,
            &config.schema_name,
            JsonPlusSerializer::new(),
        )
        .await
    }

    /// Create a saver on `schema_name.table_name` and its writes table
    pub async fn create_with_table(
        engine: &AlloyDBEngine,
        table_name: &str,
        schema_name: &str,
    ) -> Result<Self> {
        Self::create_with_serde(engine, table_name, schema_name, JsonPlusSerializer::new()).await
    }
}

impl<S: SerializerProtocol> AlloyDBSaver<S> {
    /// Create a saver with a custom serializer.
    ///
    /// Fails with [`crate::AlloyDBError::SchemaMismatch`] if either table is
    /// missing or lacks a required column.
    #[instrument(skip(engine, serde))]
    pub async fn create_with_serde(
        engine: &AlloyDBEngine,
        table_name: &str,
        schema_name: &str,
        serde: S,
    ) -> Result<Self> {
        let table_name_writes = crate::config::writes_table_name(table_name);

        let checkpoints = engine.load_table_schema(table_name, schema_name).await?;
        CheckpointTable::Checkpoints.validate(&checkpoints)?;

        let writes = engine.load_table_schema(&table_name_writes, schema_name).await?;
        CheckpointTable::Writes.validate(&writes)?;

        info!(%table_name_writes, "checkpoint saver ready");

        Ok(Self {
            pool: engine.pool().clone(),
            queries: Queries::new(schema_name, table_name, &table_name_writes),
            schema_name: schema_name.to_string(),
            table_name: table_name.to_string(),
            table_name_writes,
            serde,
        })
    }

    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn table_name_writes(&self) -> &str {
        &self.table_name_writes
    }

    #[instrument(skip(self, checkpoint, metadata), fields(checkpoint_id = %checkpoint.id))]
    async fn put_checkpoint(
        &self,
        config: &CheckpointConfig,
        checkpoint: Checkpoint,
        metadata: &CheckpointMetadata,
    ) -> Result<CheckpointConfig> {
        let thread_id = require_thread_id(config)?;
        let checkpoint_ns = config.namespace().to_string();
        let parent_checkpoint_id = config.resolved_checkpoint_id().map(String::from);
        let checkpoint_id = checkpoint.id.clone();

        let checkpoint_json = dump_checkpoint(checkpoint)?;
        let metadata_json = dump_metadata(&self.serde, metadata)?;

        let mut tx = self.pool.begin().await?;
        sqlx::query(self.queries.upsert_checkpoint())
            .bind(thread_id)
            .bind(&checkpoint_ns)
            .bind(&checkpoint_id)
            .bind(parent_checkpoint_id.as_deref())
            .bind(checkpoint_json)
            .bind(metadata_json)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        debug!(thread_id, parent = ?parent_checkpoint_id, "stored checkpoint");

        Ok(CheckpointConfig::new()
            .with_thread_id(thread_id)
            .with_checkpoint_ns(checkpoint_ns)
            .with_checkpoint_id(checkpoint_id))
    }

    #[instrument(skip(self, config, writes), fields(count = writes.len()))]
    async fn put_write_rows(
        &self,
        config: &CheckpointConfig,
        writes: &[(String, serde_json::Value)],
        task_id: &str,
        task_path: &str,
    ) -> Result<()> {
        if writes.is_empty() {
            return Ok(());
        }

        let thread_id = require_thread_id(config)?;
        let checkpoint_id = config.resolved_checkpoint_id().ok_or_else(|| {
            CheckpointError::Invalid("checkpoint_id is required to store writes".to_string())
        })?;

        let conflict = WriteConflict::for_writes(writes);
        let target = WriteTarget {
            thread_id,
            checkpoint_ns: config.namespace(),
            checkpoint_id,
            task_id,
            task_path,
        };
        let rows = dump_writes(&self.serde, target, writes)?;
        let statement = self.queries.put_writes(conflict);

        let mut tx = self.pool.begin().await?;
        for row in rows {
            sqlx::query(statement)
                .bind(row.thread_id)
                .bind(row.checkpoint_ns)
                .bind(row.checkpoint_id)
                .bind(row.task_id)
                .bind(row.idx)
                .bind(row.channel)
                .bind(row.type_tag)
                .bind(row.blob)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        debug!(?conflict, "stored pending writes");
        Ok(())
    }

    /// Writes stored against `checkpoint_id`, ordered by task and index
    async fn load_writes(
        &self,
        thread_id: &str,
        checkpoint_ns: &str,
        checkpoint_id: &str,
    ) -> Result<Vec<PendingWrite>> {
        let records: Vec<WriteRecord> = sqlx::query_as(self.queries.select_writes())
            .bind(thread_id)
            .bind(checkpoint_ns)
            .bind(checkpoint_id)
            .fetch_all(&self.pool)
            .await?;

        records
            .into_iter()
            .map(|record| record.into_pending_write(&self.serde).map_err(AlloyDBError::from))
            .collect()
    }

    /// Sends a checkpoint inherits from task writes on its parent
    async fn load_pending_sends(
        &self,
        thread_id: &str,
        checkpoint_ns: &str,
        parent_checkpoint_id: &str,
    ) -> Result<Vec<serde_json::Value>> {
        let records: Vec<WriteRecord> = sqlx::query_as(self.queries.select_channel_writes())
            .bind(thread_id)
            .bind(checkpoint_ns)
            .bind(parent_checkpoint_id)
            .bind(TASKS)
            .fetch_all(&self.pool)
            .await?;

        records
            .iter()
            .map(|record| record.decode_value(&self.serde).map_err(AlloyDBError::from))
            .collect()
    }

    async fn load_tuple(&self, row: CheckpointRow) -> Result<CheckpointTuple> {
        let mut checkpoint = row.decode_checkpoint()?;
        let metadata = row.decode_metadata(&self.serde)?;

        if let Some(parent_id) = row.parent_checkpoint_id.as_deref() {
            checkpoint.pending_sends = self
                .load_pending_sends(&row.thread_id, &row.checkpoint_ns, parent_id)
                .await?;
        }

        let pending_writes = self
            .load_writes(&row.thread_id, &row.checkpoint_ns, &row.checkpoint_id)
            .await?;

        let mut tuple = CheckpointTuple::new(row.config(), checkpoint, metadata)
            .with_pending_writes(pending_writes);
        if let Some(parent_config) = row.parent_config() {
            tuple = tuple.with_parent_config(parent_config);
        }
        Ok(tuple)
    }

    #[instrument(skip(self))]
    async fn fetch_tuple(&self, config: &CheckpointConfig) -> Result<Option<CheckpointTuple>> {
        let thread_id = require_thread_id(config)?;

        let mut query = QueryBuilder::<Postgres>::new(self.queries.select_checkpoints());
        query.push(" AND thread_id = ").push_bind(thread_id.to_string());
        query
            .push(" AND checkpoint_ns = ")
            .push_bind(config.namespace().to_string());
        match config.resolved_checkpoint_id() {
            Some(checkpoint_id) => {
                query
                    .push(" AND checkpoint_id = ")
                    .push_bind(checkpoint_id.to_string());
            }
            None => {
                query.push(" ORDER BY checkpoint_id DESC LIMIT 1");
            }
        }

        let row = query
            .build_query_as::<CheckpointRow>()
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.load_tuple(row).await?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, filter))]
    async fn fetch_tuples(
        &self,
        config: Option<&CheckpointConfig>,
        filter: Option<HashMap<String, serde_json::Value>>,
        before: Option<&CheckpointConfig>,
        limit: Option<usize>,
    ) -> Result<Vec<CheckpointTuple>> {
        let mut query = QueryBuilder::<Postgres>::new(self.queries.select_checkpoints());

        if let Some(config) = config {
            if let Some(thread_id) = config.thread_id.as_ref() {
                query.push(" AND thread_id = ").push_bind(thread_id.clone());
            }
            if let Some(checkpoint_ns) = config.checkpoint_ns.as_ref() {
                query
                    .push(" AND checkpoint_ns = ")
                    .push_bind(checkpoint_ns.clone());
            }
            if let Some(checkpoint_id) = config.resolved_checkpoint_id() {
                query
                    .push(" AND checkpoint_id = ")
                    .push_bind(checkpoint_id.to_string());
            }
        }

        if let Some(filter) = filter.filter(|f| !f.is_empty()) {
            query
                .push(" AND metadata @> ")
                .push_bind(serde_json::Value::Object(filter.into_iter().collect()));
        }

        if let Some(before_id) = before.and_then(|b| b.resolved_checkpoint_id()) {
            query
                .push(" AND checkpoint_id < ")
                .push_bind(before_id.to_string());
        }

        query.push(" ORDER BY checkpoint_id DESC");
        if let Some(limit) = limit {
            query
                .push(" LIMIT ")
                .push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let rows = query
            .build_query_as::<CheckpointRow>()
            .fetch_all(&self.pool)
            .await?;
        debug!(count = rows.len(), "listed checkpoints");

        let mut tuples = Vec::with_capacity(rows.len());
        for row in rows {
            tuples.push(self.load_tuple(row).await?);
        }
        Ok(tuples)
    }
}

fn require_thread_id(config: &CheckpointConfig) -> std::result::Result<&str, CheckpointError> {
    config
        .thread_id
        .as_deref()
        .ok_or_else(|| CheckpointError::Invalid("thread_id is required".to_string()))
}

#[async_trait]
impl<S: SerializerProtocol> CheckpointSaver for AlloyDBSaver<S> {
    async fn get_tuple(
        &self,
        config: &CheckpointConfig,
    ) -> langgraph_checkpoint::Result<Option<CheckpointTuple>> {
        Ok(self.fetch_tuple(config).await?)
    }

    async fn list(
        &self,
        config: Option<&CheckpointConfig>,
        filter: Option<HashMap<String, serde_json::Value>>,
        before: Option<&CheckpointConfig>,
        limit: Option<usize>,
    ) -> langgraph_checkpoint::Result<CheckpointStream> {
        let results: Vec<langgraph_checkpoint::Result<CheckpointTuple>> = self
            .fetch_tuples(config, filter, before, limit)
            .await?
            .into_iter()
            .map(Ok)
            .collect();
        Ok(Box::pin(stream::iter(results)))
    }

    async fn put(
        &self,
        config: &CheckpointConfig,
        checkpoint: Checkpoint,
        metadata: CheckpointMetadata,
        _new_versions: ChannelVersions,
    ) -> langgraph_checkpoint::Result<CheckpointConfig> {
        Ok(self.put_checkpoint(config, checkpoint, &metadata).await?)
    }

    async fn put_writes(
        &self,
        config: &CheckpointConfig,
        writes: Vec<(String, serde_json::Value)>,
        task_id: String,
        task_path: String,
    ) -> langgraph_checkpoint::Result<()> {
        Ok(self
            .put_write_rows(config, &writes, &task_id, &task_path)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_thread_id() {
        let config = CheckpointConfig::new().with_thread_id("t1");
        assert_eq!(require_thread_id(&config).unwrap(), "t1");

        let err = require_thread_id(&CheckpointConfig::new()).unwrap_err();
        assert!(matches!(err, CheckpointError::Invalid(_)));
    }
}
