//! # langgraph-checkpoint-alloydb - AlloyDB Checkpoint Persistence
//!
//! A [`CheckpointSaver`](langgraph_checkpoint::CheckpointSaver) that stores
//! graph checkpoints and pending task writes in AlloyDB for PostgreSQL (or any
//! PostgreSQL compatible database).
//!
//! ## Storage Layout
//!
//! ```text
//! {schema}.{table}            one row per (thread_id, checkpoint_ns, checkpoint_id)
//!   ├─ parent_checkpoint_id   lineage link, fixed by the first write
//!   ├─ checkpoint   JSONB     pending_sends always empty
//!   └─ metadata     JSONB     NUL escapes removed
//!
//! {schema}.{table}_writes     one row per (thread_id, checkpoint_ns, checkpoint_id, task_id, idx)
//!   ├─ channel, type
//!   └─ blob         JSONB
//! ```
//!
//! ## Usage
//!
//! 1. Build an [`AlloyDBEngine`] from an [`EngineConfig`] (or the environment).
//! 2. Create the tables once with [`AlloyDBEngine::init_checkpoint_tables`].
//! 3. Create an [`AlloyDBSaver`]; construction fails with
//!    [`AlloyDBError::SchemaMismatch`] if the tables do not match.
//!
//! ```rust,no_run
//! use langgraph_checkpoint_alloydb::{AlloyDBEngine, AlloyDBSaver};
//!
//! # async fn example() -> langgraph_checkpoint_alloydb::Result<()> {
//! let engine = AlloyDBEngine::from_env().await?;
//! engine.init_checkpoint_tables("checkpoints", "public").await?;
//! let saver = AlloyDBSaver::create(&engine).await?;
//! # let _ = saver;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`engine`] - Connection pool and table management
//! - [`saver`] - The [`AlloyDBSaver`] backend
//! - [`schema`] - Required columns and table DDL
//! - [`encoding`] - Row encoding and the write conflict policy
//! - [`queries`] - SQL statements per table pair
//! - [`models`] - Row types read back from the tables
//! - [`config`] - [`EngineConfig`] and environment loading
//! - [`error`] - [`AlloyDBError`]

pub mod config;
pub mod encoding;
pub mod engine;
pub mod error;
pub mod models;
pub mod queries;
pub mod saver;
pub mod schema;

pub use config::EngineConfig;
pub use engine::AlloyDBEngine;
pub use error::{AlloyDBError, Result};
pub use saver::AlloyDBSaver;
pub use schema::{CheckpointTable, TableSchema};
