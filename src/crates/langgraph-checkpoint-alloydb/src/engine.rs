//! Connection pooling and schema introspection for AlloyDB
//!
//! [`AlloyDBEngine`] owns the `sqlx` pool every saver operation draws from and
//! answers the one schema question the saver asks at construction: which
//! columns does a table have.

use crate::config::EngineConfig;
use crate::error::Result;
use crate::schema::{CheckpointTable, TableSchema};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{info, instrument};

/// Pooled connection provider for the checkpoint tables
#[derive(Debug, Clone)]
pub struct AlloyDBEngine {
    pool: PgPool,
    config: EngineConfig,
}

impl AlloyDBEngine {
    /// Connect using the given configuration
    #[instrument(skip(config), fields(schema = %config.schema_name, table = %config.table_name))]
    pub async fn connect(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await?;

        info!(
            max_connections = config.max_connections,
            "connected checkpoint engine"
        );
        Ok(Self { pool, config })
    }

    /// Connect using configuration from the environment
    pub async fn from_env() -> Result<Self> {
        Self::connect(EngineConfig::from_env()?).await
    }

    /// Wrap an existing pool; table names come from [`EngineConfig::default`]
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            config: EngineConfig::default(),
        }
    }

    /// Replace the table settings used by savers created from this engine
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Load the column names of `schema_name.table_name`.
    ///
    /// A missing table yields a schema with no columns.
    #[instrument(skip(self))]
    pub async fn load_table_schema(&self, table_name: &str, schema_name: &str) -> Result<TableSchema> {
        let columns: Vec<String> = sqlx::query_scalar::<_, String>(
            "SELECT column_name::text FROM information_schema.columns
             WHERE table_schema = $1 AND table_name = $2
             ORDER BY ordinal_position",
        )
        .bind(schema_name)
        .bind(table_name)
        .fetch_all(&self.pool)
        .await?;

        Ok(TableSchema::new(schema_name, table_name, columns))
    }

    /// Create the checkpoints and writes tables with the expected schema.
    ///
    /// Fails if either table already exists.
    #[instrument(skip(self))]
    pub async fn init_checkpoint_tables(&self, table_name: &str, schema_name: &str) -> Result<()> {
        let writes_table = crate::config::writes_table_name(table_name);

        let mut tx = self.pool.begin().await?;
        sqlx::query(&CheckpointTable::Checkpoints.create_table_sql(schema_name, table_name))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&CheckpointTable::Writes.create_table_sql(schema_name, &writes_table))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(%writes_table, "created checkpoint tables");
        Ok(())
    }

    /// Perform a health check by running a simple query
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Close the connection pool gracefully
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
