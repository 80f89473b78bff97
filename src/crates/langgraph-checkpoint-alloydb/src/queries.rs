//! SQL statements used by the saver, rendered once per table pair

use crate::encoding::WriteConflict;
use crate::schema::qualified_name;

/// Statements bound to one `{schema}.{table}` / `{schema}.{table}_writes` pair
#[derive(Debug, Clone)]
pub struct Queries {
    checkpoints: String,
    upsert_checkpoint: String,
    upsert_writes: String,
    insert_writes: String,
    select_writes: String,
    select_channel_writes: String,
}

impl Queries {
    pub fn new(schema_name: &str, table_name: &str, writes_table_name: &str) -> Self {
        let checkpoints = qualified_name(schema_name, table_name);
        let writes = qualified_name(schema_name, writes_table_name);

        // parent_checkpoint_id keeps its first value on conflict
        let upsert_checkpoint = format!(
            "INSERT INTO {checkpoints} (thread_id, checkpoint_ns, checkpoint_id, parent_checkpoint_id, checkpoint, metadata)
             VALUES ($1, $2, $3, $4, $5::jsonb, $6::jsonb)
             ON CONFLICT (thread_id, checkpoint_ns, checkpoint_id)
             DO UPDATE SET
                 checkpoint = EXCLUDED.checkpoint,
                 metadata = EXCLUDED.metadata"
        );

        let insert_prefix = format!(
            "INSERT INTO {writes} (thread_id, checkpoint_ns, checkpoint_id, task_id, idx, channel, type, blob)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8::jsonb)
             ON CONFLICT (thread_id, checkpoint_ns, checkpoint_id, task_id, idx)"
        );
        let upsert_writes = format!(
            "{insert_prefix} DO UPDATE SET
                 channel = EXCLUDED.channel,
                 type = EXCLUDED.type,
                 blob = EXCLUDED.blob"
        );
        let insert_writes = format!("{insert_prefix} DO NOTHING");

        let select_writes = format!(
            "SELECT task_id, channel, type, blob FROM {writes}
             WHERE thread_id = $1 AND checkpoint_ns = $2 AND checkpoint_id = $3
             ORDER BY task_id, idx"
        );
        let select_channel_writes = format!(
            "SELECT task_id, channel, type, blob FROM {writes}
             WHERE thread_id = $1 AND checkpoint_ns = $2 AND checkpoint_id = $3 AND channel = $4
             ORDER BY task_id, idx"
        );

        Self {
            checkpoints,
            upsert_checkpoint,
            upsert_writes,
            insert_writes,
            select_writes,
            select_channel_writes,
        }
    }

    pub fn upsert_checkpoint(&self) -> &str {
        &self.upsert_checkpoint
    }

    /// Statement for a batch of writes under the given conflict policy
    pub fn put_writes(&self, conflict: WriteConflict) -> &str {
        match conflict {
            WriteConflict::Overwrite => &self.upsert_writes,
            WriteConflict::Ignore => &self.insert_writes,
        }
    }

    /// Leading `SELECT ... FROM ... WHERE TRUE` for checkpoint reads; callers append filters
    pub fn select_checkpoints(&self) -> String {
        format!(
            "SELECT thread_id, checkpoint_ns, checkpoint_id, parent_checkpoint_id, checkpoint, metadata
             FROM {} WHERE TRUE",
            self.checkpoints
        )
    }

    /// Writes stored against one checkpoint
    pub fn select_writes(&self) -> &str {
        &self.select_writes
    }

    /// Writes to one channel stored against one checkpoint
    pub fn select_channel_writes(&self) -> &str {
        &self.select_channel_writes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queries() -> Queries {
        Queries::new("public", "checkpoints", "checkpoints_writes")
    }

    #[test]
    fn test_checkpoint_upsert_keeps_parent() {
        let sql = queries().upsert_checkpoint().to_string();
        assert!(sql.starts_with("INSERT INTO \"public\".\"checkpoints\""));
        assert!(sql.contains("ON CONFLICT (thread_id, checkpoint_ns, checkpoint_id)"));
        assert!(sql.contains("checkpoint = EXCLUDED.checkpoint"));
        assert!(sql.contains("metadata = EXCLUDED.metadata"));
        assert!(!sql.contains("parent_checkpoint_id = EXCLUDED"));
    }

    #[test]
    fn test_write_statements_follow_policy() {
        let q = queries();

        let upsert = q.put_writes(WriteConflict::Overwrite);
        assert!(upsert.contains("\"public\".\"checkpoints_writes\""));
        assert!(upsert.contains("DO UPDATE SET"));
        assert!(upsert.contains("blob = EXCLUDED.blob"));

        let insert = q.put_writes(WriteConflict::Ignore);
        assert!(insert.contains("ON CONFLICT (thread_id, checkpoint_ns, checkpoint_id, task_id, idx)"));
        assert!(insert.trim_end().ends_with("DO NOTHING"));
    }

    #[test]
    fn test_select_statements_target_tables() {
        let q = Queries::new("graph", "cp", "cp_writes");
        assert!(q.select_checkpoints().contains("FROM \"graph\".\"cp\" WHERE TRUE"));
        assert!(q.select_writes().contains("FROM \"graph\".\"cp_writes\""));
        assert!(q.select_channel_writes().contains("AND channel = $4"));
    }
}
