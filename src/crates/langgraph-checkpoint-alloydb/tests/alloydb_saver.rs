//! AlloyDB saver against a real PostgreSQL instance.
//!
//! Each test starts a Postgres container and skips itself when no container
//! runtime is available.

use futures::TryStreamExt;
use langgraph_checkpoint::writes::{INTERRUPT, TASKS};
use langgraph_checkpoint::{
    Checkpoint, CheckpointConfig, CheckpointMetadata, CheckpointSaver, CheckpointSource,
    CheckpointTuple,
};
use langgraph_checkpoint_alloydb::{AlloyDBEngine, AlloyDBError, AlloyDBSaver};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::postgres::Postgres;

struct Harness {
    _container: testcontainers::ContainerAsync<Postgres>,
    engine: AlloyDBEngine,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn start_postgres() -> Option<Harness> {
    init_tracing();
    let container = match Postgres::default().start().await {
        Ok(container) => container,
        Err(err) => {
            eprintln!("ignoring alloydb_saver: unable to start Postgres container ({err})");
            return None;
        }
    };
    let host = container.get_host().await.expect("failed to get host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("failed to get postgres port");
    let dsn = format!("postgres://postgres:postgres@{host}:{port}/postgres");

    let pool = connect_pool_with_retry(&dsn).await;
    Some(Harness {
        _container: container,
        engine: AlloyDBEngine::from_pool(pool),
    })
}

async fn connect_pool_with_retry(dsn: &str) -> sqlx::PgPool {
    let mut last_err = None;
    for _ in 0..40usize {
        match sqlx::PgPool::connect(dsn).await {
            Ok(pool) => return pool,
            Err(err) => {
                last_err = Some(err);
                tokio::time::sleep(Duration::from_millis(150)).await;
            }
        }
    }
    panic!(
        "failed to connect postgres after retries: {}",
        last_err
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown error".to_string())
    );
}

fn unique_table(base: &str) -> String {
    format!("{base}_{}", uuid::Uuid::now_v7().simple())
}

async fn saver(harness: &Harness) -> AlloyDBSaver {
    let table = unique_table("checkpoints");
    harness
        .engine
        .init_checkpoint_tables(&table, "public")
        .await
        .expect("create tables");
    AlloyDBSaver::create_with_table(&harness.engine, &table, "public")
        .await
        .expect("create saver")
}

fn checkpoint(id: &str) -> Checkpoint {
    let mut checkpoint = Checkpoint::empty();
    checkpoint.id = id.to_string();
    checkpoint
}

fn thread(thread_id: &str) -> CheckpointConfig {
    CheckpointConfig::new().with_thread_id(thread_id)
}

async fn collect(
    saver: &AlloyDBSaver,
    config: Option<&CheckpointConfig>,
    filter: Option<HashMap<String, serde_json::Value>>,
    before: Option<&CheckpointConfig>,
    limit: Option<usize>,
) -> Vec<CheckpointTuple> {
    saver
        .list(config, filter, before, limit)
        .await
        .expect("list")
        .try_collect()
        .await
        .expect("list stream")
}

#[tokio::test]
async fn put_then_get_tuple_round_trips() {
    let Some(harness) = start_postgres().await else {
        return;
    };
    let saver = saver(&harness).await;

    let mut values = HashMap::new();
    values.insert("messages".to_string(), json!(["hello"]));
    let stored = checkpoint("c1").with_pending_sends(vec![json!({"node": "agent"})]);
    let stored = Checkpoint { channel_values: values, ..stored };
    let metadata = CheckpointMetadata::new()
        .with_source(CheckpointSource::Input)
        .with_step(-1);

    let config = saver
        .put(&thread("t1"), stored.clone(), metadata.clone(), HashMap::new())
        .await
        .unwrap();
    assert_eq!(config.thread_id.as_deref(), Some("t1"));
    assert_eq!(config.checkpoint_ns.as_deref(), Some(""));
    assert_eq!(config.checkpoint_id.as_deref(), Some("c1"));

    let tuple = saver.get_tuple(&config).await.unwrap().expect("stored");
    assert_eq!(tuple.config, config);
    assert_eq!(tuple.checkpoint.channel_values, stored.channel_values);
    assert!(tuple.checkpoint.pending_sends.is_empty());
    assert_eq!(tuple.metadata, metadata);
    assert!(tuple.parent_config.is_none());
    assert!(tuple.pending_writes.is_empty());

    assert!(saver.get_tuple(&thread("missing")).await.unwrap().is_none());
}

#[tokio::test]
async fn lineage_and_latest_checkpoint() {
    let Some(harness) = start_postgres().await else {
        return;
    };
    let saver = saver(&harness).await;

    let first = saver
        .put(&thread("t1"), checkpoint("c1"), CheckpointMetadata::new().with_step(0), HashMap::new())
        .await
        .unwrap();
    let second = saver
        .put(&first, checkpoint("c2"), CheckpointMetadata::new().with_step(1), HashMap::new())
        .await
        .unwrap();

    let latest = saver.get_tuple(&thread("t1")).await.unwrap().expect("latest");
    assert_eq!(latest.config, second);
    assert_eq!(latest.parent_config, Some(first.clone()));

    let root = saver.get_tuple(&first).await.unwrap().expect("c1");
    assert!(root.parent_config.is_none());

    // thread_ts is accepted in place of checkpoint_id
    let mut legacy = thread("t1");
    legacy.extra.insert("thread_ts".to_string(), json!("c1"));
    let by_ts = saver.get_tuple(&legacy).await.unwrap().expect("c1 by thread_ts");
    assert_eq!(by_ts.config, first);
}

#[tokio::test]
async fn repeated_put_keeps_first_parent() {
    let Some(harness) = start_postgres().await else {
        return;
    };
    let saver = saver(&harness).await;

    let parent = thread("t1").with_checkpoint_id("c0");
    saver
        .put(&parent, checkpoint("c1"), CheckpointMetadata::new().with_step(1), HashMap::new())
        .await
        .unwrap();

    let other_parent = thread("t1").with_checkpoint_id("cX");
    let config = saver
        .put(&other_parent, checkpoint("c1"), CheckpointMetadata::new().with_step(2), HashMap::new())
        .await
        .unwrap();

    let tuple = saver.get_tuple(&config).await.unwrap().expect("stored");
    assert_eq!(tuple.metadata.step, Some(2));
    assert_eq!(
        tuple.parent_config.and_then(|p| p.checkpoint_id).as_deref(),
        Some("c0")
    );
}

#[tokio::test]
async fn metadata_nul_escapes_are_removed() {
    let Some(harness) = start_postgres().await else {
        return;
    };
    let saver = saver(&harness).await;

    let metadata = CheckpointMetadata::new().with_extra("note".to_string(), json!("a\u{0000}b"));
    let config = saver
        .put(&thread("t1"), checkpoint("c1"), metadata, HashMap::new())
        .await
        .unwrap();

    let tuple = saver.get_tuple(&config).await.unwrap().expect("stored");
    assert_eq!(tuple.metadata.extra.get("note"), Some(&json!("ab")));
}

#[tokio::test]
async fn reserved_writes_overwrite_and_regular_writes_keep_first() {
    let Some(harness) = start_postgres().await else {
        return;
    };
    let saver = saver(&harness).await;
    let config = saver
        .put(&thread("t1"), checkpoint("c1"), CheckpointMetadata::new(), HashMap::new())
        .await
        .unwrap();

    for value in ["first", "second"] {
        saver
            .put_writes(
                &config,
                vec![(INTERRUPT.to_string(), json!(value))],
                "task-1".to_string(),
                String::new(),
            )
            .await
            .unwrap();
    }
    for value in ["first", "second"] {
        saver
            .put_writes(
                &config,
                vec![("messages".to_string(), json!(value))],
                "task-2".to_string(),
                String::new(),
            )
            .await
            .unwrap();
    }
    saver
        .put_writes(&config, Vec::new(), "task-3".to_string(), String::new())
        .await
        .unwrap();

    let tuple = saver.get_tuple(&config).await.unwrap().expect("stored");
    assert_eq!(
        tuple.pending_writes,
        vec![
            ("task-1".to_string(), INTERRUPT.to_string(), json!("second")),
            ("task-2".to_string(), "messages".to_string(), json!("first")),
        ]
    );
}

#[tokio::test]
async fn put_writes_requires_checkpoint_id() {
    let Some(harness) = start_postgres().await else {
        return;
    };
    let saver = saver(&harness).await;

    let result = saver
        .put_writes(
            &thread("t1"),
            vec![("messages".to_string(), json!(1))],
            "task-1".to_string(),
            String::new(),
        )
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn pending_sends_come_from_parent_task_writes() {
    let Some(harness) = start_postgres().await else {
        return;
    };
    let saver = saver(&harness).await;

    let first = saver
        .put(&thread("t1"), checkpoint("c1"), CheckpointMetadata::new(), HashMap::new())
        .await
        .unwrap();
    saver
        .put_writes(
            &first,
            vec![
                (TASKS.to_string(), json!({"node": "a"})),
                (TASKS.to_string(), json!({"node": "b"})),
                ("messages".to_string(), json!("ignored")),
            ],
            "task-1".to_string(),
            String::new(),
        )
        .await
        .unwrap();
    let second = saver
        .put(&first, checkpoint("c2"), CheckpointMetadata::new(), HashMap::new())
        .await
        .unwrap();

    let tuple = saver.get_tuple(&second).await.unwrap().expect("c2");
    assert_eq!(
        tuple.checkpoint.pending_sends,
        vec![json!({"node": "a"}), json!({"node": "b"})]
    );

    let root = saver.get_tuple(&first).await.unwrap().expect("c1");
    assert!(root.checkpoint.pending_sends.is_empty());
    assert_eq!(root.pending_writes.len(), 3);
}

#[tokio::test]
async fn list_filters_and_pages() {
    let Some(harness) = start_postgres().await else {
        return;
    };
    let saver = saver(&harness).await;

    let mut config = thread("t1");
    for (id, source) in [
        ("c1", CheckpointSource::Input),
        ("c2", CheckpointSource::Loop),
        ("c3", CheckpointSource::Loop),
    ] {
        let metadata = CheckpointMetadata::new().with_source(source);
        config = saver
            .put(&config, checkpoint(id), metadata, HashMap::new())
            .await
            .unwrap();
    }
    saver
        .put(&thread("t2"), checkpoint("c9"), CheckpointMetadata::new(), HashMap::new())
        .await
        .unwrap();

    let ids = |tuples: Vec<CheckpointTuple>| -> Vec<String> {
        tuples.into_iter().map(|t| t.checkpoint.id).collect()
    };

    let all = collect(&saver, Some(&thread("t1")), None, None, None).await;
    assert_eq!(ids(all), vec!["c3", "c2", "c1"]);

    let everything = collect(&saver, None, None, None, None).await;
    assert_eq!(everything.len(), 4);

    let mut filter = HashMap::new();
    filter.insert("source".to_string(), json!("loop"));
    let loops = collect(&saver, Some(&thread("t1")), Some(filter), None, None).await;
    assert_eq!(ids(loops), vec!["c3", "c2"]);

    let before = thread("t1").with_checkpoint_id("c3");
    let older = collect(&saver, Some(&thread("t1")), None, Some(&before), Some(1)).await;
    assert_eq!(ids(older), vec!["c2"]);
}

#[tokio::test]
async fn create_rejects_table_missing_columns() {
    let Some(harness) = start_postgres().await else {
        return;
    };
    let table = unique_table("checkpoints");
    harness
        .engine
        .init_checkpoint_tables(&table, "public")
        .await
        .unwrap();
    sqlx::query(&format!("ALTER TABLE public.\"{table}\" DROP COLUMN metadata"))
        .execute(harness.engine.pool())
        .await
        .unwrap();

    let err = AlloyDBSaver::create_with_table(&harness.engine, &table, "public")
        .await
        .unwrap_err();
    assert!(err.is_schema_mismatch());
    assert_eq!(err.missing_columns(), ["metadata".to_string()]);
    assert!(err.to_string().contains("CREATE TABLE"));
}

#[tokio::test]
async fn create_rejects_missing_tables() {
    let Some(harness) = start_postgres().await else {
        return;
    };

    let err = AlloyDBSaver::create_with_table(&harness.engine, &unique_table("absent"), "public")
        .await
        .unwrap_err();
    assert!(matches!(err, AlloyDBError::SchemaMismatch { .. }));
}
