//! End-to-end statement lifecycle tests against mocked services.

use std::sync::Arc;

use pretty_assertions::assert_eq;

use jobsql::service::{
    MockCatalogService, MockJobService, MockTransferService, Services, TaskStatus,
};
use jobsql::{ColumnInfo, Connection, DriverConfig, Value};

fn fast_config() -> DriverConfig {
    let mut config = DriverConfig::from_endpoint("http://localhost:1").unwrap();
    config.poll_interval_ms = 1;
    config
}

fn connection_with(job: Arc<MockJobService>) -> Connection {
    let services = Services::new(
        job,
        Arc::new(MockCatalogService::new(vec![
            ColumnInfo::new("id", "BIGINT"),
            ColumnInfo::new("name", "STRING"),
        ])),
        Arc::new(MockTransferService::new(vec![
            vec![Value::Int(1), Value::from("alice")],
            vec![Value::Int(2), Value::from("bob")],
            vec![Value::Int(3), Value::from("carol")],
        ])),
    );
    Connection::new(services, fast_config())
}

#[tokio::test]
async fn test_select_end_to_end() {
    let job = Arc::new(MockJobService::new());
    let connection = connection_with(job.clone());
    let mut statement = connection.create_statement();

    let has_results = statement.execute("SELECT id, name FROM users").await.unwrap();
    assert!(has_results);

    let cursor = statement.result_cursor().unwrap();
    assert_eq!(cursor.schema()[0].name, "id");
    assert_eq!(cursor.schema()[1].data_type, "STRING");

    let rows = cursor.collect_rows().await.unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0][1], Value::from("alice"));

    // Exactly one result per execution.
    assert!(!statement.more_results().unwrap());

    // The submitted job wraps the query in a materializing create.
    let create = &job.submitted()[0].query;
    assert!(create.starts_with("create table tmp_result_"));
    assert!(create.contains("lifecycle 3 as SELECT id, name FROM users"));

    statement.close().await;
}

#[tokio::test]
async fn test_set_directive_flows_into_next_submission() {
    let job = Arc::new(MockJobService::new());
    let connection = connection_with(job.clone());
    let mut statement = connection.create_statement();

    let has_results = statement
        .execute("SET engine.sql.timezone = UTC;")
        .await
        .unwrap();
    assert!(!has_results);
    assert!(job.submitted().is_empty());

    statement
        .execute_update("INSERT INTO t SELECT * FROM s")
        .await
        .unwrap();

    let settings = job.submitted()[0].settings.clone().unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&settings).unwrap();
    assert_eq!(parsed["engine.sql.timezone"], "UTC");
}

#[tokio::test]
async fn test_failed_job_surfaces_remote_reason() {
    let job = Arc::new(
        MockJobService::new()
            .with_statuses([
                Some(TaskStatus::Running),
                Some(TaskStatus::Running),
                Some(TaskStatus::Failed),
            ])
            .with_task_result("out of memory"),
    );
    let connection = connection_with(job);
    let mut statement = connection.create_statement();

    let err = statement
        .execute_query("SELECT * FROM huge")
        .await
        .unwrap_err();
    assert_eq!(err.category(), "Remote Job Failure");
    assert!(err.to_string().contains("out of memory"));

    // The trace link is still available for debugging the failed job.
    assert!(statement.warnings().is_some());
}

#[tokio::test]
async fn test_reexecution_never_leaks_artifacts() {
    let job = Arc::new(MockJobService::new());
    let connection = connection_with(job.clone());
    let mut statement = connection.create_statement();

    statement.execute_query("SELECT * FROM a").await.unwrap();
    let first = statement.current_artifact().unwrap().to_string();

    statement.execute_query("SELECT * FROM b").await.unwrap();
    let second = statement.current_artifact().unwrap().to_string();

    statement.close().await;

    // create a, drop a, create b, drop b: at most one artifact was ever
    // tracked at a time, and both were dropped.
    let queries: Vec<String> = job.submitted().iter().map(|s| s.query.clone()).collect();
    assert_eq!(queries.len(), 4);
    assert!(queries[1].contains(&format!("drop table if exists {first}")));
    assert!(queries[3].contains(&format!("drop table if exists {second}")));
}

#[tokio::test]
async fn test_update_count_is_one_shot() {
    let job = Arc::new(MockJobService::new().with_summary(r#"{"Outputs": {"t": [42, 9]}}"#));
    let connection = connection_with(job);
    let mut statement = connection.create_statement();

    let count = statement
        .execute_update("INSERT INTO t SELECT * FROM s")
        .await
        .unwrap();
    assert_eq!(count, 42);

    assert_eq!(statement.update_count().unwrap(), 42);
    assert_eq!(statement.update_count().unwrap(), -1);
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let connection = connection_with(Arc::new(MockJobService::new()));
    let mut statement = connection.create_statement();

    statement.execute_query("SELECT * FROM t").await.unwrap();

    statement.close().await;
    statement.close().await;
    assert!(statement.is_closed());

    let err = statement.execute("SELECT 1").await.unwrap_err();
    assert_eq!(err.category(), "Invalid State");
}

#[tokio::test]
async fn test_cancel_without_inflight_job_is_noop() {
    let job = Arc::new(MockJobService::new());
    let connection = connection_with(job.clone());
    let statement = connection.create_statement();

    statement.cancel().await.unwrap();
    assert!(job.stop_requests().is_empty());
}

#[tokio::test]
async fn test_cancel_handle_reaches_inflight_job() {
    // The job never resolves on its own; cancellation has to take effect.
    let job = Arc::new(MockJobService::new().with_statuses(
        std::iter::repeat(Some(TaskStatus::Running))
            .take(50)
            .chain(std::iter::once(Some(TaskStatus::Cancelled)))
            .collect::<Vec<_>>(),
    ));
    let connection = connection_with(job.clone());
    let mut statement = connection.create_statement();
    let handle = statement.cancel_handle();

    let worker = async { statement.execute_query("SELECT * FROM t").await };
    let canceller = async {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        handle.cancel().await.unwrap();
    };

    let (result, ()) = tokio::join!(worker, canceller);
    let err = result.unwrap_err();
    assert_eq!(err.category(), "Remote Job Cancelled");
    assert_eq!(job.stop_requests().len(), 1);
}

#[tokio::test]
async fn test_negative_max_rows_rejected() {
    let connection = connection_with(Arc::new(MockJobService::new()));
    let mut statement = connection.create_statement();

    let err = statement.set_max_rows(-1).unwrap_err();
    assert_eq!(err.category(), "Invalid State");
}

#[tokio::test]
async fn test_connection_defaults_reach_submissions() {
    let mut config = fast_config();
    config
        .properties
        .insert("engine.sql.mode".to_string(), "strict".to_string());

    let job = Arc::new(MockJobService::new());
    let services = Services::new(
        job.clone(),
        Arc::new(MockCatalogService::new(Vec::new())),
        Arc::new(MockTransferService::new(Vec::new())),
    );
    let connection = Connection::new(services, config);

    let mut statement = connection.create_statement();
    statement.execute_update("DROP TABLE t").await.unwrap();

    let settings = job.submitted()[0].settings.clone().unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&settings).unwrap();
    assert_eq!(parsed["engine.sql.mode"], "strict");
}
