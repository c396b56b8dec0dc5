use std::future::Future;

use super::{make_execution, make_version, TestResult};
use crate::VersionStore;

pub(super) async fn run_execution_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "executions",
        "record_then_list_roundtrips",
        record_then_list_roundtrips(factory).await,
    ));
    results.push(TestResult::from_result(
        "executions",
        "list_preserves_insertion_order",
        list_preserves_insertion_order(factory).await,
    ));
    results.push(TestResult::from_result(
        "executions",
        "list_empty_for_fresh_version",
        list_empty_for_fresh_version(factory).await,
    ));
    results.push(TestResult::from_result(
        "executions",
        "executions_scoped_per_version",
        executions_scoped_per_version(factory).await,
    ));
    results.push(TestResult::from_result(
        "executions",
        "record_against_locked_version",
        record_against_locked_version(factory).await,
    ));

    results
}

async fn record_then_list_roundtrips<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let version = make_version("v1", "first")?;
    store
        .put(version.clone())
        .await
        .map_err(|e| e.to_string())?;

    let record = make_execution("exec-1", &version, "user-1");
    store
        .record_execution(record.clone())
        .await
        .map_err(|e| e.to_string())?;

    let listed = store
        .list_executions("v1")
        .await
        .map_err(|e| e.to_string())?;
    if listed != vec![record] {
        return Err(format!("unexpected executions: {listed:?}"));
    }
    Ok(())
}

async fn list_preserves_insertion_order<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let version = make_version("v1", "first")?;
    store
        .put(version.clone())
        .await
        .map_err(|e| e.to_string())?;

    // Ids deliberately out of lexical order.
    for id in ["exec-c", "exec-a", "exec-b"] {
        store
            .record_execution(make_execution(id, &version, "user-1"))
            .await
            .map_err(|e| e.to_string())?;
    }

    let listed = store
        .list_executions("v1")
        .await
        .map_err(|e| e.to_string())?;
    let ids: Vec<&str> = listed.iter().map(|r| r.id.as_str()).collect();
    if ids != ["exec-c", "exec-a", "exec-b"] {
        return Err(format!("expected insertion order, got {ids:?}"));
    }
    Ok(())
}

async fn list_empty_for_fresh_version<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    store
        .put(make_version("v1", "first")?)
        .await
        .map_err(|e| e.to_string())?;
    let listed = store
        .list_executions("v1")
        .await
        .map_err(|e| e.to_string())?;
    if !listed.is_empty() {
        return Err(format!("expected no executions, got {}", listed.len()));
    }
    Ok(())
}

async fn executions_scoped_per_version<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let v1 = make_version("v1", "x")?;
    let v2 = make_version("v2", "x")?;
    store.put(v1.clone()).await.map_err(|e| e.to_string())?;
    store.put(v2.clone()).await.map_err(|e| e.to_string())?;

    store
        .record_execution(make_execution("exec-1", &v1, "user-1"))
        .await
        .map_err(|e| e.to_string())?;
    store
        .record_execution(make_execution("exec-2", &v2, "user-1"))
        .await
        .map_err(|e| e.to_string())?;

    let listed = store
        .list_executions("v2")
        .await
        .map_err(|e| e.to_string())?;
    let ids: Vec<&str> = listed.iter().map(|r| r.id.as_str()).collect();
    if ids != ["exec-2"] {
        return Err(format!("expected [exec-2] for v2, got {ids:?}"));
    }
    Ok(())
}

async fn record_against_locked_version<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let version = make_version("v1", "first")?;
    store
        .put(version.clone())
        .await
        .map_err(|e| e.to_string())?;
    store.lock("v1").await.map_err(|e| e.to_string())?;

    store
        .record_execution(make_execution("exec-1", &version, "user-1"))
        .await
        .map_err(|e| format!("locked versions must still accept executions: {e}"))?;
    Ok(())
}
