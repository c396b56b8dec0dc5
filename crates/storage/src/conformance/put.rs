use std::future::Future;

use super::{make_version, TestResult};
use crate::{StoreError, VersionStore};

pub(super) async fn run_put_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "put",
        "put_then_get_returns_same_version",
        put_then_get_returns_same_version(factory).await,
    ));
    results.push(TestResult::from_result(
        "put",
        "put_stores_unlocked",
        put_stores_unlocked(factory).await,
    ));
    results.push(TestResult::from_result(
        "put",
        "put_same_content_is_noop",
        put_same_content_is_noop(factory).await,
    ));
    results.push(TestResult::from_result(
        "put",
        "put_different_content_conflicts",
        put_different_content_conflicts(factory).await,
    ));
    results.push(TestResult::from_result(
        "put",
        "list_empty_store",
        list_empty_store(factory).await,
    ));
    results.push(TestResult::from_result(
        "put",
        "list_ordered_by_version_id",
        list_ordered_by_version_id(factory).await,
    ));

    results
}

async fn put_then_get_returns_same_version<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let version = make_version("v1", "first")?;
    store.put(version.clone()).await.map_err(|e| e.to_string())?;

    let got = store.get("v1").await.map_err(|e| e.to_string())?;
    if got != version {
        return Err(format!("stored version differs: {got:?}"));
    }
    Ok(())
}

async fn put_stores_unlocked<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let mut version = make_version("v1", "first")?;
    version.locked = true;
    store.put(version).await.map_err(|e| e.to_string())?;

    let got = store.get("v1").await.map_err(|e| e.to_string())?;
    if got.locked {
        return Err("put must store versions unlocked".into());
    }
    Ok(())
}

async fn put_same_content_is_noop<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let version = make_version("v1", "first")?;
    store.put(version.clone()).await.map_err(|e| e.to_string())?;
    store
        .put(version.clone())
        .await
        .map_err(|e| format!("identical re-put should succeed: {e}"))?;

    let got = store.get("v1").await.map_err(|e| e.to_string())?;
    if got != version {
        return Err(format!("stored version differs: {got:?}"));
    }
    let listed = store.list().await.map_err(|e| e.to_string())?;
    if listed.len() != 1 {
        return Err(format!("expected 1 listed version, got {}", listed.len()));
    }
    Ok(())
}

/// Changing content under an existing id is refused; the stored version
/// keeps its original hash.
async fn put_different_content_conflicts<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let first = make_version("v1", "first")?;
    let second = make_version("v1", "second")?;
    if first.version_hash == second.version_hash {
        return Err("fixture versions should hash differently".into());
    }
    store.put(first.clone()).await.map_err(|e| e.to_string())?;

    match store.put(second).await {
        Err(StoreError::Conflict {
            version_id,
            existing_hash,
        }) if version_id == "v1" && existing_hash == first.version_hash => {}
        Err(e) => return Err(format!("expected Conflict(v1), got: {e}")),
        Ok(()) => return Err("put with different content should fail".into()),
    }

    let got = store.get("v1").await.map_err(|e| e.to_string())?;
    if got != first {
        return Err(format!(
            "expected hash {}, got {}",
            first.version_hash, got.version_hash
        ));
    }
    Ok(())
}

async fn list_empty_store<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let listed = store.list().await.map_err(|e| e.to_string())?;
    if !listed.is_empty() {
        return Err(format!("expected empty list, got {listed:?}"));
    }
    Ok(())
}

async fn list_ordered_by_version_id<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    for id in ["v3", "v1", "v2"] {
        store
            .put(make_version(id, "x")?)
            .await
            .map_err(|e| e.to_string())?;
    }

    let listed = store.list().await.map_err(|e| e.to_string())?;
    let ids: Vec<&str> = listed.iter().map(|s| s.version_id.as_str()).collect();
    if ids != ["v1", "v2", "v3"] {
        return Err(format!("expected [v1, v2, v3], got {ids:?}"));
    }
    if listed.iter().any(|s| s.variable_count != 2 || s.locked) {
        return Err(format!("unexpected summaries: {listed:?}"));
    }
    Ok(())
}
