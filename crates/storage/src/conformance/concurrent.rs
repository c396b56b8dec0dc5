use std::future::Future;
use std::sync::Arc;

use super::{make_execution, make_version, TestResult};
use crate::{StoreError, VersionStore};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_puts_different_ids_all_succeed",
        concurrent_puts_different_ids_all_succeed(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_puts_same_id_one_winner",
        concurrent_puts_same_id_one_winner(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_identical_puts_all_succeed",
        concurrent_identical_puts_all_succeed(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_records_all_kept",
        concurrent_records_all_kept(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_put_and_lock_never_replaces_locked",
        concurrent_put_and_lock_never_replaces_locked(factory).await,
    ));

    results
}

async fn concurrent_puts_different_ids_all_succeed<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = Arc::new(factory().await);

    let mut handles = Vec::new();
    for i in 0..N {
        let version = make_version(&format!("v{i:02}"), "x")?;
        let s = store.clone();
        handles.push(tokio::spawn(async move { s.put(version).await }));
    }
    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("storage error: {e}"))?;
    }

    let listed = store.list().await.map_err(|e| e.to_string())?;
    if listed.len() != N {
        return Err(format!("expected {N} versions, got {}", listed.len()));
    }
    Ok(())
}

/// N tasks put different content under one new id. Exactly one wins, the
/// rest conflict, and the stored content is the winner's.
async fn concurrent_puts_same_id_one_winner<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = Arc::new(factory().await);

    let mut handles = Vec::new();
    for i in 0..N {
        let version = make_version("v1", &format!("edit-{i}"))?;
        let hash = version.version_hash.clone();
        let s = store.clone();
        handles.push(tokio::spawn(async move { (hash, s.put(version).await) }));
    }
    let mut winners = Vec::new();
    for handle in handles {
        let (hash, result) = handle.await.map_err(|e| format!("task panic: {e}"))?;
        match result {
            Ok(()) => winners.push(hash),
            Err(StoreError::Conflict { .. }) => {}
            Err(e) => return Err(format!("storage error: {e}")),
        }
    }

    if winners.len() != 1 {
        return Err(format!("expected 1 successful put, got {}", winners.len()));
    }
    let listed = store.list().await.map_err(|e| e.to_string())?;
    if listed.len() != 1 {
        return Err(format!("expected 1 version, got {}", listed.len()));
    }
    let survivor = store.get("v1").await.map_err(|e| e.to_string())?;
    if survivor.version_hash != winners[0] {
        return Err(format!("unexpected survivor hash {}", survivor.version_hash));
    }
    Ok(())
}

async fn concurrent_identical_puts_all_succeed<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = Arc::new(factory().await);
    let version = make_version("v1", "same")?;

    let mut handles = Vec::new();
    for _ in 0..N {
        let v = version.clone();
        let s = store.clone();
        handles.push(tokio::spawn(async move { s.put(v).await }));
    }
    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("storage error: {e}"))?;
    }

    let got = store.get("v1").await.map_err(|e| e.to_string())?;
    if got != version {
        return Err("stored version differs from the submitted one".into());
    }
    Ok(())
}

async fn concurrent_records_all_kept<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = Arc::new(factory().await);
    let version = make_version("v1", "x")?;
    store
        .put(version.clone())
        .await
        .map_err(|e| e.to_string())?;

    let mut handles = Vec::new();
    for i in 0..N {
        let record = make_execution(&format!("exec-{i}"), &version, &format!("user-{i}"));
        let s = store.clone();
        handles.push(tokio::spawn(async move { s.record_execution(record).await }));
    }
    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("storage error: {e}"))?;
    }

    let listed = store
        .list_executions("v1")
        .await
        .map_err(|e| e.to_string())?;
    if listed.len() != N {
        return Err(format!("expected {N} executions, got {}", listed.len()));
    }
    Ok(())
}

/// Puts of new content race against a lock. Every put fails, either as a
/// conflict or against the lock, and the initial content stays locked.
async fn concurrent_put_and_lock_never_replaces_locked<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = Arc::new(factory().await);
    let initial = make_version("v1", "initial")?;
    store
        .put(initial.clone())
        .await
        .map_err(|e| e.to_string())?;

    let mut handles = Vec::new();
    for i in 0..N {
        let version = make_version("v1", &format!("edit-{i}"))?;
        let s = store.clone();
        handles.push(tokio::spawn(async move {
            match s.put(version).await {
                Ok(()) => Err(StoreError::Backend("conflicting put succeeded".into())),
                Err(StoreError::Locked { .. } | StoreError::Conflict { .. }) => Ok(()),
                Err(e) => Err(e),
            }
        }));
    }
    store.lock("v1").await.map_err(|e| format!("lock: {e}"))?;
    let locked = store.get("v1").await.map_err(|e| e.to_string())?;

    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("storage error: {e}"))?;
    }

    let after = store.get("v1").await.map_err(|e| e.to_string())?;
    if !after.locked {
        return Err("version should remain locked".into());
    }
    if after.version_hash != locked.version_hash || after.version_hash != initial.version_hash {
        return Err("locked version was replaced by a concurrent put".into());
    }
    Ok(())
}
