use std::future::Future;

use super::{make_version, TestResult};
use crate::{StoreError, VersionStore};

pub(super) async fn run_lock_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "lock",
        "lock_marks_version_locked",
        lock_marks_version_locked(factory).await,
    ));
    results.push(TestResult::from_result(
        "lock",
        "lock_is_idempotent",
        lock_is_idempotent(factory).await,
    ));
    results.push(TestResult::from_result(
        "lock",
        "put_over_locked_version_rejected",
        put_over_locked_version_rejected(factory).await,
    ));
    results.push(TestResult::from_result(
        "lock",
        "locked_version_still_readable",
        locked_version_still_readable(factory).await,
    ));
    results.push(TestResult::from_result(
        "lock",
        "lock_leaves_other_versions_unlocked",
        lock_leaves_other_versions_unlocked(factory).await,
    ));

    results
}

async fn lock_marks_version_locked<S, F, Fut>(factory: &F) -> Result<(), String>
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
    store.lock("v1").await.map_err(|e| e.to_string())?;

    let got = store.get("v1").await.map_err(|e| e.to_string())?;
    if !got.locked {
        return Err("version should be locked".into());
    }
    let listed = store.list().await.map_err(|e| e.to_string())?;
    if !listed.iter().all(|s| s.locked) {
        return Err(format!("summary should report locked: {listed:?}"));
    }
    Ok(())
}

async fn lock_is_idempotent<S, F, Fut>(factory: &F) -> Result<(), String>
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
    store.lock("v1").await.map_err(|e| e.to_string())?;
    store
        .lock("v1")
        .await
        .map_err(|e| format!("second lock should succeed: {e}"))?;
    Ok(())
}

async fn put_over_locked_version_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let first = make_version("v1", "first")?;
    store
        .put(first.clone())
        .await
        .map_err(|e| e.to_string())?;
    store.lock("v1").await.map_err(|e| e.to_string())?;

    match store.put(make_version("v1", "second")?).await {
        Err(StoreError::Locked { version_id }) if version_id == "v1" => {}
        Err(e) => return Err(format!("expected Locked(v1), got: {e}")),
        Ok(()) => return Err("put over a locked version should fail".into()),
    }
    // Identical content is refused too once locked.
    match store.put(first.clone()).await {
        Err(StoreError::Locked { .. }) => {}
        other => return Err(format!("expected Locked for identical re-put, got: {other:?}")),
    }

    let got = store.get("v1").await.map_err(|e| e.to_string())?;
    if got.version_hash != first.version_hash || !got.locked {
        return Err("locked version must be unchanged".into());
    }
    Ok(())
}

async fn locked_version_still_readable<S, F, Fut>(factory: &F) -> Result<(), String>
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

    let got = store.get("v1").await.map_err(|e| e.to_string())?;
    if got.bundle != version.bundle || got.graph != version.graph {
        return Err("lock must not alter stored content".into());
    }
    Ok(())
}

async fn lock_leaves_other_versions_unlocked<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    for id in ["v1", "v2"] {
        store
            .put(make_version(id, "x")?)
            .await
            .map_err(|e| e.to_string())?;
    }
    store.lock("v1").await.map_err(|e| e.to_string())?;

    let v2 = store.get("v2").await.map_err(|e| e.to_string())?;
    if v2.locked {
        return Err("locking v1 must not lock v2".into());
    }
    store
        .put(make_version("v2", "x")?)
        .await
        .map_err(|e| format!("v2 should still accept an identical re-put: {e}"))?;
    Ok(())
}
