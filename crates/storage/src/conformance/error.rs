use std::future::Future;

use super::{make_execution, make_version, TestResult};
use crate::{StoreError, VersionStore};

pub(super) async fn run_error_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "error",
        "get_nonexistent_not_found",
        get_nonexistent_not_found(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "lock_nonexistent_not_found",
        lock_nonexistent_not_found(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "record_execution_unknown_version_not_found",
        record_execution_unknown_version_not_found(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "list_executions_unknown_version_not_found",
        list_executions_unknown_version_not_found(factory).await,
    ));

    results
}

fn expect_not_found<T: std::fmt::Debug>(
    result: Result<T, StoreError>,
    expected_id: &str,
) -> Result<(), String> {
    match result {
        Err(StoreError::NotFound { version_id }) if version_id == expected_id => Ok(()),
        Err(StoreError::NotFound { version_id }) => Err(format!(
            "expected NotFound({expected_id}), got NotFound({version_id})"
        )),
        Err(e) => Err(format!("expected NotFound, got: {e}")),
        Ok(v) => Err(format!("expected NotFound, got Ok({v:?})")),
    }
}

async fn get_nonexistent_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    expect_not_found(store.get("nope").await, "nope")
}

async fn lock_nonexistent_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    expect_not_found(store.lock("nope").await, "nope")?;
    // A failed lock must not create the version.
    expect_not_found(store.get("nope").await, "nope")
}

async fn record_execution_unknown_version_not_found<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let orphan = make_version("ghost", "never stored")?;
    expect_not_found(
        store
            .record_execution(make_execution("exec-1", &orphan, "user-1"))
            .await,
        "ghost",
    )
}

async fn list_executions_unknown_version_not_found<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    expect_not_found(store.list_executions("nope").await, "nope")
}
