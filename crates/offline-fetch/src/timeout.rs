//! Advisory fetch deadlines.

use std::time::Duration;

use tokio::task::JoinHandle;

use crate::client::FetchError;

/// Wait for a spawned fetch for at most `deadline`.
///
/// On expiry the task is detached, not aborted: it keeps running and any
/// side effects it performs (such as storing the response) still happen.
pub async fn detach_on_deadline<T>(
    task: JoinHandle<Result<T, FetchError>>,
    deadline: Duration,
) -> Result<T, FetchError> {
    match tokio::time::timeout(deadline, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(FetchError::Request(format!("fetch task failed: {}", join_err))),
        Err(_) => Err(FetchError::Timeout(deadline)),
    }
}
