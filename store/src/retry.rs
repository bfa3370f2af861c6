//! Process-wide retry wrapper for the document store.
//!
//! spec.md §9 "Mongo proxy": any store operation may transparently retry on
//! `NotMaster`/`ServerSelectionTimeout`-style transient failures, with no
//! change in return value to the caller. [`with_retry`] is that wrapper;
//! [`mongo::MongoStore`](crate::mongo::MongoStore) wraps every operation
//! with it.

use crate::error::StoreError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

const MAX_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(200);

pub async fn with_retry<T, F, Fut>(operation: &str, mut f: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt + 1 < MAX_ATTEMPTS => {
                attempt += 1;
                warn!(operation, attempt, error = %err, "transient store error, retrying");
                tokio::time::sleep(RETRY_DELAY).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry("test_op", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(StoreError::Transport("flaky".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_non_transient_errors() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry("test_op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(StoreError::NotFound) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
