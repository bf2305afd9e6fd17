//! Deadlines for calls that leave the process

use std::future::Future;
use std::time::Duration;

use crate::error::{AuthError, AuthResult};

/// Run `fut`, failing with [`AuthError::Timeout`] once `limit` elapses.
/// A timeout is never reported as a missing or invalid credential.
pub async fn within<T, F>(limit: Duration, operation: &'static str, fut: F) -> AuthResult<T>
where
    F: Future<Output = AuthResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(AuthError::Timeout(operation)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_passes_result_through() {
        let value = within(Duration::from_secs(1), "op", async { Ok(7) }).await;
        assert_eq!(value.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out() {
        let result: AuthResult<()> = within(Duration::from_millis(50), "slow_call", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(AuthError::Timeout("slow_call"))));
    }
}
