//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap relay attempts and probes with a deadline
//! - Cancel the attempt cleanly when the deadline passes
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; dropping the future aborts the request
//! - A timeout is an ordinary attempt failure and drives rotation like any other

use std::future::Future;
use std::time::Duration;

use tokio::time;

use crate::relay::error::{RelayError, RelayResult};

/// Run `fut`, failing with `AttemptTimeout` once `deadline` passes.
pub async fn with_deadline<T, F>(deadline: Duration, fut: F) -> RelayResult<T>
where
    F: Future<Output = RelayResult<T>>,
{
    match time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(RelayError::AttemptTimeout(deadline)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deadline_exceeded() {
        let slow = async {
            time::sleep(Duration::from_secs(5)).await;
            Ok::<_, RelayError>(())
        };
        let result = with_deadline(Duration::from_millis(20), slow).await;
        assert_eq!(result, Err(RelayError::AttemptTimeout(Duration::from_millis(20))));
    }

    #[tokio::test]
    async fn test_inner_result_passes_through() {
        let ok = with_deadline(Duration::from_secs(1), async { Ok::<_, RelayError>(7) }).await;
        assert_eq!(ok, Ok(7));

        let err = with_deadline(Duration::from_secs(1), async {
            Err::<(), _>(RelayError::Transport("refused".into()))
        })
        .await;
        assert_eq!(err, Err(RelayError::Transport("refused".into())));
    }
}
