//! Timeout enforcement.
//!
//! Every downstream call goes through `call_with_timeout`; elapsed calls are
//! abandoned (the downstream may keep working) and reported as
//! `GatewayError::Timeout`.

use std::error::Error;
use std::future::Future;
use std::time::Duration;
use tokio::time;

use crate::error::GatewayError;

/// Await `call`, bounding it by `limit` and mapping failures onto `service`.
pub async fn call_with_timeout<F, T, E>(service: &str, limit: Duration, call: F) -> Result<T, GatewayError>
where
    F: Future<Output = Result<T, E>>,
    E: Error,
{
    match time::timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(GatewayError::Unreachable {
            service: service.to_string(),
            reason: describe(&e),
        }),
        Err(_) => Err(GatewayError::Timeout {
            service: service.to_string(),
            after: limit,
        }),
    }
}

/// Render an error with its source chain, e.g. "client error (Connect): tcp connect error: Connection refused".
pub fn describe(err: &dyn Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_elapsed_call_is_timeout() {
        let result: Result<(), _> = call_with_timeout("slow", Duration::from_millis(20), async {
            time::sleep(Duration::from_secs(5)).await;
            Ok::<_, std::io::Error>(())
        })
        .await;

        assert!(matches!(result, Err(GatewayError::Timeout { ref service, .. }) if service == "slow"));
    }

    #[tokio::test]
    async fn test_inner_error_is_unreachable() {
        let result: Result<(), _> = call_with_timeout("down", Duration::from_secs(1), async {
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"))
        })
        .await;

        match result {
            Err(GatewayError::Unreachable { service, reason }) => {
                assert_eq!(service, "down");
                assert!(reason.contains("refused"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
