use soba_core::common::backoff::BackoffPolicy;
use std::future::Future;
use tracing::warn;

/// # Summary
/// 以固定档位退避重试包裹一个异步操作。
///
/// # Logic
/// 1. 执行操作，成功立即返回。
/// 2. 失败时按策略产出的间隔 sleep 后重试。
/// 3. 重试次数耗尽后返回最后一次的错误。
///
/// # Arguments
/// * `policy`: 退避策略（默认档位为 3 次，1s/2s/4s）。
/// * `label`: 日志中标识该操作的名称。
/// * `op`: 每次调用产生一个新 Future 的操作闭包。
pub async fn with_backoff<T, E, F, Fut>(
    policy: BackoffPolicy,
    label: &str,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => match policy.delay(attempt) {
                Some(delay) => {
                    warn!(
                        "{} failed (attempt {}/{}): {}, retrying in {:?}",
                        label,
                        attempt + 1,
                        policy.max_retries(),
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => return Err(e),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_retry_schedule_then_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let started = tokio::time::Instant::now();

        let result: Result<u32, String> =
            with_backoff(BackoffPolicy::standard(), "test_op", move || {
                let calls = calls_clone.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n < 3 { Err("transient".to_string()) } else { Ok(n) }
                }
            })
            .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        // 1s + 2s + 4s 的完整退避路径
        assert_eq!(started.elapsed(), Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhausted_propagates_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: Result<(), String> =
            with_backoff(BackoffPolicy::standard(), "always_fail", move || {
                let calls = calls_clone.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("permanent".to_string())
                }
            })
            .await;

        assert_eq!(result, Err("permanent".to_string()));
        // 首次尝试 + 3 次重试
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
