//! 再試行（指数バックオフ）
//!
//! 通信そのものの失敗（接続エラー・タイムアウト）だけを再試行する。
//! レスポンスを受け取れた場合はステータスコードに関係なく即座に返す。
//! 402（利用上限）などを再試行すると利用枠を無駄に消費するため。

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

/// 再試行ポリシー
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// 最大試行回数（初回を含む）
    pub max_attempts: u32,
    /// 初回の待ち時間
    pub initial_delay: Duration,
    /// 待ち時間の倍率
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(2),
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_attempts,
            initial_delay,
            backoff_factor,
        }
    }

    /// 再試行しない
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, 1.0)
    }

    /// n回目の再試行前の待ち時間（0始まり）: `delay * factor^n`
    ///
    /// 表現できない長さは [`MAX_DELAY`] に丸める。
    pub fn delay_for(&self, retry_index: u32) -> Duration {
        let exponent = i32::try_from(retry_index).unwrap_or(i32::MAX);
        let factor = self.backoff_factor.max(0.0).powi(exponent);
        Duration::try_from_secs_f64(self.initial_delay.as_secs_f64() * factor)
            .map_or(MAX_DELAY, |delay| delay.min(MAX_DELAY))
    }

    /// 倍率が有限の非負数で、最後の再試行までの待ち時間が上限以内か
    pub fn validate(&self) -> Result<(), String> {
        if !self.backoff_factor.is_finite() || self.backoff_factor < 0.0 {
            return Err(format!("再試行の倍率が不正です: {}", self.backoff_factor));
        }
        let last_retry = self.max_attempts.saturating_sub(2);
        let exponent = i32::try_from(last_retry).unwrap_or(i32::MAX);
        let longest = self.initial_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        if !longest.is_finite() || longest > MAX_DELAY.as_secs_f64() {
            return Err(format!(
                "再試行の待ち時間が長すぎます（最大{}秒）: {}回, 初回{:.1}秒, x{}",
                MAX_DELAY.as_secs(),
                self.max_attempts,
                self.initial_delay.as_secs_f64(),
                self.backoff_factor
            ));
        }
        Ok(())
    }
}

/// 1回の待ち時間の上限
pub const MAX_DELAY: Duration = Duration::from_secs(3600);

/// 再試行の結果エラー
#[derive(Debug)]
pub enum RetryError<E> {
    /// 再試行対象のエラーが上限まで続いた
    Exhausted { attempts: u32, last: E },
    /// 再試行対象外のエラー
    Fatal(E),
}

/// 操作を再試行ポリシーに従って実行する
///
/// `operation` には試行回数（1始まり）が渡される。
/// `is_retryable` が `true` を返したエラーだけを再試行する。
pub async fn retry<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    mut operation: F,
    is_retryable: P,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if !is_retryable(&e) => return Err(RetryError::Fatal(e)),
            Err(e) if attempt >= max_attempts => {
                error!(attempts = attempt, "再試行上限に達しました: {}", e);
                return Err(RetryError::Exhausted { attempts: attempt, last: e });
            }
            Err(e) => {
                let delay = policy.delay_for(attempt - 1);
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "通信エラー: {}。{:.1}秒後に再試行します",
                    e,
                    delay.as_secs_f64()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    enum FakeError {
        Timeout,
        Fatal,
    }

    impl std::fmt::Display for FakeError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self)
        }
    }

    fn retryable(e: &FakeError) -> bool {
        matches!(e, FakeError::Timeout)
    }

    #[test]
    fn test_delay_schedule() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), 2.0);
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));

        let fixed = RetryPolicy::new(3, Duration::from_secs(1), 1.0);
        assert_eq!(fixed.delay_for(4), Duration::from_secs(1));
    }

    #[test]
    fn test_delay_saturates_instead_of_panicking() {
        let huge = RetryPolicy::new(3, Duration::from_secs(2), 1e300);
        assert_eq!(huge.delay_for(2), MAX_DELAY);
        let infinite = RetryPolicy::new(3, Duration::from_secs(2), f64::INFINITY);
        assert_eq!(infinite.delay_for(1), MAX_DELAY);
        assert_eq!(infinite.delay_for(0), Duration::from_secs(2));
        let nan = RetryPolicy::new(3, Duration::from_secs(2), f64::NAN);
        assert_eq!(nan.delay_for(1), Duration::ZERO);
    }

    #[test]
    fn test_validate() {
        assert!(RetryPolicy::default().validate().is_ok());
        assert!(RetryPolicy::none().validate().is_ok());
        assert!(RetryPolicy::new(3, Duration::from_secs(2), f64::INFINITY).validate().is_err());
        assert!(RetryPolicy::new(3, Duration::from_secs(2), f64::NAN).validate().is_err());
        assert!(RetryPolicy::new(3, Duration::from_secs(2), -1.0).validate().is_err());
        assert!(RetryPolicy::new(3, Duration::from_secs(2), 1e300).validate().is_err());
        // 1回しか試行しなければ倍率は使われない
        assert!(RetryPolicy::new(1, Duration::from_secs(2), 1e300).validate().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry(
            &RetryPolicy::default(),
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(FakeError::Fatal) }
            },
            retryable,
        )
        .await;

        assert!(matches!(result, Err(RetryError::Fatal(FakeError::Fatal))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry(
            &RetryPolicy::new(3, Duration::from_secs(1), 2.0),
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(FakeError::Timeout) }
            },
            retryable,
        )
        .await;

        match result {
            Err(RetryError::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert!(matches!(last, FakeError::Timeout));
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_attempts_treated_as_one() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry(
            &RetryPolicy::new(0, Duration::from_secs(1), 2.0),
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(FakeError::Timeout) }
            },
            retryable,
        )
        .await;

        assert!(matches!(result, Err(RetryError::Exhausted { attempts: 1, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
