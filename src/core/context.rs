//! 호출 컨텍스트
//!
//! 모든 캐시 호출은 호출자가 넘긴 [`OpContext`] 안에서 실행됩니다.
//! 기한이 지나거나 컨텍스트가 취소되면 즉시 일시적 에러로 실패하며,
//! 내부에서 조용히 재시도하지 않습니다.

use std::future::Future;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::core::errors::CacheError;

/// 요청 단위 취소/기한 컨텍스트
///
/// `child()`로 만든 컨텍스트는 부모가 취소되면 함께 취소됩니다.
///
/// ```rust,ignore
/// let ctx = OpContext::with_timeout(Duration::from_millis(500));
/// let user_id = store.resolve(&ctx, &refresh_token).await?;
/// ```
#[derive(Debug, Clone)]
pub struct OpContext {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl OpContext {
    /// 기한 없이 취소되지 않는 컨텍스트
    pub fn background() -> Self {
        Self {
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            cancel: CancellationToken::new(),
        }
    }

    /// 부모의 취소를 따르는 하위 컨텍스트를 만듭니다.
    ///
    /// `timeout`이 주어지면 부모 기한과 비교해 더 이른 쪽을 사용합니다.
    pub fn child(&self, timeout: Option<Duration>) -> Self {
        let own = timeout.map(|t| Instant::now() + t);
        let deadline = match (self.deadline, own) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        Self {
            deadline,
            cancel: self.cancel.child_token(),
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// 남은 시간. 기한이 없으면 `None`, 이미 지났으면 `Some(Duration::ZERO)`
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// 취소와 기한을 감시하면서 캐시 호출을 실행합니다.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, CacheError>
    where
        F: Future<Output = Result<T, CacheError>>,
    {
        if self.cancel.is_cancelled() {
            return Err(CacheError::Cancelled);
        }

        match self.remaining() {
            None => tokio::select! {
                _ = self.cancel.cancelled() => Err(CacheError::Cancelled),
                result = fut => result,
            },
            Some(remaining) if remaining.is_zero() => Err(CacheError::Timeout(Duration::ZERO)),
            Some(remaining) => tokio::select! {
                _ = self.cancel.cancelled() => Err(CacheError::Cancelled),
                result = tokio::time::timeout(remaining, fut) => {
                    result.unwrap_or(Err(CacheError::Timeout(remaining)))
                }
            },
        }
    }
}

impl Default for OpContext {
    fn default() -> Self {
        Self::background()
    }
}
