//! # 세션 토큰 저장소 에러 체계
//!
//! 캐시 계층과 세션 저장소 계층의 에러를 분리해서 정의합니다.
//!
//! - [`CacheError`]: 캐시 백엔드 호출 실패. 재시도 가능한 일시적 실패와
//!   재시도해도 의미 없는 영구 실패를 구분합니다.
//! - [`StoreError`]: 인증 워크플로우에 노출되는 에러. 호출자는
//!   [`StoreError::kind`]로 분기합니다.
//!
//! ## 에러 분류
//!
//! | StoreError | ErrorKind | 재시도 | 로깅 |
//! |------------|-----------|--------|------|
//! | `NotFound` | `NotFound` | 불가 (세션 만료로 처리) | debug |
//! | `Transient` | `Transient` | 가능 (백오프) | warn |
//! | `Untracked` | `Transient` | 가능 (재발급 또는 보상) | error |
//! | `Inconsistent` | `Inconsistent` | 목록에 있는 토큰만 | error |
//! | `InvalidArgument` | `InvalidArgument` | 불가 (호출자 버그) | warn |
//! | `Permanent` | `Permanent` | 불가 | error |
//!
//! ## 사용 예제
//!
//! ```rust,ignore
//! use session_token_store::core::errors::{ErrorKind, StoreError};
//!
//! match store.resolve(&ctx, &token).await {
//!     Ok(user_id) => issue_new_pair(user_id).await,
//!     Err(e) if e.kind() == ErrorKind::NotFound => session_expired(),
//!     Err(e) if e.is_retryable() => retry_later(e),
//!     Err(e) => return Err(e),
//! }
//! ```

use std::time::Duration;
use thiserror::Error;

/// 캐시 백엔드 호출 에러
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// 연결 실패, 연결 끊김, IO 에러 등 재시도 가능한 실패
    #[error("Cache unavailable: {0}")]
    Transient(String),

    /// 호출자가 지정한 기한 초과
    #[error("Cache operation timed out after {0:?}")]
    Timeout(Duration),

    /// 호출자 컨텍스트 취소
    #[error("Cache operation cancelled")]
    Cancelled,

    /// 타입 불일치, 스크립트 에러, 인증 실패 등 재시도해도 실패하는 에러
    #[error("Cache error: {0}")]
    Permanent(String),

    /// 백엔드가 해당 명령을 지원하지 않음
    #[error("Cache command not supported: {0}")]
    Unsupported(&'static str),
}

impl CacheError {
    /// 재시도하면 성공할 수 있는 에러인지 확인합니다.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CacheError::Transient(_) | CacheError::Timeout(_) | CacheError::Cancelled
        )
    }
}

/// 호출자가 분기에 사용하는 에러 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Transient,
    Inconsistent,
    InvalidArgument,
    Permanent,
}

/// 세션 토큰 저장소 에러
///
/// 인증 워크플로우(로그인, 토큰 갱신, 로그아웃)가 받는 에러 타입입니다.
/// `NotFound`는 사용된/만료된/폐기된 토큰에 대한 정상적인 결과이므로
/// 시스템 에러로 기록하면 안 됩니다.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// 토큰이 없거나 만료되었거나 폐기됨
    ///
    /// 만료와 폐기는 구분하지 않습니다.
    #[error("Refresh token not found")]
    NotFound,

    /// 캐시 접근 불가, 타임아웃, 취소
    ///
    /// 절대로 `NotFound`로 취급하지 않습니다.
    #[error("Transient cache failure: {0}")]
    Transient(CacheError),

    /// 토큰 매핑은 저장되었지만 사용자 토큰 집합에 추가되지 못함
    ///
    /// 토큰은 조회 가능하지만 일괄 폐기 대상에서 빠져 있습니다.
    /// 호출자는 같은 토큰으로 `issue`를 재시도하거나 `revoke_one`으로 보상해야 합니다.
    #[error("Token for user {user_id} stored but not tracked for bulk revocation: {source}")]
    Untracked {
        token: String,
        user_id: i64,
        source: CacheError,
    },

    /// 복구가 필요한 상태
    ///
    /// `tokens`에 있는 토큰만 다시 처리하면 됩니다.
    #[error("Inconsistent session state for user {user_id:?}: {} token(s) need repair", tokens.len())]
    Inconsistent {
        user_id: Option<i64>,
        tokens: Vec<String>,
    },

    /// 잘못된 토큰, TTL, 사용자 ID (호출자 버그)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// 재시도해도 해결되지 않는 캐시 에러
    #[error("Permanent cache failure: {0}")]
    Permanent(CacheError),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound => ErrorKind::NotFound,
            StoreError::Transient(_) | StoreError::Untracked { .. } => ErrorKind::Transient,
            StoreError::Inconsistent { .. } => ErrorKind::Inconsistent,
            StoreError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            StoreError::Permanent(_) => ErrorKind::Permanent,
        }
    }

    /// 같은 요청을 다시 시도해도 되는지 확인합니다.
    ///
    /// `Inconsistent`는 전체가 아니라 보고된 토큰만 재시도 대상이므로 `false`입니다.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// 복구가 필요한 토큰 목록
    pub fn unrevoked_tokens(&self) -> &[String] {
        match self {
            StoreError::Inconsistent { tokens, .. } => tokens,
            _ => &[],
        }
    }
}

impl From<CacheError> for StoreError {
    fn from(err: CacheError) -> Self {
        if err.is_transient() {
            StoreError::Transient(err)
        } else {
            StoreError::Permanent(err)
        }
    }
}

/// 편의성을 위한 Result 타입 별칭
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_error_classification() {
        assert!(CacheError::Transient("connection refused".to_string()).is_transient());
        assert!(CacheError::Timeout(Duration::from_millis(10)).is_transient());
        assert!(CacheError::Cancelled.is_transient());
        assert!(!CacheError::Permanent("WRONGTYPE".to_string()).is_transient());
        assert!(!CacheError::Unsupported("SREM").is_transient());
    }

    #[test]
    fn test_cache_error_conversion() {
        let transient: StoreError = CacheError::Cancelled.into();
        assert_eq!(transient.kind(), ErrorKind::Transient);
        assert!(transient.is_retryable());

        let permanent: StoreError = CacheError::Permanent("NOSCRIPT".to_string()).into();
        assert_eq!(permanent.kind(), ErrorKind::Permanent);
        assert!(!permanent.is_retryable());
    }

    #[test]
    fn test_untracked_is_distinct_but_retryable() {
        let error = StoreError::Untracked {
            token: "tok".to_string(),
            user_id: 7,
            source: CacheError::Transient("reset".to_string()),
        };

        assert!(error.is_retryable());
        assert_ne!(error, StoreError::Transient(CacheError::Transient("reset".to_string())));
        assert!(error.to_string().contains("user 7"));
    }

    #[test]
    fn test_inconsistent_lists_tokens() {
        let error = StoreError::Inconsistent {
            user_id: Some(42),
            tokens: vec!["tok-B".to_string()],
        };

        assert_eq!(error.kind(), ErrorKind::Inconsistent);
        assert_eq!(error.unrevoked_tokens(), ["tok-B".to_string()]);
        assert!(!error.is_retryable());
        assert!(StoreError::NotFound.unrevoked_tokens().is_empty());
    }
}
