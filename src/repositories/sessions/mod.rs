//! Refresh Token 세션 저장소 모듈
//!
//! 토큰 → 사용자 정방향 인덱스와 사용자 → 토큰 집합 역방향 인덱스를 함께 관리합니다.
//!
//! # Features
//!
//! - **발급/조회**: 토큰 수명과 같은 TTL로 정방향 매핑 저장
//! - **단일 폐기**: 원자적 `SREM`으로 다른 세션에 영향 없이 제거 (로그아웃 재시도 안전)
//! - **일괄 폐기**: 사용자 전체 세션 폐기, 부분 실패 시 남은 토큰 보고
//! - **토큰 교환**: `GETDEL`로 이전 토큰을 한 번만 소비
//!
//! # Usage
//!
//! ```rust,ignore
//! use session_token_store::repositories::sessions::SessionTokenStore;
//!
//! let store = SessionTokenStore::new(cache, SessionConfig::from_env());
//!
//! store.issue(&ctx, 42, "tok-A", Duration::from_secs(3600)).await?;
//! assert_eq!(store.resolve(&ctx, "tok-A").await?, 42);
//! store.revoke_all_for_user(&ctx, 42).await?;
//! ```

pub mod session_store;

pub use session_store::*;
