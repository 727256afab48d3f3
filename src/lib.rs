//! 세션 토큰 저장소
//!
//! 인증된 세션의 Refresh Token을 발급 기록, 검증, 폐기하는 라이브러리입니다.
//! 키별 만료를 지원하는 캐시(Redis) 위에 두 개의 인덱스를 유지합니다.
//!
//! # Features
//!
//! - **정방향 인덱스**: 토큰 → 사용자 ID, TTL = 세션 수명
//! - **역방향 인덱스**: 사용자 ID → 토큰 집합, TTL ≥ 가장 오래 사는 토큰
//! - **원자적 집합 갱신**: 동시 발급/폐기가 서로의 결과를 잃지 않음
//! - **부분 실패 보고**: 일괄 폐기 중 실패한 토큰만 돌려줌
//! - **컨텍스트 전파**: 모든 캐시 호출에 취소/기한 적용
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │  인증 워크플로우      │ ← 로그인, 토큰 갱신, 로그아웃 (외부)
//! └──────────────────────┘
//!          │
//!          ▼
//! ┌──────────────────────┐
//! │  SessionTokenStore   │ ← repositories::sessions
//! └──────────────────────┘
//!          │ Arc<dyn Cache>
//!          ▼
//! ┌──────────────────────┐
//! │ RedisClient / Memory │ ← caching
//! └──────────────────────┘
//! ```
//!
//! # Examples
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use session_token_store::caching::redis::RedisClient;
//! use session_token_store::config::{load_env_file, init_logging, RedisConfig, SessionConfig};
//! use session_token_store::core::OpContext;
//! use session_token_store::repositories::sessions::SessionTokenStore;
//!
//! load_env_file();
//! init_logging();
//!
//! let redis = RedisClient::connect(&RedisConfig::from_env()).await?;
//! let store = SessionTokenStore::new(Arc::new(redis), SessionConfig::from_env());
//!
//! let ctx = OpContext::with_timeout(Duration::from_secs(1));
//! store.issue(&ctx, 42, &refresh_token, Duration::from_secs(86400)).await?;
//! ```

pub mod caching;
pub mod config;
pub mod core;
pub mod repositories;

pub use crate::caching::Cache;
pub use crate::core::{CacheError, ErrorKind, OpContext, StoreError, StoreResult};
pub use crate::repositories::sessions::{RevocationReport, SessionTokenStore};
