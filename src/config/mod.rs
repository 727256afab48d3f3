//! # Configuration Module
//!
//! 세션 토큰 저장소의 설정을 담당하는 모듈입니다.
//! 모든 설정은 환경 변수에서 읽으며, `.env` 파일을 지원합니다.
//!
//! ## 모듈 구성
//!
//! - [`data_config`] - 실행 환경 감지, `.env` 로딩, 로거 초기화
//! - [`cache_config`] - Redis 연결 설정과 세션 저장소 설정
//!
//! ## 사용 예제
//!
//! ```rust,ignore
//! use session_token_store::config::{init_logging, load_env_file, RedisConfig, SessionConfig};
//!
//! load_env_file();
//! init_logging();
//!
//! let redis = RedisConfig::from_env();
//! let sessions = SessionConfig::from_env();
//! ```
//!
//! ## 환경 변수
//!
//! ```bash
//! export ENVIRONMENT="production"   # development, test, staging, production
//! export REDIS_URL="redis://localhost:6379"
//! export REDIS_OPERATION_TIMEOUT_MS="3000"
//! export SESSION_DEFAULT_TTL_SECS="1209600"
//! ```

pub mod cache_config;
pub mod data_config;

pub use cache_config::*;
pub use data_config::*;
