//! # Core Module
//!
//! 세션 토큰 저장소 전반에서 쓰는 기반 타입을 제공합니다.
//!
//! - [`errors`] - 캐시 에러와 저장소 에러 분류
//! - [`context`] - 요청 단위 취소/기한 컨텍스트

pub mod context;
pub mod errors;

pub use context::OpContext;
pub use errors::{CacheError, ErrorKind, StoreError, StoreResult};
