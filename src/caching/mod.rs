//! 캐싱 계층 모듈
//!
//! 세션 저장소가 사용하는 만료 기반 키-값 캐시를 [`Cache`] trait으로 추상화합니다.
//! 저장소는 전역 싱글톤이 아니라 생성자로 주입받은 `Arc<dyn Cache>`만 사용합니다.
//!
//! # 구현체
//!
//! - [`redis::RedisClient`] - `ConnectionManager` 기반 Redis 백엔드
//! - [`memory::InMemoryCache`] - 프로세스 내부 캐시 (개발 및 테스트용)
//!
//! # 사용 예제
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use session_token_store::caching::{Cache, redis::RedisClient};
//!
//! let cache: Arc<dyn Cache> = Arc::new(RedisClient::from_env().await?);
//! ```
//!
//! # 환경 설정
//!
//! ```bash
//! REDIS_URL=redis://localhost:6379  # 기본값
//! ```

pub mod memory;
pub mod redis;

use async_trait::async_trait;
use std::time::Duration;

use crate::core::context::OpContext;
use crate::core::errors::CacheError;

/// 집합 멤버 제거 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetRemoval {
    /// 원자적으로 제거됨. 실제로 제거된 멤버 수
    Removed(u64),
    /// 백엔드에 원자적 제거 명령이 없음. 호출자는 CAS 경로를 사용해야 함
    Unsupported,
}

/// 만료 기반 키-값 캐시
///
/// 모든 명령은 키 단위로 원자적이어야 하며, 호출자 컨텍스트의 취소와 기한을 따라야 합니다.
/// 실패는 [`CacheError::is_transient`]로 재시도 가능 여부를 구분합니다.
#[async_trait]
pub trait Cache: Send + Sync {
    /// `SET key value PX ttl`
    async fn set_ex(
        &self,
        ctx: &OpContext,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), CacheError>;

    /// `GET key`
    async fn get(&self, ctx: &OpContext, key: &str) -> Result<Option<String>, CacheError>;

    /// `GETDEL key`. 값을 읽으면서 원자적으로 삭제합니다.
    async fn get_del(&self, ctx: &OpContext, key: &str) -> Result<Option<String>, CacheError>;

    /// `DEL key...`. 실제로 삭제된 키 수를 반환합니다.
    async fn del(&self, ctx: &OpContext, keys: &[String]) -> Result<u64, CacheError>;

    /// `SADD key member...`
    async fn sadd(&self, ctx: &OpContext, key: &str, members: &[String])
    -> Result<u64, CacheError>;

    /// `SREM key member...`
    ///
    /// 다른 멤버와 집합 TTL을 건드리지 않는 원자적 제거여야 합니다.
    async fn srem(
        &self,
        ctx: &OpContext,
        key: &str,
        members: &[String],
    ) -> Result<SetRemoval, CacheError>;

    /// `SMEMBERS key`
    async fn smembers(&self, ctx: &OpContext, key: &str) -> Result<Vec<String>, CacheError>;

    /// `PEXPIRE key ttl`. 키가 없으면 `false`
    ///
    /// TTL을 줄일 수도 있으므로 세션 저장소는 [`Cache::extend_ttl`]을 쓰고,
    /// 이 명령은 다른 호출자를 위한 캐시 기본 명령으로 남겨 둡니다.
    async fn expire(&self, ctx: &OpContext, key: &str, ttl: Duration) -> Result<bool, CacheError>;

    /// 키의 TTL을 최소 `ttl` 이상으로 늘립니다. 절대 줄이지 않습니다.
    ///
    /// 키가 없으면 `false`
    async fn extend_ttl(
        &self,
        ctx: &OpContext,
        key: &str,
        ttl: Duration,
    ) -> Result<bool, CacheError>;

    /// 집합 멤버와 현재 버전을 함께 읽습니다 (CAS 경로 전용).
    async fn smembers_versioned(
        &self,
        _ctx: &OpContext,
        _key: &str,
    ) -> Result<(Vec<String>, u64), CacheError> {
        Err(CacheError::Unsupported("versioned SMEMBERS"))
    }

    /// 버전이 일치할 때만 집합 내용을 교체합니다 (CAS 경로 전용).
    ///
    /// 교체 시 집합 TTL은 유지되어야 하며, 빈 목록이면 키를 삭제합니다.
    /// 버전이 달라 교체하지 못했으면 `false`
    async fn replace_members_if_version(
        &self,
        _ctx: &OpContext,
        _key: &str,
        _version: u64,
        _members: &[String],
    ) -> Result<bool, CacheError> {
        Err(CacheError::Unsupported("versioned set replace"))
    }

    /// 연결 상태 확인
    async fn ping(&self, ctx: &OpContext) -> Result<(), CacheError>;
}
