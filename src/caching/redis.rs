//! # Redis 캐시 클라이언트 구현
//!
//! [`Cache`] trait의 Redis 백엔드입니다.
//!
//! ## 연결 관리
//!
//! `redis::aio::ConnectionManager`를 사용합니다. 단일 멀티플렉싱 연결을
//! 여러 동시 요청이 공유하며, 연결이 끊기면 다음 요청에서 재연결합니다.
//! 재연결 중인 요청은 메모리에 쌓지 않고 일시적 에러로 즉시 실패합니다.
//!
//! ## 타임아웃
//!
//! 각 명령은 호출자 컨텍스트와 `operation_timeout` 중 더 이른 기한 안에서 실행됩니다.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError, Script};
use std::time::Duration;

use crate::caching::{Cache, SetRemoval};
use crate::config::RedisConfig;
use crate::core::context::OpContext;
use crate::core::errors::CacheError;

/// 현재 TTL이 요청값보다 짧을 때만 `PEXPIRE`를 실행합니다.
///
/// `PTTL`이 -1(만료 없음)이면 새 TTL을 설정하고, -2(키 없음)이면 0을 반환합니다.
const EXTEND_TTL_SCRIPT: &str = r#"
local current = redis.call('PTTL', KEYS[1])
if current == -2 then
    return 0
end
local wanted = tonumber(ARGV[1])
if current < wanted then
    redis.call('PEXPIRE', KEYS[1], wanted)
end
return 1
"#;

/// Redis 에러를 일시적/영구 에러로 분류합니다.
pub(crate) fn classify(err: RedisError) -> CacheError {
    let transient = err.is_timeout()
        || err.is_connection_refusal()
        || err.is_connection_dropped()
        || err.is_io_error()
        || matches!(
            err.kind(),
            redis::ErrorKind::TryAgain
                | redis::ErrorKind::BusyLoadingError
                | redis::ErrorKind::ClusterDown
                | redis::ErrorKind::MasterDown
        );

    if transient {
        CacheError::Transient(err.to_string())
    } else {
        CacheError::Permanent(err.to_string())
    }
}

/// Redis가 받는 밀리초 TTL로 변환합니다. `i64` 범위를 넘으면 에러
fn millis(ttl: Duration) -> Result<i64, CacheError> {
    // PX 0은 Redis가 거부하므로 1ms 미만은 1ms로 올림
    i64::try_from(ttl.as_millis())
        .map(|ms| ms.max(1))
        .map_err(|_| CacheError::Permanent(format!("ttl {:?} out of range", ttl)))
}

/// Redis 캐시 클라이언트
///
/// `Clone`은 같은 연결 관리자를 공유합니다.
///
/// ```rust,ignore
/// let redis = RedisClient::connect(&RedisConfig::from_env()).await?;
/// let store = SessionTokenStore::new(Arc::new(redis), SessionConfig::from_env());
/// ```
#[derive(Clone)]
pub struct RedisClient {
    conn: ConnectionManager,
    operation_timeout: Duration,
    extend_script: Script,
}

impl RedisClient {
    /// Redis에 연결하고 PING으로 가용성을 확인합니다.
    ///
    /// `dial_timeout` 안에 연결되지 않으면 일시적 에러로 실패합니다.
    pub async fn connect(config: &RedisConfig) -> Result<Self, CacheError> {
        let client = Client::open(config.url.as_str()).map_err(classify)?;

        let ctx = OpContext::with_timeout(config.dial_timeout);
        let mut conn = ctx
            .run(async { ConnectionManager::new(client).await.map_err(classify) })
            .await
            .inspect_err(|e| log::error!("Redis 연결 실패 ({}): {}", config.url, e))?;

        ctx.run(async {
            redis::cmd("PING")
                .query_async::<()>(&mut conn)
                .await
                .map_err(classify)
        })
        .await
        .inspect_err(|e| log::error!("Redis PING 실패: {}", e))?;

        log::info!("Redis 연결 성공 ({})", config.url);

        Ok(Self {
            conn,
            operation_timeout: config.operation_timeout,
            extend_script: Script::new(EXTEND_TTL_SCRIPT),
        })
    }

    /// `RedisConfig::from_env()`로 연결합니다.
    pub async fn from_env() -> Result<Self, CacheError> {
        Self::connect(&RedisConfig::from_env()).await
    }

    fn scoped(&self, ctx: &OpContext) -> OpContext {
        ctx.child(Some(self.operation_timeout))
    }
}

#[async_trait]
impl Cache for RedisClient {
    async fn set_ex(
        &self,
        ctx: &OpContext,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let ms = millis(ttl)?;
        let mut conn = self.conn.clone();
        self.scoped(ctx)
            .run(async {
                redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .arg("PX")
                    .arg(ms)
                    .query_async::<()>(&mut conn)
                    .await
                    .map_err(classify)
            })
            .await
    }

    async fn get(&self, ctx: &OpContext, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        self.scoped(ctx)
            .run(async { conn.get::<_, Option<String>>(key).await.map_err(classify) })
            .await
    }

    async fn get_del(&self, ctx: &OpContext, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        self.scoped(ctx)
            .run(async {
                redis::cmd("GETDEL")
                    .arg(key)
                    .query_async::<Option<String>>(&mut conn)
                    .await
                    .map_err(classify)
            })
            .await
    }

    async fn del(&self, ctx: &OpContext, keys: &[String]) -> Result<u64, CacheError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        self.scoped(ctx)
            .run(async { conn.del::<_, u64>(keys).await.map_err(classify) })
            .await
    }

    async fn sadd(
        &self,
        ctx: &OpContext,
        key: &str,
        members: &[String],
    ) -> Result<u64, CacheError> {
        if members.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        self.scoped(ctx)
            .run(async { conn.sadd::<_, _, u64>(key, members).await.map_err(classify) })
            .await
    }

    async fn srem(
        &self,
        ctx: &OpContext,
        key: &str,
        members: &[String],
    ) -> Result<SetRemoval, CacheError> {
        if members.is_empty() {
            return Ok(SetRemoval::Removed(0));
        }
        let mut conn = self.conn.clone();
        let removed = self
            .scoped(ctx)
            .run(async { conn.srem::<_, _, u64>(key, members).await.map_err(classify) })
            .await?;
        Ok(SetRemoval::Removed(removed))
    }

    async fn smembers(&self, ctx: &OpContext, key: &str) -> Result<Vec<String>, CacheError> {
        let mut conn = self.conn.clone();
        self.scoped(ctx)
            .run(async { conn.smembers::<_, Vec<String>>(key).await.map_err(classify) })
            .await
    }

    async fn expire(&self, ctx: &OpContext, key: &str, ttl: Duration) -> Result<bool, CacheError> {
        let ms = millis(ttl)?;
        let mut conn = self.conn.clone();
        self.scoped(ctx)
            .run(async {
                conn.pexpire::<_, bool>(key, ms)
                    .await
                    .map_err(classify)
            })
            .await
    }

    async fn extend_ttl(
        &self,
        ctx: &OpContext,
        key: &str,
        ttl: Duration,
    ) -> Result<bool, CacheError> {
        let ms = millis(ttl)?;
        let mut conn = self.conn.clone();
        let applied = self
            .scoped(ctx)
            .run(async {
                self.extend_script
                    .key(key)
                    .arg(ms)
                    .invoke_async::<i64>(&mut conn)
                    .await
                    .map_err(classify)
            })
            .await?;
        Ok(applied == 1)
    }

    async fn ping(&self, ctx: &OpContext) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        self.scoped(ctx)
            .run(async {
                redis::cmd("PING")
                    .query_async::<()>(&mut conn)
                    .await
                    .map_err(classify)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_millisecond_ttl_rounds_up() {
        assert_eq!(millis(Duration::from_micros(300)), Ok(1));
        assert_eq!(millis(Duration::from_secs(2)), Ok(2000));
    }

    #[test]
    fn test_ttl_beyond_i64_millis_is_rejected() {
        assert!(matches!(millis(Duration::MAX), Err(CacheError::Permanent(_))));
        assert_eq!(
            millis(Duration::from_millis(i64::MAX as u64)),
            Ok(i64::MAX)
        );
    }

    #[test]
    fn test_classify_io_error_is_transient() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = classify(RedisError::from(io));
        assert!(err.is_transient());
    }

    #[test]
    fn test_classify_type_error_is_permanent() {
        let err = classify(RedisError::from((
            redis::ErrorKind::TypeError,
            "WRONGTYPE Operation against a key holding the wrong kind of value",
        )));
        assert!(matches!(err, CacheError::Permanent(_)));
    }

    /// `REDIS_URL`이 가리키는 서버가 있어야 실행됩니다.
    #[tokio::test]
    #[ignore]
    async fn test_live_redis_extend_ttl_never_shortens() {
        let client = RedisClient::from_env().await.expect("redis must be reachable");
        let ctx = OpContext::with_timeout(Duration::from_secs(2));
        let key = format!("test:extend_ttl:{}", std::process::id());
        let members = vec!["a".to_string()];

        client.sadd(&ctx, &key, &members).await.unwrap();
        assert!(client.extend_ttl(&ctx, &key, Duration::from_secs(60)).await.unwrap());
        assert!(client.extend_ttl(&ctx, &key, Duration::from_secs(1)).await.unwrap());

        let mut conn = client.conn.clone();
        let pttl: i64 = conn.pttl(&key).await.unwrap();
        assert!(pttl > 30_000);

        assert_eq!(
            client.srem(&ctx, &key, &members).await.unwrap(),
            SetRemoval::Removed(1)
        );
        assert!(client.get(&ctx, &key).await.unwrap().is_none());
    }
}
