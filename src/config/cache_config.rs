//! 캐시 연결 및 세션 저장소 설정 모듈
//!
//! Redis 연결 정보와 세션 저장소의 키 규칙, 한계값을 환경 변수에서 읽습니다.

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Redis 연결 기본값
pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";
pub const DEFAULT_DIAL_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 3_000;

/// 세션 저장소 기본값
pub const DEFAULT_REFRESH_PREFIX: &str = "refresh_token:";
pub const DEFAULT_USER_TOKENS_PREFIX: &str = "user_tokens:";
pub const DEFAULT_MAX_TOKEN_LEN: usize = 512;
pub const DEFAULT_CAS_MAX_RETRIES: u32 = 8;
pub const DEFAULT_SESSION_TTL_SECS: u64 = 14 * 24 * 60 * 60;
pub const DEFAULT_MAX_SESSION_TTL_SECS: u64 = 365 * 24 * 60 * 60;

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                log::warn!("{} 값이 올바르지 않습니다 ({}). 기본값을 사용합니다.", key, raw);
                default
            }
        },
        Err(_) => default,
    }
}

/// Redis 연결 설정
///
/// # Environment Variables
///
/// - `REDIS_URL`: 기본값 `redis://localhost:6379`
/// - `REDIS_DIAL_TIMEOUT_MS`: 최초 연결 및 PING 기한, 기본값 5000
/// - `REDIS_OPERATION_TIMEOUT_MS`: 명령 응답 기한, 기본값 3000
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    #[serde(with = "millis")]
    pub dial_timeout: Duration,
    #[serde(with = "millis")]
    pub operation_timeout: Duration,
}

impl RedisConfig {
    pub fn from_env() -> Self {
        Self {
            url: env::var("REDIS_URL").unwrap_or_else(|_| DEFAULT_REDIS_URL.to_string()),
            dial_timeout: Duration::from_millis(env_or(
                "REDIS_DIAL_TIMEOUT_MS",
                DEFAULT_DIAL_TIMEOUT_MS,
            )),
            operation_timeout: Duration::from_millis(env_or(
                "REDIS_OPERATION_TIMEOUT_MS",
                DEFAULT_OPERATION_TIMEOUT_MS,
            )),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REDIS_URL.to_string(),
            dial_timeout: Duration::from_millis(DEFAULT_DIAL_TIMEOUT_MS),
            operation_timeout: Duration::from_millis(DEFAULT_OPERATION_TIMEOUT_MS),
        }
    }
}

/// 세션 토큰 저장소 설정
///
/// # Environment Variables
///
/// - `SESSION_REFRESH_PREFIX`: 토큰 → 사용자 키 접두사, 기본값 `refresh_token:`
/// - `SESSION_USER_TOKENS_PREFIX`: 사용자 → 토큰 집합 키 접두사, 기본값 `user_tokens:`
/// - `SESSION_MAX_TOKEN_LEN`: 허용하는 토큰 최대 길이, 기본값 512
/// - `SESSION_CAS_MAX_RETRIES`: 집합 CAS 재시도 횟수, 기본값 8
/// - `SESSION_DEFAULT_TTL_SECS`: `rotate`에 TTL을 넘기지 않을 때 쓰는 세션 수명, 기본값 14일
/// - `SESSION_MAX_TTL_SECS`: 허용하는 최대 세션 수명, 기본값 365일
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub refresh_prefix: String,
    pub user_tokens_prefix: String,
    pub max_token_len: usize,
    pub cas_max_retries: u32,
    #[serde(with = "secs")]
    pub default_ttl: Duration,
    #[serde(with = "secs")]
    pub max_ttl: Duration,
}

impl SessionConfig {
    pub fn from_env() -> Self {
        Self {
            refresh_prefix: env::var("SESSION_REFRESH_PREFIX")
                .unwrap_or_else(|_| DEFAULT_REFRESH_PREFIX.to_string()),
            user_tokens_prefix: env::var("SESSION_USER_TOKENS_PREFIX")
                .unwrap_or_else(|_| DEFAULT_USER_TOKENS_PREFIX.to_string()),
            max_token_len: env_or("SESSION_MAX_TOKEN_LEN", DEFAULT_MAX_TOKEN_LEN),
            cas_max_retries: env_or("SESSION_CAS_MAX_RETRIES", DEFAULT_CAS_MAX_RETRIES),
            default_ttl: Duration::from_secs(env_or(
                "SESSION_DEFAULT_TTL_SECS",
                DEFAULT_SESSION_TTL_SECS,
            )),
            max_ttl: Duration::from_secs(env_or(
                "SESSION_MAX_TTL_SECS",
                DEFAULT_MAX_SESSION_TTL_SECS,
            )),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_prefix: DEFAULT_REFRESH_PREFIX.to_string(),
            user_tokens_prefix: DEFAULT_USER_TOKENS_PREFIX.to_string(),
            max_token_len: DEFAULT_MAX_TOKEN_LEN,
            cas_max_retries: DEFAULT_CAS_MAX_RETRIES,
            default_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            max_ttl: Duration::from_secs(DEFAULT_MAX_SESSION_TTL_SECS),
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_config_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.refresh_prefix, "refresh_token:");
        assert_eq!(config.user_tokens_prefix, "user_tokens:");
        assert_eq!(config.max_token_len, 512);
        assert_eq!(config.default_ttl, Duration::from_secs(1_209_600));
        assert_eq!(config.max_ttl, Duration::from_secs(31_536_000));
    }

    #[test]
    fn test_session_config_from_partial_json() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"cas_max_retries": 3, "default_ttl": 3600}"#).unwrap();

        assert_eq!(config.cas_max_retries, 3);
        assert_eq!(config.default_ttl, Duration::from_secs(3600));
        assert_eq!(config.refresh_prefix, DEFAULT_REFRESH_PREFIX);
    }

    #[test]
    fn test_redis_config_json_uses_millis() {
        let config = RedisConfig::default();
        let json = serde_json::to_value(&config).unwrap();

        assert_eq!(json["dial_timeout"], 5000);
        assert_eq!(json["operation_timeout"], 3000);
    }

    #[test]
    fn test_redis_config_defaults() {
        if env::var("REDIS_URL").is_err() {
            assert_eq!(RedisConfig::from_env().url, DEFAULT_REDIS_URL);
        }
    }
}
