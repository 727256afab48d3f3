//! 실행 환경 및 로깅 설정 모듈
//!
//! 환경 감지, `.env` 로딩, 로거 초기화를 담당합니다.

use std::env;
use std::str::FromStr;

/// 애플리케이션 실행 환경
#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    /// 개발 환경
    Development,
    /// 테스트 환경
    Test,
    /// 스테이징 환경
    Staging,
    /// 프로덕션 환경
    Production,
}

impl Environment {
    /// 현재 실행 환경을 감지합니다.
    ///
    /// `ENVIRONMENT` 환경 변수를 확인하며,
    /// 설정되지 않은 경우 `Production`을 기본값으로 사용합니다.
    pub fn current() -> Self {
        env::var("ENVIRONMENT")
            .map(|value| Self::parse(&value))
            .unwrap_or(Environment::Production)
    }

    /// 문자열에서 Environment를 생성합니다. 알 수 없는 값은 `Production`입니다.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Environment::Development,
            "test" | "testing" => Environment::Test,
            "staging" | "stage" => Environment::Staging,
            _ => Environment::Production,
        }
    }

    /// 환경별 기본 로그 레벨
    ///
    /// `RUST_LOG`가 설정되어 있으면 그 값이 우선합니다.
    pub fn default_log_level(&self) -> &'static str {
        match self {
            Environment::Development => "debug",
            Environment::Test => "warn",
            Environment::Staging | Environment::Production => "info",
        }
    }
}

impl FromStr for Environment {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

/// `PROFILE`에 맞는 `.env` 파일을 로드합니다.
///
/// `PROFILE=dev`이면 `.env.dev`를 먼저 시도하고, 없으면 `.env`를 사용합니다.
/// 파일이 없어도 에러가 아닙니다.
pub fn load_env_file() {
    let profile = env::var("PROFILE").unwrap_or_default();
    if !profile.is_empty() {
        let file = format!(".env.{}", profile);
        if dotenv::from_filename(&file).is_ok() {
            log::debug!("{} 파일을 로드했습니다", file);
            return;
        }
    }

    if dotenv::dotenv().is_ok() {
        log::debug!(".env 파일을 로드했습니다");
    }
}

/// 환경에 맞는 기본 레벨로 `env_logger`를 초기화합니다.
///
/// 이미 초기화된 경우 조용히 무시합니다.
pub fn init_logging() {
    let level = Environment::current().default_log_level();
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .try_init();
}
