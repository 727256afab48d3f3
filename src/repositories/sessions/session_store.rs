use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;

use crate::caching::{Cache, SetRemoval};
use crate::config::SessionConfig;
use crate::core::context::OpContext;
use crate::core::errors::{CacheError, StoreError, StoreResult};

/// `revoke_all_for_user` 성공 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevocationReport {
    pub user_id: i64,
    /// 열거 시점에 집합에 있었고 이번 호출로 폐기된 토큰 수
    pub revoked: usize,
}

/// Refresh Token 세션 저장소
///
/// 캐시 위에 두 개의 인덱스를 유지합니다.
///
/// - 정방향: `refresh_token:{token}` → 사용자 ID (TTL = 세션 수명)
/// - 역방향: `user_tokens:{user_id}` → 토큰 집합 (TTL ≥ 가장 오래 사는 토큰)
///
/// 프로세스 내부 락은 없고 캐시의 키 단위 원자성에만 의존합니다.
/// 집합 멤버는 항상 원자적 `SADD`/`SREM`으로만 변경하며, 전체를 읽어서
/// 다시 쓰는 방식은 버전 검사가 있는 CAS 경로에서만 사용합니다.
///
/// ```rust,ignore
/// let store = SessionTokenStore::new(cache, SessionConfig::from_env());
/// let ctx = OpContext::with_timeout(Duration::from_secs(1));
///
/// store.issue(&ctx, user.id, &refresh_token, Duration::from_secs(86400)).await?;
/// let user_id = store.resolve(&ctx, &refresh_token).await?;
/// store.revoke_one(&ctx, &refresh_token).await?;
/// ```
#[derive(Clone)]
pub struct SessionTokenStore {
    cache: Arc<dyn Cache>,
    config: SessionConfig,
}

impl SessionTokenStore {
    pub fn new(cache: Arc<dyn Cache>, config: SessionConfig) -> Self {
        Self { cache, config }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn token_key(&self, token: &str) -> String {
        format!("{}{}", self.config.refresh_prefix, token)
    }

    fn user_tokens_key(&self, user_id: i64) -> String {
        format!("{}{}", self.config.user_tokens_prefix, user_id)
    }

    fn validate_token(&self, token: &str) -> StoreResult<()> {
        if token.is_empty() {
            return Err(StoreError::InvalidArgument("token is empty".to_string()));
        }
        if token.len() > self.config.max_token_len {
            return Err(StoreError::InvalidArgument(format!(
                "token longer than {} bytes",
                self.config.max_token_len
            )));
        }
        if token.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(StoreError::InvalidArgument(
                "token contains whitespace or control characters".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_user_id(user_id: i64) -> StoreResult<()> {
        if user_id <= 0 {
            return Err(StoreError::InvalidArgument(format!(
                "user id must be positive, got {}",
                user_id
            )));
        }
        Ok(())
    }

    fn validate_ttl(&self, ttl: Duration) -> StoreResult<()> {
        if ttl.is_zero() {
            return Err(StoreError::InvalidArgument("ttl must be positive".to_string()));
        }
        // Redis PX/PEXPIRE는 i64 밀리초까지만 받음
        if ttl > self.config.max_ttl || ttl.as_millis() > i64::MAX as u128 {
            return Err(StoreError::InvalidArgument(format!(
                "ttl {:?} exceeds maximum {:?}",
                ttl, self.config.max_ttl
            )));
        }
        Ok(())
    }

    /// Refresh Token을 발급 기록합니다.
    ///
    /// 정방향 매핑을 `ttl`로 저장하고, 사용자 토큰 집합에 추가한 뒤
    /// 집합 TTL을 최소 `ttl`까지 늘립니다.
    ///
    /// # Errors
    ///
    /// * `InvalidArgument` - 잘못된 사용자 ID, 토큰, TTL (0 또는 `max_ttl` 초과)
    /// * `Transient` / `Permanent` - 정방향 매핑 저장 실패 (아무것도 기록되지 않음)
    /// * `Untracked` - 정방향 매핑은 저장됐지만 집합 추가 또는 TTL 연장 실패
    pub async fn issue(
        &self,
        ctx: &OpContext,
        user_id: i64,
        token: &str,
        ttl: Duration,
    ) -> StoreResult<()> {
        Self::validate_user_id(user_id)?;
        self.validate_token(token)?;
        self.validate_ttl(ttl)?;

        self.cache
            .set_ex(ctx, &self.token_key(token), &user_id.to_string(), ttl)
            .await
            .inspect_err(|e| log::warn!("Refresh token 저장 실패 - user_id: {}: {}", user_id, e))?;

        let set_key = self.user_tokens_key(user_id);
        let untracked = |source: CacheError| {
            log::error!(
                "토큰이 사용자 집합에 반영되지 않았습니다 - user_id: {}: {}",
                user_id,
                source
            );
            StoreError::Untracked {
                token: token.to_string(),
                user_id,
                source,
            }
        };

        self.cache
            .sadd(ctx, &set_key, &[token.to_string()])
            .await
            .map_err(untracked)?;

        let extended = self
            .cache
            .extend_ttl(ctx, &set_key, ttl)
            .await
            .map_err(untracked)?;
        if !extended {
            // 동시에 실행된 revoke_all_for_user가 이 토큰까지 정리한 경우
            log::debug!("user_id {}의 토큰 집합이 발급 직후 비워졌습니다", user_id);
        }

        log::debug!("Refresh token 발급 - user_id: {}, ttl: {:?}", user_id, ttl);
        Ok(())
    }

    /// 토큰의 소유자를 조회합니다.
    ///
    /// 만료와 폐기는 구분하지 않고 모두 `NotFound`입니다.
    pub async fn resolve(&self, ctx: &OpContext, token: &str) -> StoreResult<i64> {
        self.validate_token(token)?;

        let raw = self
            .cache
            .get(ctx, &self.token_key(token))
            .await
            .inspect_err(|e| log::warn!("Refresh token 조회 실패: {}", e))?;

        match raw {
            Some(value) => self.parse_owner(token, &value),
            None => {
                log::debug!("Refresh token 없음 (만료 또는 폐기)");
                Err(StoreError::NotFound)
            }
        }
    }

    fn parse_owner(&self, token: &str, value: &str) -> StoreResult<i64> {
        match value.parse::<i64>() {
            Ok(user_id) if user_id > 0 => Ok(user_id),
            _ => {
                log::error!("정방향 인덱스 값이 사용자 ID가 아닙니다: {:?}", value);
                Err(StoreError::Inconsistent {
                    user_id: None,
                    tokens: vec![token.to_string()],
                })
            }
        }
    }

    /// 토큰 하나를 폐기합니다.
    ///
    /// 이미 없는 토큰이면 아무것도 하지 않고 성공합니다. 로그아웃 재시도에 안전합니다.
    /// 같은 사용자의 다른 토큰과 집합 TTL은 건드리지 않습니다.
    pub async fn revoke_one(&self, ctx: &OpContext, token: &str) -> StoreResult<()> {
        self.validate_token(token)?;

        let token_key = self.token_key(token);
        let Some(raw) = self.cache.get(ctx, &token_key).await? else {
            log::debug!("이미 폐기되었거나 만료된 토큰입니다");
            return Ok(());
        };

        self.cache
            .del(ctx, std::slice::from_ref(&token_key))
            .await
            .inspect_err(|e| log::warn!("Refresh token 삭제 실패: {}", e))?;

        let user_id = match self.parse_owner(token, &raw) {
            Ok(user_id) => user_id,
            // 손상된 매핑은 삭제로 복구 완료. 정리할 집합을 알 수 없음
            Err(_) => return Ok(()),
        };

        self.remove_members(ctx, &self.user_tokens_key(user_id), &[token.to_string()])
            .await
            .inspect_err(|e| {
                log::warn!("user_id {}의 토큰 집합 정리 실패: {}", user_id, e)
            })?;

        log::debug!("Refresh token 폐기 - user_id: {}", user_id);
        Ok(())
    }

    /// 사용자의 모든 토큰을 폐기합니다.
    ///
    /// 열거 시점에 집합에 있던 토큰만 대상입니다. 동시에 발급된 토큰은 남을 수 있습니다.
    /// 일부 토큰 삭제가 실패해도 나머지는 계속 삭제하고, 실패한 토큰은 집합에
    /// 남겨 둔 채 `Inconsistent`로 보고합니다. 재호출하면 남은 토큰만 다시 처리됩니다.
    pub async fn revoke_all_for_user(
        &self,
        ctx: &OpContext,
        user_id: i64,
    ) -> StoreResult<RevocationReport> {
        Self::validate_user_id(user_id)?;

        let set_key = self.user_tokens_key(user_id);
        let tokens = self
            .cache
            .smembers(ctx, &set_key)
            .await
            .inspect_err(|e| log::warn!("user_id {}의 토큰 목록 조회 실패: {}", user_id, e))?;

        if tokens.is_empty() {
            log::debug!("user_id {}에게 활성 세션이 없습니다", user_id);
            return Ok(RevocationReport { user_id, revoked: 0 });
        }

        let outcomes = join_all(tokens.iter().map(|token| {
            let key = self.token_key(token);
            async move { self.cache.del(ctx, &[key]).await }
        }))
        .await;

        let mut revoked = Vec::with_capacity(tokens.len());
        let mut failed = Vec::new();
        for (token, outcome) in tokens.into_iter().zip(outcomes) {
            match outcome {
                Ok(_) => revoked.push(token),
                Err(e) => {
                    log::warn!("user_id {}의 토큰 삭제 실패: {}", user_id, e);
                    failed.push(token);
                }
            }
        }

        // 열거한 멤버만 제거하므로 동시에 추가된 토큰은 집합에 남고, 비면 키가 사라짐
        let cleanup = self.remove_members(ctx, &set_key, &revoked).await;
        if let Err(e) = &cleanup {
            log::warn!("user_id {}의 토큰 집합 정리 실패: {}", user_id, e);
        }

        if !failed.is_empty() {
            log::error!(
                "user_id {}의 토큰 {}개를 폐기하지 못했습니다 ({}개 폐기됨)",
                user_id,
                failed.len(),
                revoked.len()
            );
            return Err(StoreError::Inconsistent {
                user_id: Some(user_id),
                tokens: failed,
            });
        }
        cleanup?;

        log::info!("user_id {}의 세션 {}개를 모두 폐기했습니다", user_id, revoked.len());
        Ok(RevocationReport {
            user_id,
            revoked: revoked.len(),
        })
    }

    /// 사용자의 현재 토큰 집합을 조회합니다.
    ///
    /// 만료된 정방향 매핑이 집합 TTL이 끝날 때까지 남아 있을 수 있습니다.
    pub async fn sessions_for_user(&self, ctx: &OpContext, user_id: i64) -> StoreResult<Vec<String>> {
        Self::validate_user_id(user_id)?;
        Ok(self.cache.smembers(ctx, &self.user_tokens_key(user_id)).await?)
    }

    /// 토큰 갱신 교환
    ///
    /// `old_token`을 원자적으로 소비(`GETDEL`)하고 같은 사용자에게 `new_token`을 발급합니다.
    /// 동시에 같은 토큰으로 교환을 시도하면 하나만 성공하고 나머지는 `NotFound`입니다.
    /// 발급이 실패하면 이전 토큰은 이미 폐기된 상태이므로 다시 로그인해야 합니다.
    ///
    /// `ttl`이 `None`이면 설정의 `default_ttl`을 사용합니다.
    pub async fn rotate(
        &self,
        ctx: &OpContext,
        old_token: &str,
        new_token: &str,
        ttl: Option<Duration>,
    ) -> StoreResult<i64> {
        let ttl = ttl.unwrap_or(self.config.default_ttl);
        self.validate_token(old_token)?;
        self.validate_token(new_token)?;
        self.validate_ttl(ttl)?;
        if old_token == new_token {
            return Err(StoreError::InvalidArgument(
                "rotation must produce a different token".to_string(),
            ));
        }

        let Some(raw) = self.cache.get_del(ctx, &self.token_key(old_token)).await? else {
            log::debug!("교환할 Refresh token이 없습니다 (만료, 폐기 또는 재사용)");
            return Err(StoreError::NotFound);
        };
        let user_id = self.parse_owner(old_token, &raw)?;

        self.remove_members(ctx, &self.user_tokens_key(user_id), &[old_token.to_string()])
            .await?;
        self.issue(ctx, user_id, new_token, ttl).await?;

        log::debug!("Refresh token 교환 - user_id: {}", user_id);
        Ok(user_id)
    }

    /// 캐시 연결 상태 확인
    pub async fn health_check(&self, ctx: &OpContext) -> StoreResult<()> {
        Ok(self.cache.ping(ctx).await?)
    }

    /// 집합에서 멤버를 원자적으로 제거합니다.
    ///
    /// 백엔드에 `SREM`이 없으면 버전 검사 CAS로 대체하며,
    /// `cas_max_retries`번 경합에 지면 `Transient`로 실패합니다.
    async fn remove_members(
        &self,
        ctx: &OpContext,
        set_key: &str,
        members: &[String],
    ) -> StoreResult<()> {
        if members.is_empty() {
            return Ok(());
        }

        match self.cache.srem(ctx, set_key, members).await? {
            SetRemoval::Removed(_) => Ok(()),
            SetRemoval::Unsupported => self.remove_members_cas(ctx, set_key, members).await,
        }
    }

    async fn remove_members_cas(
        &self,
        ctx: &OpContext,
        set_key: &str,
        members: &[String],
    ) -> StoreResult<()> {
        for attempt in 0..=self.config.cas_max_retries {
            let (current, version) = self.cache.smembers_versioned(ctx, set_key).await?;
            if !current.iter().any(|m| members.contains(m)) {
                return Ok(());
            }

            let remaining: Vec<String> = current
                .into_iter()
                .filter(|m| !members.contains(m))
                .collect();
            if self
                .cache
                .replace_members_if_version(ctx, set_key, version, &remaining)
                .await?
            {
                return Ok(());
            }
            log::debug!("{} 집합 CAS 충돌 (시도 {})", set_key, attempt + 1);
        }

        log::warn!(
            "{} 집합 CAS가 {}회 재시도 후에도 실패했습니다",
            set_key,
            self.config.cas_max_retries
        );
        Err(StoreError::Transient(CacheError::Transient(format!(
            "set {} kept changing during removal",
            set_key
        ))))
    }
}
