//! 프로세스 내부 캐시
//!
//! Redis와 같은 의미론(밀리초 TTL, 빈 집합 자동 삭제, 키 단위 원자성)을
//! 하나의 뮤텍스로 흉내 내는 [`Cache`] 구현입니다. 개발 환경과 테스트에서 씁니다.
//!
//! 장애 주입을 지원합니다.
//!
//! - [`InMemoryCache::set_available`] - 모든 호출을 일시적 에러로 실패시킴
//! - [`InMemoryCache::fail_deletes_of`] - 특정 키의 `DEL`만 실패시킴
//! - [`InMemoryCache::disable_atomic_srem`] - `SREM`을 지원하지 않는 백엔드 흉내 (CAS 경로)

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::caching::{Cache, SetRemoval};
use crate::core::context::OpContext;
use crate::core::errors::CacheError;

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Set(HashSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
    version: u64,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Default)]
struct State {
    entries: HashMap<String, Entry>,
    failing_deletes: HashSet<String>,
}

impl State {
    /// 만료된 키를 지우고 살아 있는 엔트리를 돌려줍니다.
    fn live(&mut self, key: &str) -> Option<&mut Entry> {
        let now = Instant::now();
        if self.entries.get(key).is_some_and(|e| e.is_expired(now)) {
            self.entries.remove(key);
        }
        self.entries.get_mut(key)
    }
}

/// `now + ttl`. 1ms 미만은 1ms로 올리고, `Instant` 범위를 넘으면 에러
fn expiry_from_now(ttl: Duration) -> Result<Instant, CacheError> {
    Instant::now()
        .checked_add(ttl.max(Duration::from_millis(1)))
        .ok_or_else(|| CacheError::Permanent(format!("ttl {:?} out of range", ttl)))
}

fn wrong_type(key: &str) -> CacheError {
    CacheError::Permanent(format!(
        "WRONGTYPE Operation against key '{}' holding the wrong kind of value",
        key
    ))
}

/// 프로세스 내부 캐시
#[derive(Default)]
pub struct InMemoryCache {
    state: Mutex<State>,
    unavailable: AtomicBool,
    no_atomic_srem: AtomicBool,
    versions: AtomicU64,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `false`이면 이후 모든 호출이 일시적 에러로 실패합니다.
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// 지정한 키에 대한 `DEL`이 일시적 에러로 실패하게 합니다.
    pub fn fail_deletes_of(&self, key: impl Into<String>) {
        self.lock().failing_deletes.insert(key.into());
    }

    pub fn clear_faults(&self) {
        self.lock().failing_deletes.clear();
        self.set_available(true);
    }

    /// `SREM`을 `SetRemoval::Unsupported`로 응답하게 합니다.
    pub fn disable_atomic_srem(&self) {
        self.no_atomic_srem.store(true, Ordering::SeqCst);
    }

    /// 키의 남은 TTL. 키가 없거나 만료가 없으면 `None`
    pub fn ttl_of(&self, key: &str) -> Option<Duration> {
        let mut state = self.lock();
        let entry = state.live(key)?;
        entry
            .expires_at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.lock().live(key).is_some()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // 락을 쥔 채 패닉하는 코드가 없으므로 poison 상태도 그대로 사용
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn next_version(&self) -> u64 {
        self.versions.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn check(&self, ctx: &OpContext) -> Result<(), CacheError> {
        if ctx.is_cancelled() {
            return Err(CacheError::Cancelled);
        }
        if ctx.remaining().is_some_and(|r| r.is_zero()) {
            return Err(CacheError::Timeout(Duration::ZERO));
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CacheError::Transient("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn set_ex(
        &self,
        ctx: &OpContext,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        self.check(ctx)?;
        let expires_at = expiry_from_now(ttl)?;
        let version = self.next_version();
        self.lock().entries.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: Some(expires_at),
                version,
            },
        );
        Ok(())
    }

    async fn get(&self, ctx: &OpContext, key: &str) -> Result<Option<String>, CacheError> {
        self.check(ctx)?;
        let mut state = self.lock();
        match state.live(key) {
            None => Ok(None),
            Some(Entry {
                value: Value::Str(s),
                ..
            }) => Ok(Some(s.clone())),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn get_del(&self, ctx: &OpContext, key: &str) -> Result<Option<String>, CacheError> {
        self.check(ctx)?;
        let mut state = self.lock();
        let is_string = match state.live(key) {
            None => return Ok(None),
            Some(entry) => matches!(entry.value, Value::Str(_)),
        };
        if !is_string {
            return Err(wrong_type(key));
        }
        match state.entries.remove(key) {
            Some(Entry {
                value: Value::Str(s),
                ..
            }) => Ok(Some(s)),
            _ => Ok(None),
        }
    }

    async fn del(&self, ctx: &OpContext, keys: &[String]) -> Result<u64, CacheError> {
        self.check(ctx)?;
        let mut state = self.lock();
        if let Some(key) = keys.iter().find(|k| state.failing_deletes.contains(*k)) {
            return Err(CacheError::Transient(format!("DEL {} failed: connection reset", key)));
        }
        let mut removed = 0;
        for key in keys {
            if state.live(key).is_some() {
                state.entries.remove(key);
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn sadd(
        &self,
        ctx: &OpContext,
        key: &str,
        members: &[String],
    ) -> Result<u64, CacheError> {
        self.check(ctx)?;
        if members.is_empty() {
            return Ok(0);
        }
        let version = self.next_version();
        let mut state = self.lock();
        if state.live(key).is_none() {
            state.entries.insert(
                key.to_string(),
                Entry {
                    value: Value::Set(HashSet::new()),
                    expires_at: None,
                    version,
                },
            );
        }
        let entry = state.live(key).ok_or_else(|| wrong_type(key))?;
        let Value::Set(set) = &mut entry.value else {
            return Err(wrong_type(key));
        };
        let added = members.iter().filter(|m| set.insert((*m).clone())).count() as u64;
        entry.version = version;
        Ok(added)
    }

    async fn srem(
        &self,
        ctx: &OpContext,
        key: &str,
        members: &[String],
    ) -> Result<SetRemoval, CacheError> {
        self.check(ctx)?;
        if self.no_atomic_srem.load(Ordering::SeqCst) {
            return Ok(SetRemoval::Unsupported);
        }
        let version = self.next_version();
        let mut state = self.lock();
        let Some(entry) = state.live(key) else {
            return Ok(SetRemoval::Removed(0));
        };
        let Value::Set(set) = &mut entry.value else {
            return Err(wrong_type(key));
        };
        let removed = members.iter().filter(|m| set.remove(*m)).count() as u64;
        entry.version = version;
        if set.is_empty() {
            state.entries.remove(key);
        }
        Ok(SetRemoval::Removed(removed))
    }

    async fn smembers(&self, ctx: &OpContext, key: &str) -> Result<Vec<String>, CacheError> {
        self.smembers_versioned(ctx, key)
            .await
            .map(|(members, _)| members)
    }

    async fn expire(&self, ctx: &OpContext, key: &str, ttl: Duration) -> Result<bool, CacheError> {
        self.check(ctx)?;
        let expires_at = expiry_from_now(ttl)?;
        let mut state = self.lock();
        Ok(match state.live(key) {
            Some(entry) => {
                entry.expires_at = Some(expires_at);
                true
            }
            None => false,
        })
    }

    async fn extend_ttl(
        &self,
        ctx: &OpContext,
        key: &str,
        ttl: Duration,
    ) -> Result<bool, CacheError> {
        self.check(ctx)?;
        let wanted = expiry_from_now(ttl)?;
        let mut state = self.lock();
        let Some(entry) = state.live(key) else {
            return Ok(false);
        };
        match entry.expires_at {
            Some(current) if current >= wanted => {}
            _ => entry.expires_at = Some(wanted),
        }
        Ok(true)
    }

    async fn smembers_versioned(
        &self,
        ctx: &OpContext,
        key: &str,
    ) -> Result<(Vec<String>, u64), CacheError> {
        self.check(ctx)?;
        let mut state = self.lock();
        match state.live(key) {
            None => Ok((Vec::new(), 0)),
            Some(Entry {
                value: Value::Set(set),
                version,
                ..
            }) => Ok((set.iter().cloned().collect(), *version)),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn replace_members_if_version(
        &self,
        ctx: &OpContext,
        key: &str,
        version: u64,
        members: &[String],
    ) -> Result<bool, CacheError> {
        self.check(ctx)?;
        let next = self.next_version();
        let mut state = self.lock();
        let current = match state.live(key) {
            None => 0,
            Some(Entry {
                value: Value::Set(_),
                version: current,
                ..
            }) => *current,
            Some(_) => return Err(wrong_type(key)),
        };
        if current != version {
            return Ok(false);
        }
        if members.is_empty() {
            state.entries.remove(key);
            return Ok(true);
        }
        if let Some(entry) = state.live(key) {
            entry.value = Value::Set(members.iter().cloned().collect());
            entry.version = next;
        }
        Ok(true)
    }

    async fn ping(&self, ctx: &OpContext) -> Result<(), CacheError> {
        self.check(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn members(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn test_string_expires() {
        let cache = InMemoryCache::new();
        let ctx = OpContext::background();

        cache.set_ex(&ctx, "k", "v", Duration::from_millis(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(cache.get(&ctx, "k").await.unwrap(), None);
        assert!(!cache.contains_key("k"));
    }

    #[tokio::test]
    async fn test_srem_deletes_empty_set_and_keeps_others() {
        let cache = InMemoryCache::new();
        let ctx = OpContext::background();

        cache.sadd(&ctx, "s", &members(&["a", "b"])).await.unwrap();
        cache.extend_ttl(&ctx, "s", Duration::from_secs(60)).await.unwrap();

        assert_eq!(
            cache.srem(&ctx, "s", &members(&["a"])).await.unwrap(),
            SetRemoval::Removed(1)
        );
        assert_eq!(cache.smembers(&ctx, "s").await.unwrap(), members(&["b"]));
        assert!(cache.ttl_of("s").unwrap() > Duration::from_secs(50));

        cache.srem(&ctx, "s", &members(&["b"])).await.unwrap();
        assert!(!cache.contains_key("s"));
    }

    #[tokio::test]
    async fn test_extend_ttl_never_shortens() {
        let cache = InMemoryCache::new();
        let ctx = OpContext::background();

        assert!(!cache.extend_ttl(&ctx, "missing", Duration::from_secs(1)).await.unwrap());

        cache.sadd(&ctx, "s", &members(&["a"])).await.unwrap();
        assert_eq!(cache.ttl_of("s"), None);
        cache.extend_ttl(&ctx, "s", Duration::from_secs(3600)).await.unwrap();
        cache.extend_ttl(&ctx, "s", Duration::from_secs(1)).await.unwrap();

        assert!(cache.ttl_of("s").unwrap() > Duration::from_secs(3500));
    }

    #[tokio::test]
    async fn test_replace_rejects_stale_version() {
        let cache = InMemoryCache::new();
        let ctx = OpContext::background();

        cache.sadd(&ctx, "s", &members(&["a"])).await.unwrap();
        let (_, version) = cache.smembers_versioned(&ctx, "s").await.unwrap();
        cache.sadd(&ctx, "s", &members(&["b"])).await.unwrap();

        assert!(!cache
            .replace_members_if_version(&ctx, "s", version, &[])
            .await
            .unwrap());
        assert_eq!(cache.smembers(&ctx, "s").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let cache = InMemoryCache::new();
        let ctx = OpContext::background();

        cache.set_ex(&ctx, "k", "v", Duration::from_secs(1)).await.unwrap();
        cache.fail_deletes_of("k");
        assert!(cache.del(&ctx, &members(&["k"])).await.unwrap_err().is_transient());

        cache.set_available(false);
        assert!(cache.get(&ctx, "k").await.unwrap_err().is_transient());

        cache.clear_faults();
        assert_eq!(cache.del(&ctx, &members(&["k"])).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_get_del_returns_value_once() {
        let cache = InMemoryCache::new();
        let ctx = OpContext::background();

        cache.set_ex(&ctx, "k", "v", Duration::from_secs(1)).await.unwrap();
        assert_eq!(cache.get_del(&ctx, "k").await.unwrap(), Some("v".to_string()));
        assert_eq!(cache.get_del(&ctx, "k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expire_replaces_ttl() {
        let cache = InMemoryCache::new();
        let ctx = OpContext::background();

        assert!(!cache.expire(&ctx, "missing", Duration::from_secs(1)).await.unwrap());

        cache.set_ex(&ctx, "k", "v", Duration::from_secs(3600)).await.unwrap();
        assert!(cache.expire(&ctx, "k", Duration::from_secs(10)).await.unwrap());
        assert!(cache.ttl_of("k").unwrap() <= Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_out_of_range_ttl_is_rejected_without_panic() {
        let cache = InMemoryCache::new();
        let ctx = OpContext::background();

        assert!(matches!(
            cache.set_ex(&ctx, "k", "v", Duration::MAX).await,
            Err(CacheError::Permanent(_))
        ));
        assert!(!cache.contains_key("k"));

        cache.sadd(&ctx, "s", &members(&["a"])).await.unwrap();
        assert!(cache.extend_ttl(&ctx, "s", Duration::MAX).await.is_err());
        assert!(cache.expire(&ctx, "s", Duration::MAX).await.is_err());
        assert_eq!(cache.ttl_of("s"), None);
    }

    #[tokio::test]
    async fn test_wrong_type_is_permanent() {
        let cache = InMemoryCache::new();
        let ctx = OpContext::background();

        cache.sadd(&ctx, "s", &members(&["a"])).await.unwrap();
        assert!(matches!(
            cache.get(&ctx, "s").await,
            Err(CacheError::Permanent(_))
        ));
    }
}
