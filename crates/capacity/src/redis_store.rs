//! Redis-backed `CapacityStore`: one atomic Lua script per operation,
//! loaded once and invoked by SHA with automatic NOSCRIPT fallback (spec
//! §4.8 "the script is loaded once; caller uses load-sha with NOSCRIPT
//! fallback to re-load").

use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use voxgate_core::ids::{CallId, TenantId};

use crate::error::{CapacityError, Result};
use crate::store::{CapacityDecision, CapacityStore, TenantCaps};

const TRY_ACQUIRE_SCRIPT: &str = r#"
local call_id = ARGV[1]
local global_cap = tonumber(ARGV[2])
local tenant_cap = tonumber(ARGV[3])
local rpm_cap = tonumber(ARGV[4])
local ttl = tonumber(ARGV[5])

if redis.call('SISMEMBER', KEYS[1], call_id) == 1 or redis.call('SISMEMBER', KEYS[2], call_id) == 1 then
    redis.call('SADD', KEYS[1], call_id)
    redis.call('SADD', KEYS[2], call_id)
    redis.call('EXPIRE', KEYS[1], ttl)
    redis.call('EXPIRE', KEYS[2], ttl)
    return 'ok'
end

if redis.call('SCARD', KEYS[1]) >= global_cap then
    return 'global_at_capacity'
end
if redis.call('SCARD', KEYS[2]) >= tenant_cap then
    return 'tenant_at_capacity'
end
local rpm = tonumber(redis.call('GET', KEYS[3]) or '0')
if rpm >= rpm_cap then
    return 'tenant_rate_limited'
end

redis.call('SADD', KEYS[1], call_id)
redis.call('SADD', KEYS[2], call_id)
redis.call('EXPIRE', KEYS[1], ttl)
redis.call('EXPIRE', KEYS[2], ttl)
local new_rpm = redis.call('INCR', KEYS[3])
if new_rpm == 1 then
    redis.call('EXPIRE', KEYS[3], 120)
end
return 'ok'
"#;

const RELEASE_SCRIPT: &str = r#"
redis.call('SREM', KEYS[1], ARGV[1])
redis.call('SREM', KEYS[2], ARGV[1])
return 'ok'
"#;

pub struct RedisCapacityStore {
    conn: ConnectionManager,
    try_acquire: Script,
    release: Script,
    key_prefix: String,
}

impl RedisCapacityStore {
    pub async fn connect(redis_url: &str, key_prefix: impl Into<String>) -> Result<Self> {
        let client =
            redis::Client::open(redis_url).map_err(|e| CapacityError::Backend(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| CapacityError::Backend(e.to_string()))?;
        Ok(Self {
            conn,
            try_acquire: Script::new(TRY_ACQUIRE_SCRIPT),
            release: Script::new(RELEASE_SCRIPT),
            key_prefix: key_prefix.into(),
        })
    }

    fn global_active_key(&self) -> String {
        format!("{}:global:active", self.key_prefix)
    }

    fn tenant_active_key(&self, tenant_id: &TenantId) -> String {
        format!("{}:tenant:{}:active", self.key_prefix, tenant_id.as_str())
    }

    fn tenant_rpm_key(&self, tenant_id: &TenantId) -> String {
        let bucket = Utc::now().format("%Y%m%d%H%M");
        format!("{}:tenant:{}:rpm:{}", self.key_prefix, tenant_id.as_str(), bucket)
    }
}

fn parse_decision(raw: String) -> CapacityDecision {
    match raw.as_str() {
        "global_at_capacity" => CapacityDecision::GlobalAtCapacity,
        "tenant_at_capacity" => CapacityDecision::TenantAtCapacity,
        "tenant_rate_limited" => CapacityDecision::TenantRateLimited,
        _ => CapacityDecision::Ok,
    }
}

#[async_trait]
impl CapacityStore for RedisCapacityStore {
    async fn try_acquire(
        &self,
        call_id: &CallId,
        tenant_id: &TenantId,
        caps: TenantCaps,
        global_concurrency_cap: u32,
        ttl_seconds: u64,
    ) -> Result<CapacityDecision> {
        let mut conn = self.conn.clone();
        let raw: String = self
            .try_acquire
            .key(self.global_active_key())
            .key(self.tenant_active_key(tenant_id))
            .key(self.tenant_rpm_key(tenant_id))
            .arg(call_id.as_str())
            .arg(global_concurrency_cap)
            .arg(caps.effective_concurrency())
            .arg(caps.effective_rpm())
            .arg(ttl_seconds)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| CapacityError::Backend(e.to_string()))?;
        Ok(parse_decision(raw))
    }

    async fn release(&self, call_id: &CallId, tenant_id: &TenantId) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = self
            .release
            .key(self.global_active_key())
            .key(self.tenant_active_key(tenant_id))
            .arg(call_id.as_str())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| CapacityError::Backend(e.to_string()))?;
        Ok(())
    }
}
