//! In-process `CapacityStore` mirroring the Redis script's semantics
//! exactly, for unit tests and for single-process deployments that don't
//! need a shared store.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use voxgate_core::ids::{CallId, TenantId};

use crate::error::Result;
use crate::store::{CapacityDecision, CapacityStore, TenantCaps};

#[derive(Default)]
struct State {
    global_active: HashSet<String>,
    tenant_active: HashMap<String, HashSet<String>>,
    tenant_rpm: HashMap<String, u32>,
}

pub struct InProcessCapacityStore {
    state: Mutex<State>,
}

impl InProcessCapacityStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }
}

impl Default for InProcessCapacityStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CapacityStore for InProcessCapacityStore {
    async fn try_acquire(
        &self,
        call_id: &CallId,
        tenant_id: &TenantId,
        caps: TenantCaps,
        global_concurrency_cap: u32,
        _ttl_seconds: u64,
    ) -> Result<CapacityDecision> {
        let mut state = self.state.lock().expect("capacity store mutex poisoned");
        let call_id = call_id.as_str().to_string();
        let tenant_key = tenant_id.as_str().to_string();
        let tenant_set = state.tenant_active.entry(tenant_key.clone()).or_default();

        if state.global_active.contains(&call_id) || tenant_set.contains(&call_id) {
            state.global_active.insert(call_id.clone());
            state
                .tenant_active
                .entry(tenant_key)
                .or_default()
                .insert(call_id);
            return Ok(CapacityDecision::Ok);
        }

        if state.global_active.len() as u32 >= global_concurrency_cap {
            return Ok(CapacityDecision::GlobalAtCapacity);
        }
        let tenant_len = state
            .tenant_active
            .get(&tenant_key)
            .map(HashSet::len)
            .unwrap_or(0) as u32;
        if tenant_len >= caps.effective_concurrency() {
            return Ok(CapacityDecision::TenantAtCapacity);
        }
        let rpm = *state.tenant_rpm.get(&tenant_key).unwrap_or(&0);
        if rpm >= caps.effective_rpm() {
            return Ok(CapacityDecision::TenantRateLimited);
        }

        state.global_active.insert(call_id.clone());
        state
            .tenant_active
            .entry(tenant_key.clone())
            .or_default()
            .insert(call_id);
        *state.tenant_rpm.entry(tenant_key).or_insert(0) += 1;
        Ok(CapacityDecision::Ok)
    }

    async fn release(&self, call_id: &CallId, tenant_id: &TenantId) -> Result<()> {
        let mut state = self.state.lock().expect("capacity store mutex poisoned");
        state.global_active.remove(call_id.as_str());
        if let Some(set) = state.tenant_active.get_mut(tenant_id.as_str()) {
            set.remove(call_id.as_str());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(concurrency: u32, rpm: u32) -> TenantCaps {
        TenantCaps {
            concurrency_override: None,
            rpm_override: None,
            default_concurrency: concurrency,
            default_rpm: rpm,
        }
    }

    #[tokio::test]
    async fn admits_under_cap_and_rejects_over_global_cap() {
        let store = InProcessCapacityStore::new();
        let tenant = TenantId::new("t1");
        let ok = store
            .try_acquire(&CallId::new("c1"), &tenant, caps(10, 10), 1, 60)
            .await
            .unwrap();
        assert_eq!(ok, CapacityDecision::Ok);

        let rejected = store
            .try_acquire(&CallId::new("c2"), &tenant, caps(10, 10), 1, 60)
            .await
            .unwrap();
        assert_eq!(rejected, CapacityDecision::GlobalAtCapacity);
    }

    #[tokio::test]
    async fn tenant_cap_rejects_before_global_cap_is_hit() {
        let store = InProcessCapacityStore::new();
        let tenant = TenantId::new("t1");
        store
            .try_acquire(&CallId::new("c1"), &tenant, caps(1, 10), 100, 60)
            .await
            .unwrap();
        let rejected = store
            .try_acquire(&CallId::new("c2"), &tenant, caps(1, 10), 100, 60)
            .await
            .unwrap();
        assert_eq!(rejected, CapacityDecision::TenantAtCapacity);
    }

    #[tokio::test]
    async fn reacquiring_an_active_call_is_idempotent() {
        let store = InProcessCapacityStore::new();
        let tenant = TenantId::new("t1");
        let call_id = CallId::new("c1");
        store
            .try_acquire(&call_id, &tenant, caps(1, 10), 1, 60)
            .await
            .unwrap();
        let again = store
            .try_acquire(&call_id, &tenant, caps(1, 10), 1, 60)
            .await
            .unwrap();
        assert_eq!(again, CapacityDecision::Ok);
    }

    #[tokio::test]
    async fn rpm_cap_rejects_once_exhausted() {
        let store = InProcessCapacityStore::new();
        let tenant = TenantId::new("t1");
        store
            .try_acquire(&CallId::new("c1"), &tenant, caps(10, 1), 10, 60)
            .await
            .unwrap();
        store.release(&CallId::new("c1"), &tenant).await.unwrap();
        let rejected = store
            .try_acquire(&CallId::new("c2"), &tenant, caps(10, 1), 10, 60)
            .await
            .unwrap();
        assert_eq!(rejected, CapacityDecision::TenantRateLimited);
    }

    #[tokio::test]
    async fn release_frees_the_tenant_and_global_slot() {
        let store = InProcessCapacityStore::new();
        let tenant = TenantId::new("t1");
        let call_id = CallId::new("c1");
        store
            .try_acquire(&call_id, &tenant, caps(1, 10), 1, 60)
            .await
            .unwrap();
        store.release(&call_id, &tenant).await.unwrap();
        let after = store
            .try_acquire(&CallId::new("c2"), &tenant, caps(1, 10), 1, 60)
            .await
            .unwrap();
        assert_eq!(after, CapacityDecision::Ok);
    }
}
