//! The `CapacityStore` contract (spec §4.8): `tryAcquire`/`release`
//! implemented atomically by whichever backend is wired in.

use async_trait::async_trait;
use voxgate_core::ids::{CallId, TenantId};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantCaps {
    /// Tenant-level override; 0/negative-equivalent means "use the default".
    pub concurrency_override: Option<u32>,
    pub rpm_override: Option<u32>,
    pub default_concurrency: u32,
    pub default_rpm: u32,
}

impl TenantCaps {
    pub fn effective_concurrency(&self) -> u32 {
        self.concurrency_override
            .filter(|&v| v > 0)
            .unwrap_or(self.default_concurrency)
    }

    pub fn effective_rpm(&self) -> u32 {
        self.rpm_override.filter(|&v| v > 0).unwrap_or(self.default_rpm)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityDecision {
    Ok,
    GlobalAtCapacity,
    TenantAtCapacity,
    TenantRateLimited,
}

impl CapacityDecision {
    /// Label for the `capacity_decisions_total{result}` counter (spec §4.9).
    pub fn label(&self) -> &'static str {
        match self {
            CapacityDecision::Ok => "ok",
            CapacityDecision::GlobalAtCapacity => "global_at_capacity",
            CapacityDecision::TenantAtCapacity => "tenant_at_capacity",
            CapacityDecision::TenantRateLimited => "tenant_rate_limited",
        }
    }
}

#[async_trait]
pub trait CapacityStore: Send + Sync {
    /// Atomically admit `call_id` under `tenant_id`'s caps and the
    /// process-wide `global_concurrency_cap`, or report which limit
    /// rejected it. Idempotent: re-acquiring an already-active call id
    /// refreshes its TTL and returns `Ok`.
    async fn try_acquire(
        &self,
        call_id: &CallId,
        tenant_id: &TenantId,
        caps: TenantCaps,
        global_concurrency_cap: u32,
        ttl_seconds: u64,
    ) -> Result<CapacityDecision>;

    /// Remove `call_id` from both the global and tenant active sets. The
    /// rpm counter is never decremented; it is a per-minute rate gate, not
    /// an occupancy count.
    async fn release(&self, call_id: &CallId, tenant_id: &TenantId) -> Result<()>;
}
