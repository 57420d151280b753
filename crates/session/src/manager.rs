//! Session Manager (spec §4.7): createSession idempotent by call id,
//! per-call FIFO work queues, webhook dispatch, teardown with capacity
//! release, and the idle sweeper.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;
use tokio::sync::{mpsc, Notify};
use voxgate_capacity::CapacityStore;
use voxgate_core::ids::{CallId, TenantId};
use voxgate_core::time::Clock;

use crate::error::{Result, SessionError};

pub type Task = Box<dyn (FnOnce() -> BoxFuture<'static, ()>) + Send>;

struct QueuedTask {
    task: Task,
    requires_active: bool,
}

struct SessionEntry {
    active: Arc<AtomicBool>,
    last_activity_ms: Arc<AtomicU64>,
    queue_tx: mpsc::UnboundedSender<QueuedTask>,
    stop: Arc<Notify>,
}

/// Registry of live sessions: each `createSession` spawns a single task that
/// drains that call's FIFO queue in order, one item at a time (spec §5
/// "single playback-chain / one-task-per-dialog" precedent generalized to
/// the work queue).
pub struct SessionManager {
    sessions: DashMap<CallId, SessionEntry>,
    /// Call id -> tenant id, kept independent of `sessions` so a capacity
    /// release can still be attempted even if the live session bookkeeping
    /// is already gone by the time `teardown` runs (spec.md:157 "safe under
    /// missing session"). Populated in `create_session`, consumed (removed)
    /// in `teardown`.
    call_tenants: DashMap<CallId, TenantId>,
    capacity: Arc<dyn CapacityStore>,
    clock: Clock,
    idle_ttl_ms: u64,
}

impl SessionManager {
    pub fn new(capacity: Arc<dyn CapacityStore>, clock: Clock, idle_ttl_ms: u64) -> Self {
        Self {
            sessions: DashMap::new(),
            call_tenants: DashMap::new(),
            capacity,
            clock,
            idle_ttl_ms,
        }
    }

    /// Idempotent by call id: a second `create_session` for an already
    /// registered call id is a no-op.
    pub fn create_session(&self, call_id: CallId, tenant_id: TenantId) {
        if self.sessions.contains_key(&call_id) {
            return;
        }
        self.call_tenants.insert(call_id.clone(), tenant_id.clone());
        let (tx, mut rx) = mpsc::unbounded_channel::<QueuedTask>();
        let active = Arc::new(AtomicBool::new(true));
        let stop = Arc::new(Notify::new());

        let active_for_task = active.clone();
        let stop_for_task = stop.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = stop_for_task.notified() => break,
                    item = rx.recv() => {
                        match item {
                            None => break,
                            Some(item) => {
                                if item.requires_active && !active_for_task.load(Ordering::SeqCst) {
                                    tracing::debug!("skipping queued task: session inactive");
                                    continue;
                                }
                                (item.task)().await;
                            }
                        }
                    }
                }
            }
        });

        self.sessions.insert(
            call_id,
            SessionEntry {
                active,
                last_activity_ms: Arc::new(AtomicU64::new(self.clock.now_ms())),
                queue_tx: tx,
                stop,
            },
        );
    }

    /// Enqueue one async work item for `call_id`'s FIFO. If the session is
    /// missing, the task is dropped with a log line (mirrors
    /// `requires_active` skip semantics).
    pub fn enqueue(&self, call_id: &CallId, task: Task, requires_active: bool) {
        match self.sessions.get(call_id) {
            Some(entry) => {
                entry.last_activity_ms.store(self.clock.now_ms(), Ordering::SeqCst);
                if entry.queue_tx.send(QueuedTask { task, requires_active }).is_err() {
                    tracing::debug!(call_id = %call_id, "enqueue failed: session task gone");
                }
            }
            None => {
                tracing::debug!(call_id = %call_id, "enqueue skipped: no such session");
            }
        }
    }

    pub fn note_activity(&self, call_id: &CallId) {
        if let Some(entry) = self.sessions.get(call_id) {
            entry.last_activity_ms.store(self.clock.now_ms(), Ordering::SeqCst);
        }
    }

    pub fn is_active(&self, call_id: &CallId) -> bool {
        self.sessions
            .get(call_id)
            .map(|e| e.active.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Marks inactive, clears the queue, releases capacity, and removes the
    /// session. Safe to call on a call id with no live session entry: the
    /// tenant id is looked up from `call_tenants`, which outlives the live
    /// `sessions` entry, so the capacity release still happens as long as
    /// `create_session` was ever called for this call id.
    pub async fn teardown(&self, call_id: &CallId, reason: &str) -> Result<()> {
        tracing::info!(call_id = %call_id, reason, "tearing down session");
        if let Some((_, entry)) = self.sessions.remove(call_id) {
            entry.active.store(false, Ordering::SeqCst);
            entry.stop.notify_one();
        }

        if let Some((_, tenant_id)) = self.call_tenants.remove(call_id) {
            self.capacity
                .release(call_id, &tenant_id)
                .await
                .map_err(|e| SessionError::Capacity(e.to_string()))?;
        }
        Ok(())
    }

    /// Periodic idle scan: sessions with no activity for `idle_ttl_ms` are
    /// torn down with reason `idle_timeout`. Returns the call ids torn down
    /// so the caller can also stop the underlying transport.
    pub async fn sweep_idle(&self) -> Vec<CallId> {
        let now = self.clock.now_ms();
        let expired: Vec<CallId> = self
            .sessions
            .iter()
            .filter(|entry| now.saturating_sub(entry.last_activity_ms.load(Ordering::SeqCst)) >= self.idle_ttl_ms)
            .map(|entry| entry.key().clone())
            .collect();

        for call_id in &expired {
            let _ = self.teardown(call_id, "idle_timeout").await;
        }
        expired
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use voxgate_capacity::in_process::InProcessCapacityStore;

    fn manager() -> SessionManager {
        SessionManager::new(Arc::new(InProcessCapacityStore::new()), Clock::mock(), 600_000)
    }

    #[tokio::test]
    async fn create_session_is_idempotent_by_call_id() {
        let manager = manager();
        let call_id = CallId::new("c1");
        manager.create_session(call_id.clone(), TenantId::new("t1"));
        manager.create_session(call_id.clone(), TenantId::new("t1"));
        assert_eq!(manager.session_count(), 1);
    }

    #[tokio::test]
    async fn enqueue_runs_tasks_in_order() {
        let manager = manager();
        let call_id = CallId::new("c1");
        manager.create_session(call_id.clone(), TenantId::new("t1"));

        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        for i in 0..3 {
            let order = order.clone();
            manager.enqueue(
                &call_id,
                Box::new(move || {
                    Box::pin(async move {
                        order.lock().unwrap().push(i);
                    })
                }),
                true,
            );
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn enqueue_skips_requires_active_tasks_after_teardown() {
        let manager = manager();
        let call_id = CallId::new("c1");
        manager.create_session(call_id.clone(), TenantId::new("t1"));
        manager.teardown(&call_id, "test").await.unwrap();

        let ran = Arc::new(AtomicUsize::new(0));
        let ran_for_task = ran.clone();
        manager.enqueue(
            &call_id,
            Box::new(move || Box::pin(async move { ran_for_task.fetch_add(1, Ordering::SeqCst); })),
            true,
        );
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn teardown_is_safe_on_missing_session() {
        let manager = manager();
        manager.teardown(&CallId::new("ghost"), "no_such_session").await.unwrap();
    }

    #[tokio::test]
    async fn teardown_still_releases_capacity_when_the_live_session_entry_is_already_gone() {
        use voxgate_capacity::{CapacityDecision, TenantCaps};

        let capacity = Arc::new(InProcessCapacityStore::new());
        let manager = SessionManager::new(capacity.clone(), Clock::mock(), 600_000);
        let call_id = CallId::new("c1");
        let tenant_id = TenantId::new("t1");
        let caps = TenantCaps {
            concurrency_override: None,
            rpm_override: None,
            default_concurrency: 1,
            default_rpm: 10,
        };
        capacity.try_acquire(&call_id, &tenant_id, caps, 1, 60).await.unwrap();
        manager.create_session(call_id.clone(), tenant_id.clone());

        // Simulate the live session bookkeeping having already been removed
        // by some other path, independent of `teardown`.
        manager.sessions.remove(&call_id);
        assert_eq!(manager.session_count(), 0);

        manager.teardown(&call_id, "test").await.unwrap();

        let reacquired = capacity
            .try_acquire(&CallId::new("c2"), &tenant_id, caps, 1, 60)
            .await
            .unwrap();
        assert_eq!(reacquired, CapacityDecision::Ok);
    }

    #[tokio::test]
    async fn idle_sweep_tears_down_expired_sessions() {
        let clock = Clock::mock();
        let manager = SessionManager::new(Arc::new(InProcessCapacityStore::new()), clock.clone(), 1_000);
        manager.create_session(CallId::new("c1"), TenantId::new("t1"));
        clock.advance(std::time::Duration::from_millis(2_000));
        let swept = manager.sweep_idle().await;
        assert_eq!(swept, vec![CallId::new("c1")]);
        assert_eq!(manager.session_count(), 0);
    }
}
