//! Maps `(user, session)` keys to live connection managers.
//!
//! Each key owns a slot guarded by its own async lock. The lock is held for
//! the test-or-create decision only; queries run on the returned manager
//! after it has been released, so one slow target never blocks another key.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use vecbench_domain::{DatabaseInfo, SessionKey};

use crate::connection_error::{ConnectionErrorInfo, ConnectionErrorKind};
use crate::error::WorkbenchError;
use crate::ports::{ConnectionFactory, SessionStore, TargetConnection};

type Manager = Arc<dyn TargetConnection>;

#[derive(Default)]
struct Slot {
    manager: AsyncMutex<Option<Manager>>,
}

/// True when both handles point at the same manager instance.
pub fn same_manager(a: &Manager, b: &Manager) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a).cast::<()>(),
        Arc::as_ptr(b).cast::<()>(),
    )
}

pub struct SessionRegistry {
    store: Arc<dyn SessionStore>,
    factory: Arc<dyn ConnectionFactory>,
    // A slot is removed only while the map holds its sole reference and it
    // is empty, so two callers can never hold different slots for one key.
    slots: Mutex<HashMap<SessionKey, Arc<Slot>>>,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn SessionStore>, factory: Arc<dyn ConnectionFactory>) -> Self {
        Self {
            store,
            factory,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    fn slot(&self, key: &SessionKey) -> Arc<Slot> {
        let mut slots = self
            .slots
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Arc::clone(slots.entry(key.clone()).or_default())
    }

    fn existing_slot(&self, key: &SessionKey) -> Option<Arc<Slot>> {
        let slots = self
            .slots
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        slots.get(key).cloned()
    }

    /// Drops the slot for `key` if nobody else holds it and it has no manager.
    /// Callers release their own handle first.
    fn prune(&self, key: &SessionKey) {
        let mut slots = self
            .slots
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let unused = slots.get(key).is_some_and(|slot| {
            Arc::strong_count(slot) == 1
                && slot
                    .manager
                    .try_lock()
                    .is_ok_and(|current| current.is_none())
        });
        if unused {
            slots.remove(key);
            debug!(session = %key, "Released empty session slot");
        }
    }

    #[cfg(test)]
    fn slot_count(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    fn existing_slots(&self) -> Vec<(SessionKey, Arc<Slot>)> {
        let slots = self
            .slots
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        slots
            .iter()
            .map(|(k, s)| (k.clone(), Arc::clone(s)))
            .collect()
    }

    /// Returns a verified live manager for `key`, building one from the
    /// stored DSN if needed. Concurrent callers for one key share a single
    /// connect.
    pub async fn get_or_create(&self, key: &SessionKey) -> Result<Manager, WorkbenchError> {
        self.connect(key).await.map(|(manager, _)| manager)
    }

    /// Like [`Self::get_or_create`], also returning what the verifying probe
    /// reported about the target.
    pub async fn connect(
        &self,
        key: &SessionKey,
    ) -> Result<(Manager, DatabaseInfo), WorkbenchError> {
        let slot = self.slot(key);
        let result = self.connect_in(key, &slot).await;
        drop(slot);
        if result.is_err() {
            self.prune(key);
        }
        result
    }

    async fn connect_in(
        &self,
        key: &SessionKey,
        slot: &Slot,
    ) -> Result<(Manager, DatabaseInfo), WorkbenchError> {
        let mut current = slot.manager.lock().await;

        if let Some(existing) = current.as_ref() {
            if existing.is_connected() {
                if let Some(info) = existing.test_connection().await.database_info() {
                    debug!(session = %key, "Reusing live connection");
                    return Ok((Arc::clone(existing), info.clone()));
                }
            }
            warn!(session = %key, "Discarding stale connection");
            existing.disconnect().await;
            *current = None;
        }

        let record = self
            .store
            .find(key)?
            .ok_or_else(|| WorkbenchError::SessionNotFound(key.clone()))?;

        let manager = self.factory.create();
        if let Err(err) = manager.connect(&record.dsn).await {
            manager.disconnect().await;
            warn!(session = %key, kind = ?err.kind, error = %err, "Connect failed");
            return Err(err.into());
        }

        let info = match manager.test_connection().await.database_info() {
            Some(info) => info.clone(),
            None => {
                manager.disconnect().await;
                warn!(session = %key, "Connection test failed after connect");
                return Err(ConnectionErrorInfo::with_kind(
                    ConnectionErrorKind::Unknown,
                    "connection test failed after connect",
                )
                .into());
            }
        };

        *current = Some(Arc::clone(&manager));
        drop(current);

        info!(
            session = %key,
            database = %info.database_name,
            vector = info.vector_extension.as_deref().unwrap_or("absent"),
            "Session connected"
        );
        self.record_use(key, &info);
        Ok((manager, info))
    }

    /// The live manager for `key`, without creating or re-validating one.
    pub async fn get(&self, key: &SessionKey) -> Option<Manager> {
        let slot = self.existing_slot(key)?;
        let current = slot.manager.lock().await;
        current.as_ref().filter(|m| m.is_connected()).cloned()
    }

    /// Removes and disconnects whatever is live for `key`.
    pub async fn evict(&self, key: &SessionKey) -> bool {
        let Some(slot) = self.existing_slot(key) else {
            return false;
        };
        let taken = slot.manager.lock().await.take();
        drop(slot);
        self.prune(key);
        match taken {
            Some(manager) => {
                manager.disconnect().await;
                info!(session = %key, "Session evicted");
                true
            }
            None => false,
        }
    }

    /// Evicts `key` only if it still maps to `expected`. A manager rebuilt
    /// since `expected` was observed is left alone.
    pub async fn evict_if_current(&self, key: &SessionKey, expected: &Manager) -> bool {
        let Some(slot) = self.existing_slot(key) else {
            return false;
        };
        let taken = {
            let mut current = slot.manager.lock().await;
            let matches = current
                .as_ref()
                .is_some_and(|live| same_manager(live, expected));
            if matches {
                current.take()
            } else {
                None
            }
        };
        drop(slot);
        let Some(manager) = taken else {
            return false;
        };
        manager.disconnect().await;
        self.prune(key);
        true
    }

    /// Snapshot of published managers. Slots busy with a connect are skipped.
    pub fn list_live(&self) -> Vec<(SessionKey, Manager)> {
        self.existing_slots()
            .into_iter()
            .filter_map(|(key, slot)| {
                let current = slot.manager.try_lock().ok()?;
                current.as_ref().map(|m| (key, Arc::clone(m)))
            })
            .collect()
    }

    fn record_use(&self, key: &SessionKey, info: &DatabaseInfo) {
        if let Err(err) = self.store.touch(key, info) {
            warn!(session = %key, error = %err, "Failed to record session use");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use crate::error::ErrorKind;
    use crate::testing::{FakeFactory, InMemorySessionStore};

    struct Fixture {
        store: Arc<InMemorySessionStore>,
        factory: Arc<FakeFactory>,
        registry: Arc<SessionRegistry>,
        key: SessionKey,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemorySessionStore::new());
        let factory = Arc::new(FakeFactory::new());
        let key = store.seed("alice", "docs", "postgres://alice:pw@localhost/docs");
        let registry = Arc::new(SessionRegistry::new(store.clone(), factory.clone()));
        Fixture {
            store,
            factory,
            registry,
            key,
        }
    }

    mod get_or_create {
        use super::*;

        #[tokio::test]
        async fn connects_and_publishes() {
            let fx = fixture();

            let manager = fx.registry.get_or_create(&fx.key).await.unwrap();

            assert!(manager.is_connected());
            assert_eq!(fx.factory.behavior.connects(), 1);
            assert_eq!(fx.registry.list_live().len(), 1);
        }

        #[tokio::test]
        async fn second_call_reuses_after_fresh_test() {
            let fx = fixture();
            let first = fx.registry.get_or_create(&fx.key).await.unwrap();
            let tests_before = fx.factory.behavior.test_calls.load(Ordering::SeqCst);

            let second = fx.registry.get_or_create(&fx.key).await.unwrap();

            assert!(same_manager(&first, &second));
            assert_eq!(fx.factory.behavior.connects(), 1);
            assert_eq!(
                fx.factory.behavior.test_calls.load(Ordering::SeqCst),
                tests_before + 1
            );
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
        async fn concurrent_callers_share_one_connect() {
            let fx = fixture();
            fx.factory
                .behavior
                .connect_delay_ms
                .store(50, Ordering::SeqCst);

            let handles: Vec<_> = (0..16)
                .map(|_| {
                    let registry = Arc::clone(&fx.registry);
                    let key = fx.key.clone();
                    tokio::spawn(async move { registry.get_or_create(&key).await })
                })
                .collect();

            let managers: Vec<Manager> = futures::future::join_all(handles)
                .await
                .into_iter()
                .map(|joined| joined.unwrap().unwrap())
                .collect();

            assert_eq!(fx.factory.behavior.connects(), 1);
            assert_eq!(fx.factory.created.load(Ordering::SeqCst), 1);
            assert!(managers.iter().all(|m| m.is_connected()));
            assert!(managers.iter().all(|m| same_manager(m, &managers[0])));
        }

        #[tokio::test]
        async fn unhealthy_entry_is_replaced() {
            let fx = fixture();
            let first = fx.registry.get_or_create(&fx.key).await.unwrap();

            first.disconnect().await;
            let second = fx.registry.get_or_create(&fx.key).await.unwrap();

            assert!(!same_manager(&first, &second));
            assert_eq!(fx.factory.behavior.connects(), 2);
            assert!(second.is_connected());
        }

        #[tokio::test]
        async fn unknown_session_is_not_found() {
            let fx = fixture();
            let missing = SessionKey::parse("alice", "nope");

            let err = fx.registry.get_or_create(&missing).await.err().unwrap();

            assert_eq!(err.kind(), ErrorKind::SessionNotFound);
            assert_eq!(fx.factory.created.load(Ordering::SeqCst), 0);
        }

        #[tokio::test]
        async fn other_users_session_is_not_found() {
            let fx = fixture();
            let stolen = SessionKey::new(
                vecbench_domain::UserId::from_string("mallory"),
                fx.key.session_id.clone(),
            );

            let err = fx.registry.get_or_create(&stolen).await.err().unwrap();

            assert_eq!(err.kind(), ErrorKind::SessionNotFound);
        }

        #[tokio::test]
        async fn connect_failure_leaves_nothing_behind() {
            let fx = fixture();
            fx.factory
                .behavior
                .fail_connect
                .store(true, Ordering::SeqCst);

            let err = fx.registry.get_or_create(&fx.key).await.err().unwrap();

            assert!(matches!(err, WorkbenchError::ConnectFailed(_)));
            assert!(!err.to_string().contains(":pw@"));
            assert!(fx.registry.list_live().is_empty());
            assert_eq!(
                fx.factory.behavior.disconnect_calls.load(Ordering::SeqCst),
                1
            );
        }

        #[tokio::test]
        async fn failed_test_after_connect_is_disposed() {
            let fx = fixture();
            fx.factory.behavior.unhealthy.store(true, Ordering::SeqCst);

            let err = fx.registry.get_or_create(&fx.key).await.err().unwrap();

            assert_eq!(err.kind(), ErrorKind::ConnectionUnavailable);
            assert!(fx.registry.list_live().is_empty());
            assert!(fx.registry.get(&fx.key).await.is_none());
        }

        #[tokio::test]
        async fn successful_connect_touches_store() {
            let fx = fixture();

            fx.registry.get_or_create(&fx.key).await.unwrap();

            let record = fx.store.find(&fx.key).unwrap().unwrap();
            assert_eq!(record.last_db_name.as_deref(), Some("docs"));
            assert_eq!(fx.store.touches.load(Ordering::SeqCst), 1);
        }

        #[tokio::test]
        async fn store_touch_failure_is_ignored() {
            let fx = fixture();
            fx.store.fail_touch.store(true, Ordering::SeqCst);

            let manager = fx.registry.get_or_create(&fx.key).await;

            assert!(manager.is_ok());
        }

        #[tokio::test(start_paused = true)]
        async fn slow_connect_on_one_key_does_not_block_another() {
            let fx = fixture();
            let other = fx.store.seed("bob", "notes", "postgres://bob@localhost/notes");
            fx.factory
                .behavior
                .connect_delay_ms
                .store(10_000, Ordering::SeqCst);

            let slow = {
                let registry = Arc::clone(&fx.registry);
                let key = fx.key.clone();
                tokio::spawn(async move { registry.get_or_create(&key).await })
            };
            tokio::task::yield_now().await;

            // The slow key's slot is busy, but bob's is independent.
            fx.factory.behavior.connect_delay_ms.store(0, Ordering::SeqCst);
            let started = tokio::time::Instant::now();
            fx.registry.get_or_create(&other).await.unwrap();
            assert!(started.elapsed() < Duration::from_secs(1));

            slow.await.unwrap().unwrap();
        }
    }

    mod eviction {
        use super::*;

        #[tokio::test]
        async fn evict_disconnects_and_removes() {
            let fx = fixture();
            let manager = fx.registry.get_or_create(&fx.key).await.unwrap();

            assert!(fx.registry.evict(&fx.key).await);

            assert!(!manager.is_connected());
            assert!(fx.registry.list_live().is_empty());
            assert!(!fx.registry.evict(&fx.key).await);
        }

        #[tokio::test]
        async fn evict_if_current_ignores_replaced_manager() {
            let fx = fixture();
            let old = fx.registry.get_or_create(&fx.key).await.unwrap();
            old.disconnect().await;
            let fresh = fx.registry.get_or_create(&fx.key).await.unwrap();

            assert!(!fx.registry.evict_if_current(&fx.key, &old).await);
            assert!(fresh.is_connected());
            assert!(fx.registry.evict_if_current(&fx.key, &fresh).await);
            assert!(!fresh.is_connected());
        }

        #[tokio::test]
        async fn get_never_creates() {
            let fx = fixture();
            assert!(fx.registry.get(&fx.key).await.is_none());
            assert_eq!(fx.factory.created.load(Ordering::SeqCst), 0);
            assert_eq!(fx.registry.slot_count(), 0);
        }
    }

    mod slots {
        use super::*;

        #[tokio::test]
        async fn unknown_keys_leave_no_slots() {
            let fx = fixture();

            for i in 0..1000 {
                let key = SessionKey::parse("mallory", format!("made-up-{}", i));
                assert!(fx.registry.get_or_create(&key).await.is_err());
                assert!(!fx.registry.evict(&key).await);
            }

            assert_eq!(fx.registry.slot_count(), 0);
        }

        #[tokio::test]
        async fn failed_connect_releases_slot() {
            let fx = fixture();
            fx.factory
                .behavior
                .fail_connect
                .store(true, Ordering::SeqCst);

            assert!(fx.registry.get_or_create(&fx.key).await.is_err());

            assert_eq!(fx.registry.slot_count(), 0);
        }

        #[tokio::test]
        async fn live_session_keeps_slot_until_evicted() {
            let fx = fixture();
            let manager = fx.registry.get_or_create(&fx.key).await.unwrap();
            assert_eq!(fx.registry.slot_count(), 1);

            assert!(fx.registry.evict_if_current(&fx.key, &manager).await);

            assert_eq!(fx.registry.slot_count(), 0);
            fx.registry.get_or_create(&fx.key).await.unwrap();
            assert_eq!(fx.registry.slot_count(), 1);
            assert_eq!(fx.factory.created.load(Ordering::SeqCst), 2);
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
        async fn pruning_never_splits_concurrent_callers() {
            let fx = fixture();
            fx.factory
                .behavior
                .connect_delay_ms
                .store(20, Ordering::SeqCst);

            let handles: Vec<_> = (0..16)
                .map(|i| {
                    let registry = Arc::clone(&fx.registry);
                    let key = fx.key.clone();
                    tokio::spawn(async move {
                        if i % 4 == 0 {
                            registry.evict(&key).await;
                        }
                        registry.get_or_create(&key).await.is_ok()
                    })
                })
                .collect();
            for joined in futures::future::join_all(handles).await {
                assert!(joined.unwrap());
            }

            assert_eq!(fx.registry.slot_count(), 1);
            assert_eq!(fx.registry.list_live().len(), 1);
        }
    }
}
