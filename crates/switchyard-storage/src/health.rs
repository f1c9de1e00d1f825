//! Background health monitoring
//!
//! Probes every configured adapter on a fixed interval and records the outcome in the
//! shared [`ProviderTable`]. Probes for different providers run concurrently; probes for
//! the same provider are serialized by a per-provider guard.

use chrono::Utc;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::events::{EventListeners, StorageEvent};
use crate::registry::{ProviderRegistry, ProviderTable};
use crate::traits::StorageAdapter;
use switchyard_core::{ProviderInfo, ProviderKind};

pub const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct HealthMonitor {
    registry: Arc<ProviderRegistry>,
    table: ProviderTable,
    in_flight: HashMap<ProviderKind, Arc<Mutex<()>>>,
    interval: Duration,
    probe_timeout: Duration,
    listeners: EventListeners,
}

impl HealthMonitor {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        table: ProviderTable,
        interval: Duration,
        probe_timeout: Duration,
    ) -> Self {
        let in_flight = registry
            .entries()
            .iter()
            .map(|e| (e.kind, Arc::new(Mutex::new(()))))
            .collect();

        Self {
            registry,
            table,
            in_flight,
            interval,
            probe_timeout,
            listeners: EventListeners::default(),
        }
    }

    pub fn with_listeners(mut self, listeners: EventListeners) -> Self {
        self.listeners = listeners;
        self
    }

    /// One scheduled round. A provider whose previous probe is still outstanding is
    /// skipped for this round.
    pub async fn run_scheduled_checks(&self) {
        let probes = self.registry.configured().filter_map(|(kind, adapter)| {
            let guard = self.in_flight.get(&kind)?.clone().try_lock_owned();
            match guard {
                Ok(guard) => Some(async move {
                    self.probe(kind, adapter.as_ref()).await;
                    drop(guard);
                }),
                Err(_) => {
                    tracing::debug!(provider = %kind, "Health probe still in flight, skipping");
                    None
                }
            }
        });

        join_all(probes).await;
    }

    /// Probe every configured provider now, waiting for any outstanding probe first.
    /// Returns the table as it stands afterwards.
    pub async fn refresh(&self) -> Vec<ProviderInfo> {
        let probes = self.registry.configured().map(|(kind, adapter)| async move {
            let _guard = match self.in_flight.get(&kind) {
                Some(lock) => Some(lock.clone().lock_owned().await),
                None => None,
            };
            self.probe(kind, adapter.as_ref()).await;
        });

        join_all(probes).await;
        self.table.snapshot().await
    }

    async fn probe(&self, kind: ProviderKind, adapter: &dyn StorageAdapter) {
        let start = Instant::now();
        let (healthy, error) = match timeout(self.probe_timeout, adapter.check_health()).await {
            Ok(Ok(true)) => (true, None),
            Ok(Ok(false)) => (false, Some("Health endpoint reported unhealthy".to_string())),
            Ok(Err(e)) => (false, Some(e.to_string())),
            Err(_) => (
                false,
                Some(format!(
                    "Health probe timed out after {}ms",
                    self.probe_timeout.as_millis()
                )),
            ),
        };
        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

        let previous = self
            .table
            .record_probe(kind, healthy, error.clone(), Utc::now())
            .await;

        if previous == Some(healthy) {
            tracing::debug!(provider = %kind, healthy, duration_ms = duration_ms, "Health probe completed");
            return;
        }

        if healthy {
            tracing::info!(provider = %kind, duration_ms = duration_ms, "Storage provider is healthy");
        } else {
            tracing::warn!(
                provider = %kind,
                error = error.as_deref().unwrap_or_default(),
                duration_ms = duration_ms,
                "Storage provider is unhealthy"
            );
        }
        self.listeners.emit(StorageEvent::HealthChanged {
            provider: kind,
            healthy,
        });
    }

    /// Spawn the monitoring loop. The first round runs immediately.
    pub fn start(self: Arc<Self>, cancel_token: CancellationToken) -> JoinHandle<()> {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tokio::spawn(async move {
            tracing::info!(
                interval_secs = self.interval.as_secs(),
                providers = self.registry.configured().count(),
                "Health monitor started"
            );
            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        tracing::info!("Health monitor stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.run_scheduled_checks().await;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{AdapterDescription, BackendFileRecord, ObjectKey, StorageError, StorageResult};
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use switchyard_core::UploadFile;

    struct ProbeOnly {
        kind: ProviderKind,
        healthy: AtomicBool,
        delay: Duration,
        probes: AtomicUsize,
    }

    impl ProbeOnly {
        fn new(kind: ProviderKind, healthy: bool) -> Self {
            Self {
                kind,
                healthy: AtomicBool::new(healthy),
                delay: Duration::ZERO,
                probes: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl StorageAdapter for ProbeOnly {
        fn kind(&self) -> ProviderKind {
            self.kind
        }

        async fn upload(&self, _file: &UploadFile) -> StorageResult<BackendFileRecord> {
            Err(StorageError::Connectivity("not used".into()))
        }

        async fn delete(&self, _key: &ObjectKey) -> StorageResult<bool> {
            Ok(false)
        }

        async fn list_recent(&self, _limit: usize, _offset: usize) -> StorageResult<Vec<BackendFileRecord>> {
            Ok(Vec::new())
        }

        async fn check_health(&self) -> StorageResult<bool> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.healthy.load(Ordering::SeqCst) {
                Ok(true)
            } else {
                Err(StorageError::Connectivity("connection refused".into()))
            }
        }

        fn build_public_url(&self, key: &ObjectKey) -> String {
            format!("http://probe/{}", key)
        }

        fn describe(&self) -> AdapterDescription {
            AdapterDescription {
                kind: self.kind,
                base_url: "http://probe".into(),
                has_credential: false,
                namespaces: BTreeMap::new(),
            }
        }
    }

    fn monitor_for(adapters: Vec<Arc<ProbeOnly>>, probe_timeout: Duration) -> HealthMonitor {
        let mut registry = ProviderRegistry::new();
        for (i, adapter) in adapters.into_iter().enumerate() {
            registry.register(adapter, i as u32 + 1);
        }
        let table = ProviderTable::from_registry(&registry);
        HealthMonitor::new(Arc::new(registry), table, Duration::from_secs(60), probe_timeout)
    }

    #[tokio::test]
    async fn test_refresh_records_each_provider_independently() {
        let hosted = Arc::new(ProbeOnly::new(ProviderKind::Hosted, true));
        let record = Arc::new(ProbeOnly::new(ProviderKind::Record, false));
        let monitor = monitor_for(vec![hosted, record], DEFAULT_PROBE_TIMEOUT);

        let infos = monitor.refresh().await;

        assert!(infos[0].is_healthy);
        assert!(infos[0].last_error.is_none());
        assert!(infos[0].last_checked_at.is_some());
        assert!(!infos[1].is_healthy);
        assert!(infos[1].last_error.as_deref().unwrap().contains("connection refused"));
        assert!(infos[1].last_checked_at.is_some());
    }

    #[tokio::test]
    async fn test_unconfigured_provider_is_never_probed() {
        let hosted = Arc::new(ProbeOnly::new(ProviderKind::Hosted, true));
        let mut registry = ProviderRegistry::new();
        registry.register(hosted.clone(), 1);
        registry.register_unconfigured(ProviderKind::Record, 2, "missing base url");
        let table = ProviderTable::from_registry(&registry);
        let monitor = HealthMonitor::new(
            Arc::new(registry),
            table,
            DEFAULT_HEALTH_CHECK_INTERVAL,
            DEFAULT_PROBE_TIMEOUT,
        );

        let infos = monitor.refresh().await;

        assert_eq!(hosted.probes.load(Ordering::SeqCst), 1);
        assert!(!infos[1].is_configured);
        assert!(infos[1].last_checked_at.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_timeout_marks_unhealthy() {
        let mut slow = ProbeOnly::new(ProviderKind::Hosted, true);
        slow.delay = Duration::from_secs(30);
        let monitor = monitor_for(vec![Arc::new(slow)], Duration::from_secs(5));

        let infos = monitor.refresh().await;

        assert!(!infos[0].is_healthy);
        assert!(infos[0].last_error.as_deref().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_scheduled_round_skips_provider_with_probe_in_flight() {
        let hosted = Arc::new(ProbeOnly::new(ProviderKind::Hosted, true));
        let record = Arc::new(ProbeOnly::new(ProviderKind::Record, true));
        let monitor = monitor_for(vec![hosted.clone(), record.clone()], DEFAULT_PROBE_TIMEOUT);

        let held = monitor.in_flight[&ProviderKind::Hosted].clone();
        let guard = held.lock().await;
        monitor.run_scheduled_checks().await;
        drop(guard);

        assert_eq!(hosted.probes.load(Ordering::SeqCst), 0);
        assert_eq!(record.probes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refresh_waits_for_in_flight_check() {
        let hosted = Arc::new(ProbeOnly::new(ProviderKind::Hosted, true));
        let monitor = Arc::new(monitor_for(vec![hosted.clone()], DEFAULT_PROBE_TIMEOUT));

        let held = monitor.in_flight[&ProviderKind::Hosted].clone();
        let guard = held.lock().await;

        let refreshing = tokio::spawn({
            let monitor = monitor.clone();
            async move { monitor.refresh().await }
        });
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(hosted.probes.load(Ordering::SeqCst), 0);
        assert!(!refreshing.is_finished());

        drop(guard);
        let infos = refreshing.await.unwrap();

        assert_eq!(hosted.probes.load(Ordering::SeqCst), 1);
        assert!(infos[0].is_healthy);
        assert!(infos[0].last_checked_at.is_some());
    }

    #[tokio::test]
    async fn test_health_transition_emits_event() {
        use crate::events::StorageEventListener;
        use std::sync::Mutex as StdMutex;

        #[derive(Default)]
        struct Recorder(StdMutex<Vec<StorageEvent>>);
        impl StorageEventListener for Recorder {
            fn on_event(&self, event: &StorageEvent) {
                self.0.lock().unwrap().push(event.clone());
            }
        }

        let hosted = Arc::new(ProbeOnly::new(ProviderKind::Hosted, true));
        let recorder = Arc::new(Recorder::default());
        let mut listeners = EventListeners::default();
        listeners.push(recorder.clone());
        let monitor =
            monitor_for(vec![hosted.clone()], DEFAULT_PROBE_TIMEOUT).with_listeners(listeners);

        monitor.refresh().await;
        monitor.refresh().await;
        hosted.healthy.store(false, Ordering::SeqCst);
        monitor.refresh().await;

        let events = recorder.0.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                StorageEvent::HealthChanged {
                    provider: ProviderKind::Hosted,
                    healthy: true
                },
                StorageEvent::HealthChanged {
                    provider: ProviderKind::Hosted,
                    healthy: false
                },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_probes_immediately_and_stops_on_cancel() {
        let hosted = Arc::new(ProbeOnly::new(ProviderKind::Hosted, true));
        let monitor = Arc::new(monitor_for(vec![hosted.clone()], DEFAULT_PROBE_TIMEOUT));
        let cancel = CancellationToken::new();

        let handle = monitor.clone().start(cancel.clone());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(hosted.probes.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(hosted.probes.load(Ordering::SeqCst), 2);

        cancel.cancel();
        handle.await.unwrap();
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(hosted.probes.load(Ordering::SeqCst), 2);
    }
}
