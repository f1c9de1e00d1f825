//! In-memory adapters shared by the coordinator and monitor tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use switchyard_core::{FileCategory, ProviderKind, UploadFile};
use switchyard_storage::keys::generate_object_path;
use switchyard_storage::{
    AdapterDescription, BackendFileRecord, CoordinatorOptions, EventListeners, ObjectKey,
    ProviderRegistry, StorageAdapter, StorageError, StorageEvent, StorageEventListener,
    StorageResult, UploadCoordinator,
};

pub const SITE_ID: &str = "acme";

/// Adapter keeping objects in memory, with switches for failures and call counters
pub struct MemoryAdapter {
    kind: ProviderKind,
    base_url: String,
    healthy: AtomicBool,
    fail_uploads: AtomicBool,
    /// Original names whose upload always fails
    failing_names: Mutex<HashSet<String>>,
    upload_delay: Mutex<Duration>,
    objects: Mutex<Vec<BackendFileRecord>>,
    pub upload_calls: AtomicUsize,
    pub health_calls: AtomicUsize,
}

impl MemoryAdapter {
    pub fn new(kind: ProviderKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            base_url: format!("https://{}.storage.test", kind),
            healthy: AtomicBool::new(true),
            fail_uploads: AtomicBool::new(false),
            failing_names: Mutex::new(HashSet::new()),
            upload_delay: Mutex::new(Duration::ZERO),
            objects: Mutex::new(Vec::new()),
            upload_calls: AtomicUsize::new(0),
            health_calls: AtomicUsize::new(0),
        })
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn set_fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_file(&self, original_name: &str) {
        self.failing_names
            .lock()
            .unwrap()
            .insert(original_name.to_string());
    }

    pub fn set_upload_delay(&self, delay: Duration) {
        *self.upload_delay.lock().unwrap() = delay;
    }

    pub fn uploads(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn probes(&self) -> usize {
        self.health_calls.load(Ordering::SeqCst)
    }

    pub fn stored(&self) -> Vec<BackendFileRecord> {
        self.objects.lock().unwrap().clone()
    }

    fn namespace(category: FileCategory) -> &'static str {
        category.sub_path()
    }
}

#[async_trait]
impl StorageAdapter for MemoryAdapter {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn upload(&self, file: &UploadFile) -> StorageResult<BackendFileRecord> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.upload_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.fail_uploads.load(Ordering::SeqCst)
            || self
                .failing_names
                .lock()
                .unwrap()
                .contains(&file.original_name)
        {
            return Err(StorageError::Connectivity(format!(
                "{} refused connection",
                self.kind
            )));
        }

        let category = file.category();
        let key = ObjectKey::new(
            Self::namespace(category),
            generate_object_path(SITE_ID, category, &file.original_name),
        );
        let public_url = self.build_public_url(&key);
        let mut extensions = BTreeMap::new();
        extensions.insert("memoryIndex".to_string(), json!(self.objects.lock().unwrap().len()));

        let record = BackendFileRecord {
            url: public_url.clone(),
            public_url,
            key,
            size: file.size(),
            mime_type: file.mime_type.clone(),
            original_name: file.original_name.clone(),
            category,
            created_at: Utc::now(),
            extensions,
        };
        self.objects.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn delete(&self, key: &ObjectKey) -> StorageResult<bool> {
        let mut objects = self.objects.lock().unwrap();
        let before = objects.len();
        objects.retain(|o| &o.key != key);
        Ok(objects.len() != before)
    }

    async fn list_recent(&self, limit: usize, offset: usize) -> StorageResult<Vec<BackendFileRecord>> {
        let mut objects = self.objects.lock().unwrap().clone();
        objects.reverse();
        Ok(objects.into_iter().skip(offset).take(limit).collect())
    }

    async fn check_health(&self) -> StorageResult<bool> {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        if self.healthy.load(Ordering::SeqCst) {
            Ok(true)
        } else {
            Err(StorageError::Connectivity(format!("{} is down", self.kind)))
        }
    }

    fn build_public_url(&self, key: &ObjectKey) -> String {
        format!("{}/public/{}/{}", self.base_url, key.namespace, key.path)
    }

    fn describe(&self) -> AdapterDescription {
        AdapterDescription {
            kind: self.kind,
            base_url: self.base_url.clone(),
            has_credential: false,
            namespaces: FileCategory::ALL
                .into_iter()
                .map(|c| (c, Self::namespace(c).to_string()))
                .collect(),
        }
    }
}

/// Records every event it receives
#[derive(Default)]
pub struct EventRecorder {
    events: Mutex<Vec<StorageEvent>>,
}

impl EventRecorder {
    pub fn events(&self) -> Vec<StorageEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl StorageEventListener for EventRecorder {
    fn on_event(&self, event: &StorageEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

pub struct Harness {
    pub coordinator: UploadCoordinator,
    pub hosted: Arc<MemoryAdapter>,
    pub record: Arc<MemoryAdapter>,
    pub events: Arc<EventRecorder>,
}

/// Hosted at priority 1, record at priority 2, both configured
pub fn harness(options: CoordinatorOptions) -> Harness {
    let hosted = MemoryAdapter::new(ProviderKind::Hosted);
    let record = MemoryAdapter::new(ProviderKind::Record);

    let mut registry = ProviderRegistry::new();
    registry.register(hosted.clone(), 1);
    registry.register(record.clone(), 2);

    let events = Arc::new(EventRecorder::default());
    let mut listeners = EventListeners::default();
    listeners.push(events.clone());

    Harness {
        coordinator: UploadCoordinator::new(registry, options, listeners),
        hosted,
        record,
        events,
    }
}

pub fn image(name: &str, size: usize) -> UploadFile {
    UploadFile::new(name, "image/png", vec![0u8; size])
}
