#![cfg(feature = "runtime")]

use switchyard_core::{ProviderKind, StorageConfig, UploadFile};
use switchyard_infra::StorageRuntime;
use switchyard_storage::{EventListeners, UploadError};

#[tokio::test]
async fn test_runtime_without_providers_starts_and_stops() {
    let runtime = StorageRuntime::start(&StorageConfig::default(), EventListeners::default()).unwrap();
    let coordinator = runtime.coordinator();

    let providers = coordinator.providers().await;
    assert_eq!(providers.len(), 2);
    assert!(providers.iter().all(|p| !p.is_configured && !p.is_healthy));

    let file = UploadFile::new("a.txt", "text/plain", b"hello".to_vec());
    let err = coordinator.upload_one(&file, None).await.unwrap_err();
    assert!(matches!(err, UploadError::NoProviderAvailable));

    let err = coordinator
        .upload_one(&file, Some(ProviderKind::Hosted))
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::NotConfigured { .. }));

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_runtime_rejects_invalid_config() {
    let config = StorageConfig {
        health_check_timeout_secs: 120,
        ..StorageConfig::default()
    };
    assert!(StorageRuntime::start(&config, EventListeners::default()).is_err());
}
