use crate::http::{build_client, ensure_success, is_not_found};
use crate::keys::{encode_path, generate_object_path};
use crate::traits::{
    AdapterDescription, BackendFileRecord, ObjectKey, StorageAdapter, StorageError, StorageResult,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use switchyard_core::{CategoryNamespaces, FileCategory, ProviderKind, StorageConfig, UploadFile};

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(rename = "Key")]
    key: String,
    #[serde(rename = "Id", default)]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListedObject {
    name: String,
    /// Folders come back without an id
    id: Option<String>,
    created_at: Option<DateTime<Utc>>,
    metadata: Option<ListedMetadata>,
}

#[derive(Debug, Deserialize)]
struct ListedMetadata {
    size: Option<u64>,
    mimetype: Option<String>,
}

/// Hosted object-storage implementation
///
/// Objects live at `{bucket}/{site_id}/{category}/{file}`; buckets are expected to be
/// public so retrieval URLs need no signature.
#[derive(Clone)]
pub struct HostedObjectStorage {
    client: Client,
    base_url: String,
    api_key: String,
    site_id: String,
    buckets: CategoryNamespaces,
}

impl HostedObjectStorage {
    /// Create a new HostedObjectStorage instance
    ///
    /// # Arguments
    /// * `base_url` - Service root (e.g., "https://project.example.co")
    /// * `api_key` - Service key sent as bearer token
    /// * `site_id` - Leading segment of generated object paths
    /// * `buckets` - Bucket per file category
    /// * `request_timeout` - Upper bound for every request
    pub fn new(
        base_url: String,
        api_key: String,
        site_id: String,
        buckets: CategoryNamespaces,
        request_timeout: Duration,
    ) -> StorageResult<Self> {
        if api_key.is_empty() {
            return Err(StorageError::Config(
                "Hosted storage API key is empty".to_string(),
            ));
        }

        Ok(HostedObjectStorage {
            client: build_client(request_timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            site_id,
            buckets,
        })
    }

    pub fn from_config(config: &StorageConfig) -> StorageResult<Self> {
        let base_url = config.hosted.base_url.clone().ok_or_else(|| {
            StorageError::Config("HOSTED_STORAGE_URL not configured".to_string())
        })?;
        let api_key = config.hosted.api_key.clone().ok_or_else(|| {
            StorageError::Config("HOSTED_STORAGE_KEY not configured".to_string())
        })?;

        Self::new(
            base_url,
            api_key,
            config.site_id.clone(),
            config.hosted.buckets.clone(),
            config.upload_timeout(),
        )
    }

    fn object_url(&self, key: &ObjectKey) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url,
            urlencoding::encode(&key.namespace),
            encode_path(&key.path)
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("apikey", self.api_key.as_str())
    }

    async fn list_category(
        &self,
        category: FileCategory,
        limit: usize,
    ) -> StorageResult<Vec<BackendFileRecord>> {
        let bucket = self.buckets.get(category);
        let prefix = format!("{}/{}", self.site_id, category.sub_path());
        let url = format!(
            "{}/storage/v1/object/list/{}",
            self.base_url,
            urlencoding::encode(bucket)
        );

        let request = self.authorized(self.client.post(&url)).json(&json!({
            "prefix": prefix,
            "limit": limit,
            "offset": 0,
            "sortBy": { "column": "created_at", "order": "desc" },
        }));

        let response = ensure_success(request.send().await?).await?;
        let objects: Vec<ListedObject> = response
            .json()
            .await
            .map_err(|e| StorageError::MalformedResponse(e.to_string()))?;

        Ok(objects
            .into_iter()
            .filter(|object| object.id.is_some())
            .map(|object| {
                let key = ObjectKey::new(bucket, format!("{}/{}", prefix, object.name));
                let public_url = self.build_public_url(&key);
                let metadata = object.metadata.unwrap_or(ListedMetadata {
                    size: None,
                    mimetype: None,
                });
                let mut extensions = BTreeMap::new();
                if let Some(id) = object.id {
                    extensions.insert("objectId".to_string(), json!(id));
                }

                BackendFileRecord {
                    url: public_url.clone(),
                    public_url,
                    size: metadata.size.unwrap_or(0),
                    mime_type: metadata
                        .mimetype
                        .unwrap_or_else(|| "application/octet-stream".to_string()),
                    original_name: object.name,
                    category,
                    created_at: object.created_at.unwrap_or_else(Utc::now),
                    extensions,
                    key,
                }
            })
            .collect())
    }
}

#[async_trait]
impl StorageAdapter for HostedObjectStorage {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Hosted
    }

    async fn upload(&self, file: &UploadFile) -> StorageResult<BackendFileRecord> {
        let category = file.category();
        let bucket = self.buckets.get(category);
        let key = ObjectKey::new(
            bucket,
            generate_object_path(&self.site_id, category, &file.original_name),
        );
        let size = file.size();
        let start = Instant::now();

        let request = self
            .authorized(self.client.post(self.object_url(&key)))
            .header("Content-Type", file.mime_type.as_str())
            .header("x-upsert", "false")
            .body(file.data.clone());

        let result = match request.send().await {
            Ok(response) => ensure_success(response).await,
            Err(e) => Err(e.into()),
        };

        let response = result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %bucket,
                key = %key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Hosted storage upload failed"
            );
            e
        })?;

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| StorageError::MalformedResponse(e.to_string()))?;

        let public_url = self.build_public_url(&key);
        let mut extensions = BTreeMap::new();
        extensions.insert("objectKey".to_string(), json!(body.key));
        if let Some(id) = body.id {
            extensions.insert("objectId".to_string(), json!(id));
        }

        tracing::info!(
            bucket = %bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Hosted storage upload successful"
        );

        Ok(BackendFileRecord {
            url: public_url.clone(),
            public_url,
            size,
            mime_type: file.mime_type.clone(),
            original_name: file.original_name.clone(),
            category,
            created_at: Utc::now(),
            extensions,
            key,
        })
    }

    async fn delete(&self, key: &ObjectKey) -> StorageResult<bool> {
        key.validate()?;
        let start = Instant::now();

        let response = self
            .authorized(self.client.delete(self.object_url(key)))
            .send()
            .await?;

        let status = response.status();
        if is_not_found(status) {
            tracing::debug!(key = %key, "Hosted storage object not found for delete");
            return Ok(false);
        }

        if status == StatusCode::BAD_REQUEST {
            let body = response.text().await.unwrap_or_default();
            if body.contains("not_found") || body.contains("not found") {
                tracing::debug!(key = %key, "Hosted storage object not found for delete");
                return Ok(false);
            }
            return Err(StorageError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        ensure_success(response).await.map_err(|e| {
            tracing::error!(
                error = %e,
                key = %key,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Hosted storage delete failed"
            );
            e
        })?;

        tracing::info!(
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Hosted storage delete successful"
        );

        Ok(true)
    }

    async fn list_recent(
        &self,
        limit: usize,
        offset: usize,
    ) -> StorageResult<Vec<BackendFileRecord>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        for category in FileCategory::ALL {
            records.extend(self.list_category(category, limit + offset).await?);
        }

        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records.into_iter().skip(offset).take(limit).collect())
    }

    async fn check_health(&self) -> StorageResult<bool> {
        let url = format!("{}/storage/v1/bucket", self.base_url);
        let response = self.authorized(self.client.get(&url)).send().await?;
        ensure_success(response).await?;
        Ok(true)
    }

    fn build_public_url(&self, key: &ObjectKey) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url,
            urlencoding::encode(&key.namespace),
            encode_path(&key.path)
        )
    }

    fn describe(&self) -> AdapterDescription {
        AdapterDescription {
            kind: ProviderKind::Hosted,
            base_url: self.base_url.clone(),
            has_credential: true,
            namespaces: FileCategory::ALL
                .into_iter()
                .map(|c| (c, self.buckets.get(c).to_string()))
                .collect(),
        }
    }
}

#[cfg(all(test, feature = "provider-hosted"))]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn storage(base_url: String) -> HostedObjectStorage {
        HostedObjectStorage::new(
            base_url,
            "service-key".to_string(),
            "acme".to_string(),
            CategoryNamespaces::default(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_upload_posts_raw_body_with_bearer() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock(
                "POST",
                Matcher::Regex(r"^/storage/v1/object/images/acme/images/\d+-[a-z0-9]+\.png$".into()),
            )
            .match_header("authorization", "Bearer service-key")
            .match_header("content-type", "image/png")
            .match_body(Matcher::Exact("fake-png".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"Key":"images/acme/images/x.png","Id":"obj-1"}"#)
            .create_async()
            .await;

        let storage = storage(server.url());
        let file = UploadFile::new("cat.png", "image/png", b"fake-png".to_vec());
        let record = storage.upload(&file).await.unwrap();

        mock.assert_async().await;
        assert_eq!(record.key.namespace, "images");
        assert!(record.key.path.starts_with("acme/images/"));
        assert_eq!(record.category, FileCategory::Image);
        assert_eq!(record.size, 8);
        assert_eq!(record.extensions.get("objectId"), Some(&json!("obj-1")));
        assert_eq!(record.public_url, storage.build_public_url(&record.key));
        assert!(record
            .public_url
            .starts_with(&format!("{}/storage/v1/object/public/images/acme/images/", server.url())));
    }

    #[tokio::test]
    async fn test_upload_surfaces_rejection() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", Matcher::Any)
            .with_status(413)
            .with_body("Payload too large")
            .create_async()
            .await;

        let storage = storage(server.url());
        let file = UploadFile::new("big.pdf", "application/pdf", vec![0u8; 16]);
        let err = storage.upload(&file).await.unwrap_err();

        match err {
            StorageError::Rejected { status, body } => {
                assert_eq!(status, 413);
                assert_eq!(body, "Payload too large");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_upload_malformed_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", Matcher::Any)
            .with_status(200)
            .with_body("<html>gateway</html>")
            .create_async()
            .await;

        let storage = storage(server.url());
        let file = UploadFile::new("a.txt", "text/plain", b"hi".to_vec());
        let err = storage.upload(&file).await.unwrap_err();
        assert!(matches!(err, StorageError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_delete_not_found_returns_false() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("DELETE", "/storage/v1/object/documents/acme/documents/gone.pdf")
            .with_status(404)
            .create_async()
            .await;
        server
            .mock("DELETE", "/storage/v1/object/documents/acme/documents/here.pdf")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let storage = storage(server.url());
        let gone = ObjectKey::new("documents", "acme/documents/gone.pdf");
        let here = ObjectKey::new("documents", "acme/documents/here.pdf");

        assert!(!storage.delete(&gone).await.unwrap());
        assert!(storage.delete(&here).await.unwrap());
    }

    #[tokio::test]
    async fn test_health_probe() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/storage/v1/bucket")
            .match_header("authorization", "Bearer service-key")
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let storage = storage(server.url());
        assert!(storage.check_health().await.unwrap());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_health_probe_unreachable() {
        let storage = storage("http://127.0.0.1:9".to_string());
        assert!(storage.check_health().await.is_err());
    }

    #[tokio::test]
    async fn test_list_recent_merges_newest_first() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/storage/v1/object/list/images")
            .with_status(200)
            .with_body(
                r#"[{"name":"old.png","id":"1","created_at":"2024-01-01T00:00:00Z","metadata":{"size":10,"mimetype":"image/png"}}]"#,
            )
            .create_async()
            .await;
        server
            .mock("POST", "/storage/v1/object/list/documents")
            .with_status(200)
            .with_body(
                r#"[{"name":"new.pdf","id":"2","created_at":"2024-02-01T00:00:00Z","metadata":{"size":20,"mimetype":"application/pdf"}},{"name":"sub","id":null}]"#,
            )
            .create_async()
            .await;
        for bucket in ["videos", "audio"] {
            server
                .mock("POST", format!("/storage/v1/object/list/{}", bucket).as_str())
                .with_status(200)
                .with_body("[]")
                .create_async()
                .await;
        }

        let storage = storage(server.url());
        let records = storage.list_recent(10, 0).await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].key.path, "acme/documents/new.pdf");
        assert_eq!(records[1].key.path, "acme/images/old.png");

        let second = storage.list_recent(1, 1).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].key.path, "acme/images/old.png");
    }

    #[test]
    fn test_public_url_is_pure() {
        let storage = storage("https://hosted.example.com/".to_string());
        let key = ObjectKey::new("images", "acme/images/a b.png");
        assert_eq!(
            storage.build_public_url(&key),
            "https://hosted.example.com/storage/v1/object/public/images/acme/images/a%20b.png"
        );
    }

    #[test]
    fn test_empty_key_rejected() {
        let result = HostedObjectStorage::new(
            "https://hosted.example.com".to_string(),
            String::new(),
            "acme".to_string(),
            CategoryNamespaces::default(),
            Duration::from_secs(5),
        );
        assert!(matches!(result, Err(StorageError::Config(_))));
    }
}
