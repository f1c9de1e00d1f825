use crate::http::{build_client, ensure_success, is_not_found};
use crate::keys::{encode_path, file_name_of, generate_object_path};
use crate::traits::{
    AdapterDescription, BackendFileRecord, ObjectKey, StorageAdapter, StorageError, StorageResult,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use switchyard_core::{CategoryNamespaces, FileCategory, ProviderKind, StorageConfig, UploadFile};

#[derive(Debug, Deserialize)]
struct RecordResponse {
    id: String,
    #[serde(default)]
    file: String,
    #[serde(rename = "collectionId", default)]
    collection_id: Option<String>,
    #[serde(default)]
    created: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    original_name: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RecordList {
    items: Vec<RecordResponse>,
}

/// Record timestamps use a space between date and time (`2024-01-01 10:00:00.123Z`)
fn parse_record_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw.trim().replacen(' ', "T", 1))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn is_valid_record_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Self-hosted record storage implementation
///
/// Each upload creates a record in the category's collection with the bytes in its
/// `file` field. Object paths are `{record_id}/{stored_file_name}` within the collection.
#[derive(Clone)]
pub struct RecordStorage {
    client: Client,
    base_url: String,
    token: Option<String>,
    site_id: String,
    collections: CategoryNamespaces,
}

impl RecordStorage {
    /// Create a new RecordStorage instance
    ///
    /// # Arguments
    /// * `base_url` - Service root (e.g., "http://127.0.0.1:8090")
    /// * `token` - Optional bearer token; anonymous when `None`
    /// * `site_id` - Stored on every record and used to scope listings
    /// * `collections` - Collection per file category
    /// * `request_timeout` - Upper bound for every request
    pub fn new(
        base_url: String,
        token: Option<String>,
        site_id: String,
        collections: CategoryNamespaces,
        request_timeout: Duration,
    ) -> StorageResult<Self> {
        Ok(RecordStorage {
            client: build_client(request_timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            site_id,
            collections,
        })
    }

    pub fn from_config(config: &StorageConfig) -> StorageResult<Self> {
        let base_url = config.record.base_url.clone().ok_or_else(|| {
            StorageError::Config("RECORD_STORAGE_URL not configured".to_string())
        })?;

        Self::new(
            base_url,
            config.record.token.clone(),
            config.site_id.clone(),
            config.record.collections.clone(),
            config.upload_timeout(),
        )
    }

    fn records_url(&self, collection: &str) -> String {
        format!(
            "{}/api/collections/{}/records",
            self.base_url,
            urlencoding::encode(collection)
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.header("Authorization", format!("Bearer {}", token)),
            None => request,
        }
    }

    fn category_of(&self, collection: &str, mime_type: Option<&str>) -> FileCategory {
        match mime_type {
            Some(mime) => FileCategory::from_mime(mime),
            None => FileCategory::ALL
                .into_iter()
                .find(|c| self.collections.get(*c) == collection)
                .unwrap_or(FileCategory::Document),
        }
    }

    fn to_backend_record(
        &self,
        collection: &str,
        record: RecordResponse,
        fallback: Option<&UploadFile>,
    ) -> StorageResult<BackendFileRecord> {
        if !is_valid_record_id(&record.id) || record.file.is_empty() {
            return Err(StorageError::MalformedResponse(format!(
                "record response without usable id/file (id: '{}')",
                record.id
            )));
        }

        let key = ObjectKey::new(collection, format!("{}/{}", record.id, record.file));
        let public_url = self.build_public_url(&key);

        let mime_type = record
            .mime_type
            .or_else(|| fallback.map(|f| f.mime_type.clone()));
        let category = self.category_of(collection, mime_type.as_deref());

        let mut extensions = BTreeMap::new();
        extensions.insert("recordId".to_string(), json!(record.id));
        if let Some(collection_id) = record.collection_id {
            extensions.insert("collectionId".to_string(), json!(collection_id));
        }
        if let Some(path) = record.path {
            extensions.insert("storagePath".to_string(), json!(path));
        }

        Ok(BackendFileRecord {
            url: public_url.clone(),
            public_url,
            size: record
                .size
                .or_else(|| fallback.map(UploadFile::size))
                .unwrap_or(0),
            mime_type: mime_type.unwrap_or_else(|| "application/octet-stream".to_string()),
            original_name: record
                .original_name
                .or_else(|| fallback.map(|f| f.original_name.clone()))
                .unwrap_or_else(|| record.file.clone()),
            category,
            created_at: record
                .created
                .as_deref()
                .and_then(parse_record_timestamp)
                .unwrap_or_else(Utc::now),
            extensions,
            key,
        })
    }
}

#[async_trait]
impl StorageAdapter for RecordStorage {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Record
    }

    async fn upload(&self, file: &UploadFile) -> StorageResult<BackendFileRecord> {
        let category = file.category();
        let collection = self.collections.get(category);
        let path = generate_object_path(&self.site_id, category, &file.original_name);
        let size = file.size();
        let start = Instant::now();

        let part = Part::bytes(file.data.to_vec())
            .file_name(file_name_of(&path).to_string())
            .mime_str(&file.mime_type)
            .map_err(|e| {
                StorageError::InvalidInput(format!("invalid MIME type '{}': {}", file.mime_type, e))
            })?;

        let form = Form::new()
            .part("file", part)
            .text("path", path.clone())
            .text("original_name", file.original_name.clone())
            .text("category", category.to_string())
            .text("site", self.site_id.clone())
            .text("mime_type", file.mime_type.clone())
            .text("size", size.to_string());

        let request = self
            .authorized(self.client.post(self.records_url(collection)))
            .multipart(form);

        let result = match request.send().await {
            Ok(response) => ensure_success(response).await,
            Err(e) => Err(e.into()),
        };

        let response = result.map_err(|e| {
            tracing::error!(
                error = %e,
                collection = %collection,
                path = %path,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Record storage upload failed"
            );
            e
        })?;

        let body: RecordResponse = response
            .json()
            .await
            .map_err(|e| StorageError::MalformedResponse(e.to_string()))?;

        let record = self.to_backend_record(collection, body, Some(file))?;

        tracing::info!(
            collection = %collection,
            key = %record.key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Record storage upload successful"
        );

        Ok(record)
    }

    async fn delete(&self, key: &ObjectKey) -> StorageResult<bool> {
        key.validate()?;
        let record_id = key
            .path
            .split('/')
            .next()
            .filter(|id| is_valid_record_id(id))
            .ok_or_else(|| StorageError::InvalidKey(format!("no record id in '{}'", key)))?;
        let start = Instant::now();
        let records_url = self.records_url(&key.namespace);

        let lookup = self
            .authorized(self.client.get(&records_url))
            .query(&[
                ("filter", format!("(id='{}')", record_id)),
                ("perPage", "1".to_string()),
            ])
            .send()
            .await?;
        let found: RecordList = ensure_success(lookup)
            .await?
            .json()
            .await
            .map_err(|e| StorageError::MalformedResponse(e.to_string()))?;

        if found.items.is_empty() {
            tracing::debug!(key = %key, "Record not found for delete");
            return Ok(false);
        }

        let response = self
            .authorized(
                self.client
                    .delete(format!("{}/{}", records_url, record_id)),
            )
            .send()
            .await?;

        if is_not_found(response.status()) {
            tracing::debug!(key = %key, "Record disappeared before delete");
            return Ok(false);
        }

        ensure_success(response).await.map_err(|e| {
            tracing::error!(
                error = %e,
                key = %key,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Record storage delete failed"
            );
            e
        })?;

        tracing::info!(
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Record storage delete successful"
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

        let site_filter = format!("(site='{}')", self.site_id.replace('\'', "\\'"));
        let mut records = Vec::new();

        for collection in self.collections.distinct() {
            let response = self
                .authorized(self.client.get(self.records_url(collection)))
                .query(&[
                    ("sort", "-created".to_string()),
                    ("perPage", (limit + offset).to_string()),
                    ("filter", site_filter.clone()),
                ])
                .send()
                .await?;

            let list: RecordList = ensure_success(response)
                .await?
                .json()
                .await
                .map_err(|e| StorageError::MalformedResponse(e.to_string()))?;

            for item in list.items {
                let id = item.id.clone();
                match self.to_backend_record(collection, item, None) {
                    Ok(record) => records.push(record),
                    Err(e) => tracing::warn!(
                        collection = %collection,
                        record_id = %id,
                        error = %e,
                        "Skipping unusable record in listing"
                    ),
                }
            }
        }

        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records.into_iter().skip(offset).take(limit).collect())
    }

    async fn check_health(&self) -> StorageResult<bool> {
        let url = format!("{}/api/health", self.base_url);
        let response = self.client.get(&url).send().await?;
        ensure_success(response).await?;
        Ok(true)
    }

    fn build_public_url(&self, key: &ObjectKey) -> String {
        format!(
            "{}/api/files/{}/{}",
            self.base_url,
            urlencoding::encode(&key.namespace),
            encode_path(&key.path)
        )
    }

    fn describe(&self) -> AdapterDescription {
        AdapterDescription {
            kind: ProviderKind::Record,
            base_url: self.base_url.clone(),
            has_credential: self.token.is_some(),
            namespaces: FileCategory::ALL
                .into_iter()
                .map(|c| (c, self.collections.get(c).to_string()))
                .collect(),
        }
    }
}
