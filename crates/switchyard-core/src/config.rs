//! Configuration module
//!
//! Storage switcher configuration, read once at startup from the environment
//! (optionally seeded from a `.env` file). Every field is public and `StorageConfig`
//! implements `Default` so tests can build configurations directly.

use std::env;
use std::time::Duration;

use crate::models::FileCategory;
use crate::storage_types::ProviderKind;

const DEFAULT_SITE_ID: &str = "default";
const HEALTH_CHECK_INTERVAL_SECS: u64 = 60;
const HEALTH_CHECK_TIMEOUT_SECS: u64 = 5;
const UPLOAD_TIMEOUT_SECS: u64 = 60;
const HOSTED_PRIORITY: u32 = 1;
const RECORD_PRIORITY: u32 = 2;

/// Static map from file category to a bucket or collection name
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CategoryNamespaces {
    pub image: String,
    pub video: String,
    pub audio: String,
    pub document: String,
}

impl CategoryNamespaces {
    pub fn get(&self, category: FileCategory) -> &str {
        match category {
            FileCategory::Image => &self.image,
            FileCategory::Video => &self.video,
            FileCategory::Audio => &self.audio,
            FileCategory::Document => &self.document,
        }
    }

    /// Distinct namespace names, in category order
    pub fn distinct(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::with_capacity(4);
        for category in FileCategory::ALL {
            let name = self.get(category);
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    fn from_lookup<F>(lookup: &F, prefix: &str, defaults: [&str; 4]) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |suffix: &str, default: &str| {
            lookup(&format!("{}_{}", prefix, suffix))
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            image: read("IMAGE", defaults[0]),
            video: read("VIDEO", defaults[1]),
            audio: read("AUDIO", defaults[2]),
            document: read("DOCUMENT", defaults[3]),
        }
    }
}

impl Default for CategoryNamespaces {
    fn default() -> Self {
        Self {
            image: "images".to_string(),
            video: "videos".to_string(),
            audio: "audio".to_string(),
            document: "documents".to_string(),
        }
    }
}

/// Hosted object-storage backend settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostedStorageConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub priority: u32,
    pub buckets: CategoryNamespaces,
}

impl HostedStorageConfig {
    /// Why this backend cannot be used, if it cannot
    pub fn unusable_reason(&self) -> Option<String> {
        match (&self.base_url, &self.api_key) {
            (None, _) => Some("HOSTED_STORAGE_URL not configured".to_string()),
            (Some(_), None) => Some("HOSTED_STORAGE_KEY not configured".to_string()),
            _ => None,
        }
    }
}

impl Default for HostedStorageConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            priority: HOSTED_PRIORITY,
            buckets: CategoryNamespaces::default(),
        }
    }
}

/// Self-hosted record backend settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordStorageConfig {
    pub base_url: Option<String>,
    /// Optional bearer token; the backend accepts anonymous uploads when unset
    pub token: Option<String>,
    pub priority: u32,
    pub collections: CategoryNamespaces,
}

impl RecordStorageConfig {
    pub fn unusable_reason(&self) -> Option<String> {
        match self.base_url {
            None => Some("RECORD_STORAGE_URL not configured".to_string()),
            Some(_) => None,
        }
    }
}

impl Default for RecordStorageConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            token: None,
            priority: RECORD_PRIORITY,
            collections: CategoryNamespaces::default(),
        }
    }
}

/// Storage switcher configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageConfig {
    /// Leading segment of every generated storage key
    pub site_id: String,
    pub hosted: HostedStorageConfig,
    pub record: RecordStorageConfig,
    pub health_check_interval_secs: u64,
    pub health_check_timeout_secs: u64,
    pub upload_timeout_secs: u64,
    /// Disable to force single-provider behavior (tests, debugging)
    pub fallback_enabled: bool,
    /// Provider used when no provider is currently healthy
    pub default_provider: ProviderKind,
    /// Pause between files of a batch upload
    pub batch_upload_delay_ms: u64,
    pub log_json: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            site_id: DEFAULT_SITE_ID.to_string(),
            hosted: HostedStorageConfig::default(),
            record: RecordStorageConfig::default(),
            health_check_interval_secs: HEALTH_CHECK_INTERVAL_SECS,
            health_check_timeout_secs: HEALTH_CHECK_TIMEOUT_SECS,
            upload_timeout_secs: UPLOAD_TIMEOUT_SECS,
            fallback_enabled: true,
            default_provider: ProviderKind::Hosted,
            batch_upload_delay_ms: 0,
            log_json: false,
        }
    }
}

impl StorageConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        let parse_u64 = |key: &str, default: u64| -> Result<u64, anyhow::Error> {
            match non_empty(key) {
                Some(raw) => raw
                    .parse()
                    .map_err(|_| anyhow::anyhow!("{} must be a valid number", key)),
                None => Ok(default),
            }
        };

        let parse_u32 = |key: &str, default: u32| -> Result<u32, anyhow::Error> {
            match non_empty(key) {
                Some(raw) => raw
                    .parse()
                    .map_err(|_| anyhow::anyhow!("{} must be a valid number", key)),
                None => Ok(default),
            }
        };

        let parse_bool = |key: &str, default: bool| {
            non_empty(key)
                .map(|s| matches!(s.to_lowercase().as_str(), "true" | "1" | "yes" | "on"))
                .unwrap_or(default)
        };

        let default_provider = match non_empty("DEFAULT_PROVIDER") {
            Some(raw) => raw.parse()?,
            None => ProviderKind::Hosted,
        };

        let hosted = HostedStorageConfig {
            base_url: non_empty("HOSTED_STORAGE_URL").map(|s| s.trim_end_matches('/').to_string()),
            api_key: non_empty("HOSTED_STORAGE_KEY"),
            priority: parse_u32("HOSTED_STORAGE_PRIORITY", HOSTED_PRIORITY)?,
            buckets: CategoryNamespaces::from_lookup(
                &lookup,
                "HOSTED_BUCKET",
                ["images", "videos", "audio", "documents"],
            ),
        };

        let record = RecordStorageConfig {
            base_url: non_empty("RECORD_STORAGE_URL").map(|s| s.trim_end_matches('/').to_string()),
            token: non_empty("RECORD_STORAGE_TOKEN"),
            priority: parse_u32("RECORD_STORAGE_PRIORITY", RECORD_PRIORITY)?,
            collections: CategoryNamespaces::from_lookup(
                &lookup,
                "RECORD_COLLECTION",
                ["images", "videos", "audio", "documents"],
            ),
        };

        let config = StorageConfig {
            site_id: non_empty("STORAGE_SITE_ID").unwrap_or_else(|| DEFAULT_SITE_ID.to_string()),
            hosted,
            record,
            health_check_interval_secs: parse_u64(
                "HEALTH_CHECK_INTERVAL_SECS",
                HEALTH_CHECK_INTERVAL_SECS,
            )?,
            health_check_timeout_secs: parse_u64(
                "HEALTH_CHECK_TIMEOUT_SECS",
                HEALTH_CHECK_TIMEOUT_SECS,
            )?,
            upload_timeout_secs: parse_u64("UPLOAD_TIMEOUT_SECS", UPLOAD_TIMEOUT_SECS)?,
            fallback_enabled: parse_bool("STORAGE_FALLBACK_ENABLED", true),
            default_provider,
            batch_upload_delay_ms: parse_u64("BATCH_UPLOAD_DELAY_MS", 0)?,
            log_json: non_empty("LOG_FORMAT")
                .map(|s| s.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.site_id.is_empty() || self.site_id.contains('/') || self.site_id.contains("..") {
            return Err(anyhow::anyhow!(
                "STORAGE_SITE_ID must be a non-empty single path segment"
            ));
        }

        if self.health_check_interval_secs == 0 {
            return Err(anyhow::anyhow!(
                "HEALTH_CHECK_INTERVAL_SECS must be greater than zero"
            ));
        }

        if self.health_check_timeout_secs == 0
            || self.health_check_timeout_secs >= self.health_check_interval_secs
        {
            return Err(anyhow::anyhow!(
                "HEALTH_CHECK_TIMEOUT_SECS must be greater than zero and shorter than HEALTH_CHECK_INTERVAL_SECS"
            ));
        }

        if self.upload_timeout_secs == 0 {
            return Err(anyhow::anyhow!("UPLOAD_TIMEOUT_SECS must be greater than zero"));
        }

        for (name, url) in [
            ("HOSTED_STORAGE_URL", &self.hosted.base_url),
            ("RECORD_STORAGE_URL", &self.record.base_url),
        ] {
            if let Some(url) = url {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(anyhow::anyhow!("{} must be an http(s) URL", name));
                }
            }
        }

        Ok(())
    }

    /// Whether the given provider has everything it needs to be used
    pub fn is_configured(&self, provider: ProviderKind) -> bool {
        self.unusable_reason(provider).is_none()
    }

    pub fn unusable_reason(&self, provider: ProviderKind) -> Option<String> {
        match provider {
            ProviderKind::Hosted => self.hosted.unusable_reason(),
            ProviderKind::Record => self.record.unusable_reason(),
        }
    }

    pub fn priority(&self, provider: ProviderKind) -> u32 {
        match provider {
            ProviderKind::Hosted => self.hosted.priority,
            ProviderKind::Record => self.record.priority,
        }
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }

    pub fn health_check_timeout(&self) -> Duration {
        Duration::from_secs(self.health_check_timeout_secs)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }

    pub fn batch_upload_delay(&self) -> Duration {
        Duration::from_millis(self.batch_upload_delay_ms)
    }
}
