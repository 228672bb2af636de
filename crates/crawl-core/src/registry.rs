//! Crawl-target registry: the durable record of every target and the store
//! that loads it before a pass and persists it afterwards.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use crate::context::InvocationContext;
use crate::error::{CrawlError, Result};

// ---------------------------------------------------------------------------
// Target
// ---------------------------------------------------------------------------

/// One crawl source's durable state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    /// Identity; unique within a registry.
    pub name: String,
    pub url: String,
    /// Opaque resume token owned by the crawl unit (an `ETag` for the HTTP unit).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_success_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default)]
    pub consecutive_failures: u32,
    #[serde(default)]
    pub documents_indexed: u64,
    /// Keys this crate does not interpret, kept so a save never drops them.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Target {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            cursor: None,
            last_run_at: None,
            last_success_at: None,
            last_status: None,
            last_error: None,
            consecutive_failures: 0,
            documents_indexed: 0,
            extra: BTreeMap::new(),
        }
    }

    /// Record a successful run.
    pub fn record_success(&mut self, at: DateTime<Utc>, status: impl Into<String>) {
        self.last_run_at = Some(at);
        self.last_success_at = Some(at);
        self.last_status = Some(status.into());
        self.last_error = None;
        self.consecutive_failures = 0;
    }

    /// Record a failed run. Earlier cursor and success timestamp are kept.
    pub fn record_failure(&mut self, at: DateTime<Utc>, error: impl Into<String>) {
        self.last_run_at = Some(at);
        self.last_status = Some("failed".to_string());
        self.last_error = Some(error.into());
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Ordered collection of all targets for one invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub crawlers: Vec<Target>,
}

impl Registry {
    pub fn new(crawlers: Vec<Target>) -> Self {
        Self { crawlers }
    }

    pub fn len(&self) -> usize {
        self.crawlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.crawlers.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.crawlers.iter().map(|t| t.name.as_str()).collect()
    }

    /// Names must be non-empty and unique.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let mut seen = HashSet::new();
        for (i, t) in self.crawlers.iter().enumerate() {
            if t.name.trim().is_empty() {
                return Err(format!("crawler #{i} has an empty name"));
            }
            if !seen.insert(t.name.as_str()) {
                return Err(format!("duplicate crawler name '{}'", t.name));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RegistryStore
// ---------------------------------------------------------------------------

/// Loads and persists the registry. Both operations are single-shot: the
/// orchestrator never checkpoints mid-pass.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    async fn load(&self, ctx: &InvocationContext, path: &Path) -> Result<Registry>;

    async fn save(&self, ctx: &InvocationContext, path: &Path, registry: &Registry) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryFormat {
    Yaml,
    Json,
}

impl RegistryFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Yaml,
        }
    }

    pub fn decode(self, data: &str) -> std::result::Result<Registry, String> {
        match self {
            Self::Yaml => serde_yaml::from_str(data).map_err(|e| e.to_string()),
            Self::Json => serde_json::from_str(data).map_err(|e| e.to_string()),
        }
    }

    pub fn encode(self, registry: &Registry) -> std::result::Result<String, String> {
        match self {
            Self::Yaml => serde_yaml::to_string(registry).map_err(|e| e.to_string()),
            Self::Json => serde_json::to_string_pretty(registry)
                .map(|mut s| {
                    s.push('\n');
                    s
                })
                .map_err(|e| e.to_string()),
        }
    }
}

/// Registry stored as a single YAML or JSON file (chosen by extension).
#[derive(Debug, Clone, Copy, Default)]
pub struct FileRegistryStore;

#[async_trait]
impl RegistryStore for FileRegistryStore {
    async fn load(&self, ctx: &InvocationContext, path: &Path) -> Result<Registry> {
        let load_err = |reason: String| CrawlError::Load {
            path: path.to_path_buf(),
            reason,
        };
        let data = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| load_err(e.to_string()))?;
        let registry = RegistryFormat::from_path(path)
            .decode(&data)
            .map_err(load_err)?;
        registry.validate().map_err(load_err)?;
        tracing::debug!(
            invocation_id = %ctx.invocation_id(),
            path = %path.display(),
            targets = registry.len(),
            "registry loaded"
        );
        Ok(registry)
    }

    async fn save(&self, ctx: &InvocationContext, path: &Path, registry: &Registry) -> Result<()> {
        let persist_err = |reason: String| CrawlError::Persist {
            path: path.to_path_buf(),
            reason,
        };
        let data = RegistryFormat::from_path(path)
            .encode(registry)
            .map_err(persist_err)?;
        let owned: PathBuf = path.to_path_buf();
        tokio::task::spawn_blocking(move || crate::io::atomic_write(&owned, data.as_bytes()))
            .await
            .map_err(|e| persist_err(e.to_string()))?
            .map_err(|e| persist_err(e.to_string()))?;
        tracing::debug!(
            invocation_id = %ctx.invocation_id(),
            path = %path.display(),
            targets = registry.len(),
            "registry saved"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> Registry {
        Registry::new(vec![
            Target::new("kurly", "https://helloworld.kurly.com/feed.xml"),
            Target::new("toss", "https://toss.tech/rss.xml"),
        ])
    }

    #[test]
    fn validate_rejects_duplicate_names() {
        let reg = Registry::new(vec![Target::new("a", "http://a"), Target::new("a", "http://b")]);
        let err = reg.validate().unwrap_err();
        assert!(err.contains("duplicate"));
    }

    #[test]
    fn validate_rejects_empty_name() {
        let reg = Registry::new(vec![Target::new("  ", "http://a")]);
        assert!(reg.validate().is_err());
    }

    #[test]
    fn record_failure_keeps_cursor_and_counts() {
        let mut t = Target::new("a", "http://a");
        t.cursor = Some("\"v1\"".into());
        let now = Utc::now();
        t.record_failure(now, "boom");
        t.record_failure(now, "boom again");
        assert_eq!(t.consecutive_failures, 2);
        assert_eq!(t.cursor.as_deref(), Some("\"v1\""));
        assert_eq!(t.last_error.as_deref(), Some("boom again"));

        t.record_success(now, "200");
        assert_eq!(t.consecutive_failures, 0);
        assert!(t.last_error.is_none());
        assert_eq!(t.last_success_at, Some(now));
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(
            RegistryFormat::from_path(Path::new("r.json")),
            RegistryFormat::Json
        );
        assert_eq!(
            RegistryFormat::from_path(Path::new("r.JSON")),
            RegistryFormat::Json
        );
        assert_eq!(
            RegistryFormat::from_path(Path::new("r.yaml")),
            RegistryFormat::Yaml
        );
        assert_eq!(RegistryFormat::from_path(Path::new("r")), RegistryFormat::Yaml);
    }

    #[test]
    fn unknown_keys_survive_yaml() {
        let yaml = "crawlers:\n  - name: a\n    url: http://a\n    company: Kurly\n";
        let reg = RegistryFormat::Yaml.decode(yaml).unwrap();
        assert_eq!(
            reg.crawlers[0].extra.get("company"),
            Some(&serde_yaml::Value::String("Kurly".into()))
        );
        let out = RegistryFormat::Yaml.encode(&reg).unwrap();
        assert!(out.contains("company: Kurly"));
    }

    #[test]
    fn unknown_keys_survive_json() {
        let json = r#"{"crawlers":[{"name":"a","url":"http://a","selector":"article"}]}"#;
        let reg = RegistryFormat::Json.decode(json).unwrap();
        let out = RegistryFormat::Json.encode(&reg).unwrap();
        assert!(out.contains("\"selector\": \"article\""));
    }

    #[tokio::test]
    async fn file_store_save_then_load_preserves_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("registry.yaml");
        let ctx = InvocationContext::new();
        let store = FileRegistryStore;

        store.save(&ctx, &path, &sample()).await.unwrap();
        let loaded = store.load(&ctx, &path).await.unwrap();
        assert_eq!(loaded.names(), vec!["kurly", "toss"]);
        assert_eq!(loaded, sample());
    }

    #[tokio::test]
    async fn file_store_json_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("registry.json");
        let ctx = InvocationContext::new();
        FileRegistryStore.save(&ctx, &path, &sample()).await.unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.trim_start().starts_with('{'));
        let loaded = FileRegistryStore.load(&ctx, &path).await.unwrap();
        assert_eq!(loaded.len(), 2);
    }

    #[tokio::test]
    async fn file_store_missing_file_is_load_error() {
        let dir = TempDir::new().unwrap();
        let ctx = InvocationContext::new();
        let err = FileRegistryStore
            .load(&ctx, &dir.path().join("absent.yaml"))
            .await
            .unwrap_err();
        assert!(matches!(err, CrawlError::Load { .. }));
    }

    #[tokio::test]
    async fn file_store_corrupt_file_is_load_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("registry.json");
        std::fs::write(&path, "{ not json").unwrap();
        let ctx = InvocationContext::new();
        let err = FileRegistryStore.load(&ctx, &path).await.unwrap_err();
        assert!(matches!(err, CrawlError::Load { .. }));
    }

    #[tokio::test]
    async fn file_store_unwritable_path_is_persist_error() {
        let dir = TempDir::new().unwrap();
        // A regular file where a parent directory is expected.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        let ctx = InvocationContext::new();
        let err = FileRegistryStore
            .save(&ctx, &blocker.join("registry.yaml"), &sample())
            .await
            .unwrap_err();
        assert!(matches!(err, CrawlError::Persist { .. }));
    }
}
