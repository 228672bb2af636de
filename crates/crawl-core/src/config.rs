use crate::error::{CrawlError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// IndexConfig
// ---------------------------------------------------------------------------

/// Options for the process-wide index client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    pub endpoint: String,
    /// Index that crawl units write documents into.
    #[serde(default = "default_index_name")]
    pub index: String,
    #[serde(default)]
    pub auth: IndexAuth,
    #[serde(default)]
    pub tls: TlsConfig,
    #[serde(default = "default_index_timeout")]
    pub timeout_secs: u64,
}

fn default_index_name() -> String {
    "articles".to_string()
}

fn default_index_timeout() -> u64 {
    30
}

impl IndexConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            index: default_index_name(),
            auth: IndexAuth::default(),
            tls: TlsConfig::default(),
            timeout_secs: default_index_timeout(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IndexAuth {
    #[default]
    None,
    Basic {
        username: String,
        password: String,
    },
    ApiKey {
        key: String,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TlsConfig {
    #[serde(default)]
    pub insecure_skip_verify: bool,
    /// PEM bundle added to the trusted roots.
    #[serde(default)]
    pub ca_cert_path: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// OrchestratorConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Upper bound on concurrently running units. Unset means one unit per
    /// target, all at once.
    #[serde(default)]
    pub max_parallel: Option<usize>,
    #[serde(default)]
    pub invocation_timeout_secs: Option<u64>,
}

// ---------------------------------------------------------------------------
// CrawlConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_user_agent() -> String {
    format!("crawler/{}", env!("CARGO_PKG_VERSION"))
}

fn default_request_timeout() -> u64 {
    20
}

fn default_max_body_bytes() -> usize {
    512 * 1024
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub registry_path: PathBuf,
    pub index: IndexConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub crawl: CrawlConfig,
}

impl Config {
    pub fn new(registry_path: impl Into<PathBuf>, endpoint: impl Into<String>) -> Self {
        Self {
            registry_path: registry_path.into(),
            index: IndexConfig::new(endpoint),
            orchestrator: OrchestratorConfig::default(),
            crawl: CrawlConfig::default(),
        }
    }

    /// Load from a YAML file and apply environment overrides.
    ///
    /// A relative `registry_path` in the file is resolved against the config
    /// file's directory. `CRAWLER_REGISTRY_PATH` is taken as given, like the
    /// `--registry` flag.
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    fn load_with(path: &Path, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if !path.exists() {
            return Err(CrawlError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        let data = std::fs::read_to_string(path)?;
        let mut cfg: Config = serde_yaml::from_str(&data)?;
        if cfg.registry_path.is_relative() {
            if let Some(dir) = path.parent() {
                cfg.registry_path = dir.join(&cfg.registry_path);
            }
        }
        cfg.apply_overrides(lookup);
        Ok(cfg)
    }

    /// Override file values from the environment. `lookup` is injectable so
    /// tests do not have to mutate the process environment.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(p) = lookup("CRAWLER_REGISTRY_PATH") {
            self.registry_path = PathBuf::from(p);
        }
        if let Some(e) = lookup("INDEX_ENDPOINT") {
            self.index.endpoint = e;
        }
        match (lookup("INDEX_USERNAME"), lookup("INDEX_PASSWORD")) {
            (Some(username), Some(password)) => {
                self.index.auth = IndexAuth::Basic { username, password };
            }
            (Some(username), None) => {
                let password = match &self.index.auth {
                    IndexAuth::Basic { password, .. } => password.clone(),
                    _ => String::new(),
                };
                self.index.auth = IndexAuth::Basic { username, password };
            }
            _ => {}
        }
    }

    pub fn invocation_timeout(&self) -> Option<Duration> {
        self.orchestrator
            .invocation_timeout_secs
            .map(Duration::from_secs)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        let endpoint = self.index.endpoint.trim();
        if endpoint.is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "index.endpoint is empty".to_string(),
            });
        } else if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!("index.endpoint '{endpoint}' must start with http:// or https://"),
            });
        }

        if self.index.index.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "index.index is empty".to_string(),
            });
        }

        if self.index.tls.insecure_skip_verify {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "index.tls.insecure_skip_verify is enabled; certificates are not checked"
                    .to_string(),
            });
        }

        if let Some(ca) = &self.index.tls.ca_cert_path {
            if !ca.exists() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("index.tls.ca_cert_path {} does not exist", ca.display()),
                });
            }
        }

        if self.orchestrator.max_parallel == Some(0) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "orchestrator.max_parallel must be at least 1".to_string(),
            });
        }

        if self.orchestrator.invocation_timeout_secs == Some(0) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "orchestrator.invocation_timeout_secs=0 cancels every unit immediately"
                    .to_string(),
            });
        }

        if self.crawl.max_body_bytes == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "crawl.max_body_bytes=0 indexes empty bodies".to_string(),
            });
        }

        warnings
    }
}
