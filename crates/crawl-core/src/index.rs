//! Shared handle to the search/index backend.
//!
//! One [`IndexClient`] is built at process start and shared as
//! `Arc<IndexClient>` by every invocation and every crawl unit. The
//! underlying `reqwest::Client` pools connections and is safe for concurrent
//! use, so units never need to clone or rebuild it.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Certificate, Client, StatusCode};
use serde::Serialize;

use crate::config::{IndexAuth, IndexConfig};
use crate::error::IndexError;

#[derive(Debug)]
pub struct IndexClient {
    http: Client,
    endpoint: String,
    index: String,
    auth: IndexAuth,
}

impl IndexClient {
    /// Build the client from config. Failure here is a startup error.
    pub fn new(config: &IndexConfig) -> Result<Self, IndexError> {
        let endpoint = config.endpoint.trim().trim_end_matches('/').to_string();
        if endpoint.is_empty() {
            return Err(IndexError::Build("endpoint is empty".into()));
        }
        let url = reqwest::Url::parse(&endpoint)
            .map_err(|e| IndexError::Build(format!("invalid endpoint '{endpoint}': {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(IndexError::Build(format!(
                "endpoint '{endpoint}' must use http or https"
            )));
        }

        let mut builder = Client::builder()
            .timeout(config.timeout())
            .danger_accept_invalid_certs(config.tls.insecure_skip_verify);

        if let Some(path) = &config.tls.ca_cert_path {
            let pem = std::fs::read(path)
                .map_err(|e| IndexError::Tls(format!("reading {}: {e}", path.display())))?;
            let cert = Certificate::from_pem(&pem)
                .map_err(|e| IndexError::Tls(format!("parsing {}: {e}", path.display())))?;
            builder = builder.add_root_certificate(cert);
        }

        if let IndexAuth::ApiKey { key } = &config.auth {
            let mut headers = HeaderMap::new();
            let mut value = HeaderValue::from_str(&format!("ApiKey {key}"))
                .map_err(|e| IndexError::Build(format!("invalid api key: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
            builder = builder.default_headers(headers);
        }

        let http = builder
            .build()
            .map_err(|e| IndexError::Build(e.to_string()))?;

        Ok(Self {
            http,
            endpoint,
            index: config.index.clone(),
            auth: config.auth.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The default index crawl units write into.
    pub fn index(&self) -> &str {
        &self.index
    }

    fn with_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            IndexAuth::Basic { username, password } => req.basic_auth(username, Some(password)),
            // ApiKey travels as a default header.
            IndexAuth::ApiKey { .. } | IndexAuth::None => req,
        }
    }

    /// Create or replace the document `id` in `index`.
    pub async fn index_document<T: Serialize + ?Sized>(
        &self,
        index: &str,
        id: &str,
        doc: &T,
    ) -> Result<(), IndexError> {
        let url = format!("{}/{}/_doc/{}", self.endpoint, index, urlencoding::encode(id));
        let resp = self.with_auth(self.http.put(&url)).json(doc).send().await?;
        check_status(resp).await
    }

    /// Cheap liveness check against the cluster root.
    pub async fn ping(&self) -> Result<(), IndexError> {
        let url = format!("{}/", self.endpoint);
        let resp = self.with_auth(self.http.get(&url)).send().await?;
        check_status(resp).await
    }
}

async fn check_status(resp: reqwest::Response) -> Result<(), IndexError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    let body = resp.text().await.unwrap_or_default();
    Err(IndexError::Status {
        status: status.as_u16(),
        body: truncate(&body, 512),
    })
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &s[..end])
}

/// Whether a status from the index is worth retrying on the next invocation.
pub fn is_transient(status: u16) -> bool {
    StatusCode::from_u16(status)
        .map(|s| s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS)
        .unwrap_or(false)
}
