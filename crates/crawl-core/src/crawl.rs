//! The single-target crawl algorithm.
//!
//! [`CrawlUnit`] is the seam the orchestrator drives: one call per target per
//! pass, with exclusive `&mut` access to that target. [`HttpCrawler`] is the
//! unit the `crawler` binary ships with: a conditional GET of the target URL
//! whose response is indexed as one document.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{CONTENT_TYPE, ETAG, IF_NONE_MATCH, USER_AGENT};
use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;

use crate::config::CrawlConfig;
use crate::context::InvocationContext;
use crate::error::{CrawlError, UnitError};
use crate::index::{is_transient, IndexClient};
use crate::registry::Target;

/// One crawl unit. Implementations must record whatever visibility they want
/// for failures into `target`; the returned error is only reported, never
/// propagated to the invocation.
#[async_trait]
pub trait CrawlUnit: Send + Sync + 'static {
    /// Handle to the shared downstream backend.
    type Client: Send + Sync + 'static;

    async fn run(
        &self,
        ctx: &InvocationContext,
        target: &mut Target,
        client: &Self::Client,
    ) -> Result<(), UnitError>;
}

// ---------------------------------------------------------------------------
// HttpCrawler
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct CrawledDocument<'a> {
    target: &'a str,
    url: &'a str,
    fetched_at: DateTime<Utc>,
    status: u16,
    content_type: Option<String>,
    body: String,
    truncated: bool,
}

#[derive(Debug, PartialEq)]
enum Fetched {
    Unchanged,
    Indexed { status: u16, etag: Option<String> },
}

#[derive(Debug, Clone)]
pub struct HttpCrawler {
    http: reqwest::Client,
    user_agent: String,
    max_body_bytes: usize,
}

impl HttpCrawler {
    pub fn new(config: &CrawlConfig) -> Result<Self, CrawlError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| CrawlError::Startup(format!("failed to build crawl client: {e}")))?;
        Ok(Self {
            http,
            user_agent: config.user_agent.clone(),
            max_body_bytes: config.max_body_bytes,
        })
    }

    async fn fetch_and_index(
        &self,
        target: &Target,
        client: &IndexClient,
        fetched_at: DateTime<Utc>,
    ) -> Result<Fetched, UnitError> {
        let mut req = self
            .http
            .get(&target.url)
            .header(USER_AGENT, &self.user_agent);
        if let Some(cursor) = &target.cursor {
            req = req.header(IF_NONE_MATCH, cursor);
        }
        let mut resp = req
            .send()
            .await
            .map_err(|e| UnitError::Fetch(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::NOT_MODIFIED {
            return Ok(Fetched::Unchanged);
        }
        if !status.is_success() {
            return Err(UnitError::Status(status.as_u16()));
        }

        let etag = header_string(&resp, ETAG);
        let content_type = header_string(&resp, CONTENT_TYPE);

        let mut body = Vec::new();
        let mut truncated = false;
        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| UnitError::Fetch(e.to_string()))?
        {
            let room = self.max_body_bytes.saturating_sub(body.len());
            if chunk.len() > room {
                body.extend_from_slice(&chunk[..room]);
                truncated = true;
                break;
            }
            body.extend_from_slice(&chunk);
        }
        if truncated {
            trim_partial_char(&mut body);
        }

        let doc = CrawledDocument {
            target: &target.name,
            url: &target.url,
            fetched_at,
            status: status.as_u16(),
            content_type,
            body: String::from_utf8_lossy(&body).into_owned(),
            truncated,
        };
        let id = format!("{}-{}", target.name, fetched_at.timestamp_millis());
        client.index_document(client.index(), &id, &doc).await?;

        Ok(Fetched::Indexed {
            status: status.as_u16(),
            etag,
        })
    }
}

/// Drop a UTF-8 sequence the byte cap cut in half.
fn trim_partial_char(body: &mut Vec<u8>) {
    let tail_start = body.len().saturating_sub(3);
    let Some(lead) = (tail_start..body.len())
        .rev()
        .find(|&i| body[i] & 0xC0 != 0x80)
    else {
        return;
    };
    if let Err(e) = std::str::from_utf8(&body[lead..]) {
        if e.error_len().is_none() {
            body.truncate(lead);
        }
    }
}

fn header_string(resp: &reqwest::Response, name: reqwest::header::HeaderName) -> Option<String> {
    resp.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[async_trait]
impl CrawlUnit for HttpCrawler {
    type Client = IndexClient;

    async fn run(
        &self,
        ctx: &InvocationContext,
        target: &mut Target,
        client: &IndexClient,
    ) -> Result<(), UnitError> {
        let now = Utc::now();
        let outcome = tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(UnitError::Cancelled),
            r = self.fetch_and_index(target, client, now) => r,
        };

        match outcome {
            Ok(Fetched::Unchanged) => {
                tracing::debug!(target_name = %target.name, "not modified");
                target.record_success(now, "304");
                Ok(())
            }
            Ok(Fetched::Indexed { status, etag }) => {
                if etag.is_some() {
                    target.cursor = etag;
                }
                target.documents_indexed += 1;
                target.record_success(now, status.to_string());
                Ok(())
            }
            Err(e) => {
                let note = match &e {
                    UnitError::Index(crate::error::IndexError::Status { status, .. })
                        if is_transient(*status) =>
                    {
                        format!("{e} (transient)")
                    }
                    _ => e.to_string(),
                };
                target.record_failure(now, note);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexConfig;
    use mockito::Matcher;

    fn crawler(max_body_bytes: usize) -> HttpCrawler {
        HttpCrawler::new(&CrawlConfig {
            max_body_bytes,
            ..CrawlConfig::default()
        })
        .unwrap()
    }

    fn index_client(server: &mockito::ServerGuard) -> IndexClient {
        IndexClient::new(&IndexConfig::new(server.url())).unwrap()
    }

    #[tokio::test]
    async fn fresh_content_is_indexed_and_cursor_advances() {
        let mut site = mockito::Server::new_async().await;
        let mut index = mockito::Server::new_async().await;
        let _page = site
            .mock("GET", "/feed.xml")
            .with_status(200)
            .with_header("etag", "\"v2\"")
            .with_header("content-type", "application/rss+xml")
            .with_body("<rss>hello</rss>")
            .create_async()
            .await;
        let put = index
            .mock("PUT", Matcher::Regex(r"^/articles/_doc/blog-\d+$".into()))
            .match_body(Matcher::PartialJson(serde_json::json!({
                "target": "blog",
                "status": 200,
                "body": "<rss>hello</rss>",
                "truncated": false
            })))
            .with_status(201)
            .create_async()
            .await;

        let mut target = Target::new("blog", format!("{}/feed.xml", site.url()));
        crawler(1024)
            .run(&InvocationContext::new(), &mut target, &index_client(&index))
            .await
            .unwrap();

        put.assert_async().await;
        assert_eq!(target.cursor.as_deref(), Some("\"v2\""));
        assert_eq!(target.documents_indexed, 1);
        assert_eq!(target.last_status.as_deref(), Some("200"));
        assert!(target.last_error.is_none());
        assert!(target.last_success_at.is_some());
    }

    #[tokio::test]
    async fn not_modified_skips_indexing() {
        let mut site = mockito::Server::new_async().await;
        let mut index = mockito::Server::new_async().await;
        let _page = site
            .mock("GET", "/feed.xml")
            .match_header("if-none-match", "\"v1\"")
            .with_status(304)
            .create_async()
            .await;
        let put = index
            .mock("PUT", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let mut target = Target::new("blog", format!("{}/feed.xml", site.url()));
        target.cursor = Some("\"v1\"".into());
        crawler(1024)
            .run(&InvocationContext::new(), &mut target, &index_client(&index))
            .await
            .unwrap();

        put.assert_async().await;
        assert_eq!(target.cursor.as_deref(), Some("\"v1\""));
        assert_eq!(target.documents_indexed, 0);
        assert_eq!(target.last_status.as_deref(), Some("304"));
    }

    #[tokio::test]
    async fn error_status_is_recorded_on_target() {
        let mut site = mockito::Server::new_async().await;
        let index = mockito::Server::new_async().await;
        let _page = site
            .mock("GET", "/gone")
            .with_status(404)
            .create_async()
            .await;

        let mut target = Target::new("blog", format!("{}/gone", site.url()));
        let err = crawler(1024)
            .run(&InvocationContext::new(), &mut target, &index_client(&index))
            .await
            .unwrap_err();

        assert!(matches!(err, UnitError::Status(404)));
        assert_eq!(target.consecutive_failures, 1);
        assert_eq!(target.last_status.as_deref(), Some("failed"));
        assert!(target.last_error.as_deref().unwrap().contains("404"));
    }

    #[tokio::test]
    async fn index_failure_is_recorded_as_transient() {
        let mut site = mockito::Server::new_async().await;
        let mut index = mockito::Server::new_async().await;
        let _page = site
            .mock("GET", "/feed.xml")
            .with_status(200)
            .with_body("x")
            .create_async()
            .await;
        let _put = index
            .mock("PUT", Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let mut target = Target::new("blog", format!("{}/feed.xml", site.url()));
        let err = crawler(1024)
            .run(&InvocationContext::new(), &mut target, &index_client(&index))
            .await
            .unwrap_err();

        assert!(matches!(err, UnitError::Index(_)));
        assert!(target.last_error.as_deref().unwrap().contains("transient"));
        assert!(target.cursor.is_none());
    }

    #[tokio::test]
    async fn body_is_truncated_to_limit() {
        let mut site = mockito::Server::new_async().await;
        let mut index = mockito::Server::new_async().await;
        let _page = site
            .mock("GET", "/big")
            .with_status(200)
            .with_body("abcdefghij")
            .create_async()
            .await;
        let put = index
            .mock("PUT", Matcher::Any)
            .match_body(Matcher::PartialJson(
                serde_json::json!({"body": "abcd", "truncated": true}),
            ))
            .with_status(201)
            .create_async()
            .await;

        let mut target = Target::new("big", format!("{}/big", site.url()));
        crawler(4)
            .run(&InvocationContext::new(), &mut target, &index_client(&index))
            .await
            .unwrap();
        put.assert_async().await;
    }

    #[tokio::test]
    async fn truncation_keeps_whole_characters() {
        let mut site = mockito::Server::new_async().await;
        let mut index = mockito::Server::new_async().await;
        let _page = site
            .mock("GET", "/ko")
            .with_status(200)
            .with_body("한글")
            .create_async()
            .await;
        let put = index
            .mock("PUT", Matcher::Any)
            .match_body(Matcher::PartialJson(
                serde_json::json!({"body": "한", "truncated": true}),
            ))
            .with_status(201)
            .create_async()
            .await;

        let mut target = Target::new("ko", format!("{}/ko", site.url()));
        crawler(4)
            .run(&InvocationContext::new(), &mut target, &index_client(&index))
            .await
            .unwrap();
        put.assert_async().await;
    }

    #[test]
    fn trim_partial_char_only_touches_a_cut_tail() {
        let mut cut = "한글".as_bytes()[..4].to_vec();
        trim_partial_char(&mut cut);
        assert_eq!(cut, "한".as_bytes());

        let mut whole = "ab한".as_bytes().to_vec();
        trim_partial_char(&mut whole);
        assert_eq!(whole, "ab한".as_bytes());

        let mut ascii = b"abcd".to_vec();
        trim_partial_char(&mut ascii);
        assert_eq!(ascii, b"abcd");
    }

    #[tokio::test]
    async fn cancelled_context_aborts_the_unit() {
        let index = mockito::Server::new_async().await;
        let ctx = InvocationContext::new();
        ctx.cancel();

        // Unroutable address: the fetch would hang without cancellation.
        let mut target = Target::new("slow", "http://10.255.255.1/feed.xml");
        let err = crawler(1024)
            .run(&ctx, &mut target, &index_client(&index))
            .await
            .unwrap_err();

        assert!(matches!(err, UnitError::Cancelled));
        assert_eq!(target.last_error.as_deref(), Some("cancelled"));
    }
}
