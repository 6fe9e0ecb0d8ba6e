// Store client transport mechanics
//
// Every HTTP exchange with the controller goes through here: base URL
// construction, the read cache, the optional retry loop and mapping of
// non-success statuses into the REST error taxonomy.

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use crate::cache::{CachedBody, UrlCache};
use crate::error::{Error, RestErrorInfo};
use crate::transport::{RetryPolicy, TransportConfig};

/// HTTP client for one controller's REST API.
///
/// The controller address may change during a session (`controller
/// <server:port>`), so it sits behind a lock like the cache does.
#[derive(Debug)]
pub struct StoreClient {
    http: reqwest::Client,
    controller: RwLock<Option<String>>,
    cache: UrlCache,
    retry: RetryPolicy,
    timeout: Duration,
}

impl StoreClient {
    /// Create a store client from a `TransportConfig`.
    ///
    /// `controller` is `host:port`, optionally with an `http://` or
    /// `https://` scheme. `None` defers the failure to the first request.
    pub fn new(controller: Option<String>, transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: transport.http_client()?,
            controller: RwLock::new(controller),
            cache: transport.url_cache(),
            retry: transport.retry,
            timeout: transport.timeout,
        })
    }

    /// Create a store client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, controller: Option<String>) -> Self {
        Self {
            http,
            controller: RwLock::new(controller),
            cache: UrlCache::default(),
            retry: RetryPolicy::NONE,
            timeout: TransportConfig::default().timeout,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn cache(&self) -> &UrlCache {
        &self.cache
    }

    pub fn set_controller(&self, controller: Option<String>) {
        *self
            .controller
            .write()
            .unwrap_or_else(PoisonError::into_inner) = controller;
        self.cache.clear();
    }

    /// The configured controller address, without scheme.
    pub fn controller(&self) -> Result<String, Error> {
        let guard = self.controller.read().unwrap_or_else(PoisonError::into_inner);
        match guard.as_deref() {
            Some(c) if !c.is_empty() => Ok(c
                .trim_start_matches("http://")
                .trim_start_matches("https://")
                .trim_end_matches('/')
                .to_owned()),
            _ => Err(Error::NoController),
        }
    }

    /// Controller name used in error messages; empty when unset.
    pub(crate) fn controller_label(&self) -> String {
        self.controller().unwrap_or_default()
    }

    // ── URL builders ─────────────────────────────────────────────────

    fn base_url(&self) -> Result<String, Error> {
        let guard = self.controller.read().unwrap_or_else(PoisonError::into_inner);
        match guard.as_deref() {
            Some(c) if c.starts_with("http://") || c.starts_with("https://") => {
                Ok(c.trim_end_matches('/').to_owned())
            }
            Some(c) if !c.is_empty() => Ok(format!("http://{}", c.trim_end_matches('/'))),
            _ => Err(Error::NoController),
        }
    }

    /// `http://<controller>/rest/v1/<path>`
    pub fn rest_url(&self, path: &str) -> Result<String, Error> {
        Ok(format!("{}/rest/v1/{path}", self.base_url()?))
    }

    /// `http://<controller>/rest/v1/model/<obj_type>/`
    pub fn model_url(&self, obj_type: &str) -> Result<String, Error> {
        self.rest_url(&format!("model/{obj_type}/"))
    }

    /// `http://<controller>/rest/v1/data/`
    pub fn user_data_url(&self) -> Result<String, Error> {
        self.rest_url("data/")
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// GET `url` as text, consulting the cache first when `use_cache`.
    pub async fn rest_simple_request(&self, url: &str, use_cache: bool) -> Result<String, Error> {
        if use_cache {
            if let Some(text) = self.cache.get_text(url) {
                return Ok(text);
            }
        }

        let mut retried = 0;
        let text = loop {
            match self.send(Method::GET, url, None, None).await {
                Err(e) if self.retry.allows(retried, &e) => {
                    retried += 1;
                    debug!("retrying GET {url} ({retried}/{}): {e}", self.retry.attempts);
                    tokio::time::sleep(self.retry.delay).await;
                }
                other => break other?,
            }
        };

        self.cache.save(url, CachedBody::Text(text.clone()));
        Ok(text)
    }

    /// GET `url` and parse the reply as JSON, through the cache.
    pub async fn rest_json_request(&self, url: &str) -> Result<Value, Error> {
        if let Some(value) = self.cache.get_json(url) {
            return Ok(value);
        }
        let text = self.rest_simple_request(url, true).await?;
        let value: Value = serde_json::from_str(&text).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: text.clone(),
        })?;
        self.cache.save(url, CachedBody::Json(value.clone()));
        Ok(value)
    }

    /// Send `body` as JSON with `method` (normally PUT or DELETE) and return
    /// the reply text. Never cached.
    pub async fn rest_post_request(
        &self,
        url: &str,
        body: &Value,
        method: Method,
    ) -> Result<String, Error> {
        self.send(method, url, Some(body), None).await
    }

    /// Send plain text with `method`.
    pub(crate) async fn send_text(&self, method: Method, url: &str, text: &str) -> Result<String, Error> {
        self.send(method, url, None, Some(text)).await
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        json: Option<&Value>,
        text: Option<&str>,
    ) -> Result<String, Error> {
        debug!("{} {}", method, url);

        let mut request = self.http.request(method, url);
        if let Some(body) = json {
            request = request.json(body);
        } else if let Some(text) = text {
            request = request
                .header(reqwest::header::CONTENT_TYPE, "text/plain")
                .body(text.to_owned());
        }

        let resp = request.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout {
                    timeout_secs: self.timeout.as_secs(),
                }
            } else {
                Error::Transport(e)
            }
        })?;

        let status = resp.status();
        let body = resp.text().await.map_err(Error::Transport)?;
        if status.is_success() {
            Ok(body)
        } else {
            debug!("{} reply: {}", status, preview(&body));
            Err(Error::Rest(RestErrorInfo::from_status(
                &self.controller_label(),
                status.as_u16(),
                &body,
                None,
            )))
        }
    }
}

fn preview(body: &str) -> &str {
    match body.char_indices().nth(200) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
