//! Request client for the wiki API
//!
//! One logical API call is a slot-gated network fetch with a single
//! automatic retry, JSON decoding, and recursive continuation: as long as
//! the server returns a `query-continue` token, the call is re-issued with
//! the token's parameters folded in and each page's data section merged
//! into the accumulator.

use crate::api::{merge_values, ApiError, ConnectionGovernor, Endpoint};
use reqwest::Client;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Query parameters of one logical call. Ordered, so serialized request
/// URLs are deterministic.
pub type Params = BTreeMap<String, String>;

/// One batched block of page identifiers
#[derive(Debug, Clone)]
pub enum Batch {
    Titles(Vec<String>),
    RevisionIds(Vec<u64>),
}

impl Batch {
    /// Packs the identifiers into the request, joined by the API's fixed
    /// delimiter.
    fn apply(&self, params: &mut Params) {
        match self {
            Batch::Titles(titles) => {
                params.insert("titles".into(), titles.join("|"));
            }
            Batch::RevisionIds(ids) => {
                let joined = ids
                    .iter()
                    .map(|id| id.to_string())
                    .collect::<Vec<_>>()
                    .join("|");
                params.insert("revids".into(), joined);
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Batch::Titles(titles) => titles.len(),
            Batch::RevisionIds(ids) => ids.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Issues logical API calls against one endpoint
pub struct ApiClient {
    http: Client,
    endpoint: Endpoint,
    governor: Arc<ConnectionGovernor>,
}

impl ApiClient {
    pub fn new(
        endpoint: Endpoint,
        governor: Arc<ConnectionGovernor>,
    ) -> Result<Self, reqwest::Error> {
        let user_agent = format!(
            "{}/{}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        );
        let http = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            http,
            endpoint,
            governor,
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn governor(&self) -> &Arc<ConnectionGovernor> {
        &self.governor
    }

    /// One logical API call: drains every continuation and returns the
    /// merged data section.
    pub async fn call(&self, params: Params) -> Result<Value, ApiError> {
        let mut params = params;
        params.insert("format".into(), "json".into());

        let mut merged = Value::Object(Map::new());
        loop {
            let payload = self.fetch_json(&params).await?;
            let Value::Object(mut payload) = payload else {
                return Err(ApiError::Decode {
                    url: self.endpoint.base_url.to_string(),
                    message: "expected a JSON object payload".into(),
                });
            };

            // An application-level error replaces the data section and is
            // never retried.
            if let Some(error) = payload.get("error") {
                let code = error
                    .get("code")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string();
                let info = error
                    .get("info")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                return Err(ApiError::Remote { code, info });
            }

            if let Some(data) = payload.remove("query") {
                merge_values(&mut merged, data)?;
            }

            match payload.remove("query-continue") {
                Some(Value::Object(sections)) => {
                    // One token may carry several key/value pairs spread
                    // over sections; all of them feed the next request.
                    for (_, section) in sections {
                        if let Value::Object(pairs) = section {
                            for (key, value) in pairs {
                                params.insert(key, scalar_param(&value));
                            }
                        }
                    }
                }
                _ => break,
            }
        }

        Ok(merged)
    }

    /// Site metadata: general info, namespaces, aliases, magic words and
    /// the interwiki map.
    pub async fn get_siteinfo(&self) -> Result<Value, ApiError> {
        let mut params = Params::new();
        params.insert("action".into(), "query".into());
        params.insert("meta".into(), "siteinfo".into());
        params.insert(
            "siprop".into(),
            "general|namespaces|namespacealiases|magicwords|interwikimap".into(),
        );
        self.call(params).await
    }

    /// Discovery call: which revisions, templates and images a block of
    /// pages references.
    pub async fn fetch_used(&self, batch: &Batch) -> Result<Value, ApiError> {
        let mut params = Params::new();
        params.insert("action".into(), "query".into());
        params.insert("prop".into(), "revisions|templates|images".into());
        params.insert("rvprop".into(), "ids".into());
        params.insert("redirects".into(), "1".into());
        params.insert("imlimit".into(), self.endpoint.result_limit.to_string());
        params.insert("tllimit".into(), self.endpoint.result_limit.to_string());
        batch.apply(&mut params);
        self.call(params).await
    }

    /// Full page content for a block of titles or revision ids.
    pub async fn fetch_pages(&self, batch: &Batch) -> Result<Value, ApiError> {
        let mut params = Params::new();
        params.insert("action".into(), "query".into());
        params.insert("prop".into(), "revisions".into());
        params.insert("rvprop".into(), "ids|content".into());
        params.insert("redirects".into(), "1".into());
        batch.apply(&mut params);
        self.call(params).await
    }

    /// Resolves image titles to their download URLs.
    pub async fn fetch_imageinfo(&self, titles: &[String]) -> Result<Value, ApiError> {
        let mut params = Params::new();
        params.insert("action".into(), "query".into());
        params.insert("prop".into(), "imageinfo".into());
        params.insert("iiprop".into(), "url".into());
        params.insert("iiurlwidth".into(), "800".into());
        params.insert("titles".into(), titles.join("|"));
        self.call(params).await
    }

    /// Edit history of one title, walking older revisions from the given
    /// starting revision.
    pub async fn get_edits(&self, title: &str, revision: Option<u64>) -> Result<Value, ApiError> {
        let mut params = Params::new();
        params.insert("action".into(), "query".into());
        params.insert("titles".into(), title.to_string());
        params.insert("redirects".into(), "1".into());
        params.insert("prop".into(), "revisions".into());
        params.insert("rvprop".into(), "ids|user|flags|comment|size".into());
        params.insert("rvlimit".into(), self.endpoint.result_limit.to_string());
        params.insert("rvdir".into(), "older".into());
        if let Some(revision) = revision {
            params.insert("rvstartid".into(), revision.to_string());
        }
        self.call(params).await
    }

    /// Downloads raw bytes, used for image files. Runs under the same
    /// connection cap and retry policy as API calls.
    pub async fn download(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        let _slot = self.governor.acquire().await;
        match self.try_download(url).await {
            Ok(bytes) => Ok(bytes),
            Err(first) => {
                tracing::warn!(url, error = %first, "transient download failure, retrying");
                self.try_download(url)
                    .await
                    .map_err(|second| ApiError::Transport {
                        url: url.to_string(),
                        source: second,
                    })
            }
        }
    }

    async fn try_download(&self, url: &str) -> Result<Vec<u8>, reqwest::Error> {
        let response = self.http.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }

    /// One slot-gated network fetch, decoded as JSON.
    async fn fetch_json(&self, params: &Params) -> Result<Value, ApiError> {
        let _slot = self.governor.acquire().await;
        let body = self.fetch_with_retry(params).await?;
        serde_json::from_str(&body).map_err(|e| ApiError::Decode {
            url: self.endpoint.base_url.to_string(),
            message: e.to_string(),
        })
    }

    /// One network fetch with exactly one automatic retry on transport
    /// failure. A second consecutive failure is terminal for this call.
    async fn fetch_with_retry(&self, params: &Params) -> Result<String, ApiError> {
        match self.try_fetch(params).await {
            Ok(body) => Ok(body),
            Err(first) => {
                tracing::warn!(
                    url = %self.endpoint.base_url,
                    error = %first,
                    "transient fetch failure, retrying"
                );
                self.try_fetch(params)
                    .await
                    .map_err(|second| ApiError::Transport {
                        url: self.endpoint.base_url.to_string(),
                        source: second,
                    })
            }
        }
    }

    async fn try_fetch(&self, params: &Params) -> Result<String, reqwest::Error> {
        let response = self
            .http
            .get(self.endpoint.base_url.clone())
            .query(params)
            .send()
            .await?
            .error_for_status()?;
        response.text().await
    }
}

/// Continuation values arrive as strings or numbers; both become plain
/// parameter strings.
fn scalar_param(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
