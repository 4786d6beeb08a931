use crate::response::{ApiResponse, InstantSample, RangeSeries};
use crate::PromError;
use reqwest::blocking::Client;
use reqwest::Url;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_RETRIES: u32 = 2;

/// Successful responses cached for the lifetime of one run. Identical
/// queries from different selectors and rules hit the cache instead of
/// the server; the mutex doubles as coalescing for parallel callers.
#[derive(Clone, Debug)]
enum CachedResult {
    Vector(Vec<InstantSample>),
    Matrix(Vec<RangeSeries>),
}

/// A single Prometheus server handle.
pub struct Prometheus {
    name: String,
    uri: String,
    uptime_metric: String,
    http: Client,
    timeout: Duration,
    max_retries: u32,
    cache: Mutex<HashMap<String, CachedResult>>,
}

impl Prometheus {
    pub fn new(name: impl Into<String>, uri: impl Into<String>) -> Self {
        let mut uri = uri.into();
        // Strip a trailing path slash, but leave scheme-only URIs intact
        // so they fail host validation with their original text.
        if uri.ends_with('/') && !uri.ends_with("://") {
            uri.truncate(uri.len() - 1);
        }
        Self {
            name: name.into(),
            uri,
            uptime_metric: "up".to_string(),
            http: Client::new(),
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_RETRIES,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_uptime_metric(mut self, metric: impl Into<String>) -> Self {
        self.uptime_metric = metric.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn uptime_metric(&self) -> &str {
        &self.uptime_metric
    }

    /// Instant query evaluated at the server's current time.
    pub fn query(&self, expr: &str) -> Result<Vec<InstantSample>, PromError> {
        let key = format!("query\u{0}{expr}");
        if let Some(CachedResult::Vector(hit)) = self.cache_get(&key) {
            return Ok(hit);
        }

        let form = vec![("query".to_string(), expr.to_string())];
        let resp = self.post("/api/v1/query", &form)?;
        let samples = resp.into_vector()?;
        self.cache_put(key, CachedResult::Vector(samples.clone()));
        Ok(samples)
    }

    /// Range query over `[start, end]` (unix seconds) at `step`.
    pub fn query_range(
        &self,
        expr: &str,
        start: i64,
        end: i64,
        step: Duration,
    ) -> Result<Vec<RangeSeries>, PromError> {
        let step_secs = step.as_secs().max(1);
        let key = format!("query_range\u{0}{expr}\u{0}{start}\u{0}{end}\u{0}{step_secs}");
        if let Some(CachedResult::Matrix(hit)) = self.cache_get(&key) {
            return Ok(hit);
        }

        let form = vec![
            ("query".to_string(), expr.to_string()),
            ("start".to_string(), start.to_string()),
            ("end".to_string(), end.to_string()),
            ("step".to_string(), step_secs.to_string()),
        ];
        let resp = self.post("/api/v1/query_range", &form)?;
        let series = resp.into_matrix()?;
        self.cache_put(key, CachedResult::Matrix(series.clone()));
        Ok(series)
    }

    fn cache_get(&self, key: &str) -> Option<CachedResult> {
        self.cache
            .lock()
            .ok()
            .and_then(|cache| cache.get(key).cloned())
    }

    fn cache_put(&self, key: String, value: CachedResult) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, value);
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, PromError> {
        let url = Url::parse(&format!("{}{}", self.uri, path))
            .map_err(|_| PromError::InvalidUri(self.uri.clone()))?;
        if url.host_str().is_none() {
            return Err(PromError::InvalidUri(self.uri.clone()));
        }
        Ok(url)
    }

    fn post(&self, path: &str, form: &[(String, String)]) -> Result<ApiResponse, PromError> {
        let url = self.endpoint(path)?;
        tracing::debug!(prometheus = %self.name, %url, query = %form[0].1, "sending query");

        let mut attempt = 0;
        let response = loop {
            let result = self
                .http
                .post(url.clone())
                .form(form)
                .timeout(self.timeout)
                .send();
            match result {
                Ok(r) => break r,
                Err(e) if attempt < self.max_retries && e.is_timeout() => {
                    attempt += 1;
                    tracing::warn!(
                        prometheus = %self.name,
                        attempt,
                        "query timed out, retrying"
                    );
                }
                Err(e) => return Err(PromError::Connection(e.to_string())),
            }
        };

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| PromError::Connection(e.to_string()))?;

        match serde_json::from_str::<ApiResponse>(&body) {
            Ok(api) if api.status == "error" => Err(api.into_error()),
            Ok(api) if status.is_success() => Ok(api),
            Ok(_) | Err(_) if status.is_server_error() => {
                Err(PromError::ServerError(status.as_u16()))
            }
            Ok(_) => Err(PromError::Decode(format!(
                "unexpected HTTP status {status}"
            ))),
            Err(e) => Err(PromError::Decode(e.to_string())),
        }
    }
}
