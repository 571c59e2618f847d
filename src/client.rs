use std::time::Duration;

use serde_json::Value;
use tokio::time::sleep;
use tracing::warn;

use crate::error::{ErrorKind, FATAL_GRAPH_ERROR_CODES, GraphError};

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const MAX_RETRIES: u32 = 6;
pub const BASE_BACKOFF: Duration = Duration::from_secs(2);
pub const MAX_BACKOFF: Duration = Duration::from_secs(120);
pub const THROTTLE: Duration = Duration::from_millis(250);

pub struct GraphClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
    max_retries: u32,
    base_backoff: Duration,
    max_backoff: Duration,
    throttle: Duration,
}

impl GraphClient {
    pub fn new(access_token: impl Into<String>) -> Result<Self, GraphError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| GraphError::Transport(err.without_url().to_string()))?;

        Ok(Self {
            http,
            base_url: crate::GRAPH_BASE_URL.to_string(),
            access_token: access_token.into(),
            max_retries: MAX_RETRIES,
            base_backoff: BASE_BACKOFF,
            max_backoff: MAX_BACKOFF,
            throttle: THROTTLE,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.base_backoff = base;
        self.max_backoff = max;
        self
    }

    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    pub async fn get(&self, path: &str, params: &[(String, String)]) -> Result<Value, GraphError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
        let mut query = params.to_vec();
        query.push(("access_token".to_string(), self.access_token.clone()));
        self.get_url(&url, &query).await
    }

    // Cursor URLs from `paging.next` already carry the access token, so no
    // extra query parameters are sent when following them.
    pub async fn collect(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<Vec<Value>, GraphError> {
        let mut records = Vec::new();
        let mut payload = self.get(path, params).await?;

        loop {
            if let Some(items) = payload.get("data").and_then(Value::as_array) {
                records.extend(items.iter().cloned());
            }

            let next = payload
                .pointer("/paging/next")
                .and_then(Value::as_str)
                .map(str::to_owned);

            match next {
                Some(url) => payload = self.get_url(&url, &[]).await?,
                None => break,
            }
        }

        Ok(records)
    }

    async fn get_url(&self, url: &str, params: &[(String, String)]) -> Result<Value, GraphError> {
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            match self.execute(url, params).await {
                Ok(payload) => {
                    if !self.throttle.is_zero() {
                        sleep(self.throttle).await;
                    }
                    return Ok(payload);
                }
                Err(err) => match err.kind() {
                    ErrorKind::Retryable if attempt < self.max_retries => {
                        let delay = self.backoff_delay(attempt);
                        warn!(
                            "request attempt {attempt}/{} failed ({err}); retrying in {:.2}s",
                            self.max_retries,
                            delay.as_secs_f64()
                        );
                        sleep(delay).await;
                    }
                    ErrorKind::Retryable => {
                        return Err(GraphError::RetriesExhausted {
                            attempts: attempt,
                            source: Box::new(err),
                        });
                    }
                    _ => return Err(err),
                },
            }
        }
    }

    async fn execute(&self, url: &str, params: &[(String, String)]) -> Result<Value, GraphError> {
        let response = self
            .http
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|err| GraphError::Transport(err.without_url().to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| GraphError::Transport(err.without_url().to_string()))?;

        let payload: Value =
            serde_json::from_str(&text).unwrap_or_else(|_| Value::Object(Default::default()));

        // The error envelope wins over the HTTP status.
        if let Some(err_obj) = payload.get("error") {
            let code = err_obj.get("code").and_then(Value::as_i64).unwrap_or(0);
            let mut message = err_obj
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Graph API returned an error")
                .to_string();
            if let Some(trace) = err_obj.get("fbtrace_id").and_then(Value::as_str) {
                message = format!("{message} (fbtrace_id {trace})");
            }

            if FATAL_GRAPH_ERROR_CODES.contains(&code) {
                return Err(GraphError::Fatal { code, message });
            }
            return Err(GraphError::Api { code, message });
        }

        if !status.is_success() {
            return Err(GraphError::Http {
                status: status.as_u16(),
            });
        }

        Ok(payload)
    }

    fn backoff_exp(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.base_backoff
            .saturating_mul(1u32 << shift)
            .min(self.max_backoff)
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = self.backoff_exp(attempt);
        let jitter = exp.mul_f64(rand::random::<f64>());
        (exp + jitter).min(self.max_backoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GraphClient {
        GraphClient::new("test-token").unwrap()
    }

    #[test]
    fn test_backoff_doubles_until_capped() {
        let client = client();
        assert_eq!(client.backoff_exp(1), Duration::from_secs(2));
        assert_eq!(client.backoff_exp(2), Duration::from_secs(4));
        assert_eq!(client.backoff_exp(3), Duration::from_secs(8));
        assert_eq!(client.backoff_exp(6), Duration::from_secs(64));
        assert_eq!(client.backoff_exp(7), Duration::from_secs(120));
        assert_eq!(client.backoff_exp(20), Duration::from_secs(120));
    }

    #[test]
    fn test_backoff_delay_is_jittered_and_bounded() {
        let client = client();
        for attempt in 1..=10 {
            let exp = client.backoff_exp(attempt);
            for _ in 0..50 {
                let delay = client.backoff_delay(attempt);
                assert!(delay >= exp, "delay below deterministic floor");
                assert!(delay <= MAX_BACKOFF, "delay exceeds maximum backoff");
            }
        }
    }

    #[test]
    fn test_backoff_floors_are_non_decreasing() {
        let client = client();
        let mut previous = Duration::ZERO;
        for attempt in 1..=10 {
            let exp = client.backoff_exp(attempt);
            assert!(exp >= previous);
            previous = exp;
        }
    }
}
