//! Rate-limited request execution
//!
//! Every request goes through `Executor::execute`, which sleeps for the
//! configured interval first, attaches the bearer token when there is one,
//! and folds reqwest errors and non-2xx statuses into `Error`. There are no
//! retries at this layer.

use std::time::Duration;

use common::Secret;
use reqwest::Method;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::constants::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_RATE_LIMIT, DEFAULT_REQUEST_TIMEOUT, USER_AGENT,
};
use crate::error::{Error, Result};

/// Longest slice of an error body kept in `Error::Http`
const MAX_ERROR_BODY: usize = 512;

/// Timing knobs for the executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Delay applied before every request, not only after failures
    pub rate_limit: Duration,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            rate_limit: DEFAULT_RATE_LIMIT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Shared HTTP executor. Cloning is cheap; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct Executor {
    client: reqwest::Client,
    rate_limit: Duration,
}

impl Executor {
    pub fn new(config: &ExecutorConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::ClientBuild(e.to_string()))?;
        Ok(Self {
            client,
            rate_limit: config.rate_limit,
        })
    }

    /// Send one request and return the successful response.
    ///
    /// `url` is the full endpoint URL without query string; it is also the
    /// endpoint name reported in errors.
    pub async fn execute(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, String)],
        body: Option<&serde_json::Value>,
        token: Option<&Secret<String>>,
    ) -> Result<reqwest::Response> {
        if !self.rate_limit.is_zero() {
            tokio::time::sleep(self.rate_limit).await;
        }

        let mut request = self.client.request(method.clone(), url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        if let Some(token) = token {
            request = request.bearer_auth(token.expose());
        }

        debug!(%method, endpoint = url, authenticated = token.is_some(), "sending request");

        let response = request.send().await.map_err(|e| Error::Transport {
            endpoint: url.to_owned(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            if body.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY)
                    .rev()
                    .find(|i| body.is_char_boundary(*i))
                    .unwrap_or(0);
                body.truncate(cut);
            }
            return Err(Error::Http {
                endpoint: url.to_owned(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    /// `execute` followed by JSON decoding of the body.
    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, String)],
        body: Option<&serde_json::Value>,
        token: Option<&Secret<String>>,
    ) -> Result<T> {
        let response = self.execute(method, url, query, body, token).await?;
        response.json::<T>().await.map_err(|e| Error::Decode {
            endpoint: url.to_owned(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use tokio::net::TcpListener;

    fn fast_config() -> ExecutorConfig {
        ExecutorConfig {
            rate_limit: Duration::ZERO,
            connect_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(5),
        }
    }

    /// Mock server recording the Authorization header of each request.
    async fn start_server(seen_auth: Arc<Mutex<Vec<Option<String>>>>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let app = axum::Router::new()
            .route(
                "/ok",
                get(move |headers: HeaderMap| {
                    let seen_auth = seen_auth.clone();
                    async move {
                        let auth = headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_owned);
                        seen_auth.lock().unwrap().push(auth);
                        axum::Json(serde_json::json!({"value": 7}))
                    }
                }),
            )
            .route(
                "/denied",
                post(|| async { (StatusCode::BAD_REQUEST, "incorrect_login") }),
            )
            .route("/garbage", get(|| async { "not json" }));

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn bearer_header_only_when_token_present() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let base = start_server(seen.clone()).await;
        let executor = Executor::new(&fast_config()).unwrap();
        let token = Secret::new(String::from("jwt-abc"));

        executor
            .execute(Method::GET, &format!("{base}/ok"), &[], None, None)
            .await
            .unwrap();
        executor
            .execute(Method::GET, &format!("{base}/ok"), &[], None, Some(&token))
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0], None);
        assert_eq!(seen[1].as_deref(), Some("Bearer jwt-abc"));
    }

    #[tokio::test]
    async fn non_success_status_becomes_http_error() {
        let base = start_server(Arc::default()).await;
        let executor = Executor::new(&fast_config()).unwrap();
        let url = format!("{base}/denied");

        let err = executor
            .execute(Method::POST, &url, &[], Some(&serde_json::json!({})), None)
            .await
            .unwrap_err();

        match err {
            Error::Http {
                endpoint,
                status,
                body,
            } => {
                assert_eq!(endpoint, url);
                assert_eq!(status, 400);
                assert_eq!(body, "incorrect_login");
            }
            other => panic!("expected Http error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn connection_refused_becomes_transport_error() {
        let executor = Executor::new(&fast_config()).unwrap();
        let err = executor
            .execute(Method::GET, "http://127.0.0.1:1/api", &[], None, None)
            .await
            .unwrap_err();
        assert!(
            matches!(err, Error::Transport { .. }),
            "expected Transport error, got {err:?}"
        );
    }

    #[tokio::test]
    async fn undecodable_body_becomes_decode_error() {
        let base = start_server(Arc::default()).await;
        let executor = Executor::new(&fast_config()).unwrap();
        let result: Result<serde_json::Value> = executor
            .execute_json(Method::GET, &format!("{base}/garbage"), &[], None, None)
            .await;
        assert!(matches!(result, Err(Error::Decode { .. })));
    }

    #[tokio::test]
    async fn delay_applies_before_every_request() {
        let base = start_server(Arc::default()).await;
        let executor = Executor::new(&ExecutorConfig {
            rate_limit: Duration::from_millis(50),
            ..fast_config()
        })
        .unwrap();

        let started = Instant::now();
        for _ in 0..3 {
            executor
                .execute(Method::GET, &format!("{base}/ok"), &[], None, None)
                .await
                .unwrap();
        }
        assert!(
            started.elapsed() >= Duration::from_millis(150),
            "three requests must wait at least three intervals, took {:?}",
            started.elapsed()
        );
    }
}
