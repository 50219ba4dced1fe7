// This file is part of the terraform-provider-huaweicloud project
//
// Copyright (C) ANEO, 2024-2024. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License")
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, StatusCode, Url};
use serde_json::Value;
use time::OffsetDateTime;
use tracing::{debug, warn};

mod error;
mod signer;

pub use error::ClientError;
use signer::Signer;

const CONTENT_TYPE: &str = "application/json;charset=UTF-8";
/// Upper bound of the wait after a throttled request
const MAX_BACKOFF_MINUTES: u64 = 30;

/// Wait before retrying a throttled request: `2^retries` minutes, capped at 30
fn backoff(retries: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(retries).min(MAX_BACKOFF_MINUTES) * 60)
}

#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    AkSk {
        access_key: String,
        secret_key: String,
        security_token: Option<String>,
    },
    Token(String),
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::AkSk { access_key, .. } => f
                .debug_struct("AkSk")
                .field("access_key", access_key)
                .finish_non_exhaustive(),
            Credentials::Token(_) => f.write_str("Token(..)"),
        }
    }
}

/// REST client bound to one service endpoint and project
#[derive(Debug, Clone)]
pub struct ServiceClient {
    http: reqwest::Client,
    endpoint: String,
    project_id: Option<String>,
    credentials: Arc<Credentials>,
    max_retries: u32,
}

impl ServiceClient {
    pub fn new(
        http: reqwest::Client,
        endpoint: String,
        project_id: Option<String>,
        credentials: Arc<Credentials>,
        max_retries: u32,
    ) -> Self {
        let endpoint = if endpoint.ends_with('/') {
            endpoint
        } else {
            endpoint + "/"
        };
        Self {
            http,
            endpoint,
            project_id,
            credentials,
            max_retries,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    /// Absolute URL of `path`, with `{project_id}` substituted
    pub fn url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        let path = match &self.project_id {
            Some(project_id) => path.replace("{project_id}", project_id),
            None => path.to_owned(),
        };
        format!("{}{path}", self.endpoint)
    }

    pub async fn get(&self, path: &str) -> Result<Value, ClientError> {
        self.request(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, ClientError> {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> Result<Value, ClientError> {
        self.request(Method::PUT, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<Value, ClientError> {
        self.request(Method::DELETE, path, None).await
    }

    /// Issue a JSON request, backing off on 429 up to `max_retries` times
    ///
    /// An empty successful body is returned as `Value::Null`.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, ClientError> {
        let url = self.url(path);
        let parsed = Url::parse(&url).map_err(|_| ClientError::InvalidUrl(url.clone()))?;
        let payload = match body {
            Some(body) => body.to_string().into_bytes(),
            None => Vec::new(),
        };

        let mut retries = 0;
        loop {
            let mut headers = self.headers(&method, &parsed, &payload);
            let mut request = self.http.request(method.clone(), parsed.clone());
            for (name, value) in std::mem::take(&mut headers) {
                request = request.header(name, value);
            }
            if body.is_some() {
                request = request.body(payload.clone());
            }

            debug!(%method, %url, "sending request");
            let response = request
                .send()
                .await
                .map_err(|source| ClientError::Transport {
                    url: url.clone(),
                    source,
                })?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                if retries >= self.max_retries {
                    return Err(ClientError::TooManyRequests {
                        method: method.to_string(),
                        url,
                        retries,
                    });
                }
                let delay = backoff(retries);
                warn!(%method, %url, ?delay, "received 429 Too Many Requests, backing off");
                tokio::time::sleep(delay).await;
                retries += 1;
                continue;
            }

            let text = response
                .text()
                .await
                .map_err(|source| ClientError::Transport {
                    url: url.clone(),
                    source,
                })?;

            if status == StatusCode::NOT_FOUND {
                return Err(ClientError::NotFound {
                    method: method.to_string(),
                    url,
                    body: text,
                });
            }
            if !status.is_success() {
                return Err(ClientError::Status {
                    method: method.to_string(),
                    url,
                    status: status.as_u16(),
                    body: text,
                });
            }
            if text.trim().is_empty() {
                return Ok(Value::Null);
            }
            return serde_json::from_str(&text).map_err(|source| ClientError::Decode { url, source });
        }
    }

    fn headers(&self, method: &Method, url: &Url, payload: &[u8]) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::from([("content-type".to_owned(), CONTENT_TYPE.to_owned())]);
        if let Some(project_id) = &self.project_id {
            headers.insert("x-project-id".to_owned(), project_id.clone());
        }

        match self.credentials.as_ref() {
            Credentials::Token(token) => {
                headers.insert("x-auth-token".to_owned(), token.clone());
            }
            Credentials::AkSk {
                access_key,
                secret_key,
                security_token,
            } => {
                if let Some(security_token) = security_token {
                    headers.insert("x-security-token".to_owned(), security_token.clone());
                }
                Signer {
                    access_key,
                    secret_key,
                }
                .sign(
                    method.as_str(),
                    url,
                    &mut headers,
                    payload,
                    OffsetDateTime::now_utc(),
                );
            }
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, header, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn token_client(server: &MockServer, max_retries: u32) -> ServiceClient {
        ServiceClient::new(
            reqwest::Client::new(),
            server.uri(),
            Some("p1".to_owned()),
            Arc::new(Credentials::Token("secret-token".to_owned())),
            max_retries,
        )
    }

    #[test]
    fn substitutes_project_id() {
        let client = ServiceClient::new(
            reqwest::Client::new(),
            "https://cfw.cn-north-4.myhuaweicloud.com".to_owned(),
            Some("p1".to_owned()),
            Arc::new(Credentials::Token("t".to_owned())),
            0,
        );
        assert_eq!(
            client.url("/v1/{project_id}/acl-rule"),
            "https://cfw.cn-north-4.myhuaweicloud.com/v1/p1/acl-rule"
        );
    }

    #[test]
    fn debug_hides_secrets() {
        let credentials = Credentials::AkSk {
            access_key: "AK".to_owned(),
            secret_key: "SK".to_owned(),
            security_token: Some("ST".to_owned()),
        };
        let printed = format!("{credentials:?}");
        assert!(printed.contains("AK"));
        assert!(!printed.contains("SK"));
        assert!(!printed.contains("ST"));
        assert_eq!(format!("{:?}", Credentials::Token("T".to_owned())), "Token(..)");
    }

    #[tokio::test]
    async fn sends_token_and_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/p1/meshes"))
            .and(header("x-auth-token", "secret-token"))
            .and(header("x-project-id", "p1"))
            .and(body_json(json!({ "metadata": { "name": "mesh" } })))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({ "metadata": { "uid": "m-1" } })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let created = token_client(&server, 0)
            .post(
                "v1/{project_id}/meshes",
                &json!({ "metadata": { "name": "mesh" } }),
            )
            .await
            .unwrap();

        assert_eq!(created["metadata"]["uid"], json!("m-1"));
    }

    #[tokio::test]
    async fn signs_requests_with_aksk() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/projects"))
            .and(query_param("name", "cn-north-4"))
            .and(header_exists("authorization"))
            .and(header_exists("x-sdk-date"))
            .and(header("x-security-token", "st"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "projects": [] })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ServiceClient::new(
            reqwest::Client::new(),
            server.uri(),
            None,
            Arc::new(Credentials::AkSk {
                access_key: "ak".to_owned(),
                secret_key: "sk".to_owned(),
                security_token: Some("st".to_owned()),
            }),
            0,
        );

        let body = client.get("v3/projects?name=cn-north-4").await.unwrap();
        assert_eq!(body, json!({ "projects": [] }));
    }

    #[tokio::test]
    async fn classifies_http_failures() {
        let server = MockServer::start().await;
        Mock::given(path("/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such mesh"))
            .mount(&server)
            .await;
        Mock::given(path("/broken"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
            .mount(&server)
            .await;
        Mock::given(path("/garbage"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
            .mount(&server)
            .await;
        Mock::given(path("/empty"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        let client = token_client(&server, 0);

        let err = client.get("missing").await.unwrap_err();
        assert!(err.is_not_found());

        let err = client.delete("broken").await.unwrap_err();
        assert!(matches!(err, ClientError::Status { status: 400, ref body, .. } if body == "bad request"));

        let err = client.get("garbage").await.unwrap_err();
        assert!(matches!(err, ClientError::Decode { .. }));

        assert_eq!(client.delete("empty").await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn gives_up_when_throttled_without_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .expect(1)
            .mount(&server)
            .await;

        let err = token_client(&server, 0).get("v1/{project_id}/meshes").await.unwrap_err();

        assert!(matches!(err, ClientError::TooManyRequests { retries: 0, .. }));
    }

    #[test]
    fn backoff_doubles_up_to_half_an_hour() {
        let minutes: Vec<u64> = (0..7).map(|retries| backoff(retries).as_secs() / 60).collect();
        assert_eq!(minutes, [1, 2, 4, 8, 16, 30, 30]);
        assert_eq!(backoff(u32::MAX), Duration::from_secs(30 * 60));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_after_throttling() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "meshes": [] })))
            .expect(1)
            .mount(&server)
            .await;

        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .build()
            .unwrap();
        let client = ServiceClient::new(
            http,
            server.uri(),
            Some("p1".to_owned()),
            Arc::new(Credentials::Token("secret-token".to_owned())),
            2,
        );
        let start = tokio::time::Instant::now();

        let body = client.get("v1/{project_id}/meshes").await.unwrap();

        assert_eq!(body, json!({ "meshes": [] }));
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(60), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(120), "{elapsed:?}");
    }
}
