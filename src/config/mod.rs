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

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

use crate::client::{ClientError, Credentials, ServiceClient};

pub mod catalog;

pub const DEFAULT_CLOUD: &str = "myhuaweicloud.com";
pub const DEFAULT_MAX_RETRIES: u32 = 5;
const USER_AGENT: &str = concat!("terraform-provider-huaweicloud/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("region must be set, either in the provider block or with HW_REGION_NAME")]
    MissingRegion,
    #[error("no credentials: set access_key and secret_key, or auth_token")]
    MissingCredentials,
    #[error("`{0}` is required when using AK/SK authentication")]
    IncompleteAkSk(&'static str),
    #[error("access_key/secret_key and auth_token are mutually exclusive")]
    ConflictingCredentials,
    #[error("security_token can only be used with access_key and secret_key")]
    SecurityTokenWithoutAkSk,
    #[error("project_id is required when using auth_token")]
    TokenWithoutProject,
    #[error("invalid boolean `{value}` for {name}")]
    InvalidBool { name: &'static str, value: String },
    #[error("max_retries must be a non negative integer, got `{0}`")]
    InvalidMaxRetries(String),
    #[error("endpoint for `{service}` must be an http(s) URL, got `{url}`")]
    InvalidEndpoint { service: String, url: String },
    #[error("unknown service `{0}`")]
    UnknownService(String),
    #[error("region `{0}` differs from the provider region and an auth_token is scoped to a single project: use AK/SK credentials")]
    ForeignRegion(String),
    #[error("unable to look up the project of region `{region}`: {source}")]
    ProjectLookup {
        region: String,
        #[source]
        source: ClientError,
    },
    #[error("no project found for region `{0}`")]
    ProjectNotFound(String),
    #[error("unable to build the HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Provider settings as written in the provider block, before environment fallback
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSettings {
    pub region: Option<String>,
    pub cloud: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub security_token: Option<String>,
    pub auth_token: Option<String>,
    pub project_id: Option<String>,
    pub insecure: Option<bool>,
    pub max_retries: Option<i64>,
    pub endpoints: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub region: String,
    pub cloud: String,
    pub credentials: Arc<Credentials>,
    pub project_id: Option<String>,
    pub insecure: bool,
    pub max_retries: u32,
    pub endpoints: BTreeMap<String, String>,
}

impl Settings {
    /// Complete `raw` with the `HW_*` environment variables and check its consistency
    ///
    /// Empty strings count as unset.
    pub fn resolve(
        raw: RawSettings,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let pick = |value: Option<String>, name: &str| {
            value
                .filter(|value| !value.is_empty())
                .or_else(|| env(name).filter(|value| !value.is_empty()))
        };

        let region = pick(raw.region, "HW_REGION_NAME").ok_or(ConfigError::MissingRegion)?;
        let cloud = pick(raw.cloud, "HW_CLOUD").unwrap_or_else(|| DEFAULT_CLOUD.to_owned());
        let access_key = pick(raw.access_key, "HW_ACCESS_KEY");
        let secret_key = pick(raw.secret_key, "HW_SECRET_KEY");
        let security_token = pick(raw.security_token, "HW_SECURITY_TOKEN");
        let auth_token = pick(raw.auth_token, "HW_AUTH_TOKEN");
        let project_id = pick(raw.project_id, "HW_PROJECT_ID");

        let insecure = match raw.insecure {
            Some(insecure) => insecure,
            None => match pick(None, "HW_INSECURE") {
                Some(value) => parse_bool("HW_INSECURE", value)?,
                None => false,
            },
        };

        let max_retries = match raw.max_retries {
            Some(max_retries) => {
                u32::try_from(max_retries).map_err(|_| ConfigError::InvalidMaxRetries(max_retries.to_string()))?
            }
            None => match pick(None, "HW_MAX_RETRIES") {
                Some(value) => value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidMaxRetries(value))?,
                None => DEFAULT_MAX_RETRIES,
            },
        };

        let credentials = match (access_key, secret_key, auth_token) {
            (Some(_), Some(_), Some(_)) => return Err(ConfigError::ConflictingCredentials),
            (Some(access_key), Some(secret_key), None) => Credentials::AkSk {
                access_key,
                secret_key,
                security_token,
            },
            (Some(_), None, _) => return Err(ConfigError::IncompleteAkSk("secret_key")),
            (None, Some(_), _) => return Err(ConfigError::IncompleteAkSk("access_key")),
            (None, None, Some(token)) => {
                if security_token.is_some() {
                    return Err(ConfigError::SecurityTokenWithoutAkSk);
                }
                if project_id.is_none() {
                    return Err(ConfigError::TokenWithoutProject);
                }
                Credentials::Token(token)
            }
            (None, None, None) => return Err(ConfigError::MissingCredentials),
        };

        for (service, url) in &raw.endpoints {
            if catalog::lookup(service).is_none() {
                return Err(ConfigError::UnknownService(service.clone()));
            }
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(ConfigError::InvalidEndpoint {
                    service: service.clone(),
                    url: url.clone(),
                });
            }
        }

        Ok(Self {
            region,
            cloud,
            credentials: Arc::new(credentials),
            project_id,
            insecure,
            max_retries,
            endpoints: raw.endpoints,
        })
    }
}

fn parse_bool(name: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidBool { name, value }),
    }
}

/// Configured provider: HTTP client, credentials and the region to project cache
#[derive(Debug)]
pub struct Config {
    settings: Settings,
    http: reqwest::Client,
    projects: Mutex<HashMap<String, String>>,
}

impl Config {
    pub fn new(settings: Settings) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(settings.insecure)
            .build()
            .map_err(ConfigError::HttpClient)?;

        let mut projects = HashMap::new();
        if let Some(project_id) = &settings.project_id {
            projects.insert(settings.region.clone(), project_id.clone());
        }

        Ok(Self {
            settings,
            http,
            projects: Mutex::new(projects),
        })
    }

    pub fn region(&self) -> &str {
        &self.settings.region
    }

    pub fn endpoint(&self, service: &str, region: &str) -> Result<String, ConfigError> {
        let info =
            catalog::lookup(service).ok_or_else(|| ConfigError::UnknownService(service.to_owned()))?;
        Ok(match self.settings.endpoints.get(service) {
            Some(url) => url.clone(),
            None => info.endpoint(region, &self.settings.cloud),
        })
    }

    /// Project of `region`, looked up through IAM the first time it is needed
    ///
    /// The cache stays locked during the lookup, so concurrent callers wait for
    /// the first one instead of issuing their own request.
    pub async fn project_id(&self, region: &str) -> Result<String, ConfigError> {
        let mut projects = self.projects.lock().await;
        if let Some(project_id) = projects.get(region) {
            return Ok(project_id.clone());
        }
        if !matches!(*self.settings.credentials, Credentials::AkSk { .. }) {
            return Err(ConfigError::ForeignRegion(region.to_owned()));
        }

        let iam = ServiceClient::new(
            self.http.clone(),
            self.endpoint("iam", region)?,
            None,
            self.settings.credentials.clone(),
            self.settings.max_retries,
        );
        let body = iam
            .get(&format!("v3/projects?name={region}"))
            .await
            .map_err(|source| ConfigError::ProjectLookup {
                region: region.to_owned(),
                source,
            })?;
        let project_id = body["projects"][0]["id"]
            .as_str()
            .ok_or_else(|| ConfigError::ProjectNotFound(region.to_owned()))?
            .to_owned();

        info!(region, %project_id, "resolved project");
        projects.insert(region.to_owned(), project_id.clone());
        Ok(project_id)
    }

    /// Client for `service` in `region`, or in the provider region when `None`
    pub async fn service_client(
        &self,
        service: &str,
        region: Option<&str>,
    ) -> Result<ServiceClient, ConfigError> {
        let region = region.unwrap_or(&self.settings.region);
        let info =
            catalog::lookup(service).ok_or_else(|| ConfigError::UnknownService(service.to_owned()))?;
        let project_id = if info.project_scoped {
            Some(self.project_id(region).await?)
        } else {
            None
        };

        Ok(ServiceClient::new(
            self.http.clone(),
            self.endpoint(service, region)?,
            project_id,
            self.settings.credentials.clone(),
            self.settings.max_retries,
        ))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn env<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |name| {
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.to_string())
        }
    }

    fn aksk_settings(iam: &str) -> Settings {
        Settings::resolve(
            RawSettings {
                region: Some("cn-north-4".to_owned()),
                access_key: Some("ak".to_owned()),
                secret_key: Some("sk".to_owned()),
                project_id: Some("p-north".to_owned()),
                endpoints: BTreeMap::from([("iam".to_owned(), iam.to_owned())]),
                ..Default::default()
            },
            env(&[]),
        )
        .unwrap()
    }

    #[test]
    fn falls_back_to_environment() {
        let settings = Settings::resolve(
            RawSettings {
                max_retries: Some(2),
                ..Default::default()
            },
            env(&[
                ("HW_REGION_NAME", "cn-north-4"),
                ("HW_ACCESS_KEY", "ak"),
                ("HW_SECRET_KEY", "sk"),
                ("HW_SECURITY_TOKEN", "st"),
                ("HW_INSECURE", "true"),
                ("HW_MAX_RETRIES", "9"),
            ]),
        )
        .unwrap();

        assert_eq!(settings.region, "cn-north-4");
        assert_eq!(settings.cloud, DEFAULT_CLOUD);
        assert!(settings.insecure);
        assert_eq!(settings.max_retries, 2);
        assert_eq!(
            *settings.credentials,
            Credentials::AkSk {
                access_key: "ak".to_owned(),
                secret_key: "sk".to_owned(),
                security_token: Some("st".to_owned()),
            }
        );
    }

    #[test]
    fn explicit_values_win() {
        let settings = Settings::resolve(
            RawSettings {
                region: Some("ap-southeast-1".to_owned()),
                auth_token: Some("token".to_owned()),
                project_id: Some("p1".to_owned()),
                ..Default::default()
            },
            env(&[("HW_REGION_NAME", "cn-north-4"), ("HW_PROJECT_ID", "p2")]),
        )
        .unwrap();

        assert_eq!(settings.region, "ap-southeast-1");
        assert_eq!(settings.project_id.as_deref(), Some("p1"));
        assert_eq!(settings.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(*settings.credentials, Credentials::Token("token".to_owned()));
    }

    #[test]
    fn rejects_inconsistent_settings() {
        let resolve = |vars: &[(&str, &str)]| Settings::resolve(RawSettings::default(), env(vars));

        assert!(matches!(resolve(&[]), Err(ConfigError::MissingRegion)));
        assert!(matches!(
            resolve(&[("HW_REGION_NAME", "r")]),
            Err(ConfigError::MissingCredentials)
        ));
        assert!(matches!(
            resolve(&[("HW_REGION_NAME", "r"), ("HW_ACCESS_KEY", "ak")]),
            Err(ConfigError::IncompleteAkSk("secret_key"))
        ));
        assert!(matches!(
            resolve(&[
                ("HW_REGION_NAME", "r"),
                ("HW_ACCESS_KEY", "ak"),
                ("HW_SECRET_KEY", "sk"),
                ("HW_AUTH_TOKEN", "t"),
            ]),
            Err(ConfigError::ConflictingCredentials)
        ));
        assert!(matches!(
            resolve(&[
                ("HW_REGION_NAME", "r"),
                ("HW_AUTH_TOKEN", "t"),
                ("HW_SECURITY_TOKEN", "st"),
            ]),
            Err(ConfigError::SecurityTokenWithoutAkSk)
        ));
        assert!(matches!(
            resolve(&[("HW_REGION_NAME", "r"), ("HW_AUTH_TOKEN", "t")]),
            Err(ConfigError::TokenWithoutProject)
        ));
        assert!(matches!(
            resolve(&[
                ("HW_REGION_NAME", "r"),
                ("HW_AUTH_TOKEN", "t"),
                ("HW_PROJECT_ID", "p"),
                ("HW_INSECURE", "maybe"),
            ]),
            Err(ConfigError::InvalidBool { .. })
        ));
        assert!(matches!(
            resolve(&[
                ("HW_REGION_NAME", "r"),
                ("HW_AUTH_TOKEN", "t"),
                ("HW_PROJECT_ID", "p"),
                ("HW_MAX_RETRIES", "-1"),
            ]),
            Err(ConfigError::InvalidMaxRetries(_))
        ));
    }

    #[test]
    fn validates_endpoint_overrides() {
        let with_endpoint = |service: &str, url: &str| {
            Settings::resolve(
                RawSettings {
                    endpoints: BTreeMap::from([(service.to_owned(), url.to_owned())]),
                    ..Default::default()
                },
                env(&[
                    ("HW_REGION_NAME", "r"),
                    ("HW_AUTH_TOKEN", "t"),
                    ("HW_PROJECT_ID", "p"),
                ]),
            )
        };

        assert!(with_endpoint("cfw", "https://cfw.example.com/").is_ok());
        assert!(matches!(
            with_endpoint("cfw", "cfw.example.com"),
            Err(ConfigError::InvalidEndpoint { .. })
        ));
        assert!(matches!(
            with_endpoint("cfx", "https://cfw.example.com/"),
            Err(ConfigError::UnknownService(_))
        ));
    }

    #[test]
    fn builds_endpoints() {
        let config = Config::new(aksk_settings("http://127.0.0.1:1/")).unwrap();

        assert_eq!(
            config.endpoint("asm", "ap-southeast-1").unwrap(),
            "https://asm.ap-southeast-1.myhuaweicloud.com/"
        );
        assert_eq!(config.endpoint("iam", "ap-southeast-1").unwrap(), "http://127.0.0.1:1/");
        assert!(matches!(
            config.endpoint("nope", "r"),
            Err(ConfigError::UnknownService(_))
        ));
    }

    #[tokio::test]
    async fn resolves_foreign_projects_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/projects"))
            .and(query_param("name", "ap-southeast-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "projects": [{ "id": "p-southeast", "name": "ap-southeast-1" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = Config::new(aksk_settings(&server.uri())).unwrap();

        let (first, second) = tokio::join!(
            config.project_id("ap-southeast-1"),
            config.project_id("ap-southeast-1")
        );
        assert_eq!(first.unwrap(), "p-southeast");
        assert_eq!(second.unwrap(), "p-southeast");
        assert_eq!(config.project_id("cn-north-4").await.unwrap(), "p-north");

        let client = config.service_client("cfw", Some("ap-southeast-1")).await.unwrap();
        assert_eq!(client.project_id(), Some("p-southeast"));
        assert_eq!(
            client.endpoint(),
            "https://cfw.ap-southeast-1.myhuaweicloud.com/"
        );

        let iam = config.service_client("iam", None).await.unwrap();
        assert_eq!(iam.project_id(), None);
    }

    #[tokio::test]
    async fn unknown_region_project() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/projects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "projects": [] })))
            .mount(&server)
            .await;

        let config = Config::new(aksk_settings(&server.uri())).unwrap();

        assert!(matches!(
            config.project_id("xx-nowhere-1").await,
            Err(ConfigError::ProjectNotFound(_))
        ));
    }

    #[tokio::test]
    async fn token_is_bound_to_its_region() {
        let settings = Settings::resolve(
            RawSettings {
                region: Some("cn-north-4".to_owned()),
                auth_token: Some("token".to_owned()),
                project_id: Some("p-north".to_owned()),
                ..Default::default()
            },
            env(&[]),
        )
        .unwrap();
        let config = Config::new(settings).unwrap();

        assert_eq!(config.project_id("cn-north-4").await.unwrap(), "p-north");
        assert!(matches!(
            config.service_client("cfw", Some("ap-southeast-1")).await,
            Err(ConfigError::ForeignRegion(_))
        ));
    }
}
