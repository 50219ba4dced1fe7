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

use async_trait::async_trait;

use tf_provider::schema::Schema;
use tf_provider::value::{Value, ValueEmpty};
use tf_provider::{AttributePath, DataSource, Diagnostics};

use crate::provider::ConfigHandle;
use crate::utils::{WithSchema, WithValidate};

use super::state::DataSourceState;
use super::{json_path_or, owned, service_client, DEFAULT_STATUS_PATH};

#[derive(Debug, Default, Clone)]
pub struct RestDataSource {
    config: ConfigHandle,
}

impl RestDataSource {
    pub fn new(config: ConfigHandle) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DataSource for RestDataSource {
    type State<'a> = DataSourceState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(DataSourceState::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        config.validate(diags, AttributePath::default());

        if diags.errors.is_empty() {
            Some(())
        } else {
            None
        }
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        config: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::State<'a>> {
        let status_path = match config.status_path.as_deref_option() {
            Some(_) => Some(json_path_or(
                diags,
                &config.status_path,
                DEFAULT_STATUS_PATH,
                AttributePath::new("status_path"),
            )?),
            None => None,
        };
        let client = service_client(diags, &self.config, &config.service, &config.region).await?;

        let mut state = config;
        match client.get(state.path.as_str()).await {
            Ok(body) => {
                state.status = status_path
                    .and_then(|path| path.lookup_str(&body))
                    .map_or(Value::Null, owned);
                state.response = owned(body.to_string());
                Some(state)
            }
            Err(err) => {
                diags.error("Failed to read data source", err.to_string(), AttributePath::new("path"));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;
    use std::collections::BTreeMap;
    use std::sync::{Arc, OnceLock};

    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::config::{Config, RawSettings, Settings};

    use super::*;

    fn text(value: &str) -> tf_provider::value::ValueString<'static> {
        Value::Value(Cow::Owned(value.to_owned()))
    }

    #[tokio::test]
    async fn reads_object_and_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/p1/cfw/firewall/exist"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "records": [{ "fw_instance_id": "fw-1", "status": 2 }] }
            })))
            .mount(&server)
            .await;

        let settings = Settings::resolve(
            RawSettings {
                region: Some("cn-north-4".to_owned()),
                auth_token: Some("token".to_owned()),
                project_id: Some("p1".to_owned()),
                endpoints: BTreeMap::from([("cfw".to_owned(), server.uri())]),
                ..Default::default()
            },
            |_| None,
        )
        .unwrap();
        let handle = Arc::new(OnceLock::new());
        handle.set(Config::new(settings).unwrap()).unwrap();

        let mut diags = Diagnostics::default();
        let state = RestDataSource::new(handle)
            .read(
                &mut diags,
                DataSourceState {
                    service: text("cfw"),
                    path: text("v1/{project_id}/cfw/firewall/exist"),
                    status_path: text("data.records.0.status"),
                    ..Default::default()
                },
                Default::default(),
            )
            .await
            .unwrap();

        assert!(diags.errors.is_empty());
        assert_eq!(state.status, text("2"));
        assert!(state.response.as_str().contains("fw-1"));
    }

    #[tokio::test]
    async fn unconfigured_provider_is_reported() {
        let mut diags = Diagnostics::default();
        let state = RestDataSource::default()
            .read(
                &mut diags,
                DataSourceState {
                    service: text("cfw"),
                    path: text("v1/x"),
                    ..Default::default()
                },
                Default::default(),
            )
            .await;

        assert!(state.is_none());
        assert_eq!(diags.errors.len(), 1);
    }
}
