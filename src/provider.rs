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

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, Schema,
};
use tf_provider::value::{Value, ValueEmpty, ValueMap, ValueNumber, ValueString};
use tf_provider::{map, AttributePath, Diagnostics, Provider};

use crate::config::{Config, RawSettings, Settings};
use crate::rest::{RestDataSource, RestResource};

/// Provider configuration shared with every resource and data source, set once by `configure`
pub type ConfigHandle = Arc<OnceLock<Config>>;

pub(crate) fn configured<'h>(diags: &mut Diagnostics, handle: &'h ConfigHandle) -> Option<&'h Config> {
    let config = handle.get();
    if config.is_none() {
        diags.root_error_short("The huaweicloud provider has not been configured");
    }
    config
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig<'a> {
    #[serde(borrow = "'a")]
    pub region: ValueString<'a>,
    pub cloud: ValueString<'a>,
    pub access_key: ValueString<'a>,
    pub secret_key: ValueString<'a>,
    pub security_token: ValueString<'a>,
    pub auth_token: ValueString<'a>,
    pub project_id: ValueString<'a>,
    pub insecure: Value<bool>,
    pub max_retries: ValueNumber,
    pub endpoints: ValueMap<'a, ValueString<'a>>,
}

impl<'a> ProviderConfig<'a> {
    fn raw_settings(&self) -> RawSettings {
        let text = |value: &ValueString<'_>| value.as_deref_option().map(str::to_owned);
        RawSettings {
            region: text(&self.region),
            cloud: text(&self.cloud),
            access_key: text(&self.access_key),
            secret_key: text(&self.secret_key),
            security_token: text(&self.security_token),
            auth_token: text(&self.auth_token),
            project_id: text(&self.project_id),
            insecure: match self.insecure {
                Value::Value(insecure) => Some(insecure),
                _ => None,
            },
            max_retries: match self.max_retries {
                Value::Value(max_retries) => Some(max_retries),
                _ => None,
            },
            endpoints: self
                .endpoints
                .iter()
                .flatten()
                .filter_map(|(service, url)| Some((service.to_string(), url.as_deref_option()?.to_owned())))
                .collect(),
        }
    }

    fn has_unknown(&self) -> bool {
        [
            &self.region,
            &self.cloud,
            &self.access_key,
            &self.secret_key,
            &self.security_token,
            &self.auth_token,
            &self.project_id,
        ]
        .iter()
        .any(|value| value.is_unknown())
            || self.insecure.is_unknown()
            || self.max_retries.is_unknown()
            || self.endpoints.is_unknown()
            || self.endpoints.iter().flatten().any(|(_, url)| url.is_unknown())
    }
}

#[derive(Debug, Default, Clone)]
pub struct HuaweiCloudProvider {
    config: ConfigHandle,
}

fn attribute(
    attr_type: AttributeType,
    description: &str,
    sensitive: bool,
) -> Attribute {
    Attribute {
        attr_type,
        description: Description::plain(description),
        constraint: AttributeConstraint::Optional,
        sensitive,
        ..Default::default()
    }
}

#[async_trait]
impl Provider for HuaweiCloudProvider {
    type Config<'a> = ProviderConfig<'a>;
    type MetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        let string = || AttributeType::String;
        Some(Schema {
            version: 1,
            block: Block {
                description: Description::plain("huaweicloud"),
                attributes: map! {
                    "region" => attribute(string(), "Default region, falls back to HW_REGION_NAME", false),
                    "cloud" => attribute(string(), "Endpoint domain, falls back to HW_CLOUD, defaults to myhuaweicloud.com", false),
                    "access_key" => attribute(string(), "Access key, falls back to HW_ACCESS_KEY", false),
                    "secret_key" => attribute(string(), "Secret key, falls back to HW_SECRET_KEY", true),
                    "security_token" => attribute(string(), "Security token of temporary AK/SK, falls back to HW_SECURITY_TOKEN", true),
                    "auth_token" => attribute(string(), "IAM token, falls back to HW_AUTH_TOKEN", true),
                    "project_id" => attribute(string(), "Project of the default region, falls back to HW_PROJECT_ID", false),
                    "insecure" => attribute(AttributeType::Bool, "Skip TLS certificate verification, falls back to HW_INSECURE", false),
                    "max_retries" => attribute(AttributeType::Number, "Retries of throttled requests, falls back to HW_MAX_RETRIES, defaults to 5", false),
                    "endpoints" => attribute(AttributeType::Map(string().into()), "Endpoint overrides, by service name", false),
                },
                ..Default::default()
            },
        })
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::Config<'a>) -> Option<()> {
        if let Value::Value(max_retries) = config.max_retries {
            if max_retries < 0 {
                diags.error_short(
                    "max_retries should not be negative",
                    AttributePath::new("max_retries"),
                );
            }
        }
        for (service, url) in config.endpoints.iter().flatten() {
            if let Some(url) = url.as_deref_option() {
                if !(url.starts_with("https://") || url.starts_with("http://")) {
                    diags.error(
                        "Invalid endpoint",
                        format!("`{url}` is not an http(s) URL"),
                        AttributePath::new("endpoints").key(service.to_string()),
                    );
                }
            }
        }

        if diags.errors.is_empty() {
            Some(())
        } else {
            None
        }
    }

    async fn configure<'a>(
        &self,
        diags: &mut Diagnostics,
        terraform_version: String,
        config: Self::Config<'a>,
    ) -> Option<()> {
        if config.has_unknown() {
            diags.root_error_short("The provider configuration depends on values unknown until apply");
            return None;
        }

        let settings = match Settings::resolve(config.raw_settings(), |name| std::env::var(name).ok()) {
            Ok(settings) => settings,
            Err(err) => {
                diags.root_error_short(err.to_string());
                return None;
            }
        };
        let region = settings.region.clone();
        let config = match Config::new(settings) {
            Ok(config) => config,
            Err(err) => {
                diags.root_error_short(err.to_string());
                return None;
            }
        };

        if self.config.set(config).is_err() {
            diags.root_warning(
                "Provider configured twice",
                "The first configuration is kept.",
            );
        }
        info!(%region, %terraform_version, "provider configured");
        Some(())
    }

    fn get_resources(
        &self,
        _diags: &mut Diagnostics,
    ) -> Option<std::collections::HashMap<String, Box<dyn tf_provider::DynamicResource>>>
    {
        Some(map! {
            "rest_resource" => RestResource::new(self.config.clone()),
        })
    }

    fn get_data_sources(
        &self,
        _diags: &mut Diagnostics,
    ) -> Option<
        std::collections::HashMap<String, Box<dyn tf_provider::DynamicDataSource>>,
    > {
        Some(map! {
            "rest_data_source" => RestDataSource::new(self.config.clone()),
        })
    }
}
