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
use tracing::info;

use tf_provider::value::{Value, ValueEmpty};
use tf_provider::{schema::Schema, AttributePath, Diagnostics, Resource};

use crate::provider::ConfigHandle;
use crate::utils::{WithSchema, WithValidate};
use crate::wait::RestStatusFetcher;

use super::state::ResourceState;
use super::{json_eq, owned, parse_json, service_client, Stage};

/// `huaweicloud_rest_resource`: create, poll, update and delete an object of any REST service
#[derive(Debug, Default, Clone)]
pub struct RestResource {
    config: ConfigHandle,
}

impl RestResource {
    pub fn new(config: ConfigHandle) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Resource for RestResource {
    type State<'a> = ResourceState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(ResourceState::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        config.validate(diags, Default::default());

        if diags.errors.is_empty() {
            Some(())
        } else {
            None
        }
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let client = service_client(diags, &self.config, &state.service, &state.region).await?;
        let status_path = state.status_json_path(diags, &Default::default())?;

        let mut state = state;
        let id = state.id.as_str().to_owned();
        match client.get(&state.item_path(&id)).await {
            Ok(body) => {
                state.status = status_path.lookup_str(&body).map_or(Value::Null, owned);
                state.response = owned(body.to_string());
            }
            Err(err) if err.is_not_found() => {
                diags.warning(
                    "Resource not found",
                    format!("Resource {id} does not exist anymore and will be recreated: {err}"),
                    AttributePath::new("id"),
                );
                state.status = Value::Null;
                state.response = Value::Null;
            }
            Err(err) => {
                diags.error("Failed to read resource", err.to_string(), AttributePath::new("id"));
                return None;
            }
        }

        Some((state, private_state))
    }

    async fn plan_create<'a>(
        &self,
        _diags: &mut Diagnostics,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let mut state = proposed_state;
        state.id = Value::Unknown;
        state.status = Value::Unknown;
        state.response = Value::Unknown;
        if state.region.is_null() {
            state.region = match self.config.get() {
                Some(config) => owned(config.region()),
                None => Value::Unknown,
            };
        }

        Some((state, Default::default()))
    }

    async fn plan_update<'a>(
        &self,
        _diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(
        Self::State<'a>,
        Self::PrivateState<'a>,
        Vec<tf_provider::AttributePath>,
    )> {
        let mut state = proposed_state;
        if state.region.is_null() {
            state.region = prior_state.region.clone();
        }

        let mut trigger_replace = Vec::new();
        for (name, prior, planned) in [
            ("service", &prior_state.service, &state.service),
            ("collection_path", &prior_state.collection_path, &state.collection_path),
            ("resource_path", &prior_state.resource_path, &state.resource_path),
            ("id_path", &prior_state.id_path, &state.id_path),
        ] {
            if prior != planned {
                trigger_replace.push(AttributePath::new(name));
            }
        }
        // Imported resources have no region nor create_body until applied once
        if !prior_state.region.is_null() && prior_state.region != state.region {
            trigger_replace.push(AttributePath::new("region"));
        }
        if !prior_state.create_body.is_null() && !json_eq(&prior_state.create_body, &state.create_body)
        {
            trigger_replace.push(AttributePath::new("create_body"));
        }
        // The object disappeared since the last refresh
        if prior_state.response.is_null() {
            trigger_replace.push(AttributePath::new("response"));
        }

        if !trigger_replace.is_empty() {
            state.id = Value::Unknown;
            state.status = Value::Unknown;
            state.response = Value::Unknown;
        } else if state.update_needed(&prior_state) {
            state.status = Value::Unknown;
            state.response = Value::Unknown;
        }

        Some((state, prior_private_state, trigger_replace))
    }

    async fn plan_destroy<'a>(
        &self,
        _diags: &mut Diagnostics,
        _prior_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::PrivateState<'a>> {
        Some(prior_private_state)
    }

    async fn create<'a>(
        &self,
        diags: &mut Diagnostics,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let mut state = planned_state;
        let root = AttributePath::default();

        let body = parse_json(diags, &state.create_body, AttributePath::new("create_body"));
        let id_path = state.id_json_path(diags, &root);
        let status_path = state.status_json_path(diags, &root);
        let poller = state.poller(diags, Stage::Create, &root);
        let (body, id_path, status_path, poller) = (body?, id_path?, status_path?, poller?);

        let client = service_client(diags, &self.config, &state.service, &state.region).await?;
        if !matches!(state.region, Value::Value(_)) {
            state.region = self.config.get().map_or(Value::Null, |config| owned(config.region()));
        }

        let response = match client.post(state.collection_path.as_str(), &body).await {
            Ok(response) => response,
            Err(err) => {
                diags.error(
                    "Failed to create resource",
                    err.to_string(),
                    AttributePath::new("collection_path"),
                );
                return None;
            }
        };
        let Some(id) = id_path.lookup_str(&response) else {
            diags.error(
                "Failed to create resource",
                format!("error parsing the id of the created resource at `{id_path}` from response body: {response}"),
                AttributePath::new("id_path"),
            );
            return None;
        };
        info!(%id, service = state.service.as_str(), "resource created");
        state.id = owned(id.as_str());

        let fetcher = RestStatusFetcher::new(&client, state.item_path(&id), id.as_str(), &status_path);
        match poller.wait(&fetcher).await {
            Ok(resolved) => {
                state.status = owned(resolved.status);
                state.response = owned(resolved.body.to_string());
            }
            Err(err) => {
                // The object exists: keep its id so Terraform taints it
                diags.error(
                    format!(
                        "error waiting for the status of resource {id} to become {}",
                        poller.describe_target()
                    ),
                    err.to_string(),
                    AttributePath::new("status"),
                );
                state.status = Value::Null;
                state.response = Value::Null;
            }
        }

        Some((state, private_state))
    }

    async fn update<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let mut state = planned_state;
        if !state.update_needed(&prior_state) {
            state.status = prior_state.status;
            state.response = prior_state.response;
            return Some((state, private_state));
        }

        let root = AttributePath::default();
        let body = parse_json(diags, &state.update_body, AttributePath::new("update_body"));
        let status_path = state.status_json_path(diags, &root);
        let poller = state.poller(diags, Stage::Update, &root);
        let (body, status_path, poller) = (body?, status_path?, poller?);

        let client = service_client(diags, &self.config, &state.service, &state.region).await?;
        let id = state.id.as_str().to_owned();
        let path = state.item_path(&id);

        if let Err(err) = client.put(&path, &body).await {
            diags.error(
                "Failed to update resource",
                err.to_string(),
                AttributePath::new("update_body"),
            );
            return None;
        }
        info!(%id, service = state.service.as_str(), "resource updated");

        let fetcher = RestStatusFetcher::new(&client, path, id.as_str(), &status_path);
        match poller.wait(&fetcher).await {
            Ok(resolved) => {
                state.status = owned(resolved.status);
                state.response = owned(resolved.body.to_string());
                Some((state, private_state))
            }
            Err(err) => {
                diags.error(
                    format!(
                        "error waiting for the status of resource {id} to become {}",
                        poller.describe_target()
                    ),
                    err.to_string(),
                    AttributePath::new("status"),
                );
                None
            }
        }
    }

    async fn destroy<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        _planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        let root = AttributePath::default();
        let status_path = state.status_json_path(diags, &root);
        let poller = state.poller(diags, Stage::Delete, &root);
        let (status_path, poller) = (status_path?, poller?);

        let client = service_client(diags, &self.config, &state.service, &state.region).await?;
        let id = state.id.as_str();
        let path = state.item_path(id);

        match client.delete(&path).await {
            Ok(_) => (),
            Err(err) if err.is_not_found() => {
                info!(id, "resource already deleted");
                return Some(());
            }
            Err(err) => {
                diags.error("Failed to delete resource", err.to_string(), AttributePath::new("id"));
                return None;
            }
        }

        let fetcher = RestStatusFetcher::new(&client, path, id, &status_path);
        if let Err(err) = poller.wait(&fetcher).await {
            diags.error(
                format!("error waiting for resource {id} to be deleted"),
                err.to_string(),
                AttributePath::new("id"),
            );
            return None;
        }
        info!(id, "resource deleted");

        Some(())
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let mut state = ResourceState::default();
        for var in id.split(',') {
            if var.trim().is_empty() {
                continue;
            }

            let (key, value) = var.split_once('=').unwrap_or((var, ""));
            let value = owned(value.trim());
            match key.trim() {
                "id" => state.id = value,
                "service" => state.service = value,
                "region" => state.region = value,
                "collection_path" => state.collection_path = value,
                "resource_path" => state.resource_path = value,
                key => {
                    diags.root_error_short(format!(
                        "Unknown import key `{key}`, expected id, service, region, collection_path or resource_path"
                    ));
                    return None;
                }
            }
        }

        for (name, value) in [
            ("id", &state.id),
            ("service", &state.service),
            ("collection_path", &state.collection_path),
        ] {
            if value.as_deref_option().map_or(true, str::is_empty) {
                diags.root_error_short(format!("Import identifier is missing `{name}=...`"));
            }
        }
        if !diags.errors.is_empty() {
            return None;
        }

        if state.region.is_null() {
            if let Some(config) = self.config.get() {
                state.region = owned(config.region());
            }
        }

        Some((state, Default::default()))
    }
}
