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

use std::borrow::Cow;
use std::time::Duration;

use tf_provider::value::{Value, ValueList, ValueString};
use tf_provider::{AttributePath, Diagnostics};

use crate::client::ServiceClient;
use crate::json_path::JsonPath;
use crate::provider::{configured, ConfigHandle};
use crate::utils::{duration_or, statuses_known, statuses_or};
use crate::wait::{
    InvalidPoller, PollMode, Poller, DEFAULT_INITIAL_DELAY, DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT, DELETED,
};

mod data_source;
mod resource;
mod state;
mod validate;

pub use data_source::RestDataSource;
pub use resource::RestResource;

use state::ResourceState;

pub(crate) const DEFAULT_ID_PATH: &str = "metadata.uid";
pub(crate) const DEFAULT_STATUS_PATH: &str = "status.phase";
const DEFAULT_CREATE_TARGET: &[&str] = &["Running"];
/// Failed statuses are fatal whatever the stage
const DEFAULT_FATAL: &[&str] = &["CreateFailed", "DeleteFailed", "UpgradeFailed", "RollbackFailed"];
const DEFAULT_DELETE_TARGET: &[&str] = &[DELETED];

/// Lifecycle step followed by a status wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    Create,
    Update,
    Delete,
}

fn owned<'a>(value: impl Into<String>) -> ValueString<'a> {
    Value::Value(Cow::Owned(value.into()))
}

/// Compare two JSON documents, ignoring formatting
///
/// Falls back to text comparison when either side is not valid JSON.
fn json_eq(a: &ValueString<'_>, b: &ValueString<'_>) -> bool {
    match (a.as_deref_option(), b.as_deref_option()) {
        (Some(a), Some(b)) => match (
            serde_json::from_str::<serde_json::Value>(a),
            serde_json::from_str::<serde_json::Value>(b),
        ) {
            (Ok(a), Ok(b)) => a == b,
            _ => a == b,
        },
        _ => a == b,
    }
}

fn parse_json(
    diags: &mut Diagnostics,
    value: &ValueString<'_>,
    attr_path: AttributePath,
) -> Option<serde_json::Value> {
    match serde_json::from_str(value.as_deref_option().unwrap_or("null")) {
        Ok(json) => Some(json),
        Err(err) => {
            diags.error("Invalid JSON", err.to_string(), attr_path);
            None
        }
    }
}

fn json_path_or(
    diags: &mut Diagnostics,
    value: &ValueString<'_>,
    default: &str,
    attr_path: AttributePath,
) -> Option<JsonPath> {
    match JsonPath::parse(value.as_deref_option().unwrap_or(default)) {
        Ok(path) => Some(path),
        Err(err) => {
            diags.error("Invalid path", err.to_string(), attr_path);
            None
        }
    }
}

async fn service_client(
    diags: &mut Diagnostics,
    config: &ConfigHandle,
    service: &ValueString<'_>,
    region: &ValueString<'_>,
) -> Option<ServiceClient> {
    let config = configured(diags, config)?;
    match config
        .service_client(service.as_str(), region.as_deref_option())
        .await
    {
        Ok(client) => Some(client),
        Err(err) => {
            diags.error(
                "Unable to build the service client",
                err.to_string(),
                AttributePath::new("service"),
            );
            None
        }
    }
}

impl<'a> ResourceState<'a> {
    fn id_json_path(&self, diags: &mut Diagnostics, attr_path: &AttributePath) -> Option<JsonPath> {
        json_path_or(
            diags,
            &self.id_path,
            DEFAULT_ID_PATH,
            attr_path.clone().attribute("id_path"),
        )
    }

    fn status_json_path(
        &self,
        diags: &mut Diagnostics,
        attr_path: &AttributePath,
    ) -> Option<JsonPath> {
        json_path_or(
            diags,
            &self.status_path,
            DEFAULT_STATUS_PATH,
            attr_path.clone().attribute("status_path"),
        )
    }

    /// Path of the object identified by `id`
    fn item_path(&self, id: &str) -> String {
        match self.resource_path.as_deref_option() {
            Some(path) => path.replace("{id}", id),
            None => format!(
                "{}/{id}",
                self.collection_path.as_str().trim_end_matches('/')
            ),
        }
    }

    /// Whether `update_body` must be sent to go from `prior` to `self`
    fn update_needed(&self, prior: &Self) -> bool {
        !self.update_body.is_null() && !json_eq(&prior.update_body, &self.update_body)
    }

    fn stage(&self, stage: Stage) -> StageSettings<'_, 'a> {
        match stage {
            Stage::Create => StageSettings {
                mode: PollMode::Create,
                target: (&self.create_target_statuses, DEFAULT_CREATE_TARGET, "create_target_statuses"),
                fatal: (&self.create_fatal_statuses, DEFAULT_FATAL, "create_fatal_statuses"),
                timeout: (&self.create_timeout, "create_timeout"),
            },
            Stage::Update => StageSettings {
                mode: PollMode::Create,
                target: (&self.create_target_statuses, DEFAULT_CREATE_TARGET, "create_target_statuses"),
                fatal: (&self.update_fatal_statuses, DEFAULT_FATAL, "update_fatal_statuses"),
                timeout: (&self.update_timeout, "update_timeout"),
            },
            Stage::Delete => StageSettings {
                mode: PollMode::Delete,
                target: (&self.delete_target_statuses, DEFAULT_DELETE_TARGET, "delete_target_statuses"),
                fatal: (&self.delete_fatal_statuses, DEFAULT_FATAL, "delete_fatal_statuses"),
                timeout: (&self.delete_timeout, "delete_timeout"),
            },
        }
    }

    /// Durations shared by every stage: initial delay and poll interval
    fn delays(&self, diags: &mut Diagnostics, attr_path: &AttributePath) -> Option<(Duration, Duration)> {
        let initial_delay = duration_or(
            diags,
            &self.initial_delay,
            DEFAULT_INITIAL_DELAY,
            attr_path.clone().attribute("initial_delay"),
        );
        let poll_interval = duration_or(
            diags,
            &self.poll_interval,
            DEFAULT_POLL_INTERVAL,
            attr_path.clone().attribute("poll_interval"),
        );
        Some((initial_delay?, poll_interval?))
    }

    fn poller(
        &self,
        diags: &mut Diagnostics,
        stage: Stage,
        attr_path: &AttributePath,
    ) -> Option<Poller> {
        let settings = self.stage(stage);
        let delays = self.delays(diags, attr_path);
        let (timeout, timeout_attr) = settings.timeout;
        let timeout = duration_or(
            diags,
            timeout,
            DEFAULT_TIMEOUT,
            attr_path.clone().attribute(timeout_attr),
        );
        let (initial_delay, poll_interval) = delays?;
        settings.build(diags, initial_delay, poll_interval, timeout?, attr_path)
    }
}

/// Statuses and timeout attributes of a [`Stage`]
struct StageSettings<'s, 'a> {
    mode: PollMode,
    target: (&'s ValueList<ValueString<'a>>, &'static [&'static str], &'static str),
    fatal: (&'s ValueList<ValueString<'a>>, &'static [&'static str], &'static str),
    timeout: (&'s ValueString<'a>, &'static str),
}

impl<'s, 'a> StageSettings<'s, 'a> {
    fn statuses_known(&self) -> bool {
        statuses_known(self.target.0) && statuses_known(self.fatal.0)
    }

    fn build(
        &self,
        diags: &mut Diagnostics,
        initial_delay: Duration,
        poll_interval: Duration,
        timeout: Duration,
        attr_path: &AttributePath,
    ) -> Option<Poller> {
        let (target, target_default, target_attr) = self.target;
        let (fatal, fatal_default, fatal_attr) = self.fatal;
        let built = Poller::builder(self.mode)
            .target(statuses_or(target, target_default))
            .fatal(statuses_or(fatal, fatal_default))
            .initial_delay(initial_delay)
            .poll_interval(poll_interval)
            .timeout(timeout)
            .build();
        match built {
            Ok(poller) => Some(poller),
            Err(err) => {
                let attr = match err {
                    InvalidPoller::EmptyTarget => target_attr,
                    InvalidPoller::Overlap(_) => fatal_attr,
                };
                diags.error(
                    "Invalid statuses",
                    err.to_string(),
                    attr_path.clone().attribute(attr),
                );
                None
            }
        }
    }
}
