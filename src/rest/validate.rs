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

use tf_provider::value::ValueString;
use tf_provider::{AttributePath, Diagnostics};

use crate::config::catalog;
use crate::utils::{duration_or, DisplayJoinable, WithValidate};
use crate::wait::DEFAULT_TIMEOUT;

use super::state::{DataSourceState, ResourceState};
use super::{json_path_or, parse_json, Stage, DEFAULT_STATUS_PATH};

fn validate_service(diags: &mut Diagnostics, service: &ValueString<'_>, attr_path: AttributePath) {
    if let Some(service) = service.as_deref_option() {
        if catalog::lookup(service).is_none() {
            diags.error(
                "Unknown service",
                format!(
                    "`{service}` is not a known service. Known services: {}",
                    catalog::names().join_with(", ")
                ),
                attr_path,
            );
        }
    }
}

fn validate_not_empty(diags: &mut Diagnostics, value: &ValueString<'_>, attr_path: AttributePath) {
    if value.as_deref_option().is_some_and(|value| value.trim().is_empty()) {
        diags.error_short("Path should not be empty", attr_path);
    }
}

impl<'a> WithValidate for ResourceState<'a> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validate_service(diags, &self.service, attr_path.clone().attribute("service"));
        validate_not_empty(
            diags,
            &self.collection_path,
            attr_path.clone().attribute("collection_path"),
        );
        validate_not_empty(
            diags,
            &self.resource_path,
            attr_path.clone().attribute("resource_path"),
        );

        for (name, body) in [
            ("create_body", &self.create_body),
            ("update_body", &self.update_body),
        ] {
            if body.as_deref_option().is_some() {
                _ = parse_json(diags, body, attr_path.clone().attribute(name));
            }
        }

        if !self.id_path.is_unknown() {
            _ = self.id_json_path(diags, &attr_path);
        }
        if !self.status_path.is_unknown() {
            _ = self.status_json_path(diags, &attr_path);
        }

        let Some((initial_delay, poll_interval)) = self.delays(diags, &attr_path) else {
            return;
        };
        for stage in [Stage::Create, Stage::Update, Stage::Delete] {
            let settings = self.stage(stage);
            let (timeout, timeout_attr) = settings.timeout;
            let Some(timeout) = duration_or(
                diags,
                timeout,
                DEFAULT_TIMEOUT,
                attr_path.clone().attribute(timeout_attr),
            ) else {
                continue;
            };
            if settings.statuses_known() {
                _ = settings.build(diags, initial_delay, poll_interval, timeout, &attr_path);
            }
        }
    }
}

impl<'a> WithValidate for DataSourceState<'a> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validate_service(diags, &self.service, attr_path.clone().attribute("service"));
        validate_not_empty(diags, &self.path, attr_path.clone().attribute("path"));
        if self.status_path.as_deref_option().is_some() {
            _ = json_path_or(
                diags,
                &self.status_path,
                DEFAULT_STATUS_PATH,
                attr_path.attribute("status_path"),
            );
        }
    }
}
