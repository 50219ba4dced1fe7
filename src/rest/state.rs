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

use serde::{Deserialize, Serialize};
use tf_provider::value::{ValueList, ValueString};
use tf_provider::map;
use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, Schema,
};

use crate::utils::WithSchema;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub service: ValueString<'a>,
    pub region: ValueString<'a>,
    pub collection_path: ValueString<'a>,
    pub resource_path: ValueString<'a>,
    pub create_body: ValueString<'a>,
    pub update_body: ValueString<'a>,
    pub id_path: ValueString<'a>,
    pub status_path: ValueString<'a>,
    pub create_target_statuses: ValueList<ValueString<'a>>,
    pub create_fatal_statuses: ValueList<ValueString<'a>>,
    pub update_fatal_statuses: ValueList<ValueString<'a>>,
    pub delete_target_statuses: ValueList<ValueString<'a>>,
    pub delete_fatal_statuses: ValueList<ValueString<'a>>,
    pub initial_delay: ValueString<'a>,
    pub poll_interval: ValueString<'a>,
    pub create_timeout: ValueString<'a>,
    pub update_timeout: ValueString<'a>,
    pub delete_timeout: ValueString<'a>,
    pub status: ValueString<'a>,
    pub response: ValueString<'a>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSourceState<'a> {
    #[serde(borrow = "'a")]
    pub service: ValueString<'a>,
    pub region: ValueString<'a>,
    pub path: ValueString<'a>,
    pub status_path: ValueString<'a>,
    pub status: ValueString<'a>,
    pub response: ValueString<'a>,
}

fn string(description: &str, constraint: AttributeConstraint) -> Attribute {
    Attribute {
        attr_type: AttributeType::String,
        description: Description::plain(description),
        constraint,
        ..Default::default()
    }
}

fn statuses(description: &str) -> Attribute {
    Attribute {
        attr_type: AttributeType::List(AttributeType::String.into()),
        description: Description::plain(description),
        constraint: AttributeConstraint::Optional,
        ..Default::default()
    }
}

impl<'a> WithSchema for ResourceState<'a> {
    fn schema() -> Schema {
        use AttributeConstraint::{Computed, Optional, OptionalComputed, Required};
        Schema {
            version: 1,
            block: Block {
                version: 1,
                description: Description::markdown(
                    "Huawei Cloud object managed through its REST API. \
                     After every change, the object is polled until it reaches a target status.",
                ),
                attributes: map! {
                    "id" => string("Identifier extracted from the creation response", Computed),
                    "service" => string("Service hosting the object (`cfw`, `asm`, `cce`, ...)", Required),
                    "region" => string("Region of the object, defaults to the provider region", OptionalComputed),
                    "collection_path" => string(
                        "Path of the collection the object is created in, relative to the service endpoint. `{project_id}` is substituted",
                        Required,
                    ),
                    "resource_path" => string(
                        "Path of the object. `{id}` and `{project_id}` are substituted. Defaults to `<collection_path>/{id}`",
                        Optional,
                    ),
                    "create_body" => string("JSON body sent when creating the object", Required),
                    "update_body" => string("JSON body sent with PUT when it changes", Optional),
                    "id_path" => string("Path of the identifier in the creation response, defaults to `metadata.uid`", Optional),
                    "status_path" => string("Path of the status in the object, defaults to `status.phase`", Optional),
                    "create_target_statuses" => statuses("Statuses ending creation and updates, defaults to `[\"Running\"]`"),
                    "create_fatal_statuses" => statuses("Statuses failing creation, defaults to `[\"CreateFailed\", \"DeleteFailed\", \"UpgradeFailed\", \"RollbackFailed\"]`"),
                    "update_fatal_statuses" => statuses("Statuses failing updates, defaults to `[\"CreateFailed\", \"DeleteFailed\", \"UpgradeFailed\", \"RollbackFailed\"]`"),
                    "delete_target_statuses" => statuses("Statuses ending deletion, defaults to `[\"Deleted\"]`. A 404 always ends deletion"),
                    "delete_fatal_statuses" => statuses("Statuses failing deletion, defaults to `[\"CreateFailed\", \"DeleteFailed\", \"UpgradeFailed\", \"RollbackFailed\"]`"),
                    "initial_delay" => string("Wait before the first status check, defaults to `20s`", Optional),
                    "poll_interval" => string("Wait between status checks, defaults to `10s`", Optional),
                    "create_timeout" => string("Maximum wait after creation, defaults to `30m`", Optional),
                    "update_timeout" => string("Maximum wait after an update, defaults to `30m`", Optional),
                    "delete_timeout" => string("Maximum wait after deletion, defaults to `30m`", Optional),
                    "status" => string("Last observed status", Computed),
                    "response" => string("Last observed object, as JSON", Computed),
                },
                ..Default::default()
            },
        }
    }
}

impl<'a> WithSchema for DataSourceState<'a> {
    fn schema() -> Schema {
        use AttributeConstraint::{Computed, Optional, Required};
        Schema {
            version: 1,
            block: Block {
                version: 1,
                description: Description::plain("Read a Huawei Cloud object through its REST API"),
                attributes: map! {
                    "service" => string("Service hosting the object", Required),
                    "region" => string("Region of the object, defaults to the provider region", Optional),
                    "path" => string("Path of the object, relative to the service endpoint. `{project_id}` is substituted", Required),
                    "status_path" => string("Path of the status in the object", Optional),
                    "status" => string("Status found at `status_path`", Computed),
                    "response" => string("Object, as JSON", Computed),
                },
                ..Default::default()
            },
        }
    }
}
