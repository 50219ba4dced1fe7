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

use crate::client::ServiceClient;
use crate::json_path::JsonPath;

use super::{Snapshot, StatusFetcher};

/// Fetch the status of a resource with `GET <endpoint>/<path>`
#[derive(Debug)]
pub struct RestStatusFetcher<'c> {
    client: &'c ServiceClient,
    path: String,
    resource_id: String,
    status_path: &'c JsonPath,
}

impl<'c> RestStatusFetcher<'c> {
    pub fn new(
        client: &'c ServiceClient,
        path: impl Into<String>,
        resource_id: impl Into<String>,
        status_path: &'c JsonPath,
    ) -> Self {
        Self {
            client,
            path: path.into(),
            resource_id: resource_id.into(),
            status_path,
        }
    }
}

#[async_trait]
impl<'c> StatusFetcher for RestStatusFetcher<'c> {
    async fn fetch(&self) -> Snapshot {
        match self.client.get(&self.path).await {
            Ok(body) => {
                let status = self.status_path.lookup_str(&body);
                Snapshot::found(self.resource_id.as_str(), status.as_deref(), body)
            }
            Err(err) if err.is_not_found() => Snapshot::not_found(self.resource_id.as_str()),
            Err(err) => Snapshot::failed(self.resource_id.as_str(), err),
        }
    }
}
