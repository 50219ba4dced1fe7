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

/// Where a service lives and how requests to it are scoped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceInfo {
    /// First label of the endpoint host name
    pub host: &'static str,
    /// One endpoint for every region
    pub global: bool,
    /// Requests carry a project id
    pub project_scoped: bool,
}

const CATALOG: &[(&str, ServiceInfo)] = &[
    (
        "iam",
        ServiceInfo {
            host: "iam",
            global: true,
            project_scoped: false,
        },
    ),
    (
        "cfw",
        ServiceInfo {
            host: "cfw",
            global: false,
            project_scoped: true,
        },
    ),
    (
        "asm",
        ServiceInfo {
            host: "asm",
            global: false,
            project_scoped: true,
        },
    ),
    (
        "cce",
        ServiceInfo {
            host: "cce",
            global: false,
            project_scoped: true,
        },
    ),
    (
        "ecs",
        ServiceInfo {
            host: "ecs",
            global: false,
            project_scoped: true,
        },
    ),
    (
        "vpc",
        ServiceInfo {
            host: "vpc",
            global: false,
            project_scoped: true,
        },
    ),
    (
        "evs",
        ServiceInfo {
            host: "evs",
            global: false,
            project_scoped: true,
        },
    ),
    (
        "dns",
        ServiceInfo {
            host: "dns",
            global: true,
            project_scoped: false,
        },
    ),
];

pub fn lookup(service: &str) -> Option<ServiceInfo> {
    CATALOG
        .iter()
        .find(|(name, _)| *name == service)
        .map(|(_, info)| *info)
}

pub fn names() -> impl Iterator<Item = &'static str> {
    CATALOG.iter().map(|(name, _)| *name)
}

impl ServiceInfo {
    pub fn endpoint(&self, region: &str, cloud: &str) -> String {
        if self.global {
            format!("https://{}.{cloud}/", self.host)
        } else {
            format!("https://{}.{region}.{cloud}/", self.host)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regional_and_global_endpoints() {
        let cfw = lookup("cfw").unwrap();
        assert_eq!(
            cfw.endpoint("cn-north-4", "myhuaweicloud.com"),
            "https://cfw.cn-north-4.myhuaweicloud.com/"
        );

        let iam = lookup("iam").unwrap();
        assert!(!iam.project_scoped);
        assert_eq!(
            iam.endpoint("cn-north-4", "myhuaweicloud.com"),
            "https://iam.myhuaweicloud.com/"
        );
    }

    #[test]
    fn unknown_service() {
        assert_eq!(lookup("nope"), None);
        assert!(names().any(|name| name == "asm"));
    }
}
