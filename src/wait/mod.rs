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

//! Bounded polling of a remote resource status until it reaches a terminal value

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::time::{sleep_until, timeout_at, Instant};
use tracing::{debug, info};

use crate::client::ClientError;
use crate::utils::DisplayJoinable;

mod rest;

pub use rest::RestStatusFetcher;

/// Status synthesized when a delete confirmation observes a 404
pub const DELETED: &str = "Deleted";

pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(20);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// How a 404 is interpreted while polling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollMode {
    /// Waiting for a resource to come up: a 404 is a hard error
    Create,
    /// Waiting for a resource to go away: a 404 means it is gone
    Delete,
}

/// Result of a single remote status lookup
#[derive(Debug)]
pub enum FetchOutcome {
    Found { status: Option<String>, body: Value },
    NotFound,
    Failed(ClientError),
}

#[derive(Debug)]
pub struct Snapshot {
    pub resource_id: String,
    pub outcome: FetchOutcome,
}

impl Snapshot {
    pub fn found(resource_id: impl Into<String>, status: Option<&str>, body: Value) -> Self {
        Self {
            resource_id: resource_id.into(),
            outcome: FetchOutcome::Found {
                status: status.map(str::to_owned),
                body,
            },
        }
    }

    pub fn not_found(resource_id: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            outcome: FetchOutcome::NotFound,
        }
    }

    pub fn failed(resource_id: impl Into<String>, error: ClientError) -> Self {
        Self {
            resource_id: resource_id.into(),
            outcome: FetchOutcome::Failed(error),
        }
    }

    fn status(&self) -> Option<&str> {
        match &self.outcome {
            FetchOutcome::Found { status, .. } => status.as_deref(),
            FetchOutcome::NotFound => Some(DELETED),
            FetchOutcome::Failed(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Pending,
    Target,
    Fatal,
    NotFound,
    Unparseable,
    Failed,
}

/// Capability performing one remote status lookup
#[async_trait]
pub trait StatusFetcher: Send + Sync {
    async fn fetch(&self) -> Snapshot;
}

#[derive(Debug, Error)]
pub enum WaitError {
    #[error("timeout while waiting for state to become '{target}' (last state: '{}', timeout: {timeout:?})", .last_status.as_deref().unwrap_or(""))]
    Timeout {
        target: String,
        last_status: Option<String>,
        timeout: Duration,
        attempts: u32,
    },
    #[error("unexpected status ({0})")]
    FatalStatus(String),
    #[error("resource ({0}) was not found")]
    NotFound(String),
    #[error("error parsing the status of resource ({0}) from response body")]
    Unparseable(String),
    #[error(transparent)]
    Transport(ClientError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidPoller {
    #[error("at least one target status is required")]
    EmptyTarget,
    #[error("status `{0}` is both a target and a fatal status")]
    Overlap(String),
}

/// Final observation of a successful wait
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub status: String,
    pub body: Value,
    pub attempts: u32,
}

#[derive(Debug, Clone)]
pub struct Poller {
    target: BTreeSet<String>,
    fatal: BTreeSet<String>,
    mode: PollMode,
    initial_delay: Duration,
    poll_interval: Duration,
    timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct PollerBuilder {
    target: BTreeSet<String>,
    fatal: BTreeSet<String>,
    mode: PollMode,
    initial_delay: Duration,
    poll_interval: Duration,
    timeout: Duration,
}

impl PollerBuilder {
    pub fn target<I, S>(mut self, statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target.extend(statuses.into_iter().map(Into::into));
        self
    }

    pub fn fatal<I, S>(mut self, statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fatal.extend(statuses.into_iter().map(Into::into));
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<Poller, InvalidPoller> {
        if self.target.is_empty() {
            return Err(InvalidPoller::EmptyTarget);
        }
        if let Some(status) = self.target.intersection(&self.fatal).next() {
            return Err(InvalidPoller::Overlap(status.clone()));
        }
        Ok(Poller {
            target: self.target,
            fatal: self.fatal,
            mode: self.mode,
            initial_delay: self.initial_delay,
            poll_interval: self.poll_interval,
            timeout: self.timeout,
        })
    }
}

impl Poller {
    pub fn builder(mode: PollMode) -> PollerBuilder {
        PollerBuilder {
            target: Default::default(),
            fatal: Default::default(),
            mode,
            initial_delay: DEFAULT_INITIAL_DELAY,
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn mode(&self) -> PollMode {
        self.mode
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Target statuses, for messages
    pub fn describe_target(&self) -> String {
        self.target.iter().join_with(", ").to_string()
    }

    pub fn classify(&self, snapshot: &Snapshot) -> Classification {
        match &snapshot.outcome {
            FetchOutcome::Failed(_) => Classification::Failed,
            FetchOutcome::NotFound => Classification::NotFound,
            FetchOutcome::Found { status: None, .. } => Classification::Unparseable,
            FetchOutcome::Found {
                status: Some(status),
                ..
            } => {
                if self.fatal.contains(status) {
                    Classification::Fatal
                } else if self.target.contains(status) {
                    Classification::Target
                } else {
                    Classification::Pending
                }
            }
        }
    }

    fn timed_out(&self, last_status: Option<String>, attempts: u32) -> WaitError {
        WaitError::Timeout {
            target: self.describe_target(),
            last_status,
            timeout: self.timeout,
            attempts,
        }
    }

    /// Poll `fetcher` until a terminal status, an error, or the timeout
    ///
    /// A fetch may start as long as the elapsed time does not exceed the timeout.
    pub async fn wait<F>(&self, fetcher: &F) -> Result<Resolved, WaitError>
    where
        F: StatusFetcher + ?Sized,
    {
        debug!(
            mode = ?self.mode(),
            target = %self.describe_target(),
            timeout = ?self.timeout(),
            "waiting for status"
        );
        let start = Instant::now();
        let deadline = start.checked_add(self.timeout);
        let mut next = start.checked_add(self.initial_delay);
        let mut attempts = 0;
        let mut last_status = None;

        loop {
            let at = match (next, deadline) {
                (Some(at), Some(deadline)) if at <= deadline => at,
                (Some(at), None) => at,
                _ => return Err(self.timed_out(last_status, attempts)),
            };
            sleep_until(at).await;

            // The deadline also bounds a fetch in flight
            attempts += 1;
            let fetched = match deadline {
                Some(deadline) => timeout_at(deadline, fetcher.fetch()).await.ok(),
                None => Some(fetcher.fetch().await),
            };
            let Some(snapshot) = fetched else {
                return Err(self.timed_out(last_status, attempts));
            };
            let classification = self.classify(&snapshot);
            debug!(
                resource = %snapshot.resource_id,
                attempt = attempts,
                status = snapshot.status().unwrap_or_default(),
                ?classification,
                "polled resource status"
            );

            let Snapshot {
                resource_id,
                outcome,
            } = snapshot;
            match (classification, outcome) {
                (Classification::Target, FetchOutcome::Found { status, body }) => {
                    let status = status.unwrap_or_default();
                    info!(resource = %resource_id, %status, attempts, "resource reached target status");
                    return Ok(Resolved {
                        status,
                        body,
                        attempts,
                    });
                }
                (Classification::Fatal, FetchOutcome::Found { status, .. }) => {
                    return Err(WaitError::FatalStatus(status.unwrap_or_default()));
                }
                (Classification::NotFound, _) => match self.mode {
                    PollMode::Delete => {
                        info!(resource = %resource_id, attempts, "resource is gone");
                        return Ok(Resolved {
                            status: DELETED.to_owned(),
                            body: Value::Null,
                            attempts,
                        });
                    }
                    PollMode::Create => return Err(WaitError::NotFound(resource_id)),
                },
                (Classification::Unparseable, _) => {
                    return Err(WaitError::Unparseable(resource_id));
                }
                (_, FetchOutcome::Failed(err)) => return Err(WaitError::Transport(err)),
                (_, FetchOutcome::Found { status, .. }) => {
                    last_status = status;
                }
                (_, FetchOutcome::NotFound) => {}
            }

            next = Instant::now().checked_add(self.poll_interval);
        }
    }
}
