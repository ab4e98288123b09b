/*
 * If not stated otherwise in this file or this component's LICENSE file the
 * following copyright and licenses apply:
 *
 * Copyright 2025 RDK Management
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 * http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
*/

#![deny(warnings)]
// Internal modules
use crate::next_task_id;

// External crates
use std::future::Future;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, Instrument};

#[derive(Debug)]
pub struct TaskOutcome {
    pub name: &'static str,
    pub result: anyhow::Result<()>,
}

///
/// Owns the harness tasks and the token that stops them.
///
/// Dropping the supervisor aborts whatever is still running; `shutdown`
/// cancels and joins every task instead.
///
#[derive(Debug, Default)]
pub struct Supervisor {
    tasks: JoinSet<TaskOutcome>,
    token: CancellationToken,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn spawn<F>(&mut self, name: &'static str, task: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        debug!(name, "spawning supervised task");
        self.tasks.spawn(
            async move {
                let result = task.await;
                TaskOutcome { name, result }
            }
            .instrument(info_span!(parent: None, "supervised", name, task = next_task_id())),
        );
    }

    ///
    /// Waits for the next task to finish, `None` once all are joined
    ///
    pub async fn join_next(&mut self) -> Option<TaskOutcome> {
        let joined = self.tasks.join_next().await?;
        let outcome = joined.unwrap_or_else(|e| TaskOutcome {
            name: "unknown",
            result: Err(anyhow::anyhow!("task did not complete: {e}")),
        });

        match &outcome.result {
            Ok(()) => info!(name = outcome.name, "task finished"),
            Err(e) => error!(name = outcome.name, "task failed: {e:#}"),
        }
        Some(outcome)
    }

    pub async fn wait(&mut self) -> Vec<TaskOutcome> {
        let mut outcomes = Vec::with_capacity(self.tasks.len());
        while let Some(outcome) = self.join_next().await {
            outcomes.push(outcome);
        }
        outcomes
    }

    pub async fn shutdown(mut self) -> Vec<TaskOutcome> {
        info!(tasks = self.tasks.len(), "shutting down");
        self.token.cancel();
        self.wait().await
    }
}
