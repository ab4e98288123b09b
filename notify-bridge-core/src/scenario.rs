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
use crate::backend_driver::{BackendDriver, DriverError, SessionState};
use crate::next_task_id;
use crate::notification_codec::NotificationMessage;
use crate::periodic::{PeriodicNotification, PeriodicReport};

// External crates
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

///
/// Backend lifecycle played by the harness alongside the listener:
/// init, pause, process the message, pause, deinit, pause.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverScenario {
    pub message: NotificationMessage,
    /// Pause between init and the first process_command
    pub init_delay: Duration,
    /// Pause between the last process_command and deinit
    pub process_delay: Duration,
    /// Pause after deinit before the scenario ends
    pub deinit_delay: Duration,
    /// Run init in its own task, racing with message processing
    pub init_detached: bool,
    pub repeat: usize,
    pub repeat_period: Duration,
}

impl Default for DriverScenario {
    fn default() -> Self {
        Self {
            message: NotificationMessage::plain("prob_req"),
            init_delay: Duration::from_secs(1),
            process_delay: Duration::ZERO,
            deinit_delay: Duration::ZERO,
            init_detached: false,
            repeat: 1,
            repeat_period: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScenarioReport {
    pub processed: PeriodicReport,
    pub cancelled: bool,
}

/// Returns false when the token fired first
async fn pause(delay: Duration, token: &CancellationToken) -> bool {
    if delay.is_zero() {
        return !token.is_cancelled();
    }
    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        _ = token.cancelled() => false,
    }
}

#[instrument(skip_all, name = "driver_scenario", fields(task = next_task_id()))]
pub async fn run_scenario(
    driver: Arc<BackendDriver>,
    scenario: DriverScenario,
    token: CancellationToken,
) -> Result<ScenarioReport, DriverError> {
    let mut report = ScenarioReport::default();

    let detached_init = if scenario.init_detached {
        let driver = Arc::clone(&driver);
        Some(tokio::spawn(async move { driver.init_async().await }))
    } else {
        driver.init_async().await?;
        None
    };

    if pause(scenario.init_delay, &token).await {
        report.processed = PeriodicNotification::new(
            scenario.message.clone(),
            scenario.repeat_period,
            scenario.repeat.max(1),
        )
        .run(Arc::clone(&driver), token.clone())
        .await;
        info!(processed = ?report.processed, "scenario message processed");
    }

    if let Some(init) = detached_init {
        init.await.map_err(|_| DriverError::Cancelled)??;
    }

    report.cancelled = !pause(scenario.process_delay, &token).await;
    if report.cancelled {
        warn!("scenario cancelled, closing the backend session");
    }

    if driver.state() == SessionState::Ready {
        if let Err(e) = driver.deinit_async().await {
            error!("backend deinit reported a failure: {e}");
        }
    }

    if !report.cancelled {
        report.cancelled = !pause(scenario.deinit_delay, &token).await;
    }
    Ok(report)
}
