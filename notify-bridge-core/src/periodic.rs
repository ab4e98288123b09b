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
use crate::backend_driver::{BackendDriver, DriverError};
use crate::next_task_id;
use crate::notification_codec::NotificationMessage;

// External crates
use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

///
/// Re-sends the same message to the backend a fixed number of times
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodicNotification {
    pub message: NotificationMessage,
    pub period: Duration,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeriodicReport {
    pub sent: usize,
    pub failed: usize,
}

impl PeriodicNotification {
    pub fn new(message: NotificationMessage, period: Duration, count: usize) -> Self {
        Self {
            message,
            period,
            count,
        }
    }

    ///
    /// Sends the message `count` times, the first one immediately.
    ///
    /// Stops early once the session is no longer ready or the token is
    /// cancelled.
    ///
    #[instrument(skip_all, name = "periodic_notification", fields(task = next_task_id()))]
    pub async fn run(self, driver: Arc<BackendDriver>, token: CancellationToken) -> PeriodicReport {
        let mut report = PeriodicReport::default();
        let mut ticker = interval(self.period.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        for round in 0..self.count {
            tokio::select! {
                _ = ticker.tick() => (),
                _ = token.cancelled() => {
                    info!(round, "periodic notification cancelled");
                    break;
                }
            }

            match driver.process_command_async(self.message.clone()).await {
                Ok(()) => report.sent += 1,
                Err(e @ DriverError::BackendNotReady { .. }) => {
                    warn!(round, "stopping periodic notification: {e}");
                    report.failed += 1;
                    break;
                }
                Err(e) => {
                    warn!(round, "periodic notification failed: {e}");
                    report.failed += 1;
                }
            }
            debug!(round, ?report, "periodic notification round done");
        }

        report
    }
}
