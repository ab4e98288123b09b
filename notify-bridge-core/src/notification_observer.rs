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
use crate::control_codec::NotifierEvent;
use crate::notification_codec::NotificationMessage;

// External crates
use std::sync::Arc;
use tracing::{debug, error, info, warn};

///////////////////////////////////////////////////////////////////////////
// NotificationObserver
///////////////////////////////////////////////////////////////////////////
pub trait NotificationObserver: Send + 'static {
    fn on_notification(&mut self, message: NotificationMessage);
}

impl<F> NotificationObserver for F
where
    F: FnMut(NotificationMessage) + Send + 'static,
{
    fn on_notification(&mut self, message: NotificationMessage) {
        self(message)
    }
}

///////////////////////////////////////////////////////////////////////////
// NotificationForwarder
///////////////////////////////////////////////////////////////////////////

///
/// Logs every received notification and, when a driver is attached, hands
/// it to the backend session.
///
/// Runs inline in the listener task, so a slow backend delays the next read.
///
#[derive(Debug, Clone, Default)]
pub struct NotificationForwarder {
    driver: Option<Arc<BackendDriver>>,
    forwarded: usize,
    dropped: usize,
}

impl NotificationForwarder {
    pub fn new(driver: Option<Arc<BackendDriver>>) -> Self {
        Self {
            driver,
            ..Default::default()
        }
    }

    pub fn forwarded(&self) -> usize {
        self.forwarded
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }

    fn log(message: &NotificationMessage) {
        match message {
            NotificationMessage::Push(push) => info!(
                sender_id = %push.sender_id,
                query_kind = %char::from(push.query_kind),
                payload = %String::from_utf8_lossy(&push.payload),
                expiry = ?push.expiry,
                "push notification received"
            ),
            NotificationMessage::Plain(plain) => match NotifierEvent::decode(plain.token.as_bytes()) {
                Ok(event) => info!(?event, "notifier event received"),
                Err(_) => info!(token = %plain, "command received"),
            },
        }
    }
}

impl NotificationObserver for NotificationForwarder {
    fn on_notification(&mut self, message: NotificationMessage) {
        Self::log(&message);

        let Some(driver) = &self.driver else {
            return;
        };

        match driver.process_command(&message) {
            Ok(()) => {
                self.forwarded += 1;
                debug!(forwarded = self.forwarded, "notification forwarded to backend");
            }
            Err(e @ DriverError::BackendNotReady { .. }) => {
                self.dropped += 1;
                warn!("notification dropped: {e}");
            }
            Err(e) => {
                self.dropped += 1;
                error!("failed to forward notification: {e}");
            }
        }
    }
}
