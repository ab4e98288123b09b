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
// ───── Base modules ─────
pub mod backend_driver;
pub mod control_codec;
pub mod frame_codec;
pub mod listener;
pub mod notification_codec;
pub mod notification_observer;
pub mod periodic;
pub mod scenario;
pub mod sender;
pub mod supervisor;

use std::sync::atomic::{AtomicU32, Ordering};
// ───── Reexports: commonly used components ─────
pub use backend_driver::{BackendDriver, BackendOp, DriverError, SessionState};
pub use frame_codec::NotificationFrameCodec;
pub use listener::{ListenerConfig, ListenerError, ListenerSummary, NotificationListener};
pub use notification_codec::{
    decode, encode, DecodeError, NotificationMessage, PlainCommand, PushGrammar, PushNotification,
    SenderId,
};
pub use notification_observer::{NotificationForwarder, NotificationObserver};
pub use sender::NotificationSender;
pub use supervisor::Supervisor;

pub fn next_task_id() -> u32 {
    static TASK_ID: AtomicU32 = AtomicU32::new(0);
    TASK_ID.fetch_add(1, Ordering::Relaxed)
}
