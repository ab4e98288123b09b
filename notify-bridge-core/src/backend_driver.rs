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
use crate::notification_codec::{NotificationMessage, PushGrammar};

// External crates
use notifier_core::{BackendError, NotifierBackend};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Uninitialized,
    Ready,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendOp {
    Init,
    ProcessCommand,
    Deinit,
}

impl fmt::Display for BackendOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Init => "init",
            Self::ProcessCommand => "process_command",
            Self::Deinit => "deinit",
        })
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("Cannot {op} a session in state {from:?}")]
    InvalidTransition { from: SessionState, op: BackendOp },
    #[error("Backend session is not ready: {state:?}")]
    BackendNotReady { state: SessionState },
    #[error("Backend {op} failed: {source}")]
    Backend { op: BackendOp, source: BackendError },
    #[error("Backend call did not complete")]
    Cancelled,
}

impl DriverError {
    ///
    /// Raw status reported by the backend, if the error comes from it
    ///
    pub fn status(&self) -> Option<i32> {
        match self {
            Self::Backend { source, .. } => source.status(),
            _ => None,
        }
    }
}

///
/// Owner of the single backend session of the process.
///
/// Every transition and every backend call happens under one lock, so a
/// message racing with `init` is either processed after it or rejected.
///
pub struct BackendDriver {
    backend: Arc<dyn NotifierBackend>,
    grammar: PushGrammar,
    state: Mutex<SessionState>,
}

impl fmt::Debug for BackendDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendDriver")
            .field("state", &self.state())
            .field("grammar", &self.grammar)
            .finish_non_exhaustive()
    }
}

impl BackendDriver {
    pub fn new(backend: Arc<dyn NotifierBackend>) -> Self {
        Self::with_grammar(backend, PushGrammar::default())
    }

    ///
    /// Messages are encoded with `grammar` before reaching the backend, so it
    /// must match the grammar they were decoded with
    ///
    pub fn with_grammar(backend: Arc<dyn NotifierBackend>, grammar: PushGrammar) -> Self {
        Self {
            backend,
            grammar,
            state: Mutex::new(SessionState::Uninitialized),
        }
    }

    pub fn grammar(&self) -> PushGrammar {
        self.grammar
    }

    pub fn state(&self) -> SessionState {
        *self.lock()
    }

    pub fn init(&self) -> Result<(), DriverError> {
        let state = self.lock();
        if *state != SessionState::Uninitialized {
            return Err(DriverError::InvalidTransition {
                from: *state,
                op: BackendOp::Init,
            });
        }

        self.transition(state, BackendOp::Init, SessionState::Ready, |backend| {
            backend.init()
        })
    }

    pub fn process_command(&self, message: &NotificationMessage) -> Result<(), DriverError> {
        self.process_raw(&self.grammar.encode(message))
    }

    ///
    /// Forwards an already encoded message
    ///
    pub fn process_raw(&self, message: &[u8]) -> Result<(), DriverError> {
        let state = self.lock();
        if *state != SessionState::Ready {
            debug!(state = ?*state, "dropping message, backend session not ready");
            return Err(DriverError::BackendNotReady { state: *state });
        }

        self.backend.process_command(message).map_err(|source| {
            warn!(%source, "backend failed to process message");
            DriverError::Backend {
                op: BackendOp::ProcessCommand,
                source,
            }
        })?;
        debug!(len = message.len(), "message processed by backend");
        Ok(())
    }

    pub fn deinit(&self) -> Result<(), DriverError> {
        let mut state = self.lock();
        if *state != SessionState::Ready {
            return Err(DriverError::InvalidTransition {
                from: *state,
                op: BackendOp::Deinit,
            });
        }

        // the session is gone whatever the backend reports
        let result = self.backend.deinit();
        *state = SessionState::Closed;
        info!("backend session closed");

        result.map_err(|source| {
            warn!(%source, "backend reported a failure on deinit");
            DriverError::Backend {
                op: BackendOp::Deinit,
                source,
            }
        })
    }

    pub async fn init_async(self: &Arc<Self>) -> Result<(), DriverError> {
        let driver = Arc::clone(self);
        run_blocking(move || driver.init()).await
    }

    pub async fn process_command_async(
        self: &Arc<Self>,
        message: NotificationMessage,
    ) -> Result<(), DriverError> {
        let driver = Arc::clone(self);
        run_blocking(move || driver.process_command(&message)).await
    }

    pub async fn deinit_async(self: &Arc<Self>) -> Result<(), DriverError> {
        let driver = Arc::clone(self);
        run_blocking(move || driver.deinit()).await
    }

    fn transition(
        &self,
        mut state: MutexGuard<'_, SessionState>,
        op: BackendOp,
        target: SessionState,
        call: impl FnOnce(&dyn NotifierBackend) -> Result<(), BackendError>,
    ) -> Result<(), DriverError> {
        match call(self.backend.as_ref()) {
            Ok(()) => {
                info!(%op, from = ?*state, to = ?target, "backend session transition");
                *state = target;
                Ok(())
            }
            Err(source) => {
                warn!(%op, %source, state = ?*state, "backend transition failed");
                Err(DriverError::Backend { op, source })
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn run_blocking(
    call: impl FnOnce() -> Result<(), DriverError> + Send + 'static,
) -> Result<(), DriverError> {
    tokio::task::spawn_blocking(call)
        .await
        .map_err(|_| DriverError::Cancelled)?
}
