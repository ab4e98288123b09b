use crate::{BackendError, NotifierBackend};
use std::os::raw::c_int;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum BackendCall {
    Init,
    ProcessCommand(Vec<u8>),
    Deinit,
}

#[derive(Debug, Default)]
struct LoopbackState {
    calls: Vec<BackendCall>,
    init_status: c_int,
    process_status: c_int,
    deinit_status: c_int,
}

///
/// In-process backend which records every call and answers with
/// configurable status codes (all `0` by default)
///
#[derive(Debug, Default)]
pub struct LoopbackBackend {
    state: Mutex<LoopbackState>,
}

impl LoopbackBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_statuses(init: c_int, process_command: c_int, deinit: c_int) -> Self {
        let backend = Self::default();
        backend.set_statuses(init, process_command, deinit);
        backend
    }

    pub fn set_statuses(&self, init: c_int, process_command: c_int, deinit: c_int) {
        let mut state = self.lock();
        state.init_status = init;
        state.process_status = process_command;
        state.deinit_status = deinit;
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.lock().calls.clone()
    }

    pub fn processed(&self) -> Vec<Vec<u8>> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::ProcessCommand(message) => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LoopbackState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl NotifierBackend for LoopbackBackend {
    fn init(&self) -> Result<(), BackendError> {
        let mut state = self.lock();
        state.calls.push(BackendCall::Init);
        BackendError::map(state.init_status, || ())
    }

    fn process_command(&self, message: &[u8]) -> Result<(), BackendError> {
        let mut state = self.lock();
        state.calls.push(BackendCall::ProcessCommand(message.to_vec()));
        BackendError::map(state.process_status, || ())
    }

    fn deinit(&self) -> Result<(), BackendError> {
        let mut state = self.lock();
        state.calls.push(BackendCall::Deinit);
        BackendError::map(state.deinit_status, || ())
    }
}
