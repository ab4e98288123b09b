mod library;
mod symbols;

use crate::{BackendError, NotifierBackend};
use library::LibraryHandle;
use std::ffi::CString;
use std::os::raw::{c_char, c_int, c_void};
use std::path::Path;
use tracing::{debug, trace};

pub use symbols::*;

type InitFn = unsafe extern "C" fn(*mut c_void, *mut c_void) -> c_int;
type ProcessCommandFn = unsafe extern "C" fn(*const c_char) -> c_int;
type DeinitFn = unsafe extern "C" fn() -> c_int;

///
/// A notifier backend loaded from a shared object at runtime.
///
/// Only one `NativeBackend` may exist per library path at a time; the
/// library is unloaded when the backend is dropped.
///
#[derive(Debug)]
pub struct NativeBackend {
    init: InitFn,
    process_command: ProcessCommandFn,
    deinit: DeinitFn,
    library: LibraryHandle,
}

impl NativeBackend {
    ///
    /// Loads `path` and resolves the entry points named by `symbols`
    ///
    pub fn load(path: impl AsRef<Path>, symbols: BackendSymbols) -> Result<Self, BackendError> {
        let library = LibraryHandle::open(path.as_ref())?;

        // SAFETY: the notifier libraries export these symbols with the C signatures above
        let (init, process_command, deinit) = unsafe {
            (
                std::mem::transmute::<*mut c_void, InitFn>(library.symbol(symbols.init)?),
                std::mem::transmute::<*mut c_void, ProcessCommandFn>(
                    library.symbol(symbols.process_command)?,
                ),
                std::mem::transmute::<*mut c_void, DeinitFn>(library.symbol(symbols.deinit)?),
            )
        };

        debug!(path = ?library.path(), ?symbols, "notifier library loaded");
        Ok(Self {
            init,
            process_command,
            deinit,
            library,
        })
    }

    pub fn path(&self) -> &Path {
        self.library.path()
    }
}

impl NotifierBackend for NativeBackend {
    fn init(&self) -> Result<(), BackendError> {
        let status = unsafe { (self.init)(std::ptr::null_mut(), std::ptr::null_mut()) };
        trace!(status, "init");
        BackendError::map(status, || ())
    }

    fn process_command(&self, message: &[u8]) -> Result<(), BackendError> {
        let message = CString::new(message)
            .map_err(|e| BackendError::InvalidMessage(e.nul_position()))?;
        let status = unsafe { (self.process_command)(message.as_ptr()) };
        trace!(status, "process_command");
        BackendError::map(status, || ())
    }

    fn deinit(&self) -> Result<(), BackendError> {
        let status = unsafe { (self.deinit)() };
        trace!(status, "deinit");
        BackendError::map(status, || ())
    }
}
