use crate::BackendError;
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::ffi::{c_void, CStr, CString};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

static LOADED_LIBRARIES: Lazy<Mutex<HashSet<PathBuf>>> = Lazy::new(Default::default);

///
/// Process-wide reservation of a library path, released on drop
///
#[derive(Debug)]
struct PathClaim(PathBuf);

impl PathClaim {
    fn acquire(path: &Path) -> Result<Self, BackendError> {
        let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let mut loaded = LOADED_LIBRARIES
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if !loaded.insert(path.clone()) {
            return Err(BackendError::LibraryInUse(path));
        }
        Ok(Self(path))
    }
}

impl Drop for PathClaim {
    fn drop(&mut self) {
        LOADED_LIBRARIES
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.0);
    }
}

///
/// A shared object opened with `dlopen`, closed on drop
///
#[derive(Debug)]
pub(crate) struct LibraryHandle {
    raw: *mut c_void,
    path: PathBuf,
    _claim: PathClaim,
}

unsafe impl Send for LibraryHandle {}
unsafe impl Sync for LibraryHandle {}

impl LibraryHandle {
    pub(crate) fn open(path: &Path) -> Result<Self, BackendError> {
        let claim = PathClaim::acquire(path)?;
        let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|e| {
            BackendError::LibraryLoad {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        })?;

        let raw = unsafe { libc::dlopen(c_path.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL) };
        if raw.is_null() {
            return Err(BackendError::LibraryLoad {
                path: path.to_path_buf(),
                reason: last_dl_error(),
            });
        }

        Ok(Self {
            raw,
            path: path.to_path_buf(),
            _claim: claim,
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    ///
    /// Resolves `symbol` to its address.
    ///
    /// # Safety
    /// The caller must transmute the address to the exact signature exported
    /// by the library and must not use it after the handle is dropped.
    ///
    pub(crate) unsafe fn symbol(&self, symbol: &CStr) -> Result<*mut c_void, BackendError> {
        // clear any stale error so a NULL-valued symbol can be told apart from a missing one
        libc::dlerror();
        let address = libc::dlsym(self.raw, symbol.as_ptr());
        if address.is_null() {
            return Err(BackendError::MissingSymbol {
                symbol: symbol.to_string_lossy().into_owned(),
                reason: last_dl_error(),
            });
        }
        Ok(address)
    }
}

impl Drop for LibraryHandle {
    fn drop(&mut self) {
        if unsafe { libc::dlclose(self.raw) } != 0 {
            tracing::warn!(path = ?self.path, "dlclose failed: {}", last_dl_error());
        }
    }
}

fn last_dl_error() -> String {
    let message = unsafe { libc::dlerror() };
    if message.is_null() {
        return "unknown dynamic loader error".to_string();
    }
    unsafe { CStr::from_ptr(message) }
        .to_string_lossy()
        .into_owned()
}
