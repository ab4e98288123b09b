mod error;

pub use error::*;

///
/// The native notification-processing component driven by the harness.
///
/// Calls are sequenced by the caller (init, then any number of
/// process_command, then deinit). Implementations may be invoked from any
/// thread, but never concurrently.
///
pub trait NotifierBackend: Send + Sync {
    ///
    /// Initializes the backend session
    ///
    fn init(&self) -> Result<(), BackendError>;

    ///
    /// Forwards one encoded notification message to the backend
    ///
    fn process_command(&self, message: &[u8]) -> Result<(), BackendError>;

    ///
    /// Tears down the backend session
    ///
    fn deinit(&self) -> Result<(), BackendError>;
}
