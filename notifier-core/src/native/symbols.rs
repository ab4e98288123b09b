use std::ffi::CStr;

///
/// Names of the three entry points a notifier shared object exports
///
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct BackendSymbols {
    pub init: &'static CStr,
    pub process_command: &'static CStr,
    pub deinit: &'static CStr,
}

impl BackendSymbols {
    ///
    /// Entry points of the access-point notifier (`notifier.so`)
    ///
    pub const fn access_point() -> Self {
        Self {
            init: c"wpa_not_init",
            process_command: c"not_process_command",
            deinit: c"wpa_not_deinit",
        }
    }

    ///
    /// Entry points of the station notifier (`wpa_not.so`)
    ///
    pub const fn station() -> Self {
        Self {
            init: c"wpa_not_init",
            process_command: c"wpa_not_process_command",
            deinit: c"wpa_not_deinit",
        }
    }
}
