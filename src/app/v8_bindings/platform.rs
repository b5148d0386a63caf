//! Global V8 platform
//!
//! V8 needs exactly one platform per process, created before the first
//! isolate and kept alive until exit. [`initialize_v8_platform`] is safe to
//! call from any thread any number of times; only the first call does work.
//!
//! ```no_run
//! use uiforge::app::v8_bindings::initialize_v8_platform;
//!
//! initialize_v8_platform().expect("V8 initialization failed");
//! ```

#![warn(clippy::all, rust_2018_idioms)]

use once_cell::sync::OnceCell;

static GLOBAL_V8_PLATFORM: OnceCell<v8::SharedRef<v8::Platform>> = OnceCell::new();

/// Initialize the V8 platform once.
///
/// Uses the default worker pool (sized from the CPU count) and no idle task
/// support. Evaluations never need idle tasks.
pub fn initialize_v8_platform() -> Result<(), String> {
    GLOBAL_V8_PLATFORM
        .get_or_try_init(|| {
            let platform = v8::new_default_platform(0, false).make_shared();
            v8::V8::initialize_platform(platform.clone());
            v8::V8::initialize();

            log_info!("V8 platform initialized (version {})", v8::V8::get_version());
            Ok::<_, String>(platform)
        })
        .map(|_| ())
}

pub fn is_v8_initialized() -> bool {
    GLOBAL_V8_PLATFORM.get().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialization_is_idempotent() {
        assert!(initialize_v8_platform().is_ok());
        assert!(initialize_v8_platform().is_ok());
        assert!(is_v8_initialized());
    }
}
