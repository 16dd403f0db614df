use crate::error::{with_last_error_mut, DefaultPlumeSimError, PlumeSimError, PlumeSimErrorCode};
use crate::instance::PlumeSimInstance;
use plume_sim_core::DispersionEngine;
use std::ffi::CString;

/// Set the thread-local error message and code.
/// Accepts any type implementing `PlumeSimError` trait.
pub(crate) fn set_last_error(error: &impl PlumeSimError) {
    with_last_error_mut(|(cstring, code)| {
        *cstring = CString::new(error.msg()).ok();
        *code = error.code();
    });
}

/// Track an error by setting it in thread-local storage and returning its code.
#[inline]
pub(crate) fn track_error(error: &impl PlumeSimError) -> PlumeSimErrorCode {
    set_last_error(error);
    error.code()
}

/// Record the error of a failed result, passing successes through.
pub(crate) fn track_result<T>(
    result: Result<T, DefaultPlumeSimError>,
) -> Result<T, PlumeSimErrorCode> {
    result.map_err(|error| track_error(&error))
}

/// Clear the thread-local error message and code.
/// Internal helper called on successful operations.
pub(crate) fn clear_last_error() {
    with_last_error_mut(|(cstring, code)| {
        *cstring = None;
        *code = PlumeSimErrorCode::Ok;
    });
}

/// Run a fallible FFI body and convert its outcome into an error code.
///
/// Success clears the last error; failure records it.
pub(crate) fn handle_ffi_result_error<F>(f: F) -> PlumeSimErrorCode
where
    F: FnOnce() -> Result<(), DefaultPlumeSimError>,
{
    match f() {
        Ok(()) => {
            clear_last_error();
            PlumeSimErrorCode::Ok
        }
        Err(error) => track_error(&error),
    }
}

/// Borrow an instance from a raw pointer handed across the FFI boundary.
///
/// # Safety
/// `ptr` must be null or a live pointer returned by `plume_sim_new`.
pub(crate) unsafe fn instance_from_ptr<'a>(
    ptr: *const PlumeSimInstance,
) -> Result<&'a PlumeSimInstance, DefaultPlumeSimError> {
    // SAFETY: caller guarantees the pointer is null or points to a live instance
    unsafe { ptr.as_ref() }.ok_or_else(|| DefaultPlumeSimError::null_pointer("ptr"))
}

/// Run `f` with shared access to the engine.
pub(crate) fn with_engine<F, T>(instance: &PlumeSimInstance, f: F) -> Result<T, DefaultPlumeSimError>
where
    F: FnOnce(&DispersionEngine) -> T,
{
    let engine = instance
        .engine
        .read()
        .map_err(|_| DefaultPlumeSimError::lock_poisoned("RwLock"))?;
    Ok(f(&engine))
}

/// Run `f` with exclusive access to the engine.
pub(crate) fn with_engine_mut<F, T>(
    instance: &PlumeSimInstance,
    f: F,
) -> Result<T, DefaultPlumeSimError>
where
    F: FnOnce(&mut DispersionEngine) -> T,
{
    let mut engine = instance
        .engine
        .write()
        .map_err(|_| DefaultPlumeSimError::lock_poisoned("RwLock"))?;
    Ok(f(&mut engine))
}
