use plume_sim_core::SimError;
use std::cell::RefCell;
use std::ffi::CString;
use std::os::raw::c_char;
use std::ptr;

/// Common interface for FFI error types.
///
/// # Design
/// - `code()` - Returns the error code to be passed across FFI boundary
/// - `msg()` - Returns the error message for diagnostic purposes
pub(crate) trait PlumeSimError {
    /// Returns the error code to be returned across the FFI boundary.
    fn code(&self) -> PlumeSimErrorCode;

    /// Returns the human-readable error message.
    fn msg(&self) -> &str;
}

/// Default implementation of `PlumeSimError` for the FFI error scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DefaultPlumeSimError {
    code: PlumeSimErrorCode,
    msg: String,
}

impl DefaultPlumeSimError {
    /// Create error for null pointer passed where non-null required.
    ///
    /// # Arguments
    /// * `param_name` - The name of the parameter that was null (e.g., `"out_instance"`, `"ptr"`)
    pub fn null_pointer(param_name: &str) -> Self {
        Self {
            code: PlumeSimErrorCode::NullPointer,
            msg: format!("Parameter '{param_name}' cannot be null"),
        }
    }

    /// Create error for poisoned lock.
    ///
    /// # Arguments
    /// * `lock_name` - The name of the lock that was poisoned (e.g., `"RwLock"`)
    pub fn lock_poisoned(lock_name: &str) -> Self {
        Self {
            code: PlumeSimErrorCode::LockPoisoned,
            msg: format!("Lock '{lock_name}' was poisoned by a panic in another thread"),
        }
    }

    /// Create error for an unknown enum discriminant.
    ///
    /// # Arguments
    /// * `param_name` - The field holding the value (e.g., `"medium"`, `"kind"`)
    /// * `value` - The value that was passed
    /// * `max` - Highest accepted value
    pub fn invalid_code(param_name: &str, value: u8, max: u8) -> Self {
        Self::invalid_parameter(format!(
            "Parameter '{param_name}' must be in 0..={max}, got {value}"
        ))
    }

    /// Create error for a caller buffer that is too small.
    ///
    /// # Arguments
    /// * `param_name` - The buffer parameter (e.g., `"out"`)
    /// * `required` - Number of elements needed
    /// * `len` - Number of elements supplied
    pub fn buffer_too_small(param_name: &str, required: usize, len: usize) -> Self {
        Self {
            code: PlumeSimErrorCode::DimensionMismatch,
            msg: format!("Buffer '{param_name}' holds {len} cells, {required} required"),
        }
    }

    /// Create error for invalid parameter.
    ///
    /// # Arguments
    /// * `message` - Description of the error
    pub fn invalid_parameter(message: String) -> Self {
        Self {
            code: PlumeSimErrorCode::InvalidParameter,
            msg: message,
        }
    }
}

impl From<SimError> for DefaultPlumeSimError {
    fn from(error: SimError) -> Self {
        let code = match error {
            SimError::DimensionMismatch { .. } => PlumeSimErrorCode::DimensionMismatch,
            SimError::OutOfBounds { .. } => PlumeSimErrorCode::OutOfBounds,
            SimError::InvalidConfig(_) => PlumeSimErrorCode::InvalidConfig,
            SimError::GpuUnavailable(_) => PlumeSimErrorCode::GpuUnavailable,
        };
        Self {
            code,
            msg: error.to_string(),
        }
    }
}

impl PlumeSimError for DefaultPlumeSimError {
    fn code(&self) -> PlumeSimErrorCode {
        self.code
    }

    fn msg(&self) -> &str {
        &self.msg
    }
}

/// FFI error codes returned by plume simulation functions.
/// Follows standard C convention: 0 = success, non-zero = error.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlumeSimErrorCode {
    /// Operation completed successfully.
    Ok = 0,

    /// Invalid pointer: null pointer passed where non-null required.
    NullPointer = 1,

    /// Lock poisoned: internal synchronization primitive was poisoned by a panic.
    LockPoisoned = 2,

    /// Invalid configuration: grid size below the minimum or bad solver settings.
    InvalidConfig = 3,

    /// Invalid parameter passed to function.
    InvalidParameter = 4,

    /// A grid or buffer does not match the simulation's N×N size.
    DimensionMismatch = 5,

    /// A cell coordinate lies outside the grid.
    OutOfBounds = 6,

    /// The GPU path could not be brought up.
    GpuUnavailable = 7,
}

impl From<DefaultPlumeSimError> for PlumeSimErrorCode {
    fn from(error: DefaultPlumeSimError) -> Self {
        error.code
    }
}

thread_local! {
    /// Thread-local storage for the most recent FFI error (C string, error code).
    /// The CString is stored so returned raw pointers stay valid.
    static LAST_ERROR: RefCell<(Option<CString>, PlumeSimErrorCode)> = const { RefCell::new((None, PlumeSimErrorCode::Ok)) };
}

/// Internal helper to read `LAST_ERROR` thread-local storage (cstring, code).
pub(crate) fn with_last_error<F, R>(f: F) -> R
where
    F: FnOnce(&(Option<CString>, PlumeSimErrorCode)) -> R,
{
    LAST_ERROR.with_borrow(f)
}

/// Internal helper to mutate `LAST_ERROR` thread-local storage (cstring, code).
pub(crate) fn with_last_error_mut<F, R>(f: F) -> R
where
    F: FnOnce(&mut (Option<CString>, PlumeSimErrorCode)) -> R,
{
    LAST_ERROR.with_borrow_mut(f)
}

/// Retrieve the most recent FFI error message as a null-terminated C string.
///
/// Returns:
/// - A borrowed pointer to the error message if an error occurred.
/// - `null` if the last call on this thread succeeded.
///
/// # Thread Safety
/// Error messages are stored per-thread, so each thread has its own error state.
///
/// # Lifetime
/// The returned pointer is valid until the next FFI call on this thread that sets
/// or clears the error.
///
/// **DO NOT FREE THIS POINTER** - it is managed internally.
///
/// Example:
/// ```cpp
/// PlumeSimInstance* sim = nullptr;
/// if (plume_sim_new(2, &sim) != PlumeSimErrorCode::Ok) {
///     const char* error = plume_sim_get_last_error();
///     if (error) {
///         printf("Plume sim creation failed: %s\n", error);
///     }
/// }
/// ```
#[no_mangle]
pub extern "C" fn plume_sim_get_last_error() -> *const c_char {
    with_last_error(|(cstring, _code)| cstring.as_ref().map_or(ptr::null(), |cs| cs.as_ptr()))
}

/// Retrieve the most recent FFI error code.
///
/// Returns `PlumeSimErrorCode::Ok` (0) if the last call on this thread succeeded,
/// otherwise the code of the last failed operation.
#[no_mangle]
pub extern "C" fn plume_sim_get_last_error_code() -> PlumeSimErrorCode {
    with_last_error(|(_cstring, code)| *code)
}
