use plume_sim_core::{DispersionEngine, ExecutionMode, QualityPreset, SolverConfig};
use std::ffi::CString;
use std::ptr;
use std::sync::{Mutex, RwLock};

use crate::error::{DefaultPlumeSimError, PlumeSimErrorCode};
use crate::helpers::{clear_last_error, track_error, track_result};

/// The plume simulation context.
/// Holds one dispersion engine behind a lock.
///
/// # Thread Safety
/// `PlumeSimInstance` can be shared across threads. The engine is protected by an
/// `RwLock`, allowing:
/// - **Multiple concurrent readers** (field copies, queries): `.read()` lock
/// - **Exclusive writer** (steps, obstacle edits, resets): `.write()` lock
///
/// # Usage
/// ```cpp
/// PlumeSimInstance* sim = nullptr;
/// if (plume_sim_new(80, &sim) != PlumeSimErrorCode::Ok) {
///     return;
/// }
///
/// PlumeSimParams params = plume_sim_default_params();
/// PlumeSimSource chimney = { 20, 40, 0, false, 0.0f, true };
/// plume_sim_step(sim, &params, &chimney, 1, true);
///
/// std::vector<float> density(80 * 80);
/// plume_sim_copy_density(sim, density.data(), density.size());
///
/// plume_sim_destroy(sim);
/// ```
pub struct PlumeSimInstance {
    pub(crate) engine: RwLock<DispersionEngine>,
    /// Last fallback reason handed out by `plume_sim_get_fallback_reason`.
    /// Kept here so the returned pointer outlives the call.
    pub(crate) fallback_reason: Mutex<Option<CString>>,
}

impl PlumeSimInstance {
    /// Creates a new instance from a solver configuration.
    ///
    /// # Errors
    ///
    /// Returns `PlumeSimErrorCode::InvalidConfig` if the configuration is rejected
    /// by the engine.
    pub(crate) fn new(config: SolverConfig) -> Result<Box<Self>, DefaultPlumeSimError> {
        let engine = DispersionEngine::new(config)?;
        Ok(Box::new(Self {
            engine: RwLock::new(engine),
            fallback_reason: Mutex::new(None),
        }))
    }
}

/// Write a freshly created instance (or null) through `out_instance`.
///
/// # Safety
/// `out_instance` must be non-null and writable.
unsafe fn publish(
    result: Result<Box<PlumeSimInstance>, DefaultPlumeSimError>,
    out_instance: *mut *mut PlumeSimInstance,
) -> PlumeSimErrorCode {
    match track_result(result) {
        Ok(instance) => {
            unsafe {
                *out_instance = Box::into_raw(instance);
            }
            clear_last_error();
            PlumeSimErrorCode::Ok
        }
        Err(code) => {
            unsafe {
                // Set to null on error (per documentation contract)
                *out_instance = ptr::null_mut();
            }
            code
        }
    }
}

/// Create a sequential simulation on a `size`×`size` grid.
///
/// Returns
/// - `PlumeSimErrorCode::Ok` (0) - success, `out_instance` contains a valid pointer
/// - `PlumeSimErrorCode::NullPointer` - `out_instance` is null
/// - `PlumeSimErrorCode::InvalidConfig` - `size` is below the minimum grid size
///
/// # Safety
///
/// - `out_instance` must be a valid, non-null pointer to writable memory.
/// - The caller takes ownership of the returned instance and MUST call
///   `plume_sim_destroy` exactly once.
#[no_mangle]
pub unsafe extern "C" fn plume_sim_new(
    size: usize,
    out_instance: *mut *mut PlumeSimInstance,
) -> PlumeSimErrorCode {
    if out_instance.is_null() {
        return track_error(&DefaultPlumeSimError::null_pointer("out_instance"));
    }

    unsafe { publish(PlumeSimInstance::new(SolverConfig::with_grid_size(size)), out_instance) }
}

/// Create a simulation from a quality preset.
///
/// # Arguments
/// * `quality` - 0=Low, 1=Medium, 2=High, 3=Ultra
/// * `parallel` - Request the GPU path; falls back to the CPU when unavailable
/// * `out_instance` - Receives the created instance
///
/// # Safety
///
/// Same contract as `plume_sim_new`.
#[no_mangle]
pub unsafe extern "C" fn plume_sim_new_with_quality(
    quality: u8,
    parallel: bool,
    out_instance: *mut *mut PlumeSimInstance,
) -> PlumeSimErrorCode {
    if out_instance.is_null() {
        return track_error(&DefaultPlumeSimError::null_pointer("out_instance"));
    }

    let preset = match quality {
        0 => QualityPreset::Low,
        1 => QualityPreset::Medium,
        2 => QualityPreset::High,
        3 => QualityPreset::Ultra,
        _ => {
            return unsafe {
                publish(
                    Err(DefaultPlumeSimError::invalid_code("quality", quality, 3)),
                    out_instance,
                )
            };
        }
    };

    let mut config = SolverConfig::from_quality(preset);
    if parallel {
        config.execution = ExecutionMode::Parallel;
    }
    unsafe { publish(PlumeSimInstance::new(config), out_instance) }
}

/// Destroys an instance previously created by `plume_sim_new`.
///
/// If `ptr` is null, this function is a no-op.
///
/// # Safety
/// - The pointer MUST have been created by `plume_sim_new` or
///   `plume_sim_new_with_quality`.
/// - The pointer MUST NOT have been freed already.
/// - After calling this function, the caller must not use the pointer again.
#[no_mangle]
pub unsafe extern "C" fn plume_sim_destroy(ptr: *mut PlumeSimInstance) {
    if ptr.is_null() {
        return;
    }

    // SAFETY: the pointer came from `Box::into_raw` in `publish` and is freed once
    unsafe {
        drop(Box::from_raw(ptr));
    }
}
