use std::ffi::CString;
use std::os::raw::c_char;
use std::ptr;
use std::slice;

use crate::error::{DefaultPlumeSimError, PlumeSimErrorCode};
use crate::helpers::{handle_ffi_result_error, instance_from_ptr, track_error, with_engine};
use crate::instance::PlumeSimInstance;

/// C-compatible simulation statistics.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct PlumeSimStats {
    /// Grid size N
    pub size: u32,
    /// Ticks since creation or the last reset
    pub tick: u64,
    /// Total pollutant over interior cells
    pub total_mass: f64,
    /// Highest cell density
    pub max_density: f32,
    /// Wall-clock duration of the last step (milliseconds)
    pub last_step_ms: f64,
    /// Whether the density step runs on the GPU
    pub is_parallel: bool,
}

/// Borrow a caller buffer as an N×N destination.
///
/// # Safety
/// `out` must be null or point to `len` writable floats.
unsafe fn checked_buffer<'a>(
    out: *mut f32,
    name: &str,
    len: usize,
    required: usize,
) -> Result<&'a mut [f32], DefaultPlumeSimError> {
    if out.is_null() {
        return Err(DefaultPlumeSimError::null_pointer(name));
    }
    if len < required {
        return Err(DefaultPlumeSimError::buffer_too_small(name, required, len));
    }
    // SAFETY: non-null, and the caller guarantees `len >= required` writable floats
    Ok(unsafe { slice::from_raw_parts_mut(out, required) })
}

/// Copy the density grid (row-major, N×N) into `out`.
///
/// On the parallel path the copy reflects the last synchronisation.
///
/// # Returns
/// - `PlumeSimErrorCode::Ok` - `out[0..N*N]` written
/// - `PlumeSimErrorCode::DimensionMismatch` - `len < N*N`
///
/// # Safety
/// - `ptr` must be a valid pointer returned by `plume_sim_new`.
/// - `out` must point to `len` writable floats.
#[no_mangle]
pub unsafe extern "C" fn plume_sim_copy_density(
    ptr: *const PlumeSimInstance,
    out: *mut f32,
    len: usize,
) -> PlumeSimErrorCode {
    handle_ffi_result_error(|| {
        let instance = unsafe { instance_from_ptr(ptr) }?;
        with_engine(instance, |engine| {
            let density = engine.density();
            let target = unsafe { checked_buffer(out, "out", len, density.len()) }?;
            target.copy_from_slice(density.as_slice());
            Ok::<(), DefaultPlumeSimError>(())
        })?
    })
}

/// Copy both velocity components (row-major, N×N each).
///
/// # Safety
/// - `ptr` must be a valid pointer returned by `plume_sim_new`.
/// - `out_u` and `out_v` must each point to `len` writable floats.
#[no_mangle]
pub unsafe extern "C" fn plume_sim_copy_velocity(
    ptr: *const PlumeSimInstance,
    out_u: *mut f32,
    out_v: *mut f32,
    len: usize,
) -> PlumeSimErrorCode {
    handle_ffi_result_error(|| {
        let instance = unsafe { instance_from_ptr(ptr) }?;
        with_engine(instance, |engine| {
            let u = engine.velocity_x();
            let v = engine.velocity_y();
            unsafe { checked_buffer(out_u, "out_u", len, u.len()) }?.copy_from_slice(u.as_slice());
            unsafe { checked_buffer(out_v, "out_v", len, v.len()) }?.copy_from_slice(v.as_slice());
            Ok::<(), DefaultPlumeSimError>(())
        })?
    })
}

/// Fill `out_stats` with a snapshot of the simulation counters.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by `plume_sim_new`.
/// - `out_stats` must be a valid, non-null pointer to writable memory.
#[no_mangle]
pub unsafe extern "C" fn plume_sim_get_stats(
    ptr: *const PlumeSimInstance,
    out_stats: *mut PlumeSimStats,
) -> PlumeSimErrorCode {
    if out_stats.is_null() {
        return track_error(&DefaultPlumeSimError::null_pointer("out_stats"));
    }

    handle_ffi_result_error(|| {
        let instance = unsafe { instance_from_ptr(ptr) }?;
        let stats = with_engine(instance, |engine| PlumeSimStats {
            size: engine.size() as u32,
            tick: engine.tick(),
            total_mass: engine.total_mass(),
            max_density: engine.max_density(),
            last_step_ms: engine.last_step_ms(),
            is_parallel: engine.is_parallel(),
        })?;
        // SAFETY: checked non-null above
        unsafe {
            *out_stats = stats;
        }
        Ok(())
    })
}

/// Why the parallel path was last refused, or null if it never was.
///
/// The returned string is owned by the instance and stays valid until the next
/// call to this function on the same instance or `plume_sim_destroy`.
///
/// **DO NOT FREE THIS POINTER**
///
/// # Safety
/// `ptr` must be a valid pointer returned by `plume_sim_new`.
#[no_mangle]
pub unsafe extern "C" fn plume_sim_get_fallback_reason(ptr: *const PlumeSimInstance) -> *const c_char {
    let mut reason_ptr = ptr::null();
    let code = handle_ffi_result_error(|| {
        let instance = unsafe { instance_from_ptr(ptr) }?;
        let reason = with_engine(instance, |engine| {
            engine.fallback_reason().and_then(|r| CString::new(r).ok())
        })?;
        let mut cached = instance
            .fallback_reason
            .lock()
            .map_err(|_| DefaultPlumeSimError::lock_poisoned("Mutex"))?;
        *cached = reason;
        reason_ptr = cached.as_ref().map_or(ptr::null(), |cs| cs.as_ptr());
        Ok(())
    });

    if code == PlumeSimErrorCode::Ok {
        reason_ptr
    } else {
        ptr::null()
    }
}
