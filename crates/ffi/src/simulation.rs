use plume_sim_core::{DispersionEngine, ExecutionMode, ObstacleMask};
use std::slice;

use crate::error::{DefaultPlumeSimError, PlumeSimErrorCode};
use crate::helpers::{handle_ffi_result_error, instance_from_ptr, with_engine_mut};
use crate::instance::PlumeSimInstance;
use crate::types::{params_from_raw, source_from_raw, PlumeSimParams, PlumeSimSource};

/// Advance the simulation by one tick.
///
/// Thread-safe: acquires the `RwLock` write lock for the step.
///
/// # Arguments
/// * `params` - Parameters for this tick (must not be null)
/// * `sources` - Array of `count` sources; may be null when `count` is 0
/// * `synchronize` - Copy GPU results back to host memory after the step
///
/// # Safety
/// - `ptr` must be a valid pointer returned by `plume_sim_new`.
/// - `params` must point to a valid `PlumeSimParams`.
/// - `sources` must point to `count` readable `PlumeSimSource` values.
#[no_mangle]
pub unsafe extern "C" fn plume_sim_step(
    ptr: *const PlumeSimInstance,
    params: *const PlumeSimParams,
    sources: *const PlumeSimSource,
    count: usize,
    synchronize: bool,
) -> PlumeSimErrorCode {
    handle_ffi_result_error(|| {
        let instance = unsafe { instance_from_ptr(ptr) }?;
        // SAFETY: caller guarantees `params` is null or valid
        let raw_params = unsafe { params.as_ref() }
            .ok_or_else(|| DefaultPlumeSimError::null_pointer("params"))?;
        let params = params_from_raw(raw_params)?;

        let raw_sources: &[PlumeSimSource] = if count == 0 {
            &[]
        } else if sources.is_null() {
            return Err(DefaultPlumeSimError::null_pointer("sources"));
        } else {
            // SAFETY: caller guarantees `count` readable sources
            unsafe { slice::from_raw_parts(sources, count) }
        };
        let sources = raw_sources
            .iter()
            .map(source_from_raw)
            .collect::<Result<Vec<_>, _>>()?;

        with_engine_mut(instance, |engine| {
            engine.step_with(&params, &sources, synchronize);
        })
    })
}

/// Replace the obstacle mask.
///
/// `mask` holds `len` bytes in row-major order; any non-zero byte marks an
/// impermeable cell. `len` must equal N×N.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by `plume_sim_new`.
/// - `mask` must point to `len` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn plume_sim_set_obstacles(
    ptr: *const PlumeSimInstance,
    mask: *const u8,
    len: usize,
) -> PlumeSimErrorCode {
    handle_ffi_result_error(|| {
        let instance = unsafe { instance_from_ptr(ptr) }?;
        if mask.is_null() {
            return Err(DefaultPlumeSimError::null_pointer("mask"));
        }
        // SAFETY: caller guarantees `len` readable bytes
        let bytes = unsafe { slice::from_raw_parts(mask, len) };
        let cells: Vec<bool> = bytes.iter().map(|&b| b != 0).collect();

        with_engine_mut(instance, |engine| {
            let mask = ObstacleMask::from_cells(engine.size(), cells)?;
            engine.set_obstacles(&mask)
        })?
        .map_err(DefaultPlumeSimError::from)
    })
}

/// Add pollutant at one cell, saturating at 255.
///
/// # Safety
/// `ptr` must be a valid pointer returned by `plume_sim_new`.
#[no_mangle]
pub unsafe extern "C" fn plume_sim_add_density(
    ptr: *const PlumeSimInstance,
    x: u32,
    y: u32,
    amount: f32,
) -> PlumeSimErrorCode {
    handle_ffi_result_error(|| {
        let instance = unsafe { instance_from_ptr(ptr) }?;
        with_engine_mut(instance, |engine| {
            engine.add_density_source(x as usize, y as usize, amount)
        })?
        .map_err(DefaultPlumeSimError::from)
    })
}

/// Zero velocity and density.
///
/// # Arguments
/// * `clear_obstacles` - Also clear the obstacle mask
///
/// # Safety
/// `ptr` must be a valid pointer returned by `plume_sim_new`.
#[no_mangle]
pub unsafe extern "C" fn plume_sim_reset(
    ptr: *const PlumeSimInstance,
    clear_obstacles: bool,
) -> PlumeSimErrorCode {
    handle_ffi_result_error(|| {
        let instance = unsafe { instance_from_ptr(ptr) }?;
        with_engine_mut(instance, |engine| {
            if clear_obstacles {
                engine.reset_all();
            } else {
                engine.reset();
            }
        })
    })
}

/// Switch between the sequential and parallel paths.
///
/// `out_effective` (optional) receives `true` when the parallel path is in use
/// after the call. A refused switch is not an error; call
/// `plume_sim_get_fallback_reason` to learn why.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by `plume_sim_new`.
/// - `out_effective` must be null or writable.
#[no_mangle]
pub unsafe extern "C" fn plume_sim_set_parallel(
    ptr: *const PlumeSimInstance,
    parallel: bool,
    out_effective: *mut bool,
) -> PlumeSimErrorCode {
    handle_ffi_result_error(|| {
        let instance = unsafe { instance_from_ptr(ptr) }?;
        let mode = with_engine_mut(instance, |engine| engine.set_execution_mode(parallel))?;
        if !out_effective.is_null() {
            // SAFETY: checked non-null; caller guarantees it is writable
            unsafe {
                *out_effective = mode == ExecutionMode::Parallel;
            }
        }
        Ok(())
    })
}

/// Make copied density reflect the latest step on the parallel path.
///
/// # Safety
/// `ptr` must be a valid pointer returned by `plume_sim_new`.
#[no_mangle]
pub unsafe extern "C" fn plume_sim_synchronize(ptr: *const PlumeSimInstance) -> PlumeSimErrorCode {
    handle_ffi_result_error(|| {
        let instance = unsafe { instance_from_ptr(ptr) }?;
        with_engine_mut(instance, DispersionEngine::synchronize)
    })
}
