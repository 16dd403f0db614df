//! C ABI for the plume dispersion engine
//!
//! Every entry point returns a `PlumeSimErrorCode` (0 = success) and records a
//! thread-local message on failure, readable through `plume_sim_get_last_error`.
//! Instances are opaque `PlumeSimInstance` pointers created by `plume_sim_new`
//! and released with `plume_sim_destroy`. The C header `PlumeSimFFI.h` is
//! generated by the build script.

mod error;
mod helpers;
mod instance;
mod queries;
mod simulation;
mod types;

pub use error::{plume_sim_get_last_error, plume_sim_get_last_error_code, PlumeSimErrorCode};
pub use instance::{plume_sim_destroy, plume_sim_new, plume_sim_new_with_quality, PlumeSimInstance};
pub use queries::{
    plume_sim_copy_density, plume_sim_copy_velocity, plume_sim_get_fallback_reason,
    plume_sim_get_stats, PlumeSimStats,
};
pub use simulation::{
    plume_sim_add_density, plume_sim_reset, plume_sim_set_obstacles, plume_sim_set_parallel,
    plume_sim_step, plume_sim_synchronize,
};
pub use types::{plume_sim_default_params, PlumeSimParams, PlumeSimSource};
