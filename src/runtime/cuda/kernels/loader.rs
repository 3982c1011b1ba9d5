//! CUDA kernel loading, caching, and launching infrastructure
//!
//! PTX files are compiled by `build.rs` using nvcc, loaded on first use, and
//! cached per-device. The module cache uses `OnceLock<Mutex<HashMap>>` for
//! thread-safe initialization and concurrent access from multiple streams.

pub use cudarc::driver::safe::LaunchConfig;
use cudarc::driver::safe::{CudaContext, CudaFunction, CudaModule};
use cudarc::nvrtc::Ptx;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use crate::error::{Error, Result};

/// Directory containing compiled PTX files (set by build.rs)
const KERNEL_DIR: &str = env!("CUDA_KERNEL_DIR");

/// Kernel module names
pub mod kernel_names {
    /// Reflector-engine kernels (element-wise set, reflector application,
    /// triangular factor)
    pub const FACTOR_MODULE: &str = "factor";
}

/// Load PTX from compiled file.
fn load_ptx(name: &str) -> Ptx {
    let path = format!("{}/{}.ptx", KERNEL_DIR, name);
    Ptx::from_file(path)
}

/// Cache for loaded CUDA modules, keyed by (device_index, module_name)
static MODULE_CACHE: OnceLock<Mutex<HashMap<(usize, &'static str), Arc<CudaModule>>>> =
    OnceLock::new();

/// Get or load a CUDA module from PTX.
///
/// Modules are cached per-device to avoid repeated loading.
///
/// # Errors
///
/// Returns an error if the PTX file cannot be loaded or the module cannot
/// be created.
pub fn get_or_load_module(
    context: &Arc<CudaContext>,
    device_index: usize,
    module_name: &'static str,
) -> Result<Arc<CudaModule>> {
    let cache = MODULE_CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    let mut guard = cache.lock().map_err(|e| {
        Error::Internal(format!(
            "Failed to acquire module cache lock (Mutex poisoned): {}",
            e
        ))
    })?;

    let key = (device_index, module_name);
    if let Some(module) = guard.get(&key) {
        return Ok(module.clone());
    }

    let ptx = load_ptx(module_name);
    let module = context.load_module(ptx).map_err(|e| {
        Error::Internal(format!(
            "Failed to load CUDA module '{}': {:?}. \
             Ensure CUDA kernels were compiled correctly by build.rs.",
            module_name, e
        ))
    })?;

    guard.insert(key, module.clone());

    Ok(module)
}

/// Get a kernel function from a loaded module.
///
/// # Errors
///
/// Returns an error if the kernel function is not found in the module.
pub fn get_kernel_function(module: &Arc<CudaModule>, kernel_name: &str) -> Result<CudaFunction> {
    module.load_function(kernel_name).map_err(|e| {
        Error::Internal(format!(
            "Failed to get kernel '{}': {:?}. \
             Check that the kernel name matches the CUDA source.",
            kernel_name, e
        ))
    })
}

/// Block size for one-dimensional element-wise operations
pub const BLOCK_SIZE: u32 = 256;

/// Tile edge for two-dimensional block kernels
pub const TILE_DIM: u32 = 32;

/// Launch configuration for a 1D sweep of `numel` elements per batch item
#[inline]
pub fn elementwise_launch_config(numel: usize, batch_count: usize) -> LaunchConfig {
    let grid_x = ((numel as u32) + BLOCK_SIZE - 1) / BLOCK_SIZE;
    LaunchConfig {
        grid_dim: (grid_x.max(1), batch_count as u32, 1),
        block_dim: (BLOCK_SIZE, 1, 1),
        shared_mem_bytes: 0,
    }
}

/// Launch configuration for a rows×cols tile sweep with the batch on the
/// z-dimension
#[inline]
pub fn tile_launch_config(rows: usize, cols: usize, batch_count: usize) -> LaunchConfig {
    let grid_x = ((rows as u32) + TILE_DIM - 1) / TILE_DIM;
    let grid_y = ((cols as u32) + TILE_DIM - 1) / TILE_DIM;
    LaunchConfig {
        grid_dim: (grid_x.max(1), grid_y.max(1), batch_count as u32),
        block_dim: (TILE_DIM, TILE_DIM, 1),
        shared_mem_bytes: 0,
    }
}

/// Launch configuration with one block per batch item
#[inline]
pub fn per_item_launch_config(batch_count: usize) -> LaunchConfig {
    LaunchConfig {
        grid_dim: (batch_count as u32, 1, 1),
        block_dim: (1, 1, 1),
        shared_mem_bytes: 0,
    }
}

/// Launch configuration for one reduction block per (lane, item) pair
#[inline]
pub fn reduction_launch_config(lanes: usize, batch_count: usize) -> LaunchConfig {
    LaunchConfig {
        grid_dim: (lanes as u32, batch_count as u32, 1),
        block_dim: (BLOCK_SIZE, 1, 1),
        shared_mem_bytes: 0,
    }
}
