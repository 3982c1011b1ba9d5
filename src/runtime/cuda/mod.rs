//! CUDA runtime implementation
//!
//! This module provides GPU acceleration via NVIDIA CUDA using cudarc.
//!
//! # Features
//!
//! - `CudaDevice` - Represents a CUDA GPU device
//! - `CudaClient` - Manages GPU stream and context, launches kernels
//! - `CudaRuntime` - Implements the generic Runtime trait
//! - Backend primitives: cuBLAS multiplies plus native PTX kernels for the
//!   element-wise set and the Householder primitives
//!
//! # Panics
//!
//! The following operations may panic on CUDA errors (allocation failures
//! are typically unrecoverable in GPU contexts):
//!
//! - `Runtime::allocate` - Panics if CUDA memory allocation fails
//! - `Runtime::copy_to_device` - Panics if host-to-device copy fails
//! - `Runtime::copy_from_device` - Panics if device-to-host copy fails
//! - `Runtime::copy_within_device` - Panics if device-to-device copy fails

mod blas;
mod client;
mod device;
mod kernels;
mod ops;

pub use client::{CudaAllocator, CudaClient, CudaRawHandle};
pub use device::{CudaDevice, CudaError};

use crate::runtime::Runtime;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

impl crate::factor::FactorOps<CudaRuntime> for CudaClient {}

/// Global client cache: device index -> cached CudaClient
///
/// Caches CudaClient instances per device to avoid creating new CUDA
/// contexts, streams, and cuBLAS handles on every operation.
static CLIENT_CACHE: OnceLock<Mutex<HashMap<usize, CudaClient>>> = OnceLock::new();

/// Check whether a CUDA driver and at least one device are present.
pub fn is_cuda_available() -> bool {
    cudarc::driver::result::init().is_ok()
        && cudarc::driver::result::device::get_count().map_or(false, |c| c > 0)
}

/// Safely lock the client cache, recovering from poisoned mutex.
#[inline]
fn lock_client_cache(
    cache: &Mutex<HashMap<usize, CudaClient>>,
) -> MutexGuard<'_, HashMap<usize, CudaClient>> {
    cache.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Get or create a cached CudaClient for a device.
fn get_or_create_client(device: &CudaDevice) -> CudaClient {
    let cache = CLIENT_CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    let mut cache_guard = lock_client_cache(cache);

    if let Some(client) = cache_guard.get(&device.index) {
        return client.clone();
    }

    let client = CudaClient::new(device.clone()).expect("Failed to create CUDA client");
    cache_guard.insert(device.index, client.clone());

    client
}

/// CUDA Runtime adapter
///
/// Implements the generic Runtime trait for the CUDA backend.
/// Uses cudarc for direct GPU control.
#[derive(Clone, Debug, Default)]
pub struct CudaRuntime;

impl Runtime for CudaRuntime {
    type Device = CudaDevice;
    type Client = CudaClient;
    type Allocator = CudaAllocator;
    type RawHandle = CudaRawHandle;

    fn name() -> &'static str {
        "cuda"
    }

    /// Allocate GPU memory.
    ///
    /// # Panics
    ///
    /// Panics if CUDA memory allocation fails.
    fn allocate(size_bytes: usize, device: &Self::Device) -> u64 {
        if size_bytes == 0 {
            return 0;
        }

        let client = get_or_create_client(device);

        unsafe {
            let mut ptr: u64 = 0;
            let result = cudarc::driver::sys::cuMemAllocAsync(
                &mut ptr,
                size_bytes,
                client.stream.cu_stream(),
            );

            if result != cudarc::driver::sys::CUresult::CUDA_SUCCESS {
                panic!(
                    "[orq::cuda] Allocation failed: {} bytes on device {} ({:?})",
                    size_bytes, device.index, result
                );
            }

            ptr
        }
    }

    fn deallocate(ptr: u64, size_bytes: usize, device: &Self::Device) {
        if ptr == 0 {
            return;
        }

        let client = get_or_create_client(device);
        crate::runtime::Allocator::deallocate(&client.allocator, ptr, size_bytes);
    }

    /// Copy data from host to device.
    ///
    /// # Panics
    ///
    /// Panics if the CUDA copy operation fails.
    fn copy_to_device(src: &[u8], dst: u64, device: &Self::Device) {
        if src.is_empty() || dst == 0 {
            return;
        }

        let client = get_or_create_client(device);

        unsafe {
            let result = cudarc::driver::sys::cuMemcpyHtoDAsync_v2(
                dst,
                src.as_ptr() as *const std::ffi::c_void,
                src.len(),
                client.stream.cu_stream(),
            );

            if result != cudarc::driver::sys::CUresult::CUDA_SUCCESS {
                panic!(
                    "[orq::cuda] Host-to-device copy failed: {} bytes ({:?})",
                    src.len(),
                    result
                );
            }

            // Synchronize to ensure data is available
            let _ = client.stream.synchronize();
        }
    }

    /// Copy data from device to host.
    ///
    /// # Panics
    ///
    /// Panics if the CUDA copy operation fails.
    fn copy_from_device(src: u64, dst: &mut [u8], device: &Self::Device) {
        if dst.is_empty() || src == 0 {
            return;
        }

        let client = get_or_create_client(device);

        unsafe {
            let result = cudarc::driver::sys::cuMemcpyDtoHAsync_v2(
                dst.as_mut_ptr() as *mut std::ffi::c_void,
                src,
                dst.len(),
                client.stream.cu_stream(),
            );

            if result != cudarc::driver::sys::CUresult::CUDA_SUCCESS {
                panic!(
                    "[orq::cuda] Device-to-host copy failed: {} bytes ({:?})",
                    dst.len(),
                    result
                );
            }

            // Synchronize to ensure data is available on host
            let _ = client.stream.synchronize();
        }
    }

    /// Copy data within device memory.
    ///
    /// # Panics
    ///
    /// Panics if the CUDA copy operation fails.
    fn copy_within_device(src: u64, dst: u64, size_bytes: usize, device: &Self::Device) {
        if size_bytes == 0 || src == 0 || dst == 0 {
            return;
        }

        let client = get_or_create_client(device);

        unsafe {
            let result = cudarc::driver::sys::cuMemcpyDtoDAsync_v2(
                dst,
                src,
                size_bytes,
                client.stream.cu_stream(),
            );

            if result != cudarc::driver::sys::CUresult::CUDA_SUCCESS {
                panic!(
                    "[orq::cuda] Device-to-device copy failed: {} bytes ({:?})",
                    size_bytes, result
                );
            }
        }
    }

    fn default_device() -> Self::Device {
        CudaDevice::new(0)
    }

    fn default_client(device: &Self::Device) -> Self::Client {
        get_or_create_client(device)
    }

    fn raw_handle(client: &Self::Client) -> &Self::RawHandle {
        &client.raw_handle
    }
}
