//! Element-wise and Householder primitive implementations for CUDA
//!
//! Thin wrappers that translate batched-matrix descriptors into kernel
//! argument bundles and enqueue the PTX kernels on the client stream.
//! Per-item reference arrays are staged into a stream-ordered device buffer
//! for the duration of the launch.

use super::client::{CudaAllocator, CudaClient};
use super::kernels::{self, MatArgs, ScalarArgs};
use super::CudaRuntime;
use crate::batch::{BatchLayout, BatchedMatrix, BatchedScalars};
use crate::dtype::{Element, RealElement};
use crate::error::{Error, Result};
use crate::ops::{Direction, ElementwiseKernels, HouseholderOps, Side, Storage};
use crate::runtime::{AllocGuard, RuntimeClient};

/// Resolve a descriptor into kernel arguments, staging the per-item pointer
/// array on the device when needed.
///
/// The returned guard keeps the staged array alive until it drops; the
/// stream-ordered free then lands after every launch already enqueued.
pub(super) fn mat_args<'a, T: Element>(
    client: &'a CudaClient,
    m: &BatchedMatrix<T>,
) -> Result<(MatArgs, Option<AllocGuard<'a, CudaAllocator>>)> {
    match m.layout() {
        BatchLayout::Strided { base, stride } => Ok((
            MatArgs {
                base: *base,
                bases: 0,
                shift: m.shift() as u64,
                ld: m.ld() as u32,
                stride: *stride as u64,
            },
            None,
        )),
        BatchLayout::PerItem { bases } => {
            let size_bytes = bases.len() * std::mem::size_of::<u64>();
            let guard = AllocGuard::new(client.allocator(), size_bytes)?;

            unsafe {
                let result = cudarc::driver::sys::cuMemcpyHtoDAsync_v2(
                    guard.ptr(),
                    bases.as_ptr() as *const std::ffi::c_void,
                    size_bytes,
                    client.stream.cu_stream(),
                );
                if result != cudarc::driver::sys::CUresult::CUDA_SUCCESS {
                    return Err(Error::Internal(format!(
                        "Failed to stage per-item pointer array: {:?}",
                        result
                    )));
                }
            }

            Ok((
                MatArgs {
                    base: 0,
                    bases: guard.ptr(),
                    shift: m.shift() as u64,
                    ld: m.ld() as u32,
                    stride: 0,
                },
                Some(guard),
            ))
        }
    }
}

pub(super) fn scalar_args<T: Element>(tau: &BatchedScalars<T>) -> ScalarArgs {
    ScalarArgs {
        base: tau.base(),
        shift: tau.shift() as u64,
        stride: tau.stride() as u64,
    }
}

impl ElementwiseKernels<CudaRuntime> for CudaClient {
    fn init_identity_columns<T: RealElement>(
        &self,
        m: usize,
        n: usize,
        k: usize,
        a: &BatchedMatrix<T>,
        batch_count: usize,
    ) -> Result<()> {
        let (args, _stage) = mat_args(self, a)?;
        unsafe {
            kernels::launch_init_identity_columns(
                &self.context,
                &self.stream,
                self.device.index,
                T::DTYPE,
                m,
                n,
                k,
                args,
                batch_count,
            )
        }
    }

    fn zero_block<T: RealElement>(
        &self,
        rows: usize,
        cols: usize,
        a: &BatchedMatrix<T>,
        batch_count: usize,
    ) -> Result<()> {
        let (args, _stage) = mat_args(self, a)?;
        unsafe {
            kernels::launch_zero_block(
                &self.context,
                &self.stream,
                self.device.index,
                T::DTYPE,
                rows,
                cols,
                args,
                batch_count,
            )
        }
    }

    fn set_reflected_diagonal<T: RealElement>(
        &self,
        a: &BatchedMatrix<T>,
        tau: &BatchedScalars<T>,
        batch_count: usize,
    ) -> Result<()> {
        let (args, _stage) = mat_args(self, a)?;
        unsafe {
            kernels::launch_set_reflected_diagonal(
                &self.context,
                &self.stream,
                self.device.index,
                T::DTYPE,
                args,
                scalar_args(tau),
                batch_count,
            )
        }
    }

    fn negate_scalars<T: RealElement>(
        &self,
        k: usize,
        tau: &BatchedScalars<T>,
        batch_count: usize,
    ) -> Result<()> {
        unsafe {
            kernels::launch_negate_scalars(
                &self.context,
                &self.stream,
                self.device.index,
                T::DTYPE,
                k,
                scalar_args(tau),
                batch_count,
            )
        }
    }

    fn stash_unit_diagonal<T: RealElement>(
        &self,
        a: &BatchedMatrix<T>,
        saved: u64,
        batch_count: usize,
    ) -> Result<()> {
        let (args, _stage) = mat_args(self, a)?;
        unsafe {
            kernels::launch_diagonal_swap(
                &self.context,
                &self.stream,
                self.device.index,
                T::DTYPE,
                false,
                args,
                saved,
                batch_count,
            )
        }
    }

    fn restore_diagonal<T: RealElement>(
        &self,
        a: &BatchedMatrix<T>,
        saved: u64,
        batch_count: usize,
    ) -> Result<()> {
        let (args, _stage) = mat_args(self, a)?;
        unsafe {
            kernels::launch_diagonal_swap(
                &self.context,
                &self.stream,
                self.device.index,
                T::DTYPE,
                true,
                args,
                saved,
                batch_count,
            )
        }
    }

    fn copy_block<T: RealElement>(
        &self,
        rows: usize,
        cols: usize,
        src: &BatchedMatrix<T>,
        dst: &BatchedMatrix<T>,
        batch_count: usize,
    ) -> Result<()> {
        let (src_args, _s) = mat_args(self, src)?;
        let (dst_args, _d) = mat_args(self, dst)?;
        unsafe {
            kernels::launch_block_transfer(
                &self.context,
                &self.stream,
                self.device.index,
                T::DTYPE,
                false,
                rows,
                cols,
                src_args,
                dst_args,
                batch_count,
            )
        }
    }

    fn subtract_block<T: RealElement>(
        &self,
        rows: usize,
        cols: usize,
        src: &BatchedMatrix<T>,
        dst: &BatchedMatrix<T>,
        batch_count: usize,
    ) -> Result<()> {
        let (src_args, _s) = mat_args(self, src)?;
        let (dst_args, _d) = mat_args(self, dst)?;
        unsafe {
            kernels::launch_block_transfer(
                &self.context,
                &self.stream,
                self.device.index,
                T::DTYPE,
                true,
                rows,
                cols,
                src_args,
                dst_args,
                batch_count,
            )
        }
    }
}

impl HouseholderOps<CudaRuntime> for CudaClient {
    fn apply_reflector<T: RealElement>(
        &self,
        side: Side,
        m: usize,
        n: usize,
        v: &BatchedMatrix<T>,
        incv: usize,
        tau: &BatchedScalars<T>,
        c: &BatchedMatrix<T>,
        batch_count: usize,
    ) -> Result<()> {
        if m == 0 || n == 0 || batch_count == 0 {
            return Ok(());
        }

        let lanes = match side {
            Side::Left => n,
            Side::Right => m,
        };
        let work = AllocGuard::for_elements::<T>(self.allocator(), lanes * batch_count)?;

        let (v_args, _vs) = mat_args(self, v)?;
        let (c_args, _cs) = mat_args(self, c)?;

        unsafe {
            kernels::launch_reflector_dot(
                &self.context,
                &self.stream,
                self.device.index,
                T::DTYPE,
                side,
                m,
                n,
                v_args,
                incv,
                c_args,
                work.ptr(),
                batch_count,
            )?;
            kernels::launch_reflector_update(
                &self.context,
                &self.stream,
                self.device.index,
                T::DTYPE,
                side,
                m,
                n,
                v_args,
                incv,
                scalar_args(tau),
                c_args,
                work.ptr(),
                batch_count,
            )?;
        }

        Ok(())
    }

    fn build_triangular_factor<T: RealElement>(
        &self,
        direction: Direction,
        storage: Storage,
        rows: usize,
        k: usize,
        v: &BatchedMatrix<T>,
        tau: &BatchedScalars<T>,
        t: &BatchedMatrix<T>,
        batch_count: usize,
    ) -> Result<()> {
        if direction == Direction::Backward {
            return Err(Error::NotImplemented {
                feature: "backward triangular factor",
            });
        }
        if storage == Storage::RowWise {
            return Err(Error::NotImplemented {
                feature: "row-wise triangular factor",
            });
        }
        if k == 0 || batch_count == 0 {
            return Ok(());
        }

        let (v_args, _vs) = mat_args(self, v)?;
        let (t_args, _ts) = mat_args(self, t)?;

        unsafe {
            kernels::launch_triangular_factor(
                &self.context,
                &self.stream,
                self.device.index,
                T::DTYPE,
                rows,
                k,
                v_args,
                scalar_args(tau),
                t_args,
                batch_count,
            )
        }
    }
}
