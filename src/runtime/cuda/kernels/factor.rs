//! Launchers for the reflector-engine CUDA kernels
//!
//! Each launcher resolves the typed kernel for the requested dtype from the
//! `factor` module and enqueues it on the caller's stream. Batched-matrix
//! operands travel as `(base, bases, shift, ld, stride)` bundles; `bases` is
//! a device pointer-array for per-item storage, 0 for strided storage.

use cudarc::driver::PushKernelArg;
use cudarc::driver::safe::{CudaContext, CudaStream};
use std::sync::Arc;

use super::loader::{
    elementwise_launch_config, get_kernel_function, get_or_load_module, kernel_names,
    per_item_launch_config, reduction_launch_config, tile_launch_config,
};
use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::ops::Side;

/// Device-side view of one batched-matrix operand, in elements
#[derive(Debug, Clone, Copy)]
pub struct MatArgs {
    /// Item-0 address for strided storage (unused when `bases` is set)
    pub base: u64,
    /// Device address of the per-item pointer array, 0 for strided storage
    pub bases: u64,
    /// Element offset applied to every item
    pub shift: u64,
    /// Leading dimension
    pub ld: u32,
    /// Inter-item spacing for strided storage
    pub stride: u64,
}

/// Device-side view of the per-item scalar vector, in elements
#[derive(Debug, Clone, Copy)]
pub struct ScalarArgs {
    /// Address of the scalar region
    pub base: u64,
    /// Element offset applied to every item
    pub shift: u64,
    /// Inter-item spacing
    pub stride: u64,
}

fn typed_name(stem: &str, dtype: DType) -> String {
    match dtype {
        DType::F32 => format!("{}_f32", stem),
        DType::F64 => format!("{}_f64", stem),
    }
}

macro_rules! launch {
    ($stream:expr, $func:expr, $cfg:expr, [$($arg:expr),+ $(,)?], $what:expr) => {{
        let mut builder = $stream.launch_builder(&$func);
        $(builder.arg($arg);)+
        unsafe { builder.launch($cfg) }.map_err(|e| {
            Error::Internal(format!("CUDA {} kernel launch failed: {:?}", $what, e))
        })?;
    }};
}

/// Launch the identity-column initialization kernel.
///
/// # Safety
///
/// `a` must describe a valid m×n batched matrix on the device.
#[allow(clippy::too_many_arguments)]
pub unsafe fn launch_init_identity_columns(
    context: &Arc<CudaContext>,
    stream: &CudaStream,
    device_index: usize,
    dtype: DType,
    m: usize,
    n: usize,
    k: usize,
    a: MatArgs,
    batch_count: usize,
) -> Result<()> {
    let module = get_or_load_module(context, device_index, kernel_names::FACTOR_MODULE)?;
    let func = get_kernel_function(
        &module,
        &typed_name("init_identity_columns", dtype),
    )?;

    let (m, n, k) = (m as u32, n as u32, k as u32);
    let cfg = tile_launch_config(m as usize, n as usize, batch_count);
    launch!(
        stream,
        func,
        cfg,
        [&m, &n, &k, &a.base, &a.bases, &a.shift, &a.ld, &a.stride],
        "init_identity_columns"
    );
    Ok(())
}

/// Launch the block-zero kernel.
///
/// # Safety
///
/// `a` must describe a batched matrix valid for `rows × cols` at its origin.
pub unsafe fn launch_zero_block(
    context: &Arc<CudaContext>,
    stream: &CudaStream,
    device_index: usize,
    dtype: DType,
    rows: usize,
    cols: usize,
    a: MatArgs,
    batch_count: usize,
) -> Result<()> {
    let module = get_or_load_module(context, device_index, kernel_names::FACTOR_MODULE)?;
    let func = get_kernel_function(&module, &typed_name("zero_block", dtype))?;

    let (rows, cols) = (rows as u32, cols as u32);
    let cfg = tile_launch_config(rows as usize, cols as usize, batch_count);
    launch!(
        stream,
        func,
        cfg,
        [&rows, &cols, &a.base, &a.bases, &a.shift, &a.ld, &a.stride],
        "zero_block"
    );
    Ok(())
}

/// Launch the block-copy or block-subtract kernel.
///
/// # Safety
///
/// `src` and `dst` must describe batched matrices valid for `rows × cols`
/// at their origins; they must not alias.
#[allow(clippy::too_many_arguments)]
pub unsafe fn launch_block_transfer(
    context: &Arc<CudaContext>,
    stream: &CudaStream,
    device_index: usize,
    dtype: DType,
    subtract: bool,
    rows: usize,
    cols: usize,
    src: MatArgs,
    dst: MatArgs,
    batch_count: usize,
) -> Result<()> {
    let stem = if subtract { "subtract_block" } else { "copy_block" };
    let module = get_or_load_module(context, device_index, kernel_names::FACTOR_MODULE)?;
    let func = get_kernel_function(&module, &typed_name(stem, dtype))?;

    let (rows, cols) = (rows as u32, cols as u32);
    let cfg = tile_launch_config(rows as usize, cols as usize, batch_count);
    launch!(
        stream,
        func,
        cfg,
        [
            &rows,
            &cols,
            &src.base,
            &src.bases,
            &src.shift,
            &src.ld,
            &src.stride,
            &dst.base,
            &dst.bases,
            &dst.shift,
            &dst.ld,
            &dst.stride,
        ],
        stem
    );
    Ok(())
}

/// Launch the reflected-diagonal kernel (writes `1 - tau`, negates tau).
///
/// # Safety
///
/// `a` must point at the diagonal element; `tau` at valid per-item scalars.
pub unsafe fn launch_set_reflected_diagonal(
    context: &Arc<CudaContext>,
    stream: &CudaStream,
    device_index: usize,
    dtype: DType,
    a: MatArgs,
    tau: ScalarArgs,
    batch_count: usize,
) -> Result<()> {
    let module = get_or_load_module(context, device_index, kernel_names::FACTOR_MODULE)?;
    let func = get_kernel_function(
        &module,
        &typed_name("set_reflected_diagonal", dtype),
    )?;

    let cfg = per_item_launch_config(batch_count);
    launch!(
        stream,
        func,
        cfg,
        [&a.base, &a.bases, &a.shift, &a.stride, &tau.base, &tau.shift, &tau.stride],
        "set_reflected_diagonal"
    );
    Ok(())
}

/// Launch the scalar-negation kernel.
///
/// # Safety
///
/// `tau` must hold k scalars per item.
pub unsafe fn launch_negate_scalars(
    context: &Arc<CudaContext>,
    stream: &CudaStream,
    device_index: usize,
    dtype: DType,
    k: usize,
    tau: ScalarArgs,
    batch_count: usize,
) -> Result<()> {
    let module = get_or_load_module(context, device_index, kernel_names::FACTOR_MODULE)?;
    let func = get_kernel_function(
        &module,
        &typed_name("negate_scalars", dtype),
    )?;

    let k_u32 = k as u32;
    let cfg = elementwise_launch_config(k, batch_count);
    launch!(
        stream,
        func,
        cfg,
        [&k_u32, &tau.base, &tau.shift, &tau.stride],
        "negate_scalars"
    );
    Ok(())
}

/// Launch the diagonal stash or restore kernel.
///
/// # Safety
///
/// `a` must point at the diagonal element; `saved` must hold `batch_count`
/// elements.
#[allow(clippy::too_many_arguments)]
pub unsafe fn launch_diagonal_swap(
    context: &Arc<CudaContext>,
    stream: &CudaStream,
    device_index: usize,
    dtype: DType,
    restore: bool,
    a: MatArgs,
    saved: u64,
    batch_count: usize,
) -> Result<()> {
    let stem = if restore {
        "restore_diagonal"
    } else {
        "stash_unit_diagonal"
    };
    let module = get_or_load_module(context, device_index, kernel_names::FACTOR_MODULE)?;
    let func = get_kernel_function(&module, &typed_name(stem, dtype))?;

    let cfg = per_item_launch_config(batch_count);
    launch!(
        stream,
        func,
        cfg,
        [&a.base, &a.bases, &a.shift, &a.stride, &saved],
        stem
    );
    Ok(())
}

/// Launch the strided scale kernel with per-item scalars.
///
/// # Safety
///
/// `x` must be valid for `n` strided elements per item.
#[allow(clippy::too_many_arguments)]
pub unsafe fn launch_scal_strided(
    context: &Arc<CudaContext>,
    stream: &CudaStream,
    device_index: usize,
    dtype: DType,
    n: usize,
    tau: ScalarArgs,
    x: MatArgs,
    incx: usize,
    batch_count: usize,
) -> Result<()> {
    let module = get_or_load_module(context, device_index, kernel_names::FACTOR_MODULE)?;
    let func = get_kernel_function(&module, &typed_name("scal_strided", dtype))?;

    let n_u32 = n as u32;
    let incx_u32 = incx as u32;
    let cfg = elementwise_launch_config(n, batch_count);
    launch!(
        stream,
        func,
        cfg,
        [
            &n_u32,
            &tau.base,
            &tau.shift,
            &tau.stride,
            &x.base,
            &x.bases,
            &x.shift,
            &x.stride,
            &incx_u32,
        ],
        "scal_strided"
    );
    Ok(())
}

/// Launch the reflector dot phase: per-lane products into `w`.
///
/// # Safety
///
/// `w` must hold n (left) or m (right) elements per item.
#[allow(clippy::too_many_arguments)]
pub unsafe fn launch_reflector_dot(
    context: &Arc<CudaContext>,
    stream: &CudaStream,
    device_index: usize,
    dtype: DType,
    side: Side,
    m: usize,
    n: usize,
    v: MatArgs,
    incv: usize,
    c: MatArgs,
    w: u64,
    batch_count: usize,
) -> Result<()> {
    let stem = match side {
        Side::Left => "reflector_dot_left",
        Side::Right => "reflector_dot_right",
    };
    let module = get_or_load_module(context, device_index, kernel_names::FACTOR_MODULE)?;
    let func = get_kernel_function(&module, &typed_name(stem, dtype))?;

    let (m_u32, n_u32) = (m as u32, n as u32);
    let incv_u32 = incv as u32;
    let lanes = match side {
        Side::Left => n,
        Side::Right => m,
    };
    let cfg = reduction_launch_config(lanes, batch_count);
    launch!(
        stream,
        func,
        cfg,
        [
            &m_u32,
            &n_u32,
            &v.base,
            &v.bases,
            &v.shift,
            &v.stride,
            &incv_u32,
            &c.base,
            &c.bases,
            &c.shift,
            &c.ld,
            &c.stride,
            &w,
        ],
        stem
    );
    Ok(())
}

/// Launch the reflector update phase: `C -= tau · v ⊗ w`.
///
/// # Safety
///
/// `w` must hold the dot-phase products for every item.
#[allow(clippy::too_many_arguments)]
pub unsafe fn launch_reflector_update(
    context: &Arc<CudaContext>,
    stream: &CudaStream,
    device_index: usize,
    dtype: DType,
    side: Side,
    m: usize,
    n: usize,
    v: MatArgs,
    incv: usize,
    tau: ScalarArgs,
    c: MatArgs,
    w: u64,
    batch_count: usize,
) -> Result<()> {
    let stem = match side {
        Side::Left => "reflector_update_left",
        Side::Right => "reflector_update_right",
    };
    let module = get_or_load_module(context, device_index, kernel_names::FACTOR_MODULE)?;
    let func = get_kernel_function(&module, &typed_name(stem, dtype))?;

    let (m_u32, n_u32) = (m as u32, n as u32);
    let incv_u32 = incv as u32;
    let cfg = tile_launch_config(m, n, batch_count);
    launch!(
        stream,
        func,
        cfg,
        [
            &m_u32,
            &n_u32,
            &v.base,
            &v.bases,
            &v.shift,
            &v.stride,
            &incv_u32,
            &tau.base,
            &tau.shift,
            &tau.stride,
            &c.base,
            &c.bases,
            &c.shift,
            &c.ld,
            &c.stride,
            &w,
        ],
        stem
    );
    Ok(())
}

/// Launch the triangular-factor compression kernel.
///
/// # Safety
///
/// `t` must be valid for k×k per item; `v` for rows×k.
#[allow(clippy::too_many_arguments)]
pub unsafe fn launch_triangular_factor(
    context: &Arc<CudaContext>,
    stream: &CudaStream,
    device_index: usize,
    dtype: DType,
    rows: usize,
    k: usize,
    v: MatArgs,
    tau: ScalarArgs,
    t: MatArgs,
    batch_count: usize,
) -> Result<()> {
    let module = get_or_load_module(context, device_index, kernel_names::FACTOR_MODULE)?;
    let func = get_kernel_function(
        &module,
        &typed_name("triangular_factor", dtype),
    )?;

    let (rows_u32, k_u32) = (rows as u32, k as u32);
    let cfg = per_item_launch_config(batch_count);
    launch!(
        stream,
        func,
        cfg,
        [
            &rows_u32,
            &k_u32,
            &v.base,
            &v.bases,
            &v.shift,
            &v.ld,
            &v.stride,
            &tau.base,
            &tau.shift,
            &tau.stride,
            &t.base,
            &t.bases,
            &t.shift,
            &t.ld,
            &t.stride,
        ],
        "triangular_factor"
    );
    Ok(())
}
