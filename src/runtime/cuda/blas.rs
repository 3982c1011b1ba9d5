//! Batched BLAS primitives for the CUDA backend
//!
//! General multiplies go through cuBLAS: strided batches use the
//! strided-batched entry points, per-item reference batches fall back to a
//! host loop of plain GEMMs. Triangular multiplies are issued one item at a
//! time on the shared stream (cuBLAS has no batched TRMM), matching the
//! provided `trmm_batched` loop. The strided scale uses a native kernel so
//! the per-item scalar stays on the device.

use cudarc::cublas::sys::{
    cublasDgemmStridedBatched, cublasDgemm_v2, cublasDiagType_t, cublasDtrmm_v2, cublasFillMode_t,
    cublasOperation_t, cublasSgemmStridedBatched, cublasSgemm_v2, cublasSideMode_t, cublasStatus_t,
    cublasStrmm_v2,
};

use super::client::CudaClient;
use super::kernels;
use super::ops::{mat_args, scalar_args};
use super::CudaRuntime;
use crate::batch::{BatchLayout, BatchedMatrix, BatchedScalars};
use crate::dtype::{DType, RealElement};
use crate::error::{Error, Result};
use crate::ops::{BatchedBlasOps, Diag, Side, Transpose, Uplo};

fn cublas_op(trans: Transpose) -> cublasOperation_t {
    match trans {
        Transpose::None => cublasOperation_t::CUBLAS_OP_N,
        Transpose::Transpose => cublasOperation_t::CUBLAS_OP_T,
    }
}

fn cublas_side(side: Side) -> cublasSideMode_t {
    match side {
        Side::Left => cublasSideMode_t::CUBLAS_SIDE_LEFT,
        Side::Right => cublasSideMode_t::CUBLAS_SIDE_RIGHT,
    }
}

fn cublas_uplo(uplo: Uplo) -> cublasFillMode_t {
    match uplo {
        Uplo::Lower => cublasFillMode_t::CUBLAS_FILL_MODE_LOWER,
        Uplo::Upper => cublasFillMode_t::CUBLAS_FILL_MODE_UPPER,
    }
}

fn cublas_diag(diag: Diag) -> cublasDiagType_t {
    match diag {
        Diag::Unit => cublasDiagType_t::CUBLAS_DIAG_UNIT,
        Diag::NonUnit => cublasDiagType_t::CUBLAS_DIAG_NON_UNIT,
    }
}

fn check(status: cublasStatus_t, what: &str) -> Result<()> {
    if status != cublasStatus_t::CUBLAS_STATUS_SUCCESS {
        return Err(Error::Internal(format!("cuBLAS {} failed: {:?}", what, status)));
    }
    Ok(())
}

fn is_strided<T: RealElement>(m: &BatchedMatrix<T>) -> bool {
    matches!(m.layout(), BatchLayout::Strided { .. })
}

fn item_stride<T: RealElement>(m: &BatchedMatrix<T>) -> i64 {
    match m.layout() {
        BatchLayout::Strided { stride, .. } => *stride as i64,
        BatchLayout::PerItem { .. } => 0,
    }
}

impl BatchedBlasOps<CudaRuntime> for CudaClient {
    fn gemm_batched<T: RealElement>(
        &self,
        transa: Transpose,
        transb: Transpose,
        m: usize,
        n: usize,
        k: usize,
        alpha: T,
        a: &BatchedMatrix<T>,
        b: &BatchedMatrix<T>,
        beta: T,
        c: &BatchedMatrix<T>,
        batch_count: usize,
    ) -> Result<()> {
        if m == 0 || n == 0 || batch_count == 0 {
            return Ok(());
        }

        let handle = unsafe { *self.cublas.handle() };
        let (ta, tb) = (cublas_op(transa), cublas_op(transb));
        let (mi, ni, ki) = (m as i32, n as i32, k as i32);
        let (lda, ldb, ldc) = (a.ld() as i32, b.ld() as i32, c.ld() as i32);

        // one strided-batched call when every operand is a strided region
        if is_strided(a) && is_strided(b) && is_strided(c) {
            let status = match T::DTYPE {
                DType::F32 => unsafe {
                    let alpha = alpha.to_f64() as f32;
                    let beta = beta.to_f64() as f32;
                    cublasSgemmStridedBatched(
                        handle,
                        ta,
                        tb,
                        mi,
                        ni,
                        ki,
                        &alpha,
                        a.item_ptr(0) as *const f32,
                        lda,
                        item_stride(a),
                        b.item_ptr(0) as *const f32,
                        ldb,
                        item_stride(b),
                        &beta,
                        c.item_ptr(0) as *mut f32,
                        ldc,
                        item_stride(c),
                        batch_count as i32,
                    )
                },
                DType::F64 => unsafe {
                    let alpha = alpha.to_f64();
                    let beta = beta.to_f64();
                    cublasDgemmStridedBatched(
                        handle,
                        ta,
                        tb,
                        mi,
                        ni,
                        ki,
                        &alpha,
                        a.item_ptr(0) as *const f64,
                        lda,
                        item_stride(a),
                        b.item_ptr(0) as *const f64,
                        ldb,
                        item_stride(b),
                        &beta,
                        c.item_ptr(0) as *mut f64,
                        ldc,
                        item_stride(c),
                        batch_count as i32,
                    )
                },
            };
            return check(status, "strided batched GEMM");
        }

        // per-item references: loop plain GEMMs on the shared stream
        for item in 0..batch_count {
            let status = match T::DTYPE {
                DType::F32 => unsafe {
                    let alpha = alpha.to_f64() as f32;
                    let beta = beta.to_f64() as f32;
                    cublasSgemm_v2(
                        handle,
                        ta,
                        tb,
                        mi,
                        ni,
                        ki,
                        &alpha,
                        a.item_ptr(item) as *const f32,
                        lda,
                        b.item_ptr(item) as *const f32,
                        ldb,
                        &beta,
                        c.item_ptr(item) as *mut f32,
                        ldc,
                    )
                },
                DType::F64 => unsafe {
                    let alpha = alpha.to_f64();
                    let beta = beta.to_f64();
                    cublasDgemm_v2(
                        handle,
                        ta,
                        tb,
                        mi,
                        ni,
                        ki,
                        &alpha,
                        a.item_ptr(item) as *const f64,
                        lda,
                        b.item_ptr(item) as *const f64,
                        ldb,
                        &beta,
                        c.item_ptr(item) as *mut f64,
                        ldc,
                    )
                },
            };
            check(status, "GEMM")?;
        }
        Ok(())
    }

    fn trmm<T: RealElement>(
        &self,
        side: Side,
        uplo: Uplo,
        trans: Transpose,
        diag: Diag,
        m: usize,
        n: usize,
        a: &BatchedMatrix<T>,
        b: &BatchedMatrix<T>,
        item: usize,
    ) -> Result<()> {
        if m == 0 || n == 0 {
            return Ok(());
        }

        let handle = unsafe { *self.cublas.handle() };
        let (mi, ni) = (m as i32, n as i32);
        let (lda, ldb) = (a.ld() as i32, b.ld() as i32);

        // out-of-place cuBLAS TRMM with C aliased to B runs in place
        let status = match T::DTYPE {
            DType::F32 => unsafe {
                let alpha: f32 = 1.0;
                cublasStrmm_v2(
                    handle,
                    cublas_side(side),
                    cublas_uplo(uplo),
                    cublas_op(trans),
                    cublas_diag(diag),
                    mi,
                    ni,
                    &alpha,
                    a.item_ptr(item) as *const f32,
                    lda,
                    b.item_ptr(item) as *const f32,
                    ldb,
                    b.item_ptr(item) as *mut f32,
                    ldb,
                )
            },
            DType::F64 => unsafe {
                let alpha: f64 = 1.0;
                cublasDtrmm_v2(
                    handle,
                    cublas_side(side),
                    cublas_uplo(uplo),
                    cublas_op(trans),
                    cublas_diag(diag),
                    mi,
                    ni,
                    &alpha,
                    a.item_ptr(item) as *const f64,
                    lda,
                    b.item_ptr(item) as *const f64,
                    ldb,
                    b.item_ptr(item) as *mut f64,
                    ldb,
                )
            },
        };
        check(status, "TRMM")
    }

    fn scal_batched<T: RealElement>(
        &self,
        n: usize,
        scalars: &BatchedScalars<T>,
        x: &BatchedMatrix<T>,
        incx: usize,
        batch_count: usize,
    ) -> Result<()> {
        if n == 0 || batch_count == 0 {
            return Ok(());
        }

        let (x_args, _stage) = mat_args(self, x)?;
        unsafe {
            kernels::launch_scal_strided(
                &self.context,
                &self.stream,
                self.device.index,
                T::DTYPE,
                n,
                scalar_args(scalars),
                x_args,
                incx,
                batch_count,
            )
        }
    }
}
