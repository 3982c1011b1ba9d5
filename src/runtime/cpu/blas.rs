//! Batched BLAS primitives for the CPU backend
//!
//! Column-major reference kernels over raw pointers. Each batch item is an
//! independent matrix, so the batched entry points parallelize over items
//! with Rayon when the per-item work is large enough to amortize the
//! scheduling overhead.

use super::client::CpuClient;
use super::runtime::CpuRuntime;
use crate::batch::{BatchedMatrix, BatchedScalars};
use crate::dtype::RealElement;
use crate::error::Result;
use crate::ops::{BatchedBlasOps, Diag, Side, Transpose, Uplo};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Minimum per-item multiply work (m*n*k) before Rayon dispatch pays off
#[cfg(feature = "rayon")]
const PARALLEL_WORK_THRESHOLD: usize = 16_384;

/// General multiply for one item: C := alpha * op(A) * op(B) + beta * C
///
/// # Safety
/// - `a`, `b`, `c` must be valid column-major matrices for the given
///   dimensions and leading dimensions
/// - `c` must not alias `a` or `b`
#[allow(clippy::too_many_arguments)]
unsafe fn gemm_kernel<T: RealElement>(
    transa: Transpose,
    transb: Transpose,
    m: usize,
    n: usize,
    k: usize,
    alpha: T,
    a: *const T,
    lda: usize,
    b: *const T,
    ldb: usize,
    beta: T,
    c: *mut T,
    ldc: usize,
) {
    for j in 0..n {
        for i in 0..m {
            let mut acc = T::zero();
            for l in 0..k {
                let av = match transa {
                    Transpose::None => *a.add(i + l * lda),
                    Transpose::Transpose => *a.add(l + i * lda),
                };
                let bv = match transb {
                    Transpose::None => *b.add(l + j * ldb),
                    Transpose::Transpose => *b.add(j + l * ldb),
                };
                acc = acc + av * bv;
            }
            let cp = c.add(i + j * ldc);
            let prior = if beta == T::zero() {
                T::zero()
            } else {
                beta * *cp
            };
            *cp = alpha * acc + prior;
        }
    }
}

/// Triangular multiply for one item, in place:
/// B := op(tri(A)) * B (left) or B := B * op(tri(A)) (right)
///
/// Only the selected triangle of A is read; with `Diag::Unit` the diagonal
/// is never loaded. Loop orders follow the reference BLAS so each output
/// column is produced from not-yet-overwritten inputs.
///
/// # Safety
/// - `a` must be a valid triangular operand of order m (left) or n (right)
/// - `b` must be a valid m×n column-major matrix with leading dimension ldb
#[allow(clippy::too_many_arguments)]
unsafe fn trmm_kernel<T: RealElement>(
    side: Side,
    uplo: Uplo,
    trans: Transpose,
    diag: Diag,
    m: usize,
    n: usize,
    a: *const T,
    lda: usize,
    b: *mut T,
    ldb: usize,
) {
    let diag_at = |idx: usize| -> T {
        match diag {
            Diag::Unit => T::one(),
            Diag::NonUnit => *a.add(idx + idx * lda),
        }
    };

    match (side, uplo, trans) {
        (Side::Left, Uplo::Upper, Transpose::None) => {
            for j in 0..n {
                for kk in 0..m {
                    let t = *b.add(kk + j * ldb);
                    if t != T::zero() {
                        for i in 0..kk {
                            *b.add(i + j * ldb) = *b.add(i + j * ldb) + t * *a.add(i + kk * lda);
                        }
                        *b.add(kk + j * ldb) = t * diag_at(kk);
                    }
                }
            }
        }
        (Side::Left, Uplo::Lower, Transpose::None) => {
            for j in 0..n {
                for kk in (0..m).rev() {
                    let t = *b.add(kk + j * ldb);
                    if t != T::zero() {
                        *b.add(kk + j * ldb) = t * diag_at(kk);
                        for i in (kk + 1)..m {
                            *b.add(i + j * ldb) = *b.add(i + j * ldb) + t * *a.add(i + kk * lda);
                        }
                    }
                }
            }
        }
        (Side::Left, Uplo::Upper, Transpose::Transpose) => {
            for j in 0..n {
                for i in (0..m).rev() {
                    let mut t = *b.add(i + j * ldb) * diag_at(i);
                    for kk in 0..i {
                        t = t + *a.add(kk + i * lda) * *b.add(kk + j * ldb);
                    }
                    *b.add(i + j * ldb) = t;
                }
            }
        }
        (Side::Left, Uplo::Lower, Transpose::Transpose) => {
            for j in 0..n {
                for i in 0..m {
                    let mut t = *b.add(i + j * ldb) * diag_at(i);
                    for kk in (i + 1)..m {
                        t = t + *a.add(kk + i * lda) * *b.add(kk + j * ldb);
                    }
                    *b.add(i + j * ldb) = t;
                }
            }
        }
        (Side::Right, Uplo::Upper, Transpose::None) => {
            for j in (0..n).rev() {
                let d = diag_at(j);
                for i in 0..m {
                    *b.add(i + j * ldb) = *b.add(i + j * ldb) * d;
                }
                for kk in 0..j {
                    let t = *a.add(kk + j * lda);
                    if t != T::zero() {
                        for i in 0..m {
                            *b.add(i + j * ldb) = *b.add(i + j * ldb) + t * *b.add(i + kk * ldb);
                        }
                    }
                }
            }
        }
        (Side::Right, Uplo::Lower, Transpose::None) => {
            for j in 0..n {
                let d = diag_at(j);
                for i in 0..m {
                    *b.add(i + j * ldb) = *b.add(i + j * ldb) * d;
                }
                for kk in (j + 1)..n {
                    let t = *a.add(kk + j * lda);
                    if t != T::zero() {
                        for i in 0..m {
                            *b.add(i + j * ldb) = *b.add(i + j * ldb) + t * *b.add(i + kk * ldb);
                        }
                    }
                }
            }
        }
        (Side::Right, Uplo::Upper, Transpose::Transpose) => {
            for kk in 0..n {
                for j in 0..kk {
                    let t = *a.add(j + kk * lda);
                    if t != T::zero() {
                        for i in 0..m {
                            *b.add(i + j * ldb) = *b.add(i + j * ldb) + t * *b.add(i + kk * ldb);
                        }
                    }
                }
                let d = diag_at(kk);
                if d != T::one() {
                    for i in 0..m {
                        *b.add(i + kk * ldb) = *b.add(i + kk * ldb) * d;
                    }
                }
            }
        }
        (Side::Right, Uplo::Lower, Transpose::Transpose) => {
            for kk in (0..n).rev() {
                for j in (kk + 1)..n {
                    let t = *a.add(j + kk * lda);
                    if t != T::zero() {
                        for i in 0..m {
                            *b.add(i + j * ldb) = *b.add(i + j * ldb) + t * *b.add(i + kk * ldb);
                        }
                    }
                }
                let d = diag_at(kk);
                if d != T::one() {
                    for i in 0..m {
                        *b.add(i + kk * ldb) = *b.add(i + kk * ldb) * d;
                    }
                }
            }
        }
    }
}

/// Strided scale for one item: x[i * incx] *= s
///
/// # Safety
/// `x` must be valid for `n` strided elements.
unsafe fn scal_kernel<T: RealElement>(n: usize, s: T, x: *mut T, incx: usize) {
    for i in 0..n {
        let xp = x.add(i * incx);
        *xp = *xp * s;
    }
}

impl BatchedBlasOps<CpuRuntime> for CpuClient {
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

        let (lda, ldb, ldc) = (a.ld(), b.ld(), c.ld());

        #[cfg(feature = "rayon")]
        if batch_count > 1 && m * n * k.max(1) >= PARALLEL_WORK_THRESHOLD {
            let items: Vec<(u64, u64, u64)> = (0..batch_count)
                .map(|item| (a.item_ptr(item), b.item_ptr(item), c.item_ptr(item)))
                .collect();
            items.into_par_iter().for_each(|(pa, pb, pc)| unsafe {
                gemm_kernel(
                    transa,
                    transb,
                    m,
                    n,
                    k,
                    alpha,
                    pa as *const T,
                    lda,
                    pb as *const T,
                    ldb,
                    beta,
                    pc as *mut T,
                    ldc,
                );
            });
            return Ok(());
        }

        for item in 0..batch_count {
            unsafe {
                gemm_kernel(
                    transa,
                    transb,
                    m,
                    n,
                    k,
                    alpha,
                    a.item_ptr(item) as *const T,
                    lda,
                    b.item_ptr(item) as *const T,
                    ldb,
                    beta,
                    c.item_ptr(item) as *mut T,
                    ldc,
                );
            }
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
        unsafe {
            trmm_kernel(
                side,
                uplo,
                trans,
                diag,
                m,
                n,
                a.item_ptr(item) as *const T,
                a.ld(),
                b.item_ptr(item) as *mut T,
                b.ld(),
            );
        }
        Ok(())
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
        for item in 0..batch_count {
            unsafe {
                let s = *(scalars.item_ptr(item) as *const T);
                scal_kernel(n, s, x.item_ptr(item) as *mut T, incx);
            }
        }
        Ok(())
    }
}
