//! Backend primitive traits
//!
//! Implementations must enqueue all work on the client's compute stream in
//! call order. Dimension and pointer validation happens at the public entry
//! points in [`crate::factor`]; these primitives may assume their inputs are
//! well-formed.

use super::params::{Diag, Direction, Side, Storage, Transpose, Uplo};
use crate::batch::{BatchedMatrix, BatchedScalars};
use crate::dtype::RealElement;
use crate::error::Result;
use crate::runtime::Runtime;

/// Batched BLAS-level primitives (the numeric backend)
///
/// All matrices are column-major views; `m`, `n`, `k` follow BLAS
/// conventions for each call.
pub trait BatchedBlasOps<R: Runtime> {
    /// General multiply: `C := alpha * op(A) * op(B) + beta * C`, per item
    #[allow(clippy::too_many_arguments)]
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
    ) -> Result<()>;

    /// Triangular multiply for one batch item:
    /// `B := op(tri(A)) * B` (left) or `B := B * op(tri(A))` (right)
    ///
    /// Only the `uplo` triangle of A's item is read; with `Diag::Unit` the
    /// diagonal is assumed 1 and never loaded.
    #[allow(clippy::too_many_arguments)]
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
    ) -> Result<()>;

    /// Whether the backend provides a true batched triangular multiply
    ///
    /// Reported for introspection only; callers get correct results either
    /// way through [`BatchedBlasOps::trmm_batched`].
    fn has_native_batched_trmm(&self) -> bool {
        false
    }

    /// Triangular multiply over all batch items
    ///
    /// The provided implementation loops items on the shared stream and
    /// calls [`BatchedBlasOps::trmm`] per item. Backends with a native
    /// batched form override this and report the capability.
    #[allow(clippy::too_many_arguments)]
    fn trmm_batched<T: RealElement>(
        &self,
        side: Side,
        uplo: Uplo,
        trans: Transpose,
        diag: Diag,
        m: usize,
        n: usize,
        a: &BatchedMatrix<T>,
        b: &BatchedMatrix<T>,
        batch_count: usize,
    ) -> Result<()> {
        for item in 0..batch_count {
            self.trmm(side, uplo, trans, diag, m, n, a, b, item)?;
        }
        Ok(())
    }

    /// Strided vector scale with a per-item scalar:
    /// `x[b][i * incx] *= scalars[b]` for `i < n`, per item
    fn scal_batched<T: RealElement>(
        &self,
        n: usize,
        scalars: &BatchedScalars<T>,
        x: &BatchedMatrix<T>,
        incx: usize,
        batch_count: usize,
    ) -> Result<()>;
}

/// Element-wise device kernels used by the builders
///
/// Views passed to the single-element operations are pre-shifted to the
/// element they act on.
pub trait ElementwiseKernels<R: Runtime> {
    /// Initialize the m×n target for orthogonal assembly from k reflectors:
    /// unit diagonal, zero strict upper triangle, zero columns `j >= k`
    fn init_identity_columns<T: RealElement>(
        &self,
        m: usize,
        n: usize,
        k: usize,
        a: &BatchedMatrix<T>,
        batch_count: usize,
    ) -> Result<()>;

    /// Zero the `rows × cols` block at the view origin
    fn zero_block<T: RealElement>(
        &self,
        rows: usize,
        cols: usize,
        a: &BatchedMatrix<T>,
        batch_count: usize,
    ) -> Result<()>;

    /// Per item: write `1 - tau` at the view origin and negate the scalar
    ///
    /// The negated scalar feeds the column scale that follows; the sign is
    /// restored by [`ElementwiseKernels::negate_scalars`] after the loop.
    fn set_reflected_diagonal<T: RealElement>(
        &self,
        a: &BatchedMatrix<T>,
        tau: &BatchedScalars<T>,
        batch_count: usize,
    ) -> Result<()>;

    /// Per item: negate scalars `0..k`
    fn negate_scalars<T: RealElement>(
        &self,
        k: usize,
        tau: &BatchedScalars<T>,
        batch_count: usize,
    ) -> Result<()>;

    /// Per item: save the element at the view origin into `saved[b]` and
    /// overwrite it with 1
    fn stash_unit_diagonal<T: RealElement>(
        &self,
        a: &BatchedMatrix<T>,
        saved: u64,
        batch_count: usize,
    ) -> Result<()>;

    /// Per item: restore the element at the view origin from `saved[b]`
    fn restore_diagonal<T: RealElement>(
        &self,
        a: &BatchedMatrix<T>,
        saved: u64,
        batch_count: usize,
    ) -> Result<()>;

    /// Copy the `rows × cols` block at `src`'s origin to `dst`
    fn copy_block<T: RealElement>(
        &self,
        rows: usize,
        cols: usize,
        src: &BatchedMatrix<T>,
        dst: &BatchedMatrix<T>,
        batch_count: usize,
    ) -> Result<()>;

    /// Subtract the `rows × cols` block at `src`'s origin from `dst`
    fn subtract_block<T: RealElement>(
        &self,
        rows: usize,
        cols: usize,
        src: &BatchedMatrix<T>,
        dst: &BatchedMatrix<T>,
        batch_count: usize,
    ) -> Result<()>;
}

/// Single-reflector and triangular-factor primitives
pub trait HouseholderOps<R: Runtime> {
    /// Apply the reflector `I - tau * v * vᵗ` to the m×n target in place
    ///
    /// `v` is read as stored (callers arrange the unit element beforehand);
    /// its length is `m` for `Side::Left`, `n` for `Side::Right`, with
    /// consecutive entries `incv` elements apart.
    #[allow(clippy::too_many_arguments)]
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
    ) -> Result<()>;

    /// Compress `k` reflectors of length `rows` into the k×k
    /// upper-triangular factor `t` (leading dimension `t.ld()`)
    ///
    /// Only the forward, column-wise form is implemented; other variants
    /// fail with `NotImplemented`.
    #[allow(clippy::too_many_arguments)]
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
    ) -> Result<()>;
}
