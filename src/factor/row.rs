//! Row-wise reflector application
//!
//! Applies the k reflectors of an LQ-style factorization, stored in the rows
//! of the factor matrix, to an external target. The traversal order over
//! reflector indices depends on (side, transpose): the composite operator
//! must replay the reflectors in generation order for the untransposed case
//! from each side, and reversed for the adjoint case. Each generator's
//! diagonal element is overwritten with 1 for the duration of its
//! application and restored afterwards; the save slot lives in a
//! batch-sized workspace, so the mutation never leaves device memory.

use crate::batch::{BatchedMatrix, BatchedScalars};
use crate::dtype::RealElement;
use crate::error::Result;
use crate::ops::{BatchedBlasOps, ElementwiseKernels, HouseholderOps, Side, Transpose};
use crate::runtime::{AllocGuard, Runtime, RuntimeClient};

#[allow(clippy::too_many_arguments)]
pub(super) fn apply_row_reflectors_impl<T, R, C>(
    client: &C,
    side: Side,
    trans: Transpose,
    m: usize,
    n: usize,
    k: usize,
    a: &BatchedMatrix<T>,
    tau: &BatchedScalars<T>,
    c: &BatchedMatrix<T>,
    batch_count: usize,
) -> Result<()>
where
    T: RealElement,
    R: Runtime,
    C: RuntimeClient<R> + BatchedBlasOps<R> + ElementwiseKernels<R> + HouseholderOps<R>,
{
    // quick return
    if m == 0 || n == 0 || k == 0 || batch_count == 0 {
        return Ok(());
    }

    let diag = AllocGuard::for_elements::<T>(client.allocator(), batch_count)?;

    let left = side == Side::Left;
    let forward = match (side, trans) {
        (Side::Left, Transpose::None) | (Side::Right, Transpose::Transpose) => true,
        (Side::Left, Transpose::Transpose) | (Side::Right, Transpose::None) => false,
    };

    for step in 0..k {
        let i = if forward { step } else { k - 1 - step };

        // the sub-block of C that reflector i still acts on
        let (nrow, ncol, ic, jc) = if left {
            (m - i, n, i, 0)
        } else {
            (m, n - i, 0, i)
        };

        let a_ii = a.block(i, i);

        // generator i needs a unit leading element while it is applied
        client.stash_unit_diagonal(&a_ii, diag.ptr(), batch_count)?;

        client.apply_reflector(
            side,
            nrow,
            ncol,
            &a_ii,
            a.ld(),
            &tau.shifted(i),
            &c.block(ic, jc),
            batch_count,
        )?;

        client.restore_diagonal(&a_ii, diag.ptr(), batch_count)?;
    }

    Ok(())
}
