//! Orthogonal-factor assembly from stored reflectors
//!
//! Shared implementations of the unblocked and blocked builders. Inputs are
//! validated at the public boundary; these functions only quick-return on
//! empty work.

use super::block_reflector::apply_block_reflector_impl;
use super::BlockConfig;
use crate::batch::{BatchedMatrix, BatchedScalars};
use crate::dtype::RealElement;
use crate::error::Result;
use crate::ops::{
    BatchedBlasOps, Direction, ElementwiseKernels, HouseholderOps, Side, Storage, Transpose,
};
use crate::runtime::{AllocGuard, Runtime, RuntimeClient};

/// Column-at-a-time assembly of the orthogonal factor
///
/// Initializes the target to identity columns, then applies the stored
/// reflectors from the last to the first. Column j of the result is
/// materialized in place over its own generator: the diagonal becomes
/// `1 - tau[j]` and the sub-diagonal entries are the generator scaled by
/// `-tau[j]`, the closed-form effect of reflector j on its generating
/// column. The scalar vector is sign-flipped to feed the scale step and
/// restored after the loop.
pub(super) fn assemble_unblocked_impl<T, R, C>(
    client: &C,
    m: usize,
    n: usize,
    k: usize,
    a: &BatchedMatrix<T>,
    tau: &BatchedScalars<T>,
    batch_count: usize,
) -> Result<()>
where
    T: RealElement,
    R: Runtime,
    C: RuntimeClient<R> + BatchedBlasOps<R> + ElementwiseKernels<R> + HouseholderOps<R>,
{
    // quick return
    if m == 0 || n == 0 || batch_count == 0 {
        return Ok(());
    }

    client.init_identity_columns(m, n, k, a, batch_count)?;

    for j in (0..k).rev() {
        // apply H(j) to A[j:m, j+1:n] from the left
        if j + 1 < n {
            client.apply_reflector(
                Side::Left,
                m - j,
                n - j - 1,
                &a.block(j, j),
                1,
                &tau.shifted(j),
                &a.block(j, j + 1),
                batch_count,
            )?;
        }

        // set the diagonal element and negate tau
        client.set_reflected_diagonal(&a.block(j, j), &tau.shifted(j), batch_count)?;

        // update column j below the diagonal with the negated scalar
        if j + 1 < m {
            client.scal_batched(m - j - 1, &tau.shifted(j), &a.block(j + 1, j), 1, batch_count)?;
        }
    }

    // restore the scalar signs
    client.negate_scalars(k, tau, batch_count)?;

    Ok(())
}

/// Blocked assembly of the orthogonal factor
///
/// Small reflector counts go straight to the unblocked builder. Otherwise
/// the trailing `k - kk` reflectors are assembled unblocked, and the loop
/// walks block boundaries downward: each iteration compresses its block
/// into a triangular factor, applies it to the already-finalized columns on
/// the right in one block-level pass, and assembles the block's own columns
/// unblocked. One workspace of `block_size² × batch_count` elements backs
/// the triangular factor and lives for the whole call.
#[allow(clippy::too_many_arguments)]
pub(super) fn assemble_blocked_impl<T, R, C>(
    client: &C,
    m: usize,
    n: usize,
    k: usize,
    a: &BatchedMatrix<T>,
    tau: &BatchedScalars<T>,
    batch_count: usize,
    config: &BlockConfig,
) -> Result<()>
where
    T: RealElement,
    R: Runtime,
    C: RuntimeClient<R> + BatchedBlasOps<R> + ElementwiseKernels<R> + HouseholderOps<R>,
{
    // quick return
    if m == 0 || n == 0 || batch_count == 0 {
        return Ok(());
    }

    // small problems run entirely unblocked
    if k <= config.switch_size {
        return assemble_unblocked_impl(client, m, n, k, a, tau, batch_count);
    }

    let jb = config.block_size;

    let work = AllocGuard::for_elements::<T>(client.allocator(), jb * jb * batch_count)?;
    let t = BatchedMatrix::<T>::strided(work.ptr(), jb * jb, jb);

    // start of the last full block, and of the unblocked tail
    let mut j = ((k - config.switch_size - 1) / jb) * jb;
    let kk = k.min(j + jb);

    // assemble the unblocked tail and clear the columns above it
    if kk < n {
        client.zero_block(kk, n - kk, &a.block(0, kk), batch_count)?;
        assemble_unblocked_impl(
            client,
            m - kk,
            n - kk,
            k - kk,
            &a.block(kk, kk),
            &tau.shifted(kk),
            batch_count,
        )?;
    }

    loop {
        // update the already-assembled columns with this block's reflectors,
        // replacing jb rank-1 updates with one block-level pass
        if j + jb < n {
            client.build_triangular_factor(
                Direction::Forward,
                Storage::ColumnWise,
                m - j,
                jb,
                &a.block(j, j),
                &tau.shifted(j),
                &t,
                batch_count,
            )?;

            apply_block_reflector_impl(
                client,
                Side::Left,
                Transpose::None,
                Direction::Forward,
                Storage::ColumnWise,
                m - j,
                n - j - jb,
                jb,
                &a.block(j, j),
                &t,
                &a.block(j, j + jb),
                batch_count,
            )?;
        }

        // clear above the block, then assemble its own columns
        if j > 0 {
            client.zero_block(j, jb, &a.block(0, j), batch_count)?;
        }
        assemble_unblocked_impl(
            client,
            m - j,
            jb,
            jb,
            &a.block(j, j),
            &tau.shifted(j),
            batch_count,
        )?;

        if j == 0 {
            break;
        }
        j -= jb;
    }

    Ok(())
}
