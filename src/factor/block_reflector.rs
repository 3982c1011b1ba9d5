//! Block-reflector application
//!
//! Applies `H = I - V·F·Vᵗ` (or its transpose) to a target matrix through
//! backend multiply primitives instead of k sequential rank-1 updates.
//!
//! With the target split at row (or column) k into A1 over the unit-
//! triangular part V1 of the generators and A2 over the dense trailing part
//! V2, the update is accumulated in a k-wide work buffer:
//!
//! ```text
//! W  = op(V1) · A1 + op(V2) · A2     (trmm, then gemm when V is trapezoidal)
//! W  = op(F) · W                     (trmm)
//! A2 -= V2 · W                       (gemm)
//! A1 -= V1 · W                       (trmm, then block subtract)
//! ```
//!
//! mirrored for right-side application.

use crate::batch::{offset2d, BatchedMatrix};
use crate::dtype::RealElement;
use crate::error::{Error, Result};
use crate::ops::{
    BatchedBlasOps, Diag, Direction, ElementwiseKernels, Side, Storage, Transpose, Uplo,
};
use crate::runtime::{AllocGuard, Runtime, RuntimeClient};

/// Shared implementation of block-reflector application
///
/// Inputs are validated at the public boundary except for the direction,
/// which is rejected here so the blocked builder shares the check.
#[allow(clippy::too_many_arguments)]
pub(super) fn apply_block_reflector_impl<T, R, C>(
    client: &C,
    side: Side,
    trans: Transpose,
    direction: Direction,
    storage: Storage,
    m: usize,
    n: usize,
    k: usize,
    v: &BatchedMatrix<T>,
    f: &BatchedMatrix<T>,
    a: &BatchedMatrix<T>,
    batch_count: usize,
) -> Result<()>
where
    T: RealElement,
    R: Runtime,
    C: RuntimeClient<R> + BatchedBlasOps<R> + ElementwiseKernels<R>,
{
    // quick return
    if m == 0 || n == 0 || batch_count == 0 {
        return Ok(());
    }

    // rejected before any workspace or device work; the target is untouched
    if direction == Direction::Backward {
        return Err(Error::NotImplemented {
            feature: "backward block-reflector application",
        });
    }

    let leftside = side == Side::Left;
    let colwise = storage == Storage::ColumnWise;

    // work buffer is k×n (left) or m×k (right); V is trapezoidal when the
    // applied dimension exceeds the reflector count
    let (order, ldw, trap_len) = if leftside {
        (n, k, m - k.min(m))
    } else {
        (k, m, n - k.min(n))
    };
    let trap = trap_len > 0;

    // leading-block triangle, dense-part offset, and multiply sense all
    // follow from the storage convention and side
    let (uplo_v, v2_offset, transp) = if colwise {
        let t = if leftside {
            Transpose::Transpose
        } else {
            Transpose::None
        };
        (Uplo::Lower, offset2d(k, 0, v.ld()), t)
    } else {
        let t = if leftside {
            Transpose::None
        } else {
            Transpose::Transpose
        };
        (Uplo::Upper, offset2d(0, k, v.ld()), t)
    };

    let guard = AllocGuard::for_elements::<T>(client.allocator(), ldw * order * batch_count)?;
    let work = BatchedMatrix::<T>::strided(guard.ptr(), ldw * order, ldw);
    let v2 = v.shifted(v2_offset);

    // W = A1
    client.copy_block(ldw, order, a, &work, batch_count)?;

    // W = op(V1) · W  or  W · op(V1)
    client.trmm_batched(
        side,
        uplo_v,
        transp,
        Diag::Unit,
        ldw,
        order,
        v,
        &work,
        batch_count,
    )?;

    // accumulate the trailing dense part: W += op(V2) · A2 or A2 · op(V2)
    if trap {
        if leftside {
            client.gemm_batched(
                transp,
                Transpose::None,
                ldw,
                order,
                trap_len,
                T::one(),
                &v2,
                &a.block(k, 0),
                T::one(),
                &work,
                batch_count,
            )?;
        } else {
            client.gemm_batched(
                Transpose::None,
                transp,
                ldw,
                order,
                trap_len,
                T::one(),
                &a.block(0, k),
                &v2,
                T::one(),
                &work,
                batch_count,
            )?;
        }
    }

    // W = op(F) · W  or  W · op(F)
    client.trmm_batched(
        side,
        Uplo::Upper,
        trans,
        Diag::NonUnit,
        ldw,
        order,
        f,
        &work,
        batch_count,
    )?;

    // A2 -= V2 · W  or  W · V2, with the opposite multiply sense
    let transp2 = transp.flipped();
    if trap {
        if leftside {
            client.gemm_batched(
                transp2,
                Transpose::None,
                trap_len,
                order,
                ldw,
                T::one().neg_val(),
                &v2,
                &work,
                T::one(),
                &a.block(k, 0),
                batch_count,
            )?;
        } else {
            client.gemm_batched(
                Transpose::None,
                transp2,
                ldw,
                trap_len,
                order,
                T::one().neg_val(),
                &work,
                &v2,
                T::one(),
                &a.block(0, k),
                batch_count,
            )?;
        }
    }

    // A1 -= V1 · W  or  W · V1
    client.trmm_batched(
        side,
        uplo_v,
        transp2,
        Diag::Unit,
        ldw,
        order,
        v,
        &work,
        batch_count,
    )?;
    client.subtract_block(ldw, order, &work, a, batch_count)?;

    Ok(())
}
