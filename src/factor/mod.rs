//! Orthogonal-factor assembly and block-reflector application
//!
//! The entry points here are the public surface of the engine. Each one
//! validates dimensions, leading dimensions, and buffer references before
//! dispatching to a shared implementation written against the backend
//! primitive traits, so the same control flow runs on every backend.
//!
//! # Operations
//!
//! - [`FactorOps::assemble_orthogonal`] - build Q from k stored reflectors,
//!   switching between blocked and unblocked execution
//! - [`FactorOps::assemble_orthogonal_unblocked`] - the column-at-a-time
//!   variant, used directly for small problems
//! - [`FactorOps::apply_block_reflector`] - apply a compact reflector block
//!   (generators V, triangular factor F) to a target matrix
//! - [`FactorOps::apply_row_reflectors`] - apply reflectors stored row-wise
//!   (an LQ-style factorization) to an external matrix
//!
//! All work is enqueued on the client's compute stream in issue order; a
//! rejected call enqueues nothing and leaves caller data untouched.

mod block_reflector;
mod orthogonal;
mod row;
mod validate;

pub use crate::ops::{Direction, Side, Storage, Transpose};

use crate::batch::{BatchedMatrix, BatchedScalars};
use crate::dtype::RealElement;
use crate::error::Result;
use crate::ops::{BatchedBlasOps, ElementwiseKernels, HouseholderOps};
use crate::runtime::{Runtime, RuntimeClient};

/// Tuning constants for the blocked orthogonal builder
///
/// `switch_size` is the reflector count at or below which the builder runs
/// entirely unblocked; `block_size` is the column granularity of blocked
/// iterations. `block_size` must not exceed `switch_size`, which keeps every
/// blocked iteration inside the reflector range.
#[derive(Debug, Clone, Copy)]
pub struct BlockConfig {
    /// Reflector count at or below which execution is fully unblocked
    pub switch_size: usize,
    /// Column width of one blocked iteration
    pub block_size: usize,
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self {
            switch_size: 128,
            block_size: 64,
        }
    }
}

/// Public entry points of the reflector engine
///
/// Implemented by every backend client; the provided methods validate at the
/// call boundary and then run the shared implementations.
pub trait FactorOps<R: Runtime>:
    RuntimeClient<R> + BatchedBlasOps<R> + ElementwiseKernels<R> + HouseholderOps<R> + Sized
{
    /// Build the m×n orthogonal factor implied by the k reflectors stored in
    /// `a`'s columns, one column at a time
    ///
    /// On entry, column `j < k` of each item holds the generator of
    /// reflector `j` below the diagonal and `tau` its scalars. On success,
    /// the leading n columns of each item hold Q. `tau` is restored to its
    /// input values.
    ///
    /// Requires `k <= n <= m` and `a.ld() >= m`. Succeeds without touching
    /// device data when `m`, `n`, or `batch_count` is zero.
    fn assemble_orthogonal_unblocked<T: RealElement>(
        &self,
        m: usize,
        n: usize,
        k: usize,
        a: &BatchedMatrix<T>,
        tau: &BatchedScalars<T>,
        batch_count: usize,
    ) -> Result<()> {
        validate::orthogonal_inputs(m, n, k, a, tau, batch_count)?;
        orthogonal::assemble_unblocked_impl(self, m, n, k, a, tau, batch_count)
    }

    /// Build the m×n orthogonal factor implied by the k reflectors stored in
    /// `a`'s columns, using blocked execution for large reflector counts
    ///
    /// Delegates to the unblocked builder when `k <= config.switch_size`;
    /// otherwise alternates block-level updates (triangular factor + block
    /// reflector) with unblocked assembly across descending column blocks.
    /// Both paths produce the same Q up to floating-point reordering.
    fn assemble_orthogonal<T: RealElement>(
        &self,
        m: usize,
        n: usize,
        k: usize,
        a: &BatchedMatrix<T>,
        tau: &BatchedScalars<T>,
        batch_count: usize,
        config: &BlockConfig,
    ) -> Result<()> {
        validate::orthogonal_inputs(m, n, k, a, tau, batch_count)?;
        validate::block_config(config)?;
        orthogonal::assemble_blocked_impl(self, m, n, k, a, tau, batch_count, config)
    }

    /// Apply the block reflector `H = I - V·F·Vᵗ` (or its transpose) to the
    /// m×n target `a` from the given side
    ///
    /// `v` holds the k generators in the layout named by `storage`; `f` is
    /// the k×k upper-triangular factor. Only `Direction::Forward` is
    /// supported; backward requests fail with `NotImplemented` and leave the
    /// target untouched.
    #[allow(clippy::too_many_arguments)]
    fn apply_block_reflector<T: RealElement>(
        &self,
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
    ) -> Result<()> {
        validate::block_reflector_inputs(side, storage, m, n, k, v, f, a, batch_count)?;
        block_reflector::apply_block_reflector_impl(
            self,
            side,
            trans,
            direction,
            storage,
            m,
            n,
            k,
            v,
            f,
            a,
            batch_count,
        )
    }

    /// Apply the k reflectors of a row-wise stored factorization to the m×n
    /// matrix `c` from the given side and transpose sense
    ///
    /// `a` holds generator `i` in row `i` (k×m for `Side::Left`, k×n for
    /// `Side::Right`); its diagonal entries are temporarily overwritten with
    /// 1 during application and restored before return.
    #[allow(clippy::too_many_arguments)]
    fn apply_row_reflectors<T: RealElement>(
        &self,
        side: Side,
        trans: Transpose,
        m: usize,
        n: usize,
        k: usize,
        a: &BatchedMatrix<T>,
        tau: &BatchedScalars<T>,
        c: &BatchedMatrix<T>,
        batch_count: usize,
    ) -> Result<()> {
        validate::row_reflector_inputs(side, m, n, k, a, tau, c, batch_count)?;
        row::apply_row_reflectors_impl(self, side, trans, m, n, k, a, tau, c, batch_count)
    }
}
