//! Input validation for the public entry points
//!
//! Every check runs before any backend call, so a rejected request performs
//! no device-visible work. Sizes are checked before pointers.

use super::BlockConfig;
use crate::batch::{BatchedMatrix, BatchedScalars};
use crate::dtype::RealElement;
use crate::error::{Error, Result};
use crate::ops::{Side, Storage};

pub(super) fn orthogonal_inputs<T: RealElement>(
    m: usize,
    n: usize,
    k: usize,
    a: &BatchedMatrix<T>,
    tau: &BatchedScalars<T>,
    batch_count: usize,
) -> Result<()> {
    if n > m {
        return Err(Error::invalid_size("n", format!("n ({}) > m ({})", n, m)));
    }
    if k > n {
        return Err(Error::invalid_size("k", format!("k ({}) > n ({})", k, n)));
    }
    if a.ld() < m.max(1) {
        return Err(Error::invalid_size(
            "lda",
            format!("lda ({}) < m ({})", a.ld(), m),
        ));
    }
    if a.is_null(batch_count) {
        return Err(Error::null_pointer("a"));
    }
    if tau.is_null() {
        return Err(Error::null_pointer("tau"));
    }
    Ok(())
}

pub(super) fn block_config(config: &BlockConfig) -> Result<()> {
    if config.block_size == 0 {
        return Err(Error::invalid_size("config.block_size", "must be >= 1"));
    }
    if config.block_size > config.switch_size {
        return Err(Error::invalid_size(
            "config.block_size",
            format!(
                "block_size ({}) > switch_size ({})",
                config.block_size, config.switch_size
            ),
        ));
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub(super) fn block_reflector_inputs<T: RealElement>(
    side: Side,
    storage: Storage,
    m: usize,
    n: usize,
    k: usize,
    v: &BatchedMatrix<T>,
    f: &BatchedMatrix<T>,
    a: &BatchedMatrix<T>,
    batch_count: usize,
) -> Result<()> {
    if k < 1 {
        return Err(Error::invalid_size("k", "must be >= 1"));
    }
    let applied_dim = match side {
        Side::Left => m,
        Side::Right => n,
    };
    if m != 0 && n != 0 && k > applied_dim {
        return Err(Error::invalid_size(
            "k",
            format!("k ({}) > applied dimension ({})", k, applied_dim),
        ));
    }
    if a.ld() < m.max(1) {
        return Err(Error::invalid_size(
            "lda",
            format!("lda ({}) < m ({})", a.ld(), m),
        ));
    }
    if f.ld() < k {
        return Err(Error::invalid_size(
            "ldf",
            format!("ldf ({}) < k ({})", f.ld(), k),
        ));
    }
    // The generator matrix is k×len row-wise, len×k column-wise, where len
    // is the target extent on the application side.
    let min_ldv = match storage {
        Storage::RowWise => k,
        Storage::ColumnWise => match side {
            Side::Left => m.max(1),
            Side::Right => n.max(1),
        },
    };
    if v.ld() < min_ldv {
        return Err(Error::invalid_size(
            "ldv",
            format!("ldv ({}) < {}", v.ld(), min_ldv),
        ));
    }
    if v.is_null(batch_count) {
        return Err(Error::null_pointer("v"));
    }
    if a.is_null(batch_count) {
        return Err(Error::null_pointer("a"));
    }
    if f.is_null(batch_count) {
        return Err(Error::null_pointer("f"));
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub(super) fn row_reflector_inputs<T: RealElement>(
    side: Side,
    m: usize,
    n: usize,
    k: usize,
    a: &BatchedMatrix<T>,
    tau: &BatchedScalars<T>,
    c: &BatchedMatrix<T>,
    batch_count: usize,
) -> Result<()> {
    let applied_dim = match side {
        Side::Left => m,
        Side::Right => n,
    };
    if k > applied_dim {
        return Err(Error::invalid_size(
            "k",
            format!("k ({}) > applied dimension ({})", k, applied_dim),
        ));
    }
    if a.ld() < k.max(1) {
        return Err(Error::invalid_size(
            "lda",
            format!("lda ({}) < k ({})", a.ld(), k),
        ));
    }
    if c.ld() < m.max(1) {
        return Err(Error::invalid_size(
            "ldc",
            format!("ldc ({}) < m ({})", c.ld(), m),
        ));
    }
    if a.is_null(batch_count) {
        return Err(Error::null_pointer("a"));
    }
    if tau.is_null() {
        return Err(Error::null_pointer("tau"));
    }
    if c.is_null(batch_count) {
        return Err(Error::null_pointer("c"));
    }
    Ok(())
}
