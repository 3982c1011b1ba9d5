//! Backend primitive operations
//!
//! This module defines the traits each backend client implements: the
//! batched BLAS trio (general multiply, triangular multiply, scale), the
//! element-wise kernel set, and the Householder single-block primitives.
//! The factor engine in [`crate::factor`] is written once against these
//! traits and runs unchanged on every backend.

mod params;
mod traits;

pub use params::{Diag, Direction, Side, Storage, Transpose, Uplo};
pub use traits::{BatchedBlasOps, ElementwiseKernels, HouseholderOps};
