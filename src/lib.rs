//! # orq
//!
//! **Batched Householder-reflector primitives with multi-backend GPU acceleration.**
//!
//! orq provides the computational core beneath dense QR/LQ-style
//! factorizations: assembling the orthogonal factor Q from a compact
//! reflector representation, and applying blocks of reflectors to other
//! matrices - with the same API across CPU and CUDA backends.
//!
//! ## What it does
//!
//! - **Orthogonal assembly**: rebuild Q from k stored Householder
//!   generators, choosing between column-at-a-time rank-1 updates and
//!   BLAS-level block updates; both paths are numerically equivalent
//! - **Block reflectors**: apply a compact (V, F) reflector block to a
//!   target matrix in one multiply-level pass
//! - **Row-wise reflectors**: apply LQ-style stored reflectors to an
//!   external matrix from either side, transposed or not
//! - **Batched throughout**: every operation processes `batch_count`
//!   same-shaped matrices per call, stored as one strided region or as an
//!   array of independent per-item references
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use orq::prelude::*;
//!
//! let device = CpuDevice::new();
//! let client = CpuRuntime::default_client(&device);
//!
//! // a holds the QR factorization output: reflectors below the diagonal
//! client.assemble_orthogonal(m, n, k, &a, &tau, batch_count, &BlockConfig::default())?;
//! client.synchronize();
//! ```
//!
//! ## Feature Flags
//!
//! - `cpu` (default): CPU backend
//! - `cuda`: NVIDIA CUDA backend
//! - `rayon` (default): Multi-threaded CPU batch execution

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod batch;
pub mod dtype;
pub mod error;
pub mod factor;
pub mod ops;
pub mod runtime;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::batch::{BatchLayout, BatchedMatrix, BatchedScalars};
    pub use crate::dtype::DType;
    pub use crate::error::{Error, Result};
    pub use crate::factor::{BlockConfig, Direction, FactorOps, Side, Storage, Transpose};
    pub use crate::ops::{BatchedBlasOps, ElementwiseKernels, HouseholderOps};
    pub use crate::runtime::{Device, Runtime, RuntimeClient};

    #[cfg(feature = "cpu")]
    pub use crate::runtime::cpu::{CpuDevice, CpuRuntime};

    #[cfg(feature = "cuda")]
    pub use crate::runtime::cuda::{CudaDevice, CudaRuntime};
}

/// Default runtime based on enabled features
///
/// - With `cuda` feature: `CudaRuntime`
/// - Otherwise: `CpuRuntime`
#[cfg(feature = "cuda")]
pub type DefaultRuntime = runtime::cuda::CudaRuntime;

/// Default runtime based on enabled features
#[cfg(not(feature = "cuda"))]
pub type DefaultRuntime = runtime::cpu::CpuRuntime;
