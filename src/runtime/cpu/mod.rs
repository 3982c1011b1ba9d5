//! CPU runtime implementation
//!
//! The CPU runtime uses standard heap allocation and provides the reference
//! implementation for every backend primitive: the batched BLAS trio
//! (general multiply, triangular multiply, scale), the element-wise kernel
//! set, and the Householder primitives. Operations execute eagerly on the
//! calling thread, which trivially satisfies the stream-ordered contract.

mod blas;
mod client;
mod device;
mod householder;
mod kernels;
mod runtime;

pub use client::{CpuAllocator, CpuClient};
pub use device::CpuDevice;
pub use runtime::CpuRuntime;

impl crate::factor::FactorOps<CpuRuntime> for CpuClient {}
