//! CUDA kernel infrastructure for the reflector engine
//!
//! Kernels are written in CUDA C++ (`factor.cu`) and compiled to PTX by
//! build.rs. The PTX is loaded at runtime and cached per-device.
//!
//! - `loader` - Kernel loading, caching, and launch-configuration helpers
//! - `factor` - Launchers for the element-wise set, reflector application,
//!   and triangular-factor compression

mod factor;
mod loader;

pub use factor::*;
