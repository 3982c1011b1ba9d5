//! Element-wise kernels for the CPU backend
//!
//! Direct loops over batch items. Views arriving here are pre-shifted by the
//! engine, so single-element operations act on the view origin.

use super::client::CpuClient;
use super::runtime::CpuRuntime;
use crate::batch::{BatchedMatrix, BatchedScalars};
use crate::dtype::RealElement;
use crate::error::Result;
use crate::ops::ElementwiseKernels;

impl ElementwiseKernels<CpuRuntime> for CpuClient {
    fn init_identity_columns<T: RealElement>(
        &self,
        m: usize,
        n: usize,
        k: usize,
        a: &BatchedMatrix<T>,
        batch_count: usize,
    ) -> Result<()> {
        let lda = a.ld();
        for item in 0..batch_count {
            let ap = a.item_ptr(item) as *mut T;
            for j in 0..n {
                for i in 0..m {
                    unsafe {
                        let e = ap.add(i + j * lda);
                        if i == j {
                            *e = T::one();
                        } else if j > i || j >= k {
                            *e = T::zero();
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn zero_block<T: RealElement>(
        &self,
        rows: usize,
        cols: usize,
        a: &BatchedMatrix<T>,
        batch_count: usize,
    ) -> Result<()> {
        let lda = a.ld();
        for item in 0..batch_count {
            let ap = a.item_ptr(item) as *mut T;
            for j in 0..cols {
                for i in 0..rows {
                    unsafe {
                        *ap.add(i + j * lda) = T::zero();
                    }
                }
            }
        }
        Ok(())
    }

    fn set_reflected_diagonal<T: RealElement>(
        &self,
        a: &BatchedMatrix<T>,
        tau: &BatchedScalars<T>,
        batch_count: usize,
    ) -> Result<()> {
        for item in 0..batch_count {
            unsafe {
                let ap = a.item_ptr(item) as *mut T;
                let tp = tau.item_ptr(item) as *mut T;
                let t = *tp;
                *ap = T::one() - t;
                *tp = t.neg_val();
            }
        }
        Ok(())
    }

    fn negate_scalars<T: RealElement>(
        &self,
        k: usize,
        tau: &BatchedScalars<T>,
        batch_count: usize,
    ) -> Result<()> {
        for item in 0..batch_count {
            let tp = tau.item_ptr(item) as *mut T;
            for j in 0..k {
                unsafe {
                    let e = tp.add(j);
                    *e = (*e).neg_val();
                }
            }
        }
        Ok(())
    }

    fn stash_unit_diagonal<T: RealElement>(
        &self,
        a: &BatchedMatrix<T>,
        saved: u64,
        batch_count: usize,
    ) -> Result<()> {
        let sp = saved as *mut T;
        for item in 0..batch_count {
            unsafe {
                let ap = a.item_ptr(item) as *mut T;
                *sp.add(item) = *ap;
                *ap = T::one();
            }
        }
        Ok(())
    }

    fn restore_diagonal<T: RealElement>(
        &self,
        a: &BatchedMatrix<T>,
        saved: u64,
        batch_count: usize,
    ) -> Result<()> {
        let sp = saved as *const T;
        for item in 0..batch_count {
            unsafe {
                let ap = a.item_ptr(item) as *mut T;
                *ap = *sp.add(item);
            }
        }
        Ok(())
    }

    fn copy_block<T: RealElement>(
        &self,
        rows: usize,
        cols: usize,
        src: &BatchedMatrix<T>,
        dst: &BatchedMatrix<T>,
        batch_count: usize,
    ) -> Result<()> {
        let (lds, ldd) = (src.ld(), dst.ld());
        for item in 0..batch_count {
            let sp = src.item_ptr(item) as *const T;
            let dp = dst.item_ptr(item) as *mut T;
            for j in 0..cols {
                for i in 0..rows {
                    unsafe {
                        *dp.add(i + j * ldd) = *sp.add(i + j * lds);
                    }
                }
            }
        }
        Ok(())
    }

    fn subtract_block<T: RealElement>(
        &self,
        rows: usize,
        cols: usize,
        src: &BatchedMatrix<T>,
        dst: &BatchedMatrix<T>,
        batch_count: usize,
    ) -> Result<()> {
        let (lds, ldd) = (src.ld(), dst.ld());
        for item in 0..batch_count {
            let sp = src.item_ptr(item) as *const T;
            let dp = dst.item_ptr(item) as *mut T;
            for j in 0..cols {
                for i in 0..rows {
                    unsafe {
                        let e = dp.add(i + j * ldd);
                        *e = *e - *sp.add(i + j * lds);
                    }
                }
            }
        }
        Ok(())
    }
}
