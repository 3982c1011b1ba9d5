//! Householder primitives for the CPU backend
//!
//! Single-reflector application and triangular-factor compression, per batch
//! item. The reflector vector is read as stored; callers arrange the unit
//! element before applying (the builders do this through the element-wise
//! kernel set).

use super::client::CpuClient;
use super::runtime::CpuRuntime;
use crate::batch::{BatchedMatrix, BatchedScalars};
use crate::dtype::RealElement;
use crate::error::{Error, Result};
use crate::ops::{Direction, HouseholderOps, Side, Storage};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Minimum per-item update work (m*n) before Rayon dispatch pays off
#[cfg(feature = "rayon")]
const PARALLEL_WORK_THRESHOLD: usize = 16_384;

/// Apply `I - tau * v * vᵗ` to the m×n matrix at `c` for one item
///
/// # Safety
/// - `v` must be valid for m (left) or n (right) elements strided by `incv`
/// - `c` must be a valid m×n column-major matrix with leading dimension ldc
unsafe fn reflector_kernel<T: RealElement>(
    side: Side,
    m: usize,
    n: usize,
    v: *const T,
    incv: usize,
    tau: T,
    c: *mut T,
    ldc: usize,
) {
    if tau == T::zero() {
        return;
    }

    match side {
        Side::Left => {
            // w = Cᵗ v, then C -= tau * v * wᵗ
            for j in 0..n {
                let mut w = T::zero();
                for i in 0..m {
                    w = w + *v.add(i * incv) * *c.add(i + j * ldc);
                }
                let tw = tau * w;
                for i in 0..m {
                    let e = c.add(i + j * ldc);
                    *e = *e - tw * *v.add(i * incv);
                }
            }
        }
        Side::Right => {
            // w = C v, then C -= tau * w * vᵗ
            for i in 0..m {
                let mut w = T::zero();
                for j in 0..n {
                    w = w + *c.add(i + j * ldc) * *v.add(j * incv);
                }
                let tw = tau * w;
                for j in 0..n {
                    let e = c.add(i + j * ldc);
                    *e = *e - tw * *v.add(j * incv);
                }
            }
        }
    }
}

/// Build the k×k upper-triangular factor of k forward column-wise
/// reflectors of length `rows` for one item
///
/// # Safety
/// - `v` must be a valid rows×k column-major matrix (unit lower-trapezoidal;
///   only entries below the unit diagonal are read)
/// - `tau` must hold k scalars, `t` a k×k matrix with leading dimension ldt
unsafe fn triangular_factor_kernel<T: RealElement>(
    rows: usize,
    k: usize,
    v: *const T,
    ldv: usize,
    tau: *const T,
    t: *mut T,
    ldt: usize,
) {
    for i in 0..k {
        let tau_i = *tau.add(i);

        if tau_i == T::zero() {
            for j in 0..i {
                *t.add(j + i * ldt) = T::zero();
            }
        } else {
            // T[0:i, i] = -tau_i * V[i:rows, 0:i]ᵗ * V[i:rows, i],
            // with the unit element V[i, i] implicit
            for j in 0..i {
                let mut s = *v.add(i + j * ldv);
                for r in (i + 1)..rows {
                    s = s + *v.add(r + j * ldv) * *v.add(r + i * ldv);
                }
                *t.add(j + i * ldt) = tau_i.neg_val() * s;
            }

            // T[0:i, i] = T[0:i, 0:i] * T[0:i, i]  (upper-triangular multiply)
            for j in 0..i {
                let x = *t.add(j + i * ldt);
                if x != T::zero() {
                    for r in 0..j {
                        let e = t.add(r + i * ldt);
                        *e = *e + x * *t.add(r + j * ldt);
                    }
                    *t.add(j + i * ldt) = x * *t.add(j + j * ldt);
                }
            }
        }

        *t.add(i + i * ldt) = tau_i;
    }
}

impl HouseholderOps<CpuRuntime> for CpuClient {
    fn apply_reflector<T: RealElement>(
        &self,
        side: Side,
        m: usize,
        n: usize,
        v: &BatchedMatrix<T>,
        incv: usize,
        tau: &BatchedScalars<T>,
        c: &BatchedMatrix<T>,
        batch_count: usize,
    ) -> Result<()> {
        if m == 0 || n == 0 || batch_count == 0 {
            return Ok(());
        }

        let ldc = c.ld();

        #[cfg(feature = "rayon")]
        if batch_count > 1 && m * n >= PARALLEL_WORK_THRESHOLD {
            let items: Vec<(u64, u64, u64)> = (0..batch_count)
                .map(|item| (v.item_ptr(item), tau.item_ptr(item), c.item_ptr(item)))
                .collect();
            items.into_par_iter().for_each(|(pv, pt, pc)| unsafe {
                let tau_val = *(pt as *const T);
                reflector_kernel(side, m, n, pv as *const T, incv, tau_val, pc as *mut T, ldc);
            });
            return Ok(());
        }

        for item in 0..batch_count {
            unsafe {
                let tau_val = *(tau.item_ptr(item) as *const T);
                reflector_kernel(
                    side,
                    m,
                    n,
                    v.item_ptr(item) as *const T,
                    incv,
                    tau_val,
                    c.item_ptr(item) as *mut T,
                    ldc,
                );
            }
        }
        Ok(())
    }

    fn build_triangular_factor<T: RealElement>(
        &self,
        direction: Direction,
        storage: Storage,
        rows: usize,
        k: usize,
        v: &BatchedMatrix<T>,
        tau: &BatchedScalars<T>,
        t: &BatchedMatrix<T>,
        batch_count: usize,
    ) -> Result<()> {
        if direction == Direction::Backward {
            return Err(Error::NotImplemented {
                feature: "backward triangular factor",
            });
        }
        if storage == Storage::RowWise {
            return Err(Error::NotImplemented {
                feature: "row-wise triangular factor",
            });
        }
        if k == 0 || batch_count == 0 {
            return Ok(());
        }

        for item in 0..batch_count {
            unsafe {
                triangular_factor_kernel(
                    rows,
                    k,
                    v.item_ptr(item) as *const T,
                    v.ld(),
                    tau.item_ptr(item) as *const T,
                    t.item_ptr(item) as *mut T,
                    t.ld(),
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Runtime;
    use crate::runtime::cpu::CpuDevice;

    fn upload(data: &[f64]) -> u64 {
        let device = CpuDevice::new();
        let ptr = CpuRuntime::allocate(data.len() * 8, &device);
        CpuRuntime::copy_to_device(bytemuck::cast_slice(data), ptr, &device);
        ptr
    }

    fn download(ptr: u64, len: usize) -> Vec<f64> {
        let device = CpuDevice::new();
        let mut out = vec![0.0f64; len];
        CpuRuntime::copy_from_device(ptr, bytemuck::cast_slice_mut(&mut out), &device);
        out
    }

    fn free(ptr: u64, len: usize) {
        CpuRuntime::deallocate(ptr, len * 8, &CpuDevice::new());
    }

    #[test]
    fn test_apply_reflector_left() {
        let client = CpuClient::new(CpuDevice::new());

        // v = (1, 1), tau = 1: H = I - v vᵗ = [0 -1; -1 0]
        let pv = upload(&[1.0, 1.0]);
        let pt = upload(&[1.0]);
        let pc = upload(&[3.0, 5.0]);

        let v = BatchedMatrix::<f64>::strided(pv, 2, 2);
        let tau = BatchedScalars::<f64>::strided(pt, 1);
        let c = BatchedMatrix::<f64>::strided(pc, 2, 2);

        client.apply_reflector(Side::Left, 2, 1, &v, 1, &tau, &c, 1).unwrap();

        // H * (3, 5)ᵗ = (-5, -3)ᵗ
        assert_eq!(download(pc, 2), vec![-5.0, -3.0]);

        free(pv, 2);
        free(pt, 1);
        free(pc, 2);
    }

    #[test]
    fn test_apply_reflector_right_row_vector() {
        let client = CpuClient::new(CpuDevice::new());

        // v stored as a row of a 2x2 matrix (incv = ld = 2)
        let pv = upload(&[1.0, 9.0, 1.0, 9.0]);
        let pt = upload(&[1.0]);
        let pc = upload(&[3.0, 5.0]);

        let v = BatchedMatrix::<f64>::strided(pv, 4, 2);
        let tau = BatchedScalars::<f64>::strided(pt, 1);
        let c = BatchedMatrix::<f64>::strided(pc, 2, 1);

        client.apply_reflector(Side::Right, 1, 2, &v, 2, &tau, &c, 1).unwrap();

        // (3, 5) * H = (-5, -3)
        assert_eq!(download(pc, 2), vec![-5.0, -3.0]);

        free(pv, 4);
        free(pt, 1);
        free(pc, 2);
    }

    #[test]
    fn test_triangular_factor_two_reflectors() {
        let client = CpuClient::new(CpuDevice::new());

        // V = [1 0; 2 1; 3 4] (unit diagonal stored explicitly for clarity),
        // tau = (0.5, 0.25)
        let pv = upload(&[1.0, 2.0, 3.0, 0.0, 1.0, 4.0]);
        let pt = upload(&[0.5, 0.25]);
        let pf = upload(&[0.0; 4]);

        let v = BatchedMatrix::<f64>::strided(pv, 6, 3);
        let tau = BatchedScalars::<f64>::strided(pt, 2);
        let t = BatchedMatrix::<f64>::strided(pf, 4, 2);

        client
            .build_triangular_factor(Direction::Forward, Storage::ColumnWise, 3, 2, &v, &tau, &t, 1)
            .unwrap();

        // T[0,0] = 0.5, T[1,1] = 0.25
        // T[0,1] = -0.25 * 0.5 * (v0 · v1) = -0.125 * (2 + 12) = -1.75
        let got = download(pf, 4);
        assert_eq!(got[0], 0.5);
        assert_eq!(got[3], 0.25);
        assert_eq!(got[2], -1.75);
        assert_eq!(got[1], 0.0);

        free(pv, 6);
        free(pt, 2);
        free(pf, 4);
    }

    #[test]
    fn test_triangular_factor_rejects_unsupported_variants() {
        let client = CpuClient::new(CpuDevice::new());

        let v = BatchedMatrix::<f64>::strided(0x1000, 4, 2);
        let tau = BatchedScalars::<f64>::strided(0x2000, 2);
        let t = BatchedMatrix::<f64>::strided(0x3000, 4, 2);

        let err = client
            .build_triangular_factor(Direction::Backward, Storage::ColumnWise, 2, 2, &v, &tau, &t, 1)
            .unwrap_err();
        assert!(matches!(err, Error::NotImplemented { .. }));

        let err = client
            .build_triangular_factor(Direction::Forward, Storage::RowWise, 2, 2, &v, &tau, &t, 1)
            .unwrap_err();
        assert!(matches!(err, Error::NotImplemented { .. }));
    }
}
