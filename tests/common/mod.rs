//! Common test utilities
#![allow(dead_code)]

use orq::runtime::Runtime;
use orq::runtime::cpu::{CpuClient, CpuDevice, CpuRuntime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Create a CPU client and device for testing
pub fn create_cpu_client() -> (CpuClient, CpuDevice) {
    let device = CpuDevice::new();
    let client = CpuRuntime::default_client(&device);
    (client, device)
}

/// Assert two f64 slices are close within tolerance
///
/// Uses the formula: |a - b| <= atol + rtol * |b|
pub fn assert_allclose_f64(a: &[f64], b: &[f64], rtol: f64, atol: f64, msg: &str) {
    assert_eq!(a.len(), b.len(), "{}: length mismatch", msg);
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        let tol = atol + rtol * y.abs();
        assert!(
            diff <= tol,
            "{}: element {} differs: {} vs {} (diff={}, tol={})",
            msg,
            i,
            x,
            y,
            diff,
            tol
        );
    }
}

/// Upload an f64 slice to a fresh device buffer
pub fn upload(device: &CpuDevice, data: &[f64]) -> u64 {
    let ptr = CpuRuntime::allocate(data.len() * 8, device);
    CpuRuntime::copy_to_device(bytemuck::cast_slice(data), ptr, device);
    ptr
}

/// Download `len` f64 elements from a device buffer
pub fn download(device: &CpuDevice, ptr: u64, len: usize) -> Vec<f64> {
    let mut out = vec![0.0f64; len];
    CpuRuntime::copy_from_device(ptr, bytemuck::cast_slice_mut(&mut out), device);
    out
}

/// Release a device buffer of `len` f64 elements
pub fn free(device: &CpuDevice, ptr: u64, len: usize) {
    CpuRuntime::deallocate(ptr, len * 8, device);
}

/// Column-major random matrix with entries in [-1, 1)
pub fn random_matrix(rng: &mut StdRng, rows: usize, cols: usize) -> Vec<f64> {
    (0..rows * cols).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

/// Seeded generator so failures reproduce
pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Column-major matrix product: C(m×n) = A(m×k) · B(k×n)
pub fn mat_mul(m: usize, k: usize, n: usize, a: &[f64], b: &[f64]) -> Vec<f64> {
    let mut c = vec![0.0; m * n];
    for j in 0..n {
        for l in 0..k {
            let bv = b[l + j * k];
            for i in 0..m {
                c[i + j * m] += a[i + l * m] * bv;
            }
        }
    }
    c
}

/// Column-major transpose of an m×n matrix
pub fn mat_transpose(m: usize, n: usize, a: &[f64]) -> Vec<f64> {
    let mut t = vec![0.0; m * n];
    for j in 0..n {
        for i in 0..m {
            t[j + i * n] = a[i + j * m];
        }
    }
    t
}

/// Householder QR factorization on the host (column reflectors)
///
/// Factors the column-major m×n matrix in place: R lands on and above the
/// diagonal, generator j below the diagonal of column j with an implicit
/// unit leading element. Returns the scalars. The orthogonal factor is
/// `H(0) · H(1) · … · H(k-1)` for `k = min(m, n)`.
pub fn host_geqrf(m: usize, n: usize, a: &mut [f64]) -> Vec<f64> {
    let k = m.min(n);
    let mut tau = vec![0.0; k];

    for j in 0..k {
        let alpha = a[j + j * m];
        let mut xnorm_sq = 0.0;
        for i in (j + 1)..m {
            xnorm_sq += a[i + j * m] * a[i + j * m];
        }

        if xnorm_sq == 0.0 {
            tau[j] = 0.0;
            continue;
        }

        let norm = (alpha * alpha + xnorm_sq).sqrt();
        let beta = if alpha >= 0.0 { -norm } else { norm };
        tau[j] = (beta - alpha) / beta;

        let scale = 1.0 / (alpha - beta);
        for i in (j + 1)..m {
            a[i + j * m] *= scale;
        }

        // apply H(j) to the trailing columns
        for jj in (j + 1)..n {
            let mut w = a[j + jj * m];
            for i in (j + 1)..m {
                w += a[i + j * m] * a[i + jj * m];
            }
            let tw = tau[j] * w;
            a[j + jj * m] -= tw;
            for i in (j + 1)..m {
                a[i + jj * m] -= tw * a[i + j * m];
            }
        }

        a[j + j * m] = beta;
    }

    tau
}

/// Householder LQ factorization on the host (row reflectors)
///
/// Factors the column-major m×n matrix in place: L lands on and below the
/// diagonal, generator i in row i right of the diagonal with an implicit
/// unit leading element. Returns the scalars.
pub fn host_gelqf(m: usize, n: usize, a: &mut [f64]) -> Vec<f64> {
    let k = m.min(n);
    let mut tau = vec![0.0; k];

    for i in 0..k {
        let alpha = a[i + i * m];
        let mut xnorm_sq = 0.0;
        for j in (i + 1)..n {
            xnorm_sq += a[i + j * m] * a[i + j * m];
        }

        if xnorm_sq == 0.0 {
            tau[i] = 0.0;
            continue;
        }

        let norm = (alpha * alpha + xnorm_sq).sqrt();
        let beta = if alpha >= 0.0 { -norm } else { norm };
        tau[i] = (beta - alpha) / beta;

        let scale = 1.0 / (alpha - beta);
        for j in (i + 1)..n {
            a[i + j * m] *= scale;
        }

        // apply H(i) from the right to the trailing rows
        for r in (i + 1)..m {
            let mut w = a[r + i * m];
            for j in (i + 1)..n {
                w += a[r + j * m] * a[i + j * m];
            }
            let tw = tau[i] * w;
            a[r + i * m] -= tw;
            for j in (i + 1)..n {
                a[r + j * m] -= tw * a[i + j * m];
            }
        }

        a[i + i * m] = beta;
    }

    tau
}

/// Dense len×len reflector `I - tau · v · vᵗ`
pub fn dense_reflector(len: usize, v: &[f64], tau: f64) -> Vec<f64> {
    let mut h = vec![0.0; len * len];
    for j in 0..len {
        for i in 0..len {
            let id = if i == j { 1.0 } else { 0.0 };
            h[i + j * len] = id - tau * v[i] * v[j];
        }
    }
    h
}

/// Reflector vector i of a row-wise stored k×len factor, embedded in
/// full length: zeros before i, unit at i, stored entries after
pub fn row_generator(factored: &[f64], lda: usize, len: usize, i: usize) -> Vec<f64> {
    let mut v = vec![0.0; len];
    v[i] = 1.0;
    for j in (i + 1)..len {
        v[j] = factored[i + j * lda];
    }
    v
}

/// Reflector vector j of a column-wise stored len×k factor, embedded in
/// full length: zeros before j, unit at j, stored entries after
pub fn col_generator(factored: &[f64], lda: usize, len: usize, j: usize) -> Vec<f64> {
    let mut v = vec![0.0; len];
    v[j] = 1.0;
    for i in (j + 1)..len {
        v[i] = factored[i + j * lda];
    }
    v
}
