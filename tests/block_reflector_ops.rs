//! Integration tests for block-reflector application

mod common;

use common::*;
use orq::prelude::*;

/// Dense composite `H(0)·H(1)·…·H(k-1)` from full-length generators
fn dense_composite(len: usize, vs: &[Vec<f64>], taus: &[f64]) -> Vec<f64> {
    let mut m = vec![0.0; len * len];
    for i in 0..len {
        m[i + i * len] = 1.0;
    }
    for (v, &tau) in vs.iter().zip(taus) {
        let h = dense_reflector(len, v, tau);
        m = mat_mul(len, len, len, &m, &h);
    }
    m
}

/// Host reference for the k×k triangular factor of forward reflectors
fn host_larft(len: usize, vs: &[Vec<f64>], taus: &[f64]) -> Vec<f64> {
    let k = taus.len();
    let mut t = vec![0.0; k * k];
    for i in 0..k {
        let mut g = vec![0.0; i];
        for (j, gj) in g.iter_mut().enumerate() {
            *gj = (0..len).map(|r| vs[j][r] * vs[i][r]).sum();
        }
        for j in 0..i {
            let mut s = 0.0;
            for l in j..i {
                s += t[j + l * k] * g[l];
            }
            t[j + i * k] = -taus[i] * s;
        }
        t[i + i * k] = taus[i];
    }
    t
}

/// Column-wise generator block with explicit unit diagonal and zeroed upper
fn unit_lower_v(m: usize, k: usize, factored: &[f64], lda: usize) -> Vec<f64> {
    let mut v = vec![0.0; m * k];
    for j in 0..k {
        v[j + j * m] = 1.0;
        for i in (j + 1)..m {
            v[i + j * m] = factored[i + j * lda];
        }
    }
    v
}

struct ColumnBlock {
    v_host: Vec<f64>,
    vs: Vec<Vec<f64>>,
    taus: Vec<f64>,
}

/// Factor a random m×k matrix into k column reflectors
fn column_block(seed: u64, m: usize, k: usize) -> ColumnBlock {
    let mut rng = seeded_rng(seed);
    let mut factored = random_matrix(&mut rng, m, k);
    let taus = host_geqrf(m, k, &mut factored);
    let vs = (0..k)
        .map(|j| col_generator(&factored, m, m, j))
        .collect();
    ColumnBlock {
        v_host: unit_lower_v(m, k, &factored, m),
        vs,
        taus,
    }
}

#[test]
fn test_triangular_factor_composes_the_block() {
    let (client, device) = create_cpu_client();

    let (m, k) = (10, 4);
    let block = column_block(101, m, k);

    let pv = upload(&device, &block.v_host);
    let pt = upload(&device, &block.taus);
    let pf = upload(&device, &vec![0.0; k * k]);

    let v = BatchedMatrix::<f64>::strided(pv, m * k, m);
    let tau = BatchedScalars::<f64>::strided(pt, k);
    let f = BatchedMatrix::<f64>::strided(pf, k * k, k);

    client
        .build_triangular_factor(Direction::Forward, Storage::ColumnWise, m, k, &v, &tau, &f, 1)
        .unwrap();
    client.synchronize();

    let t = download(&device, pf, k * k);
    assert_allclose_f64(
        &t,
        &host_larft(m, &block.vs, &block.taus),
        1e-12,
        1e-12,
        "triangular factor",
    );

    // I - V·T·Vᵗ equals the reflector product
    let vt = mat_mul(m, k, k, &block.v_host, &t);
    let vtv = mat_mul(m, k, m, &vt, &mat_transpose(m, k, &block.v_host));
    let mut h = vec![0.0; m * m];
    for j in 0..m {
        for i in 0..m {
            let id = if i == j { 1.0 } else { 0.0 };
            h[i + j * m] = id - vtv[i + j * m];
        }
    }
    assert_allclose_f64(
        &h,
        &dense_composite(m, &block.vs, &block.taus),
        1e-12,
        1e-12,
        "I - V T Vt",
    );

    free(&device, pv, m * k);
    free(&device, pt, k);
    free(&device, pf, k * k);
}

#[test]
fn test_left_application_matches_dense_reference() {
    let (client, device) = create_cpu_client();
    let mut rng = seeded_rng(103);

    let (m, n, k) = (10, 6, 4);
    let block = column_block(102, m, k);
    let h = dense_composite(m, &block.vs, &block.taus);
    let c0 = random_matrix(&mut rng, m, n);

    let pv = upload(&device, &block.v_host);
    let pt = upload(&device, &block.taus);
    let pf = upload(&device, &vec![0.0; k * k]);
    let v = BatchedMatrix::<f64>::strided(pv, m * k, m);
    let tau = BatchedScalars::<f64>::strided(pt, k);
    let f = BatchedMatrix::<f64>::strided(pf, k * k, k);
    client
        .build_triangular_factor(Direction::Forward, Storage::ColumnWise, m, k, &v, &tau, &f, 1)
        .unwrap();

    for trans in [Transpose::None, Transpose::Transpose] {
        let pc = upload(&device, &c0);
        let c = BatchedMatrix::<f64>::strided(pc, m * n, m);

        client
            .apply_block_reflector(
                Side::Left,
                trans,
                Direction::Forward,
                Storage::ColumnWise,
                m,
                n,
                k,
                &v,
                &f,
                &c,
                1,
            )
            .unwrap();
        client.synchronize();

        let expected = match trans {
            Transpose::None => mat_mul(m, m, n, &h, &c0),
            Transpose::Transpose => mat_mul(m, m, n, &mat_transpose(m, m, &h), &c0),
        };
        assert_allclose_f64(
            &download(&device, pc, m * n),
            &expected,
            1e-12,
            1e-12,
            "left block application",
        );

        free(&device, pc, m * n);
    }

    free(&device, pv, m * k);
    free(&device, pt, k);
    free(&device, pf, k * k);
}

#[test]
fn test_right_application_matches_dense_reference() {
    let (client, device) = create_cpu_client();
    let mut rng = seeded_rng(105);

    // the reflectors act on the column dimension of C
    let (m, n, k) = (6, 10, 4);
    let block = column_block(104, n, k);
    let h = dense_composite(n, &block.vs, &block.taus);
    let c0 = random_matrix(&mut rng, m, n);

    let pv = upload(&device, &block.v_host);
    let pt = upload(&device, &block.taus);
    let pf = upload(&device, &vec![0.0; k * k]);
    let v = BatchedMatrix::<f64>::strided(pv, n * k, n);
    let tau = BatchedScalars::<f64>::strided(pt, k);
    let f = BatchedMatrix::<f64>::strided(pf, k * k, k);
    client
        .build_triangular_factor(Direction::Forward, Storage::ColumnWise, n, k, &v, &tau, &f, 1)
        .unwrap();

    let pc = upload(&device, &c0);
    let c = BatchedMatrix::<f64>::strided(pc, m * n, m);
    client
        .apply_block_reflector(
            Side::Right,
            Transpose::None,
            Direction::Forward,
            Storage::ColumnWise,
            m,
            n,
            k,
            &v,
            &f,
            &c,
            1,
        )
        .unwrap();
    client.synchronize();

    let expected = mat_mul(m, n, n, &c0, &h);
    assert_allclose_f64(
        &download(&device, pc, m * n),
        &expected,
        1e-12,
        1e-12,
        "right block application",
    );

    free(&device, pc, m * n);
    free(&device, pv, n * k);
    free(&device, pt, k);
    free(&device, pf, k * k);
}

#[test]
fn test_row_wise_storage_matches_dense_reference() {
    let (client, device) = create_cpu_client();
    let mut rng = seeded_rng(107);

    // LQ-style factor: k generators in the rows of a k×m matrix
    let (m, n, k) = (10, 6, 4);
    let mut factored = random_matrix(&mut rng, k, m);
    let taus = host_gelqf(k, m, &mut factored);
    let vs: Vec<Vec<f64>> = (0..k).map(|i| row_generator(&factored, k, m, i)).collect();
    let h = dense_composite(m, &vs, &taus);

    let t = host_larft(m, &vs, &taus);
    let c0 = random_matrix(&mut rng, m, n);

    let pv = upload(&device, &factored);
    let pf = upload(&device, &t);
    let pc = upload(&device, &c0);
    let v = BatchedMatrix::<f64>::strided(pv, k * m, k);
    let f = BatchedMatrix::<f64>::strided(pf, k * k, k);
    let c = BatchedMatrix::<f64>::strided(pc, m * n, m);

    client
        .apply_block_reflector(
            Side::Left,
            Transpose::None,
            Direction::Forward,
            Storage::RowWise,
            m,
            n,
            k,
            &v,
            &f,
            &c,
            1,
        )
        .unwrap();
    client.synchronize();

    let expected = mat_mul(m, m, n, &h, &c0);
    assert_allclose_f64(
        &download(&device, pc, m * n),
        &expected,
        1e-12,
        1e-12,
        "row-wise block application",
    );

    free(&device, pv, k * m);
    free(&device, pf, k * k);
    free(&device, pc, m * n);
}

#[test]
fn test_backward_direction_is_rejected_and_target_untouched() {
    let (client, device) = create_cpu_client();
    let mut rng = seeded_rng(109);

    let (m, n, k) = (10, 6, 4);
    let block = column_block(108, m, k);
    let c0 = random_matrix(&mut rng, m, n);

    let pv = upload(&device, &block.v_host);
    let pf = upload(&device, &vec![0.25; k * k]);
    let pc = upload(&device, &c0);
    let v = BatchedMatrix::<f64>::strided(pv, m * k, m);
    let f = BatchedMatrix::<f64>::strided(pf, k * k, k);
    let c = BatchedMatrix::<f64>::strided(pc, m * n, m);

    let err = client
        .apply_block_reflector(
            Side::Left,
            Transpose::None,
            Direction::Backward,
            Storage::ColumnWise,
            m,
            n,
            k,
            &v,
            &f,
            &c,
            1,
        )
        .unwrap_err();
    assert!(matches!(err, Error::NotImplemented { .. }));
    assert_eq!(download(&device, pc, m * n), c0);

    free(&device, pv, m * k);
    free(&device, pf, k * k);
    free(&device, pc, m * n);
}

#[test]
fn test_invalid_sizes_are_rejected_without_backend_calls() {
    let (client, device) = create_cpu_client();

    let (m, n, k) = (10, 6, 4);
    let c0 = vec![2.5; m * n];
    let pv = upload(&device, &vec![0.5; m * k]);
    let pf = upload(&device, &vec![0.5; k * k]);
    let pc = upload(&device, &c0);

    let v = BatchedMatrix::<f64>::strided(pv, m * k, m);
    let f = BatchedMatrix::<f64>::strided(pf, k * k, k);
    let c = BatchedMatrix::<f64>::strided(pc, m * n, m);

    // lda < m
    let bad_c = BatchedMatrix::<f64>::strided(pc, m * n, m - 1);
    let err = client
        .apply_block_reflector(
            Side::Left,
            Transpose::None,
            Direction::Forward,
            Storage::ColumnWise,
            m,
            n,
            k,
            &v,
            &f,
            &bad_c,
            1,
        )
        .unwrap_err();
    assert!(matches!(err, Error::InvalidSize { arg: "lda", .. }));

    // ldf < k
    let bad_f = BatchedMatrix::<f64>::strided(pf, k * k, k - 1);
    let err = client
        .apply_block_reflector(
            Side::Left,
            Transpose::None,
            Direction::Forward,
            Storage::ColumnWise,
            m,
            n,
            k,
            &v,
            &bad_f,
            &c,
            1,
        )
        .unwrap_err();
    assert!(matches!(err, Error::InvalidSize { arg: "ldf", .. }));

    // column-wise from the left needs ldv >= m
    let bad_v = BatchedMatrix::<f64>::strided(pv, m * k, k);
    let err = client
        .apply_block_reflector(
            Side::Left,
            Transpose::None,
            Direction::Forward,
            Storage::ColumnWise,
            m,
            n,
            k,
            &bad_v,
            &f,
            &c,
            1,
        )
        .unwrap_err();
    assert!(matches!(err, Error::InvalidSize { arg: "ldv", .. }));

    // k = 0 is rejected outright
    let err = client
        .apply_block_reflector(
            Side::Left,
            Transpose::None,
            Direction::Forward,
            Storage::ColumnWise,
            m,
            n,
            0,
            &v,
            &f,
            &c,
            1,
        )
        .unwrap_err();
    assert!(matches!(err, Error::InvalidSize { arg: "k", .. }));

    // nothing ran
    assert_eq!(download(&device, pc, m * n), c0);

    free(&device, pv, m * k);
    free(&device, pf, k * k);
    free(&device, pc, m * n);
}

#[test]
fn test_zero_extent_is_a_no_op() {
    let (client, device) = create_cpu_client();

    let (m, k) = (10, 4);
    let block = column_block(110, m, k);
    let pv = upload(&device, &block.v_host);
    let pf = upload(&device, &vec![0.5; k * k]);
    let pc = upload(&device, &[1.0; 10]);

    let v = BatchedMatrix::<f64>::strided(pv, m * k, m);
    let f = BatchedMatrix::<f64>::strided(pf, k * k, k);
    let c = BatchedMatrix::<f64>::strided(pc, 10, 10);

    client
        .apply_block_reflector(
            Side::Left,
            Transpose::None,
            Direction::Forward,
            Storage::ColumnWise,
            m,
            0,
            k,
            &v,
            &f,
            &c,
            1,
        )
        .unwrap();
    client
        .apply_block_reflector(
            Side::Left,
            Transpose::None,
            Direction::Forward,
            Storage::ColumnWise,
            m,
            5,
            k,
            &v,
            &f,
            &c,
            0,
        )
        .unwrap();
    client.synchronize();

    assert_eq!(download(&device, pc, 10), vec![1.0; 10]);

    free(&device, pv, m * k);
    free(&device, pf, k * k);
    free(&device, pc, 10);
}
