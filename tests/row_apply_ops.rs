//! Integration tests for row-wise reflector application

mod common;

use common::*;
use orq::prelude::*;

/// Dense composite `H(k-1)·…·H(1)·H(0)` from full-length generators
fn dense_composite_desc(len: usize, vs: &[Vec<f64>], taus: &[f64]) -> Vec<f64> {
    let mut m = vec![0.0; len * len];
    for i in 0..len {
        m[i + i * len] = 1.0;
    }
    for (v, &tau) in vs.iter().zip(taus).rev() {
        let h = dense_reflector(len, v, tau);
        m = mat_mul(len, len, len, &m, &h);
    }
    m
}

struct RowFactor {
    factored: Vec<f64>,
    taus: Vec<f64>,
    /// H(k-1)·…·H(0), the operator the untransposed left application builds
    composite: Vec<f64>,
}

/// Factor a random k×len matrix into k row reflectors
fn row_factor(seed: u64, k: usize, len: usize) -> RowFactor {
    let mut rng = seeded_rng(seed);
    let mut factored = random_matrix(&mut rng, k, len);
    let taus = host_gelqf(k, len, &mut factored);
    let vs: Vec<Vec<f64>> = (0..k).map(|i| row_generator(&factored, k, len, i)).collect();
    let composite = dense_composite_desc(len, &vs, &taus);
    RowFactor {
        factored,
        taus,
        composite,
    }
}

#[test]
fn test_left_application_both_transpose_senses() {
    let (client, device) = create_cpu_client();
    let mut rng = seeded_rng(202);

    let (m, n, k) = (8, 5, 4);
    let factor = row_factor(201, k, m);
    let c0 = random_matrix(&mut rng, m, n);

    let pa = upload(&device, &factor.factored);
    let pt = upload(&device, &factor.taus);
    let a = BatchedMatrix::<f64>::strided(pa, k * m, k);
    let tau = BatchedScalars::<f64>::strided(pt, k);

    for trans in [Transpose::None, Transpose::Transpose] {
        let pc = upload(&device, &c0);
        let c = BatchedMatrix::<f64>::strided(pc, m * n, m);

        client
            .apply_row_reflectors(Side::Left, trans, m, n, k, &a, &tau, &c, 1)
            .unwrap();
        client.synchronize();

        let expected = match trans {
            Transpose::None => mat_mul(m, m, n, &factor.composite, &c0),
            Transpose::Transpose => {
                mat_mul(m, m, n, &mat_transpose(m, m, &factor.composite), &c0)
            }
        };
        assert_allclose_f64(
            &download(&device, pc, m * n),
            &expected,
            1e-12,
            1e-12,
            "left row-wise application",
        );

        free(&device, pc, m * n);
    }

    // the generator matrix is bit-identical after application
    assert_eq!(download(&device, pa, k * m), factor.factored);
    assert_eq!(download(&device, pt, k), factor.taus);

    free(&device, pa, k * m);
    free(&device, pt, k);
}

#[test]
fn test_right_application_both_transpose_senses() {
    let (client, device) = create_cpu_client();
    let mut rng = seeded_rng(204);

    let (m, n, k) = (5, 8, 4);
    let factor = row_factor(203, k, n);
    let c0 = random_matrix(&mut rng, m, n);

    let pa = upload(&device, &factor.factored);
    let pt = upload(&device, &factor.taus);
    let a = BatchedMatrix::<f64>::strided(pa, k * n, k);
    let tau = BatchedScalars::<f64>::strided(pt, k);

    for trans in [Transpose::None, Transpose::Transpose] {
        let pc = upload(&device, &c0);
        let c = BatchedMatrix::<f64>::strided(pc, m * n, m);

        client
            .apply_row_reflectors(Side::Right, trans, m, n, k, &a, &tau, &c, 1)
            .unwrap();
        client.synchronize();

        let expected = match trans {
            Transpose::None => mat_mul(m, n, n, &c0, &factor.composite),
            Transpose::Transpose => {
                mat_mul(m, n, n, &c0, &mat_transpose(n, n, &factor.composite))
            }
        };
        assert_allclose_f64(
            &download(&device, pc, m * n),
            &expected,
            1e-12,
            1e-12,
            "right row-wise application",
        );

        free(&device, pc, m * n);
    }

    assert_eq!(download(&device, pa, k * n), factor.factored);

    free(&device, pa, k * n);
    free(&device, pt, k);
}

#[test]
fn test_forward_then_adjoint_round_trips() {
    let (client, device) = create_cpu_client();
    let mut rng = seeded_rng(206);

    let (m, n, k) = (8, 5, 4);
    let factor = row_factor(205, k, m);
    let c0 = random_matrix(&mut rng, m, n);

    let pa = upload(&device, &factor.factored);
    let pt = upload(&device, &factor.taus);
    let pc = upload(&device, &c0);
    let a = BatchedMatrix::<f64>::strided(pa, k * m, k);
    let tau = BatchedScalars::<f64>::strided(pt, k);
    let c = BatchedMatrix::<f64>::strided(pc, m * n, m);

    client
        .apply_row_reflectors(Side::Left, Transpose::None, m, n, k, &a, &tau, &c, 1)
        .unwrap();
    client
        .apply_row_reflectors(Side::Left, Transpose::Transpose, m, n, k, &a, &tau, &c, 1)
        .unwrap();
    client.synchronize();

    assert_allclose_f64(
        &download(&device, pc, m * n),
        &c0,
        1e-12,
        1e-12,
        "QᵗQ round trip",
    );

    free(&device, pa, k * m);
    free(&device, pt, k);
    free(&device, pc, m * n);
}

#[test]
fn test_batched_items_match_single_item_calls() {
    let (client, device) = create_cpu_client();
    let mut rng = seeded_rng(208);

    let (m, n, k) = (8, 5, 4);
    let batch = 2;

    let factors: Vec<RowFactor> = (0..batch).map(|b| row_factor(300 + b as u64, k, m)).collect();
    let targets: Vec<Vec<f64>> = (0..batch).map(|_| random_matrix(&mut rng, m, n)).collect();

    let flat_a: Vec<f64> = factors.iter().flat_map(|f| f.factored.clone()).collect();
    let flat_tau: Vec<f64> = factors.iter().flat_map(|f| f.taus.clone()).collect();
    let flat_c: Vec<f64> = targets.iter().flatten().copied().collect();

    let pa = upload(&device, &flat_a);
    let pt = upload(&device, &flat_tau);
    let pc = upload(&device, &flat_c);
    let a = BatchedMatrix::<f64>::strided(pa, k * m, k);
    let tau = BatchedScalars::<f64>::strided(pt, k);
    let c = BatchedMatrix::<f64>::strided(pc, m * n, m);

    client
        .apply_row_reflectors(Side::Left, Transpose::None, m, n, k, &a, &tau, &c, batch)
        .unwrap();
    client.synchronize();
    let batched = download(&device, pc, batch * m * n);

    for b in 0..batch {
        let pa1 = upload(&device, &factors[b].factored);
        let pt1 = upload(&device, &factors[b].taus);
        let pc1 = upload(&device, &targets[b]);
        let a1 = BatchedMatrix::<f64>::strided(pa1, k * m, k);
        let t1 = BatchedScalars::<f64>::strided(pt1, k);
        let c1 = BatchedMatrix::<f64>::strided(pc1, m * n, m);

        client
            .apply_row_reflectors(Side::Left, Transpose::None, m, n, k, &a1, &t1, &c1, 1)
            .unwrap();
        client.synchronize();

        assert_eq!(
            batched[b * m * n..(b + 1) * m * n],
            download(&device, pc1, m * n)[..],
            "item {} differs from its single-item run",
            b
        );

        free(&device, pa1, k * m);
        free(&device, pt1, k);
        free(&device, pc1, m * n);
    }

    free(&device, pa, batch * k * m);
    free(&device, pt, batch * k);
    free(&device, pc, batch * m * n);
}

#[test]
fn test_zero_reflectors_is_a_no_op() {
    let (client, device) = create_cpu_client();

    let c0 = vec![3.25; 15];
    let pa = upload(&device, &[0.5; 8]);
    let pt = upload(&device, &[0.5; 2]);
    let pc = upload(&device, &c0);
    let a = BatchedMatrix::<f64>::strided(pa, 8, 1);
    let tau = BatchedScalars::<f64>::strided(pt, 2);
    let c = BatchedMatrix::<f64>::strided(pc, 15, 5);

    client
        .apply_row_reflectors(Side::Left, Transpose::None, 5, 3, 0, &a, &tau, &c, 1)
        .unwrap();
    client.synchronize();

    assert_eq!(download(&device, pc, 15), c0);

    free(&device, pa, 8);
    free(&device, pt, 2);
    free(&device, pc, 15);
}

#[test]
fn test_invalid_inputs_are_rejected() {
    let (client, device) = create_cpu_client();

    let (m, n, k) = (8, 5, 4);
    let pa = upload(&device, &vec![0.5; k * m]);
    let pt = upload(&device, &vec![0.5; k]);
    let pc = upload(&device, &vec![0.5; m * n]);
    let a = BatchedMatrix::<f64>::strided(pa, k * m, k);
    let tau = BatchedScalars::<f64>::strided(pt, k);
    let c = BatchedMatrix::<f64>::strided(pc, m * n, m);

    // more reflectors than the applied dimension holds
    let err = client
        .apply_row_reflectors(Side::Left, Transpose::None, 3, n, k, &a, &tau, &c, 1)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidSize { arg: "k", .. }));

    // lda < k
    let bad_a = BatchedMatrix::<f64>::strided(pa, k * m, k - 1);
    let err = client
        .apply_row_reflectors(Side::Left, Transpose::None, m, n, k, &bad_a, &tau, &c, 1)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidSize { arg: "lda", .. }));

    // ldc < m
    let bad_c = BatchedMatrix::<f64>::strided(pc, m * n, m - 1);
    let err = client
        .apply_row_reflectors(Side::Left, Transpose::None, m, n, k, &a, &tau, &bad_c, 1)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidSize { arg: "ldc", .. }));

    // null scalars
    let null_tau = BatchedScalars::<f64>::strided(0, k);
    let err = client
        .apply_row_reflectors(Side::Left, Transpose::None, m, n, k, &a, &null_tau, &c, 1)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidPointer { arg: "tau" }));

    free(&device, pa, k * m);
    free(&device, pt, k);
    free(&device, pc, m * n);
}
