// Shared lattice fixtures for unit tests.

use crate::utils::linalg::{int_matrix, solve_integer, IntMatrix};

/// The 48 operations of m-3m as signed permutation matrices, identity first
pub fn cubic_rotations() -> Vec<IntMatrix> {
    let perms = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];
    let mut out = Vec::with_capacity(48);
    for p in perms {
        for signs in 0..8 {
            let mut m = IntMatrix::zeros(3, 3);
            for i in 0..3 {
                m[(i, p[i])] = if (signs >> i) & 1 == 1 { -1 } else { 1 };
            }
            out.push(m);
        }
    }
    out
}

/// Cubic operations expressed in the fractional basis of the fcc primitive cell
pub fn fcc_rotations() -> Vec<IntMatrix> {
    let basis = int_matrix(&[&[0, 1, 1], &[1, 0, 1], &[1, 1, 0]]);
    cubic_rotations()
        .iter()
        .map(|r| solve_integer(&basis, &(r * &basis)).expect("fcc basis keeps cubic symmetry"))
        .collect()
}
