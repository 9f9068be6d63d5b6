// src/enumeration/superlattice.rs
//
// Hermite Normal Form enumeration of superlattices and their reduction by the
// point group of the parent lattice.

use crate::enumeration::smith::decompose_smith_normal_form;
use crate::error::{EnumError, Result};
use crate::utils::linalg::{lattices_coincide, IntMatrix};
use std::collections::HashSet;

/// All superlattices of a 3-D parent lattice with the given index.
///
/// HNFs are lower triangular:
/// ```text
/// [a 0 0]
/// [b c 0]    0 <= b < c,  0 <= d, e < f,  a*c*f = index
/// [d e f]
/// ```
pub fn generate_all_superlattices(index: i64) -> Result<Vec<IntMatrix>> {
    generate_superlattices(3, index)
}

/// All lower-triangular HNFs of dimension `dim` and determinant `index`.
///
/// Ordering: diagonals in ascending lexicographic order, then off-diagonal
/// entries row-major ascending. Deterministic for a given `(dim, index)`.
pub fn generate_superlattices(dim: usize, index: i64) -> Result<Vec<IntMatrix>> {
    if index <= 0 {
        return Err(EnumError::configuration(format!(
            "superlattice index must be positive, got {}",
            index
        )));
    }
    if dim == 0 {
        return Err(EnumError::configuration("lattice dimension must be positive"));
    }

    let mut list = Vec::new();
    for diagonal in diagonal_tuples(dim, index) {
        // (row, col) of every free entry below the diagonal
        let slots: Vec<(usize, usize)> = (0..dim)
            .flat_map(|i| (0..i).map(move |j| (i, j)))
            .collect();
        let mut values = vec![0i64; slots.len()];

        loop {
            let mut hnf = IntMatrix::zeros(dim, dim);
            for (i, &d) in diagonal.iter().enumerate() {
                hnf[(i, i)] = d;
            }
            for (&(i, j), &v) in slots.iter().zip(&values) {
                hnf[(i, j)] = v;
            }
            list.push(hnf);

            // odometer, last slot fastest; each slot ranges over [0, diag[row])
            let mut k = slots.len();
            let advanced = loop {
                if k == 0 {
                    break false;
                }
                k -= 1;
                values[k] += 1;
                if values[k] < diagonal[slots[k].0] {
                    break true;
                }
                values[k] = 0;
            };
            if !advanced {
                break;
            }
        }
    }

    log::debug!("index {} (dim {}): {} HNFs", index, dim, list.len());
    Ok(list)
}

/// Ordered tuples of `dim` positive integers whose product is `n`
fn diagonal_tuples(dim: usize, n: i64) -> Vec<Vec<i64>> {
    if dim == 1 {
        return vec![vec![n]];
    }
    let mut out = Vec::new();
    for a in divisors(n) {
        for mut rest in diagonal_tuples(dim - 1, n / a) {
            rest.insert(0, a);
            out.push(rest);
        }
    }
    out
}

fn divisors(n: i64) -> Vec<i64> {
    (1..=n).filter(|d| n % d == 0).collect()
}

/// True when rotation `r` carries the superlattice of `h1` onto that of `h2`:
/// `r * h1 = h2 * m` for some unimodular integer `m`.
pub fn is_equivalent_superlattice(h1: &IntMatrix, h2: &IntMatrix, r: &IntMatrix) -> bool {
    if r.ncols() != h1.nrows() || h1.shape() != h2.shape() {
        return false;
    }
    lattices_coincide(h2, &(r * h1))
}

/// True when `r` maps the superlattice of `hnf` onto itself
pub fn stabilizes(hnf: &IntMatrix, r: &IntMatrix) -> bool {
    is_equivalent_superlattice(hnf, hnf, r)
}

/// One representative per symmetry-equivalence class.
///
/// `rotations` are the parent lattice's point-group operations in its
/// fractional basis. The first HNF met in input order represents its class.
pub fn reduce_by_symmetry(list_hnf: &[IntMatrix], rotations: &[IntMatrix]) -> Vec<IntMatrix> {
    let mut representatives: Vec<IntMatrix> = Vec::new();

    for hnf in list_hnf {
        let seen = representatives.iter().any(|rep| {
            rotations
                .iter()
                .any(|r| is_equivalent_superlattice(hnf, rep, r))
        });
        if !seen {
            representatives.push(hnf.clone());
        }
    }

    log::debug!(
        "reduced {} HNFs to {} with {} rotations",
        list_hnf.len(),
        representatives.len(),
        rotations.len()
    );
    representatives
}

/// Same as [`reduce_by_symmetry`], under the name used by the enumeration literature
pub fn reduce_hnf_list_by_parent_lattice_symmetry(
    list_hnf: &[IntMatrix],
    rotations: &[IntMatrix],
) -> Vec<IntMatrix> {
    reduce_by_symmetry(list_hnf, rotations)
}

/// Number of distinct SNF diagonals among `list_hnf`
pub fn count_snf_classes(list_hnf: &[IntMatrix]) -> Result<usize> {
    let mut classes = HashSet::new();
    for hnf in list_hnf {
        classes.insert(decompose_smith_normal_form(hnf)?.diagonal());
    }
    Ok(classes.len())
}
