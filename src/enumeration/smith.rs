// src/enumeration/smith.rs
//
// Smith Normal Form of a square integer matrix: D = L * M * R with L, R
// unimodular and diag(D) a non-negative divisor chain.

use crate::error::{EnumError, Result};
use crate::utils::linalg::IntMatrix;
use num_integer::Integer;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SmithNormalForm {
    /// Diagonal matrix with d_1 | d_2 | ... | d_n
    pub d: IntMatrix,
    /// Left unimodular factor
    pub left: IntMatrix,
    /// Right unimodular factor
    pub right: IntMatrix,
}

impl SmithNormalForm {
    pub fn diagonal(&self) -> Vec<i64> {
        (0..self.d.nrows()).map(|i| self.d[(i, i)]).collect()
    }

    pub fn dim(&self) -> usize {
        self.d.nrows()
    }
}

/// Decompose `m` into `(D, L, R)` with `D = L * m * R`.
///
/// # Algorithm
/// 1. Move the smallest non-zero entry of the trailing block to the pivot
/// 2. Euclidean elimination of the pivot row and column, repeated until both
///    are clear
/// 3. Recurse on the trailing block; zero pivots end up last
/// 4. Merge diagonal pairs that break the divisor chain into (gcd, lcm)
///
/// Every row/column operation on D is mirrored into L/R.
pub fn decompose_smith_normal_form(m: &IntMatrix) -> Result<SmithNormalForm> {
    let (rows, cols) = m.shape();
    if rows == 0 || rows != cols {
        return Err(EnumError::InvalidDimension { rows, cols });
    }

    let mut reducer = Reducer {
        d: m.clone(),
        left: IntMatrix::identity(rows, rows),
        right: IntMatrix::identity(cols, cols),
    };
    reducer.diagonalize();
    reducer.enforce_divisor_chain();

    log::trace!("SNF diagonal {:?}", (0..rows).map(|i| reducer.d[(i, i)]).collect::<Vec<_>>());

    Ok(SmithNormalForm {
        d: reducer.d,
        left: reducer.left,
        right: reducer.right,
    })
}

struct Reducer {
    d: IntMatrix,
    left: IntMatrix,
    right: IntMatrix,
}

impl Reducer {
    fn n(&self) -> usize {
        self.d.nrows()
    }

    fn diagonalize(&mut self) {
        let n = self.n();
        for s in 0..n {
            loop {
                let Some((pi, pj)) = self.smallest_nonzero(s) else {
                    // trailing block is all zero
                    return;
                };
                self.swap_rows(s, pi);
                self.swap_cols(s, pj);

                let pivot = self.d[(s, s)];
                let mut clear = true;

                for i in s + 1..n {
                    let q = self.d[(i, s)] / pivot;
                    if q != 0 {
                        self.add_row_multiple(i, s, -q);
                    }
                    if self.d[(i, s)] != 0 {
                        clear = false;
                    }
                }
                for j in s + 1..n {
                    let q = self.d[(s, j)] / pivot;
                    if q != 0 {
                        self.add_col_multiple(j, s, -q);
                    }
                    if self.d[(s, j)] != 0 {
                        clear = false;
                    }
                }

                if clear {
                    break;
                }
            }

            if self.d[(s, s)] < 0 {
                self.negate_row(s);
            }
        }
    }

    fn enforce_divisor_chain(&mut self) {
        let n = self.n();
        for i in 0..n {
            for j in i + 1..n {
                let a = self.d[(i, i)];
                let b = self.d[(j, j)];
                if a == 0 || b % a == 0 {
                    continue;
                }
                self.merge_pair(i, j);
            }
        }
    }

    /// Replace diag entries (a, b) at positions i, j by (gcd, lcm).
    ///
    /// With x*a + y*b = g:
    /// ```text
    /// [ x    y  ] [a 0] [1  -y*b/g]   [g    0   ]
    /// [-b/g a/g ] [0 b] [1   x*a/g] = [0  a*b/g ]
    /// ```
    fn merge_pair(&mut self, i: usize, j: usize) {
        let a = self.d[(i, i)];
        let b = self.d[(j, j)];
        let eg = a.extended_gcd(&b);
        let (g, x, y) = (eg.gcd, eg.x, eg.y);

        self.transform_rows(i, j, [[x, y], [-b / g, a / g]]);
        self.transform_cols(i, j, [[1, -y * b / g], [1, x * a / g]]);
    }

    fn smallest_nonzero(&self, s: usize) -> Option<(usize, usize)> {
        let n = self.n();
        let mut best: Option<(usize, usize, i64)> = None;
        for i in s..n {
            for j in s..n {
                let v = self.d[(i, j)].abs();
                if v != 0 && best.map_or(true, |(_, _, b)| v < b) {
                    best = Some((i, j, v));
                }
            }
        }
        best.map(|(i, j, _)| (i, j))
    }

    // --- Elementary operations, mirrored into L (rows) and R (columns) ---

    fn swap_rows(&mut self, a: usize, b: usize) {
        if a != b {
            self.d.swap_rows(a, b);
            self.left.swap_rows(a, b);
        }
    }

    fn swap_cols(&mut self, a: usize, b: usize) {
        if a != b {
            self.d.swap_columns(a, b);
            self.right.swap_columns(a, b);
        }
    }

    /// row[target] += k * row[source]
    fn add_row_multiple(&mut self, target: usize, source: usize, k: i64) {
        for m in [&mut self.d, &mut self.left] {
            for c in 0..m.ncols() {
                let v = m[(source, c)];
                m[(target, c)] += k * v;
            }
        }
    }

    /// col[target] += k * col[source]
    fn add_col_multiple(&mut self, target: usize, source: usize, k: i64) {
        for m in [&mut self.d, &mut self.right] {
            for r in 0..m.nrows() {
                let v = m[(r, source)];
                m[(r, target)] += k * v;
            }
        }
    }

    fn negate_row(&mut self, r: usize) {
        for m in [&mut self.d, &mut self.left] {
            for c in 0..m.ncols() {
                m[(r, c)] = -m[(r, c)];
            }
        }
    }

    /// (row_i, row_j) <- t * (row_i, row_j)
    fn transform_rows(&mut self, i: usize, j: usize, t: [[i64; 2]; 2]) {
        for m in [&mut self.d, &mut self.left] {
            for c in 0..m.ncols() {
                let (u, v) = (m[(i, c)], m[(j, c)]);
                m[(i, c)] = t[0][0] * u + t[0][1] * v;
                m[(j, c)] = t[1][0] * u + t[1][1] * v;
            }
        }
    }

    /// (col_i, col_j) <- (col_i, col_j) * t
    fn transform_cols(&mut self, i: usize, j: usize, t: [[i64; 2]; 2]) {
        for m in [&mut self.d, &mut self.right] {
            for r in 0..m.nrows() {
                let (u, v) = (m[(r, i)], m[(r, j)]);
                m[(r, i)] = u * t[0][0] + v * t[1][0];
                m[(r, j)] = u * t[0][1] + v * t[1][1];
            }
        }
    }
}
